use std::fs;
use std::path::{Path, PathBuf};

use crate::guest::Console;
use crate::model::config::HostSettings;
use crate::plugin::manifest::{ModuleId, ModuleManifest};
use crate::plugin::session::ModuleSession;

const MANIFEST_FILE: &str = "module.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleStatus {
    Discovered,
    Finished,
    Error(String),
}

#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("missing module manifest")]
    MissingManifest,
    #[error("missing wasm entry: {}", .0.display())]
    MissingEntry(PathBuf),
    #[error("load failed: {0}")]
    Load(String),
    #[error("trapped: {0}")]
    Trap(String),
    #[error("exited with status {0}")]
    Exit(i32),
}

impl RuntimeError {
    pub(crate) fn load(err: wasmtime::Error) -> Self {
        Self::Load(format!("{err:#}"))
    }
}

#[derive(Debug, Clone)]
pub struct ModuleRuntime {
    pub id: ModuleId,
    pub root_dir: PathBuf,
    pub manifest: Option<ModuleManifest>,
    pub status: ModuleStatus,
}

impl ModuleRuntime {
    pub fn discover(id: ModuleId, root_dir: PathBuf) -> Self {
        match Self::read_manifest(&root_dir) {
            Ok(manifest) => Self {
                id,
                root_dir,
                manifest: Some(manifest),
                status: ModuleStatus::Discovered,
            },
            Err(err) => {
                tracing::warn!("module discovery failed: {err}");
                Self {
                    id,
                    root_dir,
                    manifest: None,
                    status: ModuleStatus::Error(err),
                }
            }
        }
    }

    pub fn status(&self) -> &ModuleStatus {
        &self.status
    }

    pub fn display_name(&self) -> String {
        self.manifest
            .as_ref()
            .map(|manifest| manifest.name.clone())
            .unwrap_or_else(|| self.id.0.clone())
    }

    /// Instantiates the module and calls `_start` once. Whatever the guest
    /// printed is forwarded to `console` line by line, also when it traps.
    pub fn run(
        &mut self,
        host: &HostSettings,
        console: &mut dyn Console,
    ) -> Result<(), RuntimeError> {
        let result = self.start_session(host).and_then(|mut session| {
            let started = session.start();
            for line in session.take_output() {
                console.log(&line);
            }
            for path in session.take_open_requests() {
                tracing::info!(path = %path.display(), "open request outside a session ignored");
            }
            started
        });

        self.record(&result);
        result
    }

    /// Instantiates the module and runs `_start`, leaving it ready for
    /// `draw`/`handle_key`. Output of `_start` stays queued in the session.
    pub fn session(&mut self, host: &HostSettings) -> Result<ModuleSession, RuntimeError> {
        let result = self.start_session(host).and_then(|mut session| {
            session.start()?;
            Ok(session)
        });

        self.record(&result);
        result
    }

    fn start_session(&self, host: &HostSettings) -> Result<ModuleSession, RuntimeError> {
        let manifest = self
            .manifest
            .as_ref()
            .ok_or(RuntimeError::MissingManifest)?;

        let wasm_path = self.root_dir.join(&manifest.entry);
        if !wasm_path.is_file() {
            return Err(RuntimeError::MissingEntry(wasm_path));
        }

        tracing::info!(
            module = %self.display_name(),
            permissions = ?manifest.permissions,
            "starting wasm module"
        );

        ModuleSession::instantiate(&wasm_path, manifest, host)
    }

    fn record<T>(&mut self, result: &Result<T, RuntimeError>) {
        self.status = match result {
            Ok(_) => {
                tracing::info!(module = %self.display_name(), "wasm module finished");
                ModuleStatus::Finished
            }
            Err(err) => ModuleStatus::Error(err.to_string()),
        };
    }

    fn read_manifest(root_dir: &Path) -> Result<ModuleManifest, String> {
        let manifest_path = root_dir.join(MANIFEST_FILE);
        let raw = fs::read_to_string(&manifest_path)
            .map_err(|err| format!("{}: {err}", manifest_path.display()))?;

        toml::from_str::<ModuleManifest>(&raw)
            .map_err(|err| format!("{}: {err}", manifest_path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::key::{KeyCode, KeyEvent};

    #[derive(Default)]
    struct Recorder {
        lines: Vec<String>,
    }

    impl Console for Recorder {
        fn log(&mut self, line: &str) {
            self.lines.push(line.to_string());
        }
    }

    fn settings(root: &Path) -> HostSettings {
        HostSettings {
            root_dir: root.display().to_string(),
            root_readable: true,
            magic_number: 42,
            opener: "true".to_string(),
        }
    }

    fn write_manifest(dir: &Path, entry: &str, permissions: &str) {
        fs::write(
            dir.join(MANIFEST_FILE),
            format!(
                "name = \"hello\"\nversion = \"0.1.0\"\nentry = \"{entry}\"\npermissions = {permissions}\n"
            ),
        )
        .expect("write manifest");
    }

    /// A WAT module with `fd_write` imported and a `$write(ptr, len)` helper
    /// that prints to stdout. Scratch memory below 16 is used for the iovec.
    fn wat_module(body: &str) -> String {
        format!(
            r#"(module
  (import "wasi_snapshot_preview1" "fd_write" (func $fd_write (param i32 i32 i32 i32) (result i32)))
  {body}
  (func $write (param $ptr i32) (param $len i32)
    (i32.store (i32.const 0) (local.get $ptr))
    (i32.store (i32.const 4) (local.get $len))
    (drop (call $fd_write (i32.const 1) (i32.const 0) (i32.const 1) (i32.const 8)))))"#
        )
    }

    fn module_dir(permissions: &str, body: &str) -> (tempfile::TempDir, ModuleRuntime) {
        let tmp = tempfile::tempdir().expect("tempdir");
        write_manifest(tmp.path(), "hello.wat", permissions);
        fs::write(tmp.path().join("hello.wat"), wat_module(body)).expect("write wat");
        let runtime = ModuleRuntime::discover(ModuleId::new("x"), tmp.path().to_path_buf());
        (tmp, runtime)
    }

    const GREETER: &str = r#"
  (import "mosaic" "magic_number" (func $magic (result i32)))
  (memory (export "memory") 1)
  (data (i32.const 16) "Hello from WAT!\n")
  (data (i32.const 64) "The magic was: ??\n")
  (func (export "_start")
    (local $n i32)
    (call $write (i32.const 16) (i32.const 16))
    (local.set $n (call $magic))
    (i32.store8 (i32.const 79) (i32.add (i32.const 48) (i32.div_u (local.get $n) (i32.const 10))))
    (i32.store8 (i32.const 80) (i32.add (i32.const 48) (i32.rem_u (local.get $n) (i32.const 10))))
    (call $write (i32.const 64) (i32.const 18)))"#;

    #[test]
    fn discover_without_manifest_is_error() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let runtime = ModuleRuntime::discover(ModuleId::new("x"), tmp.path().to_path_buf());

        assert!(runtime.manifest.is_none());
        assert!(matches!(runtime.status(), ModuleStatus::Error(msg) if msg.contains("module.toml")));
        assert_eq!(runtime.display_name(), "x");
    }

    #[test]
    fn run_without_manifest_fails() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let mut runtime = ModuleRuntime::discover(ModuleId::new("x"), tmp.path().to_path_buf());

        let err = runtime
            .run(&settings(tmp.path()), &mut Recorder::default())
            .expect_err("no manifest");
        assert!(matches!(err, RuntimeError::MissingManifest));
    }

    #[test]
    fn run_with_missing_entry_marks_error() {
        let tmp = tempfile::tempdir().expect("tempdir");
        write_manifest(tmp.path(), "hello.wasm", "[\"console\"]");
        let mut runtime = ModuleRuntime::discover(ModuleId::new("x"), tmp.path().to_path_buf());
        assert_eq!(runtime.status(), &ModuleStatus::Discovered);
        assert_eq!(runtime.display_name(), "hello");

        let err = runtime
            .run(&settings(tmp.path()), &mut Recorder::default())
            .expect_err("no wasm");
        assert!(matches!(err, RuntimeError::MissingEntry(ref path) if path.ends_with("hello.wasm")));
        assert!(matches!(runtime.status(), ModuleStatus::Error(msg) if msg.contains("hello.wasm")));
    }

    #[test]
    fn invalid_wasm_is_a_load_error() {
        let tmp = tempfile::tempdir().expect("tempdir");
        write_manifest(tmp.path(), "hello.wasm", "[\"console\", \"magic_number\"]");
        fs::write(tmp.path().join("hello.wasm"), b"not wasm").expect("write wasm");
        let mut runtime = ModuleRuntime::discover(ModuleId::new("x"), tmp.path().to_path_buf());

        let err = runtime
            .run(&settings(tmp.path()), &mut Recorder::default())
            .expect_err("bad module");
        assert!(matches!(err, RuntimeError::Load(_)));
    }

    #[test]
    fn forwards_guest_stdout_in_order() {
        let (tmp, mut runtime) = module_dir("[\"console\", \"magic_number\"]", GREETER);
        let mut console = Recorder::default();

        runtime.run(&settings(tmp.path()), &mut console).expect("module runs");

        assert_eq!(console.lines, vec!["Hello from WAT!", "The magic was: 42"]);
        assert_eq!(runtime.status(), &ModuleStatus::Finished);
    }

    #[test]
    fn stdout_is_dropped_without_console_grant() {
        let (tmp, mut runtime) = module_dir("[\"magic_number\"]", GREETER);
        let mut console = Recorder::default();

        runtime.run(&settings(tmp.path()), &mut console).expect("module runs");
        assert!(console.lines.is_empty());
    }

    #[test]
    fn missing_magic_number_grant_fails_to_load() {
        let (tmp, mut runtime) = module_dir("[\"console\"]", GREETER);
        let mut console = Recorder::default();

        let err = runtime
            .run(&settings(tmp.path()), &mut console)
            .expect_err("unresolved import");
        assert!(matches!(err, RuntimeError::Load(ref msg) if msg.contains("magic_number")));
        assert!(console.lines.is_empty());
        assert!(matches!(runtime.status(), ModuleStatus::Error(_)));
    }

    const CREATE_IN_ROOT: &str = r#"
  (import "wasi_snapshot_preview1" "path_open"
    (func $path_open (param i32 i32 i32 i32 i32 i64 i64 i32 i32) (result i32)))
  (memory (export "memory") 1)
  (data (i32.const 64) "created\n")
  (data (i32.const 80) "denied\n")
  (data (i32.const 96) "new.txt")
  (func (export "_start")
    (if (i32.eqz (call $path_open (i32.const 3) (i32.const 0) (i32.const 96) (i32.const 7)
                   (i32.const 1) (i64.const 64) (i64.const 0) (i32.const 0) (i32.const 32)))
      (then (call $write (i32.const 64) (i32.const 8)))
      (else (call $write (i32.const 80) (i32.const 7)))))"#;

    #[test]
    fn root_is_preopened_read_only() {
        let root = tempfile::tempdir().expect("tempdir");
        let (_module, mut runtime) = module_dir("[\"console\", \"read_dir\"]", CREATE_IN_ROOT);
        let mut console = Recorder::default();

        runtime.run(&settings(root.path()), &mut console).expect("module runs");

        assert_eq!(console.lines, vec!["denied"]);
        assert!(!root.path().join("new.txt").exists());
    }

    const ROOT_PRESTAT: &str = r#"
  (import "wasi_snapshot_preview1" "fd_prestat_get" (func $prestat (param i32 i32) (result i32)))
  (memory (export "memory") 1)
  (data (i32.const 64) "present\n")
  (data (i32.const 80) "absent\n")
  (func (export "_start")
    (if (i32.eqz (call $prestat (i32.const 3) (i32.const 32)))
      (then (call $write (i32.const 64) (i32.const 8)))
      (else (call $write (i32.const 80) (i32.const 7)))))"#;

    #[test]
    fn readable_root_is_visible() {
        let root = tempfile::tempdir().expect("tempdir");
        let (_module, mut runtime) = module_dir("[\"console\", \"read_dir\"]", ROOT_PRESTAT);
        let mut console = Recorder::default();

        runtime.run(&settings(root.path()), &mut console).expect("module runs");
        assert_eq!(console.lines, vec!["present"]);
    }

    #[test]
    fn missing_root_is_absent_not_a_load_error() {
        let root = tempfile::tempdir().expect("tempdir");
        let (_module, mut runtime) = module_dir("[\"console\", \"read_dir\"]", ROOT_PRESTAT);
        let mut console = Recorder::default();

        runtime
            .run(&settings(&root.path().join("gone")), &mut console)
            .expect("module still runs");
        assert_eq!(console.lines, vec!["absent"]);
        assert_eq!(runtime.status(), &ModuleStatus::Finished);
    }

    #[test]
    fn unreadable_root_is_absent() {
        let root = tempfile::tempdir().expect("tempdir");
        let (_module, mut runtime) = module_dir("[\"console\", \"read_dir\"]", ROOT_PRESTAT);
        let mut console = Recorder::default();
        let mut host = settings(root.path());
        host.root_readable = false;

        runtime.run(&host, &mut console).expect("module runs");
        assert_eq!(console.lines, vec!["absent"]);
    }

    const INTERACTIVE: &str = r#"
  (import "mosaic" "next_key" (func $next_key (param i32 i32) (result i32)))
  (memory (export "memory") 1)
  (data (i32.const 64) "ready\n")
  (data (i32.const 80) "frame\n")
  (func (export "_start")
    (call $write (i32.const 64) (i32.const 6)))
  (func (export "draw") (param $rows i32) (param $cols i32)
    (call $write (i32.const 80) (i32.const 6)))
  (func (export "handle_key")
    (local $len i32)
    (local.set $len (call $next_key (i32.const 256) (i32.const 512)))
    (if (i32.gt_s (local.get $len) (i32.const 0))
      (then
        (i32.store8 (i32.add (i32.const 256) (local.get $len)) (i32.const 10))
        (call $write (i32.const 256) (i32.add (local.get $len) (i32.const 1))))))"#;

    #[test]
    fn session_draws_and_delivers_keys() {
        let (tmp, mut runtime) = module_dir("[\"console\"]", INTERACTIVE);
        let mut session = runtime.session(&settings(tmp.path())).expect("session");

        assert_eq!(session.take_output(), vec!["ready"]);
        assert_eq!(session.draw(24, 80).expect("draw"), Some(vec!["frame".to_string()]));

        assert!(session.handle_key(KeyEvent::new(KeyCode::Char('a'))).expect("key"));
        assert_eq!(
            session.take_output(),
            vec![r#"{"code":{"Char":"a"},"modifiers":{"bits":0}}"#]
        );
        assert_eq!(runtime.status(), &ModuleStatus::Finished);
    }

    #[test]
    fn session_without_exports_is_a_no_op() {
        let (tmp, mut runtime) = module_dir("[\"console\", \"magic_number\"]", GREETER);
        let mut session = runtime.session(&settings(tmp.path())).expect("session");

        assert_eq!(session.draw(24, 80).expect("draw"), None);
        assert!(!session.handle_key(KeyEvent::new(KeyCode::Esc)).expect("key"));
    }

    const OPENER: &str = r#"
  (import "mosaic" "host_open_file" (func $open_file))
  (memory (export "memory") 1)
  (data (i32.const 64) "notes.txt\n")
  (data (i32.const 80) "after\n")
  (func (export "_start")
    (call $write (i32.const 64) (i32.const 10))
    (call $open_file)
    (call $write (i32.const 80) (i32.const 6)))"#;

    #[test]
    fn host_open_file_takes_the_printed_path() {
        let root = tempfile::tempdir().expect("tempdir");
        let (_module, mut runtime) = module_dir("[\"console\", \"open_file\"]", OPENER);
        let mut session = runtime.session(&settings(root.path())).expect("session");

        assert_eq!(session.take_output(), vec!["after"]);
        assert_eq!(session.take_open_requests(), vec![root.path().join("notes.txt")]);
        assert!(session.take_open_requests().is_empty());
    }

    #[test]
    fn host_open_file_needs_its_grant() {
        let root = tempfile::tempdir().expect("tempdir");
        let (_module, mut runtime) = module_dir("[\"console\"]", OPENER);

        let err = runtime
            .run(&settings(root.path()), &mut Recorder::default())
            .expect_err("unresolved import");
        assert!(matches!(err, RuntimeError::Load(_)));
    }
}
