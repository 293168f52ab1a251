use std::path::{Path, PathBuf};

use wasmtime::{Engine, Instance, Linker, Module, Store};
use wasmtime_wasi::pipe::MemoryOutputPipe;
use wasmtime_wasi::{DirPerms, FilePerms, I32Exit, WasiCtxBuilder};

use crate::guest::entry::LISTING_ROOT;
use crate::model::config::HostSettings;
use crate::plugin::host_fns::{HostFunctions, HostState};
use crate::plugin::key::KeyEvent;
use crate::plugin::manifest::ModuleManifest;
use crate::plugin::permission::Permission;
use crate::plugin::runtime::RuntimeError;

const START_EXPORT: &str = "_start";
const DRAW_EXPORT: &str = "draw";
const HANDLE_KEY_EXPORT: &str = "handle_key";

/// Upper bound on guest stdout kept for one instance.
const STDOUT_CAPACITY: usize = 64 * 1024 * 1024;

/// The root is only ever preopened read-only.
pub const ROOT_DIR_PERMS: DirPerms = DirPerms::READ;
pub const ROOT_FILE_PERMS: FilePerms = FilePerms::READ;

/// Host directory to preopen as `/`, if the module may see one at all.
///
/// A root that is unreadable, missing or not a directory is left unmapped so
/// the guest takes its absence branch instead of failing to load.
pub fn root_grant(manifest: &ModuleManifest, host: &HostSettings) -> Option<PathBuf> {
    if !manifest.grants(Permission::ReadDir) {
        return None;
    }

    let root = host.root_path();
    if !host.root_readable || !root.is_dir() {
        tracing::debug!(root = %root.display(), "root not preopened");
        return None;
    }

    Some(root)
}

/// One instantiated module and the host state behind its imports.
pub struct ModuleSession {
    store: Store<HostState>,
    instance: Instance,
}

impl ModuleSession {
    pub fn instantiate(
        wasm_path: &Path,
        manifest: &ModuleManifest,
        host: &HostSettings,
    ) -> Result<Self, RuntimeError> {
        let engine = Engine::default();
        let module = Module::from_file(&engine, wasm_path).map_err(RuntimeError::load)?;

        let mut builder = WasiCtxBuilder::new();
        let stdout = manifest
            .grants(Permission::Console)
            .then(|| MemoryOutputPipe::new(STDOUT_CAPACITY));
        if let Some(pipe) = &stdout {
            builder.stdout(pipe.clone());
        }
        if let Some(root) = root_grant(manifest, host) {
            builder
                .preopened_dir(&root, LISTING_ROOT, ROOT_DIR_PERMS, ROOT_FILE_PERMS)
                .map_err(RuntimeError::load)?;
        }

        let state = HostState::new(builder.build_p1(), stdout, host.sandbox());
        let mut store = Store::new(&engine, state);

        let mut linker = Linker::new(&engine);
        HostFunctions::add_wasi(&mut linker).map_err(RuntimeError::load)?;
        if manifest.grants(Permission::MagicNumber) {
            HostFunctions::magic_number(&mut linker, host.magic_number)
                .map_err(RuntimeError::load)?;
        }
        if manifest.grants(Permission::Console) {
            HostFunctions::next_key(&mut linker).map_err(RuntimeError::load)?;
        }
        if manifest.grants(Permission::OpenFile) {
            HostFunctions::host_open_file(&mut linker).map_err(RuntimeError::load)?;
        }

        let instance = linker
            .instantiate(&mut store, &module)
            .map_err(RuntimeError::load)?;

        Ok(Self { store, instance })
    }

    /// Calls `_start`. The caller makes sure this happens once.
    pub fn start(&mut self) -> Result<(), RuntimeError> {
        let start = self
            .instance
            .get_typed_func::<(), ()>(&mut self.store, START_EXPORT)
            .map_err(RuntimeError::load)?;
        finish(start.call(&mut self.store, ()))
    }

    /// Calls `draw(rows, cols)` and returns the frame it printed, or `None`
    /// when the module has no `draw` export.
    pub fn draw(&mut self, rows: u16, cols: u16) -> Result<Option<Vec<String>>, RuntimeError> {
        let Some(draw) = self.instance.get_func(&mut self.store, DRAW_EXPORT) else {
            return Ok(None);
        };
        let draw = draw
            .typed::<(i32, i32), ()>(&self.store)
            .map_err(RuntimeError::load)?;

        finish(draw.call(&mut self.store, (i32::from(rows), i32::from(cols))))?;
        Ok(Some(self.take_output()))
    }

    /// Queues `key` for `mosaic.next_key` and calls `handle_key`. Returns
    /// false when the module has no `handle_key` export.
    pub fn handle_key(&mut self, key: KeyEvent) -> Result<bool, RuntimeError> {
        let Some(handle) = self.instance.get_func(&mut self.store, HANDLE_KEY_EXPORT) else {
            return Ok(false);
        };
        let handle = handle
            .typed::<(), ()>(&self.store)
            .map_err(RuntimeError::load)?;

        self.store.data_mut().push_key(key);
        finish(handle.call(&mut self.store, ()))?;
        Ok(true)
    }

    /// Lines the guest printed since the last call.
    pub fn take_output(&mut self) -> Vec<String> {
        self.store
            .data_mut()
            .take_output()
            .lines()
            .map(str::to_string)
            .collect()
    }

    pub fn take_open_requests(&mut self) -> Vec<PathBuf> {
        self.store.data_mut().take_open_requests()
    }
}

/// `proc_exit(0)` is a normal return; any other exit or trap is an error.
fn finish(result: wasmtime::Result<()>) -> Result<(), RuntimeError> {
    match result {
        Ok(()) => Ok(()),
        Err(err) => match err.downcast_ref::<I32Exit>() {
            Some(I32Exit(0)) => Ok(()),
            Some(I32Exit(code)) => Err(RuntimeError::Exit(*code)),
            None => Err(RuntimeError::Trap(format!("{err:#}"))),
        },
    }
}
