use std::collections::VecDeque;
use std::path::PathBuf;

use wasmtime::{Caller, Extern, Linker};
use wasmtime_wasi::pipe::MemoryOutputPipe;
use wasmtime_wasi::preview1::{self, WasiP1Ctx};

use crate::guest::entry::{IMPORT_FUNCTION, IMPORT_MODULE};
use crate::host::SandboxFs;
use crate::plugin::key::KeyEvent;

/// `next_key` result when no key is queued.
pub const NO_KEY: i32 = -1;
/// `next_key` result when the guest buffer cannot hold the event.
pub const KEY_TOO_LARGE: i32 = -2;

/// Per-instance host state behind every import.
pub struct HostState {
    wasi: WasiP1Ctx,
    stdout: Option<MemoryOutputPipe>,
    consumed: usize,
    keys: VecDeque<KeyEvent>,
    sandbox: SandboxFs,
    open_requests: Vec<PathBuf>,
}

impl HostState {
    pub fn new(wasi: WasiP1Ctx, stdout: Option<MemoryOutputPipe>, sandbox: SandboxFs) -> Self {
        Self {
            wasi,
            stdout,
            consumed: 0,
            keys: VecDeque::new(),
            sandbox,
            open_requests: Vec::new(),
        }
    }

    /// Guest stdout written since the last call.
    pub fn take_output(&mut self) -> String {
        let Some(pipe) = self.stdout.as_ref() else {
            return String::new();
        };

        let contents = pipe.contents();
        let fresh = contents.get(self.consumed..).unwrap_or_default();
        self.consumed = contents.len();
        String::from_utf8_lossy(fresh).into_owned()
    }

    pub fn push_key(&mut self, key: KeyEvent) {
        self.keys.push_back(key);
    }

    pub fn take_open_requests(&mut self) -> Vec<PathBuf> {
        std::mem::take(&mut self.open_requests)
    }

    /// The guest prints a path, then calls `host_open_file`. The first pending
    /// line is the path; the rest of the pending output is dropped.
    fn request_open(&mut self) {
        let pending = self.take_output();
        let Some(line) = pending.lines().next().map(str::trim) else {
            tracing::warn!("host_open_file called without a path");
            return;
        };

        match self.sandbox.resolve(line) {
            Ok((_, path)) => {
                tracing::info!(path = %path.display(), "guest asked to open file");
                self.open_requests.push(path);
            }
            Err(err) => tracing::warn!("host_open_file rejected {line:?}: {err}"),
        }
    }
}

/// Host functions exported to wasm modules.
#[derive(Debug, Default)]
pub struct HostFunctions;

impl HostFunctions {
    pub fn add_wasi(linker: &mut Linker<HostState>) -> wasmtime::Result<()> {
        preview1::add_to_linker_sync(linker, |state: &mut HostState| &mut state.wasi)
    }

    /// `mosaic.magic_number: () -> i32`, always answering `value`.
    pub fn magic_number(linker: &mut Linker<HostState>, value: i32) -> wasmtime::Result<()> {
        linker.func_wrap(IMPORT_MODULE, IMPORT_FUNCTION, move || -> i32 {
            tracing::trace!(value, "magic_number called");
            value
        })?;
        Ok(())
    }

    /// `mosaic.next_key: (ptr, len) -> i32`. Writes the oldest queued key as
    /// JSON at `ptr` and returns its length, or [`NO_KEY`] / [`KEY_TOO_LARGE`].
    pub fn next_key(linker: &mut Linker<HostState>) -> wasmtime::Result<()> {
        linker.func_wrap(
            IMPORT_MODULE,
            "next_key",
            |mut caller: Caller<'_, HostState>, ptr: i32, len: i32| -> wasmtime::Result<i32> {
                let Some(key) = caller.data().keys.front().copied() else {
                    return Ok(NO_KEY);
                };

                let json = key.to_json()?;
                if json.len() > usize::try_from(len).unwrap_or(0) {
                    return Ok(KEY_TOO_LARGE);
                }

                let memory = caller
                    .get_export("memory")
                    .and_then(Extern::into_memory)
                    .ok_or_else(|| wasmtime::Error::msg("module exports no memory"))?;
                let offset = usize::try_from(ptr)?;
                memory.write(&mut caller, offset, &json)?;

                caller.data_mut().keys.pop_front();
                Ok(i32::try_from(json.len())?)
            },
        )?;
        Ok(())
    }

    /// `mosaic.host_open_file: () -> ()`.
    pub fn host_open_file(linker: &mut Linker<HostState>) -> wasmtime::Result<()> {
        linker.func_wrap(
            IMPORT_MODULE,
            "host_open_file",
            |mut caller: Caller<'_, HostState>| caller.data_mut().request_open(),
        )?;
        Ok(())
    }
}
