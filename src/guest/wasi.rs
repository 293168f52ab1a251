//! Bindings used when this crate is itself compiled as a WASI guest.

use std::fs;

use super::capability::{Console, DirectoryReader, MagicNumber};
use super::listing::Listing;

#[link(wasm_import_module = "mosaic")]
unsafe extern "C" {
    fn magic_number() -> i32;
}

/// WASI stdout.
pub struct WasiConsole;

impl Console for WasiConsole {
    fn log(&mut self, line: &str) {
        println!("{line}");
    }
}

/// The `mosaic.magic_number` import, resolved by the host at load time.
pub struct HostMagic;

impl MagicNumber for HostMagic {
    fn magic_number(&mut self) -> i32 {
        // SAFETY: no arguments, returns a plain i32; an unresolved import fails
        // instantiation before we ever get here.
        unsafe { magic_number() }
    }
}

/// Preopened directories, enumerated through `fd_readdir`. Names come back
/// sorted, matching the native host.
pub struct WasiFs;

impl DirectoryReader for WasiFs {
    fn read_dir(&mut self, path: &str) -> Listing {
        let Ok(dir) = fs::read_dir(path) else {
            return Listing::Absent;
        };

        let names = dir
            .map(|entry| entry.map(|e| e.file_name().to_string_lossy().into_owned()))
            .collect::<Result<Vec<_>, _>>();

        names.map_or(Listing::Absent, Listing::sorted)
    }
}
