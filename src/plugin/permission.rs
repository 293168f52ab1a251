use serde::Deserialize;

/// Host capabilities a module may request in its manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    /// Guest stdout reaches the host console; key events via `mosaic.next_key`.
    Console,
    /// The `mosaic.magic_number` import.
    MagicNumber,
    /// The configured root directory preopened read-only as `/`.
    ReadDir,
    /// The `mosaic.host_open_file` import.
    OpenFile,
}
