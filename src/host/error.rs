use std::io;
use std::path::PathBuf;

/// Why the sandbox refused a directory request. Never shown to the guest,
/// which only ever sees absence.
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    #[error("path {0} is not preopened")]
    Unmapped(String),
    #[error("path {0} escapes its preopen")]
    Escapes(String),
    #[error("preopen {0} is not readable")]
    NotReadable(String),
    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Walk(#[from] ignore::Error),
}
