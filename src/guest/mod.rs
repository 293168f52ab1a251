pub mod capability;
pub mod entry;
pub mod listing;
#[cfg(target_arch = "wasm32")]
pub mod wasi;

pub use capability::{Console, DirectoryReader, MagicNumber};
pub use entry::GuestEntry;
pub use listing::Listing;
