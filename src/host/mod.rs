pub mod console;
pub mod error;
pub mod numeric;
pub mod sandbox;

pub use console::StdoutConsole;
pub use error::HostError;
pub use numeric::FixedMagic;
pub use sandbox::{Preopen, SandboxFs};
