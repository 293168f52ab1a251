pub mod host_fns;
pub mod key;
pub mod manager;
pub mod manifest;
pub mod permission;
pub mod runtime;
pub mod session;

pub use manager::ModuleManager;
