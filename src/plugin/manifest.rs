use serde::Deserialize;

use crate::plugin::permission::Permission;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModuleId(pub String);

impl ModuleId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }
}

/// `module.toml` at the root of a module directory.
#[derive(Debug, Clone, Deserialize)]
pub struct ModuleManifest {
    pub name: String,
    pub version: String,
    /// Wasm file, relative to the module directory.
    pub entry: String,
    #[serde(default)]
    pub permissions: Vec<Permission>,
}

impl ModuleManifest {
    pub fn grants(&self, permission: Permission) -> bool {
        self.permissions.contains(&permission)
    }
}
