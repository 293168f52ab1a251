use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::host::{FixedMagic, Preopen, SandboxFs};

#[derive(Debug, Deserialize)]
pub struct HostConfig {
    pub host: HostSettings,
    pub log: LogConfig,
    #[serde(default)]
    pub modules: Vec<ModuleConfig>,
}

/// Capabilities the host hands to every guest it runs.
#[derive(Debug, Clone, Deserialize)]
pub struct HostSettings {
    pub root_dir: String,
    #[serde(default = "default_true")]
    pub root_readable: bool,
    pub magic_number: i32,
    /// Command that opens files a module asks for with `host_open_file`.
    #[serde(default = "default_opener")]
    pub opener: String,
}

#[derive(Debug, Deserialize)]
pub struct LogConfig {
    pub filter: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModuleConfig {
    pub path: PathBuf,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl HostConfig {
    /// Load configuration with layering: defaults → user config.
    pub fn load() -> Result<Self> {
        let user_path = directories::ProjectDirs::from("", "", "mosaic")
            .map(|dirs| dirs.config_dir().join("config.toml"))
            .filter(|path| path.exists());

        match user_path {
            Some(path) => Self::load_from(&path),
            None => Self::defaults()?.expanded(),
        }
    }

    /// Load an explicit config file instead of the user one.
    pub fn load_from(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("read config {}", path.display()))?;
        Self::parse(&raw).with_context(|| format!("parse config {}", path.display()))
    }

    pub fn parse(raw: &str) -> Result<Self> {
        let config: HostConfig = toml::from_str(raw)?;
        config.expanded()
    }

    fn defaults() -> Result<Self> {
        let defaults = include_str!("../../config/default.toml");
        Ok(toml::from_str(defaults)?)
    }

    fn expanded(mut self) -> Result<Self> {
        if self.host.root_dir.starts_with('~') {
            let home = dirs_home().ok_or_else(|| anyhow!("cannot determine home directory"))?;
            self.host.root_dir = self
                .host
                .root_dir
                .replacen('~', &home.to_string_lossy(), 1);
        }

        for module in &mut self.modules {
            module.path = expand_tilde(&module.path);
        }

        Ok(self)
    }
}

impl HostSettings {
    pub fn root_path(&self) -> PathBuf {
        PathBuf::from(&self.root_dir)
    }

    pub fn root_preopen(&self) -> Preopen {
        Preopen::new("/", self.root_path()).readable(self.root_readable)
    }

    pub fn sandbox(&self) -> SandboxFs {
        SandboxFs::new(vec![self.root_preopen()])
    }

    pub fn magic(&self) -> FixedMagic {
        FixedMagic(self.magic_number)
    }
}

fn default_true() -> bool {
    true
}

fn default_opener() -> String {
    "xdg-open".to_string()
}

fn dirs_home() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.home_dir().to_path_buf())
}

fn expand_tilde(path: &Path) -> PathBuf {
    let text = path.to_string_lossy();
    if !text.starts_with('~') {
        return path.to_path_buf();
    }

    match dirs_home() {
        Some(home) => PathBuf::from(text.replacen('~', &home.to_string_lossy(), 1)),
        None => path.to_path_buf(),
    }
}
