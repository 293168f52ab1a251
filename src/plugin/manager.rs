use std::collections::HashSet;

use crate::guest::Console;
use crate::model::config::{HostConfig, HostSettings};
use crate::plugin::manifest::ModuleId;
use crate::plugin::runtime::{ModuleRuntime, ModuleStatus};

/// Configured wasm modules, kept in configuration order.
#[derive(Debug)]
pub struct ModuleManager {
    host: HostSettings,
    runtimes: Vec<ModuleRuntime>,
}

impl ModuleManager {
    pub fn new(config: &HostConfig) -> Self {
        let mut seen = HashSet::new();
        let mut runtimes = Vec::new();

        for module in &config.modules {
            if !module.enabled {
                continue;
            }

            let module_id = ModuleId::new(format!("path:{}", module.path.display()));
            if !seen.insert(module_id.clone()) {
                continue;
            }

            runtimes.push(ModuleRuntime::discover(module_id, module.path.clone()));
        }

        Self {
            host: config.host.clone(),
            runtimes,
        }
    }

    pub fn module_count(&self) -> usize {
        self.runtimes.len()
    }

    pub fn list_notifications(&self) -> Vec<String> {
        if self.runtimes.is_empty() {
            return vec!["modules: none configured".to_string()];
        }

        let mut rows: Vec<String> = self
            .runtimes
            .iter()
            .map(|runtime| {
                let status = match runtime.status() {
                    ModuleStatus::Discovered => "discovered".to_string(),
                    ModuleStatus::Finished => "finished".to_string(),
                    ModuleStatus::Error(err) => format!("error: {err}"),
                };

                let version = runtime
                    .manifest
                    .as_ref()
                    .map(|manifest| format!(" {}", manifest.version))
                    .unwrap_or_default();

                format!(
                    "module {}{version} [{status}] ({})",
                    runtime.display_name(),
                    runtime.root_dir.display()
                )
            })
            .collect();

        rows.sort();
        rows
    }

    /// Runs each discovered module once, forwarding its output to `console`.
    /// A failing module does not stop the ones after it.
    pub fn run_all(&mut self, console: &mut dyn Console) -> Vec<String> {
        let host = &self.host;

        self.runtimes
            .iter_mut()
            .map(|runtime| {
                if let ModuleStatus::Error(err) = runtime.status() {
                    return format!("module {}: skipped ({err})", runtime.display_name());
                }

                match runtime.run(host, &mut *console) {
                    Ok(()) => format!("module {}: finished", runtime.display_name()),
                    Err(err) => {
                        tracing::warn!(module = %runtime.display_name(), "module failed: {err}");
                        format!("module {}: {err}", runtime.display_name())
                    }
                }
            })
            .collect()
    }
}
