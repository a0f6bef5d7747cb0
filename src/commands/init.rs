//! `pbuf init` handler.

use anyhow::{Result, bail};
use colored::*;
use std::path::Path;

use crate::config::{CONFIG_FILENAME, Config, ExportConfig, ModuleSpec, RegistryConfig};

pub const DEFAULT_REGISTRY: &str = "pbuf.cloud";
pub const DEFAULT_MODULE: &str = "pbufio/pbuf-registry";
pub const DEFAULT_EXPORT_PATHS: [&str; 2] = ["api", "proto"];

/// Manifest written by `pbuf init`. Empty `modules`/`exports` fall back to
/// the defaults.
pub fn initial_config(name: &str, registry: &str, modules: &[String], exports: &[String]) -> Config {
    let mut modules: Vec<ModuleSpec> = modules
        .iter()
        .filter(|m| !m.is_empty())
        .map(|m| ModuleSpec {
            name: m.clone(),
            ..ModuleSpec::default()
        })
        .collect();
    if modules.is_empty() {
        modules.push(ModuleSpec {
            name: DEFAULT_MODULE.to_string(),
            ..ModuleSpec::default()
        });
    }

    let mut paths: Vec<String> = exports.iter().filter(|p| !p.is_empty()).cloned().collect();
    if paths.is_empty() {
        paths = DEFAULT_EXPORT_PATHS.iter().map(|p| p.to_string()).collect();
    }

    Config {
        version: "v1".to_string(),
        name: name.to_string(),
        registry: Some(RegistryConfig {
            addr: registry.to_string(),
            insecure: false,
        }),
        export: Some(ExportConfig { paths }),
        modules,
    }
}

/// Write a fresh `pbuf.yaml` into `dir`. Never overwrites.
pub fn init_manifest(
    dir: &Path,
    name: &str,
    registry: &str,
    modules: &[String],
    exports: &[String],
) -> Result<()> {
    let path = dir.join(CONFIG_FILENAME);
    if path.exists() {
        bail!("{} already exists", path.display());
    }

    initial_config(name, registry, modules, exports).save(&path)?;
    println!(
        "{} Created {} for {}",
        "✓".green(),
        CONFIG_FILENAME.bold(),
        name.cyan()
    );
    Ok(())
}
