use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub const CONFIG_FILENAME: &str = "pbuf.yaml";

/// Port the registry listens on when the configured address has none.
pub const DEFAULT_REGISTRY_PORT: u16 = 6777;

#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq)]
pub struct Config {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registry: Option<RegistryConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub export: Option<ExportConfig>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub modules: Vec<ModuleSpec>,
}

#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq)]
pub struct RegistryConfig {
    #[serde(default)]
    pub addr: String,
    #[serde(default, skip_serializing_if = "is_false")]
    pub insecure: bool,
}

#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq)]
pub struct ExportConfig {
    #[serde(default)]
    pub paths: Vec<String>,
}

/// One vendoring target as declared under `modules:`.
///
/// Every field is optional in YAML; an empty string means "not set".
#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq, Eq)]
pub struct ModuleSpec {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub repository: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub path: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub branch: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub tag: String,
    #[serde(rename = "out", default, skip_serializing_if = "String::is_empty")]
    pub output_folder: String,
    #[serde(rename = "gen_out", default, skip_serializing_if = "String::is_empty")]
    pub generate_output_folder: String,
}

impl ModuleSpec {
    /// Human readable identifier used in logs and reports.
    pub fn label(&self) -> String {
        let source = if !self.repository.is_empty() {
            self.repository.as_str()
        } else if !self.name.is_empty() {
            self.name.as_str()
        } else {
            "<unnamed>"
        };

        if self.path.is_empty() {
            source.to_string()
        } else {
            format!("{} ({})", source, self.path)
        }
    }
}

impl Config {
    pub fn parse(contents: &str) -> Result<Self> {
        serde_yaml::from_str(contents).context("Failed to parse pbuf.yaml - check YAML syntax")
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(anyhow::anyhow!(
                "{} not found.\n\n\
                Tip: Run 'pbuf init <module-name>' to create one.",
                path.display()
            ));
        }
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::parse(&contents)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = serde_yaml::to_string(self).context("Failed to serialize config")?;
        fs::write(path, contents).with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }

    pub fn has_registry(&self) -> bool {
        self.registry
            .as_ref()
            .is_some_and(|registry| !registry.addr.is_empty())
    }
}

/// Read the `module` directive of a `go.mod` file.
pub fn go_module_from_file(path: &Path) -> Result<Option<String>> {
    if !path.exists() {
        return Ok(None);
    }
    let contents =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(parse_go_module(&contents))
}

pub fn parse_go_module(contents: &str) -> Option<String> {
    contents.lines().find_map(|line| {
        let line = line.split("//").next().unwrap_or_default().trim();
        let rest = line.strip_prefix("module")?;
        if !rest.starts_with(char::is_whitespace) {
            return None;
        }
        let module = rest.trim().trim_matches('"');
        (!module.is_empty()).then(|| module.to_string())
    })
}

fn is_false(value: &bool) -> bool {
    !*value
}
