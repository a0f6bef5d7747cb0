//! `pbuf vendor` handler.

use anyhow::{Context, Result};
use colored::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::auth::Netrc;
use crate::config::{self, Config};
use crate::fetch::{RegistryFetcher, RepositoryFetcher};
use crate::vendor::{EngineOptions, ModuleStatus, RunReport, VendorEngine, default_jobs};

#[derive(Debug, Clone)]
pub struct VendorArgs {
    pub config: PathBuf,
    pub jobs: Option<usize>,
    pub keep_going: bool,
    pub go_module: Option<String>,
    pub json: bool,
}

/// Vendor every module of the manifest. `Ok(false)` means at least one
/// module failed.
pub fn run_vendor(args: &VendorArgs) -> Result<bool> {
    let config = Config::load(&args.config)?;
    let root = manifest_dir(&args.config);

    let go_module = match &args.go_module {
        Some(module) => Some(module.clone()),
        None => config::go_module_from_file(&root.join("go.mod"))?,
    };

    let netrc = Arc::new(Netrc::load_default()?);
    let mut repository = RepositoryFetcher::new(netrc.clone());
    if args.json {
        repository = repository.quiet();
    }

    let options = EngineOptions {
        jobs: args.jobs.unwrap_or_else(default_jobs),
        keep_going: args.keep_going,
        go_module,
        root,
        progress: !args.json,
    };
    let mut engine = VendorEngine::new(repository, options)?;
    if let Some(registry) = config.registry.as_ref().filter(|_| config.has_registry()) {
        let fetcher = RegistryFetcher::connect(registry, netrc.as_ref())
            .context("Failed to set up registry client")?;
        engine = engine.with_registry(fetcher);
    }

    if config.modules.is_empty() {
        if !args.json {
            println!("{} No modules declared in {}", "!".yellow(), args.config.display());
        }
        return Ok(true);
    }

    if !args.json {
        println!(
            "{} Vendoring {} module(s) with {} worker(s)...",
            "📦".blue(),
            config.modules.len(),
            engine.options().jobs
        );
    }

    let report = engine.run(&config.modules)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_summary(&report);
    }
    Ok(report.is_success())
}

fn manifest_dir(config: &Path) -> PathBuf {
    match config.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

fn print_summary(report: &RunReport) {
    for module in &report.modules {
        match module.status {
            ModuleStatus::Vendored => {
                println!(
                    "{} {} ({} file(s))",
                    "✓".green(),
                    module.module,
                    module.files_written
                );
                for warning in &module.warnings {
                    println!(
                        "  {} {} written unpatched: {}",
                        "!".yellow(),
                        warning.path,
                        warning.message
                    );
                }
            }
            ModuleStatus::Failed => {
                println!(
                    "{} {}: {}",
                    "x".red(),
                    module.module,
                    module.error.as_deref().unwrap_or("unknown error")
                );
            }
            ModuleStatus::Skipped => {
                println!("{} {} skipped", "-".dimmed(), module.module);
            }
        }
    }

    println!("{}", "-".repeat(40).dimmed());
    if report.is_success() {
        println!(
            "{} Vendored {} file(s)",
            "✓".green(),
            report.files_written().to_string().bold()
        );
    } else {
        println!(
            "{} {} module(s) failed, {} file(s) written",
            "x".red(),
            report.failed().count(),
            report.files_written()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manifest_dir() {
        assert_eq!(manifest_dir(Path::new("pbuf.yaml")), PathBuf::from("."));
        assert_eq!(
            manifest_dir(Path::new("proj/pbuf.yaml")),
            PathBuf::from("proj")
        );
    }

    #[test]
    fn test_empty_manifest_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pbuf.yaml");
        std::fs::write(&path, "version: v1\nname: acme/api\n").unwrap();

        let args = VendorArgs {
            config: path,
            jobs: Some(1),
            keep_going: false,
            go_module: None,
            json: true,
        };
        assert!(run_vendor(&args).unwrap());
    }

    #[test]
    fn test_missing_manifest_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let args = VendorArgs {
            config: dir.path().join("pbuf.yaml"),
            jobs: None,
            keep_going: false,
            go_module: None,
            json: true,
        };
        let err = run_vendor(&args).unwrap_err();
        assert!(err.to_string().contains("pbuf init"));
    }
}
