//! # pbuf CLI Entry Point
//!
//! Parses CLI arguments using clap and routes commands to the handlers in
//! [`pbuf::commands`].
//!
//! - `vendor` - fetch every module declared in `pbuf.yaml`
//! - `init` - create a `pbuf.yaml`
//! - `completion` - print shell completions

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{Shell, generate};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use pbuf::commands;
use pbuf::config::CONFIG_FILENAME;

#[derive(Parser)]
#[command(name = "pbuf")]
#[command(about = "Vendor protobuf schemas from git repositories and the pbuf registry", version = env!("CARGO_PKG_VERSION"))]
#[command(long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Show debug logs
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch every module declared in the manifest
    Vendor {
        /// Path to the manifest
        #[arg(long, default_value = CONFIG_FILENAME)]
        config: PathBuf,
        /// Number of files written in parallel [default: available cores]
        #[arg(short, long)]
        jobs: Option<usize>,
        /// Continue with the next module when one fails
        #[arg(long)]
        keep_going: bool,
        /// Go module path used for go_package rewriting [default: from go.mod]
        #[arg(long)]
        go_module: Option<String>,
        /// Print the run report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Create a pbuf.yaml in the current directory
    Init {
        /// Name of this module in the registry
        name: String,
        /// Registry address
        #[arg(long, default_value = commands::init::DEFAULT_REGISTRY)]
        registry: String,
        /// Registry module to depend on (repeatable)
        #[arg(long = "module")]
        modules: Vec<String>,
        /// Path exported by this module (repeatable)
        #[arg(long = "export")]
        exports: Vec<String>,
    },
    /// Generate shell completions
    Completion {
        /// The shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("pbuf={}", default_level)));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match &cli.command {
        Commands::Vendor {
            config,
            jobs,
            keep_going,
            go_module,
            json,
        } => {
            let args = commands::vendor::VendorArgs {
                config: config.clone(),
                jobs: *jobs,
                keep_going: *keep_going,
                go_module: go_module.clone(),
                json: *json,
            };
            match commands::vendor::run_vendor(&args) {
                Ok(true) => Ok(()),
                Ok(false) => std::process::exit(1),
                Err(e) => Err(e),
            }
        }
        Commands::Init {
            name,
            registry,
            modules,
            exports,
        } => {
            let cwd = std::env::current_dir()?;
            commands::init::init_manifest(&cwd, name, registry, modules, exports)
        }
        Commands::Completion { shell } => {
            let mut cmd = Cli::command();
            let bin_name = cmd.get_name().to_string();
            generate(*shell, &mut cmd, bin_name, &mut std::io::stdout());
            Ok(())
        }
    }
}
