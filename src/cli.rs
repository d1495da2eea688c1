//! Contract CLI for application binaries
//!
//! An application hands its registration function to [`run`] and gets three
//! subcommands:
//!
//! Usage:
//!   my-app generate [--output js/api/types.ts]
//!   my-app check [--output js/api/types.ts]
//!   my-app routes

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use similar::TextDiff;
use tracing_subscriber::EnvFilter;

use crate::codegen::emit::{ArtifactEmitter, WriteOutcome};
use crate::codegen::generate;
use crate::config::ContractConfig;
use crate::registry::{RegistryBuilder, RouteRegistry};

#[derive(Parser, Debug)]
#[command(about = "Generate and check the typed API contract")]
pub struct Cli {
    /// Config file (default: contract.toml lookup)
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Write the TypeScript contract if it changed
    Generate {
        /// Output path (default: artifact.path from config)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Fail when the contract on disk is stale
    Check {
        /// Path to compare against (default: artifact.path from config)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Print the endpoint -> URL map as JSON
    Routes,
}

/// Install the fmt subscriber, preferring `RUST_LOG` over `default_filter`
pub fn init_tracing(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    // A subscriber may already be installed by the host application
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// Parse arguments and run against the routes `register` adds
pub fn run<F>(register: F) -> ExitCode
where
    F: FnOnce(&mut RegistryBuilder) -> crate::Result<()>,
{
    run_with(Cli::parse(), register)
}

pub fn run_with<F>(cli: Cli, register: F) -> ExitCode
where
    F: FnOnce(&mut RegistryBuilder) -> crate::Result<()>,
{
    let config = match ContractConfig::load_from(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Error: {}", e);
            return ExitCode::FAILURE;
        }
    };
    init_tracing(&config.logging.filter);

    match execute(cli.command, &config, register) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            eprintln!("❌ Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Returns `false` when `check` found a stale contract
pub fn execute<F>(command: Command, config: &ContractConfig, register: F) -> anyhow::Result<bool>
where
    F: FnOnce(&mut RegistryBuilder) -> crate::Result<()>,
{
    let mut builder = RouteRegistry::builder();
    register(&mut builder).context("Route registration failed")?;
    let registry = builder.build()?;

    match command {
        Command::Generate { output } => {
            let emitter = ArtifactEmitter::new(output.unwrap_or_else(|| config.artifact_path()));
            match emitter.emit(&registry)? {
                WriteOutcome::Written => println!("✅ Wrote {}", emitter.path().display()),
                WriteOutcome::Unchanged => println!("✅ {} is up to date", emitter.path().display()),
            }
            Ok(true)
        }

        Command::Check { output } => {
            let emitter = ArtifactEmitter::new(output.unwrap_or_else(|| config.artifact_path()));
            let generated = generate(&registry)?.render();

            if !emitter.is_stale(&generated)? {
                println!("✅ {} is up to date", emitter.path().display());
                return Ok(true);
            }

            let current = emitter.current()?.unwrap_or_default();
            let diff = TextDiff::from_lines(&current, &generated);
            print!("{}", diff.unified_diff().header("on disk", "generated"));
            eprintln!("❌ {} is stale, run `generate`", emitter.path().display());
            Ok(false)
        }

        Command::Routes => {
            let url_map = registry.url_map();
            println!("{}", serde_json::to_string_pretty(&url_map).context("Failed to encode URL map")?);
            Ok(true)
        }
    }
}
