//! Soso command-line tool
//!
//! Installs, updates and publishes packages from a private git-backed
//! registry, falling back to npm for names the registry does not know.

mod commands;
mod output;

use clap::{Parser, Subcommand};
use commands::Session;
use output::{resolve_color_choice, StyledOutput};
use soso_pm::Config;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "soso")]
#[command(about = "Private package manager backed by git repositories", long_about = None)]
#[command(version)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// When to use colors (auto, always, never)
    #[arg(long, global = true, value_name = "WHEN")]
    color: Option<String>,

    /// Number of packages fetched in parallel
    #[arg(short, long, global = true, value_name = "N")]
    jobs: Option<usize>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Install dependencies from package.json
    #[command(alias = "i")]
    Install {
        /// Package to add to the manifest and install
        package: Option<String>,
    },

    /// Raise dependency ranges to the latest published versions
    Update {
        /// Package to update (if not specified, updates all)
        package: Option<String>,
    },

    /// Tag the current version and record it in the registry
    Publish,

    /// Show published versions of a package
    Info {
        /// Package name
        package: String,
    },

    /// Manage the package cache
    Cache {
        #[command(subcommand)]
        action: CacheCommand,
    },
}

#[derive(Subcommand)]
enum CacheCommand {
    /// Remove every cached package
    Clean,
}

fn init_tracing(debug: bool) {
    let filter = EnvFilter::try_from_env("SOSO_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if debug { "soso_pm=debug" } else { "warn" })
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(cli: Cli, out: &mut StyledOutput) -> anyhow::Result<ExitCode> {
    let mut config = Config::load()?;
    if let Some(jobs) = cli.jobs {
        config.apply("jobs", &jobs.to_string())?;
    }
    let session = Session::open(config)?;
    let project = PathBuf::from(".");

    match cli.command {
        Commands::Install { package } => {
            commands::install::execute(&session, &project, package.as_deref(), out)
        }
        Commands::Update { package } => {
            commands::update::execute(&session, &project, package.as_deref(), out)
        }
        Commands::Publish => commands::publish::execute(&session, &project, out),
        Commands::Info { package } => commands::info::execute(&session, &package, out),
        Commands::Cache {
            action: CacheCommand::Clean,
        } => commands::cache::clean(&session, out),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    let mut out = StyledOutput::new(resolve_color_choice(cli.color.as_deref()));
    let code = match run(cli, &mut out) {
        Ok(code) => code,
        Err(e) => {
            out.error(&e.to_string());
            ExitCode::FAILURE
        }
    };
    out.flush();
    code
}
