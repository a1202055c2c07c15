//! docflow CLI
//!
//! Runs the CloudEvent endpoint and offers a few operator commands against
//! the configured Dataform workspace.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod output;
mod server;

use output::{Output, OutputFormat};

#[derive(Parser)]
#[command(name = "docflow")]
#[command(about = "docflow - mirror Firestore documents into a Dataform workspace")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Config file (defaults to ~/.config/docflow/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Quiet mode - minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Listen for change notifications over HTTP
    Serve {
        /// Listen address (overrides listen_addr)
        #[arg(long)]
        addr: Option<String>,
    },
    /// Handle one notification from a JSON file, or stdin with '-'
    Handle {
        #[arg(default_value = "-")]
        file: String,
    },
    /// Show the conflict status of the target workspace
    Status,
    /// Commit pending changes in the target workspace
    Commit {
        /// Commit message
        #[arg(short, long)]
        message: String,
        /// Only commit these paths
        #[arg(short, long)]
        path: Vec<String>,
    },
    /// Show configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
enum ConfigCommands {
    /// Show current configuration
    Show,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let output = Output::new(OutputFormat::from_flags(cli.json, cli.quiet));
    init_logging(cli.verbose);

    let config_path = cli.config.as_ref();
    match cli.command {
        Commands::Serve { addr } => commands::serve::run(config_path, addr).await,
        Commands::Handle { file } => commands::handle::run(config_path, &file, &output).await,
        Commands::Status => commands::status::show(config_path, &output).await,
        Commands::Commit { message, path } => {
            commands::commit::run(config_path, message, path, &output).await
        }
        Commands::Config { command } => match command {
            Some(ConfigCommands::Show) | None => commands::config::show(config_path, &output),
        },
    }
}

/// Log to stderr so stdout stays clean for --json / --quiet
fn init_logging(verbose: bool) {
    let log_level = if verbose { "debug" } else { "info" };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "docflow_core={},docflow_cli={}",
            log_level, log_level
        ))
    });

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
