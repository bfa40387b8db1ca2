//! ironloop CLI: the main entry point.
//!
//! Commands:
//! - `run`: Drive the loop against a scripted model transcript
//! - `config`: Show, initialize or validate `ironloop.toml`

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;
mod replay;

#[derive(Parser)]
#[command(
    name = "ironloop",
    about = "ironloop: bounded tool-calling agent runtime",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one request through the loop, replaying model responses from a
    /// transcript file
    Run {
        /// Config file (defaults to ./ironloop.toml)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// JSON transcript of model responses
        #[arg(short, long)]
        script: PathBuf,

        /// User input; overrides the transcript's `input`
        #[arg(short, long)]
        input: Option<String>,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration
    Show {
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Write a default config file
    Init {
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Check a config file for errors
    Validate {
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Logs go to stderr so stdout stays machine-readable
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Run {
            config,
            script,
            input,
        } => commands::run::run(config, script, input).await?,
        Commands::Config { action } => match action {
            ConfigAction::Show { config } => commands::config_cmd::show(config).await?,
            ConfigAction::Init { config, force } => commands::config_cmd::init(config, force).await?,
            ConfigAction::Validate { config } => commands::config_cmd::validate(config).await?,
        },
    }

    Ok(())
}
