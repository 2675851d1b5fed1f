use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use dropclick_cli::cli::{
    cmd_config, cmd_demo, cmd_run, CliContext, ConfigArgs, DemoArgs, OutputFormat, RunArgs,
};

/// Dropclick - acquisition agent for timed product drops
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Policy file (YAML) overriding the tuned timing and locator constants
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Agent settings file (JSON); defaults to the user config directory
    #[arg(long, value_name = "FILE")]
    store: Option<PathBuf>,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Enable debug mode
    #[arg(short, long)]
    debug: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value = "human")]
    output: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Hunt on a live page in Chromium
    Run(RunArgs),

    /// Hunt on the built-in simulated storefront
    Demo(DemoArgs),

    /// Show or edit the agent settings
    Config(ConfigArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(&cli.log_level, cli.debug)?;
    info!("Starting dropclick v{}", env!("CARGO_PKG_VERSION"));

    let ctx = CliContext::new(cli.config, cli.store, cli.output);
    let result = match cli.command {
        Commands::Run(args) => cmd_run(args, &ctx).await,
        Commands::Demo(args) => cmd_demo(args, &ctx).await,
        Commands::Config(args) => cmd_config(args, &ctx).await,
    };

    match result {
        Ok(()) => Ok(()),
        Err(e) => {
            error!("Command failed: {:#}", e);
            std::process::exit(1);
        }
    }
}

fn init_logging(level: &str, debug: bool) -> Result<()> {
    let level = if debug {
        tracing::Level::DEBUG
    } else {
        level.parse().context("Invalid log level")?
    };

    // stdout carries command output
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level.to_string())),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    Ok(())
}
