//! opflow CLI: scripted Open Payments flows from the command line.
//!
//! Subcommands: init, keygen, wallet, flow, send, payments.

mod app;
mod commands;
mod storage;

use clap::{Parser, Subcommand};
use opflow_core::{LoggingConfig, OpflowConfig};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use app::App;

/// opflow: Open Payments flows.
#[derive(Parser, Debug)]
#[command(name = "opflow", version, about, long_about = None)]
struct Cli {
    /// Path to the configuration file (TOML).
    #[arg(short, long, global = true, default_value = "opflow.toml")]
    config: PathBuf,

    /// Override the data directory.
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Override the log level (trace, debug, info, warn, error).
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write a default configuration file.
    Init(commands::init::InitArgs),
    /// Generate a signing key pair to register with a wallet.
    Keygen(commands::keygen::KeygenArgs),
    /// Connect, list and revoke wallets.
    Wallet(commands::wallet::WalletArgs),
    /// Store, list and run flow scripts.
    Flow(commands::flow::FlowArgs),
    /// Send a single payment from a connected wallet.
    Send(commands::send::SendArgs),
    /// Show the latest outgoing payments of a wallet.
    Payments(commands::payments::PaymentsArgs),
}

fn init_tracing(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));

    // stdout carries command output; logs go to stderr
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);
    if logging.format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = OpflowConfig::load(&cli.config)?;
    if let Some(ref data_dir) = cli.data_dir {
        config.storage.data_dir = data_dir.clone();
    }
    if let Some(ref level) = cli.log_level {
        config.logging.level = level.clone();
    }
    init_tracing(&config.logging);

    match &cli.command {
        Commands::Init(args) => commands::init::run(args, &cli.config, &config),
        Commands::Keygen(args) => commands::keygen::run(args),
        Commands::Wallet(args) => commands::wallet::run(args, &App::open(config)?).await,
        Commands::Flow(args) => commands::flow::run(args, &App::open(config)?).await,
        Commands::Send(args) => commands::send::run(args, &App::open(config)?).await,
        Commands::Payments(args) => commands::payments::run(args, &App::open(config)?).await,
    }
}
