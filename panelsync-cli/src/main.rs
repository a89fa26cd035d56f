mod cli;
mod commands;
mod config;
mod directory;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::cli::{Args, Commands};
use crate::commands::CommandExecutor;
use crate::config::AppConfig;

const DEFAULT_LOG_FILTER: &str =
    "panelsync=info,panels_api=info,session_cache=info,domain_migrate=info";

#[tokio::main]
async fn main() {
    // Optional .env overlay for solver/relay secrets.
    let _ = dotenvy::dotenv();

    let args = Args::parse();
    init_logging(args.verbose);

    if let Err(e) = run(args).await {
        tracing::error!("{e:#}");
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => DEFAULT_LOG_FILTER.to_string(),
        1 => DEFAULT_LOG_FILTER.replace("info", "debug"),
        _ => "trace".to_string(),
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .init();
}

async fn run(args: Args) -> Result<()> {
    let config = AppConfig::load(args.config.as_deref())?;
    let executor = CommandExecutor::new(&config)?;

    match args.command {
        Commands::Accounts { group } => executor.list_accounts(group.as_deref()).await,
        Commands::Playlists(command) => executor.playlists(command).await,
        Commands::Session(command) => executor.session(command).await,
        Commands::Login { account } => executor.login(&account).await,
        Commands::Migrate(migrate_args) => executor.migrate(migrate_args).await,
    }
}
