use std::{path::PathBuf, sync::Arc};

use chain_sentinel::{
    config::AppConfig,
    http_client::HttpClientPool,
    providers::SubstrateSource,
    sinks::build_sinks,
    supervisor::Supervisor,
};
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the YAML configuration file.
    #[arg(short, long, env = "APP_CONFIG_FILE", default_value = "config.yaml", global = true)]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Watches the configured endpoints (the default).
    Run,
    /// Loads and validates the configuration, then exits.
    CheckConfig,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let subscriber =
        FmtSubscriber::builder().with_env_filter(EnvFilter::from_default_env()).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let cli = Cli::parse();

    tracing::debug!(path = %cli.config.display(), "Loading application configuration...");
    let config = AppConfig::new(&cli.config)?;

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run_supervisor(config).await?,
        Commands::CheckConfig => check_config(&config),
    }

    Ok(())
}

fn check_config(config: &AppConfig) {
    let interests = config.interests();
    println!("Configuration is valid.");
    println!("  endpoints: {}", config.endpoints.len());
    println!("  monitored accounts: {}", interests.accounts.len());
    println!(
        "  extrinsic filter: {}",
        describe(interests.extrinsic_methods.is_match_all(), interests.extrinsic_methods.len())
    );
    println!(
        "  event filter: {}",
        describe(interests.event_methods.is_match_all(), interests.event_methods.len())
    );
}

fn describe(match_all: bool, len: usize) -> String {
    if match_all { "all".to_string() } else { format!("{len} names") }
}

async fn run_supervisor(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let client_pool = HttpClientPool::new();
    let sinks = build_sinks(&config.sinks, &client_pool).await?;
    tracing::info!(count = sinks.len(), "Sinks initialized.");

    let mut builder = Supervisor::builder().config(config.clone()).sinks(sinks);
    for url in &config.endpoints {
        let data_source = SubstrateSource::new(url.clone());
        builder = builder.endpoint(url.clone(), Arc::new(data_source));
    }

    let supervisor = builder.build()?;
    tracing::info!("Supervisor initialized, starting monitoring...");
    supervisor.run().await?;

    Ok(())
}
