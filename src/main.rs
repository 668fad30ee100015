//! Stakehouse service binary: wires the ledger, outcome source,
//! settlement engine, crash scheduler and HTTP API together.

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use stakehouse::api::{ApiServer, AppState};
use stakehouse::config::CasinoConfig;
use stakehouse::events::EventBus;
use stakehouse::games::rng::{OutcomeSource, VrfOutcomeSource};
use stakehouse::identity::PermissiveIdentity;
use stakehouse::ledger::{Ledger, MemoryLedger};
use stakehouse::round::CrashScheduler;
use stakehouse::settlement::SettlementEngine;

#[derive(Parser, Debug)]
#[command(name = "stakehouse", version, about = "Server-authoritative casino wager engine")]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the listen host.
    #[arg(long)]
    host: Option<String>,

    /// Override the listen port.
    #[arg(long)]
    port: Option<u16>,

    /// Seed a demo player with this balance at startup.
    #[arg(long)]
    demo_balance: Option<f64>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "stakehouse=info,tower_http=info".into()),
        )
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => CasinoConfig::load(path)?,
        None => CasinoConfig::default(),
    };
    if let Some(host) = cli.host {
        config.server.host = host;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    config.validate()?;
    let config = Arc::new(config);

    let ledger = Arc::new(MemoryLedger::new());
    if let Some(balance) = cli.demo_balance {
        ledger.create_player("demo", balance).await?;
        info!(balance, "seeded demo player");
    }

    let outcomes = Arc::new(VrfOutcomeSource::new_random());
    info!(public_key = %outcomes.public_key_hex(), "outcome source ready");

    let dyn_ledger: Arc<dyn Ledger> = ledger;
    let engine = Arc::new(SettlementEngine::new(
        config.clone(),
        dyn_ledger,
        outcomes,
        EventBus::default(),
    ));

    let scheduler = Arc::new(CrashScheduler::new(engine.clone()));
    scheduler.clone().spawn();
    info!("crash round scheduler running");

    let state = Arc::new(AppState {
        engine,
        scheduler,
        identity: Arc::new(PermissiveIdentity),
    });
    ApiServer::new(config.server.clone(), state).run().await
}
