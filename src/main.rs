//! Tài/Xỉu prediction service
//!
//! Polls a remote round feed, learns from every settled round, and
//! serves predictions over HTTP.

use clap::{Parser, Subcommand};
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use taixiu_predictor::{
    api::{self, AppState},
    config::Config,
    ingester::{self, HttpRoundSource, RoundSource},
    predictor::Ensemble,
    storage::{SharedStore, Store},
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "taixiu-predictor")]
#[command(about = "High/low dice outcome prediction service")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the poller and the HTTP API
    Run,
    /// One-shot prediction against the stored history
    Predict,
    /// Show store statistics
    Stats,
    /// Wipe history and learned state
    Reset {
        /// Required confirmation flag
        #[arg(long)]
        confirm: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = Config::load(&cli.config)?;

    match cli.command {
        Commands::Run => run(config).await,
        Commands::Predict => predict_once(config),
        Commands::Stats => show_stats(config),
        Commands::Reset { confirm } => reset(config, confirm),
    }
}

async fn run(config: Config) -> anyhow::Result<()> {
    tracing::info!("starting taixiu predictor");

    let store: SharedStore = Arc::new(RwLock::new(Store::open(&config.data_file)?));
    let source: Arc<dyn RoundSource> = Arc::new(HttpRoundSource::new(&config.poll_url)?);

    let state = Arc::new(AppState {
        store: store.clone(),
        ensemble: Ensemble::new(config.monte_carlo_sims),
        source: source.clone(),
    });

    tokio::spawn(ingester::run(
        source,
        store,
        Duration::from_secs(config.poll_interval_secs),
    ));
    tracing::info!(
        "polling {} every {}s",
        config.poll_url,
        config.poll_interval_secs
    );

    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    tracing::info!("listening on http://{}", config.listen_addr);
    axum::serve(listener, api::router(state)).await?;
    Ok(())
}

fn predict_once(config: Config) -> anyhow::Result<()> {
    let mut store = Store::open(&config.data_file)?;
    if store.is_empty() {
        anyhow::bail!("no history in {}; run the poller first", config.data_file);
    }
    let ensemble = Ensemble::new(config.monte_carlo_sims);
    let result = store.predict_next(&ensemble);
    store.save()?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

fn show_stats(config: Config) -> anyhow::Result<()> {
    let store = Store::open(&config.data_file)?;
    println!("{}", serde_json::to_string_pretty(&store.stats())?);
    Ok(())
}

fn reset(config: Config, confirm: bool) -> anyhow::Result<()> {
    if !confirm {
        anyhow::bail!("refusing to reset without --confirm");
    }
    let mut store = Store::open(&config.data_file)?;
    store.reset()?;
    tracing::warn!("store reset, {} wiped", config.data_file);
    Ok(())
}
