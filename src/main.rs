use std::net::SocketAddr;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use clap::Parser;
use stellar_ledger_rpc::api;
use stellar_ledger_rpc::core::HttpCoreSubmitter;
use stellar_ledger_rpc::ingest::run_ingest;
use stellar_ledger_rpc::ledger::source::MetaStoreSource;
use stellar_ledger_rpc::preflight::DisabledPreflight;
use stellar_ledger_rpc::storage::MemoryEntryStore;
use stellar_ledger_rpc::store::events::EventStore;
use stellar_ledger_rpc::store::transactions::TransactionStore;
use stellar_ledger_rpc::AppState;

const DEFAULT_META_URL: &str =
    "https://aws-public-blockchain.s3.us-east-2.amazonaws.com/v1.1/stellar/ledgers/pubnet";

const DEFAULT_NETWORK_PASSPHRASE: &str = "Public Global Stellar Network ; September 2015";

#[derive(Parser)]
#[command(
    name = "stellar-ledger-rpc",
    about = "JSON-RPC server exposing a queryable view over a Stellar ledger stream",
    version
)]
struct Cli {
    /// Port to listen on
    #[arg(long, default_value = "8000", env = "PORT")]
    port: u16,

    /// Bind address
    #[arg(long, default_value = "0.0.0.0", env = "BIND_ADDRESS")]
    bind: String,

    /// Base URL for the ledger metadata store
    #[arg(long, default_value = DEFAULT_META_URL, env = "META_URL")]
    meta_url: String,

    /// Passphrase of the network being ingested
    #[arg(long, default_value = DEFAULT_NETWORK_PASSPHRASE, env = "NETWORK_PASSPHRASE")]
    network_passphrase: String,

    /// Ledger sequence to start ingesting from
    #[arg(long, env = "START_LEDGER")]
    start_ledger: Option<u32>,

    /// How many ledgers of transactions and events to retain in memory
    #[arg(long, default_value = "17280", env = "RETENTION_WINDOW")]
    retention_window: u32,

    /// getEvents page size when the request does not set one
    #[arg(long, default_value = "100", env = "DEFAULT_EVENTS_LIMIT")]
    default_events_limit: u32,

    /// Largest getEvents page size a request may ask for
    #[arg(long, default_value = "10000", env = "MAX_EVENTS_LIMIT")]
    max_events_limit: u32,

    /// Seconds the latest ledger may lag before getHealth fails
    #[arg(long, default_value = "30", env = "MAX_HEALTHY_LATENCY_SECS")]
    max_healthy_latency_secs: u64,

    /// HTTP endpoint of the core node transactions are submitted to
    #[arg(long, default_value = "http://localhost:11626", env = "CORE_URL")]
    core_url: String,

    /// Friendbot URL advertised by getNetwork
    #[arg(long, env = "FRIENDBOT_URL")]
    friendbot_url: Option<String>,

    /// Disable the Prometheus /metrics endpoint
    #[arg(long, env = "NO_METRICS")]
    no_metrics: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let metrics_handle = if cli.no_metrics {
        None
    } else {
        Some(metrics_exporter_prometheus::PrometheusBuilder::new().install_recorder()?)
    };

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .build()?;

    let entries = Arc::new(MemoryEntryStore::new());

    let state = Arc::new(AppState {
        transactions: TransactionStore::new(cli.retention_window),
        events: EventStore::new(cli.retention_window),
        head: RwLock::new(None),
        storage: entries.clone(),
        core: Arc::new(HttpCoreSubmitter::new(client.clone(), cli.core_url.clone())),
        preflight: Arc::new(DisabledPreflight),
        network_passphrase: cli.network_passphrase.clone(),
        friendbot_url: cli.friendbot_url.clone(),
        default_events_limit: cli.default_events_limit,
        max_events_limit: cli.max_events_limit,
        max_healthy_latency: Duration::from_secs(cli.max_healthy_latency_secs),
    });

    tracing::info!(
        retention = cli.retention_window,
        "initialised in-memory stores"
    );

    let source = Arc::new(
        MetaStoreSource::connect(client, cli.meta_url.clone(), &cli.network_passphrase).await,
    );
    tokio::spawn(run_ingest(
        source,
        Arc::clone(&state),
        entries,
        cli.start_ledger,
    ));

    let app = api::router(state, metrics_handle);
    let addr: SocketAddr = format!("{}:{}", cli.bind, cli.port).parse()?;
    tracing::info!(address = %addr, "starting server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
