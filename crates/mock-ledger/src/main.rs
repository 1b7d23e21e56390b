//! Mock ledger server for local testing of confidential auctions.
//!
//! Hosts the auction program, the confidential token and asset programs,
//! the compute coprocessor and the decryption service behind a JSON-RPC
//! interface, without requiring a real ledger.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use clap::Parser;
use jsonrpsee::server::Server;
use tracing::info;

use cbid_compute::{NetworkKey, DEV_NETWORK_KEY};
use cbid_module::ModuleConfig;
use cbid_types::rpc::parse_address;

mod server;
use server::{ChainState, MockLedgerApiServer, MockLedgerServer};

#[derive(Parser)]
#[command(name = "cbid-mock-ledger")]
#[command(about = "JSON-RPC mock ledger for confidential sealed-bid auctions")]
struct Args {
    /// Address to listen on
    #[arg(long, default_value = "127.0.0.1:9944")]
    listen: SocketAddr,

    /// Module configuration (JSON)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Starting ledger timestamp; defaults to wall-clock time
    #[arg(long)]
    initial_timestamp: Option<u64>,

    /// Coprocessor network key (hex); defaults to the development key
    #[arg(long)]
    network_key: Option<String>,
}

fn load_config(path: Option<&PathBuf>) -> Result<ModuleConfig> {
    let config = match path {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))?
        }
        None => ModuleConfig::default(),
    };
    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("cbid_mock_ledger=info".parse()?)
                .add_directive("cbid_module=info".parse()?)
                .add_directive("jsonrpsee=warn".parse()?),
        )
        .init();

    let args = Args::parse();
    let config = load_config(args.config.as_ref())?;
    let network_key = match &args.network_key {
        Some(hex_key) => NetworkKey(parse_address("network_key", hex_key)?),
        None => DEV_NETWORK_KEY,
    };
    let timestamp = match args.initial_timestamp {
        Some(ts) => ts,
        None => SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs(),
    };

    info!(
        duplicate_bid_policy = ?config.duplicate_bid_policy,
        timestamp,
        "Starting mock ledger on {}",
        args.listen
    );

    let state = ChainState::new(config, network_key, timestamp);
    let server = Server::builder().build(args.listen).await?;
    let handle = server.start(MockLedgerServer::new(state).into_rpc());

    info!("Mock ledger running. Press Ctrl+C to stop.");

    tokio::signal::ctrl_c().await?;

    info!("Shutting down...");
    handle.stop()?;
    handle.stopped().await;

    Ok(())
}
