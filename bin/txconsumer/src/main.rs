use std::sync::Arc;

use blocks_chain_client::ChainClient;
use blocks_store::PgStore;
use blocks_types::WorkerType;
use blocks_worker::{ConductorClient, WorkerRuntime};
use clap::Parser;
use eyre::WrapErr;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::watch;

/// Runs the transaction-detailing worker role: holds the `TX_DETAIL`
/// lock, fetches full transaction bodies for known-but-undetailed
/// hashes, and writes them to the database.
#[derive(Parser, Debug)]
#[command(name = "txconsumer", about = "Fills in full transaction detail rows")]
struct Args;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    let _ = Args::parse();

    let config = match blocks_config::load() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("failed to load configuration: {err}");
            std::process::exit(err.exit_code());
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(&config.log_level))
        .init();

    let store = PgStore::connect(&config.database.dsn())
        .await
        .wrap_err("failed to connect to database")?;
    let store = Arc::new(store);

    let chain = match ChainClient::new(&config.ethereum.node, config.ethereum.infura_api_key.as_deref()) {
        Ok(chain) => Arc::new(chain),
        Err(err) => {
            tracing::error!(%err, "failed to build chain client");
            std::process::exit(3);
        }
    };

    let conductor = Arc::new(ConductorClient::new(config.conductor.endpoint.clone()));
    let runtime = WorkerRuntime::new(store, chain, conductor);

    let (term_tx, term_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = term_tx.send(true);
    });

    runtime.run(WorkerType::TxDetail, blocks_worker::roles::tx_detail::run, term_rx).await;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install SIGINT handler");
    };

    let terminate = async {
        signal(SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    tracing::info!("shutdown signal received");
}
