use std::sync::Arc;
use std::time::Duration;

use blocks_chain_client::ChainClient;
use blocks_conductor::{
    Conductor, CHAIN_HEAD_REFRESH_INTERVAL_SECS, STALE_CONSUMER_WINDOW_SECS, SWEEP_INTERVAL_SECS,
};
use blocks_conductor_api::AppState;
use blocks_store::{PgStore, Store};
use clap::Parser;
use eyre::WrapErr;
use tokio::signal::unix::{signal, SignalKind};

/// Runs the conductor: the single process that partitions ingestion
/// work across block, tx-prime, and tx-detail workers over HTTP.
#[derive(Parser, Debug)]
#[command(name = "conductor", about = "Partitions Ethereum ingestion work across workers")]
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

    match store.run_initial_ddl().await {
        Ok(true) => tracing::info!("initial schema applied"),
        Ok(false) => tracing::info!("schema already present"),
        Err(err) => {
            tracing::error!(%err, "failed to apply initial schema");
            std::process::exit(51);
        }
    }

    let chain = match ChainClient::new(&config.ethereum.node, config.ethereum.infura_api_key.as_deref()) {
        Ok(chain) => Arc::new(chain),
        Err(err) => {
            tracing::error!(%err, "failed to build chain client");
            std::process::exit(3);
        }
    };

    let store = Arc::new(store);
    let conductor = Conductor::new(Arc::clone(&store), Arc::clone(&chain), config.conductor.batch_size as u64)
        .await
        .wrap_err("failed to initialize conductor")?;

    let state = AppState::new(conductor);
    let app = blocks_conductor_api::router(state.clone());

    let sweep_state = state.clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(SWEEP_INTERVAL_SECS));
        loop {
            ticker.tick().await;
            let mut conductor = sweep_state.conductor.lock().await;
            if let Err(err) =
                conductor.reap_stale_jobs(chrono::Duration::seconds(STALE_CONSUMER_WINDOW_SECS)).await
            {
                tracing::warn!(%err, "failed to sweep stale jobs");
            }
        }
    });

    let refresh_state = state.clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(CHAIN_HEAD_REFRESH_INTERVAL_SECS));
        loop {
            ticker.tick().await;
            let mut conductor = refresh_state.conductor.lock().await;
            if let Err(err) = conductor.refresh_latest_on_chain().await {
                tracing::warn!(%err, "failed to refresh latest on-chain block number");
            }
        }
    });

    let addr = format!("{}:{}", config.conductor.host, config.conductor.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .wrap_err_with(|| format!("failed to bind conductor listener on {addr}"))?;

    tracing::info!(%addr, "conductor listening");

    let listener = listener.into_std().wrap_err("failed to convert listener to std socket")?;
    let server = axum::Server::from_tcp(listener)
        .wrap_err("failed to build server from listener")?
        .serve(app.into_make_service());

    server.with_graceful_shutdown(shutdown_signal()).await.wrap_err("conductor server error")?;

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
