use blocks_store::PgStore;
use clap::{Parser, Subcommand};
use eyre::WrapErr;

/// Offline analysis utilities over the ingested chain data.
#[derive(Parser, Debug)]
#[command(name = "blocks-analysis", about = "Offline analysis utilities for ingested chain data")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Verify block timestamps are monotonically increasing.
    Blocktime {
        /// Start of the block range.
        #[arg(short, long, default_value_t = 0)]
        start: u64,

        /// End of the block range, or "latest" for the latest known block.
        #[arg(short, long, default_value = "latest")]
        end: String,
    },
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    let args = Args::parse();

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

    match args.command {
        Command::Blocktime { start, end } => {
            let end = end.parse::<u64>().ok();
            let report = blocks_analysis::blocktime_anomalies(&store, start, end)
                .await
                .wrap_err("blocktime analysis failed")?;
            println!("Found {} timestamp anomalies", report.invalid_block_counter);
        }
    }

    Ok(())
}
