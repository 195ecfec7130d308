//! TxRequest Service binary

use anyhow::Result;
use clap::Parser;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;
use txrequest_store::TxRequestStore;

/// TxRequest service CLI arguments
#[derive(Parser, Debug)]
#[command(name = "txrequest-svc")]
#[command(about = "Development coordination service for TSS signing sessions")]
struct Args {
    /// Listen address
    #[arg(short, long, env = "LISTEN", default_value = "0.0.0.0:8080")]
    listen: String,

    /// TxRequest TTL in seconds, at most one year
    #[arg(
        long,
        env = "TXREQUEST_TTL",
        default_value = "3600",
        value_parser = clap::value_parser!(i64).range(1..=31_536_000)
    )]
    ttl: i64,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if args.log_json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    info!(listen = %args.listen, ttl = args.ttl, "Starting TxRequest service");

    let store = TxRequestStore::new(args.ttl);
    txrequest_svc::spawn_cleanup(store.clone(), Duration::from_secs(60));

    let app = txrequest_svc::router(store);

    let listener = tokio::net::TcpListener::bind(&args.listen).await?;
    info!(address = %args.listen, "Listening");

    axum::serve(listener, app).await?;

    Ok(())
}
