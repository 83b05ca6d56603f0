use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use invoice_api::config::{Config, LogFormat};
use invoice_api::db;
use invoice_api::handlers::AppContext;
use invoice_api::web;

const DEFAULT_LOG_FILTER: &str = "invoice_api=info,tower_http=info";

#[derive(Debug, Parser)]
#[command(name = "invoice-api", version, about = "HTTP API for customers, products and invoices")]
struct Cli {
    /// Address to listen on. Overrides BIND_ADDRESS.
    #[arg(long, value_name = "ADDR")]
    bind: Option<SocketAddr>,

    /// Emit logs as JSON. Overrides LOG_FORMAT.
    #[arg(long)]
    log_json: bool,
}

fn init_tracing(format: LogFormat) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let _ = match format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Text => builder.try_init(),
    };
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let mut config = Config::from_env().context("failed to load configuration")?;
    if let Some(bind) = cli.bind {
        config.http.bind_address = bind;
    }
    if cli.log_json {
        config.log_format = LogFormat::Json;
    }
    init_tracing(config.log_format);

    let db = db::connect_from_config(&config.database)
        .await
        .context("failed to connect to the database")?;
    tracing::info!(pool_size = config.database.pool_size, "Database ready");

    let ctx = Arc::new(AppContext::new(db));
    web::start_server(config.http.bind_address, ctx, shutdown_signal()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
