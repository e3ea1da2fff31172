//! Scribe API server binary.
//!
//! Configuration comes from the environment (see `ApiConfig::from_env`);
//! the flags below override the listener and storage settings.

use std::time::Duration;

use clap::Parser;
use scribe_api::config::ApiConfig;
use scribe_api::state::{Backends, Integrations};
use scribe_api::{AppState, router};
use sqlx::postgres::PgPoolOptions;
use tracing::{info, warn};

/// CLI arguments for the API server.
#[derive(Parser, Debug)]
#[command(name = "scribe_api_server", about = "Scribe blogging API server")]
struct Args {
    /// Address to listen on; overrides `BIND_ADDR`.
    #[arg(long)]
    bind_addr: Option<String>,

    /// PostgreSQL connection URL; overrides `DATABASE_URL`.
    #[arg(long)]
    database_url: Option<String>,

    /// Maximum number of database connections in the pool.
    #[arg(long, default_value_t = 10)]
    max_connections: u32,

    /// Keep all data in process memory instead of PostgreSQL.
    #[arg(long, env = "SCRIBE_IN_MEMORY", default_value_t = false)]
    in_memory: bool,

    /// Seconds between cleanup sweeps of expired tokens and OAuth states.
    #[arg(long, default_value_t = 300)]
    maintenance_interval_secs: u64,
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "could not listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,scribe_api=debug,scribe_core=debug")),
        )
        .init();

    let args = Args::parse();
    let mut config = ApiConfig::from_env()?;
    if let Some(addr) = args.bind_addr {
        config.bind_addr = addr;
    }
    if let Some(url) = args.database_url {
        config.database_url = url;
    }
    if config.dev_mode {
        warn!("SCRIBE_DEV_MODE is set: tokens are signed with an ephemeral secret");
    }

    let backends = if args.in_memory {
        info!("using in-memory stores");
        Backends::in_memory()
    } else {
        info!(max_connections = args.max_connections, "connecting to PostgreSQL");
        let pool = PgPoolOptions::new()
            .max_connections(args.max_connections)
            .acquire_timeout(Duration::from_secs(30))
            .connect(&config.database_url)
            .await?;
        info!("running database migrations");
        scribe_api::migrate(&pool).await?;
        Backends::postgres(pool)
    };

    let integrations = Integrations::from_config(&config).await?;
    let bind_addr = config.bind_addr.clone();
    let state = AppState::new(config, backends, integrations);
    let maintenance = state.spawn_maintenance(Duration::from_secs(args.maintenance_interval_secs.max(1)));

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!(addr = %listener.local_addr()?, "REST API listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    maintenance.abort();
    info!("server stopped");
    Ok(())
}
