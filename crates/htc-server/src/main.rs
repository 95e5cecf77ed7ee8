//! htcollector daemon
//!
//! Connects the configured backend, creates missing tables and serves the
//! HTTP routes until Ctrl+C or SIGTERM. `--ping` only checks the backend.
//! Command line flags override the file and environment settings.

use anyhow::{Context, Result};
use clap::Parser;
use htc_config::{AppConfig, Backend, Overrides};
use htc_db::{DbClient, DbConnectionBuilder};
use htc_query::{MemoryStore, QueryFacade};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::{info, warn};

/// Collects temperature/humidity readings from Shelly H&T sensors
#[derive(Debug, Parser)]
#[command(name = "htcollectord", version)]
struct Cli {
    /// Check the database connection and exit
    #[arg(short = 'x', long)]
    ping: bool,

    /// Database schema
    #[arg(long)]
    database: Option<String>,

    /// Database host
    #[arg(long)]
    dbhost: Option<String>,

    /// Database port
    #[arg(long)]
    dbport: Option<u16>,

    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Address to bind to
    #[arg(short, long)]
    bind: Option<String>,
}

impl Cli {
    fn overrides(&self) -> Overrides {
        Overrides {
            database: self.database.clone(),
            dbhost: self.dbhost.clone(),
            dbport: self.dbport,
            port: self.port,
            bind: self.bind.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    htc_obs::init("htcollector");

    let mut cfg = AppConfig::load().context("Failed to load configuration")?;
    cfg.apply_overrides(&cli.overrides());
    let (facade, db) = open_backend(&cfg).await?;

    facade.ping().await.context("Database ping failed")?;
    info!("Backend connection verified");
    if cli.ping {
        return Ok(());
    }

    let (app, state) = htc_server::build_app(facade)?;

    let addr: SocketAddr = cfg
        .http_bind()
        .parse()
        .with_context(|| format!("Invalid HTTP bind address {}", cfg.http_bind()))?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    // Mark ready just before serving
    htc_server::set_ready(&state, true);

    info!(%addr, "HTTP server listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    htc_server::set_ready(&state, false);
    if let Some(db) = db {
        db.close().await;
    }
    info!("htcollector stopped");
    Ok(())
}

async fn open_backend(cfg: &AppConfig) -> Result<(QueryFacade, Option<DbClient>)> {
    let db = match cfg.backend() {
        Backend::Memory => {
            warn!("No database configured, readings are kept in memory only");
            return Ok((QueryFacade::from_backend(MemoryStore::new()), None));
        }
        Backend::Url(url) => {
            let db = DbClient::new(&url)
                .await
                .context("Failed to connect to database")?;
            db.ensure_schema()
                .await
                .context("Failed to create tables")?;
            db
        }
        Backend::Components {
            name,
            host,
            port,
            user,
            password,
        } => {
            let mut builder = DbConnectionBuilder::new(name)
                .host(host)
                .port(port)
                .username(user);
            if let Some(password) = password {
                builder = builder.password(password);
            }
            DbClient::connect(builder.build()?)
                .await
                .context("Failed to connect to database")?
        }
    };
    info!("Connected to database");
    Ok((QueryFacade::from_backend(db.clone()), Some(db)))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Ctrl+C handler unavailable");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "SIGTERM handler unavailable");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}
