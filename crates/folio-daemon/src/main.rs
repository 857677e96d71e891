//! folio-daemon — local persistence service for the site configuration.
//!
//! Owns the on-disk YAML document and exposes it over a small HTTP
//! boundary for the editor:
//!
//! - `GET  /api/config` — the current document, as a success envelope
//! - `POST /api/config` — one section-level replacement
//!
//! All mutation goes through [`folio_core::store::ConfigStore`], which
//! serializes writers across processes with an advisory file lock and
//! commits atomically, so several daemon instances (or any other tool
//! using the same store) cannot corrupt the document.

mod config;
mod handlers;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::Router;
use axum::routing::get;
use clap::Parser;
use folio_core::store::ConfigStore;
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::DaemonConfig;

/// folio daemon — site configuration persistence service
#[derive(Parser, Debug)]
#[command(name = "folio-daemon")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the daemon settings file
    #[arg(short, long, default_value = "folio.toml")]
    config: PathBuf,

    /// Override the bind address from the settings file
    #[arg(long)]
    bind: Option<std::net::SocketAddr>,

    /// Override the document path from the settings file
    #[arg(long)]
    document: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let mut config = DaemonConfig::load(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;
    if let Some(bind) = args.bind {
        config.bind = bind;
    }
    if let Some(document) = args.document {
        config.document = document;
    }

    let store = Arc::new(ConfigStore::with_lock_timeout(
        &config.document,
        Duration::from_millis(config.lock_timeout_ms),
    ));

    let app = Router::new()
        .route(
            "/api/config",
            get(handlers::get_config).post(handlers::update_config),
        )
        .with_state(store);

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("binding {}", config.bind))?;
    info!(
        addr = %config.bind,
        document = %config.document.display(),
        "folio daemon listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to install shutdown handler");
        return;
    }
    info!("shutting down");
}
