// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

use anyhow::Result;
use axum::{http::StatusCode, routing::get, Router};
use clap::Parser;
use kube::Client;
use serde::Serialize;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use svcdns::{
    constants::{DEFAULT_METRICS_BIND_ADDRESS, DEFAULT_RESYNC_INTERVAL_SECS, TOKIO_WORKER_THREADS},
    config::ServiceSourceConfig,
    endpoint::Endpoint,
    metrics::gather_metrics,
    source::{ServiceSource, Source},
};
use tokio::sync::Notify;
use tracing::{debug, error, info, warn};

/// svcdns - DNS endpoints for Kubernetes Services
#[derive(Parser, Debug)]
#[command(name = "svcdns", version, about, long_about = None)]
struct Cli {
    /// Path to the YAML source configuration; defaults apply when omitted
    #[arg(short = 'f', long = "config", env = "SVCDNS_CONFIG")]
    config_file: Option<PathBuf>,

    /// Address serving `/metrics` and `/healthz`
    #[arg(long, default_value = DEFAULT_METRICS_BIND_ADDRESS)]
    metrics_bind_address: SocketAddr,

    /// Seconds between full recomputes when nothing changes
    #[arg(long, default_value_t = DEFAULT_RESYNC_INTERVAL_SECS)]
    resync_interval: u64,
}

/// One computed endpoint set, as logged after each recompute.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Snapshot<'a> {
    generated_at: chrono::DateTime<chrono::Utc>,
    endpoints: &'a [Endpoint],
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Build Tokio runtime with custom thread names
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(TOKIO_WORKER_THREADS)
        .thread_name("svcdns-source")
        .enable_all()
        .build()?;

    runtime.block_on(async_main(cli))
}

async fn async_main(cli: Cli) -> Result<()> {
    // Respects RUST_LOG (default: info) and RUST_LOG_FORMAT (json | text)
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let log_format = std::env::var("RUST_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    match log_format.to_lowercase().as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .json()
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .with_ansi(true)
                .compact()
                .init();
        }
    }

    info!("Starting Service endpoint source");

    let config = match &cli.config_file {
        Some(path) => {
            debug!(path = %path.display(), "Loading configuration");
            ServiceSourceConfig::load_from_file(path)?
        }
        None => ServiceSourceConfig::default(),
    };

    debug!("Initializing Kubernetes client");
    let client = Client::try_default().await?;

    let source = Arc::new(ServiceSource::new(&client, &config)?);

    let changed = Arc::new(Notify::new());
    let notifier = changed.clone();
    let kinds = source.add_event_handler(Arc::new(move || notifier.notify_one()));
    info!(kinds = ?kinds, "Watching for changes");

    if !source.caches().wait_until_ready().await {
        warn!("Watch caches did not report ready, continuing with partial state");
    }

    tokio::select! {
        result = run_metrics_server(cli.metrics_bind_address) => {
            error!("CRITICAL: metrics server exited unexpectedly: {:?}", result);
            result?;
            anyhow::bail!("Metrics server exited unexpectedly without error")
        }
        () = run_sync_loop(source, changed, Duration::from_secs(cli.resync_interval)) => {
            anyhow::bail!("Sync loop exited unexpectedly")
        }
        result = shutdown_signal() => {
            result?;
            info!("Shutdown signal received, stopping");
            Ok(())
        }
    }
}

/// Recomputes endpoints on every change notification and every `interval`.
async fn run_sync_loop(source: Arc<ServiceSource>, changed: Arc<Notify>, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);

    loop {
        tokio::select! {
            _ = ticker.tick() => debug!("Periodic resync"),
            () = changed.notified() => debug!("Watched objects changed"),
        }

        match source.endpoints().await {
            Ok(endpoints) => match render_snapshot(&endpoints) {
                Ok(snapshot) => info!(count = endpoints.len(), snapshot = %snapshot, "Computed endpoints"),
                Err(e) => error!(error = %e, "Failed to serialize endpoints"),
            },
            Err(e) => error!(error = %e, "Failed to compute endpoints"),
        }
    }
}

fn render_snapshot(endpoints: &[Endpoint]) -> serde_json::Result<String> {
    serde_json::to_string(&Snapshot {
        generated_at: chrono::Utc::now(),
        endpoints,
    })
}

fn metrics_router() -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/healthz", get(|| async { "ok" }))
}

async fn metrics_handler() -> Result<String, (StatusCode, String)> {
    gather_metrics().map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
}

async fn run_metrics_server(addr: SocketAddr) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %addr, "Metrics server started");
    axum::serve(listener, metrics_router()).await?;
    Ok(())
}

/// Resolves on SIGINT, or SIGTERM on Unix.
async fn shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate())?;
        tokio::select! {
            result = tokio::signal::ctrl_c() => result?,
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
    }
    Ok(())
}
