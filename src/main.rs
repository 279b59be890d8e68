//! Service entry point.
//!
//! Loads every configured feed once, then keeps each one fresh in its own
//! background loop while the HTTP layer serves the latest snapshots.

use std::ffi::OsStr;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use sytral_rt::{
    config::{Cli, Config, FeedConfig},
    fetch::{Retriever, SchemeRetriever},
    metrics::{MetricsSink, PrometheusMetrics},
    refresh::{DepartureSource, EquipmentSource, FeedSource, ParkingSource, Refresher},
    store::SnapshotStore,
    web::{AppState, create_router},
};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Stdout logging, plain or JSON, plus an optional daily-rolling JSON file.
fn init_logging(cli: &Cli) -> Result<Option<WorkerGuard>> {
    let filter = || {
        EnvFilter::try_new(&cli.log_level)
            .with_context(|| format!("invalid log level {:?}", cli.log_level))
    };

    let stdout_layer = if cli.json_log {
        fmt::layer()
            .json()
            .with_current_span(true)
            .with_writer(std::io::stdout)
            .with_filter(filter()?)
            .boxed()
    } else {
        fmt::layer()
            .with_target(true)
            .with_ansi(true)
            .with_writer(std::io::stdout)
            .with_filter(filter()?)
            .boxed()
    };

    let (file_layer, guard) = match &cli.log_file {
        Some(path) => {
            let dir = path.parent().unwrap_or(Path::new("."));
            let name = path.file_name().unwrap_or(OsStr::new("sytral_rt.log"));
            let (writer, guard) =
                tracing_appender::non_blocking(tracing_appender::rolling::daily(dir, name));
            let layer = fmt::layer()
                .json()
                .with_current_span(true)
                .with_span_list(true)
                .with_writer(writer)
                .with_filter(filter()?);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(stdout_layer)
        .with(file_layer)
        .init();

    Ok(guard)
}

/// Loads `source` once, synchronously, then spawns its background loop.
async fn start_feed<S: FeedSource>(
    source: S,
    feed_config: Option<&FeedConfig>,
    retriever: &Arc<dyn Retriever>,
    store: &Arc<SnapshotStore>,
    metrics: &dyn MetricsSink,
    shutdown: &watch::Receiver<bool>,
) -> Option<JoinHandle<()>> {
    let feed_config = feed_config?;
    let refresher = Refresher::new(
        source,
        feed_config.location.clone(),
        feed_config.refresh,
        retriever.clone(),
        store.clone(),
        metrics,
    );

    match refresher.refresh_once().await {
        Ok(count) => info!(feed = %S::FEED, records = count, "Initial load done"),
        Err(e) => error!(feed = %S::FEED, error = %e, "Impossible to load data at startup"),
    }

    Some(tokio::spawn(refresher.run(shutdown.clone())))
}

async fn shutdown_signal(tx: watch::Sender<bool>) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
    let _ = tx.send(true);
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    let cli = Cli::parse();
    let _log_guard = init_logging(&cli)?;
    let config: Config = cli.into_config()?;

    let store = Arc::new(SnapshotStore::new());
    let metrics = Arc::new(PrometheusMetrics::new()?);
    let retriever: Arc<dyn Retriever> = Arc::new(SchemeRetriever::new(config.fetch_timeout));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let tz = config.timezone;

    // eager loads run one after the other before anything is served
    let loops: Vec<JoinHandle<()>> = [
        start_feed(
            DepartureSource { tz },
            config.departures.as_ref(),
            &retriever,
            &store,
            &*metrics,
            &shutdown_rx,
        )
        .await,
        start_feed(
            ParkingSource { tz },
            config.parkings.as_ref(),
            &retriever,
            &store,
            &*metrics,
            &shutdown_rx,
        )
        .await,
        start_feed(
            EquipmentSource { tz },
            config.equipments.as_ref(),
            &retriever,
            &store,
            &*metrics,
            &shutdown_rx,
        )
        .await,
    ]
    .into_iter()
    .flatten()
    .collect();

    let app = create_router(AppState {
        store: store.clone(),
        metrics: Some(metrics.clone()),
    });
    let listener = tokio::net::TcpListener::bind(config.listen)
        .await
        .with_context(|| format!("cannot listen on {}", config.listen))?;
    info!(addr = %config.listen, "Serving feed snapshots");

    let mut server_shutdown = shutdown_rx.clone();
    tokio::spawn(shutdown_signal(shutdown_tx));
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = server_shutdown.changed().await;
        })
        .await?;

    for handle in loops {
        let _ = handle.await;
    }
    info!("Stopped");
    Ok(())
}
