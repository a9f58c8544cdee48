//! Driver Monitor API Server
//!
//! Wires the monitor loop, the alert loop and the HTTP API together.

use std::sync::Arc;
use std::time::Instant;

use alerting::{run_alert_loop, AlertNotifier, BellNotifier, LogNotifier, ToneSpec};
use anyhow::Context;
use axum::{
    routing::{get, post},
    Router,
};
use inference_engine::load_classifier;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use monitor::{metrics::MeteredNotifier, ClassifierLoad, Monitor, MonitorClient};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

pub mod error;
mod routes;
pub mod settings;

pub use settings::{parse_source_arg, Settings};

/// Application state shared across handlers
pub struct AppState {
    pub monitor: MonitorClient,
    pub tone: ToneSpec,
    pub metrics: Option<PrometheusHandle>,
    pub version: String,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(monitor: MonitorClient, tone: ToneSpec, metrics: Option<PrometheusHandle>) -> Self {
        Self {
            monitor,
            tone,
            metrics,
            version: env!("CARGO_PKG_VERSION").to_string(),
            start_time: Instant::now(),
        }
    }
}

/// Create the application router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/v1/health", get(routes::status::health))
        .route("/api/v1/decision", get(routes::status::decision))
        .route("/api/v1/source", post(routes::source::switch_source))
        .route("/api/v1/alert-tone.wav", get(routes::media::alert_tone))
        .route("/api/v1/snapshot.png", get(routes::media::snapshot_png))
        .route("/metrics", get(routes::media::metrics))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

/// Initialize logging. `RUST_LOG` takes precedence over `level`.
pub fn init_logging(level: &str, json: bool) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(level))?;
    let builder = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true);

    if json {
        tracing::subscriber::set_global_default(builder.json().finish())?;
    } else {
        tracing::subscriber::set_global_default(builder.finish())?;
    }
    Ok(())
}

/// Install the Prometheus recorder
pub fn init_metrics() -> anyhow::Result<PrometheusHandle> {
    PrometheusBuilder::new()
        .install_recorder()
        .context("Failed to install Prometheus recorder")
}

/// Run the monitor, the alert loop and the HTTP server until Ctrl-C
pub async fn run(settings: Settings, metrics: Option<PrometheusHandle>) -> anyhow::Result<()> {
    settings.alert.validate()?;

    let classifier = settings.classifier.clone();
    let load: ClassifierLoad = Box::pin(async move { load_classifier(&classifier).await });
    let (monitor, client) = Monitor::from_config(settings.pipeline.clone(), &settings.face, load)?;
    let monitor_task = tokio::spawn(monitor.with_source(settings.source.clone()).run());

    let notifier: Arc<dyn AlertNotifier> = if settings.alert.bell {
        Arc::new(MeteredNotifier::new(BellNotifier::new(LogNotifier)))
    } else {
        Arc::new(MeteredNotifier::new(LogNotifier))
    };
    let alert_task = tokio::spawn(run_alert_loop(
        client.alerting(),
        notifier,
        settings.alert.tone.clone(),
        settings.alert.interval(),
    ));

    let state = Arc::new(AppState::new(client.clone(), settings.alert.tone.clone(), metrics));
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&settings.server.bind)
        .await
        .with_context(|| format!("Failed to bind {}", settings.server.bind))?;
    info!("Starting API server on {}", settings.server.bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Err(e) = client.shutdown().await {
        warn!("Monitor already stopped: {}", e);
    }
    drop(client);

    let stats = monitor_task.await??;
    let cues = alert_task.await?;
    info!(
        "Shut down after {} frames ({} classified), {} alert cues",
        stats.frames_processed, stats.frames_classified, cues
    );
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
