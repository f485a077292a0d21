//! censorbot
//!
//! QQ group moderation agent. Receives IOTQQ events over HTTP, checks group
//! text with a content classifier, reports offending messages to the
//! operator and retracts them according to the operator's settings.

use anyhow::{Context, Result};
use clap::Parser;
use metrics_exporter_prometheus::PrometheusHandle;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::sync::mpsc;
use tracing_appender::non_blocking::WorkerGuard;
use tracing::{info, warn};

use censorbot_policy::{
    CommandRegistry, DecisionEngine, JsonFileSink, PolicyStore, SharedPolicyStore, SignatureSet,
};

mod config;
mod gateway;
mod ingress;
mod router;
mod routes;

use config::BotConfig;
use gateway::IotqqGateway;
use router::EventRouter;

/// How long in-flight events may take to finish after shutdown
const DRAIN_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Parser, Debug)]
#[command(name = "censorbot")]
#[command(about = "QQ group content moderation bot", long_about = None)]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config.yaml")]
    config: String,

    /// Settings file path (overrides `settings_path`)
    #[arg(short, long)]
    settings: Option<PathBuf>,

    /// Listen address for the event webhook
    #[arg(short = 'l', long, default_value = "0.0.0.0")]
    listen: String,

    /// Listen port
    #[arg(short = 'P', long, default_value = "8080")]
    port: u16,

    /// Baidu AIP API key
    #[arg(long, env = "CENSORBOT_BAIDU_API_KEY", hide_env_values = true)]
    baidu_api_key: Option<String>,

    /// Baidu AIP secret key
    #[arg(long, env = "CENSORBOT_BAIDU_SECRET_KEY", hide_env_values = true)]
    baidu_secret_key: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,

    /// Also write debug-level logs to this file
    #[arg(long, env = "CENSORBOT_LOG_FILE")]
    log_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let _log_guard = init_tracing(cli.verbose, cli.json_logs, cli.log_file.as_deref())?;

    info!("Starting censorbot");

    let config = BotConfig::load(&cli.config, &cli)
        .with_context(|| format!("Failed to load configuration from {}", cli.config))?;
    info!("Configuration loaded successfully");
    info!("Web API: {}", config.iotqq.web_api);
    info!("Operator: {}", config.iotqq.report_qq);
    info!("Settings: {}", config.settings_path.display());

    let metrics_handle = init_metrics()?;

    let store = init_store(&config)?;
    let classifier = config.classifier.build()?;
    let gateway = Arc::new(IotqqGateway::new(&config.iotqq)?);
    let engine = Arc::new(
        DecisionEngine::new(SignatureSet::new(config.moderation.signatures.iter())?)
            .with_not_retractable_code(config.moderation.not_retractable_code),
    );

    let router = Arc::new(EventRouter::new(
        config.iotqq.report_qq,
        store,
        engine,
        classifier,
        gateway,
    ));
    let (events, rx) = mpsc::channel(config.moderation.queue_capacity);
    let router_task = tokio::spawn(router.run(rx));

    let addr: SocketAddr = format!("{}:{}", cli.listen, cli.port).parse()?;
    let app = routes::create_router(routes::AppState {
        events,
        metrics: Some(metrics_handle),
    });

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Listening for events on http://{}", addr);

    let shutdown = async {
        shutdown_signal().await;
        warn!("Shutdown signal received, stopping server...");
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    match tokio::time::timeout(DRAIN_TIMEOUT, router_task).await {
        Ok(joined) => joined?,
        Err(_) => warn!("Timed out waiting for in-flight events"),
    }

    info!("Shutdown complete");
    Ok(())
}

/// Load persisted settings, pin the operator and bot ids, write them back
///
/// A settings file that cannot be written is not fatal, the next change
/// retries the save.
fn init_store(config: &BotConfig) -> Result<SharedPolicyStore> {
    let sink = JsonFileSink::new(&config.settings_path);
    let saved = match sink.load() {
        Ok(saved) => saved,
        Err(e) => {
            warn!(error = %e, "Ignoring unreadable settings file");
            None
        }
    };

    let mut store = PolicyStore::new(Arc::new(CommandRegistry::builtin()), Box::new(sink))
        .with_pinned(config.pinned_ids());
    match saved {
        Some(map) => {
            store.load_from(&map);
            info!("Settings loaded");
        }
        None => info!("No saved settings, using defaults"),
    }
    if store.persist().is_err() {
        warn!(
            path = %config.settings_path.display(),
            "Settings not written at startup, will retry on the next change"
        );
    }

    info!(
        whitelist = store.state().whitelist.len(),
        revoke = store.state().revoke,
        censor_all = store.state().censor_all,
        more_sensitive = store.state().more_sensitive,
        min_length = store.state().min_length,
        "Policy ready"
    );
    Ok(store.into_shared())
}

/// Listen for shutdown signals (SIGTERM, SIGINT)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Initialize tracing/logging
///
/// The returned guard flushes the log file when dropped.
fn init_tracing(verbose: bool, json: bool, log_file: Option<&Path>) -> Result<Option<WorkerGuard>> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

    let filter = if verbose {
        EnvFilter::new("censorbot=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("censorbot=info"))
    };

    let console = if json {
        tracing_subscriber::fmt::layer().json().with_filter(filter).boxed()
    } else {
        tracing_subscriber::fmt::layer().with_filter(filter).boxed()
    };

    let (file, guard) = match log_file {
        Some(path) => {
            let (layer, guard) = file_layer(path)?;
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(console)
        .with(file)
        .init();
    Ok(guard)
}

/// Debug-level plain-text layer appending to `path`
fn file_layer<S>(
    path: &Path,
) -> Result<(Box<dyn tracing_subscriber::Layer<S> + Send + Sync>, WorkerGuard)>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a> + 'static,
{
    use tracing_appender::rolling::{RollingFileAppender, Rotation};
    use tracing_subscriber::{EnvFilter, Layer};

    let file_name = path
        .file_name()
        .with_context(|| format!("Invalid log file path: {}", path.display()))?;
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };

    let appender = RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(file_name.to_string_lossy())
        .build(dir)
        .with_context(|| format!("Failed to open log file {}", path.display()))?;
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let layer = tracing_subscriber::fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_filter(EnvFilter::new("censorbot=debug"))
        .boxed();
    Ok((layer, guard))
}

/// Initialize metrics exporter and return handle for rendering
fn init_metrics() -> Result<PrometheusHandle> {
    use metrics_exporter_prometheus::PrometheusBuilder;

    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("Failed to install metrics: {}", e))?;

    metrics::describe_counter!("censorbot_events_total", "Inbound events by kind");
    metrics::describe_counter!(
        "censorbot_actions_total",
        "Moderation actions by disposition"
    );
    metrics::describe_histogram!(
        "censorbot_classifier_latency_us",
        metrics::Unit::Microseconds,
        "Classification latency in microseconds"
    );
    metrics::describe_counter!("censorbot_errors_total", "Errors by kind");

    info!("Metrics exporter initialized");
    Ok(handle)
}
