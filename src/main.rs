use anyhow::Context as _;
use restart_tracker::config::{LogSourceKind, TrackerConfig};
use restart_tracker::notifier::NtfyNotifier;
use restart_tracker::server::{
    create_metrics, run_server, shutdown_channel, wait_for_signal, AppState, ReadinessState,
};
use restart_tracker::tracker::clock::SystemClock;
use restart_tracker::tracker::{
    run_eviction_sweeper, KubeApiLogSource, KubectlLogSource, LogSource, Tracker,
};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Build the log source selected by `LOG_SOURCE`
///
/// An unreachable Kubernetes API disables log collection instead of failing
/// startup; alerts still go out without the log block.
pub async fn build_log_source(config: &TrackerConfig) -> Option<Arc<dyn LogSource>> {
    match config.log_source {
        LogSourceKind::Kubectl => Some(Arc::new(KubectlLogSource::new(
            config.log_fetch_timeout,
        ))),
        LogSourceKind::Api => match kube::Client::try_default().await {
            Ok(client) => {
                info!("Connected to Kubernetes API for log collection");
                Some(Arc::new(KubeApiLogSource::new(
                    client,
                    config.log_fetch_timeout,
                )))
            }
            Err(e) => {
                warn!(error = %e, "Kubernetes client unavailable, log collection disabled");
                None
            }
        },
        LogSourceKind::Disabled => None,
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // Already installed means another component picked the same provider first
    let _ = rustls::crypto::ring::default_provider().install_default();

    let config = match TrackerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            return Err(e.into());
        }
    };

    info!(
        cluster = %config.cluster_name,
        ntfy_url = %config.ntfy_url,
        ntfy_topic = %config.ntfy_topic,
        restart_threshold = config.restart_threshold,
        time_window_minutes = config.time_window_minutes(),
        log_source = ?config.log_source,
        "Starting pod restart tracker"
    );

    // Create shutdown channel for coordinated shutdown
    let (shutdown_controller, shutdown_signal) = shutdown_channel();

    // Create readiness state (initially not ready)
    let readiness = ReadinessState::new();

    let metrics = create_metrics().context("Failed to create metrics registry")?;
    info!("Prometheus metrics registry initialized");

    let notifier = Arc::new(NtfyNotifier::new(
        &config.ntfy_url,
        &config.ntfy_topic,
        config.notify_timeout,
    ));
    let mut tracker = Tracker::new(
        config.clone(),
        notifier,
        Arc::new(SystemClock),
        Some(metrics.clone()),
    );
    match build_log_source(&config).await {
        Some(source) => tracker = tracker.with_log_source(source),
        None => info!("Log collection disabled"),
    }
    let tracker = Arc::new(tracker);

    if config.startup_notification {
        tracker.announce_startup().await;
    }

    let sweeper_handle = tokio::spawn(run_eviction_sweeper(
        tracker.clone(),
        shutdown_signal.clone(),
    ));

    let state = AppState::new(tracker.clone(), readiness.clone(), metrics);
    let port = config.port;
    let mut server_handle =
        tokio::spawn(async move { run_server(port, state, shutdown_signal).await });
    readiness.set_ready();

    // Run until a termination signal arrives or the server exits on its own
    let server_result = tokio::select! {
        result = &mut server_handle => Some(result),
        signal = wait_for_signal() => {
            info!(signal = signal, "Initiating graceful shutdown");
            None
        }
    };

    // Mark not ready so K8s stops sending traffic during shutdown
    readiness.set_not_ready();
    shutdown_controller.shutdown();

    info!("Stopping components...");
    let server_result = match server_result {
        Some(result) => result,
        None => server_handle.await,
    };
    if let Err(e) = sweeper_handle.await {
        warn!(error = %e, "Eviction sweeper ended abnormally");
    }

    match server_result {
        Ok(Ok(())) => {
            info!("Restart tracker shut down gracefully");
            Ok(())
        }
        Ok(Err(e)) => {
            error!(error = %e, "HTTP server failed");
            Err(e.into())
        }
        Err(e) => {
            error!(error = %e, "HTTP server task failed");
            Err(e.into())
        }
    }
}

#[cfg(test)]
#[path = "main_test.rs"]
mod tests;
