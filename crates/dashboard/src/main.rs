//! Kube Dashboard - web dashboard for cluster workloads
//!
//! Serves the workload pages and actions over HTTP and runs the background
//! health monitor that posts pod alerts to a chat webhook.

use anyhow::{Context, Result};
use dashboard_lib::{
    cache::ReadCache,
    control_plane::{ControlPlane, KubeControlPlane},
    health::{components, HealthRegistry},
    monitor::{AlertToggle, HealthMonitorBuilder, LogNotifier, Notifier, WebhookNotifier},
    observability::{DashboardMetrics, StructuredLogger},
    Dashboard,
};
use kube_dashboard::{api, config::DashboardConfig};
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use url::Url;

const DASHBOARD_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting kube-dashboard");

    let config = DashboardConfig::load()?;
    info!(
        listen_port = config.listen_port,
        poll_interval_secs = config.poll_interval_secs,
        webhook_configured = config.webhook_url.is_some(),
        "Dashboard configured"
    );

    let health_registry = HealthRegistry::new();
    health_registry.register(components::CONTROL_PLANE).await;
    health_registry.register(components::MONITOR).await;
    health_registry.register(components::NOTIFIER).await;

    let metrics = DashboardMetrics::new();
    let logger = StructuredLogger::new("kube-dashboard");

    let control_plane: Arc<dyn ControlPlane> = Arc::new(
        KubeControlPlane::connect(&config.client_settings())
            .await
            .context("Failed to create Kubernetes client")?,
    );

    let dashboard = Dashboard::new(
        control_plane,
        Arc::new(ReadCache::new(metrics.clone())),
        health_registry.clone(),
        metrics,
        logger.clone(),
    );
    let toggle = AlertToggle::new(config.alerts_enabled);

    let notifier: Arc<dyn Notifier> = match &config.webhook_url {
        Some(raw) => {
            let url = Url::parse(raw).context("Invalid webhook URL")?;
            Arc::new(WebhookNotifier::new(url, config.webhook_timeout())?)
        }
        None => {
            warn!("No webhook configured; alerts will only be logged");
            Arc::new(LogNotifier)
        }
    };

    let monitor = HealthMonitorBuilder::new()
        .dashboard(dashboard.clone())
        .notifier(notifier)
        .toggle(toggle.clone())
        .health(health_registry.clone())
        .config(config.monitor_config())
        .build()
        .map_err(anyhow::Error::msg)?;
    let monitor_handle = Arc::new(monitor).spawn();

    let app_state = Arc::new(api::AppState::new(
        dashboard,
        toggle,
        health_registry.clone(),
        logger.clone(),
    ));

    health_registry.set_ready(true).await;
    logger.log_startup(DASHBOARD_VERSION, config.listen_port);

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let mut api_handle = tokio::spawn(api::serve(config.listen_port, app_state, async move {
        let _ = stop_rx.await;
    }));

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result?;
            logger.log_shutdown("SIGINT received");
        }
        result = &mut api_handle => {
            monitor_handle.stop().await;
            return result.context("API server task panicked")?;
        }
    }

    health_registry.set_ready(false).await;
    let _ = stop_tx.send(());
    monitor_handle.stop().await;
    api_handle.await.context("API server task panicked")??;

    info!("Shutdown complete");
    Ok(())
}
