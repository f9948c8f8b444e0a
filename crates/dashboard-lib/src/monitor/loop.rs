//! Health monitor scan loop
//!
//! A scan lists every pod in the cluster, raises an alert for each container
//! stuck in a waiting state other than `ContainerCreating`, and one alert
//! per pod whose recent logs mention an error. Scans never overlap: a tick
//! that fires while the previous scan is still running is skipped.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, Mutex};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use super::{AlertToggle, Notifier};
use crate::dashboard::Dashboard;
use crate::health::{components, HealthRegistry};
use crate::models::{Alert, ContainerState, PodSummary};
use crate::observability::{DashboardMetrics, StructuredLogger};

/// Configuration for the health monitor
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Time between scans (default: 60 seconds)
    pub interval: Duration,
    /// Waiting reasons that are part of normal startup and never alert
    pub ignored_waiting_reasons: Vec<String>,
    /// Case-insensitive marker searched for in pod logs
    pub error_marker: String,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            ignored_waiting_reasons: vec!["ContainerCreating".to_string()],
            error_marker: "error".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    Idle,
    Scanning,
}

/// What a single tick did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// Alerting is switched off; nothing was scanned
    Disabled,
    /// A previous scan was still running
    Skipped,
    Completed {
        pods: usize,
        alerts: Vec<Alert>,
        delivered: usize,
        failed: usize,
    },
}

pub struct HealthMonitor {
    dashboard: Dashboard,
    notifier: Arc<dyn Notifier>,
    toggle: AlertToggle,
    health: HealthRegistry,
    metrics: DashboardMetrics,
    logger: StructuredLogger,
    config: MonitorConfig,
    /// Held for the duration of a scan
    scan_lock: Mutex<()>,
}

impl HealthMonitor {
    pub fn new(
        dashboard: Dashboard,
        notifier: Arc<dyn Notifier>,
        toggle: AlertToggle,
        health: HealthRegistry,
        config: MonitorConfig,
    ) -> Self {
        Self {
            dashboard,
            notifier,
            toggle,
            health,
            metrics: DashboardMetrics::new(),
            logger: StructuredLogger::new("health-monitor"),
            config,
            scan_lock: Mutex::new(()),
        }
    }

    pub fn toggle(&self) -> &AlertToggle {
        &self.toggle
    }

    pub fn state(&self) -> MonitorState {
        if self.scan_lock.try_lock().is_ok() {
            MonitorState::Idle
        } else {
            MonitorState::Scanning
        }
    }

    /// Run one scan now, unless alerting is off or a scan is in progress
    pub async fn tick(&self) -> TickOutcome {
        // Log entries are valid for a single polling cycle, whether or not
        // this cycle scans.
        self.dashboard.cache().pod_logs.invalidate();

        if !self.toggle.is_enabled() {
            debug!("Alerting disabled, skipping scan");
            return TickOutcome::Disabled;
        }

        let _scanning = match self.scan_lock.try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                warn!("Previous scan still running, skipping tick");
                return TickOutcome::Skipped;
            }
        };

        let start = Instant::now();

        let pods = match self.dashboard.control_plane().list_all_pods().await {
            Ok(pods) => pods,
            Err(e) => {
                warn!(error = %e, "Monitor could not list pods");
                self.metrics.inc_control_plane_error(e.operation);
                self.health
                    .set_degraded(components::MONITOR, e.to_string())
                    .await;
                return TickOutcome::Completed {
                    pods: 0,
                    alerts: Vec::new(),
                    delivered: 0,
                    failed: 0,
                };
            }
        };

        let mut alerts = self.waiting_alerts(&pods);
        for pod in &pods {
            if let Some(alert) = self.log_alert(pod).await {
                alerts.push(alert);
            }
        }

        let (delivered, failed) = self.dispatch(&alerts).await;

        let elapsed = start.elapsed();
        self.metrics.observe_scan_latency(elapsed.as_secs_f64());
        self.metrics.set_pods_scanned(pods.len() as i64);
        self.logger
            .log_scan(pods.len(), alerts.len(), failed, elapsed.as_millis());
        self.health.set_healthy(components::MONITOR).await;

        TickOutcome::Completed {
            pods: pods.len(),
            alerts,
            delivered,
            failed,
        }
    }

    /// One alert per container waiting for an unexpected reason
    fn waiting_alerts(&self, pods: &[PodSummary]) -> Vec<Alert> {
        let mut alerts = Vec::new();

        for pod in pods {
            for container in &pod.containers {
                if let ContainerState::Waiting { reason, message } = &container.state {
                    let reason = reason.as_deref().unwrap_or("Unknown");
                    if self
                        .config
                        .ignored_waiting_reasons
                        .iter()
                        .any(|ignored| ignored == reason)
                    {
                        continue;
                    }
                    alerts.push(Alert::container_waiting(
                        pod,
                        &container.name,
                        reason,
                        message.as_deref(),
                    ));
                }
            }
        }

        alerts
    }

    /// At most one alert per pod, however many of its containers log an error
    async fn log_alert(&self, pod: &PodSummary) -> Option<Alert> {
        let marker = self.config.error_marker.to_lowercase();

        // Pods without container statuses yet are read without a name.
        let containers: Vec<Option<&str>> = if pod.containers.is_empty() {
            vec![None]
        } else {
            pod.containers.iter().map(|c| Some(c.name.as_str())).collect()
        };

        for container in containers {
            let Some(logs) = self
                .dashboard
                .pod_logs(&pod.namespace, &pod.name, container)
                .await
            else {
                continue;
            };

            if logs.to_lowercase().contains(&marker) {
                return Some(Alert::log_error(pod));
            }
        }

        None
    }

    /// Deliver each alert independently; returns (delivered, failed)
    async fn dispatch(&self, alerts: &[Alert]) -> (usize, usize) {
        let mut delivered = 0;
        let mut failed = 0;
        let kind_of = |a: &Alert| a.kind.to_string();

        for alert in alerts {
            match self.notifier.notify(alert).await {
                Ok(()) => {
                    delivered += 1;
                    self.metrics.inc_alerts_sent();
                    self.logger
                        .log_alert(&kind_of(alert), &alert.namespace, &alert.pod_name, true);
                }
                Err(e) => {
                    failed += 1;
                    self.metrics.inc_alerts_failed();
                    warn!(error = %e, pod_name = %alert.pod_name, "Failed to deliver alert");
                    self.logger
                        .log_alert(&kind_of(alert), &alert.namespace, &alert.pod_name, false);
                }
            }
        }

        if failed > 0 {
            self.health
                .set_degraded(
                    components::NOTIFIER,
                    format!("{} of {} alerts failed", failed, alerts.len()),
                )
                .await;
        } else if delivered > 0 {
            self.health.set_healthy(components::NOTIFIER).await;
        }

        (delivered, failed)
    }

    /// Tick on the configured interval until shutdown
    pub async fn run(self: Arc<Self>, mut shutdown: broadcast::Receiver<()>) {
        info!(
            interval_secs = self.config.interval.as_secs(),
            "Starting health monitor"
        );

        let mut ticker = interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut scans = JoinSet::new();

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    // Spawned so a slow scan cannot delay the next tick;
                    // overlapping ticks are rejected by the scan lock.
                    let monitor = self.clone();
                    scans.spawn(async move { monitor.tick().await });
                }
                Some(finished) = scans.join_next() => {
                    if let Err(e) = finished {
                        error!(error = %e, "Health monitor scan task failed");
                        self.health
                            .set_unhealthy(components::MONITOR, format!("scan task failed: {}", e))
                            .await;
                    }
                }
                _ = shutdown.recv() => {
                    info!("Shutting down health monitor");
                    break;
                }
            }
        }

        scans.shutdown().await;
    }

    /// Start the loop on its own task
    pub fn spawn(self: Arc<Self>) -> MonitorHandle {
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let task = tokio::spawn(self.run(shutdown_rx));
        MonitorHandle { shutdown_tx, task }
    }
}

/// Handle to a running monitor loop
pub struct MonitorHandle {
    shutdown_tx: broadcast::Sender<()>,
    task: JoinHandle<()>,
}

impl MonitorHandle {
    /// Stop the loop and wait for it to exit
    pub async fn stop(self) {
        let _ = self.shutdown_tx.send(());
        if let Err(e) = self.task.await {
            warn!(error = %e, "Health monitor task ended abnormally");
        }
    }
}

/// Builder for creating the health monitor
pub struct HealthMonitorBuilder {
    dashboard: Option<Dashboard>,
    notifier: Option<Arc<dyn Notifier>>,
    toggle: AlertToggle,
    health: HealthRegistry,
    config: MonitorConfig,
}

impl HealthMonitorBuilder {
    pub fn new() -> Self {
        Self {
            dashboard: None,
            notifier: None,
            toggle: AlertToggle::default(),
            health: HealthRegistry::new(),
            config: MonitorConfig::default(),
        }
    }

    pub fn dashboard(mut self, dashboard: Dashboard) -> Self {
        self.dashboard = Some(dashboard);
        self
    }

    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn toggle(mut self, toggle: AlertToggle) -> Self {
        self.toggle = toggle;
        self
    }

    pub fn health(mut self, health: HealthRegistry) -> Self {
        self.health = health;
        self
    }

    pub fn interval(mut self, interval: Duration) -> Self {
        self.config.interval = interval;
        self
    }

    pub fn config(mut self, config: MonitorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Result<HealthMonitor, &'static str> {
        let dashboard = self.dashboard.ok_or("dashboard is required")?;
        let notifier = self.notifier.ok_or("notifier is required")?;

        Ok(HealthMonitor::new(
            dashboard,
            notifier,
            self.toggle,
            self.health,
            self.config,
        ))
    }
}

impl Default for HealthMonitorBuilder {
    fn default() -> Self {
        Self::new()
    }
}
