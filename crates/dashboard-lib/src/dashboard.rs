//! Dashboard operations
//!
//! Reads go through the [`ReadCache`] and degrade to empty results when the
//! control plane fails, so a page can always render with whatever data is
//! available. Mutations are never cached; each issues exactly one write
//! (or one per pod for the bulk cleanup) and then invalidates the read
//! caches whether or not the write succeeded.

use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use tracing::{debug, warn};

use crate::cache::{LogKey, ReadCache, WorkloadKey};
use crate::control_plane::ControlPlane;
use crate::error::{ControlPlaneError, DashboardError};
use crate::health::{components, HealthRegistry};
use crate::models::{DeleteReport, DisplayMetric, NodeMetricSample, PodSummary, Workload};
use crate::normalizer;
use crate::observability::{DashboardMetrics, StructuredLogger};

/// A workload together with the pods its selector matches
#[derive(Debug, Clone, Serialize)]
pub struct WorkloadView {
    pub workload: Workload,
    pub pods: Vec<PodSummary>,
}

/// Everything the index page renders
#[derive(Debug, Clone, Serialize)]
pub struct Overview {
    pub workloads: Vec<WorkloadView>,
    pub node_metrics: Vec<DisplayMetric>,
}

#[derive(Clone)]
pub struct Dashboard {
    control_plane: Arc<dyn ControlPlane>,
    cache: Arc<ReadCache>,
    health: HealthRegistry,
    metrics: DashboardMetrics,
    logger: StructuredLogger,
}

impl Dashboard {
    pub fn new(
        control_plane: Arc<dyn ControlPlane>,
        cache: Arc<ReadCache>,
        health: HealthRegistry,
        metrics: DashboardMetrics,
        logger: StructuredLogger,
    ) -> Self {
        Self {
            control_plane,
            cache,
            health,
            metrics,
            logger,
        }
    }

    pub fn cache(&self) -> &Arc<ReadCache> {
        &self.cache
    }

    pub fn control_plane(&self) -> &Arc<dyn ControlPlane> {
        &self.control_plane
    }

    /// All deployments, or an empty list if the control plane is unreachable
    pub async fn workloads(&self) -> Vec<Workload> {
        let result = self
            .cache
            .workloads
            .get_or_fetch((), || self.control_plane.list_workloads())
            .await;
        self.degrade(result).await.unwrap_or_default()
    }

    /// Pods matched by a deployment's selector
    pub async fn pods_for_workload(&self, namespace: &str, name: &str) -> Vec<PodSummary> {
        let key = WorkloadKey {
            namespace: namespace.to_string(),
            name: name.to_string(),
        };
        let result = self
            .cache
            .pods_by_workload
            .get_or_fetch(key, || async {
                let workload = self.control_plane.read_workload(namespace, name).await?;
                self.control_plane
                    .list_pods_by_selector(namespace, &workload.label_selector())
                    .await
            })
            .await;
        self.degrade(result).await.unwrap_or_default()
    }

    /// Normalized node utilization. Rows that fail to normalize are skipped.
    pub async fn node_metrics(&self) -> Vec<DisplayMetric> {
        let result = self
            .cache
            .node_metrics
            .get_or_fetch((), || self.fetch_node_samples())
            .await;

        let samples = self.degrade(result).await.unwrap_or_default();
        samples
            .iter()
            .filter_map(|sample| match normalizer::normalize(sample) {
                Ok(metric) => Some(metric),
                Err(e) => {
                    warn!(node = %sample.name, error = %e, "Skipping node metric row");
                    self.metrics.inc_metric_rows_skipped();
                    None
                }
            })
            .collect()
    }

    /// Recent logs of a pod, or `None` if they could not be fetched
    pub async fn pod_logs(
        &self,
        namespace: &str,
        pod_name: &str,
        container: Option<&str>,
    ) -> Option<String> {
        let key = LogKey {
            namespace: namespace.to_string(),
            pod_name: pod_name.to_string(),
            container: container.map(str::to_string),
        };
        let result = self
            .cache
            .pod_logs
            .get_or_fetch(key, || {
                self.control_plane.read_pod_log(namespace, pod_name, container)
            })
            .await;
        self.degrade(result).await
    }

    /// Workloads with their pods plus node metrics
    pub async fn overview(&self) -> Overview {
        let mut workloads = Vec::new();
        for workload in self.workloads().await {
            let pods = self
                .pods_for_workload(&workload.namespace, &workload.name)
                .await;
            workloads.push(WorkloadView { workload, pods });
        }

        Overview {
            workloads,
            node_metrics: self.node_metrics().await,
        }
    }

    /// Set a deployment's desired replica count
    pub async fn scale(
        &self,
        namespace: &str,
        name: &str,
        replicas: i32,
    ) -> Result<(), DashboardError> {
        if replicas < 0 {
            return Err(DashboardError::InvalidReplicas(replicas));
        }

        let result = self
            .control_plane
            .patch_workload_replicas(namespace, name, replicas)
            .await;
        self.finish_mutation("scale", namespace, name, result)
    }

    /// Trigger a rolling replacement of a deployment's pods
    pub async fn restart(&self, namespace: &str, name: &str) -> Result<(), DashboardError> {
        let timestamp = restart_timestamp();
        let result = self
            .control_plane
            .patch_workload_restart(namespace, name, &timestamp)
            .await;
        self.finish_mutation("restart", namespace, name, result)
    }

    /// Delete every pod that has failed or run to completion.
    ///
    /// Individual delete failures are logged and recorded in the report;
    /// the remaining pods are still attempted.
    pub async fn delete_failed_pods(&self) -> Result<DeleteReport, DashboardError> {
        let pods = match self.control_plane.list_all_pods().await {
            Ok(pods) => pods,
            Err(e) => {
                self.record_control_plane_error(&e);
                self.cache.invalidate_reads();
                self.metrics.record_mutation("delete_failed_pods", false);
                self.logger
                    .log_mutation("delete_failed_pods", "*", "*", Some(&e));
                return Err(e.into());
            }
        };

        let mut report = DeleteReport::default();
        for pod in pods.iter().filter(|p| p.phase.is_cleanup_candidate()) {
            let id = format!("{}/{}", pod.namespace, pod.name);
            match self.control_plane.delete_pod(&pod.namespace, &pod.name).await {
                Ok(()) => {
                    debug!(pod = %id, phase = %pod.phase, "Deleted pod");
                    report.deleted.push(id);
                }
                Err(e) => {
                    self.record_control_plane_error(&e);
                    self.logger
                        .log_mutation("delete_pod", &pod.namespace, &pod.name, Some(&e));
                    report.failed.push(id);
                }
            }
        }

        self.cache.invalidate_reads();
        self.metrics
            .record_mutation("delete_failed_pods", report.failed.is_empty());
        self.logger.log_mutation("delete_failed_pods", "*", "*", None);
        Ok(report)
    }

    fn finish_mutation(
        &self,
        operation: &str,
        namespace: &str,
        name: &str,
        result: Result<(), ControlPlaneError>,
    ) -> Result<(), DashboardError> {
        self.cache.invalidate_reads();
        self.metrics.record_mutation(operation, result.is_ok());

        match result {
            Ok(()) => {
                self.logger.log_mutation(operation, namespace, name, None);
                Ok(())
            }
            Err(e) => {
                self.record_control_plane_error(&e);
                self.logger.log_mutation(operation, namespace, name, Some(&e));
                Err(e.into())
            }
        }
    }

    /// Usage samples joined with allocatable memory. Any failed node read
    /// fails the whole fetch so a partial join is never memoized.
    async fn fetch_node_samples(&self) -> Result<Vec<NodeMetricSample>, ControlPlaneError> {
        let mut samples = self.control_plane.list_node_metrics().await?;

        for sample in samples.iter_mut() {
            sample.memory_allocatable = self
                .control_plane
                .read_node_allocatable_memory(&sample.name)
                .await?;
        }

        Ok(samples)
    }

    /// Turn a failed read into "no data", updating control-plane health
    async fn degrade<T>(&self, result: Result<T, ControlPlaneError>) -> Option<T> {
        match result {
            Ok(value) => {
                self.health.set_healthy(components::CONTROL_PLANE).await;
                Some(value)
            }
            Err(e) => {
                self.record_control_plane_error(&e);
                self.health
                    .set_degraded(components::CONTROL_PLANE, e.to_string())
                    .await;
                None
            }
        }
    }

    fn record_control_plane_error(&self, e: &ControlPlaneError) {
        warn!(operation = e.operation, error = %e, "Control plane call failed");
        self.metrics.inc_control_plane_error(e.operation);
    }
}

/// RFC3339 UTC timestamp with second precision and a `Z` suffix
pub fn restart_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}
