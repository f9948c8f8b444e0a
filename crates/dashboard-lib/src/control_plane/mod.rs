//! Access to the orchestration control plane
//!
//! [`ControlPlane`] is the seam between dashboard logic and the cluster API.
//! Production code uses [`KubeControlPlane`]; tests substitute an in-memory
//! implementation.

mod kube_client;
mod node_metrics;

pub use kube_client::{ClientSettings, KubeControlPlane};
pub use node_metrics::NodeMetrics;

use crate::error::ControlPlaneError;
use crate::models::{NodeMetricSample, PodSummary, Workload};

pub use async_trait::async_trait;

/// Annotation the rollout controller watches for restart requests
pub const RESTARTED_AT_ANNOTATION: &str = "kubectl.kubernetes.io/restartedAt";

/// Request/response operations against the control plane.
///
/// Every call is bounded by the client's connect and read timeouts.
#[async_trait]
pub trait ControlPlane: Send + Sync {
    /// Deployments across all namespaces
    async fn list_workloads(&self) -> Result<Vec<Workload>, ControlPlaneError>;

    async fn read_workload(&self, namespace: &str, name: &str)
        -> Result<Workload, ControlPlaneError>;

    async fn list_pods_by_selector(
        &self,
        namespace: &str,
        label_selector: &str,
    ) -> Result<Vec<PodSummary>, ControlPlaneError>;

    /// Pods across all namespaces
    async fn list_all_pods(&self) -> Result<Vec<PodSummary>, ControlPlaneError>;

    async fn patch_workload_replicas(
        &self,
        namespace: &str,
        name: &str,
        replicas: i32,
    ) -> Result<(), ControlPlaneError>;

    /// Set the restart annotation on the pod template to `timestamp`
    async fn patch_workload_restart(
        &self,
        namespace: &str,
        name: &str,
        timestamp: &str,
    ) -> Result<(), ControlPlaneError>;

    async fn delete_pod(&self, namespace: &str, name: &str) -> Result<(), ControlPlaneError>;

    /// Recent log text of a pod. `container` may be omitted for single-container pods.
    async fn read_pod_log(
        &self,
        namespace: &str,
        name: &str,
        container: Option<&str>,
    ) -> Result<String, ControlPlaneError>;

    /// Node usage samples; `memory_allocatable` is left unset
    async fn list_node_metrics(&self) -> Result<Vec<NodeMetricSample>, ControlPlaneError>;

    /// Allocatable memory quantity of a node, if the node reports one
    async fn read_node_allocatable_memory(
        &self,
        name: &str,
    ) -> Result<Option<String>, ControlPlaneError>;
}
