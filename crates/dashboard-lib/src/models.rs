//! Core data models for the dashboard
//!
//! These are snapshots of control-plane objects, reduced to the fields the
//! dashboard renders or acts on.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Deployment snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workload {
    pub namespace: String,
    pub name: String,
    pub replicas: i32,
    pub ready_replicas: i32,
    pub available_replicas: i32,
    /// `matchLabels` of the deployment's pod selector
    pub selector: BTreeMap<String, String>,
    /// Pod template annotations
    pub annotations: BTreeMap<String, String>,
}

impl Workload {
    /// Selector in the `k=v,k2=v2` form accepted by list calls
    pub fn label_selector(&self) -> String {
        self.selector
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Pod lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PodPhase {
    Pending,
    Running,
    Succeeded,
    Failed,
    Error,
    Unknown,
}

impl PodPhase {
    pub fn parse(phase: &str) -> Self {
        match phase {
            "Pending" => PodPhase::Pending,
            "Running" => PodPhase::Running,
            "Succeeded" => PodPhase::Succeeded,
            "Failed" => PodPhase::Failed,
            "Error" => PodPhase::Error,
            _ => PodPhase::Unknown,
        }
    }

    /// Pods in these phases are removed by the bulk cleanup
    pub fn is_cleanup_candidate(&self) -> bool {
        matches!(
            self,
            PodPhase::Error | PodPhase::Succeeded | PodPhase::Failed
        )
    }
}

impl fmt::Display for PodPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PodPhase::Pending => "Pending",
            PodPhase::Running => "Running",
            PodPhase::Succeeded => "Succeeded",
            PodPhase::Failed => "Failed",
            PodPhase::Error => "Error",
            PodPhase::Unknown => "Unknown",
        };
        f.write_str(s)
    }
}

/// State of a single container
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum ContainerState {
    Waiting {
        reason: Option<String>,
        message: Option<String>,
    },
    Running,
    Terminated {
        reason: Option<String>,
        exit_code: i32,
    },
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerStatus {
    pub name: String,
    pub state: ContainerState,
    pub restart_count: i32,
}

/// Pod snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PodSummary {
    pub namespace: String,
    pub name: String,
    pub phase: PodPhase,
    pub node_name: Option<String>,
    pub containers: Vec<ContainerStatus>,
}

impl PodSummary {
    pub fn restart_count(&self) -> i32 {
        self.containers.iter().map(|c| c.restart_count).sum()
    }
}

/// Raw node usage joined with the node's allocatable memory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeMetricSample {
    pub name: String,
    pub cpu_usage: String,
    pub memory_usage: String,
    pub memory_allocatable: Option<String>,
}

/// Human-readable node utilization row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayMetric {
    pub name: String,
    pub cpu_usage: String,
    pub cpu_usage_percent: String,
    pub memory_usage: String,
    pub memory_usage_percent: String,
}

/// Alert classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    ContainerWaiting,
    LogError,
}

impl fmt::Display for AlertKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertKind::ContainerWaiting => write!(f, "container_waiting"),
            AlertKind::LogError => write!(f, "log_error"),
        }
    }
}

/// Alert produced by the health monitor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    pub kind: AlertKind,
    pub namespace: String,
    pub pod_name: String,
    pub message: String,
}

impl Alert {
    pub fn container_waiting(
        pod: &PodSummary,
        container: &str,
        reason: &str,
        message: Option<&str>,
    ) -> Self {
        Self {
            kind: AlertKind::ContainerWaiting,
            namespace: pod.namespace.clone(),
            pod_name: pod.name.clone(),
            message: format!(
                "Pod {} in namespace {} has container {} waiting: {} - {}",
                pod.name,
                pod.namespace,
                container,
                reason,
                message.unwrap_or("no message"),
            ),
        }
    }

    pub fn log_error(pod: &PodSummary) -> Self {
        Self {
            kind: AlertKind::LogError,
            namespace: pod.namespace.clone(),
            pod_name: pod.name.clone(),
            message: format!(
                "Error found in logs of pod {} in namespace {}",
                pod.name, pod.namespace
            ),
        }
    }
}

/// Result of a bulk cleanup
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteReport {
    /// `namespace/name` of every pod removed
    pub deleted: Vec<String>,
    /// `namespace/name` of every pod whose delete call failed
    pub failed: Vec<String>,
}

impl DeleteReport {
    pub fn attempted(&self) -> usize {
        self.deleted.len() + self.failed.len()
    }
}
