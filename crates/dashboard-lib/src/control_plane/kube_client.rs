//! [`ControlPlane`] backed by the Kubernetes API via kube-rs

use std::time::Duration;

use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{Node, Pod};
use kube::api::{Api, DeleteParams, ListParams, LogParams, Patch, PatchParams};
use kube::{Client, Config};
use serde_json::json;
use tracing::debug;

use super::{async_trait, ControlPlane, NodeMetrics, RESTARTED_AT_ANNOTATION};
use crate::error::ControlPlaneError;
use crate::models::{ContainerState, ContainerStatus, NodeMetricSample, PodPhase, PodSummary, Workload};

/// Connection settings for the kube client
#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
    /// Number of trailing log lines fetched per pod
    pub log_tail_lines: i64,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(1),
            read_timeout: Duration::from_secs(2),
            log_tail_lines: 100,
        }
    }
}

pub struct KubeControlPlane {
    client: Client,
    log_tail_lines: i64,
}

impl KubeControlPlane {
    pub fn new(client: Client, log_tail_lines: i64) -> Self {
        Self {
            client,
            log_tail_lines,
        }
    }

    /// Build a client from the in-cluster config, falling back to kubeconfig
    pub async fn connect(settings: &ClientSettings) -> Result<Self, ControlPlaneError> {
        let mut config = Config::infer()
            .await
            .map_err(|e| ControlPlaneError::new("infer_config", e))?;
        config.connect_timeout = Some(settings.connect_timeout);
        config.read_timeout = Some(settings.read_timeout);

        let client =
            Client::try_from(config).map_err(|e| ControlPlaneError::new("create_client", e))?;
        debug!(
            connect_timeout_ms = settings.connect_timeout.as_millis(),
            read_timeout_ms = settings.read_timeout.as_millis(),
            "Kubernetes client created"
        );

        Ok(Self::new(client, settings.log_tail_lines))
    }

    fn deployments(&self, namespace: &str) -> Api<Deployment> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn pods(&self, namespace: &str) -> Api<Pod> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

#[async_trait]
impl ControlPlane for KubeControlPlane {
    async fn list_workloads(&self) -> Result<Vec<Workload>, ControlPlaneError> {
        let api: Api<Deployment> = Api::all(self.client.clone());
        let list = api
            .list(&ListParams::default())
            .await
            .map_err(|e| ControlPlaneError::new("list_workloads", e))?;

        Ok(list.items.into_iter().map(workload_from_deployment).collect())
    }

    async fn read_workload(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Workload, ControlPlaneError> {
        let deployment = self
            .deployments(namespace)
            .get(name)
            .await
            .map_err(|e| ControlPlaneError::new("read_workload", e))?;

        Ok(workload_from_deployment(deployment))
    }

    async fn list_pods_by_selector(
        &self,
        namespace: &str,
        label_selector: &str,
    ) -> Result<Vec<PodSummary>, ControlPlaneError> {
        let params = ListParams::default().labels(label_selector);
        let list = self
            .pods(namespace)
            .list(&params)
            .await
            .map_err(|e| ControlPlaneError::new("list_pods_by_selector", e))?;

        Ok(list.items.into_iter().map(summarize_pod).collect())
    }

    async fn list_all_pods(&self) -> Result<Vec<PodSummary>, ControlPlaneError> {
        let api: Api<Pod> = Api::all(self.client.clone());
        let list = api
            .list(&ListParams::default())
            .await
            .map_err(|e| ControlPlaneError::new("list_all_pods", e))?;

        Ok(list.items.into_iter().map(summarize_pod).collect())
    }

    async fn patch_workload_replicas(
        &self,
        namespace: &str,
        name: &str,
        replicas: i32,
    ) -> Result<(), ControlPlaneError> {
        let patch = json!({ "spec": { "replicas": replicas } });
        self.deployments(namespace)
            .patch_scale(name, &PatchParams::default(), &Patch::Merge(&patch))
            .await
            .map_err(|e| ControlPlaneError::new("patch_workload_replicas", e))?;
        Ok(())
    }

    async fn patch_workload_restart(
        &self,
        namespace: &str,
        name: &str,
        timestamp: &str,
    ) -> Result<(), ControlPlaneError> {
        let patch = json!({
            "spec": {
                "template": {
                    "metadata": {
                        "annotations": { RESTARTED_AT_ANNOTATION: timestamp }
                    }
                }
            }
        });
        self.deployments(namespace)
            .patch(name, &PatchParams::default(), &Patch::Merge(&patch))
            .await
            .map_err(|e| ControlPlaneError::new("patch_workload_restart", e))?;
        Ok(())
    }

    async fn delete_pod(&self, namespace: &str, name: &str) -> Result<(), ControlPlaneError> {
        self.pods(namespace)
            .delete(name, &DeleteParams::default())
            .await
            .map_err(|e| ControlPlaneError::new("delete_pod", e))?;
        Ok(())
    }

    async fn read_pod_log(
        &self,
        namespace: &str,
        name: &str,
        container: Option<&str>,
    ) -> Result<String, ControlPlaneError> {
        let params = LogParams {
            container: container.map(str::to_string),
            tail_lines: Some(self.log_tail_lines),
            ..Default::default()
        };

        self.pods(namespace)
            .logs(name, &params)
            .await
            .map_err(|e| ControlPlaneError::new("read_pod_log", e))
    }

    async fn list_node_metrics(&self) -> Result<Vec<NodeMetricSample>, ControlPlaneError> {
        let api: Api<NodeMetrics> = Api::all(self.client.clone());
        let list = api
            .list(&ListParams::default())
            .await
            .map_err(|e| ControlPlaneError::new("list_node_metrics", e))?;

        Ok(list
            .items
            .iter()
            .filter_map(|m| {
                let sample = m.to_sample();
                if sample.is_none() {
                    debug!(node = ?m.metadata.name, "Node metrics without cpu/memory usage");
                }
                sample
            })
            .collect())
    }

    async fn read_node_allocatable_memory(
        &self,
        name: &str,
    ) -> Result<Option<String>, ControlPlaneError> {
        let api: Api<Node> = Api::all(self.client.clone());
        let node = api
            .get(name)
            .await
            .map_err(|e| ControlPlaneError::new("read_node", e))?;

        Ok(node
            .status
            .and_then(|s| s.allocatable)
            .and_then(|allocatable| allocatable.get("memory").map(|q| q.0.clone())))
    }
}

fn workload_from_deployment(deployment: Deployment) -> Workload {
    let spec = deployment.spec.unwrap_or_default();
    let status = deployment.status.unwrap_or_default();

    Workload {
        namespace: deployment.metadata.namespace.unwrap_or_default(),
        name: deployment.metadata.name.unwrap_or_default(),
        replicas: spec.replicas.unwrap_or(1),
        ready_replicas: status.ready_replicas.unwrap_or(0),
        available_replicas: status.available_replicas.unwrap_or(0),
        selector: spec.selector.match_labels.unwrap_or_default(),
        annotations: spec
            .template
            .metadata
            .and_then(|m| m.annotations)
            .unwrap_or_default(),
    }
}

fn summarize_pod(pod: Pod) -> PodSummary {
    let status = pod.status.unwrap_or_default();

    let containers = status
        .container_statuses
        .unwrap_or_default()
        .into_iter()
        .map(|cs| {
            let state = match cs.state {
                Some(s) if s.waiting.is_some() => {
                    let waiting = s.waiting.unwrap_or_default();
                    ContainerState::Waiting {
                        reason: waiting.reason,
                        message: waiting.message,
                    }
                }
                Some(s) if s.running.is_some() => ContainerState::Running,
                Some(s) => match s.terminated {
                    Some(t) => ContainerState::Terminated {
                        reason: t.reason,
                        exit_code: t.exit_code,
                    },
                    None => ContainerState::Unknown,
                },
                None => ContainerState::Unknown,
            };

            ContainerStatus {
                name: cs.name,
                state,
                restart_count: cs.restart_count,
            }
        })
        .collect();

    PodSummary {
        namespace: pod.metadata.namespace.unwrap_or_default(),
        name: pod.metadata.name.unwrap_or_default(),
        phase: status
            .phase
            .as_deref()
            .map(PodPhase::parse)
            .unwrap_or(PodPhase::Unknown),
        node_name: pod.spec.and_then(|s| s.node_name),
        containers,
    }
}
