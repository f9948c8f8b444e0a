//! In-memory control plane for tests
//!
//! Records every call so tests can assert on how many round-trips an
//! operation issued, and can be told to fail specific operations or deletes.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;

use crate::control_plane::{async_trait, ControlPlane, RESTARTED_AT_ANNOTATION};
use crate::error::ControlPlaneError;
use crate::models::{ContainerState, ContainerStatus, NodeMetricSample, PodPhase, PodSummary, Workload};

/// A recorded write against the fake
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Write {
    Scale {
        namespace: String,
        name: String,
        replicas: i32,
    },
    Restart {
        namespace: String,
        name: String,
        timestamp: String,
    },
    DeletePod {
        namespace: String,
        name: String,
    },
}

#[derive(Default)]
struct State {
    workloads: Vec<Workload>,
    pods: Vec<(PodSummary, BTreeMap<String, String>)>,
    /// Keyed by container; `None` is served for every container of the pod
    logs: HashMap<(String, String, Option<String>), String>,
    node_metrics: Vec<NodeMetricSample>,
    allocatable: HashMap<String, String>,
    failing_operations: HashSet<&'static str>,
    failing_deletes: HashSet<(String, String)>,
    calls: HashMap<&'static str, usize>,
    writes: Vec<Write>,
}

#[derive(Default)]
pub struct FakeControlPlane {
    state: Mutex<State>,
}

impl FakeControlPlane {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_workload(&self, workload: Workload) {
        self.state.lock().unwrap().workloads.push(workload);
    }

    pub fn add_pod(&self, pod: PodSummary, labels: BTreeMap<String, String>) {
        self.state.lock().unwrap().pods.push((pod, labels));
    }

    pub fn set_log(&self, namespace: &str, pod_name: &str, text: &str) {
        self.state.lock().unwrap().logs.insert(
            (namespace.to_string(), pod_name.to_string(), None),
            text.to_string(),
        );
    }

    pub fn set_container_log(&self, namespace: &str, pod_name: &str, container: &str, text: &str) {
        self.state.lock().unwrap().logs.insert(
            (
                namespace.to_string(),
                pod_name.to_string(),
                Some(container.to_string()),
            ),
            text.to_string(),
        );
    }

    pub fn add_node(&self, name: &str, cpu: &str, memory: &str, allocatable: Option<&str>) {
        let mut state = self.state.lock().unwrap();
        state.node_metrics.push(NodeMetricSample {
            name: name.to_string(),
            cpu_usage: cpu.to_string(),
            memory_usage: memory.to_string(),
            memory_allocatable: None,
        });
        if let Some(allocatable) = allocatable {
            state
                .allocatable
                .insert(name.to_string(), allocatable.to_string());
        }
    }

    /// Make every call of `operation` fail
    pub fn fail_operation(&self, operation: &'static str) {
        self.state.lock().unwrap().failing_operations.insert(operation);
    }

    pub fn recover_operation(&self, operation: &'static str) {
        self.state.lock().unwrap().failing_operations.remove(operation);
    }

    /// Make the delete of one specific pod fail
    pub fn fail_delete_of(&self, namespace: &str, name: &str) {
        self.state
            .lock()
            .unwrap()
            .failing_deletes
            .insert((namespace.to_string(), name.to_string()));
    }

    /// Number of times `operation` was invoked, failed calls included
    pub fn calls(&self, operation: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .calls
            .get(operation)
            .copied()
            .unwrap_or(0)
    }

    pub fn writes(&self) -> Vec<Write> {
        self.state.lock().unwrap().writes.clone()
    }

    pub fn pod_names(&self) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .pods
            .iter()
            .map(|(p, _)| p.name.clone())
            .collect()
    }

    fn enter(&self, operation: &'static str) -> Result<std::sync::MutexGuard<'_, State>, ControlPlaneError> {
        let mut state = self.state.lock().unwrap();
        *state.calls.entry(operation).or_insert(0) += 1;
        if state.failing_operations.contains(operation) {
            return Err(ControlPlaneError::new(operation, "injected failure"));
        }
        Ok(state)
    }
}

fn selector_matches(selector: &str, labels: &BTreeMap<String, String>) -> bool {
    selector
        .split(',')
        .filter(|term| !term.is_empty())
        .all(|term| match term.split_once('=') {
            Some((k, v)) => labels.get(k).map(String::as_str) == Some(v),
            None => false,
        })
}

#[async_trait]
impl ControlPlane for FakeControlPlane {
    async fn list_workloads(&self) -> Result<Vec<Workload>, ControlPlaneError> {
        Ok(self.enter("list_workloads")?.workloads.clone())
    }

    async fn read_workload(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Workload, ControlPlaneError> {
        self.enter("read_workload")?
            .workloads
            .iter()
            .find(|w| w.namespace == namespace && w.name == name)
            .cloned()
            .ok_or_else(|| ControlPlaneError::new("read_workload", "deployment not found"))
    }

    async fn list_pods_by_selector(
        &self,
        namespace: &str,
        label_selector: &str,
    ) -> Result<Vec<PodSummary>, ControlPlaneError> {
        Ok(self
            .enter("list_pods_by_selector")?
            .pods
            .iter()
            .filter(|(p, labels)| {
                p.namespace == namespace && selector_matches(label_selector, labels)
            })
            .map(|(p, _)| p.clone())
            .collect())
    }

    async fn list_all_pods(&self) -> Result<Vec<PodSummary>, ControlPlaneError> {
        Ok(self
            .enter("list_all_pods")?
            .pods
            .iter()
            .map(|(p, _)| p.clone())
            .collect())
    }

    async fn patch_workload_replicas(
        &self,
        namespace: &str,
        name: &str,
        replicas: i32,
    ) -> Result<(), ControlPlaneError> {
        let mut state = self.enter("patch_workload_replicas")?;
        let workload = state
            .workloads
            .iter_mut()
            .find(|w| w.namespace == namespace && w.name == name)
            .ok_or_else(|| ControlPlaneError::new("patch_workload_replicas", "deployment not found"))?;
        workload.replicas = replicas;
        state.writes.push(Write::Scale {
            namespace: namespace.to_string(),
            name: name.to_string(),
            replicas,
        });
        Ok(())
    }

    async fn patch_workload_restart(
        &self,
        namespace: &str,
        name: &str,
        timestamp: &str,
    ) -> Result<(), ControlPlaneError> {
        let mut state = self.enter("patch_workload_restart")?;
        let workload = state
            .workloads
            .iter_mut()
            .find(|w| w.namespace == namespace && w.name == name)
            .ok_or_else(|| ControlPlaneError::new("patch_workload_restart", "deployment not found"))?;
        workload
            .annotations
            .insert(RESTARTED_AT_ANNOTATION.to_string(), timestamp.to_string());
        state.writes.push(Write::Restart {
            namespace: namespace.to_string(),
            name: name.to_string(),
            timestamp: timestamp.to_string(),
        });
        Ok(())
    }

    async fn delete_pod(&self, namespace: &str, name: &str) -> Result<(), ControlPlaneError> {
        let mut state = self.enter("delete_pod")?;
        if state
            .failing_deletes
            .contains(&(namespace.to_string(), name.to_string()))
        {
            return Err(ControlPlaneError::new("delete_pod", "injected delete failure"));
        }
        state
            .pods
            .retain(|(p, _)| !(p.namespace == namespace && p.name == name));
        state.writes.push(Write::DeletePod {
            namespace: namespace.to_string(),
            name: name.to_string(),
        });
        Ok(())
    }

    async fn read_pod_log(
        &self,
        namespace: &str,
        name: &str,
        container: Option<&str>,
    ) -> Result<String, ControlPlaneError> {
        let state = self.enter("read_pod_log")?;

        let container_count = state
            .pods
            .iter()
            .find(|(p, _)| p.namespace == namespace && p.name == name)
            .map(|(p, _)| p.containers.len())
            .unwrap_or(0);
        if container.is_none() && container_count > 1 {
            return Err(ControlPlaneError::new(
                "read_pod_log",
                "a container name must be specified",
            ));
        }

        let lookup = |c: Option<&str>| {
            state
                .logs
                .get(&(namespace.to_string(), name.to_string(), c.map(str::to_string)))
        };
        Ok(container
            .and_then(|c| lookup(Some(c)))
            .or_else(|| lookup(None))
            .cloned()
            .unwrap_or_default())
    }

    async fn list_node_metrics(&self) -> Result<Vec<NodeMetricSample>, ControlPlaneError> {
        Ok(self.enter("list_node_metrics")?.node_metrics.clone())
    }

    async fn read_node_allocatable_memory(
        &self,
        name: &str,
    ) -> Result<Option<String>, ControlPlaneError> {
        Ok(self.enter("read_node")?.allocatable.get(name).cloned())
    }
}

/// Deployment fixture selecting pods labelled `app=<name>`
pub fn workload(namespace: &str, name: &str, replicas: i32) -> Workload {
    Workload {
        namespace: namespace.to_string(),
        name: name.to_string(),
        replicas,
        ready_replicas: replicas,
        available_replicas: replicas,
        selector: BTreeMap::from([("app".to_string(), name.to_string())]),
        annotations: BTreeMap::new(),
    }
}

/// Pod fixture with one running container
pub fn pod(namespace: &str, name: &str, phase: PodPhase) -> PodSummary {
    PodSummary {
        namespace: namespace.to_string(),
        name: name.to_string(),
        phase,
        node_name: Some("node-1".to_string()),
        containers: vec![ContainerStatus {
            name: "app".to_string(),
            state: ContainerState::Running,
            restart_count: 0,
        }],
    }
}

/// Pod fixture with one running container per name in `containers`
pub fn multi_container_pod(namespace: &str, name: &str, containers: &[&str]) -> PodSummary {
    PodSummary {
        containers: containers
            .iter()
            .map(|c| ContainerStatus {
                name: c.to_string(),
                state: ContainerState::Running,
                restart_count: 0,
            })
            .collect(),
        ..pod(namespace, name, PodPhase::Running)
    }
}

/// Pod fixture whose single container is waiting for `reason`
pub fn waiting_pod(namespace: &str, name: &str, reason: &str) -> PodSummary {
    PodSummary {
        containers: vec![ContainerStatus {
            name: "app".to_string(),
            state: ContainerState::Waiting {
                reason: Some(reason.to_string()),
                message: Some(format!("{} for test", reason)),
            },
            restart_count: 1,
        }],
        ..pod(namespace, name, PodPhase::Pending)
    }
}

/// `app=<name>` label set
pub fn app_labels(name: &str) -> BTreeMap<String, String> {
    BTreeMap::from([("app".to_string(), name.to_string())])
}
