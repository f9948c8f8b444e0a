//! `metrics.k8s.io/v1beta1` NodeMetrics, which k8s-openapi does not ship

use k8s_openapi::apimachinery::pkg::{api::resource::Quantity, apis::meta::v1::ObjectMeta};
use k8s_openapi::ClusterResourceScope;
use kube::core::Resource;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::BTreeMap;

use crate::models::NodeMetricSample;

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct NodeMetrics {
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub window: Option<String>,
    #[serde(default)]
    pub usage: BTreeMap<String, Quantity>,
}

impl NodeMetrics {
    /// Raw usage sample, or `None` when the node reported no cpu/memory usage
    pub fn to_sample(&self) -> Option<NodeMetricSample> {
        let name = self.metadata.name.clone()?;
        let cpu = self.usage.get("cpu")?;
        let memory = self.usage.get("memory")?;

        Some(NodeMetricSample {
            name,
            cpu_usage: cpu.0.clone(),
            memory_usage: memory.0.clone(),
            memory_allocatable: None,
        })
    }
}

impl Resource for NodeMetrics {
    type DynamicType = ();
    type Scope = ClusterResourceScope;

    fn kind(_: &()) -> Cow<'_, str> {
        "NodeMetrics".into()
    }

    fn group(_: &()) -> Cow<'_, str> {
        "metrics.k8s.io".into()
    }

    fn version(_: &()) -> Cow<'_, str> {
        "v1beta1".into()
    }

    fn plural(_: &()) -> Cow<'_, str> {
        "nodes".into()
    }

    fn meta(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn meta_mut(&mut self) -> &mut ObjectMeta {
        &mut self.metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_metrics_server_payload() {
        let payload = serde_json::json!({
            "metadata": { "name": "node-a" },
            "timestamp": "2024-05-01T10:00:00Z",
            "window": "20.05s",
            "usage": { "cpu": "250000000n", "memory": "2048Ki" }
        });

        let metrics: NodeMetrics = serde_json::from_value(payload).unwrap();
        let sample = metrics.to_sample().unwrap();

        assert_eq!(sample.name, "node-a");
        assert_eq!(sample.cpu_usage, "250000000n");
        assert_eq!(sample.memory_usage, "2048Ki");
        assert!(sample.memory_allocatable.is_none());
    }

    #[test]
    fn test_sample_requires_usage() {
        let metrics = NodeMetrics {
            metadata: ObjectMeta {
                name: Some("node-b".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };

        assert!(metrics.to_sample().is_none());
    }

    #[test]
    fn test_api_resource_path() {
        assert_eq!(NodeMetrics::api_version(&()), "metrics.k8s.io/v1beta1");
        assert_eq!(NodeMetrics::plural(&()), "nodes");
    }
}
