//! Dashboard library for cluster workload operations
//!
//! This crate provides the core functionality for:
//! - Reading deployments, pods, node metrics and logs from the control plane
//! - A read-through cache with explicit invalidation
//! - Normalizing node utilization for display
//! - Scale, rollout-restart and failed-pod cleanup mutations
//! - A background health monitor that posts alerts to a chat webhook
//! - Health checks and observability

pub mod cache;
pub mod control_plane;
pub mod dashboard;
pub mod error;
pub mod health;
pub mod models;
pub mod monitor;
pub mod normalizer;
pub mod observability;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use dashboard::{Dashboard, Overview, WorkloadView};
pub use error::{ControlPlaneError, DashboardError, NotificationError, ParseError};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use models::*;
pub use observability::{DashboardMetrics, StructuredLogger};
