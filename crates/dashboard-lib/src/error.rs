//! Error types for the dashboard library

use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A failed call against the orchestration control plane.
///
/// Covers both transport failures and API rejections. `operation` names the
/// call that failed (e.g. `list_workloads`) so log lines and metrics can be
/// grouped without parsing the cause.
#[derive(Debug, Error)]
#[error("control plane call {operation} failed: {cause}")]
pub struct ControlPlaneError {
    pub operation: &'static str,
    #[source]
    pub cause: BoxError,
}

impl ControlPlaneError {
    pub fn new(operation: &'static str, cause: impl Into<BoxError>) -> Self {
        Self {
            operation,
            cause: cause.into(),
        }
    }

    /// Error for a response that arrived but lacked a field we depend on
    pub fn missing(operation: &'static str, what: &str) -> Self {
        Self::new(operation, format!("response missing {}", what))
    }
}

/// Malformed or unusable resource quantity
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("unrecognized unit {unit:?} in quantity {quantity:?}")]
    UnknownUnit { quantity: String, unit: String },

    #[error("malformed quantity {0:?}")]
    Malformed(String),

    #[error("allocatable memory missing for node {0}")]
    MissingAllocatable(String),

    #[error("allocatable memory is zero for node {0}")]
    ZeroAllocatable(String),
}

/// Webhook delivery failure
#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("webhook request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("webhook rejected alert with status {status}")]
    Rejected { status: u16 },
}

/// Errors surfaced by dashboard mutations
#[derive(Debug, Error)]
pub enum DashboardError {
    #[error(transparent)]
    ControlPlane(#[from] ControlPlaneError),

    #[error("replica count must be non-negative, got {0}")]
    InvalidReplicas(i32),
}
