//! Background pod health monitoring
//!
//! This module provides:
//! - A recurring scan of all pods for stuck containers and error log lines
//! - Alert delivery to a chat webhook
//! - A shared switch to pause alerting without stopping the process

mod r#loop;
mod notifier;
mod toggle;

pub use notifier::{LogNotifier, Notifier, WebhookNotifier, WebhookPayload};
pub use r#loop::{
    HealthMonitor, HealthMonitorBuilder, MonitorConfig, MonitorHandle, MonitorState, TickOutcome,
};
pub use toggle::AlertToggle;
