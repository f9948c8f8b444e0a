//! Cluster workload dashboard service
//!
//! The binary wires these modules together; they are exposed as a library so
//! the router can be exercised directly in tests.

pub mod api;
pub mod config;
pub mod views;
