//! Operations library for the ML serving workload
//!
//! This crate provides the core functionality for:
//! - Ordered deployment of the serving stack with a bounded rollout wait
//! - Replica scaling through the scale subresource
//! - Status snapshots, log following, and pod watching
//! - Resource usage queries against metrics.k8s.io
//! - Local port tunneling to the serving service
//! - Synthetic load generation against the prediction endpoint

pub mod config;
pub mod error;
pub mod lifecycle;
pub mod loadtest;
pub mod metrics;
pub mod resources;
pub mod scale;
pub mod status;
pub mod stream;
pub mod tunnel;

pub use config::OpsConfig;
pub use error::OpsError;
pub use scale::ScaleRequest;
