//! Error types for cluster operations

use thiserror::Error;

/// Errors raised by the operations library
#[derive(Debug, Error)]
pub enum OpsError {
    /// Local argument validation, raised before any call leaves the process
    #[error("replica count must be a positive integer, got '{0}'")]
    InvalidReplicas(String),

    /// The workload did not report available within the deadline
    #[error("deployment '{name}' did not become available within {secs}s")]
    RolloutTimeout { name: String, secs: u64 },

    /// The replica range or scaling thresholds are inconsistent
    #[error("invalid autoscale policy: {0}")]
    InvalidPolicy(String),

    /// A pod lookup matched nothing
    #[error("no pods matched selector '{0}'")]
    NoPods(String),

    /// No pod behind the service currently passes its readiness probe
    #[error("no ready pod behind service '{0}' to forward to")]
    NoReadyPod(String),

    /// The load driver was pointed at an unusable URL
    #[error("invalid load test target: {0}")]
    InvalidTarget(String),

    #[error(transparent)]
    Kube(#[from] kube::Error),

    #[error("failed to wait on rollout condition: {0}")]
    Wait(#[from] kube::runtime::wait::Error),

    #[error("failed to build API request: {0}")]
    Request(#[from] http::Error),

    #[error("failed to serialize resource: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
