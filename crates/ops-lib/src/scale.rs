//! Replica scaling passthrough

use k8s_openapi::api::apps::v1::Deployment;
use kube::api::{Patch, PatchParams};
use kube::{Api, Client};
use tracing::info;

use crate::config::OpsConfig;
use crate::error::OpsError;

/// A validated request to set the workload's replica count
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScaleRequest {
    replicas: i32,
}

impl ScaleRequest {
    /// Parse a replica count from a CLI argument.
    ///
    /// Runs before any Kubernetes client exists: a non-numeric or
    /// non-positive value is rejected locally and nothing leaves the
    /// process.
    pub fn parse(raw: &str) -> Result<Self, OpsError> {
        let replicas: i32 = raw
            .trim()
            .parse()
            .map_err(|_| OpsError::InvalidReplicas(raw.to_string()))?;

        if replicas < 1 {
            return Err(OpsError::InvalidReplicas(raw.to_string()));
        }

        Ok(Self { replicas })
    }

    pub fn replicas(&self) -> i32 {
        self.replicas
    }
}

/// Forward the requested replica count to the scale subresource, unchanged.
///
/// The count is not clamped against the autoscaler's bounds here; the HPA
/// controller reconciles independently and may override the value moments
/// later. Callers should re-check `status` rather than assume the request
/// sticks.
pub async fn apply(
    client: &Client,
    cfg: &OpsConfig,
    request: ScaleRequest,
) -> Result<i32, OpsError> {
    let deployments: Api<Deployment> = Api::namespaced(client.clone(), &cfg.namespace);
    let patch = serde_json::json!({ "spec": { "replicas": request.replicas() } });

    let scale = deployments
        .patch_scale(&cfg.app_name, &PatchParams::default(), &Patch::Merge(&patch))
        .await?;

    let accepted = scale
        .spec
        .and_then(|s| s.replicas)
        .unwrap_or_else(|| request.replicas());

    info!(deployment = %cfg.app_name, replicas = accepted, "Scale request accepted");
    Ok(accepted)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_accepts_positive_integers() {
        assert_eq!(ScaleRequest::parse("5").unwrap().replicas(), 5);
        assert_eq!(ScaleRequest::parse("1").unwrap().replicas(), 1);
        assert_eq!(ScaleRequest::parse(" 12 ").unwrap().replicas(), 12);
    }

    #[test]
    fn test_parse_rejects_zero_and_negative() {
        assert!(ScaleRequest::parse("0").is_err());
        assert!(ScaleRequest::parse("-3").is_err());
    }

    #[test]
    fn test_parse_rejects_non_numeric() {
        assert!(ScaleRequest::parse("abc").is_err());
        assert!(ScaleRequest::parse("2.5").is_err());
        assert!(ScaleRequest::parse("").is_err());
        assert!(ScaleRequest::parse("5x").is_err());
    }

    #[test]
    fn test_parse_rejects_overflow() {
        assert!(ScaleRequest::parse("99999999999999999999").is_err());
    }

    #[test]
    fn test_parse_preserves_value_exactly() {
        // the request forwards the parsed value as-is, no clamping
        let request = ScaleRequest::parse("500").unwrap();
        assert_eq!(request.replicas(), 500);
    }
}
