//! Operations configuration

use anyhow::Result;
use serde::Deserialize;

/// Configuration for the serving workload and its namespace
#[derive(Debug, Clone, Deserialize)]
pub struct OpsConfig {
    /// Namespace holding the serving stack
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Workload (Deployment) name; doubles as the `app` label value
    #[serde(default = "default_app_name")]
    pub app_name: String,

    /// Service exposing the workload inside the cluster
    #[serde(default = "default_service_name")]
    pub service_name: String,

    /// Container image for the serving workload
    #[serde(default = "default_image")]
    pub image: String,

    /// Port the serving process listens on inside the container
    #[serde(default = "default_container_port")]
    pub container_port: i32,

    /// Port the Service exposes
    #[serde(default = "default_service_port")]
    pub service_port: i32,

    /// Deadline for the post-deploy rollout wait in seconds
    #[serde(default = "default_rollout_timeout")]
    pub rollout_timeout_secs: u64,
}

fn default_namespace() -> String {
    "ml-system".to_string()
}

fn default_app_name() -> String {
    "ml-api".to_string()
}

fn default_service_name() -> String {
    "ml-api-service".to_string()
}

fn default_image() -> String {
    "ml-api:latest".to_string()
}

fn default_container_port() -> i32 {
    5000
}

fn default_service_port() -> i32 {
    80
}

fn default_rollout_timeout() -> u64 {
    300
}

impl Default for OpsConfig {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            app_name: default_app_name(),
            service_name: default_service_name(),
            image: default_image(),
            container_port: default_container_port(),
            service_port: default_service_port(),
            rollout_timeout_secs: default_rollout_timeout(),
        }
    }
}

impl OpsConfig {
    /// Load configuration from the environment
    pub fn load() -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::Environment::with_prefix("MLOPS"))
            .build()?;

        Ok(config.try_deserialize().unwrap_or_else(|_| Self::default()))
    }

    /// Label selector matching the workload's pods
    pub fn selector(&self) -> String {
        format!("app={}", self.app_name)
    }

    /// Name of the workload's ConfigMap
    pub fn config_map_name(&self) -> String {
        format!("{}-config", self.app_name)
    }

    /// Name of the workload's HorizontalPodAutoscaler
    pub fn hpa_name(&self) -> String {
        format!("{}-hpa", self.app_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = OpsConfig::default();
        assert_eq!(cfg.namespace, "ml-system");
        assert_eq!(cfg.app_name, "ml-api");
        assert_eq!(cfg.service_port, 80);
        assert_eq!(cfg.container_port, 5000);
        assert_eq!(cfg.rollout_timeout_secs, 300);
    }

    #[test]
    fn test_derived_names() {
        let cfg = OpsConfig::default();
        assert_eq!(cfg.selector(), "app=ml-api");
        assert_eq!(cfg.config_map_name(), "ml-api-config");
        assert_eq!(cfg.hpa_name(), "ml-api-hpa");
    }
}
