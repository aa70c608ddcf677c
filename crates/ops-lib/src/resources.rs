//! Typed builders for the serving stack's Kubernetes resources
//!
//! Every resource the deploy sequence applies is constructed here, so the
//! shape of the stack lives in one place. Builders take the operations
//! config plus the scaling and resource inputs and return `k8s-openapi`
//! objects ready for server-side apply.

use std::collections::BTreeMap;

use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::autoscaling::v2::{
    CrossVersionObjectReference, HPAScalingPolicy, HPAScalingRules, HorizontalPodAutoscaler,
    HorizontalPodAutoscalerBehavior, HorizontalPodAutoscalerSpec, MetricSpec, MetricTarget,
    ResourceMetricSource,
};
use k8s_openapi::api::core::v1::{
    ConfigMap, ConfigMapEnvSource, Container, ContainerPort, EnvFromSource, HTTPGetAction,
    Namespace, PodSpec, PodTemplateSpec, Probe, ResourceRequirements, Service, ServicePort,
    ServiceSpec,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::api::ObjectMeta;

use crate::config::OpsConfig;
use crate::error::OpsError;

/// Replica bounds for the workload
#[derive(Debug, Clone, Copy)]
pub struct ReplicaRange {
    pub min: i32,
    pub max: i32,
}

impl ReplicaRange {
    /// Check the bounds are usable before any resource is built
    pub fn validate(&self) -> Result<(), OpsError> {
        if self.min < 1 {
            return Err(OpsError::InvalidPolicy(format!(
                "min replicas must be at least 1, got {}",
                self.min
            )));
        }
        if self.min > self.max {
            return Err(OpsError::InvalidPolicy(format!(
                "min replicas ({}) must not exceed max replicas ({})",
                self.min, self.max
            )));
        }
        Ok(())
    }
}

/// CPU and memory requests/limits for the serving container
#[derive(Debug, Clone)]
pub struct ResourceBudget {
    pub cpu_request: String,
    pub cpu_limit: String,
    pub memory_request: String,
    pub memory_limit: String,
}

impl Default for ResourceBudget {
    fn default() -> Self {
        Self {
            cpu_request: "100m".to_string(),
            cpu_limit: "500m".to_string(),
            memory_request: "128Mi".to_string(),
            memory_limit: "256Mi".to_string(),
        }
    }
}

impl ResourceBudget {
    fn to_requirements(&self) -> ResourceRequirements {
        let quantities = |cpu: &str, memory: &str| {
            BTreeMap::from([
                ("cpu".to_string(), Quantity(cpu.to_string())),
                ("memory".to_string(), Quantity(memory.to_string())),
            ])
        };

        ResourceRequirements {
            requests: Some(quantities(&self.cpu_request, &self.memory_request)),
            limits: Some(quantities(&self.cpu_limit, &self.memory_limit)),
            ..Default::default()
        }
    }
}

/// A single HTTP probe definition
///
/// Liveness and readiness are independent instances of this: a failing
/// readiness probe removes the pod from the Service's endpoints without
/// restarting it, while a failing liveness probe triggers a restart.
#[derive(Debug, Clone)]
pub struct ProbeConfig {
    pub path: String,
    pub initial_delay_secs: i32,
    pub period_secs: i32,
    pub timeout_secs: i32,
    pub failure_threshold: i32,
}

impl ProbeConfig {
    /// Liveness probe against the serving process health endpoint
    pub fn liveness() -> Self {
        Self {
            path: "/health".to_string(),
            initial_delay_secs: 10,
            period_secs: 10,
            timeout_secs: 2,
            failure_threshold: 3,
        }
    }

    /// Readiness probe that also exercises the loaded model
    pub fn readiness() -> Self {
        Self {
            path: "/ready".to_string(),
            initial_delay_secs: 5,
            period_secs: 5,
            timeout_secs: 2,
            failure_threshold: 3,
        }
    }

    fn to_probe(&self, port: i32) -> Probe {
        Probe {
            http_get: Some(HTTPGetAction {
                path: Some(self.path.clone()),
                port: IntOrString::Int(port),
                ..Default::default()
            }),
            initial_delay_seconds: Some(self.initial_delay_secs),
            period_seconds: Some(self.period_secs),
            timeout_seconds: Some(self.timeout_secs),
            failure_threshold: Some(self.failure_threshold),
            ..Default::default()
        }
    }
}

/// Autoscaling thresholds and rate limits for the workload
///
/// Scale-down is damped by the stabilization window so short load dips do
/// not cause replica oscillation.
#[derive(Debug, Clone)]
pub struct AutoscalePolicy {
    pub replicas: ReplicaRange,
    /// Target average CPU utilization percentage
    pub cpu_utilization: i32,
    /// Target average memory utilization percentage
    pub memory_utilization: i32,
    /// Max percent of current replicas added per minute when scaling up
    pub scale_up_percent: i32,
    /// Max percent of current replicas removed per minute when scaling down
    pub scale_down_percent: i32,
    /// Seconds of sustained low utilization before scale-down acts
    pub stabilization_window_secs: i32,
}

impl Default for AutoscalePolicy {
    fn default() -> Self {
        Self {
            replicas: ReplicaRange { min: 2, max: 10 },
            cpu_utilization: 70,
            memory_utilization: 80,
            scale_up_percent: 100,
            scale_down_percent: 50,
            stabilization_window_secs: 300,
        }
    }
}

fn labels(cfg: &OpsConfig) -> BTreeMap<String, String> {
    BTreeMap::from([("app".to_string(), cfg.app_name.clone())])
}

fn metadata(cfg: &OpsConfig, name: &str) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.to_string()),
        namespace: Some(cfg.namespace.clone()),
        labels: Some(labels(cfg)),
        ..Default::default()
    }
}

/// Namespace holding the whole stack
pub fn namespace(cfg: &OpsConfig) -> Namespace {
    Namespace {
        metadata: ObjectMeta {
            name: Some(cfg.namespace.clone()),
            labels: Some(labels(cfg)),
            ..Default::default()
        },
        ..Default::default()
    }
}

/// Environment configuration consumed by the serving container
pub fn config_map(cfg: &OpsConfig) -> ConfigMap {
    ConfigMap {
        metadata: metadata(cfg, &cfg.config_map_name()),
        data: Some(BTreeMap::from([
            ("MODEL_PATH".to_string(), "iris_model.joblib".to_string()),
            ("PORT".to_string(), cfg.container_port.to_string()),
            ("LOG_LEVEL".to_string(), "info".to_string()),
        ])),
        ..Default::default()
    }
}

/// The serving workload with probes, resource budget, and config wiring
pub fn deployment(cfg: &OpsConfig, budget: &ResourceBudget, replicas: i32) -> Deployment {
    let pod_labels = labels(cfg);

    let container = Container {
        name: cfg.app_name.clone(),
        image: Some(cfg.image.clone()),
        ports: Some(vec![ContainerPort {
            name: Some("http".to_string()),
            container_port: cfg.container_port,
            ..Default::default()
        }]),
        env_from: Some(vec![EnvFromSource {
            config_map_ref: Some(ConfigMapEnvSource {
                name: Some(cfg.config_map_name()),
                optional: None,
            }),
            ..Default::default()
        }]),
        resources: Some(budget.to_requirements()),
        liveness_probe: Some(ProbeConfig::liveness().to_probe(cfg.container_port)),
        readiness_probe: Some(ProbeConfig::readiness().to_probe(cfg.container_port)),
        ..Default::default()
    };

    Deployment {
        metadata: metadata(cfg, &cfg.app_name),
        spec: Some(DeploymentSpec {
            replicas: Some(replicas),
            selector: LabelSelector {
                match_labels: Some(pod_labels.clone()),
                ..Default::default()
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(pod_labels),
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    containers: vec![container],
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// ClusterIP service in front of the workload
pub fn service(cfg: &OpsConfig) -> Service {
    Service {
        metadata: metadata(cfg, &cfg.service_name),
        spec: Some(ServiceSpec {
            selector: Some(labels(cfg)),
            ports: Some(vec![ServicePort {
                name: Some("http".to_string()),
                port: cfg.service_port,
                target_port: Some(IntOrString::Int(cfg.container_port)),
                protocol: Some("TCP".to_string()),
                ..Default::default()
            }]),
            type_: Some("ClusterIP".to_string()),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// HorizontalPodAutoscaler targeting the workload
pub fn autoscaler(
    cfg: &OpsConfig,
    policy: &AutoscalePolicy,
) -> Result<HorizontalPodAutoscaler, OpsError> {
    policy.replicas.validate()?;

    let resource_metric = |name: &str, utilization: i32| MetricSpec {
        type_: "Resource".to_string(),
        resource: Some(ResourceMetricSource {
            name: name.to_string(),
            target: MetricTarget {
                type_: "Utilization".to_string(),
                average_utilization: Some(utilization),
                ..Default::default()
            },
        }),
        ..Default::default()
    };

    Ok(HorizontalPodAutoscaler {
        metadata: metadata(cfg, &cfg.hpa_name()),
        spec: Some(HorizontalPodAutoscalerSpec {
            scale_target_ref: CrossVersionObjectReference {
                api_version: Some("apps/v1".to_string()),
                kind: "Deployment".to_string(),
                name: cfg.app_name.clone(),
            },
            min_replicas: Some(policy.replicas.min),
            max_replicas: policy.replicas.max,
            metrics: Some(vec![
                resource_metric("cpu", policy.cpu_utilization),
                resource_metric("memory", policy.memory_utilization),
            ]),
            behavior: Some(HorizontalPodAutoscalerBehavior {
                scale_up: Some(HPAScalingRules {
                    stabilization_window_seconds: Some(0),
                    policies: Some(vec![HPAScalingPolicy {
                        type_: "Percent".to_string(),
                        value: policy.scale_up_percent,
                        period_seconds: 60,
                    }]),
                    select_policy: None,
                }),
                scale_down: Some(HPAScalingRules {
                    stabilization_window_seconds: Some(policy.stabilization_window_secs),
                    policies: Some(vec![HPAScalingPolicy {
                        type_: "Percent".to_string(),
                        value: policy.scale_down_percent,
                        period_seconds: 60,
                    }]),
                    select_policy: None,
                }),
            }),
        }),
        ..Default::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replica_range_validation() {
        assert!(ReplicaRange { min: 1, max: 1 }.validate().is_ok());
        assert!(ReplicaRange { min: 2, max: 10 }.validate().is_ok());
        assert!(ReplicaRange { min: 0, max: 5 }.validate().is_err());
        assert!(ReplicaRange { min: 6, max: 5 }.validate().is_err());
    }

    #[test]
    fn test_autoscaler_rejects_inverted_range() {
        let cfg = OpsConfig::default();
        let policy = AutoscalePolicy {
            replicas: ReplicaRange { min: 8, max: 2 },
            ..Default::default()
        };

        assert!(autoscaler(&cfg, &policy).is_err());
    }

    #[test]
    fn test_autoscaler_bounds_and_target() {
        let cfg = OpsConfig::default();
        let hpa = autoscaler(&cfg, &AutoscalePolicy::default()).unwrap();
        let spec = hpa.spec.unwrap();

        assert_eq!(spec.min_replicas, Some(2));
        assert_eq!(spec.max_replicas, 10);
        assert_eq!(spec.scale_target_ref.name, cfg.app_name);

        let window = spec
            .behavior
            .unwrap()
            .scale_down
            .unwrap()
            .stabilization_window_seconds;
        assert_eq!(window, Some(300));
    }

    #[test]
    fn test_deployment_probes_are_independent() {
        let cfg = OpsConfig::default();
        let deploy = deployment(&cfg, &ResourceBudget::default(), 2);
        let pod_spec = deploy.spec.unwrap().template.spec.unwrap();
        let container = &pod_spec.containers[0];

        let liveness = container.liveness_probe.as_ref().unwrap();
        let readiness = container.readiness_probe.as_ref().unwrap();

        let path = |p: &Probe| p.http_get.as_ref().unwrap().path.clone().unwrap();
        assert_eq!(path(liveness), "/health");
        assert_eq!(path(readiness), "/ready");
    }

    #[test]
    fn test_service_selector_matches_pod_labels() {
        let cfg = OpsConfig::default();
        let svc = service(&cfg);
        let deploy = deployment(&cfg, &ResourceBudget::default(), 2);

        let selector = svc.spec.unwrap().selector.unwrap();
        let pod_labels = deploy
            .spec
            .unwrap()
            .template
            .metadata
            .unwrap()
            .labels
            .unwrap();

        assert_eq!(selector, pod_labels);
    }

    #[test]
    fn test_service_targets_container_port() {
        let cfg = OpsConfig::default();
        let ports = service(&cfg).spec.unwrap().ports.unwrap();
        let port = &ports[0];

        assert_eq!(port.port, cfg.service_port);
        assert_eq!(port.target_port, Some(IntOrString::Int(cfg.container_port)));
    }

    #[test]
    fn test_config_map_carries_model_path() {
        let cfg = OpsConfig::default();
        let data = config_map(&cfg).data.unwrap();

        assert!(data.contains_key("MODEL_PATH"));
        assert_eq!(data.get("PORT"), Some(&"5000".to_string()));
    }
}
