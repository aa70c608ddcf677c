//! Point-in-time snapshots of the serving stack's state

use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::autoscaling::v2::HorizontalPodAutoscaler;
use k8s_openapi::api::core::v1::{Pod, Service};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::api::ListParams;
use kube::{Api, Client, ResourceExt};
use serde::Serialize;

use crate::config::OpsConfig;
use crate::error::OpsError;

/// Everything `status` reports, in one read
#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    pub deployment: Option<DeploymentView>,
    pub pods: Vec<PodView>,
    pub service: Option<ServiceView>,
    pub autoscaler: Option<AutoscalerView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeploymentView {
    pub name: String,
    pub image: String,
    pub desired: i32,
    pub ready: i32,
    pub updated: i32,
    pub available: i32,
    pub age: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PodView {
    pub name: String,
    pub phase: String,
    pub ready: String,
    pub restarts: i32,
    pub age: String,
    pub node: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ServiceView {
    pub name: String,
    pub type_: String,
    pub cluster_ip: String,
    pub ports: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AutoscalerView {
    pub name: String,
    pub min_replicas: i32,
    pub max_replicas: i32,
    pub current_replicas: i32,
    pub desired_replicas: i32,
    pub cpu_target_percent: Option<i32>,
    pub cpu_current_percent: Option<i32>,
}

/// Fetch the current state of every resource the stack owns
pub async fn fetch(client: &Client, cfg: &OpsConfig) -> Result<StatusSnapshot, OpsError> {
    let deployments: Api<Deployment> = Api::namespaced(client.clone(), &cfg.namespace);
    let pods: Api<Pod> = Api::namespaced(client.clone(), &cfg.namespace);
    let services: Api<Service> = Api::namespaced(client.clone(), &cfg.namespace);
    let autoscalers: Api<HorizontalPodAutoscaler> =
        Api::namespaced(client.clone(), &cfg.namespace);

    let deployment = deployments
        .get_opt(&cfg.app_name)
        .await?
        .map(|d| DeploymentView::from_api(&d));

    let pod_list = pods
        .list(&ListParams::default().labels(&cfg.selector()))
        .await?;
    let pods = pod_list.iter().map(PodView::from_api).collect();

    let service = services
        .get_opt(&cfg.service_name)
        .await?
        .map(|s| ServiceView::from_api(&s));

    let autoscaler = autoscalers
        .get_opt(&cfg.hpa_name())
        .await?
        .map(|h| AutoscalerView::from_api(&h));

    Ok(StatusSnapshot {
        deployment,
        pods,
        service,
        autoscaler,
    })
}

impl DeploymentView {
    pub fn from_api(deployment: &Deployment) -> Self {
        let spec = deployment.spec.as_ref();
        let status = deployment.status.as_ref();

        let image = spec
            .and_then(|s| s.template.spec.as_ref())
            .and_then(|s| s.containers.first())
            .and_then(|c| c.image.clone())
            .unwrap_or_default();

        Self {
            name: deployment.name_any(),
            image,
            desired: spec.and_then(|s| s.replicas).unwrap_or(0),
            ready: status.and_then(|s| s.ready_replicas).unwrap_or(0),
            updated: status.and_then(|s| s.updated_replicas).unwrap_or(0),
            available: status.and_then(|s| s.available_replicas).unwrap_or(0),
            age: age_of(deployment.metadata.creation_timestamp.as_ref()),
        }
    }
}

impl PodView {
    pub fn from_api(pod: &Pod) -> Self {
        let status = pod.status.as_ref();
        let container_statuses = status
            .and_then(|s| s.container_statuses.as_ref())
            .cloned()
            .unwrap_or_default();

        let total = pod
            .spec
            .as_ref()
            .map(|s| s.containers.len())
            .unwrap_or(container_statuses.len());
        let ready_count = container_statuses.iter().filter(|c| c.ready).count();
        let restarts = container_statuses.iter().map(|c| c.restart_count).sum();

        // surface the waiting reason (e.g. CrashLoopBackOff) instead of the
        // bare phase when a container is stuck, like kubectl does
        let waiting_reason = container_statuses
            .iter()
            .filter_map(|c| c.state.as_ref())
            .filter_map(|s| s.waiting.as_ref())
            .find_map(|w| w.reason.clone());

        let phase = waiting_reason.unwrap_or_else(|| {
            status
                .and_then(|s| s.phase.clone())
                .unwrap_or_else(|| "Unknown".to_string())
        });

        Self {
            name: pod.name_any(),
            phase,
            ready: format!("{}/{}", ready_count, total),
            restarts,
            age: age_of(pod.metadata.creation_timestamp.as_ref()),
            node: pod.spec.as_ref().and_then(|s| s.node_name.clone()),
        }
    }
}

impl ServiceView {
    pub fn from_api(service: &Service) -> Self {
        let spec = service.spec.as_ref();

        let ports = spec
            .and_then(|s| s.ports.as_ref())
            .map(|ports| {
                ports
                    .iter()
                    .map(|p| {
                        let target = match &p.target_port {
                            Some(IntOrString::Int(n)) => n.to_string(),
                            Some(IntOrString::String(s)) => s.clone(),
                            None => p.port.to_string(),
                        };
                        format!("{}:{}/TCP", p.port, target)
                    })
                    .collect::<Vec<_>>()
                    .join(",")
            })
            .unwrap_or_default();

        Self {
            name: service.name_any(),
            type_: spec
                .and_then(|s| s.type_.clone())
                .unwrap_or_else(|| "ClusterIP".to_string()),
            cluster_ip: spec.and_then(|s| s.cluster_ip.clone()).unwrap_or_default(),
            ports,
        }
    }
}

impl AutoscalerView {
    pub fn from_api(hpa: &HorizontalPodAutoscaler) -> Self {
        let spec = hpa.spec.as_ref();
        let status = hpa.status.as_ref();

        let cpu_target_percent = spec
            .and_then(|s| s.metrics.as_ref())
            .and_then(|metrics| {
                metrics
                    .iter()
                    .filter_map(|m| m.resource.as_ref())
                    .find(|r| r.name == "cpu")
            })
            .and_then(|r| r.target.average_utilization);

        let cpu_current_percent = status
            .and_then(|s| s.current_metrics.as_ref())
            .and_then(|metrics| {
                metrics
                    .iter()
                    .filter_map(|m| m.resource.as_ref())
                    .find(|r| r.name == "cpu")
            })
            .and_then(|r| r.current.average_utilization);

        Self {
            name: hpa.name_any(),
            min_replicas: spec.and_then(|s| s.min_replicas).unwrap_or(0),
            max_replicas: spec.map(|s| s.max_replicas).unwrap_or(0),
            current_replicas: status.and_then(|s| s.current_replicas).unwrap_or(0),
            desired_replicas: status.map(|s| s.desired_replicas).unwrap_or(0),
            cpu_target_percent,
            cpu_current_percent,
        }
    }
}

fn age_of(created: Option<&Time>) -> String {
    match created {
        Some(time) => {
            let elapsed = chrono::Utc::now().signed_duration_since(time.0);
            format_duration(elapsed.num_seconds().max(0) as u64)
        }
        None => "<unknown>".to_string(),
    }
}

/// Compact age rendering in the kubectl style: `2d3h`, `4h12m`, `7m`, `42s`
pub fn format_duration(secs: u64) -> String {
    const MINUTE: u64 = 60;
    const HOUR: u64 = 60 * MINUTE;
    const DAY: u64 = 24 * HOUR;

    if secs >= DAY {
        format!("{}d{}h", secs / DAY, (secs % DAY) / HOUR)
    } else if secs >= HOUR {
        format!("{}h{}m", secs / HOUR, (secs % HOUR) / MINUTE)
    } else if secs >= MINUTE {
        format!("{}m", secs / MINUTE)
    } else {
        format!("{}s", secs)
    }
}
