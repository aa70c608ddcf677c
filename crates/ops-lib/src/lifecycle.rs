//! Deployment lifecycle: ordered apply, rollout wait, restart, teardown
//!
//! The apply sequence is fixed because later resources reference earlier
//! ones: the namespace must exist before anything lands in it, and the
//! autoscaler targets the workload, so it goes last. Callers cannot
//! reorder the steps.

use std::time::Duration;

use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::autoscaling::v2::HorizontalPodAutoscaler;
use k8s_openapi::api::core::v1::{ConfigMap, Namespace, Service};
use kube::api::{DeleteParams, Patch, PatchParams};
use kube::runtime::wait::{await_condition, Condition};
use kube::{Api, Client, Resource, ResourceExt};
use serde::Serialize;
use tracing::{debug, info};

use crate::config::OpsConfig;
use crate::error::OpsError;
use crate::resources::{self, AutoscalePolicy, ResourceBudget};

/// Field manager name recorded by server-side apply
const FIELD_MANAGER: &str = "mlops";

/// Resource kinds in the order the sequencer applies them
pub const APPLY_ORDER: [&str; 5] = [
    "Namespace",
    "ConfigMap",
    "Deployment",
    "Service",
    "HorizontalPodAutoscaler",
];

fn apply_params() -> PatchParams {
    PatchParams::apply(FIELD_MANAGER).force()
}

/// Serialize a typed object with its `apiVersion` and `kind` filled in,
/// as server-side apply requires
fn with_type_meta<K>(obj: &K) -> Result<serde_json::Value, OpsError>
where
    K: Resource<DynamicType = ()> + Serialize,
{
    let mut value = serde_json::to_value(obj)?;
    value["apiVersion"] = K::api_version(&()).as_ref().into();
    value["kind"] = K::kind(&()).as_ref().into();
    Ok(value)
}

async fn apply<K>(api: &Api<K>, obj: &K) -> Result<(), OpsError>
where
    K: Resource<DynamicType = ()> + Serialize + serde::de::DeserializeOwned + Clone + std::fmt::Debug,
{
    let name = obj.name_any();
    debug!(kind = %K::kind(&()), name = %name, "Applying resource");
    api.patch(&name, &apply_params(), &Patch::Apply(with_type_meta(obj)?))
        .await?;
    Ok(())
}

/// Apply the full serving stack in dependency order, then block until the
/// workload reports available or the configured deadline elapses.
///
/// `on_step` is invoked with (kind, name) before each apply so callers can
/// surface progress. A rollout timeout is a hard failure: the error is
/// returned and no part of the sequence is retried.
pub async fn deploy(
    client: &Client,
    cfg: &OpsConfig,
    policy: &AutoscalePolicy,
    mut on_step: impl FnMut(&str, &str),
) -> Result<(), OpsError> {
    policy.replicas.validate()?;
    let budget = ResourceBudget::default();

    info!(namespace = %cfg.namespace, app = %cfg.app_name, "Starting deploy sequence");

    let namespaces: Api<Namespace> = Api::all(client.clone());
    on_step(APPLY_ORDER[0], &cfg.namespace);
    apply(&namespaces, &resources::namespace(cfg)).await?;

    let config_maps: Api<ConfigMap> = Api::namespaced(client.clone(), &cfg.namespace);
    on_step(APPLY_ORDER[1], &cfg.config_map_name());
    apply(&config_maps, &resources::config_map(cfg)).await?;

    let deployments: Api<Deployment> = Api::namespaced(client.clone(), &cfg.namespace);
    on_step(APPLY_ORDER[2], &cfg.app_name);
    apply(
        &deployments,
        &resources::deployment(cfg, &budget, policy.replicas.min),
    )
    .await?;

    let services: Api<Service> = Api::namespaced(client.clone(), &cfg.namespace);
    on_step(APPLY_ORDER[3], &cfg.service_name);
    apply(&services, &resources::service(cfg)).await?;

    let autoscalers: Api<HorizontalPodAutoscaler> =
        Api::namespaced(client.clone(), &cfg.namespace);
    on_step(APPLY_ORDER[4], &cfg.hpa_name());
    apply(&autoscalers, &resources::autoscaler(cfg, policy)?).await?;

    wait_rollout(client, cfg).await
}

/// Block until the workload's rollout completes, bounded by the configured
/// deadline
pub async fn wait_rollout(client: &Client, cfg: &OpsConfig) -> Result<(), OpsError> {
    let deployments: Api<Deployment> = Api::namespaced(client.clone(), &cfg.namespace);
    let available = await_condition(deployments, &cfg.app_name, is_deployment_available());

    info!(
        deployment = %cfg.app_name,
        timeout_secs = cfg.rollout_timeout_secs,
        "Waiting for rollout"
    );

    match tokio::time::timeout(Duration::from_secs(cfg.rollout_timeout_secs), available).await {
        Ok(result) => {
            result?;
            info!(deployment = %cfg.app_name, "Rollout complete");
            Ok(())
        }
        Err(_) => Err(OpsError::RolloutTimeout {
            name: cfg.app_name.clone(),
            secs: cfg.rollout_timeout_secs,
        }),
    }
}

/// Await condition that returns `true` once the Deployment reports its
/// `Available` condition with status `True`, matching the availability
/// wait described in the deploy contract.
fn is_deployment_available() -> impl Condition<Deployment> {
    |obj: Option<&Deployment>| {
        if let Some(deploy) = &obj {
            if let Some(status) = &deploy.status {
                if let Some(conds) = &status.conditions {
                    if let Some(cond) = conds.iter().find(|c| c.type_ == "Available") {
                        return cond.status == "True";
                    }
                }
            }
        }
        false
    }
}

/// Trigger a rolling restart by stamping the pod template, the same
/// mechanism `kubectl rollout restart` uses
pub async fn rolling_restart(client: &Client, cfg: &OpsConfig) -> Result<(), OpsError> {
    let deployments: Api<Deployment> = Api::namespaced(client.clone(), &cfg.namespace);
    let stamp = chrono::Utc::now().to_rfc3339();
    let patch = serde_json::json!({
        "spec": {
            "template": {
                "metadata": {
                    "annotations": {
                        "kubectl.kubernetes.io/restartedAt": stamp
                    }
                }
            }
        }
    });

    deployments
        .patch(&cfg.app_name, &PatchParams::default(), &Patch::Merge(&patch))
        .await?;

    info!(deployment = %cfg.app_name, "Rolling restart triggered");
    Ok(())
}

/// Delete the namespace and everything in it
pub async fn teardown(client: &Client, cfg: &OpsConfig) -> Result<(), OpsError> {
    let namespaces: Api<Namespace> = Api::all(client.clone());
    let _ = namespaces
        .delete(&cfg.namespace, &DeleteParams::default())
        .await?;

    info!(namespace = %cfg.namespace, "Namespace deletion requested");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_order_is_dependency_ordered() {
        let position = |kind: &str| APPLY_ORDER.iter().position(|k| *k == kind).unwrap();

        assert_eq!(position("Namespace"), 0);
        assert!(position("Namespace") < position("Deployment"));
        assert!(position("ConfigMap") < position("Deployment"));
        assert!(position("Deployment") < position("Service"));
        assert!(position("Deployment") < position("HorizontalPodAutoscaler"));
    }

    #[test]
    fn test_with_type_meta_injects_kind() {
        let cfg = OpsConfig::default();
        let value = with_type_meta(&resources::namespace(&cfg)).unwrap();

        assert_eq!(value["apiVersion"], "v1");
        assert_eq!(value["kind"], "Namespace");
        assert_eq!(value["metadata"]["name"], "ml-system");
    }

    #[test]
    fn test_with_type_meta_on_namespaced_resource() {
        let cfg = OpsConfig::default();
        let value = with_type_meta(&resources::service(&cfg)).unwrap();

        assert_eq!(value["kind"], "Service");
        assert_eq!(value["metadata"]["namespace"], "ml-system");
    }
}
