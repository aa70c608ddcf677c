//! Local port tunnel to the serving service
//!
//! Binds a local listener and forwards each connection to a ready pod
//! behind the service, resolving the service's target port the same way
//! the in-cluster proxy would.

use anyhow::Context;
use k8s_openapi::api::core::v1::{Pod, Service};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::api::ListParams;
use kube::{Api, Client, ResourceExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};

use crate::config::OpsConfig;
use crate::error::OpsError;

/// Accept connections on `127.0.0.1:{local_port}` and forward them until
/// the caller cancels. Each connection is re-resolved to a currently
/// ready pod, so traffic follows readiness the way the service does.
pub async fn serve(client: &Client, cfg: &OpsConfig, local_port: u16) -> Result<(), OpsError> {
    let pods: Api<Pod> = Api::namespaced(client.clone(), &cfg.namespace);
    let target_port = resolve_target_port(client, cfg).await?;

    let listener = TcpListener::bind(("127.0.0.1", local_port)).await?;
    info!(
        local_port,
        target_port,
        service = %cfg.service_name,
        "Tunnel listening"
    );

    loop {
        let (connection, peer) = listener.accept().await?;
        debug!(%peer, "Accepted connection");

        let pod = select_ready_pod(&pods, cfg).await?;
        let pods = pods.clone();

        tokio::spawn(async move {
            if let Err(error) = forward_connection(pods, &pod, target_port, connection).await {
                warn!(pod = %pod, %error, "Forwarded connection failed");
            }
        });
    }
}

/// Resolve the container port the service routes to
async fn resolve_target_port(client: &Client, cfg: &OpsConfig) -> Result<u16, OpsError> {
    let services: Api<Service> = Api::namespaced(client.clone(), &cfg.namespace);
    let service = services.get(&cfg.service_name).await?;

    let port = service
        .spec
        .and_then(|s| s.ports)
        .and_then(|ports| ports.into_iter().next())
        .and_then(|p| match p.target_port {
            Some(IntOrString::Int(n)) => u16::try_from(n).ok(),
            // named ports fall through to the configured container port
            _ => None,
        })
        .unwrap_or(cfg.container_port as u16);

    Ok(port)
}

/// Pick a pod that is currently passing its readiness probe
async fn select_ready_pod(pods: &Api<Pod>, cfg: &OpsConfig) -> Result<String, OpsError> {
    let pod_list = pods
        .list(&ListParams::default().labels(&cfg.selector()))
        .await?;

    let ready = pod_list
        .iter()
        .find(|pod| is_ready(pod))
        .map(|pod| pod.name_any())
        .ok_or_else(|| OpsError::NoReadyPod(cfg.service_name.clone()));
    ready
}

fn is_ready(pod: &Pod) -> bool {
    pod.status
        .as_ref()
        .and_then(|s| s.conditions.as_ref())
        .map(|conditions| {
            conditions
                .iter()
                .any(|c| c.type_ == "Ready" && c.status == "True")
        })
        .unwrap_or(false)
}

async fn forward_connection(
    pods: Api<Pod>,
    pod: &str,
    port: u16,
    mut connection: TcpStream,
) -> anyhow::Result<()> {
    let mut forwarder = pods.portforward(pod, &[port]).await?;
    let mut upstream = forwarder
        .take_stream(port)
        .context("port missing from forwarder")?;

    tokio::io::copy_bidirectional(&mut connection, &mut upstream).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pod_with_ready(status: &str) -> Pod {
        serde_json::from_value(serde_json::json!({
            "metadata": { "name": "ml-api-abc123" },
            "status": {
                "phase": "Running",
                "conditions": [{ "type": "Ready", "status": status }]
            }
        }))
        .unwrap()
    }

    #[test]
    fn test_is_ready_requires_ready_condition() {
        assert!(is_ready(&pod_with_ready("True")));
        assert!(!is_ready(&pod_with_ready("False")));
    }

    #[test]
    fn test_pod_without_status_is_not_ready() {
        let pod: Pod = serde_json::from_value(serde_json::json!({
            "metadata": { "name": "ml-api-new" }
        }))
        .unwrap();

        assert!(!is_ready(&pod));
    }
}
