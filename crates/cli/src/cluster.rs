//! Kubernetes client bootstrap

use anyhow::{Context, Result};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};

/// Build a client from an explicit kubeconfig path, or fall back to the
/// standard discovery chain (in-cluster env, then `~/.kube/config`)
pub async fn client(kubeconfig: Option<&str>) -> Result<Client> {
    match kubeconfig {
        Some(path) => {
            let kubeconfig = Kubeconfig::read_from(path)
                .with_context(|| format!("Failed to read kubeconfig at {path}"))?;
            let config = Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
                .await
                .context("Failed to load kubeconfig")?;
            Client::try_from(config).context("Failed to build Kubernetes client")
        }
        None => Client::try_default()
            .await
            .context("Failed to connect to the cluster"),
    }
}
