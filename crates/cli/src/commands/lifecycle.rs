//! Deploy, restart, and delete commands

use anyhow::Result;
use kube::Client;
use ops_lib::resources::AutoscalePolicy;
use ops_lib::{lifecycle, OpsConfig, OpsError};

use crate::commands::observe;
use crate::output::{print_info, print_success, print_warning, OutputFormat};

/// Apply the full stack and wait for the rollout, then print the resource
/// summary operators confirm against
pub async fn deploy(client: &Client, cfg: &OpsConfig, format: OutputFormat) -> Result<()> {
    print_info(&format!(
        "Deploying {} to namespace {}",
        cfg.app_name, cfg.namespace
    ));

    let policy = AutoscalePolicy::default();
    let result = lifecycle::deploy(client, cfg, &policy, |kind, name| {
        print_info(&format!("Applying {kind} {name}"));
    })
    .await;

    match result {
        Ok(()) => {
            print_success(&format!(
                "Deployment {} is available ({}-{} replicas, autoscaled)",
                cfg.app_name, policy.replicas.min, policy.replicas.max
            ));
            println!();
            observe::status(client, cfg, format).await
        }
        Err(OpsError::RolloutTimeout { name, secs }) => {
            // no success summary on timeout; the operator must intervene
            anyhow::bail!(
                "deployment '{name}' did not become available within {secs}s; \
                 inspect it with `mlops status` and `mlops logs`"
            );
        }
        Err(error) => Err(error.into()),
    }
}

/// Trigger a rolling restart of the workload
pub async fn restart(client: &Client, cfg: &OpsConfig) -> Result<()> {
    lifecycle::rolling_restart(client, cfg).await?;
    print_success(&format!("Rolling restart of {} triggered", cfg.app_name));
    print_info("Follow the rollout with: mlops watch");
    Ok(())
}

/// Delete the namespace and everything in it
pub async fn delete(client: &Client, cfg: &OpsConfig) -> Result<()> {
    print_warning(&format!(
        "Deleting namespace {} and all resources in it",
        cfg.namespace
    ));
    lifecycle::teardown(client, cfg).await?;
    print_success(&format!("Namespace {} deletion requested", cfg.namespace));
    Ok(())
}
