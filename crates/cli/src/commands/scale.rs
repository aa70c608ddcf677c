//! Scale command

use anyhow::Result;
use kube::Client;
use ops_lib::{scale, OpsConfig, ScaleRequest};

use crate::output::{print_info, print_success};

/// Forward a validated replica count to the workload's scale subresource
pub async fn run(client: &Client, cfg: &OpsConfig, request: ScaleRequest) -> Result<()> {
    let accepted = scale::apply(client, cfg, request).await?;

    print_success(&format!("Scaled {} to {} replicas", cfg.app_name, accepted));
    print_info("The autoscaler may adjust this count; confirm with: mlops status");
    Ok(())
}
