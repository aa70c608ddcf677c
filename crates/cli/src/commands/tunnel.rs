//! Port-forward command

use anyhow::Result;
use kube::Client;
use ops_lib::{tunnel, OpsConfig};

use crate::output::print_info;

/// Run the local tunnel until interrupted
pub async fn run(client: &Client, cfg: &OpsConfig, local_port: u16) -> Result<()> {
    print_info(&format!(
        "Forwarding http://127.0.0.1:{} -> service/{}:{} (Ctrl-C to stop)",
        local_port, cfg.service_name, cfg.service_port
    ));

    tokio::select! {
        result = tunnel::serve(client, cfg, local_port) => result.map_err(Into::into),
        _ = tokio::signal::ctrl_c() => {
            println!();
            print_info("Tunnel closed");
            Ok(())
        }
    }
}
