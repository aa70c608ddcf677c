//! Status, logs, watch, and metrics commands

use anyhow::Result;
use colored::Colorize;
use kube::Client;
use ops_lib::status::StatusSnapshot;
use ops_lib::{metrics, status, stream, OpsConfig};
use tabled::settings::Style;
use tabled::{Table, Tabled};

use crate::output::{color_phase, format_bytes, format_cpu, print_info, print_warning, OutputFormat};

/// Row for the pods table
#[derive(Tabled)]
struct PodRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Ready")]
    ready: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Restarts")]
    restarts: String,
    #[tabled(rename = "Age")]
    age: String,
    #[tabled(rename = "Node")]
    node: String,
}

/// Row for the pod usage table
#[derive(Tabled)]
struct PodUsageRow {
    #[tabled(rename = "Pod")]
    name: String,
    #[tabled(rename = "CPU")]
    cpu: String,
    #[tabled(rename = "Memory")]
    memory: String,
}

/// Row for the node usage table
#[derive(Tabled)]
struct NodeUsageRow {
    #[tabled(rename = "Node")]
    name: String,
    #[tabled(rename = "CPU")]
    cpu: String,
    #[tabled(rename = "Memory")]
    memory: String,
}

/// Snapshot of every resource the stack owns
pub async fn status(client: &Client, cfg: &OpsConfig, format: OutputFormat) -> Result<()> {
    let snapshot = status::fetch(client, cfg).await?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
        }
        OutputFormat::Table => render_status(&snapshot, cfg),
    }

    Ok(())
}

fn render_status(snapshot: &StatusSnapshot, cfg: &OpsConfig) {
    println!("{}", "Deployment".bold());
    println!("{}", "=".repeat(60));
    match &snapshot.deployment {
        Some(deployment) => {
            println!("Name:       {}", deployment.name.cyan());
            println!("Image:      {}", deployment.image);
            println!(
                "Replicas:   {} desired, {} ready, {} updated, {} available",
                deployment.desired, deployment.ready, deployment.updated, deployment.available
            );
            println!("Age:        {}", deployment.age);
        }
        None => print_warning(&format!("Deployment {} not found", cfg.app_name)),
    }

    println!();
    println!("{}", "Pods".bold());
    println!("{}", "=".repeat(60));
    if snapshot.pods.is_empty() {
        print_warning("No pods found");
    } else {
        let rows: Vec<PodRow> = snapshot
            .pods
            .iter()
            .map(|pod| PodRow {
                name: pod.name.clone(),
                ready: pod.ready.clone(),
                status: color_phase(&pod.phase),
                restarts: pod.restarts.to_string(),
                age: pod.age.clone(),
                node: pod.node.clone().unwrap_or_default(),
            })
            .collect();
        println!("{}", Table::new(rows).with(Style::rounded()));
    }

    println!();
    println!("{}", "Service".bold());
    println!("{}", "=".repeat(60));
    match &snapshot.service {
        Some(service) => {
            println!(
                "{}  {}  {}  {}",
                service.name.cyan(),
                service.type_,
                service.cluster_ip,
                service.ports
            );
        }
        None => print_warning(&format!("Service {} not found", cfg.service_name)),
    }

    println!();
    println!("{}", "Autoscaler".bold());
    println!("{}", "=".repeat(60));
    match &snapshot.autoscaler {
        Some(hpa) => {
            let cpu = match (hpa.cpu_current_percent, hpa.cpu_target_percent) {
                (Some(current), Some(target)) => format!("{current}%/{target}%"),
                (None, Some(target)) => format!("<unknown>/{target}%"),
                _ => "<none>".to_string(),
            };
            println!(
                "{}  replicas {}-{}  current {}  desired {}  cpu {}",
                hpa.name.cyan(),
                hpa.min_replicas,
                hpa.max_replicas,
                hpa.current_replicas,
                hpa.desired_replicas,
                cpu
            );
        }
        None => print_warning(&format!("Autoscaler {} not found", cfg.hpa_name())),
    }
}

/// Follow workload logs until interrupted
pub async fn logs(client: &Client, cfg: &OpsConfig, tail: i64) -> Result<()> {
    let mut lines = stream::follow_logs(client, cfg, tail).await?;
    print_info(&format!(
        "Following logs for {} (Ctrl-C to stop)",
        cfg.selector()
    ));

    loop {
        tokio::select! {
            line = lines.recv() => match line {
                Some(line) => println!("{} {}", line.pod.dimmed(), line.line),
                None => break,
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    Ok(())
}

/// Stream pod state changes until interrupted
pub async fn watch(client: &Client, cfg: &OpsConfig, format: OutputFormat) -> Result<()> {
    let mut events = stream::watch_pods(client, cfg);
    print_info(&format!(
        "Watching pods for {} (Ctrl-C to stop)",
        cfg.selector()
    ));
    println!(
        "{:<44} {:>6} {:<20} {:>8} {:>7}",
        "NAME".bold(),
        "READY".bold(),
        "STATUS".bold(),
        "RESTARTS".bold(),
        "AGE".bold()
    );

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(pod) => match format {
                    OutputFormat::Json => println!("{}", serde_json::to_string(&pod)?),
                    OutputFormat::Table => println!(
                        "{:<44} {:>6} {:<20} {:>8} {:>7}",
                        pod.name,
                        pod.ready,
                        color_phase(&pod.phase),
                        pod.restarts,
                        pod.age
                    ),
                },
                None => break,
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    Ok(())
}

/// One-shot resource usage report for pods and nodes
pub async fn metrics(client: &Client, cfg: &OpsConfig, format: OutputFormat) -> Result<()> {
    let usage = metrics::fetch(client, cfg).await?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&usage)?);
            return Ok(());
        }
        OutputFormat::Table => {}
    }

    println!("{}", "Pod usage".bold());
    println!("{}", "=".repeat(60));
    if usage.pods.is_empty() {
        print_warning("No pod metrics reported (is metrics-server running?)");
    } else {
        let rows: Vec<PodUsageRow> = usage
            .pods
            .iter()
            .map(|pod| PodUsageRow {
                name: pod.name.clone(),
                cpu: format_cpu(pod.cpu_millicores),
                memory: format_bytes(pod.memory_bytes),
            })
            .collect();
        println!("{}", Table::new(rows).with(Style::rounded()));
    }

    println!();
    println!("{}", "Node usage".bold());
    println!("{}", "=".repeat(60));
    let rows: Vec<NodeUsageRow> = usage
        .nodes
        .iter()
        .map(|node| NodeUsageRow {
            name: node.name.clone(),
            cpu: format_cpu(node.cpu_millicores),
            memory: format_bytes(node.memory_bytes),
        })
        .collect();
    println!("{}", Table::new(rows).with(Style::rounded()));

    Ok(())
}
