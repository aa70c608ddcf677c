//! Resource usage snapshots from the metrics API
//!
//! The metrics.k8s.io group has no typed bindings, so the responses are
//! deserialized into thin records and the quantity strings decoded here.

use kube::Client;
use serde::{Deserialize, Serialize};

use crate::config::OpsConfig;
use crate::error::OpsError;

#[derive(Debug, Clone, Deserialize)]
struct MetricsMeta {
    name: String,
}

#[derive(Debug, Clone, Deserialize)]
struct UsageQuantities {
    cpu: String,
    memory: String,
}

#[derive(Debug, Clone, Deserialize)]
struct ContainerUsage {
    usage: UsageQuantities,
}

#[derive(Debug, Clone, Deserialize)]
struct PodMetrics {
    metadata: MetricsMeta,
    containers: Vec<ContainerUsage>,
}

#[derive(Debug, Clone, Deserialize)]
struct PodMetricsList {
    items: Vec<PodMetrics>,
}

#[derive(Debug, Clone, Deserialize)]
struct NodeMetrics {
    metadata: MetricsMeta,
    usage: UsageQuantities,
}

#[derive(Debug, Clone, Deserialize)]
struct NodeMetricsList {
    items: Vec<NodeMetrics>,
}

/// Decoded usage for one pod, summed over its containers
#[derive(Debug, Clone, Serialize)]
pub struct PodUsage {
    pub name: String,
    pub cpu_millicores: u64,
    pub memory_bytes: u64,
}

/// Decoded usage for one node
#[derive(Debug, Clone, Serialize)]
pub struct NodeUsage {
    pub name: String,
    pub cpu_millicores: u64,
    pub memory_bytes: u64,
}

/// Per-pod and per-node usage in one read
#[derive(Debug, Clone, Serialize)]
pub struct UsageSnapshot {
    pub pods: Vec<PodUsage>,
    pub nodes: Vec<NodeUsage>,
}

/// Query metrics.k8s.io for the workload's pods and all nodes.
///
/// Requires metrics-server in the cluster; its absence surfaces as the
/// API error it returns, unaltered.
pub async fn fetch(client: &Client, cfg: &OpsConfig) -> Result<UsageSnapshot, OpsError> {
    let pod_path = format!(
        "/apis/metrics.k8s.io/v1beta1/namespaces/{}/pods?labelSelector=app%3D{}",
        cfg.namespace, cfg.app_name
    );
    let node_path = "/apis/metrics.k8s.io/v1beta1/nodes".to_string();

    let pod_metrics: PodMetricsList = client
        .request(http::Request::get(pod_path).body(Vec::new())?)
        .await?;
    let node_metrics: NodeMetricsList = client
        .request(http::Request::get(node_path).body(Vec::new())?)
        .await?;

    let pods = pod_metrics
        .items
        .into_iter()
        .map(|pod| {
            let (cpu, memory) = pod.containers.iter().fold((0, 0), |(cpu, memory), c| {
                (
                    cpu + parse_cpu_millicores(&c.usage.cpu),
                    memory + parse_memory_bytes(&c.usage.memory),
                )
            });
            PodUsage {
                name: pod.metadata.name,
                cpu_millicores: cpu,
                memory_bytes: memory,
            }
        })
        .collect();

    let nodes = node_metrics
        .items
        .into_iter()
        .map(|node| NodeUsage {
            name: node.metadata.name,
            cpu_millicores: parse_cpu_millicores(&node.usage.cpu),
            memory_bytes: parse_memory_bytes(&node.usage.memory),
        })
        .collect();

    Ok(UsageSnapshot { pods, nodes })
}

/// Decode a CPU quantity (`"250m"`, `"1"`, `"12345678n"`) into millicores
pub fn parse_cpu_millicores(quantity: &str) -> u64 {
    let quantity = quantity.trim();

    if let Some(value) = quantity.strip_suffix('n') {
        value.parse::<u64>().unwrap_or(0) / 1_000_000
    } else if let Some(value) = quantity.strip_suffix('u') {
        value.parse::<u64>().unwrap_or(0) / 1_000
    } else if let Some(value) = quantity.strip_suffix('m') {
        value.parse::<u64>().unwrap_or(0)
    } else {
        (quantity.parse::<f64>().unwrap_or(0.0) * 1000.0) as u64
    }
}

/// Decode a memory quantity (`"128Mi"`, `"1Gi"`, `"123456Ki"`) into bytes
pub fn parse_memory_bytes(quantity: &str) -> u64 {
    const UNITS: [(&str, u64); 8] = [
        ("Ki", 1 << 10),
        ("Mi", 1 << 20),
        ("Gi", 1 << 30),
        ("Ti", 1u64 << 40),
        ("K", 1_000),
        ("M", 1_000_000),
        ("G", 1_000_000_000),
        ("T", 1_000_000_000_000),
    ];

    let quantity = quantity.trim();
    for (suffix, multiplier) in UNITS {
        if let Some(value) = quantity.strip_suffix(suffix) {
            return (value.parse::<f64>().unwrap_or(0.0) * multiplier as f64) as u64;
        }
    }

    quantity.parse::<u64>().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cpu_millicores() {
        assert_eq!(parse_cpu_millicores("250m"), 250);
        assert_eq!(parse_cpu_millicores("1"), 1000);
        assert_eq!(parse_cpu_millicores("2"), 2000);
        assert_eq!(parse_cpu_millicores("0.5"), 500);
        // metrics-server reports nanocores
        assert_eq!(parse_cpu_millicores("12345678n"), 12);
        assert_eq!(parse_cpu_millicores("1500000u"), 1500);
        assert_eq!(parse_cpu_millicores("garbage"), 0);
    }

    #[test]
    fn test_parse_memory_bytes() {
        assert_eq!(parse_memory_bytes("128Mi"), 128 * 1024 * 1024);
        assert_eq!(parse_memory_bytes("1Gi"), 1024 * 1024 * 1024);
        assert_eq!(parse_memory_bytes("123456Ki"), 123_456 * 1024);
        assert_eq!(parse_memory_bytes("1M"), 1_000_000);
        assert_eq!(parse_memory_bytes("4096"), 4096);
        assert_eq!(parse_memory_bytes("garbage"), 0);
    }

    #[test]
    fn test_pod_metrics_deserialization() {
        let list: PodMetricsList = serde_json::from_value(serde_json::json!({
            "kind": "PodMetricsList",
            "apiVersion": "metrics.k8s.io/v1beta1",
            "items": [{
                "metadata": { "name": "ml-api-abc123", "namespace": "ml-system" },
                "timestamp": "2024-01-01T00:00:00Z",
                "window": "15s",
                "containers": [{
                    "name": "ml-api",
                    "usage": { "cpu": "12000000n", "memory": "131072Ki" }
                }]
            }]
        }))
        .unwrap();

        assert_eq!(list.items.len(), 1);
        assert_eq!(list.items[0].metadata.name, "ml-api-abc123");
        assert_eq!(parse_cpu_millicores(&list.items[0].containers[0].usage.cpu), 12);
    }
}
