//! Streaming views: log following and pod watching
//!
//! Both streams are unbounded; they end only when the receiver is dropped
//! (the caller's Ctrl-C path) or the upstream connection closes. Lines and
//! events are forwarded as they arrive through a bounded channel, so
//! nothing accumulates beyond the channel capacity.

use futures::{io::AsyncBufReadExt, pin_mut, TryStreamExt};
use k8s_openapi::api::core::v1::Pod;
use kube::api::{ListParams, LogParams};
use kube::runtime::{watcher, WatchStreamExt};
use kube::{Api, Client, ResourceExt};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::config::OpsConfig;
use crate::error::OpsError;
use crate::status::PodView;

const CHANNEL_CAPACITY: usize = 64;

/// One log line attributed to the pod that produced it
#[derive(Debug, Clone)]
pub struct LogLine {
    pub pod: String,
    pub line: String,
}

/// Follow logs from every pod of the workload, merged into one channel.
///
/// Each pod gets its own follower task; a pod whose stream cannot be
/// opened is logged and skipped rather than failing the others.
pub async fn follow_logs(
    client: &Client,
    cfg: &OpsConfig,
    tail_lines: i64,
) -> Result<mpsc::Receiver<LogLine>, OpsError> {
    let pods: Api<Pod> = Api::namespaced(client.clone(), &cfg.namespace);
    let pod_list = pods
        .list(&ListParams::default().labels(&cfg.selector()))
        .await?;

    if pod_list.items.is_empty() {
        return Err(OpsError::NoPods(cfg.selector()));
    }

    let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);

    for pod in pod_list {
        let name = pod.name_any();
        let api = pods.clone();
        let tx = tx.clone();

        tokio::spawn(async move {
            let params = LogParams {
                follow: true,
                tail_lines: Some(tail_lines),
                ..Default::default()
            };

            let stream = match api.log_stream(&name, &params).await {
                Ok(stream) => stream,
                Err(error) => {
                    warn!(pod = %name, %error, "Failed to open log stream");
                    return;
                }
            };

            let mut lines = stream.lines();
            while let Ok(Some(line)) = lines.try_next().await {
                let log_line = LogLine {
                    pod: name.clone(),
                    line,
                };
                if tx.send(log_line).await.is_err() {
                    // receiver dropped, the caller is gone
                    break;
                }
            }
            debug!(pod = %name, "Log stream closed");
        });
    }

    Ok(rx)
}

/// Watch the workload's pods and emit a view on every state change.
///
/// The underlying watcher re-establishes its connection on transient
/// errors, so the stream keeps running until the receiver is dropped.
pub fn watch_pods(client: &Client, cfg: &OpsConfig) -> mpsc::Receiver<PodView> {
    let pods: Api<Pod> = Api::namespaced(client.clone(), &cfg.namespace);
    let watch_config = watcher::Config::default().labels(&cfg.selector());
    let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);

    tokio::spawn(async move {
        let stream = watcher(pods, watch_config).applied_objects();
        pin_mut!(stream);

        loop {
            match stream.try_next().await {
                Ok(Some(pod)) => {
                    if tx.send(PodView::from_api(&pod)).await.is_err() {
                        break;
                    }
                }
                Ok(None) => break,
                Err(error) => {
                    warn!(%error, "Pod watch error, stream will recover");
                }
            }
        }
    });

    rx
}
