//! Operations CLI for the ML serving workload
//!
//! A command-line tool for deploying the serving stack, observing its
//! state, scaling it, tunneling to it, and driving synthetic load to
//! exercise the autoscaler.

mod cluster;
mod commands;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use ops_lib::{OpsConfig, ScaleRequest};
use tracing_subscriber::EnvFilter;

/// Operations CLI for the ML serving workload
#[derive(Parser)]
#[command(name = "mlops")]
#[command(author, version, about = "Manage the ML serving stack on Kubernetes", long_about = None)]
pub struct Cli {
    /// Namespace override (defaults to the configured ml-system)
    #[arg(long, short, env = "MLOPS_NAMESPACE")]
    pub namespace: Option<String>,

    /// Path to kubeconfig file (uses default if not specified)
    #[arg(long, env = "KUBECONFIG")]
    pub kubeconfig: Option<String>,

    /// Output format
    #[arg(long, short, default_value = "table")]
    pub format: output::OutputFormat,

    /// Enable verbose logging
    #[arg(long, short)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Apply the full stack in order and wait for the rollout
    Deploy,

    /// Snapshot of deployment, pods, service, and autoscaler state
    Status,

    /// Follow workload logs until interrupted
    Logs {
        /// Historical lines to print per pod before following
        #[arg(long, default_value_t = 20)]
        tail: i64,
    },

    /// Set the workload's replica count
    Scale {
        /// Desired replica count (positive integer)
        #[arg(allow_hyphen_values = true)]
        replicas: String,
    },

    /// Forward a local port to the serving service
    PortForward {
        /// Local port to bind
        #[arg(long, short, default_value_t = 8080)]
        port: u16,
    },

    /// Drive synthetic prediction traffic to exercise the autoscaler
    Test {
        /// Requests per wave
        #[arg(long, default_value_t = 500)]
        requests: usize,

        /// Concurrent in-flight requests
        #[arg(long, short, default_value_t = 30)]
        concurrency: usize,

        /// Number of waves to run
        #[arg(long, default_value_t = 3)]
        waves: usize,

        /// Seconds to pause between waves
        #[arg(long, default_value_t = 30)]
        pause: u64,

        /// Base URL of the (tunneled) serving endpoint
        #[arg(long, default_value = "http://localhost:8080")]
        url: String,
    },

    /// Remove the namespace and everything in it
    Delete,

    /// Trigger a rolling restart of the workload
    Restart,

    /// Continuous pod-state stream until interrupted
    Watch,

    /// Per-pod and per-node resource usage
    Metrics,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_writer(std::io::stderr)
        .init();

    let mut cfg = OpsConfig::load()?;
    if let Some(namespace) = &cli.namespace {
        cfg.namespace = namespace.clone();
    }
    tracing::debug!(namespace = %cfg.namespace, app = %cfg.app_name, "Configuration loaded");

    match cli.command {
        Commands::Scale { replicas } => {
            // validate before any client exists; a bad argument must not
            // reach the cluster
            let request = match ScaleRequest::parse(&replicas) {
                Ok(request) => request,
                Err(error) => {
                    output::print_error(&error.to_string());
                    eprintln!("Usage: mlops scale <REPLICAS>   REPLICAS must be a positive integer");
                    std::process::exit(1);
                }
            };

            let client = cluster::client(cli.kubeconfig.as_deref()).await?;
            commands::scale::run(&client, &cfg, request).await?;
        }
        Commands::Test {
            requests,
            concurrency,
            waves,
            pause,
            url,
        } => {
            commands::loadtest::run(&url, requests, concurrency, waves, pause, cli.format).await?;
        }
        Commands::Deploy => {
            let client = cluster::client(cli.kubeconfig.as_deref()).await?;
            commands::lifecycle::deploy(&client, &cfg, cli.format).await?;
        }
        Commands::Status => {
            let client = cluster::client(cli.kubeconfig.as_deref()).await?;
            commands::observe::status(&client, &cfg, cli.format).await?;
        }
        Commands::Logs { tail } => {
            let client = cluster::client(cli.kubeconfig.as_deref()).await?;
            commands::observe::logs(&client, &cfg, tail).await?;
        }
        Commands::PortForward { port } => {
            let client = cluster::client(cli.kubeconfig.as_deref()).await?;
            commands::tunnel::run(&client, &cfg, port).await?;
        }
        Commands::Delete => {
            let client = cluster::client(cli.kubeconfig.as_deref()).await?;
            commands::lifecycle::delete(&client, &cfg).await?;
        }
        Commands::Restart => {
            let client = cluster::client(cli.kubeconfig.as_deref()).await?;
            commands::lifecycle::restart(&client, &cfg).await?;
        }
        Commands::Watch => {
            let client = cluster::client(cli.kubeconfig.as_deref()).await?;
            commands::observe::watch(&client, &cfg, cli.format).await?;
        }
        Commands::Metrics => {
            let client = cluster::client(cli.kubeconfig.as_deref()).await?;
            commands::observe::metrics(&client, &cfg, cli.format).await?;
        }
    }

    Ok(())
}
