//! Load test command
//!
//! Runs the configured waves against the tunneled serving endpoint and
//! prints a report per wave. Waves exist to make autoscaler behavior
//! visible: sustained load, a pause, then load again.

use std::time::Duration;

use anyhow::{Context, Result};
use colored::Colorize;
use ops_lib::loadtest::{self, LoadReport, LoadTestConfig};

use crate::output::{print_info, print_success, print_warning, OutputFormat};

pub async fn run(
    url: &str,
    requests: usize,
    concurrency: usize,
    waves: usize,
    pause_secs: u64,
    format: OutputFormat,
) -> Result<()> {
    let cfg = LoadTestConfig::new(url, requests, concurrency)?;
    let http = reqwest::Client::builder()
        .build()
        .context("Failed to create HTTP client")?;

    print_info(&format!(
        "Load test: {} waves of {} requests at concurrency {} against {}",
        waves, requests, concurrency, cfg.endpoint
    ));
    print_info("Tip: run `mlops port-forward` first, then `mlops watch` to see scaling");

    let mut reports = Vec::with_capacity(waves);
    for wave in 1..=waves {
        println!();
        println!("{}", format!("Wave {wave}/{waves}").bold());
        println!("{}", "=".repeat(60));

        let report = loadtest::run_wave(&http, &cfg, |completed| {
            print_info(&format!("Progress: {completed}/{requests} requests"));
        })
        .await;

        match format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
            OutputFormat::Table => render_report(&report),
        }
        reports.push(report);

        if wave < waves {
            print_info(&format!("Pausing {pause_secs}s before the next wave"));
            tokio::time::sleep(Duration::from_secs(pause_secs)).await;
        }
    }

    let failed: usize = reports.iter().map(|r| r.failures).sum();
    println!();
    if failed == 0 {
        print_success("Load test complete");
    } else {
        print_warning(&format!("Load test complete with {failed} failed requests"));
    }
    print_info("Check scaling with: mlops status  or  mlops watch");

    Ok(())
}

fn render_report(report: &LoadReport) {
    let success_pct = if report.total > 0 {
        report.successes as f64 / report.total as f64 * 100.0
    } else {
        0.0
    };

    println!("Requests:     {}", report.total);
    println!("Successful:   {} ({:.2}%)", report.successes, success_pct);
    println!("Failed:       {}", report.failures);
    println!("Total time:   {:.2}s", report.elapsed_secs);
    println!("Requests/sec: {:.2}", report.requests_per_sec);

    match &report.latency {
        Some(latency) => {
            println!();
            println!("Latency:");
            println!("  Mean:   {:.2}ms", latency.mean);
            println!("  Median: {:.2}ms", latency.median);
            println!("  P95:    {:.2}ms", latency.p95);
            println!("  P99:    {:.2}ms", latency.p99);
            println!("  Min:    {:.2}ms", latency.min);
            println!("  Max:    {:.2}ms", latency.max);
        }
        None => print_warning("No successful requests, latency not available"),
    }
}
