//! Synthetic load driver for the prediction endpoint
//!
//! Fires a configured number of POST /predict requests with bounded
//! concurrency and reports latency statistics. A failed request (non-2xx
//! or timeout) is recorded and counted, never fatal to the run, so the
//! report always covers exactly the requested number of outcomes.

use std::time::{Duration, Instant};

use futures::StreamExt;
use rand::Rng;
use serde::Serialize;
use tracing::debug;
use url::Url;

use crate::error::OpsError;

/// Parameters for one load wave
#[derive(Debug, Clone)]
pub struct LoadTestConfig {
    /// Full URL of the prediction endpoint
    pub endpoint: Url,
    /// Requests to issue in this wave
    pub requests: usize,
    /// Concurrent in-flight requests
    pub concurrency: usize,
    /// Per-request timeout
    pub request_timeout: Duration,
}

impl LoadTestConfig {
    /// Build a config from the tunnel's base URL
    pub fn new(base_url: &str, requests: usize, concurrency: usize) -> Result<Self, OpsError> {
        let endpoint = Url::parse(base_url)
            .and_then(|base| base.join("/predict"))
            .map_err(|e| OpsError::InvalidTarget(e.to_string()))?;

        Ok(Self {
            endpoint,
            requests,
            concurrency: concurrency.max(1),
            request_timeout: Duration::from_secs(5),
        })
    }
}

/// Prediction request body the serving endpoint expects
#[derive(Debug, Clone, Serialize)]
struct PredictRequest {
    features: [f64; 4],
}

/// The recorded result of a single request
#[derive(Debug, Clone, Copy)]
pub struct Outcome {
    pub success: bool,
    pub status: Option<u16>,
    pub latency_ms: f64,
}

/// Latency statistics over successful requests, in milliseconds
#[derive(Debug, Clone, Serialize)]
pub struct LatencySummary {
    pub mean: f64,
    pub median: f64,
    pub p95: f64,
    pub p99: f64,
    pub min: f64,
    pub max: f64,
}

/// Aggregate results of one wave
#[derive(Debug, Clone, Serialize)]
pub struct LoadReport {
    pub total: usize,
    pub successes: usize,
    pub failures: usize,
    pub elapsed_secs: f64,
    pub requests_per_sec: f64,
    pub latency: Option<LatencySummary>,
}

/// Run one wave of requests, invoking `progress` with the completed count
/// every 100 outcomes
pub async fn run_wave(
    http: &reqwest::Client,
    cfg: &LoadTestConfig,
    mut progress: impl FnMut(usize),
) -> LoadReport {
    let started = Instant::now();
    let mut outcomes = Vec::with_capacity(cfg.requests);

    let mut in_flight = futures::stream::iter(
        (0..cfg.requests).map(|_| send_request(http, cfg.endpoint.clone(), cfg.request_timeout)),
    )
    .buffer_unordered(cfg.concurrency);

    while let Some(outcome) = in_flight.next().await {
        outcomes.push(outcome);
        if outcomes.len() % 100 == 0 {
            progress(outcomes.len());
        }
    }

    LoadReport::from_outcomes(&outcomes, started.elapsed())
}

async fn send_request(http: &reqwest::Client, endpoint: Url, timeout: Duration) -> Outcome {
    let payload = PredictRequest {
        features: synthetic_features(),
    };

    let started = Instant::now();
    let result = http
        .post(endpoint)
        .timeout(timeout)
        .json(&payload)
        .send()
        .await;
    let latency_ms = started.elapsed().as_secs_f64() * 1000.0;

    match result {
        Ok(response) => Outcome {
            success: response.status().is_success(),
            status: Some(response.status().as_u16()),
            latency_ms,
        },
        Err(error) => {
            debug!(%error, "Request failed");
            Outcome {
                success: false,
                status: None,
                latency_ms,
            }
        }
    }
}

/// Feature vector within the ranges of the iris measurements the model
/// was trained on
fn synthetic_features() -> [f64; 4] {
    let mut rng = rand::rng();
    [
        rng.random_range(4.3..7.9),
        rng.random_range(2.0..4.4),
        rng.random_range(1.0..6.9),
        rng.random_range(0.1..2.5),
    ]
}

impl LoadReport {
    pub fn from_outcomes(outcomes: &[Outcome], elapsed: Duration) -> Self {
        let successes = outcomes.iter().filter(|o| o.success).count();
        let elapsed_secs = elapsed.as_secs_f64();

        let mut latencies: Vec<f64> = outcomes
            .iter()
            .filter(|o| o.success)
            .map(|o| o.latency_ms)
            .collect();
        latencies.sort_by(|a, b| a.total_cmp(b));

        let latency = if latencies.is_empty() {
            None
        } else {
            Some(LatencySummary {
                mean: latencies.iter().sum::<f64>() / latencies.len() as f64,
                median: percentile(&latencies, 50.0),
                p95: percentile(&latencies, 95.0),
                p99: percentile(&latencies, 99.0),
                min: latencies[0],
                max: latencies[latencies.len() - 1],
            })
        };

        Self {
            total: outcomes.len(),
            successes,
            failures: outcomes.len() - successes,
            elapsed_secs,
            requests_per_sec: if elapsed_secs > 0.0 {
                outcomes.len() as f64 / elapsed_secs
            } else {
                0.0
            },
            latency,
        }
    }
}

/// Nearest-rank percentile over an ascending-sorted slice
fn percentile(sorted: &[f64], pct: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let rank = ((pct / 100.0) * (sorted.len() - 1) as f64).round() as usize;
    sorted[rank.min(sorted.len() - 1)]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(success: bool, latency_ms: f64) -> Outcome {
        Outcome {
            success,
            status: if success { Some(200) } else { Some(500) },
            latency_ms,
        }
    }

    #[test]
    fn test_percentile_single_sample() {
        let samples = [42.0];
        assert_eq!(percentile(&samples, 50.0), 42.0);
        assert_eq!(percentile(&samples, 99.0), 42.0);
    }

    #[test]
    fn test_percentile_spread() {
        let samples: Vec<f64> = (1..=100).map(|n| n as f64).collect();
        assert_eq!(percentile(&samples, 50.0), 51.0);
        assert_eq!(percentile(&samples, 95.0), 95.0);
        assert_eq!(percentile(&samples, 99.0), 99.0);
    }

    #[test]
    fn test_report_counts_sum_to_total() {
        let outcomes: Vec<Outcome> = (0..10)
            .map(|n| outcome(n % 3 != 0, 10.0 + n as f64))
            .collect();

        let report = LoadReport::from_outcomes(&outcomes, Duration::from_secs(1));
        assert_eq!(report.total, 10);
        assert_eq!(report.successes + report.failures, report.total);
        assert_eq!(report.failures, 4);
    }

    #[test]
    fn test_report_without_successes_has_no_latency() {
        let outcomes = vec![outcome(false, 0.0); 5];
        let report = LoadReport::from_outcomes(&outcomes, Duration::from_secs(1));

        assert_eq!(report.failures, 5);
        assert!(report.latency.is_none());
    }

    #[test]
    fn test_synthetic_features_stay_in_range() {
        for _ in 0..100 {
            let [sl, sw, pl, pw] = synthetic_features();
            assert!((4.3..7.9).contains(&sl));
            assert!((2.0..4.4).contains(&sw));
            assert!((1.0..6.9).contains(&pl));
            assert!((0.1..2.5).contains(&pw));
        }
    }

    #[tokio::test]
    async fn test_wave_reports_one_outcome_per_request() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/predict")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"prediction":0,"class":"setosa","confidence":0.97}"#)
            .expect(20)
            .create_async()
            .await;

        let cfg = LoadTestConfig::new(&server.url(), 20, 5).unwrap();
        let http = reqwest::Client::new();
        let report = run_wave(&http, &cfg, |_| {}).await;

        mock.assert_async().await;
        assert_eq!(report.total, 20);
        assert_eq!(report.successes, 20);
        assert_eq!(report.failures, 0);
        assert!(report.latency.is_some());
    }

    #[tokio::test]
    async fn test_wave_counts_server_errors_without_aborting() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/predict")
            .with_status(503)
            .expect(10)
            .create_async()
            .await;

        let cfg = LoadTestConfig::new(&server.url(), 10, 3).unwrap();
        let http = reqwest::Client::new();
        let report = run_wave(&http, &cfg, |_| {}).await;

        assert_eq!(report.total, 10);
        assert_eq!(report.successes, 0);
        assert_eq!(report.failures, 10);
    }

    #[tokio::test]
    async fn test_wave_counts_connection_failures() {
        // nothing listens on this port
        let cfg = LoadTestConfig::new("http://127.0.0.1:1", 3, 3).unwrap();
        let http = reqwest::Client::new();
        let report = run_wave(&http, &cfg, |_| {}).await;

        assert_eq!(report.total, 3);
        assert_eq!(report.failures, 3);
    }

    #[test]
    fn test_config_rejects_bad_url() {
        assert!(LoadTestConfig::new("not a url", 10, 1).is_err());
    }
}
