// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Metrics instrumentation for lead-sync.
//!
//! Uses the `metrics` crate for backend-agnostic metrics collection.
//! The host application is responsible for choosing the exporter.
//!
//! # Metric Naming Convention
//! - `lead_sync_` prefix for all metrics
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Labels
//! - `path`: batch, single
//! - `outcome`: see [`crate::classify::ApiOutcome::label`]

use metrics::{counter, gauge, histogram};
use std::time::{Duration, Instant};

/// Record one HTTP exchange with the API
pub fn record_request(path: &str, outcome: &str) {
    counter!(
        "lead_sync_requests_total",
        "path" => path.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// Record request latency
pub fn record_latency(path: &str, duration: Duration) {
    histogram!(
        "lead_sync_request_seconds",
        "path" => path.to_string()
    )
    .record(duration.as_secs_f64());
}

/// Record a finished batch (`succeeded` or `exhausted`)
pub fn record_batch(status: &str, records: usize) {
    counter!("lead_sync_batches_total", "status" => status.to_string()).increment(1);
    counter!("lead_sync_records_total", "status" => status.to_string()).increment(records as u64);
}

/// Record a retry of a whole batch
pub fn record_batch_retry(rate_limited: bool) {
    counter!(
        "lead_sync_batch_retries_total",
        "rate_limited" => rate_limited.to_string()
    )
    .increment(1);
}

/// Record connectivity probe result
pub fn record_probe(reachable: bool) {
    counter!(
        "lead_sync_probe_total",
        "reachable" => reachable.to_string()
    )
    .increment(1);
}

/// Set sync progress (0.0 - 1.0)
pub fn set_progress(progress: f64) {
    gauge!("lead_sync_progress").set(progress);
}

/// Set records still waiting for upload
pub fn set_pending(count: usize) {
    gauge!("lead_sync_pending_records").set(count as f64);
}

const SYNC_STATES: [&str; 7] = [
    "idle",
    "checking",
    "syncing",
    "succeeded",
    "partial_failure",
    "no_network",
    "cancelled",
];

/// Set orchestrator state: 1.0 on the current state's series, 0.0 elsewhere
pub fn set_sync_state(state: &str) {
    for known in SYNC_STATES {
        let value = if known == state { 1.0 } else { 0.0 };
        gauge!("lead_sync_state", "state" => known).set(value);
    }
}

/// Timer that records request latency on drop
pub struct LatencyTimer {
    path: &'static str,
    start: Instant,
}

impl LatencyTimer {
    /// Start a new latency timer
    pub fn new(path: &'static str) -> Self {
        Self {
            path,
            start: Instant::now(),
        }
    }
}

impl Drop for LatencyTimer {
    fn drop(&mut self) {
        record_latency(self.path, self.start.elapsed());
    }
}
