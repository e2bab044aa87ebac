// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Batched upload with persistent per-batch retry.
//!
//! ```text
//! for each batch (ceil(n / batch_size), file order):
//!     attempt 1..=batch_retry.max_attempts:
//!         POST array ── request layer: up to request_retry.max_attempts
//!                        429        → wait min(base·2^k, cap), re-post
//!                        io / 5xx   → wait base·(k+1),        re-post
//!                        other 4xx  → give up (batch exhausted)
//!                        2xx        → classify body
//!         delivered? → next batch
//!         else wait min(base·attempt, cap)  (×2, ≥15 s when throttled)
//!     exhausted → count batch as failed once, continue
//!     pause base_delay before the next batch
//! ```
//!
//! Batches succeed or fail as a unit. A `2xx` whose message is not
//! recognized as success is retried like any other failure, so an endpoint
//! that stored the batch but answered ambiguously may receive it again.

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::batching::{partition, Batch, BatchOutcome};
use crate::classify::{classify_response, is_rate_limit_message, ApiOutcome, Classified, ResponseMode};
use crate::config::SyncConfig;
use crate::metrics::{self, LatencyTimer};
use crate::record::{encode_array, encode_record, CodecError, ContractorRecord};
use crate::resilience::retry::{sleep_or_cancel, BatchRetryPolicy, Cancelled, RetryConfig, Sleeper};
use crate::transport::Transport;

#[derive(Error, Debug)]
pub enum UploadError {
    #[error(transparent)]
    Cancelled(#[from] Cancelled),
    #[error(transparent)]
    Codec(#[from] CodecError),
}

/// Receives live status text and progress while a run is in flight.
pub trait UploadObserver: Send + Sync {
    fn on_status(&self, _status: &str) {}
    fn on_progress(&self, _succeeded: usize, _failed: usize, _total: usize) {}
    /// Classified answer of each batch attempt
    fn on_response(&self, _result: &Classified) {}
}

/// Observer that ignores everything.
pub struct NoopObserver;

impl UploadObserver for NoopObserver {}

/// Final state of one batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchReport {
    pub batch: Batch,
    /// Batch-level attempts made (1-based count)
    pub attempts: usize,
    pub outcome: BatchOutcome,
}

/// Result of a full upload run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadReport {
    pub total: usize,
    pub batches: Vec<BatchReport>,
    pub succeeded: usize,
    pub failed: usize,
    pub last_message: String,
    pub last_outcome: Option<ApiOutcome>,
    /// Stopped early because the run was cancelled
    pub cancelled: bool,
}

impl UploadReport {
    #[must_use]
    pub fn batch_count(&self) -> usize {
        self.batches.len()
    }

    #[must_use]
    pub fn is_complete_success(&self) -> bool {
        !self.cancelled && self.failed == 0 && self.succeeded == self.total
    }
}

pub struct BatchUploader {
    transport: Arc<dyn Transport>,
    sleeper: Arc<dyn Sleeper>,
    batch_size: usize,
    batch_retry: BatchRetryPolicy,
    request_retry: RetryConfig,
    single_retry: RetryConfig,
}

impl BatchUploader {
    pub fn new(transport: Arc<dyn Transport>, sleeper: Arc<dyn Sleeper>) -> Self {
        Self {
            transport,
            sleeper,
            batch_size: 50,
            batch_retry: BatchRetryPolicy::default(),
            request_retry: RetryConfig::batch(),
            single_retry: RetryConfig::single(),
        }
    }

    pub fn from_config(config: &SyncConfig, transport: Arc<dyn Transport>, sleeper: Arc<dyn Sleeper>) -> Self {
        Self::new(transport, sleeper)
            .with_batch_size(config.batch_size)
            .with_batch_retry(config.batch_retry_policy())
            .with_request_retry(config.request_retry(), config.single_retry())
    }

    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    #[must_use]
    pub fn with_batch_retry(mut self, policy: BatchRetryPolicy) -> Self {
        self.batch_retry = policy;
        self
    }

    #[must_use]
    pub fn with_request_retry(mut self, batch: RetryConfig, single: RetryConfig) -> Self {
        self.request_retry = batch;
        self.single_retry = single;
        self
    }

    #[must_use]
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Upload every record. Never fails: outcomes are reported in the
    /// returned [`UploadReport`].
    pub async fn run(
        &self,
        records: &[ContractorRecord],
        observer: &dyn UploadObserver,
        cancel: &CancellationToken,
    ) -> UploadReport {
        let batches = partition(records.len(), self.batch_size);
        let batch_total = batches.len();
        let mut report = UploadReport {
            total: records.len(),
            ..Default::default()
        };

        info!(
            records = records.len(),
            batches = batch_total,
            batch_size = self.batch_size,
            "Starting batch array sync"
        );

        for batch in batches {
            let number = batch.index + 1;
            let slice = batch.slice(records);
            debug!(batch = number, start = batch.start + 1, end = batch.start + batch.count, "Processing batch");
            observer.on_status(&format!(
                "Batch {}/{} - Sending {} records as array",
                number, batch_total, batch.count
            ));

            let (attempts, outcome) = match self.run_batch(batch, slice, &mut report, observer, cancel).await {
                Ok(done) => done,
                Err(Cancelled) => {
                    warn!(batch = number, "Sync cancelled");
                    report.cancelled = true;
                    return report;
                }
            };

            match outcome {
                BatchOutcome::Succeeded => {
                    report.succeeded += batch.count;
                    info!(batch = number, records = batch.count, attempts, "Batch completed");
                }
                _ => {
                    report.failed += batch.count;
                    error!(batch = number, records = batch.count, attempts, "Batch exhausted, moving to next batch");
                }
            }
            metrics::record_batch(outcome.as_str(), batch.count);
            report.batches.push(BatchReport { batch, attempts, outcome });
            observer.on_progress(report.succeeded, report.failed, report.total);

            if number < batch_total {
                let pause = self.batch_retry.base_delay;
                let next = number + 1;
                info!(delay_ms = pause.as_millis() as u64, "Waiting before next batch");
                observer.on_status(&format!("Waiting {:.1}s before batch {}...", pause.as_secs_f64(), next));
                if self
                    .countdown(pause, observer, cancel, |s| {
                        format!("Next batch in {}s... (Batch {}/{})", s, next, batch_total)
                    })
                    .await
                    .is_err()
                {
                    report.cancelled = true;
                    return report;
                }
            }
        }

        info!(
            total = report.total,
            succeeded = report.succeeded,
            failed = report.failed,
            batches = batch_total,
            "Batch array sync finished"
        );
        report
    }

    /// Attempt one batch until delivered or out of attempts.
    async fn run_batch(
        &self,
        batch: Batch,
        slice: &[ContractorRecord],
        report: &mut UploadReport,
        observer: &dyn UploadObserver,
        cancel: &CancellationToken,
    ) -> Result<(usize, BatchOutcome), Cancelled> {
        let number = batch.index + 1;
        let max = self.batch_retry.max_attempts.max(1);

        let body = match encode_array(slice) {
            Ok(body) => body,
            Err(e) => {
                error!(batch = number, error = %e, "Failed to encode batch");
                report.last_message = e.to_string();
                return Ok((0, BatchOutcome::Exhausted));
            }
        };

        for attempt in 1..=max {
            if attempt > 1 {
                observer.on_status(&format!("Retrying batch {}, attempt {}/{}", number, attempt, max));
            }

            let result = self
                .send_with_retry(&body, &self.request_retry, ResponseMode::Batch, cancel)
                .await?;
            report.last_message.clone_from(&result.message);
            report.last_outcome = Some(result.outcome.clone());
            observer.on_response(&result);
            observer.on_progress(report.succeeded, report.failed, report.total);

            if result.outcome.is_delivered() {
                return Ok((attempt, BatchOutcome::Succeeded));
            }
            if matches!(result.outcome, ApiOutcome::ClientError(_)) {
                warn!(batch = number, outcome = %result.outcome, "Non-retryable response");
                return Ok((attempt, BatchOutcome::Exhausted));
            }
            if attempt == max {
                break;
            }

            let delay = self.batch_retry.retry_delay(attempt, &result.message);
            let throttled = is_rate_limit_message(&result.message);
            metrics::record_batch_retry(throttled);
            warn!(
                batch = number,
                attempt,
                delay_ms = delay.as_millis() as u64,
                throttled,
                message = %result.message,
                "Batch failed, retrying"
            );
            observer.on_status(&format!("Batch {} failed - retrying in {:.1}s...", number, delay.as_secs_f64()));
            self.countdown(delay, observer, cancel, |s| {
                format!("Retrying batch {} in {}s... (Attempt {}/{})", number, s, attempt + 1, max)
            })
            .await?;
        }

        Ok((max, BatchOutcome::Exhausted))
    }

    /// Upload one record on its own.
    pub async fn send_single(
        &self,
        record: &ContractorRecord,
        cancel: &CancellationToken,
    ) -> Result<Classified, UploadError> {
        let body = encode_record(record)?;
        let result = self
            .send_with_retry(&body, &self.single_retry, ResponseMode::Single, cancel)
            .await?;
        match result.outcome {
            ApiOutcome::AlreadyExists => info!(name = %record.name, "Record already exists"),
            ApiOutcome::Success => info!(name = %record.name, "Record synced"),
            ref other => warn!(name = %record.name, outcome = %other, "Record not synced"),
        }
        Ok(result)
    }

    /// Request layer: post `body`, retrying throttling and transient errors.
    async fn send_with_retry(
        &self,
        body: &str,
        retry: &RetryConfig,
        mode: ResponseMode,
        cancel: &CancellationToken,
    ) -> Result<Classified, Cancelled> {
        let path = match mode {
            ResponseMode::Batch => "batch",
            ResponseMode::Single => "single",
        };
        let max = retry.max_attempts.max(1);
        let mut last = Classified {
            outcome: ApiOutcome::NetworkError(None),
            message: String::new(),
        };

        for attempt in 0..max {
            let has_next = attempt + 1 < max;
            let reply = {
                let _timer = LatencyTimer::new(path);
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(Cancelled),
                    reply = self.transport.post_json(body, retry.timeout) => reply,
                }
            };

            let (retryable, delay) = match reply {
                Ok(reply) if reply.status == 429 => {
                    last = Classified {
                        outcome: ApiOutcome::RateLimited,
                        message: "Rate limited - too many requests".to_string(),
                    };
                    (true, retry.rate_limit_delay(attempt))
                }
                Ok(reply) if reply.is_success() => {
                    let classified = classify_response(&reply.body, mode);
                    metrics::record_request(path, classified.outcome.label());
                    debug!(outcome = %classified.outcome, message = %classified.message, "Response classified");
                    return Ok(classified);
                }
                Ok(reply) => {
                    let code = reply.status;
                    let outcome = if code >= 500 {
                        ApiOutcome::ServerError(code)
                    } else {
                        ApiOutcome::ClientError(code)
                    };
                    last = Classified {
                        outcome,
                        message: format!("Network error: HTTP {} (Code: {})", code, code),
                    };
                    (code >= 500, retry.network_delay(attempt))
                }
                Err(e) => {
                    last = Classified {
                        outcome: ApiOutcome::NetworkError(None),
                        message: format!("Network error: {} (Code: 0)", e),
                    };
                    (true, retry.network_delay(attempt))
                }
            };
            metrics::record_request(path, last.outcome.label());

            if !retryable || !has_next {
                error!(
                    outcome = %last.outcome,
                    attempts = attempt + 1,
                    message = %last.message,
                    "Request failed"
                );
                return Ok(last);
            }

            warn!(
                outcome = %last.outcome,
                attempt = attempt + 1,
                max,
                delay_ms = delay.as_millis() as u64,
                "Request failed, retrying"
            );
            sleep_or_cancel(self.sleeper.as_ref(), delay, cancel).await?;
        }

        Ok(last)
    }

    /// Wait `total`, reporting whole seconds remaining once per second.
    async fn countdown(
        &self,
        total: Duration,
        observer: &dyn UploadObserver,
        cancel: &CancellationToken,
        label: impl Fn(u64) -> String,
    ) -> Result<(), Cancelled> {
        let tick = Duration::from_secs(1);
        let mut remaining = total;
        while !remaining.is_zero() {
            observer.on_status(&label(remaining.as_secs_f64().ceil() as u64));
            let step = remaining.min(tick);
            sleep_or_cancel(self.sleeper.as_ref(), step, cancel).await?;
            remaining -= step;
        }
        Ok(())
    }
}
