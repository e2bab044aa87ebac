// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Sync runs: full batched sync, single-record sync, rename on success.

use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::batching::batch_count;
use crate::classify::Classified;
use crate::metrics;
use crate::record::ContractorRecord;
use crate::renamer::RenameError;
use crate::resilience::retry::sleep_or_cancel;
use crate::uploader::{UploadError, UploadObserver, UploadReport};

use super::{SyncOrchestrator, SyncSnapshot, SyncStart, SyncState};

/// Clears the sync flag and run token however the run ends.
struct RunGuard<'a> {
    orchestrator: &'a SyncOrchestrator,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        *self.orchestrator.run_token.lock() = None;
        self.orchestrator.syncing.store(false, Ordering::Release);
    }
}

/// Mirrors uploader progress into the watch channel.
struct SnapshotObserver<'a> {
    state: &'a watch::Sender<SyncSnapshot>,
}

impl UploadObserver for SnapshotObserver<'_> {
    fn on_status(&self, status: &str) {
        info!(status = %status, "Status");
        self.state.send_modify(|s| s.status = status.to_string());
    }

    fn on_progress(&self, succeeded: usize, failed: usize, total: usize) {
        let progress = if total == 0 {
            0.0
        } else {
            (succeeded + failed) as f32 / total as f32
        };
        metrics::set_progress(f64::from(progress));
        self.state.send_modify(|s| {
            s.succeeded = succeeded;
            s.failed = failed;
            s.progress = progress;
        });
    }

    fn on_response(&self, result: &Classified) {
        self.state.send_modify(|s| {
            s.last_message.clone_from(&result.message);
            s.last_outcome = Some(result.outcome.clone());
        });
    }
}

impl SyncOrchestrator {
    /// Run a full sync of the loaded records.
    ///
    /// Never fails: every outcome is reported through the returned
    /// [`SyncStart`] and the published [`SyncSnapshot`].
    #[tracing::instrument(skip(self))]
    pub async fn start_sync(&self) -> SyncStart {
        if self
            .syncing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!("Sync already in progress");
            self.set_status(&self.config.messages.already_running);
            return SyncStart::AlreadyRunning;
        }
        let _guard = RunGuard { orchestrator: self };

        if self.record_count() == 0 {
            info!("No records loaded, reloading before sync");
            if self.load_records() == 0 {
                self.set_status(&self.config.messages.no_data);
                return SyncStart::NoData;
            }
        }

        let token = self.shutdown.child_token();
        *self.run_token.lock() = Some(token.clone());
        let messages = &self.config.messages;

        self.transition(SyncState::Checking, &messages.checking);
        let online = tokio::select! {
            biased;
            _ = token.cancelled() => None,
            online = self.probe.check() => Some(online),
        };
        let records = self.records();
        let Some(online) = online else {
            return SyncStart::Completed(self.finish_cancelled(UploadReport {
                total: records.len(),
                cancelled: true,
                ..Default::default()
            }));
        };
        if !online {
            warn!("Connectivity probe failed, not syncing");
            self.transition(SyncState::NoNetwork, &messages.no_network);
            return SyncStart::NoNetwork;
        }

        let total = records.len();
        let batches = batch_count(total, self.uploader.batch_size());
        let status = format!("{} ({} records in {} batch arrays)", messages.syncing, total, batches);
        metrics::set_sync_state(SyncState::Syncing.as_str());
        self.state.send_modify(|s| {
            s.state = SyncState::Syncing;
            s.status = status;
            s.progress = 0.0;
            s.total_records = total;
            s.total_batches = batches;
            s.succeeded = 0;
            s.failed = 0;
            s.pending = total;
        });

        let observer = SnapshotObserver { state: &self.state };
        let report = self.uploader.run(&records, &observer, &token).await;

        if report.cancelled {
            return SyncStart::Completed(self.finish_cancelled(report));
        }

        metrics::set_pending(report.failed);
        self.state.send_modify(|s| s.pending = report.failed);

        if report.failed == 0 {
            let status = format!(
                "{} ({} records in {} batch arrays)",
                messages.success,
                report.succeeded,
                report.batch_count()
            );
            self.transition(SyncState::Succeeded, &status);

            if self.config.auto_rename {
                match sleep_or_cancel(self.sleeper.as_ref(), self.config.rename_grace(), &token).await {
                    Ok(()) => match self.rename_processed_file() {
                        Ok(target) => debug!(target = %target.display(), "Processed file renamed"),
                        Err(e) => debug!(error = %e, "Processed file left in place"),
                    },
                    Err(_) => info!("Cancelled before rename, leaving file in place"),
                }
            }
        } else {
            let status = format!(
                "Partial sync: {} success, {} failed ({} batch arrays)",
                report.succeeded,
                report.failed,
                report.batch_count()
            );
            self.transition(SyncState::PartialFailure, &status);
        }

        SyncStart::Completed(report)
    }

    fn finish_cancelled(&self, report: UploadReport) -> UploadReport {
        let pending = report.total.saturating_sub(report.succeeded);
        self.state.send_modify(|s| s.pending = pending);
        self.transition(SyncState::Cancelled, "Sync cancelled");
        report
    }

    /// Upload one record outside the batch run. Returns `None` without
    /// sending anything while another sync is running.
    ///
    /// Holds the sync flag for the duration of the send, so a concurrent
    /// [`Self::start_sync`] returns [`SyncStart::AlreadyRunning`] and
    /// [`Self::cancel`] stops the send.
    pub async fn sync_single_record(&self, record: &ContractorRecord) -> Option<Classified> {
        if self
            .syncing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!("Single-record sync skipped, sync in progress");
            return None;
        }
        let _guard = RunGuard { orchestrator: self };

        let token = self.shutdown.child_token();
        *self.run_token.lock() = Some(token.clone());
        match self.uploader.send_single(record, &token).await {
            Ok(result) => {
                self.state.send_modify(|s| {
                    s.last_message.clone_from(&result.message);
                    s.last_outcome = Some(result.outcome.clone());
                });
                Some(result)
            }
            Err(UploadError::Cancelled(_)) => None,
            Err(e @ UploadError::Codec(_)) => {
                error!(error = %e, "Failed to encode record");
                self.report_error(&e.to_string());
                None
            }
        }
    }

    /// Move the CSV to its next `{prefix}{n}{ext}` name, clear the loaded
    /// records and tell the reset hook to recreate the file.
    pub fn rename_processed_file(&self) -> Result<PathBuf, RenameError> {
        match self.renamer.rename(&self.config.csv_path) {
            Ok(target) => {
                let name = target
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                *self.records.write() = Arc::new(Vec::new());
                self.state.send_modify(|s| {
                    s.total_records = 0;
                    s.pending = 0;
                });
                metrics::set_pending(0);
                self.set_status(&format!("File renamed to {}", name));

                if let Some(hook) = &self.reset_hook {
                    hook.reset_file();
                }
                Ok(target)
            }
            Err(e) => {
                error!(error = %e, "Rename failed");
                self.set_status(&format!("Rename failed: {}", e));
                self.report_error(&format!("Error renaming file: {}", e));
                Err(e)
            }
        }
    }
}
