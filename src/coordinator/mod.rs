// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Sync orchestrator.
//!
//! The [`SyncOrchestrator`] ties the pieces together:
//! - CSV records loaded at construction and on [`SyncOrchestrator::reload`]
//! - connectivity probe before every run
//! - batched upload with persistent retry
//! - rename of the fully uploaded file, then a reset of the file's producer
//!
//! # Lifecycle
//!
//! ```text
//! Idle → Checking → Syncing → Succeeded | PartialFailure | Cancelled
//!                 ↘ NoNetwork
//! ```
//!
//! Progress and status are published through a `tokio::sync::watch`
//! channel, so a UI can poll [`SyncOrchestrator::snapshot`] or await changes
//! on [`SyncOrchestrator::subscribe`] from another task.
//!
//! # Example
//!
//! ```rust,no_run
//! use lead_sync::{SyncConfig, SyncOrchestrator, SyncStart};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let config = SyncConfig {
//!     csv_path: "data.csv".into(),
//!     ..Default::default()
//! };
//! let orchestrator = SyncOrchestrator::builder(config).build();
//!
//! match orchestrator.start_sync().await {
//!     SyncStart::Completed(report) => println!("{} of {} delivered", report.succeeded, report.total),
//!     other => println!("{:?}", other),
//! }
//! println!("{}", orchestrator.stats_line());
//! # }
//! ```

mod run;
mod types;

pub use types::{SyncSnapshot, SyncStart, SyncState, SyncStats};

use parking_lot::{Mutex, RwLock};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::SyncConfig;
use crate::metrics;
use crate::probe::{ConnectivityProbe, HttpProbe};
use crate::record::ContractorRecord;
use crate::renamer::FileRenamer;
use crate::resilience::retry::{Sleeper, TokioSleeper};
use crate::storage::csv;
use crate::storage::traits::{CsvLoad, FileResetHook};
use crate::transport::{HttpTransport, Transport};
use crate::uploader::BatchUploader;

/// Called with the full record set after every load.
pub type DataLoadedCallback = Box<dyn Fn(&[ContractorRecord]) + Send + Sync>;
/// Called with a description of every load or rename failure.
pub type ErrorCallback = Box<dyn Fn(&str) + Send + Sync>;

/// Orchestrates connectivity check, batched upload and rename.
///
/// # Thread Safety
///
/// `Send + Sync`; share it behind an `Arc`. At most one full sync runs at a
/// time: a second [`start_sync`](Self::start_sync) returns
/// [`SyncStart::AlreadyRunning`] without touching any state but the status.
pub struct SyncOrchestrator {
    pub(super) config: SyncConfig,
    pub(super) probe: Arc<dyn ConnectivityProbe>,
    pub(super) uploader: BatchUploader,
    pub(super) sleeper: Arc<dyn Sleeper>,
    pub(super) renamer: FileRenamer,
    pub(super) reset_hook: Option<Arc<dyn FileResetHook>>,
    on_data_loaded: Option<DataLoadedCallback>,
    on_error: Option<ErrorCallback>,

    /// Loaded records, in file order
    pub(super) records: RwLock<Arc<Vec<ContractorRecord>>>,
    /// Rows dropped by the last load
    failed_rows: AtomicUsize,

    /// Current run state (broadcast to watchers)
    pub(super) state: watch::Sender<SyncSnapshot>,

    /// Set before the first await of a run, cleared when it ends
    pub(super) syncing: AtomicBool,
    /// Cancelled on drop; parent of every run token
    pub(super) shutdown: CancellationToken,
    pub(super) run_token: Mutex<Option<CancellationToken>>,
}

/// Builder for [`SyncOrchestrator`]. Collaborators not supplied default to
/// the HTTP implementations configured from [`SyncConfig`].
pub struct OrchestratorBuilder {
    config: SyncConfig,
    probe: Option<Arc<dyn ConnectivityProbe>>,
    transport: Option<Arc<dyn Transport>>,
    sleeper: Option<Arc<dyn Sleeper>>,
    reset_hook: Option<Arc<dyn FileResetHook>>,
    on_data_loaded: Option<DataLoadedCallback>,
    on_error: Option<ErrorCallback>,
}

impl OrchestratorBuilder {
    #[must_use]
    pub fn probe(mut self, probe: Arc<dyn ConnectivityProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    #[must_use]
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    #[must_use]
    pub fn sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = Some(sleeper);
        self
    }

    /// Collaborator told to recreate the CSV after a successful rename.
    #[must_use]
    pub fn reset_hook(mut self, hook: Arc<dyn FileResetHook>) -> Self {
        self.reset_hook = Some(hook);
        self
    }

    #[must_use]
    pub fn on_data_loaded(mut self, callback: impl Fn(&[ContractorRecord]) + Send + Sync + 'static) -> Self {
        self.on_data_loaded = Some(Box::new(callback));
        self
    }

    #[must_use]
    pub fn on_error(mut self, callback: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Box::new(callback));
        self
    }

    /// Build the orchestrator and load the CSV.
    pub fn build(self) -> SyncOrchestrator {
        let config = self.config;
        let probe = self
            .probe
            .unwrap_or_else(|| Arc::new(HttpProbe::new(config.probe_url.clone(), config.probe_timeout())));
        let transport = self
            .transport
            .unwrap_or_else(|| Arc::new(HttpTransport::new(config.api_url.clone())));
        let sleeper = self.sleeper.unwrap_or_else(|| Arc::new(TokioSleeper));
        let uploader = BatchUploader::from_config(&config, transport, Arc::clone(&sleeper));
        let (state, _) = watch::channel(SyncSnapshot::idle(&config.messages.idle, 0));

        let orchestrator = SyncOrchestrator {
            renamer: FileRenamer::new(config.rename_prefix.clone()),
            config,
            probe,
            uploader,
            sleeper,
            reset_hook: self.reset_hook,
            on_data_loaded: self.on_data_loaded,
            on_error: self.on_error,
            records: RwLock::new(Arc::new(Vec::new())),
            failed_rows: AtomicUsize::new(0),
            state,
            syncing: AtomicBool::new(false),
            shutdown: CancellationToken::new(),
            run_token: Mutex::new(None),
        };
        orchestrator.load_records();
        orchestrator
    }
}

impl SyncOrchestrator {
    pub fn builder(config: SyncConfig) -> OrchestratorBuilder {
        OrchestratorBuilder {
            config,
            probe: None,
            transport: None,
            sleeper: None,
            reset_hook: None,
            on_data_loaded: None,
            on_error: None,
        }
    }

    #[must_use]
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Loaded records, in file order.
    #[must_use]
    pub fn records(&self) -> Arc<Vec<ContractorRecord>> {
        Arc::clone(&self.records.read())
    }

    #[must_use]
    pub fn record_count(&self) -> usize {
        self.records.read().len()
    }

    /// Rows dropped by the most recent load.
    #[must_use]
    pub fn failed_rows(&self) -> usize {
        self.failed_rows.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn is_syncing(&self) -> bool {
        self.syncing.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn snapshot(&self) -> SyncSnapshot {
        self.state.borrow().clone()
    }

    /// Get a receiver to watch status and progress changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SyncSnapshot> {
        self.state.subscribe()
    }

    /// Where the CSV would be moved by a rename right now.
    #[must_use]
    pub fn next_rename_path(&self) -> PathBuf {
        self.renamer.next_name(&self.config.csv_path)
    }

    /// Re-read the CSV and reset progress. Ignored while a sync runs.
    /// Returns the number of records loaded.
    pub fn reload(&self) -> usize {
        if self.is_syncing() {
            warn!("Reload requested while syncing, ignoring");
            return self.record_count();
        }
        self.load_records()
    }

    pub(super) fn load_records(&self) -> usize {
        let path = &self.config.csv_path;
        let load = match csv::load(path, self.config.has_header, self.config.delimiter) {
            Ok(load) => load,
            Err(e) => {
                error!(path = %path.display(), error = %e, "Failed to load CSV");
                self.report_error(&format!("Error loading CSV: {}", e));
                CsvLoad::empty()
            }
        };

        if load.failed_rows > 0 {
            warn!(failed_rows = load.failed_rows, "Some CSV rows could not be parsed");
        }
        let count = load.records.len();
        let records = Arc::new(load.records);
        *self.records.write() = Arc::clone(&records);
        self.failed_rows.store(load.failed_rows, Ordering::Release);

        let idle = self.config.messages.idle.clone();
        self.state.send_modify(|s| {
            let last_message = std::mem::take(&mut s.last_message);
            let last_outcome = s.last_outcome.take();
            *s = SyncSnapshot {
                last_message,
                last_outcome,
                ..SyncSnapshot::idle(&idle, count)
            };
        });
        metrics::set_pending(count);
        metrics::set_progress(0.0);
        metrics::set_sync_state(SyncState::Idle.as_str());

        info!(path = %path.display(), records = count, "CSV data loaded");
        if let Some(callback) = &self.on_data_loaded {
            callback(&records);
        }
        count
    }

    #[must_use]
    pub fn stats(&self) -> SyncStats {
        let snapshot = self.snapshot();
        SyncStats {
            total_records: self.record_count(),
            pending: snapshot.pending,
            failed_rows: self.failed_rows(),
            last_message: snapshot.last_message,
            last_outcome: snapshot.last_outcome,
            syncing: self.is_syncing(),
        }
    }

    /// `Total Records: {n}, Pending Sync: {p}, Last Status: {m}`
    #[must_use]
    pub fn stats_line(&self) -> String {
        self.stats().to_string()
    }

    /// Stop the current run at its next wait or request.
    pub fn cancel(&self) {
        if let Some(token) = self.run_token.lock().as_ref() {
            info!("Cancelling sync");
            token.cancel();
        }
    }

    pub(super) fn set_status(&self, status: &str) {
        info!(status = %status, "Status");
        self.state.send_modify(|s| s.status = status.to_string());
    }

    pub(super) fn transition(&self, state: SyncState, status: &str) {
        info!(state = %state, status = %status, "Sync state changed");
        metrics::set_sync_state(state.as_str());
        self.state.send_modify(|s| {
            s.state = state;
            s.status = status.to_string();
        });
    }

    pub(super) fn report_error(&self, message: &str) {
        if let Some(callback) = &self.on_error {
            callback(message);
        }
    }
}

impl Drop for SyncOrchestrator {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
