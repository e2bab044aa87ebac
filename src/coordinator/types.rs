//! Public types for the sync orchestrator.

use crate::classify::ApiOutcome;
use crate::uploader::UploadReport;

/// Orchestrator lifecycle state.
///
/// ```text
/// Idle → Checking → Syncing → Succeeded | PartialFailure
///                 ↘ NoNetwork          ↘ Cancelled
/// ```
///
/// Terminal states stay visible until the next run starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// No run yet, or data was (re)loaded
    Idle,
    /// Probing connectivity
    Checking,
    /// Uploading batches
    Syncing,
    /// Every record delivered
    Succeeded,
    /// At least one batch exhausted its attempts
    PartialFailure,
    /// Probe failed; nothing was sent
    NoNetwork,
    Cancelled,
}

impl SyncState {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Checking => "checking",
            Self::Syncing => "syncing",
            Self::Succeeded => "succeeded",
            Self::PartialFailure => "partial_failure",
            Self::NoNetwork => "no_network",
            Self::Cancelled => "cancelled",
        }
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Checking | Self::Syncing)
    }
}

impl std::fmt::Display for SyncState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Checking => write!(f, "Checking"),
            Self::Syncing => write!(f, "Syncing"),
            Self::Succeeded => write!(f, "Succeeded"),
            Self::PartialFailure => write!(f, "PartialFailure"),
            Self::NoNetwork => write!(f, "NoNetwork"),
            Self::Cancelled => write!(f, "Cancelled"),
        }
    }
}

/// Everything a UI needs to render the current run.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncSnapshot {
    pub state: SyncState,
    /// Operator-facing status line
    pub status: String,
    /// `(succeeded + failed) / total_records`, 0.0..=1.0
    pub progress: f32,
    pub total_records: usize,
    pub total_batches: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Records not yet delivered
    pub pending: usize,
    pub last_message: String,
    pub last_outcome: Option<ApiOutcome>,
}

impl SyncSnapshot {
    pub(crate) fn idle(status: &str, total_records: usize) -> Self {
        Self {
            state: SyncState::Idle,
            status: status.to_string(),
            progress: 0.0,
            total_records,
            total_batches: 0,
            succeeded: 0,
            failed: 0,
            pending: total_records,
            last_message: String::new(),
            last_outcome: None,
        }
    }
}

/// Result of [`super::SyncOrchestrator::start_sync`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncStart {
    /// Another run holds the sync flag; nothing was done
    AlreadyRunning,
    /// No records even after a reload
    NoData,
    /// Connectivity probe failed; nothing was sent
    NoNetwork,
    /// The upload ran (possibly partially, possibly cancelled)
    Completed(UploadReport),
}

/// Summary counters for reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncStats {
    pub total_records: usize,
    pub pending: usize,
    /// Rows the last load could not map
    pub failed_rows: usize,
    pub last_message: String,
    pub last_outcome: Option<ApiOutcome>,
    pub syncing: bool,
}

impl std::fmt::Display for SyncStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Total Records: {}, Pending Sync: {}, Last Status: {}",
            self.total_records, self.pending, self.last_message
        )
    }
}
