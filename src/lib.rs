//! # Lead Sync
//!
//! Uploads lead records captured offline by a kiosk to a remote HTTP
//! endpoint, in fixed-size JSON-array batches with persistent retry.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      SyncOrchestrator                       │
//! │  • One run at a time (atomic flag)                         │
//! │  • Status / progress over a watch channel                  │
//! └─────────────────────────────────────────────────────────────┘
//!          │                    │                     │
//!          ▼                    ▼                     ▼
//! ┌─────────────────┐ ┌───────────────────┐ ┌───────────────────┐
//! │ storage::csv    │ │ ConnectivityProbe │ │  FileRenamer      │
//! │ data.csv → recs │ │ GET before a run  │ │  → Uploaded_{n}   │
//! └─────────────────┘ └───────────────────┘ └───────────────────┘
//!                               │
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       BatchUploader                         │
//! │  • ceil(n / batch_size) arrays, file order                 │
//! │  • batch layer: 10 attempts, linear delay, 10 s pacing     │
//! │  • request layer: 5 POSTs, 429 exponential, I/O linear     │
//! │  • classify: envelope + phrase tables                      │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use lead_sync::{SyncConfig, SyncOrchestrator, SyncStart};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = SyncConfig {
//!         csv_path: "data.csv".into(),
//!         api_url: "https://example.com/api.php".into(),
//!         ..Default::default()
//!     };
//!     let orchestrator = SyncOrchestrator::builder(config).build();
//!
//!     if let SyncStart::Completed(report) = orchestrator.start_sync().await {
//!         println!("{} delivered, {} failed", report.succeeded, report.failed);
//!     }
//! }
//! ```
//!
//! ## Modules
//!
//! - [`coordinator`]: the [`SyncOrchestrator`] state machine
//! - [`uploader`]: batching and both retry layers
//! - [`classify`]: response classification and phrase tables
//! - [`storage`]: CSV reader and the registration writer
//! - [`resilience`]: backoff formulas and the injectable [`Sleeper`]
//! - [`transport`] / [`probe`]: HTTP seams
//! - [`renamer`]: rename-on-success

pub mod batching;
pub mod classify;
pub mod config;
pub mod coordinator;
pub mod metrics;
pub mod probe;
pub mod record;
pub mod renamer;
pub mod resilience;
pub mod storage;
pub mod transport;
pub mod uploader;

pub use batching::{Batch, BatchOutcome};
pub use classify::{classify_response, ApiOutcome, Classified, ResponseMode};
pub use config::{ConfigError, StatusMessages, SyncConfig};
pub use coordinator::{OrchestratorBuilder, SyncOrchestrator, SyncSnapshot, SyncStart, SyncState, SyncStats};
pub use metrics::LatencyTimer;
pub use probe::{ConnectivityProbe, HttpProbe, StaticProbe};
pub use record::{encode_array, encode_record, CodecError, ContractorRecord, WireRecord};
pub use renamer::{FileRenamer, RenameError};
pub use resilience::retry::{BatchRetryPolicy, Cancelled, RetryConfig, Sleeper, TokioSleeper};
pub use storage::traits::{CsvLoad, FileResetHook, StoreError};
pub use storage::writer::{AppendOutcome, LeadWriter};
pub use transport::{HttpReply, HttpTransport, Transport, TransportError};
pub use uploader::{BatchReport, BatchUploader, NoopObserver, UploadError, UploadObserver, UploadReport};
