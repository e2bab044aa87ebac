// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Integration tests for the sync orchestrator.
//!
//! Every collaborator with side effects outside the temp directory is
//! scripted: no network, no real sleeps.
//!
//! # Running Tests
//! ```bash
//! cargo test --test integration
//! ```
//!
//! # Test Organization
//! - `happy_*` - full runs that deliver everything
//! - `retry_*` - throttling and failures recovered by retry
//! - `failure_*` - offline, partial failure, cancellation, empty data

mod common;

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use lead_sync::storage::writer::CSV_HEADER;
use lead_sync::{ApiOutcome, BatchOutcome, SyncConfig, SyncOrchestrator, SyncStart, SyncState};

use common::*;

fn config(csv_path: &Path) -> SyncConfig {
    SyncConfig {
        csv_path: csv_path.to_path_buf(),
        ..Default::default()
    }
}

fn completed(start: SyncStart) -> lead_sync::UploadReport {
    match start {
        SyncStart::Completed(report) => report,
        other => panic!("expected a completed run, got {:?}", other),
    }
}

fn csv_in(dir: &tempfile::TempDir) -> PathBuf {
    dir.path().join("data.csv")
}

// =============================================================================
// Happy path
// =============================================================================

#[tokio::test]
async fn happy_120_records_in_three_batches() {
    let dir = tempfile::tempdir().unwrap();
    let path = csv_in(&dir);
    let writer = Arc::new(write_leads(&path, 120));

    let transport = ScriptedTransport::new(vec![]);
    let sleeper = Arc::new(RecordingSleeper::default());
    let orchestrator = SyncOrchestrator::builder(config(&path))
        .probe(CountingProbe::new(true))
        .transport(transport.clone())
        .sleeper(sleeper.clone())
        .reset_hook(writer)
        .build();
    assert_eq!(orchestrator.record_count(), 120);

    let report = completed(orchestrator.start_sync().await);

    assert_eq!(report.batch_count(), 3);
    assert_eq!((report.succeeded, report.failed), (120, 0));
    assert!(report.batches.iter().all(|b| b.outcome == BatchOutcome::Succeeded && b.attempts == 1));
    assert_eq!(transport.batch_sizes(), vec![50, 50, 20]);
    // two 10s pauses between batches, then the 2s grace before renaming
    assert_eq!(sleeper.total(), Duration::from_secs(22));

    let snapshot = orchestrator.snapshot();
    assert_eq!(snapshot.state, SyncState::Succeeded);
    assert_eq!(snapshot.progress, 1.0);
    assert_eq!(snapshot.succeeded, 120);
    assert_eq!(snapshot.pending, 0);
}

#[tokio::test]
async fn happy_rename_then_header_reset() {
    let dir = tempfile::tempdir().unwrap();
    let path = csv_in(&dir);
    let writer = Arc::new(write_leads(&path, 3));

    let orchestrator = SyncOrchestrator::builder(config(&path))
        .probe(CountingProbe::new(true))
        .transport(ScriptedTransport::new(vec![]))
        .sleeper(Arc::new(RecordingSleeper::default()))
        .reset_hook(writer)
        .build();

    completed(orchestrator.start_sync().await);

    let renamed = dir.path().join("Uploaded_1.csv");
    assert_eq!(std::fs::read_to_string(&renamed).unwrap().lines().count(), 4);
    assert_eq!(std::fs::read_to_string(&path).unwrap().trim_end(), CSV_HEADER);
    assert_eq!(orchestrator.record_count(), 0);
    assert_eq!(orchestrator.snapshot().status, "File renamed to Uploaded_1.csv");
    assert_eq!(orchestrator.next_rename_path(), dir.path().join("Uploaded_2.csv"));
}

#[tokio::test]
async fn happy_no_rename_when_disabled() {
    let dir = tempfile::tempdir().unwrap();
    let path = csv_in(&dir);
    write_leads(&path, 2);

    let orchestrator = SyncOrchestrator::builder(SyncConfig {
        auto_rename: false,
        ..config(&path)
    })
    .probe(CountingProbe::new(true))
    .transport(ScriptedTransport::new(vec![]))
    .sleeper(Arc::new(RecordingSleeper::default()))
    .build();

    completed(orchestrator.start_sync().await);
    assert!(path.exists());
    assert_eq!(orchestrator.snapshot().status, "Sync completed (2 records in 1 batch arrays)");
}

#[tokio::test]
async fn happy_single_record_already_exists() {
    let dir = tempfile::tempdir().unwrap();
    let path = csv_in(&dir);
    let transport = ScriptedTransport::new(vec![reply(200, r#"{"success":false,"message":"Mobile number already exists"}"#)]);
    let orchestrator = SyncOrchestrator::builder(config(&path))
        .probe(CountingProbe::new(true))
        .transport(transport.clone())
        .sleeper(Arc::new(RecordingSleeper::default()))
        .build();

    let result = orchestrator.sync_single_record(&lead(7)).await.unwrap();
    assert_eq!(result.outcome, ApiOutcome::AlreadyExists);
    assert!(result.outcome.is_delivered());
    assert_eq!(transport.calls(), 1);
    assert_eq!(orchestrator.stats().last_outcome, Some(ApiOutcome::AlreadyExists));
}

// =============================================================================
// Retry
// =============================================================================

#[tokio::test]
async fn retry_quota_message_on_200_uses_extended_delay() {
    let dir = tempfile::tempdir().unwrap();
    let path = csv_in(&dir);
    write_leads(&path, 10);

    let transport = ScriptedTransport::new(vec![
        reply(200, r#"{"success":false,"message":"Daily quota exceeded"}"#),
        ok(),
    ]);
    let sleeper = Arc::new(RecordingSleeper::default());
    let orchestrator = SyncOrchestrator::builder(SyncConfig {
        auto_rename: false,
        ..config(&path)
    })
    .probe(CountingProbe::new(true))
    .transport(transport.clone())
    .sleeper(sleeper.clone())
    .build();

    let report = completed(orchestrator.start_sync().await);

    assert_eq!(report.succeeded, 10);
    assert_eq!(report.batches[0].attempts, 2);
    assert_eq!(transport.calls(), 2);
    // min(10s * 1, 60s) doubled for throttling, shown as a 1s countdown
    assert_eq!(sleeper.total(), Duration::from_secs(20));
    assert!(sleeper.calls.lock().iter().all(|d| *d == Duration::from_secs(1)));
}

#[tokio::test]
async fn retry_http_429_then_success() {
    let dir = tempfile::tempdir().unwrap();
    let path = csv_in(&dir);
    write_leads(&path, 5);

    let transport = ScriptedTransport::new(vec![reply(429, ""), reply(429, ""), ok()]);
    let sleeper = Arc::new(RecordingSleeper::default());
    let orchestrator = SyncOrchestrator::builder(SyncConfig {
        auto_rename: false,
        ..config(&path)
    })
    .probe(CountingProbe::new(true))
    .transport(transport.clone())
    .sleeper(sleeper.clone())
    .build();

    let report = completed(orchestrator.start_sync().await);
    assert_eq!(report.succeeded, 5);
    assert_eq!(report.batches[0].attempts, 1);
    let secs: Vec<_> = sleeper.calls.lock().iter().map(|d| d.as_secs()).collect();
    assert_eq!(secs, vec![2, 4]);
}

// =============================================================================
// Failure scenarios
// =============================================================================

#[tokio::test]
async fn failure_offline_makes_no_requests() {
    let dir = tempfile::tempdir().unwrap();
    let path = csv_in(&dir);
    write_leads(&path, 4);

    let transport = ScriptedTransport::new(vec![]);
    let probe = CountingProbe::new(false);
    let orchestrator = SyncOrchestrator::builder(config(&path))
        .probe(probe.clone())
        .transport(transport.clone())
        .sleeper(Arc::new(RecordingSleeper::default()))
        .build();

    assert_eq!(orchestrator.start_sync().await, SyncStart::NoNetwork);
    assert_eq!(probe.calls.load(Ordering::SeqCst), 1);
    assert_eq!(transport.calls(), 0);

    let snapshot = orchestrator.snapshot();
    assert_eq!(snapshot.state, SyncState::NoNetwork);
    assert_eq!(snapshot.status, "No internet connection");
    assert!(!orchestrator.is_syncing());
    assert!(path.exists());
}

#[tokio::test]
async fn failure_missing_file_is_empty_and_silent() {
    let dir = tempfile::tempdir().unwrap();
    let errors = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&errors);
    let transport = ScriptedTransport::new(vec![]);
    let probe = CountingProbe::new(true);

    let orchestrator = SyncOrchestrator::builder(config(&dir.path().join("missing.csv")))
        .probe(probe.clone())
        .transport(transport.clone())
        .sleeper(Arc::new(RecordingSleeper::default()))
        .on_error(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        })
        .build();

    assert_eq!(orchestrator.record_count(), 0);
    assert_eq!(orchestrator.start_sync().await, SyncStart::NoData);
    assert_eq!(orchestrator.snapshot().status, "No data to sync");
    assert_eq!(errors.load(Ordering::SeqCst), 0);
    assert_eq!(probe.calls.load(Ordering::SeqCst), 0);
    assert_eq!(transport.calls(), 0);
}

#[tokio::test]
async fn failure_empty_file_then_reload_on_start() {
    let dir = tempfile::tempdir().unwrap();
    let path = csv_in(&dir);
    std::fs::write(&path, "").unwrap();

    let orchestrator = SyncOrchestrator::builder(SyncConfig {
        auto_rename: false,
        ..config(&path)
    })
    .probe(CountingProbe::new(true))
    .transport(ScriptedTransport::new(vec![]))
    .sleeper(Arc::new(RecordingSleeper::default()))
    .build();
    assert_eq!(orchestrator.record_count(), 0);

    std::fs::remove_file(&path).unwrap();
    write_leads(&path, 3);

    let report = completed(orchestrator.start_sync().await);
    assert_eq!(report.succeeded, 3);
}

#[tokio::test]
async fn failure_client_error_gives_partial_sync() {
    let dir = tempfile::tempdir().unwrap();
    let path = csv_in(&dir);
    write_leads(&path, 3);

    let transport = ScriptedTransport::new(vec![reply(400, "Bad Request"), ok()]);
    let orchestrator = SyncOrchestrator::builder(SyncConfig {
        batch_size: 2,
        ..config(&path)
    })
    .probe(CountingProbe::new(true))
    .transport(transport.clone())
    .sleeper(Arc::new(RecordingSleeper::default()))
    .build();

    let report = completed(orchestrator.start_sync().await);
    assert_eq!((report.succeeded, report.failed), (1, 2));
    assert_eq!(report.batches[0].outcome, BatchOutcome::Exhausted);

    let snapshot = orchestrator.snapshot();
    assert_eq!(snapshot.state, SyncState::PartialFailure);
    assert_eq!(snapshot.status, "Partial sync: 1 success, 2 failed (2 batch arrays)");
    assert_eq!(snapshot.progress, 1.0);
    assert!(path.exists(), "partially synced file must not be renamed");
    assert_eq!(
        orchestrator.stats_line(),
        "Total Records: 3, Pending Sync: 2, Last Status: Data processed successfully"
    );
}

#[tokio::test]
async fn failure_exhausted_batch_counted_once() {
    let dir = tempfile::tempdir().unwrap();
    let path = csv_in(&dir);
    write_leads(&path, 4);

    let transport = ScriptedTransport::new(vec![reply(200, r#"{"success":false,"message":"Invalid payload"}"#)]);
    let orchestrator = SyncOrchestrator::builder(SyncConfig {
        batch_size: 2,
        max_batch_attempts: 3,
        ..config(&path)
    })
    .probe(CountingProbe::new(true))
    .transport(transport.clone())
    .sleeper(Arc::new(RecordingSleeper::default()))
    .build();

    let report = completed(orchestrator.start_sync().await);
    assert_eq!(report.failed, 4);
    assert_eq!(report.succeeded, 0);
    assert_eq!(transport.calls(), 6);
    assert!(report.batches.iter().all(|b| b.attempts == 3));
    assert_eq!(orchestrator.stats().pending, 4);
}

#[tokio::test]
async fn failure_second_start_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = csv_in(&dir);
    write_leads(&path, 2);

    let probe = Arc::new(GatedProbe::default());
    let transport = ScriptedTransport::new(vec![]);
    let orchestrator = Arc::new(
        SyncOrchestrator::builder(SyncConfig {
            auto_rename: false,
            ..config(&path)
        })
        .probe(probe.clone())
        .transport(transport.clone())
        .sleeper(Arc::new(RecordingSleeper::default()))
        .build(),
    );

    let mut rx = orchestrator.subscribe();
    let first = tokio::spawn({
        let orchestrator = Arc::clone(&orchestrator);
        async move { orchestrator.start_sync().await }
    });
    rx.wait_for(|s| s.state == SyncState::Checking).await.unwrap();

    assert!(orchestrator.is_syncing());
    assert_eq!(orchestrator.start_sync().await, SyncStart::AlreadyRunning);
    assert_eq!(orchestrator.snapshot().status, "Sync already in progress...");
    assert!(orchestrator.sync_single_record(&lead(9)).await.is_none());
    assert_eq!(transport.calls(), 0);

    probe.gate.notify_one();
    let report = completed(first.await.unwrap());
    assert_eq!(report.succeeded, 2);
    assert!(!orchestrator.is_syncing());
}

#[tokio::test]
async fn failure_start_rejected_while_single_record_in_flight() {
    let dir = tempfile::tempdir().unwrap();
    let path = csv_in(&dir);
    write_leads(&path, 2);

    let transport = Arc::new(GatedTransport::default());
    let orchestrator = Arc::new(
        SyncOrchestrator::builder(config(&path))
            .probe(CountingProbe::new(true))
            .transport(transport.clone())
            .sleeper(Arc::new(RecordingSleeper::default()))
            .build(),
    );

    let single = tokio::spawn({
        let orchestrator = Arc::clone(&orchestrator);
        async move { orchestrator.sync_single_record(&lead(9)).await }
    });
    transport.entered.notified().await;

    assert!(orchestrator.is_syncing());
    assert_eq!(orchestrator.start_sync().await, SyncStart::AlreadyRunning);
    assert!(orchestrator.sync_single_record(&lead(10)).await.is_none());
    assert_eq!(transport.calls.load(Ordering::SeqCst), 1);

    transport.gate.notify_one();
    let result = single.await.unwrap().unwrap();
    assert_eq!(result.outcome, ApiOutcome::Success);
    assert!(!orchestrator.is_syncing());
}

#[tokio::test]
async fn failure_cancel_stops_single_record_send() {
    let dir = tempfile::tempdir().unwrap();
    let path = csv_in(&dir);

    let transport = Arc::new(GatedTransport::default());
    let orchestrator = Arc::new(
        SyncOrchestrator::builder(config(&path))
            .probe(CountingProbe::new(true))
            .transport(transport.clone())
            .sleeper(Arc::new(RecordingSleeper::default()))
            .build(),
    );

    let single = tokio::spawn({
        let orchestrator = Arc::clone(&orchestrator);
        async move { orchestrator.sync_single_record(&lead(1)).await }
    });
    transport.entered.notified().await;

    orchestrator.cancel();
    assert!(single.await.unwrap().is_none());
    assert!(!orchestrator.is_syncing());
}

#[tokio::test]
async fn failure_cancel_during_retry_wait() {
    let dir = tempfile::tempdir().unwrap();
    let path = csv_in(&dir);
    write_leads(&path, 3);

    let transport = ScriptedTransport::new(vec![reply(200, r#"{"success":false,"message":"busy"}"#)]);
    let orchestrator = Arc::new(
        SyncOrchestrator::builder(config(&path))
            .probe(CountingProbe::new(true))
            .transport(transport.clone())
            .sleeper(Arc::new(StuckSleeper))
            .build(),
    );

    let mut rx = orchestrator.subscribe();
    let run = tokio::spawn({
        let orchestrator = Arc::clone(&orchestrator);
        async move { orchestrator.start_sync().await }
    });
    rx.wait_for(|s| s.status.starts_with("Retrying batch 1 in")).await.unwrap();

    orchestrator.cancel();
    let report = completed(run.await.unwrap());

    assert!(report.cancelled);
    assert_eq!(report.succeeded, 0);
    assert_eq!(transport.calls(), 1);
    let snapshot = orchestrator.snapshot();
    assert_eq!(snapshot.state, SyncState::Cancelled);
    assert_eq!(snapshot.pending, 3);
    assert!(!orchestrator.is_syncing());
    assert!(path.exists());
}

#[tokio::test]
async fn failure_rename_of_missing_file_reports_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = csv_in(&dir);
    let errors = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&errors);

    let orchestrator = SyncOrchestrator::builder(config(&path))
        .probe(CountingProbe::new(true))
        .transport(ScriptedTransport::new(vec![]))
        .on_error(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        })
        .build();

    assert!(orchestrator.rename_processed_file().is_err());
    assert_eq!(errors.load(Ordering::SeqCst), 1);
    assert!(orchestrator.snapshot().status.starts_with("Rename failed"));
}
