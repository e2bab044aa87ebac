// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Kiosk sync walkthrough.
//!
//! Demonstrates:
//! 1. Registering leads through the form writer
//! 2. Syncing them in batches against a simulated, throttling API
//! 3. Watching status and progress from another task
//! 4. Rename of the uploaded file and header reset
//! 5. Displaying metrics
//!
//! Set `LEAD_SYNC_API_URL` to post to a real endpoint instead of the
//! simulated one.
//!
//! # Run
//!
//! ```bash
//! cargo run --example kiosk_sync
//! ```

use async_trait::async_trait;
use lead_sync::{
    ContractorRecord, HttpProbe, HttpReply, HttpTransport, LeadWriter, StaticProbe, SyncConfig, SyncOrchestrator,
    SyncStart, Transport, TransportError,
};
use metrics_util::debugging::{DebugValue, DebuggingRecorder, Snapshotter};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Answers the second request with 429 and one batch with a quota message.
struct SimulatedApi {
    calls: AtomicUsize,
}

#[async_trait]
impl Transport for SimulatedApi {
    async fn post_json(&self, body: &str, _timeout: Duration) -> Result<HttpReply, TransportError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(50)).await;
        let count = serde_json::from_str::<Vec<serde_json::Value>>(body).map_or(1, |v| v.len());
        Ok(match call {
            1 => HttpReply::new(429, "Too Many Requests"),
            3 => HttpReply::new(200, r#"{"success":false,"message":"Quota exceeded, slow down"}"#),
            _ => HttpReply::new(
                200,
                format!(r#"{{"success":true,"message":"Data processed successfully","count":"{count}"}}"#),
            ),
        })
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder.install().expect("failed to install metrics recorder");

    tracing_subscriber::fmt()
        .with_target(false)
        .compact()
        .init();

    println!("\n╔═══════════════════════════════════════════════════════════════╗");
    println!("║              lead-sync: Kiosk Sync Walkthrough                ║");
    println!("╚═══════════════════════════════════════════════════════════════╝\n");

    // ─────────────────────────────────────────────────────────────────────────
    // 1. Register some leads
    // ─────────────────────────────────────────────────────────────────────────
    let dir = tempfile::tempdir()?;
    let csv_path = dir.path().join("data.csv");
    let writer = Arc::new(LeadWriter::new(&csv_path));
    for i in 0..12 {
        writer.append(&ContractorRecord {
            name: format!("Visitor {i}"),
            mobile_number: format!("0550{i:06}"),
            email: format!("visitor{i}@example.com"),
            company_name: "O'Neill & Sons, Ltd".into(),
            account_type: if i % 3 == 0 { "Distributor" } else { "Contractor" }.into(),
            application_type: "Partition".into(),
            sales_comment: "Asked for the \"fire rated\" range".into(),
            ..Default::default()
        })?;
    }
    println!("📝 Registered 12 leads in {}", csv_path.display());

    // ─────────────────────────────────────────────────────────────────────────
    // 2. Configure the orchestrator (short delays for the demo)
    // ─────────────────────────────────────────────────────────────────────────
    let live_url = std::env::var("LEAD_SYNC_API_URL").ok();
    let config = SyncConfig {
        csv_path: csv_path.clone(),
        batch_size: 5,
        base_batch_delay_secs: 1,
        request_retry_base_secs: 1,
        rate_limit_floor_secs: 2,
        rename_grace_secs: 1,
        api_url: live_url.clone().unwrap_or_else(|| SyncConfig::default().api_url),
        ..Default::default()
    };
    config.validate()?;

    let builder = SyncOrchestrator::builder(config.clone())
        .reset_hook(writer)
        .on_data_loaded(|records| println!("📂 Loaded {} records", records.len()))
        .on_error(|message| eprintln!("⚠️  {}", message));
    let builder = match live_url {
        Some(url) => builder
            .transport(Arc::new(HttpTransport::new(url)))
            .probe(Arc::new(HttpProbe::new(config.probe_url.clone(), config.probe_timeout()))),
        None => builder
            .transport(Arc::new(SimulatedApi { calls: AtomicUsize::new(0) }))
            .probe(Arc::new(StaticProbe(true))),
    };
    let orchestrator = Arc::new(builder.build());

    // ─────────────────────────────────────────────────────────────────────────
    // 3. Watch status from another task
    // ─────────────────────────────────────────────────────────────────────────
    let mut rx = orchestrator.subscribe();
    let watcher = tokio::spawn(async move {
        let mut last_status = String::new();
        while rx.changed().await.is_ok() {
            let snapshot = rx.borrow_and_update().clone();
            if snapshot.status != last_status {
                println!("   [{:>5.1}%] {}", snapshot.progress * 100.0, snapshot.status);
                last_status = snapshot.status;
            }
        }
    });

    // ─────────────────────────────────────────────────────────────────────────
    // 4. Sync
    // ─────────────────────────────────────────────────────────────────────────
    println!("\n🚀 Starting sync...");
    match orchestrator.start_sync().await {
        SyncStart::Completed(report) => {
            println!("\n✅ {} delivered, {} failed, {} batches", report.succeeded, report.failed, report.batch_count());
            for batch in &report.batches {
                println!(
                    "   batch {} (records {}..{}): {} after {} attempt(s)",
                    batch.batch.index + 1,
                    batch.batch.start + 1,
                    batch.batch.start + batch.batch.count,
                    batch.outcome.as_str(),
                    batch.attempts
                );
            }
        }
        other => println!("\n❌ Sync did not run: {:?}", other),
    }
    println!("   {}", orchestrator.stats_line());

    println!("\n📁 Directory after sync:");
    let mut names: Vec<_> = std::fs::read_dir(dir.path())?
        .filter_map(Result::ok)
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    for name in names {
        println!("   {}", name);
    }

    // ─────────────────────────────────────────────────────────────────────────
    // 5. Metrics
    // ─────────────────────────────────────────────────────────────────────────
    println!("\n📊 Metrics:");
    dump_metrics(&snapshotter);

    drop(orchestrator);
    watcher.abort();
    Ok(())
}

fn dump_metrics(snapshotter: &Snapshotter) {
    let mut lines: Vec<String> = snapshotter
        .snapshot()
        .into_vec()
        .into_iter()
        .map(|(composite_key, _, _, value)| {
            let (_, key) = composite_key.into_parts();
            let labels: Vec<_> = key.labels().map(|l| format!("{}={}", l.key(), l.value())).collect();
            let label_str = if labels.is_empty() { String::new() } else { format!("{{{}}}", labels.join(",")) };
            let rendered = match value {
                DebugValue::Counter(v) => v.to_string(),
                DebugValue::Gauge(v) => format!("{:.2}", v.into_inner()),
                DebugValue::Histogram(samples) => {
                    let sum: f64 = samples.iter().map(|v| v.into_inner()).sum();
                    format!("count={} sum={:.3}s", samples.len(), sum)
                }
            };
            format!("{}{} = {}", key.name(), label_str, rendered)
        })
        .collect();
    lines.sort();

    if lines.is_empty() {
        println!("   └─ (no metrics recorded)");
    }
    for line in lines {
        println!("   └─ {}", line);
    }
}
