// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Scripted collaborators shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

use lead_sync::{ConnectivityProbe, ContractorRecord, HttpReply, LeadWriter, Sleeper, Transport, TransportError};

pub const OK_BODY: &str = r#"{"success":true,"message":"Data processed successfully","count":"50"}"#;

pub fn ok() -> Result<HttpReply, TransportError> {
    Ok(HttpReply::new(200, OK_BODY))
}

pub fn reply(status: u16, body: &str) -> Result<HttpReply, TransportError> {
    Ok(HttpReply::new(status, body))
}

/// Answers from a script, then repeats the last answer (or 200 OK).
#[derive(Default)]
pub struct ScriptedTransport {
    script: Mutex<VecDeque<Result<HttpReply, TransportError>>>,
    last: Mutex<Option<Result<HttpReply, TransportError>>>,
    pub bodies: Mutex<Vec<String>>,
}

impl ScriptedTransport {
    pub fn new(script: Vec<Result<HttpReply, TransportError>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            ..Default::default()
        })
    }

    pub fn calls(&self) -> usize {
        self.bodies.lock().len()
    }

    /// Number of JSON objects in each posted array.
    pub fn batch_sizes(&self) -> Vec<usize> {
        self.bodies
            .lock()
            .iter()
            .map(|b| serde_json::from_str::<Vec<serde_json::Value>>(b).map(|v| v.len()).unwrap_or(0))
            .collect()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn post_json(&self, body: &str, _timeout: Duration) -> Result<HttpReply, TransportError> {
        self.bodies.lock().push(body.to_string());
        let next = self.script.lock().pop_front();
        let answer = match next {
            Some(answer) => answer,
            None => self.last.lock().clone().unwrap_or_else(ok),
        };
        *self.last.lock() = Some(answer.clone());
        answer
    }
}

/// Fixed answer, counting calls.
pub struct CountingProbe {
    online: bool,
    pub calls: AtomicUsize,
}

impl CountingProbe {
    pub fn new(online: bool) -> Arc<Self> {
        Arc::new(Self { online, calls: AtomicUsize::new(0) })
    }
}

#[async_trait]
impl ConnectivityProbe for CountingProbe {
    async fn check(&self) -> bool {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.online
    }
}

/// Blocks until released, then reports online.
#[derive(Default)]
pub struct GatedProbe {
    pub gate: Notify,
}

#[async_trait]
impl ConnectivityProbe for GatedProbe {
    async fn check(&self) -> bool {
        self.gate.notified().await;
        true
    }
}

/// Signals `entered` on each request, then holds it until `gate` is released.
#[derive(Default)]
pub struct GatedTransport {
    pub entered: Notify,
    pub gate: Notify,
    pub calls: AtomicUsize,
}

#[async_trait]
impl Transport for GatedTransport {
    async fn post_json(&self, _body: &str, _timeout: Duration) -> Result<HttpReply, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.entered.notify_one();
        self.gate.notified().await;
        ok()
    }
}

/// Records requested delays and returns immediately.
#[derive(Default)]
pub struct RecordingSleeper {
    pub calls: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn total(&self) -> Duration {
        self.calls.lock().iter().sum()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.calls.lock().push(duration);
    }
}

/// Never wakes; only cancellation ends a wait.
pub struct StuckSleeper;

#[async_trait]
impl Sleeper for StuckSleeper {
    async fn sleep(&self, _duration: Duration) {
        std::future::pending::<()>().await;
    }
}

pub fn lead(i: usize) -> ContractorRecord {
    ContractorRecord {
        name: format!("Lead {i}"),
        mobile_number: format!("05{i:08}"),
        email: format!("lead{i}@example.com"),
        company_name: "Acme Drywall".into(),
        account_type: "Contractor".into(),
        application_type: "Ceiling".into(),
        ..Default::default()
    }
}

/// Write `n` registrations through the writer the kiosk form uses.
pub fn write_leads(path: &Path, n: usize) -> LeadWriter {
    let writer = LeadWriter::new(path);
    writer.ensure_file().unwrap();
    for i in 0..n {
        writer.append(&lead(i)).unwrap();
    }
    writer
}
