// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Reachability check run before each sync.

use async_trait::async_trait;
use std::time::Duration;
use tracing::warn;

use crate::metrics;

#[async_trait]
pub trait ConnectivityProbe: Send + Sync {
    async fn check(&self) -> bool;
}

/// Single GET against a well-known host. Any failure means offline, no retry.
pub struct HttpProbe {
    client: reqwest::Client,
    url: String,
    timeout: Duration,
}

impl HttpProbe {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
            timeout,
        }
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl ConnectivityProbe for HttpProbe {
    async fn check(&self) -> bool {
        let reachable = match self.client.get(&self.url).timeout(self.timeout).send().await {
            Ok(response) if response.status().is_success() => true,
            Ok(response) => {
                warn!(status = response.status().as_u16(), url = %self.url, "Connectivity probe got error status");
                false
            }
            Err(e) => {
                warn!(error = %e, url = %self.url, "Connectivity probe failed");
                false
            }
        };
        metrics::record_probe(reachable);
        reachable
    }
}

/// Probe with a fixed answer, for hosts that manage connectivity themselves.
#[derive(Debug, Clone, Copy)]
pub struct StaticProbe(pub bool);

#[async_trait]
impl ConnectivityProbe for StaticProbe {
    async fn check(&self) -> bool {
        self.0
    }
}
