// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Retry timing: backoff formulas and the delay abstraction.
//!
//! Two retry layers exist. The request layer re-posts one body on throttling
//! (exponential) or transport/server errors (linear). The batch layer
//! re-runs the request layer with a longer linear delay, stretched further
//! when the last answer mentioned rate limiting.
//!
//! All waiting goes through a [`Sleeper`] so tests can observe delays without
//! real time passing, and through [`sleep_or_cancel`] so a cancelled run stops
//! at the next wait.
//!
//! # Example
//!
//! ```
//! use lead_sync::RetryConfig;
//! use std::time::Duration;
//!
//! let batch = RetryConfig::batch();
//! assert_eq!(batch.max_attempts, 5);
//! assert_eq!(batch.rate_limit_delay(0), Duration::from_secs(2));
//! assert_eq!(batch.rate_limit_delay(10), Duration::from_secs(60)); // capped
//! assert_eq!(batch.network_delay(2), Duration::from_secs(6));
//! ```

use async_trait::async_trait;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::classify::is_rate_limit_message;

/// Request-level retry behaviour.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// POST attempts for one body
    pub max_attempts: usize,
    /// Unit for both the exponential and linear delays
    pub base_delay: Duration,
    /// Cap on the exponential (throttling) delay
    pub max_delay: Duration,
    /// Per-request timeout
    pub timeout: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::batch()
    }
}

impl RetryConfig {
    /// Array uploads: 5 attempts, 2 s unit, 30 s timeout.
    #[must_use]
    pub fn batch() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(60),
            timeout: Duration::from_secs(30),
        }
    }

    /// Single-record uploads: same schedule, 20 s timeout.
    #[must_use]
    pub fn single() -> Self {
        Self {
            timeout: Duration::from_secs(20),
            ..Self::batch()
        }
    }

    /// Delay after a throttled attempt (`attempt` is 0-based):
    /// `min(base * 2^attempt, max_delay)`.
    #[must_use]
    pub fn rate_limit_delay(&self, attempt: usize) -> Duration {
        let factor = 2u32.saturating_pow(u32::try_from(attempt).unwrap_or(u32::MAX));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Delay after a transport or server error (`attempt` is 0-based):
    /// `base * (attempt + 1)`.
    #[must_use]
    pub fn network_delay(&self, attempt: usize) -> Duration {
        let factor = u32::try_from(attempt + 1).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor)
    }
}

/// Batch-level retry behaviour.
#[derive(Debug, Clone)]
pub struct BatchRetryPolicy {
    /// Times the request layer is run for one batch
    pub max_attempts: usize,
    /// Linear unit; also the pause between batches
    pub base_delay: Duration,
    /// Cap on the linear delay
    pub max_delay: Duration,
    /// Floor applied when throttling was reported
    pub rate_limit_floor: Duration,
}

impl Default for BatchRetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            base_delay: Duration::from_secs(10),
            max_delay: Duration::from_secs(60),
            rate_limit_floor: Duration::from_secs(15),
        }
    }
}

impl BatchRetryPolicy {
    /// Delay before the next attempt of a batch (`attempt` is 1-based, the
    /// attempt that just failed). Throttling answers double the delay, with
    /// a floor of `rate_limit_floor`.
    #[must_use]
    pub fn retry_delay(&self, attempt: usize, last_message: &str) -> Duration {
        let factor = u32::try_from(attempt).unwrap_or(u32::MAX);
        let delay = self.base_delay.saturating_mul(factor).min(self.max_delay);
        if is_rate_limit_message(last_message) {
            delay.saturating_mul(2).max(self.rate_limit_floor)
        } else {
            delay
        }
    }
}

/// Source of timed waits.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Real waits on the tokio timer.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// The run was cancelled while waiting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("sync cancelled")]
pub struct Cancelled;

/// Wait for `duration` unless `cancel` fires first.
pub async fn sleep_or_cancel(
    sleeper: &dyn Sleeper,
    duration: Duration,
    cancel: &CancellationToken,
) -> Result<(), Cancelled> {
    if cancel.is_cancelled() {
        return Err(Cancelled);
    }
    tokio::select! {
        _ = cancel.cancelled() => Err(Cancelled),
        _ = sleeper.sleep(duration) => Ok(()),
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use testing::RecordingSleeper;

    #[test]
    fn test_retry_config_presets() {
        let batch = RetryConfig::batch();
        assert_eq!(batch.max_attempts, 5);
        assert_eq!(batch.timeout, Duration::from_secs(30));

        let single = RetryConfig::single();
        assert_eq!(single.max_attempts, 5);
        assert_eq!(single.timeout, Duration::from_secs(20));
    }

    #[test]
    fn test_rate_limit_delay_exponential_backoff() {
        let config = RetryConfig::batch();
        let delays: Vec<_> = (0..5).map(|a| config.rate_limit_delay(a).as_secs()).collect();
        assert_eq!(delays, vec![2, 4, 8, 16, 32]);
    }

    #[test]
    fn test_rate_limit_delay_caps_at_max() {
        let config = RetryConfig::batch();
        assert_eq!(config.rate_limit_delay(5), Duration::from_secs(60));
        assert_eq!(config.rate_limit_delay(1000), Duration::from_secs(60));
    }

    #[test]
    fn test_network_delay_linear() {
        let config = RetryConfig::batch();
        let delays: Vec<_> = (0..4).map(|a| config.network_delay(a).as_secs()).collect();
        assert_eq!(delays, vec![2, 4, 6, 8]);
    }

    #[test]
    fn test_batch_retry_delay_linear_and_capped() {
        let policy = BatchRetryPolicy::default();
        assert_eq!(policy.retry_delay(1, "Unknown"), Duration::from_secs(10));
        assert_eq!(policy.retry_delay(3, "Unknown"), Duration::from_secs(30));
        assert_eq!(policy.retry_delay(9, "Unknown"), Duration::from_secs(60));
    }

    #[test]
    fn test_batch_retry_delay_extended_on_rate_limit() {
        let policy = BatchRetryPolicy::default();
        assert_eq!(policy.retry_delay(1, "Rate limited by API"), Duration::from_secs(20));
        assert_eq!(policy.retry_delay(9, "quota exceeded"), Duration::from_secs(120));

        let fast = BatchRetryPolicy { base_delay: Duration::from_secs(1), ..Default::default() };
        assert_eq!(fast.retry_delay(1, "too many requests"), Duration::from_secs(15));
    }

    #[tokio::test]
    async fn test_sleep_or_cancel_completes() {
        let sleeper = RecordingSleeper::default();
        let token = CancellationToken::new();
        sleep_or_cancel(&sleeper, Duration::from_secs(3), &token).await.unwrap();
        assert_eq!(sleeper.total(), Duration::from_secs(3));
    }

    #[tokio::test]
    async fn test_sleep_or_cancel_when_cancelled() {
        let sleeper = RecordingSleeper::default();
        let token = CancellationToken::new();
        token.cancel();
        assert_eq!(sleep_or_cancel(&sleeper, Duration::from_secs(3), &token).await, Err(Cancelled));
        assert!(sleeper.calls.lock().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_interrupts_real_sleep() {
        let token = CancellationToken::new();
        let child = token.clone();
        let handle = tokio::spawn(async move {
            sleep_or_cancel(&TokioSleeper, Duration::from_secs(3600), &child).await
        });
        tokio::task::yield_now().await;
        token.cancel();
        assert_eq!(handle.await.unwrap(), Err(Cancelled));
    }
}
