// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Classification of API responses.
//!
//! The endpoint does not have a strict contract: it answers `2xx` with a
//! `{success, message, count}` envelope, sometimes preceded by PHP warnings,
//! and signals throttling either with HTTP 429 or with prose in the body.
//! All phrase matching lives here so it can be replaced by a stricter
//! contract in one place.
//!
//! # Example
//!
//! ```
//! use lead_sync::classify::{classify_response, ApiOutcome, ResponseMode};
//!
//! let c = classify_response(r#"{"success":true,"message":"Data processed"}"#, ResponseMode::Batch);
//! assert_eq!(c.outcome, ApiOutcome::Success);
//!
//! let c = classify_response("Quota exceeded for today", ResponseMode::Batch);
//! assert_eq!(c.outcome, ApiOutcome::RateLimited);
//! ```

use serde::Deserialize;
use tracing::{debug, warn};

pub const RATE_LIMIT_PHRASES: [&str; 4] = ["rate limit", "too many requests", "limit exceeded", "quota exceeded"];
pub const SUCCESS_PHRASES: [&str; 2] = ["success", "processed"];
pub const EXISTS_PHRASES: [&str; 2] = ["already", "exist"];

/// Classification of one HTTP exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiOutcome {
    Success,
    /// Record(s) already present server-side; treated as delivered
    AlreadyExists,
    RateLimited,
    /// Transport failure (no HTTP status) or a retryable status
    NetworkError(Option<u16>),
    /// HTTP 5xx
    ServerError(u16),
    /// Non-retryable HTTP status (4xx other than 429)
    ClientError(u16),
    /// Body was neither a parsable envelope nor recognizable text
    MalformedResponse,
    /// Envelope parsed but its message signals neither success nor throttling
    Rejected,
}

impl ApiOutcome {
    /// Whether the exchange counts as delivered.
    #[must_use]
    pub fn is_delivered(&self) -> bool {
        matches!(self, Self::Success | Self::AlreadyExists)
    }

    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::AlreadyExists => "already_exists",
            Self::RateLimited => "rate_limited",
            Self::NetworkError(_) => "network_error",
            Self::ServerError(_) => "server_error",
            Self::ClientError(_) => "client_error",
            Self::MalformedResponse => "malformed",
            Self::Rejected => "rejected",
        }
    }
}

impl std::fmt::Display for ApiOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NetworkError(Some(code)) => write!(f, "network_error({})", code),
            Self::ServerError(code) | Self::ClientError(code) => write!(f, "{}({})", self.label(), code),
            _ => write!(f, "{}", self.label()),
        }
    }
}

/// Which request shape produced the response. Only affects the wording of
/// the surfaced message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseMode {
    Single,
    Batch,
}

/// Outcome plus the message to surface as "last API message".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classified {
    pub outcome: ApiOutcome,
    pub message: String,
}

impl Classified {
    fn new(outcome: ApiOutcome, message: impl Into<String>) -> Self {
        Self { outcome, message: message.into() }
    }
}

#[derive(Debug, Deserialize)]
struct ApiEnvelope {
    #[serde(default)]
    #[allow(dead_code)]
    success: Option<bool>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    #[allow(dead_code)]
    count: Option<serde_json::Value>,
}

fn contains_any(haystack: &str, phrases: &[&str]) -> bool {
    let lower = haystack.to_lowercase();
    phrases.iter().any(|p| lower.contains(p))
}

/// True when `text` mentions throttling.
#[must_use]
pub fn is_rate_limit_message(text: &str) -> bool {
    contains_any(text, &RATE_LIMIT_PHRASES)
}

/// Classify the body of a `2xx` response.
#[must_use]
pub fn classify_response(text: &str, mode: ResponseMode) -> Classified {
    if text.is_empty() {
        return Classified::new(ApiOutcome::Rejected, "Empty response from server");
    }

    if is_rate_limit_message(text) {
        warn!(response = %text, "Rate limiting detected in response body");
        return Classified::new(ApiOutcome::RateLimited, "Rate limited by API response");
    }

    // Tolerate text (e.g. PHP notices) ahead of the JSON envelope
    let json_part = text.find('{').map_or(text, |start| &text[start..]);

    let envelope = match serde_json::Deserializer::from_str(json_part)
        .into_iter::<ApiEnvelope>()
        .next()
    {
        Some(Ok(envelope)) => envelope,
        _ => return classify_raw(text, mode),
    };

    let message = envelope.message.unwrap_or_default();
    if message.is_empty() {
        warn!("Empty message in API response");
        return Classified::new(ApiOutcome::Rejected, message);
    }

    if is_rate_limit_message(&message) {
        warn!(message = %message, "Rate limiting detected in API message");
        return Classified::new(ApiOutcome::RateLimited, "Rate limited by API");
    }

    let outcome = if contains_any(&message, &EXISTS_PHRASES) {
        ApiOutcome::AlreadyExists
    } else if contains_any(&message, &SUCCESS_PHRASES) {
        ApiOutcome::Success
    } else {
        warn!(message = %message, "Unrecognized API response");
        ApiOutcome::Rejected
    };
    debug!(outcome = %outcome, message = %message, "Classified API envelope");
    Classified::new(outcome, message)
}

/// Fallback for bodies without a parsable envelope.
fn classify_raw(text: &str, mode: ResponseMode) -> Classified {
    if is_rate_limit_message(text) {
        Classified::new(ApiOutcome::RateLimited, "Rate limited by API")
    } else if contains_any(text, &EXISTS_PHRASES) {
        Classified::new(ApiOutcome::AlreadyExists, "Already registered")
    } else if contains_any(text, &SUCCESS_PHRASES) {
        let message = match mode {
            ResponseMode::Single => "Successfully registered",
            ResponseMode::Batch => "Batch successfully registered",
        };
        Classified::new(ApiOutcome::Success, message)
    } else {
        warn!(response = %text, "Unknown raw response");
        Classified::new(ApiOutcome::MalformedResponse, "Unknown response format")
    }
}
