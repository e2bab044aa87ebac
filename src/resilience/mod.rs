//! Retry timing and cancellation-aware waits.

pub mod retry;
