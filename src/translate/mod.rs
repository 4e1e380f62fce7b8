//! Translation pipeline: persistent bank, HTTP dispatch, and the
//! chunking/batching orchestrator.

pub mod bank;
pub mod client;
pub mod translator;

pub use bank::{BankEntry, BankStats, TranslationBank};
pub use client::TranslateClient;
pub use translator::Translator;

use std::time::Duration;

/// Delimiter used to combine several texts into one batch request.
/// Chosen to be unlikely to appear in source text and to survive the
/// translation round trip intact.
pub const BATCH_DELIMITER: &str = " ⟨SEP⟩ ";

#[derive(Debug)]
pub enum TranslateError {
    Transport(String),
    Timeout,
    Status(u16),
}

impl std::fmt::Display for TranslateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TranslateError::Transport(msg) => write!(f, "transport error: {msg}"),
            TranslateError::Timeout => write!(f, "request timeout"),
            TranslateError::Status(code) => write!(f, "unexpected status {code}"),
        }
    }
}

/// Pacing between outbound requests. Kept as explicit values so tests
/// can zero them out.
#[derive(Debug, Clone, Copy)]
pub struct BackoffPolicy {
    /// Pause between consecutive batch requests.
    pub inter_batch: Duration,
    /// Pause between individual requests in the per-item fallback.
    pub inter_item: Duration,
    /// Per-item start stagger in the concurrent instant-update path.
    pub stagger: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            inter_batch: Duration::from_millis(300),
            inter_item: Duration::from_millis(100),
            stagger: Duration::from_millis(50),
        }
    }
}

impl BackoffPolicy {
    /// Zero delays, for tests.
    pub fn none() -> Self {
        Self {
            inter_batch: Duration::ZERO,
            inter_item: Duration::ZERO,
            stagger: Duration::ZERO,
        }
    }
}

/// Current time in milliseconds since the Unix epoch.
pub(crate) fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
