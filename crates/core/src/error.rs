//! Error types for the MindScope domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error type.

use thiserror::Error;

// --- Bounded context errors ---

/// A modality adapter could not process its input.
///
/// Adapters that report failure through a sentinel record (see
/// [`crate::modality::ImageSentiment::Failed`]) never produce this error; it is
/// reserved for failures the adapter raises.
#[derive(Debug, Clone, Error)]
pub enum AdapterError {
    #[error("{modality} adapter failed: {reason}")]
    Failed { modality: String, reason: String },
}

impl AdapterError {
    pub fn failed(modality: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Failed {
            modality: modality.into(),
            reason: reason.into(),
        }
    }
}

/// A modality record had a shape the fusion engine cannot use.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FusionError {
    #[error("Malformed {modality} record: {reason}")]
    Malformed { modality: String, reason: String },

    #[error("Empty per-frame result list at image #{index}")]
    EmptyFrameList { index: usize },

    #[error("Invalid score {score} for label '{label}' (expected a finite value in [0, 1])")]
    InvalidScore { label: String, score: f64 },

    #[error("Empty label in {modality} record")]
    EmptyLabel { modality: String },
}

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}
