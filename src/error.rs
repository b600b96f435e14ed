//! Error types for image generation.

use crate::types::ProviderKind;
use std::time::Duration;

/// Errors that can occur during image generation.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Caller input was rejected before any network call.
    #[error("invalid request: {0}")]
    Validation(String),

    /// No API credential is configured for the selected provider.
    #[error("missing API credential for provider: {0}")]
    MissingCredential(ProviderKind),

    /// The provider returned a non-success response.
    #[error("provider error: {status} - {message}")]
    Provider {
        /// HTTP status code of the failing response.
        status: u16,
        /// Provider-supplied error body, surfaced verbatim.
        message: String,
    },

    /// The remote job reached a terminal failure status.
    #[error("image generation failed: {0}")]
    GenerationFailed(String),

    /// The polling attempt budget was exhausted without a terminal status.
    #[error("generation timed out after {attempts} polls at {interval:?}")]
    Timeout {
        /// Number of status queries performed.
        attempts: u32,
        /// Delay between status queries.
        interval: Duration,
    },

    /// Network or HTTP transport error.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Returns true if the caller must correct its input before retrying.
    ///
    /// Validation-class failures never reach the network and are never worth
    /// retrying as-is.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::MissingCredential(_))
    }

    /// Returns true if the generation ran out of polling attempts.
    ///
    /// Distinct from other failures so a UI can suggest simply retrying.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// Result type alias for image generation operations.
pub type Result<T> = std::result::Result<T, Error>;
