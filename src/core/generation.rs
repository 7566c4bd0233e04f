//! Generation collaborator interface and error classification
//!
//! The actual image generation call is a black box behind [`ImageGenerator`].
//! Its failures carry enough structure for the retry executor to decide
//! whether another attempt can help.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::retry::RetryClassify;

/// One generated image with its thumbnail
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GeneratedImage {
    /// Where the full-size image was stored
    pub image_location: String,
    /// Where the thumbnail was stored
    pub thumbnail_location: String,
}

/// Failure of a single generation call
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GenerationError {
    /// The upstream rejected the call for being too fast
    #[error("Upstream rate limited: {0}")]
    RateLimited(String),

    /// Transient upstream failure (5xx)
    #[error("Upstream server error ({status}): {message}")]
    Upstream {
        /// HTTP status reported by the upstream
        status: u16,
        /// Upstream-provided message
        message: String,
    },

    /// The call did not complete in time
    #[error("Timeout: {0}")]
    Timeout(String),

    /// The upstream could not be reached
    #[error("Connection error: {0}")]
    Connection(String),

    /// The prompt was rejected as invalid or disallowed
    #[error("Invalid prompt: {0}")]
    InvalidPrompt(String),

    /// The caller is not allowed to use this upstream
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Anything else; treated as fatal so real bugs are not masked by retries
    #[error("Generation failed: {0}")]
    Other(String),
}

impl GenerationError {
    /// Classify an upstream HTTP status into a generation error
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            429 => Self::RateLimited(message),
            408 => Self::Timeout(message),
            400 | 422 => Self::InvalidPrompt(message),
            401 | 403 => Self::PermissionDenied(message),
            500..=599 => Self::Upstream { status, message },
            _ => Self::Other(message),
        }
    }

    /// Whether another attempt can plausibly succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimited(_) | Self::Upstream { .. } | Self::Timeout(_) | Self::Connection(_)
        )
    }
}

impl RetryClassify for GenerationError {
    fn is_retryable(&self) -> bool {
        GenerationError::is_retryable(self)
    }
}

/// The black-box generation call
///
/// Takes one prompt, the current set of reference URLs and a variant index,
/// and produces a stored image plus thumbnail, or fails with a classified
/// error.
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    /// Generate one image variant
    async fn generate(
        &self,
        prompt: &str,
        reference_urls: &[String],
        variant_index: u32,
    ) -> std::result::Result<GeneratedImage, GenerationError>;
}
