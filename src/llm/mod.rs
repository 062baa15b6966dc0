//! Upstream completion clients.

pub mod anthropic;

use async_trait::async_trait;
use thiserror::Error;

use crate::conversation::Turn;

pub use anthropic::AnthropicForwarder;

/// Failures while forwarding a conversation upstream.
#[derive(Debug, Error)]
pub enum ForwardError {
    /// No upstream credential is configured.
    #[error("API key not configured")]
    MissingApiKey,
    /// Upstream answered with a non-success status.
    #[error("upstream returned HTTP {status}")]
    UpstreamStatus {
        /// HTTP status code returned upstream.
        status: u16,
    },
    /// Transport failure: DNS, connect, timeout or body read.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    /// Anything else, such as a malformed reply.
    #[error("{0}")]
    Unexpected(String),
}

/// Convenience result alias for forwarding.
pub type ForwardResult<T> = Result<T, ForwardError>;

/// Turns a conversation into a single assistant reply.
#[async_trait]
pub trait CompletionForwarder: Send + Sync {
    /// Send `conversation` upstream and return the assistant's reply.
    ///
    /// # Errors
    /// Returns a [`ForwardError`] describing why no reply was produced.
    async fn complete(&self, conversation: &[Turn]) -> ForwardResult<Turn>;
}

