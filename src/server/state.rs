//! Application state shared across all request handlers.

use std::path::PathBuf;
use std::sync::Arc;

use crate::config::RelayConfig;
use crate::conversation::{ConversationSeed, InMemoryConversationStore};
use crate::llm::AnthropicForwarder;
use crate::relay::ChatRelay;

/// Shared application state.
pub struct AppState {
    /// Chat orchestration over the store and upstream forwarder.
    pub relay: ChatRelay,
    /// Directory the front-end assets are served from.
    pub static_dir: PathBuf,
}

impl AppState {
    /// Create state from already-built parts.
    #[must_use]
    pub fn new(relay: ChatRelay, static_dir: impl Into<PathBuf>) -> Arc<Self> {
        Arc::new(Self {
            relay,
            static_dir: static_dir.into(),
        })
    }

    /// Build the in-memory store and Anthropic forwarder described by `config`.
    ///
    /// # Errors
    /// Returns an error if the configuration is invalid, the system prompt
    /// cannot be read, or the HTTP client cannot be created.
    pub fn from_config(
        config: &RelayConfig,
    ) -> Result<Arc<Self>, Box<dyn std::error::Error + Send + Sync>> {
        config.validate()?;

        let system_prompt = config.load_system_prompt()?;
        let store = Arc::new(InMemoryConversationStore::new(
            ConversationSeed::with_default_greeting(system_prompt),
        ));

        if !config.upstream.has_api_key() {
            tracing::warn!("ANTHROPIC_API_KEY is not set; chat requests will fail until it is");
        }
        let forwarder = AnthropicForwarder::new(config.upstream.clone())
            .map_err(|e| format!("Failed to create upstream client: {e}"))?;

        Ok(Self::new(
            ChatRelay::new(store, Arc::new(forwarder)),
            config.static_dir.clone(),
        ))
    }
}
