//! Conversation history: turns, seeding and storage.

pub mod store;
pub mod turn;

pub use store::{ConversationStore, InMemoryConversationStore, StoreError, StoreResult};
pub use turn::{Conversation, Role, Turn};

/// Key used when a request does not name a conversation.
pub const DEFAULT_CONVERSATION_ID: &str = "default";

/// Assistant greeting that opens every conversation.
pub const DEFAULT_GREETING: &str =
    "Hello! I'm here to help you with your health concerns. To get started, may I have your first name?";

/// Opening turns given to every new conversation.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ConversationSeed {
    /// System instruction, loaded once at startup.
    pub system_prompt: String,
    /// Assistant greeting shown before the first user message.
    pub greeting: String,
}

impl ConversationSeed {
    /// Build a seed from a system prompt and greeting.
    #[must_use]
    pub fn new(system_prompt: impl Into<String>, greeting: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            greeting: greeting.into(),
        }
    }

    /// Build a seed with the standard greeting.
    #[must_use]
    pub fn with_default_greeting(system_prompt: impl Into<String>) -> Self {
        Self::new(system_prompt, DEFAULT_GREETING)
    }

    /// Opening turns: one system turn followed by the greeting.
    #[must_use]
    pub fn turns(&self) -> Conversation {
        vec![
            Turn::system(self.system_prompt.clone()),
            Turn::assistant(self.greeting.clone()),
        ]
    }
}

/// Resolve an optional request key to the conversation key actually used.
#[must_use]
pub fn resolve_conversation_id(requested: Option<String>) -> String {
    requested.unwrap_or_else(|| DEFAULT_CONVERSATION_ID.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seed_turn_order() {
        let seed = ConversationSeed::with_default_greeting("prompt");
        let turns = seed.turns();

        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0], Turn::system("prompt"));
        assert_eq!(turns[1], Turn::assistant(DEFAULT_GREETING));
    }

    #[test]
    fn test_resolve_conversation_id() {
        assert_eq!(resolve_conversation_id(None), DEFAULT_CONVERSATION_ID);
        assert_eq!(resolve_conversation_id(Some("abc".to_string())), "abc");
    }
}
