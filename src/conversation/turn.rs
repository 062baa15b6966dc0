//! Turn model for conversation history.

use serde::{Deserialize, Serialize};

/// Role of a conversation turn.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System instruction.
    System,
    /// User input.
    User,
    /// Assistant response.
    Assistant,
}

impl Role {
    /// Stable string form, as sent upstream.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }

    /// Whether turns of this role belong to the forwarded dialogue.
    #[must_use]
    pub const fn is_dialogue(self) -> bool {
        matches!(self, Self::User | Self::Assistant)
    }
}

/// A single message in a conversation. Immutable once built.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    role: Role,
    content: String,
}

impl Turn {
    /// Build a turn with an explicit role.
    #[must_use]
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    /// Build a system turn.
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// Build a user turn.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Build an assistant turn.
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Role of the turn.
    #[must_use]
    pub const fn role(&self) -> Role {
        self.role
    }

    /// Text content of the turn.
    #[must_use]
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Consume the turn and return its content.
    #[must_use]
    pub fn into_content(self) -> String {
        self.content
    }
}

/// Ordered turns of one conversation, oldest first.
pub type Conversation = Vec<Turn>;
