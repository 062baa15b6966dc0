//! One chat exchange across the conversation store and the forwarder.

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use crate::conversation::{ConversationStore, StoreError, Turn};
use crate::llm::{CompletionForwarder, ForwardError};

/// Failures of a chat exchange.
#[derive(Debug, Error)]
pub enum RelayError {
    /// The store refused a mutation.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    /// The upstream completion failed.
    #[error("forward error: {0}")]
    Forward(#[from] ForwardError),
}

/// Convenience result alias for relay operations.
pub type RelayResult<T> = Result<T, RelayError>;

/// Assistant reply returned to the caller.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct ChatReply {
    /// Assistant text.
    pub message: String,
    /// Conversation the reply belongs to.
    pub conversation_id: String,
}

/// Relays user messages upstream while keeping conversation history.
#[derive(Clone)]
pub struct ChatRelay {
    store: Arc<dyn ConversationStore>,
    forwarder: Arc<dyn CompletionForwarder>,
}

impl ChatRelay {
    /// Build a relay from its collaborators.
    #[must_use]
    pub fn new(store: Arc<dyn ConversationStore>, forwarder: Arc<dyn CompletionForwarder>) -> Self {
        Self { store, forwarder }
    }

    /// Conversation store backing this relay.
    #[must_use]
    pub const fn store(&self) -> &Arc<dyn ConversationStore> {
        &self.store
    }

    /// Record `message` under `conversation_id`, forward the history and
    /// record the reply.
    ///
    /// The user turn stays recorded when forwarding fails.
    ///
    /// # Errors
    /// Returns an error if the store rejects a turn or the upstream call fails.
    pub async fn send(&self, conversation_id: &str, message: &str) -> RelayResult<ChatReply> {
        let user = Turn::user(message);
        let history = match self.store.append(conversation_id, user.clone()).await {
            Err(StoreError::ConversationNotFound(_)) => {
                self.store.get_or_create(conversation_id).await;
                self.store.append(conversation_id, user).await?
            }
            appended => appended?,
        };

        let reply = match self.forwarder.complete(&history).await {
            Ok(reply) => reply,
            Err(err) => {
                tracing::warn!(conversation_id, error = %err, "completion failed");
                return Err(err.into());
            }
        };

        self.store.append(conversation_id, reply.clone()).await?;

        Ok(ChatReply {
            message: reply.into_content(),
            conversation_id: conversation_id.to_owned(),
        })
    }

    /// Forget the conversation. Unknown ids are a no-op.
    pub async fn reset(&self, conversation_id: &str) {
        let removed = self.store.delete(conversation_id).await;
        let conversations = self.store.len().await;
        tracing::debug!(
            conversation_id,
            removed,
            conversations,
            "conversation reset"
        );
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use crate::conversation::{ConversationSeed, InMemoryConversationStore, Role};
    use crate::llm::ForwardResult;

    /// Forwarder that replays scripted outcomes and records what it was sent.
    pub(crate) struct ScriptedForwarder {
        outcomes: Mutex<Vec<ForwardResult<Turn>>>,
        seen: Mutex<Vec<Vec<Turn>>>,
    }

    impl ScriptedForwarder {
        pub(crate) fn new(mut outcomes: Vec<ForwardResult<Turn>>) -> Self {
            outcomes.reverse();
            Self {
                outcomes: Mutex::new(outcomes),
                seen: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn replying(texts: &[&str]) -> Self {
            Self::new(texts.iter().map(|text| Ok(Turn::assistant(*text))).collect())
        }

        pub(crate) fn seen(&self) -> Vec<Vec<Turn>> {
            self.seen.lock().map(|seen| seen.clone()).unwrap_or_default()
        }
    }

    #[async_trait]
    impl CompletionForwarder for ScriptedForwarder {
        async fn complete(&self, conversation: &[Turn]) -> ForwardResult<Turn> {
            if let Ok(mut seen) = self.seen.lock() {
                seen.push(conversation.to_vec());
            }
            self.outcomes
                .lock()
                .ok()
                .and_then(|mut outcomes| outcomes.pop())
                .unwrap_or_else(|| Err(ForwardError::Unexpected("no scripted reply".to_string())))
        }
    }

    fn relay(forwarder: ScriptedForwarder) -> (ChatRelay, Arc<ScriptedForwarder>) {
        let store = Arc::new(InMemoryConversationStore::new(ConversationSeed::new(
            "prompt", "greeting",
        )));
        let forwarder = Arc::new(forwarder);
        (ChatRelay::new(store, forwarder.clone()), forwarder)
    }

    #[tokio::test]
    async fn test_send_records_both_turns() -> Result<(), Box<dyn std::error::Error>> {
        let (relay, forwarder) = relay(ScriptedForwarder::replying(&["Hi Sam"]));

        let reply = relay.send("c1", "I'm Sam").await?;
        assert_eq!(reply.message, "Hi Sam");
        assert_eq!(reply.conversation_id, "c1");

        let stored = relay.store().get("c1").await.unwrap_or_default();
        assert_eq!(
            stored,
            vec![
                Turn::system("prompt"),
                Turn::assistant("greeting"),
                Turn::user("I'm Sam"),
                Turn::assistant("Hi Sam"),
            ]
        );

        let seen = forwarder.seen();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].last(), Some(&Turn::user("I'm Sam")));
        Ok(())
    }

    #[tokio::test]
    async fn test_follow_up_forwards_full_history() -> Result<(), Box<dyn std::error::Error>> {
        let (relay, forwarder) = relay(ScriptedForwarder::replying(&["Hi Sam", "Noted"]));

        relay.send("c1", "I'm Sam").await?;
        relay.send("c1", "I have a cough").await?;

        let seen = forwarder.seen();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].len(), 3);
        assert_eq!(
            seen[1],
            vec![
                Turn::system("prompt"),
                Turn::assistant("greeting"),
                Turn::user("I'm Sam"),
                Turn::assistant("Hi Sam"),
                Turn::user("I have a cough"),
            ]
        );
        assert_eq!(relay.store().len().await, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_failed_forward_keeps_user_turn() {
        let (relay, _) = relay(ScriptedForwarder::new(vec![Err(
            ForwardError::UpstreamStatus { status: 500 },
        )]));

        let result = relay.send("c1", "hello").await;
        assert!(matches!(
            result,
            Err(RelayError::Forward(ForwardError::UpstreamStatus { status: 500 }))
        ));

        let stored = relay.store().get("c1").await.unwrap_or_default();
        assert_eq!(stored.len(), 3);
        assert_eq!(stored[2], Turn::user("hello"));
        assert!(stored.iter().skip(2).all(|turn| turn.role() != Role::Assistant));
    }

    #[tokio::test]
    async fn test_forwarded_history_is_per_conversation() -> Result<(), Box<dyn std::error::Error>> {
        let (relay, forwarder) = relay(ScriptedForwarder::replying(&["to a", "to b"]));

        relay.send("a", "secret for a").await?;
        relay.send("b", "message for b").await?;

        let seen = forwarder.seen();
        assert_eq!(seen.len(), 2);
        assert!(seen[1].iter().all(|turn| turn.content() != "secret for a"));
        Ok(())
    }

    #[tokio::test]
    async fn test_reset_twice_is_safe() -> Result<(), Box<dyn std::error::Error>> {
        let (relay, _) = relay(ScriptedForwarder::replying(&["ok"]));
        relay.send("c1", "hello").await?;

        relay.reset("c1").await;
        relay.reset("c1").await;
        assert!(relay.store().get("c1").await.is_none());
        Ok(())
    }
}
