//! In-memory conversation store.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use thiserror::Error;

use super::turn::{Conversation, Role, Turn};
use super::ConversationSeed;

/// Errors produced by conversation store operations.
#[derive(Debug, Error, Clone, Eq, PartialEq)]
pub enum StoreError {
    /// Append targeted a key that was never initialized.
    #[error("conversation not found: {0}")]
    ConversationNotFound(String),
    /// Only the seeded system turn may exist in a conversation.
    #[error("system turns can only be set when a conversation is created")]
    SystemTurnRejected,
}

/// Result type for conversation store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Storage for conversation histories keyed by conversation id.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Return the conversation for `key`, creating a seeded one if absent.
    async fn get_or_create(&self, key: &str) -> Conversation;

    /// Append a turn to an existing conversation and return a snapshot of it
    /// taken right after the push.
    ///
    /// # Errors
    /// Returns [`StoreError::ConversationNotFound`] if `key` was never created
    /// and [`StoreError::SystemTurnRejected`] for system-role turns.
    async fn append(&self, key: &str, turn: Turn) -> StoreResult<Conversation>;

    /// Remove the conversation for `key`. Returns whether an entry existed.
    async fn delete(&self, key: &str) -> bool;

    /// Snapshot of the conversation for `key`, if any.
    async fn get(&self, key: &str) -> Option<Conversation>;

    /// Number of live conversations.
    async fn len(&self) -> usize;

    /// Whether the store holds no conversations.
    async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

/// Process-local store backed by a sharded concurrent map.
///
/// Each mutation runs under the shard lock of its key, so concurrent appends
/// to one conversation never lose turns. Nothing is persisted.
pub struct InMemoryConversationStore {
    seed: ConversationSeed,
    conversations: Arc<DashMap<String, Conversation>>,
}

impl InMemoryConversationStore {
    /// Create an empty store seeding new conversations from `seed`.
    #[must_use]
    pub fn new(seed: ConversationSeed) -> Self {
        Self {
            seed,
            conversations: Arc::new(DashMap::new()),
        }
    }
}

#[async_trait]
impl ConversationStore for InMemoryConversationStore {
    async fn get_or_create(&self, key: &str) -> Conversation {
        let mut created = false;
        let conversation = self
            .conversations
            .entry(key.to_owned())
            .or_insert_with(|| {
                created = true;
                self.seed.turns()
            })
            .value()
            .clone();

        if created {
            let conversations = self.len().await;
            tracing::debug!(
                conversation_id = key,
                conversations,
                "conversation created"
            );
        }
        conversation
    }

    async fn append(&self, key: &str, turn: Turn) -> StoreResult<Conversation> {
        if turn.role() == Role::System {
            return Err(StoreError::SystemTurnRejected);
        }

        let mut conversation = self
            .conversations
            .get_mut(key)
            .ok_or_else(|| StoreError::ConversationNotFound(key.to_owned()))?;
        conversation.push(turn);
        Ok(conversation.value().clone())
    }

    async fn delete(&self, key: &str) -> bool {
        self.conversations.remove(key).is_some()
    }

    async fn get(&self, key: &str) -> Option<Conversation> {
        self.conversations.get(key).map(|entry| entry.value().clone())
    }

    async fn len(&self) -> usize {
        self.conversations.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> InMemoryConversationStore {
        InMemoryConversationStore::new(ConversationSeed::new("be helpful", "hello"))
    }

    #[tokio::test]
    async fn test_new_conversation_is_seeded() {
        let store = store();
        let conversation = store.get_or_create("a").await;

        assert_eq!(
            conversation,
            vec![Turn::system("be helpful"), Turn::assistant("hello")]
        );
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_get_or_create_returns_existing() {
        let store = store();
        store.get_or_create("a").await;
        assert!(store.append("a", Turn::user("hi")).await.is_ok());

        let conversation = store.get_or_create("a").await;
        assert_eq!(conversation.len(), 3);
        assert_eq!(conversation[2], Turn::user("hi"));
    }

    #[tokio::test]
    async fn test_append_requires_existing_conversation() {
        let store = store();
        let result = store.append("missing", Turn::user("hi")).await;

        assert_eq!(
            result,
            Err(StoreError::ConversationNotFound("missing".to_string()))
        );
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_append_returns_history_including_new_turn() {
        let store = store();
        store.get_or_create("a").await;

        let after_first = store.append("a", Turn::user("one")).await;
        assert_eq!(
            after_first,
            Ok(vec![
                Turn::system("be helpful"),
                Turn::assistant("hello"),
                Turn::user("one"),
            ])
        );

        let after_second = store.append("a", Turn::assistant("two")).await.unwrap_or_default();
        assert_eq!(after_second.len(), 4);
        assert_eq!(Some(after_second), store.get("a").await);
    }

    #[tokio::test]
    async fn test_append_rejects_system_turns() {
        let store = store();
        store.get_or_create("a").await;

        let result = store.append("a", Turn::system("override")).await;
        assert_eq!(result, Err(StoreError::SystemTurnRejected));

        let conversation = store.get("a").await.unwrap_or_default();
        let systems = conversation
            .iter()
            .filter(|turn| turn.role() == Role::System)
            .count();
        assert_eq!(systems, 1);
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let store = store();
        store.get_or_create("a").await;

        assert!(store.delete("a").await);
        assert!(!store.delete("a").await);
        assert!(store.get("a").await.is_none());
    }

    #[tokio::test]
    async fn test_keys_are_isolated() {
        let store = store();
        store.get_or_create("a").await;
        store.get_or_create("b").await;
        assert!(store.append("a", Turn::user("only in a")).await.is_ok());

        let b = store.get("b").await.unwrap_or_default();
        assert!(b.iter().all(|turn| turn.content() != "only in a"));
        assert_eq!(b.len(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_appends_keep_every_turn() {
        let store = Arc::new(store());
        store.get_or_create("shared").await;

        let mut handles = Vec::new();
        for i in 0..64 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store.append("shared", Turn::user(format!("msg {i}"))).await
            }));
        }
        for handle in handles {
            assert!(matches!(handle.await, Ok(Ok(_))));
        }

        let conversation = store.get("shared").await.unwrap_or_default();
        assert_eq!(conversation.len(), 2 + 64);
        for i in 0..64 {
            let expected = format!("msg {i}");
            assert!(conversation.iter().any(|turn| turn.content() == expected));
        }
    }
}
