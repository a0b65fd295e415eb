//! Conversation history.
//!
//! An explicit key-value store seam: the engine appends both sides of every
//! exchange keyed by conversation id. The in-memory implementation serves
//! tests and the standalone daemon; a session-backed store can replace it
//! behind the same trait.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    System,
}

/// One message in a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub sender: Sender,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl Turn {
    pub fn user(message: impl Into<String>) -> Self {
        Self {
            sender: Sender::User,
            message: message.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn system(message: impl Into<String>) -> Self {
        Self {
            sender: Sender::System,
            message: message.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Conversation storage seam.
pub trait ConversationStore: Send + Sync {
    fn append(&self, conversation_id: &str, turn: Turn);
    fn history(&self, conversation_id: &str) -> Vec<Turn>;
}

/// Generate a fresh conversation id.
pub fn new_conversation_id() -> String {
    format!("conv_{}", uuid::Uuid::new_v4().simple())
}

#[derive(Debug, Default)]
pub struct InMemoryConversationStore {
    conversations: Mutex<HashMap<String, Vec<Turn>>>,
}

impl InMemoryConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn conversation_count(&self) -> usize {
        self.conversations.lock().unwrap().len()
    }
}

impl ConversationStore for InMemoryConversationStore {
    fn append(&self, conversation_id: &str, turn: Turn) {
        let mut conversations = self.conversations.lock().unwrap();
        conversations
            .entry(conversation_id.to_string())
            .or_default()
            .push(turn);
    }

    fn history(&self, conversation_id: &str) -> Vec<Turn> {
        let conversations = self.conversations.lock().unwrap();
        conversations
            .get(conversation_id)
            .cloned()
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_preserves_order() {
        let store = InMemoryConversationStore::new();
        store.append("c1", Turn::user("質問です"));
        store.append("c1", Turn::system("回答です"));

        let history = store.history("c1");
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].sender, Sender::User);
        assert_eq!(history[1].sender, Sender::System);
    }

    #[test]
    fn test_conversations_are_isolated() {
        let store = InMemoryConversationStore::new();
        store.append("c1", Turn::user("a"));
        store.append("c2", Turn::user("b"));

        assert_eq!(store.history("c1").len(), 1);
        assert_eq!(store.history("c2").len(), 1);
        assert!(store.history("c3").is_empty());
        assert_eq!(store.conversation_count(), 2);
    }

    #[test]
    fn test_conversation_ids_are_unique() {
        let a = new_conversation_id();
        let b = new_conversation_id();
        assert_ne!(a, b);
        assert!(a.starts_with("conv_"));
    }
}
