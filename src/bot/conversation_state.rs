use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

/// Who produced a turn. Gemini names the assistant side `model`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Model,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Model => "model",
        }
    }
}

/// A single piece of a turn's content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Part {
    Text(String),
    /// Media hosted by the messaging provider. Resolved to inline bytes
    /// only when it belongs to the turn being sent.
    Image { url: String, mime_type: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub role: Role,
    pub parts: Vec<Part>,
}

impl Turn {
    pub fn user(parts: Vec<Part>) -> Self {
        Self { role: Role::User, parts }
    }

    pub fn model(text: &str) -> Self {
        Self {
            role: Role::Model,
            parts: vec![Part::Text(text.to_string())],
        }
    }
}

/// Ordered turns exchanged with one user. Grows without bound for the
/// lifetime of the process.
#[derive(Debug, Default)]
pub struct ConversationState {
    turns: Vec<Turn>,
}

impl ConversationState {
    pub fn new() -> Self {
        Self { turns: Vec::new() }
    }

    pub fn add_user_turn(&mut self, turn: Turn) {
        debug_assert_eq!(turn.role, Role::User);
        self.turns.push(turn);
    }

    pub fn add_model_message(&mut self, message: &str) {
        self.turns.push(Turn::model(message));
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

/// Handle to a user's history. Every caller for the same user shares it.
pub type SharedHistory = Arc<Mutex<ConversationState>>;

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Returns the user's history, creating an empty one on first lookup.
    async fn history(&self, user_id: &str) -> SharedHistory;
}

#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: Mutex<HashMap<String, SharedHistory>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub async fn contains(&self, user_id: &str) -> bool {
        self.sessions.lock().await.contains_key(user_id)
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn history(&self, user_id: &str) -> SharedHistory {
        let mut sessions = self.sessions.lock().await;
        sessions
            .entry(user_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(ConversationState::new())))
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn history_is_created_lazily_and_shared() {
        let store = InMemorySessionStore::new();
        assert!(!store.contains("whatsapp:+1555").await);

        let first = store.history("whatsapp:+1555").await;
        assert!(store.contains("whatsapp:+1555").await);
        first.lock().await.add_model_message("hello");

        let second = store.history("whatsapp:+1555").await;
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn users_do_not_share_history() {
        let store = InMemorySessionStore::new();
        store
            .history("a")
            .await
            .lock()
            .await
            .add_user_turn(Turn::user(vec![Part::Text("hi".into())]));

        assert!(store.history("b").await.lock().await.is_empty());
    }

    #[test]
    fn turns_keep_insertion_order() {
        let mut state = ConversationState::new();
        state.add_user_turn(Turn::user(vec![Part::Text("question".into())]));
        state.add_model_message("answer");

        let roles: Vec<_> = state.turns().iter().map(|t| t.role).collect();
        assert_eq!(roles, vec![Role::User, Role::Model]);
    }
}
