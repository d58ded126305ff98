use std::sync::Arc;

use tracing::info;

use super::conversation_state::{SessionStore, Turn};
use crate::gemini_client::{ChatModel, CompletionError};

pub const MAX_WORDS: usize = 300;

/// Sends a composed turn to the model with the user's history and records
/// the exchange.
pub struct Completer {
    model: Arc<dyn ChatModel>,
    sessions: Arc<dyn SessionStore>,
    system_prompt: String,
}

impl Completer {
    pub fn new(
        model: Arc<dyn ChatModel>,
        sessions: Arc<dyn SessionStore>,
        system_prompt: String,
    ) -> Self {
        Self {
            model,
            sessions,
            system_prompt,
        }
    }

    /// Returns the reply, trimmed to [`MAX_WORDS`]. History receives the
    /// untrimmed reply, and only when the call succeeds.
    pub async fn complete(&self, user_id: &str, input: Turn) -> Result<String, CompletionError> {
        let history = self.sessions.history(user_id).await;
        let mut history = history.lock().await;

        let raw = self
            .model
            .generate(&self.system_prompt, history.turns(), &input)
            .await?;

        history.add_user_turn(input);
        history.add_model_message(&raw);

        Ok(truncate_words(&raw, MAX_WORDS))
    }
}

/// Cuts `text` to its first `max_words` whitespace-separated words and adds
/// `...`. Text within the limit is returned unchanged.
pub fn truncate_words(text: &str, max_words: usize) -> String {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.len() <= max_words {
        return text.to_string();
    }

    info!("Trimming response from {} words to {}", words.len(), max_words);
    format!("{}...", words[..max_words].join(" "))
}
