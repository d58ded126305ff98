use std::collections::VecDeque;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::conversation_state::Turn;
use crate::gemini_client::{ChatModel, CompletionError};

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub system_prompt: String,
    pub history_len: usize,
    pub input: Turn,
}

/// Model double that hands out canned replies in order. Once the script
/// runs out it answers with an empty string.
pub struct ScriptedModel {
    replies: Mutex<VecDeque<String>>,
    fail: bool,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedModel {
    pub fn replying<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().map(Into::into).collect()),
            fail: false,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Every call fails as if the provider timed out.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::replying(Vec::<String>::new())
        }
    }

    pub async fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().await.clone()
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    async fn generate(
        &self,
        system_prompt: &str,
        history: &[Turn],
        input: &Turn,
    ) -> Result<String, CompletionError> {
        self.calls.lock().await.push(RecordedCall {
            system_prompt: system_prompt.to_string(),
            history_len: history.len(),
            input: input.clone(),
        });

        if self.fail {
            return Err(CompletionError::Timeout);
        }
        Ok(self.replies.lock().await.pop_front().unwrap_or_default())
    }
}
