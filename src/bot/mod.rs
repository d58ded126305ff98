pub mod completion;
pub mod conversation_state;
pub mod prompt;
pub mod user_state;

#[cfg(test)]
pub mod test_support;

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, error, warn};

use completion::Completer;
use conversation_state::SessionStore;
use prompt::{ImageReference, UserInput, compose};
use user_state::{
    ConfigureAction, INVALID_NUMBER_TEXT, MENU_TEXT, ModeStore, UserState, configure_step,
    confirmation_text,
};

use crate::gemini_client::ChatModel;

pub const DEFAULT_IMAGE_PROMPT: &str = "Describe this image for me.";

pub const WELCOME_TEXT: &str =
    "Hello! I'm here to help. Please send me a question or an image. Type 'configure' to change settings.";
pub const AUDIO_TEXT: &str =
    "I received your voice note! I'm still learning to understand audio, but I'll be able to soon.";
pub const UNSUPPORTED_MEDIA_TEXT: &str =
    "I see you sent something, but I can only process text and images right now.";
pub const TROUBLE_THINKING_TEXT: &str =
    "I'm sorry, I'm having a little trouble thinking right now. Please try again in a moment.";
pub const EMPTY_REPLY_TEXT: &str =
    "I received your message, but I'm having trouble formulating a response. Could you please try rephrasing it?";

/// One message as delivered by the messaging provider's webhook.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InboundMessage {
    pub sender: String,
    pub body: String,
    pub num_media: u32,
    pub media_url: String,
    pub media_content_type: String,
}

enum Route {
    Model(UserInput),
    Reply(&'static str),
}

/// Serializes handling per user while leaving different users independent.
#[derive(Default)]
struct UserLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl UserLocks {
    async fn acquire(&self, user_id: &str) -> OwnedMutexGuard<()> {
        let lock = self
            .locks
            .lock()
            .await
            .entry(user_id.to_string())
            .or_default()
            .clone();
        lock.lock_owned().await
    }
}

/// Turns each inbound message into exactly one reply.
pub struct Dispatcher {
    modes: Arc<dyn ModeStore>,
    completer: Completer,
    locks: UserLocks,
}

impl Dispatcher {
    pub fn new(
        sessions: Arc<dyn SessionStore>,
        modes: Arc<dyn ModeStore>,
        model: Arc<dyn ChatModel>,
        system_prompt: String,
    ) -> Self {
        Self {
            modes,
            completer: Completer::new(model, sessions, system_prompt),
            locks: UserLocks::default(),
        }
    }

    pub async fn handle(&self, message: &InboundMessage) -> String {
        let sender = message.sender.as_str();
        let text = message.body.trim().to_lowercase();
        debug!(sender, num_media = message.num_media, "Inbound message");

        let _guard = self.locks.acquire(sender).await;
        let state = self.modes.state(sender).await;

        if let Some(action) = configure_step(&state, &text) {
            return self.configure(sender, state, action).await;
        }

        let input = match route(message, text) {
            Route::Model(input) => input,
            Route::Reply(reply) => return reply.to_string(),
        };

        let turn = compose(state.mode, input).into_turn();
        match self.completer.complete(sender, turn).await {
            Ok(reply) if !reply.trim().is_empty() => reply,
            Ok(_) => {
                warn!(sender, "AI response was empty, sending fallback message");
                EMPTY_REPLY_TEXT.to_string()
            }
            Err(e) => {
                error!(sender, error = %e, "Error invoking Gemini");
                TROUBLE_THINKING_TEXT.to_string()
            }
        }
    }

    async fn configure(&self, sender: &str, state: UserState, action: ConfigureAction) -> String {
        match action {
            ConfigureAction::OpenMenu => {
                self.modes.save(sender, state.configuring()).await;
                MENU_TEXT.to_string()
            }
            ConfigureAction::Select(index) => match self.modes.set_mode(sender, index).await {
                Ok(mode) => {
                    debug!(sender, ?mode, "Mode changed");
                    confirmation_text(index)
                }
                Err(e) => {
                    debug!(sender, error = %e, "Rejected mode selection");
                    INVALID_NUMBER_TEXT.to_string()
                }
            },
            ConfigureAction::Reject(reply) => reply.to_string(),
        }
    }
}

fn route(message: &InboundMessage, text: String) -> Route {
    if message.num_media == 0 {
        if text.is_empty() {
            return Route::Reply(WELCOME_TEXT);
        }
        return Route::Model(UserInput::Text(text));
    }

    let content_type = message.media_content_type.as_str();
    if content_type.contains("image") {
        let text = if text.is_empty() {
            DEFAULT_IMAGE_PROMPT.to_string()
        } else {
            text
        };
        Route::Model(UserInput::TextWithImage {
            text,
            image: ImageReference {
                url: message.media_url.clone(),
                content_type: message.media_content_type.clone(),
            },
        })
    } else if content_type.contains("audio") {
        Route::Reply(AUDIO_TEXT)
    } else {
        Route::Reply(UNSUPPORTED_MEDIA_TEXT)
    }
}
