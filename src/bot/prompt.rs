use super::conversation_state::{Part, Turn};
use super::user_state::Mode;

pub const WORD_LIMIT_SUFFIX: &str = " and ensure your response does not exceed 300 words.";

/// Reference to media attached to an inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageReference {
    pub url: String,
    pub content_type: String,
}

/// What the user sent, before any instruction is applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserInput {
    Text(String),
    TextWithImage { text: String, image: ImageReference },
}

impl UserInput {
    #[cfg(test)]
    pub fn text(&self) -> &str {
        match self {
            UserInput::Text(text) | UserInput::TextWithImage { text, .. } => text,
        }
    }

    /// Converts the input into the user turn sent to the model.
    pub fn into_turn(self) -> Turn {
        match self {
            UserInput::Text(text) => Turn::user(vec![Part::Text(text)]),
            UserInput::TextWithImage { text, image } => Turn::user(vec![
                Part::Text(text),
                Part::Image {
                    url: image.url,
                    mime_type: image.content_type,
                },
            ]),
        }
    }
}

/// The active instruction for `mode`, always carrying the word limit.
pub fn instruction_for(mode: Mode) -> String {
    format!("{}{}", mode.instruction(), WORD_LIMIT_SUFFIX)
}

/// Wraps the user's text with the mode instruction. The image reference,
/// if any, passes through untouched.
///
/// The word-limit suffix means the instruction is never empty, so every
/// input is rewritten.
pub fn compose(mode: Mode, input: UserInput) -> UserInput {
    let instruction = instruction_for(mode);
    let wrap = |text: &str| format!("Instruction: {instruction}\nUser question: {text}");

    match input {
        UserInput::Text(text) => UserInput::Text(wrap(&text)),
        UserInput::TextWithImage { text, image } => UserInput::TextWithImage {
            text: wrap(&text),
            image,
        },
    }
}
