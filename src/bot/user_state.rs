use std::collections::HashMap;
use std::num::IntErrorKind;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::Mutex;

pub const CONFIGURE_COMMAND: &str = "configure";

pub const MENU_TEXT: &str = "Sure. Here are the possible Configurations:\n1) Tutor\n2) Personal Buddy\n3) Detailed Explanation Mode\n4) Normal Mode\nKindly send only the number of the corresponding setting to change to that setting.";
pub const INVALID_NUMBER_TEXT: &str = "Invalid number. Please choose a number from the list.";
pub const INVALID_INPUT_TEXT: &str =
    "Invalid input. Please send only the number corresponding to the setting you want.";

/// Personality modes, in the order they are listed in [`MENU_TEXT`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    Tutor,
    Buddy,
    Detailed,
    #[default]
    Normal,
}

impl Mode {
    pub const CATALOG: [Mode; 4] = [Mode::Tutor, Mode::Buddy, Mode::Detailed, Mode::Normal];

    /// Directive prepended to user questions. Normal mode has none.
    pub fn instruction(&self) -> &'static str {
        match self {
            Mode::Tutor => "Explain as if you were my tutor",
            Mode::Buddy => "Help me as if you were my best buddy",
            Mode::Detailed => "Explain with detailed explanations and with steps",
            Mode::Normal => "",
        }
    }

    /// Maps a 1-based menu number to a mode.
    pub fn from_selection(index: i64) -> Result<Mode, InvalidSelection> {
        usize::try_from(index)
            .ok()
            .and_then(|i| i.checked_sub(1))
            .and_then(|i| Self::CATALOG.get(i).copied())
            .ok_or(InvalidSelection(index))
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("mode selection {0} is not between 1 and 4")]
pub struct InvalidSelection(pub i64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConfigState {
    #[default]
    Normal,
    AwaitingModeSelection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UserState {
    pub config: ConfigState,
    pub mode: Mode,
}

impl UserState {
    pub fn awaiting_selection(&self) -> bool {
        self.config == ConfigState::AwaitingModeSelection
    }

    /// Same mode, now waiting for a menu selection.
    pub fn configuring(self) -> Self {
        Self {
            config: ConfigState::AwaitingModeSelection,
            ..self
        }
    }
}

/// What a message means to the configuration flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigureAction {
    /// Show the menu and wait for a selection.
    OpenMenu,
    /// A number to pass to [`ModeStore::set_mode`].
    Select(i64),
    /// Reply with guidance and keep waiting.
    Reject(&'static str),
}

/// Classifies one message against the configuration state machine.
///
/// `text` must already be trimmed and lowercased. Returns `None` when the
/// message is ordinary content that should go to the model.
///
/// Nothing but a successful selection leaves `AwaitingModeSelection`, so
/// after a rejected attempt the next message is read as another one.
pub fn configure_step(state: &UserState, text: &str) -> Option<ConfigureAction> {
    if state.awaiting_selection() {
        return Some(parse_selection(text));
    }
    (text == CONFIGURE_COMMAND).then_some(ConfigureAction::OpenMenu)
}

fn parse_selection(text: &str) -> ConfigureAction {
    match text.parse::<i64>() {
        Ok(index) => ConfigureAction::Select(index),
        Err(e) if matches!(e.kind(), IntErrorKind::PosOverflow | IntErrorKind::NegOverflow) => {
            ConfigureAction::Reject(INVALID_NUMBER_TEXT)
        }
        Err(_) => ConfigureAction::Reject(INVALID_INPUT_TEXT),
    }
}

pub fn confirmation_text(index: i64) -> String {
    format!("Setting changed. You are now in mode {index}.")
}

#[async_trait]
pub trait ModeStore: Send + Sync {
    /// Returns the user's state, storing the default on first access.
    async fn state(&self, user_id: &str) -> UserState;

    async fn save(&self, user_id: &str, state: UserState);

    /// Applies a 1-based menu selection and leaves configuration mode.
    async fn set_mode(&self, user_id: &str, index: i64) -> Result<Mode, InvalidSelection> {
        let mode = Mode::from_selection(index)?;
        let state = UserState {
            config: ConfigState::Normal,
            mode,
        };
        self.save(user_id, state).await;
        Ok(mode)
    }
}

#[derive(Default)]
pub struct InMemoryModeStore {
    states: Mutex<HashMap<String, UserState>>,
}

impl InMemoryModeStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub async fn contains(&self, user_id: &str) -> bool {
        self.states.lock().await.contains_key(user_id)
    }
}

#[async_trait]
impl ModeStore for InMemoryModeStore {
    async fn state(&self, user_id: &str) -> UserState {
        *self
            .states
            .lock()
            .await
            .entry(user_id.to_string())
            .or_default()
    }

    async fn save(&self, user_id: &str, state: UserState) {
        self.states.lock().await.insert(user_id.to_string(), state);
    }
}
