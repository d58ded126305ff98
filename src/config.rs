use std::env;
use std::time::Duration;

use eyre::{Result, eyre};

pub const DEFAULT_PERSONALITY: &str = "You are a friendly and helpful assistant responding to a user on a messaging app. Be conversational and concise.";
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Credentials for downloading media that Twilio serves behind basic auth.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaAuth {
    pub account_sid: String,
    pub auth_token: String,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub api_key: String,
    pub personality: String,
    pub model: String,
    pub api_base: String,
    pub timeout: Duration,
    pub media_auth: Option<MediaAuth>,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds settings from any key lookup, so tests can avoid touching the
    /// process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let api_key = var("GOOGLE_API_KEY")
            .or_else(|| var("GEMINI_API_KEY"))
            .ok_or_else(|| eyre!("GOOGLE_API_KEY environment variable not set"))?;

        let timeout_secs = match var("GEMINI_TIMEOUT_SECS") {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .map_err(|e| {
                    eyre!("GEMINI_TIMEOUT_SECS must be a whole number of seconds: {}", e)
                })?,
            None => DEFAULT_TIMEOUT_SECS,
        };

        let media_auth = match (var("TWILIO_ACCOUNT_SID"), var("TWILIO_AUTH_TOKEN")) {
            (Some(account_sid), Some(auth_token)) => Some(MediaAuth {
                account_sid,
                auth_token,
            }),
            _ => None,
        };

        Ok(Self {
            api_key,
            personality: var("CHATBOT_PERSONALITY")
                .unwrap_or_else(|| DEFAULT_PERSONALITY.to_string()),
            model: var("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            api_base: var("GEMINI_API_BASE")
                .map(|base| base.trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            timeout: Duration::from_secs(timeout_secs),
            media_auth,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn settings(pairs: &[(&str, &str)]) -> Result<Settings> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn missing_key_is_fatal() {
        let err = settings(&[]).unwrap_err();
        assert!(err.to_string().contains("GOOGLE_API_KEY"));
    }

    #[test]
    fn defaults_apply() {
        let s = settings(&[("GOOGLE_API_KEY", "k")]).unwrap();
        assert_eq!(s.api_key, "k");
        assert_eq!(s.personality, DEFAULT_PERSONALITY);
        assert_eq!(s.model, DEFAULT_MODEL);
        assert_eq!(s.api_base, DEFAULT_API_BASE);
        assert_eq!(s.timeout, Duration::from_secs(DEFAULT_TIMEOUT_SECS));
        assert_eq!(s.media_auth, None);
    }

    #[test]
    fn gemini_key_alias_and_overrides() {
        let s = settings(&[
            ("GEMINI_API_KEY", "alias"),
            ("CHATBOT_PERSONALITY", "You are a pirate."),
            ("GEMINI_API_BASE", "http://127.0.0.1:9000/models/"),
            ("GEMINI_TIMEOUT_SECS", "5"),
            ("TWILIO_ACCOUNT_SID", "AC1"),
            ("TWILIO_AUTH_TOKEN", "secret"),
        ])
        .unwrap();
        assert_eq!(s.api_key, "alias");
        assert_eq!(s.personality, "You are a pirate.");
        assert_eq!(s.api_base, "http://127.0.0.1:9000/models");
        assert_eq!(s.timeout, Duration::from_secs(5));
        assert_eq!(s.media_auth.unwrap().account_sid, "AC1");
    }

    #[test]
    fn bad_timeout_is_rejected() {
        let err =
            settings(&[("GOOGLE_API_KEY", "k"), ("GEMINI_TIMEOUT_SECS", "soon")]).unwrap_err();
        assert!(err.to_string().contains("GEMINI_TIMEOUT_SECS"));
    }
}
