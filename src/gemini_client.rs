use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use eyre::Result;
use serde_json::{Value, json};
use thiserror::Error;
use tracing::{debug, error};
use url::Url;

use crate::bot::conversation_state::{Part, Turn};
use crate::config::{MediaAuth, Settings};

/// Gemini rejects inline payloads above this size.
pub const MAX_MEDIA_BYTES: usize = 20 * 1024 * 1024;

const API_KEY_HEADER: &str = "x-goog-api-key";

#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("request to the model timed out")]
    Timeout,
    #[error("HTTP error: {0}")]
    Http(#[source] reqwest::Error),
    #[error("model API returned {status}: {body}")]
    Api { status: u16, body: String },
    #[error("prompt was blocked: {0}")]
    Blocked(String),
    #[error("could not fetch media: {0}")]
    Media(String),
    #[error("could not decode model response: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Request URLs are stripped so credentials never reach the logs.
impl From<reqwest::Error> for CompletionError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            CompletionError::Timeout
        } else {
            CompletionError::Http(e.without_url())
        }
    }
}

/// A hosted model that continues a conversation.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Produces the model's reply to `input`, given the earlier `history`.
    async fn generate(
        &self,
        system_prompt: &str,
        history: &[Turn],
        input: &Turn,
    ) -> Result<String, CompletionError>;
}

pub struct GeminiClient {
    api_key: String,
    model: String,
    api_base: String,
    media_auth: Option<MediaAuth>,
    client: reqwest::Client,
}

impl GeminiClient {
    pub fn new(settings: &Settings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()?;

        Ok(Self {
            api_key: settings.api_key.clone(),
            model: settings.model.clone(),
            api_base: settings.api_base.clone(),
            media_auth: settings.media_auth.clone(),
            client,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/{}:generateContent", self.api_base, self.model)
    }

    /// Downloads an image and returns it as an `inline_data` part.
    async fn fetch_image(&self, url: &str, mime_type: &str) -> Result<Value, CompletionError> {
        let parsed = Url::parse(url).map_err(|e| CompletionError::Media(format!("{url}: {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(CompletionError::Media(format!(
                "unsupported URL scheme {}",
                parsed.scheme()
            )));
        }

        let mut request = self.client.get(parsed);
        if let Some(auth) = &self.media_auth {
            request = request.basic_auth(&auth.account_sid, Some(&auth.auth_token));
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(CompletionError::Media(format!(
                "media host returned {}",
                response.status()
            )));
        }
        if response
            .content_length()
            .is_some_and(|len| len > MAX_MEDIA_BYTES as u64)
        {
            return Err(CompletionError::Media("media exceeds size limit".to_string()));
        }

        let bytes = response.bytes().await?;
        if bytes.len() > MAX_MEDIA_BYTES {
            return Err(CompletionError::Media("media exceeds size limit".to_string()));
        }
        debug!(url, bytes = bytes.len(), "Fetched media");

        Ok(json!({
            "inline_data": {
                "mime_type": mime_type,
                "data": BASE64.encode(&bytes),
            }
        }))
    }

    async fn current_turn_parts(&self, turn: &Turn) -> Result<Vec<Value>, CompletionError> {
        let mut parts = Vec::with_capacity(turn.parts.len());
        for part in &turn.parts {
            match part {
                Part::Text(text) => parts.push(json!({ "text": text })),
                Part::Image { url, mime_type } => {
                    parts.push(self.fetch_image(url, mime_type).await?)
                }
            }
        }
        Ok(parts)
    }
}

#[async_trait]
impl ChatModel for GeminiClient {
    async fn generate(
        &self,
        system_prompt: &str,
        history: &[Turn],
        input: &Turn,
    ) -> Result<String, CompletionError> {
        let input_parts = self.current_turn_parts(input).await?;
        let request_body =
            build_request_body(system_prompt, history, input.role.as_str(), input_parts);

        debug!(model = %self.model, turns = history.len() + 1, "Sending request to Gemini API");

        let response = self
            .client
            .post(self.endpoint())
            .header(API_KEY_HEADER, &self.api_key)
            .json(&request_body)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            error!(status = status.as_u16(), "Gemini API request failed: {}", body);
            return Err(CompletionError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let response_json: Value = serde_json::from_str(&body)?;
        debug!("Received response from Gemini API: {}", response_json);

        extract_text(&response_json)
    }
}

/// Earlier turns are sent as text only; images become a placeholder.
fn history_parts(turn: &Turn) -> Vec<Value> {
    turn.parts
        .iter()
        .map(|part| match part {
            Part::Text(text) => json!({ "text": text }),
            Part::Image { url, .. } => json!({ "text": format!("[image: {url}]") }),
        })
        .collect()
}

fn build_request_body(
    system_prompt: &str,
    history: &[Turn],
    input_role: &str,
    input_parts: Vec<Value>,
) -> Value {
    let mut contents: Vec<Value> = history
        .iter()
        .map(|turn| {
            json!({
                "role": turn.role.as_str(),
                "parts": history_parts(turn),
            })
        })
        .collect();

    contents.push(json!({
        "role": input_role,
        "parts": input_parts,
    }));

    json!({
        "systemInstruction": {
            "parts": [{ "text": system_prompt }]
        },
        "contents": contents,
        "generationConfig": {
            "temperature": 0.7,
            "topP": 0.95,
            "maxOutputTokens": 8192
        }
    })
}

/// Concatenates the text parts of the first candidate.
fn extract_text(response: &Value) -> Result<String, CompletionError> {
    let first_candidate = response
        .get("candidates")
        .and_then(Value::as_array)
        .and_then(|candidates| candidates.first());

    let Some(candidate) = first_candidate else {
        if let Some(reason) = response
            .pointer("/promptFeedback/blockReason")
            .and_then(Value::as_str)
        {
            return Err(CompletionError::Blocked(reason.to_string()));
        }
        return Ok(String::new());
    };

    let text = candidate
        .pointer("/content/parts")
        .and_then(Value::as_array)
        .map(|parts| {
            parts
                .iter()
                .filter_map(|part| part.get("text").and_then(Value::as_str))
                .collect::<String>()
        })
        .unwrap_or_default();

    Ok(text)
}
