//! Chat-completions request shape and form validation.

use serde::Serialize;

use crate::error::PanelError;
use crate::settings::ConnectionSettings;

/// Appended to every prompt to switch off "thinking" on models that have it.
pub const NO_THINK_SUFFIX: &str = " /no_think";

pub const MAX_TOKENS: u32 = 32000;
pub const TEMPERATURE: f32 = 0.6;
pub const TOP_P: f32 = 0.95;

pub const COMPLETIONS_PATH: &str = "/v1/chat/completions";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

/// Body of `POST /v1/chat/completions`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub stream: bool,
    pub max_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
}

impl ChatRequest {
    /// Single-message request with the fixed sampling parameters.
    pub fn new(model: &str, prompt: &str, stream: bool) -> Self {
        Self {
            model: model.to_string(),
            messages: vec![ChatMessage {
                role: Role::User,
                content: format!("{}{}", prompt, NO_THINK_SUFFIX),
            }],
            stream,
            max_tokens: MAX_TOKENS,
            temperature: TEMPERATURE,
            top_p: TOP_P,
        }
    }
}

/// A request that passed validation: trimmed fields and a resolved URL.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedRequest {
    pub url: String,
    pub model: String,
    pub prompt: String,
}

impl ValidatedRequest {
    /// Trim every field and reject the form if any of them is empty.
    pub fn from_form(settings: &ConnectionSettings, prompt: &str) -> Result<Self, PanelError> {
        let host = settings.host.trim();
        let port = settings.port.trim();
        let model = settings.model.trim();
        let prompt = prompt.trim();

        if host.is_empty() || port.is_empty() || model.is_empty() || prompt.is_empty() {
            return Err(PanelError::MissingFields);
        }

        Ok(Self {
            url: endpoint_url(settings.scheme(), host, port),
            model: model.to_string(),
            prompt: prompt.to_string(),
        })
    }

    pub fn chat_request(&self, stream: bool) -> ChatRequest {
        ChatRequest::new(&self.model, &self.prompt, stream)
    }
}

pub fn endpoint_url(scheme: &str, host: &str, port: &str) -> String {
    format!("{}://{}:{}{}", scheme, host, port, COMPLETIONS_PATH)
}
