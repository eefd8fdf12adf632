//! Wire types for OpenAI-compatible chat completion APIs (OpenAI, OpenRouter)

use serde::{Deserialize, Serialize};

use storyforge_utils::error::BackendError;

use crate::prompt::Prompt;
use crate::settings::HttpParams;

#[derive(Debug, Clone, Serialize)]
pub(crate) struct ChatMessage {
    pub role: &'static str,
    pub content: String,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct ResponseFormat {
    #[serde(rename = "type")]
    pub format_type: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
    pub temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_format: Option<ResponseFormat>,
}

impl ChatRequest {
    /// Chat request asking for a JSON object answer
    pub fn json_narrative(model: &str, prompt: &Prompt, params: HttpParams) -> Self {
        Self {
            model: model.to_string(),
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: prompt.system.clone(),
                },
                ChatMessage {
                    role: "user",
                    content: prompt.user.clone(),
                },
            ],
            max_tokens: params.max_tokens,
            temperature: params.temperature,
            response_format: Some(ResponseFormat {
                format_type: "json_object",
            }),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ChatResponse {
    #[serde(default)]
    pub choices: Vec<Choice>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct Choice {
    pub message: ResponseMessage,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ResponseMessage {
    pub content: Option<String>,
}

impl ChatResponse {
    /// Text of `choices[0].message.content`
    pub fn into_text(self, provider_name: &str) -> Result<String, BackendError> {
        let choice = self.choices.into_iter().next().ok_or_else(|| {
            BackendError::MalformedOutput(format!("{provider_name} response missing choices[0]"))
        })?;
        choice
            .message
            .content
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| {
                BackendError::MalformedOutput(format!(
                    "{provider_name} response missing content in choices[0]"
                ))
            })
    }
}
