//! Anthropic HTTP backend
//!
//! Narrative generation through the Messages API. Anthropic models do not
//! produce images, so `generate_image` always answers `Ok(None)`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use storyforge_config::{BackendKind, Config};
use storyforge_utils::error::BackendError;

use crate::http_client::{HttpClient, read_json};
use crate::parse::parse_narrative;
use crate::prompt::{Prompt, narrative_prompt};
use crate::settings::{self, AdapterDefaults, ResolvedSettings};
use crate::types::{GenerationBackend, ImageRequest, ImageResult, NarrativeRequest, NarrativeResult};

const NAME: &str = "anthropic";

/// Anthropic API version header value
const ANTHROPIC_VERSION: &str = "2023-06-01";

const DEFAULTS: AdapterDefaults = AdapterDefaults {
    base_url: "https://api.anthropic.com/v1",
    model: "claude-3-5-haiku-latest",
    image_model: None,
    image_size: None,
};

#[derive(Clone)]
pub(crate) struct AnthropicBackend {
    client: Arc<HttpClient>,
    settings: ResolvedSettings,
}

impl AnthropicBackend {
    pub fn new(settings: ResolvedSettings) -> Result<Self, BackendError> {
        Ok(Self {
            client: Arc::new(HttpClient::new()?),
            settings,
        })
    }

    /// # Errors
    ///
    /// `Misconfiguration` if the API key variable is unset.
    pub fn new_from_config(config: &Config) -> Result<Self, BackendError> {
        Self::new(settings::resolve(BackendKind::Anthropic, config, &DEFAULTS)?)
    }

    fn request_body(&self, prompt: Prompt) -> AnthropicRequest {
        AnthropicRequest {
            model: self.settings.model.clone(),
            messages: vec![AnthropicMessage {
                role: "user",
                content: prompt.user,
            }],
            max_tokens: self.settings.params.max_tokens,
            temperature: self.settings.params.temperature,
            system: Some(prompt.system),
        }
    }

    fn with_headers(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder
            .header("x-api-key", &self.settings.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
    }
}

#[async_trait]
impl GenerationBackend for AnthropicBackend {
    async fn generate_narrative(
        &self,
        request: &NarrativeRequest,
    ) -> Result<NarrativeResult, BackendError> {
        let body = self.request_body(narrative_prompt(request));

        debug!(
            backend = NAME,
            model = %body.model,
            max_tokens = body.max_tokens,
            track_id = %request.track_id,
            "Requesting narrative"
        );

        let url = format!("{}/messages", self.settings.base_url);
        let builder = self.with_headers(self.client.post(&url)).json(&body);

        let response = self
            .client
            .execute_with_retry(builder, self.settings.request_timeout, NAME)
            .await?;
        let response_body: AnthropicResponse = read_json(response, NAME).await?;
        parse_narrative(&response_body.text()?, NAME)
    }

    async fn generate_image(
        &self,
        _request: &ImageRequest,
    ) -> Result<Option<ImageResult>, BackendError> {
        Ok(None)
    }

    async fn is_healthy(&self) -> bool {
        let url = format!("{}/models", self.settings.base_url);
        let builder = self.with_headers(self.client.get(&url));
        self.client
            .probe(builder, self.settings.request_timeout)
            .await
    }

    fn name(&self) -> &str {
        NAME
    }

    fn supports_images(&self) -> bool {
        false
    }
}

#[derive(Debug, Clone, Serialize)]
struct AnthropicMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Clone, Serialize)]
struct AnthropicRequest {
    model: String,
    messages: Vec<AnthropicMessage>,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct AnthropicResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Clone, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    content_type: String,
    text: Option<String>,
}

impl AnthropicResponse {
    /// Concatenated text blocks
    fn text(&self) -> Result<String, BackendError> {
        let content: String = self
            .content
            .iter()
            .filter(|block| block.content_type == "text")
            .filter_map(|block| block.text.as_deref())
            .collect();

        if content.trim().is_empty() {
            return Err(BackendError::MalformedOutput(
                "anthropic response missing text content".to_string(),
            ));
        }
        Ok(content)
    }
}
