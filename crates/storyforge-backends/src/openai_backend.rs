//! OpenAI HTTP backend
//!
//! Narratives go through Chat Completions in JSON mode; images through the
//! Images API with `b64_json` responses.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use storyforge_config::{BackendKind, Config};
use storyforge_utils::error::BackendError;

use crate::http_client::{HttpClient, read_json};
use crate::openai_compat::{ChatRequest, ChatResponse};
use crate::parse::parse_narrative;
use crate::prompt::{image_prompt, narrative_prompt};
use crate::settings::{self, AdapterDefaults, ResolvedSettings};
use crate::types::{GenerationBackend, ImageRequest, ImageResult, NarrativeRequest, NarrativeResult};

const NAME: &str = "openai";

const DEFAULTS: AdapterDefaults = AdapterDefaults {
    base_url: "https://api.openai.com/v1",
    model: "gpt-4o-mini",
    image_model: Some("dall-e-3"),
    image_size: Some("1024x1024"),
};

#[derive(Clone)]
pub(crate) struct OpenAiBackend {
    client: Arc<HttpClient>,
    settings: ResolvedSettings,
}

impl OpenAiBackend {
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
        Self::new(settings::resolve(BackendKind::OpenAi, config, &DEFAULTS)?)
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.settings.base_url)
    }

    fn image_body(&self, request: &ImageRequest) -> ImagesRequest {
        ImagesRequest {
            model: self
                .settings
                .image_model
                .clone()
                .unwrap_or_else(|| DEFAULTS.image_model.unwrap_or_default().to_string()),
            prompt: image_prompt(request),
            n: 1,
            size: self.settings.image_size.clone(),
            response_format: "b64_json",
        }
    }
}

#[async_trait]
impl GenerationBackend for OpenAiBackend {
    async fn generate_narrative(
        &self,
        request: &NarrativeRequest,
    ) -> Result<NarrativeResult, BackendError> {
        let prompt = narrative_prompt(request);
        let body = ChatRequest::json_narrative(&self.settings.model, &prompt, self.settings.params);

        debug!(
            backend = NAME,
            model = %self.settings.model,
            track_id = %request.track_id,
            "Requesting narrative"
        );

        let builder = self
            .client
            .post(&self.url("chat/completions"))
            .bearer_auth(&self.settings.api_key)
            .json(&body);

        let response = self
            .client
            .execute_with_retry(builder, self.settings.request_timeout, NAME)
            .await?;
        let chat: ChatResponse = read_json(response, NAME).await?;
        parse_narrative(&chat.into_text(NAME)?, NAME)
    }

    async fn generate_image(
        &self,
        request: &ImageRequest,
    ) -> Result<Option<ImageResult>, BackendError> {
        let body = self.image_body(request);

        debug!(backend = NAME, model = %body.model, "Requesting image");

        let builder = self
            .client
            .post(&self.url("images/generations"))
            .bearer_auth(&self.settings.api_key)
            .json(&body);

        let response = self
            .client
            .execute_with_retry(builder, self.settings.request_timeout, NAME)
            .await?;
        let images: ImagesResponse = read_json(response, NAME).await?;
        images.into_result().map(Some)
    }

    async fn is_healthy(&self) -> bool {
        let builder = self
            .client
            .get(&self.url("models"))
            .bearer_auth(&self.settings.api_key);
        self.client
            .probe(builder, self.settings.request_timeout)
            .await
    }

    fn name(&self) -> &str {
        NAME
    }
}

#[derive(Debug, Clone, Serialize)]
struct ImagesRequest {
    model: String,
    prompt: String,
    n: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    size: Option<String>,
    response_format: &'static str,
}

#[derive(Debug, Clone, Deserialize)]
struct ImagesResponse {
    #[serde(default)]
    data: Vec<ImageData>,
}

#[derive(Debug, Clone, Deserialize)]
struct ImageData {
    b64_json: Option<String>,
    url: Option<String>,
}

impl ImagesResponse {
    fn into_result(self) -> Result<ImageResult, BackendError> {
        let first = self.data.into_iter().next().ok_or_else(|| {
            BackendError::MalformedOutput(format!("{NAME} image response missing data[0]"))
        })?;
        match (first.b64_json, first.url) {
            (Some(b64), _) if !b64.is_empty() => Ok(ImageResult::from_base64("image/png", &b64)),
            (_, Some(url)) if !url.is_empty() => Ok(ImageResult::from_url(url)),
            _ => Err(BackendError::MalformedOutput(format!(
                "{NAME} image response has neither b64_json nor url"
            ))),
        }
    }
}
