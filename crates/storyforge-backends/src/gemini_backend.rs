//! Google Gemini HTTP backend
//!
//! Both capabilities use `models/{model}:generateContent`. Images come back as
//! `inlineData` parts when the image model is asked for the IMAGE modality.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use storyforge_config::{BackendKind, Config};
use storyforge_utils::error::BackendError;

use crate::http_client::{HttpClient, read_json};
use crate::parse::parse_narrative;
use crate::prompt::{image_prompt, narrative_prompt};
use crate::settings::{self, AdapterDefaults, ResolvedSettings};
use crate::types::{GenerationBackend, ImageRequest, ImageResult, NarrativeRequest, NarrativeResult};

const NAME: &str = "gemini";

const API_KEY_HEADER: &str = "x-goog-api-key";

const DEFAULTS: AdapterDefaults = AdapterDefaults {
    base_url: "https://generativelanguage.googleapis.com/v1beta",
    model: "gemini-2.0-flash",
    image_model: Some("gemini-2.0-flash-preview-image-generation"),
    image_size: None,
};

#[derive(Clone)]
pub(crate) struct GeminiBackend {
    client: Arc<HttpClient>,
    settings: ResolvedSettings,
}

impl GeminiBackend {
    pub fn new(settings: ResolvedSettings) -> Result<Self, BackendError> {
        Ok(Self {
            client: Arc::new(HttpClient::new()?),
            settings,
        })
    }

    pub fn new_from_config(config: &Config) -> Result<Self, BackendError> {
        Self::new(settings::resolve(BackendKind::Gemini, config, &DEFAULTS)?)
    }

    fn generate_url(&self, model: &str) -> String {
        format!("{}/models/{model}:generateContent", self.settings.base_url)
    }

    fn narrative_body(&self, request: &NarrativeRequest) -> GenerateContentRequest {
        let prompt = narrative_prompt(request);
        GenerateContentRequest {
            contents: vec![Content::user_text(prompt.user)],
            system_instruction: Some(Content {
                role: None,
                parts: vec![Part::text(prompt.system)],
            }),
            generation_config: GenerationConfig {
                temperature: Some(self.settings.params.temperature),
                max_output_tokens: Some(self.settings.params.max_tokens),
                response_mime_type: Some("application/json"),
                response_modalities: None,
            },
        }
    }

    fn image_body(request: &ImageRequest) -> GenerateContentRequest {
        GenerateContentRequest {
            contents: vec![Content::user_text(image_prompt(request))],
            system_instruction: None,
            generation_config: GenerationConfig {
                temperature: None,
                max_output_tokens: None,
                response_mime_type: None,
                response_modalities: Some(vec!["TEXT", "IMAGE"]),
            },
        }
    }

    async fn call(
        &self,
        model: &str,
        body: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse, BackendError> {
        let builder = self
            .client
            .post(&self.generate_url(model))
            .header(API_KEY_HEADER, &self.settings.api_key)
            .json(body);

        let response = self
            .client
            .execute_with_retry(builder, self.settings.request_timeout, NAME)
            .await?;
        read_json(response, NAME).await
    }
}

#[async_trait]
impl GenerationBackend for GeminiBackend {
    async fn generate_narrative(
        &self,
        request: &NarrativeRequest,
    ) -> Result<NarrativeResult, BackendError> {
        debug!(
            backend = NAME,
            model = %self.settings.model,
            track_id = %request.track_id,
            "Requesting narrative"
        );

        let body = self.narrative_body(request);
        let response = self.call(&self.settings.model, &body).await?;
        parse_narrative(&response.text()?, NAME)
    }

    async fn generate_image(
        &self,
        request: &ImageRequest,
    ) -> Result<Option<ImageResult>, BackendError> {
        let Some(model) = self.settings.image_model.as_deref() else {
            return Ok(None);
        };

        debug!(backend = NAME, model = %model, "Requesting image");

        let response = self.call(model, &Self::image_body(request)).await?;
        response.inline_image().map(Some)
    }

    async fn is_healthy(&self) -> bool {
        let url = format!("{}/models", self.settings.base_url);
        let builder = self
            .client
            .get(&url)
            .header(API_KEY_HEADER, &self.settings.api_key);
        self.client
            .probe(builder, self.settings.request_timeout)
            .await
    }

    fn name(&self) -> &str {
        NAME
    }

    fn supports_images(&self) -> bool {
        self.settings.image_model.is_some()
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

impl Content {
    fn user_text(text: String) -> Self {
        Self {
            role: Some("user".to_string()),
            parts: vec![Part::text(text)],
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,
}

impl Part {
    fn text(text: String) -> Self {
        Self {
            text: Some(text),
            inline_data: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_modalities: Option<Vec<&'static str>>,
}

#[derive(Debug, Clone, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Clone, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

impl GenerateContentResponse {
    fn parts(&self) -> impl Iterator<Item = &Part> {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .into_iter()
            .flat_map(|content| content.parts.iter())
    }

    fn text(&self) -> Result<String, BackendError> {
        let text: String = self.parts().filter_map(|p| p.text.as_deref()).collect();
        if text.trim().is_empty() {
            return Err(BackendError::MalformedOutput(
                "gemini response missing text parts".to_string(),
            ));
        }
        Ok(text)
    }

    fn inline_image(&self) -> Result<ImageResult, BackendError> {
        self.parts()
            .filter_map(|p| p.inline_data.as_ref())
            .find(|d| d.mime_type.starts_with("image/") && !d.data.is_empty())
            .map(|d| ImageResult::from_base64(&d.mime_type, &d.data))
            .ok_or_else(|| {
                BackendError::MalformedOutput("gemini response missing inline image data".to_string())
            })
    }
}
