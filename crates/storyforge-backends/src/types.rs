//! Core types for the generation backend contract

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use storyforge_utils::error::BackendError;

use crate::normalize;

/// Input for narrative generation.
///
/// Answers are keyed by question id. Keys may be absent and answers may be
/// blank; neither is an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NarrativeRequest {
    pub track_id: String,
    pub track_title: String,
    #[serde(default)]
    pub answers: BTreeMap<String, String>,
}

impl NarrativeRequest {
    #[must_use]
    pub fn new(
        track_id: impl Into<String>,
        track_title: impl Into<String>,
        answers: BTreeMap<String, String>,
    ) -> Self {
        Self {
            track_id: track_id.into(),
            track_title: track_title.into(),
            answers,
        }
    }

    /// Answers with blank values removed, in key order
    pub fn non_blank_answers(&self) -> impl Iterator<Item = (&str, &str)> {
        self.answers
            .iter()
            .map(|(k, v)| (k.as_str(), v.trim()))
            .filter(|(_, v)| !v.is_empty())
    }
}

/// A validated narrative.
///
/// Only constructible through [`NarrativeResult::new`], which normalizes and
/// validates every field. Deserialization goes through the same path, so a
/// value of this type is never partially filled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawNarrative")]
pub struct NarrativeResult {
    title: String,
    logline: String,
    themes: Vec<String>,
    insight: String,
    paragraphs: [String; 3],
}

impl NarrativeResult {
    /// Normalize and validate raw narrative fields.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::MalformedOutput` naming the first field that is
    /// missing or invalid after normalization.
    pub fn new(
        title: &str,
        logline: &str,
        themes: &[String],
        insight: &str,
        paragraphs: &[String],
    ) -> Result<Self, BackendError> {
        Ok(Self {
            title: normalize::title(title)?,
            logline: normalize::logline(logline)?,
            themes: normalize::themes(themes)?,
            insight: normalize::insight(insight)?,
            paragraphs: normalize::paragraphs(paragraphs)?,
        })
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn logline(&self) -> &str {
        &self.logline
    }

    #[must_use]
    pub fn themes(&self) -> &[String] {
        &self.themes
    }

    #[must_use]
    pub fn insight(&self) -> &str {
        &self.insight
    }

    #[must_use]
    pub fn paragraphs(&self) -> &[String; 3] {
        &self.paragraphs
    }
}

/// Unvalidated narrative as returned by a model
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawNarrative {
    title: String,
    logline: String,
    #[serde(alias = "theme_tags", alias = "tags")]
    themes: Vec<String>,
    insight: String,
    paragraphs: Vec<String>,
}

impl TryFrom<RawNarrative> for NarrativeResult {
    type Error = BackendError;

    fn try_from(raw: RawNarrative) -> Result<Self, Self::Error> {
        Self::new(
            &raw.title,
            &raw.logline,
            &raw.themes,
            &raw.insight,
            &raw.paragraphs,
        )
    }
}

/// Input for image generation, usually derived from a rendered narrative
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRequest {
    pub title: String,
    pub logline: String,
    pub track_id: String,
    pub track_title: String,
    #[serde(default)]
    pub themes: Vec<String>,
    /// Up to three paragraphs; the second and third are optional
    #[serde(default)]
    pub paragraphs: Vec<String>,
}

impl From<(&NarrativeRequest, &NarrativeResult)> for ImageRequest {
    fn from((request, narrative): (&NarrativeRequest, &NarrativeResult)) -> Self {
        Self {
            title: narrative.title().to_string(),
            logline: narrative.logline().to_string(),
            track_id: request.track_id.clone(),
            track_title: request.track_title.clone(),
            themes: narrative.themes().to_vec(),
            paragraphs: narrative.paragraphs().to_vec(),
        }
    }
}

/// Reference to generated image data: a remote URI or a `data:` URI
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageResult(String);

impl ImageResult {
    /// Image hosted by the provider
    #[must_use]
    pub fn from_url(url: impl Into<String>) -> Self {
        Self(url.into())
    }

    /// Inline image payload, already base64-encoded
    #[must_use]
    pub fn from_base64(mime_type: &str, data: &str) -> Self {
        Self(format!("data:{mime_type};base64,{data}"))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True for `data:` URIs
    #[must_use]
    pub fn is_inline(&self) -> bool {
        self.0.starts_with("data:")
    }
}

/// Capability contract every generation backend implements.
///
/// The orchestrator treats implementations as interchangeable. Adapters own
/// request formatting and response parsing.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Produce a validated narrative.
    ///
    /// Fails on any transport, protocol, or validation problem; never returns
    /// a partially filled result.
    async fn generate_narrative(
        &self,
        request: &NarrativeRequest,
    ) -> Result<NarrativeResult, BackendError>;

    /// Produce an image.
    ///
    /// `Ok(None)` means this backend does not generate images. That is not a
    /// failure and must not be counted against the backend.
    async fn generate_image(
        &self,
        request: &ImageRequest,
    ) -> Result<Option<ImageResult>, BackendError>;

    /// Best-effort liveness probe. Failures resolve to `false`.
    async fn is_healthy(&self) -> bool;

    /// Stable identifier; used as the circuit breaker key and in diagnostics
    fn name(&self) -> &str;

    /// Whether `generate_image` can ever return an image. Advisory only.
    fn supports_images(&self) -> bool {
        true
    }
}
