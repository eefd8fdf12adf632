//! Test doubles for orchestrator consumers
//!
//! Available with the `test-utils` feature.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use storyforge_backends::{
    BackendError, GenerationBackend, ImageRequest, ImageResult, NarrativeRequest, NarrativeResult,
};

use crate::clock::Clock;

/// Clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    #[must_use]
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Clock starting at 2026-01-01T00:00:00Z
    #[must_use]
    pub fn at_epoch() -> Self {
        Self::new(Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap())
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap();
        *now += chrono::Duration::from_std(by).unwrap();
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

/// A valid narrative whose title names `label`
#[must_use]
pub fn sample_narrative(label: &str) -> NarrativeResult {
    NarrativeResult::new(
        &format!("A Story From {label}"),
        "Something small and brave happens.",
        &["courage".to_string()],
        "Small acts matter.",
        &[
            "First paragraph.".to_string(),
            "Second paragraph.".to_string(),
            "Third paragraph.".to_string(),
        ],
    )
    .unwrap()
}

/// A minimal image request
#[must_use]
pub fn sample_image_request() -> ImageRequest {
    ImageRequest {
        title: "A Story From Tests".to_string(),
        logline: "Something small and brave happens.".to_string(),
        track_id: "test".to_string(),
        track_title: "Test Track".to_string(),
        themes: vec!["courage".to_string()],
        paragraphs: vec!["First paragraph.".to_string()],
    }
}

/// Outcome of one `generate_narrative` call
#[derive(Debug, Clone)]
pub enum NarrativeStep {
    Succeed,
    Fail(BackendError),
    /// Never completes
    Hang,
}

/// Outcome of one `generate_image` call
#[derive(Debug, Clone)]
pub enum ImageStep {
    Image(ImageResult),
    Unsupported,
    Fail(BackendError),
    Hang,
}

/// Behavior of every `is_healthy` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthBehavior {
    Healthy,
    Unhealthy,
    Hang,
    Panic,
}

/// Backend that plays back scripted outcomes and counts calls.
///
/// Queued steps are consumed first; after that the default step repeats.
#[derive(Debug)]
pub struct ScriptedBackend {
    name: String,
    narrative_queue: Mutex<VecDeque<NarrativeStep>>,
    narrative_default: NarrativeStep,
    image_queue: Mutex<VecDeque<ImageStep>>,
    image_default: ImageStep,
    health: HealthBehavior,
    supports_images: bool,
    narrative_calls: AtomicUsize,
    image_calls: AtomicUsize,
    health_calls: AtomicUsize,
}

impl ScriptedBackend {
    /// Backend that always succeeds: narratives, images, and health
    #[must_use]
    pub fn succeeding(name: &str) -> Self {
        Self {
            name: name.to_string(),
            narrative_queue: Mutex::new(VecDeque::new()),
            narrative_default: NarrativeStep::Succeed,
            image_queue: Mutex::new(VecDeque::new()),
            image_default: ImageStep::Image(ImageResult::from_url(format!(
                "https://images.test/{name}.png"
            ))),
            health: HealthBehavior::Healthy,
            supports_images: true,
            narrative_calls: AtomicUsize::new(0),
            image_calls: AtomicUsize::new(0),
            health_calls: AtomicUsize::new(0),
        }
    }

    /// Backend whose every call fails with a provider outage
    #[must_use]
    pub fn failing(name: &str) -> Self {
        let outage = BackendError::ProviderOutage(format!("{name} returned server error: 503"));
        Self {
            narrative_default: NarrativeStep::Fail(outage.clone()),
            image_default: ImageStep::Fail(outage),
            health: HealthBehavior::Unhealthy,
            ..Self::succeeding(name)
        }
    }

    /// Queue narrative outcomes ahead of the default
    #[must_use]
    pub fn with_narrative_steps(self, steps: impl IntoIterator<Item = NarrativeStep>) -> Self {
        self.narrative_queue.lock().unwrap().extend(steps);
        self
    }

    #[must_use]
    pub fn with_narrative_default(mut self, step: NarrativeStep) -> Self {
        self.narrative_default = step;
        self
    }

    /// Queue image outcomes ahead of the default
    #[must_use]
    pub fn with_image_steps(self, steps: impl IntoIterator<Item = ImageStep>) -> Self {
        self.image_queue.lock().unwrap().extend(steps);
        self
    }

    #[must_use]
    pub fn with_image_default(mut self, step: ImageStep) -> Self {
        self.supports_images = !matches!(step, ImageStep::Unsupported);
        self.image_default = step;
        self
    }

    #[must_use]
    pub fn with_health(mut self, health: HealthBehavior) -> Self {
        self.health = health;
        self
    }

    pub fn narrative_calls(&self) -> usize {
        self.narrative_calls.load(Ordering::SeqCst)
    }

    pub fn image_calls(&self) -> usize {
        self.image_calls.load(Ordering::SeqCst)
    }

    pub fn health_calls(&self) -> usize {
        self.health_calls.load(Ordering::SeqCst)
    }

    fn next_narrative(&self) -> NarrativeStep {
        self.narrative_queue
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.narrative_default.clone())
    }

    fn next_image(&self) -> ImageStep {
        self.image_queue
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.image_default.clone())
    }
}

#[async_trait]
impl GenerationBackend for ScriptedBackend {
    async fn generate_narrative(
        &self,
        _request: &NarrativeRequest,
    ) -> Result<NarrativeResult, BackendError> {
        self.narrative_calls.fetch_add(1, Ordering::SeqCst);
        match self.next_narrative() {
            NarrativeStep::Succeed => Ok(sample_narrative(&self.name)),
            NarrativeStep::Fail(err) => Err(err),
            NarrativeStep::Hang => std::future::pending().await,
        }
    }

    async fn generate_image(
        &self,
        _request: &ImageRequest,
    ) -> Result<Option<ImageResult>, BackendError> {
        self.image_calls.fetch_add(1, Ordering::SeqCst);
        match self.next_image() {
            ImageStep::Image(image) => Ok(Some(image)),
            ImageStep::Unsupported => Ok(None),
            ImageStep::Fail(err) => Err(err),
            ImageStep::Hang => std::future::pending().await,
        }
    }

    async fn is_healthy(&self) -> bool {
        self.health_calls.fetch_add(1, Ordering::SeqCst);
        match self.health {
            HealthBehavior::Healthy => true,
            HealthBehavior::Unhealthy => false,
            HealthBehavior::Hang => std::future::pending().await,
            HealthBehavior::Panic => panic!("{} health probe panicked", self.name),
        }
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn supports_images(&self) -> bool {
        self.supports_images
    }
}
