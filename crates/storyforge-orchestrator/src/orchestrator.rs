//! Ordered fallback across generation backends
//!
//! The orchestrator owns one [`CircuitBreaker`] per backend. Each call walks
//! the backends in configured priority order, skipping open circuits, and
//! returns the first success. Per-attempt failures are absorbed, logged, and
//! recorded against the failing backend's breaker.

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::task::JoinSet;
use tracing::{Instrument, debug, info, warn};

use storyforge_backends::{
    BackendKind, GenerationBackend, ImageRequest, ImageResult, NarrativeRequest, NarrativeResult,
    construct_backend,
};
use storyforge_config::{Config, DEFAULT_ATTEMPT_TIMEOUT_SECS, DEFAULT_HEALTH_TIMEOUT_SECS};
use storyforge_utils::error::{BackendError, BackendFailure, GenerationError};
use storyforge_utils::logging::{generation_span, log_attempt_failure, log_attempt_skipped};
use storyforge_utils::redaction::redact_error_message;
use storyforge_utils::types::Operation;

use crate::breaker::{BreakerPolicy, BreakerSnapshot, CircuitBreaker};
use crate::clock::{Clock, SystemClock};

/// One registered backend and its breaker
struct BackendSlot {
    backend: Arc<dyn GenerationBackend>,
    breaker: Mutex<CircuitBreaker>,
}

impl BackendSlot {
    fn new(backend: Arc<dyn GenerationBackend>, policy: BreakerPolicy) -> Self {
        Self {
            backend,
            breaker: Mutex::new(CircuitBreaker::new(policy)),
        }
    }

    fn name(&self) -> &str {
        self.backend.name()
    }

    // Breaker updates never panic mid-way; poisoning is ignored.
    fn breaker(&self) -> MutexGuard<'_, CircuitBreaker> {
        self.breaker.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Fallback orchestrator over an ordered set of generation backends.
///
/// `Send + Sync`; share it behind an `Arc` across concurrent callers.
pub struct Orchestrator {
    slots: Vec<BackendSlot>,
    clock: Arc<dyn Clock>,
    attempt_timeout: Duration,
    health_timeout: Duration,
}

impl fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Orchestrator")
            .field("backends", &self.backend_names())
            .field("attempt_timeout", &self.attempt_timeout)
            .field("health_timeout", &self.health_timeout)
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    /// Build an orchestrator from configuration using the real adapters.
    ///
    /// Backends whose adapter cannot be constructed (typically a missing API
    /// key) are logged and left out. An orchestrator with no backends is
    /// valid; every narrative call on it reports exhaustion.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::from_config_with_factory(config, construct_backend)
    }

    /// Same as [`Orchestrator::from_config`] with a custom adapter factory.
    pub fn from_config_with_factory<F>(config: &Config, factory: F) -> Self
    where
        F: Fn(BackendKind, &Config) -> Result<Arc<dyn GenerationBackend>, BackendError>,
    {
        let mut builder = Self::builder()
            .policy(config.breaker.into())
            .attempt_timeout(config.generation.attempt_timeout)
            .health_timeout(config.generation.health_timeout);

        for &kind in &config.generation.backend_order {
            match factory(kind, config) {
                Ok(backend) => {
                    debug!(backend = %kind, "Backend constructed");
                    builder = builder.backend(backend);
                }
                Err(err) => {
                    warn!(
                        backend = %kind,
                        error_kind = err.kind(),
                        error = %redact_error_message(&err.to_string()),
                        "Excluding backend that could not be constructed"
                    );
                }
            }
        }

        let orchestrator = builder.build();
        if orchestrator.slots.is_empty() {
            warn!("No generation backends are available; every request will use fallback content");
        } else {
            info!(
                backends = %orchestrator.backend_names().join(","),
                "Generation orchestrator ready"
            );
        }
        orchestrator
    }

    #[must_use]
    pub fn builder() -> OrchestratorBuilder {
        OrchestratorBuilder::new()
    }

    /// Generate a narrative from the first backend that succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`GenerationError::AllBackendsExhausted`] when every backend
    /// was either skipped with an open circuit or failed during this call.
    pub async fn generate_narrative(
        &self,
        request: &NarrativeRequest,
    ) -> Result<NarrativeResult, GenerationError> {
        let operation = Operation::Narrative;
        let span = generation_span(operation, self.slots.len());

        async move {
            let mut failures = Vec::new();
            let mut skipped = Vec::new();

            for slot in &self.slots {
                if self.skip_if_open(slot, operation) {
                    skipped.push(slot.name().to_string());
                    continue;
                }

                match self.bounded(slot.backend.generate_narrative(request)).await {
                    Ok(narrative) => {
                        slot.breaker().record_success();
                        info!(backend = %slot.name(), "Narrative generated");
                        return Ok(narrative);
                    }
                    Err(err) => failures.push(self.absorb_failure(slot, operation, &err)),
                }
            }

            warn!(
                failed = failures.len(),
                skipped = skipped.len(),
                "All backends exhausted"
            );
            Err(GenerationError::AllBackendsExhausted {
                operation,
                failures,
                skipped,
            })
        }
        .instrument(span)
        .await
    }

    /// Generate an image from the first backend that produces one.
    ///
    /// A backend answering "unsupported" is passed over without touching its
    /// breaker. Returns `None` when no backend produced an image.
    pub async fn generate_image(&self, request: &ImageRequest) -> Option<ImageResult> {
        let operation = Operation::Image;
        let span = generation_span(operation, self.slots.len());

        async move {
            for slot in &self.slots {
                if self.skip_if_open(slot, operation) {
                    continue;
                }

                match self.bounded(slot.backend.generate_image(request)).await {
                    Ok(Some(image)) => {
                        slot.breaker().record_success();
                        info!(
                            backend = %slot.name(),
                            inline = image.is_inline(),
                            "Image generated"
                        );
                        return Some(image);
                    }
                    Ok(None) => {
                        debug!(backend = %slot.name(), "Backend does not support images");
                    }
                    Err(err) => {
                        self.absorb_failure(slot, operation, &err);
                    }
                }
            }

            info!("No backend produced an image");
            None
        }
        .instrument(span)
        .await
    }

    /// Probe every backend concurrently.
    ///
    /// Each probe is bounded by the health timeout; a probe that times out or
    /// panics reports `false`. Breaker state is neither read nor changed.
    pub async fn health_check(&self) -> BTreeMap<String, bool> {
        let span = generation_span(Operation::Health, self.slots.len());

        async move {
            let mut results: BTreeMap<String, bool> = self
                .slots
                .iter()
                .map(|slot| (slot.name().to_string(), false))
                .collect();

            let mut probes = JoinSet::new();
            for slot in &self.slots {
                let backend = Arc::clone(&slot.backend);
                let timeout = self.health_timeout;
                probes.spawn(async move {
                    let healthy = tokio::time::timeout(timeout, backend.is_healthy())
                        .await
                        .unwrap_or(false);
                    (backend.name().to_string(), healthy)
                });
            }

            while let Some(joined) = probes.join_next().await {
                match joined {
                    Ok((name, healthy)) => {
                        results.insert(name, healthy);
                    }
                    Err(err) => {
                        warn!(error = %err, "Health probe did not complete");
                    }
                }
            }

            debug!(?results, "Health check complete");
            results
        }
        .instrument(span)
        .await
    }

    /// Backend names in fallback order
    #[must_use]
    pub fn backend_names(&self) -> Vec<&str> {
        self.slots.iter().map(BackendSlot::name).collect()
    }

    /// Current breaker state for every backend, in fallback order
    #[must_use]
    pub fn breaker_snapshots(&self) -> Vec<BreakerSnapshot> {
        self.slots
            .iter()
            .map(|slot| slot.breaker().snapshot(slot.name()))
            .collect()
    }

    /// Breaker state for one backend, if registered
    #[must_use]
    pub fn breaker_snapshot(&self, backend: &str) -> Option<BreakerSnapshot> {
        self.slots
            .iter()
            .find(|slot| slot.name() == backend)
            .map(|slot| slot.breaker().snapshot(backend))
    }

    /// Whether a backend advertises image support, keyed by name
    #[must_use]
    pub fn image_support(&self) -> BTreeMap<String, bool> {
        self.slots
            .iter()
            .map(|slot| (slot.name().to_string(), slot.backend.supports_images()))
            .collect()
    }

    #[must_use]
    pub fn attempt_timeout(&self) -> Duration {
        self.attempt_timeout
    }

    #[must_use]
    pub fn health_timeout(&self) -> Duration {
        self.health_timeout
    }

    fn skip_if_open(&self, slot: &BackendSlot, operation: Operation) -> bool {
        let open = slot.breaker().is_open(self.clock.now());
        if open {
            log_attempt_skipped(slot.name(), operation);
        }
        open
    }

    async fn bounded<T>(
        &self,
        attempt: impl Future<Output = Result<T, BackendError>>,
    ) -> Result<T, BackendError> {
        tokio::time::timeout(self.attempt_timeout, attempt)
            .await
            .unwrap_or(Err(BackendError::Timeout {
                duration: self.attempt_timeout,
            }))
    }

    fn absorb_failure(
        &self,
        slot: &BackendSlot,
        operation: Operation,
        err: &BackendError,
    ) -> BackendFailure {
        slot.breaker().record_failure(self.clock.now());
        log_attempt_failure(slot.name(), operation, err);
        BackendFailure {
            backend: slot.name().to_string(),
            kind: err.kind().to_string(),
            message: redact_error_message(&err.to_string()),
        }
    }
}

/// Programmatic construction for embedding and tests
pub struct OrchestratorBuilder {
    backends: Vec<Arc<dyn GenerationBackend>>,
    clock: Arc<dyn Clock>,
    policy: BreakerPolicy,
    attempt_timeout: Duration,
    health_timeout: Duration,
}

impl Default for OrchestratorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl OrchestratorBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            backends: Vec::new(),
            clock: Arc::new(SystemClock),
            policy: BreakerPolicy::default(),
            attempt_timeout: Duration::from_secs(DEFAULT_ATTEMPT_TIMEOUT_SECS),
            health_timeout: Duration::from_secs(DEFAULT_HEALTH_TIMEOUT_SECS),
        }
    }

    /// Append a backend at the lowest priority so far.
    ///
    /// Names are breaker keys; a second backend with an already registered
    /// name is ignored with a warning.
    #[must_use]
    pub fn backend(mut self, backend: Arc<dyn GenerationBackend>) -> Self {
        if self.backends.iter().any(|b| b.name() == backend.name()) {
            warn!(backend = %backend.name(), "Ignoring duplicate backend registration");
        } else {
            self.backends.push(backend);
        }
        self
    }

    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn policy(mut self, policy: BreakerPolicy) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub fn attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    #[must_use]
    pub fn health_timeout(mut self, timeout: Duration) -> Self {
        self.health_timeout = timeout;
        self
    }

    #[must_use]
    pub fn build(self) -> Orchestrator {
        let policy = self.policy;
        Orchestrator {
            slots: self
                .backends
                .into_iter()
                .map(|backend| BackendSlot::new(backend, policy))
                .collect(),
            clock: self.clock,
            attempt_timeout: self.attempt_timeout,
            health_timeout: self.health_timeout,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::breaker::CircuitState;
    use crate::testing::{
        HealthBehavior, ImageStep, ManualClock, NarrativeStep, ScriptedBackend,
        sample_image_request,
    };
    use storyforge_config::{BackendConfig, BackendsConfig};

    fn request() -> NarrativeRequest {
        let mut answers = BTreeMap::new();
        answers.insert("q1".to_string(), "The sea at dawn".to_string());
        NarrativeRequest::new("ocean", "Ocean", answers)
    }

    fn outage() -> BackendError {
        BackendError::ProviderOutage("server error: 503".to_string())
    }

    fn orchestrator_with(
        clock: &Arc<ManualClock>,
        backends: &[&Arc<ScriptedBackend>],
    ) -> Orchestrator {
        let mut builder = Orchestrator::builder().clock(clock.clone());
        for backend in backends {
            builder = builder.backend((*backend).clone());
        }
        builder.build()
    }

    fn count(orchestrator: &Orchestrator, name: &str) -> u32 {
        orchestrator.breaker_snapshot(name).unwrap().failure_count
    }

    fn is_open(orchestrator: &Orchestrator, name: &str) -> bool {
        orchestrator.breaker_snapshot(name).unwrap().is_open()
    }

    #[tokio::test]
    async fn test_first_success_short_circuits() {
        let clock = Arc::new(ManualClock::at_epoch());
        let x = Arc::new(ScriptedBackend::succeeding("x"));
        let y = Arc::new(ScriptedBackend::succeeding("y"));
        let orchestrator = orchestrator_with(&clock, &[&x, &y]);

        let narrative = orchestrator.generate_narrative(&request()).await.unwrap();
        assert_eq!(narrative.title(), "A Story From x");
        assert_eq!(x.narrative_calls(), 1);
        assert_eq!(y.narrative_calls(), 0);
    }

    #[tokio::test]
    async fn test_fallback_after_single_failure() {
        let clock = Arc::new(ManualClock::at_epoch());
        let x = Arc::new(
            ScriptedBackend::succeeding("x").with_narrative_steps([NarrativeStep::Fail(outage())]),
        );
        let y = Arc::new(ScriptedBackend::succeeding("y"));
        let orchestrator = orchestrator_with(&clock, &[&x, &y]);

        let narrative = orchestrator.generate_narrative(&request()).await.unwrap();
        assert_eq!(narrative.title(), "A Story From y");
        assert_eq!(count(&orchestrator, "x"), 1);
        assert!(!is_open(&orchestrator, "x"));
        assert_eq!(count(&orchestrator, "y"), 0);
    }

    #[tokio::test]
    async fn test_open_breaker_is_skipped_without_invocation() {
        let clock = Arc::new(ManualClock::at_epoch());
        let x = Arc::new(ScriptedBackend::failing("x"));
        let orchestrator = orchestrator_with(&clock, &[&x]);

        for _ in 0..5 {
            assert!(orchestrator.generate_narrative(&request()).await.is_err());
        }
        assert!(is_open(&orchestrator, "x"));
        assert_eq!(x.narrative_calls(), 5);

        match orchestrator.generate_narrative(&request()).await {
            Err(GenerationError::AllBackendsExhausted {
                operation,
                failures,
                skipped,
            }) => {
                assert_eq!(operation, Operation::Narrative);
                assert!(failures.is_empty());
                assert_eq!(skipped, vec!["x".to_string()]);
            }
            Ok(_) => panic!("Expected exhaustion"),
        }
        assert_eq!(x.narrative_calls(), 5);
    }

    #[tokio::test]
    async fn test_breaker_closes_after_reset_timeout_and_success_resets() {
        let clock = Arc::new(ManualClock::at_epoch());
        let x = Arc::new(
            ScriptedBackend::succeeding("x").with_narrative_steps(vec![
                NarrativeStep::Fail(outage());
                5
            ]),
        );
        let orchestrator = orchestrator_with(&clock, &[&x]);

        for _ in 0..5 {
            let _ = orchestrator.generate_narrative(&request()).await;
        }
        assert!(is_open(&orchestrator, "x"));

        clock.advance(Duration::from_secs(31));
        let narrative = orchestrator.generate_narrative(&request()).await.unwrap();
        assert_eq!(narrative.title(), "A Story From x");

        let snapshot = orchestrator.breaker_snapshot("x").unwrap();
        assert_eq!(snapshot.state, CircuitState::Closed);
        assert_eq!(snapshot.failure_count, 0);
        assert_eq!(snapshot.last_failure, None);
    }

    #[tokio::test]
    async fn test_breaker_still_open_at_reset_boundary() {
        let clock = Arc::new(ManualClock::at_epoch());
        let x = Arc::new(ScriptedBackend::failing("x"));
        let orchestrator = orchestrator_with(&clock, &[&x]);

        for _ in 0..5 {
            let _ = orchestrator.generate_narrative(&request()).await;
        }
        clock.advance(Duration::from_secs(30));
        let _ = orchestrator.generate_narrative(&request()).await;
        assert_eq!(x.narrative_calls(), 5);

        // trial call fails and reopens immediately
        clock.advance(Duration::from_secs(1));
        let _ = orchestrator.generate_narrative(&request()).await;
        assert_eq!(x.narrative_calls(), 6);
        assert!(is_open(&orchestrator, "x"));
        assert_eq!(count(&orchestrator, "x"), 6);
    }

    #[tokio::test]
    async fn test_all_open_fails_without_invoking_anyone() {
        let clock = Arc::new(ManualClock::at_epoch());
        let x = Arc::new(ScriptedBackend::failing("x"));
        let y = Arc::new(ScriptedBackend::failing("y"));
        let orchestrator = Orchestrator::builder()
            .clock(clock.clone())
            .policy(BreakerPolicy {
                failure_threshold: 1,
                reset_timeout: Duration::from_secs(30),
            })
            .backend(x.clone())
            .backend(y.clone())
            .build();

        let _ = orchestrator.generate_narrative(&request()).await;
        assert_eq!((x.narrative_calls(), y.narrative_calls()), (1, 1));

        assert!(orchestrator.generate_narrative(&request()).await.is_err());
        assert!(orchestrator.generate_image(&sample_image_request()).await.is_none());
        assert_eq!((x.narrative_calls(), y.narrative_calls()), (1, 1));
        assert_eq!((x.image_calls(), y.image_calls()), (0, 0));
    }

    #[tokio::test]
    async fn test_exhaustion_reports_every_failure_in_order() {
        let clock = Arc::new(ManualClock::at_epoch());
        let x = Arc::new(ScriptedBackend::failing("x"));
        let y = Arc::new(ScriptedBackend::succeeding("y").with_narrative_default(
            NarrativeStep::Fail(BackendError::ProviderAuth(
                "invalid key sk-abcdefghijklmnopqrstuvwx".to_string(),
            )),
        ));
        let orchestrator = orchestrator_with(&clock, &[&x, &y]);

        let Err(GenerationError::AllBackendsExhausted { failures, .. }) =
            orchestrator.generate_narrative(&request()).await
        else {
            panic!("Expected exhaustion");
        };
        let names: Vec<_> = failures.iter().map(|f| f.backend.as_str()).collect();
        assert_eq!(names, ["x", "y"]);
        assert_eq!(failures[0].kind, "outage");
        assert_eq!(failures[1].kind, "auth");
        assert!(!failures[1].message.contains("sk-abcdefghijklmnopqrstuvwx"));
    }

    #[tokio::test]
    async fn test_malformed_output_counts_as_failure() {
        let clock = Arc::new(ManualClock::at_epoch());
        let x = Arc::new(ScriptedBackend::succeeding("x").with_narrative_steps([
            NarrativeStep::Fail(BackendError::MalformedOutput("missing title".to_string())),
        ]));
        let y = Arc::new(ScriptedBackend::succeeding("y"));
        let orchestrator = orchestrator_with(&clock, &[&x, &y]);

        assert!(orchestrator.generate_narrative(&request()).await.is_ok());
        assert_eq!(count(&orchestrator, "x"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_attempt_timeout_is_a_failure_and_fallback_continues() {
        let clock = Arc::new(ManualClock::at_epoch());
        let x = Arc::new(
            ScriptedBackend::succeeding("x").with_narrative_steps([NarrativeStep::Hang]),
        );
        let y = Arc::new(ScriptedBackend::succeeding("y"));
        let orchestrator = Orchestrator::builder()
            .clock(clock.clone())
            .attempt_timeout(Duration::from_secs(5))
            .backend(x.clone())
            .backend(y.clone())
            .build();

        let narrative = orchestrator.generate_narrative(&request()).await.unwrap();
        assert_eq!(narrative.title(), "A Story From y");
        assert_eq!(count(&orchestrator, "x"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_the_call_abandons_remaining_attempts() {
        let clock = Arc::new(ManualClock::at_epoch());
        let x = Arc::new(
            ScriptedBackend::succeeding("x").with_narrative_default(NarrativeStep::Hang),
        );
        let y = Arc::new(ScriptedBackend::succeeding("y"));
        let orchestrator = Arc::new(
            Orchestrator::builder()
                .clock(clock.clone())
                .attempt_timeout(Duration::from_secs(5))
                .backend(x.clone())
                .backend(y.clone())
                .build(),
        );

        let task = tokio::spawn({
            let orchestrator = Arc::clone(&orchestrator);
            async move { orchestrator.generate_narrative(&request()).await }
        });
        while x.narrative_calls() == 0 {
            tokio::task::yield_now().await;
        }

        task.abort();
        assert!(task.await.unwrap_err().is_cancelled());
        tokio::time::advance(Duration::from_secs(10)).await;

        assert_eq!(x.narrative_calls(), 1);
        assert_eq!(y.narrative_calls(), 0);
        assert_eq!(count(&orchestrator, "x"), 0);
        assert!(!is_open(&orchestrator, "x"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_failure_reports_timeout_kind() {
        let clock = Arc::new(ManualClock::at_epoch());
        let x = Arc::new(
            ScriptedBackend::succeeding("x").with_narrative_default(NarrativeStep::Hang),
        );
        let orchestrator = orchestrator_with(&clock, &[&x]);

        let Err(GenerationError::AllBackendsExhausted { failures, .. }) =
            orchestrator.generate_narrative(&request()).await
        else {
            panic!("Expected exhaustion");
        };
        assert_eq!(failures[0].kind, "timeout");
    }

    #[tokio::test]
    async fn test_image_unsupported_does_not_touch_breaker() {
        let clock = Arc::new(ManualClock::at_epoch());
        let x = Arc::new(
            ScriptedBackend::succeeding("x").with_image_default(ImageStep::Unsupported),
        );
        let y = Arc::new(ScriptedBackend::succeeding("y"));
        let orchestrator = orchestrator_with(&clock, &[&x, &y]);

        let image = orchestrator.generate_image(&sample_image_request()).await.unwrap();
        assert_eq!(image.as_str(), "https://images.test/y.png");
        assert_eq!(x.image_calls(), 1);
        assert_eq!(count(&orchestrator, "x"), 0);
        assert_eq!(orchestrator.breaker_snapshot("x").unwrap().last_failure, None);
    }

    #[tokio::test]
    async fn test_image_failure_is_recorded_and_exhaustion_is_none() {
        let clock = Arc::new(ManualClock::at_epoch());
        let x = Arc::new(ScriptedBackend::failing("x"));
        let y = Arc::new(
            ScriptedBackend::succeeding("y").with_image_default(ImageStep::Unsupported),
        );
        let orchestrator = orchestrator_with(&clock, &[&x, &y]);

        assert!(orchestrator.generate_image(&sample_image_request()).await.is_none());
        assert_eq!(count(&orchestrator, "x"), 1);
        assert_eq!(count(&orchestrator, "y"), 0);
    }

    #[tokio::test]
    async fn test_image_and_narrative_share_a_breaker() {
        let clock = Arc::new(ManualClock::at_epoch());
        let x = Arc::new(
            ScriptedBackend::succeeding("x").with_image_steps(vec![ImageStep::Fail(outage()); 5]),
        );
        let orchestrator = orchestrator_with(&clock, &[&x]);

        for _ in 0..5 {
            let _ = orchestrator.generate_image(&sample_image_request()).await;
        }
        assert!(orchestrator.generate_narrative(&request()).await.is_err());
        assert_eq!(x.narrative_calls(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_failures_are_never_lost() {
        const CALLS: u32 = 32;
        let x = Arc::new(ScriptedBackend::failing("x"));
        let orchestrator = Arc::new(
            Orchestrator::builder()
                .clock(Arc::new(ManualClock::at_epoch()))
                .policy(BreakerPolicy {
                    failure_threshold: 100,
                    reset_timeout: Duration::from_secs(30),
                })
                .backend(x.clone())
                .build(),
        );

        let mut calls = JoinSet::new();
        for _ in 0..CALLS {
            let orchestrator = Arc::clone(&orchestrator);
            calls.spawn(async move { orchestrator.generate_narrative(&request()).await.is_err() });
        }
        while let Some(result) = calls.join_next().await {
            assert!(result.unwrap());
        }

        assert_eq!(count(&orchestrator, "x"), CALLS);
    }

    #[tokio::test(start_paused = true)]
    async fn test_health_check_isolates_hanging_and_panicking_probes() {
        let healthy = Arc::new(ScriptedBackend::succeeding("healthy"));
        let down = Arc::new(ScriptedBackend::failing("down"));
        let hanging =
            Arc::new(ScriptedBackend::succeeding("hanging").with_health(HealthBehavior::Hang));
        let panicking =
            Arc::new(ScriptedBackend::succeeding("panicking").with_health(HealthBehavior::Panic));
        let orchestrator = Orchestrator::builder()
            .health_timeout(Duration::from_secs(2))
            .backend(healthy.clone())
            .backend(down.clone())
            .backend(hanging.clone())
            .backend(panicking.clone())
            .build();

        let results = orchestrator.health_check().await;
        assert_eq!(results.len(), 4);
        assert!(results["healthy"]);
        assert!(!results["down"]);
        assert!(!results["hanging"]);
        assert!(!results["panicking"]);
        assert_eq!(hanging.health_calls(), 1);
    }

    #[tokio::test]
    async fn test_health_check_leaves_breakers_alone() {
        let clock = Arc::new(ManualClock::at_epoch());
        let x = Arc::new(ScriptedBackend::failing("x"));
        let orchestrator = orchestrator_with(&clock, &[&x]);

        for _ in 0..5 {
            let _ = orchestrator.generate_narrative(&request()).await;
        }
        let before = orchestrator.breaker_snapshots();
        let results = orchestrator.health_check().await;
        assert!(!results["x"]);
        assert_eq!(orchestrator.breaker_snapshots(), before);
        assert_eq!(x.health_calls(), 1);
    }

    #[tokio::test]
    async fn test_empty_orchestrator_exhausts_immediately() {
        let orchestrator = Orchestrator::builder().build();
        let err = orchestrator.generate_narrative(&request()).await.unwrap_err();
        let GenerationError::AllBackendsExhausted {
            failures, skipped, ..
        } = err;
        assert!(failures.is_empty() && skipped.is_empty());
        assert!(orchestrator.generate_image(&sample_image_request()).await.is_none());
        assert!(orchestrator.health_check().await.is_empty());
    }

    #[test]
    fn test_duplicate_backend_names_are_ignored() {
        let orchestrator = Orchestrator::builder()
            .backend(Arc::new(ScriptedBackend::succeeding("x")))
            .backend(Arc::new(ScriptedBackend::failing("x")))
            .backend(Arc::new(ScriptedBackend::succeeding("y")))
            .build();
        assert_eq!(orchestrator.backend_names(), ["x", "y"]);
    }

    #[test]
    fn test_from_config_excludes_backends_that_fail_construction() {
        let config = Config::builder()
            .backends([BackendKind::Anthropic, BackendKind::Gemini, BackendKind::OpenAi])
            .failure_threshold(2)
            .attempt_timeout(Duration::from_secs(12))
            .build()
            .unwrap();

        let orchestrator = Orchestrator::from_config_with_factory(&config, |kind, _| {
            if kind == BackendKind::Gemini {
                return Err(BackendError::Misconfiguration(
                    "GEMINI_API_KEY is not set".to_string(),
                ));
            }
            let backend: Arc<dyn GenerationBackend> =
                Arc::new(ScriptedBackend::succeeding(&kind.to_string()));
            Ok(backend)
        });

        assert_eq!(orchestrator.backend_names(), ["anthropic", "openai"]);
        assert_eq!(orchestrator.attempt_timeout(), Duration::from_secs(12));
        assert!(
            orchestrator
                .breaker_snapshots()
                .iter()
                .all(|s| s.state == CircuitState::Closed && s.failure_count == 0)
        );
    }

    #[tokio::test]
    async fn test_from_config_applies_breaker_policy() {
        let config = Config::builder()
            .backends([BackendKind::OpenAi])
            .failure_threshold(2)
            .build()
            .unwrap();
        let orchestrator = Orchestrator::from_config_with_factory(&config, |kind, _| {
            Ok(Arc::new(ScriptedBackend::failing(&kind.to_string())) as Arc<dyn GenerationBackend>)
        });

        let _ = orchestrator.generate_narrative(&request()).await;
        assert!(!is_open(&orchestrator, "openai"));
        let _ = orchestrator.generate_narrative(&request()).await;
        assert!(is_open(&orchestrator, "openai"));
    }

    #[test]
    fn test_from_config_without_any_credentials_is_empty() {
        let mut config = Config::minimal_for_testing();
        config.backends = BackendsConfig::default();
        for kind in config.generation.backend_order.clone() {
            *config.backends.slot_mut(kind) = Some(BackendConfig {
                api_key_env: Some("STORYFORGE_ORCHESTRATOR_TEST_UNSET_KEY".to_string()),
                ..Default::default()
            });
        }
        let orchestrator = Orchestrator::from_config(&config);
        assert!(orchestrator.backend_names().is_empty());
    }

    #[test]
    fn test_image_support_reports_each_backend() {
        let orchestrator = Orchestrator::builder()
            .backend(Arc::new(
                ScriptedBackend::succeeding("text").with_image_default(ImageStep::Unsupported),
            ))
            .backend(Arc::new(ScriptedBackend::succeeding("pictures")))
            .build();
        let support = orchestrator.image_support();
        assert!(!support["text"]);
        assert!(support["pictures"]);
    }
}
