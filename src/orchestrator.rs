//! Generation orchestration: validation, provider dispatch, progress
//! adaptation and best-effort cancellation.

use crate::error::{Error, Result};
use crate::progress::{ProgressSender, ProgressSink};
use crate::provider::{ImageProvider, ProviderRequest};
use crate::providers::{OpenAiProvider, ReplicateProvider};
use crate::types::{CredentialMap, GenerationRequest, GenerationResult, ProviderKind};
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Fixed suffix appended to the prompt when the style modifier is set.
const STYLE_SUFFIX: &str = ", highly detailed digital art";

/// Builder for [`Orchestrator`].
#[derive(Debug, Clone, Default)]
pub struct OrchestratorBuilder {
    openai_base_url: Option<String>,
    replicate_base_url: Option<String>,
    poll_interval: Option<Duration>,
    max_poll_attempts: Option<u32>,
}

impl OrchestratorBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the OpenAI API base URL (primarily for tests).
    pub fn openai_base_url(mut self, url: impl Into<String>) -> Self {
        self.openai_base_url = Some(url.into());
        self
    }

    /// Overrides the Replicate API base URL (primarily for tests).
    pub fn replicate_base_url(mut self, url: impl Into<String>) -> Self {
        self.replicate_base_url = Some(url.into());
        self
    }

    /// Sets the delay between Replicate status polls.
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = Some(interval);
        self
    }

    /// Sets the Replicate polling attempt budget.
    pub fn max_poll_attempts(mut self, attempts: u32) -> Self {
        self.max_poll_attempts = Some(attempts);
        self
    }

    /// Builds the orchestrator.
    pub fn build(self) -> Orchestrator {
        Orchestrator {
            openai_base_url: self.openai_base_url,
            replicate_base_url: self.replicate_base_url,
            poll_interval: self.poll_interval,
            max_poll_attempts: self.max_poll_attempts,
            pending: Arc::new(Mutex::new(HashSet::new())),
            next_id: AtomicU64::new(0),
        }
    }
}

/// Routes generation requests to the matching provider client and maps the
/// outcome into a uniform result shape.
///
/// Each call is independent; the only shared state is the pending-generation
/// set backing [`Orchestrator::cancel_pending`]. Concurrent generations are
/// allowed, callers serialize if their UI requires it.
pub struct Orchestrator {
    openai_base_url: Option<String>,
    replicate_base_url: Option<String>,
    poll_interval: Option<Duration>,
    max_poll_attempts: Option<u32>,
    pending: Arc<Mutex<HashSet<u64>>>,
    next_id: AtomicU64,
}

impl Default for Orchestrator {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl Orchestrator {
    /// Creates a new `OrchestratorBuilder`.
    pub fn builder() -> OrchestratorBuilder {
        OrchestratorBuilder::new()
    }

    /// Creates an orchestrator with default provider settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs one generation to completion.
    ///
    /// Validates the prompt and credential before any network call, augments
    /// the prompt when the style modifier is set, dispatches to the provider
    /// matching `request.provider`, and forwards adapted progress events to
    /// `progress` if one is supplied.
    ///
    /// # Errors
    ///
    /// [`Error::Validation`] for an empty prompt, [`Error::MissingCredential`]
    /// when the selected provider has no key; provider failures pass through
    /// unchanged for the caller to render.
    pub async fn generate(
        &self,
        request: &GenerationRequest,
        credentials: &CredentialMap,
        progress: Option<ProgressSender>,
    ) -> Result<GenerationResult> {
        let prompt = request.prompt.trim();
        if prompt.is_empty() {
            return Err(Error::Validation("prompt must not be empty".into()));
        }

        let api_key = credentials
            .get(request.provider)
            .ok_or(Error::MissingCredential(request.provider))?;

        let prompt = if request.style_modifier {
            format!("{prompt}{STYLE_SUFFIX}")
        } else {
            prompt.to_string()
        };

        let id = self.register_pending();
        let sink =
            ProgressSink::new(progress, request.provider).with_gate(self.pending.clone(), id);

        let provider_request = ProviderRequest {
            prompt: prompt.clone(),
            size: request.size,
        };

        tracing::info!(
            provider = %request.provider,
            size = %request.size,
            style_modifier = request.style_modifier,
            "starting generation"
        );

        let outcome = self
            .dispatch(request.provider, api_key, &provider_request, &sink)
            .await;

        self.forget_pending(id);

        let image_url = outcome?;
        Ok(GenerationResult {
            image_url,
            prompt,
            size: request.size,
            style_modifier: request.style_modifier,
            provider: request.provider,
        })
    }

    /// Forgets all in-flight generations so their progress events are no
    /// longer forwarded.
    ///
    /// Best-effort only: remote jobs keep running, the network calls are not
    /// aborted, and results already in flight still return to their callers.
    pub fn cancel_pending(&self) {
        let mut pending = self.pending.lock().unwrap();
        if !pending.is_empty() {
            tracing::debug!(count = pending.len(), "cancelling pending generations");
        }
        pending.clear();
    }

    async fn dispatch(
        &self,
        provider: ProviderKind,
        api_key: &str,
        request: &ProviderRequest,
        sink: &ProgressSink,
    ) -> Result<String> {
        match provider {
            ProviderKind::OpenAi => {
                let mut builder = OpenAiProvider::builder().api_key(api_key);
                if let Some(url) = &self.openai_base_url {
                    builder = builder.base_url(url);
                }
                let client = builder.build()?;

                // The synchronous protocol has no intermediate state, so the
                // orchestrator brackets the call itself.
                sink.emit("Generating...", 0);
                let image_url = client.generate(request, sink).await?;
                sink.emit("Processing...", 100);
                Ok(image_url)
            }
            ProviderKind::Replicate => {
                let mut builder = ReplicateProvider::builder().api_key(api_key);
                if let Some(url) = &self.replicate_base_url {
                    builder = builder.base_url(url);
                }
                if let Some(interval) = self.poll_interval {
                    builder = builder.poll_interval(interval);
                }
                if let Some(attempts) = self.max_poll_attempts {
                    builder = builder.max_attempts(attempts);
                }
                let client = builder.build()?;
                client.generate(request, sink).await
            }
        }
    }

    fn register_pending(&self) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.pending.lock().unwrap().insert(id);
        id
    }

    fn forget_pending(&self, id: u64) {
        self.pending.lock().unwrap().remove(&id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::ProgressEvent;
    use crate::types::ImageSize;
    use httpmock::{
        Method::{GET, POST},
        MockServer,
    };
    use tokio::sync::mpsc;

    fn credentials_for(provider: ProviderKind, key: &str) -> CredentialMap {
        let mut credentials = CredentialMap::new();
        credentials.insert(provider, key);
        credentials
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<ProgressEvent>) -> Vec<ProgressEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn test_empty_prompt_fails_before_network() {
        let orchestrator = Orchestrator::new();
        let request = GenerationRequest::new("", ProviderKind::OpenAi);
        let credentials = credentials_for(ProviderKind::OpenAi, "sk-test");

        let err = orchestrator
            .generate(&request, &credentials, None)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Validation(_)));
    }

    #[tokio::test]
    async fn test_whitespace_prompt_fails() {
        let orchestrator = Orchestrator::new();
        let request = GenerationRequest::new("   \t", ProviderKind::Replicate);
        let credentials = credentials_for(ProviderKind::Replicate, "r8-test");

        let err = orchestrator
            .generate(&request, &credentials, None)
            .await
            .unwrap_err();

        assert!(err.is_validation());
    }

    #[tokio::test]
    async fn test_missing_credential_fails_before_network() {
        let orchestrator = Orchestrator::new();
        let request = GenerationRequest::new("a cat", ProviderKind::Replicate);

        let err = orchestrator
            .generate(&request, &CredentialMap::new(), None)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            Error::MissingCredential(ProviderKind::Replicate)
        ));
        assert!(err.is_validation());
    }

    #[tokio::test]
    async fn test_openai_generation_with_style_modifier() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v1/images/generations")
                    .body_includes("\"prompt\":\"a cat, highly detailed digital art\"")
                    .body_includes("\"size\":\"512x512\"");
                then.status(200)
                    .header("content-type", "application/json")
                    .body(r#"{"data": [{"url": "https://example.com/cat.png"}]}"#);
            })
            .await;

        let orchestrator = Orchestrator::builder()
            .openai_base_url(server.url("/v1"))
            .build();
        let request = GenerationRequest::new("a cat", ProviderKind::OpenAi)
            .with_size(ImageSize::Medium)
            .with_style_modifier(true);
        let credentials = credentials_for(ProviderKind::OpenAi, "sk-test");

        let (tx, mut rx) = mpsc::unbounded_channel();
        let result = orchestrator
            .generate(&request, &credentials, Some(tx))
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(result.image_url, "https://example.com/cat.png");
        assert_eq!(result.prompt, "a cat, highly detailed digital art");
        assert_eq!(result.size, ImageSize::Medium);
        assert_eq!(result.size.as_str(), "512x512");
        assert!(result.style_modifier);
        assert_eq!(result.provider, ProviderKind::OpenAi);

        let events = drain(&mut rx);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].status, "Generating...");
        assert_eq!(events[0].percentage, 0);
        assert_eq!(events[0].estimated_remaining.as_deref(), Some("10-30 seconds"));
        assert_eq!(events[1].status, "Processing...");
        assert_eq!(events[1].percentage, 100);
        assert_eq!(events[1].estimated_remaining, None);
    }

    #[tokio::test]
    async fn test_openai_plain_prompt_is_not_augmented() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v1/images/generations")
                    .body_includes("\"prompt\":\"a plain cat\"");
                then.status(200)
                    .header("content-type", "application/json")
                    .body(r#"{"data": [{"url": "https://example.com/cat.png"}]}"#);
            })
            .await;

        let orchestrator = Orchestrator::builder()
            .openai_base_url(server.url("/v1"))
            .build();
        let request = GenerationRequest::new("a plain cat", ProviderKind::OpenAi);
        let credentials = credentials_for(ProviderKind::OpenAi, "sk-test");

        let result = orchestrator
            .generate(&request, &credentials, None)
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(result.prompt, "a plain cat");
        assert!(!result.style_modifier);
    }

    #[tokio::test]
    async fn test_replicate_generation_adapts_progress() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v1/predictions")
                    .body_includes("\"prompt\":\"a dog\"")
                    .body_includes("\"width\":1024");
                then.status(201)
                    .header("content-type", "application/json")
                    .body(r#"{"id": "job-9"}"#);
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/v1/predictions/job-9");
                then.status(200)
                    .header("content-type", "application/json")
                    .body(r#"{"status": "succeeded", "output": ["http://img"]}"#);
            })
            .await;

        let orchestrator = Orchestrator::builder()
            .replicate_base_url(server.url("/v1"))
            .poll_interval(Duration::from_millis(1))
            .build();
        let request = GenerationRequest::new("a dog", ProviderKind::Replicate);
        let credentials = credentials_for(ProviderKind::Replicate, "r8-test");

        let (tx, mut rx) = mpsc::unbounded_channel();
        let result = orchestrator
            .generate(&request, &credentials, Some(tx))
            .await
            .unwrap();

        assert_eq!(result.image_url, "http://img");
        assert_eq!(result.provider, ProviderKind::Replicate);
        assert_eq!(result.size, ImageSize::Large);

        // Labels flip at the 50% threshold.
        let events = drain(&mut rx);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].status, "Starting generation...");
        assert_eq!(events[0].estimated_remaining.as_deref(), Some("1-2 minutes"));
        assert_eq!(events[1].status, "Finalizing...");
        assert_eq!(
            events[1].estimated_remaining.as_deref(),
            Some("Less than a minute")
        );
    }

    #[tokio::test]
    async fn test_replicate_timeout_passes_through() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/predictions");
                then.status(201)
                    .header("content-type", "application/json")
                    .body(r#"{"id": "job-10"}"#);
            })
            .await;
        let poll = server
            .mock_async(|when, then| {
                when.method(GET).path("/v1/predictions/job-10");
                then.status(200)
                    .header("content-type", "application/json")
                    .body(r#"{"status": "processing"}"#);
            })
            .await;

        let orchestrator = Orchestrator::builder()
            .replicate_base_url(server.url("/v1"))
            .poll_interval(Duration::from_millis(1))
            .max_poll_attempts(2)
            .build();
        let request = GenerationRequest::new("a dog", ProviderKind::Replicate);
        let credentials = credentials_for(ProviderKind::Replicate, "r8-test");

        let err = orchestrator
            .generate(&request, &credentials, None)
            .await
            .unwrap_err();

        assert!(err.is_timeout());
        assert_eq!(poll.hits_async().await, 2);
    }

    #[tokio::test]
    async fn test_provider_error_passes_through_unchanged() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/images/generations");
                then.status(429).body("rate limit exceeded");
            })
            .await;

        let orchestrator = Orchestrator::builder()
            .openai_base_url(server.url("/v1"))
            .build();
        let request = GenerationRequest::new("a cat", ProviderKind::OpenAi);
        let credentials = credentials_for(ProviderKind::OpenAi, "sk-test");

        let err = orchestrator
            .generate(&request, &credentials, None)
            .await
            .unwrap_err();

        match err {
            Error::Provider { status, message } => {
                assert_eq!(status, 429);
                assert_eq!(message, "rate limit exceeded");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_cancel_pending_silences_progress() {
        let orchestrator = Orchestrator::new();
        let id = orchestrator.register_pending();

        let (tx, mut rx) = mpsc::unbounded_channel();
        let sink = ProgressSink::new(Some(tx), ProviderKind::Replicate)
            .with_gate(orchestrator.pending.clone(), id);

        sink.emit("Starting generation...", 0);
        assert!(rx.try_recv().is_ok());

        orchestrator.cancel_pending();

        sink.emit("Generating image...", 10);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_generation_deregisters_on_failure() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/images/generations");
                then.status(500).body("boom");
            })
            .await;

        let orchestrator = Orchestrator::builder()
            .openai_base_url(server.url("/v1"))
            .build();
        let request = GenerationRequest::new("a cat", ProviderKind::OpenAi);
        let credentials = credentials_for(ProviderKind::OpenAi, "sk-test");

        let _ = orchestrator
            .generate(&request, &credentials, None)
            .await
            .unwrap_err();

        // A failed generation must not leave its id behind in the pending set.
        assert!(orchestrator.pending.lock().unwrap().is_empty());
    }
}
