//! Request orchestration: page → request → stream → conversation.
//!
//! [`Explainer::submit`] runs one explanation or follow-up end to end and
//! reports everything through the [`ConversationState`] it borrows (and the
//! configured observer). It never retries.

use crate::config::ClientConfig;
use crate::conversation::{Applied, ConversationState, ExplanationRequest};
use crate::credentials::{self, LlmCredentials};
use crate::document::DocumentHandle;
use crate::error::ExplainError;
use crate::observer::{ConversationObserver, NoopObserver, SharedObserver};
use crate::pipeline::extract::{PageExtractor, PdfiumExtractor};
use crate::pipeline::request;
use crate::stream::{decode_stream_with_idle, ProtocolEvent};
use futures::StreamExt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Drives explanation requests against one backend.
///
/// Holds a pooled HTTP client, so build one per backend and reuse it for
/// every request of every conversation.
pub struct Explainer {
    config: ClientConfig,
    client: reqwest::Client,
    extractor: Arc<dyn PageExtractor>,
    observer: SharedObserver,
}

impl Explainer {
    /// Create an explainer using pdfium for page extraction.
    pub fn new(config: ClientConfig) -> Result<Self, ExplainError> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout())
            .build()
            .map_err(|e| ExplainError::Internal(format!("building HTTP client: {e}")))?;

        let extractor: Arc<dyn PageExtractor> =
            Arc::new(PdfiumExtractor::new(config.pdfium_library_path.clone()));
        let observer: SharedObserver = match config.observer {
            Some(ref o) => Arc::clone(o),
            None => Arc::new(NoopObserver),
        };

        Ok(Self {
            config,
            client,
            extractor,
            observer,
        })
    }

    /// Replace the page extractor.
    pub fn with_extractor(mut self, extractor: Arc<dyn PageExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Run one request to completion.
    ///
    /// `page_index` is zero-based. Every outcome of an accepted request is
    /// written to `state`; the only `Err` is a pre-flight rejection
    /// ([`ExplainError::BlankPrompt`], [`ExplainError::RequestInFlight`])
    /// that left `state` untouched.
    pub async fn submit(
        &self,
        state: &mut ConversationState,
        document: &DocumentHandle,
        page_index: usize,
        request: ExplanationRequest,
    ) -> Result<(), ExplainError> {
        state.begin(&request)?;
        if request.is_follow_up {
            if let Some(question) = state.turns().last() {
                self.observer.on_question(question);
            }
        }
        self.notify_status(state);

        let start = Instant::now();
        info!(
            "Submitting {} for page {} (deep analysis: {})",
            if request.is_follow_up { "follow-up" } else { "explanation" },
            page_index + 1,
            request.parse_with_deep_analysis
        );

        if let Err(e) = self.run(state, document, page_index, &request).await {
            warn!("Request failed: {}", e);
            state.fail(&e);
        }

        info!(
            "Request finished: {} in {}ms",
            state.status(),
            start.elapsed().as_millis()
        );
        self.observer
            .on_finished(state.status(), state.last_status_message());
        Ok(())
    }

    /// Everything after `begin`. An `Err` here is a terminal failure the
    /// caller records; failures reported by the stream itself are already
    /// in `state` when this returns `Ok`.
    async fn run(
        &self,
        state: &mut ConversationState,
        document: &DocumentHandle,
        page_index: usize,
        request: &ExplanationRequest,
    ) -> Result<(), ExplainError> {
        // ── Step 1: Bounds check ─────────────────────────────────────────
        let total = document.page_count();
        if page_index >= total {
            return Err(ExplainError::InvalidPageSelection {
                page: page_index,
                total,
            });
        }

        // ── Step 2: Extract the page ─────────────────────────────────────
        let page_pdf = self.extract(document, page_index).await?;
        state.mark_submitting();
        self.notify_status(state);

        // ── Step 3: Submit ───────────────────────────────────────────────
        let form = request::build_form(page_pdf, page_index, request)?;
        let response = request::send(&self.client, &self.config.explain_url(), form).await?;
        if !response.status().is_success() {
            return Err(request::rejection(response).await);
        }
        state.mark_streaming();
        self.notify_status(state);

        // ── Step 4: Stream events into the conversation ──────────────────
        let idle = self.config.stream_idle_timeout();
        let mut events = decode_stream_with_idle(response.bytes_stream(), Some(idle));
        let mut frames = 0usize;
        while let Some(event) = events.next().await {
            let event = event?;
            frames += 1;

            match state.apply(&event) {
                Applied::Appended(target) => {
                    if let ProtocolEvent::Content(text) = &event {
                        self.observer.on_content(target, text);
                    }
                }
                Applied::Skipped => {}
                Applied::Halted => {
                    debug!("Stream halted after {} frames", frames);
                    return Ok(());
                }
            }
        }

        debug!("Stream ended after {} frames", frames);
        state.complete();
        Ok(())
    }

    async fn extract(
        &self,
        document: &DocumentHandle,
        page_index: usize,
    ) -> Result<Vec<u8>, ExplainError> {
        let extractor = Arc::clone(&self.extractor);
        let bytes = document.shared_bytes();

        tokio::task::spawn_blocking(move || extractor.extract(&bytes, page_index))
            .await
            .map_err(|e| ExplainError::PageExtraction {
                detail: format!("extraction task panicked: {e}"),
            })?
            .map_err(|e| match e {
                e @ ExplainError::PageExtraction { .. } => e,
                other => ExplainError::PageExtraction {
                    detail: other.to_string(),
                },
            })
    }

    /// Store model-provider credentials on the same backend.
    pub async fn save_credentials(&self, creds: &LlmCredentials) -> Result<String, ExplainError> {
        credentials::save_credentials(&self.client, &self.config, creds).await
    }

    fn notify_status(&self, state: &ConversationState) {
        self.observer
            .on_status(state.status(), state.last_status_message());
    }
}
