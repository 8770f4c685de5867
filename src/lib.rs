//! # pagelens
//!
//! Ask an analysis backend to explain one page of a PDF, and follow up on the
//! answer, with the reply streamed back token by token.
//!
//! ## Why this crate?
//!
//! Uploading a whole 300-page manual to ask about one diagram is slow and
//! wasteful. This crate cuts the page the user is looking at out of the
//! document, sends only that, and folds the streamed answer into a small
//! conversation model a UI (or the bundled CLI) can render as it grows.
//!
//! ## Pipeline Overview
//!
//! ```text
//! DocumentHandle + page index + ExplanationRequest
//!  │
//!  ├─ 1. Check    page index within the document
//!  ├─ 2. Extract  single-page PDF via pdfium (CPU-bound, spawn_blocking)
//!  ├─ 3. Submit   multipart POST to the analysis backend
//!  ├─ 4. Decode   blank-line framed event stream → ProtocolEvent
//!  └─ 5. Reduce   ConversationState::apply (answer text, turns, status)
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pagelens::{ClientConfig, ConversationState, DocumentHandle, Explainer, ExplanationRequest};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ClientConfig::default();
//!     let explainer = Explainer::new(config)?;
//!     let document = DocumentHandle::open_path("manual.pdf", None).await?;
//!
//!     let mut state = ConversationState::new();
//!     explainer
//!         .submit(&mut state, &document, 0, ExplanationRequest::default())
//!         .await?;
//!     println!("{}", state.initial_answer());
//!
//!     explainer
//!         .submit(&mut state, &document, 0, ExplanationRequest::follow_up("What does the table show?"))
//!         .await?;
//!     for turn in state.turns() {
//!         println!("{:?}: {}", turn.role, turn.text);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pagelens` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when embedding the library in a viewer:
//! ```toml
//! pagelens = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod conversation;
pub mod credentials;
pub mod document;
pub mod error;
pub mod explain;
pub mod observer;
pub mod pipeline;
pub mod prompts;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ClientConfig, ClientConfigBuilder};
pub use conversation::{
    Applied, ContentTarget, ConversationState, ConversationTurn, ExplanationRequest,
    RequestStatus, Role,
};
pub use credentials::{save_credentials, LlmCredentials, Provider};
pub use document::DocumentHandle;
pub use error::ExplainError;
pub use explain::Explainer;
pub use observer::{ConversationObserver, NoopObserver, SharedObserver};
pub use pipeline::extract::{PageExtractor, PdfiumExtractor};
pub use prompts::DEFAULT_PROMPT;
pub use stream::{decode_stream, decode_stream_with_idle, FrameDecoder, ProtocolEvent};
