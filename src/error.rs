//! Error types for the pagelens library.
//!
//! Every failure of an explanation request is terminal for that request: the
//! library never retries. Errors reach callers in two ways:
//!
//! * **Pre-flight rejections** ([`ExplainError::BlankPrompt`],
//!   [`ExplainError::RequestInFlight`]) are returned as `Err` from
//!   [`crate::explain::Explainer::submit`] and leave the conversation untouched.
//!
//! * **Request failures** (everything from page selection onwards) are written
//!   into [`crate::conversation::ConversationState`] via
//!   [`ExplainError::user_message`], so a UI only has to watch one object.
//!
//! `Display` carries the developer-facing detail (logged via `tracing`);
//! `user_message` carries the short text shown next to the conversation.

use crate::prompts::{
    rewrite_backend_hint, MSG_BLANK_PROMPT, MSG_CONNECTION_ERROR, MSG_EXTRACTION_FAILED,
    MSG_INVALID_PAGE, MSG_MISSING_API_KEY, MSG_REQUEST_IN_FLIGHT, MSG_STREAM_DECODE,
};
use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the pagelens library.
#[derive(Debug, Error)]
pub enum ExplainError {
    // ── Pre-flight ────────────────────────────────────────────────────────
    /// The prompt was empty or whitespace-only.
    #[error("Prompt is empty; type a question before submitting")]
    BlankPrompt,

    /// A request is still preparing, submitting or streaming.
    #[error("A request is already in progress for this conversation")]
    RequestInFlight,

    // ── Local preparation ─────────────────────────────────────────────────
    /// Requested page is outside the document.
    #[error("Page index {page} is out of range (document has {total} pages)")]
    InvalidPageSelection { page: usize, total: usize },

    /// pdfium could not load the source or build the single-page document.
    #[error("Page extraction failed: {detail}")]
    PageExtraction { detail: String },

    // ── Network ───────────────────────────────────────────────────────────
    /// No response was received, or reading the body failed mid-stream.
    #[error("Transport error: {detail}\nIs the analysis backend running?")]
    Transport { detail: String },

    /// The backend answered with a non-success status.
    #[error("Request rejected with HTTP {status}: {message}")]
    RequestRejected { status: u16, message: String },

    /// A complete frame was not valid UTF-8.
    #[error("Malformed response stream: {detail}")]
    StreamDecode { detail: String },

    /// The backend reported a failure inside the event stream.
    #[error("Backend error: {message}")]
    Remote { message: String },

    // ── Credentials ───────────────────────────────────────────────────────
    /// Credential save attempted without an API key.
    #[error("API key is required to save credentials")]
    MissingApiKey,

    /// The credential endpoint refused the submission.
    #[error("Credential save rejected: {message}")]
    CredentialsRejected { message: String },

    // ── Document loading (host side) ──────────────────────────────────────
    /// The host could not open the PDF it wants to explain.
    #[error("Could not open PDF '{path}': {detail}")]
    DocumentLoad { path: PathBuf, detail: String },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
Point PDFIUM_LIB_PATH (or --pdfium-lib) at an existing libpdfium,\n\
or install pdfium where the system loader can find it.\n"
    )]
    PdfiumBindingFailed(String),

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ExplainError {
    /// Short, user-facing text for `last_status_message`.
    ///
    /// Backend-provided messages get the configuration hint rewritten;
    /// transport failures never do, since there is no backend text to rewrite.
    pub fn user_message(&self) -> String {
        match self {
            ExplainError::BlankPrompt => MSG_BLANK_PROMPT.to_string(),
            ExplainError::RequestInFlight => MSG_REQUEST_IN_FLIGHT.to_string(),
            ExplainError::InvalidPageSelection { .. } => MSG_INVALID_PAGE.to_string(),
            ExplainError::PageExtraction { .. } => MSG_EXTRACTION_FAILED.to_string(),
            ExplainError::Transport { .. } => MSG_CONNECTION_ERROR.to_string(),
            ExplainError::RequestRejected { message, .. } => rewrite_backend_hint(message),
            ExplainError::StreamDecode { .. } => MSG_STREAM_DECODE.to_string(),
            ExplainError::Remote { message } => rewrite_backend_hint(message),
            ExplainError::MissingApiKey => MSG_MISSING_API_KEY.to_string(),
            ExplainError::CredentialsRejected { message } => message.clone(),
            other => other.to_string(),
        }
    }

    /// `true` for errors raised before the conversation was touched.
    pub fn is_preflight(&self) -> bool {
        matches!(self, ExplainError::BlankPrompt | ExplainError::RequestInFlight)
    }
}
