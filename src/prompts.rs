//! Prompt defaults and every piece of user-facing status text.
//!
//! The UI shows exactly these messages in the status line, and tests assert
//! on the constants rather than on copies of the literals.

/// Prompt used when the caller does not type one.
pub const DEFAULT_PROMPT: &str = "help me understand this page";

// ── Progress ─────────────────────────────────────────────────────────────

pub const MSG_IDLE: &str = "Idle";
pub const MSG_PREPARING: &str = "Preparing page…";
pub const MSG_SUBMITTING: &str = "Thinking...";
pub const MSG_STREAMING: &str = "Answering…";
pub const MSG_DONE: &str = "Done";

// ── Failures ─────────────────────────────────────────────────────────────

pub const MSG_BLANK_PROMPT: &str = "Enter a prompt first.";
pub const MSG_REQUEST_IN_FLIGHT: &str = "A request is already in progress.";
pub const MSG_INVALID_PAGE: &str = "Invalid page selection.";
pub const MSG_EXTRACTION_FAILED: &str = "Could not prepare the page for analysis.";
pub const MSG_CONNECTION_ERROR: &str = "Connection error.";
pub const MSG_STREAM_DECODE: &str = "Could not read the response stream.";

// ── Credentials ──────────────────────────────────────────────────────────

pub const MSG_MISSING_API_KEY: &str = "API key is required.";
pub const MSG_CREDENTIALS_SAVED: &str = "Credentials saved to keychain.";
pub const MSG_CREDENTIALS_FAILED: &str = "Failed to save credentials.";

/// Hint the backend appends when no key is configured. It names the
/// backend's own route, which means nothing to a user.
const BACKEND_KEYS_HINT: &str = "Set it via /add-llm-keys.";
const UI_KEYS_HINT: &str = "Set it via \"API Keys\".";

/// Rewrite backend configuration hints into the label the user sees.
///
/// Applied to every backend-provided message: rejection bodies and in-stream
/// error events alike.
pub fn rewrite_backend_hint(message: &str) -> String {
    message.replace(BACKEND_KEYS_HINT, UI_KEYS_HINT)
}

/// Fallback shown when a rejected response carries no usable body.
pub fn request_failed(status: u16) -> String {
    format!("Request failed ({status}).")
}
