//! Outbound request: multipart payload, send, and rejection decoding.
//!
//! This is the only stage with network I/O before streaming starts. The state
//! transitions around it live in [`crate::explain`].

use crate::conversation::ExplanationRequest;
use crate::error::ExplainError;
use crate::prompts::request_failed;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response};
use serde_json::Value;
use tracing::{debug, warn};

/// Build the multipart body the explanation endpoint expects.
///
/// | Field            | Content                                     |
/// |------------------|---------------------------------------------|
/// | `pdf_bytes`      | single-page PDF, filename `page-<n>.pdf`    |
/// | `prompt`         | prompt text                                 |
/// | `parse_with_llm` | `"true"` / `"false"` (deep analysis)        |
/// | `is_follow_up`   | `"true"` / `"false"`                        |
pub fn build_form(
    page_pdf: Vec<u8>,
    page_index: usize,
    request: &ExplanationRequest,
) -> Result<Form, ExplainError> {
    let page = Part::bytes(page_pdf)
        .file_name(format!("page-{}.pdf", page_index + 1))
        .mime_str("application/pdf")
        .map_err(|e| ExplainError::Internal(format!("building multipart part: {e}")))?;

    Ok(Form::new()
        .part("pdf_bytes", page)
        .text("prompt", request.prompt_text.clone())
        .text(
            "parse_with_llm",
            request.parse_with_deep_analysis.to_string(),
        )
        .text("is_follow_up", request.is_follow_up.to_string()))
}

/// POST the form. Any failure to obtain a response is a transport error.
pub async fn send(client: &Client, url: &str, form: Form) -> Result<Response, ExplainError> {
    debug!("POST {}", url);
    client
        .post(url)
        .multipart(form)
        .send()
        .await
        .map_err(|e| {
            warn!("Request to {} failed: {}", url, e);
            ExplainError::Transport {
                detail: e.to_string(),
            }
        })
}

/// Turn a non-success response into [`ExplainError::RequestRejected`].
///
/// The body is read once; an unreadable body falls through to the generic
/// status message.
pub async fn rejection(response: Response) -> ExplainError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    ExplainError::RequestRejected {
        status,
        message: rejection_message(status, &body),
    }
}

/// Derive the user-facing message for a rejected request.
///
/// Preference order: a non-empty JSON `detail` field (stringified when it is
/// not a string), then the raw body text, then `Request failed (<status>).`
pub fn rejection_message(status: u16, body: &str) -> String {
    if let Ok(json) = serde_json::from_str::<Value>(body) {
        match json.get("detail") {
            Some(Value::String(s)) if !s.is_empty() => return s.clone(),
            Some(Value::Null) | Some(Value::String(_)) | None => {}
            Some(other) => return other.to_string(),
        }
    }

    if !body.trim().is_empty() {
        return body.to_string();
    }

    request_failed(status)
}
