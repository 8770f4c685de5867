//! Saving model-provider credentials on the analysis backend.
//!
//! The backend keeps the key in the OS keychain and picks the models it uses
//! for explanations from what is stored here. The client only validates that
//! a key was given and relays the backend's verdict.

use crate::config::ClientConfig;
use crate::error::ExplainError;
use crate::prompts::{MSG_CREDENTIALS_FAILED, MSG_CREDENTIALS_SAVED};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use tracing::{info, warn};

/// Model providers the backend accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    OpenAi,
    Anthropic,
    Gemini,
}

impl Provider {
    pub fn as_str(self) -> &'static str {
        match self {
            Provider::OpenAi => "openai",
            Provider::Anthropic => "anthropic",
            Provider::Gemini => "gemini",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = ExplainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Provider::OpenAi),
            "anthropic" => Ok(Provider::Anthropic),
            "gemini" => Ok(Provider::Gemini),
            other => Err(ExplainError::InvalidConfig(format!(
                "unknown provider '{other}' (expected openai, anthropic or gemini)"
            ))),
        }
    }
}

/// Payload of the credential-save endpoint.
///
/// Unset models serialize as `null` and leave the backend's choice alone.
#[derive(Clone, Serialize)]
pub struct LlmCredentials {
    pub provider: Provider,
    pub api_key: String,
    pub expert_model: Option<String>,
    pub parsing_model: Option<String>,
}

impl LlmCredentials {
    pub fn new(provider: Provider, api_key: impl Into<String>) -> Self {
        Self {
            provider,
            api_key: api_key.into(),
            expert_model: None,
            parsing_model: None,
        }
    }

    /// Model used to answer questions. Blank input leaves it unset.
    pub fn expert_model(mut self, model: impl Into<String>) -> Self {
        self.expert_model = non_blank(model.into());
        self
    }

    /// Model used for deep-analysis page parsing. Blank input leaves it unset.
    pub fn parsing_model(mut self, model: impl Into<String>) -> Self {
        self.parsing_model = non_blank(model.into());
        self
    }
}

impl fmt::Debug for LlmCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LlmCredentials")
            .field("provider", &self.provider)
            .field("api_key", &"[REDACTED]")
            .field("expert_model", &self.expert_model)
            .field("parsing_model", &self.parsing_model)
            .finish()
    }
}

fn non_blank(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}

/// Store credentials on the backend.
///
/// Returns the confirmation text to show the user. An empty key is rejected
/// with [`ExplainError::MissingApiKey`] before anything is sent.
pub async fn save_credentials(
    client: &Client,
    config: &ClientConfig,
    credentials: &LlmCredentials,
) -> Result<String, ExplainError> {
    if credentials.api_key.is_empty() {
        return Err(ExplainError::MissingApiKey);
    }

    let url = config.credentials_url();
    info!("Saving {} credentials", credentials.provider);

    let response = client
        .post(&url)
        .timeout(config.connect_timeout())
        .json(credentials)
        .send()
        .await
        .map_err(|e| {
            warn!("Request to {} failed: {}", url, e);
            ExplainError::Transport {
                detail: e.to_string(),
            }
        })?;

    if !response.status().is_success() {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        warn!("Credential save rejected with HTTP {}", status);
        return Err(ExplainError::CredentialsRejected {
            message: credentials_failure_message(&body),
        });
    }

    Ok(MSG_CREDENTIALS_SAVED.to_string())
}

/// The body's `detail` when it is present and non-empty, otherwise the
/// generic failure text. Raw bodies are never shown here.
pub fn credentials_failure_message(body: &str) -> String {
    match serde_json::from_str::<Value>(body) {
        Ok(json) => match json.get("detail") {
            Some(Value::String(s)) if !s.is_empty() => s.clone(),
            Some(Value::Null) | Some(Value::String(_)) | None => MSG_CREDENTIALS_FAILED.to_string(),
            Some(other) => other.to_string(),
        },
        Err(_) => MSG_CREDENTIALS_FAILED.to_string(),
    }
}
