//! Client configuration for talking to the analysis backend.
//!
//! All behaviour is controlled through [`ClientConfig`], built via its
//! [`ClientConfigBuilder`]. One struct keeps every knob shareable across
//! tasks and printable in logs (the observer is elided from `Debug`).

use crate::error::ExplainError;
use crate::observer::SharedObserver;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for an [`crate::explain::Explainer`].
///
/// # Example
/// ```rust
/// use pagelens::ClientConfig;
///
/// let config = ClientConfig::builder()
///     .backend_url("http://127.0.0.1:8000/")
///     .stream_idle_timeout_secs(120)
///     .build()
///     .unwrap();
/// assert_eq!(config.explain_url(), "http://127.0.0.1:8000/explain-page");
/// ```
#[derive(Clone)]
pub struct ClientConfig {
    /// Base URL of the analysis backend, without a trailing slash.
    /// Default: `http://localhost:8000`.
    pub backend_url: String,

    /// Route of the page-explanation endpoint. Default: `/explain-page`.
    pub explain_path: String,

    /// Route of the credential-save endpoint. Default: `/add-llm-keys`.
    pub credentials_path: String,

    /// TCP connect timeout in seconds. Default: 10.
    pub connect_timeout_secs: u64,

    /// Longest pause allowed between two body chunks, in seconds. Default: 600.
    ///
    /// The first token of a deep-analysis answer can take minutes while the
    /// backend parses the page with a model. Only silence is bounded; an
    /// answer that keeps streaming is never cut off.
    pub stream_idle_timeout_secs: u64,

    /// Explicit path to the pdfium shared library. If None, the loader looks
    /// in the working directory and then in the system library path.
    pub pdfium_library_path: Option<PathBuf>,

    /// Receives every conversation mutation as it happens.
    pub observer: Option<SharedObserver>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            backend_url: "http://localhost:8000".to_string(),
            explain_path: "/explain-page".to_string(),
            credentials_path: "/add-llm-keys".to_string(),
            connect_timeout_secs: 10,
            stream_idle_timeout_secs: 600,
            pdfium_library_path: None,
            observer: None,
        }
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("backend_url", &self.backend_url)
            .field("explain_path", &self.explain_path)
            .field("credentials_path", &self.credentials_path)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .field("stream_idle_timeout_secs", &self.stream_idle_timeout_secs)
            .field("pdfium_library_path", &self.pdfium_library_path)
            .field(
                "observer",
                &self.observer.as_ref().map(|_| "<dyn ConversationObserver>"),
            )
            .finish()
    }
}

impl ClientConfig {
    /// Create a new builder for `ClientConfig`.
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder {
            config: Self::default(),
        }
    }

    /// Full URL of the explanation endpoint.
    pub fn explain_url(&self) -> String {
        join_url(&self.backend_url, &self.explain_path)
    }

    /// Full URL of the credential-save endpoint.
    pub fn credentials_url(&self) -> String {
        join_url(&self.backend_url, &self.credentials_path)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn stream_idle_timeout(&self) -> Duration {
        Duration::from_secs(self.stream_idle_timeout_secs)
    }
}

fn join_url(base: &str, path: &str) -> String {
    if path.starts_with('/') {
        format!("{base}{path}")
    } else {
        format!("{base}/{path}")
    }
}

/// Builder for [`ClientConfig`].
#[derive(Debug)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    pub fn backend_url(mut self, url: impl Into<String>) -> Self {
        let url: String = url.into();
        self.config.backend_url = url.trim_end_matches('/').to_string();
        self
    }

    pub fn explain_path(mut self, path: impl Into<String>) -> Self {
        self.config.explain_path = path.into();
        self
    }

    pub fn credentials_path(mut self, path: impl Into<String>) -> Self {
        self.config.credentials_path = path.into();
        self
    }

    pub fn connect_timeout_secs(mut self, secs: u64) -> Self {
        self.config.connect_timeout_secs = secs;
        self
    }

    pub fn stream_idle_timeout_secs(mut self, secs: u64) -> Self {
        self.config.stream_idle_timeout_secs = secs;
        self
    }

    pub fn pdfium_library_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_library_path = Some(path.into());
        self
    }

    pub fn observer(mut self, observer: SharedObserver) -> Self {
        self.config.observer = Some(observer);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ClientConfig, ExplainError> {
        let c = &self.config;
        if !(c.backend_url.starts_with("http://") || c.backend_url.starts_with("https://")) {
            return Err(ExplainError::InvalidConfig(format!(
                "backend URL must start with http:// or https://, got '{}'",
                c.backend_url
            )));
        }
        if c.connect_timeout_secs == 0 {
            return Err(ExplainError::InvalidConfig(
                "connect timeout must be ≥ 1 second".into(),
            ));
        }
        if c.stream_idle_timeout_secs == 0 {
            return Err(ExplainError::InvalidConfig(
                "stream idle timeout must be ≥ 1 second".into(),
            ));
        }
        Ok(self.config)
    }
}
