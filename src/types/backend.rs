//! Backend profile and wire dialect selection

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ImageGenError;

/// Base URL marker of the async submit/poll provider.
pub const ASYNC_POLL_BASE_MARKER: &str = "modelscope";
/// Endpoint marker of the multimodal chat-completions dialect.
pub const CHAT_STREAM_ENDPOINT_MARKER: &str = "/chat/completions";

/// Wire dialect spoken by a generation backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Dialect {
    /// `{model, prompt, size, n, response_format}` → `{data: [{url|b64_json}]}`
    Json,
    /// Chat completions with `stream: true`, URL carried in the streamed text.
    ChatStream,
    /// Submit a task, then poll its status.
    AsyncPoll,
}

impl Dialect {
    /// Pick the dialect from configuration strings.
    ///
    /// Called once when the profile is built; the async-poll base URL marker
    /// takes precedence over the endpoint marker.
    pub fn detect(base_url: &str, endpoint_path: &str) -> Self {
        if base_url.to_lowercase().contains(ASYNC_POLL_BASE_MARKER) {
            Self::AsyncPoll
        } else if endpoint_path.contains(CHAT_STREAM_ENDPOINT_MARKER) {
            Self::ChatStream
        } else {
            Self::Json
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::ChatStream => "chat-stream",
            Self::AsyncPoll => "async-poll",
        }
    }

    pub const fn supports_image_to_image(self) -> bool {
        !matches!(self, Self::AsyncPoll)
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Dialect {
    type Err = ImageGenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "chat-stream" | "chat_stream" => Ok(Self::ChatStream),
            "async-poll" | "async_poll" => Ok(Self::AsyncPoll),
            other => Err(ImageGenError::ConfigurationError(format!(
                "Unknown dialect: {other}. Valid options: json, chat-stream, async-poll"
            ))),
        }
    }
}

/// Connection details of one generation backend. Read-only to the core.
#[derive(Debug, Clone)]
pub struct BackendProfile {
    pub base_url: String,
    pub endpoint_path: String,
    pub api_key: SecretString,
    pub model: String,
    pub dialect: Dialect,
    pub request_timeout: Duration,
}

impl BackendProfile {
    /// Full generation URL: base without trailing `/` plus endpoint with leading `/`.
    pub fn endpoint_url(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        if self.endpoint_path.starts_with('/') {
            format!("{base}{}", self.endpoint_path)
        } else {
            format!("{base}/{}", self.endpoint_path)
        }
    }

    /// Base URL without trailing `/`.
    pub fn trimmed_base_url(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }
}
