//! HTTP request descriptors

use reqwest::Method;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;

use crate::error::{ImageGenError, Result};

/// Total timeout of streaming, image-to-image and async-poll submission calls.
pub const LONG_LIVED_TIMEOUT: Duration = Duration::from_secs(300);
/// Connect timeout of long-lived calls.
pub const LONG_LIVED_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// How the response body is consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseMode {
    /// Read the whole body and parse it as JSON.
    Buffered,
    /// Read an SSE body and aggregate delta text.
    Streaming,
}

/// Timeout budget of a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutClass {
    /// Ordinary call with a single total timeout.
    Ordinary(Duration),
    /// [`LONG_LIVED_TIMEOUT`] total with [`LONG_LIVED_CONNECT_TIMEOUT`] to connect.
    LongLived,
}

/// Everything needed to issue (and re-issue) one HTTP call.
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Option<serde_json::Value>,
    pub timeout: TimeoutClass,
    pub mode: ResponseMode,
}

impl RequestDescriptor {
    pub fn post_json(url: impl Into<String>, body: serde_json::Value) -> Self {
        Self {
            method: Method::POST,
            url: url.into(),
            headers: HeaderMap::new(),
            body: Some(body),
            timeout: TimeoutClass::LongLived,
            mode: ResponseMode::Buffered,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            url: url.into(),
            headers: HeaderMap::new(),
            body: None,
            timeout: TimeoutClass::LongLived,
            mode: ResponseMode::Buffered,
        }
    }

    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers.extend(headers);
        self
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Result<Self> {
        let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
            ImageGenError::ConfigurationError(format!("Invalid header name {name}: {e}"))
        })?;
        let header_value = HeaderValue::from_str(value).map_err(|e| {
            ImageGenError::ConfigurationError(format!("Invalid header value for {name}: {e}"))
        })?;
        self.headers.insert(header_name, header_value);
        Ok(self)
    }

    pub fn with_timeout(mut self, timeout: TimeoutClass) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn streaming(mut self) -> Self {
        self.mode = ResponseMode::Streaming;
        self
    }
}

/// `Authorization: Bearer <key>` and `Content-Type: application/json`.
pub fn bearer_json_headers(api_key: &SecretString) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    let mut auth = HeaderValue::from_str(&format!("Bearer {}", api_key.expose_secret()))
        .map_err(|e| ImageGenError::ConfigurationError(format!("Invalid API key: {e}")))?;
    auth.set_sensitive(true);
    headers.insert(AUTHORIZATION, auth);
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    Ok(headers)
}
