//! Resilient request executor
//!
//! Issues a [`RequestDescriptor`] through `reqwest`, consuming the body either
//! buffered (JSON) or streamed (SSE delta aggregation), and re-issues it under
//! the [`RetryPolicy`] when the failure is transient.

use futures_util::TryStreamExt;
use serde_json::Value;

use super::request::{
    LONG_LIVED_CONNECT_TIMEOUT, LONG_LIVED_TIMEOUT, RequestDescriptor, ResponseMode, TimeoutClass,
};
use crate::error::{ImageGenError, Result};
use crate::retry::{RetryExecutor, RetryPolicy};
use crate::streaming::aggregate_sse_text;
use crate::utils::cancel::CancelHandle;

/// Body of a successful call.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutorResponse {
    /// Buffered mode: parsed JSON body.
    Json(Value),
    /// Streaming mode: aggregated delta text.
    Text(String),
}

impl ExecutorResponse {
    pub fn into_json(self) -> Result<Value> {
        match self {
            Self::Json(value) => Ok(value),
            Self::Text(text) => Err(ImageGenError::invalid_response(format!(
                "expected a JSON body, got streamed text: {text}"
            ))),
        }
    }

    pub fn into_text(self) -> Result<String> {
        match self {
            Self::Text(text) => Ok(text),
            Self::Json(value) => Err(ImageGenError::invalid_response(format!(
                "expected streamed text, got JSON body: {value}"
            ))),
        }
    }
}

/// Pair of HTTP clients: one for ordinary calls, one with a bounded connect
/// phase for long-lived calls.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    long_lived_client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder().build()?;
        let long_lived_client = reqwest::Client::builder()
            .connect_timeout(LONG_LIVED_CONNECT_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            long_lived_client,
        })
    }

    pub fn with_clients(client: reqwest::Client, long_lived_client: reqwest::Client) -> Self {
        Self {
            client,
            long_lived_client,
        }
    }

    /// The client for ordinary calls (also used by the fetcher and cache).
    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    fn request(&self, descriptor: &RequestDescriptor) -> reqwest::RequestBuilder {
        let (client, timeout) = match descriptor.timeout {
            TimeoutClass::Ordinary(timeout) => (&self.client, timeout),
            TimeoutClass::LongLived => (&self.long_lived_client, LONG_LIVED_TIMEOUT),
        };
        let mut builder = client
            .request(descriptor.method.clone(), &descriptor.url)
            .headers(descriptor.headers.clone())
            .timeout(timeout);
        if let Some(body) = &descriptor.body {
            builder = builder.json(body);
        }
        builder
    }
}

/// Executes descriptors with bounded retry and exponential backoff.
#[derive(Debug, Clone)]
pub struct ResilientExecutor {
    transport: HttpTransport,
    retry: RetryExecutor,
}

impl ResilientExecutor {
    pub fn new(policy: RetryPolicy) -> Result<Self> {
        Ok(Self::with_transport(HttpTransport::new()?, policy))
    }

    pub fn with_transport(transport: HttpTransport, policy: RetryPolicy) -> Self {
        Self {
            transport,
            retry: RetryExecutor::new(policy),
        }
    }

    pub fn transport(&self) -> &HttpTransport {
        &self.transport
    }

    pub fn policy(&self) -> &RetryPolicy {
        self.retry.policy()
    }

    /// Issue `descriptor` up to `max_attempts` times.
    pub async fn execute_with_retry(
        &self,
        descriptor: &RequestDescriptor,
        max_attempts: u32,
        cancel: &CancelHandle,
    ) -> Result<ExecutorResponse> {
        self.retry
            .execute_with_attempts(max_attempts, cancel, || self.attempt(descriptor))
            .await
    }

    /// Issue `descriptor` with the policy's attempt budget.
    pub async fn execute(
        &self,
        descriptor: &RequestDescriptor,
        cancel: &CancelHandle,
    ) -> Result<ExecutorResponse> {
        self.execute_with_retry(descriptor, self.policy().max_attempts(), cancel)
            .await
    }

    /// Buffered call returning the parsed JSON body.
    pub async fn send_json(
        &self,
        descriptor: &RequestDescriptor,
        cancel: &CancelHandle,
    ) -> Result<Value> {
        let mut descriptor = descriptor.clone();
        descriptor.mode = ResponseMode::Buffered;
        self.execute(&descriptor, cancel).await?.into_json()
    }

    /// Streaming call returning the aggregated text.
    pub async fn send_stream(
        &self,
        descriptor: &RequestDescriptor,
        cancel: &CancelHandle,
    ) -> Result<String> {
        let mut descriptor = descriptor.clone();
        descriptor.mode = ResponseMode::Streaming;
        self.execute(&descriptor, cancel).await?.into_text()
    }

    async fn attempt(&self, descriptor: &RequestDescriptor) -> Result<ExecutorResponse> {
        let stream = descriptor.mode == ResponseMode::Streaming;
        tracing::debug!(
            target: "pixelrelay::http",
            method = %descriptor.method,
            url = %descriptor.url,
            stream,
            "sending request"
        );

        let response = self.transport.request(descriptor).send().await?;
        let status = response.status();
        tracing::debug!(
            target: "pixelrelay::http",
            url = %descriptor.url,
            status = status.as_u16(),
            "response received"
        );

        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ImageGenError::api_error(status.as_u16(), text));
        }

        match descriptor.mode {
            ResponseMode::Buffered => {
                let text = response.text().await?;
                let json: Value = serde_json::from_str(&text).map_err(|e| {
                    ImageGenError::ParseError(format!("{e}; body: {text}"))
                })?;
                Ok(ExecutorResponse::Json(json))
            }
            ResponseMode::Streaming => {
                let bytes = Box::pin(response.bytes_stream().map_err(ImageGenError::from));
                let text = aggregate_sse_text(bytes).await?;
                Ok(ExecutorResponse::Text(text))
            }
        }
    }
}
