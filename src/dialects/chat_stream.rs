//! Multimodal chat-completions dialect
//!
//! The backend answers a `stream: true` chat completion with SSE deltas whose
//! concatenated text contains the image URL.

use async_trait::async_trait;
use serde_json::{Map, Value, json};
use std::sync::Arc;

use super::DialectAdapter;
use super::extract::extract_url_from_text;
use crate::error::{ImageGenError, Result};
use crate::execution::{RequestDescriptor, ResilientExecutor, TimeoutClass, bearer_json_headers};
use crate::types::{BackendProfile, Dialect, GenerationRequest};
use crate::utils::cancel::CancelHandle;
use crate::utils::mime::image_data_uri;

pub struct ChatStreamAdapter {
    profile: Arc<BackendProfile>,
    executor: Arc<ResilientExecutor>,
}

impl ChatStreamAdapter {
    pub fn new(profile: Arc<BackendProfile>, executor: Arc<ResilientExecutor>) -> Self {
        Self { profile, executor }
    }

    /// Chat body with a single user message. A reference image turns the
    /// content into a text part plus an `image_url` part carrying a data URI.
    pub fn build_body(
        &self,
        request: &GenerationRequest,
        reference: Option<&[u8]>,
        stream: bool,
    ) -> Value {
        let content = match reference {
            Some(reference) => json!([
                {"type": "text", "text": request.prompt()},
                {"type": "image_url", "image_url": {"url": image_data_uri(reference)}},
            ]),
            None => json!(request.prompt()),
        };

        let mut body = Map::new();
        body.insert("model".into(), json!(self.profile.model));
        body.insert(
            "messages".into(),
            json!([{"role": "user", "content": content}]),
        );
        body.insert("stream".into(), json!(stream));
        for (key, value) in request.extra_params() {
            body.insert(key.clone(), value.clone());
        }
        Value::Object(body)
    }

    fn descriptor(&self, body: Value, timeout: TimeoutClass) -> Result<RequestDescriptor> {
        Ok(RequestDescriptor::post_json(self.profile.endpoint_url(), body)
            .with_headers(bearer_json_headers(&self.profile.api_key)?)
            .with_timeout(timeout))
    }

    async fn stream_url(&self, body: Value, cancel: &CancelHandle) -> Result<String> {
        let descriptor = self.descriptor(body, TimeoutClass::LongLived)?.streaming();
        let content = self.executor.send_stream(&descriptor, cancel).await?;
        extract_url_from_text(&content).ok_or_else(|| {
            ImageGenError::invalid_response(format!(
                "image API stream response missing URL: {content}"
            ))
        })
    }
}

#[async_trait]
impl DialectAdapter for ChatStreamAdapter {
    fn dialect(&self) -> Dialect {
        Dialect::ChatStream
    }

    async fn text_to_image(
        &self,
        request: &GenerationRequest,
        cancel: &CancelHandle,
    ) -> Result<String> {
        self.stream_url(self.build_body(request, None, true), cancel)
            .await
    }

    async fn image_to_image(
        &self,
        request: &GenerationRequest,
        reference: &[u8],
        cancel: &CancelHandle,
    ) -> Result<String> {
        self.stream_url(self.build_body(request, Some(reference), true), cancel)
            .await
    }

    async fn generate(&self, request: &GenerationRequest, cancel: &CancelHandle) -> Result<Value> {
        let descriptor = self.descriptor(
            self.build_body(request, None, false),
            TimeoutClass::Ordinary(self.profile.request_timeout),
        )?;
        self.executor.send_json(&descriptor, cancel).await
    }
}
