//! Plain JSON images dialect
//!
//! `POST {endpoint}` with `{model, prompt, size, n, response_format}` and a
//! `{data: [{url | b64_json}]}` response.

use async_trait::async_trait;
use serde_json::{Map, Value, json};
use std::sync::Arc;

use super::DialectAdapter;
use super::extract::extract_image_url;
use crate::error::{ImageGenError, Result};
use crate::execution::{RequestDescriptor, ResilientExecutor, TimeoutClass, bearer_json_headers};
use crate::types::{BackendProfile, Dialect, GenerationRequest, ResponseFormat};
use crate::utils::cancel::CancelHandle;
use crate::utils::mime::encode_base64;

pub struct JsonAdapter {
    profile: Arc<BackendProfile>,
    executor: Arc<ResilientExecutor>,
}

impl JsonAdapter {
    pub fn new(profile: Arc<BackendProfile>, executor: Arc<ResilientExecutor>) -> Self {
        Self { profile, executor }
    }

    /// Request body. With a reference image, `image` is added and a single
    /// URL result is requested. Extra params are merged last.
    pub fn build_body(&self, request: &GenerationRequest, reference: Option<&[u8]>) -> Value {
        let mut body = Map::new();
        body.insert("model".into(), json!(self.profile.model));
        body.insert("prompt".into(), json!(request.prompt()));
        body.insert("size".into(), json!(request.size()));
        body.insert("n".into(), json!(request.count()));
        body.insert(
            "response_format".into(),
            json!(request.response_format().as_str()),
        );
        if let Some(style) = request.style() {
            body.insert("style".into(), json!(style));
        }
        if let Some(reference) = reference {
            body.insert("image".into(), json!(encode_base64(reference)));
            body.insert("n".into(), json!(1));
            body.insert("response_format".into(), json!(ResponseFormat::Url.as_str()));
        }
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

    async fn post(&self, descriptor: RequestDescriptor, cancel: &CancelHandle) -> Result<String> {
        let body = self.executor.send_json(&descriptor, cancel).await?;
        extract_image_url(&body).ok_or_else(|| {
            ImageGenError::invalid_response(format!("image API response missing URL: {body}"))
        })
    }
}

#[async_trait]
impl DialectAdapter for JsonAdapter {
    fn dialect(&self) -> Dialect {
        Dialect::Json
    }

    async fn text_to_image(
        &self,
        request: &GenerationRequest,
        cancel: &CancelHandle,
    ) -> Result<String> {
        let descriptor = self.descriptor(
            self.build_body(request, None),
            TimeoutClass::Ordinary(self.profile.request_timeout),
        )?;
        self.post(descriptor, cancel).await
    }

    async fn image_to_image(
        &self,
        request: &GenerationRequest,
        reference: &[u8],
        cancel: &CancelHandle,
    ) -> Result<String> {
        let descriptor = self.descriptor(
            self.build_body(request, Some(reference)),
            TimeoutClass::LongLived,
        )?;
        self.post(descriptor, cancel).await
    }

    async fn generate(&self, request: &GenerationRequest, cancel: &CancelHandle) -> Result<Value> {
        let descriptor = self.descriptor(
            self.build_body(request, None),
            TimeoutClass::Ordinary(self.profile.request_timeout),
        )?;
        self.executor.send_json(&descriptor, cancel).await
    }
}
