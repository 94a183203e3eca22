//! Backend dialect adapters
//!
//! One adapter per wire dialect. Each builds its request bodies, runs them
//! through the shared [`ResilientExecutor`] and reduces the response to a
//! single result URL (or `data:` URI).

pub mod async_poll;
pub mod chat_stream;
pub mod extract;
pub mod json;

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::{ImageGenError, Result};
use crate::execution::ResilientExecutor;
use crate::types::{BackendProfile, Dialect, GenerationRequest};
use crate::utils::cancel::CancelHandle;

pub use async_poll::{AsyncPollAdapter, PollSettings};
pub use chat_stream::ChatStreamAdapter;
pub use extract::{extract_image_url, extract_url_from_text, sanitize_url};
pub use json::JsonAdapter;

/// A backend wire dialect.
#[async_trait]
pub trait DialectAdapter: Send + Sync {
    fn dialect(&self) -> Dialect;

    fn supports_image_to_image(&self) -> bool {
        self.dialect().supports_image_to_image()
    }

    /// Text-to-image: one generation, result URL.
    async fn text_to_image(
        &self,
        request: &GenerationRequest,
        cancel: &CancelHandle,
    ) -> Result<String>;

    /// Image-to-image with `reference` as the source image.
    async fn image_to_image(
        &self,
        _request: &GenerationRequest,
        _reference: &[u8],
        _cancel: &CancelHandle,
    ) -> Result<String> {
        Err(ImageGenError::UnsupportedOperation(format!(
            "image-to-image is not available for the {} dialect",
            self.dialect()
        )))
    }

    /// Raw generation call returning the backend's JSON body untouched.
    async fn generate(
        &self,
        _request: &GenerationRequest,
        _cancel: &CancelHandle,
    ) -> Result<serde_json::Value> {
        Err(ImageGenError::UnsupportedOperation(format!(
            "raw generation is not available for the {} dialect",
            self.dialect()
        )))
    }
}

/// Build the adapter for the profile's (already fixed) dialect.
pub fn adapter_for(
    profile: Arc<BackendProfile>,
    executor: Arc<ResilientExecutor>,
) -> Arc<dyn DialectAdapter> {
    match profile.dialect {
        Dialect::Json => Arc::new(JsonAdapter::new(profile, executor)),
        Dialect::ChatStream => Arc::new(ChatStreamAdapter::new(profile, executor)),
        Dialect::AsyncPoll => Arc::new(AsyncPollAdapter::new(profile, executor)),
    }
}
