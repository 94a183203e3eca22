//! Generation orchestrator
//!
//! Runs one generation call through the configured dialect:
//! image-to-image first when a reference image is supplied and enabled, then
//! text-to-image. An image-to-image failure never fails the call.

pub mod stage;

use serde_json::Value;
use std::sync::Arc;

use crate::config::ImageSettings;
use crate::dialects::{AsyncPollAdapter, DialectAdapter, PollSettings, adapter_for};
use crate::error::Result;
use crate::execution::ResilientExecutor;
use crate::imaging::{ExternalImageCache, ImageCompositor};
use crate::types::{BackendProfile, CompositionSpec, Dialect, GenerationRequest};
use crate::utils::cancel::CancelHandle;

pub use stage::StageOutcome;

/// Image generation client for one backend.
#[derive(Clone)]
pub struct ImageGenerator {
    profile: Arc<BackendProfile>,
    executor: Arc<ResilientExecutor>,
    adapter: Arc<dyn DialectAdapter>,
    i2i_enabled: bool,
}

impl ImageGenerator {
    /// Build a generator from validated settings.
    pub fn new(settings: &ImageSettings) -> Result<Self> {
        let profile = settings.profile()?;
        let executor = ResilientExecutor::new(settings.retry_policy())?;
        Ok(Self::from_parts(profile, executor, settings.i2i_enabled))
    }

    pub fn from_parts(
        profile: BackendProfile,
        executor: ResilientExecutor,
        i2i_enabled: bool,
    ) -> Self {
        let profile = Arc::new(profile);
        let executor = Arc::new(executor);
        let adapter = adapter_for(profile.clone(), executor.clone());
        Self {
            profile,
            executor,
            adapter,
            i2i_enabled,
        }
    }

    /// Override the poll cadence of the async-poll dialect; no effect on
    /// other dialects.
    pub fn with_poll_settings(mut self, poll: PollSettings) -> Self {
        if self.profile.dialect == Dialect::AsyncPoll {
            self.adapter = Arc::new(
                AsyncPollAdapter::new(self.profile.clone(), self.executor.clone())
                    .with_poll_settings(poll),
            );
        }
        self
    }

    pub fn profile(&self) -> &BackendProfile {
        &self.profile
    }

    pub fn dialect(&self) -> Dialect {
        self.profile.dialect
    }

    pub fn executor(&self) -> &ResilientExecutor {
        &self.executor
    }

    pub fn i2i_enabled(&self) -> bool {
        self.i2i_enabled
    }

    /// Generate one image and return its URL (or `data:` URI).
    pub async fn generate_url(&self, request: &GenerationRequest) -> Result<String> {
        self.generate_url_with_cancel(request, &CancelHandle::new())
            .await
    }

    pub async fn generate_url_with_cancel(
        &self,
        request: &GenerationRequest,
        cancel: &CancelHandle,
    ) -> Result<String> {
        let dialect = self.dialect();

        if let Some(reference) = request.reference_image() {
            if !self.adapter.supports_image_to_image() {
                tracing::info!(
                    target: "pixelrelay::generate",
                    dialect = %dialect,
                    "reference image ignored: backend has no image-to-image support"
                );
            } else if !self.i2i_enabled {
                tracing::debug!(
                    target: "pixelrelay::generate",
                    "reference image ignored: image-to-image is disabled"
                );
            } else {
                let result = self.adapter.image_to_image(request, reference, cancel).await;
                match StageOutcome::image_to_image(result) {
                    StageOutcome::Success(url) => return Ok(url),
                    StageOutcome::Terminal(e) => return Err(e),
                    StageOutcome::Recoverable(e) => {
                        tracing::warn!(
                            target: "pixelrelay::generate",
                            dialect = %dialect,
                            err = %e,
                            "image-to-image failed, falling back to text-to-image"
                        );
                    }
                }
            }
        }

        let result = self.adapter.text_to_image(request, cancel).await;
        match StageOutcome::text_to_image(result) {
            StageOutcome::Success(url) => Ok(url),
            StageOutcome::Recoverable(e) | StageOutcome::Terminal(e) => Err(e),
        }
    }

    /// Raw generation call; the backend's JSON body is returned untouched.
    pub async fn generate(&self, request: &GenerationRequest) -> Result<Value> {
        self.adapter.generate(request, &CancelHandle::new()).await
    }

    /// Compose a reference image from `composition`, then generate with it.
    ///
    /// A composition failure degrades the call to text-to-image.
    pub async fn generate_url_from_composition(
        &self,
        request: &GenerationRequest,
        composition: &CompositionSpec,
        compositor: &ImageCompositor,
        cancel: &CancelHandle,
    ) -> Result<String> {
        let request = match compositor.compose(composition, cancel).await {
            Ok(composed) => request.with_reference_image(Some(composed.bytes)),
            Err(e) if e.is_cancelled() => return Err(e),
            Err(e) => {
                tracing::warn!(
                    target: "pixelrelay::generate",
                    err = %e,
                    "reference composition failed, falling back to text-to-image"
                );
                request.with_reference_image(None)
            }
        };
        self.generate_url_with_cancel(&request, cancel).await
    }

    /// Generate, then copy the result into the static root (best effort).
    pub async fn generate_and_cache(
        &self,
        request: &GenerationRequest,
        cache: &ExternalImageCache,
        cancel: &CancelHandle,
    ) -> Result<String> {
        let url = self.generate_url_with_cancel(request, cancel).await?;
        Ok(cache.cache_with_cancel(&url, cancel).await)
    }
}

impl std::fmt::Debug for ImageGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageGenerator")
            .field("profile", &self.profile)
            .field("dialect", &self.adapter.dialect())
            .field("i2i_enabled", &self.i2i_enabled)
            .finish()
    }
}
