//! Image fetcher
//!
//! Loads a reference image from the static root or over HTTP and decodes it
//! to RGB8.

use image::DynamicImage;
use std::time::Duration;

use super::run_blocking;
use super::storage::StaticRoot;
use crate::error::{ImageGenError, Result};
use crate::utils::cancel::CancelHandle;

/// Timeout of one remote image download.
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct ImageFetcher {
    client: reqwest::Client,
    storage: StaticRoot,
    timeout: Duration,
}

impl ImageFetcher {
    pub fn new(client: reqwest::Client, storage: StaticRoot) -> Self {
        Self {
            client,
            storage,
            timeout: FETCH_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn storage(&self) -> &StaticRoot {
        &self.storage
    }

    /// Fetch and decode `reference`; the result is always RGB8.
    pub async fn fetch(&self, reference: &str, cancel: &CancelHandle) -> Result<DynamicImage> {
        let bytes = self.fetch_bytes(reference, cancel).await?;
        run_blocking(move || {
            let image = image::load_from_memory(&bytes)?;
            Ok(DynamicImage::ImageRgb8(image.to_rgb8()))
        })
        .await
    }

    /// Raw bytes of `reference`.
    pub async fn fetch_bytes(&self, reference: &str, cancel: &CancelHandle) -> Result<Vec<u8>> {
        if let Some(path) = self.storage.resolve(reference) {
            return match cancel.guard(async { Ok(tokio::fs::read(&path).await?) }).await {
                Err(ImageGenError::NotFound(_)) => Err(ImageGenError::NotFound(format!(
                    "local image not found: {}",
                    path.display()
                ))),
                other => other,
            };
        }

        let url = reqwest::Url::parse(reference).map_err(|e| {
            ImageGenError::validation(format!("not a fetchable image reference '{reference}': {e}"))
        })?;

        tracing::debug!(target: "pixelrelay::fetch", url = %url, "downloading image");
        cancel
            .guard(async {
                let response = self.client.get(url).timeout(self.timeout).send().await?;
                let status = response.status();
                if !status.is_success() {
                    let text = response.text().await.unwrap_or_default();
                    return Err(ImageGenError::api_error(status.as_u16(), text));
                }
                Ok(response.bytes().await?.to_vec())
            })
            .await
    }
}
