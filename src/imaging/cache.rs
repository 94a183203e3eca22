//! External image cache
//!
//! Copies a remote result image into the static root so that it outlives the
//! provider's short-lived URL.

use std::path::Path;
use std::time::Duration;

use super::storage::{STATIC_URL_PREFIX, StaticRoot};
use crate::error::{ImageGenError, Result};
use crate::utils::cancel::CancelHandle;

/// Timeout of [`ExternalImageCache::download_to`].
pub const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(120);
/// Extension used when neither the content type nor the URL names one.
pub const DEFAULT_EXTENSION: &str = ".png";

#[derive(Debug, Clone)]
pub struct ExternalImageCache {
    client: reqwest::Client,
    storage: StaticRoot,
    timeout: Duration,
}

impl ExternalImageCache {
    pub fn new(client: reqwest::Client, storage: StaticRoot, timeout: Duration) -> Self {
        Self {
            client,
            storage,
            timeout,
        }
    }

    pub fn storage(&self) -> &StaticRoot {
        &self.storage
    }

    /// Cache `url` locally and return its `/static/...` reference.
    ///
    /// Empty, local, `data:` and non-http(s) inputs are returned unchanged, as
    /// is the original URL whenever the download or write fails.
    pub async fn cache(&self, url: &str) -> String {
        self.cache_with_cancel(url, &CancelHandle::new()).await
    }

    pub async fn cache_with_cancel(&self, url: &str, cancel: &CancelHandle) -> String {
        if !is_cacheable(url) {
            return url.to_string();
        }
        match self.try_cache(url, cancel).await {
            Ok(reference) => reference,
            Err(e) => {
                tracing::warn!(
                    target: "pixelrelay::cache",
                    url,
                    err = %e,
                    "failed to cache external image, using original URL"
                );
                url.to_string()
            }
        }
    }

    async fn try_cache(&self, url: &str, cancel: &CancelHandle) -> Result<String> {
        let (bytes, content_type) = self.download(url, self.timeout, cancel).await?;
        let filename = format!(
            "{}{}",
            uuid::Uuid::new_v4().simple(),
            extension_for(content_type.as_deref(), url)
        );
        self.storage.save_image(&filename, &bytes).await
    }

    /// Download `url` to `path`, creating parent directories.
    ///
    /// A non-`image/*` content type is only logged; a non-success status is
    /// an error.
    pub async fn download_to(&self, url: &str, path: &Path, cancel: &CancelHandle) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tracing::info!(
            target: "pixelrelay::cache",
            url = %truncate(url, 100),
            path = %path.display(),
            "downloading image"
        );

        let (bytes, content_type) = self.download(url, DOWNLOAD_TIMEOUT, cancel).await?;
        match content_type.as_deref() {
            Some(ct) if ct.starts_with("image/") => {}
            other => {
                tracing::warn!(
                    target: "pixelrelay::cache",
                    url = %truncate(url, 100),
                    content_type = other.unwrap_or("<missing>"),
                    "downloaded content is not an image"
                );
            }
        }

        tokio::fs::write(path, &bytes).await?;
        tracing::info!(
            target: "pixelrelay::cache",
            path = %path.display(),
            bytes = bytes.len(),
            "image downloaded"
        );
        Ok(())
    }

    async fn download(
        &self,
        url: &str,
        timeout: Duration,
        cancel: &CancelHandle,
    ) -> Result<(Vec<u8>, Option<String>)> {
        cancel
            .guard(async {
                let response = self.client.get(url).timeout(timeout).send().await?;
                let status = response.status();
                if !status.is_success() {
                    let text = response.text().await.unwrap_or_default();
                    return Err(ImageGenError::api_error(status.as_u16(), text));
                }
                let content_type = response
                    .headers()
                    .get(reqwest::header::CONTENT_TYPE)
                    .and_then(|v| v.to_str().ok())
                    .map(normalize_content_type);
                let bytes = response.bytes().await?.to_vec();
                Ok((bytes, content_type))
            })
            .await
    }
}

fn is_cacheable(url: &str) -> bool {
    !url.is_empty()
        && !url.starts_with(STATIC_URL_PREFIX)
        && !url.starts_with("data:")
        && (url.starts_with("http://") || url.starts_with("https://"))
}

/// `image/png; charset=x` → `image/png`
fn normalize_content_type(value: &str) -> String {
    value
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// File extension (with dot) for a downloaded image.
///
/// Known image content types win; otherwise the URL path's suffix is used;
/// otherwise `.png`.
pub fn extension_for(content_type: Option<&str>, url: &str) -> String {
    let from_type = match content_type.map(normalize_content_type).as_deref() {
        Some("image/png") => Some(".png"),
        Some("image/jpeg") | Some("image/jpg") => Some(".jpg"),
        Some("image/webp") => Some(".webp"),
        Some("image/gif") => Some(".gif"),
        _ => None,
    };
    if let Some(ext) = from_type {
        return ext.to_string();
    }

    reqwest::Url::parse(url)
        .ok()
        .and_then(|parsed| {
            Path::new(parsed.path())
                .extension()
                .and_then(|ext| ext.to_str())
                .filter(|ext| !ext.is_empty())
                .map(|ext| format!(".{ext}"))
        })
        .unwrap_or_else(|| DEFAULT_EXTENSION.to_string())
}

fn truncate(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
