//! Reference images: fetching, composing, storing and caching

pub mod cache;
pub mod compositor;
pub mod fetcher;
pub mod layout;
pub mod storage;

pub use cache::{ExternalImageCache, extension_for};
pub use compositor::ImageCompositor;
pub use fetcher::{FETCH_TIMEOUT, ImageFetcher};
pub use layout::{Placement, Size, Slot, fit_within, primary_strip, uniform_row};
pub use storage::{IMAGES_SUBDIR, STATIC_URL_PREFIX, StaticRoot};

use crate::error::Result;

/// Run codec or resampling work on the blocking pool so it does not stall
/// the async workers.
pub(crate) async fn run_blocking<T, F>(work: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work).await?
}
