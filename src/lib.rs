//! # pixelrelay - resilient image generation client
//!
//! pixelrelay talks to third-party image-generation backends that speak one of
//! three wire dialects, retries transient failures, aggregates streamed
//! output, and can build a composite reference image before an
//! image-to-image call.
//!
#![deny(unsafe_code)]

//! ## Features
//!
//! - **Dialects**: plain JSON images API, streaming multimodal chat
//!   completions, and an async submit/poll task API.
//! - **Resilience**: bounded retry with exponential backoff on transient
//!   statuses and network failures; cancellation at every await point.
//! - **Graceful degradation**: image-to-image failures fall back to
//!   text-to-image within the same call.
//! - **Composition**: primary-strip and uniform-row reference images.
//! - **Caching**: provider URLs copied into a local static root.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pixelrelay::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let settings = ImageSettings::from_env()?;
//!     let generator = ImageGenerator::new(&settings)?;
//!
//!     let request = GenerationRequest::builder("a lighthouse at dusk")
//!         .size("1024x1024")
//!         .build()?;
//!     let url = generator.generate_url(&request).await?;
//!     println!("{url}");
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod dialects;
pub mod error;
pub mod execution;
pub mod imaging;
pub mod orchestrator;
pub mod retry;
pub mod streaming;
pub mod telemetry;
pub mod types;
pub mod utils;

pub use config::ImageSettings;
pub use error::{ErrorCategory, ImageGenError, Result};
pub use orchestrator::ImageGenerator;

/// Commonly used items
pub mod prelude {
    pub use crate::config::ImageSettings;
    pub use crate::dialects::{DialectAdapter, PollSettings};
    pub use crate::error::{ErrorCategory, ImageGenError};
    pub use crate::execution::ResilientExecutor;
    pub use crate::imaging::{ExternalImageCache, ImageCompositor, ImageFetcher, StaticRoot};
    pub use crate::orchestrator::ImageGenerator;
    pub use crate::retry::RetryPolicy;
    pub use crate::types::{
        BackendProfile, ComposedImage, CompositionSpec, Dialect, GenerationRequest, Layout,
        ResponseFormat,
    };
    pub use crate::utils::CancelHandle;
}
