//! Error Handling Module
//!
//! This module provides error handling for the image-generation core:
//! - Core error type (`ImageGenError`) and its `ErrorCategory`
//! - Retry classification (`is_retryable`, `is_retryable_status`)
//! - Conversions from the HTTP, JSON, IO and image codec error types
//!
//! # Example
//!
//! ```rust,ignore
//! use pixelrelay::error::{ImageGenError, ErrorCategory};
//!
//! let error = ImageGenError::api_error(404, "Not found");
//! assert_eq!(error.category(), ErrorCategory::Terminal);
//! assert!(!error.is_retryable());
//! ```

mod conversions;
pub mod types;

pub use types::*;

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, ImageGenError>;
