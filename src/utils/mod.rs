//! Utility modules for pixelrelay

pub mod cancel;
pub mod mime;

pub use cancel::CancelHandle;
