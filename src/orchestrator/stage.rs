//! Typed outcomes of a generation stage

use crate::error::{ImageGenError, Result};

/// How a stage ended and whether the orchestrator may continue.
#[derive(Debug)]
pub enum StageOutcome<T> {
    Success(T),
    /// Failed, but a later stage may still produce a result.
    Recoverable(ImageGenError),
    /// Failed; the call ends with this error.
    Terminal(ImageGenError),
}

impl<T> StageOutcome<T> {
    /// Image-to-image: every failure except cancellation is recoverable.
    pub fn image_to_image(result: Result<T>) -> Self {
        match result {
            Ok(value) => Self::Success(value),
            Err(e) if e.is_cancelled() => Self::Terminal(e),
            Err(e) => Self::Recoverable(e),
        }
    }

    /// Text-to-image is the last stage: every failure is terminal.
    pub fn text_to_image(result: Result<T>) -> Self {
        match result {
            Ok(value) => Self::Success(value),
            Err(e) => Self::Terminal(e),
        }
    }
}
