use thiserror::Error;

/// HTTP statuses that mark a transient backend failure.
pub const RETRYABLE_STATUS_CODES: [u16; 6] = [408, 429, 500, 502, 503, 504];

/// Returns true when an HTTP status should be retried.
pub fn is_retryable_status(status: u16) -> bool {
    RETRYABLE_STATUS_CODES.contains(&status)
}

/// Coarse classification of an [`ImageGenError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Network failure, timeout or retryable HTTP status.
    Transient,
    /// Backend refused or produced something unusable; never retried.
    Terminal,
    /// Caller input cannot be processed (e.g. no images to compose).
    Validation,
    /// Local resource problem (missing file, path traversal, bad image bytes).
    Resource,
    /// The caller cancelled or the deadline elapsed.
    Cancelled,
}

/// Errors produced by the generation client, compositor and cache.
#[derive(Error, Debug, Clone)]
pub enum ImageGenError {
    /// Connection-level failure with no HTTP status.
    #[error("HTTP error: {0}")]
    HttpError(String),

    /// Request or read timed out.
    #[error("Timeout error: {0}")]
    TimeoutError(String),

    /// Backend answered with a non-success status.
    #[error("API error {code}: {message}")]
    ApiError { code: u16, message: String },

    /// The event stream carried an explicit error frame or could not be parsed.
    #[error("Stream error: {0}")]
    StreamError(String),

    /// Body was not valid JSON.
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Body parsed but a required field (url, task id, ...) is missing.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// An async-poll task reported failure.
    #[error("Task {task_id} failed: {details}")]
    TaskFailed { task_id: String, details: String },

    /// An async-poll task did not finish within the poll ceiling.
    #[error("Task {task_id} timed out after {polls} polls ({waited_secs}s)")]
    TaskTimedOut {
        task_id: String,
        polls: u32,
        waited_secs: u64,
    },

    /// Every attempt failed; `source` is the last underlying error.
    #[error("Request failed after {attempts} attempts: {source}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: Box<ImageGenError>,
    },

    /// The selected dialect cannot perform the operation.
    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    /// Settings are missing or malformed.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// Caller input rejected.
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Local file does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A static reference resolved outside the static root.
    #[error("Path traversal rejected: {0}")]
    PathTraversal(String),

    /// Image bytes could not be decoded or encoded.
    #[error("Image codec error: {0}")]
    ImageDecode(String),

    /// Local filesystem failure.
    #[error("IO error: {0}")]
    IoError(String),

    /// Cancellation was requested or the deadline elapsed.
    #[error("Cancelled: {0}")]
    Cancelled(String),
}

impl ImageGenError {
    pub fn api_error(code: u16, message: impl Into<String>) -> Self {
        Self::ApiError {
            code,
            message: message.into(),
        }
    }

    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::InvalidResponse(message.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::ValidationError(message.into())
    }

    /// HTTP status attached to this error, looking through `RetriesExhausted`.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::ApiError { code, .. } => Some(*code),
            Self::RetriesExhausted { source, .. } => source.status_code(),
            _ => None,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::HttpError(_) | Self::TimeoutError(_) => ErrorCategory::Transient,
            Self::ApiError { code, .. } if is_retryable_status(*code) => ErrorCategory::Transient,
            Self::ApiError { .. }
            | Self::StreamError(_)
            | Self::ParseError(_)
            | Self::InvalidResponse(_)
            | Self::TaskFailed { .. }
            | Self::TaskTimedOut { .. }
            | Self::RetriesExhausted { .. }
            | Self::UnsupportedOperation(_)
            | Self::ConfigurationError(_) => ErrorCategory::Terminal,
            Self::ValidationError(_) => ErrorCategory::Validation,
            Self::NotFound(_) | Self::PathTraversal(_) | Self::ImageDecode(_) | Self::IoError(_) => {
                ErrorCategory::Resource
            }
            Self::Cancelled(_) => ErrorCategory::Cancelled,
        }
    }

    /// Whether a fresh attempt of the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        self.category() == ErrorCategory::Transient
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_statuses_are_transient() {
        for code in RETRYABLE_STATUS_CODES {
            let err = ImageGenError::api_error(code, "busy");
            assert_eq!(err.category(), ErrorCategory::Transient);
            assert!(err.is_retryable());
        }
    }

    #[test]
    fn other_statuses_are_terminal() {
        for code in [400, 401, 403, 404, 422, 501] {
            let err = ImageGenError::api_error(code, "nope");
            assert_eq!(err.category(), ErrorCategory::Terminal);
            assert!(!err.is_retryable());
        }
    }

    #[test]
    fn network_failures_without_status_are_retryable() {
        assert!(ImageGenError::HttpError("connection reset".into()).is_retryable());
        assert!(ImageGenError::TimeoutError("read".into()).is_retryable());
        assert!(!ImageGenError::StreamError("boom".into()).is_retryable());
    }

    #[test]
    fn exhausted_error_exposes_last_status() {
        let err = ImageGenError::RetriesExhausted {
            attempts: 4,
            source: Box::new(ImageGenError::api_error(503, "unavailable")),
        };
        assert_eq!(err.status_code(), Some(503));
        assert!(!err.is_retryable());
        assert!(err.to_string().contains("after 4 attempts"));
    }
}
