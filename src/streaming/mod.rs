//! Streaming support

pub mod aggregate;

pub use aggregate::{
    DONE_MARKER, StreamFrame, aggregate_sse_text, classify_frame, recover_error_frame,
};
