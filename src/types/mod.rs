//! Core data types

pub mod backend;
pub mod composition;
pub mod request;
pub mod task;

pub use backend::{BackendProfile, Dialect};
pub use composition::{
    ComposedImage, CompositionSpec, DEFAULT_CANVAS_MAX_HEIGHT, DEFAULT_CANVAS_MAX_WIDTH, Layout,
};
pub use request::{GenerationRequest, GenerationRequestBuilder, ResponseFormat, parse_size};
pub use task::{PollTask, TaskStatus};
