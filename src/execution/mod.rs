//! Execution layer
//!
//! HTTP plumbing shared by every dialect: request descriptors, the
//! two-client transport and the retrying executor.

pub mod executor;
pub mod request;

pub use executor::{ExecutorResponse, HttpTransport, ResilientExecutor};
pub use request::{
    LONG_LIVED_CONNECT_TIMEOUT, LONG_LIVED_TIMEOUT, RequestDescriptor, ResponseMode, TimeoutClass,
    bearer_json_headers,
};
