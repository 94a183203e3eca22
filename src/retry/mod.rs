//! Retry module
//! - policy.rs: retry policy (attempt budget, backoff schedule) and executor

pub mod policy;

pub use policy::*;
