//! Shared utilities

pub mod error;

pub use error::{ErrorResponse, RecordError, RecordResult, RecorderFailure};
