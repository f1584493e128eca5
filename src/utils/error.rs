//! Error types and handling
//!
//! Common error types used across the recording pipeline.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Failure reported by the recording engine through its error callback.
///
/// The code and reason are opaque to the controller and surfaced verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecorderFailure {
    pub code: i32,
    pub reason: String,
}

impl RecorderFailure {
    pub fn new(code: i32, reason: Option<String>) -> Self {
        Self {
            code,
            reason: reason.unwrap_or_else(|| "Unknown".to_string()),
        }
    }
}

/// Crate-wide error type
#[derive(Error, Debug)]
pub enum RecordError {
    #[error("{0}")]
    Conflict(String),

    #[error("Recorder not initialized")]
    NotInitialized,

    #[error("Permission request failed: {0}")]
    PermissionFailure(String),

    #[error("No current activity available")]
    NoHostContext,

    #[error("{}", .0.reason)]
    Recorder(RecorderFailure),

    #[error("Recorded file not found: {}", .0.display())]
    SourceMissing(PathBuf),

    #[error("Failed to create gallery entry: {0}")]
    EntryCreationFailed(String),

    #[error("Error saving to gallery: {0}")]
    CopyFailed(String),

    #[error("File path is null")]
    OutputPathMissing,

    #[error("Recording session ended before the request was resolved")]
    SessionEnded,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl RecordError {
    /// Wire code handed back to the host for this error.
    pub fn code(&self) -> String {
        match self {
            RecordError::Conflict(_) => "409".to_string(),
            RecordError::Recorder(failure) => failure.code.to_string(),
            _ => "404".to_string(),
        }
    }
}

impl From<serde_json::Error> for RecordError {
    fn from(error: serde_json::Error) -> Self {
        RecordError::Config(error.to_string())
    }
}

/// Error response for the host bridge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

impl From<RecordError> for ErrorResponse {
    fn from(error: RecordError) -> Self {
        ErrorResponse {
            code: error.code(),
            message: error.to_string(),
        }
    }
}

impl From<&RecordError> for ErrorResponse {
    fn from(error: &RecordError) -> Self {
        ErrorResponse {
            code: error.code(),
            message: error.to_string(),
        }
    }
}

/// Result type alias using RecordError
pub type RecordResult<T> = Result<T, RecordError>;
