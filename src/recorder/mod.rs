//! Recording session module
//!
//! This module implements the single-session recording lifecycle:
//! - RecorderAdapter trait wrapping the external recording engine
//! - RecordingController reconciling caller requests with engine callbacks
//! - Completion handles resolved exactly once per request

pub mod adapter;
pub mod completion;
pub mod config;
pub mod controller;
pub mod state;

pub use adapter::{RecorderAdapter, RecorderEvent, RecorderFactory, RecorderListener};
pub use completion::{Completer, CompletionHandle};
pub use config::{ControllerConfig, GalleryConfig, UnclaimedPolicy};
pub use controller::{Collaborators, RecordingController, SessionEvent};
pub use state::{
    CleanOutcome, Configuration, PublishedRecording, SessionState, SetupOptions, StartOutcome,
    StopResult,
};
