//! Recorder adapter seam
//!
//! The recording engine is external. The host wraps it in a
//! [`RecorderAdapter`] and reports engine callbacks through the
//! [`RecorderListener`] it was built with. Every adapter instance gets its own
//! listener, so callbacks from a discarded instance can be told apart from the
//! current one.

use crate::capture::permissions::PermissionToken;
use crate::capture::traits::VideoEncoder;
use crate::recorder::state::Configuration;
use crate::utils::error::{RecordResult, RecorderFailure};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;

/// Lifecycle callbacks emitted by the recording engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecorderEvent {
    Started,
    Paused,
    Resumed,
    /// Engine finished writing; carries the artifact path if the engine knows it
    Completed { output_file: Option<PathBuf> },
    Error(RecorderFailure),
}

/// Event as seen by the controller: tagged with the emitting adapter instance
pub(crate) type TaggedEvent = (u64, RecorderEvent);

/// Callback sink bound to exactly one adapter instance
#[derive(Debug, Clone)]
pub struct RecorderListener {
    instance: u64,
    tx: mpsc::UnboundedSender<TaggedEvent>,
}

impl RecorderListener {
    pub(crate) fn new(instance: u64, tx: mpsc::UnboundedSender<TaggedEvent>) -> Self {
        Self { instance, tx }
    }

    /// Identifier of the adapter instance this listener belongs to
    pub fn instance(&self) -> u64 {
        self.instance
    }

    pub fn on_start(&self) {
        self.emit(RecorderEvent::Started);
    }

    pub fn on_pause(&self) {
        self.emit(RecorderEvent::Paused);
    }

    pub fn on_resume(&self) {
        self.emit(RecorderEvent::Resumed);
    }

    pub fn on_complete(&self, output_file: Option<PathBuf>) {
        self.emit(RecorderEvent::Completed { output_file });
    }

    pub fn on_error(&self, code: i32, reason: Option<String>) {
        self.emit(RecorderEvent::Error(RecorderFailure::new(code, reason)));
    }

    fn emit(&self, event: RecorderEvent) {
        if self.tx.send((self.instance, event)).is_err() {
            tracing::debug!("Recorder event for instance {} dropped: controller gone", self.instance);
        }
    }
}

/// Wraps the external recording engine
///
/// `begin` is only valid after `arm`. `end` must not fail when the engine has
/// already stopped, and must still lead to a completion or error callback.
pub trait RecorderAdapter: Send {
    /// Pre-arm step; not renegotiated once capture has begun
    fn select_encoder(&mut self, encoder: &VideoEncoder);

    fn arm(&mut self, config: &Configuration, output_path: &Path) -> RecordResult<()>;

    fn begin(&mut self, token: PermissionToken) -> RecordResult<()>;

    fn end(&mut self) -> RecordResult<()>;
}

/// Builds adapter instances, each bound to the listener it is given
pub trait RecorderFactory: Send + Sync {
    fn create(&self, listener: RecorderListener) -> RecordResult<Box<dyn RecorderAdapter>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listener_tags_events_with_instance() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let listener = RecorderListener::new(3, tx);

        listener.on_start();
        listener.on_error(500, Some("encoder crash".into()));

        assert_eq!(rx.try_recv().unwrap(), (3, RecorderEvent::Started));
        let (instance, event) = rx.try_recv().unwrap();
        assert_eq!(instance, 3);
        assert_eq!(
            event,
            RecorderEvent::Error(RecorderFailure {
                code: 500,
                reason: "encoder crash".into()
            })
        );
    }

    #[test]
    fn test_emit_after_controller_dropped_is_silent() {
        let (tx, rx) = mpsc::unbounded_channel();
        let listener = RecorderListener::new(1, tx);
        drop(rx);
        listener.on_complete(None);
    }
}
