//! Record Screen - screen recording sessions, start to gallery.
//!
//! Drives a single screen recording session: capture consent, the recorder
//! lifecycle, and publishing the finished file into shared media storage.
//! The recording engine, consent dialog and media store are supplied by the
//! host through the traits in [`recorder`], [`capture`] and [`gallery`].

pub mod capture;
pub mod gallery;
pub mod recorder;
pub mod storage;
pub mod utils;

pub use recorder::{
    Collaborators, ControllerConfig, RecordingController, SessionEvent, SessionState,
    SetupOptions, StartOutcome, StopResult,
};
pub use utils::error::{ErrorResponse, RecordError, RecordResult};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing/logging for the host process
///
/// Honours `RUST_LOG`; safe to call more than once.
pub fn init_tracing() {
    let result = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "record_screen=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();

    if result.is_ok() {
        tracing::info!("Record Screen v{}", env!("CARGO_PKG_VERSION"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_tracing_twice() {
        init_tracing();
        init_tracing();
    }
}
