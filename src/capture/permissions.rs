//! Screen capture consent handling
//!
//! The OS consent dialog lives outside this crate. A [`ConsentHost`] presents
//! it and later feeds the answer back into a [`ConsentBroker`], either through
//! the modern result callback or through the legacy activity-result path.

use crate::utils::error::{RecordError, RecordResult};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::oneshot;

/// Request code used on the legacy activity-result path
pub const SCREEN_RECORD_REQUEST_CODE: i32 = 1000;

/// Result code the host reports when the user accepted the dialog
pub const RESULT_OK: i32 = -1;

/// Opaque grant handed to the recorder when capture begins
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionToken {
    pub result_code: i32,
    pub data: String,
}

/// Answer to a single consent request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PermissionOutcome {
    Granted(PermissionToken),
    /// Denied or cancelled by the user
    Denied,
}

/// Requests capture consent, yielding grant or deny exactly once per call
#[async_trait]
pub trait PermissionGateway: Send + Sync {
    async fn request_capture(&self) -> RecordResult<PermissionOutcome>;
}

/// How the host will report the dialog result back
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsentDelivery {
    /// Registered result callback; answer arrives via [`ConsentBroker::on_result`]
    ResultCallback,
    /// Legacy request-code callback; answer arrives via [`ConsentBroker::on_activity_result`]
    ActivityResult { request_code: i32 },
}

/// Host environment able to present the OS consent dialog
pub trait ConsentHost: Send + Sync {
    /// Whether a foreground window/activity exists to present from
    fn has_foreground_context(&self) -> bool;

    /// Whether the modern result-callback registration is available
    fn supports_result_callback(&self) -> bool;

    /// Present the dialog; the answer is delivered asynchronously
    fn present(&self, delivery: ConsentDelivery) -> Result<(), String>;
}

/// [`PermissionGateway`] over a host that reports results by callback
pub struct ConsentBroker {
    host: Arc<dyn ConsentHost>,
    pending: Mutex<Option<oneshot::Sender<PermissionOutcome>>>,
}

impl ConsentBroker {
    pub fn new(host: Arc<dyn ConsentHost>) -> Self {
        Self {
            host,
            pending: Mutex::new(None),
        }
    }

    /// Modern result-callback delivery. Returns whether a request consumed it.
    pub fn on_result(&self, result_code: i32, data: Option<String>) -> bool {
        let Some(tx) = self.pending.lock().take() else {
            tracing::debug!("Consent result {} arrived with no pending request", result_code);
            return false;
        };

        let outcome = match data {
            Some(data) if result_code == RESULT_OK && !data.is_empty() => {
                PermissionOutcome::Granted(PermissionToken { result_code, data })
            }
            _ => PermissionOutcome::Denied,
        };

        tracing::info!(
            "Capture consent {}",
            if matches!(outcome, PermissionOutcome::Granted(_)) { "granted" } else { "denied" }
        );
        if tx.send(outcome).is_err() {
            tracing::debug!("Consent requester went away before the result arrived");
        }
        true
    }

    /// Legacy activity-result delivery. Results for foreign request codes are ignored.
    pub fn on_activity_result(&self, request_code: i32, result_code: i32, data: Option<String>) -> bool {
        if request_code != SCREEN_RECORD_REQUEST_CODE {
            tracing::debug!("Ignoring activity result for request code {}", request_code);
            return false;
        }
        self.on_result(result_code, data)
    }

    /// Drop any outstanding request; its requester observes a deny
    pub fn abandon(&self) {
        if self.pending.lock().take().is_some() {
            tracing::warn!("Abandoning outstanding consent request");
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending.lock().is_some()
    }
}

#[async_trait]
impl PermissionGateway for ConsentBroker {
    async fn request_capture(&self) -> RecordResult<PermissionOutcome> {
        if !self.host.has_foreground_context() {
            return Err(RecordError::NoHostContext);
        }

        let (tx, rx) = oneshot::channel();
        if self.pending.lock().replace(tx).is_some() {
            tracing::warn!("Superseding an unanswered consent request");
        }

        let delivery = if self.host.supports_result_callback() {
            ConsentDelivery::ResultCallback
        } else {
            ConsentDelivery::ActivityResult {
                request_code: SCREEN_RECORD_REQUEST_CODE,
            }
        };

        tracing::debug!("Presenting capture consent dialog via {:?}", delivery);
        if let Err(e) = self.host.present(delivery) {
            self.pending.lock().take();
            return Err(RecordError::PermissionFailure(format!(
                "Error starting screen recording: {}",
                e
            )));
        }

        Ok(rx.await.unwrap_or(PermissionOutcome::Denied))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct FakeHost {
        foreground: bool,
        modern: bool,
        fail: bool,
        presented: Mutex<Vec<ConsentDelivery>>,
    }

    impl FakeHost {
        fn new(foreground: bool, modern: bool) -> Arc<Self> {
            Arc::new(Self {
                foreground,
                modern,
                fail: false,
                presented: Mutex::new(Vec::new()),
            })
        }
    }

    impl ConsentHost for FakeHost {
        fn has_foreground_context(&self) -> bool {
            self.foreground
        }

        fn supports_result_callback(&self) -> bool {
            self.modern
        }

        fn present(&self, delivery: ConsentDelivery) -> Result<(), String> {
            if self.fail {
                return Err("no projection service".into());
            }
            self.presented.lock().push(delivery);
            Ok(())
        }
    }

    async fn wait_until_pending(broker: &ConsentBroker) {
        while !broker.is_pending() {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_modern_grant() {
        let host = FakeHost::new(true, true);
        let broker = Arc::new(ConsentBroker::new(host.clone()));

        let requester = {
            let broker = broker.clone();
            tokio::spawn(async move { broker.request_capture().await })
        };
        wait_until_pending(&broker).await;

        assert!(broker.on_result(RESULT_OK, Some("projection".into())));
        // A second delivery for the same request is dropped
        assert!(!broker.on_result(RESULT_OK, Some("projection".into())));

        let outcome = requester.await.unwrap().unwrap();
        assert_eq!(
            outcome,
            PermissionOutcome::Granted(PermissionToken {
                result_code: RESULT_OK,
                data: "projection".into()
            })
        );
        assert_eq!(*host.presented.lock(), vec![ConsentDelivery::ResultCallback]);
    }

    #[tokio::test]
    async fn test_legacy_path_ignores_foreign_request_codes() {
        let host = FakeHost::new(true, false);
        let broker = Arc::new(ConsentBroker::new(host.clone()));

        let requester = {
            let broker = broker.clone();
            tokio::spawn(async move { broker.request_capture().await })
        };
        wait_until_pending(&broker).await;

        assert!(!broker.on_activity_result(42, RESULT_OK, Some("x".into())));
        assert!(broker.is_pending());
        assert!(broker.on_activity_result(SCREEN_RECORD_REQUEST_CODE, 0, None));

        assert_eq!(requester.await.unwrap().unwrap(), PermissionOutcome::Denied);
        assert_eq!(
            *host.presented.lock(),
            vec![ConsentDelivery::ActivityResult {
                request_code: SCREEN_RECORD_REQUEST_CODE
            }]
        );
    }

    #[tokio::test]
    async fn test_no_foreground_context() {
        let broker = ConsentBroker::new(FakeHost::new(false, true));
        assert!(matches!(
            broker.request_capture().await,
            Err(RecordError::NoHostContext)
        ));
        assert!(!broker.is_pending());
    }

    #[tokio::test]
    async fn test_present_failure() {
        let host = Arc::new(FakeHost {
            foreground: true,
            modern: true,
            fail: true,
            presented: Mutex::new(Vec::new()),
        });
        let broker = ConsentBroker::new(host);
        assert!(matches!(
            broker.request_capture().await,
            Err(RecordError::PermissionFailure(_))
        ));
        assert!(!broker.is_pending());
    }

    #[tokio::test]
    async fn test_abandoned_request_is_denied() {
        let broker = Arc::new(ConsentBroker::new(FakeHost::new(true, true)));
        let finished = Arc::new(AtomicBool::new(false));

        let requester = {
            let broker = broker.clone();
            let finished = finished.clone();
            tokio::spawn(async move {
                let outcome = broker.request_capture().await;
                finished.store(true, Ordering::SeqCst);
                outcome
            })
        };
        wait_until_pending(&broker).await;
        assert!(!finished.load(Ordering::SeqCst));

        broker.abandon();
        assert_eq!(requester.await.unwrap().unwrap(), PermissionOutcome::Denied);
    }
}
