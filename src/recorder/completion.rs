//! Single-resolution completion handles
//!
//! A [`Completer`] is consumed by `resolve`/`reject`, so a pending request can
//! never be answered twice. The matching [`CompletionHandle`] is what the
//! caller awaits.

use crate::utils::error::{RecordError, RecordResult};
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::oneshot;

/// Producer side of an outstanding request
#[derive(Debug)]
pub struct Completer<T> {
    tx: oneshot::Sender<RecordResult<T>>,
}

impl<T> Completer<T> {
    pub fn resolve(self, value: T) {
        if self.tx.send(Ok(value)).is_err() {
            tracing::debug!("Completion handle dropped before resolution");
        }
    }

    pub fn reject(self, error: RecordError) {
        if let Err(Err(error)) = self.tx.send(Err(error)) {
            tracing::debug!("Completion handle dropped before rejection: {}", error);
        }
    }

    pub fn settle(self, result: RecordResult<T>) {
        match result {
            Ok(value) => self.resolve(value),
            Err(error) => self.reject(error),
        }
    }
}

/// Caller side of an outstanding request
#[derive(Debug)]
pub struct CompletionHandle<T> {
    rx: oneshot::Receiver<RecordResult<T>>,
}

impl<T> CompletionHandle<T> {
    /// Create a linked completer/handle pair
    pub fn pair() -> (Completer<T>, CompletionHandle<T>) {
        let (tx, rx) = oneshot::channel();
        (Completer { tx }, CompletionHandle { rx })
    }

    /// A handle that is already rejected
    pub fn rejected(error: RecordError) -> Self {
        let (completer, handle) = Self::pair();
        completer.reject(error);
        handle
    }

    /// Non-blocking check; `None` while the request is still outstanding
    pub fn try_result(&mut self) -> Option<RecordResult<T>> {
        match self.rx.try_recv() {
            Ok(result) => Some(result),
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => Some(Err(RecordError::SessionEnded)),
        }
    }
}

impl<T> Future for CompletionHandle<T> {
    type Output = RecordResult<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(RecordError::SessionEnded)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_resolve() {
        let (completer, handle) = CompletionHandle::pair();
        completer.resolve(7u32);
        assert_eq!(handle.await.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_rejected() {
        let handle = CompletionHandle::<()>::rejected(RecordError::NotInitialized);
        assert!(matches!(handle.await, Err(RecordError::NotInitialized)));
    }

    #[tokio::test]
    async fn test_dropped_completer_ends_session() {
        let (completer, mut handle) = CompletionHandle::<()>::pair();
        assert!(handle.try_result().is_none());
        drop(completer);
        assert!(matches!(handle.await, Err(RecordError::SessionEnded)));
    }
}
