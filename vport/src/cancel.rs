//! Channel-scoped cooperative cancellation.
//!
//! Closing the channel cancels one shared token; every outstanding
//! operation observes it and drops its continuation instead of touching
//! session state that may already be torn down.

use tokio::sync::watch;

/// Cancellation origin owned by the session; fires every token once.
#[derive(Debug)]
pub(crate) struct CancelSource {
    tx: watch::Sender<bool>,
}

impl CancelSource {
    /// Creates an untriggered source.
    pub(crate) fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx }
    }

    /// Hands out a token observing this source.
    pub(crate) fn token(&self) -> CancelToken {
        CancelToken {
            rx: self.tx.subscribe(),
        }
    }

    /// Trips the source. Idempotent.
    pub(crate) fn cancel(&self) {
        let _ = self.tx.send(true);
    }
}

/// Cheaply clonable view of a [`CancelSource`].
#[derive(Debug, Clone)]
pub(crate) struct CancelToken {
    rx: watch::Receiver<bool>,
}

impl CancelToken {
    /// Returns whether the source has been tripped.
    pub(crate) fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once the source trips. A dropped source counts as
    /// cancelled: the session it belonged to no longer exists.
    pub(crate) async fn cancelled(&mut self) {
        let _ = self.rx.wait_for(|cancelled| *cancelled).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn token_observes_cancel() {
        let source = CancelSource::new();
        let mut token = source.token();
        assert!(!token.is_cancelled());
        source.cancel();
        assert!(token.is_cancelled());
        token.cancelled().await; // resolves immediately
    }

    #[tokio::test]
    async fn dropped_source_reads_as_cancelled() {
        let source = CancelSource::new();
        let mut token = source.token();
        drop(source);
        token.cancelled().await;
    }
}
