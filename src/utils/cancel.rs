//! Cancellation utilities
//!
//! Every suspension point of a generation or composition call (HTTP send,
//! body read, retry backoff, poll interval) runs through [`CancelHandle::guard`]
//! so that a caller can abort a hung backend or a slow stream.

use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::{ImageGenError, Result};

/// A handle that can be used to request cancellation, optionally with a deadline.
#[derive(Clone, Debug, Default)]
pub struct CancelHandle {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// A handle that also fires once `timeout` has elapsed from now.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            token: CancellationToken::new(),
            deadline: Some(Instant::now() + timeout),
        }
    }

    /// Same token, with a deadline added (the earlier one wins).
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        let deadline = match self.deadline {
            Some(existing) if existing < deadline => existing,
            _ => deadline,
        };
        Self {
            token: self.token.clone(),
            deadline: Some(deadline),
        }
    }

    /// Request cancellation. Futures observing this handle stop at their
    /// next suspension point; dropping them closes the HTTP connection.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled() || self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// A future that resolves when cancellation is requested.
    pub fn cancelled(&self) -> tokio_util::sync::WaitForCancellationFuture<'_> {
        self.token.cancelled()
    }

    /// Run `future` unless cancellation or the deadline fires first.
    pub async fn guard<F, T>(&self, future: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let deadline = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(ImageGenError::Cancelled("cancellation requested".into())),
            _ = deadline => Err(ImageGenError::Cancelled("deadline exceeded".into())),
            result = future => result,
        }
    }

    /// Cancellable `tokio::time::sleep`.
    pub async fn sleep(&self, duration: Duration) -> Result<()> {
        self.guard(async {
            tokio::time::sleep(duration).await;
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn guard_passes_through_result() {
        let handle = CancelHandle::new();
        let value = handle.guard(async { Ok(7) }).await.unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test]
    async fn cancelled_handle_short_circuits() {
        let handle = CancelHandle::new();
        handle.cancel();
        let err = handle
            .guard(std::future::pending::<Result<()>>())
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
        assert!(handle.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_interrupts_sleep() {
        let handle = CancelHandle::with_timeout(Duration::from_secs(1));
        let started = Instant::now();
        let err = handle.sleep(Duration::from_secs(60)).await.unwrap_err();
        assert!(matches!(err, ImageGenError::Cancelled(ref m) if m.contains("deadline")));
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn earlier_deadline_wins() {
        let now = Instant::now();
        let handle = CancelHandle::new().with_deadline(now + Duration::from_secs(5));
        let narrowed = handle.with_deadline(now + Duration::from_secs(10));
        assert_eq!(narrowed.deadline(), Some(now + Duration::from_secs(5)));
    }
}
