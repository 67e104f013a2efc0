//! Shared types for queue operations.

use std::time::Duration;

use thiserror::Error;

/// How long a blocking take may wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timeout {
    /// Wait until an item arrives, the queue completes, or the caller cancels.
    Infinite,
    /// Wait for at most the specified duration.
    Duration(Duration),
}

impl From<Duration> for Timeout {
    fn from(d: Duration) -> Self {
        Self::Duration(d)
    }
}

/// Errors returned by [`AsyncQueue`](crate::AsyncQueue) operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum QueueError {
    /// The queue was disposed before or during the operation.
    #[error("queue has been disposed")]
    Disposed,
    /// Adding has been completed: no item was accepted, or none will ever
    /// arrive for a single-item take.
    #[error("queue is closed: adding has been completed")]
    Closed,
    /// The caller's cancellation token fired while waiting.
    #[error("operation was canceled")]
    Canceled,
    /// Availability was claimed but no item was found in the store.
    ///
    /// This indicates a bug in the queue, not a caller error.
    #[error("internal invariant violated: claimed an item that was not enqueued")]
    InvariantViolated,
}

impl QueueError {
    /// Returns `true` if the caller's cancellation ended the operation.
    #[must_use]
    pub const fn is_canceled(&self) -> bool {
        matches!(self, Self::Canceled)
    }

    /// Returns `true` if the queue refused the operation because adding was
    /// completed.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        matches!(self, Self::Closed)
    }
}
