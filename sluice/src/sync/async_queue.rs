//! Unbounded MPMC queue with blocking and async takes.
//!
//! # Overview
//!
//! - [`AsyncQueue::add`] - enqueue from any thread, lock-free
//! - [`AsyncQueue::take`] / [`AsyncQueue::try_take`] - blocking dequeue
//! - [`AsyncQueue::take_async`] - suspending dequeue
//! - [`AsyncQueue::complete_adding`] - declare that no more items will arrive
//! - [`AsyncQueue::consuming_iter`] / [`AsyncQueue::consuming_stream`] -
//!   drain until completion
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use std::thread;
//!
//! use sluice::{AsyncQueue, CancellationToken};
//!
//! let queue = Arc::new(AsyncQueue::new());
//! let cancel = CancellationToken::new();
//!
//! let producer = {
//!     let queue = Arc::clone(&queue);
//!     thread::spawn(move || {
//!         for i in 0..100u64 {
//!             queue.add(i).unwrap();
//!         }
//!         queue.complete_adding().unwrap();
//!     })
//! };
//!
//! let sum: u64 = queue.consuming_iter(&cancel).map(Result::unwrap).sum();
//! producer.join().unwrap();
//! assert_eq!(sum, 4950);
//! ```
//!
//! # Structure
//!
//! ```text
//!   add ──► [adders word] ──► SegQueue::push ──► Semaphore::release ──┐
//!                                                                     │ wake one
//!   take ─► probe ─► wait { permit | completion | cancel | deadline } ◄┘
//!                       │
//!                       └─► Semaphore::try_acquire ──► SegQueue::pop
//! ```
//!
//! An item is pushed before its permit is released, and a permit is claimed
//! before the matching pop, so a consumer holding a permit always finds an
//! item.

mod adders;
mod consuming;

use std::fmt;
use std::pin::pin;
use std::sync::atomic::{AtomicBool, Ordering};

use crossbeam_queue::SegQueue;
use minstant::Instant;
use tokio_util::sync::CancellationToken;

use super::park;
use super::semaphore::Semaphore;
use super::types::{QueueError, Timeout};
use crate::trace::{debug, error, trace};

use adders::Adders;

pub use consuming::ConsumingIter;

/// Unbounded FIFO queue shared by many producers and many consumers.
///
/// Share it through a reference or an [`Arc`](std::sync::Arc); every method
/// takes `&self`.
pub struct AsyncQueue<T> {
    items: SegQueue<T>,
    available: Semaphore,
    adders: Adders,
    /// Fired once, when adding completes while the store is empty.
    completed: CancellationToken,
    disposed: AtomicBool,
}

impl<T> AsyncQueue<T> {
    /// Creates an empty queue that accepts items.
    #[must_use]
    pub fn new() -> Self {
        Self {
            items: SegQueue::new(),
            available: Semaphore::new(),
            adders: Adders::new(),
            completed: CancellationToken::new(),
            disposed: AtomicBool::new(false),
        }
    }

    /// Enqueues an item and wakes one waiting consumer.
    ///
    /// # Errors
    ///
    /// - [`QueueError::Closed`] if [`complete_adding`](Self::complete_adding)
    ///   was called
    /// - [`QueueError::Disposed`] if the queue was disposed
    pub fn add(&self, item: T) -> Result<(), QueueError> {
        self.enqueue(item).map_err(|(_, err)| err)
    }

    /// Enqueues an item, handing it back if the queue no longer accepts items.
    ///
    /// # Errors
    ///
    /// Returns `Err(item)` if adding was completed or the queue was disposed.
    pub fn try_add(&self, item: T) -> Result<(), T> {
        self.enqueue(item).map_err(|(item, _)| item)
    }

    fn enqueue(&self, item: T) -> Result<(), (T, QueueError)> {
        if self.is_disposed() {
            return Err((item, QueueError::Disposed));
        }
        let Some(_adder) = self.adders.register() else {
            trace!("add refused: adding completed");
            return Err((item, QueueError::Closed));
        };
        self.items.push(item);
        self.available.release();
        Ok(())
    }

    /// Declares that no more items will be added.
    ///
    /// Waits for adds that were already in flight to finish enqueuing, so an
    /// item accepted before this call is never lost. Idempotent: later calls
    /// return once the first call's drain is over.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Disposed`] if the queue was disposed.
    pub fn complete_adding(&self) -> Result<(), QueueError> {
        self.ensure_live()?;
        if !self.adders.complete() {
            return Ok(());
        }
        if self.items.is_empty() {
            debug!("adding completed on an empty queue, signalling completion");
            self.completed.cancel();
        } else {
            debug!(remaining = self.items.len(), "adding completed, items remain");
        }
        Ok(())
    }

    /// Removes the oldest item, blocking until one arrives.
    ///
    /// # Errors
    ///
    /// - [`QueueError::Closed`] if the queue is completed and empty
    /// - [`QueueError::Canceled`] if `cancel` fires first
    /// - [`QueueError::Disposed`] if the queue was disposed
    pub fn take(&self, cancel: &CancellationToken) -> Result<T, QueueError> {
        self.try_take(Timeout::Infinite, cancel)?.ok_or(QueueError::Closed)
    }

    /// Removes the oldest item, blocking for at most `timeout`.
    ///
    /// Returns `Ok(None)` if the queue is completed and empty, or if the
    /// timeout elapsed first.
    ///
    /// # Errors
    ///
    /// - [`QueueError::Canceled`] if `cancel` fires first
    /// - [`QueueError::Disposed`] if the queue was disposed
    pub fn try_take(
        &self,
        timeout: impl Into<Timeout>,
        cancel: &CancellationToken,
    ) -> Result<Option<T>, QueueError> {
        let deadline = match timeout.into() {
            Timeout::Infinite => None,
            // A deadline past the clock's range is as good as none.
            Timeout::Duration(d) => Instant::now().checked_add(d),
        };
        park::block_on(self.claim(cancel), deadline).unwrap_or_else(|| {
            trace!("take timed out");
            Ok(None)
        })
    }

    /// Removes the oldest item, suspending the task until one arrives.
    ///
    /// # Errors
    ///
    /// Same as [`take`](Self::take).
    pub async fn take_async(&self, cancel: &CancellationToken) -> Result<T, QueueError> {
        self.claim(cancel).await?.ok_or(QueueError::Closed)
    }

    /// Like [`take_async`](Self::take_async), but reports end-of-stream as
    /// `Ok(None)` instead of an error.
    ///
    /// # Errors
    ///
    /// - [`QueueError::Canceled`] if `cancel` fires first
    /// - [`QueueError::Disposed`] if the queue was disposed
    pub async fn try_take_async(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Option<T>, QueueError> {
        self.claim(cancel).await
    }

    /// Claim routine shared by every take.
    ///
    /// Blocking callers drive it with [`park::block_on`], async callers await
    /// it. The `select!` is the only suspension point.
    async fn claim(&self, cancel: &CancellationToken) -> Result<Option<T>, QueueError> {
        loop {
            // Register before checking so a release or wake-all between the
            // checks and the select is not missed.
            let mut notified = pin!(self.available.notified());
            notified.as_mut().enable();

            self.ensure_live()?;
            if cancel.is_cancelled() {
                return Err(QueueError::Canceled);
            }
            if self.is_completed() {
                return Ok(None);
            }
            if self.available.try_acquire() {
                return self.pop_claimed().map(Some);
            }

            tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    trace!("take canceled while waiting");
                    return Err(QueueError::Canceled);
                }
                () = self.completed.cancelled() => return Ok(None),
                () = &mut notified => {}
            }
        }
    }

    fn pop_claimed(&self) -> Result<T, QueueError> {
        let Some(item) = self.items.pop() else {
            if self.is_disposed() {
                return Err(QueueError::Disposed);
            }
            error!(
                available = self.available.available(),
                "claimed availability but the item store is empty"
            );
            return Err(QueueError::InvariantViolated);
        };
        if self.is_completed() {
            // The completion signal only fires for a queue that was empty when
            // adding completed. Waiters that slept through the last items are
            // woken here to observe completion.
            self.available.wake_all();
        }
        Ok(item)
    }

    /// Returns `true` once adding is completed, every add accepted before
    /// that has finished enqueuing, and every item has been claimed.
    #[inline]
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.adders.is_drained() && self.available.available() == 0
    }

    /// Returns `true` once [`complete_adding`](Self::complete_adding) has set
    /// the completion flag, even if in-flight adds are still draining.
    #[inline]
    #[must_use]
    pub fn is_adding_completed(&self) -> bool {
        self.adders.is_completed()
    }

    /// Number of items that can currently be claimed.
    ///
    /// A snapshot: it may be stale as soon as it is read.
    #[inline]
    #[must_use]
    pub fn count(&self) -> usize {
        self.available.available()
    }

    /// Returns `true` once [`dispose`](Self::dispose) has been called.
    #[inline]
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// Tears the queue down: drops any items still enqueued and wakes every
    /// waiter, which then fails with [`QueueError::Disposed`].
    ///
    /// Idempotent. Disposing while producers or consumers are active is safe
    /// but their outcome is unspecified; dispose after they have quiesced.
    /// Dropping the queue releases the same resources.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.available.drain();
        while self.items.pop().is_some() {}
        self.available.wake_all();
        debug!("queue disposed");
    }

    fn ensure_live(&self) -> Result<(), QueueError> {
        if self.is_disposed() {
            Err(QueueError::Disposed)
        } else {
            Ok(())
        }
    }
}

impl<T> Default for AsyncQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for AsyncQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncQueue")
            .field("count", &self.count())
            .field("adders_in_flight", &self.adders.in_flight())
            .field("adding_completed", &self.is_adding_completed())
            .field("completed", &self.is_completed())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}
