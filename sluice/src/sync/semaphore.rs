//! Counting semaphore tracking how many items can be claimed.
//!
//! Permits live in a single atomic word so that the zero-timeout probe never
//! touches the wait list. Waiters register through [`Semaphore::notified`],
//! which works the same whether the resulting future is awaited by an async
//! task or driven by [`park::block_on`](super::park::block_on).
//!
//! # Protocol
//!
//! A waiter must *enable* its `Notified` future before re-checking
//! [`Semaphore::try_acquire`]. `release` bumps the count first and notifies
//! second, so a waiter either sees the new permit on its re-check or is
//! already registered when the notification lands.

use std::sync::atomic::{AtomicUsize, Ordering};

use crossbeam_utils::CachePadded;
use tokio::sync::Notify;
use tokio::sync::futures::Notified;

pub(crate) struct Semaphore {
    permits: CachePadded<AtomicUsize>,
    notify: Notify,
}

impl Semaphore {
    pub(crate) fn new() -> Self {
        Self {
            permits: CachePadded::new(AtomicUsize::new(0)),
            notify: Notify::new(),
        }
    }

    /// Claims one permit without waiting.
    #[inline]
    pub(crate) fn try_acquire(&self) -> bool {
        let mut current = self.permits.load(Ordering::Acquire);
        loop {
            if current == 0 {
                return false;
            }
            match self.permits.compare_exchange_weak(
                current,
                current - 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
    }

    /// Adds one permit and wakes at most one waiter.
    ///
    /// If nobody is waiting, the wakeup is stored and consumed by the next
    /// registration.
    #[inline]
    pub(crate) fn release(&self) {
        self.permits.fetch_add(1, Ordering::Release);
        self.notify.notify_one();
    }

    /// Wakes every currently registered waiter without adding permits.
    pub(crate) fn wake_all(&self) {
        self.notify.notify_waiters();
    }

    /// Drops all outstanding permits, returning how many there were.
    pub(crate) fn drain(&self) -> usize {
        self.permits.swap(0, Ordering::AcqRel)
    }

    #[inline]
    pub(crate) fn available(&self) -> usize {
        self.permits.load(Ordering::Acquire)
    }

    /// Returns a wait registration; call `enable` on it before re-checking
    /// [`try_acquire`](Self::try_acquire).
    pub(crate) fn notified(&self) -> Notified<'_> {
        self.notify.notified()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::pin::pin;
    use std::sync::Arc;
    use std::thread;

    use futures::FutureExt;

    #[test]
    fn test_acquire_release() {
        let sem = Semaphore::new();
        assert!(!sem.try_acquire());

        sem.release();
        sem.release();
        assert_eq!(sem.available(), 2);

        assert!(sem.try_acquire());
        assert!(sem.try_acquire());
        assert!(!sem.try_acquire());
        assert_eq!(sem.available(), 0);
    }

    #[test]
    fn test_drain() {
        let sem = Semaphore::new();
        for _ in 0..5 {
            sem.release();
        }
        assert_eq!(sem.drain(), 5);
        assert!(!sem.try_acquire());
    }

    #[test]
    fn test_release_wakes_enabled_waiter() {
        let sem = Semaphore::new();
        let mut notified = pin!(sem.notified());
        notified.as_mut().enable();

        assert!(notified.as_mut().now_or_never().is_none());
        sem.release();
        assert!(notified.as_mut().now_or_never().is_some());
        assert!(sem.try_acquire());
    }

    #[test]
    fn test_wake_all_reaches_every_waiter() {
        let sem = Semaphore::new();
        let mut first = pin!(sem.notified());
        let mut second = pin!(sem.notified());
        first.as_mut().enable();
        second.as_mut().enable();

        sem.wake_all();

        assert!(first.now_or_never().is_some());
        assert!(second.now_or_never().is_some());
        assert_eq!(sem.available(), 0);
    }

    #[test]
    fn test_concurrent_acquire_never_oversubscribes() {
        let sem = Arc::new(Semaphore::new());
        let permits = 1000;
        for _ in 0..permits {
            sem.release();
        }

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let sem = Arc::clone(&sem);
                thread::spawn(move || {
                    let mut claimed = 0usize;
                    while sem.try_acquire() {
                        claimed += 1;
                    }
                    claimed
                })
            })
            .collect();

        let total: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(total, permits);
    }
}
