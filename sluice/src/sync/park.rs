//! Drives a wait future to completion on the calling thread.
//!
//! Blocking takes reuse the same future as async takes; the only difference is
//! who polls it. Here the waker unparks the thread that is blocked in
//! [`block_on`], so every wake source the future registers with (semaphore,
//! completion signal, caller cancellation) can end the park.

use std::future::Future;
use std::pin::pin;
use std::sync::Arc;
use std::task::{Context, Poll, Wake, Waker};

use crossbeam_utils::sync::{Parker, Unparker};
use minstant::Instant;

struct ThreadWaker(Unparker);

impl Wake for ThreadWaker {
    fn wake(self: Arc<Self>) {
        self.0.unpark();
    }

    fn wake_by_ref(self: &Arc<Self>) {
        self.0.unpark();
    }
}

/// Polls `future` until it completes or `deadline` passes.
///
/// Returns `None` on timeout; the future is dropped unfinished, releasing any
/// registrations it holds. With no deadline the thread parks until woken.
pub(crate) fn block_on<F: Future>(future: F, deadline: Option<Instant>) -> Option<F::Output> {
    let parker = Parker::new();
    let waker = Waker::from(Arc::new(ThreadWaker(parker.unparker().clone())));
    let mut cx = Context::from_waker(&waker);
    let mut future = pin!(future);

    loop {
        if let Poll::Ready(output) = future.as_mut().poll(&mut cx) {
            return Some(output);
        }
        match deadline {
            None => parker.park(),
            Some(dl) => {
                let now = Instant::now();
                if now >= dl {
                    return None;
                }
                parker.park_timeout(dl.duration_since(now));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    use tokio::sync::oneshot;

    #[test]
    fn test_ready_future() {
        assert_eq!(block_on(async { 7 }, None), Some(7));
    }

    #[test]
    fn test_ready_future_ignores_elapsed_deadline() {
        assert_eq!(block_on(async { 7 }, Some(Instant::now())), Some(7));
    }

    #[test]
    fn test_wakes_from_other_thread() {
        let (tx, rx) = oneshot::channel();
        let sender = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            tx.send(42u32).unwrap();
        });

        let received = block_on(rx, None).unwrap();
        assert_eq!(received, Ok(42));
        sender.join().unwrap();
    }

    #[test]
    fn test_deadline_expires() {
        let (_tx, rx) = oneshot::channel::<u32>();
        let start = Instant::now();
        let result = block_on(rx, Some(Instant::now() + Duration::from_millis(30)));

        assert!(result.is_none());
        assert!(start.elapsed() >= Duration::from_millis(30));
    }
}
