//! Producer registration and the "adding completed" flag, packed in one word.
//!
//! # Layout
//!
//! ```text
//!  63                62 ............................................ 0
//! ┌──────────────────┬─────────────────────────────────────────────────┐
//! │ ADDING_COMPLETED │ number of add calls currently in flight          │
//! └──────────────────┴─────────────────────────────────────────────────┘
//! ```
//!
//! A producer registers by CAS-ing `word → word + 1` while the flag is clear,
//! and deregisters with a plain decrement once its item is visible. The
//! completer CAS-es `word → word | ADDING_COMPLETED` and then spins until the
//! count drains to zero. After that drain no producer is mid-push, so the
//! store can be inspected for emptiness without racing a late insert.

use std::sync::atomic::{AtomicUsize, Ordering};

use crossbeam_utils::{Backoff, CachePadded};

const ADDING_COMPLETED: usize = 1 << (usize::BITS - 1);
const ADDER_MASK: usize = !ADDING_COMPLETED;

pub(super) struct Adders {
    word: CachePadded<AtomicUsize>,
}

/// Registration held by an in-flight `add`; deregisters on drop.
pub(super) struct AdderGuard<'a> {
    adders: &'a Adders,
}

impl Drop for AdderGuard<'_> {
    fn drop(&mut self) {
        self.adders.word.fetch_sub(1, Ordering::SeqCst);
    }
}

impl Adders {
    pub(super) fn new() -> Self {
        Self {
            word: CachePadded::new(AtomicUsize::new(0)),
        }
    }

    /// Registers an in-flight add.
    ///
    /// Returns `None` once adding has been completed. In that case this call
    /// first waits for the completer's drain so that a refused producer never
    /// returns while accepted producers are still pushing.
    pub(super) fn register(&self) -> Option<AdderGuard<'_>> {
        let backoff = Backoff::new();
        loop {
            let word = self.word.load(Ordering::SeqCst);
            if word & ADDING_COMPLETED != 0 {
                self.wait_drained();
                return None;
            }
            if self
                .word
                .compare_exchange_weak(word, word + 1, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
            {
                return Some(AdderGuard { adders: self });
            }
            backoff.spin();
        }
    }

    /// Sets the completion flag and waits for in-flight adds to finish.
    ///
    /// Returns `true` only for the single call that set the flag. Every call,
    /// winner or not, returns after the drain.
    pub(super) fn complete(&self) -> bool {
        let backoff = Backoff::new();
        loop {
            let word = self.word.load(Ordering::SeqCst);
            if word & ADDING_COMPLETED != 0 {
                self.wait_drained();
                return false;
            }
            if self
                .word
                .compare_exchange_weak(
                    word,
                    word | ADDING_COMPLETED,
                    Ordering::SeqCst,
                    Ordering::SeqCst,
                )
                .is_ok()
            {
                self.wait_drained();
                return true;
            }
            backoff.spin();
        }
    }

    #[inline]
    pub(super) fn is_completed(&self) -> bool {
        self.word.load(Ordering::SeqCst) & ADDING_COMPLETED != 0
    }

    /// Completion flag set and no add left in flight.
    #[inline]
    pub(super) fn is_drained(&self) -> bool {
        self.word.load(Ordering::SeqCst) == ADDING_COMPLETED
    }

    #[inline]
    pub(super) fn in_flight(&self) -> usize {
        self.word.load(Ordering::SeqCst) & ADDER_MASK
    }

    fn wait_drained(&self) {
        let backoff = Backoff::new();
        while !self.is_drained() {
            backoff.snooze();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::AtomicBool;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_register_and_release() {
        let adders = Adders::new();
        let first = adders.register().unwrap();
        let second = adders.register().unwrap();
        assert_eq!(adders.in_flight(), 2);

        drop(first);
        assert_eq!(adders.in_flight(), 1);
        drop(second);
        assert_eq!(adders.in_flight(), 0);
        assert!(!adders.is_completed());
    }

    #[test]
    fn test_complete_is_won_once() {
        let adders = Adders::new();
        assert!(adders.complete());
        assert!(!adders.complete());
        assert!(adders.is_completed());
        assert_eq!(adders.in_flight(), 0);
    }

    #[test]
    fn test_register_refused_after_complete() {
        let adders = Adders::new();
        adders.complete();
        assert!(adders.register().is_none());
        assert_eq!(adders.in_flight(), 0);
    }

    #[test]
    fn test_complete_waits_for_in_flight_adder() {
        let adders = Arc::new(Adders::new());
        let guard_held = Arc::new(AtomicBool::new(true));

        let guard = adders.register().unwrap();

        let completer = {
            let adders = Arc::clone(&adders);
            let guard_held = Arc::clone(&guard_held);
            thread::spawn(move || {
                let won = adders.complete();
                // The drain must not finish while the guard is alive
                assert!(!guard_held.load(Ordering::SeqCst));
                won
            })
        };

        thread::sleep(Duration::from_millis(20));
        assert!(adders.is_completed());
        assert!(!adders.is_drained());
        assert_eq!(adders.in_flight(), 1);

        guard_held.store(false, Ordering::SeqCst);
        drop(guard);

        assert!(completer.join().unwrap());
        assert!(adders.is_drained());
        assert_eq!(adders.in_flight(), 0);
    }

    #[test]
    fn test_concurrent_register_and_complete() {
        let adders = Arc::new(Adders::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let adders = Arc::clone(&adders);
                thread::spawn(move || {
                    let mut accepted = 0usize;
                    while let Some(_guard) = adders.register() {
                        accepted += 1;
                        if accepted == 10_000 {
                            break;
                        }
                    }
                    accepted
                })
            })
            .collect();

        thread::sleep(Duration::from_millis(1));
        adders.complete();
        assert_eq!(adders.in_flight(), 0);

        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(adders.in_flight(), 0);
        assert!(adders.is_completed());
    }
}
