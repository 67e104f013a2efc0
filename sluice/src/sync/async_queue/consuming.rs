//! Consuming adapters: drain the queue until adding completes.
//!
//! Unlike [`AsyncQueue::take`], reaching the end of a completed queue is a
//! normal termination here, not an error. A cancellation or disposal is
//! yielded once as `Err` and ends the sequence.

use std::iter::FusedIterator;

use futures::Stream;
use futures::stream;
use tokio_util::sync::CancellationToken;

use super::AsyncQueue;
use crate::sync::types::{QueueError, Timeout};

/// Blocking iterator returned by [`AsyncQueue::consuming_iter`].
#[must_use = "iterators are lazy and do nothing unless consumed"]
pub struct ConsumingIter<'a, T> {
    queue: &'a AsyncQueue<T>,
    cancel: &'a CancellationToken,
    finished: bool,
}

impl<T> Iterator for ConsumingIter<'_, T> {
    type Item = Result<T, QueueError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.queue.try_take(Timeout::Infinite, self.cancel) {
            Ok(Some(item)) => Some(Ok(item)),
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(err) => {
                self.finished = true;
                Some(Err(err))
            }
        }
    }
}

impl<T> FusedIterator for ConsumingIter<'_, T> {}

impl<T> AsyncQueue<T> {
    /// Returns an iterator that blocks for each item and ends once the queue
    /// is completed and empty.
    ///
    /// Several iterators may drain the same queue concurrently; each item is
    /// delivered to exactly one of them.
    pub fn consuming_iter<'a>(&'a self, cancel: &'a CancellationToken) -> ConsumingIter<'a, T> {
        ConsumingIter {
            queue: self,
            cancel,
            finished: false,
        }
    }

    /// Async counterpart of [`consuming_iter`](Self::consuming_iter).
    ///
    /// # Example
    ///
    /// ```
    /// use futures::StreamExt;
    /// use sluice::{AsyncQueue, CancellationToken};
    ///
    /// # futures::executor::block_on(async {
    /// let queue = AsyncQueue::new();
    /// let cancel = CancellationToken::new();
    /// queue.add("a").unwrap();
    /// queue.add("b").unwrap();
    /// queue.complete_adding().unwrap();
    ///
    /// let items: Vec<_> = queue.consuming_stream(&cancel).collect().await;
    /// assert_eq!(items, vec![Ok("a"), Ok("b")]);
    /// # });
    /// ```
    pub fn consuming_stream<'a>(
        &'a self,
        cancel: &'a CancellationToken,
    ) -> impl Stream<Item = Result<T, QueueError>> + 'a {
        stream::unfold(false, move |finished| async move {
            if finished {
                return None;
            }
            match self.try_take_async(cancel).await {
                Ok(Some(item)) => Some((Ok(item), false)),
                Ok(None) => None,
                Err(err) => Some((Err(err), true)),
            }
        })
    }
}
