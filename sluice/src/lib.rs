//! Unbounded multi-producer multi-consumer queue for pipeline and worker code.
//!
//! The queue accepts items from any number of producer threads and hands them
//! out in FIFO order to consumers that either block the calling thread or
//! suspend an async task. Producers declare "no more items" once with
//! [`AsyncQueue::complete_adding`]; consumers then drain what is left and
//! observe end-of-stream. Every wait can be cut short by a caller-owned
//! [`CancellationToken`].
//!
//! # Example
//!
//! ```
//! use sluice::{AsyncQueue, CancellationToken};
//!
//! let queue = AsyncQueue::new();
//! let cancel = CancellationToken::new();
//!
//! queue.add(1).unwrap();
//! queue.add(2).unwrap();
//! queue.complete_adding().unwrap();
//!
//! let items: Vec<u32> = queue
//!     .consuming_iter(&cancel)
//!     .collect::<Result<_, _>>()
//!     .unwrap();
//! assert_eq!(items, vec![1, 2]);
//! assert!(queue.is_completed());
//! ```

pub mod sync;
pub mod trace;

#[doc(inline)]
pub use sync::async_queue::{AsyncQueue, ConsumingIter};

#[doc(inline)]
pub use sync::types::{QueueError, Timeout};

pub use trace::init_tracing;

// Re-export the cancellation token so callers don't need a direct tokio-util dependency
pub use tokio_util::sync::CancellationToken;
