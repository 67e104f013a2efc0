//! Synchronization primitives for in-process communication.
//!
//! This module provides the queue itself plus the building blocks it is made
//! of: a counting semaphore with async and blocking waits, and a small
//! executor that drives a wait future on the calling thread.

pub mod async_queue;
pub(crate) mod park;
pub(crate) mod semaphore;
pub mod types;
