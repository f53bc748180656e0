use thiserror::Error;

/// Construction-time failure for a custom `BufferPool`.
///
/// This is the only `std::error::Error` type in the crate. Everything that
/// happens during normal operation — a full ring, a contested lock, an
/// exhausted continuation table — is an outcome a caller is expected to
/// handle inline (see `EnqueueOutcome`, `DequeueOutcome`, `AllocateOutcome`),
/// not an exception. `QueueError` exists only because a misbehaving
/// `BufferPool::acquire` is a programmer error in embedder code the queue
/// has no other way to surface before it corrupts a cursor invariant.
///
/// `Config` validation is not a `QueueError` variant: `Config::new` panics
/// on an invalid capacity, so a `Config` reaching `TaskQueue::with_pool` is
/// already known-valid.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("buffer pool returned {actual} elements, expected {expected}")]
    PoolBufferLengthMismatch { expected: usize, actual: usize },
}
