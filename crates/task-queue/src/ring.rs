//! The bounded MPMC ring buffer backing the queue's FIFO of posted tasks.
//!
//! This buffer serves multiple producers and multiple consumers, so every
//! mutation — reserving slots, writing into them, publishing them, consuming
//! one — happens inside a single [`SpinLock`]-guarded critical section
//! rather than via independent CAS loops per cursor. Three monotonic `u64`
//! cursors describe the buffer's state: `dequeue_cursor` (next slot a
//! consumer will take), `allocated_cursor` (next slot reserved for a
//! producer), and `written_cursor` (one past the newest slot whose data is
//! visible to consumers). `written_cursor`'s `Release` store is the
//! publication fence a consumer's `Acquire` load synchronizes with.

use crate::invariants::{
    debug_assert_bounded_occupancy, debug_assert_monotonic_cursor, debug_assert_no_enqueue_after_stop,
};
use crate::spin_lock::SpinLock;
use crate::task::Task;
use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicU64, Ordering};

/// Outcome of a non-blocking batch enqueue attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    Success,
    /// The ring has no room for the whole batch. `allocated_cursor` is not
    /// advanced — the reservation is rejected before it is published, so a
    /// retry after a single slot frees up can succeed immediately (see the
    /// data model's Open Questions: either a check-before-commit or a
    /// commit-then-rollback policy is externally valid).
    Full,
    /// The lock was already held; this attempt made no progress.
    Contested,
}

/// Outcome of a non-blocking dequeue attempt.
#[derive(Debug, Clone, Copy)]
pub enum DequeueOutcome {
    Success(Task),
    Empty,
    /// The lock was already held; this attempt made no progress.
    Contested,
    /// The stop sentinel was observed. It is **not** consumed:
    /// `dequeue_cursor` does not advance, so every future poll (from any
    /// thread) sees `Stop` again.
    Stop,
}

/// Fixed-capacity, power-of-two-sized MPMC ring buffer of [`Task`] records.
pub(crate) struct RingBuffer {
    buffer: UnsafeCell<Box<[MaybeUninit<Task>]>>,
    mask: usize,
    capacity: u64,
    dequeue_cursor: AtomicU64,
    allocated_cursor: AtomicU64,
    written_cursor: AtomicU64,
    lock: SpinLock,
}

// SAFETY: all access to `buffer` happens with `lock` held, and `Task: Send`.
unsafe impl Sync for RingBuffer {}

impl RingBuffer {
    /// Builds a ring over a caller-supplied buffer, which must already be
    /// sized to a power of two (the crate's own construction path checks
    /// this in `Config`; a custom `BufferPool` is trusted to honor it).
    pub(crate) fn from_buffer(buffer: Box<[MaybeUninit<Task>]>) -> Self {
        let capacity = buffer.len();
        assert!(
            capacity.is_power_of_two(),
            "ring buffer capacity must be a power of two, got {capacity}"
        );
        Self {
            buffer: UnsafeCell::new(buffer),
            mask: capacity - 1,
            capacity: capacity as u64,
            dequeue_cursor: AtomicU64::new(0),
            allocated_cursor: AtomicU64::new(0),
            written_cursor: AtomicU64::new(0),
            lock: SpinLock::new(),
        }
    }

    pub(crate) fn capacity(&self) -> usize {
        self.capacity as usize
    }

    /// Consumes the ring and hands back its backing buffer, for
    /// `TaskQueue::dispose` to return to a `BufferPool`.
    pub(crate) fn into_buffer(self) -> Box<[MaybeUninit<Task>]> {
        self.buffer.into_inner()
    }

    /// Number of items currently occupying the ring, read without locking
    /// (a momentary snapshot — callers must not treat it as exact under
    /// concurrent producers/consumers).
    pub(crate) fn len(&self) -> usize {
        let written = self.written_cursor.load(Ordering::Acquire);
        let dequeue = self.dequeue_cursor.load(Ordering::Relaxed);
        written.wrapping_sub(dequeue) as usize
    }

    /// Single CAS attempt to acquire the lock and enqueue the whole of
    /// `tasks` as one batch. Empty input reports `Success` without taking
    /// the lock.
    pub(crate) fn try_enqueue(&self, tasks: &[Task]) -> EnqueueOutcome {
        if tasks.is_empty() {
            return EnqueueOutcome::Success;
        }
        if !self.lock.try_lock() {
            return EnqueueOutcome::Contested;
        }
        let outcome = self.enqueue_locked(tasks);
        self.lock.unlock();
        outcome
    }

    fn enqueue_locked(&self, tasks: &[Task]) -> EnqueueOutcome {
        let dequeue = self.dequeue_cursor.load(Ordering::Relaxed);
        let start = self.allocated_cursor.load(Ordering::Relaxed);
        debug_assert_no_enqueue_after_stop!(unsafe { self.slot_is_stop(start.wrapping_sub(1)) });

        let end = start + tasks.len() as u64;
        let occupied = end.wrapping_sub(dequeue);
        if occupied > self.capacity {
            // Reject before publishing `allocated_cursor` at all, rather
            // than committing the reservation and leaving it permanently
            // advanced (see the data model's Open Questions: either choice
            // is externally valid, but only the check-before-commit policy
            // lets a single freed slot unblock the very next retry).
            return EnqueueOutcome::Full;
        }
        debug_assert_bounded_occupancy!(occupied, self.capacity);
        self.allocated_cursor.store(end, Ordering::Relaxed);

        let ws = (start & self.mask as u64) as usize;
        let we = (end & self.mask as u64) as usize;
        // SAFETY: exclusive access while the lock is held; the two-segment
        // split below stays within `[0, capacity)` by construction.
        unsafe {
            let buf = &mut *self.buffer.get();
            if we > ws {
                for (i, task) in tasks.iter().enumerate() {
                    buf[ws + i] = MaybeUninit::new(*task);
                }
            } else {
                let first_len = self.capacity as usize - ws;
                for (i, task) in tasks[..first_len].iter().enumerate() {
                    buf[ws + i] = MaybeUninit::new(*task);
                }
                for (i, task) in tasks[first_len..].iter().enumerate() {
                    buf[i] = MaybeUninit::new(*task);
                }
            }
        }

        debug_assert_monotonic_cursor!("allocated_cursor", start, end);
        self.written_cursor.store(end, Ordering::Release);

        EnqueueOutcome::Success
    }

    /// SAFETY: caller must not read the slot unless it is known to hold a
    /// written record (i.e. its index lies in `[dequeue_cursor,
    /// written_cursor)`); only used here to peek at the previous slot for
    /// the enqueue-after-stop debug assertion.
    unsafe fn slot_is_stop(&self, cursor: u64) -> bool {
        let written = self.written_cursor.load(Ordering::Relaxed);
        if written == 0 || cursor.wrapping_add(1) != written {
            return false;
        }
        let idx = (cursor & self.mask as u64) as usize;
        let buf = &*self.buffer.get();
        buf[idx].assume_init_ref().is_stop()
    }

    /// Single CAS attempt to acquire the lock and dequeue the oldest item.
    pub(crate) fn try_dequeue(&self) -> DequeueOutcome {
        if !self.lock.try_lock() {
            return DequeueOutcome::Contested;
        }
        let outcome = self.dequeue_locked();
        self.lock.unlock();
        outcome
    }

    fn dequeue_locked(&self) -> DequeueOutcome {
        let dequeue = self.dequeue_cursor.load(Ordering::Relaxed);
        let written = self.written_cursor.load(Ordering::Acquire);

        if dequeue >= written {
            return DequeueOutcome::Empty;
        }

        let idx = (dequeue & self.mask as u64) as usize;
        // SAFETY: exclusive access while the lock is held; `idx` is in
        // bounds by construction, and slots in `[dequeue_cursor,
        // written_cursor)` are always initialized.
        let task = unsafe { *(*self.buffer.get())[idx].assume_init_ref() };

        if task.is_stop() {
            return DequeueOutcome::Stop;
        }

        let next_dequeue = dequeue + 1;
        debug_assert_monotonic_cursor!("dequeue_cursor", dequeue, next_dequeue);
        self.dequeue_cursor.store(next_dequeue, Ordering::Relaxed);

        DequeueOutcome::Success(task)
    }
}
