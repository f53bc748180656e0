//! The continuation table: a version-tagged slot allocator tracking
//! in-flight parallel-for calls so their completion callback fires exactly
//! once, and so a stale or reused handle can be detected rather than acted
//! on.

use crate::invariants::{
    debug_assert_counter_not_underflowed, debug_assert_handle_in_range,
    debug_assert_no_version_wrap,
};
use crate::pool::IdPool;
use crate::spin_lock::SpinLock;
use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicI32, AtomicU64, Ordering};

/// Invoked once a continuation's remaining count hits zero, with the
/// `user_id` supplied at allocation time and the `worker_index` of whichever
/// worker happened to run the final wrapped task.
pub type CompletionCallback = extern "C" fn(user_id: u64, context: *mut (), worker_index: i32);

const INITIALIZED_BIT: u32 = 1 << 31;
const VERSION_MASK: u32 = INITIALIZED_BIT - 1;

/// A handle to an in-flight continuation: a slot index plus the version it
/// was allocated with, packed into a single `u64` (`index` in the high 32
/// bits, `encoded_version` in the low 32) so it travels through a `Task`'s
/// `context` pointer without a heap allocation.
///
/// The high bit of `encoded_version` is the initialized bit, existing purely
/// so the all-zero handle has a meaningful "uninitialized" reading distinct
/// from slot 0 / version 0; it plays no role in the stale-handle check
/// itself, which compares index + low-31-bits version against the slot's
/// live version.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct ContinuationHandle(u64);

impl ContinuationHandle {
    const fn new(index: u32, version: u32) -> Self {
        let encoded_version = (version & VERSION_MASK) | INITIALIZED_BIT;
        Self(((index as u64) << 32) | encoded_version as u64)
    }

    /// The distinguished Null handle: uninitialized, refers to no slot.
    #[must_use]
    pub const fn invalid() -> Self {
        Self(0)
    }

    #[must_use]
    pub const fn is_initialized(&self) -> bool {
        (self.encoded_version() & INITIALIZED_BIT) != 0
    }

    pub(crate) const fn index(&self) -> usize {
        (self.0 >> 32) as usize
    }

    const fn encoded_version(&self) -> u32 {
        (self.0 & 0xFFFF_FFFF) as u32
    }

    pub(crate) const fn version(&self) -> i32 {
        (self.encoded_version() & VERSION_MASK) as i32
    }

    /// Packs this handle into a raw pointer-sized value for use as a
    /// `Task` context pointer.
    #[must_use]
    pub const fn to_raw(self) -> *mut () {
        self.0 as usize as *mut ()
    }

    /// Recovers a handle from a `Task` context pointer previously produced
    /// by [`Self::to_raw`].
    #[must_use]
    pub fn from_raw(raw: *mut ()) -> Self {
        Self(raw as usize as u64)
    }
}

/// Outcome of attempting to allocate a continuation slot.
#[derive(Clone, Copy, Debug)]
pub enum AllocateOutcome {
    Success(ContinuationHandle),
    /// No free slot is currently available; the table is at capacity.
    Full,
    /// The table's lock was already held by another caller; this attempt
    /// made no progress and should be retried by the caller.
    Contested,
}

struct Slot {
    version: AtomicI32,
    remaining_task_counter: AtomicI32,
    on_completed: UnsafeCell<Option<CompletionCallback>>,
    on_completed_context: UnsafeCell<*mut ()>,
    user_id: UnsafeCell<u64>,
}

impl Default for Slot {
    fn default() -> Self {
        Self {
            version: AtomicI32::new(0),
            remaining_task_counter: AtomicI32::new(0),
            on_completed: UnsafeCell::new(None),
            on_completed_context: UnsafeCell::new(std::ptr::null_mut()),
            user_id: UnsafeCell::new(0),
        }
    }
}

// SAFETY: `on_completed`/`on_completed_context`/`user_id` are only written
// under the table's spin lock (during allocation) and only read by the
// single thread that observes `remaining_task_counter` transition to zero
// (during completion). No two threads touch a given slot's `UnsafeCell`
// fields concurrently.
unsafe impl Sync for Slot {}

/// A thin, lock-free read guard over a live continuation slot's data.
///
/// Returned by [`ContinuationTable::get_continuation`]. Does not hold the
/// table lock; valid only while the slot remains live, which the borrow
/// checker enforces lexically for the common case of reading a handle's
/// data immediately after confirming it is not yet complete.
pub struct ContinuationRef<'a> {
    slot: &'a Slot,
}

impl ContinuationRef<'_> {
    #[must_use]
    pub fn user_id(&self) -> u64 {
        // SAFETY: the slot is live (checked by `get_continuation`) and no
        // other thread writes `user_id` until the slot is freed.
        unsafe { *self.slot.user_id.get() }
    }

    #[must_use]
    pub fn remaining_task_counter(&self) -> i32 {
        self.slot.remaining_task_counter.load(Ordering::Acquire)
    }
}

/// Fixed-capacity table of continuation slots.
///
/// Sized at construction to the queue's configured continuation capacity
/// and never resized — exhaustion is reported as [`AllocateOutcome::Full`]
/// rather than growing, matching the ring buffer's own fixed-capacity
/// discipline.
pub(crate) struct ContinuationTable {
    slots: Box<[Slot]>,
    free_ids: UnsafeCell<IdPool>,
    live_count: UnsafeCell<usize>,
    completed_count: AtomicU64,
    lock: SpinLock,
}

// SAFETY: all access to `free_ids`/`live_count` happens with `lock` held.
unsafe impl Sync for ContinuationTable {}

impl ContinuationTable {
    pub(crate) fn new(capacity: usize) -> Self {
        let slots = (0..capacity).map(|_| Slot::default()).collect();
        Self {
            slots,
            free_ids: UnsafeCell::new(IdPool::new(capacity)),
            live_count: UnsafeCell::new(0),
            completed_count: AtomicU64::new(0),
            lock: SpinLock::new(),
        }
    }

    pub(crate) fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Total number of continuations whose `remaining_task_counter` has
    /// reached zero over this table's lifetime. Read by
    /// `TaskQueue::metrics` to fill in `continuations_completed`; kept here
    /// rather than in `Metrics` so the table stays usable (and loom-testable)
    /// without a `TaskQueue` around it.
    pub(crate) fn completed_count(&self) -> u64 {
        self.completed_count.load(Ordering::Relaxed)
    }

    /// Single CAS attempt to acquire the table lock and allocate a slot.
    /// Never retries internally.
    pub(crate) fn try_allocate(
        &self,
        task_count: i32,
        user_id: u64,
        on_completed: Option<CompletionCallback>,
        on_completed_context: *mut (),
    ) -> AllocateOutcome {
        if !self.lock.try_lock() {
            return AllocateOutcome::Contested;
        }
        let outcome = self.allocate_locked(task_count, user_id, on_completed, on_completed_context);
        self.lock.unlock();
        outcome
    }

    fn allocate_locked(
        &self,
        task_count: i32,
        user_id: u64,
        on_completed: Option<CompletionCallback>,
        on_completed_context: *mut (),
    ) -> AllocateOutcome {
        // SAFETY: called only while `self.lock` is held.
        let live_count = unsafe { &mut *self.live_count.get() };
        if *live_count >= self.slots.len() {
            return AllocateOutcome::Full;
        }

        // SAFETY: called only while `self.lock` is held.
        let index = unsafe { (*self.free_ids.get()).acquire() }
            .expect("live_count < capacity implies a free id exists");

        let slot = &self.slots[index];
        let wrapped_version = slot.version.load(Ordering::Relaxed).wrapping_add(1);
        debug_assert_no_version_wrap!(wrapped_version);
        // Clamped *after* the assertion above has had a chance to see the
        // real wrapped value; `.max(1)` only exists to keep "0" reserved
        // for "never allocated" and would otherwise remap a genuine wrap
        // (i32::MAX -> i32::MIN) back to 1 before it could be observed.
        let new_version = wrapped_version.max(1);

        slot.remaining_task_counter.store(task_count, Ordering::Relaxed);
        // SAFETY: exclusive access to this slot's cells while the lock is
        // held and before its handle has been handed to any other thread.
        unsafe {
            *slot.on_completed.get() = on_completed;
            *slot.on_completed_context.get() = on_completed_context;
            *slot.user_id.get() = user_id;
        }
        slot.version.store(new_version, Ordering::Release);
        *live_count += 1;

        AllocateOutcome::Success(ContinuationHandle::new(index as u32, new_version as u32))
    }

    /// Debug-asserts `handle` is initialized and in range (those are
    /// genuine programmer errors); returns `None` (in release builds) if
    /// either check fails. Also returns `None`, with no assertion, if the
    /// slot is not presently live for this handle — either its version has
    /// moved past `handle`'s (freed and reallocated) or its
    /// `remaining_task_counter` has already reached zero (freed but not
    /// yet reallocated). That second case is not a programmer error: a
    /// handle legitimately observes it in the window between its
    /// continuation completing and the slot's next allocation, exactly
    /// the case `is_complete` already treats as "done" via the same OR.
    pub(crate) fn get_continuation(&self, handle: ContinuationHandle) -> Option<ContinuationRef<'_>> {
        debug_assert!(handle.is_initialized(), "get_continuation on an uninitialized handle");
        debug_assert_handle_in_range!(handle.index(), self.slots.len());
        if !handle.is_initialized() || handle.index() >= self.slots.len() {
            return None;
        }
        let slot = &self.slots[handle.index()];
        let live_version = slot.version.load(Ordering::Acquire);
        if live_version != handle.version() || slot.remaining_task_counter.load(Ordering::Acquire) == 0 {
            return None;
        }
        Some(ContinuationRef { slot })
    }

    /// `true` iff the slot's current version exceeds `handle`'s version
    /// (the slot has already been recycled) or `remaining_task_counter`
    /// has reached zero. Lock-free; monotonic once true for a given handle.
    pub(crate) fn is_complete(&self, handle: ContinuationHandle) -> bool {
        let slot = &self.slots[handle.index()];
        let live_version = slot.version.load(Ordering::Acquire);
        live_version != handle.version() || slot.remaining_task_counter.load(Ordering::Acquire) == 0
    }

    /// Decrements the remaining count for `handle`'s slot. If the count
    /// reaches zero, invokes the completion callback (outside the table
    /// lock, to keep the critical section short and to avoid recursive lock
    /// acquisition if the callback enqueues more work) and then frees the
    /// slot under the lock. Called exactly once per completed wrapped task,
    /// by the trampoline.
    pub(crate) fn complete_one(&self, handle: ContinuationHandle, worker_index: i32) {
        let idx = handle.index();
        debug_assert_handle_in_range!(idx, self.slots.len());
        let slot = &self.slots[idx];

        let before = slot.remaining_task_counter.fetch_sub(1, Ordering::AcqRel);
        debug_assert_counter_not_underflowed!(before);

        if before != 1 {
            return;
        }
        self.completed_count.fetch_add(1, Ordering::Relaxed);

        // SAFETY: we are the unique thread observing this transition for
        // this handle/version; no one else reads these cells until the
        // slot is reallocated, which cannot happen until we return it to
        // the free list below.
        let (on_completed, on_completed_context, user_id) = unsafe {
            (
                (*slot.on_completed.get()).take(),
                *slot.on_completed_context.get(),
                *slot.user_id.get(),
            )
        };
        if let Some(cb) = on_completed {
            cb(user_id, on_completed_context, worker_index);
        }

        self.lock.lock_blocking();
        // SAFETY: lock held.
        unsafe {
            (*self.free_ids.get()).release(idx);
            *self.live_count.get() -= 1;
        }
        self.lock.unlock();
    }
}
