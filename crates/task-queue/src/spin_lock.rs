use crate::backoff::Backoff;
use crate::cache_aligned::CacheAligned;
use std::sync::atomic::{AtomicBool, Ordering};

/// A single CAS-acquired spin lock word.
///
/// Every critical section in this crate (the ring buffer's cursors, the
/// continuation table's slot array and id-pool) is guarded by one of these.
/// Acquisition is a *single* CAS attempt — on failure the caller gets back
/// `false` and decides for itself whether to report `Contested` or spin via
/// [`Backoff`]. The lock is never held across two acquisitions: the ring
/// lock and the continuation-table lock are always taken one at a time.
pub(crate) struct SpinLock {
    locked: CacheAligned<AtomicBool>,
}

impl SpinLock {
    pub(crate) fn new() -> Self {
        Self {
            locked: CacheAligned::new(AtomicBool::new(false)),
        }
    }

    /// One CAS attempt. `true` on success.
    #[inline]
    pub(crate) fn try_lock(&self) -> bool {
        self.locked
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    /// Spin until the lock is acquired. Used only by blocking wrappers that
    /// have already committed to waiting (e.g. trampoline slot recycling).
    pub(crate) fn lock_blocking(&self) {
        let mut backoff = Backoff::new();
        while !self.try_lock() {
            backoff.snooze();
        }
    }

    #[inline]
    pub(crate) fn unlock(&self) {
        self.locked.store(false, Ordering::Release);
    }
}
