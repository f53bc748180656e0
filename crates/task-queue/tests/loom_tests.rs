//! Loom-model-checked interleavings of the queue's two synchronization
//! protocols: the ring buffer's CAS-lock-guarded cursors, and the
//! continuation table's allocate/complete/recycle sequence.
//!
//! Run with: `cargo test --release --features loom --test loom_tests`
//!
//! Loom's atomics and `UnsafeCell` are drop-in replacements for `std`'s, but
//! it exhaustively explores interleavings rather than running once, so it
//! cannot execute against the real `taskq::TaskQueue` (which is built
//! against `std::sync::atomic`). These tests model each protocol in
//! isolation at a capacity small enough for loom's state space, rather than
//! re-implementing the whole crate under `cfg(loom)`.

#![cfg(feature = "loom")]

use loom::cell::UnsafeCell;
use loom::sync::atomic::{AtomicBool, AtomicI32, AtomicU64, Ordering};
use loom::sync::Arc;
use loom::thread;

/// Single-word CAS spin lock, mirroring `taskq`'s `SpinLock`.
struct LoomSpinLock {
    locked: AtomicBool,
}

impl LoomSpinLock {
    fn new() -> Self {
        Self {
            locked: AtomicBool::new(false),
        }
    }

    fn try_lock(&self) -> bool {
        self.locked
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    fn unlock(&self) {
        self.locked.store(false, Ordering::Release);
    }
}

/// Capacity-4 single-producer ring, modeling `RingBuffer::try_enqueue` /
/// `try_dequeue` for one task at a time (batches of 1) under a single
/// CAS-guarded critical section.
struct LoomRing {
    lock: LoomSpinLock,
    dequeue_cursor: AtomicU64,
    written_cursor: AtomicU64,
    buffer: [UnsafeCell<i32>; 4],
}

impl LoomRing {
    fn new() -> Self {
        Self {
            lock: LoomSpinLock::new(),
            dequeue_cursor: AtomicU64::new(0),
            written_cursor: AtomicU64::new(0),
            buffer: [
                UnsafeCell::new(0),
                UnsafeCell::new(0),
                UnsafeCell::new(0),
                UnsafeCell::new(0),
            ],
        }
    }

    fn try_enqueue(&self, value: i32) -> bool {
        if !self.lock.try_lock() {
            return false;
        }
        let dequeue = self.dequeue_cursor.load(Ordering::Relaxed);
        let written = self.written_cursor.load(Ordering::Relaxed);
        if written.wrapping_sub(dequeue) >= 4 {
            self.lock.unlock();
            return false;
        }
        let idx = (written % 4) as usize;
        // SAFETY: exclusive access to this slot while `lock` is held.
        unsafe {
            self.buffer[idx].with_mut(|p| *p = value);
        }
        self.written_cursor.store(written + 1, Ordering::Release);
        self.lock.unlock();
        true
    }

    fn try_dequeue(&self) -> Option<i32> {
        if !self.lock.try_lock() {
            return None;
        }
        let dequeue = self.dequeue_cursor.load(Ordering::Relaxed);
        let written = self.written_cursor.load(Ordering::Acquire);
        if dequeue >= written {
            self.lock.unlock();
            return None;
        }
        let idx = (dequeue % 4) as usize;
        // SAFETY: slot at `idx` was published by `try_enqueue`'s Release
        // store, observed above via the matching Acquire load.
        let value = unsafe { self.buffer[idx].with(|p| *p) };
        self.dequeue_cursor.store(dequeue + 1, Ordering::Relaxed);
        self.lock.unlock();
        Some(value)
    }
}

unsafe impl Send for LoomRing {}
unsafe impl Sync for LoomRing {}

/// Two producers racing to post one task each, one consumer draining until
/// it has both: no loss, no duplication, no torn read.
#[test]
fn loom_two_producers_one_consumer_no_loss_no_duplication() {
    loom::model(|| {
        let ring = Arc::new(LoomRing::new());

        let p1 = {
            let ring = Arc::clone(&ring);
            thread::spawn(move || {
                while !ring.try_enqueue(1) {
                    thread::yield_now();
                }
            })
        };
        let p2 = {
            let ring = Arc::clone(&ring);
            thread::spawn(move || {
                while !ring.try_enqueue(2) {
                    thread::yield_now();
                }
            })
        };

        let mut received = Vec::new();
        while received.len() < 2 {
            if let Some(v) = ring.try_dequeue() {
                received.push(v);
            } else {
                thread::yield_now();
            }
        }

        p1.join().unwrap();
        p2.join().unwrap();

        received.sort_unstable();
        assert_eq!(received, vec![1, 2]);
    });
}

/// A single allocate/decrement-to-zero/free sequence: the live flag observed
/// by a racing reader is never true both before allocation and after free
/// for the same generation.
struct LoomContinuation {
    lock: LoomSpinLock,
    version: AtomicI32,
    remaining: AtomicI32,
}

impl LoomContinuation {
    fn new() -> Self {
        Self {
            lock: LoomSpinLock::new(),
            version: AtomicI32::new(0),
            remaining: AtomicI32::new(0),
        }
    }

    fn allocate(&self, task_count: i32) -> i32 {
        while !self.lock.try_lock() {
            thread::yield_now();
        }
        let v = self.version.load(Ordering::Relaxed) + 1;
        self.remaining.store(task_count, Ordering::Relaxed);
        self.version.store(v, Ordering::Release);
        self.lock.unlock();
        v
    }

    fn is_complete(&self, handle_version: i32) -> bool {
        self.version.load(Ordering::Acquire) != handle_version
            || self.remaining.load(Ordering::Acquire) == 0
    }

    fn complete_one(&self) {
        self.remaining.fetch_sub(1, Ordering::AcqRel);
    }
}

unsafe impl Send for LoomContinuation {}
unsafe impl Sync for LoomContinuation {}

/// Two workers racing to complete the last two outstanding tasks of a
/// continuation: `is_complete` becomes true exactly once the counter hits
/// zero, regardless of which worker gets there first.
#[test]
fn loom_continuation_completes_exactly_when_counter_hits_zero() {
    loom::model(|| {
        let cont = Arc::new(LoomContinuation::new());
        let handle_version = cont.allocate(2);

        let w1 = {
            let cont = Arc::clone(&cont);
            thread::spawn(move || cont.complete_one())
        };
        let w2 = {
            let cont = Arc::clone(&cont);
            thread::spawn(move || cont.complete_one())
        };

        w1.join().unwrap();
        w2.join().unwrap();

        assert!(cont.is_complete(handle_version));
    });
}
