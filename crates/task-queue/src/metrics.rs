use std::sync::atomic::{AtomicU64, Ordering};

/// A point-in-time copy of a queue's metrics counters, returned by
/// [`crate::TaskQueue::metrics`].
///
/// Most counters are atomics (see `Metrics` below) incremented from
/// `queue.rs`/`parallel_for.rs` call sites rather than from inside the ring
/// buffer's or continuation table's own lock-guarded sections — those two
/// stay metrics-agnostic so they can be exercised (and loom-tested)
/// independent of this ambient concern. `continuations_completed` is the
/// one exception: it is tracked inside the continuation table itself (the
/// only place that observes a completion), and folded in by
/// `TaskQueue::metrics` regardless of `Config::enable_metrics`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsSnapshot {
    pub tasks_enqueued: u64,
    pub tasks_dequeued: u64,
    pub stop_sentinels_posted: u64,
    pub enqueue_contested: u64,
    pub dequeue_contested: u64,
    pub enqueue_full: u64,
    pub continuations_allocated: u64,
    pub continuations_completed: u64,
    pub continuation_alloc_full: u64,
    pub continuation_alloc_contested: u64,
}

/// The queue's live, thread-safe metrics counters.
///
/// Only touched when `Config::enable_metrics` is set; every increment site
/// in `queue.rs`/`parallel_for.rs` checks the flag first so a queue built
/// with metrics disabled pays nothing beyond that one branch. Every counter
/// uses `Ordering::Relaxed` — these are diagnostic counters, not
/// synchronizing operations.
#[derive(Default)]
pub(crate) struct Metrics {
    tasks_enqueued: AtomicU64,
    tasks_dequeued: AtomicU64,
    stop_sentinels_posted: AtomicU64,
    enqueue_contested: AtomicU64,
    dequeue_contested: AtomicU64,
    enqueue_full: AtomicU64,
    continuations_allocated: AtomicU64,
    continuation_alloc_full: AtomicU64,
    continuation_alloc_contested: AtomicU64,
}

macro_rules! counter_methods {
    ($($field:ident),+ $(,)?) => {
        $(
            pub(crate) fn $field(&self) {
                self.$field.fetch_add(1, Ordering::Relaxed);
            }
        )+
    };
}

impl Metrics {
    counter_methods!(
        tasks_dequeued,
        stop_sentinels_posted,
        enqueue_contested,
        dequeue_contested,
        enqueue_full,
        continuations_allocated,
        continuation_alloc_full,
        continuation_alloc_contested,
    );

    /// `try_enqueue` takes a whole batch at once, so unlike the other
    /// counters this one advances by `count` rather than by one.
    pub(crate) fn tasks_enqueued_by(&self, count: u64) {
        self.tasks_enqueued.fetch_add(count, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            tasks_enqueued: self.tasks_enqueued.load(Ordering::Relaxed),
            tasks_dequeued: self.tasks_dequeued.load(Ordering::Relaxed),
            stop_sentinels_posted: self.stop_sentinels_posted.load(Ordering::Relaxed),
            enqueue_contested: self.enqueue_contested.load(Ordering::Relaxed),
            dequeue_contested: self.dequeue_contested.load(Ordering::Relaxed),
            enqueue_full: self.enqueue_full.load(Ordering::Relaxed),
            continuations_allocated: self.continuations_allocated.load(Ordering::Relaxed),
            // Folded in separately by `TaskQueue::metrics` from the
            // continuation table's own counter.
            continuations_completed: 0,
            continuation_alloc_full: self.continuation_alloc_full.load(Ordering::Relaxed),
            continuation_alloc_contested: self.continuation_alloc_contested.load(Ordering::Relaxed),
        }
    }
}
