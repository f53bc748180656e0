use crate::backoff::Backoff;
use crate::config::Config;
use crate::continuation::{AllocateOutcome, CompletionCallback, ContinuationHandle, ContinuationRef, ContinuationTable};
use crate::error::QueueError;
use crate::metrics::{Metrics, MetricsSnapshot};
use crate::pool::{validate_buffer_len, BufferPool, HeapBufferPool};
use crate::ring::{DequeueOutcome, EnqueueOutcome, RingBuffer};
use crate::task::Task;

/// A bounded, lock-guarded MPMC task queue with job continuations and a
/// work-stealing parallel-for.
///
/// `TaskQueue` owns a fixed-capacity ring buffer of [`Task`] records and a
/// fixed-capacity continuation table tracking in-flight parallel-for calls.
/// Producers post batches of tasks with [`TaskQueue::try_enqueue`] /
/// [`TaskQueue::enqueue`]; workers pull and run them with
/// [`TaskQueue::try_dequeue_and_run`] / [`TaskQueue::dequeue_and_run`] until
/// they observe the stop sentinel posted by [`TaskQueue::enqueue_stop`] — a
/// sentinel that every worker sees on every subsequent poll, since it is
/// never consumed from the ring.
pub struct TaskQueue {
    ring: RingBuffer,
    continuations: ContinuationTable,
    config: Config,
    metrics: Metrics,
}

impl TaskQueue {
    /// Builds a queue with the crate's own heap-backed buffer pool.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self::with_pool(config, &HeapBufferPool)
            .expect("HeapBufferPool always returns buffers of the requested length")
    }

    /// Builds a queue backed by a caller-supplied [`BufferPool`].
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::PoolBufferLengthMismatch`] if `pool` hands back
    /// a buffer whose length doesn't match `config`'s configured capacity.
    pub fn with_pool<P: BufferPool<Task>>(config: Config, pool: &P) -> Result<Self, QueueError> {
        let buf = pool.acquire(config.task_capacity());
        validate_buffer_len(&buf, config.task_capacity())?;

        Ok(Self {
            ring: RingBuffer::from_buffer(buf),
            continuations: ContinuationTable::new(config.continuation_capacity()),
            config,
            metrics: Metrics::default(),
        })
    }

    #[must_use]
    pub fn config(&self) -> Config {
        self.config
    }

    /// Returns a snapshot of this queue's metrics. Every field but
    /// `continuations_completed` is zeroed throughout if
    /// `Config::enable_metrics` was `false` at construction;
    /// `continuations_completed` is tracked by the continuation table
    /// itself and always reflects reality.
    #[must_use]
    pub fn metrics(&self) -> MetricsSnapshot {
        let mut snapshot = self.metrics.snapshot();
        snapshot.continuations_completed = self.continuations.completed_count();
        snapshot
    }

    /// Number of tasks currently queued.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns every buffer this queue owns to `pool`. Consumes the queue —
    /// it must not be used again afterward.
    pub fn dispose<P: BufferPool<Task>>(self, pool: &P) {
        pool.release(self.ring.into_buffer());
    }

    pub(crate) fn continuations(&self) -> &ContinuationTable {
        &self.continuations
    }

    pub(crate) fn ring(&self) -> &RingBuffer {
        &self.ring
    }

    fn record_enqueue_outcome(&self, outcome: EnqueueOutcome, batch_len: usize) {
        if !self.config.enable_metrics {
            return;
        }
        match outcome {
            EnqueueOutcome::Success => self.metrics.tasks_enqueued_by(batch_len as u64),
            EnqueueOutcome::Full => self.metrics.enqueue_full(),
            EnqueueOutcome::Contested => self.metrics.enqueue_contested(),
        }
    }

    /// Single CAS attempt to post `tasks` as one batch. Never internally
    /// retries.
    pub fn try_enqueue(&self, tasks: &[Task]) -> EnqueueOutcome {
        let outcome = self.ring.try_enqueue(tasks);
        self.record_enqueue_outcome(outcome, tasks.len());
        outcome
    }

    /// Posts `tasks`, spinning (via [`Backoff`]) through lock contention and
    /// a full ring alike until the whole batch is accepted.
    pub fn enqueue(&self, tasks: &[Task]) {
        let mut backoff = Backoff::new();
        loop {
            if let EnqueueOutcome::Success = self.try_enqueue(tasks) {
                return;
            }
            backoff.snooze();
        }
    }

    /// Posts the stop sentinel. Workers that dequeue it see `Stop` forever
    /// — it is never consumed — so post one sentinel per worker that should
    /// stop, not once for the whole pool.
    pub fn try_enqueue_stop(&self) -> EnqueueOutcome {
        let outcome = self.try_enqueue(&[Task::stop()]);
        if self.config.enable_metrics {
            if let EnqueueOutcome::Success = outcome {
                self.metrics.stop_sentinels_posted();
            }
        }
        outcome
    }

    pub fn enqueue_stop(&self) {
        let mut backoff = Backoff::new();
        loop {
            if let EnqueueOutcome::Success = self.try_enqueue_stop() {
                return;
            }
            backoff.snooze();
        }
    }

    fn record_dequeue_outcome(&self, outcome: &DequeueOutcome) {
        if !self.config.enable_metrics {
            return;
        }
        match outcome {
            DequeueOutcome::Success(_) => self.metrics.tasks_dequeued(),
            DequeueOutcome::Empty | DequeueOutcome::Stop => {}
            DequeueOutcome::Contested => self.metrics.dequeue_contested(),
        }
    }

    /// Single CAS attempt to pull the next task without running it. Never
    /// internally retries.
    pub fn try_dequeue(&self) -> DequeueOutcome {
        let outcome = self.ring.try_dequeue();
        self.record_dequeue_outcome(&outcome);
        outcome
    }

    /// Single CAS attempt to pull and run the next task with `worker_index`.
    /// Never internally retries.
    pub fn try_dequeue_and_run(&self, worker_index: i32) -> DequeueOutcome {
        let outcome = self.try_dequeue();
        if let DequeueOutcome::Success(task) = outcome {
            task.run(worker_index);
        }
        outcome
    }

    /// Pulls and runs tasks with `worker_index`, spinning through lock
    /// contention and an empty ring alike, until one runs or `Stop` is
    /// observed. Returns `false` iff the stop sentinel was observed.
    pub fn dequeue_and_run(&self, worker_index: i32) -> bool {
        let mut backoff = Backoff::new();
        loop {
            match self.try_dequeue_and_run(worker_index) {
                DequeueOutcome::Empty | DequeueOutcome::Contested => backoff.snooze(),
                DequeueOutcome::Success(_) => return true,
                DequeueOutcome::Stop => return false,
            }
        }
    }

    fn record_allocate_outcome(&self, outcome: &AllocateOutcome) {
        if !self.config.enable_metrics {
            return;
        }
        match outcome {
            AllocateOutcome::Success(_) => self.metrics.continuations_allocated(),
            AllocateOutcome::Full => self.metrics.continuation_alloc_full(),
            AllocateOutcome::Contested => self.metrics.continuation_alloc_contested(),
        }
    }

    /// Single CAS attempt to allocate a continuation tracking `task_count`
    /// outstanding wrapped tasks. Never internally retries.
    pub fn try_allocate_continuation(
        &self,
        task_count: i32,
        user_id: u64,
        on_completed: Option<CompletionCallback>,
        on_completed_context: *mut (),
    ) -> AllocateOutcome {
        let outcome =
            self.continuations
                .try_allocate(task_count, user_id, on_completed, on_completed_context);
        self.record_allocate_outcome(&outcome);
        outcome
    }

    /// Allocates a continuation, spinning through both `Contested` and
    /// `Full` until a slot is available — a `Full` continuation table is as
    /// transient as a full ring once some other in-flight job finishes.
    pub fn allocate_continuation(
        &self,
        task_count: i32,
        user_id: u64,
        on_completed: Option<CompletionCallback>,
        on_completed_context: *mut (),
    ) -> ContinuationHandle {
        let mut backoff = Backoff::new();
        loop {
            if let AllocateOutcome::Success(handle) =
                self.try_allocate_continuation(task_count, user_id, on_completed, on_completed_context)
            {
                return handle;
            }
            backoff.snooze();
        }
    }

    #[must_use]
    pub fn is_complete(&self, handle: ContinuationHandle) -> bool {
        self.continuations.is_complete(handle)
    }

    #[must_use]
    pub fn get_continuation(&self, handle: ContinuationHandle) -> Option<ContinuationRef<'_>> {
        self.continuations.get_continuation(handle)
    }

    /// Builds `out_tasks[i]` as a wrapped task running `src_tasks[i].function`
    /// under `handle`'s completion tracking, with storage for the
    /// intermediate wrapping contexts taken from `arena`.
    ///
    /// `src_tasks` and `out_tasks` must have equal length. Each `src_tasks[i]`
    /// must not be the stop sentinel.
    pub fn create_completion_wrapped_tasks<'a>(
        &self,
        handle: ContinuationHandle,
        src_tasks: &[Task],
        arena: &'a bumpalo::Bump,
        out_tasks: &mut [Task],
    ) {
        assert_eq!(
            src_tasks.len(),
            out_tasks.len(),
            "create_completion_wrapped_tasks: src/out length mismatch"
        );
        let table_ptr = self.continuations() as *const ContinuationTable;
        for (src, out) in src_tasks.iter().zip(out_tasks.iter_mut()) {
            let function = src
                .function
                .expect("create_completion_wrapped_tasks: src task must not be the stop sentinel");
            let ctx = arena.alloc(crate::trampoline::WrappedContext {
                function,
                context: src.context,
                handle,
                table: table_ptr,
                heap_owned: false,
            });
            *out = Task::new(
                crate::trampoline::run,
                (ctx as *mut crate::trampoline::WrappedContext).cast::<()>(),
                src.task_id,
            );
        }
    }

    /// Tries to pull and run a single pending task without blocking for one
    /// to appear. Used by the parallel-for wait loop to steal work while
    /// waiting on a continuation.
    pub(crate) fn try_steal(&self) -> DequeueOutcome {
        self.try_dequeue_and_run(0)
    }

    pub(crate) fn metrics_handle(&self) -> &Metrics {
        &self.metrics
    }
}
