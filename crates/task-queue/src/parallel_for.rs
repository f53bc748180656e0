//! The work-stealing parallel-for primitive.
//!
//! `for_blocking` runs iteration `start` on the calling thread and steals
//! pending work from the ring while it waits for the remaining `end - start
//! - 1` iterations to finish elsewhere, rather than idling. `enqueue_for`
//! wraps and posts every iteration in `[start, end)` and returns
//! immediately; the caller observes completion later via `is_complete` (or
//! its own `on_completed` callback, passed through `try_allocate_continuation`
//! by a caller that wants one — `for_blocking`/`enqueue_for` themselves take
//! no completion-callback parameter of their own).

use crate::backoff::Backoff;
use crate::continuation::ContinuationHandle;
use crate::queue::TaskQueue;
use crate::ring::{DequeueOutcome, EnqueueOutcome};
use crate::task::{Task, TaskFn};
use crate::trampoline::{self, WrappedContext};

impl TaskQueue {
    /// Posts every iteration of `function(i, context, _)` for `i` in
    /// `[start, end)` as independently wrapped tasks and returns
    /// immediately without waiting for any of them to run. Returns `None`
    /// for an empty range.
    pub fn enqueue_for(&self, function: TaskFn, context: *mut (), start: i32, end: i32) -> Option<ContinuationHandle> {
        if end <= start {
            return None;
        }
        let n = (end - start) as usize;
        let handle = self.allocate_continuation(n as i32, 0, None, std::ptr::null_mut());

        let table_ptr = self.continuations() as *const _;
        let tasks: Vec<Task> = (0..n)
            .map(|i| {
                let task_id = start + i as i32;
                let boxed = Box::new(WrappedContext {
                    function,
                    context,
                    handle,
                    table: table_ptr,
                    heap_owned: true,
                });
                let raw = Box::into_raw(boxed);
                Task::new(trampoline::run, raw.cast::<()>(), task_id)
            })
            .collect();

        self.enqueue(&tasks);
        Some(handle)
    }

    /// Runs `function(i, context, worker_index)` for every `i` in
    /// `[start, end)`, blocking the calling thread until all of them
    /// complete.
    ///
    /// Iteration `start` always runs inline on the caller's thread; it is
    /// not wrapped, since its completion is implicit in the continuation's
    /// `task_count = end - start - 1`. The remaining iterations are wrapped
    /// and posted to the ring; while waiting for them to finish, the caller
    /// steals and runs pending tasks instead of idling. If the ring is full
    /// when posting, the caller runs one of the not-yet-posted iterations
    /// inline itself and retries with the shortened batch, rather than
    /// spinning for room (which could deadlock a single-worker caller).
    pub fn for_blocking(&self, function: TaskFn, context: *mut (), start: i32, end: i32, worker_index: i32) {
        if end <= start {
            return;
        }
        let n = (end - start) as usize;
        if n == 1 {
            function(start, context, worker_index);
            return;
        }

        let remaining = n - 1;
        let handle = self.allocate_continuation(remaining as i32, 0, None, std::ptr::null_mut());

        let arena = bumpalo::Bump::new();
        let src_tasks: Vec<Task> = (1..n)
            .map(|i| Task::new(function, context, start + i as i32))
            .collect();
        let mut wrapped_tasks = vec![Task::stop(); remaining];
        self.create_completion_wrapped_tasks(handle, &src_tasks, &arena, &mut wrapped_tasks);

        let mut pending = &wrapped_tasks[..];
        let mut backoff = Backoff::new();
        while !pending.is_empty() {
            match self.try_enqueue(pending) {
                EnqueueOutcome::Success => break,
                EnqueueOutcome::Full => {
                    // Pop the first not-yet-posted iteration and run it
                    // inline immediately, then retry with the rest.
                    pending[0].run(worker_index);
                    pending = &pending[1..];
                }
                EnqueueOutcome::Contested => backoff.snooze(),
            }
        }

        function(start, context, worker_index);

        let mut backoff = Backoff::new();
        while !self.is_complete(handle) {
            match self.try_dequeue_and_run(worker_index) {
                DequeueOutcome::Success(_) => backoff.reset(),
                DequeueOutcome::Empty | DequeueOutcome::Contested => backoff.snooze(),
                DequeueOutcome::Stop => {
                    debug_assert!(
                        false,
                        "for_blocking observed the stop sentinel while waiting on its own \
                         continuation — a for-loop was enqueued after enqueue_stop"
                    );
                    return;
                }
            }
        }
    }
}
