//! The wrapped-task trampoline: turns a user function into a `Task` that
//! also completes a continuation when it finishes.

use crate::continuation::ContinuationHandle;
use crate::continuation::ContinuationTable;
use crate::task::TaskFn;

/// Context threaded through the ring buffer for a single wrapped
/// parallel-for iteration.
///
/// Every wrapped task posted by `TaskQueue::enqueue_for` /
/// `TaskQueue::for_blocking` carries one of these as its `Task::context`.
/// [`run`] is the `TaskFn` a worker actually calls: it runs the user's
/// function (with the task's own `task_id`/`worker_index`, which for a
/// parallel-for iteration is the global iteration index), then completes
/// `handle` on `table`.
///
/// `heap_owned` distinguishes the two lifetimes a `WrappedContext` can have:
///
/// - `for_blocking` arena-allocates every iteration's context out of a
///   `bumpalo::Bump` scoped to the call; the caller spins until the
///   continuation completes before the arena (and these contexts) are
///   dropped, so `heap_owned` is `false` and `run` must not free anything.
/// - `enqueue_for` does not wait — the caller may have moved on long before
///   a worker thread gets around to running the posted tasks — so each
///   context is individually `Box`-allocated and `heap_owned` is `true`:
///   `run` reclaims it itself once the user function returns.
pub(crate) struct WrappedContext {
    pub(crate) function: TaskFn,
    pub(crate) context: *mut (),
    pub(crate) handle: ContinuationHandle,
    pub(crate) table: *const ContinuationTable,
    pub(crate) heap_owned: bool,
}

// SAFETY: a `WrappedContext` is handed to exactly one worker thread (via the
// ring buffer) and touched by nothing else until that worker calls `run`,
// which consumes it.
unsafe impl Send for WrappedContext {}

/// The `TaskFn` installed on every wrapped task. Runs the user function,
/// completes the continuation, and frees heap-owned contexts.
pub(crate) extern "C" fn run(task_id: i32, context: *mut (), worker_index: i32) {
    // SAFETY: `context` always points at a `WrappedContext` constructed by
    // `parallel_for.rs`'s wrapping helpers; this is the only place that
    // reinterprets it.
    let ctx = context.cast::<WrappedContext>();
    let (function, user_context, handle, table, heap_owned) = unsafe {
        let c = &*ctx;
        (c.function, c.context, c.handle, c.table, c.heap_owned)
    };

    function(task_id, user_context, worker_index);

    // SAFETY: `table` outlives every wrapped task it hands out a handle
    // for — callers of both `for_blocking` and `enqueue_for` keep the
    // owning `TaskQueue` alive until all iterations have been observed to
    // complete.
    let table = unsafe { &*table };
    table.complete_one(handle, worker_index);

    if heap_owned {
        // SAFETY: constructed via `Box::into_raw` by `enqueue_for`, and
        // this is the only place that reclaims it, exactly once.
        unsafe {
            drop(Box::from_raw(ctx));
        }
    }
}
