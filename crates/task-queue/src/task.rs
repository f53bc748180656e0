use std::ptr;

/// A task's entry point.
///
/// Plain `fn` pointer, not a boxed closure: the queue stores `Task` records
/// directly in ring-buffer slots, so a task must stay `Copy` and
/// allocation-free. `worker_index` is pure metadata the dispatcher passes
/// through from whichever worker happens to run the task — the queue
/// itself never inspects it.
pub type TaskFn = extern "C" fn(task_id: i32, context: *mut (), worker_index: i32);

/// A single unit of work posted to the ring buffer.
///
/// Plain data: a function pointer, the opaque context it will be called
/// with, and a caller-supplied id threaded through for diagnostics and (in
/// the parallel-for path) doubling as the iteration index. The all-`None`
/// value ([`Task::stop`]) is the stop sentinel: a worker that dequeues it
/// exits its dispatch loop without running anything.
#[derive(Clone, Copy, Debug)]
pub struct Task {
    pub function: Option<TaskFn>,
    pub context: *mut (),
    pub task_id: i32,
}

// SAFETY: `Task` only ever travels between threads as plain data sitting in
// a ring slot. Whoever constructs a task with a non-null `context` is
// responsible for that pointer's aliasing and lifetime.
unsafe impl Send for Task {}

impl Task {
    /// The stop sentinel. Never consumed by `try_dequeue` — every worker
    /// that reaches it observes `Stop`.
    #[must_use]
    pub const fn stop() -> Self {
        Self {
            function: None,
            context: ptr::null_mut(),
            task_id: -1,
        }
    }

    #[must_use]
    pub const fn new(function: TaskFn, context: *mut (), task_id: i32) -> Self {
        Self {
            function: Some(function),
            context,
            task_id,
        }
    }

    #[must_use]
    pub const fn is_stop(&self) -> bool {
        self.function.is_none()
    }

    /// Invokes the task's function with `worker_index`. No-op for the stop
    /// sentinel.
    pub fn run(&self, worker_index: i32) {
        if let Some(f) = self.function {
            f(self.task_id, self.context, worker_index);
        }
    }
}

impl Default for Task {
    fn default() -> Self {
        Self::stop()
    }
}
