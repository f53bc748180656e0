//! A bounded, lock-guarded MPMC task queue with job continuations and a
//! work-stealing parallel-for, meant to drive a fixed pool of worker threads
//! over fine-grained compute work.
//!
//! The queue itself ([`TaskQueue`]) is a ring buffer of [`Task`] records
//! guarded by a single spin lock per operation; producers and workers never
//! block on a kernel primitive, spinning via [`Backoff`] instead when they
//! need to wait. A second structure, the continuation table, tracks how
//! many outstanding iterations of a [`TaskQueue::for_blocking`] or
//! [`TaskQueue::enqueue_for`] call remain, so the last one to finish can
//! fire a completion callback exactly once.
//!
//! ```no_run
//! use taskq::{Config, Task, TaskQueue};
//!
//! let queue = TaskQueue::new(Config::default());
//!
//! extern "C" fn work(_task_id: i32, _ctx: *mut (), _worker_index: i32) {
//!     // ... do something ...
//! }
//!
//! queue.enqueue(&[Task::new(work, std::ptr::null_mut(), 0)]);
//! queue.dequeue_and_run(0);
//! queue.enqueue_stop();
//! ```

mod backoff;
mod cache_aligned;
mod config;
mod continuation;
mod error;
mod invariants;
mod metrics;
mod parallel_for;
mod pool;
mod queue;
mod ring;
mod spin_lock;
mod task;
mod trampoline;

pub use backoff::Backoff;
pub use config::{Config, HIGH_THROUGHPUT_CONFIG, LOW_LATENCY_CONFIG};
pub use continuation::{AllocateOutcome, CompletionCallback, ContinuationHandle, ContinuationRef};
pub use error::QueueError;
pub use metrics::MetricsSnapshot;
pub use pool::{BufferPool, HeapBufferPool};
pub use queue::TaskQueue;
pub use ring::{DequeueOutcome, EnqueueOutcome};
pub use task::{Task, TaskFn};
