//! End-to-end scenarios exercising `TaskQueue` through its public API only.

use std::ptr;
use std::sync::atomic::{AtomicI32, AtomicU64, Ordering};
use taskq::{Config, DequeueOutcome, EnqueueOutcome, Task, TaskQueue};

extern "C" fn noop(_task_id: i32, _ctx: *mut (), _worker_index: i32) {}

fn task(id: i32) -> Task {
    Task::new(noop, ptr::null_mut(), id)
}

/// S1. Capacity-4 FIFO: enqueue ids 0..3, dequeue 4 times in order, then Empty.
#[test]
fn s1_capacity_four_fifo() {
    let q = TaskQueue::new(Config::new(4, 4, false));
    q.enqueue(&[task(0), task(1), task(2), task(3)]);

    for expected in 0..4 {
        match q.try_dequeue() {
            DequeueOutcome::Success(t) => assert_eq!(t.task_id, expected),
            other => panic!("expected Success({expected}), got {other:?}"),
        }
    }
    assert!(matches!(q.try_dequeue(), DequeueOutcome::Empty));
}

/// S2. Capacity-2 stop-stickiness: two tasks then stop; consumer sees task 0,
/// task 1, then Stop forever.
#[test]
fn s2_stop_stickiness_after_two_tasks() {
    let q = TaskQueue::new(Config::new(2, 2, false));
    q.enqueue(&[task(0), task(1)]);
    q.enqueue_stop();

    match q.try_dequeue() {
        DequeueOutcome::Success(t) => assert_eq!(t.task_id, 0),
        other => panic!("expected Success(0), got {other:?}"),
    }
    match q.try_dequeue() {
        DequeueOutcome::Success(t) => assert_eq!(t.task_id, 1),
        other => panic!("expected Success(1), got {other:?}"),
    }
    for _ in 0..5 {
        assert!(matches!(q.try_dequeue(), DequeueOutcome::Stop));
    }
}

/// S3. Continuation with task_count=3: three wrapped tasks each increment a
/// shared counter; on_completed fires once with the supplied user_id.
#[test]
fn s3_continuation_fires_once_with_user_id() {
    static COUNTER: AtomicI32 = AtomicI32::new(0);
    static COMPLETED_COUNT: AtomicI32 = AtomicI32::new(0);
    static SEEN_USER_ID: AtomicU64 = AtomicU64::new(0);

    COUNTER.store(0, Ordering::SeqCst);
    COMPLETED_COUNT.store(0, Ordering::SeqCst);
    SEEN_USER_ID.store(0, Ordering::SeqCst);

    extern "C" fn bump_counter(_task_id: i32, _ctx: *mut (), _worker_index: i32) {
        COUNTER.fetch_add(1, Ordering::SeqCst);
    }

    extern "C" fn on_completed(user_id: u64, _ctx: *mut (), _worker_index: i32) {
        COMPLETED_COUNT.fetch_add(1, Ordering::SeqCst);
        SEEN_USER_ID.store(user_id, Ordering::SeqCst);
    }

    let q = TaskQueue::new(Config::new(8, 4, false));
    let handle = q.allocate_continuation(3, 42, Some(on_completed), ptr::null_mut());

    let arena = bumpalo::Bump::new();
    let src = [task(0), task(1), task(2)];
    let mut wrapped = [Task::stop(); 3];
    q.create_completion_wrapped_tasks(handle, &src, &arena, &mut wrapped);
    q.enqueue(&wrapped);

    while !q.is_complete(handle) {
        q.try_dequeue_and_run(0);
    }

    assert_eq!(COUNTER.load(Ordering::SeqCst), 3);
    assert_eq!(COMPLETED_COUNT.load(Ordering::SeqCst), 1);
    assert_eq!(SEEN_USER_ID.load(Ordering::SeqCst), 42);
}

/// S4. Parallel-for over [10, 15) writes i into out[i - 10].
#[test]
fn s4_parallel_for_writes_expected_indices() {
    struct Out([AtomicI32; 5]);
    static OUT: Out = Out([
        AtomicI32::new(-1),
        AtomicI32::new(-1),
        AtomicI32::new(-1),
        AtomicI32::new(-1),
        AtomicI32::new(-1),
    ]);

    extern "C" fn write_index(i: i32, _ctx: *mut (), _worker_index: i32) {
        OUT.0[(i - 10) as usize].store(i, Ordering::SeqCst);
    }

    let q = TaskQueue::new(Config::new(8, 4, false));
    q.for_blocking(write_index, ptr::null_mut(), 10, 15, 0);

    let observed: Vec<i32> = OUT.0.iter().map(|c| c.load(Ordering::SeqCst)).collect();
    assert_eq!(observed, vec![10, 11, 12, 13, 14]);
}

/// S5. Capacity-1 queue; parallel-for over [0, 4) on a single caller thread
/// completes via the inline Full fallback rather than deadlocking.
#[test]
fn s5_capacity_one_parallel_for_completes_via_full_fallback() {
    static SUM: AtomicI32 = AtomicI32::new(0);
    SUM.store(0, Ordering::SeqCst);

    extern "C" fn add(i: i32, _ctx: *mut (), _worker_index: i32) {
        SUM.fetch_add(i, Ordering::SeqCst);
    }

    let q = TaskQueue::new(Config::new(1, 4, false));
    q.for_blocking(add, ptr::null_mut(), 0, 4, 0);

    assert_eq!(SUM.load(Ordering::SeqCst), 0 + 1 + 2 + 3);
}

/// S6. Allocate, complete, reallocate: the old handle stays permanently
/// complete/stale, and the reused slot starts fresh under the new handle.
/// (The reused slot's strictly-greater version number is an internal detail
/// covered by `continuation.rs`'s own `stale_handle_after_free_is_detected`
/// unit test, which has access to it; this test only checks what the public
/// API exposes.)
#[test]
fn s6_reallocation_leaves_old_handle_stale() {
    let q = TaskQueue::new(Config::new(2, 1, false));

    let first = q.allocate_continuation(1, 1, None, ptr::null_mut());
    let arena = bumpalo::Bump::new();
    let src = [task(0)];
    let mut wrapped = [Task::stop(); 1];
    q.create_completion_wrapped_tasks(first, &src, &arena, &mut wrapped);
    q.enqueue(&wrapped);
    while !q.is_complete(first) {
        q.try_dequeue_and_run(0);
    }
    assert!(q.get_continuation(first).is_none());

    let second = q.allocate_continuation(1, 2, None, ptr::null_mut());
    assert_ne!(first, second);
    assert!(!q.is_complete(second));
    assert!(q.is_complete(first));
}

/// Batch enqueue is all-or-nothing: a batch that doesn't fit is rejected
/// without enqueueing any of its tasks.
#[test]
fn batch_that_overflows_capacity_is_rejected_wholesale() {
    let q = TaskQueue::new(Config::new(2, 2, false));
    assert!(matches!(
        q.try_enqueue(&[task(1), task(2), task(3)]),
        EnqueueOutcome::Full
    ));
    assert!(matches!(q.try_dequeue(), DequeueOutcome::Empty));
}
