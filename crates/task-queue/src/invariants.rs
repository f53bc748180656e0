//! Debug assertion macros for the ring buffer and continuation table.
//!
//! Active only in debug builds (`debug_assert!` is a no-op otherwise), so
//! there is zero overhead in release builds. Used by `ring.rs` and
//! `continuation.rs`.

/// Assert that the ring never reserves more slots than its capacity:
/// `allocated_cursor - dequeue_cursor <= capacity`.
macro_rules! debug_assert_bounded_occupancy {
    ($occupied:expr, $capacity:expr) => {
        debug_assert!(
            $occupied <= $capacity,
            "ring occupancy {} exceeds capacity {}",
            $occupied,
            $capacity
        )
    };
}

/// Assert that a cursor only ever increases.
macro_rules! debug_assert_monotonic_cursor {
    ($name:literal, $old:expr, $new:expr) => {
        debug_assert!(
            $new >= $old,
            "{} decreased from {} to {}",
            $name,
            $old,
            $new
        )
    };
}

/// Assert that the slot immediately before `written_cursor` is not a stop
/// sentinel before posting more records: once a stop sentinel is written at
/// slot S, no record may be written at slot S+1 or later.
macro_rules! debug_assert_no_enqueue_after_stop {
    ($is_stop:expr) => {
        debug_assert!(
            !$is_stop,
            "enqueue attempted after a stop sentinel was already posted"
        )
    };
}

/// Assert a continuation slot's version never wraps within a process
/// lifetime.
macro_rules! debug_assert_no_version_wrap {
    ($new_version:expr) => {
        debug_assert!(
            $new_version > 0,
            "continuation slot version wrapped to {}",
            $new_version
        )
    };
}

/// Assert a handle refers to a slot within the table's capacity.
macro_rules! debug_assert_handle_in_range {
    ($index:expr, $capacity:expr) => {
        debug_assert!(
            $index < $capacity,
            "continuation handle index {} out of range (capacity {})",
            $index,
            $capacity
        )
    };
}

/// Assert the trampoline never decrements a counter below zero.
macro_rules! debug_assert_counter_not_underflowed {
    ($remaining_before_decrement:expr) => {
        debug_assert!(
            $remaining_before_decrement >= 1,
            "continuation remaining counter underflowed (was {})",
            $remaining_before_decrement
        )
    };
}

pub(crate) use debug_assert_bounded_occupancy;
pub(crate) use debug_assert_counter_not_underflowed;
pub(crate) use debug_assert_handle_in_range;
pub(crate) use debug_assert_monotonic_cursor;
pub(crate) use debug_assert_no_enqueue_after_stop;
pub(crate) use debug_assert_no_version_wrap;
