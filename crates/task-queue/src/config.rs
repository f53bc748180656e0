/// Configuration for a [`crate::TaskQueue`].
#[derive(Debug, Clone, Copy)]
pub struct Config {
    /// Requested task ring capacity; rounded up to the next power of two.
    pub max_task_capacity: usize,
    /// Requested continuation table capacity; rounded up to the next power
    /// of two.
    pub max_continuation_capacity: usize,
    /// Enable metrics collection (slight overhead on every enqueue/dequeue).
    pub enable_metrics: bool,
}

impl Config {
    /// Creates a new configuration with custom settings.
    ///
    /// # Panics
    ///
    /// Panics if either capacity is zero or too large to round up to a
    /// power of two within `usize`.
    #[must_use]
    pub const fn new(max_task_capacity: usize, max_continuation_capacity: usize, enable_metrics: bool) -> Self {
        assert!(max_task_capacity > 0, "max_task_capacity must be nonzero");
        assert!(
            max_continuation_capacity > 0,
            "max_continuation_capacity must be nonzero"
        );
        assert!(
            max_task_capacity <= (1_usize << (usize::BITS - 1)),
            "max_task_capacity is too large to round up to a power of two"
        );
        assert!(
            max_continuation_capacity <= (1_usize << (usize::BITS - 1)),
            "max_continuation_capacity is too large to round up to a power of two"
        );

        Self {
            max_task_capacity,
            max_continuation_capacity,
            enable_metrics,
        }
    }

    /// Returns the rounded, power-of-two capacity of the task ring buffer.
    #[inline]
    #[must_use]
    pub fn task_capacity(&self) -> usize {
        self.max_task_capacity.next_power_of_two()
    }

    /// Returns the rounded, power-of-two capacity of the continuation table.
    #[inline]
    #[must_use]
    pub fn continuation_capacity(&self) -> usize {
        self.max_continuation_capacity.next_power_of_two()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_task_capacity: 1024,
            max_continuation_capacity: 256,
            enable_metrics: false,
        }
    }
}

/// Low-latency configuration: a small ring that fits in L1 cache, and a
/// correspondingly small continuation table.
pub const LOW_LATENCY_CONFIG: Config = Config::new(1024, 64, false);

/// High-throughput configuration: a large ring and continuation table for
/// workloads posting many parallel-for calls concurrently.
pub const HIGH_THROUGHPUT_CONFIG: Config = Config::new(1 << 18, 1 << 12, false);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_power_of_two_sized() {
        let c = Config::default();
        assert!(c.task_capacity().is_power_of_two());
        assert!(c.continuation_capacity().is_power_of_two());
        assert_eq!(c.task_capacity(), 1024);
        assert_eq!(c.continuation_capacity(), 256);
    }

    #[test]
    fn non_power_of_two_request_rounds_up() {
        let c = Config::new(5, 3, false);
        assert_eq!(c.task_capacity(), 8);
        assert_eq!(c.continuation_capacity(), 4);
    }

    #[test]
    fn capacity_one_is_allowed() {
        let c = Config::new(1, 1, false);
        assert_eq!(c.task_capacity(), 1);
        assert_eq!(c.continuation_capacity(), 1);
    }

    #[test]
    #[should_panic(expected = "nonzero")]
    fn zero_task_capacity_panics() {
        let _ = Config::new(0, 4, false);
    }

    #[test]
    #[should_panic(expected = "nonzero")]
    fn zero_continuation_capacity_panics() {
        let _ = Config::new(4, 0, false);
    }
}
