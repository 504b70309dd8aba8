use crate::InitError;

/// Smallest capacity the slot protocol can run with.
///
/// With a single cell `cell_mask` would be zero and a consumer's re-arm
/// (`pos + cell_mask + 1`) would collide with the producer's publish value.
pub const MIN_CAPACITY: usize = 2;

/// Reference ceiling on the number of cells (2^28).
pub const DEFAULT_MAX_CAPACITY: usize = 1 << 28;

/// Policy for sizing queues and for the retrying wrappers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// Capacity floor. Values below [`MIN_CAPACITY`] are raised to it.
    pub min_capacity: usize,
    /// Capacity ceiling, guarding against overflow and pathological requests.
    pub max_capacity: usize,
    /// Pace contention retries with [`Backoff`](crate::Backoff) instead of a
    /// tight spin.
    pub backoff: bool,
    /// Enable metrics collection (slight overhead)
    pub enable_metrics: bool,
}

impl Config {
    /// Creates a new configuration with custom settings.
    pub const fn new(
        min_capacity: usize,
        max_capacity: usize,
        backoff: bool,
        enable_metrics: bool,
    ) -> Self {
        Self {
            min_capacity,
            max_capacity,
            backoff,
            enable_metrics,
        }
    }

    /// Returns the floor actually enforced.
    #[inline]
    pub const fn effective_min(&self) -> usize {
        if self.min_capacity < MIN_CAPACITY {
            MIN_CAPACITY
        } else {
            self.min_capacity
        }
    }

    /// Checks a requested capacity against this policy.
    ///
    /// The checks run in a fixed order: too small, too big, not a power of
    /// two. A non-power-of-two above the ceiling therefore reports `TooBig`.
    pub const fn validate_capacity(&self, capacity: usize) -> Result<(), InitError> {
        let min = self.effective_min();
        if capacity < min {
            return Err(InitError::TooSmall { capacity, min });
        }
        if capacity > self.max_capacity {
            return Err(InitError::TooBig {
                capacity,
                max: self.max_capacity,
            });
        }
        if !capacity.is_power_of_two() {
            return Err(InitError::NotPowerOfTwo { capacity });
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        LOW_LATENCY_CONFIG
    }
}

/// Reference behaviour: tight spin on contention, no counters.
pub const LOW_LATENCY_CONFIG: Config = Config::new(MIN_CAPACITY, DEFAULT_MAX_CAPACITY, false, false);

/// Many-core contention: retries back off and yield.
pub const CONTENDED_CONFIG: Config = Config::new(MIN_CAPACITY, DEFAULT_MAX_CAPACITY, true, false);
