//! Adaptive ping batch sizing for the eviction sweep
//!
//! The sweep aims to ping every registered actor once per `ping_period`,
//! spread over several ticks. Ticks never come closer than the floor period;
//! when the population is large, batches grow instead.

use std::time::Duration;

/// Size of the next sweep batch and the sleep that follows it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PingBatch {
    /// Actors pinged in the batch
    pub size: usize,
    /// Sleep after the batch in milliseconds
    pub period_ms: u64,
}

impl PingBatch {
    pub fn period(&self) -> Duration {
        Duration::from_millis(self.period_ms)
    }
}

/// Compute the next batch for `population` registered actors
///
/// - no actors: `(0, ping_period)`
/// - otherwise `size = min(preferred, population)` and
///   `period = ping_period * size / population`
/// - a period below the floor is raised to the floor and the size grows to
///   `floor * population / ping_period`
/// - a period above `ping_period` is capped
pub fn calculate_ping_batch(
    population: usize,
    ping_period_ms: u64,
    preferred_batch_size: usize,
    min_batch_period_ms: u64,
) -> PingBatch {
    debug_assert!(ping_period_ms > 0, "ping period must be positive");
    debug_assert!(preferred_batch_size > 0, "batch size must be positive");

    if population == 0 {
        return PingBatch {
            size: 0,
            period_ms: ping_period_ms,
        };
    }

    let population_wide = population as u128;
    let mut size = preferred_batch_size.min(population) as u128;
    let mut period = ping_period_ms as u128 * size / population_wide;

    if period < min_batch_period_ms as u128 {
        period = min_batch_period_ms as u128;
        size = min_batch_period_ms as u128 * population_wide / ping_period_ms as u128;
    } else if period > ping_period_ms as u128 {
        period = ping_period_ms as u128;
    }

    PingBatch {
        size: usize::try_from(size).unwrap_or(usize::MAX),
        period_ms: u64::try_from(period).unwrap_or(u64::MAX),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FLOOR_MS: u64 = 1000;

    #[test]
    fn test_empty_population() {
        let batch = calculate_ping_batch(0, 10_000, 4, FLOOR_MS);
        assert_eq!(batch, PingBatch { size: 0, period_ms: 10_000 });
    }

    #[test]
    fn test_preferred_batch_spreads_over_period() {
        let batch = calculate_ping_batch(10, 10_000, 4, FLOOR_MS);
        assert_eq!(batch, PingBatch { size: 4, period_ms: 4000 });
        assert_eq!(batch.period(), Duration::from_secs(4));
    }

    #[test]
    fn test_floor_period_grows_batch() {
        let batch = calculate_ping_batch(10, 1000, 4, FLOOR_MS);
        assert_eq!(batch, PingBatch { size: 10, period_ms: 1000 });
    }

    #[test]
    fn test_small_population_pinged_at_once() {
        let batch = calculate_ping_batch(3, 60_000, 100, FLOOR_MS);
        assert_eq!(batch, PingBatch { size: 3, period_ms: 60_000 });
    }

    #[test]
    fn test_large_population() {
        let batch = calculate_ping_batch(1_000_000, 60_000, 100, FLOOR_MS);
        assert_eq!(batch.period_ms, FLOOR_MS);
        assert_eq!(batch.size, 16_666);
    }

    #[test]
    fn test_period_shorter_than_floor_pings_population_repeatedly() {
        let batch = calculate_ping_batch(3, 500, 100, FLOOR_MS);
        assert_eq!(batch, PingBatch { size: 6, period_ms: FLOOR_MS });
    }
}
