//! TigerStyle constants for Shoal
//!
//! All limits are explicit, use big-endian naming (most significant first),
//! and include units in the name.

// =============================================================================
// Backpressure Limits
// =============================================================================

/// Default size of the shared permit pool (queued + in-flight messages)
pub const RUNTIME_MESSAGES_COUNT_DEFAULT: usize = 10_000;

/// Upper bound for the permit pool; `stop()` acquires the whole pool at once
pub const RUNTIME_MESSAGES_COUNT_MAX: usize = u32::MAX as usize;

/// Default time `stop()` waits for outstanding messages in milliseconds (30 sec)
pub const RUNTIME_SHUTDOWN_WAIT_MS_DEFAULT: u64 = 30 * 1000;

// =============================================================================
// Registry / Eviction Sweep
// =============================================================================

/// Default period in which every registered actor is pinged once (1 min)
pub const PING_PERIOD_MS_DEFAULT: u64 = 60 * 1000;

/// Default number of actors pinged per sweep tick
pub const PING_BATCH_SIZE_PREFERRED_DEFAULT: usize = 100;

/// Lower bound for the sleep between sweep ticks in milliseconds (1 sec)
pub const PING_BATCH_PERIOD_MS_MIN: u64 = 1000;

/// Default time the registry waits for actors to drain on stop (30 sec)
pub const REGISTRY_SHUTDOWN_WAIT_MS_DEFAULT: u64 = 30 * 1000;

/// Maximum shutdown wait accepted by configuration (10 min)
pub const SHUTDOWN_WAIT_MS_MAX: u64 = 10 * 60 * 1000;

// =============================================================================
// Logging
// =============================================================================

/// Service name reported by telemetry when none is configured
pub const SERVICE_NAME_DEFAULT: &str = "shoal";

// Compile-time assertions for constant validity
const _: () = {
    assert!(RUNTIME_MESSAGES_COUNT_DEFAULT > 0);
    assert!(RUNTIME_MESSAGES_COUNT_DEFAULT <= RUNTIME_MESSAGES_COUNT_MAX);
    assert!(PING_BATCH_PERIOD_MS_MIN > 0);
    assert!(PING_PERIOD_MS_DEFAULT >= PING_BATCH_PERIOD_MS_MIN);
    assert!(PING_BATCH_SIZE_PREFERRED_DEFAULT > 0);
    assert!(RUNTIME_SHUTDOWN_WAIT_MS_DEFAULT <= SHUTDOWN_WAIT_MS_MAX);
    assert!(REGISTRY_SHUTDOWN_WAIT_MS_DEFAULT <= SHUTDOWN_WAIT_MS_MAX);
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sweep_defaults_ping_every_actor_within_period() {
        // A full sweep at the floor period must still fit inside the default period
        assert!(PING_PERIOD_MS_DEFAULT / PING_BATCH_PERIOD_MS_MIN >= 1);
    }

    #[test]
    fn test_limits_have_units_in_names() {
        let _: u64 = RUNTIME_SHUTDOWN_WAIT_MS_DEFAULT;
        let _: u64 = PING_BATCH_PERIOD_MS_MIN;
        let _: usize = RUNTIME_MESSAGES_COUNT_MAX;
    }
}
