//! Time utilities for the arena simulation

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Get current Unix timestamp in milliseconds
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_millis() as u64
}

/// Server start time for uptime tracking
static SERVER_START: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();

/// Initialize server start time (call once at startup)
pub fn init_server_time() {
    SERVER_START.get_or_init(Instant::now);
}

/// Get server uptime in seconds
pub fn uptime_secs() -> u64 {
    SERVER_START
        .get()
        .map(|start| start.elapsed().as_secs())
        .unwrap_or(0)
}

/// Default simulation rate
pub const SIMULATION_TPS: u32 = 60;
/// Highest supported simulation rate (1 ms ticks)
pub const MAX_SIMULATION_TPS: u32 = 1000;
/// Default snapshot cadence: one snapshot every N simulation ticks (60 / 3 = 20 Hz)
pub const SNAPSHOT_EVERY_TICKS: u32 = 3;
/// Default client sampling interval
pub const CLIENT_SAMPLE_INTERVAL_MS: u64 = 50;

/// Duration of one tick at the given rate, never shorter than one
/// `MAX_SIMULATION_TPS` tick
pub fn tick_duration(ticks_per_second: u32) -> Duration {
    let rate = ticks_per_second.clamp(1, MAX_SIMULATION_TPS);
    Duration::from_micros(1_000_000 / rate as u64)
}

/// Convert a wall-clock duration to a tick count, rounding up so that a
/// timer never expires early. Always at least one tick.
pub fn millis_to_ticks(duration_ms: u64, tick_interval_ms: u64) -> u64 {
    let interval = tick_interval_ms.max(1);
    duration_ms.div_ceil(interval).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn millis_to_ticks_rounds_up() {
        assert_eq!(millis_to_ticks(300, 50), 6);
        assert_eq!(millis_to_ticks(400, 50), 8);
        assert_eq!(millis_to_ticks(300, 16), 19);
        assert_eq!(millis_to_ticks(0, 50), 1);
    }

    #[test]
    fn tick_duration_at_sixty_hz() {
        assert_eq!(tick_duration(60), Duration::from_micros(16_666));
    }

    #[test]
    fn tick_duration_is_never_zero() {
        assert_eq!(tick_duration(0), Duration::from_secs(1));
        assert_eq!(tick_duration(2_000_000), Duration::from_millis(1));
    }
}
