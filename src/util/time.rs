//! Time utilities for game simulation

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

/// Tick rate configuration
pub const SIMULATION_TPS: u32 = 20; // 20 ticks per second
pub const TICK_DURATION_MILLIS: u64 = 1_000 / SIMULATION_TPS as u64;

/// Full state is re-sent once per second
pub const FULL_STATE_INTERVAL_TICKS: u32 = SIMULATION_TPS;

/// Countdown decrements once per second
pub const COUNTDOWN_STEP: Duration = Duration::from_secs(1);

/// How long an activated powerup keeps the player invincible
pub const INVINCIBILITY_DURATION: Duration = Duration::from_secs(3);

/// Interval between simulation ticks
pub fn tick_duration() -> Duration {
    Duration::from_millis(TICK_DURATION_MILLIS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tick_is_fifty_millis() {
        assert_eq!(tick_duration(), Duration::from_millis(50));
        assert_eq!(FULL_STATE_INTERVAL_TICKS, 20);
    }

    #[test]
    fn uptime_starts_after_init() {
        init_server_time();
        assert!(uptime_secs() < 5);
    }
}
