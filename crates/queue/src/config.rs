use std::time::Duration;

/// Worker poll loop knobs, following the same `from_env`-with-defaults shape
/// as `scheduler::Config`.
#[derive(Debug, Clone)]
pub struct Config {
    pub poll_interval: Duration,
    pub default_max_attempts: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self { poll_interval: Duration::from_millis(500), default_max_attempts: 3 }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let default = Self::default();
        let poll_interval = std::env::var("QUEUE_POLL_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_millis)
            .unwrap_or(default.poll_interval);
        let default_max_attempts = std::env::var("QUEUE_MAX_ATTEMPTS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(default.default_max_attempts);
        Self { poll_interval, default_max_attempts }
    }
}
