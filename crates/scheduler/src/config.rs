//! Tick-loop tuning, read from the environment with typed defaults —
//! the same `Default`-then-`env`-override shape as `engine::ExecutorConfig`.

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub tick_interval: Duration,
    pub lookahead: chrono::Duration,
    pub max_catchup_per_tick: u32,
    pub default_overlap_policy: crate::model::OverlapPolicy,
    pub default_catchup_policy: crate::model::CatchupPolicy,
    pub default_jitter_ms: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(1000),
            lookahead: chrono::Duration::milliseconds(60_000),
            max_catchup_per_tick: 100,
            default_overlap_policy: crate::model::OverlapPolicy::Allow,
            default_catchup_policy: crate::model::CatchupPolicy::None,
            default_jitter_ms: 0,
        }
    }
}

impl Config {
    /// Layer environment overrides (`TICK_MS`, `LOOKAHEAD_MS`,
    /// `MAX_CATCHUP_PER_TICK`, `DEFAULT_OVERLAP_POLICY`,
    /// `DEFAULT_CATCHUP_POLICY`, `DEFAULT_JITTER_MS`) on top of the defaults.
    /// Malformed values fall back to the default rather than erroring —
    /// matching the teacher's `DATABASE_URL` `unwrap_or_else` convention.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(v) = std::env::var("TICK_MS").and_then(|s| s.parse::<u64>().map_err(|_| std::env::VarError::NotPresent)) {
            config.tick_interval = Duration::from_millis(v);
        }
        if let Ok(v) = std::env::var("LOOKAHEAD_MS").and_then(|s| s.parse::<i64>().map_err(|_| std::env::VarError::NotPresent)) {
            config.lookahead = chrono::Duration::milliseconds(v);
        }
        if let Ok(v) = std::env::var("MAX_CATCHUP_PER_TICK").and_then(|s| s.parse::<u32>().map_err(|_| std::env::VarError::NotPresent)) {
            config.max_catchup_per_tick = v;
        }
        if let Ok(s) = std::env::var("DEFAULT_OVERLAP_POLICY") {
            if let Some(policy) = crate::model::OverlapPolicy::parse(&s) {
                config.default_overlap_policy = policy;
            }
        }
        if let Ok(s) = std::env::var("DEFAULT_CATCHUP_POLICY") {
            if let Some(policy) = crate::model::CatchupPolicy::parse(&s) {
                config.default_catchup_policy = policy;
            }
        }
        if let Ok(v) = std::env::var("DEFAULT_JITTER_MS").and_then(|s| s.parse::<u32>().map_err(|_| std::env::VarError::NotPresent)) {
            config.default_jitter_ms = v;
        }

        config
    }
}
