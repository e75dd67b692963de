//! Tick scheduler configuration (spec §5 "configurable worker pool / poll
//! interval"), loaded the way the donor's persistence crate loads its
//! `DbConfig`: `once_cell::Lazy` over environment variables, with sane
//! defaults so tests never need a `.env` file.

use std::time::Duration;

use once_cell::sync::Lazy;

const DEFAULT_WORKERS: usize = 4;
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    pub workers: usize,
    pub poll_interval: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl SchedulerConfig {
    pub fn new(workers: usize, poll_interval: Duration) -> Self {
        Self { workers, poll_interval }
    }

    /// Reads `FLOWLITE_SCHEDULER_WORKERS` and `FLOWLITE_SCHEDULER_POLL_MS`,
    /// falling back to defaults for anything unset or unparsable.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();
        let workers = std::env::var("FLOWLITE_SCHEDULER_WORKERS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_WORKERS);
        let poll_interval = std::env::var("FLOWLITE_SCHEDULER_POLL_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_POLL_INTERVAL);
        Self { workers, poll_interval }
    }
}

/// Process-wide default, read once on first access.
pub static SCHEDULER_CONFIG: Lazy<SchedulerConfig> = Lazy::new(SchedulerConfig::from_env);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let cfg = SchedulerConfig::default();
        assert!(cfg.workers > 0);
        assert!(cfg.poll_interval > Duration::ZERO);
    }
}
