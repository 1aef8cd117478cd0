use crate::queue::application_queue::DEFAULT_MAX_RETRIES;
use crate::queue::rate_limiter::DEFAULT_DAILY_LIMIT;
use crate::queue::retry::DEFAULT_BACKOFF_SECONDS;

/// Runtime knobs for the queue side, read from `AQ_*` environment variables.
/// Every value has a working default so a bare process comes up sane.
#[derive(Debug, Clone, PartialEq)]
pub struct QueueConfig {
    pub poll_interval_secs: u64,
    pub worker_pool_size: usize,
    pub batch_limit: usize,
    pub lease_timeout_minutes: i64,
    pub apply_timeout_secs: u64,
    pub retry_backoff_secs: i64,
    pub max_retries: u32,
    pub daily_limit: u32,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 300,
            worker_pool_size: 2,
            batch_limit: 10,
            lease_timeout_minutes: 30,
            apply_timeout_secs: 25 * 60,
            retry_backoff_secs: DEFAULT_BACKOFF_SECONDS,
            max_retries: DEFAULT_MAX_RETRIES,
            daily_limit: DEFAULT_DAILY_LIMIT,
        }
    }
}

impl QueueConfig {
    pub fn from_env() -> Self {
        fn parse_u64(key: &str, default: u64) -> u64 {
            std::env::var(key)
                .ok()
                .and_then(|raw| raw.parse::<u64>().ok())
                .unwrap_or(default)
        }

        fn parse_u32(key: &str, default: u32) -> u32 {
            std::env::var(key)
                .ok()
                .and_then(|raw| raw.parse::<u32>().ok())
                .unwrap_or(default)
        }

        fn parse_i64(key: &str, default: i64) -> i64 {
            std::env::var(key)
                .ok()
                .and_then(|raw| raw.parse::<i64>().ok())
                .unwrap_or(default)
        }

        fn parse_usize(key: &str, default: usize) -> usize {
            std::env::var(key)
                .ok()
                .and_then(|raw| raw.parse::<usize>().ok())
                .unwrap_or(default)
        }

        let defaults = Self::default();
        Self {
            poll_interval_secs: parse_u64("AQ_POLL_INTERVAL_SECS", defaults.poll_interval_secs),
            worker_pool_size: parse_usize("AQ_WORKER_POOL_SIZE", defaults.worker_pool_size)
                .max(1),
            batch_limit: parse_usize("AQ_BATCH_LIMIT", defaults.batch_limit).max(1),
            lease_timeout_minutes: parse_i64(
                "AQ_LEASE_TIMEOUT_MINUTES",
                defaults.lease_timeout_minutes,
            ),
            apply_timeout_secs: parse_u64("AQ_APPLY_TIMEOUT_SECS", defaults.apply_timeout_secs),
            retry_backoff_secs: parse_i64("AQ_RETRY_BACKOFF_SECS", defaults.retry_backoff_secs),
            max_retries: parse_u32("AQ_MAX_RETRIES", defaults.max_retries),
            daily_limit: parse_u32("AQ_DAILY_LIMIT", defaults.daily_limit),
        }
    }
}
