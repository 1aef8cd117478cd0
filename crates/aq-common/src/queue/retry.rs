use chrono::{DateTime, Duration, Utc};

use crate::queue::application_queue::QueueItem;

pub const DEFAULT_BACKOFF_SECONDS: i64 = 60;

/// Computes retry eligibility and timing for failed queue items. The backoff
/// is a fixed delay, not exponential.
#[derive(Debug, Clone, Copy)]
pub struct RetryScheduler {
    backoff_seconds: i64,
}

impl Default for RetryScheduler {
    fn default() -> Self {
        Self {
            backoff_seconds: DEFAULT_BACKOFF_SECONDS,
        }
    }
}

impl RetryScheduler {
    pub fn new(backoff_seconds: i64) -> Self {
        Self { backoff_seconds }
    }

    /// True while the item has retry budget left.
    pub fn should_retry(&self, item: &QueueItem) -> bool {
        item.retry_count < item.max_retries
    }

    pub fn next_retry_at(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now + Duration::seconds(self.backoff_seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::application_queue::QueueItem;

    #[test]
    fn backoff_is_fixed() {
        let scheduler = RetryScheduler::default();
        let now = Utc::now();
        assert_eq!(scheduler.next_retry_at(now), now + Duration::seconds(60));

        let longer = RetryScheduler::new(300);
        assert_eq!(longer.next_retry_at(now), now + Duration::seconds(300));
    }

    #[test]
    fn retry_budget_is_exhausted_at_max() {
        let scheduler = RetryScheduler::default();
        let mut item = QueueItem::new(1, "https://example.com/job", None, 3);
        assert!(scheduler.should_retry(&item));

        item.retry_count = item.max_retries - 1;
        assert!(scheduler.should_retry(&item));

        item.retry_count = item.max_retries;
        assert!(!scheduler.should_retry(&item));
    }
}
