use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::queue::retry::RetryScheduler;

pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const MIN_PRIORITY: i32 = 1;
pub const MAX_PRIORITY: i32 = 5;
pub const DEFAULT_PRIORITY: i32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueStatus {
    Queued,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl QueueStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueueStatus::Queued => "queued",
            QueueStatus::Processing => "processing",
            QueueStatus::Completed => "completed",
            QueueStatus::Failed => "failed",
            QueueStatus::Cancelled => "cancelled",
        }
    }

    /// Terminal statuses never transition again.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            QueueStatus::Completed | QueueStatus::Failed | QueueStatus::Cancelled
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApplicationOutcome {
    Submitted,
    Failed,
}

/// Audit record of a finished application attempt. Also consulted at enqueue
/// time so a candidate never applies to the same posting twice.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationRecord {
    pub candidate_id: i64,
    pub job_url: String,
    pub job_id: Option<String>,
    pub outcome: ApplicationOutcome,
    pub method: String,
    pub timestamp: DateTime<Utc>,
    pub note: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueItem {
    pub id: u64,
    pub candidate_id: i64,
    pub job_id: Option<String>,
    pub job_url: String,
    pub priority: i32,
    pub status: QueueStatus,
    pub created_at: DateTime<Utc>,
    pub scheduled_for: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub next_retry_at: Option<DateTime<Utc>>,
    pub retry_count: u32,
    pub max_retries: u32,
    pub locked_by: Option<String>,
    pub result_summary: Option<String>,
    pub error_message: Option<String>,
}

impl QueueItem {
    pub fn new(candidate_id: i64, job_url: &str, job_id: Option<String>, max_retries: u32) -> Self {
        Self {
            id: 0,
            candidate_id,
            job_id,
            job_url: job_url.to_string(),
            priority: DEFAULT_PRIORITY,
            status: QueueStatus::Queued,
            created_at: Utc::now(),
            scheduled_for: None,
            started_at: None,
            completed_at: None,
            next_retry_at: None,
            retry_count: 0,
            max_retries,
            locked_by: None,
            result_summary: None,
            error_message: None,
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum QueueError {
    #[error("invalid request: {0}")]
    Validation(String),
    #[error("an active application for {job_url} already exists")]
    Duplicate { job_url: String },
    #[error("daily application limit reached ({remaining} remaining)")]
    RateLimited { remaining: u32 },
    #[error("queue item {0} not found")]
    NotFound(u64),
    #[error("queue item {id} is {status} and cannot transition")]
    InvalidState { id: u64, status: &'static str },
    #[error("queue item {0} is already claimed by another worker")]
    AlreadyClaimed(u64),
}

/// In-memory application queue with the full item state machine. Shared
/// between the dispatcher and the service layer behind a mutex; every
/// operation completes without blocking.
#[derive(Default)]
pub struct ApplicationQueue {
    pub items: Vec<QueueItem>,
    pub records: Vec<ApplicationRecord>,
    next_id: u64,
}

impl ApplicationQueue {
    /// Admit a new item, or reject it when the URL is invalid, the priority
    /// is out of range, an active item already covers the same URL, or the
    /// candidate has already applied to it.
    pub fn enqueue(&mut self, mut item: QueueItem) -> Result<QueueItem, QueueError> {
        if item.job_url.trim().is_empty() {
            return Err(QueueError::Validation("job URL is required".into()));
        }
        if !(MIN_PRIORITY..=MAX_PRIORITY).contains(&item.priority) {
            return Err(QueueError::Validation(format!(
                "priority must be between {MIN_PRIORITY} and {MAX_PRIORITY}, got {}",
                item.priority
            )));
        }

        let duplicate = self.items.iter().any(|existing| {
            existing.candidate_id == item.candidate_id
                && existing.job_url == item.job_url
                && !existing.status.is_terminal()
        });
        let already_applied = self.records.iter().any(|record| {
            record.candidate_id == item.candidate_id && record.job_url == item.job_url
        });
        if duplicate || already_applied {
            return Err(QueueError::Duplicate {
                job_url: item.job_url,
            });
        }

        self.next_id += 1;
        item.id = self.next_id;
        self.items.push(item.clone());
        Ok(item)
    }

    /// Cancel a queued item. Processing items cannot be cancelled; the
    /// external agent has no abort hook, so the caller must wait for the
    /// terminal transition.
    pub fn cancel(&mut self, item_id: u64, candidate_id: i64) -> Result<(), QueueError> {
        let item = self
            .items
            .iter_mut()
            .find(|item| item.id == item_id && item.candidate_id == candidate_id)
            .ok_or(QueueError::NotFound(item_id))?;

        if item.status != QueueStatus::Queued {
            return Err(QueueError::InvalidState {
                id: item_id,
                status: item.status.as_str(),
            });
        }

        item.status = QueueStatus::Cancelled;
        item.completed_at = Some(Utc::now());
        Ok(())
    }

    fn eligible(item: &QueueItem, now: DateTime<Utc>) -> bool {
        item.status == QueueStatus::Queued
            && item.scheduled_for.map(|ts| ts <= now).unwrap_or(true)
            && item.next_retry_at.map(|ts| ts <= now).unwrap_or(true)
    }

    /// Claim the best eligible item for `worker_id`: highest priority first,
    /// oldest first within a priority.
    pub fn claim_next(&mut self, worker_id: &str) -> Option<QueueItem> {
        let now = Utc::now();
        let idx = self
            .items
            .iter()
            .enumerate()
            .filter(|(_, item)| Self::eligible(item, now))
            .min_by(|(_, a), (_, b)| {
                b.priority
                    .cmp(&a.priority)
                    .then(a.created_at.cmp(&b.created_at))
            })
            .map(|(idx, _)| idx)?;

        let item = &mut self.items[idx];
        item.status = QueueStatus::Processing;
        item.locked_by = Some(worker_id.to_string());
        item.started_at = Some(now);
        item.next_retry_at = None;
        Some(item.clone())
    }

    /// Explicit queued → processing transition for callers that picked an
    /// item themselves.
    pub fn mark_processing(&mut self, item_id: u64, worker_id: &str) -> Result<(), QueueError> {
        let item = self.item_mut(item_id)?;
        match item.status {
            QueueStatus::Queued => {
                item.status = QueueStatus::Processing;
                item.locked_by = Some(worker_id.to_string());
                item.started_at = Some(Utc::now());
                Ok(())
            }
            QueueStatus::Processing => Err(QueueError::AlreadyClaimed(item_id)),
            other => Err(QueueError::InvalidState {
                id: item_id,
                status: other.as_str(),
            }),
        }
    }

    pub fn mark_completed(
        &mut self,
        item_id: u64,
        result_summary: &str,
    ) -> Result<(), QueueError> {
        let item = self.item_mut(item_id)?;
        if item.status != QueueStatus::Processing {
            return Err(QueueError::InvalidState {
                id: item_id,
                status: item.status.as_str(),
            });
        }

        let now = Utc::now();
        item.status = QueueStatus::Completed;
        item.result_summary = Some(result_summary.to_string());
        item.completed_at = Some(now);
        item.locked_by = None;

        let record = ApplicationRecord {
            candidate_id: item.candidate_id,
            job_url: item.job_url.clone(),
            job_id: item.job_id.clone(),
            outcome: ApplicationOutcome::Submitted,
            method: "automated".to_string(),
            timestamp: now,
            note: Some(result_summary.to_string()),
        };
        self.records.push(record);
        Ok(())
    }

    /// Record a failed attempt. The item goes back to queued with a retry
    /// timestamp while budget remains, and terminally failed once the budget
    /// is spent.
    pub fn mark_failed(
        &mut self,
        item_id: u64,
        error_message: &str,
        scheduler: &RetryScheduler,
    ) -> Result<QueueStatus, QueueError> {
        let item = self.item_mut(item_id)?;
        if item.status != QueueStatus::Processing {
            return Err(QueueError::InvalidState {
                id: item_id,
                status: item.status.as_str(),
            });
        }

        let now = Utc::now();
        item.retry_count += 1;
        item.error_message = Some(error_message.to_string());
        item.locked_by = None;
        item.started_at = None;

        if item.retry_count < item.max_retries {
            item.status = QueueStatus::Queued;
            item.next_retry_at = Some(scheduler.next_retry_at(now));
        } else {
            item.status = QueueStatus::Failed;
            item.completed_at = Some(now);
            let record = ApplicationRecord {
                candidate_id: item.candidate_id,
                job_url: item.job_url.clone(),
                job_id: item.job_id.clone(),
                outcome: ApplicationOutcome::Failed,
                method: "automated".to_string(),
                timestamp: now,
                note: Some(error_message.to_string()),
            };
            let status = item.status;
            self.records.push(record);
            return Ok(status);
        }
        Ok(item.status)
    }

    /// Return processing items whose lease expired to the queued state so
    /// another worker can pick them up. Does not touch `retry_count`; the
    /// crash is not the item's fault.
    pub fn sweep_expired_leases(&mut self, lease_timeout: Duration) -> usize {
        let now = Utc::now();
        let mut recovered = 0;
        for item in &mut self.items {
            if item.status != QueueStatus::Processing {
                continue;
            }
            let expired = item
                .started_at
                .map(|started| started + lease_timeout <= now)
                .unwrap_or(true);
            if expired {
                item.status = QueueStatus::Queued;
                item.locked_by = None;
                item.started_at = None;
                item.next_retry_at = Some(now);
                recovered += 1;
            }
        }
        recovered
    }

    /// Pending items for one candidate with their 1-based queue position,
    /// ordered the way the dispatcher will claim them.
    pub fn list_pending(&self, candidate_id: i64) -> Vec<(usize, QueueItem)> {
        let mut pending: Vec<QueueItem> = self
            .items
            .iter()
            .filter(|item| item.candidate_id == candidate_id && item.status == QueueStatus::Queued)
            .cloned()
            .collect();
        pending.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then(a.created_at.cmp(&b.created_at))
        });
        pending
            .into_iter()
            .enumerate()
            .map(|(idx, item)| (idx + 1, item))
            .collect()
    }

    pub fn processing(&self, candidate_id: i64) -> Vec<QueueItem> {
        self.items
            .iter()
            .filter(|item| {
                item.candidate_id == candidate_id && item.status == QueueStatus::Processing
            })
            .cloned()
            .collect()
    }

    /// Most recent application records for one candidate, newest first.
    pub fn recent_records(&self, candidate_id: i64, limit: usize) -> Vec<ApplicationRecord> {
        let mut records: Vec<ApplicationRecord> = self
            .records
            .iter()
            .filter(|record| record.candidate_id == candidate_id)
            .cloned()
            .collect();
        records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        records.truncate(limit);
        records
    }

    /// Drop terminal items older than the retention window. Records are kept.
    pub fn cleanup_terminal_items(&mut self, retention: Duration) -> usize {
        let cutoff = Utc::now() - retention;
        let before = self.items.len();
        self.items.retain(|item| {
            !(item.status.is_terminal()
                && item.completed_at.map(|ts| ts < cutoff).unwrap_or(false))
        });
        before - self.items.len()
    }

    fn item_mut(&mut self, item_id: u64) -> Result<&mut QueueItem, QueueError> {
        self.items
            .iter_mut()
            .find(|item| item.id == item_id)
            .ok_or(QueueError::NotFound(item_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(candidate_id: i64, url: &str, priority: i32) -> QueueItem {
        let mut item = QueueItem::new(candidate_id, url, None, DEFAULT_MAX_RETRIES);
        item.priority = priority;
        item
    }

    #[test]
    fn enqueue_assigns_ids_and_rejects_duplicates() {
        let mut queue = ApplicationQueue::default();
        let first = queue.enqueue(item(1, "https://example.com/a", 3)).unwrap();
        assert_eq!(first.id, 1);

        let err = queue
            .enqueue(item(1, "https://example.com/a", 3))
            .unwrap_err();
        assert!(matches!(err, QueueError::Duplicate { .. }));

        // Same URL is fine for a different candidate.
        assert!(queue.enqueue(item(2, "https://example.com/a", 3)).is_ok());
    }

    #[test]
    fn enqueue_validates_url_and_priority() {
        let mut queue = ApplicationQueue::default();
        assert!(matches!(
            queue.enqueue(item(1, "   ", 3)),
            Err(QueueError::Validation(_))
        ));
        assert!(matches!(
            queue.enqueue(item(1, "https://example.com/a", 0)),
            Err(QueueError::Validation(_))
        ));
        assert!(matches!(
            queue.enqueue(item(1, "https://example.com/a", 6)),
            Err(QueueError::Validation(_))
        ));
    }

    #[test]
    fn already_applied_urls_are_rejected() {
        let mut queue = ApplicationQueue::default();
        let admitted = queue.enqueue(item(1, "https://example.com/a", 3)).unwrap();
        queue.claim_next("w1").unwrap();
        queue.mark_completed(admitted.id, "submitted").unwrap();

        // Terminal item no longer blocks as a duplicate, but the application
        // record does.
        let err = queue
            .enqueue(item(1, "https://example.com/a", 3))
            .unwrap_err();
        assert!(matches!(err, QueueError::Duplicate { .. }));
    }

    #[test]
    fn claim_order_is_priority_desc_then_fifo() {
        let mut queue = ApplicationQueue::default();
        queue.enqueue(item(1, "https://example.com/p1", 1)).unwrap();
        queue.enqueue(item(1, "https://example.com/p5", 5)).unwrap();
        queue.enqueue(item(1, "https://example.com/p3", 3)).unwrap();
        queue
            .enqueue(item(1, "https://example.com/p5-later", 5))
            .unwrap();

        let urls: Vec<String> = std::iter::from_fn(|| queue.claim_next("w1"))
            .map(|claimed| claimed.job_url)
            .collect();
        assert_eq!(
            urls,
            vec![
                "https://example.com/p5",
                "https://example.com/p5-later",
                "https://example.com/p3",
                "https://example.com/p1",
            ]
        );
    }

    #[test]
    fn scheduled_items_wait_for_their_time() {
        let mut queue = ApplicationQueue::default();
        let admitted = queue.enqueue(item(1, "https://example.com/a", 3)).unwrap();
        queue.items[0].scheduled_for = Some(Utc::now() + Duration::minutes(10));

        assert!(queue.claim_next("w1").is_none());

        queue.items[0].scheduled_for = Some(Utc::now() - Duration::minutes(1));
        assert_eq!(queue.claim_next("w1").map(|c| c.id), Some(admitted.id));
    }

    #[test]
    fn claim_sets_processing_metadata() {
        let mut queue = ApplicationQueue::default();
        queue.enqueue(item(1, "https://example.com/a", 3)).unwrap();

        let claimed = queue.claim_next("worker-7").unwrap();
        assert_eq!(claimed.status, QueueStatus::Processing);
        assert_eq!(claimed.locked_by.as_deref(), Some("worker-7"));
        assert!(claimed.started_at.is_some());

        // A second claim finds nothing.
        assert!(queue.claim_next("worker-8").is_none());
    }

    #[test]
    fn completed_item_produces_a_submitted_record() {
        let mut queue = ApplicationQueue::default();
        let admitted = queue.enqueue(item(1, "https://example.com/a", 3)).unwrap();
        queue.claim_next("w1").unwrap();
        queue.mark_completed(admitted.id, "form submitted").unwrap();

        let stored = &queue.items[0];
        assert_eq!(stored.status, QueueStatus::Completed);
        assert!(stored.completed_at.is_some());
        assert!(stored.locked_by.is_none());

        assert_eq!(queue.records.len(), 1);
        assert_eq!(queue.records[0].outcome, ApplicationOutcome::Submitted);
        assert_eq!(queue.records[0].note.as_deref(), Some("form submitted"));
    }

    #[test]
    fn failures_retry_until_the_budget_is_spent() {
        let mut queue = ApplicationQueue::default();
        let admitted = queue.enqueue(item(1, "https://example.com/a", 3)).unwrap();
        let scheduler = RetryScheduler::default();

        for attempt in 1..3 {
            queue.items[0].next_retry_at = None;
            queue.claim_next("w1").unwrap();
            let status = queue
                .mark_failed(admitted.id, "captcha wall", &scheduler)
                .unwrap();
            assert_eq!(status, QueueStatus::Queued, "attempt {attempt}");
            assert_eq!(queue.items[0].retry_count, attempt);
            assert!(queue.items[0].next_retry_at.is_some());
        }

        queue.items[0].next_retry_at = None;
        queue.claim_next("w1").unwrap();
        let status = queue
            .mark_failed(admitted.id, "captcha wall", &scheduler)
            .unwrap();
        assert_eq!(status, QueueStatus::Failed);
        assert_eq!(queue.records.len(), 1);
        assert_eq!(queue.records[0].outcome, ApplicationOutcome::Failed);

        // Terminal items stay terminal.
        assert!(queue.claim_next("w1").is_none());
    }

    #[test]
    fn processing_items_cannot_be_cancelled() {
        let mut queue = ApplicationQueue::default();
        let admitted = queue.enqueue(item(1, "https://example.com/a", 3)).unwrap();
        queue.claim_next("w1").unwrap();

        let err = queue.cancel(admitted.id, 1).unwrap_err();
        assert_eq!(
            err,
            QueueError::InvalidState {
                id: admitted.id,
                status: "processing"
            }
        );
    }

    #[test]
    fn cancel_requires_the_owning_candidate() {
        let mut queue = ApplicationQueue::default();
        let admitted = queue.enqueue(item(1, "https://example.com/a", 3)).unwrap();

        assert_eq!(
            queue.cancel(admitted.id, 99).unwrap_err(),
            QueueError::NotFound(admitted.id)
        );
        assert!(queue.cancel(admitted.id, 1).is_ok());
        assert_eq!(queue.items[0].status, QueueStatus::Cancelled);
    }

    #[test]
    fn sweep_recovers_expired_leases_without_charging_retries() {
        let mut queue = ApplicationQueue::default();
        queue.enqueue(item(1, "https://example.com/a", 3)).unwrap();
        queue.claim_next("w1").unwrap();
        queue.items[0].started_at = Some(Utc::now() - Duration::hours(1));

        let recovered = queue.sweep_expired_leases(Duration::minutes(30));
        assert_eq!(recovered, 1);
        let swept = &queue.items[0];
        assert_eq!(swept.status, QueueStatus::Queued);
        assert_eq!(swept.retry_count, 0);
        assert!(swept.locked_by.is_none());
        assert!(swept.next_retry_at.is_some());
    }

    #[test]
    fn sweep_leaves_fresh_leases_alone() {
        let mut queue = ApplicationQueue::default();
        queue.enqueue(item(1, "https://example.com/a", 3)).unwrap();
        queue.claim_next("w1").unwrap();

        assert_eq!(queue.sweep_expired_leases(Duration::minutes(30)), 0);
        assert_eq!(queue.items[0].status, QueueStatus::Processing);
    }

    #[test]
    fn list_pending_reports_claim_order_positions() {
        let mut queue = ApplicationQueue::default();
        queue.enqueue(item(1, "https://example.com/low", 1)).unwrap();
        queue
            .enqueue(item(1, "https://example.com/high", 5))
            .unwrap();
        queue.enqueue(item(2, "https://example.com/other", 3)).unwrap();

        let pending = queue.list_pending(1);
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].0, 1);
        assert_eq!(pending[0].1.job_url, "https://example.com/high");
        assert_eq!(pending[1].0, 2);
        assert_eq!(pending[1].1.job_url, "https://example.com/low");
    }

    #[test]
    fn cleanup_drops_old_terminal_items_only() {
        let mut queue = ApplicationQueue::default();
        let old = queue.enqueue(item(1, "https://example.com/old", 3)).unwrap();
        queue.enqueue(item(1, "https://example.com/live", 3)).unwrap();
        queue.claim_next("w1").unwrap();
        queue.mark_completed(old.id, "done").unwrap();
        queue.items[0].completed_at = Some(Utc::now() - Duration::days(40));

        let dropped = queue.cleanup_terminal_items(Duration::days(30));
        assert_eq!(dropped, 1);
        assert_eq!(queue.items.len(), 1);
        assert_eq!(queue.items[0].job_url, "https://example.com/live");
        // The audit trail survives cleanup.
        assert_eq!(queue.records.len(), 1);
    }
}
