use serde::{Deserialize, Serialize};

use crate::queue::application_queue::{ApplicationRecord, QueueItem};

/// A queued item together with its 1-based position in the claim order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingItem {
    pub position: usize,
    #[serde(flatten)]
    pub item: QueueItem,
}

impl From<(usize, QueueItem)> for PendingItem {
    fn from((position, item): (usize, QueueItem)) -> Self {
        Self { position, item }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyStats {
    pub applications_today: u32,
    pub daily_limit: u32,
    pub remaining: u32,
    pub percentage_used: f64,
}

/// Snapshot returned by the queue-status endpoint: everything a candidate
/// needs to see where their applications stand.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueStatusResponse {
    pub pending: Vec<PendingItem>,
    pub processing: Vec<QueueItem>,
    pub daily_stats: DailyStats,
    pub recent_applications: Vec<ApplicationRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectedUrl {
    pub job_url: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkEnqueueResponse {
    pub admitted: Vec<QueueItem>,
    pub rejected: Vec<RejectedUrl>,
}
