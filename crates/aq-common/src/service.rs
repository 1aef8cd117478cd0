use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use thiserror::Error;
use tracing::instrument;

use crate::api::queue_status::{BulkEnqueueResponse, DailyStats, QueueStatusResponse, RejectedUrl};
use crate::matching::ranking::{MatchExplanation, RankingService};
use crate::matching::scoring::{MatchResult, MatchScorer};
use crate::matching::weights::{Weights, WeightsError};
use crate::queue::application_queue::{ApplicationQueue, QueueError, QueueItem};
use crate::queue::rate_limiter::DailyRateLimiter;
use crate::{CandidateProfile, JobPosting};

pub const BULK_ENQUEUE_CAP: usize = 50;
pub const STAGGER_INTERVAL_MINUTES: i64 = 5;

/// Failure talking to an external collaborator (job board, profile store,
/// notification channel).
#[derive(Debug, Error)]
pub enum ExternalError {
    #[error("{component} is unavailable: {message}")]
    Unavailable {
        component: &'static str,
        message: String,
    },
    #[error("candidate {0} not found")]
    UnknownCandidate(i64),
    #[error("job {0} not found")]
    UnknownJob(String),
}

/// Result of one browser automation attempt. Failures carry no further
/// classification; every failure draws from the same retry budget.
#[derive(Debug, Clone)]
pub struct Outcome {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    ApplicationSubmitted,
    ApplicationFailed,
}

/// Filter passed through to the job source.
#[derive(Debug, Clone, Default)]
pub struct JobFilter {
    pub keywords: Option<String>,
    pub location: Option<String>,
    pub remote_only: bool,
}

#[async_trait]
pub trait JobRepository: Send + Sync {
    async fn fetch(&self, filter: &JobFilter) -> Result<Vec<JobPosting>, ExternalError>;
}

#[async_trait]
pub trait ProfileProvider: Send + Sync {
    async fn load(&self, candidate_id: i64) -> Result<CandidateProfile, ExternalError>;
}

/// The actual form-filling mechanics live behind this trait; the queue core
/// only sees the boolean outcome.
#[async_trait]
pub trait BrowserAutomationAgent: Send + Sync {
    async fn apply(&self, item: &QueueItem, profile: &CandidateProfile) -> Outcome;
}

/// Best-effort delivery; callers log and move on when this fails.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(
        &self,
        candidate_id: i64,
        message: &str,
        kind: NotificationKind,
    ) -> Result<(), ExternalError>;
}

#[derive(Debug, Error)]
pub enum RankError {
    #[error(transparent)]
    Weights(#[from] WeightsError),
    #[error(transparent)]
    External(#[from] ExternalError),
}

/// Locks a poisoned mutex anyway; queue state stays usable because every
/// mutation either completes or leaves the item untouched.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Front door for callers: ranking on one side, queue operations on the
/// other. Owns nothing blocking; the heavy lifting happens in the dispatcher.
pub struct ApplicationService {
    jobs: Arc<dyn JobRepository>,
    profiles: Arc<dyn ProfileProvider>,
    queue: Arc<Mutex<ApplicationQueue>>,
    limiter: Arc<Mutex<DailyRateLimiter>>,
    max_retries: u32,
}

impl ApplicationService {
    pub fn new(
        jobs: Arc<dyn JobRepository>,
        profiles: Arc<dyn ProfileProvider>,
        queue: Arc<Mutex<ApplicationQueue>>,
        limiter: Arc<Mutex<DailyRateLimiter>>,
        max_retries: u32,
    ) -> Self {
        Self {
            jobs,
            profiles,
            queue,
            limiter,
            max_retries,
        }
    }

    #[instrument(skip(self, weights, filter))]
    pub async fn rank(
        &self,
        candidate_id: i64,
        limit: usize,
        weights: Option<Weights>,
        filter: &JobFilter,
    ) -> Result<Vec<MatchResult>, RankError> {
        let scorer = match weights {
            Some(weights) => MatchScorer::new(weights)?,
            None => MatchScorer::with_default_weights(),
        };
        let profile = self.profiles.load(candidate_id).await?;
        let jobs = self.jobs.fetch(filter).await?;
        Ok(RankingService::new(scorer).rank(&profile, &jobs, limit))
    }

    pub async fn explain_match(
        &self,
        candidate_id: i64,
        job_id: &str,
    ) -> Result<MatchExplanation, RankError> {
        let profile = self.profiles.load(candidate_id).await?;
        let jobs = self.jobs.fetch(&JobFilter::default()).await?;
        let job = jobs
            .iter()
            .find(|job| job.id == job_id)
            .ok_or_else(|| ExternalError::UnknownJob(job_id.to_string()))?;
        let service = RankingService::new(MatchScorer::with_default_weights());
        Ok(service.explain(&profile, job))
    }

    /// Queue a single application. The daily budget is only charged once the
    /// item passes validation and duplicate checks.
    #[instrument(skip(self))]
    pub fn enqueue(
        &self,
        candidate_id: i64,
        job_url: &str,
        job_id: Option<String>,
        priority: i32,
    ) -> Result<QueueItem, QueueError> {
        let now = Utc::now();
        let mut limiter = lock(&self.limiter);
        if limiter.remaining(candidate_id, now) == 0 {
            return Err(QueueError::RateLimited { remaining: 0 });
        }

        let mut item = QueueItem::new(candidate_id, job_url, job_id, self.max_retries);
        item.priority = priority;

        let admitted = lock(&self.queue).enqueue(item)?;
        limiter.check_and_reserve(candidate_id, 1, now);
        Ok(admitted)
    }

    /// Queue up to [`BULK_ENQUEUE_CAP`] applications in one call. The whole
    /// batch is rejected when it exceeds the remaining daily budget; admitted
    /// items are staggered five minutes apart to avoid hammering job sites.
    #[instrument(skip(self, job_urls), fields(count = job_urls.len()))]
    pub fn bulk_enqueue(
        &self,
        candidate_id: i64,
        job_urls: &[String],
        priority: i32,
        stagger: bool,
    ) -> Result<BulkEnqueueResponse, QueueError> {
        if job_urls.is_empty() {
            return Err(QueueError::Validation("no job URLs supplied".into()));
        }
        if job_urls.len() > BULK_ENQUEUE_CAP {
            return Err(QueueError::Validation(format!(
                "at most {BULK_ENQUEUE_CAP} URLs per bulk request, got {}",
                job_urls.len()
            )));
        }

        let now = Utc::now();
        let requested = job_urls.len() as u32;
        let mut limiter = lock(&self.limiter);
        let reservation = limiter.check_and_reserve(candidate_id, requested, now);
        if !reservation.allowed {
            return Err(QueueError::RateLimited {
                remaining: reservation.remaining,
            });
        }
        drop(limiter);

        let mut queue = lock(&self.queue);
        let mut admitted = Vec::new();
        let mut rejected = Vec::new();
        for (index, url) in job_urls.iter().enumerate() {
            let mut item = QueueItem::new(candidate_id, url, None, self.max_retries);
            item.priority = priority;
            if stagger {
                item.scheduled_for =
                    Some(now + Duration::minutes(index as i64 * STAGGER_INTERVAL_MINUTES));
            }
            match queue.enqueue(item) {
                Ok(item) => admitted.push(item),
                Err(err) => rejected.push(RejectedUrl {
                    job_url: url.clone(),
                    reason: err.to_string(),
                }),
            }
        }

        Ok(BulkEnqueueResponse { admitted, rejected })
    }

    /// Lock order is limiter first, queue second, same as the enqueue paths.
    pub fn queue_status(&self, candidate_id: i64) -> QueueStatusResponse {
        let now = Utc::now();
        let limiter = lock(&self.limiter);
        let queue = lock(&self.queue);

        let limit = limiter.limit_for(candidate_id);
        let used = limiter.used_today(candidate_id, now);
        let remaining = limiter.remaining(candidate_id, now);
        let percentage_used = if limit == 0 {
            100.0
        } else {
            used as f64 / limit as f64 * 100.0
        };

        QueueStatusResponse {
            pending: queue
                .list_pending(candidate_id)
                .into_iter()
                .map(Into::into)
                .collect(),
            processing: queue.processing(candidate_id),
            daily_stats: DailyStats {
                applications_today: used,
                daily_limit: limit,
                remaining,
                percentage_used,
            },
            recent_applications: queue.recent_records(candidate_id, 10),
        }
    }

    pub fn cancel(&self, candidate_id: i64, item_id: u64) -> Result<(), QueueError> {
        lock(&self.queue).cancel(item_id, candidate_id)
    }
}

// Re-exported so integrations only need the service module for queue wiring.
pub use crate::queue::dispatcher::SharedQueue;

impl ApplicationService {
    /// Handle for wiring the same queue into a [`crate::queue::dispatcher::Dispatcher`].
    pub fn queue_handle(&self) -> Arc<Mutex<ApplicationQueue>> {
        Arc::clone(&self.queue)
    }
}
