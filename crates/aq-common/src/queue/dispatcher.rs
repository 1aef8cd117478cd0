use std::sync::{Arc, Mutex};
use std::time::Duration as StdDuration;

use chrono::Duration;
use tokio::sync::Semaphore;
use tokio::time::timeout;
use tracing::{info, instrument, warn};

use crate::queue::application_queue::{ApplicationQueue, QueueItem, QueueStatus};
use crate::queue::retry::RetryScheduler;
use crate::service::{
    lock, BrowserAutomationAgent, NotificationKind, NotificationSink, Outcome, ProfileProvider,
};

pub type SharedQueue = Arc<Mutex<ApplicationQueue>>;

#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    pub poll_interval: StdDuration,
    pub worker_pool_size: usize,
    pub batch_limit: usize,
    pub lease_timeout_minutes: i64,
    pub apply_timeout: StdDuration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            poll_interval: StdDuration::from_secs(300),
            worker_pool_size: 2,
            batch_limit: 10,
            lease_timeout_minutes: 30,
            apply_timeout: StdDuration::from_secs(25 * 60),
        }
    }
}

/// Polls the queue and drives claimed items through the automation agent
/// with a bounded worker pool. Queue and limiter locks are held only for the
/// state transitions, never across the automation call.
pub struct Dispatcher {
    queue: SharedQueue,
    profiles: Arc<dyn ProfileProvider>,
    agent: Arc<dyn BrowserAutomationAgent>,
    notifier: Arc<dyn NotificationSink>,
    retry: RetryScheduler,
    config: DispatcherConfig,
    permits: Arc<Semaphore>,
    worker_id: String,
}

impl Dispatcher {
    pub fn new(
        queue: SharedQueue,
        profiles: Arc<dyn ProfileProvider>,
        agent: Arc<dyn BrowserAutomationAgent>,
        notifier: Arc<dyn NotificationSink>,
        retry: RetryScheduler,
        config: DispatcherConfig,
        worker_id: &str,
    ) -> Self {
        let permits = Arc::new(Semaphore::new(config.worker_pool_size.max(1)));
        Self {
            queue,
            profiles,
            agent,
            notifier,
            retry,
            config,
            permits,
            worker_id: worker_id.to_string(),
        }
    }

    /// Poll loop. Runs until the task is dropped.
    pub async fn run(&self) {
        info!(
            poll_secs = self.config.poll_interval.as_secs(),
            pool = self.config.worker_pool_size,
            "dispatcher started"
        );
        loop {
            self.dispatch_pass().await;
            tokio::time::sleep(self.config.poll_interval).await;
        }
    }

    /// One full pass: recover expired leases, claim up to the batch limit in
    /// priority order, run the claimed items through the worker pool and wait
    /// for all of them to reach a terminal or retry state.
    #[instrument(skip(self), fields(worker_id = %self.worker_id))]
    pub async fn dispatch_pass(&self) -> usize {
        let claimed = {
            let mut queue = lock(&self.queue);
            let recovered =
                queue.sweep_expired_leases(Duration::minutes(self.config.lease_timeout_minutes));
            if recovered > 0 {
                warn!(recovered, "recovered items from expired leases");
            }

            let mut claimed = Vec::new();
            while claimed.len() < self.config.batch_limit {
                match queue.claim_next(&self.worker_id) {
                    Some(item) => claimed.push(item),
                    None => break,
                }
            }
            claimed
        };

        if claimed.is_empty() {
            return 0;
        }
        info!(count = claimed.len(), "claimed queue items");

        let mut handles = Vec::with_capacity(claimed.len());
        for item in claimed {
            let permits = Arc::clone(&self.permits);
            let queue = Arc::clone(&self.queue);
            let profiles = Arc::clone(&self.profiles);
            let agent = Arc::clone(&self.agent);
            let notifier = Arc::clone(&self.notifier);
            let retry = self.retry;
            let apply_timeout = self.config.apply_timeout;

            handles.push(tokio::spawn(async move {
                // Closed only if the semaphore is dropped, which cannot
                // happen while this task holds a clone.
                let Ok(_permit) = permits.acquire().await else {
                    return;
                };
                process_item(queue, profiles, agent, notifier, retry, apply_timeout, item).await;
            }));
        }

        let count = handles.len();
        for handle in handles {
            if let Err(err) = handle.await {
                warn!(error = %err, "worker task panicked");
            }
        }
        count
    }
}

async fn process_item(
    queue: SharedQueue,
    profiles: Arc<dyn ProfileProvider>,
    agent: Arc<dyn BrowserAutomationAgent>,
    notifier: Arc<dyn NotificationSink>,
    retry: RetryScheduler,
    apply_timeout: StdDuration,
    item: QueueItem,
) {
    let outcome = match profiles.load(item.candidate_id).await {
        Ok(profile) => match timeout(apply_timeout, agent.apply(&item, &profile)).await {
            Ok(outcome) => outcome,
            Err(_) => Outcome {
                success: false,
                message: format!(
                    "automation timed out after {}s",
                    apply_timeout.as_secs()
                ),
            },
        },
        Err(err) => Outcome {
            success: false,
            message: format!("profile unavailable: {err}"),
        },
    };

    let notification = {
        let mut queue = lock(&queue);
        if outcome.success {
            match queue.mark_completed(item.id, &outcome.message) {
                Ok(()) => {
                    info!(item_id = item.id, "application submitted");
                    Some((
                        format!("Application submitted: {}", item.job_url),
                        NotificationKind::ApplicationSubmitted,
                    ))
                }
                Err(err) => {
                    warn!(item_id = item.id, error = %err, "completed item vanished mid-flight");
                    None
                }
            }
        } else {
            match queue.mark_failed(item.id, &outcome.message, &retry) {
                Ok(QueueStatus::Failed) => {
                    warn!(item_id = item.id, message = %outcome.message, "application failed permanently");
                    Some((
                        format!("Application failed: {}", item.job_url),
                        NotificationKind::ApplicationFailed,
                    ))
                }
                Ok(_) => {
                    info!(item_id = item.id, message = %outcome.message, "application will retry");
                    None
                }
                Err(err) => {
                    warn!(item_id = item.id, error = %err, "failed item vanished mid-flight");
                    None
                }
            }
        }
    };

    // Best effort. A dead notification channel must not affect queue state.
    if let Some((message, kind)) = notification {
        if let Err(err) = notifier.notify(item.candidate_id, &message, kind).await {
            warn!(candidate_id = item.candidate_id, error = %err, "notification failed");
        }
    }
}
