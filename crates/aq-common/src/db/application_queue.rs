use chrono::{DateTime, Duration, Utc};
use deadpool_postgres::PoolError;
use tokio_postgres::Error as PgError;
use tokio_postgres::Row;
use tracing::instrument;

use crate::db::PgPool;
use crate::queue::application_queue::{ApplicationOutcome, QueueItem, QueueStatus};

#[derive(Debug, thiserror::Error)]
pub enum QueueStorageError {
    #[error("failed to get postgres connection: {0}")]
    Pool(#[from] PoolError),
    #[error("postgres error: {0}")]
    Postgres(#[from] PgError),
    #[error("failed to map queue row: {0}")]
    Mapping(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
}

fn parse_status(value: &str) -> Result<QueueStatus, QueueStorageError> {
    match value {
        "queued" => Ok(QueueStatus::Queued),
        "processing" => Ok(QueueStatus::Processing),
        "completed" => Ok(QueueStatus::Completed),
        "failed" => Ok(QueueStatus::Failed),
        "cancelled" => Ok(QueueStatus::Cancelled),
        other => Err(QueueStorageError::Mapping(format!(
            "unknown status: {other}"
        ))),
    }
}

fn outcome_str(outcome: ApplicationOutcome) -> &'static str {
    match outcome {
        ApplicationOutcome::Submitted => "submitted",
        ApplicationOutcome::Failed => "failed",
    }
}

fn row_to_item(row: &Row) -> Result<QueueItem, QueueStorageError> {
    Ok(QueueItem {
        id: row
            .try_get::<_, i64>("id")
            .map_err(QueueStorageError::from)
            .and_then(|id| {
                u64::try_from(id).map_err(|e| QueueStorageError::Mapping(e.to_string()))
            })?,
        candidate_id: row.try_get("candidate_id")?,
        job_id: row.try_get("job_id")?,
        job_url: row.try_get("job_url")?,
        priority: row.try_get("priority")?,
        status: parse_status(row.try_get::<_, String>("status")?.as_str())?,
        created_at: row.try_get("created_at")?,
        scheduled_for: row.try_get("scheduled_for")?,
        started_at: row.try_get("started_at")?,
        completed_at: row.try_get("completed_at")?,
        next_retry_at: row.try_get("next_retry_at")?,
        retry_count: row
            .try_get::<_, i32>("retry_count")
            .map_err(QueueStorageError::from)
            .and_then(|v| u32::try_from(v).map_err(|e| QueueStorageError::Mapping(e.to_string())))?,
        max_retries: row
            .try_get::<_, i32>("max_retries")
            .map_err(QueueStorageError::from)
            .and_then(|v| u32::try_from(v).map_err(|e| QueueStorageError::Mapping(e.to_string())))?,
        locked_by: row.try_get("locked_by")?,
        result_summary: row.try_get("result_summary")?,
        error_message: row.try_get("error_message")?,
    })
}

// The ON CONFLICT arbiter is the partial unique index
// uq_application_queue_active; the NOT EXISTS subquery only screens past
// applications, which never leave the records table.
const INSERT_QUEUE_ITEM_SQL: &str = "INSERT INTO aq.application_queue (
        candidate_id, job_id, job_url, priority, status,
        created_at, scheduled_for, retry_count, max_retries
    )
    SELECT $1, $2, $3, $4, 'queued', $5, $6, 0, $7
    WHERE NOT EXISTS (
        SELECT 1 FROM aq.application_records
        WHERE candidate_id = $1 AND job_url = $3
    )
    ON CONFLICT (candidate_id, job_url) WHERE status IN ('queued', 'processing')
        DO NOTHING
    RETURNING id";

/// Insert a queue row unless an active row or a past application already
/// covers the same `(candidate_id, job_url)`. Returns the new row id.
#[instrument(skip(pool, item))]
pub async fn insert_queue_item(
    pool: &PgPool,
    item: &QueueItem,
) -> Result<u64, QueueStorageError> {
    let client = pool.get().await?;

    let stmt = client.prepare(INSERT_QUEUE_ITEM_SQL).await?;

    let row = client
        .query_opt(
            &stmt,
            &[
                &item.candidate_id,
                &item.job_id,
                &item.job_url,
                &item.priority,
                &item.created_at,
                &item.scheduled_for,
                &i32::try_from(item.max_retries).unwrap_or(i32::MAX),
            ],
        )
        .await?;

    match row {
        Some(row) => {
            let id: i64 = row.try_get("id")?;
            u64::try_from(id).map_err(|e| QueueStorageError::Mapping(e.to_string()))
        }
        None => Err(QueueStorageError::Conflict(format!(
            "an active application for {} already exists",
            item.job_url
        ))),
    }
}

/// Claim the next eligible queued row for this worker. Concurrent dispatchers
/// skip each other's candidate rows instead of blocking.
#[instrument(skip(pool))]
pub async fn claim_next_queued(
    pool: &PgPool,
    worker_id: &str,
    now: DateTime<Utc>,
) -> Result<Option<QueueItem>, QueueStorageError> {
    let client = pool.get().await?;
    let stmt = client
        .prepare(
            "UPDATE aq.application_queue
SET
    status = 'processing',
    locked_by = $1,
    started_at = $2,
    next_retry_at = NULL
WHERE id = (
    SELECT id
    FROM aq.application_queue
    WHERE status = 'queued'
      AND (scheduled_for IS NULL OR scheduled_for <= $2)
      AND (next_retry_at IS NULL OR next_retry_at <= $2)
    ORDER BY priority DESC, created_at
    LIMIT 1
    FOR UPDATE SKIP LOCKED
)
RETURNING *;",
        )
        .await?;

    let row = client.query_opt(&stmt, &[&worker_id, &now]).await?;
    row.map(|r| row_to_item(&r)).transpose()
}

/// Terminal success: flip the row to completed and write the application
/// record in one transaction. Only a processing row can complete.
#[instrument(skip(pool))]
pub async fn mark_item_completed(
    pool: &PgPool,
    id: u64,
    result_summary: &str,
    now: DateTime<Utc>,
) -> Result<(), QueueStorageError> {
    let mut client = pool.get().await?;
    let tx = client.transaction().await?;

    let row = tx
        .query_opt(
            "UPDATE aq.application_queue
             SET status = 'completed', result_summary = $2, completed_at = $3, locked_by = NULL
             WHERE id = $1 AND status = 'processing'
             RETURNING candidate_id, job_id, job_url",
            &[&(id as i64), &result_summary, &now],
        )
        .await?;

    let row = row.ok_or_else(|| {
        QueueStorageError::Conflict(format!("queue item {id} is not processing"))
    })?;
    let candidate_id: i64 = row.try_get("candidate_id")?;
    let job_id: Option<String> = row.try_get("job_id")?;
    let job_url: String = row.try_get("job_url")?;

    tx.execute(
        "INSERT INTO aq.application_records
             (candidate_id, job_url, job_id, outcome, method, applied_at, note)
         VALUES ($1, $2, $3, $4, 'automated', $5, $6)
         ON CONFLICT (candidate_id, job_url) DO NOTHING",
        &[
            &candidate_id,
            &job_url,
            &job_id,
            &outcome_str(ApplicationOutcome::Submitted),
            &now,
            &result_summary,
        ],
    )
    .await?;

    tx.commit().await?;
    Ok(())
}

/// Terminal or retryable failure, decided in SQL against the retry budget.
/// Returns the status the row ended up in.
#[instrument(skip(pool))]
pub async fn mark_item_failed(
    pool: &PgPool,
    id: u64,
    error_message: &str,
    next_retry_at: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<QueueStatus, QueueStorageError> {
    let mut client = pool.get().await?;
    let tx = client.transaction().await?;

    let row = tx
        .query_opt(
            "UPDATE aq.application_queue
             SET retry_count = retry_count + 1,
                 error_message = $2,
                 locked_by = NULL,
                 started_at = NULL,
                 status = CASE
                     WHEN retry_count + 1 >= max_retries THEN 'failed'
                     ELSE 'queued'
                 END,
                 next_retry_at = CASE
                     WHEN retry_count + 1 >= max_retries THEN NULL
                     ELSE $3
                 END,
                 completed_at = CASE
                     WHEN retry_count + 1 >= max_retries THEN $4
                     ELSE NULL
                 END
             WHERE id = $1 AND status = 'processing'
             RETURNING candidate_id, job_id, job_url, status",
            &[&(id as i64), &error_message, &next_retry_at, &now],
        )
        .await?;

    let row = row.ok_or_else(|| {
        QueueStorageError::Conflict(format!("queue item {id} is not processing"))
    })?;
    let status = parse_status(row.try_get::<_, String>("status")?.as_str())?;

    if status == QueueStatus::Failed {
        let candidate_id: i64 = row.try_get("candidate_id")?;
        let job_id: Option<String> = row.try_get("job_id")?;
        let job_url: String = row.try_get("job_url")?;
        tx.execute(
            "INSERT INTO aq.application_records
                 (candidate_id, job_url, job_id, outcome, method, applied_at, note)
             VALUES ($1, $2, $3, $4, 'automated', $5, $6)
             ON CONFLICT (candidate_id, job_url) DO NOTHING",
            &[
                &candidate_id,
                &job_url,
                &job_id,
                &outcome_str(ApplicationOutcome::Failed),
                &now,
                &error_message,
            ],
        )
        .await?;
    }

    tx.commit().await?;
    Ok(status)
}

/// Cancel a queued row owned by the candidate.
#[instrument(skip(pool))]
pub async fn cancel_queued_item(
    pool: &PgPool,
    id: u64,
    candidate_id: i64,
    now: DateTime<Utc>,
) -> Result<(), QueueStorageError> {
    let client = pool.get().await?;

    let updated = client
        .execute(
            "UPDATE aq.application_queue
             SET status = 'cancelled', completed_at = $3
             WHERE id = $1 AND candidate_id = $2 AND status = 'queued'",
            &[&(id as i64), &candidate_id, &now],
        )
        .await?;
    if updated == 1 {
        return Ok(());
    }

    let row = client
        .query_opt(
            "SELECT status FROM aq.application_queue WHERE id = $1 AND candidate_id = $2",
            &[&(id as i64), &candidate_id],
        )
        .await?;
    match row {
        None => Err(QueueStorageError::NotFound(format!(
            "queue item {id} not found"
        ))),
        Some(row) => {
            let status: String = row.try_get("status")?;
            Err(QueueStorageError::Conflict(format!(
                "queue item {id} is {status} and cannot be cancelled"
            )))
        }
    }
}

/// Push rows with expired processing leases back to queued. The retry count
/// stays untouched; only a real failure report spends budget.
#[instrument(skip(pool))]
pub async fn recover_stuck_items(
    pool: &PgPool,
    now: DateTime<Utc>,
    lease_timeout: Duration,
) -> Result<u64, QueueStorageError> {
    let client = pool.get().await?;
    let cutoff = now - lease_timeout;

    let stmt = client
        .prepare(
            "UPDATE aq.application_queue SET
                status = 'queued',
                locked_by = NULL,
                started_at = NULL,
                next_retry_at = $1
            WHERE status = 'processing'
              AND COALESCE(started_at, created_at) <= $2",
        )
        .await?;

    Ok(client.execute(&stmt, &[&now, &cutoff]).await?)
}

/// Queued rows for one candidate in claim order.
#[instrument(skip(pool))]
pub async fn list_pending_items(
    pool: &PgPool,
    candidate_id: i64,
) -> Result<Vec<QueueItem>, QueueStorageError> {
    let client = pool.get().await?;
    let rows = client
        .query(
            "SELECT * FROM aq.application_queue
             WHERE candidate_id = $1 AND status = 'queued'
             ORDER BY priority DESC, created_at",
            &[&candidate_id],
        )
        .await?;
    rows.iter().map(row_to_item).collect()
}

/// Applications recorded today (UTC) for the daily limit check.
#[instrument(skip(pool))]
pub async fn count_records_today(
    pool: &PgPool,
    candidate_id: i64,
    now: DateTime<Utc>,
) -> Result<u32, QueueStorageError> {
    let client = pool.get().await?;
    let row = client
        .query_one(
            "SELECT COUNT(*) AS total FROM aq.application_records
             WHERE candidate_id = $1 AND applied_at::date = $2::date",
            &[&candidate_id, &now],
        )
        .await?;
    let total: i64 = row.try_get("total")?;
    u32::try_from(total).map_err(|e| QueueStorageError::Mapping(e.to_string()))
}

/// Drop terminal rows older than the retention window. Records are kept for
/// the duplicate check and audit history.
#[instrument(skip(pool))]
pub async fn cleanup_terminal_items(
    pool: &PgPool,
    now: DateTime<Utc>,
    retention: Duration,
) -> Result<u64, QueueStorageError> {
    let client = pool.get().await?;
    let cutoff = now - retention;
    Ok(client
        .execute(
            "DELETE FROM aq.application_queue
             WHERE status IN ('completed', 'failed', 'cancelled')
               AND completed_at IS NOT NULL
               AND completed_at < $1",
            &[&cutoff],
        )
        .await?)
}
