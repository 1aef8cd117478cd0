use deadpool_postgres::PoolError;
use thiserror::Error;
use tokio_postgres::Error as PgError;
use tracing::{info, instrument};

use crate::db::PgPool;

#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("failed to get postgres connection: {0}")]
    Pool(#[from] PoolError),
    #[error("failed to run migration: {0}")]
    Postgres(#[from] PgError),
}

struct Migration {
    id: i32,
    description: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[Migration {
    id: 1,
    description: "application queue + application records tables",
    sql: r#"
CREATE TABLE IF NOT EXISTS aq.application_queue (
    id BIGSERIAL PRIMARY KEY,
    candidate_id BIGINT NOT NULL,
    job_id TEXT,
    job_url TEXT NOT NULL,
    priority INTEGER NOT NULL DEFAULT 3,
    status TEXT NOT NULL DEFAULT 'queued',
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    scheduled_for TIMESTAMPTZ,
    started_at TIMESTAMPTZ,
    completed_at TIMESTAMPTZ,
    next_retry_at TIMESTAMPTZ,
    retry_count INTEGER NOT NULL DEFAULT 0,
    max_retries INTEGER NOT NULL DEFAULT 3,
    locked_by TEXT,
    result_summary TEXT,
    error_message TEXT,
    CONSTRAINT chk_queue_status CHECK (
        status IN ('queued', 'processing', 'completed', 'failed', 'cancelled')
    ),
    CONSTRAINT chk_queue_priority CHECK (priority BETWEEN 1 AND 5),
    CONSTRAINT chk_queue_retry_count CHECK (retry_count >= 0 AND retry_count <= 100)
);

CREATE INDEX IF NOT EXISTS idx_application_queue_claim
    ON aq.application_queue(priority DESC, created_at)
    WHERE status = 'queued';
CREATE INDEX IF NOT EXISTS idx_application_queue_candidate
    ON aq.application_queue(candidate_id, status);
-- Arbiter for the insert's ON CONFLICT: at most one live application per
-- (candidate, url), even under concurrent inserts.
CREATE UNIQUE INDEX IF NOT EXISTS uq_application_queue_active
    ON aq.application_queue(candidate_id, job_url)
    WHERE status IN ('queued', 'processing');

CREATE TABLE IF NOT EXISTS aq.application_records (
    id BIGSERIAL PRIMARY KEY,
    candidate_id BIGINT NOT NULL,
    job_url TEXT NOT NULL,
    job_id TEXT,
    outcome TEXT NOT NULL,
    method TEXT NOT NULL DEFAULT 'automated',
    applied_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    note TEXT,
    CONSTRAINT chk_record_outcome CHECK (outcome IN ('submitted', 'failed'))
);

CREATE INDEX IF NOT EXISTS idx_application_records_candidate_day
    ON aq.application_records(candidate_id, applied_at);
CREATE UNIQUE INDEX IF NOT EXISTS uq_application_records_dedupe
    ON aq.application_records(candidate_id, job_url);
"#,
}];

/// Apply pending migrations in order. Idempotent; safe to call on every
/// process start.
#[instrument(skip(pool))]
pub async fn run_migrations(pool: &PgPool) -> Result<(), MigrationError> {
    let mut client = pool.get().await?;
    client
        .batch_execute(
            "CREATE SCHEMA IF NOT EXISTS aq;
             CREATE TABLE IF NOT EXISTS aq.schema_migrations (
                id INTEGER PRIMARY KEY,
                description TEXT NOT NULL,
                applied_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
             );",
        )
        .await?;

    for migration in MIGRATIONS {
        let already_applied: bool = client
            .query_one(
                "SELECT EXISTS (SELECT 1 FROM aq.schema_migrations WHERE id = $1)",
                &[&migration.id],
            )
            .await?
            .get(0);

        if already_applied {
            continue;
        }

        let tx = client.transaction().await?;
        tx.batch_execute(migration.sql).await?;
        tx.execute(
            "INSERT INTO aq.schema_migrations (id, description) VALUES ($1, $2)",
            &[&migration.id, &migration.description],
        )
        .await?;
        tx.commit().await?;

        info!(
            id = migration.id,
            description = migration.description,
            "applied migration"
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_declares_the_dedupe_unique_indexes() {
        let sql = MIGRATIONS[0].sql;
        assert!(sql.contains(
            "CREATE UNIQUE INDEX IF NOT EXISTS uq_application_queue_active"
        ));
        assert!(sql.contains("WHERE status IN ('queued', 'processing')"));
        assert!(sql.contains(
            "CREATE UNIQUE INDEX IF NOT EXISTS uq_application_records_dedupe"
        ));
    }
}
