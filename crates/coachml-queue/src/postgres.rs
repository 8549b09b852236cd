//! Postgres queue backend using sqlx.
//!
//! Claims use `FOR UPDATE SKIP LOCKED` so multiple worker processes can pull
//! from the same table without contention.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use coachml_core::{JobId, JobRecord, NativeState, NewJob, TaskInput, TaskKind, TaskOutcome};

use crate::{QueueClient, QueueError, QueueResult};

/// Job queue and record store backed by PostgreSQL.
pub struct PgQueue {
    pool: PgPool,
}

impl PgQueue {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect and run pending migrations.
    pub async fn connect(database_url: &str) -> QueueResult<Self> {
        let pool = PgPool::connect(database_url)
            .await
            .map_err(|e| QueueError::Unavailable(e.to_string()))?;
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| QueueError::Unavailable(e.to_string()))?;
        Ok(Self { pool })
    }
}

#[derive(sqlx::FromRow)]
struct JobRow {
    id: Uuid,
    task_kind: String,
    input: Value,
    dependency_ids: Vec<Uuid>,
    state: String,
    outcome: Option<Value>,
    enqueued_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    ended_at: Option<DateTime<Utc>>,
    claimed_by: Option<String>,
}

impl JobRow {
    fn into_record(self) -> QueueResult<JobRecord> {
        let task_kind: TaskKind = serde_json::from_value(Value::String(self.task_kind))?;
        let state: NativeState = serde_json::from_value(Value::String(self.state))?;
        let outcome: Option<TaskOutcome> =
            self.outcome.map(serde_json::from_value).transpose()?;

        Ok(JobRecord {
            id: JobId::from_uuid(self.id),
            task_kind,
            input: TaskInput::new(self.input),
            dependency_ids: self.dependency_ids.into_iter().map(JobId::from_uuid).collect(),
            state,
            outcome,
            enqueued_at: self.enqueued_at,
            started_at: self.started_at,
            ended_at: self.ended_at,
            claimed_by: self.claimed_by,
        })
    }
}

fn unavailable(e: sqlx::Error) -> QueueError {
    QueueError::Unavailable(e.to_string())
}

#[async_trait]
impl QueueClient for PgQueue {
    async fn enqueue(&self, job: NewJob) -> QueueResult<JobRecord> {
        let deps: Vec<Uuid> = job.dependency_ids.iter().map(|id| *id.as_uuid()).collect();
        let row = sqlx::query_as::<_, JobRow>(
            r#"
            INSERT INTO analysis_jobs (id, task_kind, input, dependency_ids, state, enqueued_at)
            VALUES ($1, $2, $3, $4, 'queued', NOW())
            RETURNING *
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(job.task_kind.as_str())
        .bind(job.input.as_value())
        .bind(&deps)
        .fetch_one(&self.pool)
        .await
        .map_err(unavailable)?;
        row.into_record()
    }

    async fn fetch(&self, id: JobId) -> QueueResult<Option<JobRecord>> {
        let row = sqlx::query_as::<_, JobRow>("SELECT * FROM analysis_jobs WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(unavailable)?;
        row.map(JobRow::into_record).transpose()
    }

    async fn claim(&self, worker_id: &str) -> QueueResult<Option<JobRecord>> {
        let row = sqlx::query_as::<_, JobRow>(
            r#"
            UPDATE analysis_jobs
            SET state = 'started', claimed_by = $1, started_at = NOW()
            WHERE id = (
                SELECT id FROM analysis_jobs
                WHERE state = 'queued'
                ORDER BY enqueued_at ASC
                FOR UPDATE SKIP LOCKED
                LIMIT 1
            )
            RETURNING *
            "#,
        )
        .bind(worker_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unavailable)?;
        row.map(JobRow::into_record).transpose()
    }

    async fn finalize(&self, id: JobId, outcome: TaskOutcome) -> QueueResult<()> {
        let state = match outcome.native_state() {
            NativeState::Failed => "failed",
            _ => "finished",
        };
        let outcome_value = serde_json::to_value(&outcome)?;

        let updated = sqlx::query(
            r#"
            UPDATE analysis_jobs
            SET state = $2, outcome = $3, ended_at = NOW()
            WHERE id = $1 AND state IN ('queued', 'started')
            "#,
        )
        .bind(id.as_uuid())
        .bind(state)
        .bind(&outcome_value)
        .execute(&self.pool)
        .await
        .map_err(unavailable)?;

        if updated.rows_affected() == 0 {
            // Either already terminal or evicted; only the former is an
            // invariant violation worth surfacing.
            if self.fetch(id).await?.is_some() {
                return Err(QueueError::AlreadyFinalized(id));
            }
        }
        Ok(())
    }
}
