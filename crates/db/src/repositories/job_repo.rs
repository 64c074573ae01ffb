//! Repository for the `jobs` table.
//!
//! Status changes go through [`Job::apply`] under a row lock, so the
//! lifecycle rules in `automl_core::lifecycle` are enforced in one place
//! for every store implementation.

use automl_core::error::CoreError;
use automl_core::lifecycle::Transition;
use automl_core::types::JobId;
use sqlx::PgPool;

use crate::error::DbError;
use crate::models::job::Job;

/// Column list for `jobs` queries.
const COLUMNS: &str = "\
    id, input_reference, target_spec, status_id, problem_kind, \
    result_payload, error_detail, created_at, updated_at";

/// Provides create, lookup and transition operations for job records.
pub struct JobRepo;

impl JobRepo {
    /// Insert a new job. Fails with `Conflict` if the id already exists.
    pub async fn create(pool: &PgPool, job: &Job) -> Result<(), DbError> {
        let result = sqlx::query(
            "INSERT INTO jobs \
                 (id, input_reference, target_spec, status_id, problem_kind, \
                  result_payload, error_detail, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             ON CONFLICT (id) DO NOTHING",
        )
        .bind(job.id)
        .bind(&job.input_reference)
        .bind(&job.target_spec)
        .bind(job.status_id)
        .bind(&job.problem_kind)
        .bind(&job.result_payload)
        .bind(&job.error_detail)
        .bind(job.created_at)
        .bind(job.updated_at)
        .execute(pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::Conflict(format!("Job {} already exists", job.id)).into());
        }
        Ok(())
    }

    /// Find a job by its ID.
    pub async fn find_by_id(pool: &PgPool, id: JobId) -> Result<Option<Job>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM jobs WHERE id = $1");
        sqlx::query_as::<_, Job>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Apply a lifecycle transition atomically.
    ///
    /// Locks the row with `SELECT ... FOR UPDATE`, validates the transition
    /// in Rust and writes the result in the same transaction. Updates to
    /// different jobs lock different rows and never wait on each other.
    pub async fn transition(
        pool: &PgPool,
        id: JobId,
        transition: &Transition,
    ) -> Result<Job, DbError> {
        let mut tx = pool.begin().await?;

        let query = format!("SELECT {COLUMNS} FROM jobs WHERE id = $1 FOR UPDATE");
        let mut job = sqlx::query_as::<_, Job>(&query)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(CoreError::NotFound { entity: "Job", id })?;

        job.apply(transition, chrono::Utc::now())?;

        sqlx::query(
            "UPDATE jobs \
             SET status_id = $2, problem_kind = $3, result_payload = $4, \
                 error_detail = $5, updated_at = $6 \
             WHERE id = $1",
        )
        .bind(id)
        .bind(job.status_id)
        .bind(&job.problem_kind)
        .bind(&job.result_payload)
        .bind(&job.error_detail)
        .bind(job.updated_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(job)
    }
}
