//! Repository for the `work_queue` table.

use sqlx::PgPool;

use crate::models::work_item::WorkItem;

pub struct WorkQueueRepo;

impl WorkQueueRepo {
    pub async fn push(pool: &PgPool, item: &WorkItem) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO work_queue (job_id, input_reference, target_spec) VALUES ($1, $2, $3)",
        )
        .bind(item.job_id)
        .bind(&item.input_reference)
        .bind(&item.target_spec)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Atomically remove and return one queued item.
    ///
    /// `FOR UPDATE SKIP LOCKED` lets concurrent workers claim different rows;
    /// deleting on claim means an item is never delivered twice.
    pub async fn claim_next(pool: &PgPool) -> Result<Option<WorkItem>, sqlx::Error> {
        sqlx::query_as::<_, WorkItem>(
            "DELETE FROM work_queue \
             WHERE id = ( \
                 SELECT id FROM work_queue \
                 ORDER BY id ASC \
                 LIMIT 1 \
                 FOR UPDATE SKIP LOCKED \
             ) \
             RETURNING job_id, input_reference, target_spec",
        )
        .fetch_optional(pool)
        .await
    }
}
