//! The work queue between the dispatcher and executors.
//!
//! Each enqueued item is delivered to at most one executor. Items carry no
//! ordering guarantee and are never re-queued.

use std::collections::VecDeque;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::QueueError;
use crate::models::work_item::WorkItem;
use crate::repositories::WorkQueueRepo;
use crate::DbPool;

#[async_trait]
pub trait WorkQueue: Send + Sync {
    async fn enqueue(&self, item: &WorkItem) -> Result<(), QueueError>;

    /// Claim the next item, or `None` if the queue is empty. Never blocks
    /// waiting for work.
    async fn dequeue(&self) -> Result<Option<WorkItem>, QueueError>;
}

/// Queue stored in the `work_queue` table, shared by every process that
/// points at the same database.
#[derive(Clone)]
pub struct PgWorkQueue {
    pool: DbPool,
}

impl PgWorkQueue {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl WorkQueue for PgWorkQueue {
    async fn enqueue(&self, item: &WorkItem) -> Result<(), QueueError> {
        WorkQueueRepo::push(&self.pool, item).await?;
        Ok(())
    }

    async fn dequeue(&self) -> Result<Option<WorkItem>, QueueError> {
        Ok(WorkQueueRepo::claim_next(&self.pool).await?)
    }
}

/// In-process FIFO queue.
#[derive(Default)]
pub struct MemoryWorkQueue {
    items: Mutex<VecDeque<WorkItem>>,
}

impl MemoryWorkQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.items.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.items.lock().await.is_empty()
    }
}

#[async_trait]
impl WorkQueue for MemoryWorkQueue {
    async fn enqueue(&self, item: &WorkItem) -> Result<(), QueueError> {
        self.items.lock().await.push_back(item.clone());
        Ok(())
    }

    async fn dequeue(&self) -> Result<Option<WorkItem>, QueueError> {
        Ok(self.items.lock().await.pop_front())
    }
}
