//! SQL access for the `jobs` and `work_queue` tables.

mod job_repo;
mod work_queue_repo;

pub use job_repo::JobRepo;
pub use work_queue_repo::WorkQueueRepo;
