pub mod job;
pub mod work_item;
