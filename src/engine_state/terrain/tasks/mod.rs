//! Tasks run by the terrain's generation scheduler.

pub mod extraction_task;
