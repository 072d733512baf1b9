pub mod diff_engine;
pub mod matcher;
pub mod planner;
pub mod row_source;
pub mod sync_executor;
