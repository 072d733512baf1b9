//! Reconciles spreadsheet rows against a relational table by key, builds a
//! colour-coded change set of inserts and updates, and applies it as one
//! all-or-nothing transaction.

pub mod config;
pub mod domain;
pub mod error;
pub mod infra;
pub mod logging;
pub mod platform;
pub mod usecase;

pub use domain::entities::mapping::{ColumnMapping, ColumnPair};
pub use domain::entities::plan::{PlanCounts, PreviewRow, ReconciliationPlan};
pub use domain::entities::value::Scalar;
pub use error::{Result, SourceLoadError, SyncError, SyncExecutionError};
pub use usecase::session::{Selection, SyncSession};
pub use usecase::services::sync_executor::{CancelToken, SyncControl, SyncResult};
