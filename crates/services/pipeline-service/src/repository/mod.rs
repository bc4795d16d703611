//! Repository layer for data access.
//!
//! Reads are shared between the pooled stores and the transaction-scoped
//! repositories through the generic functions in `queries`.

pub mod entities;
mod lead_repository;
mod pipeline_repository;
pub(crate) mod queries;

use common::AppError;
use sea_orm::{DbErr, SqlErr};

pub use lead_repository::{LeadRepository, LeadStore, TxLeadRepository};
pub use pipeline_repository::{PipelineRepository, PipelineStore, TxPipelineRepository};

#[cfg(any(test, feature = "test-utils"))]
pub use lead_repository::MockLeadRepository;
#[cfg(any(test, feature = "test-utils"))]
pub use pipeline_repository::MockPipelineRepository;

/// Map a failed write, turning unique violations into `Conflict`.
pub(crate) fn write_error(what: &'static str) -> impl Fn(DbErr) -> AppError {
    move |err| match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(detail)) => {
            tracing::debug!(%detail, "{} write hit a unique constraint", what);
            AppError::conflict(what)
        }
        _ => AppError::from(err),
    }
}
