//! Unit of Work pattern implementation.
//!
//! Centralizes repository access and owns the transaction lifecycle, so a
//! multi-step pipeline operation (advance, initialize, convert) either
//! commits as a whole or leaves no trace.

use async_trait::async_trait;
use sea_orm::{
    AccessMode, DatabaseConnection, DatabaseTransaction, IsolationLevel, TransactionTrait,
};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use common::{AppError, AppResult};

use crate::repository::{
    LeadRepository, LeadStore, PipelineRepository, PipelineStore, TxLeadRepository,
    TxPipelineRepository,
};

/// Unit of Work trait for dependency injection.
///
/// Provides centralized access to all repositories and transaction management.
/// Note: This trait is not mockable directly due to generic methods.
/// For testing, mock the repositories and wrap them in a test unit of work.
#[async_trait]
pub trait UnitOfWork: Send + Sync {
    /// Get pipeline repository
    fn pipelines(&self) -> Arc<dyn PipelineRepository>;

    /// Get lead repository
    fn leads(&self) -> Arc<dyn LeadRepository>;

    /// Execute a closure within a transaction.
    ///
    /// The transaction is committed on success or rolled back on error.
    /// Uses ReadCommitted isolation level by default.
    async fn transaction<F, T>(&self, f: F) -> AppResult<T>
    where
        F: for<'a> FnOnce(
                TransactionContext<'a>,
            ) -> Pin<Box<dyn Future<Output = AppResult<T>> + Send + 'a>>
            + Send,
        T: Send;

    /// Execute a closure within a transaction with serializable isolation.
    ///
    /// Used where a concurrent writer must lose instead of interleaving.
    async fn transaction_serializable<F, T>(&self, f: F) -> AppResult<T>
    where
        F: for<'a> FnOnce(
                TransactionContext<'a>,
            ) -> Pin<Box<dyn Future<Output = AppResult<T>> + Send + 'a>>
            + Send,
        T: Send;
}

/// Transaction context providing repository access within a transaction.
///
/// Every repository handed out here runs on the same borrowed transaction.
/// The pooled repositories must not be used while a context is alive.
pub struct TransactionContext<'a> {
    txn: &'a DatabaseTransaction,
}

impl<'a> TransactionContext<'a> {
    fn new(txn: &'a DatabaseTransaction) -> Self {
        Self { txn }
    }

    /// Get pipeline repository for this transaction
    pub fn pipelines(&self) -> TxPipelineRepository<'a> {
        TxPipelineRepository::new(self.txn)
    }

    /// Get lead repository for this transaction
    pub fn leads(&self) -> TxLeadRepository<'a> {
        TxLeadRepository::new(self.txn)
    }
}

/// Concrete implementation of UnitOfWork
pub struct Persistence {
    db: DatabaseConnection,
    pipeline_repo: Arc<PipelineStore>,
    lead_repo: Arc<LeadStore>,
}

impl Persistence {
    /// Create new UnitOfWork instance
    pub fn new(db: DatabaseConnection) -> Self {
        let pipeline_repo = Arc::new(PipelineStore::new(db.clone()));
        let lead_repo = Arc::new(LeadStore::new(db.clone()));
        Self {
            db,
            pipeline_repo,
            lead_repo,
        }
    }

    async fn execute_transaction<F, T>(&self, isolation: IsolationLevel, f: F) -> AppResult<T>
    where
        F: for<'a> FnOnce(
                TransactionContext<'a>,
            ) -> Pin<Box<dyn Future<Output = AppResult<T>> + Send + 'a>>
            + Send,
        T: Send,
    {
        let txn = self
            .db
            .begin_with_config(Some(isolation), Some(AccessMode::ReadWrite))
            .await
            .map_err(AppError::from)?;

        let ctx = TransactionContext::new(&txn);

        match f(ctx).await {
            Ok(result) => {
                txn.commit().await.map_err(AppError::from)?;
                Ok(result)
            }
            Err(e) => {
                if let Err(rollback_err) = txn.rollback().await {
                    tracing::error!("Transaction rollback failed: {}", rollback_err);
                }
                Err(e)
            }
        }
    }
}

#[async_trait]
impl UnitOfWork for Persistence {
    fn pipelines(&self) -> Arc<dyn PipelineRepository> {
        self.pipeline_repo.clone()
    }

    fn leads(&self) -> Arc<dyn LeadRepository> {
        self.lead_repo.clone()
    }

    async fn transaction<F, T>(&self, f: F) -> AppResult<T>
    where
        F: for<'a> FnOnce(
                TransactionContext<'a>,
            ) -> Pin<Box<dyn Future<Output = AppResult<T>> + Send + 'a>>
            + Send,
        T: Send,
    {
        self.execute_transaction(IsolationLevel::ReadCommitted, f).await
    }

    async fn transaction_serializable<F, T>(&self, f: F) -> AppResult<T>
    where
        F: for<'a> FnOnce(
                TransactionContext<'a>,
            ) -> Pin<Box<dyn Future<Output = AppResult<T>> + Send + 'a>>
            + Send,
        T: Send,
    {
        self.execute_transaction(IsolationLevel::Serializable, f).await
    }
}
