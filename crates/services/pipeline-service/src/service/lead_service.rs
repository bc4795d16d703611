//! Lead service - the conversion-chain records the pipelines track.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use common::{AppError, AppResult, OptionExt};
use domain::{ensure_valid, EntityKind, Lead, LeadStatus, NewLead};

use crate::infra::UnitOfWork;

/// Lead service trait for dependency injection.
#[async_trait]
pub trait LeadService: Send + Sync {
    async fn create_lead(&self, kind: EntityKind, new: NewLead) -> AppResult<Lead>;

    async fn get_lead(&self, kind: EntityKind, id: Uuid) -> AppResult<Lead>;

    async fn list_leads(&self, kind: EntityKind) -> AppResult<Vec<Lead>>;

    /// Mark the lead inactive, which also blocks its conversion
    async fn deactivate_lead(&self, kind: EntityKind, id: Uuid) -> AppResult<Lead>;
}

/// Concrete implementation of LeadService using Unit of Work.
pub struct LeadManager<U: UnitOfWork> {
    uow: Arc<U>,
}

impl<U: UnitOfWork> LeadManager<U> {
    pub fn new(uow: Arc<U>) -> Self {
        Self { uow }
    }
}

#[async_trait]
impl<U: UnitOfWork> LeadService for LeadManager<U> {
    async fn create_lead(&self, kind: EntityKind, new: NewLead) -> AppResult<Lead> {
        ensure_valid(&new)?;
        let lead = self.uow.leads().create(kind, new).await?;
        info!(%kind, id = %lead.id, "Lead created");
        Ok(lead)
    }

    async fn get_lead(&self, kind: EntityKind, id: Uuid) -> AppResult<Lead> {
        self.uow.leads().find(kind, id).await?.ok_or_not_found()
    }

    async fn list_leads(&self, kind: EntityKind) -> AppResult<Vec<Lead>> {
        self.uow.leads().list(kind).await
    }

    async fn deactivate_lead(&self, kind: EntityKind, id: Uuid) -> AppResult<Lead> {
        self.uow
            .transaction(move |ctx| {
                Box::pin(async move {
                    let leads = ctx.leads();
                    let lead = leads.find(kind, id).await?.ok_or_not_found()?;
                    if lead.is_converted() {
                        return Err(AppError::validation(format!(
                            "{} {} was already converted",
                            kind, id
                        )));
                    }
                    if lead.status == LeadStatus::Inactive {
                        return Ok(lead);
                    }

                    let lead = leads.set_status(kind, id, LeadStatus::Inactive).await?;
                    info!(%kind, %id, "Lead deactivated");
                    Ok(lead)
                })
            })
            .await
    }
}
