//! Conversion engine - turns a lead into the next kind of the chain.
//!
//! Target creation, source marking, the audit row and the target's seed
//! progression commit together or not at all.

use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, error, info};
use uuid::Uuid;

use common::{AppError, AppResult, OptionExt};
use domain::{
    ensure_valid, ConversionOutcome, EntityKind, LeadOverrides, NewLead, PipelineConversion,
};

use super::progression_service::open_first_stage;
use crate::infra::{TransactionContext, UnitOfWork};

/// Conversion service trait for dependency injection.
#[async_trait]
pub trait ConversionService: Send + Sync {
    /// Whether the lead may be converted right now
    async fn can_convert(&self, kind: EntityKind, entity_id: Uuid) -> AppResult<bool>;

    /// Convert the lead into its successor kind
    async fn convert(
        &self,
        kind: EntityKind,
        entity_id: Uuid,
        user_id: Uuid,
        overrides: Option<LeadOverrides>,
        notes: Option<String>,
    ) -> AppResult<ConversionOutcome>;

    /// Audit rows where the lead is the source or the target
    async fn conversion_history(
        &self,
        kind: EntityKind,
        entity_id: Uuid,
    ) -> AppResult<Vec<PipelineConversion>>;
}

/// Concrete implementation of ConversionService using Unit of Work.
pub struct ConversionEngine<U: UnitOfWork> {
    uow: Arc<U>,
}

impl<U: UnitOfWork> ConversionEngine<U> {
    pub fn new(uow: Arc<U>) -> Self {
        Self { uow }
    }
}

#[async_trait]
impl<U: UnitOfWork> ConversionService for ConversionEngine<U> {
    async fn can_convert(&self, kind: EntityKind, entity_id: Uuid) -> AppResult<bool> {
        let lead = self.uow.leads().find(kind, entity_id).await?.ok_or_not_found()?;
        if lead.conversion_blocker().is_some() {
            return Ok(false);
        }

        let items = self.uow.pipelines().progressions_for(kind, entity_id).await?;
        let completed_stages = items
            .iter()
            .filter(|item| item.progression.completed)
            .map(|item| &item.stage);

        Ok(lead.can_convert(completed_stages))
    }

    async fn convert(
        &self,
        kind: EntityKind,
        entity_id: Uuid,
        user_id: Uuid,
        overrides: Option<LeadOverrides>,
        notes: Option<String>,
    ) -> AppResult<ConversionOutcome> {
        let result = self
            .uow
            .transaction(move |ctx| {
                Box::pin(async move {
                    run_conversion(&ctx, kind, entity_id, user_id, overrides, notes).await
                })
            })
            .await;

        match &result {
            Ok(outcome) => info!(
                source_kind = %kind,
                source_id = %entity_id,
                target_kind = %outcome.target.kind,
                target_id = %outcome.target.id,
                seed_stage = %outcome.seed.stage_id,
                "Lead converted"
            ),
            Err(AppError::NotEligible(reason)) => {
                debug!(%kind, %entity_id, %reason, "Conversion refused")
            }
            Err(err) => debug!(%kind, %entity_id, error = %err, "Conversion rolled back"),
        }

        result
    }

    async fn conversion_history(
        &self,
        kind: EntityKind,
        entity_id: Uuid,
    ) -> AppResult<Vec<PipelineConversion>> {
        self.uow.pipelines().conversions_for(kind, entity_id).await
    }
}

async fn run_conversion(
    ctx: &TransactionContext<'_>,
    kind: EntityKind,
    entity_id: Uuid,
    user_id: Uuid,
    overrides: Option<LeadOverrides>,
    notes: Option<String>,
) -> AppResult<ConversionOutcome> {
    let pipelines = ctx.pipelines();
    let leads = ctx.leads();

    // Re-checked inside the transaction; the caller's view may be stale
    let source = leads.find(kind, entity_id).await?.ok_or_not_found()?;
    if let Some(reason) = source.conversion_blocker() {
        return Err(AppError::not_eligible(reason));
    }
    let Some(target_kind) = kind.successor() else {
        return Err(AppError::not_eligible(format!("{} has no successor", kind)));
    };

    let items = pipelines.progressions_for(kind, entity_id).await?;
    let completed_stages = items
        .iter()
        .filter(|item| item.progression.completed)
        .map(|item| &item.stage);
    if !source.can_convert(completed_stages) {
        return Err(AppError::not_eligible(format!(
            "{} {} has not completed a final stage",
            kind, entity_id
        )));
    }

    let draft = overrides
        .unwrap_or_default()
        .apply(NewLead::successor_of(&source));
    ensure_valid(&draft)?;

    let target = leads.create(target_kind, draft).await?;
    leads
        .mark_converted(kind, entity_id, target.id, Utc::now())
        .await?;
    let conversion = pipelines
        .insert_conversion((kind, entity_id), (target_kind, target.id), user_id, notes)
        .await?;

    let Some(pipeline_type) = pipelines.default_type(target_kind).await? else {
        error!(
            source_kind = %kind,
            %target_kind,
            "No active pipeline type for conversion target"
        );
        return Err(AppError::NoActivePipelineType(target_kind.to_string()));
    };
    let seed = open_first_stage(&pipelines, target_kind, target.id, &pipeline_type, user_id).await?;

    Ok(ConversionOutcome {
        target,
        conversion,
        seed,
    })
}
