//! Progression service - moves entities through their pipeline.
//!
//! Every write runs in one unit-of-work transaction and recomputes the lead's
//! coarse status from its new pipeline position before committing.

use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use common::{AppError, AppResult, OptionExt};
use domain::pipeline;
use domain::progression::{current_progression, progression_percentage, stage_position};
use domain::{
    AdvanceOutcome, EntityKind, Lead, LeadStatus, PipelineStatus, PipelineType, Progression,
    StageStatistics,
};

use crate::infra::{TransactionContext, UnitOfWork};
use crate::repository::{TxLeadRepository, TxPipelineRepository};

/// Progression service trait for dependency injection.
#[async_trait]
pub trait ProgressionService: Send + Sync {
    /// Complete the current stage and open the next one.
    ///
    /// An entity without any progression is placed on the first stage of its
    /// kind's default pipeline instead.
    async fn advance_stage(
        &self,
        kind: EntityKind,
        entity_id: Uuid,
        user_id: Uuid,
        notes: Option<String>,
    ) -> AppResult<AdvanceOutcome>;

    /// Drop every progression and restart on the first stage of a type
    async fn initialize_pipeline(
        &self,
        kind: EntityKind,
        entity_id: Uuid,
        pipeline_type_id: Option<Uuid>,
        user_id: Uuid,
    ) -> AppResult<Progression>;

    /// Undo the last advancement; `None` when there is nothing to undo
    async fn revert_stage(&self, kind: EntityKind, entity_id: Uuid)
        -> AppResult<Option<Progression>>;

    /// Current stage, all stages, completion percentage and eligibility
    async fn pipeline_status(&self, kind: EntityKind, entity_id: Uuid)
        -> AppResult<PipelineStatus>;

    /// Append a timestamped note
    async fn add_note(&self, progression_id: Uuid, text: String) -> AppResult<Progression>;

    async fn complete_progression(
        &self,
        progression_id: Uuid,
        notes: Option<String>,
    ) -> AppResult<Progression>;

    async fn reset_progression(&self, progression_id: Uuid) -> AppResult<Progression>;

    /// Open a progression at the stage after this one's; `None` on the last stage
    async fn create_next_progression(
        &self,
        progression_id: Uuid,
        user_id: Option<Uuid>,
    ) -> AppResult<Option<Progression>>;

    /// Open/completed counts and dwell time per stage of a type
    async fn stage_statistics(&self, pipeline_type_id: Uuid) -> AppResult<Vec<StageStatistics>>;
}

/// Concrete implementation of ProgressionService using Unit of Work.
pub struct ProgressionManager<U: UnitOfWork> {
    uow: Arc<U>,
}

impl<U: UnitOfWork> ProgressionManager<U> {
    pub fn new(uow: Arc<U>) -> Self {
        Self { uow }
    }
}

#[async_trait]
impl<U: UnitOfWork> ProgressionService for ProgressionManager<U> {
    async fn advance_stage(
        &self,
        kind: EntityKind,
        entity_id: Uuid,
        user_id: Uuid,
        notes: Option<String>,
    ) -> AppResult<AdvanceOutcome> {
        let outcome = self
            .uow
            .transaction(move |ctx| {
                Box::pin(async move { advance(&ctx, kind, entity_id, user_id, notes).await })
            })
            .await?;

        match &outcome {
            AdvanceOutcome::Initialized { opened } => {
                info!(%kind, %entity_id, stage_id = %opened.stage_id, "Pipeline initialized");
            }
            AdvanceOutcome::Advanced { completed, opened } => {
                info!(
                    %kind,
                    %entity_id,
                    from = %completed.stage_id,
                    to = %opened.stage_id,
                    "Stage advanced"
                );
            }
            AdvanceOutcome::Finished { completed } => {
                debug!(%kind, %entity_id, stage_id = %completed.stage_id, "No next stage");
            }
        }

        Ok(outcome)
    }

    async fn initialize_pipeline(
        &self,
        kind: EntityKind,
        entity_id: Uuid,
        pipeline_type_id: Option<Uuid>,
        user_id: Uuid,
    ) -> AppResult<Progression> {
        let opened = self
            .uow
            .transaction(move |ctx| {
                Box::pin(async move {
                    initialize(&ctx, kind, entity_id, pipeline_type_id, user_id).await
                })
            })
            .await?;

        info!(%kind, %entity_id, stage_id = %opened.stage_id, "Pipeline initialized");
        Ok(opened)
    }

    async fn revert_stage(
        &self,
        kind: EntityKind,
        entity_id: Uuid,
    ) -> AppResult<Option<Progression>> {
        let reopened = self
            .uow
            .transaction(move |ctx| Box::pin(async move { revert(&ctx, kind, entity_id).await }))
            .await?;

        match &reopened {
            Some(progression) => {
                info!(%kind, %entity_id, stage_id = %progression.stage_id, "Stage reverted")
            }
            None => debug!(%kind, %entity_id, "Nothing to revert"),
        }

        Ok(reopened)
    }

    async fn pipeline_status(
        &self,
        kind: EntityKind,
        entity_id: Uuid,
    ) -> AppResult<PipelineStatus> {
        let pipelines = self.uow.pipelines();
        let lead = self.uow.leads().find(kind, entity_id).await?.ok_or_not_found()?;

        let items = pipelines.progressions_for(kind, entity_id).await?;
        let current = current_progression(&items);

        let pipeline_type = match current {
            Some(current) => pipelines.find_type(current.stage.pipeline_type_id).await?,
            None => pipelines.default_type(kind).await?,
        };
        let all_stages = match &pipeline_type {
            Some(pipeline_type) => pipelines.list_stages(pipeline_type.id).await?,
            None => Vec::new(),
        };

        let completed_stages = items
            .iter()
            .filter(|item| item.progression.completed)
            .map(|item| &item.stage);

        Ok(PipelineStatus {
            entity_kind: kind,
            entity_id,
            can_convert: lead.can_convert(completed_stages),
            progression_percentage: progression_percentage(&items, &all_stages),
            current_stage: current.map(|c| c.stage.clone()),
            current_progression: current.map(|c| c.progression.clone()),
            pipeline_type,
            all_stages,
        })
    }

    async fn add_note(&self, progression_id: Uuid, text: String) -> AppResult<Progression> {
        if text.trim().is_empty() {
            return Err(AppError::validation("Note text is required"));
        }

        self.uow
            .transaction(move |ctx| {
                Box::pin(async move {
                    let pipelines = ctx.pipelines();
                    let staged = pipelines
                        .find_progression(progression_id)
                        .await?
                        .ok_or_not_found()?;

                    let mut progression = staged.progression;
                    progression.add_note(text.trim(), Utc::now());
                    pipelines.save_progression(&progression).await
                })
            })
            .await
    }

    async fn complete_progression(
        &self,
        progression_id: Uuid,
        notes: Option<String>,
    ) -> AppResult<Progression> {
        let completed = self
            .uow
            .transaction(move |ctx| {
                Box::pin(async move {
                    let pipelines = ctx.pipelines();
                    let staged = pipelines
                        .find_progression(progression_id)
                        .await?
                        .ok_or_not_found()?;

                    let mut progression = staged.progression;
                    progression.complete(notes, Utc::now());
                    let progression = pipelines.save_progression(&progression).await?;

                    refresh_owner_status(&ctx, &progression).await?;
                    Ok(progression)
                })
            })
            .await?;

        info!(progression_id = %completed.id, "Progression completed");
        Ok(completed)
    }

    async fn reset_progression(&self, progression_id: Uuid) -> AppResult<Progression> {
        let reset = self
            .uow
            .transaction(move |ctx| {
                Box::pin(async move {
                    let pipelines = ctx.pipelines();
                    let staged = pipelines
                        .find_progression(progression_id)
                        .await?
                        .ok_or_not_found()?;

                    let mut progression = staged.progression;
                    progression.reset(Utc::now());
                    let progression = pipelines.save_progression(&progression).await?;

                    refresh_owner_status(&ctx, &progression).await?;
                    Ok(progression)
                })
            })
            .await?;

        info!(progression_id = %reset.id, "Progression reset");
        Ok(reset)
    }

    async fn create_next_progression(
        &self,
        progression_id: Uuid,
        user_id: Option<Uuid>,
    ) -> AppResult<Option<Progression>> {
        self.uow
            .transaction(move |ctx| {
                Box::pin(async move {
                    let pipelines = ctx.pipelines();
                    let staged = pipelines
                        .find_progression(progression_id)
                        .await?
                        .ok_or_not_found()?;

                    let stages = pipelines.list_stages(staged.stage.pipeline_type_id).await?;
                    let Some(next) = pipeline::next_stage(&stages, &staged.stage) else {
                        return Ok(None);
                    };

                    let current = staged.progression;
                    let opened = pipelines
                        .insert_progression(
                            current.entity_kind,
                            current.entity_id,
                            next.id,
                            user_id.or(current.assigned_to),
                        )
                        .await?;

                    refresh_owner_status(&ctx, &opened).await?;
                    Ok(Some(opened))
                })
            })
            .await
    }

    async fn stage_statistics(&self, pipeline_type_id: Uuid) -> AppResult<Vec<StageStatistics>> {
        let pipelines = self.uow.pipelines();
        pipelines
            .find_type(pipeline_type_id)
            .await?
            .ok_or_not_found()?;

        let stages = pipelines.list_stages(pipeline_type_id).await?;
        let progressions = pipelines
            .progressions_on_stages(stages.iter().map(|s| s.id).collect())
            .await?;

        let now = Utc::now();
        Ok(stages
            .iter()
            .map(|stage| StageStatistics::collect(stage, &progressions, now))
            .collect())
    }
}

// =============================================================================
// Transactional steps, shared with the conversion engine
// =============================================================================

async fn advance(
    ctx: &TransactionContext<'_>,
    kind: EntityKind,
    entity_id: Uuid,
    user_id: Uuid,
    notes: Option<String>,
) -> AppResult<AdvanceOutcome> {
    let pipelines = ctx.pipelines();
    let leads = ctx.leads();

    let lead = leads.find(kind, entity_id).await?.ok_or_not_found()?;
    let items = pipelines.progressions_for(kind, entity_id).await?;

    let Some(current) = current_progression(&items) else {
        let pipeline_type = resolve_pipeline_type(&pipelines, kind, None).await?;
        let opened = open_first_stage(&pipelines, kind, entity_id, &pipeline_type, user_id).await?;
        refresh_status(&pipelines, &leads, &lead).await?;
        return Ok(AdvanceOutcome::Initialized { opened });
    };

    let now = Utc::now();
    let mut completed = current.progression.clone();
    if !completed.completed {
        completed.complete(notes, now);
        completed = pipelines.save_progression(&completed).await?;
    }

    let stages = pipelines.list_stages(current.stage.pipeline_type_id).await?;
    let outcome = match pipeline::next_stage(&stages, &current.stage) {
        None => AdvanceOutcome::Finished { completed },
        Some(next) => {
            // A reverted entity may already own a row for the next stage
            let opened = match items.iter().find(|item| item.stage.id == next.id) {
                Some(existing) => {
                    let mut reopened = existing.progression.clone();
                    reopened.reset(now);
                    reopened.assigned_to = Some(user_id);
                    pipelines.save_progression(&reopened).await?
                }
                None => {
                    pipelines
                        .insert_progression(kind, entity_id, next.id, Some(user_id))
                        .await?
                }
            };
            AdvanceOutcome::Advanced { completed, opened }
        }
    };

    refresh_status(&pipelines, &leads, &lead).await?;
    Ok(outcome)
}

async fn initialize(
    ctx: &TransactionContext<'_>,
    kind: EntityKind,
    entity_id: Uuid,
    pipeline_type_id: Option<Uuid>,
    user_id: Uuid,
) -> AppResult<Progression> {
    let pipelines = ctx.pipelines();
    let leads = ctx.leads();

    let lead = leads.find(kind, entity_id).await?.ok_or_not_found()?;
    let pipeline_type = resolve_pipeline_type(&pipelines, kind, pipeline_type_id).await?;

    let removed = pipelines.delete_progressions_for(kind, entity_id).await?;
    if removed > 0 {
        warn!(%kind, %entity_id, removed, "Re-initializing pipeline, existing progressions dropped");
    }

    let opened = open_first_stage(&pipelines, kind, entity_id, &pipeline_type, user_id).await?;
    refresh_status(&pipelines, &leads, &lead).await?;
    Ok(opened)
}

async fn revert(
    ctx: &TransactionContext<'_>,
    kind: EntityKind,
    entity_id: Uuid,
) -> AppResult<Option<Progression>> {
    let pipelines = ctx.pipelines();
    let leads = ctx.leads();

    let lead = leads.find(kind, entity_id).await?.ok_or_not_found()?;
    let items = pipelines.progressions_for(kind, entity_id).await?;
    let Some(current) = current_progression(&items) else {
        return Ok(None);
    };

    let now = Utc::now();
    let reopened = if current.progression.completed {
        // Finished entity: reopen its last stage
        let mut progression = current.progression.clone();
        progression.reset(now);
        pipelines.save_progression(&progression).await?
    } else {
        let stages = pipelines.list_stages(current.stage.pipeline_type_id).await?;
        let Some(previous) = pipeline::previous_stage(&stages, &current.stage) else {
            return Ok(None);
        };

        pipelines.delete_progression(current.progression.id).await?;
        match items.iter().find(|item| item.stage.id == previous.id) {
            Some(existing) => {
                let mut progression = existing.progression.clone();
                progression.reset(now);
                pipelines.save_progression(&progression).await?
            }
            None => {
                pipelines
                    .insert_progression(kind, entity_id, previous.id, current.progression.assigned_to)
                    .await?
            }
        }
    };

    refresh_status(&pipelines, &leads, &lead).await?;
    Ok(Some(reopened))
}

/// Explicitly requested active type of the right kind, else the kind's default.
pub(crate) async fn resolve_pipeline_type(
    pipelines: &TxPipelineRepository<'_>,
    kind: EntityKind,
    requested: Option<Uuid>,
) -> AppResult<PipelineType> {
    let Some(id) = requested else {
        return pipelines
            .default_type(kind)
            .await?
            .ok_or_else(|| AppError::NoActivePipelineType(kind.to_string()));
    };

    let pipeline_type = pipelines.find_type(id).await?.ok_or_not_found()?;
    if pipeline_type.entity_kind != kind {
        return Err(AppError::validation(format!(
            "Pipeline type {} is for {}, not {}",
            pipeline_type.slug, pipeline_type.entity_kind, kind
        )));
    }
    if !pipeline_type.is_active {
        return Err(AppError::validation(format!(
            "Pipeline type {} is inactive",
            pipeline_type.slug
        )));
    }

    Ok(pipeline_type)
}

/// Open a progression on the first active stage of `pipeline_type`.
pub(crate) async fn open_first_stage(
    pipelines: &TxPipelineRepository<'_>,
    kind: EntityKind,
    entity_id: Uuid,
    pipeline_type: &PipelineType,
    user_id: Uuid,
) -> AppResult<Progression> {
    let stages = pipelines.list_stages(pipeline_type.id).await?;
    let Some(first) = pipeline::first_stage(&stages) else {
        error!(
            %kind,
            pipeline_type = %pipeline_type.slug,
            "Pipeline type has no active stages"
        );
        return Err(AppError::NoStages(pipeline_type.slug.clone()));
    };

    pipelines
        .insert_progression(kind, entity_id, first.id, Some(user_id))
        .await
}

/// Store the status implied by the lead's current pipeline position.
pub(crate) async fn refresh_status(
    pipelines: &TxPipelineRepository<'_>,
    leads: &TxLeadRepository<'_>,
    lead: &Lead,
) -> AppResult<LeadStatus> {
    let items = pipelines.progressions_for(lead.kind, lead.id).await?;
    let current = current_progression(&items);
    let stages = match current {
        Some(current) => pipelines.list_stages(current.stage.pipeline_type_id).await?,
        None => Vec::new(),
    };

    let status = lead.status.project(stage_position(current, &stages));
    if status != lead.status {
        leads.set_status(lead.kind, lead.id, status).await?;
        debug!(kind = %lead.kind, id = %lead.id, from = %lead.status, to = %status, "Lead status projected");
    }

    Ok(status)
}

/// Refresh the status of the lead owning `progression`, if it still exists.
async fn refresh_owner_status(
    ctx: &TransactionContext<'_>,
    progression: &Progression,
) -> AppResult<()> {
    let leads = ctx.leads();
    if let Some(lead) = leads.find(progression.entity_kind, progression.entity_id).await? {
        refresh_status(&ctx.pipelines(), &leads, &lead).await?;
    }
    Ok(())
}
