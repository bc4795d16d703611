//! Stage service - stage administration and ordering within a type.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use common::{AppError, AppResult, OptionExt};
use domain::pipeline;
use domain::{
    ensure_valid, slugify, unique_slug, NewPipelineStage, PipelineStage, UpdatePipelineStage,
    STAGE_ORDER_STEP,
};

use crate::infra::{TransactionContext, UnitOfWork};

/// Stage service trait for dependency injection.
#[async_trait]
pub trait StageService: Send + Sync {
    /// Add a stage; without an explicit order it goes after the last one
    async fn create_stage(&self, new: NewPipelineStage) -> AppResult<PipelineStage>;

    async fn update_stage(&self, id: Uuid, changes: UpdatePipelineStage)
        -> AppResult<PipelineStage>;

    /// Delete a stage no progression points at
    async fn delete_stage(&self, id: Uuid) -> AppResult<()>;

    async fn get_stage(&self, id: Uuid) -> AppResult<PipelineStage>;

    /// Stages of a type by order
    async fn list_stages(&self, pipeline_type_id: Uuid) -> AppResult<Vec<PipelineStage>>;

    async fn next_stage(&self, id: Uuid) -> AppResult<Option<PipelineStage>>;

    async fn previous_stage(&self, id: Uuid) -> AppResult<Option<PipelineStage>>;

    async fn is_first_stage(&self, id: Uuid) -> AppResult<bool>;

    async fn is_last_stage(&self, id: Uuid) -> AppResult<bool>;

    /// Swap with the previous active stage; `false` when already first
    async fn move_up(&self, id: Uuid) -> AppResult<bool>;

    /// Swap with the next active stage; `false` when already last
    async fn move_down(&self, id: Uuid) -> AppResult<bool>;
}

#[derive(Debug, Clone, Copy)]
enum Direction {
    Up,
    Down,
}

/// Concrete implementation of StageService using Unit of Work.
pub struct StageManager<U: UnitOfWork> {
    uow: Arc<U>,
}

impl<U: UnitOfWork> StageManager<U> {
    pub fn new(uow: Arc<U>) -> Self {
        Self { uow }
    }

    /// A stage together with every stage of its type.
    async fn with_siblings(&self, id: Uuid) -> AppResult<(PipelineStage, Vec<PipelineStage>)> {
        let pipelines = self.uow.pipelines();
        let stage = pipelines.find_stage(id).await?.ok_or_not_found()?;
        let siblings = pipelines.list_stages(stage.pipeline_type_id).await?;
        Ok((stage, siblings))
    }

    async fn shift(&self, id: Uuid, direction: Direction) -> AppResult<bool> {
        let moved = self
            .uow
            .transaction(move |ctx| Box::pin(async move { swap(&ctx, id, direction).await }))
            .await?;

        if moved {
            info!(stage_id = %id, ?direction, "Stage moved");
        }
        Ok(moved)
    }
}

#[async_trait]
impl<U: UnitOfWork> StageService for StageManager<U> {
    async fn create_stage(&self, new: NewPipelineStage) -> AppResult<PipelineStage> {
        ensure_valid(&new)?;

        let created = self
            .uow
            .transaction(move |ctx| {
                Box::pin(async move {
                    let pipelines = ctx.pipelines();
                    let pipeline_type = pipelines
                        .find_type(new.pipeline_type_id)
                        .await?
                        .ok_or_not_found()?;
                    pipeline::check_conversion_eligible(
                        pipeline_type.entity_kind,
                        new.conversion_eligible,
                    )?;

                    let stages = pipelines.list_stages(pipeline_type.id).await?;
                    let order = match new.order {
                        Some(order) => order,
                        None => pipeline::next_free_order(&stages, STAGE_ORDER_STEP)?,
                    };
                    if stages.iter().any(|stage| stage.order == order) {
                        return Err(AppError::conflict(format!(
                            "Stage with order {} in {}",
                            order, pipeline_type.slug
                        )));
                    }

                    let base = slugify(&new.name);
                    let taken = pipelines.stage_slugs_like(&base).await?;
                    let slug = unique_slug(&base, |candidate| taken.contains(candidate));

                    pipelines.insert_stage(&new, slug, order).await
                })
            })
            .await?;

        info!(stage_id = %created.id, slug = %created.slug, order = created.order, "Stage created");
        Ok(created)
    }

    async fn update_stage(
        &self,
        id: Uuid,
        changes: UpdatePipelineStage,
    ) -> AppResult<PipelineStage> {
        ensure_valid(&changes)?;

        self.uow
            .transaction(move |ctx| {
                Box::pin(async move {
                    let pipelines = ctx.pipelines();
                    let mut stage = pipelines.find_stage(id).await?.ok_or_not_found()?;
                    let pipeline_type = pipelines
                        .find_type(stage.pipeline_type_id)
                        .await?
                        .ok_or_not_found()?;

                    if let Some(name) = changes.name {
                        stage.name = name.trim().to_string();
                    }
                    if changes.description.is_some() {
                        stage.description = changes.description;
                    }
                    if let Some(is_final) = changes.is_final {
                        stage.is_final = is_final;
                    }
                    if let Some(eligible) = changes.conversion_eligible {
                        pipeline::check_conversion_eligible(pipeline_type.entity_kind, eligible)?;
                        stage.conversion_eligible = eligible;
                    }
                    if changes.color.is_some() {
                        stage.color = changes.color;
                    }
                    if changes.status.is_some() {
                        stage.status = changes.status;
                    }
                    if let Some(is_active) = changes.is_active {
                        stage.is_active = is_active;
                    }

                    pipelines.save_stage(&stage).await
                })
            })
            .await
    }

    async fn delete_stage(&self, id: Uuid) -> AppResult<()> {
        self.uow
            .transaction(move |ctx| {
                Box::pin(async move {
                    let pipelines = ctx.pipelines();
                    let stage = pipelines.find_stage(id).await?.ok_or_not_found()?;

                    let in_use = pipelines.count_progressions_on_stages(vec![id]).await?;
                    if in_use > 0 {
                        return Err(AppError::validation(format!(
                            "Stage {} still has {} progressions",
                            stage.slug, in_use
                        )));
                    }

                    pipelines.delete_stage(id).await?;
                    info!(slug = %stage.slug, "Stage deleted");
                    Ok(())
                })
            })
            .await
    }

    async fn get_stage(&self, id: Uuid) -> AppResult<PipelineStage> {
        self.uow.pipelines().find_stage(id).await?.ok_or_not_found()
    }

    async fn list_stages(&self, pipeline_type_id: Uuid) -> AppResult<Vec<PipelineStage>> {
        let pipelines = self.uow.pipelines();
        pipelines
            .find_type(pipeline_type_id)
            .await?
            .ok_or_not_found()?;
        pipelines.list_stages(pipeline_type_id).await
    }

    async fn next_stage(&self, id: Uuid) -> AppResult<Option<PipelineStage>> {
        let (stage, siblings) = self.with_siblings(id).await?;
        Ok(pipeline::next_stage(&siblings, &stage).cloned())
    }

    async fn previous_stage(&self, id: Uuid) -> AppResult<Option<PipelineStage>> {
        let (stage, siblings) = self.with_siblings(id).await?;
        Ok(pipeline::previous_stage(&siblings, &stage).cloned())
    }

    async fn is_first_stage(&self, id: Uuid) -> AppResult<bool> {
        let (stage, siblings) = self.with_siblings(id).await?;
        Ok(pipeline::is_first_stage(&siblings, &stage))
    }

    async fn is_last_stage(&self, id: Uuid) -> AppResult<bool> {
        let (stage, siblings) = self.with_siblings(id).await?;
        Ok(pipeline::is_last_stage(&siblings, &stage))
    }

    async fn move_up(&self, id: Uuid) -> AppResult<bool> {
        self.shift(id, Direction::Up).await
    }

    async fn move_down(&self, id: Uuid) -> AppResult<bool> {
        self.shift(id, Direction::Down).await
    }
}

/// Swap a stage's order with its active neighbour.
///
/// Orders are unique per type, so the stage is parked on a free order first.
async fn swap(ctx: &TransactionContext<'_>, id: Uuid, direction: Direction) -> AppResult<bool> {
    let pipelines = ctx.pipelines();
    let stage = pipelines.find_stage(id).await?.ok_or_not_found()?;
    let stages = pipelines.list_stages(stage.pipeline_type_id).await?;

    let neighbour = match direction {
        Direction::Up => pipeline::previous_stage(&stages, &stage),
        Direction::Down => pipeline::next_stage(&stages, &stage),
    };
    let Some(neighbour) = neighbour else {
        return Ok(false);
    };

    let parking = pipeline::parking_order(&stages)?;
    pipelines.set_stage_order(stage.id, parking).await?;
    pipelines.set_stage_order(neighbour.id, stage.order).await?;
    pipelines.set_stage_order(stage.id, neighbour.order).await?;

    Ok(true)
}
