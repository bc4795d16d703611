//! Pipeline type service - type lifecycle, default designation and duplication.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

use common::{AppError, AppResult, OptionExt};
use domain::{
    ensure_valid, slugify, unique_slug, EntityKind, NewPipelineStage, NewPipelineType, PipelineType,
    PipelineTypeWithStages, UpdatePipelineType,
};

use crate::infra::UnitOfWork;
use crate::repository::TxPipelineRepository;

/// Pipeline type service trait for dependency injection.
#[async_trait]
pub trait PipelineTypeService: Send + Sync {
    /// Create a type; the slug is derived from the name and never changes
    async fn create_type(&self, new: NewPipelineType) -> AppResult<PipelineType>;

    async fn update_type(&self, id: Uuid, changes: UpdatePipelineType) -> AppResult<PipelineType>;

    /// Get a type with all its stages
    async fn get_type(&self, id: Uuid) -> AppResult<PipelineTypeWithStages>;

    async fn list_types(&self, kind: EntityKind) -> AppResult<Vec<PipelineType>>;

    /// Default type of a kind, else its lowest-order active type
    async fn get_default(&self, kind: EntityKind) -> AppResult<PipelineType>;

    /// Make this type the only default of its kind
    async fn set_as_default(&self, id: Uuid) -> AppResult<PipelineType>;

    /// Deep-copy a type and its stages under fresh slugs
    async fn duplicate(
        &self,
        id: Uuid,
        new_name: Option<String>,
        is_active: bool,
    ) -> AppResult<PipelineTypeWithStages>;

    /// Delete a type and its stages; refused while entities are placed on them
    async fn delete_type(&self, id: Uuid) -> AppResult<()>;
}

/// Concrete implementation of PipelineTypeService using Unit of Work.
pub struct PipelineTypeManager<U: UnitOfWork> {
    uow: Arc<U>,
}

impl<U: UnitOfWork> PipelineTypeManager<U> {
    pub fn new(uow: Arc<U>) -> Self {
        Self { uow }
    }
}

#[async_trait]
impl<U: UnitOfWork> PipelineTypeService for PipelineTypeManager<U> {
    async fn create_type(&self, new: NewPipelineType) -> AppResult<PipelineType> {
        ensure_valid(&new)?;

        let created = self
            .uow
            .transaction(move |ctx| {
                Box::pin(async move {
                    let pipelines = ctx.pipelines();
                    let slug = free_type_slug(&pipelines, &new.name).await?;
                    let order = match new.order {
                        Some(order) => order,
                        None => next_type_order(&pipelines, new.entity_kind).await?,
                    };
                    pipelines.insert_type(&new, slug, order).await
                })
            })
            .await?;

        info!(kind = %created.entity_kind, slug = %created.slug, "Pipeline type created");
        Ok(created)
    }

    async fn update_type(&self, id: Uuid, changes: UpdatePipelineType) -> AppResult<PipelineType> {
        ensure_valid(&changes)?;

        self.uow
            .transaction(move |ctx| {
                Box::pin(async move {
                    let pipelines = ctx.pipelines();
                    let mut pipeline_type = pipelines.find_type(id).await?.ok_or_not_found()?;

                    if let Some(name) = changes.name {
                        pipeline_type.name = name.trim().to_string();
                    }
                    if changes.description.is_some() {
                        pipeline_type.description = changes.description;
                    }
                    if let Some(order) = changes.order {
                        pipeline_type.order = order;
                    }
                    if let Some(is_active) = changes.is_active {
                        pipeline_type.is_active = is_active;
                        // An inactive type cannot stay the default
                        pipeline_type.is_default &= is_active;
                    }

                    pipelines.save_type(&pipeline_type).await
                })
            })
            .await
    }

    async fn get_type(&self, id: Uuid) -> AppResult<PipelineTypeWithStages> {
        let pipelines = self.uow.pipelines();
        let pipeline_type = pipelines.find_type(id).await?.ok_or_not_found()?;
        let stages = pipelines.list_stages(id).await?;

        Ok(PipelineTypeWithStages {
            pipeline_type,
            stages,
        })
    }

    async fn list_types(&self, kind: EntityKind) -> AppResult<Vec<PipelineType>> {
        self.uow.pipelines().list_types(kind).await
    }

    async fn get_default(&self, kind: EntityKind) -> AppResult<PipelineType> {
        self.uow
            .pipelines()
            .default_type(kind)
            .await?
            .ok_or_else(|| AppError::NoActivePipelineType(kind.to_string()))
    }

    async fn set_as_default(&self, id: Uuid) -> AppResult<PipelineType> {
        let (updated, cleared) = self
            .uow
            .transaction_serializable(move |ctx| {
                Box::pin(async move {
                    let pipelines = ctx.pipelines();
                    let mut pipeline_type = pipelines.find_type(id).await?.ok_or_not_found()?;
                    if !pipeline_type.is_active {
                        return Err(AppError::validation(
                            "An inactive pipeline type cannot be the default",
                        ));
                    }

                    let cleared = pipelines
                        .clear_default(pipeline_type.entity_kind, pipeline_type.id)
                        .await?;
                    pipeline_type.is_default = true;
                    let updated = pipelines.save_type(&pipeline_type).await?;
                    Ok((updated, cleared))
                })
            })
            .await?;

        info!(
            kind = %updated.entity_kind,
            slug = %updated.slug,
            cleared,
            "Default pipeline type set"
        );
        Ok(updated)
    }

    async fn duplicate(
        &self,
        id: Uuid,
        new_name: Option<String>,
        is_active: bool,
    ) -> AppResult<PipelineTypeWithStages> {
        let result = self
            .uow
            .transaction(move |ctx| {
                Box::pin(async move {
                    let pipelines = ctx.pipelines();
                    let source = pipelines.find_type(id).await?.ok_or_not_found()?;
                    let source_stages = pipelines.list_stages(source.id).await?;

                    let name = new_name
                        .filter(|name| !name.trim().is_empty())
                        .unwrap_or_else(|| source.duplicate_name());
                    let new = NewPipelineType {
                        description: source.description.clone(),
                        is_active,
                        ..NewPipelineType::new(source.entity_kind, name)
                    };

                    let slug = free_type_slug(&pipelines, &new.name).await?;
                    let order = next_type_order(&pipelines, new.entity_kind).await?;
                    let copy = pipelines.insert_type(&new, slug, order).await?;

                    let mut stages = Vec::with_capacity(source_stages.len());
                    for stage in &source_stages {
                        let base = format!("{}-{}", slugify(&stage.name), copy.id.simple());
                        let taken = pipelines.stage_slugs_like(&base).await?;
                        let slug = unique_slug(&base, |candidate| taken.contains(candidate));

                        let draft = NewPipelineStage::copy_of(stage, copy.id);
                        stages.push(pipelines.insert_stage(&draft, slug, stage.order).await?);
                    }

                    Ok(PipelineTypeWithStages {
                        pipeline_type: copy,
                        stages,
                    })
                })
            })
            .await;

        match &result {
            Ok(copy) => info!(
                source = %id,
                slug = %copy.pipeline_type.slug,
                stages = copy.stages.len(),
                "Pipeline type duplicated"
            ),
            Err(err) => error!(source = %id, error = %err, "Pipeline type duplication failed"),
        }

        result
    }

    async fn delete_type(&self, id: Uuid) -> AppResult<()> {
        self.uow
            .transaction(move |ctx| {
                Box::pin(async move {
                    let pipelines = ctx.pipelines();
                    let pipeline_type = pipelines.find_type(id).await?.ok_or_not_found()?;
                    let stage_ids = pipelines
                        .list_stages(id)
                        .await?
                        .into_iter()
                        .map(|stage| stage.id)
                        .collect();

                    let in_use = pipelines.count_progressions_on_stages(stage_ids).await?;
                    if in_use > 0 {
                        return Err(AppError::validation(format!(
                            "Pipeline type {} still has {} progressions",
                            pipeline_type.slug, in_use
                        )));
                    }

                    pipelines.delete_type(id).await?;
                    info!(slug = %pipeline_type.slug, "Pipeline type deleted");
                    Ok(())
                })
            })
            .await
    }
}

/// First free slug derived from `name`.
async fn free_type_slug(pipelines: &TxPipelineRepository<'_>, name: &str) -> AppResult<String> {
    let base = slugify(name);
    let taken = pipelines.type_slugs_like(&base).await?;
    Ok(unique_slug(&base, |candidate| taken.contains(candidate)))
}

/// Order placing a new type after every existing type of its kind.
async fn next_type_order(pipelines: &TxPipelineRepository<'_>, kind: EntityKind) -> AppResult<i32> {
    let types = pipelines.list_types(kind).await?;
    match types.iter().map(|t| t.order).max() {
        None => Ok(0),
        Some(max) => max
            .checked_add(1)
            .ok_or_else(|| AppError::validation("Pipeline type order out of range")),
    }
}
