//! Pipeline read queries, generic over the connection so the pooled store and
//! the transaction-scoped repository run the same statements.

use std::collections::HashSet;

use sea_orm::{
    ColumnTrait, Condition, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect,
};
use uuid::Uuid;

use common::AppResult;
use domain::{
    EntityKind, PipelineConversion, PipelineStage, PipelineType, Progression, StagedProgression,
};

use super::entities::enums::KindColumn;
use super::entities::{pipeline_conversion, pipeline_progression, pipeline_stage, pipeline_type};

pub async fn find_type<C: ConnectionTrait>(db: &C, id: Uuid) -> AppResult<Option<PipelineType>> {
    let model = pipeline_type::Entity::find_by_id(id).one(db).await?;
    Ok(model.map(PipelineType::from))
}

/// Types of a kind in display order.
pub async fn list_types<C: ConnectionTrait>(db: &C, kind: EntityKind) -> AppResult<Vec<PipelineType>> {
    let models = pipeline_type::Entity::find()
        .filter(pipeline_type::Column::EntityKind.eq(KindColumn::from(kind)))
        .order_by_asc(pipeline_type::Column::SortOrder)
        .order_by_asc(pipeline_type::Column::Name)
        .all(db)
        .await?;

    Ok(models.into_iter().map(PipelineType::from).collect())
}

/// The active type flagged default, else the lowest-order active type.
pub async fn default_type<C: ConnectionTrait>(
    db: &C,
    kind: EntityKind,
) -> AppResult<Option<PipelineType>> {
    let active = pipeline_type::Entity::find()
        .filter(pipeline_type::Column::EntityKind.eq(KindColumn::from(kind)))
        .filter(pipeline_type::Column::IsActive.eq(true));

    let flagged = active
        .clone()
        .filter(pipeline_type::Column::IsDefault.eq(true))
        .one(db)
        .await?;
    if let Some(model) = flagged {
        return Ok(Some(model.into()));
    }

    let fallback = active
        .order_by_asc(pipeline_type::Column::SortOrder)
        .order_by_asc(pipeline_type::Column::CreatedAt)
        .one(db)
        .await?;

    Ok(fallback.map(PipelineType::from))
}

/// Slugs in use that start with `prefix`, for picking a free suffix.
pub async fn type_slugs_like<C: ConnectionTrait>(db: &C, prefix: &str) -> AppResult<HashSet<String>> {
    let slugs: Vec<String> = pipeline_type::Entity::find()
        .select_only()
        .column(pipeline_type::Column::Slug)
        .filter(pipeline_type::Column::Slug.starts_with(prefix))
        .into_tuple()
        .all(db)
        .await?;

    Ok(slugs.into_iter().collect())
}

pub async fn find_stage<C: ConnectionTrait>(db: &C, id: Uuid) -> AppResult<Option<PipelineStage>> {
    let model = pipeline_stage::Entity::find_by_id(id).one(db).await?;
    Ok(model.map(PipelineStage::from))
}

/// Every stage of a type, inactive ones included, by order.
pub async fn list_stages<C: ConnectionTrait>(
    db: &C,
    pipeline_type_id: Uuid,
) -> AppResult<Vec<PipelineStage>> {
    let models = pipeline_stage::Entity::find()
        .filter(pipeline_stage::Column::PipelineTypeId.eq(pipeline_type_id))
        .order_by_asc(pipeline_stage::Column::SortOrder)
        .all(db)
        .await?;

    Ok(models.into_iter().map(PipelineStage::from).collect())
}

pub async fn stage_slugs_like<C: ConnectionTrait>(db: &C, prefix: &str) -> AppResult<HashSet<String>> {
    let slugs: Vec<String> = pipeline_stage::Entity::find()
        .select_only()
        .column(pipeline_stage::Column::Slug)
        .filter(pipeline_stage::Column::Slug.starts_with(prefix))
        .into_tuple()
        .all(db)
        .await?;

    Ok(slugs.into_iter().collect())
}

pub async fn find_progression<C: ConnectionTrait>(
    db: &C,
    id: Uuid,
) -> AppResult<Option<StagedProgression>> {
    let row = pipeline_progression::Entity::find_by_id(id)
        .find_also_related(pipeline_stage::Entity)
        .one(db)
        .await?;

    Ok(row.and_then(staged))
}

/// All progressions of one entity with their stages, oldest first.
pub async fn progressions_for<C: ConnectionTrait>(
    db: &C,
    kind: EntityKind,
    entity_id: Uuid,
) -> AppResult<Vec<StagedProgression>> {
    let rows = pipeline_progression::Entity::find()
        .filter(pipeline_progression::Column::EntityKind.eq(KindColumn::from(kind)))
        .filter(pipeline_progression::Column::EntityId.eq(entity_id))
        .find_also_related(pipeline_stage::Entity)
        .order_by_asc(pipeline_progression::Column::CreatedAt)
        .all(db)
        .await?;

    Ok(rows.into_iter().filter_map(staged).collect())
}

pub async fn progressions_on_stages<C: ConnectionTrait>(
    db: &C,
    stage_ids: Vec<Uuid>,
) -> AppResult<Vec<Progression>> {
    if stage_ids.is_empty() {
        return Ok(Vec::new());
    }

    let models = pipeline_progression::Entity::find()
        .filter(pipeline_progression::Column::StageId.is_in(stage_ids))
        .all(db)
        .await?;

    Ok(models.into_iter().map(Progression::from).collect())
}

pub async fn count_progressions_on_stages<C: ConnectionTrait>(
    db: &C,
    stage_ids: Vec<Uuid>,
) -> AppResult<u64> {
    if stage_ids.is_empty() {
        return Ok(0);
    }

    let count = pipeline_progression::Entity::find()
        .filter(pipeline_progression::Column::StageId.is_in(stage_ids))
        .count(db)
        .await?;

    Ok(count)
}

/// Audit rows where the entity is the source or the target, newest first.
pub async fn conversions_for<C: ConnectionTrait>(
    db: &C,
    kind: EntityKind,
    entity_id: Uuid,
) -> AppResult<Vec<PipelineConversion>> {
    let kind = KindColumn::from(kind);
    let models = pipeline_conversion::Entity::find()
        .filter(
            Condition::any()
                .add(
                    Condition::all()
                        .add(pipeline_conversion::Column::SourceKind.eq(kind))
                        .add(pipeline_conversion::Column::SourceId.eq(entity_id)),
                )
                .add(
                    Condition::all()
                        .add(pipeline_conversion::Column::TargetKind.eq(kind))
                        .add(pipeline_conversion::Column::TargetId.eq(entity_id)),
                ),
        )
        .order_by_desc(pipeline_conversion::Column::CreatedAt)
        .all(db)
        .await?;

    Ok(models.into_iter().map(PipelineConversion::from).collect())
}

fn staged(
    (progression, stage): (pipeline_progression::Model, Option<pipeline_stage::Model>),
) -> Option<StagedProgression> {
    // The foreign key guarantees the stage; a missing one means a concurrent delete
    let stage = stage?;
    Some(StagedProgression {
        progression: progression.into(),
        stage: stage.into(),
    })
}
