//! Pipeline repository: types, stages, progressions and conversion audit rows.

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DatabaseTransaction, EntityTrait,
    QueryFilter, Set,
};
use std::collections::HashSet;
use uuid::Uuid;

use common::{AppError, AppResult};
use domain::{
    EntityKind, NewPipelineStage, NewPipelineType, PipelineConversion, PipelineStage,
    PipelineType, Progression, StagedProgression,
};

use super::entities::enums::KindColumn;
use super::entities::{pipeline_conversion, pipeline_progression, pipeline_stage, pipeline_type};
use super::{queries, write_error};

#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;

/// Read access to pipeline configuration and progress.
///
/// Writes only happen inside a transaction, through [`TxPipelineRepository`].
#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait PipelineRepository: Send + Sync {
    /// Find pipeline type by ID
    async fn find_type(&self, id: Uuid) -> AppResult<Option<PipelineType>>;

    /// List the types of one entity kind by order
    async fn list_types(&self, kind: EntityKind) -> AppResult<Vec<PipelineType>>;

    /// Default type of a kind, falling back to the lowest-order active type
    async fn default_type(&self, kind: EntityKind) -> AppResult<Option<PipelineType>>;

    /// Find stage by ID
    async fn find_stage(&self, id: Uuid) -> AppResult<Option<PipelineStage>>;

    /// List every stage of a type by order
    async fn list_stages(&self, pipeline_type_id: Uuid) -> AppResult<Vec<PipelineStage>>;

    /// Find progression by ID, with its stage
    async fn find_progression(&self, id: Uuid) -> AppResult<Option<StagedProgression>>;

    /// All progressions of one entity, with their stages
    async fn progressions_for(
        &self,
        kind: EntityKind,
        entity_id: Uuid,
    ) -> AppResult<Vec<StagedProgression>>;

    /// Progressions on any of the given stages
    async fn progressions_on_stages(&self, stage_ids: Vec<Uuid>) -> AppResult<Vec<Progression>>;

    /// Conversion audit rows involving the entity
    async fn conversions_for(
        &self,
        kind: EntityKind,
        entity_id: Uuid,
    ) -> AppResult<Vec<PipelineConversion>>;
}

/// Pooled implementation of PipelineRepository
pub struct PipelineStore {
    db: DatabaseConnection,
}

impl PipelineStore {
    /// Create new repository instance
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl PipelineRepository for PipelineStore {
    async fn find_type(&self, id: Uuid) -> AppResult<Option<PipelineType>> {
        queries::find_type(&self.db, id).await
    }

    async fn list_types(&self, kind: EntityKind) -> AppResult<Vec<PipelineType>> {
        queries::list_types(&self.db, kind).await
    }

    async fn default_type(&self, kind: EntityKind) -> AppResult<Option<PipelineType>> {
        queries::default_type(&self.db, kind).await
    }

    async fn find_stage(&self, id: Uuid) -> AppResult<Option<PipelineStage>> {
        queries::find_stage(&self.db, id).await
    }

    async fn list_stages(&self, pipeline_type_id: Uuid) -> AppResult<Vec<PipelineStage>> {
        queries::list_stages(&self.db, pipeline_type_id).await
    }

    async fn find_progression(&self, id: Uuid) -> AppResult<Option<StagedProgression>> {
        queries::find_progression(&self.db, id).await
    }

    async fn progressions_for(
        &self,
        kind: EntityKind,
        entity_id: Uuid,
    ) -> AppResult<Vec<StagedProgression>> {
        queries::progressions_for(&self.db, kind, entity_id).await
    }

    async fn progressions_on_stages(&self, stage_ids: Vec<Uuid>) -> AppResult<Vec<Progression>> {
        queries::progressions_on_stages(&self.db, stage_ids).await
    }

    async fn conversions_for(
        &self,
        kind: EntityKind,
        entity_id: Uuid,
    ) -> AppResult<Vec<PipelineConversion>> {
        queries::conversions_for(&self.db, kind, entity_id).await
    }
}

/// Transaction-aware pipeline repository.
///
/// Executes all operations within the provided transaction.
#[derive(Clone, Copy)]
pub struct TxPipelineRepository<'a> {
    txn: &'a DatabaseTransaction,
}

impl<'a> TxPipelineRepository<'a> {
    pub(crate) fn new(txn: &'a DatabaseTransaction) -> Self {
        Self { txn }
    }

    // -------------------------------------------------------------------------
    // Reads
    // -------------------------------------------------------------------------

    pub async fn find_type(&self, id: Uuid) -> AppResult<Option<PipelineType>> {
        queries::find_type(self.txn, id).await
    }

    pub async fn list_types(&self, kind: EntityKind) -> AppResult<Vec<PipelineType>> {
        queries::list_types(self.txn, kind).await
    }

    pub async fn default_type(&self, kind: EntityKind) -> AppResult<Option<PipelineType>> {
        queries::default_type(self.txn, kind).await
    }

    pub async fn type_slugs_like(&self, prefix: &str) -> AppResult<HashSet<String>> {
        queries::type_slugs_like(self.txn, prefix).await
    }

    pub async fn find_stage(&self, id: Uuid) -> AppResult<Option<PipelineStage>> {
        queries::find_stage(self.txn, id).await
    }

    pub async fn list_stages(&self, pipeline_type_id: Uuid) -> AppResult<Vec<PipelineStage>> {
        queries::list_stages(self.txn, pipeline_type_id).await
    }

    pub async fn stage_slugs_like(&self, prefix: &str) -> AppResult<HashSet<String>> {
        queries::stage_slugs_like(self.txn, prefix).await
    }

    pub async fn find_progression(&self, id: Uuid) -> AppResult<Option<StagedProgression>> {
        queries::find_progression(self.txn, id).await
    }

    pub async fn progressions_for(
        &self,
        kind: EntityKind,
        entity_id: Uuid,
    ) -> AppResult<Vec<StagedProgression>> {
        queries::progressions_for(self.txn, kind, entity_id).await
    }

    pub async fn count_progressions_on_stages(&self, stage_ids: Vec<Uuid>) -> AppResult<u64> {
        queries::count_progressions_on_stages(self.txn, stage_ids).await
    }

    // -------------------------------------------------------------------------
    // Pipeline types
    // -------------------------------------------------------------------------

    /// Insert a type that is never default; callers pick the slug and order.
    pub async fn insert_type(
        &self,
        new: &NewPipelineType,
        slug: String,
        order: i32,
    ) -> AppResult<PipelineType> {
        let now = Utc::now();
        let active_model = pipeline_type::ActiveModel {
            id: Set(Uuid::new_v4()),
            entity_kind: Set(new.entity_kind.into()),
            name: Set(new.name.trim().to_string()),
            slug: Set(slug),
            description: Set(new.description.clone()),
            sort_order: Set(order),
            is_active: Set(new.is_active),
            is_default: Set(false),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let model = active_model
            .insert(self.txn)
            .await
            .map_err(write_error("Pipeline type"))?;

        Ok(PipelineType::from(model))
    }

    /// Persist name, description, order and flags of an existing type.
    pub async fn save_type(&self, pipeline_type: &PipelineType) -> AppResult<PipelineType> {
        let model = pipeline_type::Entity::find_by_id(pipeline_type.id)
            .one(self.txn)
            .await?
            .ok_or(AppError::NotFound)?;

        let mut active: pipeline_type::ActiveModel = model.into();
        active.name = Set(pipeline_type.name.clone());
        active.description = Set(pipeline_type.description.clone());
        active.sort_order = Set(pipeline_type.order);
        active.is_active = Set(pipeline_type.is_active);
        active.is_default = Set(pipeline_type.is_default);
        active.updated_at = Set(Utc::now());

        let model = active
            .update(self.txn)
            .await
            .map_err(write_error("Pipeline type"))?;

        Ok(PipelineType::from(model))
    }

    /// Clear the default flag on every type of `kind` except `keep`.
    pub async fn clear_default(&self, kind: EntityKind, keep: Uuid) -> AppResult<u64> {
        let result = pipeline_type::Entity::update_many()
            .col_expr(pipeline_type::Column::IsDefault, Expr::value(false))
            .col_expr(pipeline_type::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(pipeline_type::Column::EntityKind.eq(KindColumn::from(kind)))
            .filter(pipeline_type::Column::IsDefault.eq(true))
            .filter(pipeline_type::Column::Id.ne(keep))
            .exec(self.txn)
            .await?;

        Ok(result.rows_affected)
    }

    /// Delete a type; its stages go with it.
    pub async fn delete_type(&self, id: Uuid) -> AppResult<()> {
        let result = pipeline_type::Entity::delete_by_id(id)
            .exec(self.txn)
            .await
            .map_err(AppError::from)?;

        if result.rows_affected == 0 {
            return Err(AppError::NotFound);
        }

        Ok(())
    }

    // -------------------------------------------------------------------------
    // Stages
    // -------------------------------------------------------------------------

    pub async fn insert_stage(
        &self,
        new: &NewPipelineStage,
        slug: String,
        order: i32,
    ) -> AppResult<PipelineStage> {
        let now = Utc::now();
        let active_model = pipeline_stage::ActiveModel {
            id: Set(Uuid::new_v4()),
            pipeline_type_id: Set(new.pipeline_type_id),
            name: Set(new.name.trim().to_string()),
            slug: Set(slug),
            description: Set(new.description.clone()),
            sort_order: Set(order),
            is_final: Set(new.is_final),
            conversion_eligible: Set(new.conversion_eligible),
            color: Set(new.color.clone()),
            status: Set(new.status.clone()),
            is_active: Set(new.is_active),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let model = active_model
            .insert(self.txn)
            .await
            .map_err(write_error("Stage"))?;

        Ok(PipelineStage::from(model))
    }

    /// Persist the editable fields of an existing stage.
    pub async fn save_stage(&self, stage: &PipelineStage) -> AppResult<PipelineStage> {
        let model = pipeline_stage::Entity::find_by_id(stage.id)
            .one(self.txn)
            .await?
            .ok_or(AppError::NotFound)?;

        let mut active: pipeline_stage::ActiveModel = model.into();
        active.name = Set(stage.name.clone());
        active.description = Set(stage.description.clone());
        active.sort_order = Set(stage.order);
        active.is_final = Set(stage.is_final);
        active.conversion_eligible = Set(stage.conversion_eligible);
        active.color = Set(stage.color.clone());
        active.status = Set(stage.status.clone());
        active.is_active = Set(stage.is_active);
        active.updated_at = Set(Utc::now());

        let model = active
            .update(self.txn)
            .await
            .map_err(write_error("Stage"))?;

        Ok(PipelineStage::from(model))
    }

    pub async fn set_stage_order(&self, id: Uuid, order: i32) -> AppResult<()> {
        let result = pipeline_stage::Entity::update_many()
            .col_expr(pipeline_stage::Column::SortOrder, Expr::value(order))
            .col_expr(pipeline_stage::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(pipeline_stage::Column::Id.eq(id))
            .exec(self.txn)
            .await
            .map_err(write_error("Stage order"))?;

        if result.rows_affected == 0 {
            return Err(AppError::NotFound);
        }

        Ok(())
    }

    pub async fn delete_stage(&self, id: Uuid) -> AppResult<()> {
        let result = pipeline_stage::Entity::delete_by_id(id)
            .exec(self.txn)
            .await
            .map_err(AppError::from)?;

        if result.rows_affected == 0 {
            return Err(AppError::NotFound);
        }

        Ok(())
    }

    // -------------------------------------------------------------------------
    // Progressions
    // -------------------------------------------------------------------------

    /// Open a progression; a second row for the same entity and stage is a `Conflict`.
    pub async fn insert_progression(
        &self,
        kind: EntityKind,
        entity_id: Uuid,
        stage_id: Uuid,
        assigned_to: Option<Uuid>,
    ) -> AppResult<Progression> {
        let now = Utc::now();
        let active_model = pipeline_progression::ActiveModel {
            id: Set(Uuid::new_v4()),
            entity_kind: Set(kind.into()),
            entity_id: Set(entity_id),
            stage_id: Set(stage_id),
            completed: Set(false),
            completed_at: Set(None),
            notes: Set(None),
            assigned_to: Set(assigned_to),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let model = active_model
            .insert(self.txn)
            .await
            .map_err(write_error("Pipeline progression"))?;

        Ok(Progression::from(model))
    }

    /// Persist completion state, notes and assignee of a progression.
    pub async fn save_progression(&self, progression: &Progression) -> AppResult<Progression> {
        let model = pipeline_progression::Entity::find_by_id(progression.id)
            .one(self.txn)
            .await?
            .ok_or(AppError::NotFound)?;

        let mut active: pipeline_progression::ActiveModel = model.into();
        active.completed = Set(progression.completed);
        active.completed_at = Set(progression.completed_at);
        active.notes = Set(progression.notes.clone());
        active.assigned_to = Set(progression.assigned_to);
        active.updated_at = Set(progression.updated_at);

        let model = active.update(self.txn).await.map_err(AppError::from)?;
        Ok(Progression::from(model))
    }

    pub async fn delete_progression(&self, id: Uuid) -> AppResult<()> {
        let result = pipeline_progression::Entity::delete_by_id(id)
            .exec(self.txn)
            .await
            .map_err(AppError::from)?;

        if result.rows_affected == 0 {
            return Err(AppError::NotFound);
        }

        Ok(())
    }

    /// Remove every progression of an entity, returning how many were dropped.
    pub async fn delete_progressions_for(&self, kind: EntityKind, entity_id: Uuid) -> AppResult<u64> {
        let result = pipeline_progression::Entity::delete_many()
            .filter(pipeline_progression::Column::EntityKind.eq(KindColumn::from(kind)))
            .filter(pipeline_progression::Column::EntityId.eq(entity_id))
            .exec(self.txn)
            .await?;

        Ok(result.rows_affected)
    }

    // -------------------------------------------------------------------------
    // Conversions
    // -------------------------------------------------------------------------

    pub async fn insert_conversion(
        &self,
        source: (EntityKind, Uuid),
        target: (EntityKind, Uuid),
        converted_by: Uuid,
        conversion_notes: Option<String>,
    ) -> AppResult<PipelineConversion> {
        let active_model = pipeline_conversion::ActiveModel {
            id: Set(Uuid::new_v4()),
            source_kind: Set(source.0.into()),
            source_id: Set(source.1),
            target_kind: Set(target.0.into()),
            target_id: Set(target.1),
            converted_by: Set(converted_by),
            conversion_notes: Set(conversion_notes),
            created_at: Set(Utc::now()),
        };

        let model = active_model.insert(self.txn).await.map_err(AppError::from)?;
        Ok(PipelineConversion::from(model))
    }
}
