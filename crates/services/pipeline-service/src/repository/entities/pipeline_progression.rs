//! Pipeline progression database entity for SeaORM.
//!
//! One table for every entity kind; `(entity_kind, entity_id, stage_id)` is unique.

use sea_orm::entity::prelude::*;

use domain::Progression;

use super::enums::KindColumn;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "pipeline_progressions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub entity_kind: KindColumn,
    pub entity_id: Uuid,
    pub stage_id: Uuid,
    pub completed: bool,
    pub completed_at: Option<DateTimeUtc>,
    #[sea_orm(column_type = "Text", nullable)]
    pub notes: Option<String>,
    pub assigned_to: Option<Uuid>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::pipeline_stage::Entity",
        from = "Column::StageId",
        to = "super::pipeline_stage::Column::Id"
    )]
    Stage,
}

impl Related<super::pipeline_stage::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Stage.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for Progression {
    fn from(model: Model) -> Self {
        Progression {
            id: model.id,
            entity_kind: model.entity_kind.into(),
            entity_id: model.entity_id,
            stage_id: model.stage_id,
            completed: model.completed,
            completed_at: model.completed_at,
            notes: model.notes,
            assigned_to: model.assigned_to,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}
