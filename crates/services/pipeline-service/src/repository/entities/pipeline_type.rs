//! Pipeline type database entity for SeaORM.

use sea_orm::entity::prelude::*;

use domain::PipelineType;

use super::enums::KindColumn;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "pipeline_types")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub entity_kind: KindColumn,
    pub name: String,
    #[sea_orm(unique)]
    pub slug: String,
    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,
    pub sort_order: i32,
    pub is_active: bool,
    /// At most one per entity kind (partial unique index)
    pub is_default: bool,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::pipeline_stage::Entity")]
    Stages,
}

impl Related<super::pipeline_stage::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Stages.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for PipelineType {
    fn from(model: Model) -> Self {
        PipelineType {
            id: model.id,
            entity_kind: model.entity_kind.into(),
            name: model.name,
            slug: model.slug,
            description: model.description,
            order: model.sort_order,
            is_active: model.is_active,
            is_default: model.is_default,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}
