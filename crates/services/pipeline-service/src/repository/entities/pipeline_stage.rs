//! Pipeline stage database entity for SeaORM.

use sea_orm::entity::prelude::*;

use domain::PipelineStage;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "pipeline_stages")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub pipeline_type_id: Uuid,
    pub name: String,
    #[sea_orm(unique)]
    pub slug: String,
    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,
    pub sort_order: i32,
    pub is_final: bool,
    pub conversion_eligible: bool,
    pub color: Option<String>,
    pub status: Option<String>,
    pub is_active: bool,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::pipeline_type::Entity",
        from = "Column::PipelineTypeId",
        to = "super::pipeline_type::Column::Id",
        on_delete = "Cascade"
    )]
    PipelineType,
    #[sea_orm(has_many = "super::pipeline_progression::Entity")]
    Progressions,
}

impl Related<super::pipeline_type::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PipelineType.def()
    }
}

impl Related<super::pipeline_progression::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Progressions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for PipelineStage {
    fn from(model: Model) -> Self {
        PipelineStage {
            id: model.id,
            pipeline_type_id: model.pipeline_type_id,
            name: model.name,
            slug: model.slug,
            description: model.description,
            order: model.sort_order,
            is_final: model.is_final,
            conversion_eligible: model.conversion_eligible,
            color: model.color,
            status: model.status,
            is_active: model.is_active,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}
