//! Conversion audit database entity for SeaORM. Rows are never updated.

use sea_orm::entity::prelude::*;

use domain::PipelineConversion;

use super::enums::KindColumn;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "pipeline_conversions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub source_kind: KindColumn,
    pub source_id: Uuid,
    pub target_kind: KindColumn,
    pub target_id: Uuid,
    pub converted_by: Uuid,
    #[sea_orm(column_type = "Text", nullable)]
    pub conversion_notes: Option<String>,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for PipelineConversion {
    fn from(model: Model) -> Self {
        PipelineConversion {
            id: model.id,
            source_kind: model.source_kind.into(),
            source_id: model.source_id,
            target_kind: model.target_kind.into(),
            target_id: model.target_id,
            converted_by: model.converted_by,
            conversion_notes: model.conversion_notes,
            created_at: model.created_at,
        }
    }
}
