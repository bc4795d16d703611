//! Migration: Create pipeline_types and pipeline_stages tables.

use sea_orm_migration::prelude::*;
use sea_orm_migration::sea_orm::ConnectionTrait;

/// Partial index, so it is written by hand for every backend.
const DEFAULT_PER_KIND_INDEX: &str = "CREATE UNIQUE INDEX uq_pipeline_types_default_per_kind \
     ON pipeline_types (entity_kind) WHERE is_default";

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(PipelineTypes::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(PipelineTypes::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(PipelineTypes::EntityKind).text().not_null())
                    .col(ColumnDef::new(PipelineTypes::Name).string().not_null())
                    .col(ColumnDef::new(PipelineTypes::Slug).string().not_null().unique_key())
                    .col(ColumnDef::new(PipelineTypes::Description).text().null())
                    .col(ColumnDef::new(PipelineTypes::SortOrder).integer().not_null().default(0))
                    .col(ColumnDef::new(PipelineTypes::IsActive).boolean().not_null().default(true))
                    .col(ColumnDef::new(PipelineTypes::IsDefault).boolean().not_null().default(false))
                    .col(
                        ColumnDef::new(PipelineTypes::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PipelineTypes::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_pipeline_types_kind_order")
                    .table(PipelineTypes::Table)
                    .col(PipelineTypes::EntityKind)
                    .col(PipelineTypes::SortOrder)
                    .to_owned(),
            )
            .await?;

        manager
            .get_connection()
            .execute_unprepared(DEFAULT_PER_KIND_INDEX)
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(PipelineStages::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(PipelineStages::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(PipelineStages::PipelineTypeId).uuid().not_null())
                    .col(ColumnDef::new(PipelineStages::Name).string().not_null())
                    .col(ColumnDef::new(PipelineStages::Slug).string().not_null().unique_key())
                    .col(ColumnDef::new(PipelineStages::Description).text().null())
                    .col(ColumnDef::new(PipelineStages::SortOrder).integer().not_null())
                    .col(ColumnDef::new(PipelineStages::IsFinal).boolean().not_null().default(false))
                    .col(
                        ColumnDef::new(PipelineStages::ConversionEligible)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(PipelineStages::Color).string().null())
                    .col(ColumnDef::new(PipelineStages::Status).string().null())
                    .col(ColumnDef::new(PipelineStages::IsActive).boolean().not_null().default(true))
                    .col(
                        ColumnDef::new(PipelineStages::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PipelineStages::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_pipeline_stages_pipeline_type")
                            .from(PipelineStages::Table, PipelineStages::PipelineTypeId)
                            .to(PipelineTypes::Table, PipelineTypes::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Stage order is unique within a type
        manager
            .create_index(
                Index::create()
                    .name("uq_pipeline_stages_type_order")
                    .table(PipelineStages::Table)
                    .col(PipelineStages::PipelineTypeId)
                    .col(PipelineStages::SortOrder)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(PipelineStages::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(PipelineTypes::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub(super) enum PipelineTypes {
    Table,
    Id,
    EntityKind,
    Name,
    Slug,
    Description,
    SortOrder,
    IsActive,
    IsDefault,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
pub(super) enum PipelineStages {
    Table,
    Id,
    PipelineTypeId,
    Name,
    Slug,
    Description,
    SortOrder,
    IsFinal,
    ConversionEligible,
    Color,
    Status,
    IsActive,
    CreatedAt,
    UpdatedAt,
}
