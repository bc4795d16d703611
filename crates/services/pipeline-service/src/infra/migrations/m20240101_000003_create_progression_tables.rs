//! Migration: Create pipeline_progressions and pipeline_conversions tables.

use sea_orm_migration::prelude::*;

use super::m20240101_000001_create_pipeline_tables::PipelineStages;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(PipelineProgressions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PipelineProgressions::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(PipelineProgressions::EntityKind).text().not_null())
                    .col(ColumnDef::new(PipelineProgressions::EntityId).uuid().not_null())
                    .col(ColumnDef::new(PipelineProgressions::StageId).uuid().not_null())
                    .col(
                        ColumnDef::new(PipelineProgressions::Completed)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(PipelineProgressions::CompletedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(ColumnDef::new(PipelineProgressions::Notes).text().null())
                    .col(ColumnDef::new(PipelineProgressions::AssignedTo).uuid().null())
                    .col(
                        ColumnDef::new(PipelineProgressions::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PipelineProgressions::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_pipeline_progressions_stage")
                            .from(PipelineProgressions::Table, PipelineProgressions::StageId)
                            .to(PipelineStages::Table, PipelineStages::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await?;

        // One progression per entity and stage, enforced by the store
        manager
            .create_index(
                Index::create()
                    .name("uq_pipeline_progressions_entity_stage")
                    .table(PipelineProgressions::Table)
                    .col(PipelineProgressions::EntityKind)
                    .col(PipelineProgressions::EntityId)
                    .col(PipelineProgressions::StageId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(PipelineConversions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PipelineConversions::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(PipelineConversions::SourceKind).text().not_null())
                    .col(ColumnDef::new(PipelineConversions::SourceId).uuid().not_null())
                    .col(ColumnDef::new(PipelineConversions::TargetKind).text().not_null())
                    .col(ColumnDef::new(PipelineConversions::TargetId).uuid().not_null())
                    .col(ColumnDef::new(PipelineConversions::ConvertedBy).uuid().not_null())
                    .col(ColumnDef::new(PipelineConversions::ConversionNotes).text().null())
                    .col(
                        ColumnDef::new(PipelineConversions::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_pipeline_conversions_source")
                    .table(PipelineConversions::Table)
                    .col(PipelineConversions::SourceKind)
                    .col(PipelineConversions::SourceId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_pipeline_conversions_target")
                    .table(PipelineConversions::Table)
                    .col(PipelineConversions::TargetKind)
                    .col(PipelineConversions::TargetId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(PipelineConversions::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(PipelineProgressions::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum PipelineProgressions {
    Table,
    Id,
    EntityKind,
    EntityId,
    StageId,
    Completed,
    CompletedAt,
    Notes,
    AssignedTo,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum PipelineConversions {
    Table,
    Id,
    SourceKind,
    SourceId,
    TargetKind,
    TargetId,
    ConvertedBy,
    ConversionNotes,
    CreatedAt,
}
