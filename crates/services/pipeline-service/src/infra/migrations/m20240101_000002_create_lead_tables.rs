//! Migration: Create invites, prospects, investors and projects tables.
//!
//! Each lead kind links back to the lead it was converted from through a
//! unique nullable column, so a source converts at most once.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                lead_table(Invites::Table)
                    .col(ColumnDef::new(Invites::EventName).string().null())
                    .col(ColumnDef::new(Lead::ConvertedAt).timestamp_with_time_zone().null())
                    .col(ColumnDef::new(Lead::ConvertedToId).uuid().null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                lead_table(Prospects::Table)
                    .col(ColumnDef::new(Prospects::InviteId).uuid().null().unique_key())
                    .col(ColumnDef::new(Prospects::EstimatedTicket).big_integer().null())
                    .col(ColumnDef::new(Lead::ConvertedAt).timestamp_with_time_zone().null())
                    .col(ColumnDef::new(Lead::ConvertedToId).uuid().null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_prospects_invite")
                            .from(Prospects::Table, Prospects::InviteId)
                            .to(Invites::Table, Lead::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                lead_table(Investors::Table)
                    .col(ColumnDef::new(Investors::ProspectId).uuid().null().unique_key())
                    .col(ColumnDef::new(Investors::InvestmentCapacity).big_integer().null())
                    .col(ColumnDef::new(Lead::ConvertedAt).timestamp_with_time_zone().null())
                    .col(ColumnDef::new(Lead::ConvertedToId).uuid().null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_investors_prospect")
                            .from(Investors::Table, Investors::ProspectId)
                            .to(Prospects::Table, Lead::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                lead_table(Projects::Table)
                    .col(ColumnDef::new(Projects::InvestorId).uuid().null().unique_key())
                    .col(ColumnDef::new(Projects::Budget).big_integer().null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_projects_investor")
                            .from(Projects::Table, Projects::InvestorId)
                            .to(Investors::Table, Lead::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Reverse dependency order
        manager
            .drop_table(Table::drop().table(Projects::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Investors::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Prospects::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Invites::Table).to_owned())
            .await
    }
}

/// Columns shared by every lead table.
fn lead_table<T: IntoIden + 'static>(table: T) -> TableCreateStatement {
    Table::create()
        .table(table)
        .if_not_exists()
        .col(ColumnDef::new(Lead::Id).uuid().not_null().primary_key())
        .col(ColumnDef::new(Lead::Name).string().not_null())
        .col(ColumnDef::new(Lead::Email).string().null())
        .col(ColumnDef::new(Lead::Phone).string().null())
        .col(ColumnDef::new(Lead::CompanyId).uuid().null())
        .col(ColumnDef::new(Lead::CountryId).uuid().null())
        .col(ColumnDef::new(Lead::SectorId).uuid().null())
        .col(ColumnDef::new(Lead::ResponsibleUserId).uuid().null())
        .col(ColumnDef::new(Lead::Status).text().not_null().default("new"))
        .col(ColumnDef::new(Lead::CreatedAt).timestamp_with_time_zone().not_null())
        .col(ColumnDef::new(Lead::UpdatedAt).timestamp_with_time_zone().not_null())
        .to_owned()
}

#[derive(Iden)]
enum Lead {
    Id,
    Name,
    Email,
    Phone,
    CompanyId,
    CountryId,
    SectorId,
    ResponsibleUserId,
    Status,
    ConvertedAt,
    ConvertedToId,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum Invites {
    Table,
    EventName,
}

#[derive(Iden)]
enum Prospects {
    Table,
    InviteId,
    EstimatedTicket,
}

#[derive(Iden)]
enum Investors {
    Table,
    ProspectId,
    InvestmentCapacity,
}

#[derive(Iden)]
enum Projects {
    Table,
    InvestorId,
    Budget,
}
