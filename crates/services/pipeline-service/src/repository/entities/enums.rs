//! Stored representations of domain enums.

use sea_orm::entity::prelude::*;

use domain::{EntityKind, LeadStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "Text")]
pub enum KindColumn {
    #[sea_orm(string_value = "invite")]
    Invite,
    #[sea_orm(string_value = "prospect")]
    Prospect,
    #[sea_orm(string_value = "investor")]
    Investor,
    #[sea_orm(string_value = "project")]
    Project,
}

impl From<EntityKind> for KindColumn {
    fn from(kind: EntityKind) -> Self {
        match kind {
            EntityKind::Invite => KindColumn::Invite,
            EntityKind::Prospect => KindColumn::Prospect,
            EntityKind::Investor => KindColumn::Investor,
            EntityKind::Project => KindColumn::Project,
        }
    }
}

impl From<KindColumn> for EntityKind {
    fn from(column: KindColumn) -> Self {
        match column {
            KindColumn::Invite => EntityKind::Invite,
            KindColumn::Prospect => EntityKind::Prospect,
            KindColumn::Investor => EntityKind::Investor,
            KindColumn::Project => EntityKind::Project,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "Text")]
pub enum StatusColumn {
    #[sea_orm(string_value = "new")]
    New,
    #[sea_orm(string_value = "in_progress")]
    InProgress,
    #[sea_orm(string_value = "qualified")]
    Qualified,
    #[sea_orm(string_value = "converted")]
    Converted,
    #[sea_orm(string_value = "inactive")]
    Inactive,
}

impl From<LeadStatus> for StatusColumn {
    fn from(status: LeadStatus) -> Self {
        match status {
            LeadStatus::New => StatusColumn::New,
            LeadStatus::InProgress => StatusColumn::InProgress,
            LeadStatus::Qualified => StatusColumn::Qualified,
            LeadStatus::Converted => StatusColumn::Converted,
            LeadStatus::Inactive => StatusColumn::Inactive,
        }
    }
}

impl From<StatusColumn> for LeadStatus {
    fn from(column: StatusColumn) -> Self {
        match column {
            StatusColumn::New => LeadStatus::New,
            StatusColumn::InProgress => LeadStatus::InProgress,
            StatusColumn::Qualified => LeadStatus::Qualified,
            StatusColumn::Converted => LeadStatus::Converted,
            StatusColumn::Inactive => LeadStatus::Inactive,
        }
    }
}
