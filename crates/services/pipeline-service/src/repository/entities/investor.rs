//! Investor database entity for SeaORM.

use sea_orm::entity::prelude::*;

use domain::{EntityKind, Lead};

use super::enums::StatusColumn;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "investors")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub company_id: Option<Uuid>,
    pub country_id: Option<Uuid>,
    pub sector_id: Option<Uuid>,
    pub responsible_user_id: Option<Uuid>,
    /// Prospect this investor was converted from
    #[sea_orm(unique)]
    pub prospect_id: Option<Uuid>,
    pub investment_capacity: Option<i64>,
    pub status: StatusColumn,
    pub converted_at: Option<DateTimeUtc>,
    pub converted_to_id: Option<Uuid>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for Lead {
    fn from(model: Model) -> Self {
        Lead {
            id: model.id,
            kind: EntityKind::Investor,
            name: model.name,
            email: model.email,
            phone: model.phone,
            company_id: model.company_id,
            country_id: model.country_id,
            sector_id: model.sector_id,
            responsible_user_id: model.responsible_user_id,
            event_name: None,
            amount: model.investment_capacity,
            source_id: model.prospect_id,
            status: model.status.into(),
            converted_at: model.converted_at,
            converted_to_id: model.converted_to_id,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}
