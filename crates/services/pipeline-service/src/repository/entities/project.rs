//! Project database entity for SeaORM.
//!
//! Projects end the chain and carry no conversion columns.

use sea_orm::entity::prelude::*;

use domain::{EntityKind, Lead};

use super::enums::StatusColumn;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "projects")]
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
    /// Investor this project was converted from
    #[sea_orm(unique)]
    pub investor_id: Option<Uuid>,
    pub budget: Option<i64>,
    pub status: StatusColumn,
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
            kind: EntityKind::Project,
            name: model.name,
            email: model.email,
            phone: model.phone,
            company_id: model.company_id,
            country_id: model.country_id,
            sector_id: model.sector_id,
            responsible_user_id: model.responsible_user_id,
            event_name: None,
            amount: model.budget,
            source_id: model.investor_id,
            status: model.status.into(),
            converted_at: None,
            converted_to_id: None,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}
