//! Lead repository over the four conversion-chain tables.
//!
//! Every lead kind has its own table with the same shared columns, so the
//! per-kind dispatch is generated by small macros over the entity modules.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ConnectionTrait, DatabaseConnection, DatabaseTransaction, EntityTrait,
    QueryOrder, Set,
};
use uuid::Uuid;

use common::{AppError, AppResult};
use domain::{EntityKind, Lead, LeadStatus, NewLead};

use super::entities::enums::StatusColumn;
use super::entities::{investor, invite, project, prospect};
use super::write_error;

#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;

macro_rules! find_lead {
    ($entity:ident, $db:expr, $id:expr) => {
        $entity::Entity::find_by_id($id)
            .one($db)
            .await?
            .map(Lead::from)
    };
}

macro_rules! list_leads {
    ($entity:ident, $db:expr) => {
        $entity::Entity::find()
            .order_by_asc($entity::Column::CreatedAt)
            .all($db)
            .await?
            .into_iter()
            .map(Lead::from)
            .collect()
    };
}

macro_rules! set_status {
    ($entity:ident, $db:expr, $id:expr, $status:expr) => {{
        let model = $entity::Entity::find_by_id($id)
            .one($db)
            .await?
            .ok_or(AppError::NotFound)?;

        let mut active: $entity::ActiveModel = model.into();
        active.status = Set($status);
        active.updated_at = Set(Utc::now());
        Lead::from(active.update($db).await.map_err(AppError::from)?)
    }};
}

macro_rules! mark_converted {
    ($entity:ident, $db:expr, $id:expr, $target_id:expr, $at:expr) => {{
        let model = $entity::Entity::find_by_id($id)
            .one($db)
            .await?
            .ok_or(AppError::NotFound)?;

        let mut active: $entity::ActiveModel = model.into();
        active.status = Set(StatusColumn::Converted);
        active.converted_at = Set(Some($at));
        active.converted_to_id = Set(Some($target_id));
        active.updated_at = Set($at);
        Lead::from(active.update($db).await.map_err(AppError::from)?)
    }};
}

async fn find<C: ConnectionTrait>(db: &C, kind: EntityKind, id: Uuid) -> AppResult<Option<Lead>> {
    let lead = match kind {
        EntityKind::Invite => find_lead!(invite, db, id),
        EntityKind::Prospect => find_lead!(prospect, db, id),
        EntityKind::Investor => find_lead!(investor, db, id),
        EntityKind::Project => find_lead!(project, db, id),
    };
    Ok(lead)
}

async fn list<C: ConnectionTrait>(db: &C, kind: EntityKind) -> AppResult<Vec<Lead>> {
    let leads: Vec<Lead> = match kind {
        EntityKind::Invite => list_leads!(invite, db),
        EntityKind::Prospect => list_leads!(prospect, db),
        EntityKind::Investor => list_leads!(investor, db),
        EntityKind::Project => list_leads!(project, db),
    };
    Ok(leads)
}

/// Insert a `new` lead; `source_id` becomes the kind's back-reference column.
async fn create<C: ConnectionTrait>(db: &C, kind: EntityKind, new: NewLead) -> AppResult<Lead> {
    let now = Utc::now();
    let status = StatusColumn::from(LeadStatus::New);
    let source_id = new.source_id();
    let what = match kind {
        EntityKind::Invite => "Invite",
        EntityKind::Prospect => "Prospect for this invite",
        EntityKind::Investor => "Investor for this prospect",
        EntityKind::Project => "Project for this investor",
    };

    let model = match kind {
        EntityKind::Invite => invite::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(new.name),
            email: Set(new.email),
            phone: Set(new.phone),
            company_id: Set(new.company_id),
            country_id: Set(new.country_id),
            sector_id: Set(new.sector_id),
            responsible_user_id: Set(new.responsible_user_id),
            event_name: Set(new.event_name),
            status: Set(status),
            converted_at: Set(None),
            converted_to_id: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(db)
        .await
        .map(Lead::from),
        EntityKind::Prospect => prospect::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(new.name),
            email: Set(new.email),
            phone: Set(new.phone),
            company_id: Set(new.company_id),
            country_id: Set(new.country_id),
            sector_id: Set(new.sector_id),
            responsible_user_id: Set(new.responsible_user_id),
            invite_id: Set(source_id),
            estimated_ticket: Set(new.amount),
            status: Set(status),
            converted_at: Set(None),
            converted_to_id: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(db)
        .await
        .map(Lead::from),
        EntityKind::Investor => investor::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(new.name),
            email: Set(new.email),
            phone: Set(new.phone),
            company_id: Set(new.company_id),
            country_id: Set(new.country_id),
            sector_id: Set(new.sector_id),
            responsible_user_id: Set(new.responsible_user_id),
            prospect_id: Set(source_id),
            investment_capacity: Set(new.amount),
            status: Set(status),
            converted_at: Set(None),
            converted_to_id: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(db)
        .await
        .map(Lead::from),
        EntityKind::Project => project::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(new.name),
            email: Set(new.email),
            phone: Set(new.phone),
            company_id: Set(new.company_id),
            country_id: Set(new.country_id),
            sector_id: Set(new.sector_id),
            responsible_user_id: Set(new.responsible_user_id),
            investor_id: Set(source_id),
            budget: Set(new.amount),
            status: Set(status),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(db)
        .await
        .map(Lead::from),
    };

    model.map_err(write_error(what))
}

/// Lead repository trait for dependency injection.
#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait LeadRepository: Send + Sync {
    /// Find lead of a kind by ID
    async fn find(&self, kind: EntityKind, id: Uuid) -> AppResult<Option<Lead>>;

    /// List leads of a kind, oldest first
    async fn list(&self, kind: EntityKind) -> AppResult<Vec<Lead>>;

    /// Create a new lead with status `new`
    async fn create(&self, kind: EntityKind, new: NewLead) -> AppResult<Lead>;
}

/// Pooled implementation of LeadRepository
pub struct LeadStore {
    db: DatabaseConnection,
}

impl LeadStore {
    /// Create new repository instance
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl LeadRepository for LeadStore {
    async fn find(&self, kind: EntityKind, id: Uuid) -> AppResult<Option<Lead>> {
        find(&self.db, kind, id).await
    }

    async fn list(&self, kind: EntityKind) -> AppResult<Vec<Lead>> {
        list(&self.db, kind).await
    }

    async fn create(&self, kind: EntityKind, new: NewLead) -> AppResult<Lead> {
        create(&self.db, kind, new).await
    }
}

/// Transaction-aware lead repository.
#[derive(Clone, Copy)]
pub struct TxLeadRepository<'a> {
    txn: &'a DatabaseTransaction,
}

impl<'a> TxLeadRepository<'a> {
    pub(crate) fn new(txn: &'a DatabaseTransaction) -> Self {
        Self { txn }
    }

    pub async fn find(&self, kind: EntityKind, id: Uuid) -> AppResult<Option<Lead>> {
        find(self.txn, kind, id).await
    }

    pub async fn create(&self, kind: EntityKind, new: NewLead) -> AppResult<Lead> {
        create(self.txn, kind, new).await
    }

    /// Overwrite the stored status.
    pub async fn set_status(&self, kind: EntityKind, id: Uuid, status: LeadStatus) -> AppResult<Lead> {
        let status = StatusColumn::from(status);
        let lead = match kind {
            EntityKind::Invite => set_status!(invite, self.txn, id, status),
            EntityKind::Prospect => set_status!(prospect, self.txn, id, status),
            EntityKind::Investor => set_status!(investor, self.txn, id, status),
            EntityKind::Project => set_status!(project, self.txn, id, status),
        };
        Ok(lead)
    }

    /// Set status `converted` and the forward marker pointing at `target_id`.
    pub async fn mark_converted(
        &self,
        kind: EntityKind,
        id: Uuid,
        target_id: Uuid,
        at: DateTime<Utc>,
    ) -> AppResult<Lead> {
        let lead = match kind {
            EntityKind::Invite => mark_converted!(invite, self.txn, id, target_id, at),
            EntityKind::Prospect => mark_converted!(prospect, self.txn, id, target_id, at),
            EntityKind::Investor => mark_converted!(investor, self.txn, id, target_id, at),
            EntityKind::Project => return Err(AppError::internal("projects cannot be converted")),
        };
        Ok(lead)
    }
}
