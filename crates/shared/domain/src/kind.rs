//! Entity kinds of the conversion chain and their coarse status.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::constants::{
    KIND_INVESTOR, KIND_INVITE, KIND_PROJECT, KIND_PROSPECT, STATUS_CONVERTED, STATUS_INACTIVE,
    STATUS_IN_PROGRESS, STATUS_NEW, STATUS_QUALIFIED,
};
use crate::error::DomainError;

/// The four kinds of record moving through the funnel, in chain order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Invite,
    Prospect,
    Investor,
    Project,
}

impl EntityKind {
    pub const ALL: [EntityKind; 4] = [
        EntityKind::Invite,
        EntityKind::Prospect,
        EntityKind::Investor,
        EntityKind::Project,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Invite => KIND_INVITE,
            EntityKind::Prospect => KIND_PROSPECT,
            EntityKind::Investor => KIND_INVESTOR,
            EntityKind::Project => KIND_PROJECT,
        }
    }

    /// Kind this one converts into, if any.
    pub fn successor(&self) -> Option<EntityKind> {
        match self {
            EntityKind::Invite => Some(EntityKind::Prospect),
            EntityKind::Prospect => Some(EntityKind::Investor),
            EntityKind::Investor => Some(EntityKind::Project),
            EntityKind::Project => None,
        }
    }

    /// Kind this one is converted from, if any.
    pub fn predecessor(&self) -> Option<EntityKind> {
        match self {
            EntityKind::Invite => None,
            EntityKind::Prospect => Some(EntityKind::Invite),
            EntityKind::Investor => Some(EntityKind::Prospect),
            EntityKind::Project => Some(EntityKind::Investor),
        }
    }

    /// Invite stages carry an extra `conversion_eligible` flag that gates promotion.
    pub fn uses_conversion_eligible_stages(&self) -> bool {
        matches!(self, EntityKind::Invite)
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            KIND_INVITE => Ok(EntityKind::Invite),
            KIND_PROSPECT => Ok(EntityKind::Prospect),
            KIND_INVESTOR => Ok(EntityKind::Investor),
            KIND_PROJECT => Ok(EntityKind::Project),
            other => Err(DomainError::validation(format!("Unknown entity kind '{}'", other))),
        }
    }
}

/// Where an entity sits in its pipeline, as far as the status projection cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StagePosition {
    /// No progression yet
    Unplaced,
    /// Open on the first stage
    Opening,
    Underway,
    /// Last stage completed, and that stage is final
    Finished,
}

/// Coarse status stored on every lead.
///
/// Derived from pipeline position on every advancement; the progression
/// chain stays the source of truth. `Converted` and `Inactive` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeadStatus {
    New,
    InProgress,
    Qualified,
    Converted,
    Inactive,
}

impl LeadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeadStatus::New => STATUS_NEW,
            LeadStatus::InProgress => STATUS_IN_PROGRESS,
            LeadStatus::Qualified => STATUS_QUALIFIED,
            LeadStatus::Converted => STATUS_CONVERTED,
            LeadStatus::Inactive => STATUS_INACTIVE,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, LeadStatus::Converted | LeadStatus::Inactive)
    }

    /// Status implied by `position`; terminal statuses are kept as they are.
    pub fn project(self, position: StagePosition) -> LeadStatus {
        if self.is_terminal() {
            return self;
        }

        match position {
            StagePosition::Unplaced | StagePosition::Opening => LeadStatus::New,
            StagePosition::Underway => LeadStatus::InProgress,
            StagePosition::Finished => LeadStatus::Qualified,
        }
    }
}

impl fmt::Display for LeadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LeadStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            STATUS_NEW => Ok(LeadStatus::New),
            STATUS_IN_PROGRESS => Ok(LeadStatus::InProgress),
            STATUS_QUALIFIED => Ok(LeadStatus::Qualified),
            STATUS_CONVERTED => Ok(LeadStatus::Converted),
            STATUS_INACTIVE => Ok(LeadStatus::Inactive),
            other => Err(DomainError::validation(format!("Unknown lead status '{}'", other))),
        }
    }
}
