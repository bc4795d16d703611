//! Conversion chain records: invites, prospects, investors and projects.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::kind::{EntityKind, LeadStatus};
use crate::pipeline::PipelineStage;
use crate::validation::not_blank;

/// A record of any kind in the Invite → Prospect → Investor → Project chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lead {
    pub id: Uuid,
    pub kind: EntityKind,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub company_id: Option<Uuid>,
    pub country_id: Option<Uuid>,
    pub sector_id: Option<Uuid>,
    pub responsible_user_id: Option<Uuid>,
    /// Invites only
    pub event_name: Option<String>,
    /// Estimated ticket, investment capacity or budget depending on the kind
    pub amount: Option<i64>,
    /// Record of the previous kind this one was converted from
    pub source_id: Option<Uuid>,
    pub status: LeadStatus,
    pub converted_at: Option<DateTime<Utc>>,
    pub converted_to_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Lead {
    pub fn is_converted(&self) -> bool {
        self.converted_at.is_some() || self.converted_to_id.is_some()
    }

    /// Why this lead cannot be converted, ignoring its pipeline, if anything blocks it.
    pub fn conversion_blocker(&self) -> Option<String> {
        if self.kind.successor().is_none() {
            return Some(format!("{} is the last kind of the chain", self.kind));
        }
        if self.is_converted() {
            return Some(format!("{} {} was already converted", self.kind, self.id));
        }
        if self.status.is_terminal() {
            return Some(format!("{} {} is {}", self.kind, self.id, self.status));
        }
        None
    }

    /// Eligibility given the stages of this lead's *completed* progressions.
    ///
    /// Needs one completed final stage; invites additionally need that stage
    /// to be conversion eligible.
    pub fn can_convert<'a>(
        &self,
        completed_stages: impl IntoIterator<Item = &'a PipelineStage>,
    ) -> bool {
        if self.conversion_blocker().is_some() {
            return false;
        }

        let needs_eligible = self.kind.uses_conversion_eligible_stages();
        completed_stages
            .into_iter()
            .any(|stage| stage.is_final && (!needs_eligible || stage.conversion_eligible))
    }
}

/// Lead creation data transfer object
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct NewLead {
    #[validate(custom(function = "not_blank"))]
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub company_id: Option<Uuid>,
    pub country_id: Option<Uuid>,
    pub sector_id: Option<Uuid>,
    pub responsible_user_id: Option<Uuid>,
    pub event_name: Option<String>,
    pub amount: Option<i64>,
    /// Only set through [`NewLead::successor_of`]
    #[serde(skip)]
    source_id: Option<Uuid>,
}

impl NewLead {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Successor record carrying over the fields shared by every kind.
    pub fn successor_of(source: &Lead) -> Self {
        Self {
            name: source.name.clone(),
            email: source.email.clone(),
            phone: source.phone.clone(),
            company_id: source.company_id,
            country_id: source.country_id,
            sector_id: source.sector_id,
            responsible_user_id: source.responsible_user_id,
            event_name: None,
            amount: None,
            source_id: Some(source.id),
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_event_name(mut self, event_name: impl Into<String>) -> Self {
        self.event_name = Some(event_name.into());
        self
    }

    pub fn with_amount(mut self, amount: i64) -> Self {
        self.amount = Some(amount);
        self
    }

    /// Record this lead was converted from.
    pub fn source_id(&self) -> Option<Uuid> {
        self.source_id
    }
}

/// Caller-supplied values replacing the copied ones on a conversion target.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LeadOverrides {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub company_id: Option<Uuid>,
    pub country_id: Option<Uuid>,
    pub sector_id: Option<Uuid>,
    pub responsible_user_id: Option<Uuid>,
    pub amount: Option<i64>,
}

impl LeadOverrides {
    pub fn apply(self, mut lead: NewLead) -> NewLead {
        if let Some(name) = self.name {
            lead.name = name;
        }
        if self.email.is_some() {
            lead.email = self.email;
        }
        if self.phone.is_some() {
            lead.phone = self.phone;
        }
        if self.company_id.is_some() {
            lead.company_id = self.company_id;
        }
        if self.country_id.is_some() {
            lead.country_id = self.country_id;
        }
        if self.sector_id.is_some() {
            lead.sector_id = self.sector_id;
        }
        if self.responsible_user_id.is_some() {
            lead.responsible_user_id = self.responsible_user_id;
        }
        if self.amount.is_some() {
            lead.amount = self.amount;
        }
        lead
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::tests::stage;

    fn lead(kind: EntityKind) -> Lead {
        let now = Utc::now();
        Lead {
            id: Uuid::new_v4(),
            kind,
            name: "Acme Capital".to_string(),
            email: Some("contact@acme.test".to_string()),
            phone: None,
            company_id: Some(Uuid::new_v4()),
            country_id: None,
            sector_id: None,
            responsible_user_id: Some(Uuid::new_v4()),
            event_name: Some("Investor day".to_string()),
            amount: None,
            source_id: None,
            status: LeadStatus::InProgress,
            converted_at: None,
            converted_to_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn invite_needs_a_conversion_eligible_final_stage() {
        let type_id = Uuid::new_v4();
        let mut final_only = stage(type_id, "Confirmed", 30);
        final_only.is_final = true;
        let mut eligible = final_only.clone();
        eligible.conversion_eligible = true;

        let invite = lead(EntityKind::Invite);
        assert!(!invite.can_convert([&final_only]));
        assert!(invite.can_convert([&eligible]));

        let prospect = lead(EntityKind::Prospect);
        assert!(prospect.can_convert([&final_only]));
    }

    #[test]
    fn converted_or_terminal_leads_are_blocked() {
        let mut final_stage = stage(Uuid::new_v4(), "Done", 10);
        final_stage.is_final = true;

        let mut converted = lead(EntityKind::Prospect);
        converted.converted_at = Some(Utc::now());
        assert!(!converted.can_convert([&final_stage]));

        let mut inactive = lead(EntityKind::Prospect);
        inactive.status = LeadStatus::Inactive;
        assert!(!inactive.can_convert([&final_stage]));

        let project = lead(EntityKind::Project);
        assert!(!project.can_convert([&final_stage]));
    }

    #[test]
    fn successor_copies_shared_fields_and_applies_overrides() {
        let invite = lead(EntityKind::Invite);
        let target = LeadOverrides {
            amount: Some(250_000),
            email: Some("ir@acme.test".to_string()),
            ..LeadOverrides::default()
        }
        .apply(NewLead::successor_of(&invite));

        assert_eq!(target.name, invite.name);
        assert_eq!(target.company_id, invite.company_id);
        assert_eq!(target.responsible_user_id, invite.responsible_user_id);
        assert_eq!(target.source_id, Some(invite.id));
        assert_eq!(target.event_name, None);
        assert_eq!(target.amount, Some(250_000));
        assert_eq!(target.email.as_deref(), Some("ir@acme.test"));
    }

    #[test]
    fn deserialized_leads_carry_no_source() {
        let new: NewLead = serde_json::from_str(&format!(
            r#"{{"name": "Acme", "source_id": "{}"}}"#,
            Uuid::new_v4()
        ))
        .unwrap();
        assert_eq!(new.source_id(), None);
        assert_eq!(NewLead::named("Acme").with_amount(5).source_id(), None);
    }
}
