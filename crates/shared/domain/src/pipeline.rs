//! Pipeline types, their stages, and stage ordering.
//!
//! Stage order values are sparse: gaps are expected so stages can be
//! inserted between existing ones. Only *active* stages take part in
//! next/previous/first/last lookups.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::constants::DUPLICATE_NAME_SUFFIX;
use crate::error::{DomainError, DomainResult};
use crate::kind::EntityKind;
use crate::validation::not_blank;

/// A named, ordered pipeline configuration for one entity kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineType {
    pub id: Uuid,
    pub entity_kind: EntityKind,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub order: i32,
    pub is_active: bool,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PipelineType {
    /// Name given to a duplicate when the caller does not pick one
    pub fn duplicate_name(&self) -> String {
        format!("{}{}", self.name, DUPLICATE_NAME_SUFFIX)
    }
}

/// One step of a pipeline type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineStage {
    pub id: Uuid,
    pub pipeline_type_id: Uuid,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub order: i32,
    pub is_final: bool,
    /// Invite stages only: completing it authorizes promotion to Prospect
    pub conversion_eligible: bool,
    pub color: Option<String>,
    pub status: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Pipeline type with its stages, sorted by order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineTypeWithStages {
    #[serde(flatten)]
    pub pipeline_type: PipelineType,
    pub stages: Vec<PipelineStage>,
}

/// Pipeline type creation data transfer object
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewPipelineType {
    pub entity_kind: EntityKind,
    #[validate(custom(function = "not_blank"))]
    pub name: String,
    pub description: Option<String>,
    /// Appended after the last type of the kind when omitted
    pub order: Option<i32>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

impl NewPipelineType {
    pub fn new(entity_kind: EntityKind, name: impl Into<String>) -> Self {
        Self {
            entity_kind,
            name: name.into(),
            description: None,
            order: None,
            is_active: true,
        }
    }
}

/// Pipeline type update data transfer object
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdatePipelineType {
    #[validate(custom(function = "not_blank"))]
    pub name: Option<String>,
    pub description: Option<String>,
    pub order: Option<i32>,
    pub is_active: Option<bool>,
}

/// Stage creation data transfer object
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewPipelineStage {
    pub pipeline_type_id: Uuid,
    #[validate(custom(function = "not_blank"))]
    pub name: String,
    pub description: Option<String>,
    /// Placed after the current last stage when omitted
    pub order: Option<i32>,
    #[serde(default)]
    pub is_final: bool,
    #[serde(default)]
    pub conversion_eligible: bool,
    pub color: Option<String>,
    pub status: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

impl NewPipelineStage {
    pub fn new(pipeline_type_id: Uuid, name: impl Into<String>) -> Self {
        Self {
            pipeline_type_id,
            name: name.into(),
            description: None,
            order: None,
            is_final: false,
            conversion_eligible: false,
            color: None,
            status: None,
            is_active: true,
        }
    }

    pub fn with_order(mut self, order: i32) -> Self {
        self.order = Some(order);
        self
    }

    pub fn final_stage(mut self) -> Self {
        self.is_final = true;
        self
    }

    pub fn conversion_eligible(mut self) -> Self {
        self.conversion_eligible = true;
        self
    }

    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }

    /// Copy of `stage` targeting another pipeline type, keeping its order.
    pub fn copy_of(stage: &PipelineStage, pipeline_type_id: Uuid) -> Self {
        Self {
            pipeline_type_id,
            name: stage.name.clone(),
            description: stage.description.clone(),
            order: Some(stage.order),
            is_final: stage.is_final,
            conversion_eligible: stage.conversion_eligible,
            color: stage.color.clone(),
            status: stage.status.clone(),
            is_active: stage.is_active,
        }
    }

}

/// Stage update data transfer object
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdatePipelineStage {
    #[validate(custom(function = "not_blank"))]
    pub name: Option<String>,
    pub description: Option<String>,
    pub is_final: Option<bool>,
    pub conversion_eligible: Option<bool>,
    pub color: Option<String>,
    pub status: Option<String>,
    pub is_active: Option<bool>,
}

fn default_true() -> bool {
    true
}

/// Only pipelines of kinds using conversion-eligible stages may flag one.
pub fn check_conversion_eligible(
    kind: EntityKind,
    conversion_eligible: bool,
) -> DomainResult<()> {
    if conversion_eligible && !kind.uses_conversion_eligible_stages() {
        return Err(DomainError::validation(format!(
            "Only invite stages can be conversion eligible, not {} stages",
            kind
        )));
    }
    Ok(())
}

// =============================================================================
// Stage topology
// =============================================================================

fn active_siblings<'a: 'b, 'b>(
    stages: &'a [PipelineStage],
    stage: &'b PipelineStage,
) -> impl Iterator<Item = &'a PipelineStage> + 'b {
    stages
        .iter()
        .filter(move |s| s.is_active && s.pipeline_type_id == stage.pipeline_type_id)
}

/// Active stage of the same type with the smallest order greater than `stage`'s.
pub fn next_stage<'a>(
    stages: &'a [PipelineStage],
    stage: &PipelineStage,
) -> Option<&'a PipelineStage> {
    active_siblings(stages, stage)
        .filter(|s| s.order > stage.order)
        .min_by_key(|s| s.order)
}

/// Active stage of the same type with the largest order smaller than `stage`'s.
pub fn previous_stage<'a>(
    stages: &'a [PipelineStage],
    stage: &PipelineStage,
) -> Option<&'a PipelineStage> {
    active_siblings(stages, stage)
        .filter(|s| s.order < stage.order)
        .max_by_key(|s| s.order)
}

/// Active stage with the minimal order.
pub fn first_stage(stages: &[PipelineStage]) -> Option<&PipelineStage> {
    stages.iter().filter(|s| s.is_active).min_by_key(|s| s.order)
}

/// Active stage with the maximal order.
pub fn last_stage(stages: &[PipelineStage]) -> Option<&PipelineStage> {
    stages.iter().filter(|s| s.is_active).max_by_key(|s| s.order)
}

pub fn is_first_stage(stages: &[PipelineStage], stage: &PipelineStage) -> bool {
    !active_siblings(stages, stage).any(|s| s.order < stage.order)
}

pub fn is_last_stage(stages: &[PipelineStage], stage: &PipelineStage) -> bool {
    !active_siblings(stages, stage).any(|s| s.order > stage.order)
}

/// Order for a stage appended after every existing one.
pub fn next_free_order(stages: &[PipelineStage], step: i32) -> DomainResult<i32> {
    match stages.iter().map(|s| s.order).max() {
        None => Ok(step),
        Some(max) => max.checked_add(step).ok_or_else(order_out_of_range),
    }
}

/// Free order a stage can be parked on while two others trade places.
///
/// Above the highest order when possible, below the lowest otherwise.
pub fn parking_order(stages: &[PipelineStage]) -> DomainResult<i32> {
    let orders = || stages.iter().map(|s| s.order);
    match (orders().min(), orders().max()) {
        (Some(min), Some(max)) => max
            .checked_add(1)
            .or_else(|| min.checked_sub(1))
            .ok_or_else(order_out_of_range),
        _ => Ok(0),
    }
}

fn order_out_of_range() -> DomainError {
    DomainError::validation("Stage order out of range")
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn stage(type_id: Uuid, name: &str, order: i32) -> PipelineStage {
        let now = Utc::now();
        PipelineStage {
            id: Uuid::new_v4(),
            pipeline_type_id: type_id,
            name: name.to_string(),
            slug: crate::slug::slugify(name),
            description: None,
            order,
            is_final: false,
            conversion_eligible: false,
            color: None,
            status: None,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    fn sample() -> (Uuid, Vec<PipelineStage>) {
        let type_id = Uuid::new_v4();
        let mut inactive = stage(type_id, "Parked", 25);
        inactive.is_active = false;
        let stages = vec![
            stage(type_id, "Sent", 20),
            stage(type_id, "Contact", 10),
            inactive,
            stage(type_id, "Confirmed", 30),
        ];
        (type_id, stages)
    }

    #[test]
    fn next_stage_picks_the_nearest_active_order() {
        let (_, stages) = sample();
        let contact = &stages[1];
        let sent = &stages[0];

        assert_eq!(next_stage(&stages, contact).map(|s| s.order), Some(20));
        // 25 is inactive and skipped
        assert_eq!(next_stage(&stages, sent).map(|s| s.order), Some(30));
        assert!(next_stage(&stages, &stages[3]).is_none());
    }

    #[test]
    fn next_stage_never_skips_an_active_stage() {
        let (_, stages) = sample();
        for current in stages.iter().filter(|s| s.is_active) {
            if let Some(next) = next_stage(&stages, current) {
                assert!(!stages
                    .iter()
                    .any(|s| s.is_active && s.order > current.order && s.order < next.order));
            }
        }
    }

    #[test]
    fn previous_stage_is_symmetric() {
        let (_, stages) = sample();
        let confirmed = &stages[3];
        assert_eq!(previous_stage(&stages, confirmed).map(|s| s.order), Some(20));
        assert!(previous_stage(&stages, &stages[1]).is_none());
    }

    #[test]
    fn first_and_last_ignore_inactive_stages() {
        let (type_id, mut stages) = sample();
        let mut trailing = stage(type_id, "Archived", 99);
        trailing.is_active = false;
        stages.push(trailing);

        assert_eq!(first_stage(&stages).map(|s| s.order), Some(10));
        assert_eq!(last_stage(&stages).map(|s| s.order), Some(30));
        assert!(is_first_stage(&stages, &stages[1]));
        assert!(is_last_stage(&stages, &stages[3]));
        assert!(!is_last_stage(&stages, &stages[0]));
    }

    #[test]
    fn stages_of_other_types_are_ignored() {
        let (_, mut stages) = sample();
        stages.push(stage(Uuid::new_v4(), "Elsewhere", 15));
        assert_eq!(next_stage(&stages, &stages[1]).map(|s| s.order), Some(20));
    }

    #[test]
    fn conversion_eligible_is_reserved_for_invites() {
        assert!(check_conversion_eligible(EntityKind::Invite, true).is_ok());
        assert!(check_conversion_eligible(EntityKind::Prospect, true).is_err());
        assert!(check_conversion_eligible(EntityKind::Prospect, false).is_ok());
    }

    #[test]
    fn next_free_order_leaves_a_gap() {
        let (_, stages) = sample();
        assert_eq!(next_free_order(&stages, 10), Ok(40));
        assert_eq!(next_free_order(&[], 10), Ok(10));
    }

    #[test]
    fn orders_near_the_upper_bound_do_not_overflow() {
        let type_id = Uuid::new_v4();
        let stages = vec![stage(type_id, "A", 10), stage(type_id, "B", i32::MAX)];

        assert!(matches!(
            next_free_order(&stages, 10),
            Err(DomainError::Validation(_))
        ));
        assert_eq!(parking_order(&stages), Ok(9));

        let full = vec![stage(type_id, "A", i32::MIN), stage(type_id, "B", i32::MAX)];
        assert!(parking_order(&full).is_err());
    }
}
