//! Conversion audit records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::kind::EntityKind;
use crate::lead::Lead;
use crate::progression::Progression;

/// Immutable log entry written once per conversion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConversion {
    pub id: Uuid,
    pub source_kind: EntityKind,
    pub source_id: Uuid,
    pub target_kind: EntityKind,
    pub target_id: Uuid,
    pub converted_by: Uuid,
    pub conversion_notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Everything a successful conversion created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionOutcome {
    pub target: Lead,
    pub conversion: PipelineConversion,
    /// Open progression on the first stage of the target's default pipeline
    pub seed: Progression,
}
