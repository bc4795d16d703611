//! Domain-level constants.
//!
//! These constants define business rules and stored representations.

// =============================================================================
// Entity kinds
// =============================================================================

pub const KIND_INVITE: &str = "invite";
pub const KIND_PROSPECT: &str = "prospect";
pub const KIND_INVESTOR: &str = "investor";
pub const KIND_PROJECT: &str = "project";

// =============================================================================
// Lead status values
// =============================================================================

/// Unplaced, or sitting on the first stage of its pipeline
pub const STATUS_NEW: &str = "new";

pub const STATUS_IN_PROGRESS: &str = "in_progress";

/// Last stage completed and final
pub const STATUS_QUALIFIED: &str = "qualified";

/// Promoted to the next kind (terminal)
pub const STATUS_CONVERTED: &str = "converted";

/// Dropped out of the funnel (terminal)
pub const STATUS_INACTIVE: &str = "inactive";

// =============================================================================
// Pipelines
// =============================================================================

/// Gap left between consecutive stage orders so stages can be inserted later
pub const STAGE_ORDER_STEP: i32 = 10;

/// Timestamp prefix format for progression notes
pub const NOTE_TIMESTAMP_FORMAT: &str = "%d/%m/%Y %H:%M";

/// Separator between consecutive progression notes
pub const NOTE_SEPARATOR: &str = "\n\n";

/// Suffix appended to a pipeline type name when duplicating without a new name
pub const DUPLICATE_NAME_SUFFIX: &str = " (copy)";

// =============================================================================
// Validation
// =============================================================================

/// Minimum name length requirement
pub const MIN_NAME_LENGTH: usize = 1;

/// Maximum length of a generated slug base
pub const MAX_SLUG_LENGTH: usize = 120;
