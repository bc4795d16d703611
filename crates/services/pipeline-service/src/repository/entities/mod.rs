//! SeaORM entity definitions.

pub mod enums;
pub mod investor;
pub mod invite;
pub mod pipeline_conversion;
pub mod pipeline_progression;
pub mod pipeline_stage;
pub mod pipeline_type;
pub mod project;
pub mod prospect;
