//! Domain layer - Core business entities and value objects.
//!
//! This crate contains pure domain logic with no infrastructure dependencies:
//! the entity kinds of the conversion chain, pipeline types and stages,
//! progressions, and the rules deciding stage order and conversion
//! eligibility.

pub mod constants;
pub mod conversion;
pub mod error;
pub mod kind;
pub mod lead;
pub mod pipeline;
pub mod progression;
pub mod slug;
pub mod validation;

pub use constants::*;
pub use conversion::{ConversionOutcome, PipelineConversion};
pub use error::{DomainError, DomainResult};
pub use kind::{EntityKind, LeadStatus, StagePosition};
pub use lead::{Lead, LeadOverrides, NewLead};
pub use pipeline::{
    NewPipelineStage, NewPipelineType, PipelineStage, PipelineType, PipelineTypeWithStages,
    UpdatePipelineStage, UpdatePipelineType,
};
pub use progression::{
    AdvanceOutcome, PipelineStatus, Progression, StageStatistics, StagedProgression,
};
pub use slug::{slugify, unique_slug};
pub use validation::ensure_valid;
