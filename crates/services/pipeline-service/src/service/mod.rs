//! Service layer - pipeline use cases over the unit of work.

mod container;
mod conversion_service;
mod lead_service;
mod pipeline_type_service;
mod progression_service;
mod seed;
mod stage_service;

pub use container::{ServiceContainer, Services};
pub use conversion_service::{ConversionEngine, ConversionService};
pub use lead_service::{LeadManager, LeadService};
pub use pipeline_type_service::{PipelineTypeManager, PipelineTypeService};
pub use progression_service::{ProgressionManager, ProgressionService};
pub use seed::seed_default_pipelines;
pub use stage_service::{StageManager, StageService};
