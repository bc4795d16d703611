//! Service Container - Centralized service access.

use std::sync::Arc;

use super::{
    ConversionEngine, ConversionService, LeadManager, LeadService, PipelineTypeManager,
    PipelineTypeService, ProgressionManager, ProgressionService, StageManager, StageService,
};
use crate::infra::Persistence;

/// Service container trait for dependency injection.
pub trait ServiceContainer: Send + Sync {
    fn pipeline_types(&self) -> Arc<dyn PipelineTypeService>;

    fn stages(&self) -> Arc<dyn StageService>;

    fn progressions(&self) -> Arc<dyn ProgressionService>;

    fn conversions(&self) -> Arc<dyn ConversionService>;

    fn leads(&self) -> Arc<dyn LeadService>;
}

/// Concrete implementation of ServiceContainer
pub struct Services {
    pipeline_type_service: Arc<dyn PipelineTypeService>,
    stage_service: Arc<dyn StageService>,
    progression_service: Arc<dyn ProgressionService>,
    conversion_service: Arc<dyn ConversionService>,
    lead_service: Arc<dyn LeadService>,
}

impl Services {
    /// Create service container from database connection
    pub fn from_connection(db: sea_orm::DatabaseConnection) -> Self {
        let uow = Arc::new(Persistence::new(db));

        Self {
            pipeline_type_service: Arc::new(PipelineTypeManager::new(uow.clone())),
            stage_service: Arc::new(StageManager::new(uow.clone())),
            progression_service: Arc::new(ProgressionManager::new(uow.clone())),
            conversion_service: Arc::new(ConversionEngine::new(uow.clone())),
            lead_service: Arc::new(LeadManager::new(uow)),
        }
    }
}

impl ServiceContainer for Services {
    fn pipeline_types(&self) -> Arc<dyn PipelineTypeService> {
        self.pipeline_type_service.clone()
    }

    fn stages(&self) -> Arc<dyn StageService> {
        self.stage_service.clone()
    }

    fn progressions(&self) -> Arc<dyn ProgressionService> {
        self.progression_service.clone()
    }

    fn conversions(&self) -> Arc<dyn ConversionService> {
        self.conversion_service.clone()
    }

    fn leads(&self) -> Arc<dyn LeadService> {
        self.lead_service.clone()
    }
}
