//! Pipeline Service Library
//!
//! Lead-conversion pipelines: ordered stages per entity kind, stage
//! advancement, and conversion of a lead into the next kind of the chain.
//! Used by the `pipeline-service` CLI or embedded by an HTTP layer.

pub mod config;
pub mod infra;
pub mod repository;
pub mod service;

use tracing::info;

use crate::config::PipelineServiceConfig;
use crate::infra::Database;
use crate::service::Services;

/// Connect, apply pending migrations and build the service container.
pub async fn connect_services(
    config: &PipelineServiceConfig,
) -> Result<Services, Box<dyn std::error::Error>> {
    let db = Database::connect(&config.database).await?;
    db.ping().await?;
    Ok(Services::from_connection(db.get_connection()))
}

/// Run migrations (for CLI commands).
pub async fn run_migrations(action: MigrateAction) -> Result<(), Box<dyn std::error::Error>> {
    let config = PipelineServiceConfig::from_env();
    let db = Database::connect_without_migrations(&config.database).await?;

    match action {
        MigrateAction::Up => {
            db.run_migrations().await?;
            info!("Migrations applied successfully");
        }
        MigrateAction::Down => {
            db.rollback_migration().await?;
            info!("Rolled back last migration");
        }
        MigrateAction::Status => {
            let status = db.migration_status().await?;
            for (name, applied) in status {
                let marker = if applied { "[x]" } else { "[ ]" };
                println!("{} {}", marker, name);
            }
        }
        MigrateAction::Fresh => {
            db.fresh_migrations().await?;
            info!("Database reset and migrations applied");
        }
    }

    Ok(())
}

/// Migration action type.
#[derive(Debug, Clone, Copy)]
pub enum MigrateAction {
    Up,
    Down,
    Status,
    Fresh,
}
