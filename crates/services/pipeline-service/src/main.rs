//! Pipeline Service - operator CLI for lead-conversion pipelines.

use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use domain::EntityKind;
use pipeline_service_lib::config::PipelineServiceConfig;
use pipeline_service_lib::service::{seed_default_pipelines, ServiceContainer};
use pipeline_service_lib::MigrateAction;

#[derive(Parser)]
#[command(name = "pipeline-service")]
#[command(about = "Lead-conversion pipeline engine")]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Database migration commands
    Migrate {
        #[command(subcommand)]
        action: MigrateCommands,
    },
    /// Create a default pipeline for every kind that has none
    Seed,
    /// Show where an entity stands in its pipeline
    Status {
        #[arg(long)]
        kind: EntityKind,
        #[arg(long)]
        id: Uuid,
    },
    /// Complete the current stage and open the next one
    Advance {
        #[arg(long)]
        kind: EntityKind,
        #[arg(long)]
        id: Uuid,
        /// Acting user
        #[arg(long, env = "PIPELINE_SERVICE_USER_ID")]
        user: Uuid,
        #[arg(long)]
        notes: Option<String>,
    },
    /// Convert an entity into the next kind of the chain
    Convert {
        #[arg(long)]
        kind: EntityKind,
        #[arg(long)]
        id: Uuid,
        /// Acting user
        #[arg(long, env = "PIPELINE_SERVICE_USER_ID")]
        user: Uuid,
        #[arg(long)]
        notes: Option<String>,
    },
    /// Per-stage counts and dwell time of a pipeline type
    Stats {
        #[arg(long)]
        pipeline_type: Uuid,
    },
}

#[derive(Subcommand, Clone, Copy)]
enum MigrateCommands {
    /// Run pending migrations
    Up,
    /// Rollback last migration
    Down,
    /// Show migration status
    Status,
    /// Reset database and run all migrations
    Fresh,
}

fn print_json<T: Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = PipelineServiceConfig::from_env();

    let default_level = if cli.verbose {
        "debug".to_string()
    } else {
        config.service.log_level.clone()
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_level.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let services = match cli.command {
        Commands::Migrate { action } => {
            let migrate_action = match action {
                MigrateCommands::Up => MigrateAction::Up,
                MigrateCommands::Down => MigrateAction::Down,
                MigrateCommands::Status => MigrateAction::Status,
                MigrateCommands::Fresh => MigrateAction::Fresh,
            };
            return pipeline_service_lib::run_migrations(migrate_action).await;
        }
        _ => pipeline_service_lib::connect_services(&config).await?,
    };

    match cli.command {
        Commands::Migrate { .. } => {}
        Commands::Seed => {
            let types = services.pipeline_types();
            let stages = services.stages();
            let seeded = seed_default_pipelines(types.as_ref(), stages.as_ref()).await?;
            print_json(&seeded)?;
        }
        Commands::Status { kind, id } => {
            let status = services.progressions().pipeline_status(kind, id).await?;
            print_json(&status)?;
        }
        Commands::Advance {
            kind,
            id,
            user,
            notes,
        } => {
            let outcome = services
                .progressions()
                .advance_stage(kind, id, user, notes)
                .await?;
            print_json(&outcome)?;
        }
        Commands::Convert {
            kind,
            id,
            user,
            notes,
        } => {
            let outcome = services
                .conversions()
                .convert(kind, id, user, None, notes)
                .await?;
            print_json(&outcome)?;
        }
        Commands::Stats { pipeline_type } => {
            let statistics = services
                .progressions()
                .stage_statistics(pipeline_type)
                .await?;
            print_json(&statistics)?;
        }
    }

    Ok(())
}
