//! Shared fixtures for the pipeline service integration tests.
//!
//! Every test gets its own in-memory SQLite database with the migrations
//! applied. A single pooled connection keeps the database alive for the
//! whole test and serializes concurrent transactions.

#![allow(dead_code)]

use common::DatabaseConfig;
use uuid::Uuid;

use domain::{
    EntityKind, Lead, NewLead, NewPipelineStage, NewPipelineType, PipelineStage,
    PipelineTypeWithStages,
};
use pipeline_service_lib::infra::{Database, Persistence};
use pipeline_service_lib::service::{ServiceContainer, Services};

pub async fn setup() -> Services {
    setup_with_persistence().await.0
}

/// Services plus a unit of work over the same database, for repository-level checks.
pub async fn setup_with_persistence() -> (Services, Persistence) {
    let config = DatabaseConfig {
        url: "sqlite::memory:".to_string(),
        max_connections: 1,
        min_connections: 1,
    };

    let db = Database::connect(&config)
        .await
        .expect("in-memory database should migrate");
    (
        Services::from_connection(db.get_connection()),
        Persistence::new(db.get_connection()),
    )
}

pub fn actor() -> Uuid {
    Uuid::new_v4()
}

/// Default pipeline of `kind` with one stage per `(name, order, is_final, eligible)`.
pub async fn pipeline(
    services: &Services,
    kind: EntityKind,
    name: &str,
    stages: &[(&str, i32, bool, bool)],
) -> PipelineTypeWithStages {
    let pipeline_type = services
        .pipeline_types()
        .create_type(NewPipelineType::new(kind, name))
        .await
        .expect("pipeline type should be created");

    let mut created: Vec<PipelineStage> = Vec::new();
    for &(stage_name, order, is_final, eligible) in stages {
        let mut draft = NewPipelineStage::new(pipeline_type.id, stage_name)
            .with_order(order)
            .with_color("#60A5FA");
        if is_final {
            draft = draft.final_stage();
        }
        if eligible {
            draft = draft.conversion_eligible();
        }
        created.push(
            services
                .stages()
                .create_stage(draft)
                .await
                .expect("stage should be created"),
        );
    }

    let pipeline_type = services
        .pipeline_types()
        .set_as_default(pipeline_type.id)
        .await
        .expect("pipeline type should become default");

    PipelineTypeWithStages {
        pipeline_type,
        stages: created,
    }
}

/// Invite pipeline 10 -> 20 -> 30, the last stage final and conversion eligible.
pub async fn invite_pipeline(services: &Services) -> PipelineTypeWithStages {
    pipeline(
        services,
        EntityKind::Invite,
        "Event invites",
        &[
            ("Contacted", 10, false, false),
            ("Invitation sent", 20, false, false),
            ("Confirmed", 30, true, true),
        ],
    )
    .await
}

pub async fn prospect_pipeline(services: &Services) -> PipelineTypeWithStages {
    pipeline(
        services,
        EntityKind::Prospect,
        "Prospect qualification",
        &[
            ("First meeting", 10, false, false),
            ("Proposal", 20, false, false),
            ("Qualified", 30, true, false),
        ],
    )
    .await
}

pub async fn lead(services: &Services, kind: EntityKind, name: &str) -> Lead {
    services
        .leads()
        .create_lead(kind, NewLead::named(name))
        .await
        .expect("lead should be created")
}

/// Advance `lead` until its pipeline reports it finished.
pub async fn finish_pipeline(services: &Services, lead: &Lead, user: Uuid) {
    for _ in 0..16 {
        let outcome = services
            .progressions()
            .advance_stage(lead.kind, lead.id, user, None)
            .await
            .expect("advance should succeed");
        if outcome.is_finished() {
            return;
        }
    }
    panic!("pipeline of {} {} never finished", lead.kind, lead.id);
}
