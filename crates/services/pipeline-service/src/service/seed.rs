//! Default pipelines for a fresh installation.

use tracing::{debug, info};

use common::AppResult;
use domain::{EntityKind, NewPipelineStage, NewPipelineType, PipelineTypeWithStages, STAGE_ORDER_STEP};

use super::{PipelineTypeService, StageService};

struct StageTemplate {
    name: &'static str,
    color: &'static str,
    is_final: bool,
    conversion_eligible: bool,
}

const fn step(name: &'static str, color: &'static str) -> StageTemplate {
    StageTemplate {
        name,
        color,
        is_final: false,
        conversion_eligible: false,
    }
}

const fn last(name: &'static str, color: &'static str, conversion_eligible: bool) -> StageTemplate {
    StageTemplate {
        name,
        color,
        is_final: true,
        conversion_eligible,
    }
}

const INVITE_STAGES: &[StageTemplate] = &[
    step("Contact", "#9CA3AF"),
    step("Invitation sent", "#60A5FA"),
    last("Confirmed", "#34D399", true),
];

const PROSPECT_STAGES: &[StageTemplate] = &[
    step("First meeting", "#9CA3AF"),
    step("Due diligence", "#60A5FA"),
    step("Proposal", "#FBBF24"),
    last("Qualified", "#34D399", false),
];

const INVESTOR_STAGES: &[StageTemplate] = &[
    step("Onboarding", "#9CA3AF"),
    step("Committed", "#60A5FA"),
    last("Funded", "#34D399", false),
];

const PROJECT_STAGES: &[StageTemplate] = &[
    step("Kick-off", "#9CA3AF"),
    step("Execution", "#60A5FA"),
    last("Delivered", "#34D399", false),
];

fn templates(kind: EntityKind) -> &'static [StageTemplate] {
    match kind {
        EntityKind::Invite => INVITE_STAGES,
        EntityKind::Prospect => PROSPECT_STAGES,
        EntityKind::Investor => INVESTOR_STAGES,
        EntityKind::Project => PROJECT_STAGES,
    }
}

/// Create and mark default a standard pipeline for every kind that has none.
///
/// Kinds that already own a pipeline type are left alone, so seeding twice is a no-op.
pub async fn seed_default_pipelines(
    types: &dyn PipelineTypeService,
    stages: &dyn StageService,
) -> AppResult<Vec<PipelineTypeWithStages>> {
    let mut seeded = Vec::new();

    for kind in EntityKind::ALL {
        if !types.list_types(kind).await?.is_empty() {
            debug!(%kind, "Pipeline types present, seeding skipped");
            continue;
        }

        let new = NewPipelineType {
            description: Some(format!("Standard {} pipeline", kind)),
            ..NewPipelineType::new(kind, format!("Standard {} pipeline", kind))
        };
        let pipeline_type = types.create_type(new).await?;

        let mut created = Vec::new();
        for (position, template) in (1..).zip(templates(kind)) {
            let mut draft = NewPipelineStage::new(pipeline_type.id, template.name)
                .with_order(position * STAGE_ORDER_STEP)
                .with_color(template.color);
            if template.is_final {
                draft = draft.final_stage();
            }
            if template.conversion_eligible {
                draft = draft.conversion_eligible();
            }
            created.push(stages.create_stage(draft).await?);
        }

        let pipeline_type = types.set_as_default(pipeline_type.id).await?;
        info!(%kind, slug = %pipeline_type.slug, stages = created.len(), "Default pipeline seeded");

        seeded.push(PipelineTypeWithStages {
            pipeline_type,
            stages: created,
        });
    }

    Ok(seeded)
}
