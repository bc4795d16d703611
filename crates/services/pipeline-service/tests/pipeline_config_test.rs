//! Pipeline type and stage administration, and default seeding.

mod support;

use tokio_test::{assert_err, assert_ok};

use common::AppError;
use domain::{
    EntityKind, NewPipelineStage, NewPipelineType, UpdatePipelineStage, UpdatePipelineType,
};
use pipeline_service_lib::service::{seed_default_pipelines, ServiceContainer};

#[tokio::test]
async fn test_single_default_per_kind() {
    let services = support::setup().await;
    let types = services.pipeline_types();

    let first = support::invite_pipeline(&services).await;
    let second = assert_ok!(
        types
            .create_type(NewPipelineType::new(EntityKind::Invite, "Conference invites"))
            .await
    );
    let other_kind = support::prospect_pipeline(&services).await;

    let promoted = assert_ok!(types.set_as_default(second.id).await);
    assert!(promoted.is_default);

    let invites = assert_ok!(types.list_types(EntityKind::Invite).await);
    let defaults: Vec<_> = invites.iter().filter(|t| t.is_default).collect();
    assert_eq!(defaults.len(), 1);
    assert_eq!(defaults[0].id, second.id);

    let default = assert_ok!(types.get_default(EntityKind::Invite).await);
    assert_eq!(default.id, second.id);
    let demoted = assert_ok!(types.get_type(first.pipeline_type.id).await);
    assert!(!demoted.pipeline_type.is_default);

    // Other kinds keep their default
    let prospect_default = assert_ok!(types.get_default(EntityKind::Prospect).await);
    assert_eq!(prospect_default.id, other_kind.pipeline_type.id);
}

#[tokio::test]
async fn test_default_falls_back_to_lowest_order() {
    let services = support::setup().await;
    let types = services.pipeline_types();

    let err = assert_err!(types.get_default(EntityKind::Investor).await);
    assert!(matches!(err, AppError::NoActivePipelineType(_)));

    let first = assert_ok!(
        types
            .create_type(NewPipelineType::new(EntityKind::Investor, "Angels"))
            .await
    );
    let second = assert_ok!(
        types
            .create_type(NewPipelineType::new(EntityKind::Investor, "Funds"))
            .await
    );
    assert!(second.order > first.order);

    let default = assert_ok!(types.get_default(EntityKind::Investor).await);
    assert_eq!(default.id, first.id);

    // Deactivating the first hands the fallback to the second
    assert_ok!(
        types
            .update_type(
                first.id,
                UpdatePipelineType {
                    is_active: Some(false),
                    ..UpdatePipelineType::default()
                },
            )
            .await
    );
    let default = assert_ok!(types.get_default(EntityKind::Investor).await);
    assert_eq!(default.id, second.id);

    let err = assert_err!(types.set_as_default(first.id).await);
    assert!(matches!(err, AppError::Validation(_)));
}

#[tokio::test]
async fn test_type_slugs_are_unique_and_stable() {
    let services = support::setup().await;
    let types = services.pipeline_types();

    let first = assert_ok!(
        types
            .create_type(NewPipelineType::new(EntityKind::Prospect, "Qualification"))
            .await
    );
    let second = assert_ok!(
        types
            .create_type(NewPipelineType::new(EntityKind::Investor, "Qualification"))
            .await
    );
    assert_eq!(first.slug, "qualification");
    assert_eq!(second.slug, "qualification-1");

    let renamed = assert_ok!(
        types
            .update_type(
                first.id,
                UpdatePipelineType {
                    name: Some("Deep qualification".to_string()),
                    ..UpdatePipelineType::default()
                },
            )
            .await
    );
    assert_eq!(renamed.name, "Deep qualification");
    assert_eq!(renamed.slug, "qualification");

    let err = assert_err!(
        types
            .update_type(
                first.id,
                UpdatePipelineType {
                    name: Some(" ".to_string()),
                    ..UpdatePipelineType::default()
                },
            )
            .await
    );
    assert!(matches!(err, AppError::Validation(_)));

    let err = assert_err!(
        types
            .create_type(NewPipelineType::new(EntityKind::Prospect, "  "))
            .await
    );
    assert!(matches!(err, AppError::Validation(_)));
}

#[tokio::test]
async fn test_duplicate_copies_stages() {
    let services = support::setup().await;
    let source = support::invite_pipeline(&services).await;

    let copy = assert_ok!(
        services
            .pipeline_types()
            .duplicate(source.pipeline_type.id, None, true)
            .await
    );

    assert_ne!(copy.pipeline_type.id, source.pipeline_type.id);
    assert_eq!(copy.pipeline_type.name, "Event invites (copy)");
    assert_eq!(copy.pipeline_type.entity_kind, EntityKind::Invite);
    assert!(!copy.pipeline_type.is_default);
    assert_eq!(copy.stages.len(), source.stages.len());

    for (copied, original) in copy.stages.iter().zip(&source.stages) {
        assert_ne!(copied.id, original.id);
        assert_ne!(copied.slug, original.slug);
        assert_eq!(copied.pipeline_type_id, copy.pipeline_type.id);
        assert_eq!(copied.name, original.name);
        assert_eq!(copied.order, original.order);
        assert_eq!(copied.is_final, original.is_final);
        assert_eq!(copied.conversion_eligible, original.conversion_eligible);
        assert_eq!(copied.color, original.color);
    }

    // The source is untouched
    let reloaded = assert_ok!(
        services
            .pipeline_types()
            .get_type(source.pipeline_type.id)
            .await
    );
    assert!(reloaded.pipeline_type.is_default);
    let reloaded_ids: Vec<_> = reloaded.stages.iter().map(|s| s.id).collect();
    let source_ids: Vec<_> = source.stages.iter().map(|s| s.id).collect();
    assert_eq!(reloaded_ids, source_ids);
}

#[tokio::test]
async fn test_duplicate_with_name_can_be_inactive() {
    let services = support::setup().await;
    let source = support::invite_pipeline(&services).await;

    let copy = assert_ok!(
        services
            .pipeline_types()
            .duplicate(source.pipeline_type.id, Some("Draft invites".to_string()), false)
            .await
    );
    assert_eq!(copy.pipeline_type.name, "Draft invites");
    assert_eq!(copy.pipeline_type.slug, "draft-invites");
    assert!(!copy.pipeline_type.is_active);

    let err = assert_err!(
        services
            .pipeline_types()
            .duplicate(uuid::Uuid::new_v4(), None, true)
            .await
    );
    assert!(matches!(err, AppError::NotFound));
}

#[tokio::test]
async fn test_stage_navigation() {
    let services = support::setup().await;
    let pipeline = support::invite_pipeline(&services).await;
    let stages = services.stages();
    let [first, second, third] = [&pipeline.stages[0], &pipeline.stages[1], &pipeline.stages[2]];

    assert!(assert_ok!(stages.is_first_stage(first.id).await));
    assert!(!assert_ok!(stages.is_last_stage(first.id).await));
    assert!(assert_ok!(stages.is_last_stage(third.id).await));

    let next = assert_ok!(stages.next_stage(first.id).await);
    assert_eq!(next.map(|s| s.id), Some(second.id));
    let previous = assert_ok!(stages.previous_stage(first.id).await);
    assert!(previous.is_none());
    let next = assert_ok!(stages.next_stage(third.id).await);
    assert!(next.is_none());

    // Inactive stages are skipped
    assert_ok!(
        stages
            .update_stage(
                second.id,
                UpdatePipelineStage {
                    is_active: Some(false),
                    ..UpdatePipelineStage::default()
                },
            )
            .await
    );
    let next = assert_ok!(stages.next_stage(first.id).await);
    assert_eq!(next.map(|s| s.id), Some(third.id));
    let previous = assert_ok!(stages.previous_stage(third.id).await);
    assert_eq!(previous.map(|s| s.id), Some(first.id));
}

#[tokio::test]
async fn test_move_stage_swaps_orders() {
    let services = support::setup().await;
    let pipeline = support::invite_pipeline(&services).await;
    let stages = services.stages();
    let type_id = pipeline.pipeline_type.id;
    let [first, second, third] = [&pipeline.stages[0], &pipeline.stages[1], &pipeline.stages[2]];

    assert!(assert_ok!(stages.move_up(second.id).await));
    let listed = assert_ok!(stages.list_stages(type_id).await);
    let ids: Vec<_> = listed.iter().map(|s| s.id).collect();
    assert_eq!(ids, vec![second.id, first.id, third.id]);
    let orders: Vec<_> = listed.iter().map(|s| s.order).collect();
    assert_eq!(orders, vec![10, 20, 30]);

    // Already at either end
    assert!(!assert_ok!(stages.move_up(second.id).await));
    assert!(!assert_ok!(stages.move_down(third.id).await));

    assert!(assert_ok!(stages.move_down(first.id).await));
    let listed = assert_ok!(stages.list_stages(type_id).await);
    let ids: Vec<_> = listed.iter().map(|s| s.id).collect();
    assert_eq!(ids, vec![second.id, third.id, first.id]);
}

#[tokio::test]
async fn test_stage_orders_at_the_upper_bound() {
    let services = support::setup().await;
    let pipeline = support::pipeline(
        &services,
        EntityKind::Prospect,
        "Long pipeline",
        &[("Opening", 10, false, false), ("Closing", i32::MAX, true, false)],
    )
    .await;
    let stages = services.stages();
    let type_id = pipeline.pipeline_type.id;
    let [opening, closing] = [&pipeline.stages[0], &pipeline.stages[1]];

    assert!(assert_ok!(stages.move_down(opening.id).await));
    let listed = assert_ok!(stages.list_stages(type_id).await);
    let ids: Vec<_> = listed.iter().map(|s| s.id).collect();
    assert_eq!(ids, vec![closing.id, opening.id]);
    let orders: Vec<_> = listed.iter().map(|s| s.order).collect();
    assert_eq!(orders, vec![10, i32::MAX]);

    // No order left after i32::MAX
    let err = assert_err!(
        stages
            .create_stage(NewPipelineStage::new(type_id, "Follow-up"))
            .await
    );
    assert!(matches!(err, AppError::Validation(_)));

    // An explicit order still fits
    let inserted = assert_ok!(
        stages
            .create_stage(NewPipelineStage::new(type_id, "Follow-up").with_order(20))
            .await
    );
    assert_eq!(inserted.order, 20);
}

#[tokio::test]
async fn test_create_stage_rules() {
    let services = support::setup().await;
    let invites = support::invite_pipeline(&services).await;
    let prospects = support::prospect_pipeline(&services).await;
    let stages = services.stages();

    // Appended after the last stage
    let appended = assert_ok!(
        stages
            .create_stage(NewPipelineStage::new(invites.pipeline_type.id, "Attended"))
            .await
    );
    assert_eq!(appended.order, 40);

    let err = assert_err!(
        stages
            .create_stage(
                NewPipelineStage::new(invites.pipeline_type.id, "Reminder").with_order(20)
            )
            .await
    );
    assert!(matches!(err, AppError::Conflict(_)));

    let err = assert_err!(
        stages
            .create_stage(
                NewPipelineStage::new(prospects.pipeline_type.id, "Signed").conversion_eligible()
            )
            .await
    );
    assert!(matches!(err, AppError::Validation(_)));

    let err = assert_err!(
        stages
            .update_stage(
                prospects.stages[0].id,
                UpdatePipelineStage {
                    conversion_eligible: Some(true),
                    ..UpdatePipelineStage::default()
                },
            )
            .await
    );
    assert!(matches!(err, AppError::Validation(_)));

    let err = assert_err!(
        stages
            .update_stage(
                prospects.stages[0].id,
                UpdatePipelineStage {
                    name: Some(String::new()),
                    ..UpdatePipelineStage::default()
                },
            )
            .await
    );
    assert!(matches!(err, AppError::Validation(_)));

    let err = assert_err!(
        stages
            .create_stage(NewPipelineStage::new(uuid::Uuid::new_v4(), "Orphan"))
            .await
    );
    assert!(matches!(err, AppError::NotFound));

    let err = assert_err!(stages.list_stages(uuid::Uuid::new_v4()).await);
    assert!(matches!(err, AppError::NotFound));
}

#[tokio::test]
async fn test_delete_refused_while_in_use() {
    let services = support::setup().await;
    let pipeline = support::invite_pipeline(&services).await;
    let invite = support::lead(&services, EntityKind::Invite, "Ada Lovelace").await;
    assert_ok!(
        services
            .progressions()
            .advance_stage(EntityKind::Invite, invite.id, support::actor(), None)
            .await
    );

    let err = assert_err!(services.stages().delete_stage(pipeline.stages[0].id).await);
    assert!(matches!(err, AppError::Validation(_)));
    let err = assert_err!(
        services
            .pipeline_types()
            .delete_type(pipeline.pipeline_type.id)
            .await
    );
    assert!(matches!(err, AppError::Validation(_)));

    // Unused stages and types can go
    assert_ok!(services.stages().delete_stage(pipeline.stages[2].id).await);
    let err = assert_err!(services.stages().get_stage(pipeline.stages[2].id).await);
    assert!(matches!(err, AppError::NotFound));

    let unused = support::prospect_pipeline(&services).await;
    assert_ok!(
        services
            .pipeline_types()
            .delete_type(unused.pipeline_type.id)
            .await
    );
    let err = assert_err!(services.stages().get_stage(unused.stages[0].id).await);
    assert!(matches!(err, AppError::NotFound));
}

#[tokio::test]
async fn test_seed_creates_default_pipeline_per_kind() {
    let services = support::setup().await;
    let types = services.pipeline_types();
    let stages = services.stages();

    let seeded = assert_ok!(seed_default_pipelines(types.as_ref(), stages.as_ref()).await);
    assert_eq!(seeded.len(), EntityKind::ALL.len());

    for kind in EntityKind::ALL {
        let default = assert_ok!(types.get_default(kind).await);
        assert!(default.is_default);

        let listed = assert_ok!(stages.list_stages(default.id).await);
        assert!(listed.len() >= 3);
        let last = listed.last().expect("seeded stages");
        assert!(last.is_final);
        assert_eq!(last.conversion_eligible, kind == EntityKind::Invite);
        assert!(listed.iter().all(|s| s.order % 10 == 0));
    }

    // Seeding again leaves existing pipelines alone
    let reseeded = assert_ok!(seed_default_pipelines(types.as_ref(), stages.as_ref()).await);
    assert!(reseeded.is_empty());
    let invites = assert_ok!(types.list_types(EntityKind::Invite).await);
    assert_eq!(invites.len(), 1);
}
