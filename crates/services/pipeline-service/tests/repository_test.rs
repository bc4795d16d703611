//! Constraint violations surfacing from the repositories.

mod support;

use tokio_test::assert_err;

use common::AppError;
use domain::{EntityKind, NewPipelineType};
use pipeline_service_lib::infra::UnitOfWork;
use pipeline_service_lib::service::ServiceContainer;

#[tokio::test]
async fn test_second_default_type_is_a_pipeline_type_conflict() {
    let (services, uow) = support::setup_with_persistence().await;
    support::invite_pipeline(&services).await;
    let other = services
        .pipeline_types()
        .create_type(NewPipelineType::new(EntityKind::Invite, "Webinar invites"))
        .await
        .expect("pipeline type should be created");

    let err = assert_err!(
        uow.transaction(move |ctx| {
            Box::pin(async move {
                let mut pipeline_type = other;
                pipeline_type.is_default = true;
                ctx.pipelines().save_type(&pipeline_type).await
            })
        })
        .await
    );
    assert!(
        matches!(err, AppError::Conflict(ref what) if what == "Pipeline type"),
        "unexpected error: {:?}",
        err
    );
}

#[tokio::test]
async fn test_duplicate_stage_order_is_a_stage_conflict() {
    let (services, uow) = support::setup_with_persistence().await;
    let pipeline = support::invite_pipeline(&services).await;
    let first_order = pipeline.stages[0].order;
    let second = pipeline.stages[1].clone();

    let err = assert_err!(
        uow.transaction(move |ctx| {
            Box::pin(async move {
                let mut stage = second;
                stage.order = first_order;
                ctx.pipelines().save_stage(&stage).await
            })
        })
        .await
    );
    assert!(
        matches!(err, AppError::Conflict(ref what) if what == "Stage"),
        "unexpected error: {:?}",
        err
    );

    // The failed write rolled back
    let stages = services
        .stages()
        .list_stages(pipeline.pipeline_type.id)
        .await
        .expect("stages should load");
    assert_eq!(stages[1].order, 20);
}
