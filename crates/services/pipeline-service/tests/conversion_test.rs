//! Lead conversion along the Invite -> Prospect -> Investor -> Project chain.

mod support;

use tokio_test::{assert_err, assert_ok};

use common::AppError;
use domain::{EntityKind, LeadOverrides, LeadStatus, NewLead};
use pipeline_service_lib::service::ServiceContainer;

#[tokio::test]
async fn test_convert_qualified_invite_into_prospect() {
    let services = support::setup().await;
    support::invite_pipeline(&services).await;
    let prospects = support::prospect_pipeline(&services).await;
    let user = support::actor();

    let invite = assert_ok!(
        services
            .leads()
            .create_lead(
                EntityKind::Invite,
                NewLead::named("Ada Lovelace")
                    .with_email("ada@example.com")
                    .with_event_name("Founders dinner"),
            )
            .await
    );
    support::finish_pipeline(&services, &invite, user).await;

    let outcome = assert_ok!(
        services
            .conversions()
            .convert(
                EntityKind::Invite,
                invite.id,
                user,
                Some(LeadOverrides {
                    amount: Some(250_000),
                    ..LeadOverrides::default()
                }),
                Some("Met at the dinner".to_string()),
            )
            .await
    );

    let prospect = &outcome.target;
    assert_eq!(prospect.kind, EntityKind::Prospect);
    assert_eq!(prospect.name, "Ada Lovelace");
    assert_eq!(prospect.email.as_deref(), Some("ada@example.com"));
    assert_eq!(prospect.amount, Some(250_000));
    assert_eq!(prospect.source_id, Some(invite.id));
    assert_eq!(prospect.status, LeadStatus::New);

    assert_eq!(outcome.conversion.source_kind, EntityKind::Invite);
    assert_eq!(outcome.conversion.source_id, invite.id);
    assert_eq!(outcome.conversion.target_id, prospect.id);
    assert_eq!(outcome.conversion.converted_by, user);
    assert_eq!(outcome.conversion.conversion_notes.as_deref(), Some("Met at the dinner"));

    assert_eq!(outcome.seed.entity_kind, EntityKind::Prospect);
    assert_eq!(outcome.seed.entity_id, prospect.id);
    assert_eq!(outcome.seed.stage_id, prospects.stages[0].id);
    assert!(!outcome.seed.completed);

    let source = assert_ok!(services.leads().get_lead(EntityKind::Invite, invite.id).await);
    assert_eq!(source.status, LeadStatus::Converted);
    assert_eq!(source.converted_to_id, Some(prospect.id));
    assert!(source.converted_at.is_some());

    let history = assert_ok!(
        services
            .conversions()
            .conversion_history(EntityKind::Invite, invite.id)
            .await
    );
    assert_eq!(history.len(), 1);
    let history = assert_ok!(
        services
            .conversions()
            .conversion_history(EntityKind::Prospect, prospect.id)
            .await
    );
    assert_eq!(history.len(), 1);

    let status = assert_ok!(
        services
            .progressions()
            .pipeline_status(EntityKind::Prospect, prospect.id)
            .await
    );
    assert_eq!(status.current_stage.map(|s| s.id), Some(prospects.stages[0].id));
}

#[tokio::test]
async fn test_convert_twice_is_refused() {
    let services = support::setup().await;
    support::invite_pipeline(&services).await;
    support::prospect_pipeline(&services).await;
    let invite = support::lead(&services, EntityKind::Invite, "Grace Hopper").await;
    let user = support::actor();
    support::finish_pipeline(&services, &invite, user).await;

    let conversions = services.conversions();
    assert_ok!(conversions.convert(EntityKind::Invite, invite.id, user, None, None).await);

    assert!(!assert_ok!(conversions.can_convert(EntityKind::Invite, invite.id).await));
    let err = assert_err!(conversions.convert(EntityKind::Invite, invite.id, user, None, None).await);
    assert!(matches!(err, AppError::NotEligible(_)));

    let prospects = assert_ok!(services.leads().list_leads(EntityKind::Prospect).await);
    assert_eq!(prospects.len(), 1);
}

#[tokio::test]
async fn test_convert_before_final_stage_is_refused() {
    let services = support::setup().await;
    support::invite_pipeline(&services).await;
    support::prospect_pipeline(&services).await;
    let invite = support::lead(&services, EntityKind::Invite, "Alan Turing").await;
    let user = support::actor();

    for _ in 0..3 {
        assert_ok!(
            services
                .progressions()
                .advance_stage(EntityKind::Invite, invite.id, user, None)
                .await
        );
    }

    let err = assert_err!(
        services
            .conversions()
            .convert(EntityKind::Invite, invite.id, user, None, None)
            .await
    );
    assert!(matches!(err, AppError::NotEligible(_)));
}

#[tokio::test]
async fn test_invite_needs_conversion_eligible_final_stage() {
    let services = support::setup().await;
    support::pipeline(
        &services,
        EntityKind::Invite,
        "Newsletter invites",
        &[("Sent", 10, false, false), ("Opened", 20, true, false)],
    )
    .await;
    support::prospect_pipeline(&services).await;
    let invite = support::lead(&services, EntityKind::Invite, "Joan Clarke").await;
    let user = support::actor();
    support::finish_pipeline(&services, &invite, user).await;

    let conversions = services.conversions();
    assert!(!assert_ok!(conversions.can_convert(EntityKind::Invite, invite.id).await));
    let err = assert_err!(conversions.convert(EntityKind::Invite, invite.id, user, None, None).await);
    assert!(matches!(err, AppError::NotEligible(_)));
}

#[tokio::test]
async fn test_directly_created_lead_has_no_source() {
    let services = support::setup().await;
    support::invite_pipeline(&services).await;
    support::prospect_pipeline(&services).await;
    let invite = support::lead(&services, EntityKind::Invite, "Hedy Lamarr").await;
    let user = support::actor();
    support::finish_pipeline(&services, &invite, user).await;

    let walk_in = support::lead(&services, EntityKind::Prospect, "Hedy Lamarr").await;
    assert_eq!(walk_in.source_id, None);

    // The invite's back-reference is still free
    let outcome = assert_ok!(
        services
            .conversions()
            .convert(EntityKind::Invite, invite.id, user, None, None)
            .await
    );
    assert_eq!(outcome.target.source_id, Some(invite.id));
    assert_ne!(outcome.target.id, walk_in.id);
}

#[tokio::test]
async fn test_invalid_overrides_abort_conversion() {
    let services = support::setup().await;
    support::invite_pipeline(&services).await;
    support::prospect_pipeline(&services).await;
    let invite = support::lead(&services, EntityKind::Invite, "Mary Kenneth Keller").await;
    let user = support::actor();
    support::finish_pipeline(&services, &invite, user).await;

    let err = assert_err!(
        services
            .conversions()
            .convert(
                EntityKind::Invite,
                invite.id,
                user,
                Some(LeadOverrides {
                    name: Some("  ".to_string()),
                    ..LeadOverrides::default()
                }),
                None,
            )
            .await
    );
    assert!(matches!(err, AppError::Validation(_)));

    let source = assert_ok!(services.leads().get_lead(EntityKind::Invite, invite.id).await);
    assert_eq!(source.status, LeadStatus::Qualified);
    assert!(!source.is_converted());
    let prospects = assert_ok!(services.leads().list_leads(EntityKind::Prospect).await);
    assert!(prospects.is_empty());
}

#[tokio::test]
async fn test_empty_target_pipeline_rolls_back_conversion() {
    let services = support::setup().await;
    support::invite_pipeline(&services).await;
    support::pipeline(&services, EntityKind::Prospect, "Empty prospects", &[]).await;
    let invite = support::lead(&services, EntityKind::Invite, "Evelyn Boyd Granville").await;
    let user = support::actor();
    support::finish_pipeline(&services, &invite, user).await;

    let err = assert_err!(
        services
            .conversions()
            .convert(EntityKind::Invite, invite.id, user, None, None)
            .await
    );
    assert!(matches!(err, AppError::NoStages(_)));

    let source = assert_ok!(services.leads().get_lead(EntityKind::Invite, invite.id).await);
    assert_eq!(source.status, LeadStatus::Qualified);
    assert!(!source.is_converted());
    let prospects = assert_ok!(services.leads().list_leads(EntityKind::Prospect).await);
    assert!(prospects.is_empty());
    let history = assert_ok!(
        services
            .conversions()
            .conversion_history(EntityKind::Invite, invite.id)
            .await
    );
    assert!(history.is_empty());
}

#[tokio::test]
async fn test_missing_target_pipeline_rolls_back_conversion() {
    let services = support::setup().await;
    support::invite_pipeline(&services).await;
    let invite = support::lead(&services, EntityKind::Invite, "Katherine Johnson").await;
    let user = support::actor();
    support::finish_pipeline(&services, &invite, user).await;

    let err = assert_err!(
        services
            .conversions()
            .convert(EntityKind::Invite, invite.id, user, None, None)
            .await
    );
    assert!(matches!(err, AppError::NoActivePipelineType(_)));

    let source = assert_ok!(services.leads().get_lead(EntityKind::Invite, invite.id).await);
    assert!(!source.is_converted());
    let prospects = assert_ok!(services.leads().list_leads(EntityKind::Prospect).await);
    assert!(prospects.is_empty());
    let history = assert_ok!(
        services
            .conversions()
            .conversion_history(EntityKind::Invite, invite.id)
            .await
    );
    assert!(history.is_empty());

    // Configuring the pipeline afterwards makes the same conversion succeed
    support::prospect_pipeline(&services).await;
    assert_ok!(
        services
            .conversions()
            .convert(EntityKind::Invite, invite.id, user, None, None)
            .await
    );
}

#[tokio::test]
async fn test_full_chain_ends_at_project() {
    let services = support::setup().await;
    support::invite_pipeline(&services).await;
    support::prospect_pipeline(&services).await;
    support::pipeline(
        &services,
        EntityKind::Investor,
        "Investor onboarding",
        &[("Onboarding", 10, false, false), ("Funded", 20, true, false)],
    )
    .await;
    support::pipeline(
        &services,
        EntityKind::Project,
        "Project delivery",
        &[("Kick-off", 10, false, false), ("Delivered", 20, true, false)],
    )
    .await;
    let user = support::actor();
    let conversions = services.conversions();

    let mut lead = support::lead(&services, EntityKind::Invite, "Radia Perlman").await;
    for expected in [EntityKind::Prospect, EntityKind::Investor, EntityKind::Project] {
        support::finish_pipeline(&services, &lead, user).await;
        let outcome = assert_ok!(conversions.convert(lead.kind, lead.id, user, None, None).await);
        assert_eq!(outcome.target.kind, expected);
        assert_eq!(outcome.target.source_id, Some(lead.id));
        lead = outcome.target;
    }

    // Projects end the chain
    support::finish_pipeline(&services, &lead, user).await;
    assert!(!assert_ok!(conversions.can_convert(EntityKind::Project, lead.id).await));
    let err = assert_err!(conversions.convert(EntityKind::Project, lead.id, user, None, None).await);
    assert!(matches!(err, AppError::NotEligible(_)));
}

#[tokio::test]
async fn test_inactive_lead_cannot_convert() {
    let services = support::setup().await;
    support::invite_pipeline(&services).await;
    support::prospect_pipeline(&services).await;
    let invite = support::lead(&services, EntityKind::Invite, "Frances Allen").await;
    let user = support::actor();
    support::finish_pipeline(&services, &invite, user).await;

    let deactivated = assert_ok!(services.leads().deactivate_lead(EntityKind::Invite, invite.id).await);
    assert_eq!(deactivated.status, LeadStatus::Inactive);

    let err = assert_err!(
        services
            .conversions()
            .convert(EntityKind::Invite, invite.id, user, None, None)
            .await
    );
    assert!(matches!(err, AppError::NotEligible(_)));
}
