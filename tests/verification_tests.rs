//! End-to-end tests for the donation verification flow, run against
//! in-memory stores and a scripted gateway.

mod common;

use std::sync::Arc;

use bigdecimal::BigDecimal;
use uuid::Uuid;

use common::{
    failed_verification, issue_with_raised, pending_donation, success_verification,
    transport_error, InMemoryDonationStore, InMemoryIssueStore, ScriptedGateway,
};
use givehaven_backend::database::repository::IssueStore;
use givehaven_backend::services::verification::{
    VerificationError, VerificationOrchestrator, VerificationOutcome, VerificationRequest,
};

fn orchestrator(
    gateway: &Arc<ScriptedGateway>,
    donations: &Arc<InMemoryDonationStore>,
    issues: &Arc<InMemoryIssueStore>,
) -> VerificationOrchestrator {
    VerificationOrchestrator::new(gateway.clone(), donations.clone(), issues.clone())
}

fn request(reference: &str, donation_id: Uuid, issue_id: Option<Uuid>) -> VerificationRequest {
    VerificationRequest {
        reference: Some(reference.to_string()),
        donation_id: Some(donation_id.to_string()),
        issue_id: issue_id.map(|id| id.to_string()),
    }
}

#[tokio::test]
async fn end_to_end_successful_verification() {
    let donation_id = Uuid::new_v4();
    let issue_id = Uuid::new_v4();

    let gateway = Arc::new(ScriptedGateway::returning(Ok(success_verification(
        300_000, "NGN",
    ))));
    let donations = Arc::new(
        InMemoryDonationStore::new().with_donation(pending_donation(
            donation_id,
            "ref_abc",
            3000,
            Some(issue_id),
        )),
    );
    let issues = Arc::new(InMemoryIssueStore::new().with_issue(issue_with_raised(issue_id, 10_000)));

    let outcome = orchestrator(&gateway, &donations, &issues)
        .verify_donation(request("ref_abc", donation_id, Some(issue_id)))
        .await
        .expect("verification should succeed");

    match outcome {
        VerificationOutcome::Success {
            amount,
            already_settled,
            ..
        } => {
            assert_eq!(amount, BigDecimal::from(3000));
            assert!(!already_settled);
        }
        other => panic!("expected success, got {:?}", other),
    }

    assert_eq!(donations.status_of(donation_id).as_deref(), Some("completed"));
    assert_eq!(
        issues.raised_amount_of(issue_id),
        Some(BigDecimal::from(13_000))
    );
}

#[tokio::test]
async fn duplicate_verification_applies_aggregate_exactly_once() {
    let donation_id = Uuid::new_v4();
    let issue_id = Uuid::new_v4();

    let gateway = Arc::new(ScriptedGateway::returning(Ok(success_verification(
        300_000, "NGN",
    ))));
    let donations = Arc::new(
        InMemoryDonationStore::new().with_donation(pending_donation(
            donation_id,
            "ref_abc",
            3000,
            Some(issue_id),
        )),
    );
    let issues = Arc::new(InMemoryIssueStore::new().with_issue(issue_with_raised(issue_id, 0)));

    let orchestrator = orchestrator(&gateway, &donations, &issues);

    let first = orchestrator
        .verify_donation(request("ref_abc", donation_id, Some(issue_id)))
        .await
        .expect("first verification should succeed");
    assert!(matches!(
        first,
        VerificationOutcome::Success {
            already_settled: false,
            ..
        }
    ));

    let second = orchestrator
        .verify_donation(request("ref_abc", donation_id, Some(issue_id)))
        .await
        .expect("second verification should short-circuit");
    match second {
        VerificationOutcome::Success {
            amount,
            already_settled,
            ..
        } => {
            assert_eq!(amount, BigDecimal::from(3000));
            assert!(already_settled);
        }
        other => panic!("expected short-circuit success, got {:?}", other),
    }

    // The second call made zero writes and never consulted the gateway.
    assert_eq!(gateway.verify_call_count(), 1);
    assert_eq!(donations.update_call_count(), 1);
    assert_eq!(issues.delta_call_count(), 1);
    assert_eq!(issues.raised_amount_of(issue_id), Some(BigDecimal::from(3000)));
}

#[tokio::test]
async fn denied_payment_marks_donation_failed_without_touching_aggregate() {
    let donation_id = Uuid::new_v4();
    let issue_id = Uuid::new_v4();

    let gateway = Arc::new(ScriptedGateway::returning(Ok(failed_verification(
        "Insufficient funds",
    ))));
    let donations = Arc::new(
        InMemoryDonationStore::new().with_donation(pending_donation(
            donation_id,
            "ref_denied",
            500,
            Some(issue_id),
        )),
    );
    let issues = Arc::new(InMemoryIssueStore::new().with_issue(issue_with_raised(issue_id, 7500)));

    let outcome = orchestrator(&gateway, &donations, &issues)
        .verify_donation(request("ref_denied", donation_id, Some(issue_id)))
        .await
        .expect("denial is a normal outcome, not an error");

    match outcome {
        VerificationOutcome::Declined { message, .. } => {
            assert_eq!(message, "Insufficient funds");
        }
        other => panic!("expected declined, got {:?}", other),
    }

    assert_eq!(donations.status_of(donation_id).as_deref(), Some("failed"));
    assert_eq!(issues.delta_call_count(), 0);
    assert_eq!(issues.raised_amount_of(issue_id), Some(BigDecimal::from(7500)));
}

#[tokio::test]
async fn transport_failure_leaves_donation_pending_and_is_retryable() {
    let donation_id = Uuid::new_v4();

    let gateway = Arc::new(ScriptedGateway::returning(Err(transport_error())));
    let donations = Arc::new(
        InMemoryDonationStore::new()
            .with_donation(pending_donation(donation_id, "ref_timeout", 1200, None)),
    );
    let issues = Arc::new(InMemoryIssueStore::new());

    let err = orchestrator(&gateway, &donations, &issues)
        .verify_donation(request("ref_timeout", donation_id, None))
        .await
        .expect_err("transport failure must surface as an error");

    assert!(err.is_retryable(), "transport errors mean unknown, not denied");
    assert!(matches!(err, VerificationError::Gateway(_)));

    // No state change of any kind: the donation can be re-verified later.
    assert_eq!(donations.status_of(donation_id).as_deref(), Some("pending"));
    assert_eq!(donations.update_call_count(), 0);
    assert_eq!(issues.delta_call_count(), 0);
}

#[tokio::test]
async fn undirected_donation_never_touches_the_issue_store() {
    let donation_id = Uuid::new_v4();

    let gateway = Arc::new(ScriptedGateway::returning(Ok(success_verification(
        250_000, "NGN",
    ))));
    let donations = Arc::new(
        InMemoryDonationStore::new()
            .with_donation(pending_donation(donation_id, "ref_general", 2500, None)),
    );
    let issues = Arc::new(InMemoryIssueStore::new());

    let outcome = orchestrator(&gateway, &donations, &issues)
        .verify_donation(request("ref_general", donation_id, None))
        .await
        .expect("verification should succeed");

    assert!(matches!(outcome, VerificationOutcome::Success { .. }));
    assert_eq!(donations.status_of(donation_id).as_deref(), Some("completed"));
    assert_eq!(issues.delta_call_count(), 0);
}

#[tokio::test]
async fn gateway_amount_in_minor_units_is_converted_to_major() {
    let donation_id = Uuid::new_v4();

    // 500000 minor units at 100 minor per major -> 5000
    let gateway = Arc::new(ScriptedGateway::returning(Ok(success_verification(
        500_000, "NGN",
    ))));
    let donations = Arc::new(
        InMemoryDonationStore::new()
            .with_donation(pending_donation(donation_id, "ref_units", 5000, None)),
    );
    let issues = Arc::new(InMemoryIssueStore::new());

    let outcome = orchestrator(&gateway, &donations, &issues)
        .verify_donation(request("ref_units", donation_id, None))
        .await
        .expect("verification should succeed");

    match outcome {
        VerificationOutcome::Success { amount, .. } => {
            assert_eq!(amount, BigDecimal::from(5000));
        }
        other => panic!("expected success, got {:?}", other),
    }
}

#[tokio::test]
async fn issue_id_from_gateway_metadata_is_used_when_no_explicit_parameter() {
    let donation_id = Uuid::new_v4();
    let issue_id = Uuid::new_v4();

    let mut verification = success_verification(100_000, "NGN");
    verification.metadata = serde_json::json!({ "issue_id": issue_id.to_string() });

    let gateway = Arc::new(ScriptedGateway::returning(Ok(verification)));
    let donations = Arc::new(
        InMemoryDonationStore::new()
            .with_donation(pending_donation(donation_id, "ref_meta", 1000, None)),
    );
    let issues = Arc::new(InMemoryIssueStore::new().with_issue(issue_with_raised(issue_id, 0)));

    orchestrator(&gateway, &donations, &issues)
        .verify_donation(request("ref_meta", donation_id, None))
        .await
        .expect("verification should succeed");

    assert_eq!(issues.raised_amount_of(issue_id), Some(BigDecimal::from(1000)));
}

#[tokio::test]
async fn explicit_issue_parameter_beats_metadata_echo() {
    let donation_id = Uuid::new_v4();
    let explicit_issue = Uuid::new_v4();
    let metadata_issue = Uuid::new_v4();

    let mut verification = success_verification(100_000, "NGN");
    verification.metadata = serde_json::json!({ "issue_id": metadata_issue.to_string() });

    let gateway = Arc::new(ScriptedGateway::returning(Ok(verification)));
    let donations = Arc::new(
        InMemoryDonationStore::new()
            .with_donation(pending_donation(donation_id, "ref_pref", 1000, None)),
    );
    let issues = Arc::new(
        InMemoryIssueStore::new()
            .with_issue(issue_with_raised(explicit_issue, 0))
            .with_issue(issue_with_raised(metadata_issue, 0)),
    );

    orchestrator(&gateway, &donations, &issues)
        .verify_donation(request("ref_pref", donation_id, Some(explicit_issue)))
        .await
        .expect("verification should succeed");

    assert_eq!(
        issues.raised_amount_of(explicit_issue),
        Some(BigDecimal::from(1000))
    );
    assert_eq!(
        issues.raised_amount_of(metadata_issue),
        Some(BigDecimal::from(0))
    );
}

#[tokio::test]
async fn missing_parameters_are_rejected_before_any_side_effect() {
    let gateway = Arc::new(ScriptedGateway::returning(Ok(success_verification(
        100_000, "NGN",
    ))));
    let donations = Arc::new(InMemoryDonationStore::new());
    let issues = Arc::new(InMemoryIssueStore::new());
    let orchestrator = orchestrator(&gateway, &donations, &issues);

    let err = orchestrator
        .verify_donation(VerificationRequest {
            reference: None,
            donation_id: Some(Uuid::new_v4().to_string()),
            issue_id: None,
        })
        .await
        .expect_err("missing reference must be rejected");
    assert!(matches!(
        err,
        VerificationError::InvalidInput { field: "reference" }
    ));
    assert!(!err.is_retryable());

    let err = orchestrator
        .verify_donation(VerificationRequest {
            reference: Some("ref_x".to_string()),
            donation_id: None,
            issue_id: None,
        })
        .await
        .expect_err("missing donation id must be rejected");
    assert!(matches!(
        err,
        VerificationError::InvalidInput {
            field: "donation_id"
        }
    ));

    assert_eq!(gateway.verify_call_count(), 0);
}

#[tokio::test]
async fn unknown_donation_id_is_reported() {
    let gateway = Arc::new(ScriptedGateway::returning(Ok(success_verification(
        100_000, "NGN",
    ))));
    let donations = Arc::new(InMemoryDonationStore::new());
    let issues = Arc::new(InMemoryIssueStore::new());

    let err = orchestrator(&gateway, &donations, &issues)
        .verify_donation(request("ref_ghost", Uuid::new_v4(), None))
        .await
        .expect_err("unknown donation must be reported");

    assert!(matches!(err, VerificationError::DonationNotFound { .. }));
    assert_eq!(gateway.verify_call_count(), 0);
}

#[tokio::test]
async fn aggregate_write_failure_after_commit_is_surfaced_not_hidden() {
    let donation_id = Uuid::new_v4();
    let issue_id = Uuid::new_v4();

    let gateway = Arc::new(ScriptedGateway::returning(Ok(success_verification(
        200_000, "NGN",
    ))));
    let donations = Arc::new(
        InMemoryDonationStore::new().with_donation(pending_donation(
            donation_id,
            "ref_gap",
            2000,
            Some(issue_id),
        )),
    );
    let issues = Arc::new(
        InMemoryIssueStore::new()
            .with_issue(issue_with_raised(issue_id, 0))
            .failing_deltas(),
    );

    let err = orchestrator(&gateway, &donations, &issues)
        .verify_donation(request("ref_gap", donation_id, Some(issue_id)))
        .await
        .expect_err("aggregate failure must be reported");

    match err {
        VerificationError::AggregateNotApplied {
            donation_id: d,
            issue_id: i,
            amount,
            ..
        } => {
            assert_eq!(d, donation_id);
            assert_eq!(i, issue_id);
            assert_eq!(amount, BigDecimal::from(2000));
        }
        other => panic!("expected AggregateNotApplied, got {:?}", other),
    }

    // The status flip already committed: the donation is completed even
    // though the campaign total was not updated. A retry short-circuits and
    // will not re-apply the delta.
    assert_eq!(donations.status_of(donation_id).as_deref(), Some("completed"));
    assert_eq!(issues.raised_amount_of(issue_id), Some(BigDecimal::from(0)));
}

#[tokio::test]
async fn concurrent_deltas_to_the_same_issue_lose_no_update() {
    let issue_id = Uuid::new_v4();
    let issues = Arc::new(InMemoryIssueStore::new().with_issue(issue_with_raised(issue_id, 0)));

    let a = {
        let issues = issues.clone();
        tokio::spawn(async move {
            issues
                .apply_raised_amount_delta(issue_id, &BigDecimal::from(1000))
                .await
        })
    };
    let b = {
        let issues = issues.clone();
        tokio::spawn(async move {
            issues
                .apply_raised_amount_delta(issue_id, &BigDecimal::from(2500))
                .await
        })
    };

    a.await.unwrap().expect("first delta should apply");
    b.await.unwrap().expect("second delta should apply");

    assert_eq!(issues.raised_amount_of(issue_id), Some(BigDecimal::from(3500)));
}

#[tokio::test]
async fn two_donations_to_the_same_issue_accumulate() {
    let first_donation = Uuid::new_v4();
    let second_donation = Uuid::new_v4();
    let issue_id = Uuid::new_v4();

    let donations = Arc::new(
        InMemoryDonationStore::new()
            .with_donation(pending_donation(
                first_donation,
                "ref_one",
                1000,
                Some(issue_id),
            ))
            .with_donation(pending_donation(
                second_donation,
                "ref_two",
                2500,
                Some(issue_id),
            )),
    );
    let issues = Arc::new(InMemoryIssueStore::new().with_issue(issue_with_raised(issue_id, 0)));

    let gateway_one = Arc::new(ScriptedGateway::returning(Ok(success_verification(
        100_000, "NGN",
    ))));
    orchestrator(&gateway_one, &donations, &issues)
        .verify_donation(request("ref_one", first_donation, Some(issue_id)))
        .await
        .expect("first donation should settle");

    let gateway_two = Arc::new(ScriptedGateway::returning(Ok(success_verification(
        250_000, "NGN",
    ))));
    orchestrator(&gateway_two, &donations, &issues)
        .verify_donation(request("ref_two", second_donation, Some(issue_id)))
        .await
        .expect("second donation should settle");

    assert_eq!(issues.raised_amount_of(issue_id), Some(BigDecimal::from(3500)));
    assert_eq!(issues.delta_call_count(), 2);
}
