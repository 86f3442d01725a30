// SPDX-FileCopyrightText: 2026 Trestle Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end lifecycle tests over the test harness.

use chrono::{Duration, Utc};
use trestle_core::types::{format_timestamp, now_timestamp};
use trestle_core::{
    Action, Document, DocumentStatus, Envelope, EnvelopeStatus, EventType, Metadata,
    RequestStatus, SigningRequest, SourceEntity, SourceKind, TrestleError,
};
use trestle_engine::{
    DraftOptions, DraftUpdate, RecipientInput, ResendOptions, SendOptions, SendOutcome,
};
use trestle_storage::queries::{documents, envelopes, events, signing_requests};
use trestle_test_utils::TestHarness;
use trestle_token::TokenIssuer;

fn send_to(recipients: Vec<RecipientInput>) -> SendOptions {
    SendOptions {
        recipients: Some(recipients),
        subject: Some("Please sign Change Order #4".to_string()),
        ..SendOptions::default()
    }
}

async fn send(h: &TestHarness, document_id: &str, recipients: Vec<RecipientInput>) -> SendOutcome {
    h.controller
        .send(&h.actor(), document_id, send_to(recipients))
        .await
        .unwrap()
}

async fn requests(h: &TestHarness, envelope_id: &str) -> Vec<SigningRequest> {
    signing_requests::list_for_envelope(&h.db, envelope_id)
        .await
        .unwrap()
}

async fn request_for(h: &TestHarness, envelope_id: &str, email: &str) -> SigningRequest {
    requests(h, envelope_id)
        .await
        .into_iter()
        .find(|r| r.sent_to_email.as_deref() == Some(email))
        .unwrap()
}

async fn token(h: &TestHarness, email: &str) -> String {
    h.notifier.latest_token(email).await.unwrap()
}

async fn envelope(h: &TestHarness, id: &str) -> Envelope {
    envelopes::get_envelope(&h.db, id).await.unwrap().unwrap()
}

async fn event_count(h: &TestHarness, envelope_id: &str, event_type: EventType) -> i64 {
    h.controller
        .events()
        .count_for_envelope(envelope_id, event_type)
        .await
        .unwrap()
}

// --- send and sequencing ---

#[tokio::test]
async fn two_parallel_signers_then_one_then_executed() {
    let h = TestHarness::new().await.unwrap();
    let doc = h.seed_document("Change Order #4").await.unwrap();

    let sent = send(
        &h,
        &doc,
        vec![
            RecipientInput::signer("owner@example.com").with_sequence(1),
            RecipientInput::signer("architect@example.com").with_sequence(1),
            RecipientInput::signer("lender@example.com").with_sequence(2),
            RecipientInput::cc("pm@example.com"),
        ],
    )
    .await;
    let env = sent.envelope.id.clone();

    assert_eq!(sent.envelope.status, EnvelopeStatus::Sent);
    assert!(sent.envelope.sent_at.is_some());
    assert_eq!(sent.sent_now, 2);
    assert_eq!(sent.pending_signers, 1);
    assert!(sent.failed.is_empty());
    assert_eq!(h.notifier.delivered_count().await, 2);
    assert!(h.notifier.delivered_to("pm@example.com").await.is_empty());
    assert_eq!(h.document(&doc).await.unwrap().status, DocumentStatus::Sent);

    // cc recipients never get a signing request.
    let rows = requests(&h, &env).await;
    assert_eq!(rows.len(), 3);
    let lender = request_for(&h, &env, "lender@example.com").await;
    assert_eq!(lender.status, RequestStatus::Draft);
    assert!(lender.token_hash.is_none());

    let first = h
        .controller
        .complete_signing(&token(&h, "owner@example.com").await, None)
        .await
        .unwrap();
    assert!(!first.executed);
    assert!(first.next_batch.is_none());
    assert_eq!(first.envelope_status, Some(EnvelopeStatus::PartiallySigned));

    let second = h
        .controller
        .complete_signing(&token(&h, "architect@example.com").await, None)
        .await
        .unwrap();
    assert!(!second.executed);
    let next = second.next_batch.unwrap();
    assert_eq!(next.sent_now(), 1);
    assert_eq!(h.notifier.delivered_count().await, 3);
    assert_eq!(
        request_for(&h, &env, "lender@example.com").await.status,
        RequestStatus::Sent
    );

    let last = h
        .controller
        .complete_signing(&token(&h, "lender@example.com").await, Some("file-final"))
        .await
        .unwrap();
    assert!(last.executed);
    assert_eq!(last.envelope_status, Some(EnvelopeStatus::Executed));

    let executed = envelope(&h, &env).await;
    assert_eq!(executed.status, EnvelopeStatus::Executed);
    assert!(executed.executed_at.is_some());
    assert_eq!(event_count(&h, &env, EventType::Executed).await, 1);
    assert_eq!(event_count(&h, &env, EventType::Signed).await, 3);

    let document = h.document(&doc).await.unwrap();
    assert_eq!(document.status, DocumentStatus::Executed);
    assert_eq!(document.executed_file_id.as_deref(), Some("file-final"));
}

#[tokio::test]
async fn sent_event_carries_batch_summary() {
    let h = TestHarness::new().await.unwrap();
    let doc = h.seed_document("Proposal").await.unwrap();
    let sent = send(
        &h,
        &doc,
        vec![
            RecipientInput::signer("a@example.com"),
            RecipientInput::signer("b@example.com"),
        ],
    )
    .await;

    let events = h
        .controller
        .events()
        .list_by_type(&sent.envelope.id, EventType::Sent)
        .await
        .unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].payload["sent_now"], 1);
    assert_eq!(events[0].payload["pending_signers"], 1);
    assert!(events[0].payload["failed"].as_array().unwrap().is_empty());
    assert_eq!(events[0].actor_id.as_deref(), Some("user-pm"));
}

#[tokio::test]
async fn send_requires_a_signer() {
    let h = TestHarness::new().await.unwrap();
    let doc = h.seed_document("Lien waiver").await.unwrap();

    let err = h
        .controller
        .send(&h.actor(), &doc, send_to(vec![RecipientInput::cc("pm@example.com")]))
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "At least one signer is required");

    let err = h
        .controller
        .send(&h.actor(), &doc, SendOptions::default())
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "At least one signer is required");
    assert!(envelopes::find_live_for_document(&h.db, &doc).await.unwrap().is_none());
}

#[tokio::test]
async fn second_send_is_rejected() {
    let h = TestHarness::new().await.unwrap();
    let doc = h.seed_document("Contract").await.unwrap();
    send(&h, &doc, vec![RecipientInput::signer("a@example.com")]).await;

    let err = h
        .controller
        .send(&h.actor(), &doc, send_to(vec![RecipientInput::signer("b@example.com")]))
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Envelope has already been sent");
    assert_eq!(h.notifier.delivered_count().await, 1);
}

#[tokio::test]
async fn missing_signing_secret_fails_before_any_mutation() {
    let h = TestHarness::builder()
        .without_signing_secret()
        .build()
        .await
        .unwrap();
    let doc = h.seed_document("Change Order #5").await.unwrap();

    let err = h
        .controller
        .send(&h.actor(), &doc, send_to(vec![RecipientInput::signer("a@example.com")]))
        .await
        .unwrap_err();
    assert!(matches!(err, TrestleError::Config(_)));
    assert!(!err.is_retryable());
    assert!(envelopes::list_for_document(&h.db, &doc).await.unwrap().is_empty());
    assert_eq!(h.notifier.delivered_count().await, 0);
    assert_eq!(h.document(&doc).await.unwrap().status, DocumentStatus::Draft);
}

#[tokio::test]
async fn delivery_failure_is_reported_and_link_stays_valid() {
    let h = TestHarness::new().await.unwrap();
    let doc = h.seed_document("Change Order #6").await.unwrap();
    h.notifier.fail_for("b@example.com").await;

    let sent = send(
        &h,
        &doc,
        vec![
            RecipientInput::signer("a@example.com").with_sequence(1),
            RecipientInput::signer("b@example.com").with_sequence(1),
        ],
    )
    .await;
    assert_eq!(sent.envelope.status, EnvelopeStatus::Sent);
    assert_eq!(sent.sent_now, 1);
    assert_eq!(sent.failed.len(), 1);
    assert_eq!(sent.failed[0].email.as_deref(), Some("b@example.com"));

    let b = request_for(&h, &sent.envelope.id, "b@example.com").await;
    assert_eq!(b.status, RequestStatus::Sent);
    assert!(b.token_hash.is_some());

    h.notifier.recover("b@example.com").await;
    let reminded = h.controller.remind(&h.actor(), &b.id).await.unwrap();
    assert!(reminded.delivered);
    assert!(reminded.failure.is_none());
    assert_eq!(h.notifier.reminder_count().await, 1);
}

// --- drafts ---

#[tokio::test]
async fn ensure_draft_returns_the_live_envelope() {
    let h = TestHarness::new().await.unwrap();
    let doc = h.seed_document("Proposal 12").await.unwrap();

    let first = h
        .controller
        .ensure_draft(&h.actor(), &doc, DraftOptions::default())
        .await
        .unwrap();
    let second = h
        .controller
        .ensure_draft(&h.actor(), &doc, DraftOptions::default())
        .await
        .unwrap();
    assert_eq!(first.id, second.id);
    assert_eq!(first.status, EnvelopeStatus::Draft);
    assert!(first.expires_at.is_some());
    assert_eq!(event_count(&h, &first.id, EventType::Created).await, 1);
}

#[tokio::test]
async fn saved_draft_ledger_is_sent() {
    let h = TestHarness::new().await.unwrap();
    let doc = h.seed_document("Proposal 13").await.unwrap();
    let draft = h
        .controller
        .ensure_draft(&h.actor(), &doc, DraftOptions::default())
        .await
        .unwrap();

    // A draft may be saved without any signer.
    let saved = h
        .controller
        .save_draft(
            &h.actor(),
            &draft.id,
            DraftUpdate {
                recipients: vec![RecipientInput::cc("pm@example.com")],
                ..DraftUpdate::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(saved.recipients.len(), 1);
    let err = h
        .controller
        .send(&h.actor(), &doc, SendOptions::default())
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "At least one signer is required");

    h.controller
        .save_draft(
            &h.actor(),
            &draft.id,
            DraftUpdate {
                recipients: vec![
                    RecipientInput::signer("Owner@Example.com").with_name("Owner"),
                    RecipientInput::cc("pm@example.com"),
                ],
                subject: Some("Signature needed".to_string()),
                ..DraftUpdate::default()
            },
        )
        .await
        .unwrap();

    let sent = h
        .controller
        .send(&h.actor(), &doc, SendOptions::default())
        .await
        .unwrap();
    assert_eq!(sent.envelope.id, draft.id);
    assert_eq!(sent.envelope.subject.as_deref(), Some("Signature needed"));
    assert_eq!(h.notifier.delivered_to("owner@example.com").await.len(), 1);

    let err = h
        .controller
        .save_draft(&h.actor(), &draft.id, DraftUpdate::default())
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Only draft envelopes can be edited");
}

// --- signing flow ---

#[tokio::test]
async fn first_view_is_recorded_once() {
    let h = TestHarness::new().await.unwrap();
    let doc = h.seed_document("Change Order #7").await.unwrap();
    let sent = send(&h, &doc, vec![RecipientInput::signer("a@example.com")]).await;
    let token = token(&h, "a@example.com").await;

    let first = h.controller.record_view(&token).await.unwrap();
    assert!(first.first_view);
    assert_eq!(first.request.status, RequestStatus::Viewed);
    assert!(first.request.viewed_at.is_some());

    let again = h.controller.record_view(&token).await.unwrap();
    assert!(!again.first_view);
    assert_eq!(event_count(&h, &sent.envelope.id, EventType::Viewed).await, 1);

    // Viewed requests can still sign.
    let signed = h.controller.complete_signing(&token, None).await.unwrap();
    assert!(signed.executed);
}

#[tokio::test]
async fn invalid_token_is_forbidden() {
    let h = TestHarness::new().await.unwrap();
    let err = h
        .controller
        .complete_signing("not-a-real-token", None)
        .await
        .unwrap_err();
    assert!(matches!(err, TrestleError::Forbidden(_)));
}

#[tokio::test]
async fn signing_twice_is_rejected() {
    let h = TestHarness::new().await.unwrap();
    let doc = h.seed_document("Change Order #8").await.unwrap();
    send(
        &h,
        &doc,
        vec![
            RecipientInput::signer("a@example.com").with_sequence(1),
            RecipientInput::signer("b@example.com").with_sequence(1),
        ],
    )
    .await;
    let token = token(&h, "a@example.com").await;
    h.controller.complete_signing(&token, None).await.unwrap();

    let err = h.controller.complete_signing(&token, None).await.unwrap_err();
    assert!(matches!(err, TrestleError::StateViolation(_)));
}

#[tokio::test]
async fn concurrent_last_signers_execute_exactly_once() {
    let h = TestHarness::new().await.unwrap();
    let doc = h.seed_document("Change Order #9").await.unwrap();
    let sent = send(
        &h,
        &doc,
        vec![
            RecipientInput::signer("a@example.com").with_sequence(1),
            RecipientInput::signer("b@example.com").with_sequence(1),
        ],
    )
    .await;
    let (ta, tb) = (token(&h, "a@example.com").await, token(&h, "b@example.com").await);

    let (a, b) = tokio::join!(
        h.controller.complete_signing(&ta, Some("file-a")),
        h.controller.complete_signing(&tb, Some("file-b")),
    );
    let (a, b) = (a.unwrap(), b.unwrap());

    assert!(a.executed ^ b.executed, "exactly one caller wins execution");
    assert_eq!(envelope(&h, &sent.envelope.id).await.status, EnvelopeStatus::Executed);
    assert_eq!(event_count(&h, &sent.envelope.id, EventType::Executed).await, 1);
}

#[tokio::test]
async fn signed_voided_pending_leaves_third_step_active() {
    let h = TestHarness::new().await.unwrap();
    let doc = h.seed_document("Subcontract").await.unwrap();
    let env = Envelope {
        id: "env-manual".to_string(),
        document_id: doc.clone(),
        project_id: "proj-1".to_string(),
        source: None,
        status: EnvelopeStatus::PartiallySigned,
        subject: None,
        message: None,
        expires_at: None,
        sent_at: Some(now_timestamp()),
        executed_at: None,
        voided_at: None,
        metadata: Metadata::new(),
        created_at: now_timestamp(),
        updated_at: now_timestamp(),
    };
    envelopes::insert_envelope(&h.db, &env).await.unwrap();

    let row = |id: &str, sequence: i64, status: RequestStatus| SigningRequest {
        id: id.to_string(),
        envelope_id: Some(env.id.clone()),
        group_id: None,
        document_id: doc.clone(),
        recipient_id: None,
        sequence,
        required: true,
        status,
        sent_to_email: Some(format!("{id}@example.com")),
        signer_name: None,
        signer_role: Some(format!("signer_{sequence}")),
        token_hash: None,
        sent_at: None,
        viewed_at: None,
        signed_at: None,
        signed_file_id: None,
        created_at: now_timestamp(),
    };
    signing_requests::insert_requests(
        &h.db,
        vec![
            row("first", 1, RequestStatus::Signed),
            row("second", 2, RequestStatus::Voided),
            row("third", 3, RequestStatus::Sent),
        ],
    )
    .await
    .unwrap();

    let third = h.controller.signer_status("third").await.unwrap();
    assert!(third.can_act);
    assert_eq!(third.active_sequence, Some(3));
    let second = h.controller.signer_status("second").await.unwrap();
    assert!(!second.can_act);
}

#[tokio::test]
async fn legacy_group_executes_document_once() {
    let h = TestHarness::new().await.unwrap();
    let doc = h.seed_document("Legacy lien waiver").await.unwrap();
    let row = |id: &str, sequence: i64| SigningRequest {
        id: id.to_string(),
        envelope_id: None,
        group_id: Some("group-7".to_string()),
        document_id: doc.clone(),
        recipient_id: None,
        sequence,
        required: true,
        status: RequestStatus::Draft,
        sent_to_email: Some(format!("{id}@example.com")),
        signer_name: None,
        signer_role: None,
        token_hash: None,
        sent_at: None,
        viewed_at: None,
        signed_at: None,
        signed_file_id: None,
        created_at: now_timestamp(),
    };
    signing_requests::insert_requests(&h.db, vec![row("g1", 1), row("g2", 2)])
        .await
        .unwrap();

    let issuer = TokenIssuer::new(h.db.clone(), &h.config);
    let first = issuer.issue("g1", true).await.unwrap();

    // The second step cannot act yet.
    assert!(!h.controller.signer_status("g2").await.unwrap().can_act);

    let outcome = h.controller.complete_signing(&first.token, None).await.unwrap();
    assert!(!outcome.executed);
    assert!(outcome.envelope_status.is_none());
    assert_eq!(outcome.next_batch.unwrap().sent_now(), 1);

    let second = token(&h, "g2@example.com").await;
    let outcome = h
        .controller
        .complete_signing(&second, Some("file-legacy"))
        .await
        .unwrap();
    assert!(outcome.executed);

    let document = h.document(&doc).await.unwrap();
    assert_eq!(document.status, DocumentStatus::Executed);
    assert_eq!(document.executed_file_id.as_deref(), Some("file-legacy"));
    let executed = events::list_for_document(&h.db, &doc)
        .await
        .unwrap()
        .into_iter()
        .filter(|e| e.event_type == EventType::Executed)
        .count();
    assert_eq!(executed, 1);
}

// --- reminders ---

#[tokio::test]
async fn remind_only_the_active_batch() {
    let h = TestHarness::new().await.unwrap();
    let doc = h.seed_document("Change Order #10").await.unwrap();
    let sent = send(
        &h,
        &doc,
        vec![
            RecipientInput::signer("a@example.com"),
            RecipientInput::signer("b@example.com"),
        ],
    )
    .await;
    let a = request_for(&h, &sent.envelope.id, "a@example.com").await;
    let b = request_for(&h, &sent.envelope.id, "b@example.com").await;

    let err = h.controller.remind(&h.actor(), &b.id).await.unwrap_err();
    assert_eq!(err.to_string(), "Signer is not in the active batch");

    let old_token = token(&h, "a@example.com").await;
    let reminded = h.controller.remind(&h.actor(), &a.id).await.unwrap();
    assert!(reminded.delivered);
    assert_eq!(event_count(&h, &sent.envelope.id, EventType::Reminded).await, 1);

    // The reminder replaced the link.
    let new_token = token(&h, "a@example.com").await;
    assert_ne!(old_token, new_token);
    let err = h.controller.record_view(&old_token).await.unwrap_err();
    assert!(matches!(err, TrestleError::Forbidden(_)));
    h.controller.record_view(&new_token).await.unwrap();
}

#[tokio::test]
async fn remind_requires_in_flight_envelope() {
    let h = TestHarness::new().await.unwrap();
    let doc = h.seed_document("Change Order #11").await.unwrap();
    let sent = send(&h, &doc, vec![RecipientInput::signer("a@example.com")]).await;
    let a = request_for(&h, &sent.envelope.id, "a@example.com").await;
    h.controller
        .void(&h.actor(), &sent.envelope.id, None)
        .await
        .unwrap();

    let err = h.controller.remind(&h.actor(), &a.id).await.unwrap_err();
    assert!(matches!(err, TrestleError::StateViolation(_)));
}

// --- voiding ---

#[tokio::test]
async fn void_twice_is_idempotent() {
    let h = TestHarness::new().await.unwrap();
    let doc = h.seed_document("Change Order #12").await.unwrap();
    let sent = send(
        &h,
        &doc,
        vec![
            RecipientInput::signer("a@example.com"),
            RecipientInput::signer("b@example.com"),
        ],
    )
    .await;
    let env = sent.envelope.id.clone();
    let old_token = token(&h, "a@example.com").await;

    let first = h
        .controller
        .void(&h.actor(), &env, Some("Wrong amount"))
        .await
        .unwrap();
    assert!(!first.idempotent);
    assert_eq!(first.requests_voided, 2);
    assert!(first.document_voided);
    assert_eq!(first.envelope.status, EnvelopeStatus::Voided);
    assert!(first.envelope.voided_at.is_some());
    assert_eq!(first.envelope.metadata["void_reason"], "Wrong amount");
    assert_eq!(first.envelope.metadata["voided_by"], "user-pm");
    assert_eq!(first.envelope.metadata["void_via"], "manual");

    let second = h.controller.void(&h.actor(), &env, None).await.unwrap();
    assert!(second.idempotent);
    assert_eq!(second.requests_voided, 0);
    assert_eq!(event_count(&h, &env, EventType::Voided).await, 1);

    assert!(
        requests(&h, &env)
            .await
            .iter()
            .all(|r| r.status == RequestStatus::Voided)
    );
    assert_eq!(h.document(&doc).await.unwrap().status, DocumentStatus::Voided);

    // A voided request rejects its still-matching token.
    let err = h.controller.complete_signing(&old_token, None).await.unwrap_err();
    assert!(matches!(err, TrestleError::StateViolation(_)));
}

#[tokio::test]
async fn executed_envelope_cannot_be_voided_or_resent() {
    let h = TestHarness::new().await.unwrap();
    let doc = h.seed_document("Change Order #13").await.unwrap();
    let sent = send(&h, &doc, vec![RecipientInput::signer("a@example.com")]).await;
    h.controller
        .complete_signing(&token(&h, "a@example.com").await, None)
        .await
        .unwrap();

    let err = h
        .controller
        .void(&h.actor(), &sent.envelope.id, None)
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Executed envelopes cannot be voided");
    let err = h
        .controller
        .resend(&h.actor(), &sent.envelope.id, ResendOptions::default())
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Executed envelopes cannot be resent");
}

#[tokio::test]
async fn void_denied_by_gate_changes_nothing() {
    let h = TestHarness::new().await.unwrap();
    let doc = h.seed_document("Change Order #14").await.unwrap();
    let sent = send(&h, &doc, vec![RecipientInput::signer("a@example.com")]).await;
    h.authorizer.deny("user-pm", Action::Void).await;

    let err = h
        .controller
        .void(&h.actor(), &sent.envelope.id, None)
        .await
        .unwrap_err();
    assert!(matches!(err, TrestleError::Forbidden(_)));
    assert_eq!(envelope(&h, &sent.envelope.id).await.status, EnvelopeStatus::Sent);
    assert!(
        h.authorizer
            .checks()
            .await
            .iter()
            .any(|(_, action, document_id)| *action == Action::Void && *document_id == doc)
    );
}

// --- resend ---

#[tokio::test]
async fn resend_clones_recipients_and_supersedes_live_source() {
    let h = TestHarness::new().await.unwrap();
    let doc = h.seed_document("Change Order #15").await.unwrap();
    let sent = send(
        &h,
        &doc,
        vec![
            RecipientInput::signer("a@example.com"),
            RecipientInput::signer("b@example.com"),
            RecipientInput::cc("pm@example.com"),
        ],
    )
    .await;
    let source = sent.envelope.id.clone();
    let source_ledger = h.controller.ledger().list(&source).await.unwrap();

    let resent = h
        .controller
        .resend(&h.actor(), &source, ResendOptions::default())
        .await
        .unwrap();
    assert!(resent.source_voided);
    assert_eq!(resent.previous.status, EnvelopeStatus::Voided);
    assert_eq!(resent.previous.metadata["void_via"], "resend");
    assert_eq!(
        resent.previous.metadata["superseded_by"],
        resent.sent.envelope.id.as_str()
    );

    let new_env = &resent.sent.envelope;
    assert_ne!(new_env.id, source);
    assert_eq!(new_env.status, EnvelopeStatus::Sent);
    assert_eq!(new_env.metadata["resent_from"], source.as_str());
    assert_eq!(new_env.subject, sent.envelope.subject);

    let cloned = h.controller.ledger().list(&new_env.id).await.unwrap();
    assert_eq!(cloned.len(), source_ledger.len());
    for (old, new) in source_ledger.iter().zip(&cloned) {
        assert_ne!(old.id, new.id);
        assert_eq!(old.role, new.role);
        assert_eq!(old.signer_role, new.signer_role);
        assert_eq!(old.sequence, new.sequence);
    }
    // Source rows are untouched.
    assert_eq!(h.controller.ledger().list(&source).await.unwrap(), source_ledger);

    // The document stays in play through the new envelope.
    assert_eq!(h.document(&doc).await.unwrap().status, DocumentStatus::Sent);
}

#[tokio::test]
async fn resend_of_closed_envelope_leaves_it_alone() {
    let h = TestHarness::new().await.unwrap();
    let doc = h.seed_document("Change Order #16").await.unwrap();
    let sent = send(&h, &doc, vec![RecipientInput::signer("a@example.com")]).await;
    let source = sent.envelope.id.clone();
    h.controller.void(&h.actor(), &source, None).await.unwrap();

    let resent = h
        .controller
        .resend(&h.actor(), &source, ResendOptions::default())
        .await
        .unwrap();
    assert!(!resent.source_voided);
    assert_eq!(event_count(&h, &source, EventType::Voided).await, 1);
    assert_eq!(resent.sent.envelope.status, EnvelopeStatus::Sent);

    // Another resend of the old envelope would create a second live one.
    let err = h
        .controller
        .resend(&h.actor(), &source, ResendOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, TrestleError::StateViolation(_)));
}

#[tokio::test]
async fn resend_racing_the_last_signature_leaves_no_live_envelope_beside_executed() {
    let h = TestHarness::new().await.unwrap();
    for round in 0..8 {
        let doc = h.seed_document(&format!("Change Order #{}", 40 + round)).await.unwrap();
        let email = format!("owner{round}@example.com");
        let sent = send(&h, &doc, vec![RecipientInput::signer(&email)]).await;
        let source = sent.envelope.id.clone();
        let signer_token = token(&h, &email).await;

        let actor = h.actor();
        let (signed, resent) = tokio::join!(
            h.controller.complete_signing(&signer_token, Some("file-final")),
            h.controller
                .resend(&actor, &source, ResendOptions::default()),
        );

        let live = envelopes::find_live_for_document(&h.db, &doc).await.unwrap();
        if envelope(&h, &source).await.status == EnvelopeStatus::Executed {
            assert!(signed.unwrap().executed);
            assert!(resent.is_err());
            assert!(live.is_none(), "round {round}: live envelope beside executed one");
            assert_eq!(h.document(&doc).await.unwrap().status, DocumentStatus::Executed);
        } else {
            assert!(!signed.map(|outcome| outcome.executed).unwrap_or(false));
            let resent = resent.unwrap();
            assert!(resent.source_voided);
            assert_eq!(live.map(|e| e.id), Some(resent.sent.envelope.id));
        }
    }
}

// --- cross-entity guard ---

#[tokio::test]
async fn accepted_source_cannot_be_sent() {
    let h = TestHarness::new().await.unwrap();
    let doc = h.seed_document("Proposal 21").await.unwrap();
    let proposal = SourceEntity {
        kind: SourceKind::Proposal,
        id: "prop-21".to_string(),
    };
    h.source_guard.accept(&proposal).await;

    let err = h
        .controller
        .send(
            &h.actor(),
            &doc,
            SendOptions {
                source: Some(proposal),
                ..send_to(vec![RecipientInput::signer("a@example.com")])
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "proposal prop-21 has already been accepted");
    assert!(envelopes::list_for_document(&h.db, &doc).await.unwrap().is_empty());
}

#[tokio::test]
async fn executed_source_blocks_another_send() {
    let h = TestHarness::new().await.unwrap();
    let change_order = SourceEntity {
        kind: SourceKind::ChangeOrder,
        id: "co-3".to_string(),
    };
    let with_source = |email: &str| SendOptions {
        source: Some(change_order.clone()),
        ..send_to(vec![RecipientInput::signer(email)])
    };

    let doc = h.seed_document("Change Order #3").await.unwrap();
    h.controller
        .send(&h.actor(), &doc, with_source("a@example.com"))
        .await
        .unwrap();
    h.controller
        .complete_signing(&token(&h, "a@example.com").await, None)
        .await
        .unwrap();

    let other = h.seed_document("Change Order #3 (copy)").await.unwrap();
    let err = h
        .controller
        .send(&h.actor(), &other, with_source("b@example.com"))
        .await
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "An executed envelope already exists for change_order co-3"
    );
}

// --- artifacts ---

#[tokio::test]
async fn executed_file_download_is_bounded() {
    let h = TestHarness::builder()
        .with_download_uses(2)
        .build()
        .await
        .unwrap();
    let doc = h.seed_document("Change Order #17").await.unwrap();
    let sent = send(&h, &doc, vec![RecipientInput::signer("a@example.com")]).await;
    let env = sent.envelope.id.clone();

    let err = h.artifacts.resolve_executed_file(&env).await.unwrap_err();
    assert_eq!(err.to_string(), "envelope is not executed yet");

    h.controller
        .complete_signing(&token(&h, "a@example.com").await, Some("file-17"))
        .await
        .unwrap();
    let file = h.artifacts.resolve_executed_file(&env).await.unwrap();
    assert_eq!(file.file_id, "file-17");

    let now = Utc::now();
    let link = h.artifacts.issue_download(&h.actor(), &env, now).await.unwrap();
    assert!(link.url.starts_with("https://app.example.com/executed/"));
    assert_eq!(link.max_uses, 2);

    let grant = h.artifacts.redeem_download(&link.token, now).await.unwrap();
    assert_eq!(grant.file_id, "file-17");
    assert_eq!(grant.remaining_uses(), 1);
    h.artifacts.redeem_download(&link.token, now).await.unwrap();
    let err = h
        .artifacts
        .redeem_download(&link.token, now)
        .await
        .unwrap_err();
    assert!(matches!(err, TrestleError::Forbidden(_)));

    // Signing links and download links do not share a namespace.
    let err = h
        .artifacts
        .redeem_download(&token(&h, "a@example.com").await, now)
        .await
        .unwrap_err();
    assert!(matches!(err, TrestleError::Forbidden(_)));
}

#[tokio::test]
async fn executed_file_comes_from_document_when_signer_uploads_none() {
    let h = TestHarness::new().await.unwrap();
    let doc = h.seed_document("Change Order #18").await.unwrap();
    documents::set_executed_file(&h.db, &doc, "file-from-document")
        .await
        .unwrap();
    let sent = send(&h, &doc, vec![RecipientInput::signer("a@example.com")]).await;
    h.controller
        .complete_signing(&token(&h, "a@example.com").await, None)
        .await
        .unwrap();

    let file = h
        .artifacts
        .resolve_executed_file(&sent.envelope.id)
        .await
        .unwrap();
    assert_eq!(file.file_id, "file-from-document");
}

#[tokio::test]
async fn download_without_secret_is_a_config_error() {
    let h = TestHarness::builder()
        .without_artifacts_secret()
        .build()
        .await
        .unwrap();
    let doc = h.seed_document("Change Order #19").await.unwrap();
    let sent = send(&h, &doc, vec![RecipientInput::signer("a@example.com")]).await;
    h.controller
        .complete_signing(&token(&h, "a@example.com").await, Some("file-19"))
        .await
        .unwrap();

    let err = h
        .artifacts
        .issue_download(&h.actor(), &sent.envelope.id, Utc::now())
        .await
        .unwrap_err();
    assert!(matches!(err, TrestleError::Config(_)));
}

// --- hub ---

#[tokio::test]
async fn hub_flags_client_wait_and_expiry() {
    let h = TestHarness::builder()
        .with_expiring_soon_days(2)
        .build()
        .await
        .unwrap();
    let now = Utc::now();

    let internal_doc = h.seed_document("Internal approval").await.unwrap();
    h.controller
        .send(
            &h.actor(),
            &internal_doc,
            SendOptions {
                expires_at: Some(format_timestamp(now + Duration::days(1))),
                ..send_to(vec![
                    RecipientInput::signer("pm@builder.example").internal_user("user-7"),
                    RecipientInput::signer("owner@example.com"),
                ])
            },
        )
        .await
        .unwrap();

    let client_doc = h.seed_document("Client contract").await.unwrap();
    send(&h, &client_doc, vec![RecipientInput::signer("client@example.com")]).await;

    let rows = h.hub.project(Some("proj-1"), now).await.unwrap();
    assert_eq!(rows.len(), 2);

    let internal = rows.iter().find(|r| r.document_id == internal_doc).unwrap();
    assert!(!internal.waiting_on_client);
    assert!(internal.expiring_soon);
    assert_eq!(internal.signers_total, 2);
    assert_eq!(internal.signers_signed, 0);
    assert_eq!(internal.waiting_on, vec!["pm@builder.example".to_string()]);
    assert!(internal.last_event_at.is_some());

    let client = rows.iter().find(|r| r.document_id == client_doc).unwrap();
    assert!(client.waiting_on_client);
    assert!(!client.expiring_soon);

    let elsewhere = h.seed_document_in("proj-2", "Other job").await.unwrap();
    send(&h, &elsewhere, vec![RecipientInput::signer("sub@example.com")]).await;
    assert_eq!(h.hub.project(Some("proj-1"), now).await.unwrap().len(), 2);
    assert_eq!(h.hub.project(None, now).await.unwrap().len(), 3);
}

// --- expiry ---

#[tokio::test]
async fn sweep_expires_overdue_envelopes_once() {
    let h = TestHarness::new().await.unwrap();
    let now = Utc::now();

    let overdue_doc = h.seed_document("Overdue").await.unwrap();
    let overdue = h
        .controller
        .send(
            &h.actor(),
            &overdue_doc,
            SendOptions {
                expires_at: Some(format_timestamp(now - Duration::days(1))),
                ..send_to(vec![RecipientInput::signer("late@example.com")])
            },
        )
        .await
        .unwrap();
    let current_doc = h.seed_document("Current").await.unwrap();
    let current = send(&h, &current_doc, vec![RecipientInput::signer("ok@example.com")]).await;

    let swept = h.controller.sweep_expired(now).await.unwrap();
    assert_eq!(swept, vec![overdue.envelope.id.clone()]);
    assert_eq!(
        envelope(&h, &overdue.envelope.id).await.status,
        EnvelopeStatus::Expired
    );
    assert_eq!(
        request_for(&h, &overdue.envelope.id, "late@example.com")
            .await
            .status,
        RequestStatus::Expired
    );
    assert_eq!(envelope(&h, &current.envelope.id).await.status, EnvelopeStatus::Sent);
    assert_eq!(event_count(&h, &overdue.envelope.id, EventType::Expired).await, 1);

    assert!(h.controller.sweep_expired(now).await.unwrap().is_empty());

    let err = h
        .controller
        .complete_signing(&token(&h, "late@example.com").await, None)
        .await
        .unwrap_err();
    assert!(matches!(err, TrestleError::StateViolation(_)));

    // Expired envelopes can be voided idempotently.
    let voided = h
        .controller
        .void(&h.actor(), &overdue.envelope.id, None)
        .await
        .unwrap();
    assert!(voided.idempotent);

    let document: Document = h.document(&overdue_doc).await.unwrap();
    assert_eq!(document.status, DocumentStatus::Voided);
    h.shutdown().await.unwrap();
}
