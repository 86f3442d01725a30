// SPDX-FileCopyrightText: 2026 Trestle Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Envelope lifecycle controller.
//!
//! The only component that moves envelopes and signing requests between
//! statuses. Every transition is a conditional update in storage; the
//! caller that wins it performs the transition's one-time side effects.
//! Active batches are recomputed from freshly read rows right before they
//! are acted on.
//!
//! ```text
//! draft ──send──▶ sent ──sign──▶ partially_signed ──sign──▶ executed
//!   │               │ ╲                   │
//!   └─void──────────┴──┴──void / expire───┴──▶ voided / expired
//! ```

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde_json::json;
use tracing::{info, warn};
use trestle_config::TrestleConfig;
use trestle_core::types::{format_timestamp, now_timestamp};
use trestle_core::{
    Action, Actor, Authorizer, Document, DocumentStatus, Envelope, EnvelopeStatus, EventType,
    Metadata, NoticeKind, Notifier, Recipient, RequestStatus, SigningRequest, SourceEntity,
    SourceEntityGuard, TrestleError, active_batch, all_required_signed, group_key,
    is_request_active, pending_required,
};
use trestle_storage::Database;
use trestle_storage::queries::{documents, envelopes, signing_requests};
use trestle_token::TokenIssuer;

use crate::events::{EventRecorder, payload};
use crate::gate::Gate;
use crate::ledger::{self, RecipientLedger};
use crate::notify::{Fanout, NoticeContext};
use crate::outcome::{
    DraftOptions, DraftUpdate, RemindOutcome, ResendOptions, ResendOutcome, SavedDraft,
    SendOptions, SendOutcome, SignerStatus, SigningOutcome, ViewOutcome, VoidOutcome,
};

/// Capabilities the host application provides.
#[derive(Clone)]
pub struct Collaborators {
    pub notifier: Arc<dyn Notifier>,
    pub authorizer: Arc<dyn Authorizer>,
    pub source_guard: Arc<dyn SourceEntityGuard>,
}

/// Drives envelopes through their lifecycle.
#[derive(Clone)]
pub struct LifecycleController {
    db: Database,
    gate: Gate,
    ledger: RecipientLedger,
    events: EventRecorder,
    issuer: Arc<TokenIssuer>,
    fanout: Fanout,
    source_guard: Arc<dyn SourceEntityGuard>,
    default_expiry: Duration,
}

impl std::fmt::Debug for LifecycleController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleController")
            .field("default_expiry", &self.default_expiry)
            .finish_non_exhaustive()
    }
}

impl LifecycleController {
    pub fn new(db: Database, config: &TrestleConfig, collaborators: Collaborators) -> Self {
        let issuer = Arc::new(TokenIssuer::new(db.clone(), config));
        Self {
            gate: Gate::new(collaborators.authorizer),
            ledger: RecipientLedger::new(db.clone()),
            events: EventRecorder::new(db.clone()),
            fanout: Fanout::new(issuer.clone(), collaborators.notifier),
            issuer,
            source_guard: collaborators.source_guard,
            default_expiry: Duration::days(i64::from(config.signing.default_expiry_days)),
            db,
        }
    }

    pub fn events(&self) -> &EventRecorder {
        &self.events
    }

    pub fn ledger(&self) -> &RecipientLedger {
        &self.ledger
    }

    pub fn gate(&self) -> &Gate {
        &self.gate
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    // --- drafts ---

    /// Return the document's live envelope, creating a draft if it has none.
    pub async fn ensure_draft(
        &self,
        actor: &Actor,
        document_id: &str,
        options: DraftOptions,
    ) -> Result<Envelope, TrestleError> {
        self.gate.check(actor, Action::EnsureDraft, document_id).await?;
        let document = self.load_document(document_id).await?;
        self.ensure_draft_for(actor, &document, options).await
    }

    async fn ensure_draft_for(
        &self,
        actor: &Actor,
        document: &Document,
        options: DraftOptions,
    ) -> Result<Envelope, TrestleError> {
        if let Some(live) = envelopes::find_live_for_document(&self.db, &document.id).await? {
            return Ok(live);
        }

        let draft = self.new_draft(document, options)?;
        if envelopes::insert_if_no_live(&self.db, &draft).await? {
            self.record_created(actor, &draft).await?;
            info!(envelope_id = %draft.id, document_id = %document.id, "draft envelope created");
            return Ok(draft);
        }

        // Another caller created one between our read and insert.
        envelopes::find_live_for_document(&self.db, &document.id)
            .await?
            .ok_or_else(|| TrestleError::state("Envelope changed concurrently, retry"))
    }

    fn new_draft(
        &self,
        document: &Document,
        options: DraftOptions,
    ) -> Result<Envelope, TrestleError> {
        let now = Utc::now();
        let expires_at = match options.expires_at {
            Some(expires_at) => expires_at,
            None => now
                .checked_add_signed(self.default_expiry)
                .map(format_timestamp)
                .ok_or_else(|| {
                    TrestleError::Config("signing.default_expiry_days is out of range".to_string())
                })?,
        };
        Ok(Envelope {
            id: uuid::Uuid::new_v4().to_string(),
            document_id: document.id.clone(),
            project_id: document.project_id.clone(),
            source: options.source,
            status: EnvelopeStatus::Draft,
            subject: options.subject,
            message: options.message,
            expires_at: Some(expires_at),
            sent_at: None,
            executed_at: None,
            voided_at: None,
            metadata: options.metadata,
            created_at: format_timestamp(now),
            updated_at: format_timestamp(now),
        })
    }

    async fn record_created(&self, actor: &Actor, envelope: &Envelope) -> Result<(), TrestleError> {
        let mut body = payload([
            (
                "source_kind",
                json!(envelope.source.as_ref().map(|s| s.kind.to_string())),
            ),
            ("source_id", json!(envelope.source.as_ref().map(|s| s.id.clone()))),
        ]);
        if let Some(resent_from) = envelope.metadata.get("resent_from") {
            body.insert("resent_from".to_string(), resent_from.clone());
        }
        self.events
            .record(
                EventType::Created,
                Some(&envelope.id),
                &envelope.document_id,
                Some(&actor.user_id),
                body,
            )
            .await?;
        Ok(())
    }

    /// Replace a draft's recipients and, optionally, its subject, message, and expiry.
    ///
    /// No signer is required yet; that is checked at send time.
    pub async fn save_draft(
        &self,
        actor: &Actor,
        envelope_id: &str,
        update: DraftUpdate,
    ) -> Result<SavedDraft, TrestleError> {
        let envelope = self.load_envelope(envelope_id).await?;
        self.gate
            .check(actor, Action::SaveDraft, &envelope.document_id)
            .await?;
        if envelope.status != EnvelopeStatus::Draft {
            return Err(TrestleError::state("Only draft envelopes can be edited"));
        }

        let recipients = self.ledger.replace(envelope_id, update.recipients).await?;
        if update.subject.is_some() || update.message.is_some() || update.expires_at.is_some() {
            let updated = envelopes::update_draft_content(
                &self.db,
                envelope_id,
                update.subject,
                update.message,
                update.expires_at,
            )
            .await?;
            if !updated {
                return Err(TrestleError::state("Only draft envelopes can be edited"));
            }
        }

        Ok(SavedDraft {
            envelope: self.load_envelope(envelope_id).await?,
            recipients,
        })
    }

    // --- sending ---

    /// Send the document's draft envelope, creating it first if needed.
    pub async fn send(
        &self,
        actor: &Actor,
        document_id: &str,
        options: SendOptions,
    ) -> Result<SendOutcome, TrestleError> {
        self.gate.check(actor, Action::Send, document_id).await?;
        self.issuer.ensure_configured()?;
        let document = self.load_document(document_id).await?;

        let live = envelopes::find_live_for_document(&self.db, document_id).await?;
        if let Some(existing) = &live {
            if existing.status != EnvelopeStatus::Draft {
                return Err(TrestleError::state("Envelope has already been sent"));
            }
        }

        let supplied = match options.recipients {
            Some(inputs) => {
                let normalized = ledger::normalize("", inputs)?;
                ledger::require_sendable(&normalized)?;
                Some(normalized)
            }
            None if live.is_none() => {
                return Err(TrestleError::state("At least one signer is required"));
            }
            None => None,
        };

        let source = options
            .source
            .clone()
            .or_else(|| live.as_ref().and_then(|e| e.source.clone()));
        if let Some(source) = &source {
            self.check_source(source, live.as_ref().map(|e| e.id.as_str()))
                .await?;
        }

        // Validation is done; mutations start here.
        let envelope = match live {
            Some(existing) => existing,
            None => {
                let draft_options = DraftOptions {
                    source,
                    subject: options.subject.clone(),
                    message: options.message.clone(),
                    expires_at: options.expires_at.clone(),
                    metadata: Metadata::new(),
                };
                self.ensure_draft_for(actor, &document, draft_options).await?
            }
        };

        let recipients = match supplied {
            Some(mut rows) => {
                for row in &mut rows {
                    row.envelope_id = envelope.id.clone();
                }
                self.ledger.store(&envelope.id, rows).await?
            }
            None => {
                let rows = self.ledger.list(&envelope.id).await?;
                ledger::require_sendable(&rows)?;
                rows
            }
        };

        if options.subject.is_some() || options.message.is_some() || options.expires_at.is_some()
        {
            envelopes::update_draft_content(
                &self.db,
                &envelope.id,
                options.subject,
                options.message,
                options.expires_at,
            )
            .await?;
        }

        let envelope = self.load_envelope(&envelope.id).await?;
        self.dispatch_send(actor, envelope, &recipients).await
    }

    /// Cross-entity guard: the source must not be accepted already, and no
    /// other envelope for it may have executed.
    async fn check_source(
        &self,
        source: &SourceEntity,
        exclude_envelope: Option<&str>,
    ) -> Result<(), TrestleError> {
        if self.source_guard.is_accepted(source).await? {
            return Err(TrestleError::state(format!(
                "{} {} has already been accepted",
                source.kind, source.id
            )));
        }
        if envelopes::exists_executed_for_source(&self.db, source, exclude_envelope).await? {
            return Err(TrestleError::state(format!(
                "An executed envelope already exists for {} {}",
                source.kind, source.id
            )));
        }
        Ok(())
    }

    /// Create signing requests, move the draft to `sent`, and notify the first batch.
    async fn dispatch_send(
        &self,
        actor: &Actor,
        envelope: Envelope,
        recipients: &[Recipient],
    ) -> Result<SendOutcome, TrestleError> {
        let now = now_timestamp();
        let requests: Vec<SigningRequest> = recipients
            .iter()
            .filter(|r| r.is_signer())
            .map(|r| SigningRequest {
                id: uuid::Uuid::new_v4().to_string(),
                envelope_id: Some(envelope.id.clone()),
                group_id: None,
                document_id: envelope.document_id.clone(),
                recipient_id: Some(r.id.clone()),
                sequence: r.sequence,
                required: r.required,
                status: RequestStatus::Draft,
                sent_to_email: r.email.clone(),
                signer_name: r.name.clone(),
                signer_role: r.signer_role.clone(),
                token_hash: None,
                sent_at: None,
                viewed_at: None,
                signed_at: None,
                signed_file_id: None,
                created_at: now.clone(),
            })
            .collect();

        if !envelopes::begin_sending(&self.db, &envelope.id, requests, &now).await? {
            return Err(TrestleError::state("Envelope has already been sent"));
        }

        let fresh = signing_requests::list_for_envelope(&self.db, &envelope.id).await?;
        let batch = active_batch(&fresh);
        let report = self
            .fanout
            .dispatch(&batch.requests, &notice_context(&envelope), NoticeKind::Initial)
            .await;

        documents::set_document_status(&self.db, &envelope.document_id, DocumentStatus::Sent)
            .await?;

        let pending_signers = pending_required(&fresh).saturating_sub(batch.len());
        self.events
            .record(
                EventType::Sent,
                Some(&envelope.id),
                &envelope.document_id,
                Some(&actor.user_id),
                payload([
                    ("sent_now", json!(report.sent_now())),
                    ("pending_signers", json!(pending_signers)),
                    ("failed", json!(report.failed_ids())),
                    ("active_sequence", json!(batch.sequence)),
                ]),
            )
            .await?;
        info!(
            envelope_id = %envelope.id,
            document_id = %envelope.document_id,
            sent_now = report.sent_now(),
            pending_signers,
            failed = report.failed.len(),
            "envelope sent"
        );

        Ok(SendOutcome {
            envelope: self.load_envelope(&envelope.id).await?,
            sent_now: report.sent_now(),
            pending_signers,
            failed: report.failed,
        })
    }

    // --- signing flow ---

    /// A signer opened their link. Only the first view is recorded.
    pub async fn record_view(&self, token: &str) -> Result<ViewOutcome, TrestleError> {
        let request = self.issuer.resolve(token).await?;
        let first_view =
            signing_requests::mark_viewed(&self.db, &request.id, &now_timestamp()).await?;
        if first_view {
            self.events
                .record(
                    EventType::Viewed,
                    request.envelope_id.as_deref(),
                    &request.document_id,
                    None,
                    payload([("request_id", json!(request.id))]),
                )
                .await?;
        }
        Ok(ViewOutcome {
            request: self.load_request(&request.id).await?,
            first_view,
        })
    }

    /// A signer completed their signature.
    ///
    /// The request must be in the active batch computed from fresh rows.
    /// Afterwards the next batch is issued and notified, then the envelope
    /// moves to `partially_signed` or, once every required request is
    /// signed, to `executed`. Under concurrent completions exactly one
    /// caller wins `executed` and writes its event.
    pub async fn complete_signing(
        &self,
        token: &str,
        signed_file_id: Option<&str>,
    ) -> Result<SigningOutcome, TrestleError> {
        let request = self.issuer.resolve(token).await?;
        let group = group_key(&request).ok_or_else(|| {
            TrestleError::Internal(format!("signing request {} has no group", request.id))
        })?;

        let envelope = match &request.envelope_id {
            Some(envelope_id) => {
                let envelope = self.load_envelope(envelope_id).await?;
                if !envelope.status.is_in_flight() {
                    return Err(TrestleError::state(format!(
                        "Envelope is {}",
                        envelope.status
                    )));
                }
                Some(envelope)
            }
            None => None,
        };

        let rows = signing_requests::list_for_sequence_group(&self.db, &group).await?;
        if !is_request_active(&request.id, &active_batch(&rows)) {
            return Err(TrestleError::state("Signer is not in the active batch"));
        }
        if !signing_requests::mark_signed(&self.db, &request.id, signed_file_id, &now_timestamp())
            .await?
        {
            return Err(TrestleError::state(
                "Signing request has already been completed",
            ));
        }

        self.events
            .record(
                EventType::Signed,
                request.envelope_id.as_deref(),
                &request.document_id,
                None,
                payload([
                    ("request_id", json!(request.id)),
                    ("signer_role", json!(request.signer_role)),
                    ("signed_file_id", json!(signed_file_id)),
                ]),
            )
            .await?;
        info!(
            request_id = %request.id,
            envelope_id = request.envelope_id.as_deref().unwrap_or("-"),
            document_id = %request.document_id,
            "signing request signed"
        );

        let rows = signing_requests::list_for_sequence_group(&self.db, &group).await?;
        let mut executed = false;
        let mut next_batch = None;

        if all_required_signed(&rows) {
            executed = self
                .finish(&request, envelope.as_ref(), signed_file_id)
                .await?;
        } else {
            let drafts: Vec<SigningRequest> = active_batch(&rows)
                .requests
                .into_iter()
                .filter(|r| r.status == RequestStatus::Draft)
                .collect();
            if !drafts.is_empty() {
                let context = match &envelope {
                    Some(envelope) => notice_context(envelope),
                    None => NoticeContext {
                        document_id: request.document_id.clone(),
                        ..NoticeContext::default()
                    },
                };
                next_batch = Some(
                    self.fanout
                        .dispatch(&drafts, &context, NoticeKind::Initial)
                        .await,
                );
            }
            if let Some(envelope) = &envelope {
                envelopes::transition(
                    &self.db,
                    &envelope.id,
                    EnvelopeStatus::PartiallySigned,
                    &now_timestamp(),
                )
                .await?;
            }
        }

        let envelope_status = match &envelope {
            Some(envelope) => Some(self.load_envelope(&envelope.id).await?.status),
            None => None,
        };
        Ok(SigningOutcome {
            request: self.load_request(&request.id).await?,
            envelope_status,
            executed,
            next_batch,
        })
    }

    /// Terminal transition. Returns whether this caller performed it.
    async fn finish(
        &self,
        request: &SigningRequest,
        envelope: Option<&Envelope>,
        signed_file_id: Option<&str>,
    ) -> Result<bool, TrestleError> {
        let document = documents::get_document(&self.db, &request.document_id).await?;
        let file_id = signed_file_id
            .map(|s| s.to_string())
            .or_else(|| document.and_then(|d| d.executed_file_id));

        match envelope {
            Some(envelope) => {
                let won = envelopes::transition(
                    &self.db,
                    &envelope.id,
                    EnvelopeStatus::Executed,
                    &now_timestamp(),
                )
                .await?;
                if !won {
                    return Ok(false);
                }
                if let Some(file_id) = &file_id {
                    documents::set_executed_file(&self.db, &envelope.document_id, file_id).await?;
                }
                documents::set_document_status(
                    &self.db,
                    &envelope.document_id,
                    DocumentStatus::Executed,
                )
                .await?;
                self.events
                    .record(
                        EventType::Executed,
                        Some(&envelope.id),
                        &envelope.document_id,
                        None,
                        payload([
                            ("executed_file_id", json!(file_id)),
                            ("final_request_id", json!(request.id)),
                        ]),
                    )
                    .await?;
                info!(
                    envelope_id = %envelope.id,
                    document_id = %envelope.document_id,
                    "envelope executed"
                );
                Ok(true)
            }
            None => {
                // Legacy groups have no envelope row; the document status is the CAS.
                let won = documents::set_document_status(
                    &self.db,
                    &request.document_id,
                    DocumentStatus::Executed,
                )
                .await?;
                if !won {
                    return Ok(false);
                }
                if let Some(file_id) = &file_id {
                    documents::set_executed_file(&self.db, &request.document_id, file_id).await?;
                }
                self.events
                    .record(
                        EventType::Executed,
                        None,
                        &request.document_id,
                        None,
                        payload([
                            ("executed_file_id", json!(file_id)),
                            ("group_id", json!(request.group_id)),
                        ]),
                    )
                    .await?;
                info!(document_id = %request.document_id, "legacy signing group executed");
                Ok(true)
            }
        }
    }

    /// Can this signer act right now? Read-only.
    pub async fn signer_status(&self, request_id: &str) -> Result<SignerStatus, TrestleError> {
        let request = self.load_request(request_id).await?;
        let Some(group) = group_key(&request) else {
            return Ok(SignerStatus {
                request,
                can_act: false,
                active_sequence: None,
            });
        };
        let rows = signing_requests::list_for_sequence_group(&self.db, &group).await?;
        let batch = active_batch(&rows);
        Ok(SignerStatus {
            can_act: is_request_active(&request.id, &batch),
            active_sequence: batch.sequence,
            request,
        })
    }

    // --- reminders ---

    /// Reissue and resend the link of a request in the current active batch.
    pub async fn remind(
        &self,
        actor: &Actor,
        request_id: &str,
    ) -> Result<RemindOutcome, TrestleError> {
        let request = self.load_request(request_id).await?;
        self.gate
            .check(actor, Action::Remind, &request.document_id)
            .await?;
        self.issuer.ensure_configured()?;

        let group = group_key(&request).ok_or_else(|| {
            TrestleError::Internal(format!("signing request {request_id} has no group"))
        })?;
        let context = match &request.envelope_id {
            Some(envelope_id) => {
                let envelope = self.load_envelope(envelope_id).await?;
                if !envelope.status.is_in_flight() {
                    return Err(TrestleError::state(format!(
                        "Cannot remind on a {} envelope",
                        envelope.status
                    )));
                }
                notice_context(&envelope)
            }
            None => NoticeContext {
                document_id: request.document_id.clone(),
                ..NoticeContext::default()
            },
        };

        let rows = signing_requests::list_for_sequence_group(&self.db, &group).await?;
        let batch = active_batch(&rows);
        if !is_request_active(request_id, &batch) {
            return Err(TrestleError::state("Signer is not in the active batch"));
        }
        let current: Vec<SigningRequest> = batch
            .requests
            .into_iter()
            .filter(|r| r.id == request_id)
            .collect();

        let report = self
            .fanout
            .dispatch(&current, &context, NoticeKind::Reminder)
            .await;
        let delivered = report.sent_now() == 1;

        self.events
            .record(
                EventType::Reminded,
                request.envelope_id.as_deref(),
                &request.document_id,
                Some(&actor.user_id),
                payload([
                    ("request_id", json!(request_id)),
                    ("delivered", json!(delivered)),
                ]),
            )
            .await?;
        info!(request_id, delivered, "signer reminded");

        Ok(RemindOutcome {
            request: self.load_request(request_id).await?,
            delivered,
            failure: report.failed.into_iter().next(),
        })
    }

    // --- voiding ---

    /// Void a live envelope and every open request under it.
    ///
    /// Voiding an already voided or expired envelope is an idempotent
    /// success that still reconciles the document status, so retries
    /// converge after a partial failure.
    pub async fn void(
        &self,
        actor: &Actor,
        envelope_id: &str,
        reason: Option<&str>,
    ) -> Result<VoidOutcome, TrestleError> {
        let envelope = self.load_envelope(envelope_id).await?;
        self.gate
            .check(actor, Action::Void, &envelope.document_id)
            .await?;
        self.void_envelope(actor, envelope, reason, "manual", Metadata::new())
            .await
    }

    async fn void_envelope(
        &self,
        actor: &Actor,
        envelope: Envelope,
        reason: Option<&str>,
        via: &str,
        extra: Metadata,
    ) -> Result<VoidOutcome, TrestleError> {
        match envelope.status {
            EnvelopeStatus::Executed => {
                Err(TrestleError::state("Executed envelopes cannot be voided"))
            }
            EnvelopeStatus::Voided | EnvelopeStatus::Expired => {
                self.idempotent_void(envelope).await
            }
            EnvelopeStatus::Draft | EnvelopeStatus::Sent | EnvelopeStatus::PartiallySigned => {
                let mut patch = payload([
                    ("void_reason", json!(reason)),
                    ("voided_by", json!(actor.user_id)),
                    ("void_via", json!(via)),
                ]);
                patch.extend(extra);

                let closed = envelopes::close_with_cascade(
                    &self.db,
                    &envelope.id,
                    EnvelopeStatus::Voided,
                    &now_timestamp(),
                    patch.clone(),
                )
                .await?;
                let Some(requests_voided) = closed else {
                    // Lost a race with another transition; classify what it became.
                    let current = self.load_envelope(&envelope.id).await?;
                    if current.status == EnvelopeStatus::Executed {
                        return Err(TrestleError::state("Executed envelopes cannot be voided"));
                    }
                    return self.idempotent_void(current).await;
                };

                patch.insert("requests_voided".to_string(), json!(requests_voided));
                self.events
                    .record(
                        EventType::Voided,
                        Some(&envelope.id),
                        &envelope.document_id,
                        Some(&actor.user_id),
                        patch,
                    )
                    .await?;
                let document_voided = self.reconcile_document(&envelope.document_id).await?;
                info!(
                    envelope_id = %envelope.id,
                    document_id = %envelope.document_id,
                    requests_voided,
                    document_voided,
                    via,
                    "envelope voided"
                );

                Ok(VoidOutcome {
                    envelope: self.load_envelope(&envelope.id).await?,
                    idempotent: false,
                    requests_voided,
                    document_voided,
                })
            }
        }
    }

    async fn idempotent_void(&self, envelope: Envelope) -> Result<VoidOutcome, TrestleError> {
        let document_voided = self.reconcile_document(&envelope.document_id).await?;
        Ok(VoidOutcome {
            envelope,
            idempotent: true,
            requests_voided: 0,
            document_voided,
        })
    }

    /// Void the document once no live envelope remains for it.
    async fn reconcile_document(&self, document_id: &str) -> Result<bool, TrestleError> {
        if envelopes::count_live_for_document(&self.db, document_id, None).await? > 0 {
            return Ok(false);
        }
        documents::set_document_status(&self.db, document_id, DocumentStatus::Voided).await
    }

    // --- resend ---

    /// Clone an envelope's recipients into a new envelope and send it,
    /// voiding the source if it is still live.
    pub async fn resend(
        &self,
        actor: &Actor,
        envelope_id: &str,
        options: ResendOptions,
    ) -> Result<ResendOutcome, TrestleError> {
        let source = self.load_envelope(envelope_id).await?;
        self.gate
            .check(actor, Action::Resend, &source.document_id)
            .await?;
        if source.status == EnvelopeStatus::Executed {
            return Err(TrestleError::state("Executed envelopes cannot be resent"));
        }
        self.issuer.ensure_configured()?;
        let document = self.load_document(&source.document_id).await?;

        if !source.status.is_live() {
            if let Some(other) =
                envelopes::find_live_for_document(&self.db, &source.document_id).await?
            {
                return Err(TrestleError::state(format!(
                    "Document already has a live envelope ({})",
                    other.id
                )));
            }
        }
        ledger::require_sendable(&self.ledger.list(&source.id).await?)?;
        if let Some(entity) = &source.source {
            self.check_source(entity, Some(&source.id)).await?;
        }

        let mut metadata = Metadata::new();
        metadata.insert("resent_from".to_string(), json!(source.id));
        let draft = self.new_draft(
            &document,
            DraftOptions {
                source: source.source.clone(),
                subject: options.subject.or_else(|| source.subject.clone()),
                message: options.message.or_else(|| source.message.clone()),
                expires_at: options.expires_at,
                metadata,
            },
        )?;
        // The source is still live here; it is superseded right below.
        envelopes::insert_envelope(&self.db, &draft).await?;
        self.record_created(actor, &draft).await?;
        let recipients = self.ledger.clone_into(&source.id, &draft.id).await?;

        let source_voided = if source.status.is_live() {
            let superseded = self
                .void_envelope(
                    actor,
                    source.clone(),
                    Some("Superseded by resend"),
                    "resend",
                    payload([("superseded_by", json!(draft.id))]),
                )
                .await;
            match superseded {
                Ok(outcome) => !outcome.idempotent,
                Err(e) => {
                    // The source moved on (e.g. executed) after we loaded it;
                    // the new draft must not stay live beside it.
                    self.abandon_resend_draft(actor, &draft, &source.id).await;
                    return Err(e);
                }
            }
        } else {
            false
        };

        let sent = self.dispatch_send(actor, draft, &recipients).await?;
        info!(
            source_envelope_id = %source.id,
            envelope_id = %sent.envelope.id,
            source_voided,
            "envelope resent"
        );
        Ok(ResendOutcome {
            previous: self.load_envelope(&source.id).await?,
            source_voided,
            sent,
        })
    }

    async fn abandon_resend_draft(&self, actor: &Actor, draft: &Envelope, source_id: &str) {
        let abandoned = self
            .void_envelope(
                actor,
                draft.clone(),
                Some("Resend aborted"),
                "resend",
                payload([("resent_from", json!(source_id))]),
            )
            .await;
        if let Err(e) = abandoned {
            warn!(envelope_id = %draft.id, error = %e, "failed to void abandoned resend draft");
        }
    }

    // --- expiry ---

    /// Expire in-flight envelopes whose `expires_at` is before `now`.
    ///
    /// Nothing calls this on a schedule; the host decides when to sweep.
    /// Returns the ids of the envelopes this call expired.
    pub async fn sweep_expired(&self, now: DateTime<Utc>) -> Result<Vec<String>, TrestleError> {
        let now = format_timestamp(now);
        let mut swept = Vec::new();
        for envelope in envelopes::list_expirable(&self.db, &now).await? {
            let patch = payload([("expired_at", json!(now))]);
            let closed = envelopes::close_with_cascade(
                &self.db,
                &envelope.id,
                EnvelopeStatus::Expired,
                &now,
                patch,
            )
            .await?;
            let Some(requests_expired) = closed else {
                continue;
            };
            self.events
                .record(
                    EventType::Expired,
                    Some(&envelope.id),
                    &envelope.document_id,
                    None,
                    payload([
                        ("expires_at", json!(envelope.expires_at)),
                        ("requests_expired", json!(requests_expired)),
                    ]),
                )
                .await?;
            info!(envelope_id = %envelope.id, requests_expired, "envelope expired");
            swept.push(envelope.id);
        }
        Ok(swept)
    }

    // --- loaders ---

    async fn load_document(&self, id: &str) -> Result<Document, TrestleError> {
        documents::get_document(&self.db, id)
            .await?
            .ok_or_else(|| TrestleError::not_found("document", id))
    }

    async fn load_envelope(&self, id: &str) -> Result<Envelope, TrestleError> {
        envelopes::get_envelope(&self.db, id)
            .await?
            .ok_or_else(|| TrestleError::not_found("envelope", id))
    }

    async fn load_request(&self, id: &str) -> Result<SigningRequest, TrestleError> {
        signing_requests::get_request(&self.db, id)
            .await?
            .ok_or_else(|| TrestleError::not_found("signing request", id))
    }
}

fn notice_context(envelope: &Envelope) -> NoticeContext {
    NoticeContext {
        envelope_id: Some(envelope.id.clone()),
        document_id: envelope.document_id.clone(),
        subject: envelope.subject.clone(),
        message: envelope.message.clone(),
    }
}
