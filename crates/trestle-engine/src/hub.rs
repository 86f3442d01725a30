// SPDX-FileCopyrightText: 2026 Trestle Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Signature hub: a read-only dashboard projection over live envelopes.
//!
//! Nothing here writes. Flags are derived from persisted rows on every call
//! and the active batch comes from the same sequencer the controller uses.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use trestle_config::model::HubConfig;
use trestle_core::types::format_timestamp;
use trestle_core::{
    Envelope, EnvelopeStatus, Recipient, RecipientType, RequestStatus, SigningRequest,
    TrestleError, active_batch,
};
use trestle_storage::Database;
use trestle_storage::queries::{envelopes, events, recipients, signing_requests};

/// One line of the hub.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HubRow {
    pub envelope_id: String,
    pub document_id: String,
    pub project_id: String,
    pub status: EnvelopeStatus,
    pub subject: Option<String>,
    pub signers_total: usize,
    pub signers_signed: usize,
    /// Emails (or names) of the active batch.
    pub waiting_on: Vec<String>,
    /// The active batch includes someone outside the organization.
    pub waiting_on_client: bool,
    /// In flight and expiring within the configured window, or already past it.
    pub expiring_soon: bool,
    pub expires_at: Option<String>,
    pub sent_at: Option<String>,
    pub last_event_at: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SignatureHub {
    db: Database,
    window: Duration,
}

impl SignatureHub {
    pub fn new(db: Database, config: &HubConfig) -> Self {
        Self {
            db,
            window: Duration::days(i64::from(config.expiring_soon_days)),
        }
    }

    /// Project every live envelope, optionally limited to one project.
    pub async fn project(
        &self,
        project_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Vec<HubRow>, TrestleError> {
        let horizon = now
            .checked_add_signed(self.window)
            .map(format_timestamp)
            .ok_or_else(|| {
                TrestleError::Config("hub.expiring_soon_days is out of range".to_string())
            })?;
        let mut rows = Vec::new();
        for envelope in envelopes::list_live(&self.db, project_id).await? {
            let requests = signing_requests::list_for_envelope(&self.db, &envelope.id).await?;
            let ledger = recipients::list_recipients(&self.db, &envelope.id).await?;
            let last_event_at = events::last_event_at(&self.db, &envelope.id).await?;
            rows.push(project_row(envelope, &requests, &ledger, &horizon, last_event_at));
        }
        Ok(rows)
    }
}

fn project_row(
    envelope: Envelope,
    requests: &[SigningRequest],
    ledger: &[Recipient],
    horizon: &str,
    last_event_at: Option<String>,
) -> HubRow {
    // Drafts have no requests yet; count the ledger's required signers instead.
    let signers_total = if requests.is_empty() {
        ledger.iter().filter(|r| r.is_signer() && r.required).count()
    } else {
        requests.iter().filter(|r| r.required).count()
    };
    let signers_signed = requests
        .iter()
        .filter(|r| r.required && r.status == RequestStatus::Signed)
        .count();

    let batch = active_batch(requests);
    let waiting_on = batch
        .requests
        .iter()
        .filter_map(|r| r.sent_to_email.clone().or_else(|| r.signer_name.clone()))
        .collect();
    let waiting_on_client = batch.requests.iter().any(|request| {
        let recipient = request
            .recipient_id
            .as_deref()
            .and_then(|id| ledger.iter().find(|r| r.id == id));
        recipient.is_none_or(|r| r.recipient_type != RecipientType::InternalUser)
    });

    let expiring_soon = envelope.status.is_in_flight()
        && envelope
            .expires_at
            .as_deref()
            .is_some_and(|expires_at| expires_at <= horizon);

    HubRow {
        envelope_id: envelope.id,
        document_id: envelope.document_id,
        project_id: envelope.project_id,
        status: envelope.status,
        subject: envelope.subject,
        signers_total,
        signers_signed,
        waiting_on,
        waiting_on_client,
        expiring_soon,
        expires_at: envelope.expires_at,
        sent_at: envelope.sent_at,
        last_event_at,
    }
}
