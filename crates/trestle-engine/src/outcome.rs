// SPDX-FileCopyrightText: 2026 Trestle Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Inputs and results of the lifecycle controller's operations.

use trestle_core::{Envelope, EnvelopeStatus, Metadata, Recipient, SigningRequest, SourceEntity};

use crate::ledger::RecipientInput;
use crate::notify::{DeliveryFailure, FanoutReport};

/// Fields for a newly created draft envelope.
#[derive(Debug, Clone, Default)]
pub struct DraftOptions {
    pub source: Option<SourceEntity>,
    pub subject: Option<String>,
    pub message: Option<String>,
    /// Storage-format timestamp. Defaults to now plus `signing.default_expiry_days`.
    pub expires_at: Option<String>,
    pub metadata: Metadata,
}

/// Changes to a draft. Recipients are always replaced as a whole.
#[derive(Debug, Clone, Default)]
pub struct DraftUpdate {
    pub recipients: Vec<RecipientInput>,
    pub subject: Option<String>,
    pub message: Option<String>,
    pub expires_at: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct SendOptions {
    /// Replaces the draft's ledger when present; otherwise the saved ledger is sent.
    pub recipients: Option<Vec<RecipientInput>>,
    pub source: Option<SourceEntity>,
    pub subject: Option<String>,
    pub message: Option<String>,
    pub expires_at: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ResendOptions {
    pub subject: Option<String>,
    pub message: Option<String>,
    pub expires_at: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SavedDraft {
    pub envelope: Envelope,
    pub recipients: Vec<Recipient>,
}

/// Result of sending an envelope.
///
/// Delivery failures do not fail the send: the affected requests keep
/// their issued link and can be reminded.
#[derive(Debug, Clone)]
pub struct SendOutcome {
    pub envelope: Envelope,
    /// Signers notified in the first batch.
    pub sent_now: usize,
    /// Required signers waiting on a later step.
    pub pending_signers: usize,
    pub failed: Vec<DeliveryFailure>,
}

#[derive(Debug, Clone)]
pub struct ViewOutcome {
    pub request: SigningRequest,
    pub first_view: bool,
}

#[derive(Debug, Clone)]
pub struct SigningOutcome {
    pub request: SigningRequest,
    /// Envelope status after this signature, `None` for legacy group requests.
    pub envelope_status: Option<EnvelopeStatus>,
    /// Whether this call performed the terminal transition.
    pub executed: bool,
    /// Links issued to the next batch, if one opened.
    pub next_batch: Option<FanoutReport>,
}

#[derive(Debug, Clone)]
pub struct RemindOutcome {
    pub request: SigningRequest,
    pub delivered: bool,
    pub failure: Option<DeliveryFailure>,
}

/// Result of a void. `idempotent` marks a repeat on an already closed envelope.
#[derive(Debug, Clone)]
pub struct VoidOutcome {
    pub envelope: Envelope,
    pub idempotent: bool,
    pub requests_voided: usize,
    pub document_voided: bool,
}

#[derive(Debug, Clone)]
pub struct ResendOutcome {
    /// The source envelope as it stands after the resend.
    pub previous: Envelope,
    pub source_voided: bool,
    pub sent: SendOutcome,
}

/// Whether a signer may act right now.
#[derive(Debug, Clone)]
pub struct SignerStatus {
    pub request: SigningRequest,
    pub can_act: bool,
    pub active_sequence: Option<i64>,
}
