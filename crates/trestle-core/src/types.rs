// SPDX-FileCopyrightText: 2026 Trestle Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain types shared by storage, token issuance, and the lifecycle engine.
//!
//! Every status column is a closed enum. The SQL text form is the snake_case
//! `Display` output, parsed back with `FromStr`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Free-form JSON object attached to envelopes and events.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// Format a UTC instant the way every persisted timestamp is stored.
///
/// Fixed width with millisecond precision, so lexical order in SQL equals
/// chronological order.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

/// The current instant in storage format.
pub fn now_timestamp() -> String {
    format_timestamp(Utc::now())
}

/// Lifecycle status of an [`Envelope`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum EnvelopeStatus {
    Draft,
    Sent,
    PartiallySigned,
    Executed,
    Voided,
    Expired,
}

impl EnvelopeStatus {
    pub const ALL: [EnvelopeStatus; 6] = [
        EnvelopeStatus::Draft,
        EnvelopeStatus::Sent,
        EnvelopeStatus::PartiallySigned,
        EnvelopeStatus::Executed,
        EnvelopeStatus::Voided,
        EnvelopeStatus::Expired,
    ];

    /// Statuses that count toward the one-live-envelope-per-document rule.
    pub const LIVE: [EnvelopeStatus; 3] = [
        EnvelopeStatus::Draft,
        EnvelopeStatus::Sent,
        EnvelopeStatus::PartiallySigned,
    ];

    /// Statuses in which signers may act.
    pub const IN_FLIGHT: [EnvelopeStatus; 2] =
        [EnvelopeStatus::Sent, EnvelopeStatus::PartiallySigned];

    pub fn is_live(self) -> bool {
        match self {
            EnvelopeStatus::Draft | EnvelopeStatus::Sent | EnvelopeStatus::PartiallySigned => true,
            EnvelopeStatus::Executed | EnvelopeStatus::Voided | EnvelopeStatus::Expired => false,
        }
    }

    pub fn is_in_flight(self) -> bool {
        matches!(self, EnvelopeStatus::Sent | EnvelopeStatus::PartiallySigned)
    }

    /// Whether `self -> next` is a legal transition.
    ///
    /// Status only moves forward; nothing returns to draft.
    pub fn can_transition_to(self, next: EnvelopeStatus) -> bool {
        use EnvelopeStatus::*;
        match (self, next) {
            (Draft, Sent) => true,
            (Sent, PartiallySigned) => true,
            (Sent | PartiallySigned, Executed) => true,
            (Draft | Sent | PartiallySigned, Voided) => true,
            (Sent | PartiallySigned, Expired) => true,
            (Draft, _) | (Sent, _) | (PartiallySigned, _) => false,
            (Executed | Voided | Expired, _) => false,
        }
    }

    /// Every status that may legally move to `next`. Storage uses this as
    /// the expected-prior set of its compare-and-set updates.
    pub fn sources_of(next: EnvelopeStatus) -> Vec<EnvelopeStatus> {
        Self::ALL
            .into_iter()
            .filter(|from| from.can_transition_to(next))
            .collect()
    }
}

/// Status of a single [`SigningRequest`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    /// Created, no link issued yet.
    Draft,
    Sent,
    Viewed,
    Signed,
    Voided,
    Expired,
}

impl RequestStatus {
    /// Statuses that no longer gate sequencing.
    pub const CLOSED: [RequestStatus; 3] = [
        RequestStatus::Signed,
        RequestStatus::Voided,
        RequestStatus::Expired,
    ];

    /// Statuses still waiting on the signer.
    pub const OPEN: [RequestStatus; 3] =
        [RequestStatus::Draft, RequestStatus::Sent, RequestStatus::Viewed];

    pub fn is_closed(self) -> bool {
        match self {
            RequestStatus::Signed | RequestStatus::Voided | RequestStatus::Expired => true,
            RequestStatus::Draft | RequestStatus::Sent | RequestStatus::Viewed => false,
        }
    }

    /// Whether a presented signing link may act on a request in this status.
    pub fn accepts_link(self) -> bool {
        matches!(self, RequestStatus::Sent | RequestStatus::Viewed)
    }
}

/// Whether a recipient signs or only receives copies.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RecipientRole {
    Signer,
    Cc,
}

/// How a recipient is identified.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RecipientType {
    /// A bare email address.
    ExternalEmail,
    /// A contact from the project directory.
    Contact,
    /// A member of the contractor's own team.
    InternalUser,
}

/// Kind of business entity an envelope was created for.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Proposal,
    ChangeOrder,
    LienWaiver,
    Contract,
    Other,
}

/// Link from an envelope to the business entity it was created for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceEntity {
    pub kind: SourceKind,
    pub id: String,
}

/// Tag on an [`EnvelopeEvent`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Created,
    Sent,
    Viewed,
    Signed,
    Reminded,
    Voided,
    Executed,
    Expired,
}

/// Status of the document an envelope belongs to, as far as signing is concerned.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    Draft,
    Sent,
    Executed,
    Voided,
}

/// The document record the engine reads and updates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub project_id: String,
    pub title: String,
    pub status: DocumentStatus,
    /// Final signed file, when the signing flow has produced one.
    pub executed_file_id: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// One signature round for a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub id: String,
    pub document_id: String,
    pub project_id: String,
    pub source: Option<SourceEntity>,
    pub status: EnvelopeStatus,
    pub subject: Option<String>,
    pub message: Option<String>,
    pub expires_at: Option<String>,
    pub sent_at: Option<String>,
    pub executed_at: Option<String>,
    pub voided_at: Option<String>,
    pub metadata: Metadata,
    pub created_at: String,
    pub updated_at: String,
}

/// A party attached to one envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipient {
    pub id: String,
    pub envelope_id: String,
    pub recipient_type: RecipientType,
    pub contact_id: Option<String>,
    pub user_id: Option<String>,
    pub role: RecipientRole,
    pub name: Option<String>,
    pub email: Option<String>,
    pub signer_role: Option<String>,
    pub sequence: i64,
    pub required: bool,
    /// Zero-based order in which the recipient was supplied.
    pub position: i64,
}

impl Recipient {
    pub fn is_signer(&self) -> bool {
        self.role == RecipientRole::Signer
    }
}

/// Which set of requests sequence together.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SequenceGroup {
    Envelope(String),
    /// Pre-envelope documents grouped their requests by a shared group id.
    Legacy(String),
}

/// The per-signer actionable record a signing link targets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SigningRequest {
    pub id: String,
    pub envelope_id: Option<String>,
    pub group_id: Option<String>,
    pub document_id: String,
    pub recipient_id: Option<String>,
    pub sequence: i64,
    pub required: bool,
    pub status: RequestStatus,
    pub sent_to_email: Option<String>,
    pub signer_name: Option<String>,
    pub signer_role: Option<String>,
    /// Hex HMAC-SHA256 digest of the current signing token.
    pub token_hash: Option<String>,
    pub sent_at: Option<String>,
    pub viewed_at: Option<String>,
    pub signed_at: Option<String>,
    pub signed_file_id: Option<String>,
    pub created_at: String,
}

impl SigningRequest {
    /// Sequence used for ordering. Anything below 1 sorts as step 1.
    pub fn effective_sequence(&self) -> i64 {
        self.sequence.max(1)
    }

    /// The group this request sequences with, if any.
    pub fn group(&self) -> Option<SequenceGroup> {
        match (&self.envelope_id, &self.group_id) {
            (Some(envelope_id), _) => Some(SequenceGroup::Envelope(envelope_id.clone())),
            (None, Some(group_id)) => Some(SequenceGroup::Legacy(group_id.clone())),
            (None, None) => None,
        }
    }
}

/// Append-only audit record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvelopeEvent {
    pub id: String,
    pub envelope_id: Option<String>,
    pub document_id: String,
    pub actor_id: Option<String>,
    pub event_type: EventType,
    pub payload: Metadata,
    pub created_at: String,
}

/// A persisted, bounded-use download grant for an executed file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadGrant {
    pub token_hash: String,
    pub envelope_id: String,
    pub file_id: String,
    pub expires_at: String,
    pub max_uses: i64,
    pub use_count: i64,
    pub created_by: Option<String>,
    pub created_at: String,
}

impl DownloadGrant {
    pub fn remaining_uses(&self) -> i64 {
        (self.max_uses - self.use_count).max(0)
    }
}

/// The caller on whose behalf an operation runs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: String,
    pub org_id: String,
}

impl Actor {
    pub fn new(user_id: impl Into<String>, org_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            org_id: org_id.into(),
        }
    }
}

/// Mutating operations checked by the authorization gate.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Action {
    EnsureDraft,
    SaveDraft,
    Send,
    Remind,
    Void,
    Resend,
    DownloadExecuted,
}
