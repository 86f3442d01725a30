// SPDX-FileCopyrightText: 2026 Trestle Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Trestle signing engine.
//!
//! Holds the error type, the domain model shared by every crate, the
//! collaborator traits the engine consumes, and the pure signing sequencer.

pub mod error;
pub mod sequencer;
pub mod traits;
pub mod types;

pub use error::TrestleError;
pub use sequencer::{
    ActiveBatch, active_batch, all_required_signed, group_key, is_request_active, pending_required,
};
pub use traits::{Authorizer, NoticeKind, Notifier, SigningNotice, SourceEntityGuard};
pub use types::{
    Action, Actor, Document, DocumentStatus, DownloadGrant, Envelope, EnvelopeEvent,
    EnvelopeStatus, EventType, Metadata, Recipient, RecipientRole, RecipientType,
    RequestStatus, SequenceGroup, SigningRequest, SourceEntity, SourceKind,
};
