// SPDX-FileCopyrightText: 2026 Trestle Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Envelope and signing-request lifecycle engine.
//!
//! [`LifecycleController`] owns every status transition. It consumes the
//! host's collaborators ([`trestle_core::Notifier`],
//! [`trestle_core::Authorizer`], [`trestle_core::SourceEntityGuard`]) and
//! persists through `trestle-storage`. [`ArtifactResolver`] serves executed
//! files and [`SignatureHub`] is a read-only dashboard projection.

pub mod artifacts;
pub mod controller;
pub mod events;
pub mod gate;
pub mod hub;
pub mod ledger;
pub mod notify;
pub mod outcome;
pub mod telemetry;

pub use artifacts::{ArtifactResolver, ExecutedFile};
pub use controller::{Collaborators, LifecycleController};
pub use events::EventRecorder;
pub use gate::Gate;
pub use hub::{HubRow, SignatureHub};
pub use ledger::{RecipientInput, RecipientLedger};
pub use notify::{DeliveryFailure, FanoutReport};
pub use outcome::{
    DraftOptions, DraftUpdate, RemindOutcome, ResendOptions, ResendOutcome, SavedDraft,
    SendOptions, SendOutcome, SignerStatus, SigningOutcome, ViewOutcome, VoidOutcome,
};
pub use telemetry::init_tracing;
