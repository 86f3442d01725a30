// SPDX-FileCopyrightText: 2026 Trestle Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Collaborator traits consumed by the lifecycle engine.
//!
//! The engine never sends email, decides permissions, or reads business
//! entities itself. Host applications plug those capabilities in here.

pub mod authorizer;
pub mod notifier;
pub mod source;

pub use authorizer::Authorizer;
pub use notifier::{NoticeKind, Notifier, SigningNotice};
pub use source::SourceEntityGuard;
