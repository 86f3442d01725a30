// SPDX-FileCopyrightText: 2026 Trestle Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Enforcement boundary for the host application's permission policy.

use async_trait::async_trait;

use crate::error::TrestleError;
use crate::types::{Action, Actor};

/// Decides whether an actor may perform an action on a document.
///
/// Implementations return [`TrestleError::Forbidden`] to deny. The policy
/// itself (org scoping, roles) lives in the host application.
#[async_trait]
pub trait Authorizer: Send + Sync + 'static {
    async fn authorize(
        &self,
        actor: &Actor,
        action: Action,
        document_id: &str,
    ) -> Result<(), TrestleError>;
}
