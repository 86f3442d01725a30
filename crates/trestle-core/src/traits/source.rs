// SPDX-FileCopyrightText: 2026 Trestle Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Cross-entity checks against the business record an envelope was created for.

use async_trait::async_trait;

use crate::error::TrestleError;
use crate::types::SourceEntity;

/// Reports the state of the source entity (proposal, change order, ...).
#[async_trait]
pub trait SourceEntityGuard: Send + Sync + 'static {
    /// Whether the entity has already been accepted outside of this envelope.
    ///
    /// An accepted proposal must not go out for signature again.
    async fn is_accepted(&self, source: &SourceEntity) -> Result<bool, TrestleError>;
}
