// SPDX-FileCopyrightText: 2026 Trestle Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The single authorization checkpoint in front of every mutating operation.

use std::sync::Arc;

use tracing::warn;
use trestle_core::{Action, Actor, Authorizer, TrestleError};

/// Wraps the host's [`Authorizer`]. The controller calls [`Gate::check`]
/// once per mutating operation, before it reads or writes anything else.
#[derive(Clone)]
pub struct Gate {
    authorizer: Arc<dyn Authorizer>,
}

impl Gate {
    pub fn new(authorizer: Arc<dyn Authorizer>) -> Self {
        Self { authorizer }
    }

    pub async fn check(
        &self,
        actor: &Actor,
        action: Action,
        document_id: &str,
    ) -> Result<(), TrestleError> {
        match self.authorizer.authorize(actor, action, document_id).await {
            Ok(()) => Ok(()),
            Err(e) => {
                warn!(
                    user_id = %actor.user_id,
                    org_id = %actor.org_id,
                    %action,
                    document_id,
                    error = %e,
                    "operation denied"
                );
                Err(e)
            }
        }
    }
}

impl std::fmt::Debug for Gate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gate").finish_non_exhaustive()
    }
}
