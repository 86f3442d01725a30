// SPDX-FileCopyrightText: 2026 Trestle Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock authorizer and source-entity guard.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use trestle_core::{Action, Actor, Authorizer, SourceEntity, SourceEntityGuard, TrestleError};

/// Allows everything except the configured deny rules.
///
/// A rule matches on user id and, optionally, one action.
#[derive(Clone, Default)]
pub struct MockAuthorizer {
    denied: Arc<Mutex<Vec<(String, Option<Action>)>>>,
    checks: Arc<Mutex<Vec<(String, Action, String)>>>,
}

impl MockAuthorizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deny every action for `user_id`.
    pub async fn deny_user(&self, user_id: &str) {
        self.denied.lock().await.push((user_id.to_string(), None));
    }

    /// Deny one action for `user_id`.
    pub async fn deny(&self, user_id: &str, action: Action) {
        self.denied
            .lock()
            .await
            .push((user_id.to_string(), Some(action)));
    }

    /// Every `(user_id, action, document_id)` the gate asked about.
    pub async fn checks(&self) -> Vec<(String, Action, String)> {
        self.checks.lock().await.clone()
    }
}

#[async_trait]
impl Authorizer for MockAuthorizer {
    async fn authorize(
        &self,
        actor: &Actor,
        action: Action,
        document_id: &str,
    ) -> Result<(), TrestleError> {
        self.checks
            .lock()
            .await
            .push((actor.user_id.clone(), action, document_id.to_string()));
        let denied = self.denied.lock().await.iter().any(|(user, rule)| {
            *user == actor.user_id && rule.is_none_or(|denied| denied == action)
        });
        if denied {
            return Err(TrestleError::Forbidden(format!(
                "{} may not {action} on {document_id}",
                actor.user_id
            )));
        }
        Ok(())
    }
}

/// Source entities marked accepted by the test.
#[derive(Clone, Default)]
pub struct MockSourceGuard {
    accepted: Arc<Mutex<HashSet<(String, String)>>>,
}

impl MockSourceGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn accept(&self, source: &SourceEntity) {
        self.accepted
            .lock()
            .await
            .insert((source.kind.to_string(), source.id.clone()));
    }
}

#[async_trait]
impl SourceEntityGuard for MockSourceGuard {
    async fn is_accepted(&self, source: &SourceEntity) -> Result<bool, TrestleError> {
        Ok(self
            .accepted
            .lock()
            .await
            .contains(&(source.kind.to_string(), source.id.clone())))
    }
}
