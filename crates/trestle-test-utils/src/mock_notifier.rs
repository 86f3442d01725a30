// SPDX-FileCopyrightText: 2026 Trestle Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock notifier for deterministic testing.
//!
//! `MockNotifier` implements `Notifier` by capturing every notice, so tests
//! can read back the cleartext links. Deliveries to chosen addresses can be
//! made to fail.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use trestle_core::{NoticeKind, Notifier, SigningNotice, TrestleError};

/// A mock notifier that records deliveries.
#[derive(Clone, Default)]
pub struct MockNotifier {
    delivered: Arc<Mutex<Vec<SigningNotice>>>,
    failing: Arc<Mutex<HashSet<String>>>,
}

impl MockNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every delivery to `email` fail until [`MockNotifier::recover`].
    pub async fn fail_for(&self, email: &str) {
        self.failing.lock().await.insert(email.to_lowercase());
    }

    pub async fn recover(&self, email: &str) {
        self.failing.lock().await.remove(&email.to_lowercase());
    }

    /// All notices delivered so far, in delivery order.
    pub async fn delivered(&self) -> Vec<SigningNotice> {
        self.delivered.lock().await.clone()
    }

    pub async fn delivered_count(&self) -> usize {
        self.delivered.lock().await.len()
    }

    /// Notices delivered to one address.
    pub async fn delivered_to(&self, email: &str) -> Vec<SigningNotice> {
        self.delivered
            .lock()
            .await
            .iter()
            .filter(|n| n.to_email == email)
            .cloned()
            .collect()
    }

    /// The cleartext token from the newest link delivered to `email`.
    pub async fn latest_token(&self, email: &str) -> Option<String> {
        self.delivered_to(email)
            .await
            .last()
            .and_then(|n| n.link.rsplit('/').next().map(|t| t.to_string()))
    }

    /// How many reminders were delivered.
    pub async fn reminder_count(&self) -> usize {
        self.delivered
            .lock()
            .await
            .iter()
            .filter(|n| n.kind == NoticeKind::Reminder)
            .count()
    }
}

#[async_trait]
impl Notifier for MockNotifier {
    async fn deliver(&self, notice: &SigningNotice) -> Result<(), TrestleError> {
        if self.failing.lock().await.contains(&notice.to_email) {
            return Err(TrestleError::Notification {
                message: format!("mock delivery to {} failed", notice.to_email),
                source: None,
            });
        }
        self.delivered.lock().await.push(notice.clone());
        Ok(())
    }
}
