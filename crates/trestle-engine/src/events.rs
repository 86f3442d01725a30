// SPDX-FileCopyrightText: 2026 Trestle Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Event recorder over the append-only envelope log.
//!
//! The recorder never decides whether an event should be written. Exactly-once
//! events (`executed`) are only recorded by the caller that won the envelope
//! status transition.

use tracing::info;
use trestle_core::types::now_timestamp;
use trestle_core::{EnvelopeEvent, EventType, Metadata, TrestleError};
use trestle_storage::Database;
use trestle_storage::queries::events;

#[derive(Debug, Clone)]
pub struct EventRecorder {
    db: Database,
}

impl EventRecorder {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Append one event and return it.
    pub async fn record(
        &self,
        event_type: EventType,
        envelope_id: Option<&str>,
        document_id: &str,
        actor_id: Option<&str>,
        payload: Metadata,
    ) -> Result<EnvelopeEvent, TrestleError> {
        let event = EnvelopeEvent {
            id: uuid::Uuid::new_v4().to_string(),
            envelope_id: envelope_id.map(|s| s.to_string()),
            document_id: document_id.to_string(),
            actor_id: actor_id.map(|s| s.to_string()),
            event_type,
            payload,
            created_at: now_timestamp(),
        };
        events::append_event(&self.db, &event).await?;
        info!(
            event_id = %event.id,
            %event_type,
            envelope_id = envelope_id.unwrap_or("-"),
            document_id,
            "envelope event recorded"
        );
        Ok(event)
    }

    pub async fn list_for_envelope(
        &self,
        envelope_id: &str,
    ) -> Result<Vec<EnvelopeEvent>, TrestleError> {
        events::list_for_envelope(&self.db, envelope_id).await
    }

    pub async fn list_for_document(
        &self,
        document_id: &str,
    ) -> Result<Vec<EnvelopeEvent>, TrestleError> {
        events::list_for_document(&self.db, document_id).await
    }

    pub async fn list_by_type(
        &self,
        envelope_id: &str,
        event_type: EventType,
    ) -> Result<Vec<EnvelopeEvent>, TrestleError> {
        events::list_by_type(&self.db, envelope_id, event_type).await
    }

    pub async fn count_for_envelope(
        &self,
        envelope_id: &str,
        event_type: EventType,
    ) -> Result<i64, TrestleError> {
        events::count_for_envelope(&self.db, envelope_id, event_type).await
    }

    /// Timestamp of the newest event on an envelope.
    pub async fn last_event_at(&self, envelope_id: &str) -> Result<Option<String>, TrestleError> {
        events::last_event_at(&self.db, envelope_id).await
    }
}

/// Build a payload object from `(key, value)` pairs.
pub(crate) fn payload<const N: usize>(entries: [(&str, serde_json::Value); N]) -> Metadata {
    entries
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}
