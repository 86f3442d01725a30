// SPDX-FileCopyrightText: 2026 Trestle Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Append-only envelope event log.
//!
//! There is no update or delete function here, and the schema's triggers
//! abort any attempt made with raw SQL.

use rusqlite::params;
use trestle_core::{EnvelopeEvent, EventType, TrestleError};

use crate::database::{Database, map_tr_err};
use crate::queries::{enum_col, json_col, json_text};

const EVENT_COLUMNS: &str = "id, envelope_id, document_id, actor_id, event_type, payload, created_at";

fn event_from_row(row: &rusqlite::Row<'_>) -> Result<EnvelopeEvent, rusqlite::Error> {
    Ok(EnvelopeEvent {
        id: row.get(0)?,
        envelope_id: row.get(1)?,
        document_id: row.get(2)?,
        actor_id: row.get(3)?,
        event_type: enum_col(row, 4)?,
        payload: json_col(row, 5)?,
        created_at: row.get(6)?,
    })
}

/// Append one event.
pub async fn append_event(db: &Database, event: &EnvelopeEvent) -> Result<(), TrestleError> {
    let event = event.clone();
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute(
                "INSERT INTO envelope_events (id, envelope_id, document_id, actor_id, event_type,
                     payload, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    event.id,
                    event.envelope_id,
                    event.document_id,
                    event.actor_id,
                    event.event_type.to_string(),
                    json_text(&event.payload)?,
                    event.created_at,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Every event of an envelope, oldest first.
pub async fn list_for_envelope(
    db: &Database,
    envelope_id: &str,
) -> Result<Vec<EnvelopeEvent>, TrestleError> {
    let envelope_id = envelope_id.to_string();
    db.connection()
        .call(move |conn| -> Result<Vec<EnvelopeEvent>, rusqlite::Error> {
            let sql = format!(
                "SELECT {EVENT_COLUMNS} FROM envelope_events WHERE envelope_id = ?1
                 ORDER BY created_at ASC, rowid ASC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params![envelope_id], event_from_row)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// Every event of a document across all its envelopes, oldest first.
pub async fn list_for_document(
    db: &Database,
    document_id: &str,
) -> Result<Vec<EnvelopeEvent>, TrestleError> {
    let document_id = document_id.to_string();
    db.connection()
        .call(move |conn| -> Result<Vec<EnvelopeEvent>, rusqlite::Error> {
            let sql = format!(
                "SELECT {EVENT_COLUMNS} FROM envelope_events WHERE document_id = ?1
                 ORDER BY created_at ASC, rowid ASC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params![document_id], event_from_row)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// Events of one type for an envelope, oldest first.
pub async fn list_by_type(
    db: &Database,
    envelope_id: &str,
    event_type: EventType,
) -> Result<Vec<EnvelopeEvent>, TrestleError> {
    let envelope_id = envelope_id.to_string();
    db.connection()
        .call(move |conn| -> Result<Vec<EnvelopeEvent>, rusqlite::Error> {
            let sql = format!(
                "SELECT {EVENT_COLUMNS} FROM envelope_events
                 WHERE envelope_id = ?1 AND event_type = ?2
                 ORDER BY created_at ASC, rowid ASC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows =
                stmt.query_map(params![envelope_id, event_type.to_string()], event_from_row)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// Number of events of one type for an envelope.
pub async fn count_for_envelope(
    db: &Database,
    envelope_id: &str,
    event_type: EventType,
) -> Result<i64, TrestleError> {
    let envelope_id = envelope_id.to_string();
    db.connection()
        .call(move |conn| -> Result<i64, rusqlite::Error> {
            conn.query_row(
                "SELECT COUNT(*) FROM envelope_events WHERE envelope_id = ?1 AND event_type = ?2",
                params![envelope_id, event_type.to_string()],
                |row| row.get(0),
            )
        })
        .await
        .map_err(map_tr_err)
}

/// Timestamp of the newest event for an envelope, if any.
pub async fn last_event_at(
    db: &Database,
    envelope_id: &str,
) -> Result<Option<String>, TrestleError> {
    let envelope_id = envelope_id.to_string();
    db.connection()
        .call(move |conn| -> Result<Option<String>, rusqlite::Error> {
            conn.query_row(
                "SELECT MAX(created_at) FROM envelope_events WHERE envelope_id = ?1",
                params![envelope_id],
                |row| row.get(0),
            )
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::fixtures::{seed_envelope, setup_db};
    use trestle_core::types::now_timestamp;
    use trestle_core::{EnvelopeStatus, Metadata};

    fn event(id: &str, event_type: EventType, created_at: &str) -> EnvelopeEvent {
        EnvelopeEvent {
            id: id.to_string(),
            envelope_id: Some("env-1".to_string()),
            document_id: "doc-1".to_string(),
            actor_id: Some("user-1".to_string()),
            event_type,
            payload: Metadata::new(),
            created_at: created_at.to_string(),
        }
    }

    #[tokio::test]
    async fn append_and_read_back() {
        let (db, _dir) = setup_db().await;
        seed_envelope(&db, EnvelopeStatus::Sent).await;

        let mut sent = event("e2", EventType::Sent, "2026-02-01T10:00:00.000Z");
        sent.payload.insert("sent_now".into(), serde_json::json!(2));
        append_event(&db, &event("e1", EventType::Created, "2026-02-01T09:00:00.000Z"))
            .await
            .unwrap();
        append_event(&db, &sent).await.unwrap();

        let all = list_for_envelope(&db, "env-1").await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].event_type, EventType::Created);
        assert_eq!(all[1].payload["sent_now"], 2);

        assert_eq!(count_for_envelope(&db, "env-1", EventType::Sent).await.unwrap(), 1);
        assert_eq!(list_by_type(&db, "env-1", EventType::Voided).await.unwrap().len(), 0);
        assert_eq!(list_for_document(&db, "doc-1").await.unwrap().len(), 2);
        assert_eq!(
            last_event_at(&db, "env-1").await.unwrap().as_deref(),
            Some("2026-02-01T10:00:00.000Z")
        );
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn events_cannot_be_rewritten() {
        let (db, _dir) = setup_db().await;
        seed_envelope(&db, EnvelopeStatus::Sent).await;
        append_event(&db, &event("e1", EventType::Sent, &now_timestamp()))
            .await
            .unwrap();

        let update = db
            .connection()
            .call(|conn| -> Result<usize, rusqlite::Error> {
                conn.execute("UPDATE envelope_events SET event_type = 'executed'", [])
            })
            .await;
        assert!(update.is_err());

        let delete = db
            .connection()
            .call(|conn| -> Result<usize, rusqlite::Error> {
                conn.execute("DELETE FROM envelope_events", [])
            })
            .await;
        assert!(delete.is_err());

        assert_eq!(count_for_envelope(&db, "env-1", EventType::Sent).await.unwrap(), 1);
        db.close().await.unwrap();
    }
}
