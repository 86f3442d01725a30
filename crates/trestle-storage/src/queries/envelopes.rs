// SPDX-FileCopyrightText: 2026 Trestle Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Envelope persistence and conditional status transitions.
//!
//! Every status change is a compare-and-set: `UPDATE … WHERE status IN
//! (sources)`, where the sources come from
//! [`EnvelopeStatus::can_transition_to`]. The returned flag says whether this caller won the
//! transition. Side effects that must happen once (the `executed` event,
//! cascades) hang off a winning CAS and nothing else.

use rusqlite::{params, params_from_iter};
use trestle_core::{
    Envelope, EnvelopeStatus, Metadata, RequestStatus, SigningRequest, SourceEntity,
    TrestleError,
};

use crate::database::{Database, map_tr_err};
use crate::queries::signing_requests::insert_request_tx;
use crate::queries::{enum_col, json_col, json_text, opt_enum_col, placeholders};

const ENVELOPE_COLUMNS: &str = "id, document_id, project_id, source_kind, source_id, status, \
     subject, message, expires_at, sent_at, executed_at, voided_at, metadata, created_at, updated_at";

fn envelope_from_row(row: &rusqlite::Row<'_>) -> Result<Envelope, rusqlite::Error> {
    let source_kind = opt_enum_col(row, 3)?;
    let source_id: Option<String> = row.get(4)?;
    Ok(Envelope {
        id: row.get(0)?,
        document_id: row.get(1)?,
        project_id: row.get(2)?,
        source: match (source_kind, source_id) {
            (Some(kind), Some(id)) => Some(SourceEntity { kind, id }),
            _ => None,
        },
        status: enum_col(row, 5)?,
        subject: row.get(6)?,
        message: row.get(7)?,
        expires_at: row.get(8)?,
        sent_at: row.get(9)?,
        executed_at: row.get(10)?,
        voided_at: row.get(11)?,
        metadata: json_col(row, 12)?,
        created_at: row.get(13)?,
        updated_at: row.get(14)?,
    })
}

fn status_texts(statuses: &[EnvelopeStatus]) -> Vec<String> {
    statuses.iter().map(|s| s.to_string()).collect()
}

fn query_envelopes(
    conn: &rusqlite::Connection,
    sql: &str,
    args: Vec<String>,
) -> Result<Vec<Envelope>, rusqlite::Error> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params_from_iter(args), envelope_from_row)?;
    rows.collect()
}

fn insert_envelope_tx(
    conn: &rusqlite::Connection,
    envelope: &Envelope,
) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT INTO envelopes (id, document_id, project_id, source_kind, source_id, status,
             subject, message, expires_at, sent_at, executed_at, voided_at, metadata,
             created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
        params![
            envelope.id,
            envelope.document_id,
            envelope.project_id,
            envelope.source.as_ref().map(|s| s.kind.to_string()),
            envelope.source.as_ref().map(|s| s.id.clone()),
            envelope.status.to_string(),
            envelope.subject,
            envelope.message,
            envelope.expires_at,
            envelope.sent_at,
            envelope.executed_at,
            envelope.voided_at,
            json_text(&envelope.metadata)?,
            envelope.created_at,
            envelope.updated_at,
        ],
    )?;
    Ok(())
}

/// Insert a new envelope row.
pub async fn insert_envelope(db: &Database, envelope: &Envelope) -> Result<(), TrestleError> {
    let envelope = envelope.clone();
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> { insert_envelope_tx(conn, &envelope) })
        .await
        .map_err(map_tr_err)
}

/// Insert `envelope` only if its document has no live envelope yet.
///
/// Returns `false` (nothing written) when another live envelope exists.
pub async fn insert_if_no_live(db: &Database, envelope: &Envelope) -> Result<bool, TrestleError> {
    let envelope = envelope.clone();
    db.connection()
        .call(move |conn| -> Result<bool, rusqlite::Error> {
            let tx = conn.transaction()?;
            let live = status_texts(&EnvelopeStatus::LIVE);
            let sql = format!(
                "SELECT COUNT(*) FROM envelopes WHERE document_id = ? AND status IN ({})",
                placeholders(live.len())
            );
            let mut args = vec![envelope.document_id.clone()];
            args.extend(live);
            let existing: i64 = tx.query_row(&sql, params_from_iter(args), |row| row.get(0))?;
            if existing > 0 {
                return Ok(false);
            }
            insert_envelope_tx(&tx, &envelope)?;
            tx.commit()?;
            Ok(true)
        })
        .await
        .map_err(map_tr_err)
}

/// Get an envelope by ID.
pub async fn get_envelope(db: &Database, id: &str) -> Result<Option<Envelope>, TrestleError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| -> Result<Option<Envelope>, rusqlite::Error> {
            let sql = format!("SELECT {ENVELOPE_COLUMNS} FROM envelopes WHERE id = ?1");
            match conn.query_row(&sql, params![id], envelope_from_row) {
                Ok(envelope) => Ok(Some(envelope)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(map_tr_err)
}

/// Every envelope of a document, oldest first.
pub async fn list_for_document(
    db: &Database,
    document_id: &str,
) -> Result<Vec<Envelope>, TrestleError> {
    let document_id = document_id.to_string();
    db.connection()
        .call(move |conn| -> Result<Vec<Envelope>, rusqlite::Error> {
            let sql = format!(
                "SELECT {ENVELOPE_COLUMNS} FROM envelopes WHERE document_id = ?
                 ORDER BY created_at ASC, rowid ASC"
            );
            query_envelopes(conn, &sql, vec![document_id])
        })
        .await
        .map_err(map_tr_err)
}

/// The most recent live (draft, sent, partially signed) envelope of a document.
pub async fn find_live_for_document(
    db: &Database,
    document_id: &str,
) -> Result<Option<Envelope>, TrestleError> {
    let document_id = document_id.to_string();
    db.connection()
        .call(move |conn| -> Result<Option<Envelope>, rusqlite::Error> {
            let live = status_texts(&EnvelopeStatus::LIVE);
            let sql = format!(
                "SELECT {ENVELOPE_COLUMNS} FROM envelopes
                 WHERE document_id = ? AND status IN ({})
                 ORDER BY created_at DESC, rowid DESC LIMIT 1",
                placeholders(live.len())
            );
            let mut args = vec![document_id];
            args.extend(live);
            Ok(query_envelopes(conn, &sql, args)?.into_iter().next())
        })
        .await
        .map_err(map_tr_err)
}

/// Number of live envelopes for a document, optionally ignoring one envelope.
pub async fn count_live_for_document(
    db: &Database,
    document_id: &str,
    exclude_envelope: Option<&str>,
) -> Result<i64, TrestleError> {
    let document_id = document_id.to_string();
    let exclude = exclude_envelope.unwrap_or("").to_string();
    db.connection()
        .call(move |conn| -> Result<i64, rusqlite::Error> {
            let live = status_texts(&EnvelopeStatus::LIVE);
            let sql = format!(
                "SELECT COUNT(*) FROM envelopes
                 WHERE document_id = ? AND id != ? AND status IN ({})",
                placeholders(live.len())
            );
            let mut args = vec![document_id, exclude];
            args.extend(live);
            conn.query_row(&sql, params_from_iter(args), |row| row.get(0))
        })
        .await
        .map_err(map_tr_err)
}

/// Whether another envelope for the same source entity already executed.
pub async fn exists_executed_for_source(
    db: &Database,
    source: &SourceEntity,
    exclude_envelope: Option<&str>,
) -> Result<bool, TrestleError> {
    let kind = source.kind.to_string();
    let source_id = source.id.clone();
    let exclude = exclude_envelope.unwrap_or("").to_string();
    db.connection()
        .call(move |conn| -> Result<bool, rusqlite::Error> {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM envelopes
                 WHERE source_kind = ?1 AND source_id = ?2 AND id != ?3 AND status = 'executed'",
                params![kind, source_id, exclude],
                |row| row.get(0),
            )?;
            Ok(count > 0)
        })
        .await
        .map_err(map_tr_err)
}

/// Conditionally move an envelope to `to` from any status allowed to reach it.
///
/// Stamps `sent_at`, `executed_at`, or `voided_at` to match the target.
/// Returns `true` only for the caller whose update matched an allowed
/// prior status.
pub async fn transition(
    db: &Database,
    id: &str,
    to: EnvelopeStatus,
    at: &str,
) -> Result<bool, TrestleError> {
    let from = EnvelopeStatus::sources_of(to);
    if from.is_empty() {
        return Ok(false);
    }
    let id = id.to_string();
    let at = at.to_string();
    let from = status_texts(&from);
    db.connection()
        .call(move |conn| -> Result<bool, rusqlite::Error> {
            let stamp = match to {
                EnvelopeStatus::Sent => ", sent_at = ?",
                EnvelopeStatus::Executed => ", executed_at = ?",
                EnvelopeStatus::Voided => ", voided_at = ?",
                EnvelopeStatus::Draft
                | EnvelopeStatus::PartiallySigned
                | EnvelopeStatus::Expired => "",
            };
            let sql = format!(
                "UPDATE envelopes SET status = ?, updated_at = ?{stamp}
                 WHERE id = ? AND status IN ({})",
                placeholders(from.len())
            );
            let mut args = vec![to.to_string(), at.clone()];
            if !stamp.is_empty() {
                args.push(at);
            }
            args.push(id);
            args.extend(from);
            let changed = conn.execute(&sql, params_from_iter(args))?;
            Ok(changed > 0)
        })
        .await
        .map_err(map_tr_err)
}

/// Atomically move a draft envelope to `sent` and install its signing requests.
///
/// Leftover unissued requests from an earlier attempt are replaced. Returns
/// `false` (and writes nothing) when the envelope was no longer a draft.
pub async fn begin_sending(
    db: &Database,
    envelope_id: &str,
    requests: Vec<SigningRequest>,
    at: &str,
) -> Result<bool, TrestleError> {
    let envelope_id = envelope_id.to_string();
    let at = at.to_string();
    let from = status_texts(&EnvelopeStatus::sources_of(EnvelopeStatus::Sent));
    db.connection()
        .call(move |conn| -> Result<bool, rusqlite::Error> {
            let tx = conn.transaction()?;
            let sql = format!(
                "UPDATE envelopes SET status = ?, sent_at = ?, updated_at = ?
                 WHERE id = ? AND status IN ({})",
                placeholders(from.len())
            );
            let mut args = vec![
                EnvelopeStatus::Sent.to_string(),
                at.clone(),
                at.clone(),
                envelope_id.clone(),
            ];
            args.extend(from);
            let changed = tx.execute(&sql, params_from_iter(args))?;
            if changed == 0 {
                return Ok(false);
            }
            tx.execute(
                "DELETE FROM signing_requests WHERE envelope_id = ?1 AND status = 'draft'",
                params![envelope_id],
            )?;
            for request in &requests {
                insert_request_tx(&tx, request)?;
            }
            tx.commit()?;
            Ok(true)
        })
        .await
        .map_err(map_tr_err)
}

/// Update subject, message, and expiry of a draft. Returns `false` once the
/// envelope has left draft.
pub async fn update_draft_content(
    db: &Database,
    id: &str,
    subject: Option<String>,
    message: Option<String>,
    expires_at: Option<String>,
) -> Result<bool, TrestleError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| -> Result<bool, rusqlite::Error> {
            let changed = conn.execute(
                "UPDATE envelopes SET subject = COALESCE(?1, subject),
                     message = COALESCE(?2, message),
                     expires_at = COALESCE(?3, expires_at),
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?4 AND status = 'draft'",
                params![subject, message, expires_at, id],
            )?;
            Ok(changed > 0)
        })
        .await
        .map_err(map_tr_err)
}

/// Close a live envelope and every open request under it, in one transaction.
///
/// `to` is either [`EnvelopeStatus::Voided`] (from any live status) or
/// [`EnvelopeStatus::Expired`] (from sent or partially signed). Returns the
/// number of requests closed, or `None` when the envelope was not in a
/// status that allows the transition (someone else got there first).
pub async fn close_with_cascade(
    db: &Database,
    id: &str,
    to: EnvelopeStatus,
    at: &str,
    metadata_patch: Metadata,
) -> Result<Option<usize>, TrestleError> {
    let request_status = match to {
        EnvelopeStatus::Voided => RequestStatus::Voided,
        EnvelopeStatus::Expired => RequestStatus::Expired,
        other => {
            return Err(TrestleError::Internal(format!(
                "close_with_cascade cannot target {other}"
            )));
        }
    };
    let from = status_texts(&EnvelopeStatus::sources_of(to));
    let id = id.to_string();
    let at = at.to_string();
    db.connection()
        .call(move |conn| -> Result<Option<usize>, rusqlite::Error> {
            let tx = conn.transaction()?;
            let current = tx.query_row(
                "SELECT status, metadata FROM envelopes WHERE id = ?1",
                params![id],
                |row| Ok((row.get::<_, String>(0)?, json_col(row, 1)?)),
            );
            let (status, mut metadata) = match current {
                Ok(found) => found,
                Err(rusqlite::Error::QueryReturnedNoRows) => return Ok(None),
                Err(e) => return Err(e),
            };
            if !from.contains(&status) {
                return Ok(None);
            }
            metadata.extend(metadata_patch);

            let voided_at = (to == EnvelopeStatus::Voided).then(|| at.clone());
            tx.execute(
                "UPDATE envelopes SET status = ?1, metadata = ?2, updated_at = ?3,
                     voided_at = COALESCE(?4, voided_at)
                 WHERE id = ?5 AND status = ?6",
                params![to.to_string(), json_text(&metadata)?, at, voided_at, id, status],
            )?;

            let open: Vec<String> = RequestStatus::OPEN.iter().map(|s| s.to_string()).collect();
            let sql = format!(
                "UPDATE signing_requests SET status = ? WHERE envelope_id = ? AND status IN ({})",
                placeholders(open.len())
            );
            let mut args = vec![request_status.to_string(), id];
            args.extend(open);
            let closed = tx.execute(&sql, params_from_iter(args))?;
            tx.commit()?;
            Ok(Some(closed))
        })
        .await
        .map_err(map_tr_err)
}

/// In-flight envelopes whose advisory expiry is before `now`.
pub async fn list_expirable(db: &Database, now: &str) -> Result<Vec<Envelope>, TrestleError> {
    let now = now.to_string();
    db.connection()
        .call(move |conn| -> Result<Vec<Envelope>, rusqlite::Error> {
            let sql = format!(
                "SELECT {ENVELOPE_COLUMNS} FROM envelopes
                 WHERE status IN ('sent', 'partially_signed')
                   AND expires_at IS NOT NULL AND expires_at < ?
                 ORDER BY expires_at ASC"
            );
            query_envelopes(conn, &sql, vec![now])
        })
        .await
        .map_err(map_tr_err)
}

/// Live envelopes, optionally limited to one project, oldest first.
pub async fn list_live(
    db: &Database,
    project_id: Option<&str>,
) -> Result<Vec<Envelope>, TrestleError> {
    let project_id = project_id.map(|p| p.to_string());
    db.connection()
        .call(move |conn| -> Result<Vec<Envelope>, rusqlite::Error> {
            let live = status_texts(&EnvelopeStatus::LIVE);
            let mut sql = format!(
                "SELECT {ENVELOPE_COLUMNS} FROM envelopes WHERE status IN ({})",
                placeholders(live.len())
            );
            let mut args = live;
            if let Some(project_id) = project_id {
                sql.push_str(" AND project_id = ?");
                args.push(project_id);
            }
            sql.push_str(" ORDER BY created_at ASC, rowid ASC");
            query_envelopes(conn, &sql, args)
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::documents::insert_document;
    use crate::queries::fixtures::{
        make_document, make_envelope, make_request, seed_envelope, setup_db,
    };
    use crate::queries::signing_requests::{insert_requests, list_for_envelope};
    use trestle_core::SourceKind;
    use trestle_core::types::now_timestamp;

    #[tokio::test]
    async fn insert_and_get_envelope_roundtrips() {
        let (db, _dir) = setup_db().await;
        insert_document(&db, &make_document("doc-1")).await.unwrap();
        let mut envelope = make_envelope("env-1", "doc-1", EnvelopeStatus::Draft);
        envelope.source = Some(SourceEntity {
            kind: SourceKind::Proposal,
            id: "prop-7".to_string(),
        });
        envelope
            .metadata
            .insert("origin".to_string(), serde_json::json!("proposal"));
        insert_envelope(&db, &envelope).await.unwrap();

        let fetched = get_envelope(&db, "env-1").await.unwrap().unwrap();
        assert_eq!(fetched, envelope);
        assert!(get_envelope(&db, "nope").await.unwrap().is_none());
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn transition_is_compare_and_set() {
        let (db, _dir) = setup_db().await;
        seed_envelope(&db, EnvelopeStatus::Sent).await;
        let at = now_timestamp();

        let first = transition(&db, "env-1", EnvelopeStatus::Executed, &at)
            .await
            .unwrap();
        let second = transition(&db, "env-1", EnvelopeStatus::Executed, &at)
            .await
            .unwrap();
        assert!(first);
        assert!(!second);

        let envelope = get_envelope(&db, "env-1").await.unwrap().unwrap();
        assert_eq!(envelope.status, EnvelopeStatus::Executed);
        assert_eq!(envelope.executed_at.as_deref(), Some(at.as_str()));
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn transition_refuses_moves_outside_the_lifecycle() {
        let (db, _dir) = setup_db().await;
        seed_envelope(&db, EnvelopeStatus::Draft).await;
        let at = now_timestamp();

        assert!(!transition(&db, "env-1", EnvelopeStatus::Executed, &at).await.unwrap());
        assert!(!transition(&db, "env-1", EnvelopeStatus::PartiallySigned, &at).await.unwrap());
        assert!(!transition(&db, "env-1", EnvelopeStatus::Draft, &at).await.unwrap());
        assert!(transition(&db, "env-1", EnvelopeStatus::Sent, &at).await.unwrap());

        let envelope = get_envelope(&db, "env-1").await.unwrap().unwrap();
        assert_eq!(envelope.status, EnvelopeStatus::Sent);
        assert_eq!(envelope.sent_at.as_deref(), Some(at.as_str()));
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn live_envelope_lookup_and_count() {
        let (db, _dir) = setup_db().await;
        insert_document(&db, &make_document("doc-1")).await.unwrap();
        insert_envelope(&db, &make_envelope("old", "doc-1", EnvelopeStatus::Voided))
            .await
            .unwrap();
        insert_envelope(&db, &make_envelope("cur", "doc-1", EnvelopeStatus::Sent))
            .await
            .unwrap();

        let live = find_live_for_document(&db, "doc-1").await.unwrap().unwrap();
        assert_eq!(live.id, "cur");
        assert_eq!(count_live_for_document(&db, "doc-1", None).await.unwrap(), 1);
        assert_eq!(
            count_live_for_document(&db, "doc-1", Some("cur")).await.unwrap(),
            0
        );
        assert_eq!(list_for_document(&db, "doc-1").await.unwrap().len(), 2);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn conditional_insert_respects_live_envelope() {
        let (db, _dir) = setup_db().await;
        insert_document(&db, &make_document("doc-1")).await.unwrap();

        let first = make_envelope("a", "doc-1", EnvelopeStatus::Draft);
        let second = make_envelope("b", "doc-1", EnvelopeStatus::Draft);
        assert!(insert_if_no_live(&db, &first).await.unwrap());
        assert!(!insert_if_no_live(&db, &second).await.unwrap());
        assert!(get_envelope(&db, "b").await.unwrap().is_none());
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn begin_sending_installs_requests_once() {
        let (db, _dir) = setup_db().await;
        seed_envelope(&db, EnvelopeStatus::Draft).await;
        let requests = vec![
            make_request("r1", "env-1", 1, RequestStatus::Draft),
            make_request("r2", "env-1", 2, RequestStatus::Draft),
        ];

        assert!(begin_sending(&db, "env-1", requests.clone(), &now_timestamp()).await.unwrap());
        assert!(!begin_sending(&db, "env-1", requests, &now_timestamp()).await.unwrap());

        assert_eq!(list_for_envelope(&db, "env-1").await.unwrap().len(), 2);
        let envelope = get_envelope(&db, "env-1").await.unwrap().unwrap();
        assert_eq!(envelope.status, EnvelopeStatus::Sent);
        assert!(envelope.sent_at.is_some());
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn void_cascade_closes_open_requests_only() {
        let (db, _dir) = setup_db().await;
        seed_envelope(&db, EnvelopeStatus::PartiallySigned).await;
        insert_requests(
            &db,
            vec![
                make_request("signed", "env-1", 1, RequestStatus::Signed),
                make_request("sent", "env-1", 2, RequestStatus::Sent),
                make_request("draft", "env-1", 3, RequestStatus::Draft),
            ],
        )
        .await
        .unwrap();

        let mut patch = Metadata::new();
        patch.insert("void_reason".into(), serde_json::json!("wrong scope"));
        let closed = close_with_cascade(&db, "env-1", EnvelopeStatus::Voided, &now_timestamp(), patch)
            .await
            .unwrap();
        assert_eq!(closed, Some(2));

        let again = close_with_cascade(
            &db,
            "env-1",
            EnvelopeStatus::Voided,
            &now_timestamp(),
            Metadata::new(),
        )
        .await
        .unwrap();
        assert_eq!(again, None);

        let envelope = get_envelope(&db, "env-1").await.unwrap().unwrap();
        assert_eq!(envelope.status, EnvelopeStatus::Voided);
        assert!(envelope.voided_at.is_some());
        assert_eq!(envelope.metadata["void_reason"], "wrong scope");

        let statuses: Vec<RequestStatus> = list_for_envelope(&db, "env-1")
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.status)
            .collect();
        assert_eq!(
            statuses,
            vec![RequestStatus::Signed, RequestStatus::Voided, RequestStatus::Voided]
        );
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn expire_cascade_only_applies_in_flight() {
        let (db, _dir) = setup_db().await;
        seed_envelope(&db, EnvelopeStatus::Draft).await;
        let result =
            close_with_cascade(&db, "env-1", EnvelopeStatus::Expired, &now_timestamp(), Metadata::new())
                .await
                .unwrap();
        assert_eq!(result, None);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn executed_source_lookup() {
        let (db, _dir) = setup_db().await;
        insert_document(&db, &make_document("doc-1")).await.unwrap();
        let source = SourceEntity {
            kind: SourceKind::Proposal,
            id: "prop-1".to_string(),
        };
        let mut envelope = make_envelope("env-x", "doc-1", EnvelopeStatus::Executed);
        envelope.source = Some(source.clone());
        insert_envelope(&db, &envelope).await.unwrap();

        assert!(exists_executed_for_source(&db, &source, None).await.unwrap());
        assert!(!exists_executed_for_source(&db, &source, Some("env-x")).await.unwrap());
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn list_expirable_filters_on_expiry_and_status() {
        let (db, _dir) = setup_db().await;
        insert_document(&db, &make_document("doc-1")).await.unwrap();
        let mut overdue = make_envelope("overdue", "doc-1", EnvelopeStatus::Sent);
        overdue.expires_at = Some("2026-01-01T00:00:00.000Z".to_string());
        let mut future = make_envelope("future", "doc-1", EnvelopeStatus::Sent);
        future.expires_at = Some("2099-01-01T00:00:00.000Z".to_string());
        let mut draft = make_envelope("draft", "doc-1", EnvelopeStatus::Draft);
        draft.expires_at = Some("2026-01-01T00:00:00.000Z".to_string());
        for envelope in [&overdue, &future, &draft] {
            insert_envelope(&db, envelope).await.unwrap();
        }

        let found = list_expirable(&db, "2026-06-01T00:00:00.000Z").await.unwrap();
        let ids: Vec<&str> = found.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["overdue"]);
        db.close().await.unwrap();
    }
}
