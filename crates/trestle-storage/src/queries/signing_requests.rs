// SPDX-FileCopyrightText: 2026 Trestle Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Signing request persistence.
//!
//! Request status moves through conditional updates only, like envelopes.
//! The cleartext signing token never reaches this module; only its digest.

use rusqlite::params;
use trestle_core::{SequenceGroup, SigningRequest, TrestleError};

use crate::database::{Database, map_tr_err};
use crate::queries::enum_col;

const REQUEST_COLUMNS: &str = "id, envelope_id, group_id, document_id, recipient_id, sequence, \
     required, status, sent_to_email, signer_name, signer_role, token_hash, sent_at, viewed_at, \
     signed_at, signed_file_id, created_at";

fn request_from_row(row: &rusqlite::Row<'_>) -> Result<SigningRequest, rusqlite::Error> {
    Ok(SigningRequest {
        id: row.get(0)?,
        envelope_id: row.get(1)?,
        group_id: row.get(2)?,
        document_id: row.get(3)?,
        recipient_id: row.get(4)?,
        sequence: row.get(5)?,
        required: row.get(6)?,
        status: enum_col(row, 7)?,
        sent_to_email: row.get(8)?,
        signer_name: row.get(9)?,
        signer_role: row.get(10)?,
        token_hash: row.get(11)?,
        sent_at: row.get(12)?,
        viewed_at: row.get(13)?,
        signed_at: row.get(14)?,
        signed_file_id: row.get(15)?,
        created_at: row.get(16)?,
    })
}

/// Insert one request on an already-open connection or transaction.
pub(crate) fn insert_request_tx(
    conn: &rusqlite::Connection,
    request: &SigningRequest,
) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT INTO signing_requests (id, envelope_id, group_id, document_id, recipient_id,
             sequence, required, status, sent_to_email, signer_name, signer_role, token_hash,
             sent_at, viewed_at, signed_at, signed_file_id, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
        params![
            request.id,
            request.envelope_id,
            request.group_id,
            request.document_id,
            request.recipient_id,
            request.sequence,
            request.required,
            request.status.to_string(),
            request.sent_to_email,
            request.signer_name,
            request.signer_role,
            request.token_hash,
            request.sent_at,
            request.viewed_at,
            request.signed_at,
            request.signed_file_id,
            request.created_at,
        ],
    )?;
    Ok(())
}

fn query_requests(
    conn: &rusqlite::Connection,
    filter: &str,
    key: String,
) -> Result<Vec<SigningRequest>, rusqlite::Error> {
    let sql = format!(
        "SELECT {REQUEST_COLUMNS} FROM signing_requests WHERE {filter}
         ORDER BY sequence ASC, rowid ASC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![key], request_from_row)?;
    rows.collect()
}

fn query_one(
    conn: &rusqlite::Connection,
    filter: &str,
    key: String,
) -> Result<Option<SigningRequest>, rusqlite::Error> {
    let sql = format!("SELECT {REQUEST_COLUMNS} FROM signing_requests WHERE {filter}");
    match conn.query_row(&sql, params![key], request_from_row) {
        Ok(request) => Ok(Some(request)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Insert a batch of requests in one transaction.
pub async fn insert_requests(
    db: &Database,
    requests: Vec<SigningRequest>,
) -> Result<(), TrestleError> {
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            let tx = conn.transaction()?;
            for request in &requests {
                insert_request_tx(&tx, request)?;
            }
            tx.commit()
        })
        .await
        .map_err(map_tr_err)
}

/// Get a signing request by ID.
pub async fn get_request(db: &Database, id: &str) -> Result<Option<SigningRequest>, TrestleError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| -> Result<Option<SigningRequest>, rusqlite::Error> {
            query_one(conn, "id = ?1", id)
        })
        .await
        .map_err(map_tr_err)
}

/// Look up the request currently holding a token digest.
pub async fn find_by_token_hash(
    db: &Database,
    token_hash: &str,
) -> Result<Option<SigningRequest>, TrestleError> {
    let token_hash = token_hash.to_string();
    db.connection()
        .call(move |conn| -> Result<Option<SigningRequest>, rusqlite::Error> {
            query_one(conn, "token_hash = ?1", token_hash)
        })
        .await
        .map_err(map_tr_err)
}

/// All requests of an envelope, in sequence order.
pub async fn list_for_envelope(
    db: &Database,
    envelope_id: &str,
) -> Result<Vec<SigningRequest>, TrestleError> {
    let envelope_id = envelope_id.to_string();
    db.connection()
        .call(move |conn| -> Result<Vec<SigningRequest>, rusqlite::Error> {
            query_requests(conn, "envelope_id = ?1", envelope_id)
        })
        .await
        .map_err(map_tr_err)
}

/// All requests sharing a legacy group id and no envelope.
pub async fn list_for_group(
    db: &Database,
    group_id: &str,
) -> Result<Vec<SigningRequest>, TrestleError> {
    let group_id = group_id.to_string();
    db.connection()
        .call(move |conn| -> Result<Vec<SigningRequest>, rusqlite::Error> {
            query_requests(conn, "group_id = ?1 AND envelope_id IS NULL", group_id)
        })
        .await
        .map_err(map_tr_err)
}

/// Fresh rows for whichever group a request sequences with.
pub async fn list_for_sequence_group(
    db: &Database,
    group: &SequenceGroup,
) -> Result<Vec<SigningRequest>, TrestleError> {
    match group {
        SequenceGroup::Envelope(envelope_id) => list_for_envelope(db, envelope_id).await,
        SequenceGroup::Legacy(group_id) => list_for_group(db, group_id).await,
    }
}

/// Store a fresh token digest on a request, replacing any previous one.
///
/// With `mark_sent` this is the first issue: it only applies to a `draft`
/// request, which moves to `sent`, so two callers racing to issue the same
/// request cannot both win. Without it (reminders) any open request takes
/// the new digest. `sent_at` is always restamped.
pub async fn store_token(
    db: &Database,
    id: &str,
    token_hash: &str,
    mark_sent: bool,
    at: &str,
) -> Result<bool, TrestleError> {
    let id = id.to_string();
    let token_hash = token_hash.to_string();
    let at = at.to_string();
    db.connection()
        .call(move |conn| -> Result<bool, rusqlite::Error> {
            let changed = conn.execute(
                "UPDATE signing_requests
                 SET token_hash = ?1, sent_at = ?2,
                     status = CASE WHEN ?3 THEN 'sent' ELSE status END
                 WHERE id = ?4
                   AND ((?3 AND status = 'draft')
                        OR (NOT ?3 AND status IN ('draft', 'sent', 'viewed')))",
                params![token_hash, at, mark_sent, id],
            )?;
            Ok(changed > 0)
        })
        .await
        .map_err(map_tr_err)
}

/// First view of a signing link: `sent` to `viewed`.
pub async fn mark_viewed(db: &Database, id: &str, at: &str) -> Result<bool, TrestleError> {
    let id = id.to_string();
    let at = at.to_string();
    db.connection()
        .call(move |conn| -> Result<bool, rusqlite::Error> {
            let changed = conn.execute(
                "UPDATE signing_requests SET status = 'viewed', viewed_at = ?1
                 WHERE id = ?2 AND status = 'sent'",
                params![at, id],
            )?;
            Ok(changed > 0)
        })
        .await
        .map_err(map_tr_err)
}

/// Record a signature. Only one caller can win for a given request.
pub async fn mark_signed(
    db: &Database,
    id: &str,
    signed_file_id: Option<&str>,
    at: &str,
) -> Result<bool, TrestleError> {
    let id = id.to_string();
    let signed_file_id = signed_file_id.map(|s| s.to_string());
    let at = at.to_string();
    db.connection()
        .call(move |conn| -> Result<bool, rusqlite::Error> {
            let changed = conn.execute(
                "UPDATE signing_requests
                 SET status = 'signed', signed_at = ?1,
                     signed_file_id = COALESCE(?2, signed_file_id)
                 WHERE id = ?3 AND status IN ('sent', 'viewed')",
                params![at, signed_file_id, id],
            )?;
            Ok(changed > 0)
        })
        .await
        .map_err(map_tr_err)
}
