// SPDX-FileCopyrightText: 2026 Trestle Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bounded-use download grants for executed files.

use rusqlite::params;
use trestle_core::{DownloadGrant, TrestleError};

use crate::database::{Database, map_tr_err};

fn grant_from_row(row: &rusqlite::Row<'_>) -> Result<DownloadGrant, rusqlite::Error> {
    Ok(DownloadGrant {
        token_hash: row.get(0)?,
        envelope_id: row.get(1)?,
        file_id: row.get(2)?,
        expires_at: row.get(3)?,
        max_uses: row.get(4)?,
        use_count: row.get(5)?,
        created_by: row.get(6)?,
        created_at: row.get(7)?,
    })
}

/// Persist a new grant.
pub async fn insert_grant(db: &Database, grant: &DownloadGrant) -> Result<(), TrestleError> {
    let grant = grant.clone();
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute(
                "INSERT INTO download_grants (token_hash, envelope_id, file_id, expires_at,
                     max_uses, use_count, created_by, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    grant.token_hash,
                    grant.envelope_id,
                    grant.file_id,
                    grant.expires_at,
                    grant.max_uses,
                    grant.use_count,
                    grant.created_by,
                    grant.created_at,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Get a grant by token digest.
pub async fn get_grant(
    db: &Database,
    token_hash: &str,
) -> Result<Option<DownloadGrant>, TrestleError> {
    let token_hash = token_hash.to_string();
    db.connection()
        .call(move |conn| -> Result<Option<DownloadGrant>, rusqlite::Error> {
            match conn.query_row(
                "SELECT token_hash, envelope_id, file_id, expires_at, max_uses, use_count,
                        created_by, created_at
                 FROM download_grants WHERE token_hash = ?1",
                params![token_hash],
                grant_from_row,
            ) {
                Ok(grant) => Ok(Some(grant)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(map_tr_err)
}

/// Spend one use of a grant that has not expired at `now`.
///
/// Returns `false` when the grant is exhausted or expired. Concurrent
/// redemptions can never push `use_count` past `max_uses`.
pub async fn consume_use(db: &Database, token_hash: &str, now: &str) -> Result<bool, TrestleError> {
    let token_hash = token_hash.to_string();
    let now = now.to_string();
    db.connection()
        .call(move |conn| -> Result<bool, rusqlite::Error> {
            let changed = conn.execute(
                "UPDATE download_grants SET use_count = use_count + 1
                 WHERE token_hash = ?1 AND use_count < max_uses AND expires_at > ?2",
                params![token_hash, now],
            )?;
            Ok(changed > 0)
        })
        .await
        .map_err(map_tr_err)
}
