// SPDX-FileCopyrightText: 2026 Trestle Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Recipient ledger rows. The set for an envelope is always replaced whole.

use rusqlite::params;
use trestle_core::{Recipient, TrestleError};

use crate::database::{Database, map_tr_err};
use crate::queries::enum_col;

fn recipient_from_row(row: &rusqlite::Row<'_>) -> Result<Recipient, rusqlite::Error> {
    Ok(Recipient {
        id: row.get(0)?,
        envelope_id: row.get(1)?,
        recipient_type: enum_col(row, 2)?,
        contact_id: row.get(3)?,
        user_id: row.get(4)?,
        role: enum_col(row, 5)?,
        name: row.get(6)?,
        email: row.get(7)?,
        signer_role: row.get(8)?,
        sequence: row.get(9)?,
        required: row.get(10)?,
        position: row.get(11)?,
    })
}

/// Delete every recipient of an envelope and insert `recipients` in its place.
///
/// Runs in one transaction: readers see the old set or the new set, never a mix.
pub async fn replace_recipients(
    db: &Database,
    envelope_id: &str,
    recipients: Vec<Recipient>,
) -> Result<(), TrestleError> {
    let envelope_id = envelope_id.to_string();
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            let tx = conn.transaction()?;
            tx.execute(
                "DELETE FROM recipients WHERE envelope_id = ?1",
                params![envelope_id],
            )?;
            {
                let mut stmt = tx.prepare(
                    "INSERT INTO recipients (id, envelope_id, recipient_type, contact_id, user_id,
                         role, name, email, signer_role, sequence, required, position)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                )?;
                for r in &recipients {
                    stmt.execute(params![
                        r.id,
                        envelope_id,
                        r.recipient_type.to_string(),
                        r.contact_id,
                        r.user_id,
                        r.role.to_string(),
                        r.name,
                        r.email,
                        r.signer_role,
                        r.sequence,
                        r.required,
                        r.position,
                    ])?;
                }
            }
            tx.commit()
        })
        .await
        .map_err(map_tr_err)
}

/// Recipients of an envelope in the order they were supplied.
pub async fn list_recipients(
    db: &Database,
    envelope_id: &str,
) -> Result<Vec<Recipient>, TrestleError> {
    let envelope_id = envelope_id.to_string();
    db.connection()
        .call(move |conn| -> Result<Vec<Recipient>, rusqlite::Error> {
            let mut stmt = conn.prepare(
                "SELECT id, envelope_id, recipient_type, contact_id, user_id, role, name, email,
                        signer_role, sequence, required, position
                 FROM recipients WHERE envelope_id = ?1
                 ORDER BY position ASC",
            )?;
            let rows = stmt.query_map(params![envelope_id], recipient_from_row)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}
