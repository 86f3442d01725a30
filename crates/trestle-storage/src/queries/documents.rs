// SPDX-FileCopyrightText: 2026 Trestle Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Document reads and the two fields the signing engine writes back.

use rusqlite::params;
use trestle_core::{Document, DocumentStatus, TrestleError};

use crate::database::{Database, map_tr_err};
use crate::queries::enum_col;

const DOCUMENT_COLUMNS: &str =
    "id, project_id, title, status, executed_file_id, created_at, updated_at";

fn document_from_row(row: &rusqlite::Row<'_>) -> Result<Document, rusqlite::Error> {
    Ok(Document {
        id: row.get(0)?,
        project_id: row.get(1)?,
        title: row.get(2)?,
        status: enum_col(row, 3)?,
        executed_file_id: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

/// Insert a document record.
pub async fn insert_document(db: &Database, document: &Document) -> Result<(), TrestleError> {
    let document = document.clone();
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute(
                "INSERT INTO documents (id, project_id, title, status, executed_file_id, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    document.id,
                    document.project_id,
                    document.title,
                    document.status.to_string(),
                    document.executed_file_id,
                    document.created_at,
                    document.updated_at,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Get a document by ID.
pub async fn get_document(db: &Database, id: &str) -> Result<Option<Document>, TrestleError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| -> Result<Option<Document>, rusqlite::Error> {
            let sql = format!("SELECT {DOCUMENT_COLUMNS} FROM documents WHERE id = ?1");
            match conn.query_row(&sql, params![id], document_from_row) {
                Ok(document) => Ok(Some(document)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(map_tr_err)
}

/// Set a document's signing status. Returns whether the row changed.
///
/// An executed document keeps its status: a late void of an older
/// envelope must not overwrite it.
pub async fn set_document_status(
    db: &Database,
    id: &str,
    status: DocumentStatus,
) -> Result<bool, TrestleError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| -> Result<bool, rusqlite::Error> {
            let changed = conn.execute(
                "UPDATE documents SET status = ?1, updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?2 AND status != 'executed' AND status != ?1",
                params![status.to_string(), id],
            )?;
            Ok(changed > 0)
        })
        .await
        .map_err(map_tr_err)
}

/// Record the final signed file on the document.
pub async fn set_executed_file(
    db: &Database,
    id: &str,
    file_id: &str,
) -> Result<(), TrestleError> {
    let id = id.to_string();
    let file_id = file_id.to_string();
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute(
                "UPDATE documents SET executed_file_id = ?1,
                 updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?2",
                params![file_id, id],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}
