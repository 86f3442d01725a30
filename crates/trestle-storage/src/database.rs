// SPDX-FileCopyrightText: 2026 Trestle Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database connection management with PRAGMA setup, WAL mode, and lifecycle.
//!
//! `Database` wraps the single `tokio_rusqlite::Connection` every query goes
//! through. tokio-rusqlite runs each `call` closure on one background
//! thread, so writes are serialized and never hit SQLITE_BUSY. Do NOT open
//! additional connections for writes.
//!
//! Serialized writes do not make multi-call operations atomic. Lifecycle
//! transitions still use conditional updates (see `queries::envelopes`).

use std::path::Path;

use tracing::debug;
use trestle_config::model::StorageConfig;
use trestle_core::TrestleError;

use crate::migrations;

/// Handle to the signing database.
#[derive(Clone)]
pub struct Database {
    conn: tokio_rusqlite::Connection,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").finish_non_exhaustive()
    }
}

impl Database {
    /// Open (creating if needed) the database at `path` in WAL mode and run
    /// pending migrations.
    pub async fn open(path: &str) -> Result<Self, TrestleError> {
        Self::open_with(path, true).await
    }

    /// Open the database described by a [`StorageConfig`].
    pub async fn open_with_config(config: &StorageConfig) -> Result<Self, TrestleError> {
        Self::open_with(&config.database_path, config.wal_mode).await
    }

    async fn open_with(path: &str, wal_mode: bool) -> Result<Self, TrestleError> {
        if let Some(parent) = Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| TrestleError::Storage {
                    source: Box::new(e),
                })?;
            }
        }

        // Migrations need a plain rusqlite connection; run them off the runtime.
        let migrate_path = path.to_string();
        tokio::task::spawn_blocking(move || -> Result<(), TrestleError> {
            let mut conn = rusqlite::Connection::open(&migrate_path).map_err(storage_err)?;
            let journal = if wal_mode { "WAL" } else { "DELETE" };
            conn.execute_batch(&format!("PRAGMA journal_mode = {journal};"))
                .map_err(storage_err)?;
            migrations::run_migrations(&mut conn)
        })
        .await
        .map_err(|e| TrestleError::Internal(format!("migration task failed: {e}")))??;

        let conn = tokio_rusqlite::Connection::open(path)
            .await
            .map_err(|e| TrestleError::Storage {
                source: Box::new(e),
            })?;
        conn.call(|conn| -> Result<(), rusqlite::Error> {
            conn.execute_batch(
                "PRAGMA foreign_keys = ON;
                 PRAGMA busy_timeout = 5000;
                 PRAGMA synchronous = NORMAL;",
            )
        })
        .await
        .map_err(map_tr_err)?;

        debug!(path, wal_mode, "signing database opened");
        Ok(Self { conn })
    }

    /// The shared connection all query modules call through.
    pub fn connection(&self) -> &tokio_rusqlite::Connection {
        &self.conn
    }

    /// Checkpoint the WAL so the database file is self-contained.
    pub async fn close(&self) -> Result<(), TrestleError> {
        self.conn
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")
            })
            .await
            .map_err(map_tr_err)?;
        debug!("WAL checkpoint complete");
        Ok(())
    }
}

fn storage_err(e: rusqlite::Error) -> TrestleError {
    TrestleError::Storage {
        source: Box::new(e),
    }
}

/// Convert a tokio-rusqlite error into [`TrestleError::Storage`].
pub(crate) fn map_tr_err(e: tokio_rusqlite::Error<rusqlite::Error>) -> TrestleError {
    TrestleError::Storage {
        source: Box::new(e),
    }
}
