// SPDX-FileCopyrightText: 2026 Trestle Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence layer for the Trestle signing engine.
//!
//! Provides WAL-mode SQLite storage with embedded migrations, a single-writer
//! concurrency model via `tokio-rusqlite`, and typed operations for
//! documents, envelopes, the recipient ledger, signing requests, the
//! append-only event log, and download grants.
//!
//! Status transitions are conditional updates that report whether they
//! won, so callers can build exactly-once side effects on top of them.

pub mod database;
pub mod migrations;
pub mod queries;

pub use database::Database;
