// SPDX-FileCopyrightText: 2026 Trestle Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Query modules for the signing entities.

pub mod documents;
pub mod envelopes;
pub mod events;
pub mod grants;
pub mod recipients;
pub mod signing_requests;

use std::str::FromStr;

use rusqlite::types::Type;
use trestle_core::Metadata;

/// Read a TEXT column holding an enum's snake_case form.
pub(crate) fn enum_col<T>(row: &rusqlite::Row<'_>, idx: usize) -> Result<T, rusqlite::Error>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let text: String = row.get(idx)?;
    text.parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Read a nullable TEXT column holding an enum's snake_case form.
pub(crate) fn opt_enum_col<T>(
    row: &rusqlite::Row<'_>,
    idx: usize,
) -> Result<Option<T>, rusqlite::Error>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let text: Option<String> = row.get(idx)?;
    text.map(|t| {
        t.parse()
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
    })
    .transpose()
}

/// Read a TEXT column holding a JSON object.
pub(crate) fn json_col(row: &rusqlite::Row<'_>, idx: usize) -> Result<Metadata, rusqlite::Error> {
    let text: String = row.get(idx)?;
    serde_json::from_str(&text)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Encode a JSON object for a TEXT column.
pub(crate) fn json_text(value: &Metadata) -> Result<String, rusqlite::Error> {
    serde_json::to_string(value).map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))
}

/// `?, ?, ?` placeholder list for an `IN (...)` clause.
pub(crate) fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}
