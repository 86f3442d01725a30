// SPDX-FileCopyrightText: 2026 Trestle Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Log subscriber setup for host applications.
//!
//! The library crates only emit `tracing` events. A host that has no
//! subscriber of its own calls [`init_tracing`] once at startup.

use trestle_core::TrestleError;

/// Install a formatting subscriber filtered to `trestle={log_level},warn`.
///
/// `RUST_LOG` overrides the filter when set. Fails if a global subscriber
/// is already installed.
pub fn init_tracing(log_level: &str) -> Result<(), TrestleError> {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("trestle={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .try_init()
        .map_err(|e| TrestleError::Internal(format!("failed to install log subscriber: {e}")))
}
