// SPDX-FileCopyrightText: 2026 Trestle Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./trestle.toml` > `~/.config/trestle/trestle.toml` > `/etc/trestle/trestle.toml`
//! with environment variable overrides via `TRESTLE_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::TrestleConfig;

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/trestle/trestle.toml` (system-wide)
/// 3. `~/.config/trestle/trestle.toml` (user XDG config)
/// 4. `./trestle.toml` (local directory)
/// 5. `TRESTLE_*` environment variables
pub fn load_config() -> Result<TrestleConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env).
///
/// Used for testing and explicit configuration.
pub fn load_config_from_str(toml_content: &str) -> Result<TrestleConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(TrestleConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<TrestleConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(TrestleConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used internally for config loading (exposed for diagnostic use).
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(TrestleConfig::default()))
        .merge(Toml::file("/etc/trestle/trestle.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("trestle/trestle.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("trestle.toml"))
        .merge(env_provider())
}

/// Environment provider with explicit section-to-dot mapping.
///
/// Uses `Env::map()` rather than `Env::split("_")`: key names contain
/// underscores, so `TRESTLE_SIGNING_DEFAULT_EXPIRY_DAYS` must map to
/// `signing.default_expiry_days`, not `signing.default.expiry.days`.
/// Figment hands the key over with its original case, so it is lowercased
/// before the section prefix is matched.
pub(crate) fn env_provider() -> Env {
    Env::prefixed("TRESTLE_").map(|key| {
        let key_str = key.as_str().to_ascii_lowercase();
        let mapped = key_str
            .replacen("app_", "app.", 1)
            .replacen("storage_", "storage.", 1)
            .replacen("signing_", "signing.", 1)
            .replacen("artifacts_", "artifacts.", 1)
            .replacen("hub_", "hub.", 1);
        mapped.into()
    })
}
