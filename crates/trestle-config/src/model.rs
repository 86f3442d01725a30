// SPDX-FileCopyrightText: 2026 Trestle Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Trestle signing engine.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use serde::{Deserialize, Serialize};

/// Top-level Trestle configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values, except the
/// secrets, which have no default.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TrestleConfig {
    /// Application URL and logging.
    #[serde(default)]
    pub app: AppConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Signing-link token settings.
    #[serde(default)]
    pub signing: SigningConfig,

    /// Executed-file download token settings.
    #[serde(default)]
    pub artifacts: ArtifactConfig,

    /// Signature hub projection settings.
    #[serde(default)]
    pub hub: HubConfig,
}

/// Application-level configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Public base URL that signing and download links are built on.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            log_level: default_log_level(),
        }
    }
}

impl AppConfig {
    /// Base URL without a trailing slash, ready for path joining.
    pub fn base_url_trimmed(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }
}

fn default_base_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("trestle").join("trestle.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("trestle.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_wal_mode() -> bool {
    true
}

/// Signing-link configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SigningConfig {
    /// HMAC secret for signing-link digests. `None` means unprovisioned:
    /// every operation that issues a link fails with a configuration error.
    #[serde(default)]
    pub secret: Option<String>,

    /// Expiry applied to new envelopes when the caller does not pass one.
    #[serde(default = "default_expiry_days")]
    pub default_expiry_days: u32,
}

impl Default for SigningConfig {
    fn default() -> Self {
        Self {
            secret: None,
            default_expiry_days: default_expiry_days(),
        }
    }
}

fn default_expiry_days() -> u32 {
    30
}

/// Executed-file download configuration.
///
/// Download tokens live in their own namespace: separate secret, TTL, and
/// use budget from signing links.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ArtifactConfig {
    /// HMAC secret for download-token digests.
    #[serde(default)]
    pub secret: Option<String>,

    /// Lifetime of a download link in seconds.
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,

    /// How many times one download link may be redeemed.
    #[serde(default = "default_max_uses")]
    pub max_uses: u32,
}

impl Default for ArtifactConfig {
    fn default() -> Self {
        Self {
            secret: None,
            ttl_secs: default_ttl_secs(),
            max_uses: default_max_uses(),
        }
    }
}

fn default_ttl_secs() -> u64 {
    3600
}

fn default_max_uses() -> u32 {
    3
}

/// Signature hub configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct HubConfig {
    /// Envelopes expiring within this many days are flagged `expiring_soon`.
    #[serde(default = "default_expiring_soon_days")]
    pub expiring_soon_days: u32,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            expiring_soon_days: default_expiring_soon_days(),
        }
    }
}

fn default_expiring_soon_days() -> u32 {
    3
}
