// SPDX-FileCopyrightText: 2026 Trestle Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde attributes,
//! such as URL shape, non-empty paths, secret length, and window bounds.

use crate::diagnostic::ConfigError;
use crate::model::TrestleConfig;

/// Minimum secret length in bytes. HMAC-SHA256 keys shorter than the digest
/// weaken the construction.
pub const MIN_SECRET_LEN: usize = 32;

/// Longest signing window a new envelope may be given.
pub const MAX_EXPIRY_DAYS: u32 = 3650;

/// Longest lifetime of a download link.
pub const MAX_DOWNLOAD_TTL_SECS: u64 = 30 * 24 * 60 * 60;

/// Widest "expiring soon" window the hub accepts.
pub const MAX_EXPIRING_SOON_DAYS: u32 = 365;

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
///
/// Absent secrets are not a validation error: the engine can still run
/// read-side queries, and any operation that needs a secret fails with a
/// configuration error at that point.
pub fn validate_config(config: &TrestleConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    let base_url = config.app.base_url.trim();
    if base_url.is_empty() {
        errors.push(ConfigError::Validation {
            message: "app.base_url must not be empty".to_string(),
        });
    } else if !(base_url.starts_with("https://") || base_url.starts_with("http://")) {
        errors.push(ConfigError::Validation {
            message: format!("app.base_url `{base_url}` must start with http:// or https://"),
        });
    }

    if config.storage.database_path.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "storage.database_path must not be empty".to_string(),
        });
    }

    for (key, secret) in [
        ("signing.secret", &config.signing.secret),
        ("artifacts.secret", &config.artifacts.secret),
    ] {
        if let Some(secret) = secret {
            if secret.len() < MIN_SECRET_LEN {
                errors.push(ConfigError::Validation {
                    message: format!(
                        "{key} must be at least {MIN_SECRET_LEN} bytes, got {}",
                        secret.len()
                    ),
                });
            }
        }
    }

    if let (Some(signing), Some(artifacts)) = (&config.signing.secret, &config.artifacts.secret) {
        if signing == artifacts {
            errors.push(ConfigError::Validation {
                message: "artifacts.secret must differ from signing.secret".to_string(),
            });
        }
    }

    if config.signing.default_expiry_days < 1 {
        errors.push(ConfigError::Validation {
            message: "signing.default_expiry_days must be at least 1".to_string(),
        });
    } else if config.signing.default_expiry_days > MAX_EXPIRY_DAYS {
        errors.push(ConfigError::Validation {
            message: format!("signing.default_expiry_days must be at most {MAX_EXPIRY_DAYS}"),
        });
    }

    if config.artifacts.ttl_secs == 0 {
        errors.push(ConfigError::Validation {
            message: "artifacts.ttl_secs must be greater than 0".to_string(),
        });
    } else if config.artifacts.ttl_secs > MAX_DOWNLOAD_TTL_SECS {
        errors.push(ConfigError::Validation {
            message: format!("artifacts.ttl_secs must be at most {MAX_DOWNLOAD_TTL_SECS}"),
        });
    }

    if config.artifacts.max_uses < 1 {
        errors.push(ConfigError::Validation {
            message: "artifacts.max_uses must be at least 1".to_string(),
        });
    }

    if config.hub.expiring_soon_days > MAX_EXPIRING_SOON_DAYS {
        errors.push(ConfigError::Validation {
            message: format!("hub.expiring_soon_days must be at most {MAX_EXPIRING_SOON_DAYS}"),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
