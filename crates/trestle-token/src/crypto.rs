// SPDX-FileCopyrightText: 2026 Trestle Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Token minting, digesting, and constant-time verification.
//!
//! A token is 32 bytes from the system CSPRNG, hex-encoded. Only
//! `HMAC-SHA256(secret, token)` is ever persisted, so a database dump does
//! not yield working links.

use hmac::{Hmac, Mac};
use ring::rand::{SecureRandom, SystemRandom};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use trestle_core::TrestleError;
use zeroize::Zeroizing;

type HmacSha256 = Hmac<Sha256>;

/// Random bytes per token (256 bits of entropy).
pub const TOKEN_BYTES: usize = 32;

/// An HMAC key for one token namespace.
///
/// Signing links and download links use different secrets, so a digest from
/// one namespace never verifies in the other.
pub struct TokenSecret {
    key: SecretString,
}

impl TokenSecret {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: SecretString::from(key.into()),
        }
    }

    /// Build from an optional configured value.
    ///
    /// `None` or an empty string is an unprovisioned secret and fails with
    /// [`TrestleError::Config`], naming the config key and env var to set.
    pub fn from_config(value: Option<&str>, key_path: &str) -> Result<Self, TrestleError> {
        match value {
            Some(v) if !v.is_empty() => Ok(Self::new(v)),
            _ => Err(TrestleError::Config(format!(
                "{key_path} is not provisioned; set it in trestle.toml or via TRESTLE_{}",
                key_path.replace('.', "_").to_uppercase()
            ))),
        }
    }

    fn mac(&self) -> Result<HmacSha256, TrestleError> {
        HmacSha256::new_from_slice(self.key.expose_secret().as_bytes())
            .map_err(|_| TrestleError::Internal("invalid HMAC key length".to_string()))
    }
}

impl std::fmt::Debug for TokenSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("TokenSecret([redacted])")
    }
}

/// Mint a fresh cleartext token.
pub fn mint_token() -> Result<String, TrestleError> {
    let rng = SystemRandom::new();
    let mut bytes = Zeroizing::new([0u8; TOKEN_BYTES]);
    rng.fill(bytes.as_mut())
        .map_err(|_| TrestleError::Internal("failed to generate random token".to_string()))?;
    Ok(hex::encode(bytes.as_ref()))
}

/// Hex HMAC-SHA256 digest of a presented token.
pub fn digest(secret: &TokenSecret, token: &str) -> Result<String, TrestleError> {
    let mut mac = secret.mac()?;
    mac.update(token.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Check a presented token against a stored digest in constant time.
///
/// A stored digest that is not valid hex verifies false.
pub fn verify(secret: &TokenSecret, presented: &str, stored_digest: &str) -> bool {
    let Ok(expected) = hex::decode(stored_digest) else {
        return false;
    };
    let Ok(mut mac) = secret.mac() else {
        return false;
    };
    mac.update(presented.as_bytes());
    mac.verify_slice(&expected).is_ok()
}
