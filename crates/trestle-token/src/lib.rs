// SPDX-FileCopyrightText: 2026 Trestle Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Unguessable, single-purpose links for the Trestle signing engine.
//!
//! Two namespaces share the same primitives in [`crypto`]: signing links
//! (`/signing/{token}`, see [`issuer`]) and executed-file download links
//! (`/executed/{token}`, see [`download`]). Each has its own HMAC secret.
//! Cleartext tokens are returned to the caller once and never stored.

pub mod crypto;
pub mod download;
pub mod issuer;

pub use crypto::TokenSecret;
pub use download::{DownloadLink, DownloadTokens};
pub use issuer::{IssuedLink, TokenIssuer};
