// SPDX-FileCopyrightText: 2026 Trestle Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Outbound notification capability (email, in practice).

use async_trait::async_trait;

use crate::error::TrestleError;

/// Why a signer is being contacted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    /// First link for this request.
    Initial,
    /// A reminder carrying a freshly issued link.
    Reminder,
}

/// A signing link addressed to one signer.
///
/// `link` carries the cleartext token. It must not be logged or persisted.
#[derive(Clone, PartialEq)]
pub struct SigningNotice {
    pub kind: NoticeKind,
    pub envelope_id: Option<String>,
    pub document_id: String,
    pub request_id: String,
    pub to_email: String,
    pub to_name: Option<String>,
    pub subject: Option<String>,
    pub message: Option<String>,
    pub link: String,
}

impl std::fmt::Debug for SigningNotice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningNotice")
            .field("kind", &self.kind)
            .field("envelope_id", &self.envelope_id)
            .field("request_id", &self.request_id)
            .field("to_email", &self.to_email)
            .field("link", &"[redacted]")
            .finish()
    }
}

/// Delivers signing links to signers.
///
/// A failed delivery is reported per signer and never rolls back the issued
/// link: the request stays `sent` and a reminder can deliver it again.
#[async_trait]
pub trait Notifier: Send + Sync + 'static {
    async fn deliver(&self, notice: &SigningNotice) -> Result<(), TrestleError>;
}
