// SPDX-FileCopyrightText: 2026 Trestle Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Signing-link issuance and resolution.

use tracing::debug;
use trestle_config::TrestleConfig;
use trestle_core::types::now_timestamp;
use trestle_core::{RequestStatus, SigningRequest, TrestleError};
use trestle_storage::Database;
use trestle_storage::queries::signing_requests;

use crate::crypto::{self, TokenSecret};

/// A freshly issued signing link. The only place the cleartext token exists.
#[derive(Clone, PartialEq)]
pub struct IssuedLink {
    pub request_id: String,
    pub token: String,
    pub url: String,
    pub sent_at: String,
}

impl std::fmt::Debug for IssuedLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IssuedLink")
            .field("request_id", &self.request_id)
            .field("token", &"[redacted]")
            .field("sent_at", &self.sent_at)
            .finish()
    }
}

/// Issues signing links against signing requests and resolves presented ones.
#[derive(Debug)]
pub struct TokenIssuer {
    db: Database,
    secret: Result<TokenSecret, String>,
    base_url: String,
}

impl TokenIssuer {
    /// Build an issuer from configuration.
    ///
    /// A missing secret is not an error here; it surfaces from
    /// [`ensure_configured`](Self::ensure_configured) when a link is needed.
    pub fn new(db: Database, config: &TrestleConfig) -> Self {
        let secret = TokenSecret::from_config(config.signing.secret.as_deref(), "signing.secret")
            .map_err(|e| e.to_string());
        Self {
            db,
            secret,
            base_url: config.app.base_url_trimmed().to_string(),
        }
    }

    /// Fail with a configuration error if no signing secret is provisioned.
    ///
    /// Callers run this before their first mutation.
    pub fn ensure_configured(&self) -> Result<&TokenSecret, TrestleError> {
        self.secret
            .as_ref()
            .map_err(|message| TrestleError::Config(message.clone()))
    }

    /// The public URL for a cleartext token.
    pub fn link_for(&self, token: &str) -> String {
        format!("{}/signing/{token}", self.base_url)
    }

    /// Mint a token for `request_id`, store its digest, and return the link.
    ///
    /// Any previously issued link for the request stops working. With
    /// `mark_sent` this is the first issue: the request must still be a
    /// draft and moves to `sent`. Without it (reminders) the request keeps
    /// its status.
    pub async fn issue(&self, request_id: &str, mark_sent: bool) -> Result<IssuedLink, TrestleError> {
        let secret = self.ensure_configured()?;
        let request = signing_requests::get_request(&self.db, request_id)
            .await?
            .ok_or_else(|| TrestleError::not_found("signing request", request_id))?;
        if request.status.is_closed() {
            return Err(TrestleError::state(format!(
                "signing request {request_id} is {}",
                request.status
            )));
        }
        if mark_sent && request.status != RequestStatus::Draft {
            return Err(TrestleError::state(format!(
                "signing request {request_id} already has a link"
            )));
        }

        let token = crypto::mint_token()?;
        let token_hash = crypto::digest(secret, &token)?;
        let sent_at = now_timestamp();
        let stored =
            signing_requests::store_token(&self.db, request_id, &token_hash, mark_sent, &sent_at)
                .await?;
        if !stored {
            return Err(TrestleError::state(format!(
                "signing request {request_id} changed while issuing a link"
            )));
        }

        debug!(request_id, mark_sent, "signing link issued");
        Ok(IssuedLink {
            request_id: request_id.to_string(),
            url: self.link_for(&token),
            token,
            sent_at,
        })
    }

    /// Resolve a presented token to the request it currently unlocks.
    ///
    /// Unknown or superseded tokens are `Forbidden`. A matching token on a
    /// request that is no longer `sent`/`viewed` is a `StateViolation`.
    pub async fn resolve(&self, presented: &str) -> Result<SigningRequest, TrestleError> {
        let secret = self.ensure_configured()?;
        let token_hash = crypto::digest(secret, presented)?;
        let request = signing_requests::find_by_token_hash(&self.db, &token_hash)
            .await?
            .ok_or_else(|| TrestleError::Forbidden("invalid signing link".to_string()))?;

        let stored = request.token_hash.as_deref().unwrap_or_default();
        if !crypto::verify(secret, presented, stored) {
            return Err(TrestleError::Forbidden("invalid signing link".to_string()));
        }
        if !request.status.accepts_link() {
            return Err(TrestleError::state(format!(
                "signing link is no longer valid: request is {}",
                request.status
            )));
        }
        Ok(request)
    }
}
