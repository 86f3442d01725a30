// SPDX-FileCopyrightText: 2026 Trestle Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Short-lived, bounded-use download links for executed files.
//!
//! Separate secret, TTL, and use budget from signing links. The grant row
//! is the source of truth for remaining uses; redemption is a conditional
//! increment so concurrent downloads cannot overspend it.

use chrono::{DateTime, Duration, Utc};
use tracing::debug;
use trestle_config::TrestleConfig;
use trestle_core::types::format_timestamp;
use trestle_core::{DownloadGrant, TrestleError};
use trestle_storage::Database;
use trestle_storage::queries::grants;

use crate::crypto::{self, TokenSecret};

/// A minted download link.
#[derive(Clone, PartialEq)]
pub struct DownloadLink {
    pub token: String,
    pub url: String,
    pub expires_at: String,
    pub max_uses: i64,
}

impl std::fmt::Debug for DownloadLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadLink")
            .field("token", &"[redacted]")
            .field("expires_at", &self.expires_at)
            .field("max_uses", &self.max_uses)
            .finish()
    }
}

/// Mints and redeems executed-file download tokens.
#[derive(Debug)]
pub struct DownloadTokens {
    db: Database,
    secret: Result<TokenSecret, String>,
    base_url: String,
    ttl: Duration,
    max_uses: i64,
}

impl DownloadTokens {
    pub fn new(db: Database, config: &TrestleConfig) -> Self {
        let secret =
            TokenSecret::from_config(config.artifacts.secret.as_deref(), "artifacts.secret")
                .map_err(|e| e.to_string());
        let ttl_secs = i64::try_from(config.artifacts.ttl_secs).unwrap_or(i64::MAX);
        Self {
            db,
            secret,
            base_url: config.app.base_url_trimmed().to_string(),
            ttl: Duration::try_seconds(ttl_secs).unwrap_or(Duration::MAX),
            max_uses: i64::from(config.artifacts.max_uses),
        }
    }

    pub fn ensure_configured(&self) -> Result<&TokenSecret, TrestleError> {
        self.secret
            .as_ref()
            .map_err(|message| TrestleError::Config(message.clone()))
    }

    /// Mint a link granting `max_uses` downloads of `file_id` until the TTL runs out.
    pub async fn mint(
        &self,
        envelope_id: &str,
        file_id: &str,
        created_by: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<DownloadLink, TrestleError> {
        let secret = self.ensure_configured()?;
        let expires_at = now
            .checked_add_signed(self.ttl)
            .ok_or_else(|| TrestleError::Config("artifacts.ttl_secs is out of range".to_string()))?;
        let token = crypto::mint_token()?;
        let grant = DownloadGrant {
            token_hash: crypto::digest(secret, &token)?,
            envelope_id: envelope_id.to_string(),
            file_id: file_id.to_string(),
            expires_at: format_timestamp(expires_at),
            max_uses: self.max_uses,
            use_count: 0,
            created_by: created_by.map(|s| s.to_string()),
            created_at: format_timestamp(now),
        };
        grants::insert_grant(&self.db, &grant).await?;

        debug!(envelope_id, expires_at = %grant.expires_at, "download link minted");
        Ok(DownloadLink {
            url: format!("{}/executed/{token}", self.base_url),
            token,
            expires_at: grant.expires_at,
            max_uses: grant.max_uses,
        })
    }

    /// Verify a presented download token and spend one use.
    ///
    /// Returns the grant as it stands after the use was recorded.
    pub async fn redeem(
        &self,
        presented: &str,
        now: DateTime<Utc>,
    ) -> Result<DownloadGrant, TrestleError> {
        let secret = self.ensure_configured()?;
        let token_hash = crypto::digest(secret, presented)?;
        let invalid = || TrestleError::Forbidden("invalid download link".to_string());

        let grant = grants::get_grant(&self.db, &token_hash)
            .await?
            .ok_or_else(invalid)?;
        if !crypto::verify(secret, presented, &grant.token_hash) {
            return Err(invalid());
        }

        let now = format_timestamp(now);
        if grant.expires_at <= now {
            return Err(TrestleError::Forbidden("download link has expired".to_string()));
        }
        if !grants::consume_use(&self.db, &token_hash, &now).await? {
            return Err(TrestleError::Forbidden(
                "download link has no remaining uses".to_string(),
            ));
        }

        grants::get_grant(&self.db, &token_hash)
            .await?
            .ok_or_else(invalid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use trestle_core::types::now_timestamp;
    use trestle_core::{Document, DocumentStatus, Envelope, EnvelopeStatus, Metadata};
    use trestle_storage::queries::{documents, envelopes};

    async fn setup() -> (Database, TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open(dir.path().join("t.db").to_str().unwrap())
            .await
            .unwrap();
        documents::insert_document(
            &db,
            &Document {
                id: "doc-1".into(),
                project_id: "proj-1".into(),
                title: "Contract".into(),
                status: DocumentStatus::Executed,
                executed_file_id: Some("file-1".into()),
                created_at: now_timestamp(),
                updated_at: now_timestamp(),
            },
        )
        .await
        .unwrap();
        envelopes::insert_envelope(
            &db,
            &Envelope {
                id: "env-1".into(),
                document_id: "doc-1".into(),
                project_id: "proj-1".into(),
                source: None,
                status: EnvelopeStatus::Executed,
                subject: None,
                message: None,
                expires_at: None,
                sent_at: None,
                executed_at: None,
                voided_at: None,
                metadata: Metadata::new(),
                created_at: now_timestamp(),
                updated_at: now_timestamp(),
            },
        )
        .await
        .unwrap();
        (db, dir)
    }

    fn config(ttl_secs: u64, max_uses: u32) -> TrestleConfig {
        let mut config = TrestleConfig::default();
        config.artifacts.secret = Some("fedcba9876543210fedcba9876543210".to_string());
        config.artifacts.ttl_secs = ttl_secs;
        config.artifacts.max_uses = max_uses;
        config
    }

    #[tokio::test]
    async fn link_redeems_up_to_max_uses() {
        let (db, _dir) = setup().await;
        let tokens = DownloadTokens::new(db.clone(), &config(600, 2));
        let now = Utc::now();

        let link = tokens.mint("env-1", "file-1", Some("user-1"), now).await.unwrap();
        assert!(link.url.ends_with(&format!("/executed/{}", link.token)));
        assert_eq!(link.max_uses, 2);

        let first = tokens.redeem(&link.token, now).await.unwrap();
        assert_eq!(first.use_count, 1);
        assert_eq!(first.file_id, "file-1");
        tokens.redeem(&link.token, now).await.unwrap();
        assert!(matches!(
            tokens.redeem(&link.token, now).await,
            Err(TrestleError::Forbidden(_))
        ));
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn expired_link_is_rejected() {
        let (db, _dir) = setup().await;
        let tokens = DownloadTokens::new(db.clone(), &config(60, 3));
        let now = Utc::now();
        let link = tokens.mint("env-1", "file-1", None, now).await.unwrap();

        let later = now + Duration::seconds(61);
        let err = tokens.redeem(&link.token, later).await.unwrap_err();
        assert!(err.to_string().contains("expired"));
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn signing_secret_does_not_open_download_namespace() {
        let (db, _dir) = setup().await;
        let tokens = DownloadTokens::new(db.clone(), &config(600, 3));
        let link = tokens.mint("env-1", "file-1", None, Utc::now()).await.unwrap();

        let mut other = config(600, 3);
        other.artifacts.secret = Some("0123456789abcdef0123456789abcdef".to_string());
        let foreign = DownloadTokens::new(db.clone(), &other);
        assert!(matches!(
            foreign.redeem(&link.token, Utc::now()).await,
            Err(TrestleError::Forbidden(_))
        ));
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn missing_artifact_secret_is_config_error() {
        let (db, _dir) = setup().await;
        let tokens = DownloadTokens::new(db.clone(), &TrestleConfig::default());
        let err = tokens.mint("env-1", "file-1", None, Utc::now()).await.unwrap_err();
        assert!(matches!(err, TrestleError::Config(_)));
        db.close().await.unwrap();
    }
}
