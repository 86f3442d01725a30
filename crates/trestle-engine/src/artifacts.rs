// SPDX-FileCopyrightText: 2026 Trestle Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Executed-file resolution and download links.

use chrono::{DateTime, Utc};
use tracing::info;
use trestle_config::TrestleConfig;
use trestle_core::{Action, Actor, DownloadGrant, EnvelopeStatus, EventType, TrestleError};
use trestle_storage::Database;
use trestle_storage::queries::{documents, envelopes};
use trestle_token::{DownloadLink, DownloadTokens};

use crate::events::EventRecorder;
use crate::gate::Gate;

/// Where an executed envelope's final file came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutedFile {
    pub envelope_id: String,
    pub file_id: String,
}

#[derive(Debug)]
pub struct ArtifactResolver {
    db: Database,
    events: EventRecorder,
    gate: Gate,
    downloads: DownloadTokens,
}

impl ArtifactResolver {
    pub fn new(db: Database, config: &TrestleConfig, gate: Gate) -> Self {
        Self {
            events: EventRecorder::new(db.clone()),
            downloads: DownloadTokens::new(db.clone(), config),
            gate,
            db,
        }
    }

    /// The final file of an executed envelope.
    ///
    /// The file id written on the `executed` event wins; the document's
    /// recorded executed file is the fallback.
    pub async fn resolve_executed_file(
        &self,
        envelope_id: &str,
    ) -> Result<ExecutedFile, TrestleError> {
        let envelope = envelopes::get_envelope(&self.db, envelope_id)
            .await?
            .ok_or_else(|| TrestleError::not_found("envelope", envelope_id))?;
        if envelope.status != EnvelopeStatus::Executed {
            return Err(TrestleError::state("envelope is not executed yet"));
        }

        let from_event = self
            .events
            .list_by_type(envelope_id, EventType::Executed)
            .await?
            .into_iter()
            .rev()
            .find_map(|event| {
                event
                    .payload
                    .get("executed_file_id")
                    .and_then(|v| v.as_str())
                    .map(|s| s.to_string())
            });

        let file_id = match from_event {
            Some(file_id) => file_id,
            None => documents::get_document(&self.db, &envelope.document_id)
                .await?
                .and_then(|d| d.executed_file_id)
                .ok_or_else(|| TrestleError::not_found("executed file", envelope_id))?,
        };

        Ok(ExecutedFile {
            envelope_id: envelope.id,
            file_id,
        })
    }

    /// Mint a bounded download link for an executed envelope's file.
    pub async fn issue_download(
        &self,
        actor: &Actor,
        envelope_id: &str,
        now: DateTime<Utc>,
    ) -> Result<DownloadLink, TrestleError> {
        let envelope = envelopes::get_envelope(&self.db, envelope_id)
            .await?
            .ok_or_else(|| TrestleError::not_found("envelope", envelope_id))?;
        self.gate
            .check(actor, Action::DownloadExecuted, &envelope.document_id)
            .await?;
        self.downloads.ensure_configured()?;

        let file = self.resolve_executed_file(envelope_id).await?;
        let link = self
            .downloads
            .mint(envelope_id, &file.file_id, Some(&actor.user_id), now)
            .await?;
        info!(
            envelope_id,
            user_id = %actor.user_id,
            expires_at = %link.expires_at,
            "executed file download link issued"
        );
        Ok(link)
    }

    /// Spend one use of a download link and return the grant.
    pub async fn redeem_download(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<DownloadGrant, TrestleError> {
        self.downloads.redeem(token, now).await
    }
}
