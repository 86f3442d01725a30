// SPDX-FileCopyrightText: 2026 Trestle Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Recipient ledger: normalization, defaults, and wholesale replacement.
//!
//! Defaults, by zero-based position `p` in the supplied list:
//! - signer `sequence` is `p + 1`, cc `sequence` is `max(p, 1)`;
//! - signer `signer_role` is `signer_{n}`, where `n` counts signers only;
//! - `required` is true for signers and false for cc.
//!
//! Emails are trimmed and lowercased, names trimmed. Nothing here checks
//! deliverability.

use serde::{Deserialize, Serialize};
use trestle_core::{Recipient, RecipientRole, RecipientType, TrestleError};
use trestle_storage::Database;
use trestle_storage::queries::recipients;

/// A recipient as supplied by a caller, before defaults are applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipientInput {
    pub recipient_type: RecipientType,
    #[serde(default)]
    pub contact_id: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    pub role: RecipientRole,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub signer_role: Option<String>,
    #[serde(default)]
    pub sequence: Option<i64>,
    #[serde(default)]
    pub required: Option<bool>,
}

impl RecipientInput {
    /// A signer identified only by email.
    pub fn signer(email: impl Into<String>) -> Self {
        Self {
            recipient_type: RecipientType::ExternalEmail,
            contact_id: None,
            user_id: None,
            role: RecipientRole::Signer,
            name: None,
            email: Some(email.into()),
            signer_role: None,
            sequence: None,
            required: None,
        }
    }

    /// A copy-only recipient identified by email.
    pub fn cc(email: impl Into<String>) -> Self {
        Self {
            role: RecipientRole::Cc,
            ..Self::signer(email)
        }
    }

    pub fn with_sequence(mut self, sequence: i64) -> Self {
        self.sequence = Some(sequence);
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn optional(mut self) -> Self {
        self.required = Some(false);
        self
    }

    pub fn internal_user(mut self, user_id: impl Into<String>) -> Self {
        self.recipient_type = RecipientType::InternalUser;
        self.user_id = Some(user_id.into());
        self
    }

    pub fn contact(mut self, contact_id: impl Into<String>) -> Self {
        self.recipient_type = RecipientType::Contact;
        self.contact_id = Some(contact_id.into());
        self
    }
}

fn clean(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Apply defaults and normalization to a caller-supplied recipient list.
pub fn normalize(
    envelope_id: &str,
    inputs: Vec<RecipientInput>,
) -> Result<Vec<Recipient>, TrestleError> {
    let mut signers_seen = 0;
    inputs
        .into_iter()
        .enumerate()
        .map(|(index, input)| {
            let position = i64::try_from(index)
                .map_err(|_| TrestleError::state("too many recipients"))?;
            let is_signer = input.role == RecipientRole::Signer;
            let email = clean(input.email).map(|e| e.to_lowercase());

            if input.recipient_type == RecipientType::ExternalEmail && email.is_none() {
                return Err(TrestleError::state(format!(
                    "Recipient {} has no email address",
                    position + 1
                )));
            }

            let default_sequence = if is_signer { position + 1 } else { position.max(1) };
            if is_signer {
                signers_seen += 1;
            }
            Ok(Recipient {
                id: uuid::Uuid::new_v4().to_string(),
                envelope_id: envelope_id.to_string(),
                recipient_type: input.recipient_type,
                contact_id: clean(input.contact_id),
                user_id: clean(input.user_id),
                role: input.role,
                name: clean(input.name),
                email,
                signer_role: clean(input.signer_role)
                    .or_else(|| is_signer.then(|| format!("signer_{signers_seen}"))),
                sequence: input.sequence.unwrap_or(default_sequence).max(1),
                required: input.required.unwrap_or(is_signer),
                position,
            })
        })
        .collect()
}

/// Checks that a ledger can go out for signature.
///
/// At least one signer, and every signer reachable by email.
pub fn require_sendable(ledger: &[Recipient]) -> Result<(), TrestleError> {
    let signers: Vec<&Recipient> = ledger.iter().filter(|r| r.is_signer()).collect();
    if signers.is_empty() {
        return Err(TrestleError::state("At least one signer is required"));
    }
    if let Some(missing) = signers.iter().find(|r| r.email.is_none()) {
        return Err(TrestleError::state(format!(
            "Signer {} has no email address",
            missing
                .name
                .clone()
                .unwrap_or_else(|| (missing.position + 1).to_string())
        )));
    }
    Ok(())
}

/// Copy a ledger onto another envelope with fresh ids.
pub fn clone_for(source: &[Recipient], envelope_id: &str) -> Vec<Recipient> {
    source
        .iter()
        .map(|r| Recipient {
            id: uuid::Uuid::new_v4().to_string(),
            envelope_id: envelope_id.to_string(),
            ..r.clone()
        })
        .collect()
}

/// Persistent side of the ledger.
#[derive(Debug, Clone)]
pub struct RecipientLedger {
    db: Database,
}

impl RecipientLedger {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Normalize `inputs` and replace the envelope's recipients with them.
    pub async fn replace(
        &self,
        envelope_id: &str,
        inputs: Vec<RecipientInput>,
    ) -> Result<Vec<Recipient>, TrestleError> {
        let normalized = normalize(envelope_id, inputs)?;
        self.store(envelope_id, normalized).await
    }

    /// Replace the envelope's recipients with already-normalized rows.
    pub async fn store(
        &self,
        envelope_id: &str,
        ledger: Vec<Recipient>,
    ) -> Result<Vec<Recipient>, TrestleError> {
        recipients::replace_recipients(&self.db, envelope_id, ledger.clone()).await?;
        Ok(ledger)
    }

    /// Copy the source envelope's recipients onto the target. The source
    /// rows are only read.
    pub async fn clone_into(
        &self,
        source_envelope_id: &str,
        target_envelope_id: &str,
    ) -> Result<Vec<Recipient>, TrestleError> {
        let source = self.list(source_envelope_id).await?;
        self.store(target_envelope_id, clone_for(&source, target_envelope_id))
            .await
    }

    pub async fn list(&self, envelope_id: &str) -> Result<Vec<Recipient>, TrestleError> {
        recipients::list_recipients(&self.db, envelope_id).await
    }
}
