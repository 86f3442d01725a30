// SPDX-FileCopyrightText: 2026 Trestle Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Signing order: which requests are eligible to sign right now.
//!
//! Pure functions over one group's requests (one envelope, or one legacy
//! group id). Required requests that are still open are ordered by sequence;
//! everything sharing the lowest pending sequence forms the active batch and
//! may sign concurrently. Signed, voided, and expired requests never block.
//!
//! Callers must pass rows read immediately before acting. Nothing here is
//! cached or persisted.

use crate::types::{SequenceGroup, SigningRequest};

/// The set of requests currently eligible to sign.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ActiveBatch {
    /// Sequence shared by every member, `None` when the batch is empty.
    pub sequence: Option<i64>,
    pub requests: Vec<SigningRequest>,
}

impl ActiveBatch {
    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn ids(&self) -> Vec<&str> {
        self.requests.iter().map(|r| r.id.as_str()).collect()
    }

    pub fn contains(&self, request_id: &str) -> bool {
        self.requests.iter().any(|r| r.id == request_id)
    }
}

/// Compute the active batch for one group of signing requests.
pub fn active_batch(requests: &[SigningRequest]) -> ActiveBatch {
    let pending: Vec<&SigningRequest> = requests
        .iter()
        .filter(|r| r.required)
        .filter(|r| !r.status.is_closed())
        .collect();

    let Some(min_sequence) = pending.iter().map(|r| r.effective_sequence()).min() else {
        return ActiveBatch::default();
    };

    ActiveBatch {
        sequence: Some(min_sequence),
        requests: pending
            .into_iter()
            .filter(|r| r.effective_sequence() == min_sequence)
            .cloned()
            .collect(),
    }
}

/// The group a request sequences with: its envelope, or a legacy group id.
///
/// `None` only for rows that belong to neither, which storage rejects.
pub fn group_key(request: &SigningRequest) -> Option<SequenceGroup> {
    request.group()
}

/// Whether `request_id` may act right now, given a freshly computed batch.
pub fn is_request_active(request_id: &str, batch: &ActiveBatch) -> bool {
    batch.contains(request_id)
}

/// Whether every required request has been signed.
///
/// This is the execution condition. An empty active batch is not enough on
/// its own: a voided or expired required request leaves the batch empty
/// without completing the round.
pub fn all_required_signed(requests: &[SigningRequest]) -> bool {
    requests
        .iter()
        .filter(|r| r.required)
        .all(|r| r.status == crate::types::RequestStatus::Signed)
        && requests.iter().any(|r| r.required)
}

/// Required requests not yet signed, voided, or expired.
pub fn pending_required(requests: &[SigningRequest]) -> usize {
    requests
        .iter()
        .filter(|r| r.required && !r.status.is_closed())
        .count()
}
