// SPDX-FileCopyrightText: 2026 Trestle Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Parallel link issuance and notification for an active batch.
//!
//! Each signer gets an independent `issue` + `deliver` pair, run
//! concurrently with `join_all`. One signer's failure never rolls back
//! another's link. A delivery failure leaves the issued link in place so a
//! reminder can deliver it later.

use std::sync::Arc;

use futures::future::join_all;
use serde::Serialize;
use tracing::{debug, warn};
use trestle_core::{
    NoticeKind, Notifier, RequestStatus, SigningNotice, SigningRequest, TrestleError,
};
use trestle_token::TokenIssuer;

/// Envelope-level fields copied into every notice of a batch.
#[derive(Debug, Clone, Default)]
pub struct NoticeContext {
    pub envelope_id: Option<String>,
    pub document_id: String,
    pub subject: Option<String>,
    pub message: Option<String>,
}

/// A signer whose link could not be issued or delivered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeliveryFailure {
    pub request_id: String,
    pub email: Option<String>,
    pub reason: String,
}

/// What happened to each request handed to [`Fanout::dispatch`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FanoutReport {
    /// Requests whose link was issued and delivered.
    pub delivered: Vec<String>,
    /// Requests that another caller had already issued.
    pub skipped: Vec<String>,
    pub failed: Vec<DeliveryFailure>,
}

impl FanoutReport {
    pub fn sent_now(&self) -> usize {
        self.delivered.len()
    }

    pub fn failed_ids(&self) -> Vec<String> {
        self.failed.iter().map(|f| f.request_id.clone()).collect()
    }
}

enum Delivery {
    Delivered(String),
    Skipped(String),
    Failed(DeliveryFailure),
}

/// Issues links and hands them to the host's [`Notifier`].
#[derive(Clone)]
pub struct Fanout {
    issuer: Arc<TokenIssuer>,
    notifier: Arc<dyn Notifier>,
}

impl std::fmt::Debug for Fanout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fanout").finish_non_exhaustive()
    }
}

impl Fanout {
    pub fn new(issuer: Arc<TokenIssuer>, notifier: Arc<dyn Notifier>) -> Self {
        Self { issuer, notifier }
    }

    /// Issue and deliver links for `requests` in parallel.
    ///
    /// Draft requests get their first link and move to `sent`. Requests
    /// that already have a link get a replacement (reminders).
    pub async fn dispatch(
        &self,
        requests: &[SigningRequest],
        context: &NoticeContext,
        kind: NoticeKind,
    ) -> FanoutReport {
        let outcomes = join_all(
            requests
                .iter()
                .map(|request| self.issue_and_deliver(request, context, kind)),
        )
        .await;

        let mut report = FanoutReport::default();
        for outcome in outcomes {
            match outcome {
                Delivery::Delivered(id) => report.delivered.push(id),
                Delivery::Skipped(id) => report.skipped.push(id),
                Delivery::Failed(failure) => report.failed.push(failure),
            }
        }
        report
    }

    async fn issue_and_deliver(
        &self,
        request: &SigningRequest,
        context: &NoticeContext,
        kind: NoticeKind,
    ) -> Delivery {
        let failed = |reason: String| {
            Delivery::Failed(DeliveryFailure {
                request_id: request.id.clone(),
                email: request.sent_to_email.clone(),
                reason,
            })
        };

        let Some(to_email) = request.sent_to_email.clone() else {
            warn!(request_id = %request.id, "signer has no email, link not issued");
            return failed("no email address".to_string());
        };

        let first_issue = request.status == RequestStatus::Draft;
        let link = match self.issuer.issue(&request.id, first_issue).await {
            Ok(link) => link,
            Err(TrestleError::StateViolation(reason)) if first_issue => {
                debug!(request_id = %request.id, %reason, "link already issued elsewhere");
                return Delivery::Skipped(request.id.clone());
            }
            Err(e) => {
                warn!(request_id = %request.id, error = %e, "signing link issue failed");
                return failed(e.to_string());
            }
        };

        let notice = SigningNotice {
            kind,
            envelope_id: context.envelope_id.clone(),
            document_id: context.document_id.clone(),
            request_id: request.id.clone(),
            to_email,
            to_name: request.signer_name.clone(),
            subject: context.subject.clone(),
            message: context.message.clone(),
            link: link.url,
        };
        match self.notifier.deliver(&notice).await {
            Ok(()) => Delivery::Delivered(request.id.clone()),
            Err(e) => {
                warn!(
                    request_id = %request.id,
                    error = %e,
                    "signing notice delivery failed; link stays valid"
                );
                failed(e.to_string())
            }
        }
    }
}
