// SPDX-FileCopyrightText: 2026 Trestle Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end lifecycle testing.
//!
//! `TestHarness` assembles a controller, artifact resolver, and hub over a
//! temp SQLite database, wired to the mock collaborators.

use std::sync::Arc;

use trestle_config::TrestleConfig;
use trestle_config::model::StorageConfig;
use trestle_core::types::now_timestamp;
use trestle_core::{Actor, Document, DocumentStatus, TrestleError};
use trestle_engine::{ArtifactResolver, Collaborators, LifecycleController, SignatureHub};
use trestle_storage::Database;
use trestle_storage::queries::documents;

use crate::mock_notifier::MockNotifier;
use crate::mock_policy::{MockAuthorizer, MockSourceGuard};

/// Signing secret used by harnesses unless overridden.
pub const TEST_SIGNING_SECRET: &str = "test-signing-secret-0123456789abcdef";
/// Download secret used by harnesses unless overridden.
pub const TEST_ARTIFACTS_SECRET: &str = "test-artifacts-secret-0123456789abcdef";

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    signing_secret: Option<String>,
    artifacts_secret: Option<String>,
    max_uses: u32,
    expiring_soon_days: u32,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            signing_secret: Some(TEST_SIGNING_SECRET.to_string()),
            artifacts_secret: Some(TEST_ARTIFACTS_SECRET.to_string()),
            max_uses: 3,
            expiring_soon_days: 3,
        }
    }

    /// Leave the signing secret unprovisioned.
    pub fn without_signing_secret(mut self) -> Self {
        self.signing_secret = None;
        self
    }

    /// Leave the download secret unprovisioned.
    pub fn without_artifacts_secret(mut self) -> Self {
        self.artifacts_secret = None;
        self
    }

    pub fn with_download_uses(mut self, max_uses: u32) -> Self {
        self.max_uses = max_uses;
        self
    }

    pub fn with_expiring_soon_days(mut self, days: u32) -> Self {
        self.expiring_soon_days = days;
        self
    }

    /// Build the test harness, creating all required subsystems.
    pub async fn build(self) -> Result<TestHarness, TrestleError> {
        let temp_dir =
            tempfile::TempDir::new().map_err(|e| TrestleError::Storage { source: e.into() })?;
        let db_path = temp_dir.path().join("test.db");

        let mut config = TrestleConfig {
            storage: StorageConfig {
                database_path: db_path.to_string_lossy().to_string(),
                wal_mode: true,
            },
            ..TrestleConfig::default()
        };
        config.app.base_url = "https://app.example.com".to_string();
        config.signing.secret = self.signing_secret;
        config.artifacts.secret = self.artifacts_secret;
        config.artifacts.max_uses = self.max_uses;
        config.hub.expiring_soon_days = self.expiring_soon_days;

        let db = Database::open_with_config(&config.storage).await?;

        let notifier = Arc::new(MockNotifier::new());
        let authorizer = Arc::new(MockAuthorizer::new());
        let source_guard = Arc::new(MockSourceGuard::new());

        let controller = LifecycleController::new(
            db.clone(),
            &config,
            Collaborators {
                notifier: notifier.clone(),
                authorizer: authorizer.clone(),
                source_guard: source_guard.clone(),
            },
        );
        let artifacts = ArtifactResolver::new(db.clone(), &config, controller.gate().clone());
        let hub = SignatureHub::new(db.clone(), &config.hub);

        Ok(TestHarness {
            controller,
            artifacts,
            hub,
            notifier,
            authorizer,
            source_guard,
            db,
            config,
            _temp_dir: temp_dir,
        })
    }
}

/// A complete test environment with mock collaborators and temp storage.
pub struct TestHarness {
    pub controller: LifecycleController,
    pub artifacts: ArtifactResolver,
    pub hub: SignatureHub,
    pub notifier: Arc<MockNotifier>,
    pub authorizer: Arc<MockAuthorizer>,
    pub source_guard: Arc<MockSourceGuard>,
    pub db: Database,
    pub config: TrestleConfig,
    _temp_dir: tempfile::TempDir,
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// A harness with both secrets provisioned.
    pub async fn new() -> Result<Self, TrestleError> {
        Self::builder().build().await
    }

    /// The actor used by tests unless they need a specific one.
    pub fn actor(&self) -> Actor {
        Actor::new("user-pm", "org-1")
    }

    /// Insert a draft document in project `proj-1` and return its id.
    pub async fn seed_document(&self, title: &str) -> Result<String, TrestleError> {
        self.seed_document_in("proj-1", title).await
    }

    pub async fn seed_document_in(
        &self,
        project_id: &str,
        title: &str,
    ) -> Result<String, TrestleError> {
        let document = Document {
            id: uuid::Uuid::new_v4().to_string(),
            project_id: project_id.to_string(),
            title: title.to_string(),
            status: DocumentStatus::Draft,
            executed_file_id: None,
            created_at: now_timestamp(),
            updated_at: now_timestamp(),
        };
        documents::insert_document(&self.db, &document).await?;
        Ok(document.id)
    }

    pub async fn document(&self, id: &str) -> Result<Document, TrestleError> {
        documents::get_document(&self.db, id)
            .await?
            .ok_or_else(|| TrestleError::not_found("document", id))
    }

    /// Close the database connection.
    pub async fn shutdown(self) -> Result<(), TrestleError> {
        self.db.close().await
    }
}
