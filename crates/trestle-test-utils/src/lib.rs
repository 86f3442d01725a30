// SPDX-FileCopyrightText: 2026 Trestle Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Trestle integration tests.
//!
//! Provides mock collaborators and a test harness for fast, deterministic
//! tests without a mail server or host application.
//!
//! # Components
//!
//! - [`MockNotifier`] - captures signing notices, fails on demand
//! - [`MockAuthorizer`] - allow-all with deny rules
//! - [`MockSourceGuard`] - source entities marked accepted by the test
//! - [`TestHarness`] - controller, artifacts, and hub over a temp database

pub mod harness;
pub mod mock_notifier;
pub mod mock_policy;

pub use harness::{TEST_ARTIFACTS_SECRET, TEST_SIGNING_SECRET, TestHarness, TestHarnessBuilder};
pub use mock_notifier::MockNotifier;
pub use mock_policy::{MockAuthorizer, MockSourceGuard};
