// SPDX-FileCopyrightText: 2026 Aienvoy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for aienvoy integration tests.
//!
//! Provides a scripted provider and a harness over temporary SQLite storage
//! for fast, deterministic tests without external services.
//!
//! # Components
//!
//! - [`MockProvider`] - Provider adapter replaying queued replies
//! - [`TestHarness`] - Storage, registry, and conversation service wired together

pub mod harness;
pub mod mock_provider;

pub use harness::{TestHarness, TestHarnessBuilder};
pub use mock_provider::{MockProvider, MockReply};
