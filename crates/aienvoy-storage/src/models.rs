// SPDX-FileCopyrightText: 2026 Aienvoy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Row types persisted by this crate.
//!
//! The domain types live in `aienvoy-core` so providers and surfaces can
//! share them without depending on SQLite.

pub use aienvoy_core::types::{Conversation, Message, ModelUsage, UsageRecord};
