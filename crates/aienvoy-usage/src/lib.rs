// SPDX-FileCopyrightText: 2026 Aienvoy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Token usage accounting for aienvoy.
//!
//! [`TokenCounter`] estimates token counts with tiktoken encodings, and
//! [`UsageRecorder`] persists one [`UsageRecord`](aienvoy_core::UsageRecord)
//! per provider call through the storage adapter.

pub mod counter;
pub mod recorder;

pub use counter::TokenCounter;
pub use recorder::UsageRecorder;
