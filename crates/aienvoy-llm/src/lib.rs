// SPDX-FileCopyrightText: 2026 Aienvoy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Model routing and the conversation service.
//!
//! [`ProviderRegistry`] maps model names to the provider serving them.
//! [`ConversationService`] sits between the HTTP/Telegram surfaces and the
//! providers: it keeps conversation history in storage, sends the full
//! transcript upstream, and records token usage for every exchange.

pub mod registry;
pub mod relay;
pub mod service;

pub use registry::{ModelEntry, ProviderRegistry};
pub use service::ConversationService;
