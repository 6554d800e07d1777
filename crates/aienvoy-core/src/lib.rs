// SPDX-FileCopyrightText: 2026 Aienvoy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for aienvoy.
//!
//! This crate provides the adapter traits, error type, domain types, and the
//! streaming channel contract used throughout the workspace. Every provider
//! and storage backend implements traits defined here.

pub mod error;
pub mod stream;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::EnvoyError;
pub use stream::{ChatStream, CollectedStream, StreamEnd, StreamEvent, StreamProducer};
pub use types::{
    AdapterType, Caller, ChatMessage, ChatRequest, ChatResponse, Conversation, Embedding,
    EmbeddingInput, EmbeddingRequest, EmbeddingResponse, EmbeddingUsage, HealthStatus, Message,
    ModelUsage, Role, StreamDelta, TokenUsage, UsageRecord,
};

pub use traits::{PluginAdapter, ProviderAdapter, StorageAdapter};
