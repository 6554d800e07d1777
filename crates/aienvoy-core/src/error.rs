// SPDX-FileCopyrightText: 2026 Aienvoy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for aienvoy.

use thiserror::Error;

/// The primary error type used across all aienvoy adapter traits and core operations.
#[derive(Debug, Error)]
pub enum EnvoyError {
    /// Configuration errors (invalid TOML, missing required fields, type mismatches).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (database connection, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Channel adapter errors (connection failure, message format, rate limiting).
    #[error("channel error: {message}")]
    Channel {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// LLM provider errors (HTTP failure, rejected request, unexpected response body).
    #[error("provider error: {message}")]
    Provider {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Streaming errors: upstream read failures, malformed frames, or a
    /// producer that went away without signalling completion.
    #[error("stream error: {message}")]
    Stream {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// No registered provider serves the requested model.
    #[error("unknown model: {0}")]
    UnknownModel(String),

    /// A stored record does not exist.
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// The request was well-formed JSON but semantically invalid.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// An upstream call did not answer within its time limit.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

/// I/O failures surface while reading upstream bodies, so they are stream errors.
impl From<std::io::Error> for EnvoyError {
    fn from(e: std::io::Error) -> Self {
        Self::stream_from(format!("upstream read failed: {e}"), e)
    }
}

impl EnvoyError {
    /// Builds a [`EnvoyError::Provider`] without an underlying source.
    pub fn provider(message: impl Into<String>) -> Self {
        Self::Provider {
            message: message.into(),
            source: None,
        }
    }

    /// Builds a [`EnvoyError::Provider`] wrapping the error that caused it.
    pub fn provider_from<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Provider {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Builds a [`EnvoyError::Stream`] without an underlying source.
    pub fn stream(message: impl Into<String>) -> Self {
        Self::Stream {
            message: message.into(),
            source: None,
        }
    }

    /// Builds a [`EnvoyError::Stream`] wrapping the error that caused it.
    pub fn stream_from<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Stream {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}
