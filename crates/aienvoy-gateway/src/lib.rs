// SPDX-FileCopyrightText: 2026 Aienvoy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP gateway for aienvoy.
//!
//! Exposes the conversation service over a JSON REST API with OpenAI-style
//! chat completions, streaming responses as Server-Sent Events.

pub mod error;
pub mod handlers;
pub mod server;
pub mod sse;

pub use error::{ApiError, ErrorResponse};
pub use server::{GatewayState, HealthState, ServerConfig, router, start_server};
