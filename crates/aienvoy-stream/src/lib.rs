// SPDX-FileCopyrightText: 2026 Aienvoy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Streaming normalizer.
//!
//! Upstream providers frame streamed answers differently: Server-Sent Events
//! with JSON deltas ([`sse`]), newline-delimited JSON or `data:`-prefixed text
//! lines ([`lines`]), and AWS binary event-stream messages ([`eventstream`]).
//! Each framing is decoded into a typed frame stream, and [`pump`] drives one
//! frame stream per request on its own task, mapping frames to
//! [`aienvoy_core::StreamDelta`] records through a provider's [`Normalize`]
//! implementation and delivering exactly one terminal signal.
//!
//! [`transport`] holds the HTTP client limits the providers share.

pub mod eventstream;
pub mod frame;
pub mod lines;
pub mod pump;
pub mod sse;
pub mod transport;

pub use frame::{FrameStream, framed};
pub use pump::{Normalize, Normalized, spawn, spawn_frames};
pub use sse::SseFrame;
