// SPDX-FileCopyrightText: 2026 Aienvoy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Forwarding a provider stream through a second channel pair.
//!
//! The relay lets the service act on the finished answer (persisting it,
//! recording usage) before the consumer observes end-of-stream.

use std::future::Future;

use aienvoy_core::stream::{self, DEFAULT_CAPACITY};
use aienvoy_core::{ChatStream, CollectedStream, EnvoyError, StreamEvent};
use tracing::debug;

/// Spawns a task that opens the upstream stream with `setup`, forwards every
/// delta, and on upstream EOF runs `on_eof` with the state `setup` returned
/// and the accumulated answer.
///
/// The consumer sees EOF only after `on_eof` succeeds; its error, a setup
/// error, or the upstream error becomes the terminal error instead. When the
/// consumer goes away the task stops without calling `on_eof`.
pub fn relay<S, T, F, Fut>(setup: S, on_eof: F) -> ChatStream
where
    S: Future<Output = Result<(ChatStream, T), EnvoyError>> + Send + 'static,
    T: Send + 'static,
    F: FnOnce(T, CollectedStream) -> Fut + Send + 'static,
    Fut: Future<Output = Result<(), EnvoyError>> + Send + 'static,
{
    let (producer, stream) = stream::channel(DEFAULT_CAPACITY);
    tokio::spawn(async move {
        let (mut upstream, state) = match setup.await {
            Ok(opened) => opened,
            Err(e) => {
                producer.fail(e);
                return;
            }
        };

        let mut collected = CollectedStream::default();
        let end = loop {
            match upstream.next_event().await {
                Some(StreamEvent::Delta(delta)) => {
                    collected.push(delta.clone());
                    if !producer.send(delta).await {
                        debug!("relay consumer dropped, abandoning stream");
                        return;
                    }
                }
                Some(StreamEvent::End(result)) => break result,
                None => break Err(EnvoyError::stream("upstream ended without a terminal signal")),
            }
        };

        match end {
            Ok(()) => match on_eof(state, collected).await {
                Ok(()) => producer.finish(),
                Err(e) => producer.fail(e),
            },
            Err(e) => producer.fail(e),
        }
    });
    stream
}
