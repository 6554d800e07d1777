// SPDX-FileCopyrightText: 2026 Aienvoy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The per-request producer task.
//!
//! [`spawn`] starts one task per stream. The task performs the upstream
//! request, reads frames until EOF, maps each frame to a delta through a
//! [`Normalize`] implementation, and pushes the deltas into the data channel.
//! It finishes with exactly one terminal signal: EOF when the frame stream
//! ends or the normalizer reports [`Normalized::Done`], otherwise the first
//! error. No retries happen here.

use std::future::Future;

use aienvoy_core::stream::{self, DEFAULT_CAPACITY};
use aienvoy_core::{ChatStream, EnvoyError, StreamDelta, StreamProducer};
use futures::StreamExt;
use tracing::{debug, warn};

use crate::frame::FrameStream;

/// What a single frame contributes to the output stream.
#[derive(Debug, Clone, PartialEq)]
pub enum Normalized {
    /// Forward this record.
    Delta(StreamDelta),
    /// Nothing to forward (keep-alives, metadata frames).
    Skip,
    /// The provider signalled end-of-stream in-band.
    Done,
}

/// Maps provider-native frames to uniform deltas.
pub trait Normalize: Send + 'static {
    type Frame: Send + 'static;

    /// Converts one frame. An error terminates the stream.
    fn normalize(&mut self, frame: Self::Frame) -> Result<Normalized, EnvoyError>;
}

/// Spawns the producer task for one stream.
///
/// `source` opens the upstream connection and yields its frame stream; a
/// failure there becomes the terminal error without any deltas.
pub fn spawn<F, N>(provider: &'static str, source: F, normalizer: N) -> ChatStream
where
    F: Future<Output = Result<FrameStream<N::Frame>, EnvoyError>> + Send + 'static,
    N: Normalize,
{
    let (producer, stream) = stream::channel(DEFAULT_CAPACITY);
    tokio::spawn(async move {
        match source.await {
            Ok(frames) => run(provider, frames, normalizer, producer).await,
            Err(e) => terminate_with_error(provider, producer, e),
        }
    });
    stream
}

/// Spawns the producer task for an already opened frame stream.
pub fn spawn_frames<N: Normalize>(
    provider: &'static str,
    frames: FrameStream<N::Frame>,
    normalizer: N,
) -> ChatStream {
    spawn(provider, async move { Ok(frames) }, normalizer)
}

async fn run<N: Normalize>(
    provider: &'static str,
    mut frames: FrameStream<N::Frame>,
    mut normalizer: N,
    producer: StreamProducer,
) {
    let mut deltas = 0usize;
    while let Some(frame) = frames.next().await {
        match frame.and_then(|f| normalizer.normalize(f)) {
            Ok(Normalized::Delta(delta)) => {
                metrics::counter!("aienvoy_stream_deltas_total", "provider" => provider)
                    .increment(1);
                deltas += 1;
                if !producer.send(delta).await {
                    debug!(provider, deltas, "stream consumer went away, stopping upstream read");
                    record_terminal(provider, "abandoned");
                    return;
                }
            }
            Ok(Normalized::Skip) => {}
            Ok(Normalized::Done) => break,
            Err(e) => {
                debug!(provider, deltas, "stream failed after partial output");
                terminate_with_error(provider, producer, e);
                return;
            }
        }
    }

    debug!(provider, deltas, "stream reached end of input");
    record_terminal(provider, "eof");
    producer.finish();
}

fn terminate_with_error(provider: &'static str, producer: StreamProducer, e: EnvoyError) {
    warn!(provider, error = %e, "stream terminated with error");
    record_terminal(provider, "error");
    producer.fail(e);
}

fn record_terminal(provider: &'static str, outcome: &'static str) {
    metrics::counter!(
        "aienvoy_stream_terminals_total",
        "provider" => provider,
        "outcome" => outcome
    )
    .increment(1);
}
