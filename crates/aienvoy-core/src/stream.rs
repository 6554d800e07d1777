// SPDX-FileCopyrightText: 2026 Aienvoy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The streaming envelope shared by every provider.
//!
//! A stream is a pair of disjoint channels: a bounded data channel carrying
//! [`StreamDelta`] records in order, and a one-shot terminal channel carrying
//! either end-of-stream or the error that ended the stream. The producer side
//! ([`StreamProducer`]) is owned by exactly one task; the consumer side
//! ([`ChatStream`]) drains data until it observes the terminal signal.
//!
//! Exactly one terminal signal is delivered per stream. [`StreamProducer::finish`]
//! and [`StreamProducer::fail`] consume the producer, and dropping a producer
//! that never terminated (early return, panic, aborted task) reports a
//! [`EnvoyError::Stream`] instead.

use futures::StreamExt;
use futures::stream::BoxStream;
use tokio::sync::{mpsc, oneshot};

use crate::error::EnvoyError;
use crate::types::{StreamDelta, TokenUsage};

/// Default capacity of the data channel.
pub const DEFAULT_CAPACITY: usize = 64;

/// How a stream ended, as sent on the terminal channel.
#[derive(Debug)]
pub enum StreamEnd {
    /// Upstream reached end-of-stream normally.
    Done,
    /// Upstream failed; no further data follows.
    Failed(EnvoyError),
}

/// What a consumer observes when reading a [`ChatStream`].
#[derive(Debug)]
pub enum StreamEvent {
    /// One incremental record.
    Delta(StreamDelta),
    /// The terminal signal. Observed exactly once, after all deltas.
    End(Result<(), EnvoyError>),
}

/// Creates a connected producer/consumer pair.
pub fn channel(capacity: usize) -> (StreamProducer, ChatStream) {
    let (data_tx, data_rx) = mpsc::channel(capacity.max(1));
    let (terminal_tx, terminal_rx) = oneshot::channel();
    (
        StreamProducer {
            data: data_tx,
            terminal: Some(terminal_tx),
        },
        ChatStream {
            data: data_rx,
            terminal: Some(terminal_rx),
        },
    )
}

/// Write half of a stream. Owned by the single producer task.
#[derive(Debug)]
pub struct StreamProducer {
    data: mpsc::Sender<StreamDelta>,
    terminal: Option<oneshot::Sender<StreamEnd>>,
}

impl StreamProducer {
    /// Pushes one record. Returns `false` once the consumer has gone away,
    /// at which point the producer should stop reading upstream.
    pub async fn send(&self, delta: StreamDelta) -> bool {
        self.data.send(delta).await.is_ok()
    }

    /// Returns `true` when the consumer has been dropped.
    pub fn is_closed(&self) -> bool {
        self.data.is_closed()
    }

    /// Signals end-of-stream.
    pub fn finish(mut self) {
        self.terminate(StreamEnd::Done);
    }

    /// Signals that the stream ended with `err`.
    pub fn fail(mut self, err: EnvoyError) {
        self.terminate(StreamEnd::Failed(err));
    }

    fn terminate(&mut self, end: StreamEnd) {
        if let Some(tx) = self.terminal.take() {
            // The consumer may already be gone; nothing left to notify.
            let _ = tx.send(end);
        }
    }
}

impl Drop for StreamProducer {
    fn drop(&mut self) {
        if self.terminal.is_some() {
            self.terminate(StreamEnd::Failed(EnvoyError::stream(
                "stream producer dropped before completion",
            )));
        }
    }
}

/// Read half of a stream.
#[derive(Debug)]
pub struct ChatStream {
    data: mpsc::Receiver<StreamDelta>,
    terminal: Option<oneshot::Receiver<StreamEnd>>,
}

impl ChatStream {
    /// A stream that ends immediately with `err`.
    pub fn failed(err: EnvoyError) -> Self {
        let (producer, stream) = channel(1);
        producer.fail(err);
        stream
    }

    /// Receives the next event.
    ///
    /// Buffered deltas are always drained before the terminal signal.
    /// After [`StreamEvent::End`] has been returned, this yields `None`.
    pub async fn next_event(&mut self) -> Option<StreamEvent> {
        let terminal = self.terminal.as_mut()?;

        // The data channel only closes once the producer is dropped, and the
        // producer always writes the terminal channel before or while dropping.
        if let Some(delta) = self.data.recv().await {
            return Some(StreamEvent::Delta(delta));
        }

        let end = match terminal.await {
            Ok(StreamEnd::Done) => Ok(()),
            Ok(StreamEnd::Failed(err)) => Err(err),
            Err(_) => Err(EnvoyError::stream("stream terminal channel closed")),
        };
        self.terminal = None;
        Some(StreamEvent::End(end))
    }

    /// Adapts this stream into a [`futures::Stream`] of events.
    pub fn into_stream(self) -> BoxStream<'static, StreamEvent> {
        futures::stream::unfold(self, |mut stream| async move {
            stream.next_event().await.map(|event| (event, stream))
        })
        .boxed()
    }

    /// Drains the stream, concatenating all delta text.
    pub async fn collect(mut self) -> Result<CollectedStream, EnvoyError> {
        let mut collected = CollectedStream::default();
        while let Some(event) = self.next_event().await {
            match event {
                StreamEvent::Delta(delta) => collected.push(delta),
                StreamEvent::End(result) => {
                    result?;
                    break;
                }
            }
        }
        Ok(collected)
    }
}

/// The fold of a fully drained stream.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CollectedStream {
    pub text: String,
    pub model: String,
    pub finish_reason: Option<String>,
    pub usage: Option<TokenUsage>,
    pub deltas: usize,
}

impl CollectedStream {
    /// Folds one delta into the accumulated state.
    pub fn push(&mut self, delta: StreamDelta) {
        self.text.push_str(&delta.delta_text);
        if !delta.model.is_empty() {
            self.model = delta.model;
        }
        if delta.finish_reason.is_some() {
            self.finish_reason = delta.finish_reason;
        }
        if delta.usage.is_some() {
            self.usage = delta.usage;
        }
        self.deltas += 1;
    }
}
