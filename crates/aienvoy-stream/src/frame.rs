// SPDX-FileCopyrightText: 2026 Aienvoy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Incremental frame decoding over upstream byte streams.

use aienvoy_core::EnvoyError;
use bytes::Buf;
use futures::stream::{BoxStream, Stream, StreamExt, TryStreamExt};
use tokio_util::codec::{Decoder, FramedRead};
use tokio_util::io::StreamReader;

/// A decoded frame stream. Errors are terminal.
pub type FrameStream<T> = BoxStream<'static, Result<T, EnvoyError>>;

/// Decodes `bytes` with `decoder`, buffering partial frames across chunk
/// boundaries.
///
/// Upstream read errors surface as [`EnvoyError::Stream`]. Bytes left over
/// when the body ends are handed to [`Decoder::decode_eof`].
pub fn framed<S, B, E, D>(bytes: S, decoder: D) -> FrameStream<D::Item>
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: Buf + Send + 'static,
    E: std::error::Error + Send + Sync + 'static,
    D: Decoder<Error = EnvoyError> + Send + 'static,
    D::Item: Send + 'static,
{
    let reader = StreamReader::new(bytes.map_err(std::io::Error::other));
    FramedRead::new(reader, decoder).boxed()
}
