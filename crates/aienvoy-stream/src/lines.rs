// SPDX-FileCopyrightText: 2026 Aienvoy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Line-oriented framings: raw text lines, NDJSON, and `data:`-prefixed lines.

use aienvoy_core::EnvoyError;
use bytes::{Buf, BytesMut};
use futures::stream::{Stream, StreamExt, TryStreamExt};
use serde::de::DeserializeOwned;
use tokio_util::codec::{Decoder, LinesCodec, LinesCodecError};

use crate::frame::{FrameStream, framed};

/// Longest accepted line. Anything longer is treated as a malformed stream.
pub const MAX_LINE_LENGTH: usize = 4 * 1024 * 1024;

/// Splits on `\n`, stripping a trailing `\r`. An unterminated final line is
/// still emitted when the body ends.
#[derive(Debug)]
pub struct LineDecoder {
    inner: LinesCodec,
}

impl LineDecoder {
    pub fn new() -> Self {
        Self {
            inner: LinesCodec::new_with_max_length(MAX_LINE_LENGTH),
        }
    }
}

impl Default for LineDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for LineDecoder {
    type Item = String;
    type Error = EnvoyError;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<String>, EnvoyError> {
        self.inner.decode(buf).map_err(line_error)
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<String>, EnvoyError> {
        self.inner.decode_eof(buf).map_err(line_error)
    }
}

fn line_error(e: LinesCodecError) -> EnvoyError {
    match e {
        LinesCodecError::MaxLineLengthExceeded => {
            EnvoyError::stream(format!("line exceeds {MAX_LINE_LENGTH} bytes"))
        }
        LinesCodecError::Io(e) => e.into(),
    }
}

/// Frames a byte stream into text lines.
pub fn lines<S, B, E>(bytes: S) -> FrameStream<String>
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: Buf + Send + 'static,
    E: std::error::Error + Send + Sync + 'static,
{
    framed(bytes, LineDecoder::new())
}

/// Frames a byte stream as newline-delimited JSON. Blank lines are skipped.
pub fn ndjson<T, S, B, E>(bytes: S) -> FrameStream<T>
where
    T: DeserializeOwned + Send + 'static,
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: Buf + Send + 'static,
    E: std::error::Error + Send + Sync + 'static,
{
    lines(bytes)
        .try_filter_map(|line| async move {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                return Ok(None);
            }
            serde_json::from_str(trimmed).map(Some).map_err(|e| {
                EnvoyError::stream_from(format!("malformed JSON line: {e}"), e)
            })
        })
        .boxed()
}

/// Returns the payload of a `data:` line, or `None` for any other line or
/// an empty payload.
pub fn strip_data_prefix(line: &str) -> Option<&str> {
    let rest = line.strip_prefix("data:")?;
    let rest = rest.strip_prefix(' ').unwrap_or(rest);
    (!rest.trim().is_empty()).then_some(rest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use serde::Deserialize;

    fn chunks(
        parts: &'static [&'static str],
    ) -> impl Stream<Item = Result<Bytes, std::io::Error>> + Send {
        let items: Vec<_> = parts
            .iter()
            .map(|p| Ok(Bytes::from_static(p.as_bytes())))
            .collect();
        futures::stream::iter(items)
    }

    #[tokio::test]
    async fn lines_reassemble_across_chunk_boundaries() {
        let got: Vec<String> = lines(chunks(&["hel", "lo\r\nwor", "ld\n", "tail"]))
            .try_collect()
            .await
            .unwrap();
        assert_eq!(got, vec!["hello", "world", "tail"]);
    }

    #[tokio::test]
    async fn upstream_error_is_forwarded_as_stream_error() {
        let items = vec![
            Ok(Bytes::from_static(b"first\n")),
            Err(std::io::Error::other("connection reset")),
        ];
        let mut stream = lines(futures::stream::iter(items));
        assert_eq!(stream.next().await.unwrap().unwrap(), "first");
        let err = stream.next().await.unwrap().unwrap_err();
        assert!(matches!(err, EnvoyError::Stream { .. }));
        assert!(err.to_string().contains("connection reset"));
    }

    #[tokio::test]
    async fn invalid_utf8_is_a_stream_error() {
        let items = vec![Ok::<_, std::io::Error>(Bytes::from_static(b"\xff\xfe\n"))];
        let mut stream = lines(futures::stream::iter(items));
        assert!(stream.next().await.unwrap().is_err());
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct Chunk {
        text: String,
    }

    #[tokio::test]
    async fn ndjson_skips_blank_lines() {
        let got: Vec<Chunk> = ndjson(chunks(&["{\"text\":\"a\"}\n\n", "{\"te", "xt\":\"b\"}\n"]))
            .try_collect()
            .await
            .unwrap();
        assert_eq!(
            got,
            vec![Chunk { text: "a".into() }, Chunk { text: "b".into() }]
        );
    }

    #[tokio::test]
    async fn ndjson_malformed_line_errors() {
        let mut stream = ndjson::<Chunk, _, _, _>(chunks(&["{\"text\":\"a\"}\n", "{oops\n"]));
        assert!(stream.next().await.unwrap().is_ok());
        let err = stream.next().await.unwrap().unwrap_err();
        assert!(err.to_string().contains("malformed JSON line"));
    }

    #[test]
    fn data_prefix_is_stripped() {
        assert_eq!(strip_data_prefix("data: {\"a\":1}"), Some("{\"a\":1}"));
        assert_eq!(strip_data_prefix("data:{\"a\":1}"), Some("{\"a\":1}"));
        assert_eq!(strip_data_prefix("data: "), None);
        assert_eq!(strip_data_prefix("event: completion"), None);
        assert_eq!(strip_data_prefix(""), None);
    }
}
