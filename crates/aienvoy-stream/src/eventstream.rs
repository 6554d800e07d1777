// SPDX-FileCopyrightText: 2026 Aienvoy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! AWS `application/vnd.amazon.eventstream` binary framing.
//!
//! Each message is laid out as:
//!
//! ```text
//! [total_len: u32][headers_len: u32][prelude_crc: u32]
//! [headers: headers_len bytes][payload][message_crc: u32]
//! ```
//!
//! All integers are big-endian. `prelude_crc` covers the first 8 bytes and
//! `message_crc` covers everything before it. Both are CRC-32 (IEEE).

use aienvoy_core::EnvoyError;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use flate2::Crc;
use futures::stream::Stream;
use tokio_util::codec::Decoder;

use crate::frame::{FrameStream, framed};

const PRELUDE_LEN: usize = 12;
const CRC_LEN: usize = 4;
const MIN_MESSAGE_LEN: usize = PRELUDE_LEN + CRC_LEN;
/// Upper bound accepted for a single message.
pub const MAX_MESSAGE_LEN: usize = 16 * 1024 * 1024;

/// A typed header value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderValue {
    Bool(bool),
    Byte(i8),
    Short(i16),
    Int(i32),
    Long(i64),
    Bytes(Bytes),
    String(String),
    Timestamp(i64),
    Uuid([u8; 16]),
}

/// One decoded event-stream message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventMessage {
    pub headers: Vec<(String, HeaderValue)>,
    pub payload: Bytes,
}

impl EventMessage {
    /// Returns the value of a string header.
    pub fn header_str(&self, name: &str) -> Option<&str> {
        self.headers.iter().find_map(|(k, v)| match v {
            HeaderValue::String(s) if k == name => Some(s.as_str()),
            _ => None,
        })
    }

    /// `:message-type` header (`event`, `exception`, or `error`).
    pub fn message_type(&self) -> Option<&str> {
        self.header_str(":message-type")
    }

    /// `:event-type` header.
    pub fn event_type(&self) -> Option<&str> {
        self.header_str(":event-type")
    }

    /// Serializes the message, computing both checksums.
    pub fn encode(&self) -> Bytes {
        let mut headers = BytesMut::new();
        for (name, value) in &self.headers {
            headers.put_u8(name.len() as u8);
            headers.put_slice(name.as_bytes());
            match value {
                HeaderValue::Bool(true) => headers.put_u8(0),
                HeaderValue::Bool(false) => headers.put_u8(1),
                HeaderValue::Byte(v) => {
                    headers.put_u8(2);
                    headers.put_i8(*v);
                }
                HeaderValue::Short(v) => {
                    headers.put_u8(3);
                    headers.put_i16(*v);
                }
                HeaderValue::Int(v) => {
                    headers.put_u8(4);
                    headers.put_i32(*v);
                }
                HeaderValue::Long(v) => {
                    headers.put_u8(5);
                    headers.put_i64(*v);
                }
                HeaderValue::Bytes(v) => {
                    headers.put_u8(6);
                    headers.put_u16(v.len() as u16);
                    headers.put_slice(v);
                }
                HeaderValue::String(v) => {
                    headers.put_u8(7);
                    headers.put_u16(v.len() as u16);
                    headers.put_slice(v.as_bytes());
                }
                HeaderValue::Timestamp(v) => {
                    headers.put_u8(8);
                    headers.put_i64(*v);
                }
                HeaderValue::Uuid(v) => {
                    headers.put_u8(9);
                    headers.put_slice(v);
                }
            }
        }

        let total_len = MIN_MESSAGE_LEN + headers.len() + self.payload.len();
        let mut out = BytesMut::with_capacity(total_len);
        out.put_u32(total_len as u32);
        out.put_u32(headers.len() as u32);
        out.put_u32(crc32(&out[..8]));
        out.put_slice(&headers);
        out.put_slice(&self.payload);
        let checksum = crc32(&out);
        out.put_u32(checksum);
        out.freeze()
    }
}

fn crc32(data: &[u8]) -> u32 {
    let mut crc = Crc::new();
    crc.update(data);
    crc.sum()
}

fn malformed(message: impl std::fmt::Display) -> EnvoyError {
    EnvoyError::stream(format!("malformed event-stream message: {message}"))
}

/// Codec for AWS event-stream messages.
#[derive(Debug, Default)]
pub struct EventStreamDecoder;

impl Decoder for EventStreamDecoder {
    type Item = EventMessage;
    type Error = EnvoyError;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<EventMessage>, EnvoyError> {
        if buf.len() < PRELUDE_LEN {
            return Ok(None);
        }

        let total_len = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]) as usize;
        let headers_len = u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]) as usize;
        let prelude_crc = u32::from_be_bytes([buf[8], buf[9], buf[10], buf[11]]);

        if crc32(&buf[..8]) != prelude_crc {
            return Err(malformed("prelude checksum mismatch"));
        }
        if !(MIN_MESSAGE_LEN..=MAX_MESSAGE_LEN).contains(&total_len) {
            return Err(malformed(format!("invalid total length {total_len}")));
        }
        if headers_len > total_len - MIN_MESSAGE_LEN {
            return Err(malformed(format!(
                "headers length {headers_len} exceeds message length {total_len}"
            )));
        }

        if buf.len() < total_len {
            buf.reserve(total_len - buf.len());
            return Ok(None);
        }

        let frame = buf.split_to(total_len).freeze();
        let body_end = total_len - CRC_LEN;
        let message_crc = u32::from_be_bytes([
            frame[body_end],
            frame[body_end + 1],
            frame[body_end + 2],
            frame[body_end + 3],
        ]);
        if crc32(&frame[..body_end]) != message_crc {
            return Err(malformed("message checksum mismatch"));
        }

        let headers_end = PRELUDE_LEN + headers_len;
        let headers = parse_headers(&frame[PRELUDE_LEN..headers_end])?;
        let payload = frame.slice(headers_end..body_end);

        Ok(Some(EventMessage { headers, payload }))
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<EventMessage>, EnvoyError> {
        match self.decode(buf)? {
            Some(message) => Ok(Some(message)),
            None if buf.is_empty() => Ok(None),
            None => Err(malformed(format!(
                "stream ended with {} bytes of a partial message",
                buf.len()
            ))),
        }
    }
}

fn take<'a>(cursor: &mut &'a [u8], n: usize) -> Result<&'a [u8], EnvoyError> {
    if cursor.len() < n {
        return Err(malformed("truncated header"));
    }
    let (head, rest) = cursor.split_at(n);
    *cursor = rest;
    Ok(head)
}

fn parse_headers(mut cursor: &[u8]) -> Result<Vec<(String, HeaderValue)>, EnvoyError> {
    let mut headers = Vec::new();
    while !cursor.is_empty() {
        let name_len = take(&mut cursor, 1)?[0] as usize;
        let name = std::str::from_utf8(take(&mut cursor, name_len)?)
            .map_err(|_| malformed("header name is not UTF-8"))?
            .to_string();
        let value_type = take(&mut cursor, 1)?[0];
        let value = match value_type {
            0 => HeaderValue::Bool(true),
            1 => HeaderValue::Bool(false),
            2 => HeaderValue::Byte(take(&mut cursor, 1)?.get_i8()),
            3 => HeaderValue::Short(take(&mut cursor, 2)?.get_i16()),
            4 => HeaderValue::Int(take(&mut cursor, 4)?.get_i32()),
            5 => HeaderValue::Long(take(&mut cursor, 8)?.get_i64()),
            6 => {
                let len = take(&mut cursor, 2)?.get_u16() as usize;
                HeaderValue::Bytes(Bytes::copy_from_slice(take(&mut cursor, len)?))
            }
            7 => {
                let len = take(&mut cursor, 2)?.get_u16() as usize;
                let value = std::str::from_utf8(take(&mut cursor, len)?)
                    .map_err(|_| malformed(format!("header `{name}` is not UTF-8")))?;
                HeaderValue::String(value.to_string())
            }
            8 => HeaderValue::Timestamp(take(&mut cursor, 8)?.get_i64()),
            9 => {
                let mut uuid = [0u8; 16];
                uuid.copy_from_slice(take(&mut cursor, 16)?);
                HeaderValue::Uuid(uuid)
            }
            other => return Err(malformed(format!("unknown header type {other}"))),
        };
        headers.push((name, value));
    }
    Ok(headers)
}

/// Frames a byte stream as event-stream messages.
pub fn messages<S, B, E>(bytes: S) -> FrameStream<EventMessage>
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: Buf + Send + 'static,
    E: std::error::Error + Send + Sync + 'static,
{
    framed(bytes, EventStreamDecoder)
}
