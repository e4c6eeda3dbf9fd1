//! Decoder implementation for `application/x-www-form-urlencoded` bodies.
//!
//! Keys are buffered until their `=` (or `&`) arrives, values are streamed: every decodable
//! byte is emitted as soon as it is available, only an incomplete trailing `%X` escape is held
//! back until the next chunk. This keeps the parameter map independent of how the body was
//! split into chunks.

use bytes::{Buf, Bytes, BytesMut};
use percent_encoding::percent_decode;
use tokio_util::codec::Decoder;
use tracing::trace;

use crate::codec::form::{FieldEvent, FieldItem};
use crate::ensure;
use crate::protocol::DecodeError;
use UrlEncodedState::*;

/// A streaming decoder for url-encoded form bodies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlEncodedDecoder {
    state: UrlEncodedState,
    max_key_len: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum UrlEncodedState {
    /// Buffer a key until `=` or `&`
    Key,
    /// Stream the value of `name` until `&`
    Value { name: String, offset: u64 },
    /// Report the end of `name` before reading the next key
    FieldEnd { name: String },
}

impl UrlEncodedDecoder {
    /// Creates a decoder rejecting keys longer than `max_key_len` bytes.
    pub fn new(max_key_len: usize) -> Self {
        Self { state: Key, max_key_len }
    }

    /// Completes `name` with an empty value.
    fn empty_value(&mut self, name: String) -> FieldItem {
        self.state = FieldEnd { name: name.clone() };
        FieldItem::Data(FieldEvent::text(name, Bytes::new(), 0))
    }

    fn step(&mut self, src: &mut BytesMut, eof: bool) -> Result<Option<FieldItem>, DecodeError> {
        loop {
            match &mut self.state {
                Key => {
                    if src.is_empty() {
                        return Ok(None);
                    }

                    let Some(pos) = src.iter().position(|b| *b == b'=' || *b == b'&') else {
                        ensure!(src.len() <= self.max_key_len, self.key_too_long());
                        if !eof {
                            return Ok(None);
                        }
                        // trailing key without `=`
                        let name = decode_key(&src.split());
                        return Ok(Some(self.empty_value(name)));
                    };
                    ensure!(pos <= self.max_key_len, self.key_too_long());

                    let delimiter = src[pos];
                    let raw_key = src.split_to(pos);
                    src.advance(1);

                    match delimiter {
                        b'=' => {
                            let name = decode_key(&raw_key);
                            trace!(name = %name, "read form key");
                            self.state = Value { name, offset: 0 };
                        }
                        // `&&` or a leading `&`
                        _ if raw_key.is_empty() => {}
                        _ => return Ok(Some(self.empty_value(decode_key(&raw_key)))),
                    }
                }

                Value { name, offset } => {
                    if let Some(pos) = src.iter().position(|b| *b == b'&') {
                        let raw = src.split_to(pos);
                        src.advance(1);

                        let (name, offset) = (std::mem::take(name), *offset);
                        self.state = FieldEnd { name: name.clone() };
                        if raw.is_empty() && offset > 0 {
                            continue;
                        }
                        return Ok(Some(FieldItem::Data(FieldEvent::text(name, decode_value(&raw), offset))));
                    }

                    let complete = if eof { src.len() } else { src.len() - incomplete_escape_len(src) };
                    if complete > 0 {
                        let data = decode_value(&src.split_to(complete));
                        let event = FieldEvent::text(name.clone(), data, *offset);
                        *offset += event.data.len() as u64;
                        trace!(name = %event.name, len = event.data.len(), "read form value bytes");
                        return Ok(Some(FieldItem::Data(event)));
                    }

                    if !eof {
                        return Ok(None);
                    }

                    let (name, offset) = (std::mem::take(name), *offset);
                    if offset == 0 {
                        return Ok(Some(self.empty_value(name)));
                    }
                    self.state = FieldEnd { name };
                }

                FieldEnd { name } => {
                    let name = std::mem::take(name);
                    self.state = Key;
                    return Ok(Some(FieldItem::End(name)));
                }
            }
        }
    }

    fn key_too_long(&self) -> DecodeError {
        DecodeError::malformed(format!("form key exceeds {} bytes", self.max_key_len))
    }
}

impl Decoder for UrlEncodedDecoder {
    type Item = FieldItem;
    type Error = DecodeError;

    /// Decodes the next field item from the buffered body bytes.
    ///
    /// # Returns
    /// - `Ok(Some(FieldItem::Data(_)))` for decoded value bytes (possibly a partial value)
    /// - `Ok(Some(FieldItem::End(_)))` once a value has been terminated by `&`
    /// - `Ok(None)` when more data is needed
    /// - `Err(DecodeError)` if a key exceeds the configured limit
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        self.step(src, false)
    }

    /// Flushes the last pair once the body has ended.
    ///
    /// The final value has no terminating `&`, so it is completed here along with any pending
    /// escape bytes, which are decoded literally.
    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        self.step(src, true)
    }
}

/// Length of a `%` or `%X` escape cut off at the end of `src`.
fn incomplete_escape_len(src: &[u8]) -> usize {
    match src {
        [.., b'%'] => 1,
        [.., b'%', h] if h.is_ascii_hexdigit() => 2,
        _ => 0,
    }
}

/// Decodes `+` and `%XX` escapes. Invalid escapes are kept literally.
pub(crate) fn decode_value(raw: &[u8]) -> Bytes {
    if raw.contains(&b'+') {
        let spaced: Vec<u8> = raw.iter().map(|b| if *b == b'+' { b' ' } else { *b }).collect();
        percent_decode(&spaced).collect::<Vec<u8>>().into()
    } else {
        percent_decode(raw).collect::<Vec<u8>>().into()
    }
}

fn decode_key(raw: &[u8]) -> String {
    String::from_utf8_lossy(&decode_value(raw)).into_owned()
}
