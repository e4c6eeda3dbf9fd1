//! Decoder implementation for `multipart/form-data` bodies.
//!
//! This module decodes multipart bodies as described in
//! [RFC 7578](https://tools.ietf.org/html/rfc7578) and
//! [RFC 2046 Section 5.1](https://tools.ietf.org/html/rfc2046#section-5.1).
//!
//! Part data is streamed: bytes are released as soon as they can no longer be the start of the
//! next delimiter, so a file part of any size passes through the decoder without being
//! buffered in full.

use bytes::{Buf, BytesMut};
use httparse::Status;
use tokio_util::codec::Decoder;
use tracing::trace;

use crate::codec::form::{FieldEvent, FieldItem};
use crate::protocol::DecodeError;
use crate::utils::find_subslice;
use crate::{ensure, protocol::body::MAX_BOUNDARY_LEN};
use MultipartState::*;

/// Maximum number of headers allowed in a single part
const MAX_PART_HEADERS: usize = 16;

/// A streaming decoder for multipart form bodies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultipartDecoder {
    state: MultipartState,
    /// `\r\n--boundary`; the leading CRLF belongs to the delimiter, not to the part data
    delimiter: Vec<u8>,
    max_header_bytes: usize,
    /// No body byte has been discarded yet, a bare `--boundary` may still open the body
    at_body_start: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum MultipartState {
    /// Skip the preamble up to the first boundary
    Preamble,
    /// Read `--` or CRLF after a boundary
    BoundaryTail,
    /// Read the headers of a part
    Headers,
    /// Stream the data of the current part
    Data { part: PartInfo, offset: u64 },
    /// Report the end of a part before reading the next boundary tail
    PartEnd { name: String },
    /// Closing boundary seen, the epilogue is ignored
    End,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct PartInfo {
    name: String,
    filename: Option<String>,
    content_type: Option<String>,
}

impl MultipartDecoder {
    /// Creates a decoder for the given boundary.
    ///
    /// The boundary must be 1 to 70 bytes long, as required by RFC 2046.
    pub fn new(boundary: &str, max_header_bytes: usize) -> Result<Self, DecodeError> {
        ensure!(!boundary.is_empty(), DecodeError::session_init_failed("empty multipart boundary"));
        ensure!(
            boundary.len() <= MAX_BOUNDARY_LEN,
            DecodeError::session_init_failed(format!("multipart boundary exceeds {MAX_BOUNDARY_LEN} bytes"))
        );

        let mut delimiter = Vec::with_capacity(boundary.len() + 4);
        delimiter.extend_from_slice(b"\r\n--");
        delimiter.extend_from_slice(boundary.as_bytes());

        Ok(Self { state: Preamble, delimiter, max_header_bytes, at_body_start: true })
    }

    /// Returns true once the closing boundary has been decoded.
    #[inline]
    pub fn is_done(&self) -> bool {
        self.state == End
    }

    fn read_preamble(&mut self, src: &mut BytesMut) -> Option<()> {
        if self.at_body_start {
            // `--boundary` without the leading CRLF, only valid as the very first bytes
            let dash_boundary = &self.delimiter[2..];
            if src.starts_with(dash_boundary) {
                src.advance(dash_boundary.len());
                self.at_body_start = false;
                self.state = BoundaryTail;
                return Some(());
            }
            if src.len() < dash_boundary.len() && dash_boundary.starts_with(src) {
                return None;
            }
            self.at_body_start = false;
        }

        if let Some(pos) = find_subslice(src, &self.delimiter) {
            src.advance(pos + self.delimiter.len());
            self.state = BoundaryTail;
            return Some(());
        }

        let keep = partial_suffix_len(src, &self.delimiter);
        let discard = src.len() - keep;
        trace!(len = discard, "skip multipart preamble");
        src.advance(discard);
        None
    }

    fn read_boundary_tail(&mut self, src: &mut BytesMut) -> Result<Option<()>, DecodeError> {
        // transport padding
        let padding = src.iter().take_while(|b| **b == b' ' || **b == b'\t').count();
        src.advance(padding);

        if src.len() < 2 {
            return Ok(None);
        }

        match &src[..2] {
            b"--" => {
                trace!("read closing multipart boundary");
                src.advance(2);
                self.state = End;
            }
            b"\r\n" => {
                src.advance(2);
                self.state = Headers;
            }
            _ => return Err(DecodeError::malformed("expected CRLF after multipart boundary")),
        }
        Ok(Some(()))
    }

    fn read_headers(&mut self, src: &mut BytesMut) -> Result<Option<()>, DecodeError> {
        let mut headers = [httparse::EMPTY_HEADER; MAX_PART_HEADERS];

        let (header_len, part) = match httparse::parse_headers(src, &mut headers) {
            Ok(Status::Complete((header_len, headers))) => {
                ensure!(
                    header_len <= self.max_header_bytes,
                    DecodeError::malformed(format!("part headers exceed {} bytes", self.max_header_bytes))
                );
                (header_len, PartInfo::from_headers(headers)?)
            }
            Ok(Status::Partial) => {
                ensure!(
                    src.len() <= self.max_header_bytes,
                    DecodeError::malformed(format!("part headers exceed {} bytes", self.max_header_bytes))
                );
                return Ok(None);
            }
            Err(httparse::Error::TooManyHeaders) => {
                return Err(DecodeError::malformed(format!("part has more than {MAX_PART_HEADERS} headers")));
            }
            Err(e) => return Err(DecodeError::malformed(format!("invalid part headers: {e}"))),
        };

        trace!(name = %part.name, filename = ?part.filename, content_type = ?part.content_type, "read part headers");
        src.advance(header_len);
        self.state = Data { part, offset: 0 };
        Ok(Some(()))
    }

    fn step(&mut self, src: &mut BytesMut) -> Result<Option<FieldItem>, DecodeError> {
        loop {
            let progressed = match &mut self.state {
                Preamble => self.read_preamble(src),
                BoundaryTail => self.read_boundary_tail(src)?,
                Headers => self.read_headers(src)?,
                Data { part, offset } => {
                    if let Some(pos) = find_subslice(src, &self.delimiter) {
                        let data = src.split_to(pos).freeze();
                        src.advance(self.delimiter.len());

                        let (part, offset) = (std::mem::replace(part, PartInfo::empty()), *offset);
                        self.state = PartEnd { name: part.name.clone() };
                        // an empty part still produces one event so the field is recorded
                        if data.is_empty() && offset > 0 {
                            continue;
                        }
                        return Ok(Some(FieldItem::Data(part.into_event(data, offset))));
                    }

                    let available = src.len() - partial_suffix_len(src, &self.delimiter);
                    if available == 0 {
                        return Ok(None);
                    }

                    let data = src.split_to(available).freeze();
                    let event = part.clone().into_event(data, *offset);
                    *offset += event.data.len() as u64;
                    trace!(name = %event.name, len = event.data.len(), "read part data");
                    return Ok(Some(FieldItem::Data(event)));
                }
                PartEnd { name } => {
                    let name = std::mem::take(name);
                    self.state = BoundaryTail;
                    return Ok(Some(FieldItem::End(name)));
                }
                End => {
                    src.clear();
                    return Ok(None);
                }
            };

            if progressed.is_none() {
                return Ok(None);
            }
        }
    }
}

impl Decoder for MultipartDecoder {
    type Item = FieldItem;
    type Error = DecodeError;

    /// Decodes the next field item from the buffered body bytes.
    ///
    /// # Returns
    /// - `Ok(Some(FieldItem::Data(_)))` for a slice of part data
    /// - `Ok(Some(FieldItem::End(_)))` once the delimiter after a part has been read
    /// - `Ok(None)` when more data is needed
    /// - `Err(DecodeError)` if the body is not valid multipart
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        self.step(src)
    }

    /// Decodes remaining items once the body has ended.
    ///
    /// A multipart body is only complete once its closing boundary has been read.
    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.step(src)? {
            Some(item) => Ok(Some(item)),
            None if self.is_done() => Ok(None),
            None => Err(DecodeError::malformed("multipart body ended before the closing boundary")),
        }
    }
}

impl PartInfo {
    fn empty() -> Self {
        Self { name: String::new(), filename: None, content_type: None }
    }

    fn from_headers(headers: &[httparse::Header<'_>]) -> Result<Self, DecodeError> {
        let mut disposition = None;
        let mut content_type = None;

        for header in headers {
            if header.name.eq_ignore_ascii_case("content-disposition") {
                disposition = Some(String::from_utf8_lossy(header.value));
            } else if header.name.eq_ignore_ascii_case("content-type") {
                content_type = Some(String::from_utf8_lossy(header.value).trim().to_string());
            }
        }

        let disposition =
            disposition.ok_or_else(|| DecodeError::malformed("part without Content-Disposition header"))?;
        let (name, filename) = parse_content_disposition(&disposition)?;

        Ok(Self { name, filename, content_type })
    }

    fn into_event(self, data: bytes::Bytes, offset: u64) -> FieldEvent {
        FieldEvent { name: self.name, filename: self.filename, content_type: self.content_type, data, offset }
    }
}

/// Extracts `name` and `filename` from a `form-data` Content-Disposition value.
///
/// A present but empty `filename` is kept as `Some("")`: the part is still a file part.
fn parse_content_disposition(value: &str) -> Result<(String, Option<String>), DecodeError> {
    let mut params = split_params(value).into_iter();

    let disposition_type = params.next().unwrap_or_default();
    ensure!(
        disposition_type.trim().eq_ignore_ascii_case("form-data"),
        DecodeError::malformed(format!("unsupported content disposition `{}`", disposition_type.trim()))
    );

    let mut name = None;
    let mut filename = None;
    for param in params {
        let Some((key, raw_value)) = param.split_once('=') else {
            continue;
        };
        let key = key.trim();
        if key.eq_ignore_ascii_case("name") {
            name = Some(unquote(raw_value));
        } else if key.eq_ignore_ascii_case("filename") {
            filename = Some(unquote(raw_value));
        }
    }

    let name = name.ok_or_else(|| DecodeError::malformed("Content-Disposition without name"))?;
    Ok((name, filename))
}

/// Splits on `;` outside of quoted strings.
fn split_params(value: &str) -> Vec<&str> {
    let mut params = Vec::new();
    let mut in_quotes = false;
    let mut escaped = false;
    let mut start = 0;

    for (i, c) in value.char_indices() {
        match c {
            _ if escaped => escaped = false,
            '\\' if in_quotes => escaped = true,
            '"' => in_quotes = !in_quotes,
            ';' if !in_quotes => {
                params.push(&value[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    params.push(&value[start..]);
    params
}

fn unquote(value: &str) -> String {
    let value = value.trim();
    let Some(inner) = value.strip_prefix('"').and_then(|v| v.strip_suffix('"')) else {
        return value.to_string();
    };

    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => out.extend(chars.next()),
            c => out.push(c),
        }
    }
    out
}

/// Length of the longest suffix of `src` that is a proper prefix of `delimiter`.
///
/// Those bytes may turn into a delimiter once the next chunk arrives, so they are held back.
fn partial_suffix_len(src: &[u8], delimiter: &[u8]) -> usize {
    let max = src.len().min(delimiter.len() - 1);
    (1..=max).rev().find(|len| src.ends_with(&delimiter[..*len])).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use indoc::indoc;

    use super::*;

    fn crlf(s: &str) -> BytesMut {
        BytesMut::from(s.replace('\n', "\r\n").as_bytes())
    }

    fn drain(decoder: &mut MultipartDecoder, src: &mut BytesMut) -> Vec<FieldItem> {
        let mut items = Vec::new();
        while let Some(item) = decoder.decode(src).unwrap() {
            items.push(item);
        }
        items
    }

    #[test]
    fn test_basic() {
        let mut buffer = crlf(indoc! {r#"
            --XyZ
            Content-Disposition: form-data; name="note"

            hi
            --XyZ
            Content-Disposition: form-data; name="doc"; filename="a.txt"
            Content-Type: text/plain

            hello world
            --XyZ--
        "#});
        let mut decoder = MultipartDecoder::new("XyZ", 8 * 1024).unwrap();

        let items = drain(&mut decoder, &mut buffer);
        assert_eq!(items.len(), 4);

        let note = items[0].as_event().unwrap();
        assert_eq!(note.name, "note");
        assert_eq!(note.filename, None);
        assert_eq!(&note.data[..], b"hi");
        assert_eq!(items[1], FieldItem::End("note".into()));

        let doc = items[2].as_event().unwrap();
        assert_eq!(doc.name, "doc");
        assert_eq!(doc.filename.as_deref(), Some("a.txt"));
        assert_eq!(doc.content_type.as_deref(), Some("text/plain"));
        assert_eq!(&doc.data[..], b"hello world");
        assert_eq!(items[3], FieldItem::End("doc".into()));

        assert!(decoder.is_done());
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_byte_by_byte() {
        let body = crlf(indoc! {r#"
            preamble text
            --b
            Content-Disposition: form-data; name="f"; filename="x.bin"

            0123456789
            --b--
            epilogue
        "#});
        let mut decoder = MultipartDecoder::new("b", 8 * 1024).unwrap();
        let mut buffer = BytesMut::new();
        let mut data = Vec::new();
        let mut ends = 0;

        for byte in body.iter() {
            buffer.extend_from_slice(&[*byte]);
            for item in drain(&mut decoder, &mut buffer) {
                match item {
                    FieldItem::Data(event) => {
                        assert_eq!(event.offset, data.len() as u64);
                        data.extend_from_slice(&event.data);
                    }
                    FieldItem::End(name) => {
                        assert_eq!(name, "f");
                        ends += 1;
                    }
                }
            }
        }

        assert_eq!(&data[..], b"0123456789");
        assert_eq!(ends, 1);
        assert!(decoder.is_done());
    }

    #[test]
    fn test_data_resembling_delimiter() {
        let mut buffer = crlf(indoc! {r#"
            --bound
            Content-Disposition: form-data; name="f"; filename="x"

            line
            --boun
            --bound--
        "#});
        let mut decoder = MultipartDecoder::new("bound", 8 * 1024).unwrap();

        let data: Vec<u8> =
            drain(&mut decoder, &mut buffer).into_iter().filter_map(FieldItem::into_event).flat_map(|e| e.data).collect();
        assert_eq!(&data[..], b"line\r\n--boun");
    }

    #[test]
    fn test_empty_part_and_empty_filename() {
        let mut buffer = crlf(indoc! {r#"
            --b
            Content-Disposition: form-data; name="upload"; filename=""


            --b--
        "#});
        let mut decoder = MultipartDecoder::new("b", 8 * 1024).unwrap();

        let items = drain(&mut decoder, &mut buffer);
        let event = items[0].as_event().unwrap();
        assert_eq!(event.filename.as_deref(), Some(""));
        assert!(event.is_file());
        assert_eq!(event.data, Bytes::new());
    }

    #[test]
    fn test_bare_boundary_only_at_body_start() {
        let body = b"xx--b\r\nContent-Disposition: form-data; name=\"a\"\r\n\r\nv\r\n--b--";

        let mut whole_decoder = MultipartDecoder::new("b", 8 * 1024).unwrap();
        let whole = drain(&mut whole_decoder, &mut BytesMut::from(&body[..]));

        let mut split_decoder = MultipartDecoder::new("b", 8 * 1024).unwrap();
        let mut buffer = BytesMut::from(&body[..2]);
        let mut split = drain(&mut split_decoder, &mut buffer);
        buffer.extend_from_slice(&body[2..]);
        split.extend(drain(&mut split_decoder, &mut buffer));

        assert!(whole.is_empty());
        assert_eq!(whole, split);
        assert!(whole_decoder.is_done());
        assert!(split_decoder.is_done());
    }

    #[test]
    fn test_missing_disposition() {
        let mut buffer = crlf("--b\nContent-Type: text/plain\n\nhi\n--b--\n");
        let mut decoder = MultipartDecoder::new("b", 8 * 1024).unwrap();

        let result = decoder.decode(&mut buffer);
        assert!(matches!(result, Err(DecodeError::MalformedBody { .. })));
    }

    #[test]
    fn test_garbage_after_boundary() {
        let mut buffer = BytesMut::from(&b"--bXX"[..]);
        let mut decoder = MultipartDecoder::new("b", 8 * 1024).unwrap();

        let result = decoder.decode(&mut buffer);
        assert!(matches!(result, Err(DecodeError::MalformedBody { .. })));
    }

    #[test]
    fn test_headers_too_large() {
        let mut buffer = BytesMut::from(&b"--b\r\nContent-Disposition: form-data; name=\"aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa"[..]);
        let mut decoder = MultipartDecoder::new("b", 32).unwrap();

        let result = decoder.decode(&mut buffer);
        assert!(matches!(result, Err(DecodeError::MalformedBody { .. })));
    }

    #[test]
    fn test_truncated_body_on_eof() {
        let mut buffer = crlf("--b\nContent-Disposition: form-data; name=\"a\"\n\npartial");
        let mut decoder = MultipartDecoder::new("b", 8 * 1024).unwrap();

        let _ = drain(&mut decoder, &mut buffer);
        let result = loop {
            match decoder.decode_eof(&mut buffer) {
                Ok(Some(_)) => continue,
                other => break other,
            }
        };
        assert!(matches!(result, Err(DecodeError::MalformedBody { .. })));
    }

    #[test]
    fn test_invalid_boundary() {
        assert!(MultipartDecoder::new("", 1024).is_err());
        assert!(MultipartDecoder::new(&"x".repeat(71), 1024).is_err());
    }

    #[test]
    fn test_content_disposition() {
        assert_eq!(
            parse_content_disposition(r#"form-data; name="a;b"; filename="x \"y\".txt""#).unwrap(),
            ("a;b".to_string(), Some("x \"y\".txt".to_string()))
        );
        assert_eq!(parse_content_disposition("form-data; name=plain").unwrap(), ("plain".to_string(), None));
        assert!(parse_content_disposition(r#"attachment; name="a""#).is_err());
        assert!(parse_content_disposition("form-data; filename=\"a\"").is_err());
    }

    #[test]
    fn test_partial_suffix_len() {
        assert_eq!(partial_suffix_len(b"abc\r\n--", b"\r\n--bound"), 4);
        assert_eq!(partial_suffix_len(b"abc\r", b"\r\n--bound"), 1);
        assert_eq!(partial_suffix_len(b"abc", b"\r\n--bound"), 0);
    }
}
