//! The decode engine of a body session.
//!
//! [`FormDecoder`] selects the decoding strategy from the request's content type, and
//! [`FormProcessor`] buffers raw chunks and dispatches every decoded item to a [`FieldSink`].

use bytes::BytesMut;
use mime::Mime;
use tokio_util::codec::Decoder;
use tracing::debug;

use crate::codec::form::multipart_decoder::MultipartDecoder;
use crate::codec::form::urlencoded_decoder::UrlEncodedDecoder;
use crate::codec::form::{FieldItem, FieldSink};
use crate::protocol::DecodeError;
use crate::protocol::body::BodyConfig;

/// A unified decoder for form bodies.
///
/// This decoder supports two encodings:
/// - `application/x-www-form-urlencoded`
/// - `multipart/form-data`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormDecoder {
    kind: Kind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Kind {
    UrlEncoded(UrlEncodedDecoder),
    Multipart(MultipartDecoder),
}

impl FormDecoder {
    /// Creates a decoder for url-encoded bodies.
    pub fn url_encoded(config: &BodyConfig) -> Self {
        Self { kind: Kind::UrlEncoded(UrlEncodedDecoder::new(config.get_max_key_len())) }
    }

    /// Creates a decoder for multipart bodies delimited by `boundary`.
    pub fn multipart(boundary: &str, config: &BodyConfig) -> Result<Self, DecodeError> {
        let decoder = MultipartDecoder::new(boundary, config.get_max_part_header_bytes())?;
        Ok(Self { kind: Kind::Multipart(decoder) })
    }

    /// Selects the decoder matching a `Content-Type` header value.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::SessionInitFailed`] if the content type is missing, cannot be
    /// parsed, is neither url-encoded nor multipart form data, or lacks a valid boundary.
    pub fn from_content_type(content_type: Option<&str>, config: &BodyConfig) -> Result<Self, DecodeError> {
        let content_type = content_type.ok_or_else(|| DecodeError::session_init_failed("missing content type"))?;
        let mime: Mime = content_type
            .parse()
            .map_err(|e| DecodeError::session_init_failed(format!("invalid content type `{content_type}`: {e}")))?;

        if mime.type_() == mime::APPLICATION && mime.subtype() == mime::WWW_FORM_URLENCODED {
            debug!("decode url-encoded body");
            return Ok(Self::url_encoded(config));
        }

        if mime.type_() == mime::MULTIPART && mime.subtype() == mime::FORM_DATA {
            let boundary = mime
                .get_param(mime::BOUNDARY)
                .ok_or_else(|| DecodeError::session_init_failed("multipart content type without boundary"))?;
            debug!(boundary = boundary.as_str(), "decode multipart body");
            return Self::multipart(boundary.as_str(), config);
        }

        Err(DecodeError::session_init_failed(format!("unsupported content type `{mime}`")))
    }

    /// Returns whether this decoder handles url-encoded bodies.
    pub fn is_url_encoded(&self) -> bool {
        matches!(self.kind, Kind::UrlEncoded(_))
    }

    /// Returns whether this decoder handles multipart bodies.
    pub fn is_multipart(&self) -> bool {
        matches!(self.kind, Kind::Multipart(_))
    }
}

/// Delegates to the decoder matching the body encoding.
impl Decoder for FormDecoder {
    type Item = FieldItem;
    type Error = DecodeError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match &mut self.kind {
            Kind::UrlEncoded(decoder) => decoder.decode(src),
            Kind::Multipart(decoder) => decoder.decode(src),
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match &mut self.kind {
            Kind::UrlEncoded(decoder) => decoder.decode_eof(src),
            Kind::Multipart(decoder) => decoder.decode_eof(src),
        }
    }
}

/// Drives a [`FormDecoder`] over incrementally arriving body chunks.
///
/// Bytes the decoder cannot consume yet (a partial key, escape or delimiter) stay in the
/// internal buffer until the next chunk.
#[derive(Debug)]
pub struct FormProcessor {
    decoder: FormDecoder,
    buffer: BytesMut,
}

impl FormProcessor {
    pub fn new(decoder: FormDecoder) -> Self {
        Self { decoder, buffer: BytesMut::new() }
    }

    /// Number of bytes waiting for more input.
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Decodes `chunk`, handing every decoded item to `sink` before returning.
    ///
    /// Stops at the first error, whether raised by the decoder or by the sink.
    pub fn process<S: FieldSink + ?Sized>(&mut self, chunk: &[u8], sink: &mut S) -> Result<(), DecodeError> {
        self.buffer.extend_from_slice(chunk);
        while let Some(item) = self.decoder.decode(&mut self.buffer)? {
            dispatch(item, sink)?;
        }
        Ok(())
    }

    /// Signals the end of the body and flushes what is still buffered.
    pub fn finish<S: FieldSink + ?Sized>(&mut self, sink: &mut S) -> Result<(), DecodeError> {
        while let Some(item) = self.decoder.decode_eof(&mut self.buffer)? {
            dispatch(item, sink)?;
        }
        Ok(())
    }
}

fn dispatch<S: FieldSink + ?Sized>(item: FieldItem, sink: &mut S) -> Result<(), DecodeError> {
    match item {
        FieldItem::Data(event) => sink.on_field(event),
        FieldItem::End(name) => sink.on_field_end(&name),
    }
}
