use std::io;
use thiserror::Error;

/// Errors raised while turning transport-level request metadata into a [`Request`](super::Request).
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("invalid header: {reason}")]
    InvalidHeader { reason: String },

    #[error("invalid http version: {0:?}")]
    InvalidVersion(Option<u8>),

    #[error("invalid http method")]
    InvalidMethod,

    #[error("invalid http uri")]
    InvalidUri,
}

impl ParseError {
    pub fn invalid_header<S: ToString>(str: S) -> Self {
        Self::InvalidHeader { reason: str.to_string() }
    }
}

/// Errors raised by a body decode session.
///
/// Every variant is fatal to the session: once `feed` has returned one of them the session
/// refuses further chunks with [`DecodeError::SessionClosed`].
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("body decoder init failed: {reason}")]
    SessionInitFailed { reason: String },

    #[error("malformed body: {reason}")]
    MalformedBody { reason: String },

    #[error("failed to spool field `{field}`: {source}")]
    SinkWriteFailed {
        field: String,
        #[source]
        source: io::Error,
    },

    #[error("body decode session is closed")]
    SessionClosed,
}

impl DecodeError {
    pub fn session_init_failed<S: ToString>(str: S) -> Self {
        Self::SessionInitFailed { reason: str.to_string() }
    }

    pub fn malformed<S: ToString>(str: S) -> Self {
        Self::MalformedBody { reason: str.to_string() }
    }

    pub fn sink_write_failed<S: ToString, E: Into<io::Error>>(field: S, e: E) -> Self {
        Self::SinkWriteFailed { field: field.to_string(), source: e.into() }
    }

    /// Returns true if this error was raised while writing an upload to its temp file.
    #[inline]
    pub fn is_sink_failure(&self) -> bool {
        matches!(self, DecodeError::SinkWriteFailed { .. })
    }
}

/// Low-level I/O errors surfacing through the codec layer mean the byte stream could not be
/// decoded. Upload writes never go through this conversion, see [`DecodeError::sink_write_failed`].
impl From<io::Error> for DecodeError {
    fn from(e: io::Error) -> Self {
        Self::MalformedBody { reason: e.to_string() }
    }
}
