//! Incremental HTTP request body decoding
//!
//! This crate represents one inbound HTTP request while it is assembled from a live
//! connection. The transport hands over the parsed request line and headers, then the raw body
//! bytes chunk by chunk, in whatever sizes they arrive. The body is decoded on the fly:
//!
//! - `application/x-www-form-urlencoded` and `multipart/form-data` bodies
//! - text fields kept in memory as UTF-8 strings
//! - file fields spooled to temporary files, never buffered whole in memory
//! - decode results independent of how the body was split into chunks
//!
//! # Example
//!
//! ```
//! use micro_request::protocol::Request;
//! use micro_request::protocol::body::BodyConfig;
//!
//! let dir = tempfile::tempdir().unwrap();
//! let mut request = Request::with_config(BodyConfig::new().temp_dir(dir.path()));
//! request.set_header("content-type", "multipart/form-data; boundary=X");
//!
//! let body: &[u8] = b"--X\r\n\
//!     Content-Disposition: form-data; name=\"note\"\r\n\r\n\
//!     hi\r\n\
//!     --X\r\n\
//!     Content-Disposition: form-data; name=\"doc\"; filename=\"a.bin\"\r\n\r\n\
//!     \x01\x02\x03\r\n\
//!     --X--\r\n";
//!
//! for chunk in body.chunks(7) {
//!     request.parse_body(chunk).unwrap();
//! }
//! request.finish_body().unwrap();
//!
//! assert_eq!(request.body().param("note"), Some("hi"));
//!
//! let doc = request.body().file("doc").unwrap();
//! assert_eq!(doc.filename(), "a.bin");
//! assert_eq!(doc.content_type(), "application/octet-stream");
//! assert_eq!(doc.read_to_vec().unwrap(), [1, 2, 3]);
//! ```
//!
//! # Architecture
//!
//! The crate is organized into two modules:
//!
//! - [`protocol`]: the [`protocol::Request`] aggregate, the decoded body and error types
//! - [`codec`]: the incremental url-encoded and multipart decoders
//!
//! # Core Components
//!
//! ## Decode Session
//!
//! [`protocol::body::BodyAccumulator`] owns the decode session of one request. It creates the
//! decoder from the content type on the first chunk and fails permanently on the first error:
//! later chunks are refused with [`protocol::DecodeError::SessionClosed`].
//!
//! ## Field Events
//!
//! The decoders in [`codec`] turn raw bytes into [`codec::FieldEvent`]s and hand them to a
//! [`codec::FieldSink`]. The request side implements the sink with
//! [`protocol::body::FieldClassifier`], which writes text values into the body and appends file
//! content to the field's temporary file.
//!
//! # Limitations
//!
//! - Only url-encoded and multipart bodies are decoded
//! - Nested `multipart/mixed` parts are stored as opaque field content
//! - Maximum part header size: 8KB by default
//! - Maximum number of headers per part: 16

pub mod codec;
pub mod protocol;

mod utils;
pub(crate) use utils::ensure;
