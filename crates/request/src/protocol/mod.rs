//! Request abstractions and the body decode session.
//!
//! This module provides the types handler code works with once the transport has parsed the
//! request line and headers.
//!
//! # Architecture
//!
//! - **Request** ([`Request`]): metadata plus the body decode session of one request
//!   - method, path, query, version and lowercased headers
//!   - [`Request::parse_body`] feeds raw body chunks as they arrive
//!
//! - **Response** ([`ResponseHead`]): the head a handler links back to the request
//!
//! - **Body Decoding** ([`body`]): the decoded parameters and file uploads
//!   - [`body::BodyAccumulator`]: one decode session, created lazily from the content type
//!   - [`body::FieldClassifier`]: routes decoded fields to text values or spooled files
//!
//! - **Error Handling** ([`error`]):
//!   - [`ParseError`]: invalid request metadata
//!   - [`DecodeError`]: body decode session failures
//!
//! # Example
//!
//! ```
//! use micro_request::protocol::Request;
//!
//! let mut request = Request::new();
//! request.set_header("Content-Type", "application/x-www-form-urlencoded");
//!
//! request.parse_body(b"name=Ali").unwrap();
//! request.parse_body(b"ce&age=30").unwrap();
//! request.finish_body().unwrap();
//!
//! assert_eq!(request.body().param("name"), Some("Alice"));
//! assert_eq!(request.body().param("age"), Some("30"));
//! ```

mod request;
pub use request::Request;

mod response;
pub use response::ResponseHead;

mod error;
pub use error::DecodeError;
pub use error::ParseError;

pub mod body;
