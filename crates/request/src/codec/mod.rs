//! Body codec module for decoding form encoded request bodies
//!
//! This module provides the decode engines used by a body session. Each engine is a
//! [`tokio_util::codec::Decoder`] state machine that turns buffered body bytes into
//! [`FieldItem`]s, so bodies can be decoded while they are still arriving.
//!
//! # Components
//!
//! - [`FormDecoder`]: Chooses the decoding strategy from the `Content-Type` header
//!   - [`UrlEncodedDecoder`]: `application/x-www-form-urlencoded`
//!   - [`MultipartDecoder`]: `multipart/form-data`
//! - [`FormProcessor`]: Feeds raw chunks and dispatches decoded items to a [`FieldSink`]
//!
//! # Example
//!
//! ```
//! use micro_request::codec::{FieldEvent, FieldSink, FormDecoder, FormProcessor};
//! use micro_request::protocol::DecodeError;
//! use micro_request::protocol::body::BodyConfig;
//!
//! struct Names(Vec<String>);
//!
//! impl FieldSink for Names {
//!     fn on_field(&mut self, event: FieldEvent) -> Result<(), DecodeError> {
//!         self.0.push(event.name);
//!         Ok(())
//!     }
//! }
//!
//! let config = BodyConfig::default();
//! let decoder = FormDecoder::from_content_type(Some("application/x-www-form-urlencoded"), &config).unwrap();
//! let mut processor = FormProcessor::new(decoder);
//! let mut names = Names(Vec::new());
//!
//! processor.process(b"a=1&b=2", &mut names).unwrap();
//! processor.finish(&mut names).unwrap();
//! assert_eq!(names.0, vec!["a", "b"]);
//! ```

mod form;

pub use form::FieldEvent;
pub use form::FieldItem;
pub use form::FieldSink;
pub use form::FormDecoder;
pub use form::FormProcessor;
pub use form::MultipartDecoder;
pub use form::UrlEncodedDecoder;
