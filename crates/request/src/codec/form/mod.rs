//! Form body decoding.
//!
//! - [`FormDecoder`]: selects url-encoded or multipart decoding from the content type
//! - [`FormProcessor`]: buffers raw chunks and drives the decoder
//! - [`FieldSink`]: receives the decoded [`FieldEvent`]s

mod field_event;
mod form_decoder;
mod multipart_decoder;
mod urlencoded_decoder;

pub use field_event::FieldEvent;
pub use field_event::FieldItem;
pub use field_event::FieldSink;
pub use form_decoder::FormDecoder;
pub use form_decoder::FormProcessor;
pub use multipart_decoder::MultipartDecoder;
pub use urlencoded_decoder::UrlEncodedDecoder;
