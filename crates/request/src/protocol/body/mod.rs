//! HTTP request body decoding.
//!
//! A request body is decoded while it arrives, one chunk at a time:
//!
//! - [`BodyAccumulator`]: the decode session of one request, creates the decode engine on the
//!   first chunk and owns the decoded [`Body`]
//! - [`FieldClassifier`]: receives the engine's field events and stores them as text
//!   parameters or as [`FileUpload`]s
//! - [`Body`]: the decoded parameters and uploads
//! - [`BodyConfig`]: limits and temp storage settings
//!
//! File content is never held in memory: each file field is spooled to its own temporary file
//! as its bytes are decoded.

mod body;
mod body_accumulator;
mod config;
mod field_classifier;
mod file_upload;

pub use body::Body;
pub use body_accumulator::BodyAccumulator;
pub use body_accumulator::SessionState;
pub use config::BodyConfig;
pub use config::DEFAULT_FILE_CONTENT_TYPE;
pub use config::DEFAULT_MAX_KEY_LEN;
pub use config::DEFAULT_MAX_PART_HEADER_BYTES;
pub use config::DEFAULT_TEMP_PREFIX;
pub use config::MAX_BOUNDARY_LEN;
pub use field_classifier::FieldClassifier;
pub use file_upload::FileUpload;
