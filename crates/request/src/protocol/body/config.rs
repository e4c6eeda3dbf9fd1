//! Limits and storage settings of a body decode session.

use std::path::{Path, PathBuf};

/// Default maximum length of a url-encoded key
pub const DEFAULT_MAX_KEY_LEN: usize = 64 * 1024;

/// Default maximum size of the header section of one multipart part
pub const DEFAULT_MAX_PART_HEADER_BYTES: usize = 8 * 1024;

/// RFC 2046 limits multipart boundaries to 70 characters
pub const MAX_BOUNDARY_LEN: usize = 70;

/// Default prefix of spooled upload files
pub const DEFAULT_TEMP_PREFIX: &str = "upload-";

/// Content type recorded for file parts that do not declare one
pub const DEFAULT_FILE_CONTENT_TYPE: &str = "application/octet-stream";

/// Configuration of a body decode session.
///
/// ```
/// use micro_request::protocol::body::BodyConfig;
///
/// let config = BodyConfig::new().temp_dir("/var/tmp/uploads").max_key_len(1024);
/// assert_eq!(config.get_max_key_len(), 1024);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BodyConfig {
    temp_dir: Option<PathBuf>,
    temp_prefix: String,
    max_key_len: usize,
    max_part_header_bytes: usize,
}

impl Default for BodyConfig {
    fn default() -> Self {
        Self {
            temp_dir: None,
            temp_prefix: DEFAULT_TEMP_PREFIX.to_string(),
            max_key_len: DEFAULT_MAX_KEY_LEN,
            max_part_header_bytes: DEFAULT_MAX_PART_HEADER_BYTES,
        }
    }
}

impl BodyConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spool uploads into `dir` instead of the system temp directory.
    #[must_use]
    pub fn temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = Some(dir.into());
        self
    }

    /// Prefix of spooled upload file names.
    #[must_use]
    pub fn temp_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.temp_prefix = prefix.into();
        self
    }

    /// Maximum length in bytes of a url-encoded key.
    #[must_use]
    pub fn max_key_len(mut self, len: usize) -> Self {
        self.max_key_len = len;
        self
    }

    /// Maximum size in bytes of the headers of one multipart part.
    #[must_use]
    pub fn max_part_header_bytes(mut self, len: usize) -> Self {
        self.max_part_header_bytes = len;
        self
    }

    pub fn get_temp_dir(&self) -> Option<&Path> {
        self.temp_dir.as_deref()
    }

    pub fn get_temp_prefix(&self) -> &str {
        &self.temp_prefix
    }

    pub fn get_max_key_len(&self) -> usize {
        self.max_key_len
    }

    pub fn get_max_part_header_bytes(&self) -> usize {
        self.max_part_header_bytes
    }
}
