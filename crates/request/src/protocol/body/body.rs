//! The structured form of a decoded request body.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::io;

use crate::protocol::body::FileUpload;

/// Text parameters and file uploads of a request body, keyed by field name.
///
/// A field name is never present in both maps.
#[derive(Debug, Default)]
pub struct Body {
    params: HashMap<String, String>,
    files: HashMap<String, FileUpload>,
    /// Trailing bytes of a text value ending inside a UTF-8 sequence
    pending_text: HashMap<String, Vec<u8>>,
}

impl Body {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the value of text field `name`.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    pub fn params(&self) -> &HashMap<String, String> {
        &self.params
    }

    /// Returns the upload of file field `name`.
    pub fn file(&self, name: &str) -> Option<&FileUpload> {
        self.files.get(name)
    }

    pub fn files(&self) -> &HashMap<String, FileUpload> {
        &self.files
    }

    /// Takes ownership of an upload, e.g. to [`persist`](FileUpload::persist) it.
    pub fn take_file(&mut self, name: &str) -> Option<FileUpload> {
        self.files.remove(name)
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty() && self.files.is_empty()
    }

    /// Writes decoded bytes of text field `name`.
    ///
    /// `first` starts a new occurrence of the field, replacing any previous value; otherwise the
    /// bytes are appended to the current value.
    pub(crate) fn write_text(&mut self, name: &str, data: &[u8], first: bool) {
        let mut bytes = self.pending_text.remove(name).filter(|_| !first).unwrap_or_default();
        bytes.extend_from_slice(data);

        let value = self.params.entry(name.to_string()).or_default();
        if first {
            value.clear();
        }

        let rest = push_utf8(value, &bytes);
        if !rest.is_empty() {
            self.pending_text.insert(name.to_string(), rest.to_vec());
        }
    }

    /// Returns the upload registered as `name`, creating it with `create` on first use.
    pub(crate) fn upload_entry<F>(&mut self, name: &str, create: F) -> io::Result<&mut FileUpload>
    where
        F: FnOnce() -> io::Result<FileUpload>,
    {
        match self.files.entry(name.to_string()) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => Ok(entry.insert(create()?)),
        }
    }

    /// Completes text field `name` once its occurrence has ended.
    ///
    /// Bytes still waiting for the rest of a UTF-8 sequence can no longer be completed and
    /// become U+FFFD.
    pub(crate) fn finish_text(&mut self, name: &str) {
        if let Some(bytes) = self.pending_text.remove(name) {
            self.params.entry(name.to_string()).or_default().push_str(&String::from_utf8_lossy(&bytes));
        }
    }

    /// Completes text values cut inside a UTF-8 sequence with U+FFFD.
    pub(crate) fn flush_pending_text(&mut self) {
        for (name, bytes) in self.pending_text.drain() {
            self.params.entry(name).or_default().push_str(&String::from_utf8_lossy(&bytes));
        }
    }

    /// Closes the spool file handle of every upload.
    pub(crate) fn close_files(&mut self) {
        self.files.values_mut().for_each(FileUpload::close);
    }
}

/// Appends the UTF-8 decodable prefix of `bytes` to `out`.
///
/// Invalid sequences are replaced by U+FFFD. Returns a trailing incomplete sequence, which may
/// still become valid once more bytes arrive.
fn push_utf8<'a>(out: &mut String, bytes: &'a [u8]) -> &'a [u8] {
    let mut input = bytes;
    loop {
        match std::str::from_utf8(input) {
            Ok(valid) => {
                out.push_str(valid);
                return &[];
            }
            Err(e) => {
                let (valid, after) = input.split_at(e.valid_up_to());
                out.push_str(&String::from_utf8_lossy(valid));
                match e.error_len() {
                    None => return after,
                    Some(len) => {
                        out.push(char::REPLACEMENT_CHARACTER);
                        input = &after[len..];
                    }
                }
            }
        }
    }
}
