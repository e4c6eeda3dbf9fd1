//! File uploads spooled to temporary storage.

use std::fs::File;
use std::io::{self, ErrorKind, Write};
use std::path::Path;

use tempfile::TempPath;
use tracing::trace;

use crate::protocol::body::BodyConfig;

/// A file part of a request body, spooled to its own temporary file.
///
/// The filename is whatever the client declared. It is untrusted and must never be used as a
/// filesystem path. The spooled file is removed when the upload is dropped, unless it has been
/// moved with [`FileUpload::persist`].
#[derive(Debug)]
pub struct FileUpload {
    filename: String,
    content_type: String,
    /// Open while the decode session may still append to it
    file: Option<File>,
    path: TempPath,
    len: u64,
}

impl FileUpload {
    /// Creates a new, exclusively owned temp file for an upload.
    pub(crate) fn create(filename: String, content_type: String, config: &BodyConfig) -> io::Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(config.get_temp_prefix());

        let temp_file = match config.get_temp_dir() {
            Some(dir) => builder.tempfile_in(dir)?,
            None => builder.tempfile()?,
        };
        let (file, path) = temp_file.into_parts();
        trace!(path = %path.display(), filename = %filename, "created upload spool file");

        Ok(Self { filename, content_type, file: Some(file), path, len: 0 })
    }

    /// The filename declared by the client, possibly empty.
    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// The declared content type of the part.
    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    /// Location of the spooled content.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of bytes spooled so far.
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns true while the decode session may still append data.
    pub fn is_open(&self) -> bool {
        self.file.is_some()
    }

    /// Opens the spooled content for reading.
    pub fn open(&self) -> io::Result<File> {
        File::open(&self.path)
    }

    /// Reads the whole spooled content into memory.
    pub fn read_to_vec(&self) -> io::Result<Vec<u8>> {
        std::fs::read(&self.path)
    }

    /// Moves the spooled content to `to`; the file is no longer removed on drop.
    pub fn persist(self, to: impl AsRef<Path>) -> io::Result<()> {
        let Self { file, path, .. } = self;
        drop(file);
        path.persist(to).map_err(|e| e.error)
    }

    /// Appends `data`, flushing after every partial write, then syncs the file to disk.
    pub(crate) fn append(&mut self, data: &[u8]) -> io::Result<()> {
        let file = self.file.as_mut().ok_or_else(|| io::Error::other("upload spool file is closed"))?;
        write_through(file, data, &mut self.len)?;
        file.sync_data()
    }

    /// Closes the spool file handle; the content stays readable through [`FileUpload::path`].
    pub(crate) fn close(&mut self) {
        if self.file.take().is_some() {
            trace!(path = %self.path.display(), len = self.len, "closed upload spool file");
        }
    }
}

/// Writes `data` with repeated partial writes, flushing after each one.
///
/// `flush` only empties user-space buffers; durability is up to the caller.
///
/// `written` grows with every accepted partial write, so it reflects the progress made even
/// when a later write or flush fails. A write accepting zero bytes is an error.
fn write_through<W: Write>(sink: &mut W, data: &[u8], written: &mut u64) -> io::Result<()> {
    let mut remaining = data;
    while !remaining.is_empty() {
        match sink.write(remaining) {
            Ok(0) => return Err(io::Error::new(ErrorKind::WriteZero, "failed to write upload data")),
            Ok(n) => {
                *written += n as u64;
                remaining = &remaining[n..];
                sink.flush()?;
            }
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Accepts at most `limit` bytes per write and fails on the configured call.
    struct ChokedWriter {
        data: Vec<u8>,
        limit: usize,
        writes: usize,
        zero_on_write: Option<usize>,
        fail_flush_on: Option<usize>,
        flushes: usize,
    }

    impl ChokedWriter {
        fn new(limit: usize) -> Self {
            Self { data: Vec::new(), limit, writes: 0, zero_on_write: None, fail_flush_on: None, flushes: 0 }
        }
    }

    impl Write for ChokedWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.writes += 1;
            if self.zero_on_write == Some(self.writes) {
                return Ok(0);
            }
            let n = buf.len().min(self.limit);
            self.data.extend_from_slice(&buf[..n]);
            Ok(n)
        }

        fn flush(&mut self) -> io::Result<()> {
            self.flushes += 1;
            if self.fail_flush_on == Some(self.flushes) {
                return Err(io::Error::from(ErrorKind::StorageFull));
            }
            Ok(())
        }
    }

    #[test]
    fn test_partial_writes() {
        let mut writer = ChokedWriter::new(3);
        let mut written = 0;

        write_through(&mut writer, b"hello world", &mut written).unwrap();

        assert_eq!(&writer.data[..], b"hello world");
        assert_eq!(written, 11);
        assert_eq!(writer.writes, 4);
        assert_eq!(writer.flushes, 4);
    }

    #[test]
    fn test_zero_write_is_error() {
        let mut writer = ChokedWriter::new(4);
        writer.zero_on_write = Some(2);
        let mut written = 0;

        let error = write_through(&mut writer, b"hello world", &mut written).unwrap_err();

        assert_eq!(error.kind(), ErrorKind::WriteZero);
        assert_eq!(written, 4);
        assert_eq!(writer.writes, 2);
    }

    #[test]
    fn test_flush_failure_keeps_progress() {
        let mut writer = ChokedWriter::new(5);
        writer.fail_flush_on = Some(1);
        let mut written = 0;

        let error = write_through(&mut writer, b"hello world", &mut written).unwrap_err();

        assert_eq!(error.kind(), ErrorKind::StorageFull);
        assert_eq!(written, 5);
    }

    #[test]
    fn test_spool_and_persist() {
        let dir = tempfile::tempdir().unwrap();
        let config = BodyConfig::new().temp_dir(dir.path());

        let mut upload = FileUpload::create("x.txt".into(), "text/plain".into(), &config).unwrap();
        upload.append(b"hello ").unwrap();
        upload.append(b"world").unwrap();
        upload.close();

        assert!(!upload.is_open());
        assert_eq!(upload.len(), 11);
        assert!(upload.path().starts_with(dir.path()));
        assert_eq!(upload.read_to_vec().unwrap(), b"hello world");
        assert!(upload.append(b"!").is_err());

        let target = dir.path().join("kept.txt");
        upload.persist(&target).unwrap();
        assert_eq!(std::fs::read(&target).unwrap(), b"hello world");
    }

    #[test]
    fn test_appended_data_on_disk_while_open() {
        let dir = tempfile::tempdir().unwrap();
        let config = BodyConfig::new().temp_dir(dir.path());

        let mut upload = FileUpload::create("x.bin".into(), "application/octet-stream".into(), &config).unwrap();
        upload.append(&[1, 2, 3]).unwrap();

        assert!(upload.is_open());
        assert_eq!(std::fs::metadata(upload.path()).unwrap().len(), 3);
        assert_eq!(upload.read_to_vec().unwrap(), [1, 2, 3]);
    }

    #[test]
    fn test_spool_file_removed_on_drop() {
        let config = BodyConfig::default();
        let upload = FileUpload::create(String::new(), "application/octet-stream".into(), &config).unwrap();
        let path = upload.path().to_path_buf();
        assert!(path.exists());

        drop(upload);
        assert!(!path.exists());
    }
}
