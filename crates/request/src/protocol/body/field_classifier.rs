//! Routes decoded field events into a [`Body`].

use tracing::{debug, trace};

use crate::codec::{FieldEvent, FieldSink};
use crate::ensure;
use crate::protocol::DecodeError;
use crate::protocol::body::{Body, BodyConfig, DEFAULT_FILE_CONTENT_TYPE, FileUpload};

/// Classifies every field event as a text parameter or a file upload.
///
/// The classifier borrows the body exclusively for the duration of a single `feed` call, it is
/// never shared and never outlives the call.
#[derive(Debug)]
pub struct FieldClassifier<'a> {
    body: &'a mut Body,
    config: &'a BodyConfig,
}

impl<'a> FieldClassifier<'a> {
    pub fn new(body: &'a mut Body, config: &'a BodyConfig) -> Self {
        Self { body, config }
    }

    fn write_text(&mut self, event: &FieldEvent) -> Result<(), DecodeError> {
        ensure!(
            self.body.file(&event.name).is_none(),
            DecodeError::malformed(format!("field `{}` was already sent as a file", event.name))
        );

        self.body.write_text(&event.name, &event.data, event.is_first());
        trace!(name = %event.name, len = event.data.len(), offset = event.offset, "write text field");
        Ok(())
    }

    fn write_file(&mut self, event: FieldEvent) -> Result<(), DecodeError> {
        let FieldEvent { name, filename, content_type, data, offset } = event;
        ensure!(
            self.body.param(&name).is_none(),
            DecodeError::malformed(format!("field `{name}` was already sent as a text field"))
        );

        let config = self.config;
        let upload = self
            .body
            .upload_entry(&name, || {
                let filename = filename.unwrap_or_default();
                let content_type = content_type.unwrap_or_else(|| DEFAULT_FILE_CONTENT_TYPE.to_string());
                debug!(name = %name, filename = %filename, content_type = %content_type, "receive file upload");
                FileUpload::create(filename, content_type, config)
            })
            .map_err(|e| DecodeError::sink_write_failed(&name, e))?;

        upload.append(&data).map_err(|e| DecodeError::sink_write_failed(&name, e))?;
        trace!(name = %name, len = data.len(), offset, total = upload.len(), "write file field");
        Ok(())
    }
}

impl FieldSink for FieldClassifier<'_> {
    /// A present filename, even an empty one, makes the field a file upload.
    fn on_field(&mut self, event: FieldEvent) -> Result<(), DecodeError> {
        if event.is_file() { self.write_file(event) } else { self.write_text(&event) }
    }

    fn on_field_end(&mut self, name: &str) -> Result<(), DecodeError> {
        self.body.finish_text(name);
        trace!(name, "field complete");
        Ok(())
    }
}
