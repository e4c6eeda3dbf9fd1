//! Field events emitted by the form decoders and the sink that consumes them.

use bytes::Bytes;

use crate::protocol::DecodeError;

/// One unit of decoded body content.
///
/// A field occurrence may be split across many events. `offset` is the number of bytes of the
/// same occurrence that were delivered before this event, so an event with `offset == 0`
/// always starts a new occurrence of the field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldEvent {
    /// Field name, as declared by the client
    pub name: String,
    /// Filename from `Content-Disposition`, present (possibly empty) for file parts
    pub filename: Option<String>,
    /// Declared `Content-Type` of the part, if any
    pub content_type: Option<String>,
    /// Decoded bytes belonging to this field
    pub data: Bytes,
    /// Bytes of this occurrence delivered by earlier events
    pub offset: u64,
}

impl FieldEvent {
    /// Creates an event for a text field, as produced by url-encoded bodies.
    pub fn text(name: impl Into<String>, data: Bytes, offset: u64) -> Self {
        Self { name: name.into(), filename: None, content_type: None, data, offset }
    }

    /// Returns true if the event belongs to a file part.
    ///
    /// A present filename marks a file part even when it is empty.
    #[inline]
    pub fn is_file(&self) -> bool {
        self.filename.is_some()
    }

    /// Returns true if this event starts a new occurrence of its field.
    #[inline]
    pub fn is_first(&self) -> bool {
        self.offset == 0
    }
}

/// Receiver of decoded field events.
///
/// The decode engine drives a sink synchronously while it processes a chunk. An error returned
/// by the sink stops the processing of the current chunk and is handed back to the caller of
/// the engine unchanged.
pub trait FieldSink {
    /// Called for every decoded slice of field data, in arrival order.
    fn on_field(&mut self, event: FieldEvent) -> Result<(), DecodeError>;

    /// Called once a field occurrence has been fully delivered.
    fn on_field_end(&mut self, _name: &str) -> Result<(), DecodeError> {
        Ok(())
    }
}

/// Decoder output: either a slice of field data or the end of a field occurrence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldItem {
    Data(FieldEvent),
    End(String),
}

impl FieldItem {
    /// Returns true if this item carries field data
    #[inline]
    pub fn is_data(&self) -> bool {
        matches!(self, FieldItem::Data(_))
    }

    /// Returns the contained event if this is a data item
    pub fn as_event(&self) -> Option<&FieldEvent> {
        match self {
            FieldItem::Data(event) => Some(event),
            FieldItem::End(_) => None,
        }
    }

    /// Consumes the item and returns the contained event if this is a data item
    pub fn into_event(self) -> Option<FieldEvent> {
        match self {
            FieldItem::Data(event) => Some(event),
            FieldItem::End(_) => None,
        }
    }
}
