//! The body decode session of one request.

use tracing::{debug, trace, warn};

use crate::codec::{FormDecoder, FormProcessor};
use crate::protocol::DecodeError;
use crate::protocol::body::{Body, BodyConfig, FieldClassifier};

/// Owns the decode session and the decoded [`Body`] of exactly one request.
///
/// The decode engine is created lazily from the content type on the first chunk. Any error
/// fails the session for good: the engine is dropped, every upload file handle is closed and
/// all later calls to [`feed`](Self::feed) return [`DecodeError::SessionClosed`].
#[derive(Debug)]
pub struct BodyAccumulator {
    config: BodyConfig,
    session: Session,
    body: Body,
}

#[derive(Debug)]
enum Session {
    Idle,
    Active(FormProcessor),
    Failed,
    Closed,
}

/// Observable state of a decode session.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// No chunk has been fed yet
    Idle,
    /// The decode engine is running
    Active,
    /// A chunk could not be decoded or spooled
    Failed,
    /// The body was finished or aborted
    Closed,
}

impl Default for BodyAccumulator {
    fn default() -> Self {
        Self::new(BodyConfig::default())
    }
}

impl BodyAccumulator {
    pub fn new(config: BodyConfig) -> Self {
        Self { config, session: Session::Idle, body: Body::new() }
    }

    pub fn config(&self) -> &BodyConfig {
        &self.config
    }

    /// The decoded body. While chunks are still being fed it may be partially populated.
    pub fn body(&self) -> &Body {
        &self.body
    }

    pub fn body_mut(&mut self) -> &mut Body {
        &mut self.body
    }

    pub fn into_body(self) -> Body {
        self.body
    }

    pub fn state(&self) -> SessionState {
        match self.session {
            Session::Idle => SessionState::Idle,
            Session::Active(_) => SessionState::Active,
            Session::Failed => SessionState::Failed,
            Session::Closed => SessionState::Closed,
        }
    }

    /// Decodes one chunk of raw body bytes.
    ///
    /// `content_type` is only consulted by the first call, which creates the decode engine.
    ///
    /// # Returns
    ///
    /// - `Ok(len)` with the number of consumed bytes, always `chunk.len()`
    /// - `Err(DecodeError::SessionInitFailed)` if no decoder matches `content_type`
    /// - `Err(DecodeError::MalformedBody)` if the chunk violates the body encoding
    /// - `Err(DecodeError::SinkWriteFailed)` if an upload could not be spooled
    /// - `Err(DecodeError::SessionClosed)` if the session already failed or was closed
    pub fn feed(&mut self, content_type: Option<&str>, chunk: &[u8]) -> Result<usize, DecodeError> {
        match self.session {
            Session::Failed | Session::Closed => return Err(DecodeError::SessionClosed),
            Session::Idle => match FormDecoder::from_content_type(content_type, &self.config) {
                Ok(decoder) => {
                    debug!(content_type, "body decode session started");
                    self.session = Session::Active(FormProcessor::new(decoder));
                }
                Err(e) => {
                    warn!(cause = %e, "failed to start body decode session");
                    self.fail();
                    return Err(e);
                }
            },
            Session::Active(_) => {}
        }

        let Session::Active(processor) = &mut self.session else {
            return Err(DecodeError::SessionClosed);
        };

        let mut classifier = FieldClassifier::new(&mut self.body, &self.config);
        if let Err(e) = processor.process(chunk, &mut classifier) {
            warn!(cause = %e, "body decode session failed");
            self.fail();
            return Err(e);
        }

        trace!(len = chunk.len(), "decoded body chunk");
        Ok(chunk.len())
    }

    /// Ends the session once the whole body has been fed.
    ///
    /// Flushes the data the engine still buffers, drops the engine and closes every upload file
    /// handle. Finishing a session that never received a chunk, or one that is already closed,
    /// succeeds without effect.
    pub fn finish(&mut self) -> Result<(), DecodeError> {
        match std::mem::replace(&mut self.session, Session::Closed) {
            Session::Idle | Session::Closed => {}
            Session::Failed => {
                self.session = Session::Failed;
                return Err(DecodeError::SessionClosed);
            }
            Session::Active(mut processor) => {
                let mut classifier = FieldClassifier::new(&mut self.body, &self.config);
                if let Err(e) = processor.finish(&mut classifier) {
                    warn!(cause = %e, "body decode session failed at end of body");
                    self.fail();
                    return Err(e);
                }
            }
        }

        self.body.flush_pending_text();
        self.body.close_files();
        debug!(params = self.body.params().len(), files = self.body.files().len(), "body decode session finished");
        Ok(())
    }

    /// Terminates the session early, without checking the body is complete.
    ///
    /// The engine is dropped and upload file handles are closed. Already decoded fields stay
    /// available.
    pub fn abort(&mut self) {
        if matches!(self.session, Session::Failed | Session::Closed) {
            return;
        }
        self.session = Session::Closed;
        self.body.close_files();
        debug!("body decode session aborted");
    }

    fn fail(&mut self) {
        self.session = Session::Failed;
        self.body.close_files();
    }
}
