//! HTTP request handling implementation.
//!
//! A [`Request`] is assembled incrementally: the transport sets its metadata once the request
//! line and headers are parsed, then streams the raw body through [`Request::parse_body`].
//! Handler code reads the decoded metadata and body afterwards.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use http::request::Parts;
use http::{Method, Uri, Version};
use tracing::debug;

use crate::protocol::body::{Body, BodyAccumulator, BodyConfig, SessionState};
use crate::protocol::{DecodeError, ParseError, ResponseHead};

/// One inbound HTTP request.
///
/// Header names are stored lowercased, so lookups are case-insensitive. For both headers and
/// query parameters the last value written for a name wins.
#[derive(Debug, Default)]
pub struct Request {
    method: Method,
    path: String,
    query: HashMap<String, String>,
    version: Version,
    headers: HashMap<String, String>,
    body: BodyAccumulator,
    response: Option<Weak<ResponseHead>>,
}

impl Request {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a request whose body is decoded with the given configuration.
    pub fn with_config(config: BodyConfig) -> Self {
        Self { body: BodyAccumulator::new(config), ..Self::default() }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn method_str(&self) -> &str {
        self.method.as_str()
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query(&self) -> &HashMap<String, String> {
        &self.query
    }

    /// Returns the HTTP version, `HTTP/1.1` until the transport supplies one.
    pub fn http_version(&self) -> Version {
        self.version
    }

    /// Looks up a header value, ignoring the case of `name`.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    /// The decoded body. Partially populated while the body is still being decoded.
    pub fn body(&self) -> &Body {
        self.body.body()
    }

    pub fn body_mut(&mut self) -> &mut Body {
        self.body.body_mut()
    }

    pub fn body_state(&self) -> SessionState {
        self.body.state()
    }

    /// Returns the attached response head, if one was set and is still alive.
    pub fn response(&self) -> Option<Arc<ResponseHead>> {
        self.response.as_ref().and_then(Weak::upgrade)
    }

    pub fn set_method(&mut self, method: Method) {
        self.method = method;
    }

    pub fn set_path(&mut self, path: impl Into<String>) {
        self.path = path.into();
    }

    pub fn set_query(&mut self, query: HashMap<String, String>) {
        self.query = query;
    }

    pub fn set_http_version(&mut self, version: Version) {
        self.version = version;
    }

    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
    }

    /// Replaces every header with `headers`, lowercasing their names.
    pub fn set_headers<I, K, V>(&mut self, headers: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        self.headers.clear();
        for (name, value) in headers {
            self.set_header(name.as_ref(), value);
        }
    }

    /// Replaces the body decode session with a fresh one using `config`.
    ///
    /// Meant to be called before the first body chunk, anything decoded so far is dropped.
    pub fn set_body_config(&mut self, config: BodyConfig) {
        self.body = BodyAccumulator::new(config);
    }

    /// Keeps a non-owning link to the response computed for this request.
    pub fn set_response(&mut self, response: &Arc<ResponseHead>) {
        self.response = Some(Arc::downgrade(response));
    }

    /// Decodes one chunk of the raw body, using the `content-type` header to pick the decoder.
    ///
    /// Returns the number of consumed bytes. After an error the body is failed for good and every
    /// later call returns [`DecodeError::SessionClosed`]; the transport is expected to reject the
    /// request.
    pub fn parse_body(&mut self, chunk: &[u8]) -> Result<usize, DecodeError> {
        let content_type = self.headers.get(http::header::CONTENT_TYPE.as_str()).map(String::as_str);
        self.body.feed(content_type, chunk)
    }

    /// Signals the end of the body and releases the decode session.
    pub fn finish_body(&mut self) -> Result<(), DecodeError> {
        self.body.finish()
    }

    /// Stops decoding the body early, keeping what was decoded so far.
    pub fn abort_body(&mut self) {
        self.body.abort();
    }
}

fn parse_query(query: &str) -> Result<HashMap<String, String>, ParseError> {
    let pairs = serde_urlencoded::from_str::<Vec<(String, String)>>(query).map_err(|e| {
        debug!(cause = %e, query, "invalid query string");
        ParseError::InvalidUri
    })?;
    Ok(pairs.into_iter().collect())
}

fn parse_version(version: Option<u8>) -> Result<Version, ParseError> {
    match version {
        Some(0) => Ok(Version::HTTP_10),
        Some(1) => Ok(Version::HTTP_11),
        // http2 and http3 are never parsed by httparse
        other => Err(ParseError::InvalidVersion(other)),
    }
}

/// Converts a parsed HTTP request line and header block into a `Request`.
///
/// The path is split into the request path and its query parameters. Header values must be
/// valid UTF-8.
impl<'headers, 'buf> TryFrom<httparse::Request<'headers, 'buf>> for Request {
    type Error = ParseError;

    fn try_from(req: httparse::Request<'headers, 'buf>) -> Result<Self, Self::Error> {
        let method = req.method.ok_or(ParseError::InvalidMethod)?;
        let method = Method::from_bytes(method.as_bytes()).map_err(|_e| ParseError::InvalidMethod)?;
        let uri = req.path.ok_or(ParseError::InvalidUri)?.parse::<Uri>().map_err(|_e| ParseError::InvalidUri)?;

        let mut request = Request::new();
        request.set_method(method);
        request.set_path(uri.path());
        request.set_query(uri.query().map(parse_query).transpose()?.unwrap_or_default());
        request.set_http_version(parse_version(req.version)?);

        request.headers.reserve(req.headers.len());
        for header in req.headers.iter() {
            let value = std::str::from_utf8(header.value)
                .map_err(|_e| ParseError::invalid_header(format!("value of `{}` is not utf-8", header.name)))?;
            request.set_header(header.name, value);
        }

        Ok(request)
    }
}

/// Converts request parts into a `Request`. Header values that are not UTF-8 are converted
/// lossily, an unparsable query string is ignored.
impl From<Parts> for Request {
    fn from(parts: Parts) -> Self {
        let mut request = Request::new();
        request.set_method(parts.method);
        request.set_path(parts.uri.path());
        request.set_query(parts.uri.query().and_then(|query| parse_query(query).ok()).unwrap_or_default());
        request.set_http_version(parts.version);

        for (name, value) in &parts.headers {
            request.set_header(name.as_str(), String::from_utf8_lossy(value.as_bytes()));
        }
        request
    }
}
