//! The response a handler attaches to a request.
//!
//! Response construction and serialization belong to the handler and the transport. A
//! [`Request`](super::Request) only keeps a non-owning link to the head once it exists.

use http::Response;

/// Type alias for HTTP response headers.
///
/// `http::Response<()>` with an empty body placeholder, owned by whoever builds the reply.
pub type ResponseHead = Response<()>;
