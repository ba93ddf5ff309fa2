use crate::error::HostError;
use crate::host::io::{InputStream, OutputStream};
use crate::resource::PollableHandle;

/// A single header as raw bytes; name validation/lowercasing happens at the
/// `Headers` layer in `starling_runtime`, not here.
pub type RawHeader = (String, Vec<u8>);

pub struct OutgoingRequestParts {
    pub method: String,
    pub scheme: String,
    pub authority: String,
    pub path_with_query: String,
    pub headers: Vec<RawHeader>,
}

pub struct IncomingResponseParts {
    pub status: u16,
    pub headers: Vec<RawHeader>,
    pub body: Box<dyn InputStream>,
}

/// The data the host delivers once, at the start of request handling. Not a
/// capability to call into, just the payload of `wasi:http/incoming-handler`.
pub struct HttpIncoming {
    pub method: String,
    pub scheme: String,
    pub authority: String,
    pub path_with_query: String,
    pub headers: Vec<RawHeader>,
    pub body: Box<dyn InputStream>,
}

/// A send in flight. Mirrors WASI's `future<incoming-response>`.
pub trait ResponseFuture {
    fn subscribe(&mut self) -> PollableHandle;

    /// Non-blocking poll for completion. Returns `None` while the send is
    /// still outstanding.
    fn poll(&mut self) -> Option<Result<IncomingResponseParts, HostError>>;

    fn cancel(&mut self);
}

/// A request under construction, before `send`.
pub trait OutgoingRequest {
    /// The request's writable body, if any. Absent for bodyless requests,
    /// which are finalized immediately by `send`.
    fn body(&mut self) -> Option<&mut dyn OutputStream>;

    fn send(self: Box<Self>) -> Box<dyn ResponseFuture>;
}

/// Wraps `http.outgoing-request` construction.
pub trait HttpOutgoing {
    fn new_request(
        &self,
        parts: OutgoingRequestParts,
    ) -> Result<Box<dyn OutgoingRequest>, HostError>;
}

/// The handle through which a response is written back to the host, used by
/// `starling_component`'s incoming-handler export.
pub trait OutgoingResponseSink {
    fn set_status(&mut self, status: u16);
    fn set_headers(&mut self, headers: Vec<RawHeader>);
    /// Finalizes status/headers and returns the writable body stream.
    fn start(self: Box<Self>) -> Box<dyn OutputStream>;
}
