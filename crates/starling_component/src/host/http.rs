use std::rc::Rc;

use starling_core::error::HostError;
use starling_core::host::http::{
    HttpOutgoing, IncomingResponseParts, OutgoingRequest, OutgoingRequestParts, RawHeader,
    ResponseFuture,
};
use starling_core::host::io::OutputStream;
use starling_core::resource::PollableHandle;

use crate::bindings::wasi::http::outgoing_handler;
use crate::bindings::wasi::http::types::{
    self, ErrorCode, Fields, FutureIncomingResponse, Method, OutgoingBody, Scheme,
};
use crate::host::streams::{WasiIncomingStream, WasiOutgoingStream};
use crate::pollables::PollableRegistry;

fn method_from_str(method: &str) -> Method {
    match method.to_ascii_uppercase().as_str() {
        "GET" => Method::Get,
        "HEAD" => Method::Head,
        "POST" => Method::Post,
        "PUT" => Method::Put,
        "DELETE" => Method::Delete,
        "CONNECT" => Method::Connect,
        "OPTIONS" => Method::Options,
        "TRACE" => Method::Trace,
        "PATCH" => Method::Patch,
        other => Method::Other(other.to_string()),
    }
}

fn scheme_from_str(scheme: &str) -> Scheme {
    match scheme.to_ascii_lowercase().as_str() {
        "http" => Scheme::Http,
        "https" => Scheme::Https,
        other => Scheme::Other(other.to_string()),
    }
}

fn fields_from_headers(headers: Vec<RawHeader>) -> Result<Fields, HostError> {
    Fields::from_list(&headers).map_err(|_| HostError::new(-1, "invalid outgoing header"))
}

fn error_code_to_host_error(code: ErrorCode) -> HostError {
    HostError::new(-1, format!("{code:?}"))
}

/// Wraps `wasi:http/outgoing-handler`, the only host capability
/// `starling_fetch`'s `fetch()` op needs.
pub struct WasiHttpOutgoing {
    registry: Rc<PollableRegistry>,
}

impl WasiHttpOutgoing {
    pub fn new(registry: Rc<PollableRegistry>) -> Self {
        Self { registry }
    }
}

impl HttpOutgoing for WasiHttpOutgoing {
    fn new_request(
        &self,
        parts: OutgoingRequestParts,
    ) -> Result<Box<dyn OutgoingRequest>, HostError> {
        let headers = fields_from_headers(parts.headers)?;
        let request = types::OutgoingRequest::new(headers);
        request
            .set_method(&method_from_str(&parts.method))
            .map_err(|()| HostError::new(-1, "invalid method"))?;
        request
            .set_scheme(Some(&scheme_from_str(&parts.scheme)))
            .map_err(|()| HostError::new(-1, "invalid scheme"))?;
        request
            .set_authority(Some(&parts.authority))
            .map_err(|()| HostError::new(-1, "invalid authority"))?;
        request
            .set_path_with_query(Some(&parts.path_with_query))
            .map_err(|()| HostError::new(-1, "invalid path"))?;

        let body = request
            .body()
            .map_err(|()| HostError::new(-1, "outgoing request body already taken"))?;
        Ok(Box::new(WasiOutgoingRequest {
            request: Some(request),
            body: Some(body),
            writer: None,
            registry: self.registry.clone(),
        }))
    }
}

struct WasiOutgoingRequest {
    request: Option<types::OutgoingRequest>,
    body: Option<OutgoingBody>,
    writer: Option<WasiOutgoingStream>,
    registry: Rc<PollableRegistry>,
}

impl OutgoingRequest for WasiOutgoingRequest {
    fn body(&mut self) -> Option<&mut dyn OutputStream> {
        if self.writer.is_none() {
            let body = self.body.take()?;
            let stream = body.write().ok()?;
            self.writer = Some(WasiOutgoingStream::new(stream, body, self.registry.clone()));
        }
        self.writer.as_mut().map(|w| w as &mut dyn OutputStream)
    }

    fn send(self: Box<Self>) -> Box<dyn ResponseFuture> {
        let request = self.request.expect("request already sent");
        let future = outgoing_handler::handle(request, None)
            .expect("outgoing-handler::handle rejected the request");
        Box::new(WasiResponseFuture {
            future: Some(future),
            registry: self.registry,
        })
    }
}

struct WasiResponseFuture {
    future: Option<FutureIncomingResponse>,
    registry: Rc<PollableRegistry>,
}

impl ResponseFuture for WasiResponseFuture {
    fn subscribe(&mut self) -> PollableHandle {
        match self.future.as_ref() {
            Some(future) => PollableHandle::Handle(self.registry.insert(future.subscribe())),
            None => PollableHandle::Immediate,
        }
    }

    fn poll(&mut self) -> Option<Result<IncomingResponseParts, HostError>> {
        let future = self.future.as_ref()?;
        // `get()` is `option<result<result<incoming-response, error-code>>>`:
        // outer `option` is readiness, middle `result` guards against a
        // second `get` call racing this one (never happens here, since this
        // is the only caller), inner `result` is the actual outcome.
        let ready = future.get()?;
        let response = match ready {
            Ok(Ok(response)) => response,
            Ok(Err(code)) => return Some(Err(error_code_to_host_error(code))),
            Err(()) => return Some(Err(HostError::new(-1, "response already retrieved"))),
        };

        let status = response.status();
        let headers = response.headers().entries();
        let body = match response.consume() {
            Ok(body) => body,
            Err(()) => return Some(Err(HostError::new(-1, "response body already consumed"))),
        };
        let stream = match body.stream() {
            Ok(stream) => stream,
            Err(()) => return Some(Err(HostError::new(-1, "response body stream already taken"))),
        };

        Some(Ok(IncomingResponseParts {
            status,
            headers,
            body: Box::new(WasiIncomingStream::new(stream, self.registry.clone())),
        }))
    }

    fn cancel(&mut self) {
        self.future.take();
    }
}
