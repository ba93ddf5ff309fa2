use std::rc::Rc;

use starling_core::host::http::{OutgoingResponseSink, RawHeader};
use starling_core::host::io::OutputStream;

use crate::bindings::wasi::http::types::{Fields, OutgoingResponse};
use crate::host::streams::WasiOutgoingStream;
use crate::pollables::PollableRegistry;

/// Built fresh per request in [`crate::handle_request`] and registered with
/// `StarlingRuntime::register_outgoing_response` before dispatch, matching
/// `response-outparam::set`'s one-shot contract: `start()` is what actually
/// calls `set`, handing the host its `outgoing-response` and opening the
/// body stream `main.js` writes into.
pub struct WasiResponseSink {
    headers: Vec<RawHeader>,
    status: u16,
    registry: Rc<PollableRegistry>,
}

impl WasiResponseSink {
    pub fn new(registry: Rc<PollableRegistry>) -> Self {
        Self {
            headers: Vec::new(),
            status: 200,
            registry,
        }
    }
}

impl OutgoingResponseSink for WasiResponseSink {
    fn set_status(&mut self, status: u16) {
        self.status = status;
    }

    fn set_headers(&mut self, headers: Vec<RawHeader>) {
        self.headers = headers;
    }

    fn start(self: Box<Self>) -> Box<dyn OutputStream> {
        let fields = Fields::from_list(&self.headers).unwrap_or_else(|_| Fields::new());
        let response = OutgoingResponse::new(fields);
        let _ = response.set_status_code(self.status);
        let body = response
            .body()
            .expect("outgoing-response body already taken");
        let stream = body.write().expect("outgoing-body stream already taken");

        crate::RESPONSE_OUTPARAM.with(|slot| {
            let outparam = slot
                .borrow_mut()
                .take()
                .expect("response-outparam already consumed for this request");
            crate::bindings::exports::wasi::http::incoming_handler::ResponseOutparam::set(
                outparam,
                Ok(response),
            );
        });

        Box::new(WasiOutgoingStream::new(stream, body, self.registry))
    }
}
