//! Response-emission half of incoming request dispatch (spec §4.5):
//! wraps a host [`OutgoingResponseSink`] as a resource so `main.js`'s
//! `FetchEvent` machinery can finalize status/headers and hand the
//! resulting body off to `starling_body`'s `OutgoingBodyResource`.
//!
//! `starling_component` constructs the sink from the real
//! `wasi:http/types.response-outparam`, registers it with [`register`]
//! before calling into `main.js`'s dispatch entry point, and passes the
//! resulting rid through; tests do the same with an in-memory fake.

use std::borrow::Cow;
use std::cell::RefCell;

use deno_core::{op2, OpState, ResourceId};

use starling_core::host::http::OutgoingResponseSink;

use crate::error::RuntimeError;
use crate::ext::starling_body::body::OutgoingBodyResource;

pub struct OutgoingResponseResource {
    sink: RefCell<Option<Box<dyn OutgoingResponseSink>>>,
}

impl OutgoingResponseResource {
    pub fn new(sink: Box<dyn OutgoingResponseSink>) -> Self {
        Self {
            sink: RefCell::new(Some(sink)),
        }
    }
}

impl deno_core::Resource for OutgoingResponseResource {
    fn name(&self) -> Cow<str> {
        "OutgoingResponse".into()
    }
}

/// Registers a host-provided sink and hands back its resource id for
/// `main.js` to pass to `op_response_sink_start`.
pub fn register(op_state: &mut OpState, sink: Box<dyn OutgoingResponseSink>) -> ResourceId {
    op_state
        .resource_table
        .add(OutgoingResponseResource::new(sink))
}

/// Finalizes status/headers and returns the rid of the `OutgoingBody` the
/// response's bytes should be written (or piped) into. Consumes the sink:
/// a second call on the same `rid` fails, matching `wasi:http`'s
/// `response-outparam::set` being a one-shot operation.
#[op2(fast)]
#[smi]
pub fn op_response_sink_start(
    op_state: &mut OpState,
    #[smi] rid: ResourceId,
    status: u16,
    #[serde] headers: Vec<(String, String)>,
) -> Result<ResourceId, RuntimeError> {
    let resource = op_state
        .resource_table
        .get::<OutgoingResponseResource>(rid)
        .map_err(|_| RuntimeError::type_error("OutgoingResponse"))?;
    let mut sink = resource
        .sink
        .borrow_mut()
        .take()
        .ok_or_else(|| RuntimeError::type_error("OutgoingResponse (already started)"))?;

    sink.set_status(status);
    sink.set_headers(
        headers
            .into_iter()
            .map(|(name, value)| (name, value.into_bytes()))
            .collect(),
    );
    let body = sink.start();
    Ok(op_state
        .resource_table
        .add(OutgoingBodyResource::new(body)))
}

/// `waitUntil`'s rejection handler (spec §4.5) and the `dispatchEvent`
/// wrapper's own uncaught-exception path report here rather than
/// propagating into v8 as an unhandled promise rejection, matching a
/// background task's result having nowhere else to go.
#[op2(fast)]
pub fn op_main_report_error(#[string] msg: &str) {
    log::error!(target: "starling::main", "{msg}");
}
