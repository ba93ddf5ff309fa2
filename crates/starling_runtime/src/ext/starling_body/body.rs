//! `IncomingBody`/`OutgoingBody` (spec §4.3): the Rust-side half of the
//! body/stream bridge. Each is a `deno_core::Resource` wrapping a host
//! stream; the JS half (`body.js`) turns them into a `ReadableStream` /
//! `WritableStream` via the constructor's `start`/`pull`/`write` callbacks,
//! which call back into the ops below.

use std::borrow::Cow;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

use deno_core::{op2, OpState, ResourceId};

use starling_core::host::io::{InputStream, OutputStream, ReadOutcome};
use starling_core::EventLoop;

use crate::error::RuntimeError;
use crate::tasks::{self, InterestGuard, TaskFuture};

/// Bytes pulled in one `read()`. Matches the WASI guidance to keep the
/// component's peak memory bounded regardless of body size.
const CHUNK_SIZE: usize = 16 * 1024;

pub struct IncomingBodyResource {
    stream: Rc<RefCell<Box<dyn InputStream>>>,
    locked: Cell<bool>,
}

impl IncomingBodyResource {
    pub fn new(stream: Box<dyn InputStream>) -> Self {
        Self {
            stream: Rc::new(RefCell::new(stream)),
            locked: Cell::new(false),
        }
    }
}

impl deno_core::Resource for IncomingBodyResource {
    fn name(&self) -> Cow<str> {
        "IncomingBody".into()
    }

    fn close(self: Rc<Self>) {
        self.stream.borrow_mut().close();
    }
}

pub struct OutgoingBodyResource {
    sink: RefCell<Option<Box<dyn OutputStream>>>,
    locked: Cell<bool>,
}

impl OutgoingBodyResource {
    pub fn new(sink: Box<dyn OutputStream>) -> Self {
        Self {
            sink: RefCell::new(Some(sink)),
            locked: Cell::new(false),
        }
    }
}

impl deno_core::Resource for OutgoingBodyResource {
    fn name(&self) -> Cow<str> {
        "OutgoingBody".into()
    }

    fn close(self: Rc<Self>) {
        if let Some(mut sink) = self.sink.borrow_mut().take() {
            let _ = sink.blocking_flush();
            sink.close();
        }
    }
}

#[derive(serde::Serialize)]
pub struct ReadResult {
    data: Option<Vec<u8>>,
    done: bool,
}

fn incoming(
    op_state: &mut OpState,
    rid: ResourceId,
) -> Result<Rc<IncomingBodyResource>, deno_core::error::ResourceError> {
    op_state.resource_table.get::<IncomingBodyResource>(rid)
}

fn outgoing(
    op_state: &mut OpState,
    rid: ResourceId,
) -> Result<Rc<OutgoingBodyResource>, deno_core::error::ResourceError> {
    op_state.resource_table.get::<OutgoingBodyResource>(rid)
}

/// Locks the body's reader, matching `ReadableStream.getReader()`'s
/// single-reader invariant (spec §5, "incoming body reads serialize
/// through the body's reader lock").
#[op2(fast)]
pub fn op_body_lock(op_state: &mut OpState, #[smi] rid: ResourceId) -> bool {
    match incoming(op_state, rid) {
        Ok(body) if !body.locked.get() => {
            body.locked.set(true);
            true
        }
        _ => false,
    }
}

#[op2(fast)]
pub fn op_body_release(op_state: &mut OpState, #[smi] rid: ResourceId) {
    if let Ok(body) = incoming(op_state, rid) {
        body.locked.set(false);
    }
}

#[op2(async)]
#[serde]
pub async fn op_body_read(op_state: Rc<RefCell<OpState>>, #[smi] rid: ResourceId) -> ReadResult {
    let _interest = InterestGuard::new(op_state.clone());
    loop {
        let stream = {
            let mut op_state = op_state.borrow_mut();
            match incoming(&mut op_state, rid) {
                Ok(body) => body.stream.clone(),
                Err(_) => return ReadResult { data: None, done: true },
            }
        };

        let cell = tasks::shared::<ReadOutcome>();
        let task = tasks::BodyReadTask::new(stream, cell.clone(), CHUNK_SIZE);
        {
            let mut op_state = op_state.borrow_mut();
            op_state.borrow_mut::<EventLoop>().queue(Box::new(task));
        }

        match TaskFuture(cell).await {
            ReadOutcome::Data { bytes, done } => {
                return ReadResult {
                    data: Some(bytes),
                    done,
                }
            }
            ReadOutcome::Eof => return ReadResult { data: None, done: true },
            ReadOutcome::WouldBlock => continue,
        }
    }
}

/// Reads an `IncomingBody` to completion in one await, for `Request`/
/// `Response` convenience methods (`arrayBuffer`/`text`/`json`/`blob`/
/// `formData`, spec §6) which always consume the whole body regardless of
/// chunk boundaries.
#[op2(async)]
#[buffer]
pub async fn op_body_drain(
    op_state: Rc<RefCell<OpState>>,
    #[smi] rid: ResourceId,
) -> Result<Vec<u8>, RuntimeError> {
    let _interest = InterestGuard::new(op_state.clone());
    let stream = {
        let mut op_state = op_state.borrow_mut();
        incoming(&mut op_state, rid)
            .map_err(|_| RuntimeError::type_error("IncomingBody (already released)"))?
            .stream
            .clone()
    };

    let mut out = Vec::new();
    loop {
        let cell = tasks::shared::<ReadOutcome>();
        let task = tasks::BodyReadTask::new(stream.clone(), cell.clone(), CHUNK_SIZE);
        {
            let mut op_state = op_state.borrow_mut();
            op_state.borrow_mut::<EventLoop>().queue(Box::new(task));
        }
        match TaskFuture(cell).await {
            ReadOutcome::Data { mut bytes, done } => {
                out.append(&mut bytes);
                if done {
                    return Ok(out);
                }
            }
            ReadOutcome::Eof => return Ok(out),
            ReadOutcome::WouldBlock => continue,
        }
    }
}

/// Bytes writable right now without the host reporting backpressure.
#[op2(fast)]
pub fn op_body_capacity(op_state: &mut OpState, #[smi] rid: ResourceId) -> f64 {
    match outgoing(op_state, rid) {
        Ok(body) => body
            .sink
            .borrow_mut()
            .as_mut()
            .and_then(|s| s.capacity().ok())
            .unwrap_or(0) as f64,
        Err(_) => 0.0,
    }
}

#[op2(fast)]
pub fn op_body_write(
    op_state: &mut OpState,
    #[smi] rid: ResourceId,
    #[buffer] chunk: &[u8],
) -> Result<(), RuntimeError> {
    let body = outgoing(op_state, rid)
        .map_err(|_| RuntimeError::type_error("OutgoingBody (already released)"))?;
    let mut sink = body.sink.borrow_mut();
    let sink = sink
        .as_mut()
        .ok_or_else(|| RuntimeError::type_error("OutgoingBody (already closed)"))?;
    sink.write(chunk).map_err(|e| RuntimeError::type_error(e.to_string()))
}

#[op2(fast)]
pub fn op_body_close(op_state: &mut OpState, #[smi] rid: ResourceId) {
    if let Ok(body) = outgoing(op_state, rid) {
        if let Some(mut sink) = body.sink.borrow_mut().take() {
            let _ = sink.blocking_flush();
            sink.close();
        }
    }
}

/// Direct append fast path (spec §4.3): pipes `src` straight into `dst`
/// without ever materializing a chunk in JS.
#[op2(async)]
pub async fn op_body_append(
    op_state: Rc<RefCell<OpState>>,
    #[smi] src: ResourceId,
    #[smi] dst: ResourceId,
) -> Result<(), RuntimeError> {
    let _interest = InterestGuard::new(op_state.clone());
    let (src_stream, dst_sink) = {
        let mut op_state = op_state.borrow_mut();
        let src_body =
            incoming(&mut op_state, src).map_err(|_| RuntimeError::type_error("IncomingBody"))?;
        let dst_body =
            outgoing(&mut op_state, dst).map_err(|_| RuntimeError::type_error("OutgoingBody"))?;
        let dst_sink = dst_body
            .sink
            .borrow_mut()
            .take()
            .ok_or_else(|| RuntimeError::type_error("OutgoingBody (already closed)"))?;
        (src_body.stream.clone(), dst_sink)
    };

    let cell = tasks::shared::<starling_core::Result<()>>();
    let task = tasks::StreamPipeTask::new(src_stream, dst_sink, cell.clone());
    {
        let mut op_state = op_state.borrow_mut();
        op_state.borrow_mut::<EventLoop>().queue(Box::new(task));
    }

    TaskFuture(cell)
        .await
        .map_err(|e| RuntimeError::type_error(e.to_string()))
}
