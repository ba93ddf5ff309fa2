use std::rc::Rc;

use starling_core::error::HostError;
use starling_core::host::io::{InputStream, OutputStream, ReadOutcome};
use starling_core::resource::PollableHandle;

use crate::bindings::wasi::http::types::OutgoingBody;
use crate::bindings::wasi::io::streams::{
    InputStream as WasiInputStream, OutputStream as WasiOutputStream, StreamError,
};
use crate::pollables::PollableRegistry;

const READ_CHUNK: u64 = 16 * 1024;

fn stream_error(e: StreamError) -> HostError {
    match e {
        StreamError::LastOperationFailed(err) => HostError::new(-1, err.to_debug_string()),
        StreamError::Closed => HostError::new(0, "stream closed"),
    }
}

pub struct WasiIncomingStream {
    inner: Option<WasiInputStream>,
    registry: Rc<PollableRegistry>,
}

impl WasiIncomingStream {
    pub fn new(inner: WasiInputStream, registry: Rc<PollableRegistry>) -> Self {
        Self { inner: Some(inner), registry }
    }
}

impl InputStream for WasiIncomingStream {
    fn read(&mut self, max: usize) -> Result<ReadOutcome, HostError> {
        let Some(stream) = self.inner.as_ref() else {
            return Ok(ReadOutcome::Eof);
        };
        match stream.read((max as u64).min(READ_CHUNK)) {
            Ok(bytes) if bytes.is_empty() => Ok(ReadOutcome::WouldBlock),
            Ok(bytes) => Ok(ReadOutcome::Data { bytes, done: false }),
            Err(StreamError::Closed) => Ok(ReadOutcome::Eof),
            Err(e) => Err(stream_error(e)),
        }
    }

    fn subscribe(&mut self) -> PollableHandle {
        match self.inner.as_ref() {
            Some(stream) => PollableHandle::Handle(self.registry.insert(stream.subscribe())),
            None => PollableHandle::Immediate,
        }
    }

    fn close(&mut self) {
        self.inner.take();
    }
}

/// Wraps an `outgoing-body`'s write stream. Owns the `outgoing-body`
/// resource itself too (not just the stream `body()` returned), so
/// `close()` can finalize it with `OutgoingBody::finish` — required by
/// `wasi:http` before the host considers the body complete, whether it's a
/// request body (`starling_fetch`) or a response body (`starling_main`'s
/// `OutgoingResponseSink`).
pub struct WasiOutgoingStream {
    inner: Option<WasiOutputStream>,
    body: Option<OutgoingBody>,
    registry: Rc<PollableRegistry>,
}

impl WasiOutgoingStream {
    pub fn new(inner: WasiOutputStream, body: OutgoingBody, registry: Rc<PollableRegistry>) -> Self {
        Self { inner: Some(inner), body: Some(body), registry }
    }
}

impl OutputStream for WasiOutgoingStream {
    fn capacity(&mut self) -> Result<u64, HostError> {
        let stream = self
            .inner
            .as_ref()
            .ok_or_else(|| HostError::new(0, "stream closed"))?;
        stream.check_write().map_err(stream_error)
    }

    fn write(&mut self, bytes: &[u8]) -> Result<(), HostError> {
        let stream = self
            .inner
            .as_ref()
            .ok_or_else(|| HostError::new(0, "stream closed"))?;
        stream.write(bytes).map_err(stream_error)
    }

    fn blocking_flush(&mut self) -> Result<(), HostError> {
        let Some(stream) = self.inner.as_ref() else {
            return Ok(());
        };
        stream.blocking_flush().map_err(stream_error)
    }

    fn subscribe(&mut self) -> PollableHandle {
        match self.inner.as_ref() {
            Some(stream) => PollableHandle::Handle(self.registry.insert(stream.subscribe())),
            None => PollableHandle::Immediate,
        }
    }

    fn close(&mut self) {
        // Dropping `inner` releases the write-stream handle; `OutgoingBody`
        // must additionally be consumed by `finish` or the host never sees
        // the body as complete. No trailers: nothing above this layer
        // produces any.
        self.inner.take();
        if let Some(body) = self.body.take() {
            let _ = OutgoingBody::finish(body, None);
        }
    }
}
