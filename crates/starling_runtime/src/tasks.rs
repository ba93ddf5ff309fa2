//! Concrete [`starling_core::AsyncTask`] kinds.
//!
//! `starling_core` knows nothing about v8; it only knows a task can be
//! polled and run. Each task here closes over whatever v8 handles it needs
//! to complete a JS-visible effect (resolve a promise, enqueue a chunk into
//! a `ReadableStream` controller, push a `done` into a timer callback) and
//! is queued on the `starling_core::EventLoop` stashed in `OpState`.

use std::cell::RefCell;
use std::rc::Rc;
use std::task::Waker;

use deno_core::OpState;

use starling_core::host::http::ResponseFuture;
use starling_core::host::io::{InputStream, OutputStream, ReadOutcome};
use starling_core::host::Clock;
use starling_core::resource::PollableHandle;
use starling_core::{AsyncTask, EventLoop, Result as CoreResult};

/// Keeps the event loop's interest counter raised for as long as an async
/// op is waiting on a queued task. `starling_timers` manages interest by
/// hand because a timer's interest spans many `op_timer_await` calls; a
/// single op that queues one task and awaits it to completion just needs
/// the increment released whenever the `.await` returns — including on an
/// early `?` — which a guard handles and hand-paired calls don't.
pub struct InterestGuard {
    op_state: Rc<RefCell<OpState>>,
}

impl InterestGuard {
    pub fn new(op_state: Rc<RefCell<OpState>>) -> Self {
        op_state.borrow_mut().borrow_mut::<EventLoop>().incr_interest();
        Self { op_state }
    }
}

impl Drop for InterestGuard {
    fn drop(&mut self) {
        let _ = self
            .op_state
            .borrow_mut()
            .borrow_mut::<EventLoop>()
            .decr_interest();
    }
}

/// Shared cell between an `AsyncTask` and the `Future` a `#[op2(async)]` op
/// handed back to JS. The task's `run` sets `ready`/`value` then wakes the
/// future; the future's `poll` reads them back. This is the bridge that
/// lets native async ops complete on our own cooperative loop instead of a
/// tokio reactor.
pub struct TaskCell<T> {
    pub ready: bool,
    pub value: Option<T>,
    pub waker: Option<Waker>,
}

impl<T> Default for TaskCell<T> {
    fn default() -> Self {
        Self {
            ready: false,
            value: None,
            waker: None,
        }
    }
}

impl<T> TaskCell<T> {
    pub fn complete(&mut self, value: T) {
        self.ready = true;
        self.value = Some(value);
        if let Some(waker) = self.waker.take() {
            waker.wake();
        }
    }
}

pub type Shared<T> = Rc<RefCell<TaskCell<T>>>;

pub fn shared<T>() -> Shared<T> {
    Rc::new(RefCell::new(TaskCell::default()))
}

/// A pending `#[op2(async)]` future backed by a [`TaskCell`] rather than a
/// tokio timer or channel.
pub struct TaskFuture<T>(pub Shared<T>);

impl<T: Unpin> std::future::Future for TaskFuture<T> {
    type Output = T;

    fn poll(
        self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Self::Output> {
        let mut cell = self.0.borrow_mut();
        if let Some(value) = cell.value.take() {
            std::task::Poll::Ready(value)
        } else {
            cell.waker = Some(cx.waker().clone());
            std::task::Poll::Pending
        }
    }
}

/// Backs `setTimeout`/`setInterval` (spec §4.7). One-shot timers remove
/// themselves from the loop on fire; intervals re-subscribe and keep
/// running until cancelled.
pub struct TimerTask {
    clock: Rc<dyn Clock>,
    deadline_ns: u64,
    period_ns: Option<u64>,
    pollable: PollableHandle,
    cell: Shared<()>,
}

impl TimerTask {
    pub fn new(clock: Rc<dyn Clock>, delay_ns: u64, repeating: bool, cell: Shared<()>) -> Self {
        let deadline_ns = clock.now() + delay_ns;
        let pollable = clock.subscribe(deadline_ns, true);
        Self {
            clock,
            deadline_ns,
            period_ns: repeating.then_some(delay_ns),
            pollable,
            cell,
        }
    }
}

impl AsyncTask for TimerTask {
    fn pollable(&self) -> PollableHandle {
        self.pollable
    }

    fn deadline(&self) -> Option<u64> {
        Some(self.deadline_ns)
    }

    fn run(&mut self) -> CoreResult<bool> {
        self.cell.borrow_mut().complete(());
        match self.period_ns {
            Some(period) => {
                self.deadline_ns = self.clock.now() + period;
                self.pollable = self.clock.subscribe(self.deadline_ns, true);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn cancel(&mut self) {}
}

/// Polls a [`ResponseFuture`] to completion; backs the pending half of
/// `fetch()` before headers are available (spec §4.4).
pub struct ResponseFutureTask {
    future: Box<dyn ResponseFuture>,
    pollable: PollableHandle,
    cell: Shared<CoreResult<starling_core::host::http::IncomingResponseParts>>,
}

impl ResponseFutureTask {
    pub fn new(
        mut future: Box<dyn ResponseFuture>,
        cell: Shared<CoreResult<starling_core::host::http::IncomingResponseParts>>,
    ) -> Self {
        let pollable = future.subscribe();
        Self {
            future,
            pollable,
            cell,
        }
    }
}

impl AsyncTask for ResponseFutureTask {
    fn pollable(&self) -> PollableHandle {
        self.pollable
    }

    fn run(&mut self) -> CoreResult<bool> {
        match self.future.poll() {
            Some(result) => {
                self.cell
                    .borrow_mut()
                    .complete(result.map_err(starling_core::Error::from));
                Ok(false)
            }
            None => Ok(true),
        }
    }

    fn cancel(&mut self) {
        self.future.cancel();
    }
}

/// One read attempt against a host [`InputStream`], reported back through
/// `cell`. Deliberately one-shot rather than self-requeuing: `IncomingBody`
/// (`ext::starling_body`) queues a fresh task per `ReadableStream` pull, so
/// backpressure comes from the stream's own demand rather than from the
/// task racing ahead of a consumer that hasn't asked for more bytes yet.
/// The stream itself lives in the shared slot for the body's whole
/// lifetime; the task only ever borrows it for the duration of one `run`.
pub struct BodyReadTask {
    stream: Rc<RefCell<Box<dyn InputStream>>>,
    pollable: PollableHandle,
    cell: Shared<ReadOutcome>,
    chunk_size: usize,
}

impl BodyReadTask {
    pub fn new(
        stream: Rc<RefCell<Box<dyn InputStream>>>,
        cell: Shared<ReadOutcome>,
        chunk_size: usize,
    ) -> Self {
        let pollable = stream.borrow_mut().subscribe();
        Self {
            stream,
            pollable,
            cell,
            chunk_size,
        }
    }
}

impl AsyncTask for BodyReadTask {
    fn pollable(&self) -> PollableHandle {
        self.pollable
    }

    fn run(&mut self) -> CoreResult<bool> {
        let outcome = self
            .stream
            .borrow_mut()
            .read(self.chunk_size)
            .map_err(starling_core::Error::from)?;
        self.cell.borrow_mut().complete(outcome);
        Ok(false)
    }

    fn cancel(&mut self) {
        self.stream.borrow_mut().close();
    }
}

/// Pipes an `IncomingBody` straight into an `OutgoingBody` (spec §4.3's
/// direct append fast path) without ever materializing a chunk in JS.
/// Implements the BlockedOnBoth/BlockedOnIncoming/BlockedOnOutgoing/Ready
/// state machine directly, one step per `run`.
enum PipeState {
    BlockedOnBoth,
    BlockedOnIncoming,
    BlockedOnOutgoing,
    Ready,
}

pub struct StreamPipeTask {
    src: Rc<RefCell<Box<dyn InputStream>>>,
    dst: Box<dyn OutputStream>,
    state: PipeState,
    pending: Vec<u8>,
    pollable: PollableHandle,
    cell: Shared<CoreResult<()>>,
}

impl StreamPipeTask {
    pub fn new(
        src: Rc<RefCell<Box<dyn InputStream>>>,
        mut dst: Box<dyn OutputStream>,
        cell: Shared<CoreResult<()>>,
    ) -> Self {
        let src_pollable = src.borrow_mut().subscribe();
        let dst_pollable = dst.subscribe();
        let (state, pollable) = match (src_pollable, dst_pollable) {
            (PollableHandle::Immediate, _) | (_, PollableHandle::Immediate) => {
                (PipeState::Ready, PollableHandle::Immediate)
            }
            _ => (PipeState::BlockedOnBoth, src_pollable),
        };
        Self {
            src,
            dst,
            state,
            pending: Vec::new(),
            pollable,
            cell,
        }
    }

    fn finish(&mut self, result: CoreResult<()>) {
        self.dst.close();
        self.cell.borrow_mut().complete(result);
    }
}

impl AsyncTask for StreamPipeTask {
    fn pollable(&self) -> PollableHandle {
        self.pollable
    }

    fn run(&mut self) -> CoreResult<bool> {
        loop {
            match self.state {
                PipeState::BlockedOnBoth | PipeState::BlockedOnIncoming => {
                    let outcome = match self.src.borrow_mut().read(16 * 1024) {
                        Ok(o) => o,
                        Err(e) => {
                            let err = starling_core::Error::from(e);
                            self.finish(Err(clone_err(&err)));
                            return Ok(false);
                        }
                    };
                    match outcome {
                        ReadOutcome::Data { bytes, done } => {
                            self.pending = bytes;
                            self.state = PipeState::Ready;
                            if done {
                                // One more `Ready` pass drains `pending`,
                                // then `finish` fires on the empty follow-up.
                            }
                        }
                        ReadOutcome::Eof => {
                            self.finish(Ok(()));
                            return Ok(false);
                        }
                        ReadOutcome::WouldBlock => {
                            self.pollable = self.src.borrow_mut().subscribe();
                            self.state = PipeState::BlockedOnIncoming;
                            return Ok(true);
                        }
                    }
                }
                PipeState::BlockedOnOutgoing => {
                    let capacity = match self.dst.capacity() {
                        Ok(c) => c,
                        Err(e) => {
                            self.finish(Err(clone_err(&starling_core::Error::from(e))));
                            return Ok(false);
                        }
                    };
                    if capacity == 0 {
                        self.pollable = self.dst.subscribe();
                        return Ok(true);
                    }
                    self.state = PipeState::Ready;
                }
                PipeState::Ready => {
                    if self.pending.is_empty() {
                        self.state = PipeState::BlockedOnIncoming;
                        self.pollable = self.src.borrow_mut().subscribe();
                        return Ok(true);
                    }
                    let capacity = match self.dst.capacity() {
                        Ok(c) => c as usize,
                        Err(e) => {
                            self.finish(Err(clone_err(&starling_core::Error::from(e))));
                            return Ok(false);
                        }
                    };
                    if capacity == 0 {
                        self.state = PipeState::BlockedOnOutgoing;
                        self.pollable = self.dst.subscribe();
                        return Ok(true);
                    }
                    let take = capacity.min(self.pending.len());
                    let chunk: Vec<u8> = self.pending.drain(..take).collect();
                    if let Err(e) = self.dst.write(&chunk) {
                        self.finish(Err(clone_err(&starling_core::Error::from(e))));
                        return Ok(false);
                    }
                    if self.pending.is_empty() {
                        self.state = PipeState::BlockedOnIncoming;
                        self.pollable = self.src.borrow_mut().subscribe();
                        return Ok(true);
                    }
                }
            }
        }
    }

    fn cancel(&mut self) {
        self.src.borrow_mut().close();
        self.dst.close();
    }
}

fn clone_err(e: &starling_core::Error) -> starling_core::Error {
    starling_core::Error::Host(starling_core::error::HostError {
        code: -1,
        message: e.to_string(),
    })
}
