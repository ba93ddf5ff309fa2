use crate::error::HostError;
use crate::resource::PollableHandle;

/// Outcome of a single `read`. WASI's `stream-error` distinguishes a closed
/// stream (EOF) from a genuine fault; callers must not confuse the two, since
/// EOF closes a `ReadableStream`'s controller while a fault errors it.
pub enum ReadOutcome {
    /// Bytes were available; `done` is true if this read also observed EOF.
    Data { bytes: Vec<u8>, done: bool },
    /// No bytes were available yet, but the stream is still open.
    WouldBlock,
    /// The stream reached its end with no further bytes.
    Eof,
}

/// Wraps a WASI `input-stream` (`streams.input.read`).
pub trait InputStream {
    /// Reads at most `max` bytes without blocking.
    fn read(&mut self, max: usize) -> Result<ReadOutcome, HostError>;

    fn subscribe(&mut self) -> PollableHandle;

    fn close(&mut self);
}

/// Wraps a WASI `output-stream` (`check-write` / `write` / `blocking-flush`).
pub trait OutputStream {
    /// Bytes that can be written right now without blocking.
    fn capacity(&mut self) -> Result<u64, HostError>;

    /// Writes `bytes` without exceeding `capacity()`. Callers are
    /// responsible for splitting writes larger than the last observed
    /// capacity (see `write_all`/`OutgoingBody` in `starling_runtime`).
    fn write(&mut self, bytes: &[u8]) -> Result<(), HostError>;

    /// Blocking flush: used only at `close()` time.
    fn blocking_flush(&mut self) -> Result<(), HostError>;

    fn subscribe(&mut self) -> PollableHandle;

    fn close(&mut self);
}
