use crate::resource::PollableHandle;
use crate::Result;

/// A unit of suspended work tied to a single pollable.
///
/// Concrete task kinds (timers, body reads, direct-append pumps, response
/// futures) live in `starling_runtime`, since they carry JS object
/// references that must be traced by the JS engine's GC. `starling_core`
/// only needs the shape: something with a pollable to wait on, an optional
/// deadline, and a `run` that is resumed once.
pub trait AsyncTask {
    /// The pollable this task is currently waiting on. Queried fresh on
    /// every iteration of the event loop: a task that rearms itself (e.g. a
    /// body reader that just consumed a chunk) returns a different handle
    /// after `run` than it did before.
    fn pollable(&self) -> PollableHandle;

    /// Absolute deadline in nanoseconds since the monotonic clock's epoch,
    /// if this task is driven by a clock subscription. `None` for IO/stream
    /// tasks, which only care about readiness, not wall-clock time.
    fn deadline(&self) -> Option<u64> {
        None
    }

    /// Resumes the task. Returning `Ok(true)` keeps it queued for another
    /// round (it rearmed itself via a new `pollable()`); `Ok(false)`
    /// requests removal, after which `cancel` is invoked. An `Err` also
    /// removes the task after `cancel` runs.
    fn run(&mut self) -> Result<bool>;

    /// Releases the task's pollable and any interest it was holding.
    /// Invoked exactly once, whether the task completed normally, errored,
    /// or was cancelled by the embedder (e.g. an aborted fetch).
    fn cancel(&mut self);
}
