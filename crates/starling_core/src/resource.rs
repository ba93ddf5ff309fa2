//! The event loop's view of a host pollable.
//!
//! Every WASI 0.2 capability (an input-stream, an outgoing-body, a
//! future-incoming-response, ...) subscribes to a pollable that is, from the
//! guest's point of view, just an integer handle. `starling_core` never owns
//! those handles directly — `starling_runtime`'s host traits and
//! `starling_component`'s WASI adapters do, against their own concrete
//! resource types — so all it needs is this handle and two sentinels the
//! event loop treats specially.

/// A handle into the host's pollable table, or one of two sentinels the
/// event loop treats specially.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollableHandle {
    /// Not yet subscribed; must not appear in a `poll` call.
    Invalid,
    /// Synthetic pollable that is always ready. Forces the next `poll` to
    /// return immediately instead of blocking.
    Immediate,
    /// A real host pollable handle.
    Handle(u32),
}

impl PollableHandle {
    pub fn is_valid(self) -> bool {
        !matches!(self, PollableHandle::Invalid)
    }
}
