//! Bridges `starling_core::resource::PollableHandle`'s bare `u32` handles to
//! this component's owned `wasi:io/poll` resources.
//!
//! `starling_core` only ever hands a `u32` around (the `Handle` case); it has
//! no notion of the typed, borrow-checked `Pollable` resource wit-bindgen
//! generates. Every host adapter that hands out a `PollableHandle::Handle`
//! first inserts the real resource here and uses the slab key as that
//! handle, so [`ComponentPoll`] can later look the resource back up to make
//! the real `wasi:io/poll.poll` call.

use std::cell::RefCell;

use slab::Slab;
use starling_core::event_loop::HostPoll;

use crate::bindings::wasi::io::poll::{poll as wasi_poll, Pollable};

#[derive(Default)]
pub struct PollableRegistry {
    slots: RefCell<Slab<Pollable>>,
}

impl PollableRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes ownership of a freshly subscribed pollable, returning the slab
    /// key to use as a `PollableHandle::Handle`.
    pub fn insert(&self, pollable: Pollable) -> u32 {
        self.slots.borrow_mut().insert(pollable) as u32
    }

    /// Drops a pollable once its task no longer needs it (the task
    /// completed, or resubscribed and got a different handle back).
    pub fn remove(&self, key: u32) {
        self.slots.borrow_mut().try_remove(key as usize);
    }
}

/// The real [`HostPoll`] implementation, backing `StarlingRuntime::
/// run_event_loop_with` for every request this component handles.
pub struct ComponentPoll {
    pub registry: std::rc::Rc<PollableRegistry>,
}

impl HostPoll for ComponentPoll {
    fn poll(&self, handles: &[u32]) -> Vec<u32> {
        let slots = self.registry.slots.borrow();
        // `wasi_poll` returns indices into its own argument list, not into
        // `handles`; `kept` maps each position in that argument list back to
        // the `handles` index it came from, so a key missing from the
        // registry (shouldn't happen, but isn't assumed) doesn't shift every
        // index after it.
        let mut kept: Vec<usize> = Vec::with_capacity(handles.len());
        let mut borrowed: Vec<&Pollable> = Vec::with_capacity(handles.len());
        for (i, key) in handles.iter().enumerate() {
            if let Some(pollable) = slots.get(*key as usize) {
                kept.push(i);
                borrowed.push(pollable);
            }
        }
        if borrowed.is_empty() {
            return Vec::new();
        }
        wasi_poll(&borrowed)
            .into_iter()
            .filter_map(|idx| kept.get(idx as usize).map(|&i| i as u32))
            .collect()
    }
}
