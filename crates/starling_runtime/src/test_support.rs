//! In-memory fakes for [`starling_core::host`] traits, used by unit tests
//! that exercise timers/fetch without a wasm host. Production always goes
//! through `starling_component`'s real WASI-backed implementations.

use std::cell::Cell;
use std::rc::Rc;

use starling_core::error::HostError;
use starling_core::host::{Clock, HttpOutgoing, RandomSource};
use starling_core::host::http::{OutgoingRequest, OutgoingRequestParts};
use starling_core::resource::PollableHandle;
use starling_core::host::HostCapabilities;

/// A clock with no real wall-clock behind it: `now()` never advances on its
/// own, and every `subscribe` returns an always-ready pollable, so timers
/// fire on the very next event loop round regardless of the requested delay.
/// Good enough for ordering/count assertions; not a substitute for testing
/// actual elapsed-time semantics.
pub struct FakeClock {
    now: Cell<u64>,
}

impl FakeClock {
    pub fn new() -> Rc<Self> {
        Rc::new(Self { now: Cell::new(0) })
    }
}

impl Clock for FakeClock {
    fn now(&self) -> u64 {
        self.now.get()
    }

    fn subscribe(&self, _when_ns: u64, _absolute: bool) -> PollableHandle {
        PollableHandle::Immediate
    }
}

pub struct FakeRandom;

impl RandomSource for FakeRandom {
    fn get_bytes(&self, n: usize) -> Vec<u8> {
        (0..n).map(|i| i as u8).collect()
    }

    fn get_u32(&self) -> u32 {
        0x2a2a2a2a
    }
}

pub struct FakeHttp;

impl HttpOutgoing for FakeHttp {
    fn new_request(
        &self,
        _parts: OutgoingRequestParts,
    ) -> Result<Box<dyn OutgoingRequest>, HostError> {
        Err(HostError::new(-1, "outgoing http not available in this test host"))
    }
}

pub fn fake_host() -> HostCapabilities {
    HostCapabilities {
        clock: FakeClock::new(),
        random: Rc::new(FakeRandom),
        http: Rc::new(FakeHttp),
    }
}
