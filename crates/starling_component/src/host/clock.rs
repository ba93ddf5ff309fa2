use std::rc::Rc;

use starling_core::host::Clock;
use starling_core::resource::PollableHandle;

use crate::bindings::wasi::clocks::monotonic_clock;
use crate::pollables::PollableRegistry;

pub struct WasiClock {
    registry: Rc<PollableRegistry>,
}

impl WasiClock {
    pub fn new(registry: Rc<PollableRegistry>) -> Self {
        Self { registry }
    }
}

impl Clock for WasiClock {
    fn now(&self) -> u64 {
        monotonic_clock::now()
    }

    fn subscribe(&self, when_ns: u64, absolute: bool) -> PollableHandle {
        let pollable = if absolute {
            monotonic_clock::subscribe_instant(when_ns)
        } else {
            monotonic_clock::subscribe_duration(when_ns)
        };
        PollableHandle::Handle(self.registry.insert(pollable))
    }
}
