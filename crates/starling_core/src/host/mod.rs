//! Host capability interface (spec §6).
//!
//! These traits describe the WASI 0.2 surface the runtime consumes: a
//! monotonic clock, a random source, IO streams, and HTTP in/out. They are
//! implemented against the real `wasi:*` imports in `starling_component`
//! (the only crate that depends on the generated bindings) and against an
//! in-memory fake in tests. Everything above this layer — the event loop,
//! the fetch pipeline, bodies — is written against the trait objects, never
//! against `wit-bindgen` types directly, so it can be exercised without a
//! wasm runtime.

pub mod clock;
pub mod http;
pub mod io;
pub mod random;

pub use clock::Clock;
pub use http::{HttpIncoming, HttpOutgoing};
pub use io::{InputStream, OutputStream};
pub use random::RandomSource;

use std::rc::Rc;

/// The full set of host capabilities, bundled so a single `Rc` can be
/// stashed in `OpState` and handed to every extension.
pub struct HostCapabilities {
    pub clock: Rc<dyn Clock>,
    pub random: Rc<dyn RandomSource>,
    pub http: Rc<dyn HttpOutgoing>,
}
