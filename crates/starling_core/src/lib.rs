//! Host capability and async scheduling primitives for the Starling runtime.
//!
//! This crate has no knowledge of JavaScript. It models the WASI 0.2 host
//! surface (clocks, random, IO streams, HTTP) as a set of capability traits,
//! and provides the single-threaded cooperative event loop that drives them.
//! The `starling_runtime` crate wires these primitives to a JS engine;
//! `starling_component` wires the whole thing to a wasi:http proxy world
//! export.

pub mod error;
pub mod event_loop;
pub mod host;
pub mod resource;
pub mod task;

pub use error::{Error, Result};
pub use event_loop::{EventLoop, Interest, TaskId};
pub use resource::PollableHandle;
pub use task::AsyncTask;
