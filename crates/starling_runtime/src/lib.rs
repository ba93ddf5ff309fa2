pub mod error;
mod ext;
pub(crate) mod sys;
pub mod tasks;
pub mod runtime;
#[cfg(test)]
pub(crate) mod test_support;

pub use runtime::{StarlingRuntime, StarlingRuntimeOptions, StarlingRuntimeSnapshot};
pub use starling_core::{EventLoop, Interest, TaskId};
