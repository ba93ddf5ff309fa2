pub(crate) mod starling_abort;
pub(crate) mod starling_blob;
pub(crate) mod starling_body;
pub(crate) mod starling_console;
pub(crate) mod starling_event;
pub(crate) mod starling_fetch;
pub(crate) mod starling_formdata;
pub(crate) mod starling_headers;
pub(crate) mod starling_main;
pub(crate) mod starling_request_response;
pub(crate) mod starling_timers;

/// A capability that the host embedding this runtime did not provide (e.g.
/// outgoing HTTP in a unit test harness built without `HostCapabilities`).
/// Distinct from a *network* failure: this is a configuration error, never
/// something script can recover from by catching and retrying.
#[derive(Debug, ::thiserror::Error, deno_error::JsError)]
#[class(not_supported)]
#[error("{name} is not supported in this runtime configuration")]
pub struct NotSupported {
    pub name: &'static str,
}
