//! Raw bindings for calling from Rust into the JS-side Web API surface
//! (Headers, Request, Response, Event, AbortSignal, ...) implemented by
//! `ext/*`'s glue scripts.

pub(crate) mod js;

use deno_core::v8;

/// A thin wrapper around the global object, used as the receiver for static
/// class lookups (`globalThis.Headers`, `globalThis.Response`, ...).
pub struct WorkerGlobalScope<'s>(pub v8::Local<'s, v8::Object>);

/// Returns the realm's global object.
pub fn worker_global_scope<'s>(scope: &mut v8::HandleScope<'s>) -> WorkerGlobalScope<'s> {
    let ctx = scope.get_current_context();
    WorkerGlobalScope(ctx.global(scope))
}
