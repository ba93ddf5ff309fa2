mod bindings {
    wit_bindgen::generate!({
        world: "starling-proxy",
        path: "wit",
        generate_all,
    });
}

mod host;
mod pollables;

use std::cell::RefCell;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};

use bindings::exports::wasi::http::incoming_handler::{Guest, IncomingRequest, ResponseOutparam};
use bindings::wasi::http::types::Method;

use starling_core::host::HostCapabilities;
use starling_runtime::{init_v8_code_range, StarlingRuntime, StarlingRuntimeOptions};

use host::clock::WasiClock;
use host::http::WasiHttpOutgoing;
use host::random::WasiRandom;
use host::response::WasiResponseSink;
use host::streams::WasiIncomingStream;
use pollables::{ComponentPoll, PollableRegistry};

/// The worker script every request is dispatched into. The proxy world has
/// no `wasi:filesystem`/`wasi:cli` access to load one at runtime (spec §2,
/// §4.5), so it's bundled at compile time; a real deployment replaces this
/// file and rebuilds rather than configuring a loader path.
const APP_JS: &str = include_str!("app.js");

// Holds the `response-outparam` for the request currently being dispatched,
// so `WasiResponseSink::start` (called from deep inside a `main.js` promise
// chain, with no path back to `handle`'s stack frame) can consume it exactly
// once via `ResponseOutparam::set`. Single-threaded by construction: wasm32
// components never have a second thread to race this against, and
// `StarlingRuntime` never reenters `handle` before the previous request's
// event loop has drained.
thread_local! {
    static RESPONSE_OUTPARAM: RefCell<Option<ResponseOutparam>> = RefCell::new(None);
    static RUNTIME: RefCell<Option<ComponentRuntime>> = RefCell::new(None);
}

struct ComponentRuntime {
    runtime: StarlingRuntime,
    registry: Rc<PollableRegistry>,
}

/// Polls a future to completion with a no-op waker. Valid here because
/// nothing in `app.js`'s module evaluation or `main.js`'s dispatch path ever
/// truly suspends on external I/O outside of what `EventLoop::run` already
/// drives explicitly through `ComponentPoll`; this only unblocks deno_core's
/// own internal bookkeeping futures (mirrors `StarlingRuntime::drain_microtasks`).
fn block_on<F: std::future::Future>(fut: F) -> F::Output {
    let waker = futures::task::noop_waker();
    let mut cx = Context::from_waker(&waker);
    let mut fut = Box::pin(fut);
    loop {
        match Pin::new(&mut fut).poll(&mut cx) {
            Poll::Ready(value) => return value,
            Poll::Pending => continue,
        }
    }
}

fn method_to_str(method: &Method) -> String {
    match method {
        Method::Get => "GET".into(),
        Method::Head => "HEAD".into(),
        Method::Post => "POST".into(),
        Method::Put => "PUT".into(),
        Method::Delete => "DELETE".into(),
        Method::Connect => "CONNECT".into(),
        Method::Options => "OPTIONS".into(),
        Method::Trace => "TRACE".into(),
        Method::Patch => "PATCH".into(),
        Method::Other(s) => s.clone(),
    }
}

fn scheme_to_str(scheme: &bindings::wasi::http::types::Scheme) -> String {
    use bindings::wasi::http::types::Scheme;
    match scheme {
        Scheme::Http => "http".into(),
        Scheme::Https => "https".into(),
        Scheme::Other(s) => s.clone(),
    }
}

fn init_component_runtime() -> ComponentRuntime {
    init_v8_code_range();
    let _ = env_logger::try_init();

    let registry = Rc::new(PollableRegistry::new());
    let host = HostCapabilities {
        clock: Rc::new(WasiClock::new(registry.clone())),
        random: Rc::new(WasiRandom),
        http: Rc::new(WasiHttpOutgoing::new(registry.clone())),
    };

    let specifier = deno_core::resolve_import("file://starling/app", "//app.js")
        .expect("the bundled app.js specifier always resolves");
    let loader = deno_core::StaticModuleLoader::with(specifier.clone(), APP_JS);

    let mut runtime = StarlingRuntime::new(StarlingRuntimeOptions {
        host: Some(host),
        module_loader: Rc::new(loader),
        ..Default::default()
    });

    block_on(runtime.execute_main_module(&specifier))
        .expect("the bundled app.js failed to evaluate");

    ComponentRuntime { runtime, registry }
}

struct Component;

impl Guest for Component {
    fn handle(request: IncomingRequest, response_out: ResponseOutparam) {
        RUNTIME.with(|cell| {
            let mut slot = cell.borrow_mut();
            let component = slot.get_or_insert_with(init_component_runtime);

            let method = method_to_str(&request.method());
            let scheme = request
                .scheme()
                .map(|s| scheme_to_str(&s))
                .unwrap_or_else(|| "http".into());
            let authority = request.authority().unwrap_or_else(|| "localhost".into());
            let path_with_query = request.path_with_query().unwrap_or_else(|| "/".into());
            let headers: Vec<(String, String)> = request
                .headers()
                .entries()
                .into_iter()
                .map(|(name, value)| (name, String::from_utf8_lossy(&value).into_owned()))
                .collect();
            let url = format!("{scheme}://{authority}{path_with_query}");

            let body_rid = match request.consume() {
                Ok(body) => match body.stream() {
                    Ok(stream) => Some(component.runtime.register_incoming_body(Box::new(
                        WasiIncomingStream::new(stream, component.registry.clone()),
                    ))),
                    Err(()) => None,
                },
                Err(()) => None,
            };

            let sink = WasiResponseSink::new(component.registry.clone());
            let sink_rid = component.runtime.register_outgoing_response(Box::new(sink));

            RESPONSE_OUTPARAM.with(|slot| *slot.borrow_mut() = Some(response_out));

            if let Err(e) =
                component
                    .runtime
                    .dispatch_incoming_request(&method, &url, &headers, body_rid, sink_rid)
            {
                log::error!(target: "starling::component", "dispatch failed: {e}");
            }

            let poll = ComponentPoll {
                registry: component.registry.clone(),
            };
            if let Err(e) = component.runtime.run_event_loop_with(&poll) {
                log::error!(target: "starling::component", "event loop failed: {e}");
            }
        });
    }
}

bindings::export!(Component with_types_in bindings);
