use std::{
    ops::{Deref, DerefMut},
    rc::Rc,
};

use deno_core::*;
use serde::Deserialize;

use crate::error::Result;
use deno_console;
use deno_url;
use deno_web::TimersPermission;
use deno_webidl;
use starling_core::host::HostCapabilities;
use starling_core::EventLoop;

/// Call this **before** creating any `JsRuntime`. Bounds V8's code range so
/// the runtime stays within the component's linear memory budget.
pub fn init_v8_code_range() {
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| {
        const FLAG: &str = "--v8-code-range-size=256";
        unsafe {
            v8::V8::set_flags_from_string(FLAG);
        }
    });
}

/// Wraps a single V8 isolate and its registered extensions (spec §2, §9).
/// Owns no host capabilities directly; those are bundled into
/// [`HostCapabilities`] and stashed in `OpState` by the caller (normally
/// `starling_component`, or a test harness for unit tests run without a
/// wasm host).
pub struct StarlingRuntime {
    runtime: JsRuntime,
}

pub struct StarlingRuntimeOptions {
    /// Host capabilities (clock, random, outgoing HTTP). `None` leaves the
    /// corresponding ops erroring with `NotSupported`, which is what every
    /// unit test that doesn't touch the network or timers wants.
    pub host: Option<HostCapabilities>,
    /// Additional extensions to register alongside the builtin set.
    pub extensions: Vec<Extension>,
    /// Loader for the "main" ES module (the fetch-event handler script).
    /// Not to be confused with the static ESM registered by extensions.
    pub module_loader: Rc<dyn ModuleLoader>,
}

impl Default for StarlingRuntimeOptions {
    fn default() -> Self {
        Self {
            host: None,
            extensions: Default::default(),
            module_loader: Rc::new(NoopModuleLoader),
        }
    }
}

pub struct StarlingRuntimeSnapshot(Box<[u8]>);

impl StarlingRuntimeSnapshot {
    pub fn snapshot(self) -> &'static [u8] {
        // Safety: only ever dropped at component shutdown.
        Box::leak(self.0)
    }

    pub fn new(options: RuntimeOptions) -> Self {
        let snapshot = JsRuntimeForSnapshot::new(options);
        Self(snapshot.snapshot())
    }
}

impl StarlingRuntime {
    pub fn options() -> RuntimeOptions {
        let extensions = init_extensions();
        let v8_single_threaded = v8::Platform::new_single_threaded(true).make_shared();
        RuntimeOptions {
            extensions,
            v8_platform: Some(v8_single_threaded),
            ..Default::default()
        }
    }

    pub fn new(options: StarlingRuntimeOptions) -> Self {
        let mut extensions = init_extensions();
        extensions.extend(options.extensions);

        let v8_single_threaded = v8::Platform::new_single_threaded(true).make_shared();
        let mut runtime = JsRuntime::new(RuntimeOptions {
            extensions,
            module_loader: Some(options.module_loader),
            v8_platform: Some(v8_single_threaded),
            ..Default::default()
        });

        let op_state = runtime.op_state();
        {
            let mut op_state = op_state.borrow_mut();
            if let Some(host) = options.host {
                op_state.put(host);
            }
            op_state.put(EventLoop::new());
            op_state.put(StarlingPermissions);
        }

        Self { runtime }
    }

    /// Executes classic (non-module) script, ignoring its result.
    pub fn execute(&mut self, code: &str) -> Result<()> {
        self.runtime
            .execute_script("starling://run", code.to_string())?;
        Ok(())
    }

    /// Executes classic script and parses its completion value as `T`.
    pub fn execute_with_result<'de, T: Deserialize<'de>>(&mut self, code: &str) -> Result<T> {
        let value = self
            .runtime
            .execute_script("starling://run", code.to_string())?;
        let scope = &mut self.runtime.handle_scope();
        let local = v8::Local::new(scope, value);
        Ok(serde_v8::from_v8::<T>(scope, local)?)
    }

    pub async fn preload_main_module(
        &mut self,
        module_specifier: &ModuleSpecifier,
    ) -> Result<ModuleId> {
        Ok(self.runtime.load_main_es_module(module_specifier).await?)
    }

    pub async fn evaluate_module(&mut self, id: ModuleId) -> Result<()> {
        let mut receiver = self.runtime.mod_evaluate(id);
        Ok(tokio::select! {
          result = &mut receiver => result,
          run_event_loop_result = self.run_event_loop(Default::default()) => {
            run_event_loop_result?;
            receiver.await
          }
        }?)
    }

    pub async fn run_event_loop(&mut self, poll_options: PollEventLoopOptions) -> Result<()> {
        Ok(self.runtime.run_event_loop(poll_options).await?)
    }

    pub async fn execute_main_module(
        &mut self,
        module_specifier: &ModuleSpecifier,
    ) -> Result<ModuleId> {
        let id = self.preload_main_module(module_specifier).await?;
        self.evaluate_module(id).await?;
        Ok(id)
    }

    /// Drives the `starling_core::EventLoop` stashed in `OpState` to
    /// quiescence against `poll`: alternates draining v8 microtasks (which
    /// also advances any in-flight `#[op2(async)]` futures) with blocking on
    /// whatever host pollables the loop's queued tasks are waiting on, until
    /// no interest remains. `starling_component` calls this once per
    /// incoming request, after kicking off dispatch with [`Self::execute`];
    /// [`Self::run_event_loop_for_test`] is the same thing against a stub
    /// poll that never blocks.
    pub fn run_event_loop_with(&mut self, poll: &dyn starling_core::event_loop::HostPoll) -> Result<()> {
        let op_state_rc = self.runtime.op_state();
        let mut event_loop = {
            let mut op_state = op_state_rc.borrow_mut();
            op_state.take::<EventLoop>()
        };
        let result = event_loop.run(self, poll);
        op_state_rc.borrow_mut().put(event_loop);
        Ok(result?)
    }

    /// Suitable for unit tests that register a
    /// [`crate::test_support::fake_host`] clock (always-ready pollables);
    /// not a stand-in for `starling_component`'s real WASI poll loop.
    pub fn run_event_loop_for_test(&mut self) -> Result<()> {
        struct AlwaysReady;
        impl starling_core::event_loop::HostPoll for AlwaysReady {
            fn poll(&self, handles: &[u32]) -> Vec<u32> {
                (0..handles.len() as u32).collect()
            }
        }

        self.run_event_loop_with(&AlwaysReady)
    }

    /// Registers a host-provided outgoing-response sink (the
    /// `wasi:http/types.response-outparam` wrapper `starling_component`
    /// builds per request) and returns its resource id, for use with
    /// [`Self::dispatch_incoming_request`].
    pub fn register_outgoing_response(
        &mut self,
        sink: Box<dyn starling_core::host::http::OutgoingResponseSink>,
    ) -> ResourceId {
        let op_state = self.runtime.op_state();
        crate::ext::starling_main::main_module::register(&mut op_state.borrow_mut(), sink)
    }

    /// Registers a host-provided incoming-request body stream and returns
    /// its resource id, for use with [`Self::dispatch_incoming_request`].
    /// `None` when the request has no body.
    pub fn register_incoming_body(
        &mut self,
        body: Box<dyn starling_core::host::io::InputStream>,
    ) -> ResourceId {
        let resource = crate::ext::starling_body::body::IncomingBodyResource::new(body);
        self.runtime.op_state().borrow_mut().resource_table.add(resource)
    }

    /// Calls into `main.js`'s per-request entry point (spec §4.5),
    /// triggering the global `fetch` event dispatch. Fire-and-forget: the
    /// handler writes its response straight through `sink_rid` as it
    /// resolves, so there is nothing useful to await here beyond driving
    /// [`Self::run_event_loop_with`] afterwards to let it run to
    /// completion.
    pub fn dispatch_incoming_request(
        &mut self,
        method: &str,
        url: &str,
        headers: &[(String, String)],
        body_rid: Option<ResourceId>,
        sink_rid: ResourceId,
    ) -> Result<()> {
        let args = serde_json::json!([method, url, headers, body_rid, sink_rid]);
        let code = format!(
            r#"globalThis[Symbol.for("starling.handleIncomingRequest")].apply(null, {args});"#,
        );
        self.execute(&code)
    }

    /// Drains one round of v8 microtasks without blocking; the `Driver`
    /// implementation `starling_core::EventLoop::run` expects.
    pub fn drain_microtasks(&mut self) -> starling_core::Result<()> {
        let waker = futures::task::noop_waker();
        let mut cx = std::task::Context::from_waker(&waker);
        let mut fut = Box::pin(self.runtime.run_event_loop(PollEventLoopOptions {
            wait_for_inspector: false,
            pump_v8_message_loop: true,
        }));
        match fut.as_mut().poll(&mut cx) {
            std::task::Poll::Ready(Ok(())) => Ok(()),
            std::task::Poll::Ready(Err(e)) => Err(starling_core::Error::Host(
                starling_core::error::HostError {
                    code: -1,
                    message: e.to_string(),
                },
            )),
            std::task::Poll::Pending => Ok(()),
        }
    }
}

impl starling_core::event_loop::Driver for StarlingRuntime {
    fn drain_microtasks(&mut self) -> starling_core::Result<()> {
        StarlingRuntime::drain_microtasks(self)
    }
}

impl Deref for StarlingRuntime {
    type Target = JsRuntime;

    fn deref(&self) -> &Self::Target {
        &self.runtime
    }
}

impl DerefMut for StarlingRuntime {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.runtime
    }
}

#[macro_export]
macro_rules! init_ops_and_esm_extensions {
    ($($ext:ident $(::<$($generics:ty),*> )? $(($($args:expr),*))?),*) => {
        vec![
            $($ext::$ext::init_ops_and_esm$(::<$($generics),*> )?($($($args),*)?)),*
        ]
    };
}

pub(crate) struct StarlingPermissions;

impl TimersPermission for StarlingPermissions {
    fn allow_hrtime(&mut self) -> bool {
        // High-resolution timers would leak the host clock's real
        // resolution to script; disabled, matching Workers-style runtimes.
        false
    }
}

fn init_extensions() -> Vec<Extension> {
    use crate::ext::{
        starling_abort, starling_blob, starling_body, starling_console, starling_event,
        starling_fetch, starling_formdata, starling_headers, starling_main,
        starling_request_response, starling_timers,
    };

    init_ops_and_esm_extensions!(
        deno_webidl,
        deno_console,
        starling_console,
        deno_url,
        deno_web::<StarlingPermissions>(Default::default(), None),
        starling_headers,
        starling_event,
        starling_abort,
        starling_timers,
        starling_blob,
        starling_formdata,
        starling_body,
        starling_request_response,
        starling_fetch,
        starling_main
    )
}
