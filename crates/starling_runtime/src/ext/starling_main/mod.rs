pub mod main_module;

use deno_core::extension;

extension!(
    starling_main,
    deps = [starling_event, starling_request_response, starling_headers, starling_body],
    ops = [
        main_module::op_response_sink_start,
        main_module::op_main_report_error,
    ],
    esm_entry_point = "ext:starling_main/main.js",
    esm = [dir "src/ext/starling_main", "main.js"],
);

#[cfg(test)]
mod test {
    use std::cell::RefCell;
    use std::rc::Rc;

    use deno_core::ResourceId;

    use starling_core::error::HostError;
    use starling_core::host::io::{InputStream, ReadOutcome};
    use starling_core::resource::PollableHandle;

    use crate::ext::starling_main::main_module::test_support::FakeResponseSink;
    use crate::init_test_setup;

    type Sink = (ResourceId, Rc<RefCell<u16>>, Rc<RefCell<Vec<(String, Vec<u8>)>>>, Rc<RefCell<Vec<u8>>>);

    fn register_sink_with_headers(runtime: &mut crate::runtime::StarlingRuntime) -> Sink {
        let status = Rc::new(RefCell::new(0u16));
        let headers = Rc::new(RefCell::new(Vec::new()));
        let written = Rc::new(RefCell::new(Vec::new()));
        let sink = FakeResponseSink {
            status: status.clone(),
            headers: headers.clone(),
            written: written.clone(),
        };
        let op_state = runtime.op_state();
        let rid = super::main_module::register(&mut op_state.borrow_mut(), Box::new(sink));
        (rid, status, headers, written)
    }

    fn register_sink(runtime: &mut crate::runtime::StarlingRuntime) -> (ResourceId, Rc<RefCell<u16>>, Rc<RefCell<Vec<u8>>>) {
        let (rid, status, _headers, written) = register_sink_with_headers(runtime);
        (rid, status, written)
    }

    struct OneShotBody {
        bytes: Option<Vec<u8>>,
    }

    impl InputStream for OneShotBody {
        fn read(&mut self, _max: usize) -> Result<ReadOutcome, HostError> {
            match self.bytes.take() {
                Some(bytes) => Ok(ReadOutcome::Data { bytes, done: true }),
                None => Ok(ReadOutcome::Eof),
            }
        }
        fn subscribe(&mut self) -> PollableHandle {
            PollableHandle::Immediate
        }
        fn close(&mut self) {}
    }

    #[test]
    fn echo_server_streams_request_body_back_with_request_headers() {
        init_test_setup!(runtime, with_host);
        let (sink_rid, status, headers, written) = register_sink_with_headers(&mut runtime);
        let body_rid = runtime.register_incoming_body(Box::new(OneShotBody {
            bytes: Some(vec![0x68, 0x69]),
        }));
        runtime
            .execute(
                r#"
                self.addEventListener("fetch", (event) => {
                  event.respondWith(
                    new Response(event.request.body, { headers: event.request.headers }),
                  );
                });
                "#,
            )
            .unwrap();
        runtime
            .execute(&format!(
                r#"globalThis[Symbol.for("starling.handleIncomingRequest")](
                    "POST", "http://example.com/x",
                    [["content-type", "text/plain"]], {body_rid}, {sink_rid}
                );"#
            ))
            .unwrap();
        runtime.run_event_loop_for_test().unwrap();
        assert_eq!(*status.borrow(), 200);
        assert_eq!(written.borrow().as_slice(), &[0x68, 0x69]);
        assert!(headers
            .borrow()
            .iter()
            .any(|(name, value)| name == "content-type" && value == b"text/plain"));
    }

    #[test]
    fn handler_respond_with_buffered_body_is_written_to_the_sink() {
        init_test_setup!(runtime, with_host);
        let (sink_rid, status, written) = register_sink(&mut runtime);
        runtime
            .execute(
                r#"
                self.addEventListener("fetch", (event) => {
                  event.respondWith(new Response("hello", { status: 201 }));
                });
                "#,
            )
            .unwrap();
        runtime
            .execute(&format!(
                r#"globalThis[Symbol.for("starling.handleIncomingRequest")](
                    "GET", "http://example.com/x", [], null, {sink_rid}
                );"#
            ))
            .unwrap();
        runtime.run_event_loop_for_test().unwrap();
        assert_eq!(*status.borrow(), 201);
        assert_eq!(written.borrow().as_slice(), b"hello");
    }

    #[test]
    fn no_handler_registered_sends_a_500() {
        init_test_setup!(runtime, with_host);
        let (sink_rid, status, written) = register_sink(&mut runtime);
        runtime
            .execute(&format!(
                r#"globalThis[Symbol.for("starling.handleIncomingRequest")](
                    "GET", "http://example.com/x", [], null, {sink_rid}
                );"#
            ))
            .unwrap();
        runtime.run_event_loop_for_test().unwrap();
        assert_eq!(*status.borrow(), 500);
        assert_eq!(written.borrow().as_slice(), b"no handler registered");
    }

    #[test]
    fn respond_with_rejection_sends_a_500_with_the_reason() {
        init_test_setup!(runtime, with_host);
        let (sink_rid, status, written) = register_sink(&mut runtime);
        runtime
            .execute(
                r#"
                self.addEventListener("fetch", (event) => {
                  event.respondWith(Promise.reject(new Error("boom")));
                });
                "#,
            )
            .unwrap();
        runtime
            .execute(&format!(
                r#"globalThis[Symbol.for("starling.handleIncomingRequest")](
                    "GET", "http://example.com/x", [], null, {sink_rid}
                );"#
            ))
            .unwrap();
        runtime.run_event_loop_for_test().unwrap();
        assert_eq!(*status.borrow(), 500);
        assert_eq!(written.borrow().as_slice(), b"respondWith error: boom");
    }

    #[test]
    fn respond_with_outside_dispatch_throws_invalid_state() {
        init_test_setup!(runtime, with_host);
        runtime
            .execute(
                r#"
                globalThis.__stash = null;
                self.addEventListener("fetch", (event) => {
                  globalThis.__stash = event;
                });
                "#,
            )
            .unwrap();
        let (sink_rid, ..) = register_sink(&mut runtime);
        runtime
            .execute(&format!(
                r#"globalThis[Symbol.for("starling.handleIncomingRequest")](
                    "GET", "http://example.com/x", [], null, {sink_rid}
                );"#
            ))
            .unwrap();
        runtime.run_event_loop_for_test().unwrap();
        let threw = runtime
            .execute_with_result::<bool>(
                r#"
                (() => {
                  try {
                    globalThis.__stash.respondWith(new Response());
                    return false;
                  } catch (e) {
                    return e instanceof Error && e.name === "InvalidStateError";
                  }
                })()
                "#,
            )
            .unwrap();
        assert!(threw);
    }

    #[test]
    fn wait_until_extends_the_event_loop_before_responding() {
        init_test_setup!(runtime, with_host);
        let (sink_rid, status, written) = register_sink(&mut runtime);
        runtime
            .execute(
                r#"
                globalThis.__waited = false;
                self.addEventListener("fetch", (event) => {
                  event.waitUntil(Promise.resolve().then(() => { globalThis.__waited = true; }));
                  event.respondWith(new Response("ok"));
                });
                "#,
            )
            .unwrap();
        runtime
            .execute(&format!(
                r#"globalThis[Symbol.for("starling.handleIncomingRequest")](
                    "GET", "http://example.com/x", [], null, {sink_rid}
                );"#
            ))
            .unwrap();
        runtime.run_event_loop_for_test().unwrap();
        let waited = runtime.execute_with_result::<bool>("globalThis.__waited").unwrap();
        assert!(waited);
        assert_eq!(*status.borrow(), 200);
        assert_eq!(written.borrow().as_slice(), b"ok");
    }
}
