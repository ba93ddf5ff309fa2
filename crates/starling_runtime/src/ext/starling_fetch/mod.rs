pub mod fetch;

use deno_core::extension;

extension!(
    starling_fetch,
    deps = [starling_headers, starling_body, starling_blob, starling_request_response, starling_abort],
    ops = [
        fetch::op_fetch_start,
        fetch::op_fetch_poll,
        fetch::op_fetch_cancel,
        fetch::op_fetch_blob,
    ],
    esm_entry_point = "ext:starling_fetch/fetch.js",
    esm = [dir "src/ext/starling_fetch", "fetch.js"],
);

#[cfg(test)]
mod test {
    use std::cell::RefCell;
    use std::rc::Rc;

    use starling_core::error::HostError;
    use starling_core::host::http::{
        HttpOutgoing, IncomingResponseParts, OutgoingRequest, OutgoingRequestParts, RawHeader,
        ResponseFuture,
    };
    use starling_core::host::io::{InputStream, OutputStream, ReadOutcome};
    use starling_core::host::HostCapabilities;
    use starling_core::resource::PollableHandle;

    use crate::init_test_setup;
    use crate::runtime::StarlingRuntimeOptions;
    use crate::test_support::{FakeClock, FakeRandom};

    struct EchoBody {
        bytes: Vec<u8>,
        sent: bool,
    }

    impl InputStream for EchoBody {
        fn read(&mut self, _max: usize) -> Result<ReadOutcome, HostError> {
            if self.sent {
                Ok(ReadOutcome::Eof)
            } else {
                self.sent = true;
                Ok(ReadOutcome::Data {
                    bytes: std::mem::take(&mut self.bytes),
                    done: true,
                })
            }
        }
        fn subscribe(&mut self) -> PollableHandle {
            PollableHandle::Immediate
        }
        fn close(&mut self) {}
    }

    struct RecordingOutput {
        written: Rc<RefCell<Vec<u8>>>,
    }

    impl OutputStream for RecordingOutput {
        fn capacity(&mut self) -> Result<u64, HostError> {
            Ok(1 << 20)
        }
        fn write(&mut self, bytes: &[u8]) -> Result<(), HostError> {
            self.written.borrow_mut().extend_from_slice(bytes);
            Ok(())
        }
        fn blocking_flush(&mut self) -> Result<(), HostError> {
            Ok(())
        }
        fn subscribe(&mut self) -> PollableHandle {
            PollableHandle::Immediate
        }
        fn close(&mut self) {}
    }

    struct ImmediateFuture {
        result: Option<Result<IncomingResponseParts, HostError>>,
    }

    impl ResponseFuture for ImmediateFuture {
        fn subscribe(&mut self) -> PollableHandle {
            PollableHandle::Immediate
        }
        fn poll(&mut self) -> Option<Result<IncomingResponseParts, HostError>> {
            self.result.take()
        }
        fn cancel(&mut self) {}
    }

    struct FakeOutgoingRequest {
        sink: Option<RecordingOutput>,
        response_status: u16,
        response_body: Vec<u8>,
    }

    impl OutgoingRequest for FakeOutgoingRequest {
        fn body(&mut self) -> Option<&mut dyn OutputStream> {
            self.sink.as_mut().map(|s| s as &mut dyn OutputStream)
        }

        fn send(self: Box<Self>) -> Box<dyn ResponseFuture> {
            Box::new(ImmediateFuture {
                result: Some(Ok(IncomingResponseParts {
                    status: self.response_status,
                    headers: vec![("content-type".to_string(), b"text/plain".to_vec())],
                    body: Box::new(EchoBody {
                        bytes: self.response_body,
                        sent: false,
                    }),
                })),
            })
        }
    }

    struct FakeHttp {
        written: Rc<RefCell<Vec<u8>>>,
        status: u16,
        response_body: Vec<u8>,
    }

    impl HttpOutgoing for FakeHttp {
        fn new_request(
            &self,
            _parts: OutgoingRequestParts,
        ) -> Result<Box<dyn OutgoingRequest>, HostError> {
            Ok(Box::new(FakeOutgoingRequest {
                sink: Some(RecordingOutput {
                    written: self.written.clone(),
                }),
                response_status: self.status,
                response_body: self.response_body.clone(),
            }))
        }
    }

    fn host_with_fake_http(status: u16, response_body: &[u8]) -> (HostCapabilities, Rc<RefCell<Vec<u8>>>) {
        let written = Rc::new(RefCell::new(Vec::new()));
        let host = HostCapabilities {
            clock: FakeClock::new(),
            random: Rc::new(FakeRandom),
            http: Rc::new(FakeHttp {
                written: written.clone(),
                status,
                response_body: response_body.to_vec(),
            }),
        };
        (host, written)
    }

    #[test]
    fn http_fetch_resolves_with_status_and_body() {
        let (host, _written) = host_with_fake_http(200, b"hello");
        let mut runtime = crate::runtime::StarlingRuntime::new(StarlingRuntimeOptions {
            host: Some(host),
            ..Default::default()
        });
        runtime
            .execute(
                r#"
                globalThis.__status = null;
                globalThis.__text = null;
                fetch("http://example.com/x").then(async (r) => {
                  globalThis.__status = r.status;
                  globalThis.__text = await r.text();
                });
                "#,
            )
            .unwrap();
        runtime.run_event_loop_for_test().unwrap();
        let status = runtime.execute_with_result::<f64>("globalThis.__status").unwrap();
        let text = runtime.execute_with_result::<String>("globalThis.__text").unwrap();
        assert_eq!(status, 200.0);
        assert_eq!(text, "hello");
    }

    #[test]
    fn request_body_reaches_the_host_output_stream() {
        let (host, written) = host_with_fake_http(200, b"ok");
        let mut runtime = crate::runtime::StarlingRuntime::new(StarlingRuntimeOptions {
            host: Some(host),
            ..Default::default()
        });
        runtime
            .execute(r#"fetch("http://example.com/x", { method: "POST", body: "payload" });"#)
            .unwrap();
        runtime.run_event_loop_for_test().unwrap();
        assert_eq!(written.borrow().as_slice(), b"payload");
    }

    #[test]
    fn unsupported_scheme_rejects() {
        init_test_setup!(runtime, with_host);
        runtime
            .execute(
                r#"
                globalThis.__threw = false;
                fetch("ftp://example.com/x").catch(() => { globalThis.__threw = true; });
                "#,
            )
            .unwrap();
        runtime.run_event_loop_for_test().unwrap();
        let threw = runtime.execute_with_result::<bool>("globalThis.__threw").unwrap();
        assert!(threw);
    }

    struct NeverFuture;

    impl ResponseFuture for NeverFuture {
        fn subscribe(&mut self) -> PollableHandle {
            PollableHandle::Invalid
        }
        fn poll(&mut self) -> Option<Result<IncomingResponseParts, HostError>> {
            None
        }
        fn cancel(&mut self) {}
    }

    struct StallingOutgoingRequest;

    impl OutgoingRequest for StallingOutgoingRequest {
        fn body(&mut self) -> Option<&mut dyn OutputStream> {
            None
        }
        fn send(self: Box<Self>) -> Box<dyn ResponseFuture> {
            Box::new(NeverFuture)
        }
    }

    struct StallingHttp;

    impl HttpOutgoing for StallingHttp {
        fn new_request(
            &self,
            _parts: OutgoingRequestParts,
        ) -> Result<Box<dyn OutgoingRequest>, HostError> {
            Ok(Box::new(StallingOutgoingRequest))
        }
    }

    #[test]
    fn timeout_abort_rejects_fetch_with_a_timeout_error() {
        let host = HostCapabilities {
            clock: FakeClock::new(),
            random: Rc::new(FakeRandom),
            http: Rc::new(StallingHttp),
        };
        let mut runtime = crate::runtime::StarlingRuntime::new(StarlingRuntimeOptions {
            host: Some(host),
            ..Default::default()
        });
        runtime
            .execute(
                r#"
                globalThis.__name = null;
                globalThis.__isError = false;
                fetch("http://example.com/x", { signal: AbortSignal.timeout(0) }).catch((e) => {
                  globalThis.__name = e.name;
                  globalThis.__isError = e instanceof Error;
                });
                "#,
            )
            .unwrap();
        runtime.run_event_loop_for_test().unwrap();
        let name = runtime.execute_with_result::<String>("globalThis.__name").unwrap();
        let is_error = runtime.execute_with_result::<bool>("globalThis.__isError").unwrap();
        assert_eq!(name, "TimeoutError");
        assert!(is_error);
    }

    #[test]
    fn blob_fetch_rejects_non_get_method() {
        init_test_setup!(runtime, with_host);
        runtime
            .execute(
                r#"
                globalThis.__threw = false;
                const blob = new Blob(["0123456789"]);
                const url = URL.createObjectURL(blob);
                fetch(url, { method: "POST" }).catch(() => { globalThis.__threw = true; });
                "#,
            )
            .unwrap();
        runtime.run_event_loop_for_test().unwrap();
        let threw = runtime.execute_with_result::<bool>("globalThis.__threw").unwrap();
        assert!(threw);
    }

    #[test]
    fn blob_fetch_with_range_returns_206() {
        init_test_setup!(runtime, with_host);
        runtime
            .execute(
                r#"
                globalThis.__result = null;
                const blob = new Blob(["0123456789"]);
                const url = URL.createObjectURL(blob);
                fetch(url, { headers: { Range: "bytes=2-5" } }).then(async (r) => {
                  globalThis.__result = [r.status, r.headers.get("content-range"), await r.text()];
                });
                "#,
            )
            .unwrap();
        runtime.run_event_loop_for_test().unwrap();
        let (status, content_range, text) = runtime
            .execute_with_result::<(f64, String, String)>("globalThis.__result")
            .unwrap();
        assert_eq!(status, 206.0);
        assert_eq!(content_range, "bytes 2-5/10");
        assert_eq!(text, "2345");
    }
}
