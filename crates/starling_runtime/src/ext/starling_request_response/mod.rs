pub mod request_response;

use deno_core::extension;

extension!(
    starling_request_response,
    deps = [starling_headers, starling_body, starling_blob, starling_formdata],
    ops = [
        request_response::op_status_message,
        request_response::op_body_buffer_new,
        request_response::op_body_buffer_bytes,
        request_response::op_body_buffer_clone,
    ],
    esm_entry_point = "ext:starling_request_response/request_response.js",
    esm = [dir "src/ext/starling_request_response", "request_response.js"],
);

#[cfg(test)]
mod test {
    use starling_core::error::HostError;
    use starling_core::host::io::{InputStream, ReadOutcome};
    use starling_core::resource::PollableHandle;

    use crate::init_test_setup;

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
    fn response_defaults_status_200_ok() {
        init_test_setup!(runtime, with_host);
        let (status, status_text) = runtime
            .execute_with_result::<(f64, String)>(
                r#"
                const r = new Response("hi");
                [r.status, r.statusText]
                "#,
            )
            .unwrap();
        assert_eq!(status, 200.0);
        assert_eq!(status_text, "OK");
    }

    #[test]
    fn null_body_status_with_body_throws() {
        init_test_setup!(runtime, with_host);
        let result = runtime.execute(r#"new Response("x", { status: 204 })"#);
        assert!(result.is_err());
    }

    #[test]
    fn null_body_status_without_body_is_fine() {
        init_test_setup!(runtime, with_host);
        let ok = runtime
            .execute_with_result::<bool>(
                r#"
                const r = new Response(null, { status: 204 });
                r.status === 204
                "#,
            )
            .unwrap();
        assert!(ok);
    }

    #[test]
    fn status_out_of_range_throws_range_error() {
        init_test_setup!(runtime, with_host);
        let result = runtime.execute(r#"new Response("x", { status: 999 })"#);
        assert!(result.is_err());
    }

    #[test]
    fn response_redirect_sets_location_header() {
        init_test_setup!(runtime, with_host);
        let (status, location) = runtime
            .execute_with_result::<(f64, String)>(
                r#"
                const r = Response.redirect("https://example.com/other", 303);
                [r.status, r.headers.get("location")]
                "#,
            )
            .unwrap();
        assert_eq!(status, 303.0);
        assert_eq!(location, "https://example.com/other");
    }

    #[test]
    fn request_method_is_normalized() {
        init_test_setup!(runtime, with_host);
        let method = runtime
            .execute_with_result::<String>(
                r#"new Request("https://example.com", { method: "get" }).method"#,
            )
            .unwrap();
        assert_eq!(method, "GET");
    }

    #[test]
    fn request_body_reads_back_as_text() {
        init_test_setup!(runtime, with_host);
        runtime
            .execute(
                r#"
                globalThis.__text = null;
                const req = new Request("https://example.com", { method: "POST", body: "hello" });
                req.text().then(t => { globalThis.__text = t; });
                "#,
            )
            .unwrap();
        runtime.run_event_loop_for_test().unwrap();
        let text = runtime.execute_with_result::<String>("globalThis.__text").unwrap();
        assert_eq!(text, "hello");
    }

    #[test]
    fn cloned_response_body_reads_independently() {
        init_test_setup!(runtime, with_host);
        runtime
            .execute(
                r#"
                globalThis.__a = null;
                globalThis.__b = null;
                const r = new Response("hello");
                const clone = r.clone();
                r.text().then(t => { globalThis.__a = t; });
                clone.text().then(t => { globalThis.__b = t; });
                "#,
            )
            .unwrap();
        runtime.run_event_loop_for_test().unwrap();
        let a = runtime.execute_with_result::<String>("globalThis.__a").unwrap();
        let b = runtime.execute_with_result::<String>("globalThis.__b").unwrap();
        assert_eq!(a, "hello");
        assert_eq!(b, "hello");
    }

    #[test]
    fn response_over_an_incoming_body_stream_takes_the_direct_append_path() {
        init_test_setup!(runtime, with_host);
        let body_rid = runtime.register_incoming_body(Box::new(OneShotBody {
            bytes: Some(b"hi".to_vec()),
        }));
        // `requestFromIncoming` mirrors how `starling_main` builds a real
        // incoming Request; wrapping its `.body` back into a Response is
        // exactly spec §8 S1's "echo server" shape.
        let kind = runtime
            .execute_with_result::<String>(&format!(
                r#"
                const req = Request[Symbol.for("starling.requestFromIncoming")](
                    "POST", "http://example.com/x", new Headers(), {body_rid}
                );
                const res = new Response(req.body);
                res._bodyKind
                "#
            ))
            .unwrap();
        assert_eq!(kind, "stream");
    }

    #[test]
    fn used_body_cannot_be_read_twice() {
        init_test_setup!(runtime, with_host);
        runtime
            .execute(
                r#"
                globalThis.__threw = false;
                const r = new Response("hello");
                r.text().then(() => r.text()).catch(() => { globalThis.__threw = true; });
                "#,
            )
            .unwrap();
        runtime.run_event_loop_for_test().unwrap();
        let threw = runtime.execute_with_result::<bool>("globalThis.__threw").unwrap();
        assert!(threw);
    }
}
