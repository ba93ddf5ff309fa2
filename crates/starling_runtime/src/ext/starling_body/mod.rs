pub mod body;

use deno_core::extension;

extension!(
    starling_body,
    ops = [
        body::op_body_lock,
        body::op_body_release,
        body::op_body_read,
        body::op_body_drain,
        body::op_body_capacity,
        body::op_body_write,
        body::op_body_close,
        body::op_body_append,
    ],
    esm = [dir "src/ext/starling_body", "body.js"],
);

#[cfg(test)]
mod test {
    use std::cell::RefCell;

    use starling_core::error::HostError;
    use starling_core::host::io::{InputStream, ReadOutcome};
    use starling_core::resource::PollableHandle;

    use crate::init_test_setup;

    struct MemoryInput {
        chunks: RefCell<Vec<Vec<u8>>>,
    }

    impl InputStream for MemoryInput {
        fn read(&mut self, _max: usize) -> Result<ReadOutcome, HostError> {
            let mut chunks = self.chunks.borrow_mut();
            if chunks.is_empty() {
                Ok(ReadOutcome::Eof)
            } else {
                let bytes = chunks.remove(0);
                Ok(ReadOutcome::Data { bytes, done: false })
            }
        }
        fn subscribe(&mut self) -> PollableHandle {
            PollableHandle::Immediate
        }
        fn close(&mut self) {}
    }

    #[test]
    fn body_read_drains_chunks_then_reports_done() {
        init_test_setup!(runtime);
        let op_state = runtime.op_state();
        let rid = {
            let mut op_state = op_state.borrow_mut();
            let resource = super::body::IncomingBodyResource::new(Box::new(MemoryInput {
                chunks: RefCell::new(vec![b"he".to_vec(), b"llo".to_vec()]),
            }));
            op_state.resource_table.add(resource)
        };

        runtime
            .execute(&format!(
                r#"
                globalThis.__chunks = [];
                globalThis.__done = false;
                (async () => {{
                  for (;;) {{
                    const r = await Deno.core.ops.op_body_read({rid});
                    if (r.data != null) globalThis.__chunks.push(Array.from(r.data));
                    if (r.done) {{ globalThis.__done = true; break; }}
                  }}
                }})();
                "#
            ))
            .unwrap();
        runtime.run_event_loop_for_test().unwrap();

        let done = runtime.execute_with_result::<bool>("globalThis.__done").unwrap();
        assert!(done);
        let chunks = runtime
            .execute_with_result::<Vec<Vec<u8>>>("globalThis.__chunks")
            .unwrap();
        assert_eq!(chunks, vec![vec![104, 101], vec![108, 108, 111]]);
    }
}
