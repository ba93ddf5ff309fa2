use deno_core::extension;

// Event/EventTarget dispatch (spec §4.5, §4.6) needs no host capability and
// no native state beyond what plain JS objects already give us, so unlike
// Headers/AbortSignal this extension carries no ops; it exists purely to
// register the ESM glue in the dependency graph other extensions `deps` on.
extension!(
    starling_event,
    esm_entry_point = "ext:starling_event/event.js",
    esm = [dir "src/ext/starling_event", "event.js"],
);

#[cfg(test)]
mod test {
    use crate::init_test_setup;

    #[test]
    fn dispatch_calls_listeners_in_order() {
        init_test_setup!(runtime);
        let result = runtime
            .execute_with_result::<Vec<i32>>(
                r#"
                const target = new EventTarget();
                const seen = [];
                target.addEventListener("x", () => seen.push(1));
                target.addEventListener("x", () => seen.push(2));
                target.dispatchEvent(new Event("x"));
                seen
                "#,
            )
            .unwrap();
        assert_eq!(result, vec![1, 2]);
    }

    #[test]
    fn stop_immediate_propagation_halts_remaining_listeners() {
        init_test_setup!(runtime);
        let result = runtime
            .execute_with_result::<Vec<i32>>(
                r#"
                const target = new EventTarget();
                const seen = [];
                target.addEventListener("x", (e) => { seen.push(1); e.stopImmediatePropagation(); });
                target.addEventListener("x", () => seen.push(2));
                target.dispatchEvent(new Event("x"));
                seen
                "#,
            )
            .unwrap();
        assert_eq!(result, vec![1]);
    }

    #[test]
    fn once_listener_runs_a_single_time() {
        init_test_setup!(runtime);
        let result = runtime
            .execute_with_result::<i32>(
                r#"
                const target = new EventTarget();
                let count = 0;
                target.addEventListener("x", () => count++, { once: true });
                target.dispatchEvent(new Event("x"));
                target.dispatchEvent(new Event("x"));
                count
                "#,
            )
            .unwrap();
        assert_eq!(result, 1);
    }
}
