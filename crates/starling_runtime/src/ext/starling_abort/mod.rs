pub mod signal;

use deno_core::extension;

extension!(
    starling_abort,
    deps = [starling_event, starling_timers],
    ops = [
        signal::op_signal_new,
        signal::op_signal_set_onabort,
        signal::op_signal_aborted,
        signal::op_signal_reason,
        signal::op_signal_add_dependent,
        signal::op_signal_abort,
    ],
    esm_entry_point = "ext:starling_abort/abort.js",
    esm = [dir "src/ext/starling_abort", "abort.js"],
);

#[cfg(test)]
mod test {
    use crate::init_test_setup;

    #[test]
    fn controller_abort_fires_signal_listener() {
        init_test_setup!(runtime, with_host);
        let result = runtime
            .execute_with_result::<bool>(
                r#"
                const ctrl = new AbortController();
                let fired = false;
                ctrl.signal.addEventListener("abort", () => fired = true);
                ctrl.abort("nope");
                fired && ctrl.signal.aborted && ctrl.signal.reason === "nope"
                "#,
            )
            .unwrap();
        assert!(result);
    }

    #[test]
    fn abort_any_settles_when_one_source_aborts() {
        init_test_setup!(runtime, with_host);
        let result = runtime
            .execute_with_result::<bool>(
                r#"
                const a = new AbortController();
                const b = new AbortController();
                const combined = AbortSignal.any([a.signal, b.signal]);
                a.abort("a-reason");
                combined.aborted && combined.reason === "a-reason"
                "#,
            )
            .unwrap();
        assert!(result);
    }

    #[test]
    fn signal_timeout_is_already_abortable() {
        init_test_setup!(runtime, with_host);
        let result = runtime
            .execute_with_result::<bool>(
                r#"
                const s = AbortSignal.timeout(0);
                s instanceof AbortSignal
                "#,
            )
            .unwrap();
        assert!(result);
    }

    #[test]
    fn aborting_twice_keeps_first_reason() {
        init_test_setup!(runtime, with_host);
        let result = runtime
            .execute_with_result::<String>(
                r#"
                const ctrl = new AbortController();
                ctrl.abort("first");
                ctrl.abort("second");
                ctrl.signal.reason
                "#,
            )
            .unwrap();
        assert_eq!(result, "first");
    }

    #[test]
    fn default_abort_reason_is_a_named_error() {
        init_test_setup!(runtime, with_host);
        let result = runtime
            .execute_with_result::<bool>(
                r#"
                const ctrl = new AbortController();
                ctrl.abort();
                const reason = ctrl.signal.reason;
                reason instanceof Error && reason.name === "AbortError"
                "#,
            )
            .unwrap();
        assert!(result);
    }

    #[test]
    fn two_controllers_combined_keep_the_first_abort_reason() {
        init_test_setup!(runtime, with_host);
        let result = runtime
            .execute_with_result::<(i32, String)>(
                r#"
                const a = new AbortController();
                const b = new AbortController();
                const combined = AbortSignal.any([a.signal, b.signal]);
                let fired = 0;
                combined.addEventListener("abort", () => fired++);
                b.abort("x");
                b.abort("y");
                a.abort("z");
                [fired, combined.reason]
                "#,
            )
            .unwrap();
        assert_eq!(result, (1, "x".to_string()));
    }
}
