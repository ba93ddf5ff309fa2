use deno_core::{extension, op2};

// Level mirrors `deno_console`'s own numbering (debug, log/info, warn, error).
#[op2(fast)]
pub fn op_console_log(#[string] msg: &str, level: i32) {
    match level {
        0 => log::debug!(target: "starling::console", "{msg}"),
        1 => log::info!(target: "starling::console", "{msg}"),
        2 => log::warn!(target: "starling::console", "{msg}"),
        _ => log::error!(target: "starling::console", "{msg}"),
    }
}

extension!(
    starling_console,
    deps = [deno_console],
    ops = [op_console_log],
    esm_entry_point = "ext:starling_console/console.js",
    esm = [dir "src/ext/starling_console", "console.js"],
);

#[cfg(test)]
mod test {
    use crate::init_test_setup;

    #[test]
    fn console_log_does_not_throw() {
        init_test_setup!(runtime);
        runtime
            .execute(r#"console.log("hello", 1, { a: 1 })"#)
            .unwrap();
    }

    #[test]
    fn console_levels_do_not_throw() {
        init_test_setup!(runtime);
        runtime
            .execute(
                r#"
                console.debug("d");
                console.info("i");
                console.warn("w");
                console.error("e");
                "#,
            )
            .unwrap();
    }
}
