pub mod timers;

use deno_core::extension;

extension!(
    starling_timers,
    ops = [
        timers::op_timer_queue,
        timers::op_timer_await,
        timers::op_timer_release,
    ],
    esm_entry_point = "ext:starling_timers/timers.js",
    esm = [dir "src/ext/starling_timers", "timers.js"],
);
