//! `setTimeout`/`setInterval` (spec §4.7), backed by [`crate::tasks::TimerTask`]
//! and the `starling_core::EventLoop` stashed in `OpState`.
//!
//! Each call to `setTimeout`/`setInterval` queues one `TimerTask` and gets
//! back an id. The JS wrapper (`timers.js`) awaits `op_timer_await` in a
//! loop (once for a timeout, repeatedly for an interval) to learn when the
//! task fires, and calls `op_timer_release` exactly once, when it is done
//! with the id, to free the task and the event loop's interest in it.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use deno_core::{op2, OpState};
use starling_core::host::HostCapabilities;
use starling_core::{EventLoop, TaskId};

use crate::tasks::{self, TaskFuture};

struct TimerHandle {
    task_id: TaskId,
    cell: tasks::Shared<()>,
    cleared: Rc<Cell<bool>>,
}

#[derive(Default)]
pub struct TimerRegistry {
    next_id: u32,
    handles: HashMap<u32, TimerHandle>,
}

fn with_registry<R>(op_state: &mut OpState, f: impl FnOnce(&mut TimerRegistry) -> R) -> R {
    if !op_state.has::<Rc<RefCell<TimerRegistry>>>() {
        op_state.put(Rc::new(RefCell::new(TimerRegistry::default())));
    }
    let registry = op_state.borrow::<Rc<RefCell<TimerRegistry>>>().clone();
    let mut registry = registry.borrow_mut();
    f(&mut registry)
}

#[op2(fast)]
#[smi]
pub fn op_timer_queue(op_state: &mut OpState, delay_ms: f64, repeat: bool) -> u32 {
    let clock = op_state.borrow::<HostCapabilities>().clock.clone();
    let delay_ns = (delay_ms.max(0.0) * 1_000_000.0) as u64;
    let cell = tasks::shared::<()>();
    let task = tasks::TimerTask::new(clock, delay_ns, repeat, cell.clone());

    let task_id = {
        let event_loop = op_state.borrow_mut::<EventLoop>();
        let task_id = event_loop.queue(Box::new(task));
        let _held = event_loop.incr_interest();
        task_id
    };

    with_registry(op_state, |registry| {
        registry.next_id += 1;
        let id = registry.next_id;
        registry.handles.insert(
            id,
            TimerHandle {
                task_id,
                cell,
                cleared: Rc::new(Cell::new(false)),
            },
        );
        id
    })
}

#[op2(async)]
pub async fn op_timer_await(op_state: Rc<RefCell<OpState>>, #[smi] id: u32) -> bool {
    let (cell, cleared) = {
        let mut op_state = op_state.borrow_mut();
        match with_registry(&mut op_state, |registry| {
            registry
                .handles
                .get(&id)
                .map(|h| (h.cell.clone(), h.cleared.clone()))
        }) {
            Some(pair) => pair,
            None => return false,
        }
    };
    TaskFuture(cell).await;
    !cleared.get()
}

#[op2(fast)]
pub fn op_timer_release(op_state: &mut OpState, #[smi] id: u32) {
    let handle = with_registry(op_state, |registry| registry.handles.remove(&id));
    if let Some(handle) = handle {
        handle.cleared.set(true);
        handle.cell.borrow_mut().complete(());
        let event_loop = op_state.borrow_mut::<EventLoop>();
        event_loop.cancel(handle.task_id);
        let _ = event_loop.decr_interest();
    }
}
