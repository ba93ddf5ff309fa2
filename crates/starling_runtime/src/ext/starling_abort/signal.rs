//! AbortSignal dependent-signal graph (spec §4.6).
//!
//! WHATWG's algorithm describes a signal's dependents as "a weak set", so a
//! source signal can have many dependents (via `AbortSignal.any`) without
//! keeping them alive, but when the source aborts, every live dependent
//! must be found and settled too. A JS `WeakSet` cannot be iterated, which
//! is exactly why this graph is kept here: `Weak<SignalResource>` gives us
//! the non-owning edge *and* the ability to walk it. Each resource also
//! holds the JS callback (set once, at construction) used to mirror
//! aborted/reason state into the wrapper object and fire its "abort"
//! event; `abort()` invokes it directly rather than handing a list of rids
//! back to JS to re-resolve.

use std::borrow::Cow;
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use deno_core::{op2, v8, OpState, ResourceId};

pub struct SignalResource {
    aborted: Cell<bool>,
    reason: RefCell<Option<serde_json::Value>>,
    dependents: RefCell<Vec<Weak<SignalResource>>>,
    on_abort: RefCell<Option<v8::Global<v8::Function>>>,
}

impl SignalResource {
    fn new() -> Rc<Self> {
        Rc::new(Self {
            aborted: Cell::new(false),
            reason: RefCell::new(None),
            dependents: RefCell::new(Vec::new()),
            on_abort: RefCell::new(None),
        })
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted.get()
    }

    pub fn reason(&self) -> Option<serde_json::Value> {
        self.reason.borrow().clone()
    }

    fn settle(&self, reason: &serde_json::Value) -> bool {
        if self.aborted.get() {
            return false;
        }
        self.aborted.set(true);
        *self.reason.borrow_mut() = Some(reason.clone());
        true
    }

    /// Settles this signal and every live dependent transitively
    /// (breadth-first), invoking each newly-settled resource's JS callback
    /// in that order.
    fn abort(
        self: &Rc<Self>,
        scope: &mut v8::HandleScope,
        reason: serde_json::Value,
    ) {
        if !self.settle(&reason) {
            return;
        }
        let mut newly_aborted = vec![self.clone()];
        let mut frontier: Vec<Rc<Self>> = vec![self.clone()];
        while let Some(node) = frontier.pop() {
            let deps = node.dependents.borrow().clone();
            for weak in deps.iter() {
                if let Some(dep) = weak.upgrade() {
                    if dep.settle(&reason) {
                        newly_aborted.push(dep.clone());
                        frontier.push(dep);
                    }
                }
            }
        }

        for node in newly_aborted {
            let callback = node.on_abort.borrow().clone();
            if let Some(callback) = callback {
                let local = v8::Local::new(scope, callback);
                let undefined = v8::undefined(scope);
                local.call(scope, undefined.into(), &[]);
            }
        }
    }

    fn add_dependent(self: &Rc<Self>, dependent: &Rc<Self>) {
        if self.aborted.get() {
            return;
        }
        self.dependents.borrow_mut().push(Rc::downgrade(dependent));
    }
}

impl deno_core::Resource for SignalResource {
    fn name(&self) -> Cow<str> {
        "AbortSignal".into()
    }
}

fn get(
    op_state: &mut OpState,
    rid: ResourceId,
) -> Result<Rc<SignalResource>, deno_core::error::ResourceError> {
    op_state.resource_table.get::<SignalResource>(rid)
}

#[op2(fast)]
#[smi]
pub fn op_signal_new(op_state: &mut OpState) -> ResourceId {
    op_state.resource_table.add_rc(SignalResource::new())
}

#[op2]
pub fn op_signal_set_onabort(
    op_state: &mut OpState,
    #[smi] rid: ResourceId,
    #[global] callback: v8::Global<v8::Function>,
) {
    if let Ok(signal) = get(op_state, rid) {
        *signal.on_abort.borrow_mut() = Some(callback);
    }
}

#[op2(fast)]
pub fn op_signal_aborted(op_state: &mut OpState, #[smi] rid: ResourceId) -> bool {
    get(op_state, rid).map(|s| s.is_aborted()).unwrap_or(true)
}

#[op2]
#[serde]
pub fn op_signal_reason(
    op_state: &mut OpState,
    #[smi] rid: ResourceId,
) -> Option<serde_json::Value> {
    get(op_state, rid).ok().and_then(|s| s.reason())
}

/// Links `dependent` as a (weak) dependent of `source`: when `source`
/// aborts, `dependent` aborts with the same reason. Used both by
/// `AbortSignal.any` (several sources, one fresh composite signal) and by
/// timeout signals that also honor an explicit parent signal.
#[op2]
pub fn op_signal_add_dependent(
    scope: &mut v8::HandleScope,
    op_state: &mut OpState,
    #[smi] source: ResourceId,
    #[smi] dependent: ResourceId,
) {
    let source = match get(op_state, source) {
        Ok(s) => s,
        Err(_) => return,
    };
    let dependent = match get(op_state, dependent) {
        Ok(d) => d,
        Err(_) => return,
    };
    if source.is_aborted() {
        let reason = source.reason().unwrap_or(serde_json::Value::Null);
        dependent.abort(scope, reason);
        return;
    }
    source.add_dependent(&dependent);
}

#[op2]
pub fn op_signal_abort(
    scope: &mut v8::HandleScope,
    op_state: &mut OpState,
    #[smi] rid: ResourceId,
    #[serde] reason: Option<serde_json::Value>,
) {
    let signal = match get(op_state, rid) {
        Ok(s) => s,
        Err(_) => return,
    };
    let reason = reason.unwrap_or(serde_json::Value::String("AbortError".to_string()));
    signal.abort(scope, reason);
}
