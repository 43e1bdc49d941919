use std::cell::{Cell, RefCell};
use std::rc::Rc;

use trellis_observe::{Path, Snapshot, SnapshotOptions, Subscription, Value};

use crate::define::StateDef;
use crate::error::StateError;
use crate::hooks::inject_hooks;
use crate::runtime::Cx;
use crate::state::StateHandle;

/// Shared "still inside the synchronous render body" flag for one bridge.
///
/// True from bridge creation until the host's first post-commit
/// opportunity, false afterwards for as long as that bridge's views live.
/// The next render builds a new bridge with a fresh flag.
#[derive(Clone)]
pub struct RenderFlag(Rc<Cell<bool>>);

impl RenderFlag {
    fn new() -> Self {
        RenderFlag(Rc::new(Cell::new(true)))
    }

    pub fn is_rendering(&self) -> bool {
        self.0.get()
    }

    fn settle(&self) {
        self.0.set(false);
    }
}

/// A render-scoped view over one state instance.
///
/// While the owning render pass is still executing, reads resolve against
/// the pass's tracked snapshot and record the exact paths touched;
/// [`child`](StateView::child) descends into nested objects so tracking is
/// recursive through the graph. Once the pass commits, every read passes
/// through to the live instance, so a view captured by an event handler
/// always observes current data rather than a stale render-time copy.
///
/// Views never mutate. Mutation goes through the live instance, which
/// stays reachable from every view via [`live`](StateView::live), or
/// through bound methods, which always execute against the live instance.
/// Mutating the live instance while its pass is still rendering leaves
/// that pass reading a snapshot already stale against the live data; the
/// re-render the mutation schedules is what reconciles.
#[derive(Clone)]
pub struct StateView {
    live: StateHandle,
    snap: Rc<Snapshot>,
    at: Path,
    flag: RenderFlag,
}

impl StateView {
    pub fn live(&self) -> &StateHandle {
        &self.live
    }

    pub fn is_rendering(&self) -> bool {
        self.flag.is_rendering()
    }

    /// View of a nested object or list under `field`. Traversal itself
    /// records nothing; reads through the child view record full paths.
    pub fn child(&self, field: &str) -> StateView {
        StateView {
            live: self.live.clone(),
            snap: Rc::clone(&self.snap),
            at: self.at.join_key(field),
            flag: self.flag.clone(),
        }
    }

    pub fn at_index(&self, index: usize) -> StateView {
        StateView {
            live: self.live.clone(),
            snap: Rc::clone(&self.snap),
            at: self.at.join_index(index),
            flag: self.flag.clone(),
        }
    }

    pub fn try_get(&self, field: &str) -> Result<Value, StateError> {
        let path = self.at.join_key(field);
        let value = if self.flag.is_rendering() {
            self.snap.track(&path)
        } else {
            self.live.observable().get(&path)
        };
        value.ok_or_else(|| StateError::MissingField {
            def: self.live.definition().name().to_string(),
            field: format!("{path}"),
        })
    }

    pub fn get(&self, field: &str) -> Value {
        self.try_get(field).unwrap_or_else(|e| panic!("{e}"))
    }

    pub fn try_int(&self, field: &str) -> Result<i64, StateError> {
        self.try_get(field)?
            .as_int()
            .ok_or_else(|| self.mismatch(field, "an integer"))
    }

    pub fn int(&self, field: &str) -> i64 {
        self.try_int(field).unwrap_or_else(|e| panic!("{e}"))
    }

    pub fn try_float(&self, field: &str) -> Result<f64, StateError> {
        self.try_get(field)?
            .as_float()
            .ok_or_else(|| self.mismatch(field, "a number"))
    }

    pub fn float(&self, field: &str) -> f64 {
        self.try_float(field).unwrap_or_else(|e| panic!("{e}"))
    }

    pub fn try_bool(&self, field: &str) -> Result<bool, StateError> {
        self.try_get(field)?
            .as_bool()
            .ok_or_else(|| self.mismatch(field, "a boolean"))
    }

    pub fn bool_(&self, field: &str) -> bool {
        self.try_bool(field).unwrap_or_else(|e| panic!("{e}"))
    }

    pub fn try_str(&self, field: &str) -> Result<String, StateError> {
        match self.try_get(field)? {
            Value::Str(s) => Ok(s),
            _ => Err(self.mismatch(field, "a string")),
        }
    }

    pub fn str_(&self, field: &str) -> String {
        self.try_str(field).unwrap_or_else(|e| panic!("{e}"))
    }

    fn mismatch(&self, field: &str, expected: &'static str) -> StateError {
        StateError::TypeMismatch {
            def: self.live.definition().name().to_string(),
            field: field.to_string(),
            expected,
        }
    }

    /// Length of the container this view points at. A tracked read: the
    /// container's shape becomes a dependency while rendering.
    pub fn len(&self) -> Option<usize> {
        if self.flag.is_rendering() {
            self.snap.track_len(&self.at)
        } else {
            self.live.observable().len(&self.at)
        }
    }

    /// Entries of the map this view points at, declaration order. A
    /// tracked read while rendering.
    pub fn entries(&self) -> Vec<(String, Value)> {
        if self.flag.is_rendering() {
            self.snap.track_entries(&self.at).unwrap_or_default()
        } else {
            self.live
                .observable()
                .get(&self.at)
                .and_then(|v| {
                    v.as_map()
                        .map(|m| m.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
                })
                .unwrap_or_default()
        }
    }

    // Methods and hooks always go to the live instance.

    pub fn call(&self, name: &str, args: &[Value]) -> Value {
        self.live.call(name, args)
    }

    pub fn try_call(&self, name: &str, args: &[Value]) -> Result<Value, StateError> {
        self.live.try_call(name, args)
    }

    pub fn binding(&self, name: &str) -> Rc<dyn Fn()> {
        self.live.binding(name)
    }

    pub fn hook_result(&self, name: &str) -> Value {
        self.live.hook_result(name)
    }

    pub fn try_hook_result(&self, name: &str) -> Result<Value, StateError> {
        self.live.try_hook_result(name)
    }
}

impl std::fmt::Debug for StateView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateView")
            .field("def", &self.live.definition().name())
            .field("at", &format!("{}", self.at))
            .field("rendering", &self.flag.is_rendering())
            .finish()
    }
}

/// Component-local state: constructed on first render (or when the slot
/// holds an instance of a different definition), remembered afterwards.
/// Hooks are injected, then a tracked view for this pass is returned.
pub fn use_local_state(cx: &mut Cx<'_>, def: &StateDef, opts: SnapshotOptions) -> StateView {
    use_local_state_with(cx, def, |_| {}, opts)
}

/// Like [`use_local_state`], with an initializer that overrides fields on
/// the fresh instance's data before it becomes observable.
pub fn use_local_state_with(
    cx: &mut Cx<'_>,
    def: &StateDef,
    set_initial: impl FnOnce(&mut Value),
    opts: SnapshotOptions,
) -> StateView {
    let slot: Rc<RefCell<Option<StateHandle>>> = cx.remember(|| RefCell::new(None));
    let state = {
        let mut slot = slot.borrow_mut();
        match &mut *slot {
            Some(existing) if existing.definition().ptr_eq(def) => existing.clone(),
            stale => {
                let state = def.create_with(set_initial);
                *stale = Some(state.clone());
                state
            }
        }
    };
    inject_hooks(cx, &state);
    bridge(cx, &state, opts)
}

/// Shared state resolved through the enclosing provider chain, falling
/// back to the runtime's root store (constructing the global instance on a
/// total miss).
pub fn use_provided_state(cx: &mut Cx<'_>, def: &StateDef, opts: SnapshotOptions) -> StateView {
    let state = cx.store().get_state(def);
    inject_hooks(cx, &state);
    bridge(cx, &state, opts)
}

/// Track an instance someone else owns (typically received from a parent).
/// Hook injection is the owner's business and is not repeated here.
pub fn use_passed_state(cx: &mut Cx<'_>, state: &StateHandle, opts: SnapshotOptions) -> StateView {
    bridge(cx, state, opts)
}

/// Wire one (component, instance) pair up for this render pass: fresh
/// tracked snapshot, a subscription kept across renders with its read set
/// swapped per pass, and a render flag flipped at the first post-commit
/// opportunity.
fn bridge(cx: &mut Cx<'_>, state: &StateHandle, opts: SnapshotOptions) -> StateView {
    let obs = state.observable().clone();
    let snap = Rc::new(obs.snapshot());
    let mode = opts.mode();

    let sub_slot: Rc<RefCell<Option<Subscription>>> = cx.remember(|| RefCell::new(None));
    {
        let mut slot = sub_slot.borrow_mut();
        match &*slot {
            Some(sub) if sub.is_for(&obs) && sub.mode() == mode => sub.rebind(snap.reads()),
            _ => *slot = Some(obs.subscribe(mode, snap.reads(), cx.invalidate())),
        }
    }
    cx.runtime().track(&obs);

    let flag = RenderFlag::new();
    let settled = flag.clone();
    cx.on_commit(move || settled.settle());

    StateView {
        live: state.clone(),
        snap,
        at: Path::root(),
        flag,
    }
}
