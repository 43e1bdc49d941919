use std::any::Any;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use trellis_observe::{Observable, WeakObservable};

use crate::define::StateDef;
use crate::scope::Scope;
use crate::state::StateHandle;
use crate::store::ScopeStore;

/// Per-component slot storage. Values remembered during one render pass
/// are found again, in order, on the next pass of the same component.
pub struct Composer {
    slots: Vec<Box<dyn Any>>,
    cursor: usize,
    keyed: HashMap<String, Box<dyn Any>>,
}

impl Composer {
    pub fn new() -> Self {
        Composer {
            slots: Vec::new(),
            cursor: 0,
            keyed: HashMap::new(),
        }
    }

    fn begin(&mut self) {
        self.cursor = 0;
    }
}

impl Default for Composer {
    fn default() -> Self {
        Self::new()
    }
}

struct RuntimeInner {
    root: ScopeStore,
    tracked: RefCell<Vec<(usize, WeakObservable)>>,
}

/// The explicitly constructed process root: owns the root scope store and
/// the flush list of observed instances.
///
/// An application makes one and hands it to its host driver; tests make
/// their own to get an isolated root store instead of sharing a hidden
/// global.
#[derive(Clone)]
pub struct Runtime {
    inner: Rc<RuntimeInner>,
}

impl Runtime {
    pub fn new() -> Self {
        Runtime {
            inner: Rc::new(RuntimeInner {
                root: ScopeStore::new_root(),
                tracked: RefCell::new(Vec::new()),
            }),
        }
    }

    pub fn root_store(&self) -> &ScopeStore {
        &self.inner.root
    }

    /// Convenience for access outside any component: resolve through the
    /// root store (constructing the global fallback instance on a miss).
    pub fn get_state(&self, def: &StateDef) -> StateHandle {
        self.inner.root.get_state(def)
    }

    /// Remember an observable so batched notifications reach it at the
    /// next flush. Holds only a weak handle; unmounted state is pruned.
    pub fn track(&self, obs: &Observable) {
        let mut tracked = self.inner.tracked.borrow_mut();
        if tracked.iter().any(|(id, _)| *id == obs.id()) {
            return;
        }
        tracked.push((obs.id(), obs.downgrade()));
    }

    /// Deliver batched notifications on every live tracked observable.
    /// Hosts call this once per reconciliation cycle.
    pub fn flush(&self) {
        let live: Vec<Observable> = {
            let mut tracked = self.inner.tracked.borrow_mut();
            tracked.retain(|(_, weak)| weak.upgrade().is_some());
            tracked.iter().filter_map(|(_, weak)| weak.upgrade()).collect()
        };
        for obs in live {
            obs.flush();
        }
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

/// The per-render context handed to every state access and hook body.
///
/// This is the explicit stand-in for "are we inside a component render":
/// anything that needs the host framework (slot memoization, the current
/// provider chain, the post-commit signal, the re-render trigger) takes a
/// `&mut Cx` argument instead of consulting ambient state.
pub struct Cx<'a> {
    runtime: Runtime,
    composer: &'a mut Composer,
    store: ScopeStore,
    scope: Scope,
    invalidate: Rc<dyn Fn()>,
    commits: Vec<Box<dyn FnOnce()>>,
}

impl<'a> Cx<'a> {
    /// Built by the host once per render of a component. `store` is the
    /// provider chain the component sits under (the runtime's root store
    /// when it sits under none) and `invalidate` is the component's
    /// re-render trigger, safe to call from outside the render phase.
    pub fn new(
        runtime: &Runtime,
        composer: &'a mut Composer,
        store: ScopeStore,
        scope: Scope,
        invalidate: Rc<dyn Fn()>,
    ) -> Cx<'a> {
        composer.begin();
        Cx {
            runtime: runtime.clone(),
            composer,
            store,
            scope,
            invalidate,
            commits: Vec::new(),
        }
    }

    /// Slot-based remember (sequential composition only).
    pub fn remember<T: 'static>(&mut self, init: impl FnOnce() -> T) -> Rc<T> {
        let cursor = self.composer.cursor;
        self.composer.cursor += 1;

        if cursor >= self.composer.slots.len() {
            let rc: Rc<T> = Rc::new(init());
            self.composer.slots.push(Box::new(rc.clone()));
            return rc;
        }

        if let Some(rc) = self.composer.slots[cursor].downcast_ref::<Rc<T>>() {
            rc.clone()
        } else {
            log::warn!(
                "remember: slot {cursor} type changed; replacing. \
                 If this is due to conditional composition, prefer remember_with_key."
            );
            let rc: Rc<T> = Rc::new(init());
            self.composer.slots[cursor] = Box::new(rc.clone());
            rc
        }
    }

    /// Key-based remember, stable across conditional branches.
    pub fn remember_with_key<T: 'static>(
        &mut self,
        key: impl Into<String>,
        init: impl FnOnce() -> T,
    ) -> Rc<T> {
        let key = key.into();
        if let Some(existing) = self.composer.keyed.get(&key) {
            if let Some(rc) = existing.downcast_ref::<Rc<T>>() {
                return rc.clone();
            }
            log::warn!("remember_with_key: key '{key}' reused with a different type; replacing.");
        }
        let rc: Rc<T> = Rc::new(init());
        self.composer.keyed.insert(key, Box::new(rc.clone()));
        rc
    }

    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    /// The innermost scope store enclosing this component.
    pub fn store(&self) -> &ScopeStore {
        &self.store
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    /// The owning component's re-render trigger.
    pub fn invalidate(&self) -> Rc<dyn Fn()> {
        Rc::clone(&self.invalidate)
    }

    /// Run `f` at the host's first post-commit opportunity for this pass.
    pub fn on_commit(&mut self, f: impl FnOnce() + 'static) {
        self.commits.push(Box::new(f));
    }

    /// Consume the context after the component body returns, yielding the
    /// deferred post-commit actions for the host to run.
    pub fn finish(self) -> Vec<Box<dyn FnOnce()>> {
        self.commits
    }

    /// Open a provider level for `def` around `body`.
    ///
    /// The level is created once per call site and reused on re-render, so
    /// descendant subscriptions survive the provider re-rendering. Passing
    /// `Some(state)` shares that exact instance (re-registering the same
    /// instance is a no-op); passing `None` constructs one on first entry
    /// and keeps providing it.
    pub fn provide<R>(
        &mut self,
        def: &StateDef,
        state: Option<StateHandle>,
        body: impl FnOnce(&mut Cx<'_>) -> R,
    ) -> R {
        let level_slot: Rc<RefCell<Option<ScopeStore>>> = self.remember(|| RefCell::new(None));
        let level = {
            let mut slot = level_slot.borrow_mut();
            slot.get_or_insert_with(|| self.store.child()).clone()
        };

        let inst_slot: Rc<RefCell<Option<StateHandle>>> = self.remember(|| RefCell::new(None));
        let instance = {
            let mut slot = inst_slot.borrow_mut();
            match state {
                Some(handle) => {
                    *slot = Some(handle.clone());
                    handle
                }
                None => slot.get_or_insert_with(|| def.create()).clone(),
            }
        };
        level.set_state(&instance);

        let saved = std::mem::replace(&mut self.store, level);
        let out = body(self);
        self.store = saved;
        out
    }
}
