use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::define::{DefKey, StateDef};
use crate::state::StateHandle;

struct StoreInner {
    parent: Option<ScopeStore>,
    states: RefCell<HashMap<DefKey, StateHandle>>,
}

/// One level of the chained definition-to-instance registry.
///
/// Levels mirror the component tree's provider nesting: each level links
/// to exactly one parent (none for the root), lookups walk from the
/// nearest level outward and stop at the first match, and sibling levels
/// can never see each other's registrations.
#[derive(Clone)]
pub struct ScopeStore {
    inner: Rc<StoreInner>,
}

impl ScopeStore {
    pub fn new_root() -> ScopeStore {
        ScopeStore {
            inner: Rc::new(StoreInner {
                parent: None,
                states: RefCell::new(HashMap::new()),
            }),
        }
    }

    /// A new level parented to this one.
    pub fn child(&self) -> ScopeStore {
        ScopeStore {
            inner: Rc::new(StoreInner {
                parent: Some(self.clone()),
                states: RefCell::new(HashMap::new()),
            }),
        }
    }

    pub fn parent(&self) -> Option<ScopeStore> {
        self.inner.parent.clone()
    }

    pub fn ptr_eq(&self, other: &ScopeStore) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    fn root(&self) -> ScopeStore {
        let mut level = self.clone();
        while let Some(parent) = level.parent() {
            level = parent;
        }
        level
    }

    /// Nearest-enclosing instance of `def`, if any level in the chain has
    /// one. Never constructs.
    pub fn lookup(&self, def: &StateDef) -> Option<StateHandle> {
        if let Some(state) = self.inner.states.borrow().get(&def.key()) {
            return Some(state.clone());
        }
        self.inner.parent.as_ref()?.lookup(def)
    }

    /// Resolve `def` to an instance, walking outward through enclosing
    /// levels.
    ///
    /// When no level has one, an instance is constructed and registered in
    /// the *root* level, so truly-global access keeps finding the same
    /// process-lifetime singleton. (The alternative policy, failing when
    /// no provider encloses the caller, is deliberately not implemented;
    /// wrap a subtree in a provider to scope the instance instead.)
    pub fn get_state(&self, def: &StateDef) -> StateHandle {
        if let Some(state) = self.lookup(def) {
            return state;
        }
        let state = def.create();
        self.root().set_state(&state);
        state
    }

    /// Register an existing instance at this level, shadowing any ancestor
    /// registration for the same definition. Re-registering the same
    /// instance is a no-op.
    pub fn set_state(&self, state: &StateHandle) {
        let key = state.definition().key();
        let mut states = self.inner.states.borrow_mut();
        if let Some(existing) = states.get(&key) {
            if existing.ptr_eq(state) {
                return;
            }
            log::warn!(
                "set_state: replacing the `{}` instance registered at this level; \
                 descendants re-resolve on their next render",
                state.definition().name()
            );
        }
        states.insert(key, state.clone());
    }
}

impl std::fmt::Debug for ScopeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopeStore")
            .field("states", &self.inner.states.borrow().len())
            .field("has_parent", &self.inner.parent.is_some())
            .finish()
    }
}
