use std::cell::RefCell;
use std::rc::Rc;

use trellis_observe::{Observable, Path, Value};

use crate::define::StateDef;
use crate::error::StateError;

pub(crate) enum HookSlot {
    Pending,
    Cached(Value),
    Overridden(Rc<dyn Fn(&StateHandle) -> Value>),
}

struct HandleInner {
    def: StateDef,
    obs: Observable,
    hooks: RefCell<Vec<HookSlot>>,
}

/// One live, mutable occurrence of a definition's data.
///
/// The handle is cheap to clone and identity-stable: clones refer to the
/// same instance, and bound method references hold a clone, so the
/// receiver of a method is permanently this instance no matter where the
/// reference ends up. Methods, hook slots, and other bookkeeping live here
/// in the handle, never inside the data tree, so enumerating an instance's
/// fields yields exactly the author-declared data in declaration order.
///
/// All mutation flows through the handle (or methods called on it), which
/// is what produces change notifications. Reading during a render pass
/// should go through the tracked view instead; see `use_local_state` and
/// friends.
#[derive(Clone)]
pub struct StateHandle {
    inner: Rc<HandleInner>,
}

impl StateHandle {
    pub(crate) fn new(def: StateDef, obs: Observable) -> Self {
        let slots = def.hooks().iter().map(|_| HookSlot::Pending).collect();
        StateHandle {
            inner: Rc::new(HandleInner {
                def,
                obs,
                hooks: RefCell::new(slots),
            }),
        }
    }

    pub fn definition(&self) -> &StateDef {
        &self.inner.def
    }

    pub fn observable(&self) -> &Observable {
        &self.inner.obs
    }

    pub fn ptr_eq(&self, other: &StateHandle) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    fn def_name(&self) -> String {
        self.inner.def.name().to_string()
    }

    // Reads, always against live data.

    pub fn try_get(&self, field: &str) -> Result<Value, StateError> {
        self.inner
            .obs
            .get(&Path::key(field))
            .ok_or_else(|| StateError::MissingField {
                def: self.def_name(),
                field: field.to_string(),
            })
    }

    pub fn get(&self, field: &str) -> Value {
        self.try_get(field).unwrap_or_else(|e| panic!("{e}"))
    }

    pub fn get_at(&self, path: &Path) -> Option<Value> {
        self.inner.obs.get(path)
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
            def: self.def_name(),
            field: field.to_string(),
            expected,
        }
    }

    /// Entries of the instance's own data fields, declaration order.
    pub fn entries(&self) -> Vec<(String, Value)> {
        self.inner.obs.entries()
    }

    pub fn len(&self, field: &str) -> Option<usize> {
        self.inner.obs.len(&Path::key(field))
    }

    // Writes.

    pub fn set(&self, field: &str, value: impl Into<Value>) {
        self.try_set_at(&Path::key(field), value)
            .unwrap_or_else(|e| panic!("{e}"))
    }

    pub fn try_set_at(&self, path: &Path, value: impl Into<Value>) -> Result<(), StateError> {
        self.inner.obs.set(path, value.into())?;
        Ok(())
    }

    pub fn set_at(&self, path: &Path, value: impl Into<Value>) {
        self.try_set_at(path, value).unwrap_or_else(|e| panic!("{e}"))
    }

    /// Apply an arbitrary mutation to the whole tree; subscribers see one
    /// coalesced change covering exactly the paths that differ.
    pub fn update(&self, f: impl FnOnce(&mut Value)) {
        self.inner.obs.update(f);
    }

    pub fn try_update_at(
        &self,
        path: &Path,
        f: impl FnOnce(&mut Value),
    ) -> Result<(), StateError> {
        self.inner.obs.update_at(path, f)?;
        Ok(())
    }

    /// [`update`](StateHandle::update) scoped to the subtree at `path`.
    pub fn update_at(&self, path: &Path, f: impl FnOnce(&mut Value)) {
        self.try_update_at(path, f)
            .unwrap_or_else(|e| panic!("{e}"))
    }

    // Methods.

    pub fn try_call(&self, name: &str, args: &[Value]) -> Result<Value, StateError> {
        let method = self
            .inner
            .def
            .method(name)
            .ok_or_else(|| StateError::UnknownMethod {
                def: self.def_name(),
                name: name.to_string(),
            })?;
        Ok(method(self, args))
    }

    pub fn call(&self, name: &str, args: &[Value]) -> Value {
        self.try_call(name, args).unwrap_or_else(|e| panic!("{e}"))
    }

    /// A bound method reference: a callback whose receiver is permanently
    /// this instance. Hand it to an event handler without ceremony. The
    /// method is resolved eagerly so an unknown name fails at the bind
    /// site, not when the event fires.
    pub fn binding(&self, name: &str) -> Rc<dyn Fn()> {
        let method = self
            .inner
            .def
            .method(name)
            .unwrap_or_else(|| {
                panic!(
                    "{}",
                    StateError::UnknownMethod {
                        def: self.def_name(),
                        name: name.to_string(),
                    }
                )
            });
        let this = self.clone();
        Rc::new(move || {
            method(&this, &[]);
        })
    }

    // Computation hooks.

    pub fn try_hook_result(&self, name: &str) -> Result<Value, StateError> {
        let idx = self
            .inner
            .def
            .hook_index(name)
            .ok_or_else(|| StateError::UnknownHook {
                def: self.def_name(),
                name: name.to_string(),
            })?;
        let overridden = {
            let slots = self.inner.hooks.borrow();
            match &slots[idx] {
                HookSlot::Pending => return Err(StateError::HookNotInjected(name.to_string())),
                HookSlot::Cached(v) => return Ok(v.clone()),
                HookSlot::Overridden(f) => Rc::clone(f),
            }
        };
        Ok(overridden(self))
    }

    /// Most recently injected result of the named hook. Reading it before
    /// the owning component has rendered is a fatal usage error.
    pub fn hook_result(&self, name: &str) -> Value {
        self.try_hook_result(name).unwrap_or_else(|e| panic!("{e}"))
    }

    /// Replace a hook body for this instance only, bypassing injection.
    /// Meant for tests that call methods depending on hook results without
    /// standing up a host.
    pub fn override_hook(&self, name: &str, f: impl Fn(&StateHandle) -> Value + 'static) {
        let idx = self
            .inner
            .def
            .hook_index(name)
            .unwrap_or_else(|| {
                panic!(
                    "{}",
                    StateError::UnknownHook {
                        def: self.def_name(),
                        name: name.to_string(),
                    }
                )
            });
        self.inner.hooks.borrow_mut()[idx] = HookSlot::Overridden(Rc::new(f));
    }

    pub(crate) fn hook_is_overridden(&self, idx: usize) -> bool {
        matches!(self.inner.hooks.borrow()[idx], HookSlot::Overridden(_))
    }

    pub(crate) fn cache_hook(&self, idx: usize, value: Value) {
        self.inner.hooks.borrow_mut()[idx] = HookSlot::Cached(value);
    }
}

impl std::fmt::Debug for StateHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateHandle")
            .field("def", &self.inner.def.name())
            .field("version", &self.inner.obs.version())
            .finish()
    }
}
