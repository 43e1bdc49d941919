use std::rc::Rc;

use trellis_observe::{Observable, Value, deep_clone};

use crate::runtime::Cx;
use crate::state::StateHandle;

/// Store-lookup identity of a definition (allocation identity of its
/// shared inner).
pub(crate) type DefKey = usize;

pub type MethodFn = Rc<dyn Fn(&StateHandle, &[Value]) -> Value>;
pub type HookFn = Rc<dyn Fn(&mut Cx<'_>, &StateHandle) -> Value>;

pub(crate) enum Init {
    Literal(Value),
    Factory(Rc<dyn Fn() -> Value>),
}

pub(crate) struct DefInner {
    pub(crate) name: String,
    pub(crate) init: Init,
    pub(crate) methods: Vec<(String, MethodFn)>,
    pub(crate) hooks: Vec<(String, HookFn)>,
}

/// An immutable state shape: an initial-value template plus named methods
/// and computation hooks.
///
/// A definition is a cheap cloneable handle; every clone shares the same
/// identity, which is what scope stores key instances by. Instances are
/// produced with [`create`](StateDef::create); each one gets its own deep
/// copy of the template (or a fresh factory call), so instances never
/// alias each other's nested data.
#[derive(Clone)]
pub struct StateDef {
    inner: Rc<DefInner>,
}

impl StateDef {
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn ptr_eq(&self, other: &StateDef) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn key(&self) -> DefKey {
        Rc::as_ptr(&self.inner) as *const () as usize
    }

    pub fn create(&self) -> StateHandle {
        self.create_with(|_| {})
    }

    /// Construct an instance, letting `set_initial` override fields on the
    /// freshly produced data before it is wrapped for observation. Because
    /// the override runs pre-wrap, it can never trigger a notification.
    pub fn create_with(&self, set_initial: impl FnOnce(&mut Value)) -> StateHandle {
        let mut data = match &self.inner.init {
            Init::Literal(v) => deep_clone(v),
            Init::Factory(f) => f(),
        };
        set_initial(&mut data);
        StateHandle::new(self.clone(), Observable::wrap(data))
    }

    pub(crate) fn method(&self, name: &str) -> Option<MethodFn> {
        self.inner
            .methods
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, f)| Rc::clone(f))
    }

    pub(crate) fn hooks(&self) -> &[(String, HookFn)] {
        &self.inner.hooks
    }

    pub(crate) fn hook_index(&self, name: &str) -> Option<usize> {
        self.inner.hooks.iter().position(|(n, _)| n == name)
    }
}

impl std::fmt::Debug for StateDef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateDef")
            .field("name", &self.inner.name)
            .field("methods", &self.inner.methods.len())
            .field("hooks", &self.inner.hooks.len())
            .finish()
    }
}

/// Declare a state shape from a literal template. The template is deep
/// cloned per instance.
pub fn define_state(initial: impl Into<Value>) -> StateDefBuilder {
    StateDefBuilder::new(Init::Literal(initial.into()))
}

/// Declare a state shape whose initial data comes from a producer invoked
/// fresh per instance (for templates carrying reference types that must
/// not be shared through the template itself).
pub fn define_state_with(factory: impl Fn() -> Value + 'static) -> StateDefBuilder {
    StateDefBuilder::new(Init::Factory(Rc::new(factory)))
}

pub struct StateDefBuilder {
    name: String,
    init: Init,
    methods: Vec<(String, MethodFn)>,
    hooks: Vec<(String, HookFn)>,
}

impl StateDefBuilder {
    fn new(init: Init) -> Self {
        StateDefBuilder {
            name: "state".to_string(),
            init,
            methods: Vec::new(),
            hooks: Vec::new(),
        }
    }

    /// Debug name used in error messages and logs.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// A method with arguments and a return value. The receiver is always
    /// the instance the method is called on, however the method reference
    /// travels; see [`StateHandle::binding`].
    pub fn method(
        mut self,
        name: impl Into<String>,
        f: impl Fn(&StateHandle, &[Value]) -> Value + 'static,
    ) -> Self {
        self.methods.push((name.into(), Rc::new(f)));
        self
    }

    /// A mutator taking no arguments and returning nothing. Sugar for the
    /// common event-handler shape.
    pub fn action(mut self, name: impl Into<String>, f: impl Fn(&StateHandle) + 'static) -> Self {
        self.methods.push((
            name.into(),
            Rc::new(move |s: &StateHandle, _: &[Value]| {
                f(s);
                Value::Unit
            }),
        ));
        self
    }

    /// A computation hook: a body that needs the host framework's
    /// per-render context. Declaring it here is what marks it; there is no
    /// naming convention. The hook runs unconditionally on every render of
    /// the owning component, and its cached result is what
    /// [`StateHandle::hook_result`] returns for the rest of that pass.
    pub fn hook(
        mut self,
        name: impl Into<String>,
        f: impl Fn(&mut Cx<'_>, &StateHandle) -> Value + 'static,
    ) -> Self {
        self.hooks.push((name.into(), Rc::new(f)));
        self
    }

    pub fn finish(self) -> StateDef {
        StateDef {
            inner: Rc::new(DefInner {
                name: self.name,
                init: self.init,
                methods: self.methods,
                hooks: self.hooks,
            }),
        }
    }
}
