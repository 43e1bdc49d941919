//! # Scoped reactive state for component trees
//!
//! Trellis lets a component declare a reusable state shape once and
//! instantiate it as component-local, subtree-shared, or process-wide
//! state. Components that read specific fields re-render only when those
//! exact fields change.
//!
//! There are four pieces:
//!
//! - [`StateDef`] / [`define_state`] — an immutable template (initial
//!   data, methods, computation hooks) producing [`StateHandle`]
//!   instances.
//! - [`ScopeStore`] — a parent-chained registry resolving a definition to
//!   the nearest enclosing instance, with a root-level fallback singleton.
//! - [`StateView`] — the per-render tracked view: reads during the render
//!   body record dependencies against a snapshot; reads after commit pass
//!   through to the live instance.
//! - [`inject_hooks`] — runs each instance's computation hooks before the
//!   component body observes it, caching their results for the pass.
//!
//! ## Defining and using a shape
//!
//! ```
//! use trellis_core::prelude::*;
//!
//! let counter = define_state(value!({ "count": 0, "step": 1 }))
//!     .named("counter")
//!     .action("increment", |s| s.set("count", s.int("count") + s.int("step")))
//!     .method("is_multiple_of", |s, args| {
//!         let n = args[0].as_int().unwrap_or(1);
//!         (s.int("count") % n == 0).into()
//!     })
//!     .finish();
//!
//! let state = counter.create_with(|data| {
//!     if let Value::Map(m) = data {
//!         m.insert("step".into(), Value::Int(2));
//!     }
//! });
//!
//! state.call("increment", &[]);
//! assert_eq!(state.int("count"), 2);
//! assert_eq!(state.call("is_multiple_of", &[2.into()]), Value::Bool(true));
//!
//! // A bound reference keeps its receiver wherever it travels.
//! let on_click = state.binding("increment");
//! on_click();
//! assert_eq!(state.int("count"), 4);
//! ```
//!
//! ## Scoping
//!
//! Instances resolve through a chain of [`ScopeStore`] levels mirroring
//! the component tree. The nearest level providing a definition wins;
//! siblings never see each other; with no provider at all, a fallback
//! instance is constructed in the root store and lives for the process.
//!
//! ```
//! use trellis_core::prelude::*;
//!
//! let theme = define_state(value!({ "dark": false })).named("theme").finish();
//!
//! let runtime = Runtime::new();
//! let outer = runtime.root_store().child();
//! let inner = outer.child();
//!
//! let shared = theme.create();
//! outer.set_state(&shared);
//!
//! assert!(inner.get_state(&theme).ptr_eq(&shared));
//! ```
//!
//! Rendering hosts drive the rest: they hand every component a [`Cx`]
//! (slot memoization, the current store chain, the post-commit signal, the
//! re-render trigger) and call [`Runtime::flush`] once per reconciliation
//! cycle. The `trellis-harness` crate is a minimal such host.

pub mod define;
pub mod error;
pub mod hooks;
pub mod prelude;
pub mod runtime;
pub mod scope;
pub mod state;
pub mod store;
pub mod view;

pub mod tests;

pub use define::{HookFn, MethodFn, StateDef, StateDefBuilder, define_state, define_state_with};
pub use error::StateError;
pub use hooks::inject_hooks;
pub use runtime::{Composer, Cx, Runtime};
pub use scope::Scope;
pub use state::StateHandle;
pub use store::ScopeStore;
pub use view::{
    RenderFlag, StateView, use_local_state, use_local_state_with, use_passed_state,
    use_provided_state,
};

pub use trellis_observe::{
    OpaqueRef, Path, SnapshotOptions, Step, Value, ValueMap, deep_clone, value,
};
