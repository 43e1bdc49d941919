pub use crate::define::{StateDef, StateDefBuilder, define_state, define_state_with};
pub use crate::error::StateError;
pub use crate::hooks::inject_hooks;
pub use crate::runtime::{Composer, Cx, Runtime};
pub use crate::scope::Scope;
pub use crate::state::StateHandle;
pub use crate::store::ScopeStore;
pub use crate::view::{
    StateView, use_local_state, use_local_state_with, use_passed_state, use_provided_state,
};
pub use trellis_observe::{
    OpaqueRef, Path, SnapshotOptions, Value, ValueMap, deep_clone, value,
};
