use thiserror::Error;

use trellis_observe::ObserveError;

/// Usage errors surfaced by the state engine.
///
/// These are fatal by policy: the `try_*` accessors return them, the plain
/// accessors panic with the same message. Nothing in the engine catches or
/// retries them; they exist to fail fast at the call site during
/// development.
#[derive(Debug, Error)]
pub enum StateError {
    #[error(
        "result of hook `{0}` has not been injected yet; it becomes available once the owning component has rendered"
    )]
    HookNotInjected(String),

    #[error("state `{def}` has no hook named `{name}`")]
    UnknownHook { def: String, name: String },

    #[error("state `{def}` has no method named `{name}`")]
    UnknownMethod { def: String, name: String },

    #[error("state `{def}` has no field `{field}`")]
    MissingField { def: String, field: String },

    #[error("field `{field}` of state `{def}` is not {expected}")]
    TypeMismatch {
        def: String,
        field: String,
        expected: &'static str,
    },

    #[error(transparent)]
    Observe(#[from] ObserveError),
}
