use std::any::Any;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::path::{Path, Step};

/// Ordered map used for object fields. Field order is insertion order, so
/// enumerating an instance yields author-declared fields in declaration
/// order.
pub type ValueMap = IndexMap<String, Value>;

/// A value explicitly excluded from deep observation (a native handle, a
/// channel, anything the state layer should carry but never walk).
///
/// Equality is pointer identity: replacing an opaque reference notifies the
/// field it sits in, but the interior of the value is never inspected,
/// cloned structurally, or tracked.
#[derive(Clone)]
pub struct OpaqueRef(Rc<dyn Any>);

impl OpaqueRef {
    pub fn new<T: 'static>(value: T) -> Self {
        OpaqueRef(Rc::new(value))
    }

    pub fn downcast<T: 'static>(&self) -> Option<Rc<T>> {
        Rc::clone(&self.0).downcast::<T>().ok()
    }

    pub fn ptr_eq(&self, other: &OpaqueRef) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl PartialEq for OpaqueRef {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl std::fmt::Debug for OpaqueRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OpaqueRef(..)")
    }
}

/// The deeply-owned data tree behind a state instance.
///
/// Maps keep declaration order; `Opaque` leaves compare and clone by
/// identity; everything else clones structurally.
#[derive(Clone, Debug, PartialEq, Default)]
pub enum Value {
    #[default]
    Unit,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    Map(ValueMap),
    Opaque(OpaqueRef),
}

impl Value {
    /// Marker constructor for values excluded from deep observation.
    pub fn opaque<T: 'static>(value: T) -> Value {
        Value::Opaque(OpaqueRef::new(value))
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(x) => Some(*x),
            Value::Int(n) => Some(*n as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(xs) => Some(xs),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&ValueMap> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_opaque(&self) -> Option<&OpaqueRef> {
        match self {
            Value::Opaque(o) => Some(o),
            _ => None,
        }
    }

    pub fn is_container(&self) -> bool {
        matches!(self, Value::List(_) | Value::Map(_))
    }

    /// Length of a list or map, `None` for everything else.
    pub fn len(&self) -> Option<usize> {
        match self {
            Value::List(xs) => Some(xs.len()),
            Value::Map(m) => Some(m.len()),
            _ => None,
        }
    }

    pub fn step(&self, step: &Step) -> Option<&Value> {
        match (self, step) {
            (Value::Map(m), Step::Key(k)) => m.get(k),
            (Value::List(xs), Step::Index(i)) => xs.get(*i),
            _ => None,
        }
    }

    pub fn step_mut(&mut self, step: &Step) -> Option<&mut Value> {
        match (self, step) {
            (Value::Map(m), Step::Key(k)) => m.get_mut(k),
            (Value::List(xs), Step::Index(i)) => xs.get_mut(*i),
            _ => None,
        }
    }

    pub fn lookup(&self, path: &Path) -> Option<&Value> {
        let mut node = self;
        for step in path.steps() {
            node = node.step(step)?;
        }
        Some(node)
    }

    pub fn lookup_mut(&mut self, path: &Path) -> Option<&mut Value> {
        let mut node = self;
        for step in path.steps() {
            node = node.step_mut(step)?;
        }
        Some(node)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}
impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}
impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(n as i64)
    }
}
impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Value::Int(n as i64)
    }
}
impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}
impl From<f32> for Value {
    fn from(x: f32) -> Self {
        Value::Float(x as f64)
    }
}
impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}
impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}
impl From<Vec<Value>> for Value {
    fn from(xs: Vec<Value>) -> Self {
        Value::List(xs)
    }
}
impl From<ValueMap> for Value {
    fn from(m: ValueMap) -> Self {
        Value::Map(m)
    }
}
impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::Unit
    }
}

/// Structural clone of a value tree. Opaque leaves clone by identity, so
/// the clone shares them; everything else is copied node by node, which is
/// what makes freshly constructed instances never alias each other.
pub fn deep_clone(value: &Value) -> Value {
    value.clone()
}

/// Collect the paths at which `old` and `new` differ.
///
/// This is the snapshot-diffing half of the substrate: a coalesced update
/// applies an arbitrary closure to the tree and then notifies exactly the
/// paths that changed. A structural change to a container (key added or
/// removed, list length change) reports the container path itself, so that
/// readers of the container's shape are woken alongside readers of any
/// surviving children.
pub fn diff_paths(old: &Value, new: &Value) -> Vec<Path> {
    let mut out = Vec::new();
    diff_into(old, new, &Path::root(), &mut out);
    out
}

fn diff_into(old: &Value, new: &Value, at: &Path, out: &mut Vec<Path>) {
    match (old, new) {
        (Value::Map(a), Value::Map(b)) => {
            if a.len() != b.len() || a.keys().ne(b.keys()) {
                out.push(at.clone());
            }
            for (k, bv) in b {
                match a.get(k) {
                    Some(av) => diff_into(av, bv, &at.join_key(k.clone()), out),
                    None => out.push(at.join_key(k.clone())),
                }
            }
        }
        (Value::List(a), Value::List(b)) => {
            if a.len() != b.len() {
                out.push(at.clone());
            }
            for (i, (av, bv)) in a.iter().zip(b.iter()).enumerate() {
                diff_into(av, bv, &at.join_index(i), out);
            }
        }
        (Value::Opaque(a), Value::Opaque(b)) => {
            if !a.ptr_eq(b) {
                out.push(at.clone());
            }
        }
        (a, b) => {
            if a != b {
                out.push(at.clone());
            }
        }
    }
}

/// Literal constructor for [`Value`] trees.
///
/// ```
/// use trellis_observe::value;
///
/// let v = value!({
///     "count": 0,
///     "user": { "name": "ada" },
///     "tags": ["a", "b"],
/// });
/// ```
///
/// Negative number literals need parentheses: `value!((-1))`.
#[macro_export]
macro_rules! value {
    (()) => { $crate::Value::Unit };
    ([ $( $elem:tt ),* $(,)? ]) => {
        $crate::Value::List(vec![ $( $crate::value!($elem) ),* ])
    };
    ({ $( $key:literal : $val:tt ),* $(,)? }) => {{
        #[allow(unused_mut)]
        let mut map = $crate::ValueMap::new();
        $( map.insert($key.to_string(), $crate::value!($val)); )*
        $crate::Value::Map(map)
    }};
    ($other:expr) => { $crate::Value::from($other) };
}
