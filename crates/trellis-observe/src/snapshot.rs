use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

use crate::observable::Observable;
use crate::path::Path;
use crate::value::Value;

/// The set of paths a render pass actually read from one snapshot.
///
/// A mutation wakes a subscriber when the mutated path and one recorded
/// read path are in a prefix relation, in either direction: reading
/// `user.name` is invalidated by replacing `user` wholesale, and reading
/// `items` (its length, its iteration) is invalidated by writing
/// `items[3]`.
#[derive(Default, Debug)]
pub struct ReadSet {
    paths: HashSet<Path>,
}

impl ReadSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, path: Path) {
        self.paths.insert(path);
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn affected_by(&self, changed: &Path) -> bool {
        self.paths.iter().any(|read| read.overlaps(changed))
    }

    pub fn affected_by_any<'a>(&self, changed: impl IntoIterator<Item = &'a Path>) -> bool {
        changed.into_iter().any(|p| self.affected_by(p))
    }
}

/// A point-in-time, read-only structural copy of an observable tree, bound
/// to the render pass that requested it.
///
/// Reads through `track*` record the exact path touched into the shared
/// [`ReadSet`]; the paired subscription uses that set to decide whether a
/// later mutation concerns the caller at all. `peek` reads without
/// recording, which is what plain traversal into a nested container uses.
pub struct Snapshot {
    data: Rc<Value>,
    reads: Rc<RefCell<ReadSet>>,
    source: Observable,
}

impl Snapshot {
    pub(crate) fn new(data: Rc<Value>, source: Observable) -> Self {
        Snapshot {
            data,
            reads: Rc::new(RefCell::new(ReadSet::new())),
            source,
        }
    }

    /// The live handle this snapshot was taken from. Always reachable, so
    /// event handlers can get back to current data.
    pub fn observable(&self) -> &Observable {
        &self.source
    }

    pub fn reads(&self) -> Rc<RefCell<ReadSet>> {
        Rc::clone(&self.reads)
    }

    /// Read the value at `path`, recording the path as a dependency.
    pub fn track(&self, path: &Path) -> Option<Value> {
        let v = self.data.lookup(path)?.clone();
        self.reads.borrow_mut().record(path.clone());
        Some(v)
    }

    /// Read without recording a dependency.
    pub fn peek(&self, path: &Path) -> Option<&Value> {
        self.data.lookup(path)
    }

    /// Record `path` as a dependency without materializing its value.
    pub fn touch(&self, path: &Path) {
        if self.data.lookup(path).is_some() {
            self.reads.borrow_mut().record(path.clone());
        }
    }

    /// Length of the container at `path`, recording the container itself as
    /// a dependency (structural changes must wake the reader).
    pub fn track_len(&self, path: &Path) -> Option<usize> {
        let n = self.data.lookup(path)?.len()?;
        self.reads.borrow_mut().record(path.clone());
        Some(n)
    }

    /// Entries of the map at `path` in declaration order, recording the
    /// container as a dependency.
    pub fn track_entries(&self, path: &Path) -> Option<Vec<(String, Value)>> {
        let map = self.data.lookup(path)?.as_map()?;
        let out = map.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        self.reads.borrow_mut().record(path.clone());
        Some(out)
    }
}
