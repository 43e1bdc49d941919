use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use slotmap::{SlotMap, new_key_type};

use crate::path::{Path, Step};
use crate::snapshot::{ReadSet, Snapshot};
use crate::value::{Value, diff_paths};

new_key_type! {
    pub struct SubKey;
}

/// When a subscriber hears about mutations.
///
/// `Batched` coalesces every mutation since the last [`Observable::flush`]
/// into at most one callback. `Sync` delivers one callback per mutation,
/// immediately, which is what tests and components that must observe every
/// intermediate value opt into.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum NotifyMode {
    #[default]
    Batched,
    Sync,
}

/// Per-call-site snapshot options. `sync: true` switches the paired
/// subscription to immediate, single-mutation notification.
#[derive(Clone, Copy, Debug, Default)]
pub struct SnapshotOptions {
    pub sync: bool,
}

impl SnapshotOptions {
    pub const SYNC: SnapshotOptions = SnapshotOptions { sync: true };

    pub fn mode(self) -> NotifyMode {
        if self.sync { NotifyMode::Sync } else { NotifyMode::Batched }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ObserveError {
    #[error("no value at path `{0}`")]
    PathNotFound(Path),
    #[error("value at `{0}` is not a container")]
    NotContainer(Path),
    #[error("index out of bounds at `{0}`")]
    IndexOutOfBounds(Path),
}

struct Subscriber {
    mode: NotifyMode,
    reads: Rc<RefCell<ReadSet>>,
    callback: Rc<dyn Fn()>,
}

struct ObsInner {
    root: RefCell<Value>,
    version: Cell<u64>,
    subs: RefCell<SlotMap<SubKey, Subscriber>>,
    pending: RefCell<Vec<Path>>,
}

/// Shared handle to one observed value tree.
///
/// Cloning the handle clones the `Rc`, never the data: the handle is the
/// stable identity of the underlying graph. Wrapping a primitive or opaque
/// value is a no-op in the sense that such a root simply carries no
/// children to track.
///
/// Mutation goes through [`set`](Observable::set) for single paths or
/// [`update`](Observable::update) for arbitrary closures over the tree;
/// `update` diffs the tree before and after and notifies exactly the paths
/// that changed.
#[derive(Clone)]
pub struct Observable {
    inner: Rc<ObsInner>,
}

impl Observable {
    pub fn wrap(value: Value) -> Observable {
        Observable {
            inner: Rc::new(ObsInner {
                root: RefCell::new(value),
                version: Cell::new(0),
                subs: RefCell::new(SlotMap::with_key()),
                pending: RefCell::new(Vec::new()),
            }),
        }
    }

    /// Stable identity of the underlying graph.
    pub fn id(&self) -> usize {
        Rc::as_ptr(&self.inner) as usize
    }

    pub fn downgrade(&self) -> WeakObservable {
        WeakObservable {
            inner: Rc::downgrade(&self.inner),
        }
    }

    /// Bumped once per mutation.
    pub fn version(&self) -> u64 {
        self.inner.version.get()
    }

    /// Clone of the subtree at `path`, straight off the live tree.
    pub fn get(&self, path: &Path) -> Option<Value> {
        self.inner.root.borrow().lookup(path).cloned()
    }

    pub fn len(&self, path: &Path) -> Option<usize> {
        self.inner.root.borrow().lookup(path)?.len()
    }

    /// Root map entries in declaration order. Empty for non-map roots.
    pub fn entries(&self) -> Vec<(String, Value)> {
        match &*self.inner.root.borrow() {
            Value::Map(m) => m.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
            _ => Vec::new(),
        }
    }

    /// Replace the value at `path`, notifying that exact path.
    ///
    /// Setting a new key on an existing map inserts it (fields added this
    /// way enumerate after the declared ones). The parent container must
    /// exist.
    pub fn set(&self, path: &Path, value: Value) -> Result<(), ObserveError> {
        {
            let mut root = self.inner.root.borrow_mut();
            if path.is_root() {
                *root = value;
            } else {
                let (last, parent_steps) = path.steps().split_last().expect("non-root path");
                let mut parent_path = Path::root();
                for s in parent_steps {
                    parent_path.push(s.clone());
                }
                let parent = root
                    .lookup_mut(&parent_path)
                    .ok_or_else(|| ObserveError::PathNotFound(parent_path.clone()))?;
                match (parent, last) {
                    (Value::Map(m), Step::Key(k)) => {
                        m.insert(k.clone(), value);
                    }
                    (Value::List(xs), Step::Index(i)) => {
                        if *i >= xs.len() {
                            return Err(ObserveError::IndexOutOfBounds(path.clone()));
                        }
                        xs[*i] = value;
                    }
                    _ => return Err(ObserveError::NotContainer(parent_path)),
                }
            }
            self.inner.version.set(self.inner.version.get() + 1);
        }
        self.changed(path.clone());
        Ok(())
    }

    /// Apply `f` to the whole tree, then notify exactly the paths that
    /// differ from before. One mutation from the subscribers' point of
    /// view, however much the closure touched.
    pub fn update(&self, f: impl FnOnce(&mut Value)) {
        let has_subs = !self.inner.subs.borrow().is_empty();
        let before = if has_subs {
            Some(self.inner.root.borrow().clone())
        } else {
            None
        };
        f(&mut self.inner.root.borrow_mut());
        self.inner.version.set(self.inner.version.get() + 1);
        if let Some(before) = before {
            let changed = diff_paths(&before, &self.inner.root.borrow());
            self.changed_many(changed);
        }
    }

    /// Like [`update`](Observable::update), scoped to the subtree at `path`.
    pub fn update_at(&self, path: &Path, f: impl FnOnce(&mut Value)) -> Result<(), ObserveError> {
        let before = {
            let mut root = self.inner.root.borrow_mut();
            let node = root
                .lookup_mut(path)
                .ok_or_else(|| ObserveError::PathNotFound(path.clone()))?;
            let before = node.clone();
            f(node);
            before
        };
        self.inner.version.set(self.inner.version.get() + 1);
        let after = self
            .get(path)
            .ok_or_else(|| ObserveError::PathNotFound(path.clone()))?;
        let changed = diff_paths(&before, &after)
            .into_iter()
            .map(|sub| {
                let mut full = path.clone();
                for step in sub.steps() {
                    full.push(step.clone());
                }
                full
            })
            .collect();
        self.changed_many(changed);
        Ok(())
    }

    /// Immutable structural copy of the current tree, bound to the calling
    /// render pass. Pair it with [`subscribe`](Observable::subscribe) using
    /// the snapshot's read set.
    pub fn snapshot(&self) -> Snapshot {
        let data = Rc::new(self.inner.root.borrow().clone());
        Snapshot::new(data, self.clone())
    }

    pub fn subscribe(
        &self,
        mode: NotifyMode,
        reads: Rc<RefCell<ReadSet>>,
        callback: Rc<dyn Fn()>,
    ) -> Subscription {
        let key = self.inner.subs.borrow_mut().insert(Subscriber {
            mode,
            reads,
            callback,
        });
        Subscription {
            inner: Rc::downgrade(&self.inner),
            key,
            mode,
            obs_id: self.id(),
        }
    }

    /// Deliver batched notifications accumulated since the last flush.
    /// Each batched subscriber whose read set intersects the mutation batch
    /// is called exactly once.
    pub fn flush(&self) {
        let pending = std::mem::take(&mut *self.inner.pending.borrow_mut());
        if pending.is_empty() {
            return;
        }
        let to_call: Vec<Rc<dyn Fn()>> = self
            .inner
            .subs
            .borrow()
            .values()
            .filter(|s| {
                s.mode == NotifyMode::Batched
                    && s.reads.borrow().affected_by_any(pending.iter())
            })
            .map(|s| Rc::clone(&s.callback))
            .collect();
        log::trace!(
            "flush: {} pending path(s), waking {} batched subscriber(s)",
            pending.len(),
            to_call.len()
        );
        for cb in to_call {
            cb();
        }
    }

    fn changed(&self, path: Path) {
        self.changed_many(vec![path]);
    }

    /// Record one mutation batch and wake each affected sync subscriber at
    /// most once, however many paths the batch covers.
    fn changed_many(&self, paths: Vec<Path>) {
        if paths.is_empty() {
            return;
        }
        let to_call: Vec<Rc<dyn Fn()>> = self
            .inner
            .subs
            .borrow()
            .values()
            .filter(|s| {
                s.mode == NotifyMode::Sync && s.reads.borrow().affected_by_any(paths.iter())
            })
            .map(|s| Rc::clone(&s.callback))
            .collect();
        log::trace!(
            "changed: {} path(s), waking {} sync subscriber(s)",
            paths.len(),
            to_call.len()
        );
        self.inner.pending.borrow_mut().extend(paths);
        for cb in to_call {
            cb();
        }
    }
}

impl std::fmt::Debug for Observable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Observable")
            .field("version", &self.version())
            .field("subscribers", &self.inner.subs.borrow().len())
            .finish()
    }
}

/// Non-owning handle, used by hosts to keep a flush list without keeping
/// unmounted state alive.
#[derive(Clone)]
pub struct WeakObservable {
    inner: Weak<ObsInner>,
}

impl WeakObservable {
    pub fn upgrade(&self) -> Option<Observable> {
        self.inner.upgrade().map(|inner| Observable { inner })
    }
}

/// RAII subscription guard. Dropping it unsubscribes; a dropped source
/// makes it inert.
pub struct Subscription {
    inner: Weak<ObsInner>,
    key: SubKey,
    mode: NotifyMode,
    obs_id: usize,
}

impl Subscription {
    pub fn mode(&self) -> NotifyMode {
        self.mode
    }

    /// True when this subscription belongs to `obs` (same underlying graph).
    pub fn is_for(&self, obs: &Observable) -> bool {
        self.obs_id == obs.id() && self.inner.upgrade().is_some()
    }

    /// Swap in the read set of a fresh snapshot. Called once per render so
    /// the subscription always filters against what the latest pass read.
    pub fn rebind(&self, reads: Rc<RefCell<ReadSet>>) {
        if let Some(inner) = self.inner.upgrade()
            && let Some(sub) = inner.subs.borrow_mut().get_mut(self.key)
        {
            sub.reads = reads;
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(inner) = self.inner.upgrade() {
            inner.subs.borrow_mut().remove(self.key);
        }
    }
}
