//! # A minimal host driver for trellis
//!
//! Real applications sit inside a UI framework that re-executes component
//! functions, provides context, and schedules effects. This crate is the
//! smallest host that honors that contract, used by integration tests and
//! demos: it mounts closure components, renders them, runs the deferred
//! post-commit actions (which is what flips each render pass's tracking
//! flag), and re-renders exactly the components whose tracked reads were
//! invalidated.
//!
//! ```
//! use std::cell::RefCell;
//! use std::rc::Rc;
//! use trellis_core::prelude::*;
//! use trellis_harness::Host;
//!
//! let counter = define_state(value!({ "count": 0 }))
//!     .action("increment", |s| s.set("count", s.int("count") + 1))
//!     .finish();
//! let state = counter.create();
//!
//! let renders = Rc::new(RefCell::new(0));
//! let mut host = Host::new(Runtime::new());
//! let r = Rc::clone(&renders);
//! let s = state.clone();
//! host.mount(move |cx| {
//!     *r.borrow_mut() += 1;
//!     let view = use_passed_state(cx, &s, SnapshotOptions::default());
//!     let _ = view.int("count");
//! });
//!
//! let bump = state.binding("increment");
//! host.dispatch(move || bump());
//! assert_eq!(*renders.borrow(), 2);
//! ```
//!
//! One event turn is `dispatch`: run the event closure, flush batched
//! notifications, then re-render every dirty component at most once. Hosts
//! embedding trellis for real do the same three steps from their own event
//! loop.

use std::cell::RefCell;
use std::rc::Rc;

use slotmap::{SlotMap, new_key_type};
use trellis_core::{Composer, Cx, Runtime, Scope, ScopeStore};


new_key_type! {
    /// Identity of a mounted component.
    pub struct ComponentId;
}

type Component = Rc<dyn Fn(&mut Cx<'_>)>;

struct Mounted {
    body: Component,
    composer: Composer,
    scope: Scope,
    store: ScopeStore,
}

/// Single-threaded component host.
///
/// Each mounted component keeps its own slot storage, scope, and store
/// level (a child of the runtime's root, so anything it registers via
/// providers stays scoped to it). The host owns the dirty list that
/// component invalidation callbacks push into; rendering drains it.
pub struct Host {
    runtime: Runtime,
    mounted: SlotMap<ComponentId, Mounted>,
    dirty: Rc<RefCell<Vec<ComponentId>>>,
}

impl Host {
    pub fn new(runtime: Runtime) -> Self {
        Host {
            runtime,
            mounted: SlotMap::with_key(),
            dirty: Rc::new(RefCell::new(Vec::new())),
        }
    }

    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    pub fn mounted_count(&self) -> usize {
        self.mounted.len()
    }

    /// Mount a component and render it once.
    pub fn mount(&mut self, body: impl Fn(&mut Cx<'_>) + 'static) -> ComponentId {
        let store = self.runtime.root_store().child();
        let id = self.mounted.insert(Mounted {
            body: Rc::new(body),
            composer: Composer::new(),
            scope: Scope::new(),
            store,
        });
        log::debug!("mount: component {id:?}");
        self.render(id);
        id
    }

    /// Tear down a component: its scope's disposers run, its slot storage
    /// (and with it every render subscription) is dropped, and nothing will
    /// re-render it again.
    pub fn unmount(&mut self, id: ComponentId) {
        if let Some(mounted) = self.mounted.remove(id) {
            log::debug!("unmount: component {id:?}");
            mounted.scope.dispose();
        }
        self.dirty.borrow_mut().retain(|d| *d != id);
    }

    /// Re-render every component marked dirty, each at most once. Renders
    /// that dirty further components leave them for the next cycle.
    pub fn update(&mut self) {
        let batch: Vec<ComponentId> = self.dirty.borrow_mut().drain(..).collect();
        for id in batch {
            self.render(id);
        }
    }

    /// Deliver batched notifications, then reconcile. One host frame.
    pub fn settle(&mut self) {
        self.runtime.flush();
        self.update();
    }

    /// One event turn: run the event (typically invoking instance
    /// bindings), then settle.
    pub fn dispatch(&mut self, event: impl FnOnce()) {
        event();
        self.settle();
    }

    fn render(&mut self, id: ComponentId) {
        let Some(mounted) = self.mounted.get_mut(id) else {
            return;
        };
        let body = Rc::clone(&mounted.body);
        let store = mounted.store.clone();
        let scope = mounted.scope.clone();

        let dirty = Rc::clone(&self.dirty);
        let invalidate: Rc<dyn Fn()> = Rc::new(move || {
            let mut dirty = dirty.borrow_mut();
            if !dirty.contains(&id) {
                dirty.push(id);
            }
        });

        let commits = {
            let mut cx = Cx::new(&self.runtime, &mut mounted.composer, store, scope, invalidate);
            body(&mut cx);
            cx.finish()
        };
        // The synchronous render body is over; this is the first
        // post-commit opportunity, where render flags settle.
        for commit in commits {
            commit();
        }
    }
}
