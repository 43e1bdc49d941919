//! # Observable value trees
//!
//! `trellis-observe` is the substrate under trellis's state layer: a deeply
//! owned data tree with an explicit track/notify pair instead of ambient
//! proxy interception.
//!
//! - [`Value`] — the object graph: primitives, lists, declaration-ordered
//!   maps, and [`OpaqueRef`] leaves that are carried but never walked.
//! - [`Observable`] — a shared handle wrapping one tree; all mutation goes
//!   through it and produces change notifications.
//! - [`Snapshot`] — a read-only structural copy bound to one render pass;
//!   reads through it record the exact paths touched into a [`ReadSet`].
//! - [`Subscription`] — RAII registration of a callback that fires when a
//!   mutated path overlaps a recorded read path.
//!
//! ## Reading and writing
//!
//! ```
//! use trellis_observe::{Observable, Path, value};
//!
//! let obs = Observable::wrap(value!({ "count": 0, "user": { "name": "ada" } }));
//!
//! obs.set(&Path::key("count"), 1.into()).unwrap();
//! assert_eq!(obs.get(&Path::key("count")).unwrap().as_int(), Some(1));
//!
//! let name = Path::key("user").join_key("name");
//! assert_eq!(obs.get(&name).unwrap().as_str(), Some("ada"));
//! ```
//!
//! ## Tracking
//!
//! A render pass takes a [`Snapshot`], reads through it, and subscribes
//! with the snapshot's read set. Later mutations wake the subscriber only
//! when they overlap something it actually read:
//!
//! ```
//! use std::cell::RefCell;
//! use std::rc::Rc;
//! use trellis_observe::{NotifyMode, Observable, Path, value};
//!
//! let obs = Observable::wrap(value!({ "x": 0, "y": 0 }));
//! let snap = obs.snapshot();
//! snap.touch(&Path::key("x"));
//!
//! let woke = Rc::new(RefCell::new(0));
//! let woke2 = Rc::clone(&woke);
//! let _sub = obs.subscribe(
//!     NotifyMode::Batched,
//!     snap.reads(),
//!     Rc::new(move || *woke2.borrow_mut() += 1),
//! );
//!
//! obs.set(&Path::key("y"), 1.into()).unwrap();
//! obs.flush();
//! assert_eq!(*woke.borrow(), 0); // y was never read
//!
//! obs.set(&Path::key("x"), 1.into()).unwrap();
//! obs.flush();
//! assert_eq!(*woke.borrow(), 1);
//! ```
//!
//! Batched subscribers hear at most once per flush; [`NotifyMode::Sync`]
//! subscribers hear once per mutation, immediately.

pub mod observable;
pub mod path;
pub mod snapshot;
pub mod value;


pub use observable::{
    NotifyMode, ObserveError, Observable, SnapshotOptions, SubKey, Subscription, WeakObservable,
};
pub use path::{Path, Step};
pub use snapshot::{ReadSet, Snapshot};
pub use value::{OpaqueRef, Value, ValueMap, deep_clone, diff_paths};
