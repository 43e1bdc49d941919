#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use trellis_observe::{Path, SnapshotOptions, Step, Value, value};

    use crate::define::{define_state, define_state_with};
    use crate::error::StateError;
    use crate::hooks::inject_hooks;
    use crate::runtime::{Composer, Cx, Runtime};
    use crate::scope::Scope;
    use crate::state::StateHandle;
    use crate::store::ScopeStore;
    use crate::view::{use_local_state, use_passed_state, use_provided_state};

    fn noop() -> Rc<dyn Fn()> {
        Rc::new(|| {})
    }

    #[test]
    fn test_instances_never_alias_nested_data() {
        let def = define_state(value!({ "profile": { "name": "ada", "tags": ["x"] } })).finish();
        let a = def.create();
        let b = def.create();

        let name = Path::key("profile").join_key("name");
        a.set_at(&name, "grace");

        assert_eq!(a.get_at(&name).unwrap().as_str(), Some("grace"));
        assert_eq!(b.get_at(&name).unwrap().as_str(), Some("ada"));
    }

    #[test]
    fn test_factory_runs_fresh_per_instance() {
        let calls = Rc::new(RefCell::new(0usize));
        let calls2 = Rc::clone(&calls);
        let def = define_state_with(move || {
            *calls2.borrow_mut() += 1;
            value!({ "n": 0 })
        })
        .finish();

        let _a = def.create();
        let _b = def.create();
        assert_eq!(*calls.borrow(), 2);
    }

    #[test]
    fn test_initializer_overrides_before_observation() {
        let def = define_state(value!({ "n": 0, "label": "default" })).finish();
        let state = def.create_with(|data| {
            if let Value::Map(m) = data {
                m.insert("n".into(), Value::Int(9));
            }
        });

        assert_eq!(state.int("n"), 9);
        assert_eq!(state.str_("label"), "default");
        // The override ran before wrapping, so nothing ever saw a mutation.
        assert_eq!(state.observable().version(), 0);
    }

    #[test]
    fn test_methods_take_args_and_return_values() {
        let def = define_state(value!({ "count": 0, "step": 1 }))
            .named("counter")
            .action("increment", |s| s.set("count", s.int("count") + s.int("step")))
            .method("add", |s, args| {
                let n = args[0].as_int().unwrap_or(0);
                s.set("count", s.int("count") + n);
                s.int("count").into()
            })
            .finish();
        let state = def.create();

        state.call("increment", &[]);
        assert_eq!(state.int("count"), 1);
        assert_eq!(state.call("add", &[10.into()]).as_int(), Some(11));

        let err = state.try_call("missing", &[]).unwrap_err();
        assert!(matches!(err, StateError::UnknownMethod { .. }));
    }

    #[test]
    fn test_binding_keeps_its_receiver() {
        let def = define_state(value!({ "count": 0 }))
            .action("increment", |s| s.set("count", s.int("count") + 1))
            .finish();
        let state = def.create();

        // Hand the bound reference around like an event callback.
        let on_click = state.binding("increment");
        let handler: Box<dyn Fn()> = Box::new(move || on_click());
        handler();
        handler();

        assert_eq!(state.int("count"), 2);
    }

    #[test]
    fn test_enumeration_yields_only_declared_fields() {
        let def = define_state(value!({ "a": 1, "b": 2, "c": 3 }))
            .action("bump", |s| s.set("a", s.int("a") + 1))
            .hook("derived", |_cx, _s| Value::Unit)
            .finish();
        let state = def.create();

        let keys: Vec<String> = state.entries().into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["a", "b", "c"]);

        let sum: i64 = state.entries().iter().filter_map(|(_, v)| v.as_int()).sum();
        assert_eq!(sum, 6);
    }

    #[test]
    fn test_hook_result_before_injection_is_fatal() {
        let def = define_state(value!({ "base": 2 }))
            .hook("doubled", |_cx, s| (s.int("base") * 2).into())
            .finish();
        let state = def.create();

        let err = state.try_hook_result("doubled").unwrap_err();
        assert!(matches!(err, StateError::HookNotInjected(_)));
        assert!(err.to_string().contains("has not been injected"));

        let err = state.try_hook_result("missing").unwrap_err();
        assert!(matches!(err, StateError::UnknownHook { .. }));
    }

    #[test]
    fn test_injected_hook_results_cache_per_pass() {
        let def = define_state(value!({ "base": 2 }))
            .hook("doubled", |_cx, s| (s.int("base") * 2).into())
            .method("describe", |s, _| {
                format!("doubled is {}", s.hook_result("doubled").as_int().unwrap()).into()
            })
            .finish();
        let state = def.create();

        let runtime = Runtime::new();
        let mut composer = Composer::new();
        let mut cx = Cx::new(
            &runtime,
            &mut composer,
            runtime.root_store().clone(),
            Scope::new(),
            noop(),
        );

        inject_hooks(&mut cx, &state);
        assert_eq!(state.hook_result("doubled").as_int(), Some(4));
        // Plain methods read the cache without needing the host.
        assert_eq!(state.call("describe", &[]).as_str(), Some("doubled is 4"));

        // Stale until the next pass re-injects.
        state.set("base", 5);
        assert_eq!(state.hook_result("doubled").as_int(), Some(4));
        inject_hooks(&mut cx, &state);
        assert_eq!(state.hook_result("doubled").as_int(), Some(10));
    }

    #[test]
    fn test_overridden_hook_bypasses_injection() {
        let def = define_state(value!({ "base": 2 }))
            .hook("doubled", |_cx, s| (s.int("base") * 2).into())
            .finish();
        let state = def.create();

        state.override_hook("doubled", |_s| Value::Int(99));
        assert_eq!(state.hook_result("doubled").as_int(), Some(99));

        let runtime = Runtime::new();
        let mut composer = Composer::new();
        let mut cx = Cx::new(
            &runtime,
            &mut composer,
            runtime.root_store().clone(),
            Scope::new(),
            noop(),
        );
        inject_hooks(&mut cx, &state);
        assert_eq!(state.hook_result("doubled").as_int(), Some(99));
    }

    #[test]
    fn test_nearest_scope_wins_and_siblings_are_isolated() {
        let def = define_state(value!({ "n": 0 })).named("scoped").finish();
        let root = ScopeStore::new_root();
        let s2 = root.child();
        let s3 = s2.child();
        let sibling = root.child();

        let shared = def.create();
        s2.set_state(&shared);

        assert!(s3.get_state(&def).ptr_eq(&shared));
        assert!(sibling.lookup(&def).is_none());

        let inner = def.create();
        s3.set_state(&inner);
        assert!(s3.get_state(&def).ptr_eq(&inner));
        assert!(s2.get_state(&def).ptr_eq(&shared));
    }

    #[test]
    fn test_missing_provider_falls_back_to_root_singleton() {
        let def = define_state(value!({ "n": 0 })).finish();
        let root = ScopeStore::new_root();
        let deep = root.child().child();
        let elsewhere = root.child();

        let first = deep.get_state(&def);
        assert!(root.lookup(&def).is_some());
        assert!(elsewhere.get_state(&def).ptr_eq(&first));
    }

    #[test]
    fn test_runtimes_have_isolated_roots() {
        let def = define_state(value!({ "n": 0 })).finish();
        let r1 = Runtime::new();
        let r2 = Runtime::new();

        let a = r1.get_state(&def);
        a.set("n", 5);
        let b = r2.get_state(&def);

        assert!(!a.ptr_eq(&b));
        assert_eq!(b.int("n"), 0);
    }

    #[test]
    fn test_remember_persists_across_passes() {
        let runtime = Runtime::new();
        let mut composer = Composer::new();
        let mut kept: Option<Rc<RefCell<i32>>> = None;

        for pass in 0..2 {
            let mut cx = Cx::new(
                &runtime,
                &mut composer,
                runtime.root_store().clone(),
                Scope::new(),
                noop(),
            );
            let slot = cx.remember(|| RefCell::new(0));
            *slot.borrow_mut() += 1;
            if pass == 0 {
                kept = Some(Rc::clone(&slot));
            }
            let _ = cx.finish();
        }

        assert_eq!(*kept.unwrap().borrow(), 2);
    }

    #[test]
    fn test_remember_with_key_survives_conditional_composition() {
        let runtime = Runtime::new();
        let mut composer = Composer::new();
        let mut kept: Option<Rc<RefCell<i32>>> = None;

        for pass in 0..2 {
            let mut cx = Cx::new(
                &runtime,
                &mut composer,
                runtime.root_store().clone(),
                Scope::new(),
                noop(),
            );
            // A branch that only composes on the second pass shifts every
            // positional slot; the keyed one must not care.
            if pass == 1 {
                let _ = cx.remember(|| 0i32);
            }
            let slot = cx.remember_with_key("stable", || RefCell::new(0));
            *slot.borrow_mut() += 1;
            if pass == 0 {
                kept = Some(Rc::clone(&slot));
            }
            let _ = cx.finish();
        }

        assert_eq!(*kept.unwrap().borrow(), 2);
    }

    #[test]
    fn test_provide_reuses_level_across_rerenders() {
        let def = define_state(value!({ "dark": false })).named("theme").finish();
        let runtime = Runtime::new();
        let mut composer = Composer::new();
        let mut seen: Vec<StateHandle> = Vec::new();

        for _ in 0..2 {
            let mut cx = Cx::new(
                &runtime,
                &mut composer,
                runtime.root_store().clone(),
                Scope::new(),
                noop(),
            );
            cx.provide(&def, None, |cx| {
                seen.push(cx.store().get_state(&def));
            });
            let _ = cx.finish();
        }

        assert!(seen[0].ptr_eq(&seen[1]));
        // The provided instance is scoped to the level, not the root.
        assert!(runtime.root_store().lookup(&def).is_none());
    }

    #[test]
    fn test_provide_shares_an_explicit_instance() {
        let def = define_state(value!({ "n": 0 })).finish();
        let runtime = Runtime::new();
        let mut composer = Composer::new();

        let mine = def.create();
        mine.set("n", 7);

        let mut cx = Cx::new(
            &runtime,
            &mut composer,
            runtime.root_store().clone(),
            Scope::new(),
            noop(),
        );
        let def2 = def.clone();
        let mine2 = mine.clone();
        cx.provide(&def, Some(mine.clone()), move |cx| {
            let resolved = cx.store().get_state(&def2);
            assert!(resolved.ptr_eq(&mine2));
            assert_eq!(resolved.int("n"), 7);
        });
    }

    #[test]
    fn test_view_reads_snapshot_while_rendering_and_live_after_commit() {
        let def = define_state(value!({ "n": 0 })).finish();
        let runtime = Runtime::new();
        let mut composer = Composer::new();
        let mut cx = Cx::new(
            &runtime,
            &mut composer,
            runtime.root_store().clone(),
            Scope::new(),
            noop(),
        );

        let view = use_local_state(&mut cx, &def, SnapshotOptions::default());
        assert!(view.is_rendering());

        // Mutating mid-render leaves the pass's snapshot stale.
        view.live().set("n", 1);
        assert_eq!(view.int("n"), 0);

        for commit in cx.finish() {
            commit();
        }

        assert!(!view.is_rendering());
        assert_eq!(view.int("n"), 1);
    }

    #[test]
    fn test_view_tracks_nested_reads_recursively() {
        let def = define_state(value!({ "user": { "name": "ada" }, "other": 0 })).finish();
        let runtime = Runtime::new();
        let mut composer = Composer::new();

        let hits = Rc::new(RefCell::new(0usize));
        let hits2 = Rc::clone(&hits);
        let mut cx = Cx::new(
            &runtime,
            &mut composer,
            runtime.root_store().clone(),
            Scope::new(),
            Rc::new(move || *hits2.borrow_mut() += 1),
        );

        let view = use_local_state(&mut cx, &def, SnapshotOptions::SYNC);
        assert_eq!(view.child("user").str_("name"), "ada");
        let live = view.live().clone();
        for commit in cx.finish() {
            commit();
        }

        live.set("other", 1);
        assert_eq!(*hits.borrow(), 0);

        live.set_at(&Path::key("user").join_key("name"), "grace");
        assert_eq!(*hits.borrow(), 1);

        // Replacing the whole ancestor also invalidates the leaf reader.
        live.set("user", value!({ "name": "lin" }));
        assert_eq!(*hits.borrow(), 2);
    }

    #[test]
    fn test_sync_view_invalidates_only_on_read_fields() {
        let def = define_state(value!({ "x": 0, "y": 0 })).finish();
        let runtime = Runtime::new();
        let mut composer = Composer::new();

        let hits = Rc::new(RefCell::new(0usize));
        let hits2 = Rc::clone(&hits);
        let mut cx = Cx::new(
            &runtime,
            &mut composer,
            runtime.root_store().clone(),
            Scope::new(),
            Rc::new(move || *hits2.borrow_mut() += 1),
        );

        let view = use_local_state(&mut cx, &def, SnapshotOptions::SYNC);
        let _ = view.int("x");
        let live = view.live().clone();
        for commit in cx.finish() {
            commit();
        }

        live.set("y", 5);
        assert_eq!(*hits.borrow(), 0);
        live.set("x", 5);
        assert_eq!(*hits.borrow(), 1);
    }

    #[test]
    fn test_batched_view_waits_for_flush() {
        let def = define_state(value!({ "n": 0 })).finish();
        let runtime = Runtime::new();
        let mut composer = Composer::new();

        let hits = Rc::new(RefCell::new(0usize));
        let hits2 = Rc::clone(&hits);
        let mut cx = Cx::new(
            &runtime,
            &mut composer,
            runtime.root_store().clone(),
            Scope::new(),
            Rc::new(move || *hits2.borrow_mut() += 1),
        );

        let view = use_local_state(&mut cx, &def, SnapshotOptions::default());
        let _ = view.int("n");
        let live = view.live().clone();
        for commit in cx.finish() {
            commit();
        }

        live.set("n", 1);
        live.set("n", 2);
        assert_eq!(*hits.borrow(), 0);
        runtime.flush();
        assert_eq!(*hits.borrow(), 1);
    }

    #[test]
    fn test_update_at_notifies_exact_nested_paths() {
        let def = define_state(value!({
            "todos": [{ "done": false }, { "done": false }],
        }))
        .finish();
        let state = def.create();

        let runtime = Runtime::new();
        let mut composer = Composer::new();
        let hits = Rc::new(RefCell::new(0usize));
        let hits2 = Rc::clone(&hits);
        let mut cx = Cx::new(
            &runtime,
            &mut composer,
            runtime.root_store().clone(),
            Scope::new(),
            Rc::new(move || *hits2.borrow_mut() += 1),
        );

        let view = use_passed_state(&mut cx, &state, SnapshotOptions::SYNC);
        // Only the first todo's flag is a dependency.
        assert!(!view.child("todos").at_index(0).bool_("done"));
        for commit in cx.finish() {
            commit();
        }

        let mark = |i: usize| {
            move |todos: &mut Value| {
                if let Some(Value::Map(m)) = todos.step_mut(&Step::Index(i)) {
                    m.insert("done".into(), Value::Bool(true));
                }
            }
        };

        state.update_at(&Path::key("todos"), mark(1));
        assert_eq!(*hits.borrow(), 0);

        state.update_at(&Path::key("todos"), mark(0));
        assert_eq!(*hits.borrow(), 1);
    }

    #[test]
    fn test_local_state_survives_rerenders_of_the_same_definition() {
        let def = define_state(value!({ "count": 0 })).finish();
        let runtime = Runtime::new();
        let mut composer = Composer::new();
        let mut instances: Vec<StateHandle> = Vec::new();

        for _ in 0..2 {
            let mut cx = Cx::new(
                &runtime,
                &mut composer,
                runtime.root_store().clone(),
                Scope::new(),
                noop(),
            );
            let view = use_local_state(&mut cx, &def, SnapshotOptions::default());
            instances.push(view.live().clone());
            for commit in cx.finish() {
                commit();
            }
        }

        assert!(instances[0].ptr_eq(&instances[1]));
    }

    #[test]
    fn test_provided_and_passed_state_share_the_instance() {
        let def = define_state(value!({ "n": 0 }))
            .action("bump", |s| s.set("n", s.int("n") + 1))
            .finish();
        let runtime = Runtime::new();
        let mut composer = Composer::new();
        let mut cx = Cx::new(
            &runtime,
            &mut composer,
            runtime.root_store().clone(),
            Scope::new(),
            noop(),
        );

        let owner = use_provided_state(&mut cx, &def, SnapshotOptions::default());
        let handle = owner.live().clone();
        let passed = use_passed_state(&mut cx, &handle, SnapshotOptions::default());
        for commit in cx.finish() {
            commit();
        }

        passed.call("bump", &[]);
        assert_eq!(owner.int("n"), 1);
        assert!(runtime.root_store().lookup(&def).is_some());
    }

    #[test]
    fn test_scope_dispose_runs_children_first() {
        let order = Rc::new(RefCell::new(Vec::new()));
        let scope = Scope::new();
        let child = scope.child();

        let o = Rc::clone(&order);
        child.add_disposer(move || o.borrow_mut().push("child"));
        let o = Rc::clone(&order);
        scope.add_disposer(move || o.borrow_mut().push("parent"));

        scope.dispose();
        assert_eq!(*order.borrow(), vec!["child", "parent"]);
    }
}
