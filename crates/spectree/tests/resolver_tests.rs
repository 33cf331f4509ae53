//! Fixture resolution: lexical lookup, memoization, cycle detection.

use std::cell::Cell;
use std::rc::Rc;

use spectree::{resolve, ExecutionContext, NodeId, Registry, SpecError};

fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

// ============================================================================
// Memoization: a diamond invokes the shared factory exactly once
// ============================================================================

#[test]
fn diamond_dependency_invokes_shared_factory_once() {
    let calls = Rc::new(Cell::new(0u32));
    let counter = calls.clone();

    let mut registry = Registry::new();
    let mut spec_id: Option<NodeId> = None;
    registry.scope("diamond", |s| {
        s.fixture("c", &[], move |_, _| {
            counter.set(counter.get() + 1);
            10i32
        });
        s.fixture("a", &["c"], |_, fx| *fx.get::<i32>("c") + 1);
        s.fixture("b", &["c"], |_, fx| *fx.get::<i32>("c") + 2);
        spec_id = Some(s.spec("uses a and b", &["a", "b"], |_, _| {}));
    });

    let spec_id = spec_id.unwrap();
    let mut ctx = ExecutionContext::new();
    let fx = resolve(registry.tree(), spec_id, &names(&["a", "b"]), &mut ctx).unwrap();

    assert_eq!(*fx.get::<i32>("a"), 11);
    assert_eq!(*fx.get::<i32>("b"), 12);
    assert_eq!(calls.get(), 1, "shared fixture factory must run exactly once");

    // a second request in the same execution hits the cache
    let again = resolve(registry.tree(), spec_id, &names(&["c"]), &mut ctx).unwrap();
    assert_eq!(*again.get::<i32>("c"), 10);
    assert_eq!(calls.get(), 1);
}

// ============================================================================
// Cycle detection: a->b=>c=>d=>b, no stack overflow
// ============================================================================

#[test]
fn dependency_loop_renders_the_full_cycle_path() {
    let mut registry = Registry::new();
    let mut spec_id: Option<NodeId> = None;
    registry.scope("looped", |s| {
        s.fixture("a", &["b"], |_, _| 0i32);
        s.fixture("b", &["c"], |_, _| 0i32);
        s.fixture("c", &["d"], |_, _| 0i32);
        s.fixture("d", &["b"], |_, _| 0i32);
        spec_id = Some(s.spec("resolves a", &["a"], |_, _| {}));
    });

    let mut ctx = ExecutionContext::new();
    let err = resolve(registry.tree(), spec_id.unwrap(), &names(&["a"]), &mut ctx).unwrap_err();

    match &err {
        SpecError::LoopedDependency { path } => {
            assert_eq!(path, "a->b=>c=>d=>b");
        }
        other => panic!("expected LoopedDependency, got {other}"),
    }
}

// ============================================================================
// Not found: names the fixture and the requesting spec
// ============================================================================

#[test]
fn missing_fixture_names_fixture_and_requester() {
    let mut registry = Registry::new();
    let mut spec_id: Option<NodeId> = None;
    registry.scope("missing", |s| {
        spec_id = Some(s.spec("wants y", &["y"], |_, _| {}));
    });

    let mut ctx = ExecutionContext::new();
    let err = resolve(registry.tree(), spec_id.unwrap(), &names(&["y"]), &mut ctx).unwrap_err();

    match &err {
        SpecError::FixtureNotFound { fixture, requester } => {
            assert_eq!(fixture, "y");
            assert_eq!(requester, "wants y");
        }
        other => panic!("expected FixtureNotFound, got {other}"),
    }
}

// ============================================================================
// Shadowing and order-independence
// ============================================================================

#[test]
fn nested_declarations_resolve_in_either_requested_order() {
    let mut registry = Registry::new();
    let mut inner_spec: Option<NodeId> = None;
    registry.scope("shadowing", |s| {
        s.topic("T1", |t1| {
            t1.fixture("x", &[], |_, _| 10i32);
            t1.topic("T2", |t2| {
                t2.fixture("y", &[], |_, _| 20i32);
                inner_spec = Some(t2.spec("wants both", &["x", "y"], |_, _| {}));
            });
        });
    });
    let inner_spec = inner_spec.unwrap();

    for order in [["x", "y"], ["y", "x"]] {
        let mut ctx = ExecutionContext::new();
        let fx = resolve(registry.tree(), inner_spec, &names(&order), &mut ctx).unwrap();
        assert_eq!(*fx.get::<i32>("x"), 10);
        assert_eq!(*fx.get::<i32>("y"), 20);
    }
}

#[test]
fn descendant_declaration_shadows_ancestor() {
    let mut registry = Registry::new();
    let mut inner_spec: Option<NodeId> = None;
    registry.scope("override", |s| {
        s.fixture("x", &[], |_, _| 1i32);
        s.topic("inner", |t| {
            t.fixture("x", &[], |_, _| 2i32);
            inner_spec = Some(t.spec("sees the inner x", &["x"], |_, _| {}));
        });
    });

    let mut ctx = ExecutionContext::new();
    let fx = resolve(registry.tree(), inner_spec.unwrap(), &names(&["x"]), &mut ctx).unwrap();
    assert_eq!(*fx.get::<i32>("x"), 2);
}

// ============================================================================
// Private-convention names are passed as absent
// ============================================================================

#[test]
fn private_params_are_skipped_not_resolved() {
    let mut registry = Registry::new();
    let mut spec_id: Option<NodeId> = None;
    registry.scope("private", |s| {
        // `_scratch` has no declaration anywhere; it must not be looked up.
        s.fixture("conn", &["_scratch"], |_, deps| {
            assert!(!deps.contains("_scratch"));
            7i32
        });
        spec_id = Some(s.spec("wants conn", &["conn", "_local"], |_, _| {}));
    });

    let mut ctx = ExecutionContext::new();
    let fx = resolve(
        registry.tree(),
        spec_id.unwrap(),
        &names(&["conn", "_local"]),
        &mut ctx,
    )
    .unwrap();
    assert_eq!(*fx.get::<i32>("conn"), 7);
    assert!(!fx.contains("_local"));
}

// ============================================================================
// Factories can use the execution context
// ============================================================================

#[test]
fn factories_share_instance_state_and_register_cleanups() {
    let cleaned = Rc::new(Cell::new(false));
    let flag = cleaned.clone();

    let mut registry = Registry::new();
    let mut spec_id: Option<NodeId> = None;
    registry.scope("ctx-state", |s| {
        s.fixture("path", &[], move |ctx, _| {
            ctx.set_var("created", true);
            let flag = flag.clone();
            ctx.at_end(move || flag.set(true));
            "/tmp/spec".to_string()
        });
        spec_id = Some(s.spec("uses path", &["path"], |_, _| {}));
    });

    let mut ctx = ExecutionContext::new();
    let fx = resolve(registry.tree(), spec_id.unwrap(), &names(&["path"]), &mut ctx).unwrap();
    assert_eq!(*fx.get::<String>("path"), "/tmp/spec");
    assert_eq!(ctx.var::<bool>("created").as_deref(), Some(&true));
    assert!(!cleaned.get(), "at_end runs at spec teardown, not resolution");
}
