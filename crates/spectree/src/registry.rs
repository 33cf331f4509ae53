//! Declaration API — an explicit registry of top-level scopes plus the
//! closure-based builder for topics, specs, fixtures, hooks, and tags.
//!
//! The registry is a plain value rather than process-wide mutable state:
//! create it, declare into it, pass it to the run phase, then clear or drop
//! it explicitly.

use std::panic::Location;
use std::rc::Rc;

use crate::filter::Filter;
use crate::fixture::{ExecutionContext, FixtureEntry, Fixtures, FixtureValue};
use crate::node::{HookKind, NodeId, NodeKind, Tree};
use crate::report::Reporter;
use crate::runner::{RunResult, Runner};

/// Owns the node tree and the list of root scopes, in declaration order.
///
/// # Example
/// ```rust,no_run
/// use spectree::{Registry, NullReporter};
///
/// let mut registry = Registry::new();
/// registry.scope("calculator_specs", |s| {
///     s.topic("Calculator", |t| {
///         t.fixture("sum", &[], |_, _| 2 + 3);
///         t.spec("adds two numbers", &["sum"], |_, fx| {
///             assert_eq!(*fx.get::<i32>("sum"), 5);
///         });
///     });
/// });
/// let result = registry.run(&mut NullReporter);
/// assert!(result.is_success());
/// ```
#[derive(Default)]
pub struct Registry {
    tree: Tree,
    scopes: Vec<NodeId>,
}

impl Registry {
    pub fn new() -> Self {
        Registry::default()
    }

    /// Open one declaration unit (a source file or an explicit group) and
    /// declare into it.
    pub fn scope(&mut self, name: &str, body: impl FnOnce(&mut Ctx)) -> NodeId {
        let id = self.tree.push(NodeKind::Scope { name: name.to_string() });
        self.scopes.push(id);
        let mut ctx = Ctx { tree: &mut self.tree, current: id };
        body(&mut ctx);
        id
    }

    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    pub fn scopes(&self) -> &[NodeId] {
        &self.scopes
    }

    /// Run every scope in declaration order.
    pub fn run(&self, reporter: &mut dyn Reporter) -> RunResult {
        Runner::new(&self.tree).run(&self.scopes, reporter)
    }

    /// Run only the subset the filter selects.
    pub fn run_filtered(&self, filter: Filter, reporter: &mut dyn Reporter) -> RunResult {
        Runner::new(&self.tree)
            .with_filter(filter)
            .run(&self.scopes, reporter)
    }

    /// Drop every declaration. Reuse after a run is explicit, never implied.
    pub fn clear(&mut self) {
        self.tree = Tree::new();
        self.scopes.clear();
    }
}

// ============================================================================
// Ctx — the builder handle passed into declaration closures
// ============================================================================

/// Registers declarations onto the currently-open node. Build-time misuse
/// (duplicate fixture names, re-parenting) panics with a `spectree:`
/// message; everything else is a plain registration.
pub struct Ctx<'t> {
    tree: &'t mut Tree,
    current: NodeId,
}

impl Ctx<'_> {
    // ---- Grouping ------------------------------------------------------------

    pub fn topic(&mut self, target: &str, body: impl FnOnce(&mut Ctx)) -> NodeId {
        self.topic_tagged(target, &[], body)
    }

    pub fn topic_tagged(
        &mut self,
        target: &str,
        tags: &[&str],
        body: impl FnOnce(&mut Ctx),
    ) -> NodeId {
        let id = self.tree.push(NodeKind::Topic { target: target.to_string() });
        self.attach(id);
        for tag in tags {
            self.tree.add_tag(id, tag);
        }
        let mut ctx = Ctx { tree: &mut *self.tree, current: id };
        body(&mut ctx);
        id
    }

    // ---- Specs ---------------------------------------------------------------

    /// Declare a spec. `params` is the ordered list of fixture names the
    /// body wants; the resolved values arrive in its `Fixtures` argument.
    pub fn spec(
        &mut self,
        description: &str,
        params: &[&str],
        body: impl Fn(&mut ExecutionContext, &Fixtures) + 'static,
    ) -> NodeId {
        self.spec_tagged(description, &[], params, body)
    }

    pub fn spec_tagged(
        &mut self,
        description: &str,
        tags: &[&str],
        params: &[&str],
        body: impl Fn(&mut ExecutionContext, &Fixtures) + 'static,
    ) -> NodeId {
        let id = self.tree.push(NodeKind::Spec {
            description: description.to_string(),
            params: params.iter().map(|p| p.to_string()).collect(),
            body: Box::new(body),
        });
        self.attach(id);
        for tag in tags {
            self.tree.add_tag(id, tag);
        }
        id
    }

    // ---- Fixtures ------------------------------------------------------------

    /// Register a named fixture on the current node. `params` are the
    /// factory's own dependency names, captured here once — resolution
    /// consumes only this list. Registering the same name twice on one
    /// node panics (a build-time error).
    #[track_caller]
    pub fn fixture<T: 'static>(
        &mut self,
        name: &str,
        params: &[&str],
        factory: impl Fn(&mut ExecutionContext, &Fixtures) -> T + 'static,
    ) {
        let location = Location::caller();
        let entry = FixtureEntry {
            factory: Rc::new(move |ctx: &mut ExecutionContext, deps: &Fixtures| {
                Rc::new(factory(ctx, deps)) as FixtureValue
            }),
            param_names: params.iter().map(|p| p.to_string()).collect(),
            declared_at: format!("{}:{}", location.file(), location.line()),
        };
        if let Err(e) = self.tree.register_fixture(self.current, name, entry) {
            panic!("spectree: {e}");
        }
    }

    // ---- Tags and hooks ------------------------------------------------------

    /// Append a tag to the current node.
    pub fn tag(&mut self, tag: &str) {
        self.tree.add_tag(self.current, tag);
    }

    pub fn before(&mut self, hook: impl Fn() + 'static) {
        self.hook(HookKind::Before, hook);
    }

    pub fn after(&mut self, hook: impl Fn() + 'static) {
        self.hook(HookKind::After, hook);
    }

    pub fn before_all(&mut self, hook: impl Fn() + 'static) {
        self.hook(HookKind::BeforeAll, hook);
    }

    pub fn after_all(&mut self, hook: impl Fn() + 'static) {
        self.hook(HookKind::AfterAll, hook);
    }

    fn hook(&mut self, kind: HookKind, hook: impl Fn() + 'static) {
        self.tree.register_hook(self.current, kind, Box::new(hook));
    }

    fn attach(&mut self, id: NodeId) {
        if let Err(e) = self.tree.add_child(self.current, id) {
            panic!("spectree: {e}");
        }
    }
}
