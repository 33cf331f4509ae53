//! Fixtures — named, lazily computed, per-execution-memoized dependency
//! values — and the resolver that walks the lexical chain and dependency
//! graph to produce them.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::error::{Result, SpecError};
use crate::node::{NodeId, Tree};

/// A resolved fixture value. Stored type-erased; spec bodies downcast via
/// [`Fixtures::get`].
pub type FixtureValue = Rc<dyn Any>;

/// A fixture factory. Receives the per-execution context plus its own
/// resolved dependencies, and produces the fixture value.
pub type FixtureFactory = dyn Fn(&mut ExecutionContext, &Fixtures) -> FixtureValue;

/// One fixture registration: the factory, its declared dependency names
/// (captured once at registration, never reflected at run time), and where
/// it was declared, for diagnostics.
pub struct FixtureEntry {
    pub(crate) factory: Rc<FixtureFactory>,
    pub(crate) param_names: Vec<String>,
    pub(crate) declared_at: String,
}

/// Names following the private convention (leading underscore) are excluded
/// from dependency resolution and absent from the value map.
pub(crate) fn is_private(name: &str) -> bool {
    name.starts_with('_')
}

// ============================================================================
// Fixtures — the resolved name → value map handed to bodies and factories
// ============================================================================

/// The name → value map produced by resolution for one body or factory.
#[derive(Default)]
pub struct Fixtures {
    values: HashMap<String, FixtureValue>,
}

impl Fixtures {
    pub(crate) fn from_values(values: HashMap<String, FixtureValue>) -> Self {
        Fixtures { values }
    }

    pub fn empty() -> Self {
        Fixtures::default()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Typed access to a resolved fixture.
    ///
    /// Panics if the name is absent or holds a different type; inside a
    /// spec body that classifies the spec as `Error`.
    pub fn get<T: 'static>(&self, name: &str) -> Rc<T> {
        self.try_get(name).unwrap_or_else(|| {
            panic!("spectree: fixture `{name}` is absent or has an unexpected type")
        })
    }

    pub fn try_get<T: 'static>(&self, name: &str) -> Option<Rc<T>> {
        self.values.get(name).and_then(|v| v.clone().downcast::<T>().ok())
    }
}

// The values are type-erased, so only the resolved names are rendered.
impl fmt::Debug for Fixtures {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.values.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("Fixtures").field("names", &names).finish()
    }
}

// ============================================================================
// ExecutionContext — one per spec execution
// ============================================================================

/// Ephemeral state for a single spec execution: the memoization cache, the
/// cycle guard, pending `at_end` cleanups, instance-scoped variables, and
/// the TODO marker. Created immediately before a spec body runs and
/// discarded (after its cleanups drain) immediately after, regardless of
/// outcome.
#[derive(Default)]
pub struct ExecutionContext {
    resolved: HashMap<String, FixtureValue>,
    /// Names currently being resolved, in traversal order. Doubles as the
    /// path rendered into a `LoopedDependency` message.
    resolving: Vec<String>,
    at_end: Vec<Box<dyn FnOnce()>>,
    vars: HashMap<String, FixtureValue>,
    pending: Option<String>,
}

impl ExecutionContext {
    pub fn new() -> Self {
        ExecutionContext::default()
    }

    /// Register a cleanup to run after this spec's `after` hooks. Cleanups
    /// run in reverse registration order, unconditionally.
    pub fn at_end(&mut self, f: impl FnOnce() + 'static) {
        self.at_end.push(Box::new(f));
    }

    /// Mark this spec as expected-to-fail (TODO). A marked spec that then
    /// fails an assertion reports `Todo`; one that does not reports `Fail`
    /// as having passed unexpectedly.
    pub fn mark_todo(&mut self, reason: &str) {
        self.pending = Some(reason.to_string());
    }

    pub fn pending(&self) -> Option<&str> {
        self.pending.as_deref()
    }

    /// Store instance-scoped state visible to later factories/hooks of the
    /// same execution.
    pub fn set_var<T: 'static>(&mut self, name: &str, value: T) {
        self.vars.insert(name.to_string(), Rc::new(value));
    }

    pub fn var<T: 'static>(&self, name: &str) -> Option<Rc<T>> {
        self.vars.get(name).and_then(|v| v.clone().downcast::<T>().ok())
    }

    pub(crate) fn drain_at_end(&mut self) -> Vec<Box<dyn FnOnce()>> {
        let mut cleanups: Vec<_> = self.at_end.drain(..).collect();
        cleanups.reverse();
        cleanups
    }
}

// ============================================================================
// Resolver
// ============================================================================

/// Resolve `requested` fixture names for the node `start` (normally a spec
/// leaf), memoized in `ctx`. Each factory runs at most once per execution,
/// so diamond-shaped graphs share one value. Cycles fail with
/// [`SpecError::LoopedDependency`] before any unbounded recursion.
pub fn resolve(
    tree: &Tree,
    start: NodeId,
    requested: &[String],
    ctx: &mut ExecutionContext,
) -> Result<Fixtures> {
    let mut values = HashMap::new();
    for name in requested {
        if is_private(name) {
            continue;
        }
        let value = resolve_one(tree, start, name, ctx)?;
        values.insert(name.clone(), value);
    }
    Ok(Fixtures::from_values(values))
}

fn resolve_one(
    tree: &Tree,
    start: NodeId,
    name: &str,
    ctx: &mut ExecutionContext,
) -> Result<FixtureValue> {
    if let Some(value) = ctx.resolved.get(name) {
        return Ok(value.clone());
    }
    if ctx.resolving.iter().any(|n| n == name) {
        return Err(SpecError::LoopedDependency {
            path: render_cycle(&ctx.resolving, name),
        });
    }
    let entry = tree.lookup_fixture(start, name).ok_or_else(|| SpecError::FixtureNotFound {
        fixture: name.to_string(),
        requester: tree.node(start).label().to_string(),
    })?;
    let factory = entry.factory.clone();
    let param_names = entry.param_names.clone();

    ctx.resolving.push(name.to_string());
    let deps = resolve(tree, start, &param_names, ctx);
    let value = deps.map(|deps| factory(ctx, &deps));
    ctx.resolving.pop();

    let value = value?;
    ctx.resolved.insert(name.to_string(), value.clone());
    Ok(value)
}

/// Render the traversal path for a loop report. The non-cyclic prefix is
/// joined with `->`, the cycle itself with `=>`, closing on the repeated
/// name: `a->b=>c=>d=>b`.
fn render_cycle(resolving: &[String], repeated: &str) -> String {
    let entry = resolving.iter().position(|n| n == repeated).unwrap_or(0);
    let mut path = String::new();
    if entry > 0 {
        path.push_str(&resolving[..entry].join("->"));
        path.push_str("->");
    }
    path.push_str(&resolving[entry..].join("=>"));
    path.push_str("=>");
    path.push_str(repeated);
    path
}
