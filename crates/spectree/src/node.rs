//! Node tree — scope/topic/spec nodes built once before any execution.
//!
//! The tree is an arena: nodes live in a `Vec` and refer to each other by
//! [`NodeId`]. Children are owned (ordered, registration order preserved);
//! `parent` is a non-owning back-reference used only for upward lookup, so
//! there are no ownership cycles to manage.

use std::collections::HashMap;

use crate::error::{Result, SpecError};
use crate::fixture::{ExecutionContext, FixtureEntry, Fixtures};

/// Index of a node in its [`Tree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub(crate) usize);

/// A lifecycle hook body.
pub type HookFn = Box<dyn Fn()>;

/// A spec body. Receives the per-execution context and the resolved
/// fixture values it asked for.
pub type SpecBody = Box<dyn Fn(&mut ExecutionContext, &Fixtures)>;

/// The hook slots a node can carry. Last registration per kind wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookKind {
    Before,
    After,
    BeforeAll,
    AfterAll,
}

#[derive(Default)]
pub(crate) struct Hooks {
    pub(crate) before: Option<HookFn>,
    pub(crate) after: Option<HookFn>,
    pub(crate) before_all: Option<HookFn>,
    pub(crate) after_all: Option<HookFn>,
}

// ============================================================================
// Node
// ============================================================================

/// What a node is: a closed set of kinds, matched over by the runner's
/// single recursive traversal.
pub enum NodeKind {
    /// Root-like container for one declaration unit. Never filter-matched.
    Scope { name: String },
    /// A grouping node that may contain topics and specs.
    Topic { target: String },
    /// A leaf holding one executable test case. `params` is the ordered
    /// list of fixture names the body asked for, captured explicitly at
    /// registration time.
    Spec {
        description: String,
        params: Vec<String>,
        body: SpecBody,
    },
}

/// One node of the tree: its kind plus the registrations shared by all
/// kinds (tags, fixtures, hooks).
pub struct Node {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    tags: Vec<String>,
    fixtures: HashMap<String, FixtureEntry>,
    hooks: Hooks,
}

impl Node {
    fn new(kind: NodeKind) -> Self {
        Node {
            kind,
            parent: None,
            children: Vec::new(),
            tags: Vec::new(),
            fixtures: HashMap::new(),
            hooks: Hooks::default(),
        }
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    /// Display label: scope name, topic target, or spec description.
    pub fn label(&self) -> &str {
        match &self.kind {
            NodeKind::Scope { name } => name,
            NodeKind::Topic { target } => target,
            NodeKind::Spec { description, .. } => description,
        }
    }

    pub fn is_spec(&self) -> bool {
        matches!(self.kind, NodeKind::Spec { .. })
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    pub(crate) fn hooks(&self) -> &Hooks {
        &self.hooks
    }

    pub(crate) fn fixture(&self, name: &str) -> Option<&FixtureEntry> {
        self.fixtures.get(name)
    }
}

// ============================================================================
// Tree
// ============================================================================

/// Arena of nodes. Built during the declaration phase, then treated as
/// immutable once the runner starts walking it.
#[derive(Default)]
pub struct Tree {
    nodes: Vec<Node>,
}

impl Tree {
    pub fn new() -> Self {
        Tree::default()
    }

    /// Create a detached node and return its id.
    pub fn push(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node::new(kind));
        id
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    /// Attach `child` under `parent`, preserving registration order.
    /// Fails if the child already has a parent.
    pub fn add_child(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        if self.nodes[child.0].parent.is_some() {
            return Err(SpecError::Reparent);
        }
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
        Ok(())
    }

    /// Register a named fixture on `id`. The name must be unique within
    /// this node; ancestors and descendants may reuse it (shadowing).
    pub fn register_fixture(&mut self, id: NodeId, name: &str, entry: FixtureEntry) -> Result<()> {
        let fixtures = &mut self.nodes[id.0].fixtures;
        if let Some(existing) = fixtures.get(name) {
            return Err(SpecError::DuplicateFixture {
                name: name.to_string(),
                first: existing.declared_at.clone(),
            });
        }
        fixtures.insert(name.to_string(), entry);
        Ok(())
    }

    /// Register a hook on `id`. The last registration per kind wins.
    pub fn register_hook(&mut self, id: NodeId, kind: HookKind, hook: HookFn) {
        let hooks = &mut self.nodes[id.0].hooks;
        match kind {
            HookKind::Before => hooks.before = Some(hook),
            HookKind::After => hooks.after = Some(hook),
            HookKind::BeforeAll => hooks.before_all = Some(hook),
            HookKind::AfterAll => hooks.after_all = Some(hook),
        }
    }

    /// Append a tag to `id`.
    pub fn add_tag(&mut self, id: NodeId, tag: &str) {
        self.nodes[id.0].tags.push(tag.to_string());
    }

    /// Lexical fixture lookup: this node, then parent, then grandparent,
    /// up to the root. First match wins, so a descendant declaration
    /// shadows an ancestor's.
    pub fn lookup_fixture(&self, start: NodeId, name: &str) -> Option<&FixtureEntry> {
        let mut cursor = Some(start);
        while let Some(id) = cursor {
            let node = &self.nodes[id.0];
            if let Some(entry) = node.fixture(name) {
                return Some(entry);
            }
            cursor = node.parent;
        }
        None
    }

    /// Ancestor chain of `id`, root first, ending with `id` itself.
    pub fn path_to_root(&self, id: NodeId) -> Vec<NodeId> {
        let mut path = vec![id];
        let mut cursor = self.nodes[id.0].parent;
        while let Some(parent) = cursor {
            path.push(parent);
            cursor = self.nodes[parent.0].parent;
        }
        path.reverse();
        path
    }

    /// Invoke `body` on the spec node `id`. Panics if `id` is not a spec.
    pub(crate) fn run_spec_body(&self, id: NodeId, ctx: &mut ExecutionContext, fixtures: &Fixtures) {
        match &self.nodes[id.0].kind {
            NodeKind::Spec { body, .. } => body(ctx, fixtures),
            _ => panic!("spectree: run_spec_body called on a non-spec node"),
        }
    }
}
