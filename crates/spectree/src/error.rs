//! Error taxonomy for tree construction, fixture resolution, and filters.
//!
//! Resolution errors (`FixtureNotFound`, `LoopedDependency`) are caught at
//! the boundary of the spec that triggered them and classify that spec as
//! `Error` — they never abort sibling specs or the overall run.

use thiserror::Error;

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, SpecError>;

#[derive(Debug, Error)]
pub enum SpecError {
    /// A requested fixture has no declaration anywhere in the ancestor
    /// chain of the requesting spec.
    #[error("fixture `{fixture}` not found (requested by `{requester}`)")]
    FixtureNotFound { fixture: String, requester: String },

    /// A fixture dependency graph contains a cycle. The path renders the
    /// full traversal in resolution order, e.g. `a->b=>c=>d=>b`.
    #[error("fixture dependency is looped: {path}")]
    LoopedDependency { path: String },

    /// The same fixture name was registered twice on one node.
    #[error("fixture `{name}` already registered on this node (first declared at {first})")]
    DuplicateFixture { name: String, first: String },

    /// `add_child` was called with a node that already has a parent.
    #[error("node already has a parent")]
    Reparent,

    /// A filter string did not parse.
    #[error("invalid filter `{input}`: {reason}")]
    FilterParse { input: String, reason: String },
}
