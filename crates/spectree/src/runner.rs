//! Depth-first runner — composes hooks, drives the fixture resolver,
//! classifies each spec into a terminal outcome, and notifies the
//! [`Reporter`] collaborator in strict tree order.
//!
//! Execution is single-threaded and synchronous by design: fixture
//! factories and `at_end` cleanups may perform ordered side effects, and
//! the hook ordering guarantees would not survive concurrent execution.

use std::any::Any;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};

use tracing::{debug, error, trace};

use crate::error::SpecError;
use crate::filter::Filter;
use crate::fixture::{self, ExecutionContext};
use crate::node::{NodeId, NodeKind, Tree};
use crate::report::Reporter;
use crate::{AssertionFailure, SkipSignal};

// ============================================================================
// Outcomes
// ============================================================================

/// Terminal, mutually exclusive per-spec states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    Pass,
    Fail,
    Error,
    Skip,
    Todo,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Status::Pass => "PASS",
            Status::Fail => "FAIL",
            Status::Error => "ERROR",
            Status::Skip => "SKIP",
            Status::Todo => "TODO",
        };
        f.write_str(s)
    }
}

/// A classified spec result: the status plus, for anything but `Pass`, the
/// captured message or reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecOutcome {
    pub status: Status,
    pub message: Option<String>,
}

impl SpecOutcome {
    pub fn pass() -> Self {
        SpecOutcome { status: Status::Pass, message: None }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        SpecOutcome { status: Status::Fail, message: Some(message.into()) }
    }

    pub fn error(message: impl Into<String>) -> Self {
        SpecOutcome { status: Status::Error, message: Some(message.into()) }
    }

    pub fn skip(reason: impl Into<String>) -> Self {
        SpecOutcome { status: Status::Skip, message: Some(reason.into()) }
    }

    pub fn todo(reason: impl Into<String>) -> Self {
        SpecOutcome { status: Status::Todo, message: Some(reason.into()) }
    }
}

/// Per-status tally across a whole (possibly filtered) run. A filter
/// matching nothing yields the all-zero tally, never an error.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunResult {
    pub pass: usize,
    pub fail: usize,
    pub error: usize,
    pub skip: usize,
    pub todo: usize,
}

impl RunResult {
    pub(crate) fn record(&mut self, status: Status) {
        match status {
            Status::Pass => self.pass += 1,
            Status::Fail => self.fail += 1,
            Status::Error => self.error += 1,
            Status::Skip => self.skip += 1,
            Status::Todo => self.todo += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.pass + self.fail + self.error + self.skip + self.todo
    }

    pub fn is_success(&self) -> bool {
        self.fail == 0 && self.error == 0
    }
}

// ============================================================================
// Runner
// ============================================================================

/// Walks a tree depth-first, executing the specs the filter selects.
pub struct Runner<'t> {
    tree: &'t Tree,
    filter: Option<Filter>,
}

impl<'t> Runner<'t> {
    pub fn new(tree: &'t Tree) -> Self {
        Runner { tree, filter: None }
    }

    /// Restrict the run to the subset the filter selects.
    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Run the given root scopes in order and return the tally.
    pub fn run(&self, roots: &[NodeId], reporter: &mut dyn Reporter) -> RunResult {
        let mut result = RunResult::default();
        for &root in roots {
            self.visit(root, None, reporter, &mut result);
        }
        result
    }

    // ---- Traversal -----------------------------------------------------------

    /// `poison` carries the message of a failed ancestor `before_all`: the
    /// subtree's bodies do not run, and every selected spec below reports
    /// `Error` with that message.
    fn visit(
        &self,
        id: NodeId,
        poison: Option<&str>,
        reporter: &mut dyn Reporter,
        result: &mut RunResult,
    ) {
        let node = self.tree.node(id);
        let is_scope = match node.kind() {
            NodeKind::Spec { .. } => {
                if self.spec_selected(id) {
                    self.execute_spec(id, poison, reporter, result);
                }
                return;
            }
            NodeKind::Scope { .. } => true,
            NodeKind::Topic { .. } => false,
        };

        if !self.container_entered(id) {
            return;
        }

        let label = node.label();
        trace!(node = %label, "enter");
        if is_scope {
            reporter.enter_scope(label);
        } else {
            reporter.enter_topic(label);
        }

        let own_poison = if poison.is_none() { self.fire_before_all(id) } else { None };
        let effective = poison.or(own_poison.as_deref());

        for &child in node.children() {
            self.visit(child, effective, reporter, result);
        }

        // after_all pairs with this node's own before_all attempt; it is
        // guaranteed cleanup even when before_all or the subtree failed.
        if poison.is_none() {
            self.fire_after_all(id);
        }

        if is_scope {
            reporter.exit_scope(label);
        } else {
            reporter.exit_topic(label);
        }
        trace!(node = %label, "exit");
    }

    /// A spec is selected iff the filter matches the spec itself or any
    /// ancestor topic (topic/tag patterns select whole subtrees). Absence
    /// of a filter selects everything.
    fn spec_selected(&self, id: NodeId) -> bool {
        let Some(filter) = &self.filter else { return true };
        let hit = self
            .tree
            .path_to_root(id)
            .iter()
            .any(|&n| filter.matches_positive(self.tree.node(n)));
        hit != filter.negative()
    }

    /// A container is entered iff it directly matches the filter or at
    /// least one descendant spec is selected. The direct-match arm only
    /// applies to positive filters: under a negative filter a positively
    /// matching container is excluded, a non-matching one is merely not
    /// excluded, and neither warrants entering (and firing hooks for) a
    /// subtree with no selected specs.
    fn container_entered(&self, id: NodeId) -> bool {
        let Some(filter) = &self.filter else { return true };
        if !filter.negative() && filter.matches_positive(self.tree.node(id)) {
            return true;
        }
        self.any_spec_selected_below(id)
    }

    fn any_spec_selected_below(&self, id: NodeId) -> bool {
        self.tree.node(id).children().iter().any(|&child| {
            if self.tree.node(child).is_spec() {
                self.spec_selected(child)
            } else {
                self.any_spec_selected_below(child)
            }
        })
    }

    // ---- Container hooks -----------------------------------------------------

    fn fire_before_all(&self, id: NodeId) -> Option<String> {
        let node = self.tree.node(id);
        let hook = node.hooks().before_all.as_ref()?;
        match catch_unwind(AssertUnwindSafe(|| hook())) {
            Ok(()) => None,
            Err(payload) => {
                error!(node = %node.label(), "before_all hook panicked");
                Some(format!(
                    "before_all hook failed in `{}`: {}",
                    node.label(),
                    payload_message(payload.as_ref())
                ))
            }
        }
    }

    fn fire_after_all(&self, id: NodeId) {
        let node = self.tree.node(id);
        if let Some(hook) = node.hooks().after_all.as_ref() {
            if catch_unwind(AssertUnwindSafe(|| hook())).is_err() {
                // Logged, not propagated: a cleanup failure must not stop
                // the walk or distort sibling tallies.
                error!(node = %node.label(), "after_all hook panicked");
            }
        }
    }

    // ---- Spec execution ------------------------------------------------------

    fn execute_spec(
        &self,
        id: NodeId,
        poison: Option<&str>,
        reporter: &mut dyn Reporter,
        result: &mut RunResult,
    ) {
        let description = self.tree.node(id).label();
        reporter.enter_spec(description);

        let outcome = match poison {
            Some(message) => SpecOutcome::error(message),
            None => self.run_one(id),
        };
        debug!(spec = %description, status = %outcome.status, "spec finished");

        result.record(outcome.status);
        reporter.exit_spec(description, &outcome);
    }

    /// Run one spec to completion: before chain (outer-to-inner), fixture
    /// resolution, body, after chain (inner-to-outer, guaranteed), `at_end`
    /// cleanups (LIFO, guaranteed), then classification. Everything raised
    /// here is caught at this spec's boundary.
    fn run_one(&self, id: NodeId) -> SpecOutcome {
        let chain = self.tree.path_to_root(id);
        let mut ctx = ExecutionContext::new();
        let mut first_panic: Option<Box<dyn Any + Send>> = None;
        let mut resolution_error: Option<SpecError> = None;

        for &nid in &chain {
            if let Some(hook) = self.tree.node(nid).hooks().before.as_ref() {
                if let Err(payload) = catch_unwind(AssertUnwindSafe(|| hook())) {
                    first_panic = Some(payload);
                    break;
                }
            }
        }

        if first_panic.is_none() {
            let params = match self.tree.node(id).kind() {
                NodeKind::Spec { params, .. } => params.clone(),
                _ => unreachable!("run_one is only called on spec leaves"),
            };
            match fixture::resolve(self.tree, id, &params, &mut ctx) {
                Err(e) => resolution_error = Some(e),
                Ok(fixtures) => {
                    let tree = self.tree;
                    let ctx_ref = &mut ctx;
                    if let Err(payload) = catch_unwind(AssertUnwindSafe(|| {
                        tree.run_spec_body(id, ctx_ref, &fixtures)
                    })) {
                        first_panic = Some(payload);
                    }
                }
            }
        }

        for &nid in chain.iter().rev() {
            if let Some(hook) = self.tree.node(nid).hooks().after.as_ref() {
                if let Err(payload) = catch_unwind(AssertUnwindSafe(|| hook())) {
                    first_panic.get_or_insert(payload);
                }
            }
        }

        for cleanup in ctx.drain_at_end() {
            if let Err(payload) = catch_unwind(AssertUnwindSafe(cleanup)) {
                first_panic.get_or_insert(payload);
            }
        }

        classify(ctx.pending(), first_panic, resolution_error)
    }
}

// ============================================================================
// Classification
// ============================================================================

/// Transition rules, in priority order, after the spec ran to completion
/// or raised:
/// 1. fixture resolution error         → Error (the body never ran, so a
///    pending marker set by a factory cannot mean "passed unexpectedly")
/// 2. pending + assertion failure      → Todo (the expected-to-fail case)
/// 3. pending + no assertion failure   → Fail (stale TODO marker)
/// 4. skip signal                      → Skip, carrying the reason
/// 5. assertion failure                → Fail
/// 6. any other panic                  → Error
/// 7. nothing raised                   → Pass
fn classify(
    pending: Option<&str>,
    panic: Option<Box<dyn Any + Send>>,
    resolution_error: Option<SpecError>,
) -> SpecOutcome {
    if let Some(e) = resolution_error {
        return SpecOutcome::error(e.to_string());
    }
    if let Some(reason) = pending {
        let failed_assertion = panic
            .as_ref()
            .is_some_and(|p| p.downcast_ref::<AssertionFailure>().is_some());
        return if failed_assertion {
            SpecOutcome::todo(reason)
        } else {
            SpecOutcome::fail(format!(
                "spec passed unexpectedly despite being marked TODO: {reason}"
            ))
        };
    }
    match panic {
        None => SpecOutcome::pass(),
        Some(payload) => {
            if let Some(skip) = payload.downcast_ref::<SkipSignal>() {
                SpecOutcome::skip(skip.reason.clone())
            } else if let Some(failure) = payload.downcast_ref::<AssertionFailure>() {
                SpecOutcome::fail(failure.message.clone())
            } else {
                SpecOutcome::error(payload_message(payload.as_ref()))
            }
        }
    }
}

/// Human-readable form of a caught panic payload.
pub(crate) fn payload_message(payload: &(dyn Any + Send)) -> String {
    if let Some(failure) = payload.downcast_ref::<AssertionFailure>() {
        failure.message.clone()
    } else if let Some(skip) = payload.downcast_ref::<SkipSignal>() {
        skip.reason.clone()
    } else if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload<T: Send + 'static>(value: T) -> Box<dyn Any + Send> {
        Box::new(value)
    }

    #[test]
    fn classify_pass() {
        assert_eq!(classify(None, None, None), SpecOutcome::pass());
    }

    #[test]
    fn classify_assertion_failure() {
        let outcome = classify(
            None,
            Some(payload(AssertionFailure { message: "1 != 2".into() })),
            None,
        );
        assert_eq!(outcome.status, Status::Fail);
        assert_eq!(outcome.message.as_deref(), Some("1 != 2"));
    }

    #[test]
    fn classify_skip_carries_reason() {
        let outcome = classify(
            None,
            Some(payload(SkipSignal { reason: "needs docker".into() })),
            None,
        );
        assert_eq!(outcome.status, Status::Skip);
        assert_eq!(outcome.message.as_deref(), Some("needs docker"));
    }

    #[test]
    fn classify_pending_with_failure_is_todo() {
        let outcome = classify(
            Some("flaky parser"),
            Some(payload(AssertionFailure { message: "x".into() })),
            None,
        );
        assert_eq!(outcome.status, Status::Todo);
    }

    #[test]
    fn classify_pending_without_failure_is_unexpected_pass() {
        let outcome = classify(Some("flaky parser"), None, None);
        assert_eq!(outcome.status, Status::Fail);
        assert!(outcome.message.unwrap().contains("unexpectedly"));
    }

    #[test]
    fn classify_resolution_error_beats_pending_marker() {
        let outcome = classify(
            Some("flaky parser"),
            None,
            Some(SpecError::FixtureNotFound {
                fixture: "db".into(),
                requester: "needs db".into(),
            }),
        );
        assert_eq!(outcome.status, Status::Error);
        assert!(outcome.message.unwrap().contains("`db`"));
    }

    #[test]
    fn classify_other_panic_is_error() {
        let outcome = classify(None, Some(payload("boom")), None);
        assert_eq!(outcome.status, Status::Error);
        assert_eq!(outcome.message.as_deref(), Some("boom"));
    }

    #[test]
    fn tally_records_each_status() {
        let mut result = RunResult::default();
        for status in [Status::Pass, Status::Fail, Status::Error, Status::Skip, Status::Todo] {
            result.record(status);
        }
        assert_eq!(result.total(), 5);
        assert!(!result.is_success());
    }
}
