//! # spectree — a hierarchical scope/topic/spec test engine
//!
//! Declare nested scope → topic → spec trees with named fixtures (lazily
//! computed, dependency-resolved values) and lifecycle hooks, then execute
//! the matching subset in deterministic order.
//!
//! ## Quick example
//!
//! ```rust,no_run
//! use spectree::{Registry, ConsoleReporter};
//!
//! let mut registry = Registry::new();
//! registry.scope("calculator_specs", |s| {
//!     s.topic("Calculator", |t| {
//!         t.fixture("sum", &[], |_, _| 2 + 3);
//!
//!         t.spec("adds two numbers", &["sum"], |_, fx| {
//!             spectree::check!(*fx.get::<i32>("sum") == 5);
//!         });
//!
//!         t.spec("not ported yet", &[], |_, _| {
//!             spectree::skip!("waiting on the new tokenizer");
//!         });
//!     });
//! });
//!
//! let mut reporter = ConsoleReporter::new();
//! let result = registry.run(&mut reporter);
//! reporter.summary(&result);
//! ```
//!
//! Fixtures declare their own dependencies by name; the resolver memoizes
//! each factory per spec execution, walks the lexical scope chain for
//! lookups, and reports dependency loops with the full cycle path instead
//! of overflowing the stack.

pub mod error;
pub mod filter;
pub mod fixture;
pub mod node;
pub mod registry;
pub mod report;
pub mod runner;

pub use error::{Result, SpecError};
pub use filter::Filter;
pub use fixture::{resolve, ExecutionContext, FixtureValue, Fixtures};
pub use node::{HookKind, Node, NodeId, NodeKind, Tree};
pub use registry::{Ctx, Registry};
pub use report::{ConsoleReporter, NullReporter, RecordingReporter, ReportEvent, Reporter};
pub use runner::{RunResult, Runner, SpecOutcome, Status};

use std::panic::panic_any;

// ============================================================================
// Signal primitives
// ============================================================================

/// The framework's assertion-failure kind. Raised by [`fail`] and
/// [`check!`]; the runner classifies it as `Fail` (or `Todo` under a
/// pending marker). Assertion DSLs built on top of this crate should raise
/// it for expected comparison failures.
#[derive(Debug)]
pub struct AssertionFailure {
    pub message: String,
}

/// The skip signal. Raised by [`skip`]; the runner classifies it as `Skip`
/// carrying the reason.
#[derive(Debug)]
pub struct SkipSignal {
    pub reason: String,
}

/// Raise an assertion failure with the given message.
pub fn fail(message: impl Into<String>) -> ! {
    panic_any(AssertionFailure { message: message.into() })
}

/// Skip the current spec with a reason.
pub fn skip(reason: impl Into<String>) -> ! {
    panic_any(SkipSignal { reason: reason.into() })
}

/// Raise an [`AssertionFailure`] built from a format string.
#[macro_export]
macro_rules! fail {
    ($($arg:tt)*) => {
        $crate::fail(format!($($arg)*))
    };
}

/// Skip the current spec with a formatted reason.
#[macro_export]
macro_rules! skip {
    ($($arg:tt)*) => {
        $crate::skip(format!($($arg)*))
    };
}

/// Minimal assertion: raises [`AssertionFailure`] when the condition is
/// false. Richer comparison operators belong to an external assertion DSL.
#[macro_export]
macro_rules! check {
    ($cond:expr) => {
        if !$cond {
            $crate::fail(format!("check failed: {}", stringify!($cond)));
        }
    };
    ($cond:expr, $($arg:tt)*) => {
        if !$cond {
            $crate::fail(format!($($arg)*));
        }
    };
}
