//! Reporter collaborators.
//!
//! The runner drives a [`Reporter`] through enter/exit callbacks, invoked
//! synchronously and exactly once per visited node, in strict tree order.
//! The spec exit call carries the final status and, if not `Pass`, the
//! captured message or reason.

use std::io::IsTerminal;

use crate::runner::{RunResult, SpecOutcome, Status};

pub trait Reporter {
    fn enter_scope(&mut self, _name: &str) {}
    fn exit_scope(&mut self, _name: &str) {}
    fn enter_topic(&mut self, _target: &str) {}
    fn exit_topic(&mut self, _target: &str) {}
    fn enter_spec(&mut self, _description: &str) {}
    fn exit_spec(&mut self, _description: &str, _outcome: &SpecOutcome) {}
}

/// Discards everything. Useful when only the tally matters.
pub struct NullReporter;

impl Reporter for NullReporter {}

// ============================================================================
// RecordingReporter — captures the call sequence, mainly for tests
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportEvent {
    EnterScope(String),
    ExitScope(String),
    EnterTopic(String),
    ExitTopic(String),
    EnterSpec(String),
    ExitSpec(String, Status),
}

#[derive(Default)]
pub struct RecordingReporter {
    pub events: Vec<ReportEvent>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        RecordingReporter::default()
    }

    /// The spec exits in call order, as (description, status) pairs.
    pub fn spec_exits(&self) -> Vec<(String, Status)> {
        self.events
            .iter()
            .filter_map(|e| match e {
                ReportEvent::ExitSpec(name, status) => Some((name.clone(), *status)),
                _ => None,
            })
            .collect()
    }
}

impl Reporter for RecordingReporter {
    fn enter_scope(&mut self, name: &str) {
        self.events.push(ReportEvent::EnterScope(name.to_string()));
    }

    fn exit_scope(&mut self, name: &str) {
        self.events.push(ReportEvent::ExitScope(name.to_string()));
    }

    fn enter_topic(&mut self, target: &str) {
        self.events.push(ReportEvent::EnterTopic(target.to_string()));
    }

    fn exit_topic(&mut self, target: &str) {
        self.events.push(ReportEvent::ExitTopic(target.to_string()));
    }

    fn enter_spec(&mut self, description: &str) {
        self.events.push(ReportEvent::EnterSpec(description.to_string()));
    }

    fn exit_spec(&mut self, description: &str, outcome: &SpecOutcome) {
        self.events
            .push(ReportEvent::ExitSpec(description.to_string(), outcome.status));
    }
}

// ============================================================================
// ConsoleReporter — colored, indented tree output
// ============================================================================

/// Prints an indented tree as the run progresses:
///
/// ```text
/// --- parser_specs ---
/// Tokenizer
///   ✓ splits on whitespace
///   ✗ handles unterminated strings
/// ```
#[derive(Default)]
pub struct ConsoleReporter {
    depth: usize,
}

impl ConsoleReporter {
    pub fn new() -> Self {
        ConsoleReporter::default()
    }

    fn indent(&self) -> String {
        "  ".repeat(self.depth)
    }

    /// Print the final tally in the usual PASS/FAIL shape.
    pub fn summary(&self, result: &RunResult) {
        let parts: Vec<String> = [
            (result.pass > 0).then(|| green(&format!("{} passed", result.pass))),
            (result.fail > 0).then(|| red(&format!("{} failed", result.fail))),
            (result.error > 0).then(|| red(&format!("{} errored", result.error))),
            (result.skip > 0).then(|| yellow(&format!("{} skipped", result.skip))),
            (result.todo > 0).then(|| yellow(&format!("{} todo", result.todo))),
        ]
        .into_iter()
        .flatten()
        .collect();

        println!();
        if result.is_success() {
            println!("{}", green("PASS"));
        } else {
            println!("{}", red("FAIL"));
        }
        if parts.is_empty() {
            println!("{}", dim("no specs selected"));
        } else {
            println!("{}", parts.join(", "));
        }
    }
}

impl Reporter for ConsoleReporter {
    fn enter_scope(&mut self, name: &str) {
        println!("{}", dim(&format!("--- {name} ---")));
    }

    fn exit_scope(&mut self, _name: &str) {
        println!();
    }

    fn enter_topic(&mut self, target: &str) {
        println!("{}{}", self.indent(), bold(target));
        self.depth += 1;
    }

    fn exit_topic(&mut self, _target: &str) {
        self.depth -= 1;
    }

    fn exit_spec(&mut self, description: &str, outcome: &SpecOutcome) {
        let indent = self.indent();
        match outcome.status {
            Status::Pass => println!("{indent}{} {description}", green("✓")),
            Status::Fail | Status::Error => {
                println!("{indent}{} {}", red("✗"), red(description));
                if let Some(message) = &outcome.message {
                    println!("{indent}  {}", red(&format!("{}: {message}", outcome.status)));
                }
            }
            Status::Skip | Status::Todo => {
                println!("{indent}{} {}", yellow("-"), dim(description));
                if let Some(message) = &outcome.message {
                    println!("{indent}  {}", dim(&format!("{}: {message}", outcome.status)));
                }
            }
        }
    }
}

// ============================================================================
// ANSI color helpers
// ============================================================================

fn use_color() -> bool {
    // Respect NO_COLOR env var (https://no-color.org/)
    if std::env::var("NO_COLOR").is_ok() {
        return false;
    }
    std::io::stdout().is_terminal()
}

fn green(s: &str) -> String {
    if use_color() {
        format!("\x1b[32m{s}\x1b[0m")
    } else {
        s.to_string()
    }
}

fn red(s: &str) -> String {
    if use_color() {
        format!("\x1b[31m{s}\x1b[0m")
    } else {
        s.to_string()
    }
}

fn yellow(s: &str) -> String {
    if use_color() {
        format!("\x1b[33m{s}\x1b[0m")
    } else {
        s.to_string()
    }
}

fn bold(s: &str) -> String {
    if use_color() {
        format!("\x1b[1m{s}\x1b[0m")
    } else {
        s.to_string()
    }
}

fn dim(s: &str) -> String {
    if use_color() {
        format!("\x1b[2m{s}\x1b[0m")
    } else {
        s.to_string()
    }
}
