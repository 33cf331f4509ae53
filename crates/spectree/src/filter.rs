//! Filter engine — compiles a small `key=pattern` language into a pure
//! predicate over nodes. Filtering never mutates the tree; the runner
//! evaluates the predicate per traversal step.
//!
//! Syntax: `topic=PATTERN`, `spec=PATTERN`, `tag=PATTERN`, `sid=ID`; any
//! key may use `!=` to negate the final result. A pattern is a glob (`*`
//! matches any run of characters, everything else is literal) or a
//! brace-delimited alternation `{a,b,c}` matching if any member matches.

use regex::Regex;

use crate::error::{Result, SpecError};
use crate::node::{Node, NodeKind};

/// A compiled filter. Built with [`Filter::parse`].
#[derive(Debug)]
pub struct Filter {
    topic_pattern: Option<Pattern>,
    spec_pattern: Option<Pattern>,
    tag_pattern: Option<Pattern>,
    negative: bool,
}

impl Filter {
    /// Parse `key=pattern` / `key!=pattern` with `key ∈ {topic, spec, tag,
    /// sid}`. `sid=ID` is sugar for a spec pattern matching the short-id
    /// token `[!ID]` embedded in a description.
    pub fn parse(input: &str) -> Result<Filter> {
        let (key, pattern, negative) = if let Some((k, v)) = input.split_once("!=") {
            (k, v, true)
        } else if let Some((k, v)) = input.split_once('=') {
            (k, v, false)
        } else {
            return Err(SpecError::FilterParse {
                input: input.to_string(),
                reason: "expected `key=pattern` or `key!=pattern`".to_string(),
            });
        };

        let mut filter = Filter {
            topic_pattern: None,
            spec_pattern: None,
            tag_pattern: None,
            negative,
        };
        match key {
            "topic" => filter.topic_pattern = Some(Pattern::compile(pattern)?),
            "spec" => filter.spec_pattern = Some(Pattern::compile(pattern)?),
            "tag" => filter.tag_pattern = Some(Pattern::compile(pattern)?),
            "sid" => filter.spec_pattern = Some(Pattern::compile(&format!("*[!{pattern}]*"))?),
            _ => {
                return Err(SpecError::FilterParse {
                    input: input.to_string(),
                    reason: format!("unknown key `{key}` (expected topic, spec, tag, or sid)"),
                })
            }
        }
        Ok(filter)
    }

    /// Evaluate this filter against a single node. The `negative` flag
    /// inverts the result.
    pub fn matches(&self, node: &Node) -> bool {
        self.matches_positive(node) != self.negative
    }

    /// Direct match, before negation. Scopes are never filter-matched.
    pub(crate) fn matches_positive(&self, node: &Node) -> bool {
        let tag_hit = |patterns: &Option<Pattern>| {
            patterns
                .as_ref()
                .is_some_and(|p| node.tags().iter().any(|t| p.matches(t)))
        };
        match node.kind() {
            NodeKind::Scope { .. } => false,
            NodeKind::Topic { target } => {
                self.topic_pattern.as_ref().is_some_and(|p| p.matches(target))
                    || tag_hit(&self.tag_pattern)
            }
            NodeKind::Spec { description, .. } => {
                self.spec_pattern.as_ref().is_some_and(|p| p.matches(description))
                    || tag_hit(&self.tag_pattern)
            }
        }
    }

    pub(crate) fn negative(&self) -> bool {
        self.negative
    }
}

// ============================================================================
// Patterns
// ============================================================================

/// One glob pattern or a brace alternation of globs, compiled to anchored
/// regexes.
#[derive(Debug)]
struct Pattern {
    branches: Vec<Regex>,
}

impl Pattern {
    fn compile(raw: &str) -> Result<Pattern> {
        let branches: Vec<&str> = if raw.len() >= 2 && raw.starts_with('{') && raw.ends_with('}') {
            raw[1..raw.len() - 1].split(',').collect()
        } else {
            vec![raw]
        };
        let branches = branches
            .into_iter()
            .map(glob_regex)
            .collect::<Result<Vec<_>>>()?;
        Ok(Pattern { branches })
    }

    fn matches(&self, text: &str) -> bool {
        self.branches.iter().any(|re| re.is_match(text))
    }
}

/// Translate a glob into an anchored regex: `*` becomes `.*`, everything
/// else matches literally.
fn glob_regex(glob: &str) -> Result<Regex> {
    let mut pattern = String::from("^");
    for ch in glob.chars() {
        if ch == '*' {
            pattern.push_str(".*");
        } else {
            pattern.push_str(&regex::escape(&ch.to_string()));
        }
    }
    pattern.push('$');
    Regex::new(&pattern).map_err(|e| SpecError::FilterParse {
        input: glob.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{NodeKind, Tree};

    fn topic_node(tree: &mut Tree, target: &str, tags: &[&str]) -> crate::node::NodeId {
        let id = tree.push(NodeKind::Topic { target: target.into() });
        for tag in tags {
            tree.add_tag(id, tag);
        }
        id
    }

    #[test]
    fn glob_star_matches_any_run() {
        let p = Pattern::compile("test_*").unwrap();
        assert!(p.matches("test_aaa"));
        assert!(!p.matches("spec_aaa"));
        // exact strings match literally, including regex metacharacters
        let literal = Pattern::compile("a+b").unwrap();
        assert!(literal.matches("a+b"));
        assert!(!literal.matches("aab"));
    }

    #[test]
    fn brace_alternation_matches_any_member() {
        let p = Pattern::compile("{red,green,blu*}").unwrap();
        assert!(p.matches("green"));
        assert!(p.matches("bluish"));
        assert!(!p.matches("yellow"));
    }

    #[test]
    fn topic_pattern_matches_topic_target() {
        let mut tree = Tree::new();
        let id = topic_node(&mut tree, "Calculator", &[]);
        let f = Filter::parse("topic=Calc*").unwrap();
        assert!(f.matches(tree.node(id)));
    }

    #[test]
    fn tag_pattern_matches_any_tag() {
        let mut tree = Tree::new();
        let id = topic_node(&mut tree, "T", &["slow", "net"]);
        assert!(Filter::parse("tag={fast,net}").unwrap().matches(tree.node(id)));
        assert!(!Filter::parse("tag=fast").unwrap().matches(tree.node(id)));
    }

    #[test]
    fn negation_inverts_the_result() {
        let mut tree = Tree::new();
        let id = topic_node(&mut tree, "Calculator", &[]);
        let f = Filter::parse("topic!=Calc*").unwrap();
        assert!(!f.matches(tree.node(id)));
        assert!(f.negative());
    }

    #[test]
    fn scopes_are_never_matched() {
        let mut tree = Tree::new();
        let id = tree.push(NodeKind::Scope { name: "file.rs".into() });
        let f = Filter::parse("topic=*").unwrap();
        assert!(!f.matches_positive(tree.node(id)));
    }

    #[test]
    fn sid_compiles_to_a_spec_pattern() {
        let mut tree = Tree::new();
        let id = tree.push(NodeKind::Spec {
            description: "[!a4x] parses empty input".into(),
            params: Vec::new(),
            body: Box::new(|_, _| {}),
        });
        assert!(Filter::parse("sid=a4x").unwrap().matches(tree.node(id)));
        assert!(!Filter::parse("sid=zzz").unwrap().matches(tree.node(id)));
    }

    #[test]
    fn malformed_input_names_the_offender() {
        let err = Filter::parse("bogus").unwrap_err();
        assert!(err.to_string().contains("bogus"));
        let err = Filter::parse("kind=x").unwrap_err();
        assert!(err.to_string().contains("kind"));
    }

    #[test]
    fn filters_are_debuggable() {
        let rendered = format!("{:?}", Filter::parse("topic!=Calc*").unwrap());
        assert!(rendered.contains("negative: true"), "got: {rendered}");
    }
}
