//! Aligned template binding for patterns mixing text and placeholders
//!
//! The pattern is aligned left to right against a candidate node's source.
//! Literal text must occur at the cursor, ignoring whitespace, and end on a
//! token boundary. A placeholder claims the region up to the first token
//! where the following literal occurs and the region is exactly one node, or
//! a contiguous run of sibling nodes, compatible with the placeholder. The
//! whole candidate must be consumed.
//!
//! Bindings are committed as they are made; there is no backtracking across
//! placeholders.

use std::collections::HashMap;

use super::captures::Captures;
use super::StructuralMatcher;
use crate::pattern::{PatternNode, Placeholder, PlaceholderCategory};
use crate::syntax::{NodeId, SyntaxNode, SyntaxTree};

/// Per-tree lookup tables for token boundaries and node spans
pub(crate) struct TokenIndex {
    /// (start, end) of every non-empty leaf token, in source order
    leaves: Vec<(usize, usize)>,
    /// Matchable nodes by exact byte range, outermost first
    by_span: HashMap<(usize, usize), Vec<NodeId>>,
    /// Matchable nodes by start offset, outermost first
    by_start: HashMap<usize, Vec<NodeId>>,
}

impl TokenIndex {
    pub(crate) fn build(tree: &SyntaxTree) -> Self {
        let root = tree.root();
        let leaves = root
            .tokens()
            .map(|t| (t.span().start, t.span().end))
            .filter(|(start, end)| end > start)
            .collect();

        let mut by_span: HashMap<(usize, usize), Vec<NodeId>> = HashMap::new();
        let mut by_start: HashMap<usize, Vec<NodeId>> = HashMap::new();
        for node in tree.descendants(root.id()) {
            let span = node.span();
            by_span.entry((span.start, span.end)).or_default().push(node.id());
            by_start.entry(span.start).or_default().push(node.id());
        }

        Self {
            leaves,
            by_span,
            by_start,
        }
    }

    /// Leaf tokens lying inside `[start, end)`
    fn leaves_within(&self, start: usize, end: usize) -> &[(usize, usize)] {
        let lo = self.leaves.partition_point(|(s, _)| *s < start);
        let hi = self.leaves.partition_point(|(s, _)| *s < end);
        &self.leaves[lo..hi]
    }

    fn is_token_end(&self, offset: usize) -> bool {
        self.leaves
            .binary_search_by(|(_, end)| end.cmp(&offset))
            .is_ok()
    }
}

/// Align `tokens` against the whole of `node`
pub(crate) fn bind_template(
    matcher: &StructuralMatcher<'_>,
    index: &TokenIndex,
    tokens: &[PatternNode],
    node: SyntaxNode<'_>,
    captures: &mut Captures,
) -> bool {
    let source = node.tree().source();
    let span = node.span();
    let end = span.end;
    let mut cursor = span.start;
    let mut i = 0;

    while i < tokens.len() {
        match &tokens[i] {
            PatternNode::Text { text, .. } => {
                match match_literal(source, cursor, end, text, index) {
                    Some(next) => cursor = next,
                    None => return false,
                }
                i += 1;
            }
            PatternNode::Placeholder(placeholder) => {
                let start = skip_whitespace(source, cursor, end);
                match tokens.get(i + 1) {
                    None => {
                        let region_end = trim_end(source, start, end);
                        if region_end <= start
                            || !bind_region(matcher, index, placeholder, node, start, region_end, captures)
                        {
                            return false;
                        }
                        cursor = end;
                        i += 1;
                    }
                    Some(PatternNode::Text { text, .. }) => {
                        let mut bound_to = None;
                        for &(anchor, _) in index.leaves_within(start, end) {
                            if anchor <= start {
                                continue;
                            }
                            let Some(after) = match_literal(source, anchor, end, text, index) else {
                                continue;
                            };
                            let region_end = trim_end(source, start, anchor);
                            if region_end <= start {
                                continue;
                            }
                            if bind_region(matcher, index, placeholder, node, start, region_end, captures) {
                                bound_to = Some(after);
                                break;
                            }
                        }
                        match bound_to {
                            Some(after) => cursor = after,
                            None => return false,
                        }
                        i += 2;
                    }
                    // Adjacent placeholders have no anchor between them
                    Some(PatternNode::Placeholder(_)) => return false,
                }
            }
        }
    }

    skip_whitespace(source, cursor, end) == end
}

/// Bind a placeholder to the node (or sibling run) spanning `[start, end)`
fn bind_region(
    matcher: &StructuralMatcher<'_>,
    index: &TokenIndex,
    placeholder: &Placeholder,
    within: SyntaxNode<'_>,
    start: usize,
    end: usize,
    captures: &mut Captures,
) -> bool {
    let inside = |id: &NodeId| *id != within.id() && within.contains(within.with(*id));

    if let Some(ids) = index.by_span.get(&(start, end)) {
        for id in ids.iter().filter(|id| inside(id)) {
            if matcher.bind_node(placeholder, within.with(*id), captures) {
                return true;
            }
        }
    }

    if !matches!(
        placeholder.category,
        PlaceholderCategory::Any | PlaceholderCategory::Arguments | PlaceholderCategory::Statement
    ) {
        return false;
    }

    let Some(ids) = index.by_start.get(&start) else {
        return false;
    };
    for id in ids.iter().filter(|id| inside(id)) {
        let first = within.with(*id);
        if let Some(count) = sibling_run(first, end) {
            let text = within.tree().source().get(start..end).unwrap_or_default();
            return matcher.accept(placeholder, text, None, count, captures);
        }
    }
    false
}

/// Number of named siblings from `first` whose run ends exactly at `end`
///
/// Only runs of two or more nodes count; single nodes are matched by span.
fn sibling_run(first: SyntaxNode<'_>, end: usize) -> Option<usize> {
    let parent = first.parent()?;
    let mut count = 0;
    for sibling in parent.named_children().skip_while(|s| s.id() != first.id()) {
        count += 1;
        let sibling_end = sibling.span().end;
        if sibling_end == end {
            return (count >= 2).then_some(count);
        }
        if sibling_end > end {
            return None;
        }
    }
    None
}

/// Match `literal` at `pos`, ignoring whitespace on both sides
///
/// Returns the offset just past the literal, which must end on a token
/// boundary.
fn match_literal(source: &str, pos: usize, limit: usize, literal: &str, index: &TokenIndex) -> Option<usize> {
    let mut at = pos;
    let mut consumed = false;
    for ch in literal.chars().filter(|c| !c.is_whitespace()) {
        at = skip_whitespace(source, at, limit);
        if !source.get(at..limit)?.starts_with(ch) {
            return None;
        }
        at += ch.len_utf8();
        consumed = true;
    }
    (!consumed || index.is_token_end(at)).then_some(at)
}

pub(crate) fn skip_whitespace(source: &str, pos: usize, limit: usize) -> usize {
    source
        .get(pos..limit)
        .map(|rest| limit - rest.trim_start().len())
        .unwrap_or(pos)
}

fn trim_end(source: &str, start: usize, end: usize) -> usize {
    source
        .get(start..end)
        .map(|region| start + region.trim_end().len())
        .unwrap_or(end)
}
