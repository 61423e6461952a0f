//! Composite recognizers for call and type-declaration patterns
//!
//! These handle the two pattern shapes that should match by role rather than
//! by exact layout:
//! - `Callee($args$)` / `new Type($args$)`: any call whose callee contains the
//!   callee text, with the argument list bound to the trailing placeholder
//! - patterns containing a `Type` placeholder: any typed declaration, with the
//!   placeholder bound to the declared element type

use super::captures::Captures;
use super::template::bind_template;
use super::{MatchContext, StructuralMatcher};
use crate::pattern::{PatternNode, Placeholder, PlaceholderCategory};
use crate::syntax::{CallKind, SyntaxNode};

/// Words in declaration patterns that are not names
const DECLARATION_KEYWORDS: &[&str] = &[
    "public", "private", "protected", "internal", "static", "readonly", "const", "volatile",
    "async", "override", "virtual", "abstract", "sealed", "new", "ref", "out", "in", "params",
    "this", "partial", "extern", "unsafe", "required", "var",
];

/// A pattern of the form `<callee>(<args placeholder>)`
#[derive(Debug, Clone)]
pub(crate) struct CallPattern<'p> {
    /// Callee tokens with the opening parenthesis removed
    pub(crate) callee: Vec<PatternNode>,
    /// Pattern was written `new Type(...)`
    pub(crate) construction: bool,
    pub(crate) arguments: &'p Placeholder,
}

impl<'p> CallPattern<'p> {
    /// Recognize the call shape: an `Arguments` placeholder directly inside
    /// the final parentheses
    pub(crate) fn detect(nodes: &'p [PatternNode]) -> Option<Self> {
        let (index, arguments) = nodes
            .iter()
            .enumerate()
            .rev()
            .find_map(|(i, n)| n.as_placeholder().map(|p| (i, p)))?;
        if arguments.category != PlaceholderCategory::Arguments || index == 0 {
            return None;
        }

        let trailing: String = nodes[index + 1..]
            .iter()
            .filter_map(PatternNode::as_text)
            .flat_map(|t| t.chars().filter(|c| !c.is_whitespace()))
            .collect();
        if trailing != ")" && trailing != ");" {
            return None;
        }

        let PatternNode::Text { text, source_position, .. } = &nodes[index - 1] else {
            return None;
        };
        let callee_text = text.trim_end().strip_suffix('(')?.trim_end();

        let mut callee: Vec<PatternNode> = nodes[..index - 1].to_vec();
        let mut construction = false;
        let mut last = callee_text.to_string();
        if callee.is_empty() {
            let trimmed = last.trim_start();
            if let Some(rest) = trimmed.strip_prefix("new ") {
                construction = true;
                last = rest.trim_start().to_string();
            }
        }
        if !last.is_empty() {
            callee.push(PatternNode::Text {
                length: last.len(),
                text: last,
                source_position: *source_position,
            });
        }

        Some(Self {
            callee,
            construction,
            arguments,
        })
    }

    fn literal_callee(&self) -> Option<String> {
        let texts: Option<Vec<&str>> = self.callee.iter().map(PatternNode::as_text).collect();
        texts.map(|parts| collapse_whitespace(&parts.concat()))
    }
}

pub(crate) fn match_call(
    matcher: &StructuralMatcher<'_>,
    context: &MatchContext<'_>,
    call: &CallPattern<'_>,
    node: SyntaxNode<'_>,
    captures: &mut Captures,
) -> bool {
    let Some(shape) = node.call_shape() else {
        return false;
    };
    if call.construction && shape.kind != CallKind::Construction {
        return false;
    }

    let target = node.with(shape.target);
    let callee_matches = match call.literal_callee() {
        Some(literal) => literal.is_empty() || collapse_whitespace(target.text()).contains(&literal),
        None => bind_template(matcher, context.index(), &call.callee, target, captures),
    };
    if !callee_matches {
        return false;
    }

    let arguments = shape.arguments.map(|id| node.with(id));
    let value = arguments.map(super::argument_list_inner_text).unwrap_or_default();
    // A lone argument is a better subject for type checks than the list
    let subject = match arguments {
        Some(list) if shape.argument_count == 1 => list.named_children().find(|c| c.traits().argument),
        other => other,
    };
    matcher.accept(call.arguments, value, subject, shape.argument_count, captures)
}

/// Bindings for each declarator of a typed declaration
///
/// `int a, b;` yields one binding set per declared name. Casts and object
/// creations declare nothing and bind their subject instead.
pub(crate) fn match_type_declaration(
    matcher: &StructuralMatcher<'_>,
    nodes: &[PatternNode],
    node: SyntaxNode<'_>,
) -> Vec<Captures> {
    let Some(shape) = node.declaration_shape() else {
        return Vec::new();
    };
    let element_type = node.with(shape.element_type);
    let names: Vec<Option<SyntaxNode<'_>>> = if shape.names.is_empty() {
        vec![None]
    } else {
        shape.names.iter().map(|id| Some(node.with(*id))).collect()
    };
    let subject = shape.subject.map(|id| node.with(id));

    names
        .into_iter()
        .filter_map(|name| {
            let mut captures = Captures::default();
            bind_declarator(matcher, nodes, element_type, name, subject, &mut captures).then_some(captures)
        })
        .collect()
}

fn bind_declarator(
    matcher: &StructuralMatcher<'_>,
    nodes: &[PatternNode],
    element_type: SyntaxNode<'_>,
    name: Option<SyntaxNode<'_>>,
    subject: Option<SyntaxNode<'_>>,
    captures: &mut Captures,
) -> bool {
    for pattern_node in nodes {
        match pattern_node {
            PatternNode::Placeholder(p) if p.category == PlaceholderCategory::Type => {
                if !matcher.bind_node(p, element_type, captures) {
                    return false;
                }
            }
            PatternNode::Placeholder(p) => {
                let Some(target) = name.or(subject) else {
                    return false;
                };
                if !matcher.bind_node(p, target, captures) {
                    return false;
                }
            }
            PatternNode::Text { text, .. } => {
                let all_named = identifier_words(text)
                    .filter(|word| !DECLARATION_KEYWORDS.contains(word))
                    .all(|word| name.is_some_and(|n| n.text().contains(word)));
                if !all_named {
                    return false;
                }
            }
        }
    }
    true
}

fn identifier_words(text: &str) -> impl Iterator<Item = &str> {
    text.split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|word| word.chars().next().is_some_and(|c| c.is_alphabetic() || c == '_'))
}

pub(crate) fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::parse;

    #[test]
    fn test_detect_call_pattern() {
        let ast = parse("Console.WriteLine($arg$)").unwrap();
        let call = CallPattern::detect(ast.nodes()).unwrap();
        assert_eq!(call.arguments.name, "arg");
        assert_eq!(call.literal_callee().as_deref(), Some("Console.WriteLine"));
        assert!(!call.construction);

        let ast = parse("new Widget($args$);").unwrap();
        let call = CallPattern::detect(ast.nodes()).unwrap();
        assert!(call.construction);
        assert_eq!(call.literal_callee().as_deref(), Some("Widget"));

        let ast = parse("$obj$.Method($args$)").unwrap();
        let call = CallPattern::detect(ast.nodes()).unwrap();
        assert!(call.literal_callee().is_none());
        assert_eq!(call.callee.len(), 2);
    }

    #[test]
    fn test_non_call_shapes() {
        for pattern in ["Foo($x$)", "Foo($args$).Bar()", "$args$", "Foo(1, $args$)"] {
            let ast = parse(pattern).unwrap();
            assert!(CallPattern::detect(ast.nodes()).is_none(), "{}", pattern);
        }
    }

    #[test]
    fn test_identifier_words() {
        let words: Vec<&str> = identifier_words(" total = 0; ").collect();
        assert_eq!(words, vec!["total"]);
        let words: Vec<&str> = identifier_words("private readonly _count").collect();
        assert_eq!(words, vec!["private", "readonly", "_count"]);
    }
}
