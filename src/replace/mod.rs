//! Replacement rendering
//!
//! Turns a [`Match`] plus a [`ReplacePattern`] into a [`ReplacementResult`].
//! Template text that starts a new line is indented to the column of the line
//! the match starts on; captured text is inserted verbatim.

pub mod applier;

use crate::error::ReplaceError;
use crate::models::{Match, ReplacementResult};
use crate::pattern::{ReplacePattern, ReplacePatternNode};

pub use applier::{apply_edits, EditOutcome, ReplacementApplier};

/// Render the replacement for one match
///
/// `source` is the full text of the file the match came from.
pub fn apply_replacement(
    m: &Match,
    source: &str,
    replace: &ReplacePattern,
) -> Result<ReplacementResult, ReplaceError> {
    let indentation = base_indentation(source, m.span.start);
    let mut rendered = String::new();
    let mut pending_indent = false;

    for node in replace.nodes() {
        match node {
            ReplacePatternNode::Text(text) => {
                push_template_text(&mut rendered, text, indentation, &mut pending_indent);
            }
            ReplacePatternNode::Placeholder(name) => {
                let value = m
                    .placeholders
                    .get(name)
                    .ok_or_else(|| ReplaceError::MissingBinding { name: name.clone() })?;
                if pending_indent && !value.is_empty() {
                    rendered.push_str(indentation);
                    pending_indent = false;
                }
                rendered.push_str(value);
            }
        }
    }

    Ok(ReplacementResult {
        file_path: m.file_path.clone().unwrap_or_default(),
        start_position: m.span.start,
        end_position: m.span.end,
        start_line: m.span.start_line,
        start_column: m.column(),
        original_text: m.matched_text.clone(),
        replacement_text: rendered,
        base_indentation: indentation.to_string(),
    })
}

/// Render replacements for every match from one source text
pub fn apply_replacements(
    matches: &[Match],
    source: &str,
    replace: &ReplacePattern,
) -> Vec<Result<ReplacementResult, ReplaceError>> {
    matches
        .iter()
        .map(|m| apply_replacement(m, source, replace))
        .collect()
}

/// Leading whitespace of the line containing `offset`
pub fn base_indentation(source: &str, offset: usize) -> &str {
    let offset = offset.min(source.len());
    let line_start = source
        .get(..offset)
        .and_then(|before| before.rfind('\n'))
        .map_or(0, |i| i + 1);
    let line = source.get(line_start..).unwrap_or_default();
    let width = line.len() - line.trim_start_matches([' ', '\t']).len();
    &line[..width]
}

fn push_template_text(out: &mut String, text: &str, indentation: &str, pending_indent: &mut bool) {
    for (i, line) in text.split('\n').enumerate() {
        if i > 0 {
            out.push('\n');
            *pending_indent = true;
        }
        if !line.is_empty() {
            if *pending_indent {
                out.push_str(indentation);
                *pending_indent = false;
            }
            out.push_str(line);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::models::Span;
    use crate::pattern::{parse, parse_replace_pattern};
    use crate::syntax::NodeId;

    fn match_at(source: &str, text: &str, placeholders: &[(&str, &str)]) -> Match {
        let start = source.find(text).unwrap();
        let line = source[..start].matches('\n').count() + 1;
        let col = start - source[..start].rfind('\n').map_or(0, |i| i + 1);
        Match {
            node: NodeId(0),
            span: Span::new(start, start + text.len(), line, col, line, col + text.len()),
            matched_text: text.to_string(),
            placeholders: placeholders
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<BTreeMap<_, _>>(),
            file_path: None,
        }
    }

    #[test]
    fn test_single_line_replacement() {
        let source = "class C {\n    void M() {\n        x++;\n    }\n}\n";
        let m = match_at(source, "x++", &[("var", "x")]);
        let search = parse("$var$++").unwrap();
        let replace = parse_replace_pattern("$var$ = $var$ + 1", &search).unwrap();

        let result = apply_replacement(&m, source, &replace).unwrap();
        assert_eq!(result.original_text, "x++");
        assert_eq!(result.replacement_text, "x = x + 1");
        assert_eq!(result.start_position, source.find("x++").unwrap());
        assert_eq!(result.end_position, result.start_position + 3);
        assert_eq!(result.base_indentation, "        ");
        assert_eq!(result.start_line, 3);
        assert_eq!(result.start_column, 9);
    }

    #[test]
    fn test_multiline_template_is_reindented() {
        let source = "    {\n        Save(item);\n    }\n";
        let m = match_at(source, "Save(item)", &[("args", "item")]);
        let search = parse("Save($args$)").unwrap();
        let replace =
            parse_replace_pattern("Validate($args$);\nSave($args$)", &search).unwrap();

        let result = apply_replacement(&m, source, &replace).unwrap();
        assert_eq!(result.replacement_text, "Validate(item);\n        Save(item)");
        assert_eq!(result.base_indentation, "        ");
        assert_eq!(&source[result.start_position..result.end_position], "Save(item)");
    }

    #[test]
    fn test_captured_text_is_not_reindented() {
        let source = "  Run(a,\n      b);\n";
        let m = match_at(source, "Run(a,\n      b)", &[("args", "a,\n      b")]);
        let search = parse("Run($args$)").unwrap();
        let replace = parse_replace_pattern("Go($args$)", &search).unwrap();

        let result = apply_replacement(&m, source, &replace).unwrap();
        assert_eq!(result.replacement_text, "Go(a,\n      b)");
    }

    #[test]
    fn test_blank_template_lines_stay_blank() {
        let source = "    Old();\n";
        let m = match_at(source, "Old();", &[]);
        let search = parse("Old();").unwrap();
        let replace = parse_replace_pattern("First();\n\nSecond();", &search).unwrap();

        let result = apply_replacement(&m, source, &replace).unwrap();
        assert_eq!(result.replacement_text, "First();\n\n    Second();");
    }

    #[test]
    fn test_missing_binding_is_an_error() {
        let source = "Foo(1);";
        let m = match_at(source, "Foo(1)", &[]);
        let search = parse("Foo($args$)").unwrap();
        let replace = parse_replace_pattern("Bar($args$)", &search).unwrap();

        assert_eq!(
            apply_replacement(&m, source, &replace).unwrap_err(),
            ReplaceError::MissingBinding { name: "args".to_string() }
        );
    }

    #[test]
    fn test_base_indentation() {
        let source = "a\n\t  b\n";
        assert_eq!(base_indentation(source, 0), "");
        assert_eq!(base_indentation(source, 5), "\t  ");
        assert_eq!(base_indentation(source, 100), "");
    }
}
