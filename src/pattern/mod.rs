//! Pattern language: `$name$` placeholders embedded in code text
//!
//! A pattern such as `Console.WriteLine($arg$)` is tokenized into literal
//! text and placeholder tokens, then parsed into a [`PatternAst`]. Each
//! placeholder gets a [`PlaceholderCategory`] inferred from its name and may
//! carry [`Constraint`]s supplied alongside the pattern.
//!
//! Patterns without any `$` are plain code fragments and match structurally.

pub mod replace;

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::constraints::Constraint;
use crate::error::PatternError;

pub use replace::{parse_replace_pattern, ReplacePattern, ReplacePatternNode};

/// Delimiter that opens and closes a placeholder
pub const PLACEHOLDER_DELIMITER: char = '$';

/// Syntactic role a placeholder is expected to bind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum PlaceholderCategory {
    Expression,
    Statement,
    Arguments,
    Type,
    Member,
    Identifier,
    Any,
}

impl PlaceholderCategory {
    /// Infer a category from a placeholder name
    ///
    /// Case-insensitive substring checks, first hit wins: `expr`, `stmt`,
    /// `arg`, `type`, `member`, then `var`/`name`/`id`. Anything else is
    /// [`PlaceholderCategory::Any`].
    pub fn infer(name: &str) -> Self {
        let lower = name.to_ascii_lowercase();
        if lower.contains("expr") {
            Self::Expression
        } else if lower.contains("stmt") {
            Self::Statement
        } else if lower.contains("arg") {
            Self::Arguments
        } else if lower.contains("type") {
            Self::Type
        } else if lower.contains("member") {
            Self::Member
        } else if lower.contains("var") || lower.contains("name") || lower.contains("id") {
            Self::Identifier
        } else {
            Self::Any
        }
    }
}

/// Token produced by [`tokenize`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// Literal code text
    Text { text: String, position: usize },
    /// `$name$`; `length` covers both delimiters
    Placeholder { name: String, position: usize, length: usize },
}

impl Token {
    pub fn position(&self) -> usize {
        match self {
            Token::Text { position, .. } | Token::Placeholder { position, .. } => *position,
        }
    }

    pub fn length(&self) -> usize {
        match self {
            Token::Text { text, .. } => text.len(),
            Token::Placeholder { length, .. } => *length,
        }
    }
}

/// Split pattern text into literal and placeholder tokens
///
/// Tokens are contiguous and cover the input exactly. Fails on a `$` with no
/// closing delimiter.
pub fn tokenize(pattern: &str) -> Result<Vec<Token>, PatternError> {
    let mut tokens = Vec::new();
    let mut literal_start = 0;
    let mut cursor = 0;

    while let Some(offset) = pattern[cursor..].find(PLACEHOLDER_DELIMITER) {
        let open = cursor + offset;
        let close = pattern[open + 1..]
            .find(PLACEHOLDER_DELIMITER)
            .map(|i| open + 1 + i)
            .ok_or(PatternError::UnclosedPlaceholder { position: open })?;

        if open > literal_start {
            tokens.push(Token::Text {
                text: pattern[literal_start..open].to_string(),
                position: literal_start,
            });
        }
        tokens.push(Token::Placeholder {
            name: pattern[open + 1..close].to_string(),
            position: open,
            length: close - open + 1,
        });

        cursor = close + 1;
        literal_start = cursor;
    }

    if literal_start < pattern.len() {
        tokens.push(Token::Text {
            text: pattern[literal_start..].to_string(),
            position: literal_start,
        });
    }

    Ok(tokens)
}

/// A placeholder occurrence inside a parsed pattern
#[derive(Debug, Clone)]
pub struct Placeholder {
    pub name: String,
    pub category: PlaceholderCategory,
    pub constraints: Vec<Constraint>,
    pub source_position: usize,
    pub length: usize,
}

/// Node of a parsed pattern
#[derive(Debug, Clone)]
pub enum PatternNode {
    Text {
        text: String,
        source_position: usize,
        length: usize,
    },
    Placeholder(Placeholder),
}

impl PatternNode {
    pub fn as_placeholder(&self) -> Option<&Placeholder> {
        match self {
            PatternNode::Placeholder(p) => Some(p),
            PatternNode::Text { .. } => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            PatternNode::Text { text, .. } => Some(text),
            PatternNode::Placeholder(_) => None,
        }
    }

    pub fn source_position(&self) -> usize {
        match self {
            PatternNode::Text { source_position, .. } => *source_position,
            PatternNode::Placeholder(p) => p.source_position,
        }
    }
}

/// A parsed search pattern
#[derive(Debug, Clone)]
pub struct PatternAst {
    original_text: String,
    nodes: Vec<PatternNode>,
}

impl PatternAst {
    /// Pattern text exactly as given
    pub fn original_text(&self) -> &str {
        &self.original_text
    }

    pub fn nodes(&self) -> &[PatternNode] {
        &self.nodes
    }

    pub fn placeholders(&self) -> impl Iterator<Item = &Placeholder> {
        self.nodes.iter().filter_map(PatternNode::as_placeholder)
    }

    /// Distinct placeholder names, sorted
    pub fn placeholder_names(&self) -> BTreeSet<&str> {
        self.placeholders().map(|p| p.name.as_str()).collect()
    }

    pub fn has_placeholders(&self) -> bool {
        self.placeholders().next().is_some()
    }

    /// Constraints attached to the first occurrence of `name`
    pub fn constraints_for(&self, name: &str) -> &[Constraint] {
        self.placeholders()
            .find(|p| p.name == name)
            .map(|p| p.constraints.as_slice())
            .unwrap_or_default()
    }
}

/// Parse pattern text into a [`PatternAst`]
pub fn parse(pattern: &str) -> Result<PatternAst, PatternError> {
    parse_with_constraints(pattern, &HashMap::new())
}

/// Parse pattern text and attach constraints to placeholders by name
///
/// Every occurrence of a constrained name receives the same constraints.
/// Constraints naming a placeholder that does not occur are rejected.
pub fn parse_with_constraints(
    pattern: &str,
    constraints: &HashMap<String, Vec<Constraint>>,
) -> Result<PatternAst, PatternError> {
    if pattern.trim().is_empty() {
        return Err(PatternError::EmptyPattern);
    }

    let nodes = tokenize(pattern)?
        .into_iter()
        .map(|token| match token {
            Token::Text { text, position } => {
                let length = text.len();
                Ok(PatternNode::Text {
                    text,
                    source_position: position,
                    length,
                })
            }
            Token::Placeholder { name, position, length } => {
                check_placeholder_name(&name, position)?;
                Ok(PatternNode::Placeholder(Placeholder {
                    category: PlaceholderCategory::infer(&name),
                    constraints: constraints.get(&name).cloned().unwrap_or_default(),
                    name,
                    source_position: position,
                    length,
                }))
            }
        })
        .collect::<Result<Vec<_>, PatternError>>()?;

    let ast = PatternAst {
        original_text: pattern.to_string(),
        nodes,
    };

    let names = ast.placeholder_names();
    let mut unknown: Vec<&String> = constraints
        .keys()
        .filter(|name| !names.contains(name.as_str()))
        .collect();
    unknown.sort();
    if let Some(name) = unknown.first() {
        return Err(PatternError::UnknownConstraintTarget {
            name: (*name).clone(),
        });
    }

    log::debug!(
        "Parsed pattern '{}' into {} nodes ({} placeholders)",
        pattern,
        ast.nodes.len(),
        names.len()
    );

    Ok(ast)
}

fn check_placeholder_name(name: &str, position: usize) -> Result<(), PatternError> {
    if name.is_empty() {
        return Err(PatternError::EmptyPlaceholderName { position });
    }
    if !name.chars().all(|c| c.is_alphanumeric() || c == '_') {
        return Err(PatternError::InvalidPlaceholderName {
            name: name.to_string(),
            position,
        });
    }
    Ok(())
}

/// Result of [`validate`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<String>,
}

/// Check pattern text without failing; reports every problem found
pub fn validate(pattern: &str) -> ValidationResult {
    let mut errors = Vec::new();

    if pattern.trim().is_empty() {
        errors.push(PatternError::EmptyPattern.to_string());
    } else {
        match tokenize(pattern) {
            Ok(tokens) => {
                for token in tokens {
                    if let Token::Placeholder { name, position, .. } = token {
                        if let Err(e) = check_placeholder_name(&name, position) {
                            errors.push(e.to_string());
                        }
                    }
                }
            }
            Err(e) => errors.push(e.to_string()),
        }
    }

    ValidationResult {
        is_valid: errors.is_empty(),
        errors,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_mixed_pattern() {
        let tokens = tokenize("Console.WriteLine($arg$)").unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Text { text: "Console.WriteLine(".to_string(), position: 0 },
                Token::Placeholder { name: "arg".to_string(), position: 18, length: 5 },
                Token::Text { text: ")".to_string(), position: 23 },
            ]
        );
    }

    #[test]
    fn test_tokens_cover_input() {
        let pattern = "$a$ + $b$ * 2";
        let tokens = tokenize(pattern).unwrap();
        let mut expected = 0;
        for token in &tokens {
            assert_eq!(token.position(), expected);
            expected += token.length();
        }
        assert_eq!(expected, pattern.len());
    }

    #[test]
    fn test_unclosed_placeholder() {
        assert_eq!(
            tokenize("foo($x)").unwrap_err(),
            PatternError::UnclosedPlaceholder { position: 4 }
        );
    }

    #[test]
    fn test_parse_rejects_empty_inputs() {
        assert_eq!(parse("   ").unwrap_err(), PatternError::EmptyPattern);
        assert_eq!(
            parse("foo($$)").unwrap_err(),
            PatternError::EmptyPlaceholderName { position: 4 }
        );
    }

    #[test]
    fn test_plain_code_has_single_text_node() {
        let ast = parse("Console.WriteLine(\"hi\");").unwrap();
        assert_eq!(ast.nodes().len(), 1);
        assert!(!ast.has_placeholders());
        assert_eq!(ast.nodes()[0].as_text(), Some("Console.WriteLine(\"hi\");"));
    }

    #[test]
    fn test_category_inference() {
        assert_eq!(PlaceholderCategory::infer("expr"), PlaceholderCategory::Expression);
        assert_eq!(PlaceholderCategory::infer("leftExpr"), PlaceholderCategory::Expression);
        assert_eq!(PlaceholderCategory::infer("stmt1"), PlaceholderCategory::Statement);
        assert_eq!(PlaceholderCategory::infer("args"), PlaceholderCategory::Arguments);
        assert_eq!(PlaceholderCategory::infer("Type"), PlaceholderCategory::Type);
        assert_eq!(PlaceholderCategory::infer("member"), PlaceholderCategory::Member);
        assert_eq!(PlaceholderCategory::infer("var"), PlaceholderCategory::Identifier);
        assert_eq!(PlaceholderCategory::infer("fieldName"), PlaceholderCategory::Identifier);
        assert_eq!(PlaceholderCategory::infer("x"), PlaceholderCategory::Any);
        // First hit wins
        assert_eq!(PlaceholderCategory::infer("exprType"), PlaceholderCategory::Expression);
    }

    #[test]
    fn test_repeated_placeholder_names() {
        let ast = parse("$a$ == $a$").unwrap();
        assert_eq!(ast.placeholders().count(), 2);
        assert_eq!(ast.placeholder_names().into_iter().collect::<Vec<_>>(), vec!["a"]);
    }

    #[test]
    fn test_constraints_attach_by_name() {
        let mut constraints = HashMap::new();
        constraints.insert("args".to_string(), vec![Constraint::count(Some(2), Some(2)).unwrap()]);
        let ast = parse_with_constraints("Method($args$)", &constraints).unwrap();
        assert_eq!(ast.constraints_for("args").len(), 1);

        let mut unknown = HashMap::new();
        unknown.insert("other".to_string(), vec![Constraint::exact("x", false)]);
        assert_eq!(
            parse_with_constraints("Method($args$)", &unknown).unwrap_err(),
            PatternError::UnknownConstraintTarget { name: "other".to_string() }
        );
    }

    #[test]
    fn test_original_text_round_trips() {
        for pattern in ["$x$++", "if ($cond$) { $stmt$; }", "new List<$type$>()"] {
            let ast = parse(pattern).unwrap();
            assert_eq!(ast.original_text(), pattern);
            assert!(validate(ast.original_text()).is_valid);
        }
    }

    #[test]
    fn test_validate_reports_errors() {
        let result = validate("foo($bad name$, $x)");
        assert!(!result.is_valid);
        assert_eq!(result.errors.len(), 1);

        let result = validate("foo($a b$)");
        assert!(!result.is_valid);
        assert!(result.errors[0].contains("invalid placeholder name"));
    }
}
