//! Replacement templates
//!
//! A replacement template uses the same `$name$` syntax as search patterns.
//! Every placeholder it references must be defined by the search pattern.

use serde::{Deserialize, Serialize};

use super::{tokenize, PatternAst, Token};
use crate::error::PatternError;

/// Node of a parsed replacement template
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReplacePatternNode {
    Text(String),
    Placeholder(String),
}

/// A parsed replacement template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplacePattern {
    original_text: String,
    nodes: Vec<ReplacePatternNode>,
}

impl ReplacePattern {
    pub fn original_text(&self) -> &str {
        &self.original_text
    }

    pub fn nodes(&self) -> &[ReplacePatternNode] {
        &self.nodes
    }

    /// Placeholder names referenced by the template, in order of appearance
    pub fn referenced_placeholders(&self) -> impl Iterator<Item = &str> {
        self.nodes.iter().filter_map(|node| match node {
            ReplacePatternNode::Placeholder(name) => Some(name.as_str()),
            ReplacePatternNode::Text(_) => None,
        })
    }
}

/// Parse a replacement template against the search pattern it belongs to
///
/// An empty template is allowed and deletes the matched code.
pub fn parse_replace_pattern(
    replace_text: &str,
    search: &PatternAst,
) -> Result<ReplacePattern, PatternError> {
    let available = search.placeholder_names();

    let nodes = tokenize(replace_text)?
        .into_iter()
        .map(|token| match token {
            Token::Text { text, .. } => Ok(ReplacePatternNode::Text(text)),
            Token::Placeholder { name, position, .. } => {
                if name.is_empty() {
                    return Err(PatternError::EmptyPlaceholderName { position });
                }
                if !available.contains(name.as_str()) {
                    return Err(PatternError::UndefinedPlaceholder {
                        name,
                        available: available.iter().map(|s| s.to_string()).collect(),
                    });
                }
                Ok(ReplacePatternNode::Placeholder(name))
            }
        })
        .collect::<Result<Vec<_>, PatternError>>()?;

    Ok(ReplacePattern {
        original_text: replace_text.to_string(),
        nodes,
    })
}
