//! Placeholder constraints
//!
//! Constraints narrow what a placeholder may bind:
//!
//! - `type`: semantic type of the bound node (permissive when unresolved)
//! - `regex`: captured text must match a regular expression
//! - `count`: cardinality of the bound construct lies in `min..=max`
//! - `exact`: captured text equals a value (optionally ignoring case)
//!
//! On the command line and in `ssr.toml` constraints are written as
//! `name:kind=value`, e.g. `args:count=2..3` or `arg:type=System.String`.

use std::fmt;
use std::str::FromStr;

use regex::Regex;

use crate::error::PatternError;
use crate::syntax::{AstProvider, SyntaxNode, TypeDescriptor};

/// A single restriction on a placeholder binding
#[derive(Debug, Clone)]
pub enum Constraint {
    Type { type_name: String },
    Regex { pattern: Regex },
    Count { min: Option<usize>, max: Option<usize> },
    Exact { value: String, ignore_case: bool },
}

impl Constraint {
    pub fn type_name(type_name: impl Into<String>) -> Result<Self, PatternError> {
        let type_name = type_name.into();
        if type_name.trim().is_empty() {
            return Err(PatternError::invalid_constraint("type name must not be empty"));
        }
        Ok(Self::Type {
            type_name: type_name.trim().to_string(),
        })
    }

    pub fn regex(pattern: &str) -> Result<Self, PatternError> {
        let pattern = Regex::new(pattern).map_err(|e| {
            PatternError::invalid_constraint(format!("invalid regex '{}': {}", pattern, e))
        })?;
        Ok(Self::Regex { pattern })
    }

    /// Count constraint; at least one bound must be given and `min <= max`
    pub fn count(min: Option<usize>, max: Option<usize>) -> Result<Self, PatternError> {
        match (min, max) {
            (None, None) => Err(PatternError::invalid_constraint(
                "count needs a minimum or a maximum",
            )),
            (Some(lo), Some(hi)) if lo > hi => Err(PatternError::invalid_constraint(format!(
                "count minimum {} exceeds maximum {}",
                lo, hi
            ))),
            _ => Ok(Self::Count { min, max }),
        }
    }

    pub fn exact(value: impl Into<String>, ignore_case: bool) -> Self {
        Self::Exact {
            value: value.into(),
            ignore_case,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Constraint::Type { .. } => "type",
            Constraint::Regex { .. } => "regex",
            Constraint::Count { .. } => "count",
            Constraint::Exact { ignore_case: false, .. } => "exact",
            Constraint::Exact { ignore_case: true, .. } => "iexact",
        }
    }

    /// Whether `count` lies within this constraint's bounds
    ///
    /// Non-count constraints always accept.
    pub fn count_satisfied(&self, count: usize) -> bool {
        match self {
            Constraint::Count { min, max } => {
                min.is_none_or(|lo| count >= lo) && max.is_none_or(|hi| count <= hi)
            }
            _ => true,
        }
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constraint::Type { type_name } => write!(f, "type={}", type_name),
            Constraint::Regex { pattern } => write!(f, "regex={}", pattern.as_str()),
            Constraint::Count { min, max } => {
                let lo = min.map(|v| v.to_string()).unwrap_or_default();
                let hi = max.map(|v| v.to_string()).unwrap_or_default();
                write!(f, "count={}..{}", lo, hi)
            }
            Constraint::Exact { value, ignore_case } => {
                write!(f, "{}={}", if *ignore_case { "iexact" } else { "exact" }, value)
            }
        }
    }
}

/// A constraint bound to a placeholder name, parsed from `name:kind=value`
#[derive(Debug, Clone)]
pub struct ConstraintSpec {
    pub placeholder: String,
    pub constraint: Constraint,
}

impl FromStr for ConstraintSpec {
    type Err = PatternError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || {
            PatternError::invalid_constraint(format!(
                "'{}' is not of the form name:kind=value",
                s
            ))
        };

        let (placeholder, rest) = s.split_once(':').ok_or_else(malformed)?;
        let (kind, value) = rest.split_once('=').ok_or_else(malformed)?;
        let placeholder = placeholder.trim().trim_matches('$').to_string();
        if placeholder.is_empty() {
            return Err(malformed());
        }

        let constraint = match kind.trim().to_ascii_lowercase().as_str() {
            "type" => Constraint::type_name(value)?,
            "regex" => Constraint::regex(value)?,
            "count" => parse_count(value)?,
            "exact" => Constraint::exact(value, false),
            "iexact" => Constraint::exact(value, true),
            other => {
                return Err(PatternError::invalid_constraint(format!(
                    "unknown constraint kind '{}' (expected type, regex, count, exact or iexact)",
                    other
                )));
            }
        };

        Ok(Self {
            placeholder,
            constraint,
        })
    }
}

/// Parse `N`, `lo..hi`, `lo..` or `..hi`
fn parse_count(value: &str) -> Result<Constraint, PatternError> {
    let bound = |text: &str| -> Result<Option<usize>, PatternError> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(None);
        }
        text.parse::<usize>().map(Some).map_err(|_| {
            PatternError::invalid_constraint(format!("invalid count bound '{}'", text))
        })
    };

    match value.split_once("..") {
        Some((lo, hi)) => Constraint::count(bound(lo)?, bound(hi)?),
        None => {
            let exact = bound(value)?;
            Constraint::count(exact, exact)
        }
    }
}

/// Checks bound values against placeholder constraints
///
/// Type checks consult the [`AstProvider`]; without one (or when the provider
/// cannot resolve a type) type constraints pass.
#[derive(Clone, Copy, Default)]
pub struct ConstraintValidator<'a> {
    provider: Option<&'a dyn AstProvider>,
}

impl<'a> ConstraintValidator<'a> {
    pub fn new(provider: Option<&'a dyn AstProvider>) -> Self {
        Self { provider }
    }

    /// Conjunction of [`ConstraintValidator::validate`] over all constraints
    ///
    /// Count constraints are not checked here; the matcher evaluates them
    /// against the cardinality of the bound construct.
    pub fn validate_all(
        &self,
        constraints: &[Constraint],
        value: Option<&str>,
        node: Option<SyntaxNode<'_>>,
    ) -> bool {
        constraints.iter().all(|c| self.validate(c, value, node))
    }

    pub fn validate(
        &self,
        constraint: &Constraint,
        value: Option<&str>,
        node: Option<SyntaxNode<'_>>,
    ) -> bool {
        match constraint {
            Constraint::Type { type_name } => {
                let resolved = match (self.provider, node) {
                    (Some(provider), Some(node)) => provider.resolve_type(node),
                    _ => None,
                };
                match resolved {
                    Some(descriptor) => type_matches(&descriptor, type_name),
                    None => true,
                }
            }
            Constraint::Regex { pattern } => value.is_some_and(|v| pattern.is_match(v)),
            Constraint::Count { .. } => true,
            Constraint::Exact { value: expected, ignore_case } => value.is_some_and(|v| {
                if *ignore_case {
                    v.to_lowercase() == expected.to_lowercase()
                } else {
                    v == expected
                }
            }),
        }
    }
}

/// Whether a resolved type satisfies a constraint's type name
///
/// Accepts equality with the written name, the fully-qualified name or its
/// last segment, and qualification in either direction
/// (`Generic.List` vs `System.Collections.Generic.List`).
pub fn type_matches(descriptor: &TypeDescriptor, type_name: &str) -> bool {
    let fqn = descriptor.fully_qualified_name.as_str();
    let simple = fqn.rsplit('.').next().unwrap_or(fqn);

    if type_name == descriptor.name || type_name == fqn || type_name == simple {
        return true;
    }

    let suffix_of = |long: &str, short: &str| {
        long.len() > short.len()
            && long.ends_with(short)
            && long[..long.len() - short.len()].ends_with('.')
    };
    suffix_of(fqn, type_name) || suffix_of(type_name, fqn) || suffix_of(type_name, &descriptor.name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_regex_constraint() {
        let validator = ConstraintValidator::default();
        let c = Constraint::regex("^[A-Z]").unwrap();
        assert!(validator.validate(&c, Some("Hello"), None));
        assert!(!validator.validate(&c, Some("hello"), None));
        assert!(!validator.validate(&c, None, None));
    }

    #[test]
    fn test_invalid_regex_rejected() {
        assert!(matches!(
            Constraint::regex("(unclosed"),
            Err(PatternError::InvalidConstraint { .. })
        ));
    }

    #[test]
    fn test_exact_constraint() {
        let validator = ConstraintValidator::default();
        assert!(validator.validate(&Constraint::exact("Foo", false), Some("Foo"), None));
        assert!(!validator.validate(&Constraint::exact("Foo", false), Some("foo"), None));
        assert!(validator.validate(&Constraint::exact("Foo", true), Some("fOO"), None));
    }

    #[test]
    fn test_count_bounds() {
        let c = Constraint::count(Some(2), Some(3)).unwrap();
        assert!(!c.count_satisfied(1));
        assert!(c.count_satisfied(2));
        assert!(c.count_satisfied(3));
        assert!(!c.count_satisfied(4));

        let open = Constraint::count(Some(1), None).unwrap();
        assert!(open.count_satisfied(100));

        assert!(Constraint::count(None, None).is_err());
        assert!(Constraint::count(Some(3), Some(2)).is_err());

        // Count constraints never fail value validation
        assert!(ConstraintValidator::default().validate(&c, Some("a"), None));
    }

    #[test]
    fn test_type_constraint_is_permissive_without_provider() {
        let validator = ConstraintValidator::default();
        let c = Constraint::type_name("System.String").unwrap();
        assert!(validator.validate(&c, Some("x"), None));
    }

    #[test]
    fn test_type_matches() {
        let string = TypeDescriptor::new("string", "System.String");
        assert!(type_matches(&string, "string"));
        assert!(type_matches(&string, "System.String"));
        assert!(type_matches(&string, "String"));
        assert!(!type_matches(&string, "Int32"));

        let list = TypeDescriptor::new("List", "System.Collections.Generic.List");
        assert!(type_matches(&list, "Generic.List"));
        assert!(!type_matches(&list, "tList"));

        let local = TypeDescriptor::new("Widget", "Widget");
        assert!(type_matches(&local, "MyApp.Widget"));
    }

    #[test]
    fn test_parse_constraint_specs() {
        let spec: ConstraintSpec = "args:count=2..3".parse().unwrap();
        assert_eq!(spec.placeholder, "args");
        assert!(spec.constraint.count_satisfied(2));
        assert!(!spec.constraint.count_satisfied(4));

        let spec: ConstraintSpec = "$arg$:type=System.String".parse().unwrap();
        assert_eq!(spec.placeholder, "arg");
        assert_eq!(spec.constraint.kind_name(), "type");

        let spec: ConstraintSpec = "n:count=2".parse().unwrap();
        assert!(spec.constraint.count_satisfied(2));
        assert!(!spec.constraint.count_satisfied(3));

        let spec: ConstraintSpec = "n:count=..4".parse().unwrap();
        assert!(spec.constraint.count_satisfied(0));

        // Values may contain '=' and ':'
        let spec: ConstraintSpec = "x:regex=^a=b:c$".parse().unwrap();
        assert_eq!(spec.constraint.to_string(), "regex=^a=b:c$");

        assert!("args".parse::<ConstraintSpec>().is_err());
        assert!("args:size=2".parse::<ConstraintSpec>().is_err());
        assert!("args:count=x..2".parse::<ConstraintSpec>().is_err());
    }
}
