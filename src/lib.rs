//! ssr: structural search and replace for C#
//!
//! Patterns are code with `$name$` placeholders. The engine parses source
//! into a syntax tree, finds every node the pattern matches, captures the
//! text bound to each placeholder, and can rewrite matches from a
//! replacement template.
//!
//! # Architecture
//!
//! - **Syntax**: [`syntax::AstProvider`] turns source into an owned tree
//!   annotated with language-neutral traits; [`syntax::csharp`] is the C#
//!   adapter built on tree-sitter
//! - **Patterns**: [`pattern`] parses search and replacement templates
//! - **Matcher**: [`matcher::StructuralMatcher`] binds patterns to nodes and
//!   checks [`constraints`]
//! - **Replace**: [`replace`] renders and applies edits
//! - **Workspace**: [`workspace`] scans, caches and searches many files in
//!   parallel
//!
//! # Example Usage
//!
//! ```no_run
//! use ssr::engine::{SearchEngine, SearchScope};
//! use ssr::models::WorkspaceSearchOptions;
//!
//! let engine = SearchEngine::new();
//! let pattern = engine.parse_pattern("Console.WriteLine($arg$)", &[]).unwrap();
//! let scope = SearchScope::Workspace {
//!     path: ".".into(),
//!     options: WorkspaceSearchOptions::default(),
//! };
//! let outcome = engine.search(&pattern, &scope).unwrap();
//!
//! for m in &outcome.matches {
//!     println!("{}:{} {}", m.line(), m.column(), m.placeholders["arg"]);
//! }
//! ```

pub mod cli;
pub mod config;
pub mod constraints;
pub mod engine;
pub mod error;
pub mod formatter;
pub mod matcher;
pub mod models;
pub mod output;
pub mod pattern;
pub mod replace;
pub mod syntax;
pub mod workspace;

// Re-export commonly used types
pub use constraints::{Constraint, ConstraintSpec};
pub use engine::{ReplaceOutcome, SearchEngine, SearchOutcome, SearchScope};
pub use error::{PatternError, ReplaceError};
pub use matcher::StructuralMatcher;
pub use models::{Match, ReplacementResult, Span, WorkspaceSearchOptions, WorkspaceSearchResult};
pub use pattern::{parse, parse_replace_pattern, PatternAst, PlaceholderCategory};
pub use syntax::csharp::CSharpProvider;
pub use syntax::AstProvider;
