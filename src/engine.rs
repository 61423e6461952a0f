//! Search and replace entry points
//!
//! [`SearchEngine`] ties the pattern parser, matcher, replacement engine and
//! workspace search together behind three operations: `search`,
//! `parse_and_validate_replace` and `replace`.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::constraints::{Constraint, ConstraintSpec};
use crate::error::PatternError;
use crate::matcher::StructuralMatcher;
use crate::models::{
    ApplicationResult, Match, ReplaceReport, ReplacementRecord, ReplacementResult, SearchReport, WorkspaceError,
    WorkspaceErrorKind, WorkspaceSearchOptions,
};
use crate::pattern::{self, parse_replace_pattern, PatternAst, ReplacePattern};
use crate::replace::{apply_replacement, ReplacementApplier};
use crate::syntax::csharp::CSharpProvider;
use crate::syntax::AstProvider;
use crate::workspace::{
    CancellationToken, CompilationManager, ProgressReporter, SilentProgress, WorkspaceMatcher,
};

/// Where to search
#[derive(Debug, Clone)]
pub enum SearchScope {
    SingleFile(PathBuf),
    Workspace {
        path: PathBuf,
        options: WorkspaceSearchOptions,
    },
}

impl SearchScope {
    /// Workspace scope for a directory, single-file scope otherwise
    pub fn for_path(path: impl Into<PathBuf>, options: WorkspaceSearchOptions) -> Self {
        let path = path.into();
        if path.is_dir() {
            SearchScope::Workspace { path, options }
        } else {
            SearchScope::SingleFile(path)
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SearchOutcome {
    pub matches: Vec<Match>,
    /// Per-file failures (workspace scope only)
    pub errors: Vec<WorkspaceError>,
    pub files_scanned: usize,
    pub cancelled: bool,
}

impl SearchOutcome {
    pub fn report(&self) -> SearchReport {
        SearchReport::new(&self.matches, &self.errors)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ReplaceOutcome {
    pub replacements: Vec<ReplacementResult>,
    /// Per-file write results, present when edits were applied
    pub applied: Option<Vec<ApplicationResult>>,
    pub errors: Vec<WorkspaceError>,
    pub cancelled: bool,
}

impl ReplaceOutcome {
    pub fn report(&self) -> ReplaceReport {
        ReplaceReport {
            replacement_count: self.replacements.len(),
            replacements: self.replacements.iter().map(ReplacementRecord::from).collect(),
            applied: self.applied.clone(),
            errors: self.errors.clone(),
        }
    }
}

/// Structural search and replace over files and workspaces
pub struct SearchEngine {
    provider: Arc<dyn AstProvider>,
    workspace: WorkspaceMatcher,
    progress: Arc<dyn ProgressReporter>,
    cancel: CancellationToken,
}

impl Default for SearchEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl SearchEngine {
    /// Engine for C# sources
    pub fn new() -> Self {
        Self::with_provider(Arc::new(CSharpProvider))
    }

    pub fn with_provider(provider: Arc<dyn AstProvider>) -> Self {
        let compilations = Arc::new(CompilationManager::new(Arc::clone(&provider)));
        Self {
            provider,
            workspace: WorkspaceMatcher::new(compilations),
            progress: Arc::new(SilentProgress),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressReporter>) -> Self {
        self.progress = progress;
        self
    }

    /// Token that cancels workspace searches started by this engine
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn compilations(&self) -> &Arc<CompilationManager> {
        self.workspace.compilations()
    }

    /// Parse a search pattern with constraints in `name:kind=value` form
    pub fn parse_pattern(&self, text: &str, constraints: &[ConstraintSpec]) -> Result<PatternAst, PatternError> {
        let mut by_name: HashMap<String, Vec<Constraint>> = HashMap::new();
        for spec in constraints {
            by_name
                .entry(spec.placeholder.clone())
                .or_default()
                .push(spec.constraint.clone());
        }
        pattern::parse_with_constraints(text, &by_name)
    }

    /// Find matches in source text that is not on disk
    pub fn search_source(&self, pattern: &PatternAst, source: &str) -> Result<Vec<Match>> {
        let tree = self.provider.parse(source)?;
        let matches = StructuralMatcher::new(self.provider.as_ref()).find_matches(pattern, &tree)?;
        Ok(matches)
    }

    pub fn search(&self, pattern: &PatternAst, scope: &SearchScope) -> Result<SearchOutcome> {
        match scope {
            SearchScope::SingleFile(path) => {
                let matches = self.search_file(pattern, path)?;
                Ok(SearchOutcome {
                    matches,
                    errors: Vec::new(),
                    files_scanned: 1,
                    cancelled: false,
                })
            }
            SearchScope::Workspace { path, options } => {
                let result = self.workspace.search_workspace(
                    pattern,
                    path,
                    options,
                    self.progress.as_ref(),
                    &self.cancel,
                )?;
                Ok(SearchOutcome {
                    matches: result.matches,
                    errors: result.errors,
                    files_scanned: result.total_files_scanned,
                    cancelled: result.cancelled,
                })
            }
        }
    }

    /// Parse a replacement template against the search pattern it rewrites
    pub fn parse_and_validate_replace(
        &self,
        search: &PatternAst,
        replace_text: &str,
    ) -> Result<ReplacePattern, PatternError> {
        parse_replace_pattern(replace_text, search)
    }

    /// Compute replacements for every match, and write them when `apply` is set
    ///
    /// A match whose replacement cannot be rendered is reported in `errors`
    /// and skipped; the other matches are still replaced.
    pub fn replace(
        &self,
        pattern: &PatternAst,
        replace_text: &str,
        scope: &SearchScope,
        apply: bool,
    ) -> Result<ReplaceOutcome> {
        let template = self
            .parse_and_validate_replace(pattern, replace_text)
            .context("Invalid replacement pattern")?;
        let found = self.search(pattern, scope)?;

        let mut by_file: BTreeMap<PathBuf, Vec<Match>> = BTreeMap::new();
        for m in found.matches {
            by_file
                .entry(m.file_path.clone().unwrap_or_default())
                .or_default()
                .push(m);
        }

        let mut outcome = ReplaceOutcome {
            errors: found.errors,
            cancelled: found.cancelled,
            ..Default::default()
        };

        for (file, matches) in by_file {
            let source = match self.compilations().get_or_parse_file(&file) {
                Ok(parsed) => parsed.tree,
                Err(e) => {
                    outcome
                        .errors
                        .push(WorkspaceError::new(&file, WorkspaceErrorKind::Read, e.to_string()));
                    continue;
                }
            };
            for m in &matches {
                match apply_replacement(m, source.source(), &template) {
                    Ok(result) => outcome.replacements.push(result),
                    Err(e) => {
                        log::warn!("{}:{}: {}", file.display(), m.line(), e);
                        outcome
                            .errors
                            .push(WorkspaceError::new(&file, WorkspaceErrorKind::Replace, e.to_string()));
                    }
                }
            }
        }

        log::info!("Computed {} replacements", outcome.replacements.len());

        if apply {
            let results = ReplacementApplier::new(false).apply_replacements(&outcome.replacements);
            for failed in results.iter().filter(|r| !r.success) {
                log::warn!(
                    "Failed to apply replacements to {}: {}",
                    failed.file_path.display(),
                    failed.error_message.as_deref().unwrap_or("unknown error")
                );
            }
            for changed in results.iter().filter(|r| r.success) {
                self.compilations().invalidate(&changed.file_path);
            }
            outcome.applied = Some(results);
        }

        Ok(outcome)
    }

    fn search_file(&self, pattern: &PatternAst, path: &Path) -> Result<Vec<Match>> {
        if !path.is_file() {
            anyhow::bail!("File not found: {}", path.display());
        }
        let parsed = self
            .compilations()
            .get_or_parse_file(path)
            .with_context(|| format!("Failed to load {}", path.display()))?;
        if let Some(span) = parsed.tree.first_error() {
            log::warn!(
                "{} has syntax errors (first at line {}); matching anyway",
                path.display(),
                span.start_line
            );
        }
        let matches = StructuralMatcher::new(self.provider.as_ref()).find_matches(pattern, &parsed.tree)?;
        Ok(matches.into_iter().map(|m| m.with_file(path)).collect())
    }
}
