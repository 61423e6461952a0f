//! Parallel pattern search across a workspace
//!
//! A search runs in four stages reported through [`ProgressReporter`]:
//! scanning for projects and sources, loading project compilations,
//! searching each file on a bounded rayon pool, and completion. Failures are
//! recorded per file and never abort the search.

use std::collections::HashMap;
use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use rayon::prelude::*;

use super::compilation::{CompilationManager, LoadError};
use super::progress::{ProgressReporter, ProgressStage, ProgressUpdate};
use super::scanner::{owning_project, FileFilter, WorkspaceScanner};
use super::CancellationToken;
use crate::matcher::{CompiledPattern, StructuralMatcher};
use crate::models::{Match, WorkspaceError, WorkspaceErrorKind, WorkspaceSearchOptions, WorkspaceSearchResult};
use crate::pattern::PatternAst;
use crate::syntax::SyntaxTree;

/// Outcome of searching one file
struct FileOutcome {
    matches: Vec<Match>,
    error: Option<WorkspaceError>,
}

impl FileOutcome {
    fn failed(file: &Path, kind: WorkspaceErrorKind, message: impl Into<String>) -> Self {
        Self {
            matches: Vec::new(),
            error: Some(WorkspaceError::new(file, kind, message)),
        }
    }
}

/// Runs a pattern over every source file of a workspace
#[derive(Clone)]
pub struct WorkspaceMatcher {
    compilations: Arc<CompilationManager>,
}

impl WorkspaceMatcher {
    pub fn new(compilations: Arc<CompilationManager>) -> Self {
        Self { compilations }
    }

    pub fn compilations(&self) -> &Arc<CompilationManager> {
        &self.compilations
    }

    /// Search every C# file under `root`
    ///
    /// Returns an error only when the search cannot start (bad pattern,
    /// bad filter, missing root). A cancelled search returns the matches
    /// found so far with `cancelled` set.
    pub fn search_workspace(
        &self,
        pattern: &PatternAst,
        root: &Path,
        options: &WorkspaceSearchOptions,
        progress: &dyn ProgressReporter,
        cancel: &CancellationToken,
    ) -> Result<WorkspaceSearchResult> {
        let started = Instant::now();
        let provider = Arc::clone(self.compilations.provider());
        let matcher = StructuralMatcher::new(provider.as_ref());
        let compiled = matcher
            .compile(pattern)
            .with_context(|| format!("Failed to compile pattern '{}'", pattern.original_text()))?;

        let mut result = WorkspaceSearchResult::default();

        // Scanning
        progress.report(ProgressUpdate::new(ProgressStage::Scanning, 0, 0));
        let scanner = WorkspaceScanner::with_options(root, options);
        let filter = FileFilter::from_options(options)?;
        let projects = scanner.find_projects()?;
        let selected: Vec<PathBuf> = projects
            .iter()
            .filter(|project| filter.accepts_project(scanner.relative(project)))
            .cloned()
            .collect();
        let mut files = scanner.find_csharp_files(&filter)?;
        if filter.has_project_filter() {
            files.retain(|file| owning_project(file, &projects).is_some_and(|owner| selected.contains(owner)));
        }
        log::info!(
            "Scanned {}: {} source files, {} projects",
            root.display(),
            files.len(),
            selected.len()
        );

        if cancel.is_cancelled() {
            return Ok(finish_cancelled(result, progress));
        }

        let num_threads = if options.max_degree_of_parallelism == 0 {
            num_cpus::get().max(1)
        } else {
            options.max_degree_of_parallelism
        };
        log::debug!("Using {} threads for workspace search", num_threads);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .build()
            .context("Failed to create thread pool")?;

        // Loading
        let needed: Vec<&PathBuf> = selected
            .iter()
            .filter(|project| files.iter().any(|file| owning_project(file, &projects) == Some(*project)))
            .collect();
        let units = self.load_projects(&pool, &needed, options, progress, cancel, &mut result.errors);

        if cancel.is_cancelled() {
            return Ok(finish_cancelled(result, progress));
        }

        // Searching
        let total = files.len();
        let processed = AtomicUsize::new(0);
        let outcomes: Vec<Option<FileOutcome>> = pool.install(|| {
            files
                .par_iter()
                .map(|file| {
                    if cancel.is_cancelled() {
                        return None;
                    }
                    let outcome = self.search_file(&matcher, &compiled, file, &units, options);
                    let done = processed.fetch_add(1, Ordering::Relaxed) + 1;
                    progress.report(ProgressUpdate::new(ProgressStage::Searching, done, total));
                    Some(outcome)
                })
                .collect()
        });

        for outcome in outcomes.into_iter().flatten() {
            result.total_files_scanned += 1;
            result.matches.extend(outcome.matches);
            result.errors.extend(outcome.error);
        }
        result.cancelled = cancel.is_cancelled();

        result.matches.sort_by(|a, b| {
            a.file_path
                .cmp(&b.file_path)
                .then(a.span.start.cmp(&b.span.start))
        });
        result.errors.sort_by(|a, b| a.file_path.cmp(&b.file_path));

        log::info!(
            "Workspace search finished in {:?}: {} matches in {} files, {} errors",
            started.elapsed(),
            result.matches.len(),
            result.total_files_scanned,
            result.errors.len()
        );
        progress.report(
            ProgressUpdate::new(ProgressStage::Complete, result.total_files_scanned, total)
                .with_message(format!("{} matches", result.matches.len())),
        );
        Ok(result)
    }

    /// Build compilations for `projects`, returning their trees by canonical path
    fn load_projects(
        &self,
        pool: &rayon::ThreadPool,
        projects: &[&PathBuf],
        options: &WorkspaceSearchOptions,
        progress: &dyn ProgressReporter,
        cancel: &CancellationToken,
        errors: &mut Vec<WorkspaceError>,
    ) -> HashMap<PathBuf, Arc<SyntaxTree>> {
        let total = projects.len();
        let loaded = AtomicUsize::new(0);
        progress.report(ProgressUpdate::new(ProgressStage::Loading, 0, total));

        let outcomes: Vec<_> = pool.install(|| {
            projects
                .par_iter()
                .filter(|_| !cancel.is_cancelled())
                .map(|project| {
                    let outcome = self.compilations.get_or_build_compilation_with(project, options);
                    let done = loaded.fetch_add(1, Ordering::Relaxed) + 1;
                    progress.report(ProgressUpdate::new(ProgressStage::Loading, done, total));
                    (*project, outcome)
                })
                .collect()
        });

        let mut units = HashMap::new();
        for (project, outcome) in outcomes {
            match outcome.compilation {
                Some(compilation) => {
                    if outcome.is_from_cache {
                        log::debug!("Using cached compilation for {}", project.display());
                    }
                    units.extend(
                        compilation
                            .units()
                            .map(|(path, tree)| (path.clone(), Arc::clone(tree))),
                    );
                }
                None => {
                    // Files of this project are parsed individually instead
                    log::warn!("Could not load project {}", project.display());
                    errors.extend(
                        outcome
                            .errors
                            .into_iter()
                            .map(|message| WorkspaceError::new(project, WorkspaceErrorKind::Compilation, message)),
                    );
                }
            }
        }
        units
    }

    fn search_file(
        &self,
        matcher: &StructuralMatcher<'_>,
        compiled: &CompiledPattern<'_>,
        file: &Path,
        units: &HashMap<PathBuf, Arc<SyntaxTree>>,
        options: &WorkspaceSearchOptions,
    ) -> FileOutcome {
        let key = fs::canonicalize(file).unwrap_or_else(|_| file.to_path_buf());
        let tree = match units.get(&key) {
            Some(tree) => Arc::clone(tree),
            None => match self.compilations.get_or_parse_file(file) {
                Ok(parsed) => parsed.tree,
                Err(e) => {
                    let kind = match e {
                        LoadError::Read { .. } => WorkspaceErrorKind::Read,
                        LoadError::Parse { .. } => WorkspaceErrorKind::Parse,
                    };
                    log::warn!("{}", e);
                    return FileOutcome::failed(file, kind, e.to_string());
                }
            },
        };

        if options.skip_files_with_syntax_errors {
            if let Some(span) = tree.first_error() {
                log::debug!("Skipping {} (syntax errors)", file.display());
                return FileOutcome::failed(
                    file,
                    WorkspaceErrorKind::Parse,
                    format!(
                        "syntax error at line {}, column {}",
                        span.start_line,
                        span.start_col + 1
                    ),
                );
            }
        }

        let found = panic::catch_unwind(AssertUnwindSafe(|| {
            matcher.find_compiled(compiled, &tree, tree.root().id())
        }));
        match found {
            Ok(matches) => {
                log::debug!("{}: {} matches", file.display(), matches.len());
                FileOutcome {
                    matches: matches.into_iter().map(|m| m.with_file(file)).collect(),
                    error: None,
                }
            }
            Err(_) => FileOutcome::failed(file, WorkspaceErrorKind::Match, "matching failed unexpectedly"),
        }
    }
}

fn finish_cancelled(mut result: WorkspaceSearchResult, progress: &dyn ProgressReporter) -> WorkspaceSearchResult {
    log::info!("Workspace search cancelled");
    result.cancelled = true;
    progress.report(
        ProgressUpdate::new(ProgressStage::Complete, result.total_files_scanned, 0).with_message("cancelled"),
    );
    result
}
