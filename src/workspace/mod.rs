//! Workspace-wide search
//!
//! - [`scanner`]: project and source file discovery with glob filters
//! - [`compilation`]: fingerprinted cache of parsed projects and files
//! - [`search`]: parallel per-file matching with progress and cancellation
//! - [`progress`]: progress reporting hooks

pub mod compilation;
pub mod progress;
pub mod scanner;
pub mod search;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub use compilation::{Compilation, CompilationManager, CompilationOutcome, LoadError, ParsedFile};
pub use progress::{ProgressReporter, ProgressStage, ProgressUpdate, SilentProgress, TerminalProgress};
pub use scanner::{FileFilter, WorkspaceScanner};
pub use search::WorkspaceMatcher;

/// Directory names skipped during scanning unless overridden
pub const DEFAULT_EXCLUDED_DIRS: &[&str] = &["bin", "obj", ".git", ".vs", "node_modules", "packages"];

/// Shared flag for stopping a running workspace search
///
/// Clones share the same flag. Workers check it before each file.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}
