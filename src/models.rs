//! Core data models for SSR
//!
//! These structures carry matches, replacements and workspace results between
//! the engine stages, and define the JSON wire format consumed by editor
//! integrations.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::syntax::NodeId;

/// Represents a source code location span (byte range plus line:col range)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Span {
    /// Starting byte offset (inclusive)
    pub start: usize,
    /// Ending byte offset (exclusive)
    pub end: usize,
    /// Starting line number (1-indexed)
    pub start_line: usize,
    /// Starting column number (0-indexed, bytes)
    pub start_col: usize,
    /// Ending line number (1-indexed)
    pub end_line: usize,
    /// Ending column number (0-indexed, bytes)
    pub end_col: usize,
}

impl Span {
    pub fn new(
        start: usize,
        end: usize,
        start_line: usize,
        start_col: usize,
        end_line: usize,
        end_col: usize,
    ) -> Self {
        Self {
            start,
            end,
            start_line,
            start_col,
            end_line,
            end_col,
        }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    /// True if the two byte ranges share at least one byte
    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// A successful structural match
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Match {
    /// Matched node within its syntax tree
    pub node: NodeId,
    pub span: Span,
    /// Exact source text of the matched node
    pub matched_text: String,
    /// Placeholder name -> captured text
    pub placeholders: BTreeMap<String, String>,
    /// File the match came from (absent for in-memory sources)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_path: Option<PathBuf>,
}

impl Match {
    pub fn with_file(mut self, path: &Path) -> Self {
        self.file_path = Some(path.to_path_buf());
        self
    }

    /// 1-indexed line of the match start
    pub fn line(&self) -> usize {
        self.span.start_line
    }

    /// 1-indexed column of the match start
    pub fn column(&self) -> usize {
        self.span.start_col + 1
    }
}

/// Replacement text computed for one match
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReplacementResult {
    pub file_path: PathBuf,
    /// Byte range of the replaced region
    pub start_position: usize,
    pub end_position: usize,
    pub start_line: usize,
    /// 1-indexed column of the replaced region
    pub start_column: usize,
    /// Text currently at the region (used to detect stale edits)
    pub original_text: String,
    pub replacement_text: String,
    /// Leading whitespace of the line the region starts on
    pub base_indentation: String,
}

impl ReplacementResult {
    /// Byte length of the replaced region
    pub fn span_len(&self) -> usize {
        self.end_position.saturating_sub(self.start_position)
    }

    pub fn overlaps(&self, other: &ReplacementResult) -> bool {
        self.start_position < other.end_position && other.start_position < self.end_position
    }
}

/// Outcome of applying replacements to one file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationResult {
    pub success: bool,
    pub file_path: PathBuf,
    pub replacements_applied: usize,
    /// Replacements dropped because they overlapped an earlier one
    pub replacements_skipped: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl ApplicationResult {
    pub fn failed(file_path: &Path, message: impl Into<String>) -> Self {
        Self {
            success: false,
            file_path: file_path.to_path_buf(),
            replacements_applied: 0,
            replacements_skipped: 0,
            error_message: Some(message.into()),
        }
    }
}

/// Configuration for a workspace-wide search
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceSearchOptions {
    /// Glob over project file names/paths, e.g. `*.Tests.csproj`
    pub project_filter: Option<String>,
    /// Glob over workspace-relative file paths, e.g. `**/Controllers/*.cs`
    pub file_filter: Option<String>,
    /// Glob over workspace-relative directories, e.g. `src/**`
    pub folder_filter: Option<String>,
    /// Worker threads (0 = auto, one per logical core)
    pub max_degree_of_parallelism: usize,
    /// Directory names never descended into
    pub exclude_dirs: Vec<String>,
    /// Files larger than this are skipped (bytes)
    pub max_file_size: u64,
    /// Follow symbolic links while scanning
    pub follow_symlinks: bool,
    /// Report files with syntax errors instead of matching them
    pub skip_files_with_syntax_errors: bool,
}

impl Default for WorkspaceSearchOptions {
    fn default() -> Self {
        Self {
            project_filter: None,
            file_filter: None,
            folder_filter: None,
            max_degree_of_parallelism: 0,
            exclude_dirs: crate::workspace::DEFAULT_EXCLUDED_DIRS
                .iter()
                .map(|d| d.to_string())
                .collect(),
            max_file_size: 10 * 1024 * 1024, // 10 MB
            follow_symlinks: false,
            skip_files_with_syntax_errors: true,
        }
    }
}

/// Stage a workspace error was raised in
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, EnumString, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum WorkspaceErrorKind {
    Read,
    Parse,
    Compilation,
    Match,
    Replace,
}

/// A per-file (or per-project) failure collected during a workspace run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceError {
    pub file_path: PathBuf,
    pub error_type: WorkspaceErrorKind,
    pub message: String,
}

impl WorkspaceError {
    pub fn new(file_path: &Path, error_type: WorkspaceErrorKind, message: impl Into<String>) -> Self {
        Self {
            file_path: file_path.to_path_buf(),
            error_type,
            message: message.into(),
        }
    }
}

/// Aggregated result of a workspace search
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkspaceSearchResult {
    /// Matches sorted by (file, line, column)
    pub matches: Vec<Match>,
    pub errors: Vec<WorkspaceError>,
    pub total_files_scanned: usize,
    /// True if the run stopped early on cancellation
    pub cancelled: bool,
}

/// One match in the JSON wire format
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MatchRecord {
    pub file: String,
    pub line: usize,
    pub column: usize,
    pub matched_code: String,
    pub placeholders: BTreeMap<String, String>,
}

impl From<&Match> for MatchRecord {
    fn from(m: &Match) -> Self {
        Self {
            file: display_path(m.file_path.as_deref()),
            line: m.line(),
            column: m.column(),
            matched_code: m.matched_text.clone(),
            placeholders: m.placeholders.clone(),
        }
    }
}

/// Search response in the JSON wire format
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchReport {
    pub match_count: usize,
    pub matches: Vec<MatchRecord>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub errors: Vec<WorkspaceError>,
}

impl SearchReport {
    pub fn new(matches: &[Match], errors: &[WorkspaceError]) -> Self {
        Self {
            match_count: matches.len(),
            matches: matches.iter().map(MatchRecord::from).collect(),
            errors: errors.to_vec(),
        }
    }
}

/// One replacement in the JSON wire format
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ReplacementRecord {
    pub file: String,
    pub line: usize,
    pub column: usize,
    pub original_code: String,
    pub replacement_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_position: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_position: Option<usize>,
}

impl From<&ReplacementResult> for ReplacementRecord {
    fn from(r: &ReplacementResult) -> Self {
        Self {
            file: display_path(Some(&r.file_path)),
            line: r.start_line,
            column: r.start_column,
            original_code: r.original_text.clone(),
            replacement_code: r.replacement_text.clone(),
            start_position: Some(r.start_position),
            end_position: Some(r.end_position),
        }
    }
}

/// Replace response in the JSON wire format
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplaceReport {
    pub replacement_count: usize,
    pub replacements: Vec<ReplacementRecord>,
    /// Present only when edits were written (or attempted)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub applied: Option<Vec<ApplicationResult>>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub errors: Vec<WorkspaceError>,
}

fn display_path(path: Option<&Path>) -> String {
    path.map(|p| p.display().to_string()).unwrap_or_default()
}
