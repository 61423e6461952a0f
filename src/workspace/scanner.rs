//! Project and source file discovery
//!
//! Walks the workspace with the `ignore` crate, so `.gitignore` rules and
//! hidden directories are respected, and prunes build output directories
//! before descending into them.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use globset::{Glob, GlobMatcher};
use ignore::WalkBuilder;

use crate::models::WorkspaceSearchOptions;

const PROJECT_EXTENSION: &str = "csproj";
const SOURCE_EXTENSION: &str = "cs";

/// Glob filters over workspace-relative paths
///
/// An unset filter accepts everything.
#[derive(Debug, Clone, Default)]
pub struct FileFilter {
    file: Option<GlobMatcher>,
    folder: Option<GlobMatcher>,
    project: Option<GlobMatcher>,
}

impl FileFilter {
    /// Compile the filters named in `options`
    pub fn from_options(options: &WorkspaceSearchOptions) -> Result<Self> {
        Ok(Self {
            file: compile_glob(options.file_filter.as_deref(), "file")?,
            folder: compile_glob(options.folder_filter.as_deref(), "folder")?,
            project: compile_glob(options.project_filter.as_deref(), "project")?,
        })
    }

    pub fn has_project_filter(&self) -> bool {
        self.project.is_some()
    }

    /// Whether a source file passes the file and folder filters
    ///
    /// `relative` is the file path relative to the workspace root.
    pub fn accepts_file(&self, relative: &Path) -> bool {
        let file_ok = self
            .file
            .as_ref()
            .is_none_or(|glob| matches_path_or_name(glob, relative));

        let folder_ok = self.folder.as_ref().is_none_or(|glob| {
            relative
                .parent()
                .into_iter()
                .flat_map(Path::ancestors)
                .filter(|dir| !dir.as_os_str().is_empty())
                .any(|dir| matches_path_or_name(glob, dir))
        });

        file_ok && folder_ok
    }

    /// Whether a project file passes the project filter
    pub fn accepts_project(&self, relative: &Path) -> bool {
        self.project
            .as_ref()
            .is_none_or(|glob| matches_path_or_name(glob, relative))
    }
}

fn compile_glob(pattern: Option<&str>, what: &str) -> Result<Option<GlobMatcher>> {
    pattern
        .filter(|p| !p.trim().is_empty())
        .map(|p| {
            Glob::new(p)
                .map(|glob| glob.compile_matcher())
                .with_context(|| format!("Invalid {} filter: {}", what, p))
        })
        .transpose()
}

fn matches_path_or_name(glob: &GlobMatcher, path: &Path) -> bool {
    glob.is_match(path) || path.file_name().is_some_and(|name| glob.is_match(name))
}

/// Finds projects and source files under a workspace root
#[derive(Debug, Clone)]
pub struct WorkspaceScanner {
    root: PathBuf,
    exclude_dirs: Vec<String>,
    max_file_size: u64,
    follow_symlinks: bool,
}

impl WorkspaceScanner {
    /// Scanner with the default exclusions and size limit
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_options(root, &WorkspaceSearchOptions::default())
    }

    pub fn with_options(root: impl Into<PathBuf>, options: &WorkspaceSearchOptions) -> Self {
        Self {
            root: root.into(),
            exclude_dirs: options.exclude_dirs.clone(),
            max_file_size: options.max_file_size,
            follow_symlinks: options.follow_symlinks,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// All `*.csproj` files, sorted
    pub fn find_projects(&self) -> Result<Vec<PathBuf>> {
        self.walk(PROJECT_EXTENSION)
    }

    /// All `*.cs` files accepted by `filter`, sorted
    pub fn find_csharp_files(&self, filter: &FileFilter) -> Result<Vec<PathBuf>> {
        let mut files = self.walk(SOURCE_EXTENSION)?;
        files.retain(|path| filter.accepts_file(self.relative(path)));
        Ok(files)
    }

    /// Path relative to the workspace root (unchanged if outside it)
    pub fn relative<'p>(&self, path: &'p Path) -> &'p Path {
        path.strip_prefix(&self.root).unwrap_or(path)
    }

    fn walk(&self, extension: &str) -> Result<Vec<PathBuf>> {
        if !self.root.exists() {
            anyhow::bail!("Workspace path does not exist: {}", self.root.display());
        }

        let excluded = self.exclude_dirs.clone();
        let walker = WalkBuilder::new(&self.root)
            .follow_links(self.follow_symlinks)
            .filter_entry(move |entry| {
                let is_dir = entry.file_type().is_some_and(|ft| ft.is_dir());
                let name = entry.file_name().to_string_lossy();
                !(is_dir && excluded.iter().any(|d| d.eq_ignore_ascii_case(&name)))
            })
            .build();

        let mut files = Vec::new();
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    log::warn!("Skipping unreadable entry: {}", e);
                    continue;
                }
            };
            if !entry.file_type().is_some_and(|ft| ft.is_file()) {
                continue;
            }

            let path = entry.path();
            let ext_matches = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case(extension));
            if !ext_matches {
                continue;
            }

            if let Ok(metadata) = entry.metadata() {
                if metadata.len() > self.max_file_size {
                    log::debug!("Skipping {} (too large: {} bytes)", path.display(), metadata.len());
                    continue;
                }
            }

            files.push(path.to_path_buf());
        }

        files.sort();
        log::debug!("Found {} .{} files under {}", files.len(), extension, self.root.display());
        Ok(files)
    }
}

/// The project owning `file`: the one whose directory is the deepest
/// ancestor of the file
pub fn owning_project<'p>(file: &Path, projects: &'p [PathBuf]) -> Option<&'p PathBuf> {
    projects
        .iter()
        .filter(|project| project.parent().is_some_and(|dir| file.starts_with(dir)))
        .max_by_key(|project| project.components().count())
}
