//! Compilation cache
//!
//! A compilation is the set of parsed source files belonging to one project.
//! Entries are keyed by canonical path and guarded by a per-key mutex slot,
//! so concurrent requests for the same key build it once while different
//! keys build in parallel. Each entry carries a blake3 fingerprint; a
//! fingerprint mismatch on lookup rebuilds the entry.
//!
//! Project fingerprints hash (path, length, mtime) of the project file and
//! every source in it. File fingerprints hash the file content.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::UNIX_EPOCH;

use dashmap::DashMap;
use thiserror::Error;

use super::scanner::{FileFilter, WorkspaceScanner};
use crate::models::WorkspaceSearchOptions;
use crate::syntax::{AstProvider, SyntaxTree};

/// Parsed sources of one project
#[derive(Debug)]
pub struct Compilation {
    project: PathBuf,
    units: BTreeMap<PathBuf, Arc<SyntaxTree>>,
    diagnostics: Vec<String>,
}

impl Compilation {
    /// Canonical path of the project file
    pub fn project(&self) -> &Path {
        &self.project
    }

    /// Parsed tree for a canonical source path
    pub fn unit(&self, path: &Path) -> Option<&Arc<SyntaxTree>> {
        self.units.get(path)
    }

    pub fn units(&self) -> impl Iterator<Item = (&PathBuf, &Arc<SyntaxTree>)> {
        self.units.iter()
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Problems found while building (unreadable files, syntax errors)
    pub fn diagnostics(&self) -> &[String] {
        &self.diagnostics
    }
}

/// Result of [`CompilationManager::get_or_build_compilation`]
#[derive(Debug, Clone)]
pub struct CompilationOutcome {
    /// `None` if the project could not be loaded at all
    pub compilation: Option<Arc<Compilation>>,
    pub is_from_cache: bool,
    pub errors: Vec<String>,
}

/// Result of [`CompilationManager::get_or_parse_file`]
#[derive(Debug, Clone)]
pub struct ParsedFile {
    pub tree: Arc<SyntaxTree>,
    pub is_from_cache: bool,
}

/// Why a single file could not be loaded
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },
}

struct CacheEntry<T> {
    value: Arc<T>,
    fingerprint: String,
}

type Slot<T> = Arc<Mutex<Option<CacheEntry<T>>>>;

/// Owned, thread-safe cache of compilations and parsed files
pub struct CompilationManager {
    provider: Arc<dyn AstProvider>,
    projects: DashMap<PathBuf, Slot<Compilation>>,
    files: DashMap<PathBuf, Slot<SyntaxTree>>,
}

impl CompilationManager {
    pub fn new(provider: Arc<dyn AstProvider>) -> Self {
        Self {
            provider,
            projects: DashMap::new(),
            files: DashMap::new(),
        }
    }

    pub fn provider(&self) -> &Arc<dyn AstProvider> {
        &self.provider
    }

    /// Compilation for a project file with default scan settings
    pub fn get_or_build_compilation(&self, project_path: &Path) -> CompilationOutcome {
        self.get_or_build_compilation_with(project_path, &WorkspaceSearchOptions::default())
    }

    /// Compilation for a project file, rebuilt if any of its sources changed
    ///
    /// Sources are the `*.cs` files under the project directory that a scan
    /// with `options` would find (excluded directories, size limit and
    /// symlink policy apply), minus those under nested project directories.
    pub fn get_or_build_compilation_with(
        &self,
        project_path: &Path,
        options: &WorkspaceSearchOptions,
    ) -> CompilationOutcome {
        let key = canonical(project_path);
        if !key.is_file() {
            return CompilationOutcome {
                compilation: None,
                is_from_cache: false,
                errors: vec![format!("project file not found: {}", project_path.display())],
            };
        }

        let sources = match project_sources(&key, options) {
            Ok(sources) => sources,
            Err(e) => {
                return CompilationOutcome {
                    compilation: None,
                    is_from_cache: false,
                    errors: vec![format!("failed to load project {}: {:#}", project_path.display(), e)],
                };
            }
        };
        let fingerprint = stamp_fingerprint(std::iter::once(key.as_path()).chain(sources.iter().map(PathBuf::as_path)));

        let slot = self.projects.entry(key.clone()).or_default().clone();
        let mut guard = slot.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(entry) = guard.as_ref() {
            if entry.fingerprint == fingerprint {
                log::debug!("Compilation cache hit: {}", key.display());
                return CompilationOutcome {
                    compilation: Some(Arc::clone(&entry.value)),
                    is_from_cache: true,
                    errors: entry.value.diagnostics.clone(),
                };
            }
            log::debug!("Compilation fingerprint changed: {}", key.display());
        }

        let compilation = Arc::new(self.build_compilation(&key, &sources));
        log::info!(
            "Built compilation for {} ({} files)",
            key.display(),
            compilation.len()
        );
        *guard = Some(CacheEntry {
            value: Arc::clone(&compilation),
            fingerprint,
        });

        CompilationOutcome {
            errors: compilation.diagnostics.clone(),
            compilation: Some(compilation),
            is_from_cache: false,
        }
    }

    /// Parsed tree for a single file, reparsed if its content changed
    pub fn get_or_parse_file(&self, path: &Path) -> Result<ParsedFile, LoadError> {
        let key = canonical(path);
        let content = fs::read_to_string(&key).map_err(|source| LoadError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let fingerprint = blake3::hash(content.as_bytes()).to_hex().to_string();

        let slot = self.files.entry(key.clone()).or_default().clone();
        let mut guard = slot.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(entry) = guard.as_ref() {
            if entry.fingerprint == fingerprint {
                return Ok(ParsedFile {
                    tree: Arc::clone(&entry.value),
                    is_from_cache: true,
                });
            }
        }

        let tree = self.provider.parse(&content).map_err(|e| LoadError::Parse {
            path: path.to_path_buf(),
            message: format!("{:#}", e),
        })?;
        let tree = Arc::new(tree);
        log::debug!("Parsed {}", path.display());
        *guard = Some(CacheEntry {
            value: Arc::clone(&tree),
            fingerprint,
        });

        Ok(ParsedFile {
            tree,
            is_from_cache: false,
        })
    }

    /// Drop cached entries for `path`
    ///
    /// A project path drops its compilation. A source path drops the file
    /// and every compilation whose directory contains it.
    pub fn invalidate(&self, path: &Path) {
        let key = canonical(path);
        self.files.remove(&key);
        self.projects.remove(&key);
        self.projects
            .retain(|project, _| !project.parent().is_some_and(|dir| key.starts_with(dir)));
    }

    pub fn clear(&self) {
        self.projects.clear();
        self.files.clear();
    }

    /// Number of cached compilations
    pub fn len(&self) -> usize {
        self.projects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
    }

    /// Number of cached single-file parses
    pub fn cached_files(&self) -> usize {
        self.files.len()
    }

    fn build_compilation(&self, project: &Path, sources: &[PathBuf]) -> Compilation {
        let mut units = BTreeMap::new();
        let mut diagnostics = Vec::new();

        for source in sources {
            match self.get_or_parse_file(source) {
                Ok(parsed) => {
                    if let Some(span) = parsed.tree.first_error() {
                        diagnostics.push(format!(
                            "{}: syntax error at line {}",
                            source.display(),
                            span.start_line
                        ));
                    }
                    units.insert(canonical(source), parsed.tree);
                }
                Err(e) => diagnostics.push(e.to_string()),
            }
        }

        Compilation {
            project: project.to_path_buf(),
            units,
            diagnostics,
        }
    }
}

/// Sources of a project, excluding nested projects' directories
fn project_sources(project: &Path, options: &WorkspaceSearchOptions) -> anyhow::Result<Vec<PathBuf>> {
    let Some(dir) = project.parent() else {
        anyhow::bail!("project has no parent directory: {}", project.display());
    };
    let scanner = WorkspaceScanner::with_options(dir, options);
    let nested: Vec<PathBuf> = scanner
        .find_projects()?
        .into_iter()
        .filter_map(|p| p.parent().map(Path::to_path_buf))
        .filter(|nested_dir| nested_dir.as_path() != dir)
        .collect();

    let mut sources = scanner.find_csharp_files(&FileFilter::default())?;
    sources.retain(|source| !nested.iter().any(|nested_dir| source.starts_with(nested_dir)));
    Ok(sources)
}

/// blake3 over (path, length, mtime) of each path
fn stamp_fingerprint<'p>(paths: impl Iterator<Item = &'p Path>) -> String {
    let mut hasher = blake3::Hasher::new();
    for path in paths {
        hasher.update(path.to_string_lossy().as_bytes());
        if let Ok(metadata) = fs::metadata(path) {
            hasher.update(&metadata.len().to_le_bytes());
            let mtime = metadata
                .modified()
                .ok()
                .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
                .map_or(0, |d| d.as_nanos());
            hasher.update(&mtime.to_le_bytes());
        }
    }
    hasher.finalize().to_hex().to_string()
}

fn canonical(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::csharp::CSharpProvider;
    use tempfile::TempDir;

    fn manager() -> CompilationManager {
        CompilationManager::new(Arc::new(CSharpProvider))
    }

    fn project(root: &Path) -> PathBuf {
        fs::create_dir_all(root.join("App")).unwrap();
        fs::write(root.join("App/App.csproj"), "<Project Sdk=\"Microsoft.NET.Sdk\" />").unwrap();
        fs::write(root.join("App/A.cs"), "class A { void M() { Run(1); } }").unwrap();
        fs::write(root.join("App/B.cs"), "class B { }").unwrap();
        root.join("App/App.csproj")
    }

    #[test]
    fn test_second_access_is_cached() {
        let dir = TempDir::new().unwrap();
        let csproj = project(dir.path());
        let manager = manager();

        let first = manager.get_or_build_compilation(&csproj);
        assert!(!first.is_from_cache);
        assert!(first.errors.is_empty());
        assert_eq!(first.compilation.as_ref().unwrap().len(), 2);

        let second = manager.get_or_build_compilation(&csproj);
        assert!(second.is_from_cache);
        assert!(Arc::ptr_eq(
            first.compilation.as_ref().unwrap(),
            second.compilation.as_ref().unwrap()
        ));
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn test_source_change_rebuilds() {
        let dir = TempDir::new().unwrap();
        let csproj = project(dir.path());
        let manager = manager();
        manager.get_or_build_compilation(&csproj);

        // Length change alters the fingerprint regardless of mtime resolution
        fs::write(dir.path().join("App/B.cs"), "class B { int x; }").unwrap();
        let rebuilt = manager.get_or_build_compilation(&csproj);
        assert!(!rebuilt.is_from_cache);

        fs::write(dir.path().join("App/C.cs"), "class C { }").unwrap();
        let grown = manager.get_or_build_compilation(&csproj);
        assert!(!grown.is_from_cache);
        assert_eq!(grown.compilation.unwrap().len(), 3);
    }

    #[test]
    fn test_missing_project() {
        let dir = TempDir::new().unwrap();
        let outcome = manager().get_or_build_compilation(&dir.path().join("Nope.csproj"));
        assert!(outcome.compilation.is_none());
        assert_eq!(outcome.errors.len(), 1);
    }

    #[test]
    fn test_nested_project_sources_excluded() {
        let dir = TempDir::new().unwrap();
        let csproj = project(dir.path());
        fs::create_dir_all(dir.path().join("App/Plugin")).unwrap();
        fs::write(dir.path().join("App/Plugin/Plugin.csproj"), "<Project />").unwrap();
        fs::write(dir.path().join("App/Plugin/P.cs"), "class P { }").unwrap();

        let outcome = manager().get_or_build_compilation(&csproj);
        assert_eq!(outcome.compilation.unwrap().len(), 2);
    }

    #[test]
    fn test_scan_options_limit_project_sources() {
        let dir = TempDir::new().unwrap();
        let csproj = project(dir.path());
        fs::create_dir_all(dir.path().join("App/Generated")).unwrap();
        fs::write(dir.path().join("App/Generated/G.cs"), "class G { }").unwrap();

        let manager = manager();
        assert_eq!(manager.get_or_build_compilation(&csproj).compilation.unwrap().len(), 3);

        let options = WorkspaceSearchOptions {
            exclude_dirs: vec!["generated".to_string()],
            ..Default::default()
        };
        let outcome = manager.get_or_build_compilation_with(&csproj, &options);
        assert!(!outcome.is_from_cache);
        let compilation = outcome.compilation.unwrap();
        assert_eq!(compilation.len(), 2);
        assert!(compilation.units().all(|(path, _)| !path.to_string_lossy().contains("Generated")));
    }

    #[test]
    fn test_syntax_errors_become_diagnostics() {
        let dir = TempDir::new().unwrap();
        let csproj = project(dir.path());
        fs::write(dir.path().join("App/Broken.cs"), "class Broken { void M( { }").unwrap();

        let outcome = manager().get_or_build_compilation(&csproj);
        assert_eq!(outcome.errors.len(), 1);
        assert!(outcome.errors[0].contains("Broken.cs"));
        assert_eq!(outcome.compilation.unwrap().len(), 3);
    }

    #[test]
    fn test_file_cache_and_invalidate() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("One.cs");
        fs::write(&path, "class One { }").unwrap();
        let manager = manager();

        assert!(!manager.get_or_parse_file(&path).unwrap().is_from_cache);
        assert!(manager.get_or_parse_file(&path).unwrap().is_from_cache);
        assert_eq!(manager.cached_files(), 1);

        manager.invalidate(&path);
        assert_eq!(manager.cached_files(), 0);
        assert!(!manager.get_or_parse_file(&path).unwrap().is_from_cache);

        manager.clear();
        assert_eq!(manager.cached_files(), 0);
        assert!(manager.is_empty());
    }

    #[test]
    fn test_unreadable_file_is_a_read_error() {
        let dir = TempDir::new().unwrap();
        let err = manager()
            .get_or_parse_file(&dir.path().join("Missing.cs"))
            .unwrap_err();
        assert!(matches!(err, LoadError::Read { .. }));
    }

    #[test]
    fn test_invalidating_a_source_drops_its_project() {
        let dir = TempDir::new().unwrap();
        let csproj = project(dir.path());
        let manager = manager();
        manager.get_or_build_compilation(&csproj);
        assert_eq!(manager.len(), 1);

        manager.invalidate(&dir.path().join("App/A.cs"));
        assert!(manager.is_empty());
    }

    #[test]
    fn test_concurrent_builds_share_one_entry() {
        let dir = TempDir::new().unwrap();
        let csproj = project(dir.path());
        let manager = manager();

        let outcomes: Vec<CompilationOutcome> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..4)
                .map(|_| scope.spawn(|| manager.get_or_build_compilation(&csproj)))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let built = outcomes.iter().filter(|o| !o.is_from_cache).count();
        assert_eq!(built, 1);
        assert_eq!(manager.len(), 1);
    }
}
