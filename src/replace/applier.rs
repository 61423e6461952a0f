//! Writing replacements back to disk
//!
//! Replacements are grouped per file. Within a file, overlapping edits are
//! dropped (the earlier, outer one wins), every remaining edit is checked
//! against the current file content, and edits are applied from the highest
//! offset down so earlier offsets stay valid. Each file is written once.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::models::{ApplicationResult, ReplacementResult};

/// Result of applying edits to an in-memory text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditOutcome {
    pub content: String,
    pub applied: usize,
    pub skipped: usize,
}

/// Apply non-overlapping edits to `content`
///
/// Fails without applying anything if an edit's original text no longer
/// matches the content at its offsets.
pub fn apply_edits(content: &str, replacements: &[&ReplacementResult]) -> Result<EditOutcome, String> {
    let mut ordered: Vec<&ReplacementResult> = replacements.to_vec();
    ordered.sort_by(|a, b| {
        a.start_position
            .cmp(&b.start_position)
            .then(b.span_len().cmp(&a.span_len()))
    });

    let mut accepted: Vec<&ReplacementResult> = Vec::with_capacity(ordered.len());
    let mut skipped = 0;
    for replacement in ordered {
        if accepted.last().is_some_and(|prev| prev.overlaps(replacement)) {
            log::warn!(
                "Skipping overlapping replacement at {}:{}",
                replacement.file_path.display(),
                replacement.start_line
            );
            skipped += 1;
            continue;
        }
        accepted.push(replacement);
    }

    for replacement in &accepted {
        let current = content.get(replacement.start_position..replacement.end_position);
        if current != Some(replacement.original_text.as_str()) {
            return Err(format!(
                "content at line {} column {} changed since it was matched (expected {:?})",
                replacement.start_line, replacement.start_column, replacement.original_text
            ));
        }
    }

    let mut updated = content.to_string();
    for replacement in accepted.iter().rev() {
        updated.replace_range(
            replacement.start_position..replacement.end_position,
            &replacement.replacement_text,
        );
    }

    Ok(EditOutcome {
        content: updated,
        applied: accepted.len(),
        skipped,
    })
}

/// Applies replacement results to files
#[derive(Debug, Clone, Copy, Default)]
pub struct ReplacementApplier {
    dry_run: bool,
}

impl ReplacementApplier {
    pub fn new(dry_run: bool) -> Self {
        Self { dry_run }
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Apply a single replacement to `file_path`
    pub fn apply_replacement(&self, file_path: &Path, replacement: &ReplacementResult) -> ApplicationResult {
        self.apply_to_file(file_path, &[replacement])
    }

    /// Apply replacements grouped by their file paths, one result per file
    pub fn apply_replacements(&self, replacements: &[ReplacementResult]) -> Vec<ApplicationResult> {
        let mut by_file: BTreeMap<&PathBuf, Vec<&ReplacementResult>> = BTreeMap::new();
        for replacement in replacements {
            by_file.entry(&replacement.file_path).or_default().push(replacement);
        }

        by_file
            .into_iter()
            .map(|(path, edits)| self.apply_to_file(path, &edits))
            .collect()
    }

    /// Apply every edit for one file and write it back once
    pub fn apply_to_file(&self, file_path: &Path, replacements: &[&ReplacementResult]) -> ApplicationResult {
        if !file_path.is_file() {
            return ApplicationResult::failed(file_path, format!("file not found: {}", file_path.display()));
        }

        let content = match fs::read_to_string(file_path) {
            Ok(content) => content,
            Err(e) => {
                return ApplicationResult::failed(
                    file_path,
                    format!("failed to read {}: {}", file_path.display(), e),
                );
            }
        };

        let outcome = match apply_edits(&content, replacements) {
            Ok(outcome) => outcome,
            Err(message) => {
                log::warn!("Not modifying {}: {}", file_path.display(), message);
                return ApplicationResult::failed(file_path, message);
            }
        };

        if !self.dry_run && outcome.applied > 0 {
            if let Err(e) = fs::write(file_path, &outcome.content) {
                return ApplicationResult::failed(
                    file_path,
                    format!("failed to write {}: {}", file_path.display(), e),
                );
            }
            log::info!(
                "Applied {} replacements to {}",
                outcome.applied,
                file_path.display()
            );
        }

        ApplicationResult {
            success: true,
            file_path: file_path.to_path_buf(),
            replacements_applied: outcome.applied,
            replacements_skipped: outcome.skipped,
            error_message: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn edit(path: &Path, content: &str, original: &str, replacement: &str) -> ReplacementResult {
        let start = content.find(original).unwrap();
        ReplacementResult {
            file_path: path.to_path_buf(),
            start_position: start,
            end_position: start + original.len(),
            start_line: content[..start].matches('\n').count() + 1,
            start_column: 1,
            original_text: original.to_string(),
            replacement_text: replacement.to_string(),
            base_indentation: String::new(),
        }
    }

    const CONTENT: &str = "a++;\nb++;\nc++;\n";

    #[test]
    fn test_apply_edits_order_invariant() {
        let path = Path::new("x.cs");
        let edits = [
            edit(path, CONTENT, "a++", "a = a + 1"),
            edit(path, CONTENT, "b++", "b = b + 1"),
            edit(path, CONTENT, "c++", "c = c + 1"),
        ];
        let ascending: Vec<&ReplacementResult> = edits.iter().collect();
        let descending: Vec<&ReplacementResult> = edits.iter().rev().collect();

        let a = apply_edits(CONTENT, &ascending).unwrap();
        let b = apply_edits(CONTENT, &descending).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.content, "a = a + 1;\nb = b + 1;\nc = c + 1;\n");
        assert_eq!(a.applied, 3);
    }

    #[test]
    fn test_overlapping_edits_are_skipped() {
        let path = Path::new("x.cs");
        let content = "Foo(Foo(1));";
        let outer = edit(path, content, "Foo(Foo(1))", "Bar(Foo(1))");
        let inner = ReplacementResult {
            start_position: 4,
            end_position: 10,
            original_text: "Foo(1)".to_string(),
            replacement_text: "Bar(1)".to_string(),
            ..outer.clone()
        };

        let outcome = apply_edits(content, &[&inner, &outer]).unwrap();
        assert_eq!(outcome.content, "Bar(Foo(1));");
        assert_eq!(outcome.applied, 1);
        assert_eq!(outcome.skipped, 1);
    }

    #[test]
    fn test_stale_edit_rejected() {
        let path = Path::new("x.cs");
        let mut stale = edit(path, CONTENT, "b++", "b = b + 1");
        stale.original_text = "z++".to_string();
        assert!(apply_edits(CONTENT, &[&stale]).is_err());
    }

    #[test]
    fn test_apply_to_file_writes_once() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("Counter.cs");
        fs::write(&path, CONTENT).unwrap();

        let edits = vec![
            edit(&path, CONTENT, "c++", "c += 1"),
            edit(&path, CONTENT, "a++", "a += 1"),
        ];
        let results = ReplacementApplier::new(false).apply_replacements(&edits);
        assert_eq!(results.len(), 1);
        assert!(results[0].success);
        assert_eq!(results[0].replacements_applied, 2);
        assert_eq!(fs::read_to_string(&path).unwrap(), "a += 1;\nb++;\nc += 1;\n");
    }

    #[test]
    fn test_dry_run_leaves_file_untouched() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("Counter.cs");
        fs::write(&path, CONTENT).unwrap();

        let result = ReplacementApplier::new(true)
            .apply_replacement(&path, &edit(&path, CONTENT, "a++", "a += 1"));
        assert!(result.success);
        assert_eq!(result.replacements_applied, 1);
        assert_eq!(fs::read_to_string(&path).unwrap(), CONTENT);
    }

    #[test]
    fn test_missing_file_fails() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("Missing.cs");
        let result = ReplacementApplier::new(false)
            .apply_replacement(&path, &edit(&path, CONTENT, "a++", "a += 1"));
        assert!(!result.success);
        assert!(result.error_message.unwrap().contains("not found"));
    }

    #[test]
    fn test_stale_file_is_not_modified() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("Counter.cs");
        fs::write(&path, CONTENT).unwrap();
        let good = edit(&path, CONTENT, "a++", "a += 1");
        let mut stale = edit(&path, CONTENT, "c++", "c += 1");
        stale.original_text = "q++".to_string();

        let results = ReplacementApplier::new(false).apply_replacements(&[good, stale]);
        assert!(!results[0].success);
        assert_eq!(fs::read_to_string(&path).unwrap(), CONTENT);
    }
}
