//! Terminal output for search and replace results
//!
//! Results are grouped by file with a tree-style layout. Colors are used only
//! when stdout is a terminal and `NO_COLOR` is unset.

use std::collections::BTreeMap;
use std::io;
use std::path::PathBuf;

use crossterm::tty::IsTty;
use owo_colors::OwoColorize;

use crate::models::{ApplicationResult, Match, ReplacementResult, WorkspaceError};

/// Output formatter configuration
pub struct OutputFormatter {
    /// Whether to use colors and formatting
    pub use_colors: bool,
}

impl OutputFormatter {
    /// Create a new formatter with automatic TTY detection
    pub fn new(plain: bool) -> Self {
        let is_tty = io::stdout().is_tty();
        let no_color = std::env::var("NO_COLOR").is_ok();

        Self {
            use_colors: !plain && !no_color && is_tty,
        }
    }

    pub fn print_matches(&self, matches: &[Match]) {
        if matches.is_empty() {
            println!("No matches found.");
            return;
        }

        let grouped = group_by_file(matches, |m| m.file_path.clone().unwrap_or_default());
        let file_count = grouped.len();
        for (idx, (file, file_matches)) in grouped.into_iter().enumerate() {
            self.print_file_header(&file.display().to_string(), file_matches.len(), "match", "matches");
            for (i, m) in file_matches.iter().enumerate() {
                let is_last = i == file_matches.len() - 1;
                self.print_entry(m.line(), m.column(), &first_line(&m.matched_text), is_last);
                let continuation = if is_last { "  " } else { "│ " };
                for (name, value) in &m.placeholders {
                    let binding = format!("${}$ = {}", name, first_line(value));
                    if self.use_colors {
                        println!("  {}      {}", continuation.dimmed(), binding.dimmed());
                    } else {
                        println!("  {}      {}", continuation, binding);
                    }
                }
            }
            if idx + 1 < file_count {
                println!();
            }
        }
    }

    pub fn print_replacements(&self, replacements: &[ReplacementResult]) {
        if replacements.is_empty() {
            println!("No replacements.");
            return;
        }

        let grouped = group_by_file(replacements, |r| r.file_path.clone());
        let file_count = grouped.len();
        for (idx, (file, edits)) in grouped.into_iter().enumerate() {
            self.print_file_header(&file.display().to_string(), edits.len(), "replacement", "replacements");
            for (i, r) in edits.iter().enumerate() {
                let is_last = i == edits.len() - 1;
                let continuation = if is_last { "  " } else { "│ " };
                self.print_entry(r.start_line, r.start_column, "", is_last);
                for line in r.original_text.lines() {
                    if self.use_colors {
                        println!("  {}   {}", continuation.dimmed(), format!("- {}", line).red());
                    } else {
                        println!("  {}   - {}", continuation, line);
                    }
                }
                for line in r.replacement_text.lines() {
                    if self.use_colors {
                        println!("  {}   {}", continuation.dimmed(), format!("+ {}", line).green());
                    } else {
                        println!("  {}   + {}", continuation, line);
                    }
                }
            }
            if idx + 1 < file_count {
                println!();
            }
        }
    }

    pub fn print_applied(&self, results: &[ApplicationResult]) {
        for result in results {
            let line = if result.success {
                format!(
                    "{}: {} applied, {} skipped",
                    result.file_path.display(),
                    result.replacements_applied,
                    result.replacements_skipped
                )
            } else {
                format!(
                    "{}: failed ({})",
                    result.file_path.display(),
                    result.error_message.as_deref().unwrap_or("unknown error")
                )
            };
            match (self.use_colors, result.success) {
                (true, true) => println!("{}", line.green()),
                (true, false) => println!("{}", line.red()),
                _ => println!("{}", line),
            }
        }
    }

    pub fn print_errors(&self, errors: &[WorkspaceError]) {
        for error in errors {
            let line = format!("{} [{}]: {}", error.file_path.display(), error.error_type, error.message);
            if self.use_colors {
                eprintln!("{}", line.yellow());
            } else {
                eprintln!("{}", line);
            }
        }
    }

    fn print_file_header(&self, file_path: &str, count: usize, singular: &str, plural: &str) {
        let noun = if count == 1 { singular } else { plural };
        if self.use_colors {
            println!(
                "{} {}",
                file_path.bright_cyan().bold(),
                format!("({} {})", count, noun).dimmed()
            );
        } else {
            println!("{} ({} {})", file_path, count, noun);
        }
    }

    fn print_entry(&self, line: usize, column: usize, preview: &str, is_last: bool) {
        let connector = if is_last { "└─" } else { "├─" };
        let position = format!("{:>4}:{:<3}", line, column);
        if self.use_colors {
            println!("  {} {} {} {}", connector.dimmed(), position.yellow(), "│".dimmed(), preview);
        } else {
            println!("  {} {} | {}", connector, position, preview);
        }
    }
}

fn group_by_file<T>(items: &[T], path_of: impl Fn(&T) -> PathBuf) -> BTreeMap<PathBuf, Vec<&T>> {
    let mut grouped: BTreeMap<PathBuf, Vec<&T>> = BTreeMap::new();
    for item in items {
        grouped.entry(path_of(item)).or_default().push(item);
    }
    grouped
}

/// First line of `text`, with an ellipsis if more follow
fn first_line(text: &str) -> String {
    let mut lines = text.lines();
    let first = lines.next().unwrap_or_default().trim_end();
    if lines.next().is_some() {
        format!("{} …", first)
    } else {
        first.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_disables_colors() {
        assert!(!OutputFormatter::new(true).use_colors);
    }

    #[test]
    fn test_first_line() {
        assert_eq!(first_line("a + b"), "a + b");
        assert_eq!(first_line("if (x)\n{\n}"), "if (x) …");
        assert_eq!(first_line(""), "");
    }

    #[test]
    fn test_group_by_file_is_sorted() {
        let items = vec![("b.cs", 1), ("a.cs", 2), ("b.cs", 3)];
        let grouped = group_by_file(&items, |(p, _)| PathBuf::from(p));
        let keys: Vec<_> = grouped.keys().cloned().collect();
        assert_eq!(keys, vec![PathBuf::from("a.cs"), PathBuf::from("b.cs")]);
        assert_eq!(grouped[&PathBuf::from("b.cs")].len(), 2);
    }
}
