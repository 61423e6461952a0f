//! CLI argument parsing and command handlers

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;

use crate::config;
use crate::constraints::ConstraintSpec;
use crate::engine::{SearchEngine, SearchScope};
use crate::formatter::OutputFormatter;
use crate::models::WorkspaceSearchOptions;
use crate::output;
use crate::pattern::{self, PatternAst};
use crate::workspace::TerminalProgress;

/// ssr: structural search and replace for C#
#[derive(Parser, Debug)]
#[command(
    name = "ssr",
    version,
    about = "Structural search and replace for C# code",
    long_about = "Finds code by syntax structure rather than text. Patterns are C# code with \
                  $name$ placeholders, e.g. 'Console.WriteLine($arg$)' or '$var$++'.\n\n\
                  Placeholder roles are inferred from their names: expr, stmt, arg, type, member, \
                  var/name/id; anything else matches any node."
)]
pub struct Cli {
    /// Enable verbose logging (can be repeated for more verbosity)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Options shared by `search` and `replace`
#[derive(Args, Debug, Clone)]
pub struct SearchArgs {
    /// File or directory to search (defaults to current directory)
    #[arg(value_name = "PATH", default_value = ".")]
    pub path: PathBuf,

    /// Placeholder constraint, repeatable: name:type=T, name:regex=RE,
    /// name:count=N|MIN..MAX, name:exact=TEXT, name:iexact=TEXT
    #[arg(short, long = "constraint", value_name = "CONSTRAINT")]
    pub constraints: Vec<String>,

    /// Only search files matching this glob (e.g. '**/Controllers/*.cs')
    #[arg(short, long)]
    pub glob: Option<String>,

    /// Only search files under directories matching this glob
    #[arg(long)]
    pub folder: Option<String>,

    /// Only search files of projects matching this glob (e.g. '*.Tests.csproj')
    #[arg(long)]
    pub project: Option<String>,

    /// Worker threads (0 = one per core)
    #[arg(short = 't', long)]
    pub threads: Option<usize>,

    /// Also match inside files that have syntax errors
    #[arg(long)]
    pub include_broken: bool,

    /// Output format as JSON
    #[arg(long)]
    pub json: bool,

    /// Pretty-print JSON output (only with --json)
    #[arg(long)]
    pub pretty: bool,

    /// Show a progress bar for workspace searches
    #[arg(long)]
    pub progress: bool,

    /// Disable colors
    #[arg(long)]
    pub plain: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Find code matching a structural pattern
    ///
    /// Examples:
    ///   ssr search 'Console.WriteLine($arg$)' src/
    ///   ssr search '$var$++' Program.cs --json
    ///   ssr search '$obj$.Save($args$)' -c 'args:count=1' --glob '**/Repositories/*.cs'
    Search {
        /// Search pattern
        pattern: String,

        #[command(flatten)]
        args: SearchArgs,
    },

    /// Rewrite code matching a structural pattern
    ///
    /// Shows the planned edits unless --apply is given.
    ///
    /// Examples:
    ///   ssr replace '$var$++' '$var$ += 1' src/
    ///   ssr replace 'new List<$type$>()' 'new()' . --apply
    Replace {
        /// Search pattern
        pattern: String,

        /// Replacement template; may use the search pattern's placeholders
        replacement: String,

        #[command(flatten)]
        args: SearchArgs,

        /// Write the edits to disk
        #[arg(long)]
        apply: bool,
    },

    /// Check a pattern (and optionally a replacement) without searching
    Validate {
        /// Search pattern
        pattern: String,

        /// Replacement template to check against the pattern
        #[arg(short, long)]
        replace: Option<String>,

        /// Output format as JSON
        #[arg(long)]
        json: bool,
    },
}

impl Cli {
    /// Execute the CLI command
    pub fn execute(self) -> Result<()> {
        let log_level = match self.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        };
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
            .init();

        match self.command {
            Command::Search { pattern, args } => handle_search(&pattern, &args),
            Command::Replace { pattern, replacement, args, apply } => {
                handle_replace(&pattern, &replacement, &args, apply)
            }
            Command::Validate { pattern, replace, json } => handle_validate(&pattern, replace.as_deref(), json),
        }
    }
}

/// Engine, parsed pattern and scope for a search or replace invocation
fn prepare(pattern_text: &str, args: &SearchArgs) -> Result<(SearchEngine, PatternAst, SearchScope)> {
    let config_dir = if args.path.is_dir() {
        args.path.as_path()
    } else {
        args.path.parent().unwrap_or_else(|| Path::new("."))
    };
    let config = config::load_config(config_dir)?;

    let mut options = WorkspaceSearchOptions::default();
    config.apply_to(&mut options);
    options.file_filter = args.glob.clone();
    options.folder_filter = args.folder.clone();
    options.project_filter = args.project.clone();
    if let Some(threads) = args.threads {
        options.max_degree_of_parallelism = threads;
    }
    if args.include_broken {
        options.skip_files_with_syntax_errors = false;
    }

    let mut specs = config.constraint_specs()?;
    for raw in &args.constraints {
        let spec: ConstraintSpec = raw
            .parse()
            .with_context(|| format!("Invalid --constraint '{}'", raw))?;
        specs.push(spec);
    }

    let show_progress = args.progress && !args.json;
    let engine = SearchEngine::new().with_progress(Arc::new(TerminalProgress::new(show_progress)));
    let pattern = engine
        .parse_pattern(pattern_text, &specs)
        .with_context(|| format!("Invalid pattern '{}'", pattern_text))?;
    let scope = SearchScope::for_path(args.path.clone(), options);

    Ok((engine, pattern, scope))
}

fn print_json<T: Serialize>(value: &T, pretty: bool) -> Result<()> {
    let json = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{}", json);
    Ok(())
}

/// Handle the `search` subcommand
fn handle_search(pattern_text: &str, args: &SearchArgs) -> Result<()> {
    let start = Instant::now();
    let (engine, pattern, scope) = prepare(pattern_text, args)?;
    let outcome = engine.search(&pattern, &scope)?;
    log::info!("Search completed in {:?}", start.elapsed());

    if args.json {
        return print_json(&outcome.report(), args.pretty);
    }

    let formatter = OutputFormatter::new(args.plain);
    formatter.print_matches(&outcome.matches);
    formatter.print_errors(&outcome.errors);
    if outcome.cancelled {
        output::warn("Search was cancelled; results are incomplete.");
    }
    if !outcome.errors.is_empty() {
        output::warn(&format!(
            "{} file(s) could not be searched.",
            outcome.errors.len()
        ));
    }
    output::info(&format!(
        "{} matches in {} files scanned ({:.2?})",
        outcome.matches.len(),
        outcome.files_scanned,
        start.elapsed()
    ));
    Ok(())
}

/// Handle the `replace` subcommand
fn handle_replace(pattern_text: &str, replacement: &str, args: &SearchArgs, apply: bool) -> Result<()> {
    let (engine, pattern, scope) = prepare(pattern_text, args)?;
    engine
        .parse_and_validate_replace(&pattern, replacement)
        .with_context(|| format!("Invalid replacement '{}'", replacement))?;
    let outcome = engine.replace(&pattern, replacement, &scope, apply)?;

    if args.json {
        return print_json(&outcome.report(), args.pretty);
    }

    let formatter = OutputFormatter::new(args.plain);
    formatter.print_replacements(&outcome.replacements);
    formatter.print_errors(&outcome.errors);

    match &outcome.applied {
        Some(results) => {
            formatter.print_applied(results);
            let applied: usize = results.iter().map(|r| r.replacements_applied).sum();
            let failed = results.iter().filter(|r| !r.success).count();
            if failed > 0 {
                output::warn(&format!("{} file(s) could not be updated.", failed));
            }
            output::success(&format!("Applied {} replacements.", applied));
        }
        None if !outcome.replacements.is_empty() => {
            output::info("Dry run: re-run with --apply to write these changes.");
        }
        None => {}
    }
    Ok(())
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ValidateReport {
    is_valid: bool,
    errors: Vec<String>,
    placeholders: Vec<PlaceholderInfo>,
}

#[derive(Serialize)]
struct PlaceholderInfo {
    name: String,
    category: String,
}

/// Handle the `validate` subcommand
fn handle_validate(pattern_text: &str, replace: Option<&str>, json: bool) -> Result<()> {
    let mut result = pattern::validate(pattern_text);
    let mut placeholders = Vec::new();

    if result.is_valid {
        match pattern::parse(pattern_text) {
            Ok(ast) => {
                let mut seen = std::collections::BTreeSet::new();
                for p in ast.placeholders().filter(|p| seen.insert(p.name.clone())) {
                    placeholders.push(PlaceholderInfo {
                        name: p.name.clone(),
                        category: p.category.to_string(),
                    });
                }
                if let Some(template) = replace {
                    if let Err(e) = pattern::parse_replace_pattern(template, &ast) {
                        result.errors.push(e.to_string());
                        result.is_valid = false;
                    }
                }
            }
            Err(e) => {
                result.errors.push(e.to_string());
                result.is_valid = false;
            }
        }
    }

    if json {
        return print_json(
            &ValidateReport {
                is_valid: result.is_valid,
                errors: result.errors,
                placeholders,
            },
            true,
        );
    }

    if result.is_valid {
        output::success("Pattern is valid.");
        for p in &placeholders {
            println!("  ${}$  {}", p.name, p.category);
        }
        Ok(())
    } else {
        for e in &result.errors {
            output::error(e);
        }
        anyhow::bail!("Pattern is invalid")
    }
}
