//! Configuration from `ssr.toml`
//!
//! ```toml
//! [search]
//! max_parallelism = 4
//! exclude_dirs = ["bin", "obj", "generated"]
//! max_file_size = 5242880
//! skip_files_with_syntax_errors = true
//! constraints = ["var:regex=^_"]
//! ```

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::constraints::ConstraintSpec;
use crate::models::WorkspaceSearchOptions;

/// Name of the config file looked up in the workspace root
pub const CONFIG_FILE_NAME: &str = "ssr.toml";

/// `[search]` section
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Worker threads (0 = one per core)
    #[serde(default)]
    pub max_parallelism: Option<usize>,

    /// Replaces the default excluded directory names when set
    #[serde(default)]
    pub exclude_dirs: Option<Vec<String>>,

    #[serde(default)]
    pub max_file_size: Option<u64>,

    #[serde(default)]
    pub skip_files_with_syntax_errors: Option<bool>,

    /// Constraints applied to every pattern, `name:kind=value`
    #[serde(default)]
    pub constraints: Vec<String>,
}

impl SearchConfig {
    /// Overlay configured values onto `options`
    pub fn apply_to(&self, options: &mut WorkspaceSearchOptions) {
        if let Some(threads) = self.max_parallelism {
            options.max_degree_of_parallelism = threads;
        }
        if let Some(dirs) = &self.exclude_dirs {
            options.exclude_dirs = dirs.clone();
        }
        if let Some(size) = self.max_file_size {
            options.max_file_size = size;
        }
        if let Some(skip) = self.skip_files_with_syntax_errors {
            options.skip_files_with_syntax_errors = skip;
        }
    }

    /// Parse the configured constraints
    pub fn constraint_specs(&self) -> Result<Vec<ConstraintSpec>> {
        self.constraints
            .iter()
            .map(|c| {
                c.parse::<ConstraintSpec>()
                    .with_context(|| format!("Invalid constraint in {}: {}", CONFIG_FILE_NAME, c))
            })
            .collect()
    }
}

/// Load the `[search]` section of `<dir>/ssr.toml`
///
/// Falls back to defaults if the file doesn't exist or has no [search] section.
pub fn load_config(dir: &Path) -> Result<SearchConfig> {
    let config_path = dir.join(CONFIG_FILE_NAME);

    if !config_path.exists() {
        log::debug!("No {} found in {}, using defaults", CONFIG_FILE_NAME, dir.display());
        return Ok(SearchConfig::default());
    }

    let config_str = std::fs::read_to_string(&config_path)
        .with_context(|| format!("Failed to read {}", config_path.display()))?;

    let toml_value: toml::Value = toml::from_str(&config_str)
        .with_context(|| format!("Failed to parse {}", config_path.display()))?;

    if let Some(search_table) = toml_value.get("search") {
        let config: SearchConfig = search_table
            .clone()
            .try_into()
            .context("Failed to parse [search] section")?;
        log::debug!("Loaded search config from {}", config_path.display());
        Ok(config)
    } else {
        log::debug!("No [search] section in {}, using defaults", CONFIG_FILE_NAME);
        Ok(SearchConfig::default())
    }
}
