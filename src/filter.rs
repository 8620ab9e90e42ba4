//! Folder filter predicate
//!
//! Evaluated once per discovered subdirectory, before it is enqueued.
//! Patterns are shell globs (`*`, `?`, `[...]`) matched with
//! [`glob::Pattern`]; `*` also matches path separators, so
//! `*/cache/*` style path patterns work as expected.

use crate::config::SweepConfig;
use crate::error::ConfigError;
use glob::Pattern;

/// Compiled include/exclude rules plus the depth ceiling
#[derive(Debug, Clone)]
pub struct FolderFilter {
    max_depth: usize,
    include_names: Vec<Pattern>,
    exclude_names: Vec<Pattern>,
    exclude_paths: Vec<Pattern>,
}

impl FolderFilter {
    /// Compile the patterns in `config`
    pub fn new(config: &SweepConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            max_depth: config.max_depth,
            include_names: compile(&config.include_names)?,
            exclude_names: compile(&config.exclude_names)?,
            exclude_paths: compile(&config.exclude_paths)?,
        })
    }

    /// True if the directory at `path` (named `name`, at `depth`) must not be enqueued.
    ///
    /// A non-matching include set filters the entry; the exclude sets are
    /// checked in addition to it, not instead of it.
    pub fn is_filtered(&self, path: &str, name: &str, depth: usize) -> bool {
        if depth > self.max_depth {
            return true;
        }

        if !self.include_names.is_empty() && !self.include_names.iter().any(|p| p.matches(name)) {
            return true;
        }

        self.exclude_names.iter().any(|p| p.matches(name))
            || self.exclude_paths.iter().any(|p| p.matches(path))
    }
}

fn compile(patterns: &[String]) -> Result<Vec<Pattern>, ConfigError> {
    patterns
        .iter()
        .map(|p| {
            Pattern::new(p).map_err(|e| ConfigError::InvalidPattern {
                pattern: p.clone(),
                reason: e.to_string(),
            })
        })
        .collect()
}
