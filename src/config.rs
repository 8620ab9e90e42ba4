//! Configuration types for void-sweep
//!
//! This module defines:
//! - CLI argument parsing using clap derive macros
//! - Runtime configuration with validation
//! - Traversal strategy selection

use crate::error::ConfigError;
use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Maximum reasonable worker count
pub const MAX_WORKERS: usize = 64;

/// Default maximum traversal depth
pub const DEFAULT_MAX_DEPTH: usize = 10_000;

/// Hard ceiling for max_depth
pub const ABSOLUTE_MAX_DEPTH: usize = 100_000;

/// Seconds between automatic catalog commits
pub const DEFAULT_CHECKPOINT_SECS: u64 = 10;

/// In-flight tasks = workers * this
pub const DEFAULT_CAPACITY_MULTIPLIER: usize = 2;

/// Default catalog file
pub const DEFAULT_CATALOG_PATH: &str = "void_sweep.db";

/// Directory names that are never descended into, whatever the user asks
pub const DEFAULT_EXCLUDE_NAMES: &[&str] = &[".git", "$RECYCLE.BIN", "System Volume Information"];

/// Order in which the frontier is drained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "UPPERCASE")]
pub enum Strategy {
    /// Breadth-first: pop from the front
    #[default]
    Bfs,
    /// Depth-first: pop from the back
    Dfs,
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Strategy::Bfs => write!(f, "BFS"),
            Strategy::Dfs => write!(f, "DFS"),
        }
    }
}

/// Find and remove empty directories, resumably
#[derive(Parser, Debug, Clone)]
#[command(
    name = "void-sweep",
    version,
    about = "Find and remove empty directories, with resumable scans",
    long_about = "Scans a directory tree with a pool of worker threads, records every folder \
                  in a SQLite catalog, then removes (or, by default, only marks) the folders \
                  that are empty.\n\n\
                  Nothing is deleted unless --delete is given. Interrupted scans can be \
                  continued with --resume.",
    after_help = "EXAMPLES:\n    \
        void-sweep /data/archive                      # dry run\n    \
        void-sweep /data/archive --delete -w 8\n    \
        void-sweep /data --exclude-name node_modules --min-depth 2\n    \
        void-sweep --resume --delete\n    \
        void-sweep sessions",
    args_conflicts_with_subcommands = true
)]
pub struct CliArgs {
    /// Root directory to scan
    #[arg(value_name = "PATH")]
    pub path: Option<PathBuf>,

    /// Subcommand (sessions)
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Actually remove empty directories (default is a dry run)
    #[arg(long)]
    pub delete: bool,

    /// Number of worker threads
    #[arg(short = 'w', long, default_value_t = default_workers(), value_name = "NUM")]
    pub workers: usize,

    /// Minimum depth eligible for removal (root is depth 0)
    #[arg(long, default_value = "0", value_name = "NUM")]
    pub min_depth: usize,

    /// Maximum depth to descend into
    #[arg(short = 'd', long, default_value_t = DEFAULT_MAX_DEPTH, value_name = "NUM")]
    pub max_depth: usize,

    /// Skip directories whose name matches this glob (can be repeated)
    #[arg(long = "exclude-name", value_name = "GLOB", action = clap::ArgAction::Append)]
    pub exclude_names: Vec<String>,

    /// Skip directories whose full path matches this glob (can be repeated)
    #[arg(long = "exclude-path", value_name = "GLOB", action = clap::ArgAction::Append)]
    pub exclude_paths: Vec<String>,

    /// Only descend into directories whose name matches this glob (can be repeated)
    #[arg(long = "include-name", value_name = "GLOB", action = clap::ArgAction::Append)]
    pub include_names: Vec<String>,

    /// Traversal order
    #[arg(long, value_enum, default_value_t = Strategy::Bfs)]
    pub strategy: Strategy,

    /// Catalog database file
    #[arg(long = "db", default_value = DEFAULT_CATALOG_PATH, value_name = "FILE")]
    pub catalog: PathBuf,

    /// Seconds between automatic catalog checkpoints
    #[arg(long, default_value_t = DEFAULT_CHECKPOINT_SECS, value_name = "SECS")]
    pub checkpoint_secs: u64,

    /// Resume the most recent incomplete session
    #[arg(long)]
    pub resume: bool,

    /// Only run the scan phase
    #[arg(long, conflicts_with = "cleanup_only")]
    pub scan_only: bool,

    /// Only run the cleanup phase on the most recent completed scan
    #[arg(long)]
    pub cleanup_only: bool,

    /// Quiet mode - suppress progress output
    #[arg(short = 'q', long)]
    pub quiet: bool,

    /// Verbose output (debug logging)
    #[arg(short = 'v', long)]
    pub verbose: bool,
}

/// Subcommands
#[derive(clap::Subcommand, Debug, Clone)]
pub enum Command {
    /// List previous sessions stored in the catalog
    Sessions {
        /// Catalog database file
        #[arg(long = "db", default_value = DEFAULT_CATALOG_PATH, value_name = "FILE")]
        catalog: PathBuf,

        /// Number of sessions to show
        #[arg(short = 'n', long, default_value = "20")]
        limit: usize,
    },
}

fn default_workers() -> usize {
    // Directory listing is I/O bound
    (num_cpus::get() * 2).clamp(1, MAX_WORKERS)
}

/// Validated, immutable runtime configuration
///
/// Serialized into the session row so a resumed run uses exactly the
/// settings the interrupted run started with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepConfig {
    /// Canonical root of the scan
    pub root_path: PathBuf,

    /// Remove directories (true) or only mark them WOULD_DELETE (false)
    pub delete_mode: bool,

    /// Number of worker threads
    pub workers: usize,

    /// Shallowest depth eligible for removal
    pub min_depth: usize,

    /// Deepest depth that is enqueued
    pub max_depth: usize,

    /// Name globs to skip; always includes [`DEFAULT_EXCLUDE_NAMES`]
    pub exclude_names: Vec<String>,

    /// Full-path globs to skip
    pub exclude_paths: Vec<String>,

    /// If non-empty, only names matching one of these are descended into
    pub include_names: Vec<String>,

    /// Frontier drain order
    pub strategy: Strategy,

    /// Seconds between automatic commits
    pub checkpoint_secs: u64,

    /// In-flight task bound = workers * capacity_multiplier
    pub capacity_multiplier: usize,

    /// Catalog location; not part of the persisted session config
    #[serde(skip)]
    pub catalog_path: PathBuf,
}

impl SweepConfig {
    /// Configuration with defaults for the given root.
    ///
    /// The root is not checked here; call [`SweepConfig::validate`].
    pub fn new(root_path: impl Into<PathBuf>) -> Self {
        Self {
            root_path: root_path.into(),
            delete_mode: false,
            workers: default_workers(),
            min_depth: 0,
            max_depth: DEFAULT_MAX_DEPTH,
            exclude_names: DEFAULT_EXCLUDE_NAMES.iter().map(|s| s.to_string()).collect(),
            exclude_paths: Vec::new(),
            include_names: Vec::new(),
            strategy: Strategy::Bfs,
            checkpoint_secs: DEFAULT_CHECKPOINT_SECS,
            capacity_multiplier: DEFAULT_CAPACITY_MULTIPLIER,
            catalog_path: PathBuf::from(DEFAULT_CATALOG_PATH),
        }
    }

    /// Create and validate configuration from CLI arguments
    pub fn from_args(args: &CliArgs) -> Result<Self, ConfigError> {
        if args.resume && args.path.is_some() {
            return Err(ConfigError::ResumeWithPath);
        }
        let root = args.path.clone().ok_or(ConfigError::MissingRoot)?;

        let mut config = Self::new(root);
        config.delete_mode = args.delete;
        config.workers = args.workers;
        config.min_depth = args.min_depth;
        config.max_depth = args.max_depth;
        config.exclude_paths = args.exclude_paths.clone();
        config.include_names = args.include_names.clone();
        config.strategy = args.strategy;
        config.checkpoint_secs = args.checkpoint_secs;
        config.catalog_path = args.catalog.clone();
        config.add_exclude_names(args.exclude_names.iter().cloned());

        config.validate()?;
        Ok(config)
    }

    /// Append user name excludes, keeping the defaults and dropping duplicates
    pub fn add_exclude_names<I>(&mut self, names: I)
    where
        I: IntoIterator<Item = String>,
    {
        for name in names {
            if !self.exclude_names.contains(&name) {
                self.exclude_names.push(name);
            }
        }
    }

    /// Check limits and canonicalize the root path
    pub fn validate(&mut self) -> Result<(), ConfigError> {
        if self.workers == 0 || self.workers > MAX_WORKERS {
            return Err(ConfigError::InvalidWorkerCount {
                count: self.workers,
                max: MAX_WORKERS,
            });
        }

        if self.max_depth > ABSOLUTE_MAX_DEPTH {
            return Err(ConfigError::InvalidDepthRange {
                min: self.min_depth,
                max: self.max_depth,
                reason: format!("max depth may not exceed {}", ABSOLUTE_MAX_DEPTH),
            });
        }
        if self.min_depth > self.max_depth {
            return Err(ConfigError::InvalidDepthRange {
                min: self.min_depth,
                max: self.max_depth,
                reason: "min depth is greater than max depth".into(),
            });
        }

        if self.capacity_multiplier == 0 {
            self.capacity_multiplier = DEFAULT_CAPACITY_MULTIPLIER;
        }

        for pattern in self
            .exclude_names
            .iter()
            .chain(&self.exclude_paths)
            .chain(&self.include_names)
        {
            glob::Pattern::new(pattern).map_err(|e| ConfigError::InvalidPattern {
                pattern: pattern.clone(),
                reason: e.to_string(),
            })?;
        }

        self.root_path = validate_root(&self.root_path)?;

        if let Some(parent) = self.catalog_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                return Err(ConfigError::InvalidCatalogPath {
                    path: self.catalog_path.clone(),
                    reason: format!("Parent directory '{}' does not exist", parent.display()),
                });
            }
        }

        Ok(())
    }

    /// Root path as stored in the catalog
    pub fn root_key(&self) -> String {
        self.root_path.to_string_lossy().into_owned()
    }

    /// Upper bound on tasks submitted but not yet reaped
    pub fn in_flight_capacity(&self) -> usize {
        self.workers.max(1) * self.capacity_multiplier.max(1)
    }

    /// Interval between automatic commits
    pub fn checkpoint_interval(&self) -> Duration {
        Duration::from_secs(self.checkpoint_secs)
    }
}

/// Root must exist, be a directory and be listable
fn validate_root(path: &Path) -> Result<PathBuf, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidRoot {
        path: path.to_path_buf(),
        reason,
    };

    let canonical = std::fs::canonicalize(path).map_err(|e| invalid(e.to_string()))?;
    if !canonical.is_dir() {
        return Err(invalid("not a directory".into()));
    }
    std::fs::read_dir(&canonical).map_err(|e| invalid(format!("cannot be listed: {}", e)))?;

    Ok(canonical)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn args_for(path: &Path) -> CliArgs {
        CliArgs::parse_from(["void-sweep", path.to_str().unwrap()])
    }

    #[test]
    fn test_defaults_include_system_excludes() {
        let config = SweepConfig::new("/tmp");
        for name in DEFAULT_EXCLUDE_NAMES {
            assert!(config.exclude_names.iter().any(|n| n == name));
        }
        assert!(!config.delete_mode);
        assert_eq!(config.strategy, Strategy::Bfs);
    }

    #[test]
    fn test_from_args_merges_excludes() {
        let dir = tempdir().unwrap();
        let mut args = args_for(dir.path());
        args.exclude_names = vec!["node_modules".into(), ".git".into()];

        let config = SweepConfig::from_args(&args).unwrap();
        assert!(config.exclude_names.contains(&"node_modules".to_string()));
        assert_eq!(
            config.exclude_names.iter().filter(|n| *n == ".git").count(),
            1
        );
        assert_eq!(config.root_path, std::fs::canonicalize(dir.path()).unwrap());
    }

    #[test]
    fn test_invalid_worker_count() {
        let dir = tempdir().unwrap();
        let mut config = SweepConfig::new(dir.path());
        config.workers = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidWorkerCount { .. })
        ));

        config.workers = MAX_WORKERS + 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_depth_range() {
        let dir = tempdir().unwrap();
        let mut config = SweepConfig::new(dir.path());
        config.min_depth = 5;
        config.max_depth = 2;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidDepthRange { .. })
        ));
    }

    #[test]
    fn test_invalid_pattern() {
        let dir = tempdir().unwrap();
        let mut config = SweepConfig::new(dir.path());
        config.exclude_paths = vec!["[unclosed".into()];
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidPattern { .. })
        ));
    }

    #[test]
    fn test_root_must_be_directory() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("file.txt");
        std::fs::write(&file, b"x").unwrap();

        let mut config = SweepConfig::new(&file);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidRoot { .. })
        ));

        let mut config = SweepConfig::new(dir.path().join("missing"));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_resume_rejects_path() {
        let dir = tempdir().unwrap();
        let mut args = args_for(dir.path());
        args.resume = true;
        assert!(matches!(
            SweepConfig::from_args(&args),
            Err(ConfigError::ResumeWithPath)
        ));
    }

    #[test]
    fn test_config_json_roundtrip_drops_catalog_path() {
        let mut config = SweepConfig::new("/data");
        config.catalog_path = PathBuf::from("/var/lib/sweep.db");
        config.strategy = Strategy::Dfs;

        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"DFS\""));
        let restored: SweepConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.strategy, Strategy::Dfs);
        assert_eq!(restored.catalog_path, PathBuf::new());
    }

    #[test]
    fn test_in_flight_capacity() {
        let mut config = SweepConfig::new("/data");
        config.workers = 4;
        assert_eq!(config.in_flight_capacity(), 8);
    }
}
