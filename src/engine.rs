//! Session-level driver
//!
//! Opens the catalog, creates or resumes a session, and runs the scan
//! and cleanup phases in order. Cleanup only ever runs against a session
//! whose scan drained completely.

use crate::catalog::{Catalog, Session};
use crate::cleanup::{CleanupEngine, CleanupReport};
use crate::config::SweepConfig;
use crate::error::{Result, SweepError};
use crate::progress::{ProgressSink, SilentProgress};
use crate::walker::{ScanControl, ScanCoordinator, ScanSummary, StartMode};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// Outcome of [`SweepEngine::run`]
#[derive(Debug, Clone)]
pub struct SweepResult {
    pub session_id: String,
    pub scan: ScanSummary,
    /// `None` when the scan was interrupted
    pub cleanup: Option<CleanupReport>,
}

pub struct SweepEngine {
    config: Arc<SweepConfig>,
    catalog: Arc<Catalog>,
    session: Session,
    mode: StartMode,
    progress: Arc<dyn ProgressSink>,
    control: Arc<ScanControl>,
}

impl SweepEngine {
    /// Start a new session, opening the catalog named in `config`
    pub fn new(config: SweepConfig) -> Result<Self> {
        let catalog = Arc::new(Catalog::open(&config.catalog_path)?);
        Self::with_catalog(config, catalog)
    }

    /// Start a new session in an already open catalog
    pub fn with_catalog(config: SweepConfig, catalog: Arc<Catalog>) -> Result<Self> {
        let session = catalog.create_session(&config)?;
        Ok(Self::assemble(config, catalog, session, StartMode::Fresh))
    }

    /// Continue the most recent incomplete session in the catalog at `catalog_path`
    pub fn resume(catalog_path: &Path) -> Result<Self> {
        let catalog = Arc::new(Catalog::open(catalog_path)?);
        Self::resume_with_catalog(catalog, catalog_path)
    }

    /// Continue the most recent incomplete session in an open catalog
    pub fn resume_with_catalog(catalog: Arc<Catalog>, catalog_path: &Path) -> Result<Self> {
        let session = catalog
            .last_incomplete_session()?
            .ok_or(SweepError::NothingToResume)?;
        let config = restore_config(&session, catalog_path)?;

        info!(session = %session.id, root = %session.root_path, "Resuming session");
        Ok(Self::assemble(config, catalog, session, StartMode::Resume))
    }

    /// Attach to the most recent session whose scan completed, for cleanup only
    pub fn last_completed(catalog_path: &Path) -> Result<Self> {
        let catalog = Arc::new(Catalog::open(catalog_path)?);
        let session = catalog
            .last_completed_session()?
            .ok_or(SweepError::NothingToClean)?;
        let config = restore_config(&session, catalog_path)?;
        Ok(Self::assemble(config, catalog, session, StartMode::Resume))
    }

    fn assemble(config: SweepConfig, catalog: Arc<Catalog>, session: Session, mode: StartMode) -> Self {
        Self {
            config: Arc::new(config),
            catalog,
            session,
            mode,
            progress: Arc::new(SilentProgress),
            control: Arc::new(ScanControl::default()),
        }
    }

    /// Report progress to `progress` instead of discarding it
    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    /// Override the cleanup settings of a restored session
    pub fn with_cleanup_options(mut self, delete_mode: bool, min_depth: usize) -> Self {
        let config = Arc::make_mut(&mut self.config);
        config.delete_mode = delete_mode;
        config.min_depth = min_depth;
        self
    }

    /// Pause/cancel/checkpoint handle
    pub fn control(&self) -> Arc<ScanControl> {
        Arc::clone(&self.control)
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn config(&self) -> &SweepConfig {
        &self.config
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    /// Scan, then clean up if the scan drained
    pub fn run(&self) -> Result<SweepResult> {
        let scan = self.scan_only()?;
        let cleanup = if scan.completed {
            Some(self.cleanup()?)
        } else {
            warn!(
                pending = scan.pending_remaining,
                "Scan did not complete, skipping cleanup"
            );
            None
        };

        Ok(SweepResult {
            session_id: self.session.id.clone(),
            scan,
            cleanup,
        })
    }

    /// Run only the scan phase
    pub fn scan_only(&self) -> Result<ScanSummary> {
        ScanCoordinator::new(
            Arc::clone(&self.config),
            Arc::clone(&self.catalog),
            self.session.id.clone(),
            Arc::clone(&self.progress),
        )
        .with_control(Arc::clone(&self.control))
        .run(self.mode)
    }

    /// Run only the cleanup phase; the session's scan must have completed
    pub fn cleanup_only(&self) -> Result<CleanupReport> {
        let completed = self
            .catalog
            .session(&self.session.id)?
            .map(|s| s.completed)
            .unwrap_or(false);
        if !completed {
            return Err(SweepError::ScanIncomplete(self.session.id.clone()));
        }
        self.cleanup()
    }

    fn cleanup(&self) -> Result<CleanupReport> {
        CleanupEngine::new(
            Arc::clone(&self.catalog),
            self.session.id.clone(),
            self.session.root_path.clone(),
            self.config.min_depth,
            self.config.delete_mode,
            Arc::clone(&self.progress),
        )
        .run()
    }
}

/// Session config with the local catalog path, re-validated against the disk
fn restore_config(session: &Session, catalog_path: &Path) -> Result<SweepConfig> {
    let mut config = session.config.clone();
    config.catalog_path = catalog_path.to_path_buf();
    config.validate()?;
    Ok(config)
}
