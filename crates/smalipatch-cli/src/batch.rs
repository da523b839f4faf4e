//! Batch orchestration
//!
//! Files are independent: every worker loads, patches and writes its own
//! buffer. A failure is recorded against its file and the batch continues,
//! unless fail-fast cancels the files not yet started.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use rayon::prelude::*;
use smalipatch_rules::{FileTarget, PatchRule, RuleOutcome};
use tracing::{debug, info, info_span, warn};

use crate::backup::BackupManager;
use crate::discover::MatchedFile;
use crate::process::{process_file, write_file};

/// Stops dispatch of files that have not started yet
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Everything a run needs, passed explicitly to the workers
pub struct BatchContext {
    pub targets: Vec<FileTarget>,
    /// Worker threads; 0 lets rayon pick
    pub jobs: usize,
    /// Compute results without writing
    pub dry_run: bool,
    pub fail_fast: bool,
    pub backup: Option<BackupManager>,
    pub cancel: CancellationToken,
}

impl BatchContext {
    pub fn new(targets: Vec<FileTarget>) -> Self {
        Self {
            targets,
            jobs: 0,
            dry_run: false,
            fail_fast: false,
            backup: None,
            cancel: CancellationToken::default(),
        }
    }

    /// Rules of every target matched by `file`, in table order
    fn rules_for(&self, file: &MatchedFile) -> Vec<&PatchRule> {
        file.targets
            .iter()
            .filter_map(|&i| self.targets.get(i))
            .flat_map(|target| target.rules.iter())
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileStatus {
    /// At least one rule applied (written unless dry-run)
    Patched,
    Unchanged,
    Failed(String),
    /// Not started because the batch was cancelled
    Skipped,
}

/// Old and new contents of a patched file
#[derive(Debug, Clone)]
pub struct SourceChange {
    pub old_source: String,
    pub new_source: String,
}

#[derive(Debug, Clone)]
pub struct FileReport {
    pub root: PathBuf,
    pub path: PathBuf,
    pub outcomes: Vec<RuleOutcome>,
    pub status: FileStatus,
    pub change: Option<SourceChange>,
}

impl FileReport {
    fn new(file: &MatchedFile, status: FileStatus) -> Self {
        Self {
            root: file.root.clone(),
            path: file.path.clone(),
            outcomes: Vec::new(),
            status,
            change: None,
        }
    }
}

/// Process every matched file on a bounded pool
///
/// Reports come back in the order of `files`.
pub fn run_batch(ctx: &BatchContext, files: &[MatchedFile]) -> Result<Vec<FileReport>> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(ctx.jobs)
        .build()
        .context("Failed to build worker pool")?;

    Ok(pool.install(|| files.par_iter().map(|file| process_one(ctx, file)).collect()))
}

fn process_one(ctx: &BatchContext, file: &MatchedFile) -> FileReport {
    if ctx.cancel.is_cancelled() {
        debug!(path = %file.path.display(), "skipped after cancellation");
        return FileReport::new(file, FileStatus::Skipped);
    }

    let _span = info_span!("file", path = %file.path.display()).entered();
    match patch_one(ctx, file) {
        Ok(report) => report,
        Err(e) => {
            let message = format!("{:#}", e);
            warn!(error = %message, "failed to patch file");
            if ctx.fail_fast {
                ctx.cancel.cancel();
            }
            FileReport::new(file, FileStatus::Failed(message))
        }
    }
}

fn patch_one(ctx: &BatchContext, file: &MatchedFile) -> Result<FileReport> {
    let rules = ctx.rules_for(file);
    let result = process_file(&file.path, &rules)?;

    let mut report = FileReport::new(file, FileStatus::Unchanged);
    report.outcomes = result.report.outcomes;

    let Some(new_source) = result.new_source else {
        debug!("no rule matched");
        return Ok(report);
    };

    if !ctx.dry_run {
        let backup = match &ctx.backup {
            Some(manager) => Some(manager.backup_file(&file.path)?),
            None => None,
        };

        if let Err(e) = write_file(&file.path, &new_source) {
            if let (Some(manager), Some(backup)) = (&ctx.backup, &backup) {
                manager.restore_file(&file.path, backup)?;
            }
            return Err(e);
        }

        let sites: usize = report.outcomes.iter().map(|o| o.sites).sum();
        info!(sites, "patched");
    }

    report.status = FileStatus::Patched;
    report.change = Some(SourceChange {
        old_source: result.old_source,
        new_source,
    });
    Ok(report)
}
