use crate::domain::{BYTES_PER_MB, EvictionPlan, FileWarning, plan_eviction, total_size_bytes};
use crate::infra::{RecoverableDelete, ScanError, list_all_log_files};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_MAX_MB: i64 = 1000;

/// The two operator confirmations guarding a cleanup.
///
/// Implementations must answer `false` when the answer cannot be read.
/// `skipped` lists entries whose size is missing from `total_bytes`.
pub trait CleanPrompt {
    fn confirm_scan(
        &mut self,
        total_bytes: u64,
        budget_bytes: u64,
        skipped: &[FileWarning],
    ) -> bool;
    fn confirm_plan(&mut self, plan: &EvictionPlan) -> bool;
}

#[derive(Debug, Error)]
pub enum CleanError {
    #[error("max size must be greater than 0 MB, got {0}")]
    InvalidBudget(i64),

    #[error(transparent)]
    Scan(#[from] ScanError),

    #[error(
        "session logs use {total_bytes} bytes, over the {budget_bytes} byte budget, but no files could be selected for deletion"
    )]
    EmptyPlan { total_bytes: u64, budget_bytes: u64 },
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct DeletionSummary {
    pub trashed: Vec<(PathBuf, PathBuf)>,
    pub failed: Vec<(PathBuf, String)>,
    pub skipped_outside_log_dir: usize,
}

impl DeletionSummary {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty() && self.skipped_outside_log_dir == 0
    }
}

/// How a cleanup ended. Every variant carries the entries the scans skipped.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum CleanOutcome {
    UnderBudget {
        total_bytes: u64,
        budget_bytes: u64,
        warnings: Vec<FileWarning>,
    },
    ScanDeclined {
        total_bytes: u64,
        warnings: Vec<FileWarning>,
    },
    PlanDeclined {
        plan: EvictionPlan,
        warnings: Vec<FileWarning>,
    },
    Cleaned {
        plan: EvictionPlan,
        summary: DeletionSummary,
        warnings: Vec<FileWarning>,
    },
}

impl CleanOutcome {
    pub fn warnings(&self) -> &[FileWarning] {
        match self {
            Self::UnderBudget { warnings, .. }
            | Self::ScanDeclined { warnings, .. }
            | Self::PlanDeclined { warnings, .. }
            | Self::Cleaned { warnings, .. } => warnings,
        }
    }
}

pub fn budget_bytes_from_mb(max_mb: i64) -> Result<u64, CleanError> {
    if max_mb <= 0 {
        return Err(CleanError::InvalidBudget(max_mb));
    }
    let mb = u64::try_from(max_mb).map_err(|_| CleanError::InvalidBudget(max_mb))?;
    Ok(mb.saturating_mul(BYTES_PER_MB))
}

/// Brings the `.log` files in `log_dir` under `max_mb` by trashing the oldest ones.
///
/// Nothing is touched unless both prompts are confirmed.
pub fn clean_log_dir(
    log_dir: &Path,
    max_mb: i64,
    prompt: &mut impl CleanPrompt,
    trash: &impl RecoverableDelete,
) -> Result<CleanOutcome, CleanError> {
    let budget_bytes = budget_bytes_from_mb(max_mb)?;

    let scan = list_all_log_files(log_dir)?;
    let mut warnings = scan.warnings;
    let total_bytes = total_size_bytes(&scan.files);
    tracing::debug!(
        total_bytes,
        budget_bytes,
        files = scan.files.len(),
        skipped = warnings.len(),
        "computed session log size"
    );
    if total_bytes <= budget_bytes {
        return Ok(CleanOutcome::UnderBudget {
            total_bytes,
            budget_bytes,
            warnings,
        });
    }

    if !prompt.confirm_scan(total_bytes, budget_bytes, &warnings) {
        return Ok(CleanOutcome::ScanDeclined {
            total_bytes,
            warnings,
        });
    }

    // The operator may have taken a while; plan against a fresh listing.
    let rescan = list_all_log_files(log_dir)?;
    merge_warnings(&mut warnings, rescan.warnings);
    let plan = plan_eviction(rescan.files, total_bytes, budget_bytes);
    if plan.files.is_empty() {
        return Err(CleanError::EmptyPlan {
            total_bytes,
            budget_bytes,
        });
    }

    if !prompt.confirm_plan(&plan) {
        return Ok(CleanOutcome::PlanDeclined { plan, warnings });
    }

    let paths: Vec<PathBuf> = plan.files.iter().map(|file| file.path.clone()).collect();
    let summary = trash_log_files(log_dir, &paths, trash);
    Ok(CleanOutcome::Cleaned {
        plan,
        summary,
        warnings,
    })
}

// Both listings usually skip the same entries; report each path once.
fn merge_warnings(into: &mut Vec<FileWarning>, more: Vec<FileWarning>) {
    for warning in more {
        if !into.iter().any(|known| known.path == warning.path) {
            into.push(warning);
        }
    }
}

pub fn trash_log_files(
    log_dir: &Path,
    log_paths: &[PathBuf],
    trash: &impl RecoverableDelete,
) -> DeletionSummary {
    let mut summary = DeletionSummary::default();

    for path in log_paths {
        if !path.starts_with(log_dir) {
            tracing::warn!(path = %path.display(), "refusing to trash file outside the log directory");
            summary.skipped_outside_log_dir += 1;
            continue;
        }

        match trash.remove(path) {
            Ok(target) => summary.trashed.push((path.clone(), target)),
            Err(error) => {
                tracing::warn!(path = %path.display(), %error, "failed to trash log file");
                summary.failed.push((path.clone(), error.to_string()));
            }
        }
    }

    summary
}
