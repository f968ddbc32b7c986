//! Age-based cleanup of session directories and event rows.
//!
//! Directory and row deletion are two separate steps without a shared
//! transaction; a crash between them leaves an orphaned row or
//! directory, which the next pass or a manual sweep picks up. What the
//! pass must never do is touch the directory of the currently active
//! session.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use log::{error, info, warn};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::config::RetentionPolicy;
use crate::db::Database;
use crate::models::parse_session_timestamp;
use crate::scanner::ScannerController;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RetentionReport {
    pub directories_deleted: usize,
    pub rows_deleted: usize,
    /// Entries skipped because they were unparseable or failed to
    /// delete; each is logged individually.
    pub skipped: usize,
}

/// Long-interval background task. Runs one pass per period until
/// cancelled; a failed pass is logged and the next one runs anyway.
pub async fn retention_loop(
    db: Database,
    data_root: PathBuf,
    policy: RetentionPolicy,
    period: std::time::Duration,
    scanner: ScannerController,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first interval tick fires immediately; an initial pass at
    // startup is what the original scheduler did too.

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let active_dir = scanner
                    .active_session()
                    .await
                    .map(|session| session.data_dir);

                match run_retention_pass(&db, &data_root, &policy, active_dir.as_deref(), Utc::now())
                    .await
                {
                    Ok(report) => info!(
                        "retention pass: {} directories and {} rows deleted, {} skipped",
                        report.directories_deleted, report.rows_deleted, report.skipped
                    ),
                    Err(err) => error!("retention pass failed: {err:#}"),
                }
            }
            _ = cancel.cancelled() => {
                info!("retention scheduler shutting down");
                break;
            }
        }
    }
}

/// One full pass against a caller-supplied "now". Session directories
/// whose timestamp-derived age exceeds the policy are removed, except
/// the active one; event rows older than the same cutoff are deleted
/// afterwards. Per-directory failures are isolated: one bad entry never
/// stops the pass.
pub async fn run_retention_pass(
    db: &Database,
    data_root: &Path,
    policy: &RetentionPolicy,
    active_dir: Option<&Path>,
    now: DateTime<Utc>,
) -> Result<RetentionReport> {
    let cutoff = now - Duration::days(policy.max_age_days);
    let mut report = RetentionReport::default();

    if data_root.exists() {
        let entries = fs::read_dir(data_root)
            .with_context(|| format!("failed to read data root {}", data_root.display()))?;

        for entry in entries {
            let path = match entry {
                Ok(entry) => entry.path(),
                Err(err) => {
                    warn!("retention: unreadable directory entry: {err}");
                    report.skipped += 1;
                    continue;
                }
            };

            if !path.is_dir() {
                continue;
            }
            if active_dir == Some(path.as_path()) {
                continue;
            }

            let name = match path.file_name() {
                Some(name) => name.to_string_lossy().into_owned(),
                None => continue,
            };

            match parse_session_timestamp(&name) {
                None => {
                    warn!("retention: skipping unrecognized directory '{name}'");
                    report.skipped += 1;
                }
                Some(started) if started < cutoff.naive_utc() => {
                    match fs::remove_dir_all(&path) {
                        Ok(()) => {
                            info!("retention: deleted expired session directory '{name}'");
                            report.directories_deleted += 1;
                        }
                        Err(err) => {
                            warn!("retention: failed to delete '{name}': {err}");
                            report.skipped += 1;
                        }
                    }
                }
                Some(_) => {}
            }
        }
    }

    report.rows_deleted = db
        .delete_events_before(cutoff)
        .await
        .context("failed to delete expired event rows")?;

    Ok(report)
}
