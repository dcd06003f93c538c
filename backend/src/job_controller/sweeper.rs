//! Retention sweeper for rendered output.
//!
//! Rendered PDFs are only meant to live long enough to be downloaded. A
//! long-running tokio task wakes up on a fixed interval and deletes files in
//! the output directory whose modification time is older than the retention
//! threshold. The live preview file is always kept.
//!
//! The task is owned by a [`SweeperHandle`]: `main` starts it before the HTTP
//! server and stops it after the server returns. The report of the last pass
//! is published through a [`SweepLog`] that the admin endpoint reads.

use common::jobs::SweepReport;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;

/// Which files a pass may delete.
#[derive(Debug, Clone)]
pub struct RetentionPolicy {
    pub dir: PathBuf,
    pub max_age: Duration,
    /// File names that are never deleted.
    pub keep: Vec<String>,
}

/// Shared slot for the latest sweep report.
#[derive(Clone, Default)]
pub struct SweepLog {
    latest: Arc<RwLock<Option<SweepReport>>>,
}

impl SweepLog {
    pub async fn latest(&self) -> Option<SweepReport> {
        self.latest.read().await.clone()
    }

    pub async fn record(&self, report: SweepReport) {
        *self.latest.write().await = Some(report);
    }
}

/// Runs one pass. A file is removed when `now - mtime` is strictly greater
/// than the threshold. Problems are logged and listed in the report.
pub fn sweep_once(policy: &RetentionPolicy, now: SystemTime) -> SweepReport {
    let mut report = SweepReport::default();

    let entries = match fs::read_dir(&policy.dir) {
        Ok(entries) => entries,
        Err(e) => {
            log::warn!("Cannot list {}: {}", policy.dir.display(), e);
            report
                .failures
                .push(format!("{}: {}", policy.dir.display(), e));
            report.finished_at = chrono::Utc::now().to_rfc3339();
            return report;
        }
    };

    for entry in entries.flatten() {
        let name = entry.file_name().to_string_lossy().to_string();
        let metadata = match entry.metadata() {
            Ok(metadata) if metadata.is_file() => metadata,
            Ok(_) => continue,
            Err(e) => {
                log::warn!("Cannot stat {}: {}", name, e);
                report.failures.push(format!("{}: {}", name, e));
                continue;
            }
        };
        if policy.keep.iter().any(|keep| *keep == name) {
            report.retained += 1;
            continue;
        }

        // A modification time in the future counts as age zero.
        let age = metadata
            .modified()
            .ok()
            .and_then(|mtime| now.duration_since(mtime).ok())
            .unwrap_or_default();
        if age <= policy.max_age {
            report.retained += 1;
            continue;
        }

        match fs::remove_file(entry.path()) {
            Ok(()) => report.removed.push(name),
            Err(e) => {
                log::warn!("Could not remove expired file {}: {}", name, e);
                report.failures.push(format!("{}: {}", name, e));
            }
        }
    }

    report.removed.sort();
    report.finished_at = chrono::Utc::now().to_rfc3339();
    report
}

pub struct SweeperHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SweeperHandle {
    /// Signals the task and waits for it to finish its current pass.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            log::error!("Retention sweeper ended abnormally: {}", e);
        }
    }
}

/// Spawns the sweeper. The first pass runs immediately.
pub fn start(policy: RetentionPolicy, interval: Duration, sweeps: SweepLog) -> SweeperHandle {
    let (shutdown, mut shutdown_rx) = watch::channel(false);

    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let pass_policy = policy.clone();
                    let result = tokio::task::spawn_blocking(move || {
                        sweep_once(&pass_policy, SystemTime::now())
                    })
                    .await;
                    match result {
                        Ok(report) => {
                            if !report.removed.is_empty() {
                                log::info!("Retention sweep removed {} file(s)", report.removed.len());
                            }
                            sweeps.record(report).await;
                        }
                        Err(e) => log::error!("Retention sweep panicked: {}", e),
                    }
                }
                _ = shutdown_rx.changed() => break,
            }
        }
        log::info!("Retention sweeper stopped");
    });

    SweeperHandle { shutdown, task }
}
