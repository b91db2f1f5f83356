//! Per-file download pipeline with metrics
//!
//! Each resolved file goes through the same steps: existence check on its
//! ID-path, transfer, sidecar. Failures stay local to the file.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{Instrument, error, info, info_span, warn};

use crate::downloader::{
    config::HarvestConfig,
    core::{HarvestError, HttpClient, ResolvedFile, Result, files},
};

/// Counters for one or more runs
#[derive(Debug, Default)]
pub struct DownloadMetrics {
    pub total_bytes: AtomicU64,
    pub downloads_started: AtomicU64,
    pub downloaded: AtomicU64,
    pub skipped: AtomicU64,
    pub failed: AtomicU64,
    pub dry_run: AtomicU64,
}

impl DownloadMetrics {
    pub fn record_download_started(&self) {
        self.downloads_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_download_completed(&self, size: u64) {
        self.downloaded.fetch_add(1, Ordering::Relaxed);
        self.total_bytes.fetch_add(size, Ordering::Relaxed);
    }

    pub fn record_download_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_skipped(&self) {
        self.skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dry_run(&self) {
        self.dry_run.fetch_add(1, Ordering::Relaxed);
    }

    /// Get metrics snapshot
    pub fn snapshot(&self) -> DownloadMetricsSnapshot {
        DownloadMetricsSnapshot {
            total_bytes: self.total_bytes.load(Ordering::Relaxed),
            downloads_started: self.downloads_started.load(Ordering::Relaxed),
            downloaded: self.downloaded.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            dry_run: self.dry_run.load(Ordering::Relaxed),
        }
    }
}

/// Immutable snapshot of metrics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DownloadMetricsSnapshot {
    pub total_bytes: u64,
    pub downloads_started: u64,
    pub downloaded: u64,
    pub skipped: u64,
    pub failed: u64,
    pub dry_run: u64,
}

impl DownloadMetricsSnapshot {
    /// Difference between two snapshots of the same counters
    pub fn since(&self, earlier: &DownloadMetricsSnapshot) -> DownloadMetricsSnapshot {
        DownloadMetricsSnapshot {
            total_bytes: self.total_bytes - earlier.total_bytes,
            downloads_started: self.downloads_started - earlier.downloads_started,
            downloaded: self.downloaded - earlier.downloaded,
            skipped: self.skipped - earlier.skipped,
            failed: self.failed - earlier.failed,
            dry_run: self.dry_run - earlier.dry_run,
        }
    }
}

/// What happened to one resolved file
#[derive(Debug)]
pub enum FileOutcome {
    /// Bytes and sidecar written
    Downloaded { path: PathBuf, size: u64 },
    /// Something already existed at the ID-path; nothing was touched
    AlreadyExists { path: PathBuf },
    /// Dry run: the file would have been downloaded
    DryRun { path: PathBuf },
    /// Transfer or sidecar write failed; the run continued
    Failed { path: PathBuf, error: HarvestError },
}

impl FileOutcome {
    pub fn path(&self) -> &PathBuf {
        match self {
            FileOutcome::Downloaded { path, .. }
            | FileOutcome::AlreadyExists { path }
            | FileOutcome::DryRun { path }
            | FileOutcome::Failed { path, .. } => path,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, FileOutcome::Failed { .. })
    }
}

/// Run one file through existence check, transfer and sidecar write
pub async fn process_file(
    http: &HttpClient,
    config: &HarvestConfig,
    metrics: &DownloadMetrics,
    file: ResolvedFile,
) -> FileOutcome {
    let dest_path = file.id_path(&config.destination);
    let span = info_span!("file", id = %file.id);

    async move {
        match files::destination_exists(&dest_path).await {
            Ok(true) => {
                info!("Skipping {}", dest_path.display());
                metrics.record_skipped();
                return FileOutcome::AlreadyExists { path: dest_path };
            }
            Ok(false) => {}
            Err(e) => {
                error!("Could not inspect {}: {}", dest_path.display(), e);
                metrics.record_download_failed();
                return FileOutcome::Failed {
                    path: dest_path,
                    error: e,
                };
            }
        }

        info!(
            "Downloading {} ({})",
            dest_path.display(),
            file.name_path("").display()
        );
        if config.dry_run {
            metrics.record_dry_run();
            return FileOutcome::DryRun { path: dest_path };
        }

        metrics.record_download_started();
        match transfer(http, &file, &dest_path).await {
            Ok(size) => {
                metrics.record_download_completed(size);
                FileOutcome::Downloaded {
                    path: dest_path,
                    size,
                }
            }
            Err(HarvestError::AlreadyExists { path }) if path == dest_path => {
                warn!("{} appeared while downloading, keeping the existing file", path.display());
                metrics.record_skipped();
                FileOutcome::AlreadyExists { path: dest_path }
            }
            Err(e) => {
                error!("Failed to download {}: {}", dest_path.display(), e);
                metrics.record_download_failed();
                FileOutcome::Failed {
                    path: dest_path,
                    error: e,
                }
            }
        }
    }
    .instrument(span)
    .await
}

async fn transfer(http: &HttpClient, file: &ResolvedFile, dest_path: &std::path::Path) -> Result<u64> {
    let size = http.download_to_file(&file.source, dest_path).await?;
    files::write_sidecar(file, dest_path).await?;
    Ok(size)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_difference() {
        let metrics = DownloadMetrics::default();
        metrics.record_skipped();
        let before = metrics.snapshot();

        metrics.record_download_started();
        metrics.record_download_completed(10);
        metrics.record_download_failed();
        let delta = metrics.snapshot().since(&before);

        assert_eq!(
            delta,
            DownloadMetricsSnapshot {
                total_bytes: 10,
                downloads_started: 1,
                downloaded: 1,
                skipped: 0,
                failed: 1,
                dry_run: 0,
            }
        );
    }
}
