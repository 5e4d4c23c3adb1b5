//! Periodic removal of orphaned scratch files.

use std::io;
use std::time::{Duration, SystemTime};

use log::{debug, info, warn};
use tabula_fs::{SweepReport, sweep_stale_files};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::fetch::ScratchSpace;

/// Remove scratch files older than `max_age` once.
///
/// Only names produced by [`ScratchSpace::create`] are considered.
/// The directory walk runs on the blocking pool.
///
/// # Errors
///
/// Returns an error when the scratch directory cannot be listed.
pub async fn sweep_once(scratch: &ScratchSpace, max_age: Duration) -> io::Result<SweepReport> {
    let dir = scratch.dir().to_owned();
    let report = tokio::task::spawn_blocking(move || {
        sweep_stale_files(&dir, ScratchSpace::owns, max_age, SystemTime::now())
    })
    .await
    .map_err(io::Error::other)??;
    if report.removed > 0 || report.failed > 0 {
        info!(
            "scratch sweep removed {} of {} files ({} failed)",
            report.removed, report.scanned, report.failed
        );
    } else {
        debug!("scratch sweep found nothing to remove");
    }
    Ok(report)
}

/// Sweep `scratch` every `interval` until the task is aborted.
///
/// The first sweep runs one full interval after spawning. Failures are logged
/// and never stop the loop.
#[must_use = "dropping the handle detaches the sweeper; abort it on shutdown"]
pub fn spawn_scratch_sweeper(
    scratch: ScratchSpace,
    max_age: Duration,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.reset();
        loop {
            ticker.tick().await;
            if let Err(err) = sweep_once(&scratch, max_age).await {
                warn!("scratch sweep of {} failed: {err}", scratch.dir());
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8PathBuf;
    use rstest::rstest;

    #[rstest]
    #[tokio::test]
    async fn sweeps_only_stale_files() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf-8 path");
        let scratch = ScratchSpace::new(path);
        let kept = scratch.create().expect("scratch file");

        let report = sweep_once(&scratch, Duration::from_secs(3_600))
            .await
            .expect("sweep succeeds");

        assert_eq!(report.scanned, 1);
        assert_eq!(report.removed, 0);
        assert!(kept.path().exists());
    }

    #[rstest]
    #[tokio::test]
    async fn ignores_files_it_did_not_create() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf-8 path");
        std::fs::write(dir.path().join("users-notes.txt"), b"keep").expect("write file");

        let report = sweep_once(&ScratchSpace::new(path), Duration::ZERO)
            .await
            .expect("sweep succeeds");

        assert_eq!(report, SweepReport::default());
        assert!(dir.path().join("users-notes.txt").exists());
    }

    #[rstest]
    #[tokio::test]
    async fn missing_directory_is_not_an_error() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = Utf8PathBuf::from_path_buf(dir.path().join("absent")).expect("utf-8 path");
        let report = sweep_once(&ScratchSpace::new(path), Duration::ZERO)
            .await
            .expect("sweep succeeds");
        assert_eq!(report, SweepReport::default());
    }
}
