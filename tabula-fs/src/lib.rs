//! Scratch directory helpers built on `cap-std` and `camino`.
#![forbid(unsafe_code)]

use std::io;
use std::time::{Duration, SystemTime};

use camino::Utf8Path;
use cap_std::{ambient_authority, fs_utf8};
use log::{debug, warn};

/// Open a UTF-8 file path using ambient authority.
pub fn open_utf8_file(path: &Utf8Path) -> io::Result<fs_utf8::File> {
    fs_utf8::File::open_ambient(path, ambient_authority())
}

/// Create `dir` and any missing parents.
pub fn ensure_dir(dir: &Utf8Path) -> io::Result<()> {
    if dir.as_str().is_empty() {
        return Ok(());
    }
    fs_utf8::Dir::create_ambient_dir_all(dir, ambient_authority())
}

/// Outcome of a [`sweep_stale_files`] pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Files examined.
    pub scanned: usize,
    /// Files deleted.
    pub removed: usize,
    /// Files that could not be inspected or deleted.
    pub failed: usize,
}

/// Delete regular files in `dir` whose names satisfy `owned` and which were
/// last modified more than `max_age` before `now`.
///
/// Entries rejected by `owned` are neither inspected nor counted. A missing
/// directory is treated as empty. Failures on individual entries are logged
/// and counted rather than aborting the sweep.
pub fn sweep_stale_files(
    dir: &Utf8Path,
    owned: impl Fn(&str) -> bool,
    max_age: Duration,
    now: SystemTime,
) -> io::Result<SweepReport> {
    let handle = match fs_utf8::Dir::open_ambient_dir(dir, ambient_authority()) {
        Ok(handle) => handle,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(SweepReport::default()),
        Err(err) => return Err(err),
    };

    let mut report = SweepReport::default();
    for entry in handle.entries()? {
        match sweep_entry(&handle, entry, &owned, max_age, now) {
            Ok(None) => {}
            Ok(Some(removed)) => {
                report.scanned += 1;
                if removed {
                    report.removed += 1;
                }
            }
            Err(err) => {
                report.scanned += 1;
                report.failed += 1;
                warn!("failed to sweep entry in {dir}: {err}");
            }
        }
    }
    Ok(report)
}

/// Returns `None` for foreign names and non-files, otherwise whether the file
/// was removed.
fn sweep_entry(
    dir: &fs_utf8::Dir,
    entry: io::Result<fs_utf8::DirEntry>,
    owned: &impl Fn(&str) -> bool,
    max_age: Duration,
    now: SystemTime,
) -> io::Result<Option<bool>> {
    let entry = entry?;
    let name = entry.file_name()?;
    if !owned(name.as_str()) {
        return Ok(None);
    }
    let metadata = entry.metadata()?;
    if !metadata.is_file() {
        return Ok(None);
    }
    let modified = metadata.modified()?.into_std();
    let age = now.duration_since(modified).unwrap_or(Duration::ZERO);
    if age <= max_age {
        return Ok(Some(false));
    }
    dir.remove_file(&name)?;
    debug!("removed stale scratch file {name} (age {}s)", age.as_secs());
    Ok(Some(true))
}
