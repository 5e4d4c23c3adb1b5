//! Scratch storage for downloads in flight.

use std::io;

use camino::{Utf8Path, Utf8PathBuf};
use tabula_core::ServiceConfig;
use tempfile::NamedTempFile;

/// Prefix of every scratch file name.
pub const SCRATCH_PREFIX: &str = "tabula-";
const SCRATCH_SUFFIX: &str = ".part";

/// Directory holding per-request scratch files.
///
/// Files are created as [`NamedTempFile`]s and removed when dropped, so a
/// request that fails or is cancelled leaves nothing behind. The background
/// sweep only catches files orphaned by a crash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScratchSpace {
    dir: Utf8PathBuf,
}

impl ScratchSpace {
    /// Use `dir` for scratch files; it is created on first use.
    pub fn new(dir: impl Into<Utf8PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Use the scratch directory named in `config`.
    ///
    /// # Errors
    ///
    /// Fails when the configured path is not valid UTF-8.
    pub fn from_config(config: &ServiceConfig) -> io::Result<Self> {
        let dir = Utf8PathBuf::try_from(config.scratch_dir.clone())
            .map_err(camino::FromPathBufError::into_io_error)?;
        Ok(Self::new(dir))
    }

    /// The scratch directory.
    #[must_use]
    pub fn dir(&self) -> &Utf8Path {
        &self.dir
    }

    /// Whether `name` has the shape of a file created by [`ScratchSpace::create`].
    #[must_use]
    pub fn owns(name: &str) -> bool {
        name.len() > SCRATCH_PREFIX.len() + SCRATCH_SUFFIX.len()
            && name.starts_with(SCRATCH_PREFIX)
            && name.ends_with(SCRATCH_SUFFIX)
    }

    /// Create a fresh scratch file.
    ///
    /// # Errors
    ///
    /// Fails when the directory cannot be created or the file cannot be opened.
    pub fn create(&self) -> io::Result<NamedTempFile> {
        tabula_fs::ensure_dir(&self.dir)?;
        tempfile::Builder::new()
            .prefix(SCRATCH_PREFIX)
            .suffix(SCRATCH_SUFFIX)
            .tempfile_in(self.dir.as_std_path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("tabula-a1b2c3.part", true)]
    #[case("tabula-.part", false)]
    #[case("tabula-a1b2c3", false)]
    #[case("report.part", false)]
    #[case("users-notes.txt", false)]
    fn recognises_scratch_names(#[case] name: &str, #[case] expected: bool) {
        assert_eq!(ScratchSpace::owns(name), expected);
    }

    #[rstest]
    fn created_files_are_owned() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf-8 path");
        let file = ScratchSpace::new(path).create().expect("scratch file");
        let name = file
            .path()
            .file_name()
            .and_then(|name| name.to_str())
            .expect("utf-8 name");
        assert!(ScratchSpace::owns(name));
    }
}
