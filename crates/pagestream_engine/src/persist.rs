use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("target directory {} is unusable: {reason}", dir.display())]
    OutputDir { dir: PathBuf, reason: String },
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// Create `dir` if needed and check that files can be created in it.
///
/// Called once before a run; per-artifact writes assume the directory is usable.
pub fn ensure_output_dir(dir: &Path) -> Result<(), PersistError> {
    let unusable = |reason: String| PersistError::OutputDir {
        dir: dir.to_path_buf(),
        reason,
    };
    fs::create_dir_all(dir).map_err(|err| unusable(err.to_string()))?;
    if !dir.is_dir() {
        return Err(unusable("not a directory".to_string()));
    }
    // Anonymous file, gone as soon as it is dropped.
    tempfile::tempfile_in(dir).map_err(|err| unusable(err.to_string()))?;
    Ok(())
}

/// A file that reached durable storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedFile {
    pub path: PathBuf,
    pub size: u64,
}

/// Writes `{dir}/{name}` through a synced sibling temp file that is renamed over the target.
///
/// An existing artifact with the same name stays intact until the rename replaces it.
#[derive(Debug, Clone)]
pub struct ArtifactWriter {
    dir: PathBuf,
}

impl ArtifactWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn write(&self, name: &str, content: &[u8]) -> Result<PersistedFile, PersistError> {
        let target = self.dir.join(name);
        let mut staged = NamedTempFile::new_in(&self.dir)?;
        staged.write_all(content)?;
        staged.as_file_mut().sync_all()?;
        staged.persist(&target).map_err(|err| PersistError::Io(err.error))?;
        Ok(PersistedFile {
            path: target,
            size: content.len() as u64,
        })
    }
}

/// Remove a file, treating "already absent" as success.
pub fn remove_if_present(path: &Path) -> Result<bool, PersistError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(err) => Err(PersistError::Io(err)),
    }
}
