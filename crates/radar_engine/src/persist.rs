use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use radar_core::ScanState;
use radar_logging::radar_debug;
use tempfile::NamedTempFile;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("state directory missing or not writable: {0}")]
    OutputDir(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("state file {path:?} is corrupt: {reason}")]
    Corrupt { path: PathBuf, reason: String },
    #[error("could not encode state: {0}")]
    Encode(String),
}

/// Durable home of the scan state.
pub trait StateStore {
    /// Loads the saved state, or defaults when none was ever saved.
    fn load(&self) -> Result<ScanState, PersistError>;
    /// Replaces the saved state as a single unit.
    fn save(&self, state: &ScanState) -> Result<(), PersistError>;
}

impl<T: StateStore + ?Sized> StateStore for Arc<T> {
    fn load(&self) -> Result<ScanState, PersistError> {
        (**self).load()
    }

    fn save(&self, state: &ScanState) -> Result<(), PersistError> {
        (**self).save(state)
    }
}

/// Ensure the directory exists; create if missing.
pub fn ensure_output_dir(dir: &Path) -> Result<(), PersistError> {
    if dir.exists() {
        let meta = fs::metadata(dir).map_err(|e| PersistError::OutputDir(e.to_string()))?;
        if !meta.is_dir() {
            return Err(PersistError::OutputDir("path is not a directory".into()));
        }
    } else {
        fs::create_dir_all(dir).map_err(|e| PersistError::OutputDir(e.to_string()))?;
    }
    Ok(())
}

/// Atomically write content to `{dir}/{filename}` by writing a temp file then renaming.
pub struct AtomicFileWriter {
    dir: PathBuf,
}

impl AtomicFileWriter {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn write(&self, filename: &str, content: &str) -> Result<PathBuf, PersistError> {
        ensure_output_dir(&self.dir)?;

        let target = self.dir.join(filename);
        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(content.as_bytes())?;
        tmp.flush()?;
        tmp.as_file_mut().sync_all()?;

        // Rename over the old file so readers see either the old or the new state.
        tmp.persist(&target).map_err(|e| PersistError::Io(e.error))?;
        Ok(target)
    }
}

/// Scan state as pretty-printed JSON in a single file.
#[derive(Debug, Clone)]
pub struct JsonStateStore {
    path: PathBuf,
}

impl JsonStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn split_path(&self) -> Result<(PathBuf, String), PersistError> {
        let filename = self
            .path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| PersistError::OutputDir(format!("{:?} has no file name", self.path)))?
            .to_string();
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        Ok((dir, filename))
    }
}

impl StateStore for JsonStateStore {
    fn load(&self) -> Result<ScanState, PersistError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                radar_debug!("No state at {:?}; starting fresh", self.path);
                return Ok(ScanState::new());
            }
            Err(err) => return Err(PersistError::Io(err)),
        };

        serde_json::from_str(&content).map_err(|err| PersistError::Corrupt {
            path: self.path.clone(),
            reason: err.to_string(),
        })
    }

    fn save(&self, state: &ScanState) -> Result<(), PersistError> {
        let content =
            serde_json::to_string_pretty(state).map_err(|e| PersistError::Encode(e.to_string()))?;
        let (dir, filename) = self.split_path()?;
        AtomicFileWriter::new(dir).write(&filename, &content)?;
        Ok(())
    }
}
