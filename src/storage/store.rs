//! Directory of recordings, one file per fingerprint

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::{debug, info};

use super::format::Recording;
use super::RECORDING_EXTENSION;
use crate::fingerprint::Fingerprint;
use crate::{Result, UnderstudyError};

/// Filesystem store for recordings
#[derive(Debug, Clone)]
pub struct RecordingStore {
    dir: PathBuf,
}

impl RecordingStore {
    /// Open a store rooted at `dir`, creating the directory if needed
    ///
    /// # Errors
    ///
    /// Returns error if the directory cannot be created
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|source| UnderstudyError::PersistenceFailure {
            path: dir.clone(),
            source,
        })?;
        Ok(Self { dir })
    }

    /// Open a store that must already exist, without creating anything
    ///
    /// # Errors
    ///
    /// Returns error if `dir` is not a directory
    pub fn open_existing(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        if !dir.is_dir() {
            return Err(UnderstudyError::Io(io::Error::new(
                io::ErrorKind::NotFound,
                format!("Recording directory not found: {}", dir.display()),
            )));
        }
        Ok(Self { dir })
    }

    /// Root directory
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the recording file for `fingerprint`
    #[must_use]
    pub fn path_for(&self, fingerprint: &Fingerprint) -> PathBuf {
        self.dir
            .join(format!("{}.{RECORDING_EXTENSION}", fingerprint.to_hex()))
    }

    /// Write a recording, replacing any previous one for the same fingerprint
    ///
    /// The file is written to a temporary sibling and renamed into place, so
    /// readers never observe a partial recording.
    ///
    /// # Errors
    ///
    /// Returns [`UnderstudyError::PersistenceFailure`] if any step fails
    pub fn save(&self, recording: &Recording) -> Result<PathBuf> {
        let fingerprint = recording.validate()?;
        let path = self.path_for(&fingerprint);
        let fail = |source: io::Error| UnderstudyError::PersistenceFailure {
            path: path.clone(),
            source,
        };

        let data = serde_json::to_vec_pretty(recording).map_err(|e| fail(e.into()))?;

        let mut temp = NamedTempFile::new_in(&self.dir).map_err(fail)?;
        temp.write_all(&data).map_err(fail)?;
        temp.as_file().sync_all().map_err(fail)?;
        temp.persist(&path).map_err(|e| fail(e.error))?;

        info!(
            "Saved recording {} ({} bytes) to {}",
            fingerprint.short(),
            data.len(),
            path.display()
        );
        Ok(path)
    }

    /// Load the recording for `fingerprint`, if any
    ///
    /// # Errors
    ///
    /// Returns error if the file exists but cannot be read or decoded, or if
    /// it belongs to a different fingerprint
    pub fn load(&self, fingerprint: &Fingerprint) -> Result<Option<Recording>> {
        let path = self.path_for(fingerprint);
        let data = match fs::read(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let recording: Recording = serde_json::from_slice(&data).map_err(|e| {
            UnderstudyError::InvalidFormat(format!("{}: {e}", path.display()))
        })?;

        let stored = recording.validate()?;
        if stored != *fingerprint {
            return Err(UnderstudyError::InvalidFormat(format!(
                "{}: holds fingerprint {stored}",
                path.display()
            )));
        }

        debug!("Loaded recording {}", fingerprint.short());
        Ok(Some(recording))
    }

    /// Whether a recording exists for `fingerprint`
    #[must_use]
    pub fn contains(&self, fingerprint: &Fingerprint) -> bool {
        self.path_for(fingerprint).is_file()
    }

    /// Fingerprints of every recording in the store, sorted
    ///
    /// # Errors
    ///
    /// Returns error if the directory cannot be listed
    pub fn list(&self) -> Result<Vec<Fingerprint>> {
        let mut fingerprints = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(RECORDING_EXTENSION) {
                continue;
            }
            if let Some(fingerprint) = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| s.parse().ok())
            {
                fingerprints.push(fingerprint);
            }
        }
        fingerprints.sort_unstable();
        Ok(fingerprints)
    }

    /// Delete the recording for `fingerprint`; returns whether one existed
    ///
    /// # Errors
    ///
    /// Returns error if the file exists but cannot be removed
    pub fn remove(&self, fingerprint: &Fingerprint) -> Result<bool> {
        match fs::remove_file(self.path_for(fingerprint)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}
