//! # Record Store
//!
//! Owns the recordings directory and the lifecycle of recording files
//! outside of an active session.
//!
//! This module handles:
//! - Creating files for new recording sessions
//! - Listing finished recordings (a missing directory is simply empty)
//! - Opening recordings for read/materialization
//! - Deleting all recordings
//!
//! Only the sink router writes to a file, and only while its session is
//! active; everything the store opens for read is a closed file.

use std::fs::{self, File};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::error::{ImuBridgeError, Result};

/// File extension for recording files
pub const RECORDING_EXT: &str = "dat";

/// Handle to the logical recordings directory.
///
/// Cheap to clone; clones refer to the same directory.
#[derive(Debug, Clone)]
pub struct RecordStore {
    dir: PathBuf,
}

impl RecordStore {
    /// Create a store rooted at `dir`. The directory itself is created
    /// lazily on the first recording.
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }

    /// Path of the recordings directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// List recording file names.
    ///
    /// The sequence is lazy and in directory order. A directory that does
    /// not exist yet yields an empty sequence, not an error.
    ///
    /// # Errors
    ///
    /// Returns `Storage` only for faults other than a missing directory.
    pub fn list(&self) -> Result<impl Iterator<Item = String>> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => Some(entries),
            Err(e) if e.kind() == ErrorKind::NotFound => None,
            Err(e) => return Err(e.into()),
        };

        Ok(entries
            .into_iter()
            .flatten()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
            .filter_map(|entry| entry.file_name().into_string().ok()))
    }

    /// Open a recording for reading
    ///
    /// # Arguments
    ///
    /// * `name` - A file name as produced by [`RecordStore::list`]
    ///
    /// # Errors
    ///
    /// Returns `InvalidRequest` for names that would escape the directory,
    /// `NotFound` if no such recording exists, `Storage` otherwise.
    pub fn open_for_read(&self, name: &str) -> Result<File> {
        let path = self.entry_path(name)?;
        File::open(&path).map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                ImuBridgeError::NotFound(name.to_string())
            } else {
                e.into()
            }
        })
    }

    /// Read a whole recording as raw bytes (the raw fetch operation)
    pub fn read_raw(&self, name: &str) -> Result<Vec<u8>> {
        let path = self.entry_path(name)?;
        fs::read(&path).map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                ImuBridgeError::NotFound(name.to_string())
            } else {
                e.into()
            }
        })
    }

    /// Create an empty recording file for a new session.
    ///
    /// Appends the `.dat` extension, creating the recordings directory on
    /// demand. An existing file of the same name is truncated.
    ///
    /// # Returns
    ///
    /// * `(String, File)` - The stored file name (as later listed) and the
    ///   open handle
    pub fn create(&self, name: &str) -> Result<(String, File)> {
        validate_name(name)?;

        fs::create_dir_all(&self.dir)?;

        let file_name = format!("{}.{}", name, RECORDING_EXT);
        let path = self.dir.join(&file_name);
        debug!("Creating recording file {}", path.display());

        let file = File::create(&path)?;
        Ok((file_name, file))
    }

    /// Delete every recording.
    ///
    /// # Returns
    ///
    /// * `bool` - `true` if everything was deleted (a missing directory
    ///   counts as success); `false` if any entry could not be removed. No
    ///   atomicity: on failure the directory is left in whatever partial
    ///   state resulted.
    pub fn clear_all(&self) -> bool {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return true,
            Err(e) => {
                warn!("Could not open recordings directory: {}", e);
                return false;
            }
        };

        let mut all_removed = true;
        for entry in entries.filter_map(|entry| entry.ok()) {
            let path = entry.path();
            if let Err(e) = fs::remove_file(&path) {
                warn!("Could not delete {}: {}", path.display(), e);
                all_removed = false;
            }
        }

        if all_removed {
            info!("Cleared all recordings");
        }
        all_removed
    }

    fn entry_path(&self, name: &str) -> Result<PathBuf> {
        validate_name(name)?;
        Ok(self.dir.join(name))
    }
}

/// Reject names that are empty, hidden, or would traverse out of the
/// recordings directory.
fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(ImuBridgeError::InvalidRequest(
            "recording name cannot be empty".to_string(),
        ));
    }

    if name.contains('/') || name.contains('\\') || name.contains("..") || name.starts_with('.') {
        return Err(ImuBridgeError::InvalidRequest(format!(
            "invalid recording name: {}",
            name
        )));
    }

    Ok(())
}
