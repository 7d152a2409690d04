// src/tempdir.rs

//! Extraction directory lifecycle
//!
//! Onefile payloads are unpacked into a process-private directory that must
//! disappear again no matter how execution ends. The directory name carries
//! the executable's stem so stray directories are attributable, plus a
//! random suffix so concurrently running instances of the same application
//! never collide.
//!
//! Destruction is exactly-once and idempotent; `Drop` acts as a backstop so
//! the directory is removed even on error paths that never reach the
//! explicit cleanup point.

use crate::error::{Error, Result};
use crate::path::BoundedPath;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Archive option overriding the base directory extraction happens under
pub const RUNTIME_TMPDIR_OPTION: &str = "runtime-tmpdir";

/// A process-private extraction directory
///
/// Ownership of destruction belongs exclusively to the process that created
/// the directory; child processes only ever receive its path.
#[derive(Debug)]
pub struct ExtractionDir {
    path: PathBuf,
    removed: bool,
}

impl ExtractionDir {
    /// Create the extraction directory.
    ///
    /// Placed under the OS temp root, or under `base_override` when the
    /// archive carries the [`RUNTIME_TMPDIR_OPTION`] option. Failure is
    /// fatal to the bootstrap: execution cannot proceed without the payload
    /// files.
    pub fn create(executable: &BoundedPath, base_override: Option<&str>) -> Result<Self> {
        let stem = executable
            .as_path()
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "packrun".to_string());

        let builder_prefix = format!("{}.", stem);
        let mut builder = tempfile::Builder::new();
        builder.prefix(&builder_prefix);

        let dir = match base_override {
            Some(base) => {
                fs::create_dir_all(base).map_err(Error::TempDirCreate)?;
                builder.tempdir_in(base)
            }
            None => builder.tempdir(),
        }
        .map_err(Error::TempDirCreate)?;

        // Removal stays explicit; tempfile's drop-time cleanup would run in
        // the child's copy of the struct too.
        let path = dir.into_path();
        debug!("created extraction directory {}", path.display());

        Ok(Self {
            path,
            removed: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The directory path as a bounds-checked path, for marker passing
    pub fn bounded_path(&self) -> Result<BoundedPath> {
        Ok(BoundedPath::from_path(&self.path)?)
    }

    /// Recursively remove the directory.
    ///
    /// Runs at the single cleanup point on every exit path; calling it
    /// again afterwards is a no-op. Removal failures are logged, not
    /// raised: by this point the payload result is already known and must
    /// not be masked.
    pub fn destroy(&mut self) {
        if self.removed {
            return;
        }
        self.removed = true;

        debug!("removing extraction directory {}", self.path.display());
        if let Err(err) = fs::remove_dir_all(&self.path) {
            warn!(
                "failed to remove extraction directory {}: {}",
                self.path.display(),
                err
            );
        }
    }
}

impl Drop for ExtractionDir {
    fn drop(&mut self) {
        self.destroy();
    }
}
