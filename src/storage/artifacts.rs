//! Working directory for in-progress recordings
//!
//! The recorder writes raw artifacts here; the gallery publisher moves them
//! out once a recording completes.

use chrono::Local;
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Owns the working directory for temporary recordings
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    /// Use `dir` as the working directory, creating it if needed
    pub fn open(dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Resolve the working directory `<root>/<dir_name>`
    ///
    /// The root is the app-specific external files directory when the
    /// platform offers one, otherwise `fallback_root`.
    pub fn resolve(
        external_root: Option<&Path>,
        fallback_root: &Path,
        dir_name: &str,
    ) -> std::io::Result<Self> {
        let root = match external_root {
            Some(root) => root,
            None => {
                tracing::debug!("No external storage, using internal files dir");
                fallback_root
            }
        };
        Self::open(root.join(dir_name))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Fresh output path for a new recording
    pub fn allocate(&self) -> PathBuf {
        let timestamp = Local::now().format("%Y%m%d_%H%M%S");
        let suffix = Uuid::new_v4().simple().to_string();
        self.dir.join(format!("{}_{}.mp4", timestamp, &suffix[..8]))
    }

    /// Delete every file in the working directory
    ///
    /// Best-effort: a file the recorder still holds open is skipped. Returns
    /// the number of files removed. A missing directory counts as clean.
    pub fn clean(&self) -> std::io::Result<usize> {
        if !self.dir.exists() {
            return Ok(0);
        }

        let mut removed = 0;
        for entry in fs::read_dir(&self.dir)? {
            let path = match entry {
                Ok(entry) => entry.path(),
                Err(e) => {
                    tracing::warn!("Failed to read working directory entry: {}", e);
                    continue;
                }
            };
            if !path.is_file() {
                continue;
            }
            match fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) => tracing::warn!("Could not delete {:?}: {}", path, e),
            }
        }

        tracing::debug!("Cleaned {} file(s) from {:?}", removed, self.dir);
        Ok(removed)
    }
}
