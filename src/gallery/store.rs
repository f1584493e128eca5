//! Durable shared media storage
//!
//! Entries are created pending, filled, then marked final. A filesystem
//! implementation is provided for hosts whose shared media location is a
//! plain directory.

use crate::utils::error::{RecordError, RecordResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWrite;

/// Writer for an entry's bytes
pub type EntryWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Durable, user-visible record of a published recording
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GalleryEntry {
    /// Public locator of the entry
    pub uri: String,
    pub display_name: String,
    pub mime_type: String,
    pub relative_path: String,
    /// Still hidden from other apps
    pub pending: bool,
}

/// Parameters for a new entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryRequest {
    pub display_name: String,
    pub mime_type: String,
    pub relative_path: String,
}

/// Shared media store the publisher writes into
#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Create a pending entry; the store may adjust the name to avoid collisions
    async fn insert_pending(&self, request: &EntryRequest) -> RecordResult<GalleryEntry>;

    async fn open_writer(&self, entry: &GalleryEntry) -> RecordResult<EntryWriter>;

    /// Make a fully written entry visible
    async fn finalize(&self, entry: &mut GalleryEntry) -> RecordResult<()>;

    /// Remove pending entries under `relative_path` left behind by earlier
    /// failed publishes
    async fn sweep_orphans(&self, _relative_path: &str) -> RecordResult<usize> {
        Ok(0)
    }
}

const PENDING_PREFIX: &str = ".pending-";

/// [`MediaStore`] backed by a directory tree
///
/// Pending entries are hidden `.pending-<name>` files renamed into place on
/// finalize.
#[derive(Debug, Clone)]
pub struct DirectoryMediaStore {
    root: PathBuf,
}

impl DirectoryMediaStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn entry_dir(&self, relative_path: &str) -> PathBuf {
        self.root.join(relative_path)
    }

    fn pending_path(&self, entry: &GalleryEntry) -> PathBuf {
        self.entry_dir(&entry.relative_path)
            .join(format!("{}{}", PENDING_PREFIX, entry.display_name))
    }

    fn final_path(&self, entry: &GalleryEntry) -> PathBuf {
        self.entry_dir(&entry.relative_path).join(&entry.display_name)
    }
}

/// Candidate names: `name.ext`, `name (1).ext`, `name (2).ext`, ...
fn candidate_name(display_name: &str, attempt: usize) -> String {
    if attempt == 0 {
        return display_name.to_string();
    }
    match display_name.rsplit_once('.') {
        Some((stem, ext)) => format!("{} ({}).{}", stem, attempt, ext),
        None => format!("{} ({})", display_name, attempt),
    }
}

/// Percent-encoded `file://` locator for a path
pub fn file_uri(path: &Path) -> String {
    let mut uri = String::from("file://");
    for component in path.components() {
        match component {
            Component::Normal(part) => {
                uri.push('/');
                uri.push_str(&urlencoding::encode(&part.to_string_lossy()));
            }
            Component::Prefix(prefix) => {
                uri.push('/');
                uri.push_str(&prefix.as_os_str().to_string_lossy());
            }
            _ => {}
        }
    }
    uri
}

const MAX_NAME_ATTEMPTS: usize = 1000;

#[async_trait]
impl MediaStore for DirectoryMediaStore {
    async fn insert_pending(&self, request: &EntryRequest) -> RecordResult<GalleryEntry> {
        let dir = self.entry_dir(&request.relative_path);
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| RecordError::EntryCreationFailed(format!("{:?}: {}", dir, e)))?;

        for attempt in 0..MAX_NAME_ATTEMPTS {
            let display_name = candidate_name(&request.display_name, attempt);
            let final_path = dir.join(&display_name);
            if fs::try_exists(&final_path).await.unwrap_or(false) {
                continue;
            }

            let pending_path = dir.join(format!("{}{}", PENDING_PREFIX, display_name));
            match fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&pending_path)
                .await
            {
                Ok(_) => {
                    tracing::debug!("Created pending gallery entry {:?}", pending_path);
                    return Ok(GalleryEntry {
                        uri: file_uri(&final_path),
                        display_name,
                        mime_type: request.mime_type.clone(),
                        relative_path: request.relative_path.clone(),
                        pending: true,
                    });
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
                Err(e) => {
                    return Err(RecordError::EntryCreationFailed(format!(
                        "{:?}: {}",
                        pending_path, e
                    )))
                }
            }
        }

        Err(RecordError::EntryCreationFailed(format!(
            "no free name for {}",
            request.display_name
        )))
    }

    async fn open_writer(&self, entry: &GalleryEntry) -> RecordResult<EntryWriter> {
        let file = fs::OpenOptions::new()
            .write(true)
            .truncate(true)
            .open(self.pending_path(entry))
            .await?;
        Ok(Box::new(file))
    }

    async fn finalize(&self, entry: &mut GalleryEntry) -> RecordResult<()> {
        fs::rename(self.pending_path(entry), self.final_path(entry)).await?;
        entry.pending = false;
        Ok(())
    }

    async fn sweep_orphans(&self, relative_path: &str) -> RecordResult<usize> {
        let dir = self.entry_dir(relative_path);
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        let mut removed = 0;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let is_pending = path
                .file_name()
                .map(|n| n.to_string_lossy().starts_with(PENDING_PREFIX))
                .unwrap_or(false);
            if !is_pending || !entry.file_type().await?.is_file() {
                continue;
            }
            match fs::remove_file(&path).await {
                Ok(()) => {
                    tracing::info!("Removed orphaned pending entry {:?}", path);
                    removed += 1;
                }
                Err(e) => tracing::warn!("Could not remove orphaned entry {:?}: {}", path, e),
            }
        }

        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use tokio::io::AsyncWriteExt;

    fn request(name: &str) -> EntryRequest {
        EntryRequest {
            display_name: name.to_string(),
            mime_type: "video/mp4".to_string(),
            relative_path: "Movies".to_string(),
        }
    }

    #[test]
    fn test_file_uri_encodes_components() {
        assert_eq!(
            file_uri(Path::new("/data/Movies/Screen Record #1.mp4")),
            "file:///data/Movies/Screen%20Record%20%231.mp4"
        );
    }

    #[test]
    fn test_candidate_names() {
        assert_eq!(candidate_name("a.mp4", 0), "a.mp4");
        assert_eq!(candidate_name("a.mp4", 2), "a (2).mp4");
        assert_eq!(candidate_name("noext", 1), "noext (1)");
    }

    #[tokio::test]
    async fn test_two_phase_visibility() {
        let dir = tempdir().unwrap();
        let store = DirectoryMediaStore::new(dir.path());

        let mut entry = store.insert_pending(&request("clip.mp4")).await.unwrap();
        assert!(entry.pending);
        let final_path = dir.path().join("Movies").join("clip.mp4");
        assert!(!final_path.exists());
        assert!(dir.path().join("Movies").join(".pending-clip.mp4").exists());

        let mut writer = store.open_writer(&entry).await.unwrap();
        writer.write_all(b"frames").await.unwrap();
        writer.shutdown().await.unwrap();
        drop(writer);

        store.finalize(&mut entry).await.unwrap();
        assert!(!entry.pending);
        assert_eq!(std::fs::read(&final_path).unwrap(), b"frames");
        assert_eq!(entry.uri, file_uri(&final_path));
    }

    #[tokio::test]
    async fn test_name_collisions_get_suffix() {
        let dir = tempdir().unwrap();
        let store = DirectoryMediaStore::new(dir.path());

        let first = store.insert_pending(&request("clip.mp4")).await.unwrap();
        let second = store.insert_pending(&request("clip.mp4")).await.unwrap();

        assert_eq!(first.display_name, "clip.mp4");
        assert_eq!(second.display_name, "clip (1).mp4");
    }

    #[tokio::test]
    async fn test_sweep_orphans() {
        let dir = tempdir().unwrap();
        let store = DirectoryMediaStore::new(dir.path());

        store.insert_pending(&request("orphan.mp4")).await.unwrap();
        std::fs::write(dir.path().join("Movies").join("kept.mp4"), b"x").unwrap();

        assert_eq!(store.sweep_orphans("Movies").await.unwrap(), 1);
        assert!(dir.path().join("Movies").join("kept.mp4").exists());
        assert_eq!(store.sweep_orphans("Movies").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_sweep_stays_inside_relative_path() {
        let dir = tempdir().unwrap();
        let store = DirectoryMediaStore::new(dir.path());

        let other = dir.path().join("Pictures");
        std::fs::create_dir_all(other.join("Nested")).unwrap();
        std::fs::write(other.join(".pending-photo.jpg"), b"x").unwrap();
        std::fs::write(dir.path().join(".pending-root.mp4"), b"x").unwrap();
        store.insert_pending(&request("orphan.mp4")).await.unwrap();

        assert_eq!(store.sweep_orphans("Movies").await.unwrap(), 1);
        assert!(other.join(".pending-photo.jpg").exists());
        assert!(dir.path().join(".pending-root.mp4").exists());
    }

    #[tokio::test]
    async fn test_sweep_missing_root() {
        let dir = tempdir().unwrap();
        let store = DirectoryMediaStore::new(dir.path().join("nothing-here"));
        assert_eq!(store.sweep_orphans("Movies").await.unwrap(), 0);
    }
}
