//! Gallery publishing
//!
//! Copies a finished recording from the working directory into the shared
//! media store. The source is only deleted once the entry is final; on any
//! failure the source stays where it is and a created entry stays pending.

use super::store::{EntryRequest, GalleryEntry, MediaStore};
use crate::recorder::config::GalleryConfig;
use crate::recorder::state::PublishedRecording;
use crate::utils::error::{RecordError, RecordResult};
use chrono::{DateTime, Local};
use std::path::Path;
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;

impl From<&GalleryEntry> for PublishedRecording {
    fn from(entry: &GalleryEntry) -> Self {
        Self {
            output_url: entry.uri.clone(),
            gallery_path: entry.uri.clone(),
        }
    }
}

/// Display name for a recording finished at `at`
pub fn display_name(prefix: &str, at: DateTime<Local>) -> String {
    format!("{}{}.mp4", prefix, at.format("%Y%m%d_%H%M%S"))
}

/// Moves completed recordings into durable shared storage
#[derive(Clone)]
pub struct GalleryPublisher {
    store: Arc<dyn MediaStore>,
    config: GalleryConfig,
}

impl GalleryPublisher {
    pub fn new(store: Arc<dyn MediaStore>, config: GalleryConfig) -> Self {
        Self { store, config }
    }

    /// Publish `source` and delete it once the gallery entry is final
    pub async fn publish(&self, source: &Path) -> RecordResult<GalleryEntry> {
        if !fs::try_exists(source).await.unwrap_or(false) {
            return Err(RecordError::SourceMissing(source.to_path_buf()));
        }

        match self.store.sweep_orphans(&self.config.relative_path).await {
            Ok(0) => {}
            Ok(n) => tracing::info!("Cleaned up {} orphaned gallery entries", n),
            Err(e) => tracing::warn!("Failed to sweep orphaned gallery entries: {}", e),
        }

        let request = EntryRequest {
            display_name: display_name(&self.config.name_prefix, Local::now()),
            mime_type: self.config.mime_type.clone(),
            relative_path: self.config.relative_path.clone(),
        };

        let mut entry = self
            .store
            .insert_pending(&request)
            .await
            .map_err(|e| match e {
                RecordError::EntryCreationFailed(_) => e,
                other => RecordError::EntryCreationFailed(other.to_string()),
            })?;

        tracing::info!("Publishing {:?} as {}", source, entry.display_name);

        let copied = self.copy_into(source, &entry).await.map_err(|e| {
            tracing::error!("Copy into {} failed, entry left pending: {}", entry.uri, e);
            RecordError::CopyFailed(e.to_string())
        })?;

        self.store
            .finalize(&mut entry)
            .await
            .map_err(|e| RecordError::CopyFailed(format!("could not finalize entry: {}", e)))?;

        if let Err(e) = fs::remove_file(source).await {
            tracing::warn!("Published {:?} but could not delete source: {}", source, e);
        }

        tracing::info!("Published {} bytes to {}", copied, entry.uri);
        Ok(entry)
    }

    async fn copy_into(&self, source: &Path, entry: &GalleryEntry) -> RecordResult<u64> {
        let mut input = fs::File::open(source).await?;
        let mut output = self.store.open_writer(entry).await?;
        let copied = tokio::io::copy(&mut input, &mut output).await?;
        output.shutdown().await?;
        Ok(copied)
    }
}
