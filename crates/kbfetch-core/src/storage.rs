//! Filesystem-backed local store
//!
//! Layout under the data directory:
//! - `settings.json`
//! - `<kb>/objects/<type>/<object id>.bin`
//! - `<kb>/documents/<document id>.json`

use crate::services::LocalStore;
use anyhow::{bail, Context};
use async_trait::async_trait;
use kbfetch_types::{DocumentRecord, Settings};
use std::path::{Path, PathBuf};
use tokio::fs;

/// Storage manager for object data, documents and settings
#[derive(Clone)]
#[derive(Debug)]
pub struct FsLocalStore {
    /// Data directory
    data_dir: PathBuf,
}

impl FsLocalStore {
    /// Create a new storage instance
    pub async fn new(data_dir: PathBuf) -> anyhow::Result<Self> {
        fs::create_dir_all(&data_dir)
            .await
            .with_context(|| format!("creating {}", data_dir.display()))?;

        Ok(Self { data_dir })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    // ========================================================================
    // Settings
    // ========================================================================

    /// Load settings, falling back to defaults when none were saved
    pub async fn load_settings(&self) -> anyhow::Result<Settings> {
        let path = self.data_dir.join("settings.json");
        if !path.exists() {
            return Ok(Settings::default());
        }

        let content = fs::read_to_string(&path).await?;
        serde_json::from_str(&content).with_context(|| format!("parsing {}", path.display()))
    }

    /// Save settings
    pub async fn save_settings(&self, settings: &Settings) -> anyhow::Result<()> {
        let content = serde_json::to_string_pretty(settings)?;
        fs::write(self.data_dir.join("settings.json"), content).await?;
        Ok(())
    }

    // ========================================================================
    // Objects
    // ========================================================================

    /// Read back object bytes written by a download
    pub async fn load_object_data(
        &self,
        kb_id: &str,
        object_id: &str,
        type_string: &str,
    ) -> anyhow::Result<Option<Vec<u8>>> {
        let path = self.object_path(kb_id, object_id, type_string)?;
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(fs::read(&path).await?))
    }

    fn object_path(&self, kb_id: &str, object_id: &str, type_string: &str) -> anyhow::Result<PathBuf> {
        let type_dir = if type_string.is_empty() { "other" } else { type_string };
        Ok(self
            .kb_dir(kb_id)?
            .join("objects")
            .join(checked_segment(type_dir)?)
            .join(format!("{}.bin", checked_segment(object_id)?)))
    }

    // ========================================================================
    // Documents
    // ========================================================================

    /// Write a document record, creating the stub a document download expects
    pub async fn save_document(&self, kb_id: &str, record: &DocumentRecord) -> anyhow::Result<()> {
        let path = self.document_path(kb_id, &record.guid)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let content = serde_json::to_string_pretty(record)?;
        fs::write(&path, content).await?;

        Ok(())
    }

    fn document_path(&self, kb_id: &str, document_id: &str) -> anyhow::Result<PathBuf> {
        Ok(self
            .kb_dir(kb_id)?
            .join("documents")
            .join(format!("{}.json", checked_segment(document_id)?)))
    }

    fn kb_dir(&self, kb_id: &str) -> anyhow::Result<PathBuf> {
        Ok(self.data_dir.join(checked_segment(kb_id)?))
    }
}

/// Ids become path components, so they may not walk out of the data dir
fn checked_segment(segment: &str) -> anyhow::Result<&str> {
    if segment.is_empty()
        || segment == "."
        || segment == ".."
        || segment.contains(['/', '\\'])
    {
        bail!("invalid store path component: {:?}", segment);
    }
    Ok(segment)
}

#[async_trait]
impl LocalStore for FsLocalStore {
    async fn update_object_data(
        &self,
        kb_id: &str,
        object_id: &str,
        type_string: &str,
        data: &[u8],
    ) -> anyhow::Result<()> {
        let path = self.object_path(kb_id, object_id, type_string)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&path, data)
            .await
            .with_context(|| format!("writing {}", path.display()))
    }

    async fn load_document(&self, kb_id: &str, object_id: &str) -> anyhow::Result<Option<DocumentRecord>> {
        let path = self.document_path(kb_id, object_id)?;
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&path).await?;
        let record = serde_json::from_str(&content).with_context(|| format!("parsing {}", path.display()))?;
        Ok(Some(record))
    }

    async fn update_document(&self, kb_id: &str, record: &DocumentRecord) -> anyhow::Result<()> {
        self.save_document(kb_id, record).await
    }
}
