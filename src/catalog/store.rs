//! Chunked tool definition store
//!
//! The catalog is persisted as a fixed range of numbered chunk files
//! (`tools_1.json` ... `tools_N.json`) inside one directory. Each file is a
//! tab-indented JSON array of [`OperationDescriptor`]s.
//!
//! Writes go to a sibling temporary file that is renamed over the target, so
//! a concurrent reader sees either the old or the new chunk, never a partial one.

use std::path::{Path, PathBuf};

use catalog_core::OperationDescriptor;
use serde::Serialize;
use tracing::{debug, info};

use crate::config::CatalogConfig;
use crate::{Error, Result};

/// Persistence layer for the operation catalog
#[derive(Debug, Clone)]
pub struct ToolDefinitionStore {
    directory: PathBuf,
    file_prefix: String,
    shard_slots: u32,
    max_entries: usize,
}

impl ToolDefinitionStore {
    /// Create a store over `directory` with `shard_slots` chunk files of at
    /// most `max_entries` descriptors each
    pub fn new(directory: impl Into<PathBuf>, shard_slots: u32, max_entries: usize) -> Self {
        Self {
            directory: directory.into(),
            file_prefix: "tools_".to_string(),
            shard_slots,
            max_entries: max_entries.max(1),
        }
    }

    /// Create a store from catalog configuration
    #[must_use]
    pub fn from_config(config: &CatalogConfig) -> Self {
        Self::new(
            &config.directory,
            config.shard_slots,
            config.max_entries_per_shard,
        )
        .with_prefix(&config.file_prefix)
    }

    /// Override the chunk file name prefix
    #[must_use]
    pub fn with_prefix(mut self, prefix: &str) -> Self {
        self.file_prefix = prefix.to_string();
        self
    }

    /// Directory holding the chunk files
    #[must_use]
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// The fixed range of shard slots
    pub fn slots(&self) -> impl Iterator<Item = u32> + use<> {
        1..=self.shard_slots
    }

    /// Path of the chunk file for `slot`
    #[must_use]
    pub fn chunk_path(&self, slot: u32) -> PathBuf {
        self.directory
            .join(format!("{}{}.json", self.file_prefix, slot))
    }

    /// Whether the chunk file for `slot` exists.
    ///
    /// A slot that cannot be checked is an error, not an absent chunk.
    pub async fn exists(&self, slot: u32) -> Result<bool> {
        let path = self.chunk_path(slot);
        tokio::fs::try_exists(&path)
            .await
            .map_err(|e| Error::store(path.display(), format!("failed to check chunk: {e}")))
    }

    /// Load one chunk.
    ///
    /// A missing, unreadable or unparsable chunk is an error: a corrupt
    /// catalog must never be mistaken for an empty one.
    pub async fn load(&self, slot: u32) -> Result<Vec<OperationDescriptor>> {
        let path = self.chunk_path(slot);
        let content = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| Error::store(path.display(), format!("failed to read chunk: {e}")))?;

        let descriptors: Vec<OperationDescriptor> = serde_json::from_str(&content)
            .map_err(|e| Error::store(path.display(), format!("failed to parse chunk: {e}")))?;

        debug!(slot, count = descriptors.len(), "Loaded chunk");
        Ok(descriptors)
    }

    /// Load every existing chunk in slot order
    pub async fn load_all(&self) -> Result<Vec<(u32, Vec<OperationDescriptor>)>> {
        let mut chunks = Vec::new();
        for slot in self.slots() {
            if self.exists(slot).await? {
                chunks.push((slot, self.load(slot).await?));
            }
        }
        Ok(chunks)
    }

    /// Overwrite one chunk atomically
    pub async fn write(&self, slot: u32, descriptors: &[OperationDescriptor]) -> Result<()> {
        let path = self.chunk_path(slot);
        let contents = encode_chunk(descriptors)
            .map_err(|e| Error::store(path.display(), format!("failed to encode chunk: {e}")))?;

        tokio::fs::create_dir_all(&self.directory)
            .await
            .map_err(|e| Error::store(self.directory.display(), e.to_string()))?;

        let tmp_path = self
            .directory
            .join(format!(".{}{}.json.tmp", self.file_prefix, slot));
        tokio::fs::write(&tmp_path, contents)
            .await
            .map_err(|e| Error::store(tmp_path.display(), format!("failed to write chunk: {e}")))?;
        tokio::fs::rename(&tmp_path, &path)
            .await
            .map_err(|e| Error::store(path.display(), format!("failed to replace chunk: {e}")))?;

        debug!(slot, count = descriptors.len(), path = %path.display(), "Wrote chunk");
        Ok(())
    }

    /// Split `slot` if it holds more than the configured maximum.
    ///
    /// The first `max_entries` descriptors stay; the overflow is moved in
    /// order into existing chunks with spare room, then into unused slots.
    /// Returns the slots that received descriptors. When the fixed range
    /// cannot absorb the overflow nothing is written.
    pub async fn enforce_size(&self, slot: u32) -> Result<Vec<u32>> {
        let mut entries = self.load(slot).await?;
        if entries.len() <= self.max_entries {
            return Ok(Vec::new());
        }

        let mut overflow = entries.split_off(self.max_entries);
        overflow.reverse(); // pop() from the back preserves order

        let mut placements: Vec<(u32, Vec<OperationDescriptor>)> = Vec::new();
        let mut unused = Vec::new();

        for candidate in self.slots().filter(|&s| s != slot) {
            if overflow.is_empty() {
                break;
            }
            if !self.exists(candidate).await? {
                unused.push(candidate);
                continue;
            }
            let mut existing = self.load(candidate).await?;
            if existing.len() >= self.max_entries {
                continue;
            }
            while existing.len() < self.max_entries {
                let Some(next) = overflow.pop() else { break };
                existing.push(next);
            }
            placements.push((candidate, existing));
        }

        for candidate in unused {
            if overflow.is_empty() {
                break;
            }
            let mut fresh = Vec::new();
            while fresh.len() < self.max_entries {
                let Some(next) = overflow.pop() else { break };
                fresh.push(next);
            }
            placements.push((candidate, fresh));
        }

        if !overflow.is_empty() {
            return Err(Error::store(
                self.chunk_path(slot).display(),
                format!(
                    "no free shard slot for {} overflowing descriptors (slots 1..={} full)",
                    overflow.len(),
                    self.shard_slots
                ),
            ));
        }

        // Destinations first so an interrupted split never loses a descriptor
        let mut targets = Vec::with_capacity(placements.len());
        for (target, descriptors) in &placements {
            self.write(*target, descriptors).await?;
            targets.push(*target);
        }
        self.write(slot, &entries).await?;

        info!(slot, targets = ?targets, kept = entries.len(), "Split oversized chunk");
        Ok(targets)
    }
}

/// Serialize descriptors as a tab-indented JSON array with a trailing newline
fn encode_chunk(descriptors: &[OperationDescriptor]) -> serde_json::Result<Vec<u8>> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"\t");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
    descriptors.serialize(&mut serializer)?;
    buf.push(b'\n');
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalog_core::HttpMethod;
    use tempfile::TempDir;

    fn descriptors(prefix: &str, count: usize) -> Vec<OperationDescriptor> {
        (0..count)
            .map(|i| {
                OperationDescriptor::new(
                    format!("{prefix}{i}"),
                    HttpMethod::Get,
                    format!("/{prefix}/{i}"),
                )
            })
            .collect()
    }

    #[tokio::test]
    async fn test_write_then_load() {
        let temp_dir = TempDir::new().unwrap();
        let store = ToolDefinitionStore::new(temp_dir.path(), 3, 20);
        let items = descriptors("page", 3);

        store.write(1, &items).await.unwrap();

        assert!(store.exists(1).await.unwrap());
        assert!(!store.exists(2).await.unwrap());
        assert_eq!(store.load(1).await.unwrap(), items);
    }

    #[tokio::test]
    async fn test_chunk_is_tab_indented() {
        let temp_dir = TempDir::new().unwrap();
        let store = ToolDefinitionStore::new(temp_dir.path(), 1, 20);

        store.write(1, &descriptors("page", 1)).await.unwrap();

        let raw = std::fs::read_to_string(temp_dir.path().join("tools_1.json")).unwrap();
        assert!(raw.starts_with("[\n\t{\n\t\t\"name\": \"page0\""));
        assert!(raw.ends_with("]\n"));
    }

    #[tokio::test]
    async fn test_load_missing_chunk_is_error() {
        let temp_dir = TempDir::new().unwrap();
        let store = ToolDefinitionStore::new(temp_dir.path(), 1, 20);

        let err = store.load(1).await.unwrap_err();
        assert!(matches!(err, Error::Store { .. }));
    }

    #[tokio::test]
    async fn test_load_corrupt_chunk_is_error() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("tools_2.json"), "[{\"name\": ").unwrap();
        let store = ToolDefinitionStore::new(temp_dir.path(), 2, 20);

        let err = store.load(2).await.unwrap_err();
        assert!(err.to_string().contains("failed to parse chunk"));

        // load_all must not mask the corrupt chunk either
        assert!(store.load_all().await.is_err());
    }

    #[tokio::test]
    async fn test_uncheckable_slot_is_error() {
        let temp_dir = TempDir::new().unwrap();
        let not_a_dir = temp_dir.path().join("catalog");
        std::fs::write(&not_a_dir, "plain file").unwrap();
        let store = ToolDefinitionStore::new(&not_a_dir, 2, 20);

        let err = store.exists(1).await.unwrap_err();
        assert!(err.to_string().contains("failed to check chunk"));

        // Must not be reported as an empty catalog
        assert!(store.load_all().await.is_err());
    }

    #[tokio::test]
    async fn test_load_all_skips_absent_slots() {
        let temp_dir = TempDir::new().unwrap();
        let store = ToolDefinitionStore::new(temp_dir.path(), 4, 20);
        store.write(1, &descriptors("a", 1)).await.unwrap();
        store.write(3, &descriptors("b", 2)).await.unwrap();

        let chunks = store.load_all().await.unwrap();
        let slots: Vec<u32> = chunks.iter().map(|(slot, _)| *slot).collect();
        assert_eq!(slots, vec![1, 3]);
    }

    #[tokio::test]
    async fn test_enforce_size_noop_within_limit() {
        let temp_dir = TempDir::new().unwrap();
        let store = ToolDefinitionStore::new(temp_dir.path(), 2, 5);
        store.write(1, &descriptors("a", 5)).await.unwrap();

        assert!(store.enforce_size(1).await.unwrap().is_empty());
        assert!(!store.exists(2).await.unwrap());
    }

    #[tokio::test]
    async fn test_enforce_size_fills_existing_then_unused_slots() {
        let temp_dir = TempDir::new().unwrap();
        let store = ToolDefinitionStore::new(temp_dir.path(), 4, 3);
        store.write(1, &descriptors("a", 7)).await.unwrap();
        store.write(2, &descriptors("b", 2)).await.unwrap();

        let targets = store.enforce_size(1).await.unwrap();
        assert_eq!(targets, vec![2, 3]);

        let chunk1 = store.load(1).await.unwrap();
        let chunk2 = store.load(2).await.unwrap();
        let chunk3 = store.load(3).await.unwrap();
        assert_eq!(chunk1.len(), 3);
        assert_eq!(
            chunk2.iter().map(|d| d.name.as_str()).collect::<Vec<_>>(),
            vec!["b0", "b1", "a3"]
        );
        assert_eq!(
            chunk3.iter().map(|d| d.name.as_str()).collect::<Vec<_>>(),
            vec!["a4", "a5", "a6"]
        );

        // No name appears in more than one shard
        let mut names: Vec<String> = store
            .load_all()
            .await
            .unwrap()
            .into_iter()
            .flat_map(|(_, ds)| ds.into_iter().map(|d| d.name))
            .collect();
        let total = names.len();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), total);
        assert_eq!(total, 9);
    }

    #[tokio::test]
    async fn test_enforce_size_without_room_writes_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let store = ToolDefinitionStore::new(temp_dir.path(), 2, 2);
        store.write(1, &descriptors("a", 5)).await.unwrap();

        let err = store.enforce_size(1).await.unwrap_err();
        assert!(err.to_string().contains("no free shard slot"));
        assert_eq!(store.load(1).await.unwrap().len(), 5);
        assert!(!store.exists(2).await.unwrap());
    }
}
