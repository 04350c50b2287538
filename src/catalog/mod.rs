//! Operation catalog: chunked persistence and in-memory discovery
//!
//! ```text
//! ┌──────────────────┐  load_all  ┌──────────────────┐  snapshot  ┌──────────────┐
//! │ tools_1.json ... │───────────▶│ EndpointCatalog  │───────────▶│ list/execute │
//! │ tools_N.json     │            │ (sorted, unique) │            │  (readers)   │
//! └──────────────────┘            └──────────────────┘            └──────────────┘
//!          ▲
//!          │ write + enforce_size (sync engine only)
//! ```

mod category;
mod listing;
mod store;

pub use category::{DEFAULT_CATEGORY, category_for, category_from_path};
pub use listing::{
    CatalogListing, EndpointCatalog, EndpointDetails, EndpointEntry, ListFilters, MIN_SEARCH_LEN,
};
pub use store::ToolDefinitionStore;

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::info;

use crate::Result;

/// Shared, reloadable catalog snapshot.
///
/// Readers take an `Arc` snapshot and never hold the lock across an await;
/// a reload after a sync run swaps the whole catalog at once.
#[derive(Debug, Default)]
pub struct CatalogHandle {
    current: RwLock<Arc<EndpointCatalog>>,
}

impl CatalogHandle {
    /// Wrap an already built catalog
    #[must_use]
    pub fn new(catalog: EndpointCatalog) -> Self {
        Self {
            current: RwLock::new(Arc::new(catalog)),
        }
    }

    /// Build a handle from the store contents
    pub async fn load(store: &ToolDefinitionStore) -> Result<Self> {
        Ok(Self::new(EndpointCatalog::load(store).await?))
    }

    /// Current catalog snapshot
    #[must_use]
    pub fn snapshot(&self) -> Arc<EndpointCatalog> {
        Arc::clone(&self.current.read())
    }

    /// Replace the catalog
    pub fn replace(&self, catalog: EndpointCatalog) {
        *self.current.write() = Arc::new(catalog);
    }

    /// Re-read the store and swap in the new catalog.
    ///
    /// On error the previous snapshot stays in place.
    pub async fn reload(&self, store: &ToolDefinitionStore) -> Result<usize> {
        let catalog = EndpointCatalog::load(store).await?;
        let count = catalog.len();
        self.replace(catalog);
        info!(count, "Reloaded catalog");
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalog_core::{HttpMethod, OperationDescriptor};
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_reload_swaps_snapshot() {
        let temp_dir = TempDir::new().unwrap();
        let store = ToolDefinitionStore::new(temp_dir.path(), 2, 20);
        store
            .write(1, &[OperationDescriptor::new("listPages", HttpMethod::Get, "/pages")])
            .await
            .unwrap();

        let handle = CatalogHandle::load(&store).await.unwrap();
        let before = handle.snapshot();
        assert_eq!(before.len(), 1);

        store
            .write(2, &[OperationDescriptor::new("createPage", HttpMethod::Post, "/pages")])
            .await
            .unwrap();
        assert_eq!(handle.reload(&store).await.unwrap(), 2);

        // Old snapshots stay valid for in-flight readers
        assert_eq!(before.len(), 1);
        assert_eq!(handle.snapshot().len(), 2);
    }

    #[tokio::test]
    async fn test_failed_reload_keeps_previous_snapshot() {
        let temp_dir = TempDir::new().unwrap();
        let store = ToolDefinitionStore::new(temp_dir.path(), 1, 20);
        store
            .write(1, &[OperationDescriptor::new("listPages", HttpMethod::Get, "/pages")])
            .await
            .unwrap();
        let handle = CatalogHandle::load(&store).await.unwrap();

        std::fs::write(store.chunk_path(1), "not json").unwrap();

        assert!(handle.reload(&store).await.is_err());
        assert_eq!(handle.snapshot().len(), 1);
    }
}
