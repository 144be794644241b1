//! Data source backed by a JSON snapshot of work items

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use screener_pipeline::{DataSource, DataUnavailable, WorkItem};
use serde::Deserialize;
use tokio::sync::OnceCell;

/// Accepted snapshot layouts: a bare array or `{"items": [...]}`.
#[derive(Deserialize)]
#[serde(untagged)]
enum SnapshotFile {
    Bare(Vec<WorkItem>),
    Wrapped { items: Vec<WorkItem> },
}

impl SnapshotFile {
    fn into_items(self) -> Vec<WorkItem> {
        match self {
            Self::Bare(items) | Self::Wrapped { items } => items,
        }
    }
}

#[derive(Debug, Default)]
struct Loaded {
    /// File order, duplicates removed
    order: Vec<String>,
    items: BTreeMap<String, WorkItem>,
}

impl Loaded {
    fn from_items(items: Vec<WorkItem>) -> Self {
        let mut loaded = Self::default();
        for item in items {
            if loaded.items.contains_key(&item.id) {
                log::warn!("snapshot: duplicate id {}, keeping the last record", item.id);
            } else {
                loaded.order.push(item.id.clone());
            }
            loaded.items.insert(item.id.clone(), item);
        }
        loaded
    }
}

/// Work items read once, on first use, from a JSON file.
#[derive(Debug)]
pub struct SnapshotSource {
    path: Option<PathBuf>,
    loaded: OnceCell<Loaded>,
}

impl SnapshotSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            loaded: OnceCell::new(),
        }
    }

    /// In-memory source, already loaded.
    pub fn from_items(items: Vec<WorkItem>) -> Self {
        Self {
            path: None,
            loaded: OnceCell::new_with(Some(Loaded::from_items(items))),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    async fn load(&self) -> Result<&Loaded, DataUnavailable> {
        self.loaded
            .get_or_try_init(|| async {
                let Some(path) = &self.path else {
                    return Ok(Loaded::default());
                };
                let bytes = tokio::fs::read(path).await.map_err(|e| {
                    DataUnavailable::new(format!("failed to read {}: {e}", path.display()))
                })?;
                let file: SnapshotFile = serde_json::from_slice(&bytes).map_err(|e| {
                    DataUnavailable::new(format!("invalid snapshot {}: {e}", path.display()))
                })?;
                let loaded = Loaded::from_items(file.into_items());
                log::info!(
                    "snapshot: loaded {} items from {}",
                    loaded.order.len(),
                    path.display()
                );
                Ok(loaded)
            })
            .await
    }
}

#[async_trait]
impl DataSource for SnapshotSource {
    async fn list_work_items(&self) -> Result<Vec<String>, DataUnavailable> {
        Ok(self.load().await?.order.clone())
    }

    async fn fetch_payload(&self, id: &str) -> Result<WorkItem, DataUnavailable> {
        self.load()
            .await?
            .items
            .get(id)
            .cloned()
            .ok_or_else(|| DataUnavailable::for_item(id, "not in snapshot"))
    }
}
