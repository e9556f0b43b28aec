// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Local key/value store backend
//!
//! A JSON file maps string keys to string values. The namespaced key holds
//! the serialized record sequence. Every operation reads the file afresh and
//! every mutation rewrites it, so several stores on one file stay consistent.

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

use super::{retain_allowed, ContentStore, PendingUpload};
use crate::locator::LocatorRegistry;
use crate::visual::{derive_label, VisualItem};
use crate::{Result, VisualError};

/// One persisted visual
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredVisual {
    id: String,
    filename: String,
    label: String,
    mime: String,
    /// Base64-encoded file bytes
    data: String,
    created_at: DateTime<Utc>,
}

pub struct LocalStore {
    path: PathBuf,
    namespace: String,
    registry: LocatorRegistry,
    /// Serialises read-modify-write cycles
    write_lock: Mutex<()>,
}

impl LocalStore {
    pub fn new(path: impl AsRef<Path>, namespace: &str, registry: LocatorRegistry) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            namespace: namespace.to_string(),
            registry,
            write_lock: Mutex::new(()),
        }
    }

    async fn read_area(&self) -> Result<BTreeMap<String, String>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) if content.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(content) => serde_json::from_str(&content).map_err(|e| {
                VisualError::Store(format!("Corrupt key/value file {:?}: {}", self.path, e))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(VisualError::Store(format!("Cannot read {:?}: {}", self.path, e))),
        }
    }

    async fn load_records(&self) -> Result<Vec<StoredVisual>> {
        let area = self.read_area().await?;
        match area.get(&self.namespace) {
            Some(value) => serde_json::from_str(value).map_err(|e| {
                VisualError::Store(format!("Corrupt collection under '{}': {}", self.namespace, e))
            }),
            None => Ok(Vec::new()),
        }
    }

    /// Rewrite the namespaced key, keeping other keys in the file
    async fn persist(&self, records: &[StoredVisual]) -> Result<()> {
        let mut area = self.read_area().await?;
        area.insert(self.namespace.clone(), serde_json::to_string(records)?);
        let content = serde_json::to_string_pretty(&area)?;

        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, content)
            .await
            .map_err(|e| VisualError::Store(format!("Cannot write {:?}: {}", tmp, e)))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| VisualError::Store(format!("Cannot replace {:?}: {}", self.path, e)))?;
        debug!("Persisted {} visuals to {:?}", records.len(), self.path);
        Ok(())
    }

    fn next_id() -> String {
        let suffix = Uuid::new_v4().simple().to_string();
        format!("{}-{}", Utc::now().timestamp_millis(), &suffix[..8])
    }

    fn to_item(&self, record: &StoredVisual) -> Option<VisualItem> {
        let bytes = match general_purpose::STANDARD.decode(&record.data) {
            Ok(b) => b,
            Err(e) => {
                warn!("Skipping unreadable record {}: {}", record.id, e);
                return None;
            }
        };
        let locator = self.registry.create(bytes, &record.mime);
        let mut item = VisualItem::new(record.id.clone(), locator, record.filename.clone(), None);
        item.label = record.label.clone();
        Some(item)
    }
}

#[async_trait]
impl ContentStore for LocalStore {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn list(&self) -> Result<Vec<VisualItem>> {
        let records = self.load_records().await?;
        debug!("Read {} visuals from {:?}", records.len(), self.path);
        let items = records.iter().filter_map(|r| self.to_item(r)).collect();
        Ok(retain_allowed(items))
    }

    async fn put(&self, upload: &PendingUpload, _revision: Option<&str>) -> Result<VisualItem> {
        let _write = self.write_lock.lock().await;
        let mut records = self.load_records().await?;

        let record = StoredVisual {
            id: Self::next_id(),
            filename: upload.filename.clone(),
            label: derive_label(&upload.filename),
            mime: upload.mime.clone(),
            data: general_purpose::STANDARD.encode(&upload.bytes),
            created_at: Utc::now(),
        };
        records.retain(|r| r.filename != upload.filename);
        records.push(record.clone());
        self.persist(&records).await?;

        self.to_item(&record)
            .ok_or_else(|| VisualError::Store("Stored record could not be read back".to_string()))
    }

    async fn remove(&self, item: &VisualItem) -> Result<()> {
        let _write = self.write_lock.lock().await;
        let mut records = self.load_records().await?;

        let before = records.len();
        records.retain(|r| r.id != item.id);
        if records.len() == before {
            return Err(VisualError::Store(format!("{} is no longer stored", item.filename)));
        }
        self.persist(&records).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upload(name: &str, bytes: &[u8]) -> PendingUpload {
        PendingUpload {
            filename: name.to_string(),
            mime: crate::visual::mime_for_filename(name).to_string(),
            bytes: bytes.to_vec(),
        }
    }

    #[tokio::test]
    async fn test_empty_file_lists_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::new(dir.path().join("kv.json"), "visual-supports", LocatorRegistry::new());
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_put_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kv.json");
        let registry = LocatorRegistry::new();

        let store = LocalStore::new(&path, "visual-supports", registry.clone());
        let item = store.put(&upload("brush_teeth.png", b"img"), None).await.unwrap();
        assert_eq!(item.label, "Brush Teeth");
        assert!(item.revision.is_none());
        store.put(&upload("lunch.pdf", b"pdf"), None).await.unwrap();

        let reopened = LocalStore::new(&path, "visual-supports", registry.clone());
        let items = reopened.list().await.unwrap();
        let names: Vec<_> = items.iter().map(|i| i.filename.as_str()).collect();
        assert_eq!(names, vec!["brush_teeth.png", "lunch.pdf"]);

        let crate::visual::Locator::Transient { token } = &items[0].locator else {
            panic!("Expected transient locator");
        };
        assert_eq!(registry.resolve(token).unwrap().bytes.as_slice(), b"img");
    }

    #[tokio::test]
    async fn test_same_filename_replaces_record() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::new(dir.path().join("kv.json"), "ns", LocatorRegistry::new());
        store.put(&upload("a.png", b"1"), None).await.unwrap();
        let second = store.put(&upload("a.png", b"2"), None).await.unwrap();

        let items = store.list().await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, second.id);
    }

    #[tokio::test]
    async fn test_other_keys_survive_rewrites() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kv.json");
        std::fs::write(&path, r#"{"theme":"dark"}"#).unwrap();

        let store = LocalStore::new(&path, "visual-supports", LocatorRegistry::new());
        store.put(&upload("a.png", b"1"), None).await.unwrap();

        let area: BTreeMap<String, String> =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(area.get("theme").map(String::as_str), Some("dark"));
        assert!(area.contains_key("visual-supports"));
    }

    #[tokio::test]
    async fn test_remove_unknown_item_is_store_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::new(dir.path().join("kv.json"), "ns", LocatorRegistry::new());
        let item = store.put(&upload("a.png", b"1"), None).await.unwrap();

        store.remove(&item).await.unwrap();
        assert!(store.list().await.unwrap().is_empty());
        assert!(matches!(store.remove(&item).await, Err(VisualError::Store(_))));
    }

    #[tokio::test]
    async fn test_two_stores_on_one_file_keep_both_uploads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kv.json");
        let a = LocalStore::new(&path, "visual-supports", LocatorRegistry::new());
        let b = LocalStore::new(&path, "visual-supports", LocatorRegistry::new());
        a.list().await.unwrap();
        b.list().await.unwrap();

        a.put(&upload("from-a.png", b"a"), None).await.unwrap();
        b.put(&upload("from-b.png", b"b"), None).await.unwrap();

        let names: Vec<_> = a.list().await.unwrap().into_iter().map(|i| i.filename).collect();
        assert_eq!(names, vec!["from-a.png", "from-b.png"]);

        let reopened = LocalStore::new(&path, "visual-supports", LocatorRegistry::new());
        assert_eq!(reopened.list().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_corrupt_file_is_store_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kv.json");
        std::fs::write(&path, "{not json").unwrap();
        let store = LocalStore::new(&path, "ns", LocatorRegistry::new());
        assert!(matches!(store.list().await, Err(VisualError::Store(_))));
    }
}
