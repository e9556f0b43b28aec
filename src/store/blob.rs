// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! SQLite blob database backend

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

use super::{retain_allowed, ContentStore, PendingUpload};
use crate::locator::LocatorRegistry;
use crate::visual::VisualItem;
use crate::{Result, VisualError};

/// Blob database (thread-safe wrapper)
#[derive(Clone)]
pub struct BlobStore {
    conn: Arc<Mutex<Connection>>,
    registry: LocatorRegistry,
}

/// Content hash over filename and bytes, used as the record id
pub fn content_id(filename: &str, bytes: &[u8]) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(filename.as_bytes());
    hasher.update(&[0]);
    hasher.update(bytes);
    hasher.finalize().to_hex().to_string()
}

impl BlobStore {
    /// Open or create the database
    pub fn open<P: AsRef<Path>>(path: P, registry: LocatorRegistry) -> Result<Self> {
        let conn = Connection::open(path.as_ref())
            .map_err(|e| VisualError::Store(format!("Cannot open blob database: {}", e)))?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
            registry,
        };
        store.initialize()?;
        info!("Blob database ready: {:?}", path.as_ref());
        Ok(store)
    }

    /// Open an in-memory database (for testing)
    pub fn in_memory(registry: LocatorRegistry) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
            registry,
        };
        store.initialize()?;
        Ok(store)
    }

    fn lock_conn(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| VisualError::Store("Blob database lock poisoned".to_string()))
    }

    /// Initialize database schema
    fn initialize(&self) -> Result<()> {
        let conn = self.lock_conn()?;
        conn.execute_batch(r#"
            CREATE TABLE IF NOT EXISTS visuals (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                id TEXT NOT NULL UNIQUE,
                filename TEXT NOT NULL UNIQUE,
                mime TEXT NOT NULL,
                data BLOB NOT NULL,
                created_at TEXT NOT NULL
            );
        "#)?;
        Ok(())
    }

    fn list_rows(&self) -> Result<Vec<(String, String, String, Vec<u8>)>> {
        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare("SELECT id, filename, mime, data FROM visuals ORDER BY seq")?;
        let rows = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    fn insert(&self, id: &str, upload: &PendingUpload) -> Result<()> {
        let mut conn = self.lock_conn()?;
        let tx = conn.transaction()?;
        // Re-uploading a filename replaces its row
        tx.execute(
            "DELETE FROM visuals WHERE filename = ?1 OR id = ?2",
            params![upload.filename, id],
        )?;
        tx.execute(
            r#"INSERT INTO visuals (id, filename, mime, data, created_at)
               VALUES (?1, ?2, ?3, ?4, ?5)"#,
            params![id, upload.filename, upload.mime, upload.bytes, Utc::now().to_rfc3339()],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn delete(&self, id: &str) -> Result<usize> {
        let conn = self.lock_conn()?;
        Ok(conn.execute("DELETE FROM visuals WHERE id = ?1", params![id])?)
    }

    /// Number of stored visuals
    pub fn count(&self) -> Result<i64> {
        let conn = self.lock_conn()?;
        conn.query_row("SELECT COUNT(*) FROM visuals", [], |row| row.get(0))
            .map_err(Into::into)
    }
}

#[async_trait]
impl ContentStore for BlobStore {
    fn name(&self) -> &'static str {
        "blob"
    }

    async fn list(&self) -> Result<Vec<VisualItem>> {
        let rows = self.list_rows().map_err(VisualError::store)?;
        debug!("Blob database holds {} visuals", rows.len());
        let items = rows
            .into_iter()
            .map(|(id, filename, mime, data)| {
                let locator = self.registry.create(data, &mime);
                VisualItem::new(id, locator, filename, None)
            })
            .collect();
        Ok(retain_allowed(items))
    }

    async fn put(&self, upload: &PendingUpload, _revision: Option<&str>) -> Result<VisualItem> {
        let id = content_id(&upload.filename, &upload.bytes);
        self.insert(&id, upload).map_err(VisualError::store)?;
        let locator = self.registry.create(upload.bytes.clone(), &upload.mime);
        Ok(VisualItem::new(id, locator, upload.filename.clone(), None))
    }

    async fn remove(&self, item: &VisualItem) -> Result<()> {
        match self.delete(&item.id).map_err(VisualError::store)? {
            0 => Err(VisualError::Store(format!("{} is no longer stored", item.filename))),
            _ => Ok(()),
        }
    }

    async fn probe(&self) -> Result<()> {
        self.count().map(|_| ()).map_err(VisualError::store)
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
    async fn test_put_then_list_in_insertion_order() {
        let store = BlobStore::in_memory(LocatorRegistry::new()).unwrap();
        store.put(&upload("z.png", b"1"), None).await.unwrap();
        store.put(&upload("a.pdf", b"2"), None).await.unwrap();

        let items = store.list().await.unwrap();
        let names: Vec<_> = items.iter().map(|i| i.filename.as_str()).collect();
        assert_eq!(names, vec!["z.png", "a.pdf"]);
        assert!(items[1].is_pdf());
    }

    #[tokio::test]
    async fn test_id_is_content_hash() {
        let store = BlobStore::in_memory(LocatorRegistry::new()).unwrap();
        let item = store.put(&upload("a.png", b"bytes"), None).await.unwrap();
        assert_eq!(item.id, content_id("a.png", b"bytes"));
        assert_ne!(content_id("a.png", b"bytes"), content_id("b.png", b"bytes"));
    }

    #[tokio::test]
    async fn test_reupload_replaces_by_filename() {
        let store = BlobStore::in_memory(LocatorRegistry::new()).unwrap();
        store.put(&upload("a.png", b"old"), None).await.unwrap();
        let new = store.put(&upload("a.png", b"new"), None).await.unwrap();

        let items = store.list().await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, new.id);
    }

    #[tokio::test]
    async fn test_failed_replacement_keeps_previous_row() {
        let store = BlobStore::in_memory(LocatorRegistry::new()).unwrap();
        let old = store.put(&upload("a.png", b"old"), None).await.unwrap();
        store
            .lock_conn()
            .unwrap()
            .execute_batch(
                "CREATE TRIGGER reject_new BEFORE INSERT ON visuals WHEN NEW.data = X'6E6577' \
                 BEGIN SELECT RAISE(ABORT, 'rejected'); END;",
            )
            .unwrap();

        let err = store.put(&upload("a.png", b"new"), None).await.unwrap_err();
        assert!(matches!(err, VisualError::Store(_)));

        let items = store.list().await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, old.id);
    }

    #[tokio::test]
    async fn test_remove_twice_fails_second_time() {
        let store = BlobStore::in_memory(LocatorRegistry::new()).unwrap();
        let item = store.put(&upload("a.png", b"x"), None).await.unwrap();
        store.remove(&item).await.unwrap();
        assert_eq!(store.count().unwrap(), 0);
        assert!(matches!(store.remove(&item).await, Err(VisualError::Store(_))));
    }

    #[tokio::test]
    async fn test_reopen_file_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("visuals.db");
        {
            let store = BlobStore::open(&path, LocatorRegistry::new()).unwrap();
            store.put(&upload("keep.webp", b"w"), None).await.unwrap();
        }
        let store = BlobStore::open(&path, LocatorRegistry::new()).unwrap();
        assert_eq!(store.list().await.unwrap()[0].label, "Keep");
    }
}
