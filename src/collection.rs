// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Visual collection controller
//!
//! Sole writer of the in-memory collection. Every mutation goes to the
//! content store first; after uploads the collection is re-read from the
//! store instead of being patched locally.

use serde::Serialize;
use std::collections::HashSet;
use tracing::{debug, error, info, warn};

use crate::intake::{self, UploadFile};
use crate::layout::{layout, GridLayout};
use crate::locator::LocatorRegistry;
use crate::store::{ContentStore, PendingUpload};
use crate::unlock::Session;
use crate::visual::VisualItem;
use crate::{Result, VisualError};

/// Lifecycle of the collection
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "message", rename_all = "snake_case")]
pub enum CollectionStatus {
    Idle,
    Loading,
    Ready,
    Uploading,
    /// Last load failed; the cause is kept for display
    Error(String),
}

/// Per-batch upload outcome
#[derive(Debug, Default, Serialize)]
pub struct UploadReport {
    /// Filenames persisted by the store, in batch order
    pub stored: Vec<String>,
    /// Filenames excluded by type before reaching the store
    pub rejected: Vec<String>,
    /// Filenames that failed, with the reason
    pub failed: Vec<(String, String)>,
}

impl UploadReport {
    pub fn is_clean(&self) -> bool {
        self.rejected.is_empty() && self.failed.is_empty()
    }

    /// Human-readable summary of everything that went wrong
    pub fn problems(&self) -> Option<String> {
        let mut parts = Vec::new();
        if !self.rejected.is_empty() {
            parts.push(format!("Skipped unsupported: {}", self.rejected.join(", ")));
        }
        for (name, reason) in &self.failed {
            parts.push(format!("{}: {}", name, reason));
        }
        (!parts.is_empty()).then(|| parts.join("; "))
    }
}

pub struct CollectionController {
    store: Box<dyn ContentStore>,
    session: Session,
    registry: LocatorRegistry,
    items: Vec<VisualItem>,
    status: CollectionStatus,
    last_error: Option<String>,
}

impl CollectionController {
    pub fn new(store: Box<dyn ContentStore>, session: Session, registry: LocatorRegistry) -> Self {
        Self {
            store,
            session,
            registry,
            items: Vec::new(),
            status: CollectionStatus::Idle,
            last_error: None,
        }
    }

    pub fn items(&self) -> &[VisualItem] {
        &self.items
    }

    pub fn find(&self, id: &str) -> Option<&VisualItem> {
        self.items.iter().find(|item| item.id == id)
    }

    pub fn status(&self) -> &CollectionStatus {
        &self.status
    }

    pub fn is_loading(&self) -> bool {
        matches!(self.status, CollectionStatus::Loading | CollectionStatus::Uploading)
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn clear_error(&mut self) {
        self.last_error = None;
    }

    pub fn layout(&self) -> GridLayout {
        layout(self.items.len())
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn store_name(&self) -> &'static str {
        self.store.name()
    }

    fn guard(&mut self) -> Result<()> {
        if let Err(e) = self.session.require_unlocked() {
            self.last_error = Some(e.to_string());
            return Err(e);
        }
        Ok(())
    }

    /// Replace the collection with the store's listing.
    ///
    /// On failure the previous items stay in place and the status carries
    /// the cause.
    pub async fn load(&mut self) -> Result<()> {
        self.guard()?;
        let flight = InFlight::begin(&mut self.status, CollectionStatus::Loading);
        debug!("Loading collection from {} store", self.store.name());

        match self.store.list().await {
            Ok(listed) => {
                let fresh = dedupe(listed);
                release_stale(&self.registry, &self.items, &fresh);
                info!("Collection loaded: {} visuals", fresh.len());
                self.items = fresh;
                self.last_error = None;
                flight.finish(CollectionStatus::Ready);
                Ok(())
            }
            Err(e) => {
                error!("Failed to load collection: {}", e);
                let message = e.to_string();
                self.last_error = Some(message.clone());
                flight.finish(CollectionStatus::Error(message));
                Err(e)
            }
        }
    }

    /// Store a batch of files one at a time, then resynchronise.
    ///
    /// Unsupported files never reach the store. A failing file is recorded
    /// and the rest of the batch continues. Callers serialise access through
    /// `&mut self`; a batch whose future is dropped leaves the status `Idle`
    /// so the next view reloads.
    pub async fn upload(&mut self, files: Vec<UploadFile>) -> Result<UploadReport> {
        self.guard()?;

        let intake = intake::accept(files);
        let mut report = UploadReport {
            rejected: intake.rejected,
            ..UploadReport::default()
        };
        if intake.accepted.is_empty() {
            self.last_error = report.problems();
            return Ok(report);
        }

        let flight = InFlight::begin(&mut self.status, CollectionStatus::Uploading);
        for file in intake.accepted {
            match store_one(self.store.as_ref(), &self.registry, &self.items, &file).await {
                Ok(()) => report.stored.push(file.filename),
                Err(e) => {
                    warn!("Upload of {} failed: {}", file.filename, e);
                    report.failed.push((file.filename, e.to_string()));
                }
            }
        }
        flight.finish(CollectionStatus::Ready);
        info!(
            "Upload batch finished: {} stored, {} failed, {} rejected",
            report.stored.len(),
            report.failed.len(),
            report.rejected.len()
        );

        let reload = self.load().await;
        if let Some(problems) = report.problems() {
            self.last_error = Some(match reload {
                Ok(()) => problems,
                Err(e) => format!("{}; {}", problems, e),
            });
        }
        Ok(report)
    }

    /// Delete one item from the store and, on success, from memory
    pub async fn remove(&mut self, id: &str) -> Result<()> {
        self.guard()?;
        let Some(item) = self.find(id).cloned() else {
            let e = VisualError::NotFound(id.to_string());
            self.last_error = Some(e.to_string());
            return Err(e);
        };

        match self.store.remove(&item).await {
            Ok(()) => {
                self.items.retain(|i| i.id != item.id);
                self.registry.revoke(&item.locator);
                self.last_error = None;
                info!("Removed {}", item.filename);
                Ok(())
            }
            Err(e) => {
                warn!("Failed to remove {}: {}", item.filename, e);
                self.last_error = Some(e.to_string());
                Err(e)
            }
        }
    }
}

impl Drop for CollectionController {
    fn drop(&mut self) {
        for item in &self.items {
            self.registry.revoke(&item.locator);
        }
    }
}

/// Marks an operation in progress; an abandoned one falls back to `Idle`
struct InFlight<'a> {
    status: &'a mut CollectionStatus,
    finished: bool,
}

impl<'a> InFlight<'a> {
    fn begin(status: &'a mut CollectionStatus, state: CollectionStatus) -> Self {
        *status = state;
        Self {
            status,
            finished: false,
        }
    }

    fn finish(mut self, state: CollectionStatus) {
        *self.status = state;
        self.finished = true;
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.finished {
            warn!("{:?} abandoned before completion", self.status);
            *self.status = CollectionStatus::Idle;
        }
    }
}

async fn store_one(
    store: &dyn ContentStore,
    registry: &LocatorRegistry,
    items: &[VisualItem],
    file: &UploadFile,
) -> Result<()> {
    let bytes = file.read_bytes().await?;
    let pending = PendingUpload {
        filename: file.filename.clone(),
        mime: file.effective_mime(),
        bytes,
    };
    let revision = items
        .iter()
        .find(|item| item.filename == file.filename)
        .and_then(|item| item.revision.clone());
    if revision.is_some() {
        debug!("Overwriting existing {}", file.filename);
    }

    let stored = store.put(&pending, revision.as_deref()).await?;
    // The collection is re-read after the batch; this copy is not kept
    registry.revoke(&stored.locator);
    Ok(())
}

/// Revoke transient locators that the incoming listing does not reuse
fn release_stale(registry: &LocatorRegistry, current: &[VisualItem], fresh: &[VisualItem]) {
    let keep: HashSet<_> = fresh.iter().map(|i| &i.locator).collect();
    for item in current {
        if !keep.contains(&item.locator) {
            registry.revoke(&item.locator);
        }
    }
}

/// Keep the first occurrence of each id
fn dedupe(items: Vec<VisualItem>) -> Vec<VisualItem> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| {
            let fresh = seen.insert(item.id.clone());
            if !fresh {
                warn!("Dropping duplicate id from listing: {}", item.id);
            }
            fresh
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::visual::Locator;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};
    use tokio_test::{assert_err, assert_ok};

    /// Scriptable in-memory store
    #[derive(Clone, Default)]
    struct MockStore {
        registry: LocatorRegistry,
        items: Arc<Mutex<Vec<(VisualItem, Vec<u8>)>>>,
        puts: Arc<Mutex<Vec<(String, Option<String>)>>>,
        fail_list: Arc<Mutex<Option<String>>>,
        fail_put: Arc<Mutex<HashSet<String>>>,
        hang_put: Arc<Mutex<HashSet<String>>>,
        fail_remove: Arc<Mutex<bool>>,
        next: Arc<Mutex<u32>>,
    }

    impl MockStore {
        fn with_registry(registry: &LocatorRegistry) -> Self {
            Self {
                registry: registry.clone(),
                ..Self::default()
            }
        }
    }

    #[async_trait]
    impl ContentStore for MockStore {
        fn name(&self) -> &'static str {
            "mock"
        }

        async fn list(&self) -> Result<Vec<VisualItem>> {
            if let Some(message) = self.fail_list.lock().unwrap().clone() {
                return Err(VisualError::Store(message));
            }
            Ok(self
                .items
                .lock()
                .unwrap()
                .iter()
                .map(|(item, bytes)| {
                    let mut item = item.clone();
                    item.locator = self.registry.create(bytes.clone(), "image/png");
                    item
                })
                .collect())
        }

        async fn put(&self, upload: &PendingUpload, revision: Option<&str>) -> Result<VisualItem> {
            self.puts
                .lock()
                .unwrap()
                .push((upload.filename.clone(), revision.map(String::from)));
            let hangs = self.hang_put.lock().unwrap().contains(&upload.filename);
            if hangs {
                std::future::pending::<()>().await;
            }
            if self.fail_put.lock().unwrap().contains(&upload.filename) {
                return Err(VisualError::Store("422 Unprocessable Entity".to_string()));
            }
            let mut next = self.next.lock().unwrap();
            *next += 1;
            let item = VisualItem::new(
                format!("id-{}", upload.filename),
                Locator::Remote { url: String::new() },
                upload.filename.clone(),
                Some(format!("rev{}", *next)),
            );
            let mut items = self.items.lock().unwrap();
            items.retain(|(i, _)| i.filename != upload.filename);
            items.push((item.clone(), upload.bytes.clone()));
            let mut returned = item;
            returned.locator = self.registry.create(upload.bytes.clone(), &upload.mime);
            Ok(returned)
        }

        async fn remove(&self, item: &VisualItem) -> Result<()> {
            if *self.fail_remove.lock().unwrap() {
                return Err(VisualError::Store("409 Conflict".to_string()));
            }
            self.items.lock().unwrap().retain(|(i, _)| i.id != item.id);
            Ok(())
        }
    }

    fn controller(store: &MockStore, registry: &LocatorRegistry) -> CollectionController {
        CollectionController::new(
            Box::new(store.clone()),
            Session::unlocked(None),
            registry.clone(),
        )
    }

    fn png(name: &str) -> UploadFile {
        UploadFile::from_bytes(name, Some("image/png".to_string()), name.as_bytes().to_vec())
    }

    #[tokio::test]
    async fn test_load_replaces_collection() {
        let registry = LocatorRegistry::new();
        let store = MockStore::with_registry(&registry);
        let mut ctrl = controller(&store, &registry);
        assert_eq!(ctrl.status(), &CollectionStatus::Idle);

        ctrl.upload(vec![png("a.png"), png("b.png")]).await.unwrap();
        assert_eq!(ctrl.items().len(), 2);
        assert_eq!(ctrl.status(), &CollectionStatus::Ready);
        assert_eq!(ctrl.layout(), GridLayout { columns: 2, rows: 1 });

        // Reloading revokes the previous transient locators
        assert_eq!(registry.len(), 2);
        ctrl.load().await.unwrap();
        ctrl.load().await.unwrap();
        assert_eq!(registry.len(), 2);
        assert_eq!(ctrl.items().len(), 2);
    }

    #[tokio::test]
    async fn test_load_failure_keeps_items_and_reports_status() {
        let registry = LocatorRegistry::new();
        let store = MockStore::with_registry(&registry);
        let mut ctrl = controller(&store, &registry);
        ctrl.upload(vec![png("a.png")]).await.unwrap();

        *store.fail_list.lock().unwrap() = Some("Listing visuals failed with status 500".to_string());
        assert_err!(ctrl.load().await);

        assert!(!ctrl.is_loading());
        assert_eq!(ctrl.items().len(), 1);
        match ctrl.status() {
            CollectionStatus::Error(message) => assert!(message.contains("500")),
            other => panic!("Expected error status, got {:?}", other),
        }
        assert!(ctrl.last_error().unwrap().contains("500"));
    }

    #[tokio::test]
    async fn test_first_load_failure_leaves_empty_collection() {
        let registry = LocatorRegistry::new();
        let store = MockStore::with_registry(&registry);
        *store.fail_list.lock().unwrap() = Some("status 404 Not Found".to_string());
        let mut ctrl = controller(&store, &registry);

        assert_err!(ctrl.load().await);
        assert!(ctrl.is_empty());
        assert!(!ctrl.is_loading());
        assert!(ctrl.last_error().unwrap().contains("404"));
    }

    #[tokio::test]
    async fn test_unsupported_file_never_reaches_store() {
        let registry = LocatorRegistry::new();
        let store = MockStore::with_registry(&registry);
        let mut ctrl = controller(&store, &registry);

        let bad = UploadFile::from_bytes("badfile.txt", Some("text/plain".to_string()), vec![1]);
        let report = assert_ok!(ctrl.upload(vec![bad, png("good.png")]).await);

        assert_eq!(report.stored, vec!["good.png".to_string()]);
        assert_eq!(report.rejected, vec!["badfile.txt".to_string()]);
        let puts: Vec<_> = store.puts.lock().unwrap().iter().map(|(n, _)| n.clone()).collect();
        assert_eq!(puts, vec!["good.png".to_string()]);
    }

    #[tokio::test]
    async fn test_partial_failure_continues_batch_in_order() {
        let registry = LocatorRegistry::new();
        let store = MockStore::with_registry(&registry);
        store.fail_put.lock().unwrap().insert("b.png".to_string());
        let mut ctrl = controller(&store, &registry);

        let report = ctrl
            .upload(vec![png("a.png"), png("b.png"), png("c.png")])
            .await
            .unwrap();

        let order: Vec<_> = store.puts.lock().unwrap().iter().map(|(n, _)| n.clone()).collect();
        assert_eq!(order, vec!["a.png", "b.png", "c.png"]);
        assert_eq!(report.stored, vec!["a.png", "c.png"]);
        assert_eq!(report.failed.len(), 1);
        assert!(!report.is_clean());

        let ids: Vec<_> = ctrl.items().iter().map(|i| i.filename.as_str()).collect();
        assert_eq!(ids, vec!["a.png", "c.png"]);
        assert!(ctrl.last_error().unwrap().contains("b.png"));
    }

    #[tokio::test]
    async fn test_reupload_passes_revision_token() {
        let registry = LocatorRegistry::new();
        let store = MockStore::with_registry(&registry);
        let mut ctrl = controller(&store, &registry);

        ctrl.upload(vec![png("a.png")]).await.unwrap();
        ctrl.upload(vec![png("a.png")]).await.unwrap();

        let puts = store.puts.lock().unwrap().clone();
        assert_eq!(puts[0].1, None);
        assert_eq!(puts[1].1.as_deref(), Some("rev1"));
        assert_eq!(ctrl.items().len(), 1);
    }

    #[tokio::test]
    async fn test_unreadable_file_only_fails_itself() {
        let registry = LocatorRegistry::new();
        let store = MockStore::with_registry(&registry);
        let mut ctrl = controller(&store, &registry);

        let missing = UploadFile::from_path(std::path::Path::new("/nonexistent/photo.png"));
        let report = ctrl.upload(vec![missing, png("ok.png")]).await.unwrap();
        assert_eq!(report.stored, vec!["ok.png"]);
        assert!(report.failed[0].1.contains("Could not read file"));
    }

    #[tokio::test]
    async fn test_remove_success_revokes_locator() {
        let registry = LocatorRegistry::new();
        let store = MockStore::with_registry(&registry);
        let mut ctrl = controller(&store, &registry);
        ctrl.upload(vec![png("a.png"), png("b.png")]).await.unwrap();

        let target = ctrl.items()[0].clone();
        let Locator::Transient { token } = &target.locator else {
            panic!("Expected transient locator");
        };
        assert!(registry.resolve(token).is_some());

        ctrl.remove(&target.id).await.unwrap();
        assert!(ctrl.find(&target.id).is_none());
        assert!(registry.resolve(token).is_none());
        assert_eq!(ctrl.items().len(), 1);
    }

    #[tokio::test]
    async fn test_remove_failure_leaves_collection_untouched() {
        let registry = LocatorRegistry::new();
        let store = MockStore::with_registry(&registry);
        let mut ctrl = controller(&store, &registry);
        ctrl.upload(vec![png("a.png")]).await.unwrap();
        let before = ctrl.items().to_vec();

        *store.fail_remove.lock().unwrap() = true;
        let err = assert_err!(ctrl.remove(&before[0].id).await);
        assert!(matches!(err, VisualError::Store(_)));
        assert_eq!(ctrl.items(), before.as_slice());
        assert!(ctrl.last_error().unwrap().contains("409"));
    }

    #[tokio::test]
    async fn test_remove_unknown_id() {
        let registry = LocatorRegistry::new();
        let store = MockStore::with_registry(&registry);
        let mut ctrl = controller(&store, &registry);
        assert!(matches!(ctrl.remove("ghost").await, Err(VisualError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_locked_session_is_refused() {
        let registry = LocatorRegistry::new();
        let store = MockStore::with_registry(&registry);
        let mut ctrl = CollectionController::new(Box::new(store.clone()), Session::locked(), registry);

        assert!(matches!(ctrl.load().await, Err(VisualError::Auth(_))));
        assert!(matches!(ctrl.upload(vec![png("a.png")]).await, Err(VisualError::Auth(_))));
        assert!(store.puts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_drop_releases_transient_locators() {
        let registry = LocatorRegistry::new();
        let store = MockStore::with_registry(&registry);
        {
            let mut ctrl = controller(&store, &registry);
            ctrl.upload(vec![png("a.png"), png("b.png")]).await.unwrap();
            assert_eq!(registry.len(), 2);
        }
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_abandoned_upload_does_not_block_the_next() {
        let registry = LocatorRegistry::new();
        let store = MockStore::with_registry(&registry);
        store.hang_put.lock().unwrap().insert("stuck.png".to_string());
        let mut ctrl = controller(&store, &registry);
        ctrl.upload(vec![png("a.png")]).await.unwrap();

        let abandoned = tokio::time::timeout(
            std::time::Duration::from_millis(50),
            ctrl.upload(vec![png("stuck.png")]),
        )
        .await;
        assert!(abandoned.is_err());
        assert_eq!(ctrl.status(), &CollectionStatus::Idle);
        assert!(!ctrl.is_loading());

        let report = ctrl.upload(vec![png("b.png")]).await.unwrap();
        assert_eq!(report.stored, vec!["b.png"]);
        assert_eq!(ctrl.status(), &CollectionStatus::Ready);
        assert_eq!(ctrl.items().len(), 2);
    }

    #[test]
    fn test_dedupe_keeps_first() {
        let mk = |id: &str, name: &str| {
            VisualItem::new(id, Locator::Remote { url: String::new() }, name, None)
        };
        let items = dedupe(vec![mk("1", "a.png"), mk("1", "b.png"), mk("2", "c.png")]);
        let names: Vec<_> = items.iter().map(|i| i.filename.as_str()).collect();
        assert_eq!(names, vec!["a.png", "c.png"]);
    }
}
