// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Content store adapters
//!
//! Every backend maps its own record shape onto [`VisualItem`] so the
//! collection controller never sees backend details.

pub mod blob;
pub mod local;
pub mod remote;

use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

use crate::config::StoreConfig;
use crate::locator::LocatorRegistry;
use crate::unlock::Session;
use crate::visual::{has_allowed_extension, VisualItem};
use crate::Result;

/// A validated file, read into memory and ready to persist
#[derive(Debug, Clone)]
pub struct PendingUpload {
    pub filename: String,
    pub mime: String,
    pub bytes: Vec<u8>,
}

/// Trait for content store backends
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Name of this backend
    fn name(&self) -> &'static str;

    /// Enumerate stored visuals in backend order, allowed extensions only
    async fn list(&self) -> Result<Vec<VisualItem>>;

    /// Persist one file under its filename.
    ///
    /// `revision` must be the token of the object being overwritten, if any;
    /// backends with optimistic concurrency reject stale tokens.
    async fn put(&self, upload: &PendingUpload, revision: Option<&str>) -> Result<VisualItem>;

    /// Delete a stored visual
    async fn remove(&self, item: &VisualItem) -> Result<()>;

    /// Cheap authenticated request proving the backend is reachable
    async fn probe(&self) -> Result<()> {
        Ok(())
    }
}

/// One store instance shared by several controllers
#[async_trait]
impl<S: ContentStore + ?Sized> ContentStore for Arc<S> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    async fn list(&self) -> Result<Vec<VisualItem>> {
        (**self).list().await
    }

    async fn put(&self, upload: &PendingUpload, revision: Option<&str>) -> Result<VisualItem> {
        (**self).put(upload, revision).await
    }

    async fn remove(&self, item: &VisualItem) -> Result<()> {
        (**self).remove(item).await
    }

    async fn probe(&self) -> Result<()> {
        (**self).probe().await
    }
}

/// Keep only entries whose filename carries an allowed extension
pub fn retain_allowed(items: Vec<VisualItem>) -> Vec<VisualItem> {
    items
        .into_iter()
        .filter(|item| has_allowed_extension(&item.filename))
        .collect()
}

/// Build the configured backend.
///
/// A remote backend takes its token from the unlocked session first and
/// falls back to the configured one.
pub fn open_store(
    config: &StoreConfig,
    session: &Session,
    registry: &LocatorRegistry,
) -> Result<Box<dyn ContentStore>> {
    info!("Opening {} content store", config.backend_name());
    let store: Box<dyn ContentStore> = match config {
        StoreConfig::Local { path, namespace } => {
            Box::new(local::LocalStore::new(path, namespace, registry.clone()))
        }
        StoreConfig::Blob { path } => Box::new(blob::BlobStore::open(path, registry.clone())?),
        StoreConfig::Remote(remote) => {
            let token = session
                .credential()
                .map(String::from)
                .or_else(|| remote.token.clone());
            Box::new(remote::RemoteStore::new(remote, token)?)
        }
    };
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RemoteConfig;
    use crate::visual::Locator;

    #[test]
    fn test_retain_allowed_filters_extensions() {
        let mk = |name: &str| {
            VisualItem::new(name, Locator::Remote { url: String::new() }, name, None)
        };
        let kept = retain_allowed(vec![mk("a.PNG"), mk("notes.md"), mk("b.pdf"), mk("dir")]);
        let names: Vec<_> = kept.iter().map(|i| i.filename.as_str()).collect();
        assert_eq!(names, vec!["a.PNG", "b.pdf"]);
    }

    #[test]
    fn test_open_store_selects_backend() {
        let dir = tempfile::tempdir().unwrap();
        let registry = LocatorRegistry::new();
        let session = Session::unlocked(None);

        let local = StoreConfig::Local {
            path: dir.path().join("kv.json").to_string_lossy().into_owned(),
            namespace: "visual-supports".to_string(),
        };
        assert_eq!(open_store(&local, &session, &registry).unwrap().name(), "local");

        let blob = StoreConfig::Blob {
            path: dir.path().join("v.db").to_string_lossy().into_owned(),
        };
        assert_eq!(open_store(&blob, &session, &registry).unwrap().name(), "blob");

        let remote = StoreConfig::Remote(RemoteConfig {
            api_base: "http://127.0.0.1:9".to_string(),
            owner: "o".to_string(),
            repo: "r".to_string(),
            branch: "main".to_string(),
            content_path: "visuals".to_string(),
            timeout_secs: 5,
            token: None,
        });
        assert_eq!(open_store(&remote, &session, &registry).unwrap().name(), "remote");
    }
}
