// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Registry of transient locators (process-local object URLs)

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::debug;
use uuid::Uuid;

use crate::visual::Locator;

/// Bytes published under a transient locator
#[derive(Debug, Clone)]
pub struct TransientBlob {
    pub mime: String,
    pub bytes: Arc<Vec<u8>>,
}

/// Shared table of in-memory blobs, cheap to clone
#[derive(Clone, Default)]
pub struct LocatorRegistry {
    blobs: Arc<RwLock<HashMap<String, TransientBlob>>>,
}

impl LocatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish bytes and return a fresh transient locator for them
    pub fn create(&self, bytes: Vec<u8>, mime: &str) -> Locator {
        let token = Uuid::new_v4().simple().to_string();
        let blob = TransientBlob {
            mime: mime.to_string(),
            bytes: Arc::new(bytes),
        };
        self.blobs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(token.clone(), blob);
        debug!("Created transient locator {}", token);
        Locator::Transient { token }
    }

    /// Look up the bytes behind a token
    pub fn resolve(&self, token: &str) -> Option<TransientBlob> {
        self.blobs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(token)
            .cloned()
    }

    /// Invalidate a transient locator. Remote locators are ignored.
    ///
    /// Returns true when bytes were actually released.
    pub fn revoke(&self, locator: &Locator) -> bool {
        let Locator::Transient { token } = locator else {
            return false;
        };
        let removed = self
            .blobs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(token)
            .is_some();
        if removed {
            debug!("Revoked transient locator {}", token);
        }
        removed
    }

    /// Number of live transient locators
    pub fn len(&self) -> usize {
        self.blobs.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_resolve_revoke() {
        let registry = LocatorRegistry::new();
        let locator = registry.create(vec![1, 2, 3], "image/png");

        let Locator::Transient { token } = &locator else {
            panic!("Expected transient locator");
        };
        let blob = registry.resolve(token).unwrap();
        assert_eq!(blob.mime, "image/png");
        assert_eq!(blob.bytes.as_slice(), &[1, 2, 3]);

        assert!(registry.revoke(&locator));
        assert!(registry.resolve(token).is_none());
        assert!(!registry.revoke(&locator));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_remote_locators_are_not_tracked() {
        let registry = LocatorRegistry::new();
        let remote = Locator::Remote { url: "https://example.test/x.png".to_string() };
        assert!(!registry.revoke(&remote));
    }

    #[test]
    fn test_clones_share_state() {
        let registry = LocatorRegistry::new();
        let other = registry.clone();
        registry.create(Vec::new(), "application/pdf");
        assert_eq!(other.len(), 1);
    }
}
