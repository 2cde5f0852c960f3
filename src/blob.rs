//! Transient blob references
//!
//! In-memory registry handing out page-session-scoped `blob:<uuid>` URLs for
//! captured clips, so the host can play a clip back without re-shipping the
//! bytes. URLs are only valid for the lifetime of this process. Retention is
//! bounded: only the most recent clips are kept, older ones are evicted.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

const URL_SCHEME: &str = "blob:";

/// Maximum number of blobs retained before the oldest is evicted.
const MAX_BLOBS: usize = 5;

#[derive(Default)]
struct BlobStoreInner {
    entries: HashMap<Uuid, Arc<Vec<u8>>>,
    // Insertion order, oldest first
    order: VecDeque<Uuid>,
}

/// Registry of transient in-memory blobs.
#[derive(Default)]
pub struct BlobStore {
    inner: Mutex<BlobStoreInner>,
}

impl BlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a blob and return its transient URL.
    pub fn insert(&self, data: Vec<u8>) -> String {
        let id = Uuid::new_v4();
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());

        while inner.order.len() >= MAX_BLOBS {
            if let Some(old) = inner.order.pop_front() {
                inner.entries.remove(&old);
                log::debug!("Evicted old blob {}", old);
            }
        }

        inner.entries.insert(id, Arc::new(data));
        inner.order.push_back(id);
        format!("{}{}", URL_SCHEME, id)
    }

    /// Look up a blob by its URL. Returns `None` for unknown, revoked, or
    /// malformed URLs.
    pub fn resolve(&self, url: &str) -> Option<Arc<Vec<u8>>> {
        let id = Self::parse_url(url)?;
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.entries.get(&id).cloned()
    }

    /// Drop a blob early. Returns true if the URL referenced a live blob.
    pub fn revoke(&self, url: &str) -> bool {
        let Some(id) = Self::parse_url(url) else {
            return false;
        };
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.order.retain(|entry| *entry != id);
        inner.entries.remove(&id).is_some()
    }

    fn parse_url(url: &str) -> Option<Uuid> {
        url.strip_prefix(URL_SCHEME)
            .and_then(|raw| Uuid::parse_str(raw).ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_and_resolve_round_trip() {
        let store = BlobStore::new();
        let url = store.insert(vec![1, 2, 3]);
        assert!(url.starts_with("blob:"));

        let bytes = store.resolve(&url).expect("blob should resolve");
        assert_eq!(*bytes, vec![1, 2, 3]);
    }

    #[test]
    fn revoke_drops_the_blob() {
        let store = BlobStore::new();
        let url = store.insert(vec![9]);
        assert!(store.revoke(&url));
        assert!(store.resolve(&url).is_none());
        assert!(!store.revoke(&url));
    }

    #[test]
    fn malformed_urls_do_not_resolve() {
        let store = BlobStore::new();
        store.insert(vec![1]);
        assert!(store.resolve("blob:not-a-uuid").is_none());
        assert!(store.resolve("http://example.com").is_none());
    }

    #[test]
    fn oldest_blob_is_evicted_past_the_cap() {
        let store = BlobStore::new();
        let first = store.insert(vec![0]);
        let mut rest = Vec::new();
        for n in 1..MAX_BLOBS as u8 + 1 {
            rest.push(store.insert(vec![n]));
        }
        assert!(store.resolve(&first).is_none());
        for url in &rest {
            assert!(store.resolve(url).is_some());
        }
    }
}
