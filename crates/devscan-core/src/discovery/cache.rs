//! Duplicate-suppression cache for announcement text.
//!
//! Devices announce on every interface and hosts often receive the same
//! datagram several times. The cache maps the verbatim message text to its
//! parsed form so identical copies skip parsing. It says nothing about
//! liveness: a cache hit is still a keep-alive for the monitor.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::settings::CacheSettings;
use crate::types::{Announcement, AnnouncementPath};

#[derive(Default)]
struct CacheInner {
    by_text: HashMap<String, Arc<Announcement>>,
    text_by_path: HashMap<AnnouncementPath, String>,
}

/// Content map from announcement text to parsed announcement.
pub struct MessageCache {
    inner: Mutex<CacheInner>,
    max_entries: usize,
}

impl MessageCache {
    pub fn new(settings: &CacheSettings) -> Self {
        Self {
            inner: Mutex::new(CacheInner::default()),
            max_entries: settings.max_entries,
        }
    }

    /// Return the parsed announcement if this exact text was seen before.
    pub fn lookup(&self, text: &str) -> Option<Arc<Announcement>> {
        self.inner.lock().by_text.get(text).cloned()
    }

    /// Remember `text` as the latest announcement for its path.
    ///
    /// The previous text stored for the same path is dropped. Returns `false`
    /// when the entry was not stored because the cache is full.
    pub fn insert(&self, text: &str, announcement: Arc<Announcement>) -> bool {
        let path = announcement.path();
        let mut inner = self.inner.lock();

        if let Some(previous) = inner.text_by_path.remove(&path) {
            inner.by_text.remove(&previous);
        }

        if inner.by_text.len() >= self.max_entries {
            debug!(path = %path, limit = self.max_entries, "Announcement cache full");
            return false;
        }

        inner.by_text.insert(text.to_string(), announcement);
        inner.text_by_path.insert(path, text.to_string());
        true
    }

    /// Forget the cached text for a path.
    pub fn remove_path(&self, path: &AnnouncementPath) {
        let mut inner = self.inner.lock();
        if let Some(text) = inner.text_by_path.remove(path) {
            inner.by_text.remove(&text);
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().by_text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MessageCache {
    fn default() -> Self {
        Self::new(&CacheSettings::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::fixtures;

    #[test]
    fn test_identical_text_hits() {
        let cache = MessageCache::default();
        let announcement = Arc::new(fixtures::announcement("a"));

        assert!(cache.lookup("text-1").is_none());
        assert!(cache.insert("text-1", announcement.clone()));

        let hit = cache.lookup("text-1").unwrap();
        assert!(Arc::ptr_eq(&hit, &announcement));
    }

    #[test]
    fn test_newer_text_supersedes_old_for_same_path() {
        let cache = MessageCache::default();
        cache.insert("text-1", Arc::new(fixtures::announcement("a")));
        cache.insert("text-2", Arc::new(fixtures::announcement("a")));

        assert!(cache.lookup("text-1").is_none());
        assert!(cache.lookup("text-2").is_some());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_formatting_difference_is_a_miss() {
        let cache = MessageCache::default();
        cache.insert("{\"a\": 1}", Arc::new(fixtures::announcement("a")));
        assert!(cache.lookup("{\"a\":1}").is_none());
    }

    #[test]
    fn test_bounded() {
        let cache = MessageCache::new(&CacheSettings { max_entries: 1 });
        assert!(cache.insert("one", Arc::new(fixtures::announcement("a"))));
        assert!(!cache.insert("two", Arc::new(fixtures::announcement("b"))));
        assert_eq!(cache.len(), 1);

        cache.remove_path(&AnnouncementPath::new("a", "eth0"));
        assert!(cache.is_empty());
    }
}
