use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crate::dispatcher::ExtractorVariant;
use crate::outline_node::OutlineNode;

/// Cache key: content hash of the input bytes plus the extractor that produced the tree
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub content_hash: String,
    pub variant: ExtractorVariant,
}

impl CacheKey {
    pub fn new(content_hash: impl Into<String>, variant: ExtractorVariant) -> Self {
        Self {
            content_hash: content_hash.into(),
            variant,
        }
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    tree: Arc<OutlineNode>,
    inserted_at: Instant,
}

impl CacheEntry {
    fn is_fresh(&self, max_age: Duration) -> bool {
        self.inserted_at.elapsed() <= max_age
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    pub entries: usize,
    pub nodes: usize,
    pub hits: u64,
    pub misses: u64,
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<CacheKey, CacheEntry>,
    hits: u64,
    misses: u64,
}

/// Extracted outline trees, shared read-only between requests.
///
/// Entries are written once and never updated; they leave the cache only
/// when they are older than `max_age` or pushed out by `capacity` (oldest first).
pub struct OutlineCache {
    state: Mutex<CacheState>,
    capacity: usize,
    max_age: Duration,
}

impl OutlineCache {
    pub fn new(capacity: usize, max_age: Duration) -> Self {
        Self {
            state: Mutex::new(CacheState::default()),
            capacity,
            max_age,
        }
    }

    // A panic while holding the lock leaves only plain data behind
    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn get(&self, key: &CacheKey) -> Option<Arc<OutlineNode>> {
        let mut state = self.lock();

        let fresh = match state.entries.get(key) {
            Some(entry) if entry.is_fresh(self.max_age) => Some(Arc::clone(&entry.tree)),
            Some(_) => {
                state.entries.remove(key);
                None
            }
            None => None,
        };

        match fresh {
            Some(tree) => {
                state.hits += 1;
                log::debug!("Cache hit for {:?} ({})", key.variant, short_hash(&key.content_hash));
                Some(tree)
            }
            None => {
                state.misses += 1;
                None
            }
        }
    }

    /// Store a tree unless a fresh entry already exists; returns the stored tree.
    pub fn insert(&self, key: CacheKey, tree: OutlineNode) -> Arc<OutlineNode> {
        if self.capacity == 0 {
            return Arc::new(tree);
        }

        let mut state = self.lock();

        if let Some(existing) = state.entries.get(&key) {
            if existing.is_fresh(self.max_age) {
                return Arc::clone(&existing.tree);
            }
        }

        let max_age = self.max_age;
        state.entries.retain(|_, entry| entry.is_fresh(max_age));

        while state.entries.len() >= self.capacity {
            let oldest = state
                .entries
                .iter()
                .min_by_key(|(_, entry)| entry.inserted_at)
                .map(|(key, _)| key.clone());
            match oldest {
                Some(oldest) => {
                    log::debug!("Evicting cached outline {:?}", oldest.variant);
                    state.entries.remove(&oldest);
                }
                None => break,
            }
        }

        let tree = Arc::new(tree);
        state.entries.insert(
            key,
            CacheEntry {
                tree: Arc::clone(&tree),
                inserted_at: Instant::now(),
            },
        );
        tree
    }

    pub fn clear(&self) {
        self.lock().entries.clear();
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        let state = self.lock();
        CacheStats {
            entries: state.entries.len(),
            nodes: state.entries.values().map(|e| e.tree.node_count()).sum(),
            hits: state.hits,
            misses: state.misses,
        }
    }
}

fn short_hash(hash: &str) -> &str {
    hash.get(..12).unwrap_or(hash)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree(title: &str) -> OutlineNode {
        OutlineNode::root(title)
    }

    fn key(hash: &str) -> CacheKey {
        CacheKey::new(hash, ExtractorVariant::DocxHeading)
    }

    #[test]
    fn test_insert_and_get() {
        let cache = OutlineCache::new(4, Duration::from_secs(60));
        assert!(cache.get(&key("a")).is_none());

        cache.insert(key("a"), tree("first"));
        let hit = cache.get(&key("a")).unwrap();
        assert_eq!(hit.title, "first");

        let stats = cache.stats();
        assert_eq!(stats.entries, 1);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
    }

    #[test]
    fn test_write_once() {
        let cache = OutlineCache::new(4, Duration::from_secs(60));
        cache.insert(key("a"), tree("first"));
        let stored = cache.insert(key("a"), tree("second"));

        assert_eq!(stored.title, "first");
        assert_eq!(cache.get(&key("a")).unwrap().title, "first");
    }

    #[test]
    fn test_variant_is_part_of_key() {
        let cache = OutlineCache::new(4, Duration::from_secs(60));
        cache.insert(CacheKey::new("h", ExtractorVariant::PdfBookmark), tree("bookmarks"));

        assert!(cache.get(&CacheKey::new("h", ExtractorVariant::PdfHeuristic)).is_none());
        assert!(cache.get(&CacheKey::new("h", ExtractorVariant::PdfBookmark)).is_some());
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let cache = OutlineCache::new(2, Duration::from_secs(60));
        cache.insert(key("a"), tree("a"));
        std::thread::sleep(Duration::from_millis(2));
        cache.insert(key("b"), tree("b"));
        std::thread::sleep(Duration::from_millis(2));
        cache.insert(key("c"), tree("c"));

        assert_eq!(cache.len(), 2);
        assert!(cache.get(&key("a")).is_none());
        assert!(cache.get(&key("c")).is_some());
    }

    #[test]
    fn test_expired_entries_are_dropped() {
        let cache = OutlineCache::new(4, Duration::ZERO);
        cache.insert(key("a"), tree("a"));
        std::thread::sleep(Duration::from_millis(2));

        assert!(cache.get(&key("a")).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_zero_capacity_disables_storage() {
        let cache = OutlineCache::new(0, Duration::from_secs(60));
        let tree = cache.insert(key("a"), tree("a"));
        assert_eq!(tree.title, "a");
        assert!(cache.is_empty());
    }

    #[test]
    fn test_clear() {
        let cache = OutlineCache::new(4, Duration::from_secs(60));
        cache.insert(key("a"), tree("a"));
        cache.clear();
        assert!(cache.is_empty());
    }
}
