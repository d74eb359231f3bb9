//! Location-to-path cache used to avoid downloading the same blob twice.

use std::collections::{BTreeMap, VecDeque};

use crate::domain::{FileLocation, LocationKey};

/// Chooses which entries leave the cache once it is over capacity.
pub trait EvictionPolicy: Send {
    /// A key was stored for the first time.
    fn record_insert(&mut self, key: LocationKey);

    /// Next key to drop, or `None` if the policy tracks nothing.
    fn next_victim(&mut self) -> Option<LocationKey>;
}

/// Pure insertion order; lookups never refresh an entry.
#[derive(Debug, Default)]
pub struct FifoEviction {
    order: VecDeque<LocationKey>,
}

impl EvictionPolicy for FifoEviction {
    fn record_insert(&mut self, key: LocationKey) {
        self.order.push_back(key);
    }

    fn next_victim(&mut self) -> Option<LocationKey> {
        self.order.pop_front()
    }
}

/// Maps remote blob identities to relative paths already written.
pub struct FileCache<P: EvictionPolicy = FifoEviction> {
    map: BTreeMap<LocationKey, String>,
    policy: P,
    capacity: usize,
}

impl FileCache {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self::with_policy(capacity, FifoEviction::default())
    }
}

impl<P: EvictionPolicy> FileCache<P> {
    #[must_use]
    pub fn with_policy(capacity: usize, policy: P) -> Self {
        Self {
            map: BTreeMap::new(),
            policy,
            capacity: capacity.max(1),
        }
    }

    /// Remember where a location was written. Empty locations are ignored.
    ///
    /// Saving a known key only updates its path; its eviction order is
    /// that of the first insertion.
    pub fn save(&mut self, location: &FileLocation, relative_path: &str) {
        let Some(key) = location.cache_key() else {
            return;
        };
        if self.map.insert(key, relative_path.to_string()).is_none() {
            self.policy.record_insert(key);
        }
        while self.map.len() > self.capacity {
            let Some(victim) = self.policy.next_victim() else {
                break;
            };
            self.map.remove(&victim);
            tracing::trace!(kind = victim.kind, id = victim.id, "Evicted cached location");
        }
    }

    #[must_use]
    pub fn find(&self, location: &FileLocation) -> Option<&str> {
        location
            .cache_key()
            .and_then(|key| self.map.get(&key))
            .map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::LocationData;

    fn photo(id: u64) -> FileLocation {
        FileLocation {
            dc_id: 2,
            data: LocationData::ServerFile {
                id,
                access_hash: id * 7,
                file_reference: vec![1, 2, 3],
                thumb_size: "x".into(),
            },
        }
    }

    #[test]
    fn test_save_then_find() {
        let mut cache = FileCache::new(10);
        cache.save(&photo(1), "photos/photo_1.jpg");
        assert_eq!(cache.find(&photo(1)), Some("photos/photo_1.jpg"));
        assert_eq!(cache.find(&photo(2)), None);
    }

    #[test]
    fn test_oldest_evicted_past_capacity() {
        let mut cache = FileCache::new(3);
        for id in 1..=3 {
            cache.save(&photo(id), &format!("p{id}"));
        }
        // Reads must not refresh entries.
        assert!(cache.find(&photo(1)).is_some());
        cache.save(&photo(4), "p4");
        assert_eq!(cache.len(), 3);
        assert_eq!(cache.find(&photo(1)), None);
        assert_eq!(cache.find(&photo(2)), Some("p2"));
        assert_eq!(cache.find(&photo(4)), Some("p4"));
    }

    #[test]
    fn test_empty_location_never_stored() {
        let mut cache = FileCache::new(3);
        cache.save(&FileLocation::default(), "nothing");
        cache.save(&FileLocation::takeout(), "lists/other_data.json");
        assert!(cache.is_empty());
        assert_eq!(cache.find(&FileLocation::default()), None);
    }

    #[test]
    fn test_resave_keeps_first_position() {
        let mut cache = FileCache::new(2);
        cache.save(&photo(1), "a");
        cache.save(&photo(2), "b");
        cache.save(&photo(1), "a2");
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.find(&photo(1)), Some("a2"));
        cache.save(&photo(3), "c");
        assert_eq!(cache.find(&photo(1)), None);
        assert_eq!(cache.find(&photo(2)), Some("b"));
    }

    #[derive(Default)]
    struct KeepNewest {
        keys: Vec<LocationKey>,
    }

    impl EvictionPolicy for KeepNewest {
        fn record_insert(&mut self, key: LocationKey) {
            self.keys.push(key);
        }

        fn next_victim(&mut self) -> Option<LocationKey> {
            if self.keys.len() < 2 {
                return None;
            }
            Some(self.keys.remove(self.keys.len() - 2))
        }
    }

    #[test]
    fn test_custom_policy() {
        let mut cache = FileCache::with_policy(2, KeepNewest::default());
        cache.save(&photo(1), "a");
        cache.save(&photo(2), "b");
        cache.save(&photo(3), "c");
        assert_eq!(cache.find(&photo(1)), Some("a"));
        assert_eq!(cache.find(&photo(2)), None);
        assert_eq!(cache.find(&photo(3)), Some("c"));
    }
}
