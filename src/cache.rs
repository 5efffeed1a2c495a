//! Distance cache - LRU memo of geodesic distances
//!
//! Entries live in a slab and are threaded onto an intrusive doubly linked
//! recency list, so lookup, promotion, insertion and eviction are all O(1).

use std::collections::HashMap;
use std::sync::Arc;

use crate::point::Point;

/// Identity of a query point: its exact coordinate bit patterns.
///
/// Two keys are equal only for bitwise-identical coordinates, so `0.0` and
/// `-0.0` are distinct points here. Clones share the bit buffer.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PointKey(Arc<[u32]>);

impl PointKey {
    pub fn of(point: &Point) -> Self {
        Self::from_coords(point.coords())
    }

    pub fn from_coords(coords: &[f32]) -> Self {
        PointKey(coords.iter().map(|c| c.to_bits()).collect())
    }

    /// Coordinate bit patterns.
    pub fn bits(&self) -> &[u32] {
        &self.0
    }
}

type CacheKey = (PointKey, usize);

#[derive(Clone, Debug)]
struct Entry {
    key: CacheKey,
    distance: f32,
    prev: Option<usize>,
    next: Option<usize>,
}

/// Snapshot of cache counters.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub size: usize,
    pub capacity: usize,
}

impl CacheStats {
    /// Fraction of lookups that hit, 0 when nothing was looked up.
    pub fn hit_rate(&self) -> f32 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f32 / total as f32
        }
    }
}

/// Least-recently-used cache keyed by (query point, center index).
#[derive(Clone, Debug)]
pub struct DistanceCache {
    map: HashMap<CacheKey, usize>,
    entries: Vec<Entry>,
    /// Most recently used.
    head: Option<usize>,
    /// Least recently used.
    tail: Option<usize>,
    capacity: usize,
    hits: u64,
    misses: u64,
}

impl DistanceCache {
    /// Create a cache holding at most `capacity` distances.
    pub fn new(capacity: usize) -> Self {
        Self {
            map: HashMap::with_capacity(capacity),
            entries: Vec::with_capacity(capacity),
            head: None,
            tail: None,
            capacity,
            hits: 0,
            misses: 0,
        }
    }

    /// Look up a distance, promoting it on a hit.
    pub fn get(&mut self, point_key: &PointKey, center_index: usize) -> Option<f32> {
        match self.map.get(&(point_key.clone(), center_index)) {
            Some(&slot) => {
                self.hits += 1;
                self.detach(slot);
                self.push_front(slot);
                Some(self.entries[slot].distance)
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    /// Insert or refresh a distance, evicting the LRU entry at capacity.
    pub fn put(&mut self, point_key: PointKey, center_index: usize, distance: f32) {
        if self.capacity == 0 {
            return;
        }
        let key = (point_key, center_index);

        if let Some(&slot) = self.map.get(&key) {
            self.entries[slot].distance = distance;
            self.detach(slot);
            self.push_front(slot);
            return;
        }

        let slot = if self.entries.len() < self.capacity {
            self.entries.push(Entry {
                key: key.clone(),
                distance,
                prev: None,
                next: None,
            });
            self.entries.len() - 1
        } else {
            // Reuse the least recently used slot.
            let Some(slot) = self.tail else {
                return;
            };
            self.detach(slot);
            self.map.remove(&self.entries[slot].key);
            self.entries[slot].key = key.clone();
            self.entries[slot].distance = distance;
            slot
        };

        self.map.insert(key, slot);
        self.push_front(slot);
    }

    /// Drop every entry. Counters survive.
    pub fn clear(&mut self) {
        self.map.clear();
        self.entries.clear();
        self.head = None;
        self.tail = None;
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits,
            misses: self.misses,
            size: self.len(),
            capacity: self.capacity,
        }
    }

    fn detach(&mut self, slot: usize) {
        let (prev, next) = (self.entries[slot].prev, self.entries[slot].next);
        match prev {
            Some(p) => self.entries[p].next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.entries[n].prev = prev,
            None => self.tail = prev,
        }
        self.entries[slot].prev = None;
        self.entries[slot].next = None;
    }

    fn push_front(&mut self, slot: usize) {
        self.entries[slot].prev = None;
        self.entries[slot].next = self.head;
        if let Some(h) = self.head {
            self.entries[h].prev = Some(slot);
        }
        self.head = Some(slot);
        if self.tail.is_none() {
            self.tail = Some(slot);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(n: u32) -> PointKey {
        PointKey::from_coords(&[n as f32, 0.5])
    }

    #[test]
    fn test_get_after_put() {
        let mut cache = DistanceCache::new(4);
        cache.put(key(1), 0, 0.125);

        assert_eq!(cache.get(&key(1), 0), Some(0.125));
        assert_eq!(cache.get(&key(1), 1), None);
        assert_eq!(cache.get(&key(2), 0), None);
    }

    #[test]
    fn test_evicts_least_recently_used() {
        let mut cache = DistanceCache::new(2);
        cache.put(key(1), 0, 1.0);
        cache.put(key(2), 0, 2.0);

        // Touch 1 so 2 becomes the eviction candidate.
        assert_eq!(cache.get(&key(1), 0), Some(1.0));
        cache.put(key(3), 0, 3.0);

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(&key(2), 0), None);
        assert_eq!(cache.get(&key(1), 0), Some(1.0));
        assert_eq!(cache.get(&key(3), 0), Some(3.0));
    }

    #[test]
    fn test_survivor_unaffected_by_churn() {
        let mut cache = DistanceCache::new(3);
        cache.put(key(7), 5, 0.75);

        for i in 0..50 {
            assert_eq!(cache.get(&key(7), 5), Some(0.75));
            cache.put(key(100 + i), 0, i as f32);
        }
        assert_eq!(cache.get(&key(7), 5), Some(0.75));
    }

    #[test]
    fn test_put_refreshes_value() {
        let mut cache = DistanceCache::new(2);
        cache.put(key(1), 0, 1.0);
        cache.put(key(1), 0, 4.0);

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(&key(1), 0), Some(4.0));
    }

    #[test]
    fn test_clear_and_stats() {
        let mut cache = DistanceCache::new(8);
        cache.put(key(1), 0, 1.0);
        cache.get(&key(1), 0);
        cache.get(&key(9), 0);
        cache.clear();

        assert!(cache.is_empty());
        assert_eq!(cache.get(&key(1), 0), None);
        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 2);
        assert!((stats.hit_rate() - 1.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_zero_capacity_stores_nothing() {
        let mut cache = DistanceCache::new(0);
        cache.put(key(1), 0, 1.0);
        assert!(cache.is_empty());
        assert_eq!(cache.get(&key(1), 0), None);
    }

    #[test]
    fn test_point_key_distinguishes_points() {
        let a = Point::new(vec![0.0, 1.0]);
        let b = Point::new(vec![1.0, 0.0]);
        assert_eq!(PointKey::of(&a), PointKey::of(&a.clone()));
        assert_ne!(PointKey::of(&a), PointKey::of(&b));
    }

    #[test]
    fn test_point_key_is_exact_identity() {
        let p = Point::new(vec![0.25, -1.5, 3.0]);
        let key = PointKey::of(&p);
        assert_eq!(
            key.bits(),
            &[0.25f32.to_bits(), (-1.5f32).to_bits(), 3.0f32.to_bits()]
        );

        // Bitwise-distinct coordinates never share an entry.
        let mut cache = DistanceCache::new(8);
        cache.put(PointKey::from_coords(&[0.0, 1.0]), 0, 1.0);
        cache.put(PointKey::from_coords(&[-0.0, 1.0]), 0, 2.0);
        cache.put(PointKey::from_coords(&[0.0, 1.0, 0.0]), 0, 3.0);

        assert_eq!(cache.len(), 3);
        assert_eq!(cache.get(&PointKey::from_coords(&[0.0, 1.0]), 0), Some(1.0));
        assert_eq!(cache.get(&PointKey::from_coords(&[-0.0, 1.0]), 0), Some(2.0));
        assert_eq!(cache.get(&PointKey::from_coords(&[1.0, 0.0]), 0), None);
    }
}
