use std::num::NonZeroUsize;

use lru::LruCache;

use super::RTreeOptions;
use crate::bounding_box::BoundingBox;

/// query box quantized to the configured resolution. boxes that round to
/// the same grid cell corners share a cache slot.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub(crate) struct QuantizedQuery {
    min_x: i64,
    min_y: i64,
    max_x: i64,
    max_y: i64,
}

/// LRU cache of range-query results. lookups touch recency, so the owner
/// wraps this in a mutex for shared use.
pub(crate) struct QueryCache<T> {
    quantum: f64,
    entries: LruCache<QuantizedQuery, Vec<T>>,
}

impl<T: Copy> QueryCache<T> {
    pub(crate) fn from_options(options: &RTreeOptions) -> Option<QueryCache<T>> {
        if !options.enable_query_cache || options.cache_quantum <= 0.0 {
            return None;
        }
        let capacity = NonZeroUsize::new(options.cache_capacity)?;
        Some(QueryCache {
            quantum: options.cache_quantum,
            entries: LruCache::new(capacity),
        })
    }

    /// None when the box cannot be quantized (non-finite coordinates); such
    /// queries bypass the cache entirely
    pub(crate) fn key_for(&self, bounds: &BoundingBox) -> Option<QuantizedQuery> {
        if !bounds.is_finite() {
            return None;
        }
        let quantize = |v: f64| (v / self.quantum).round() as i64;
        Some(QuantizedQuery {
            min_x: quantize(bounds.min_x),
            min_y: quantize(bounds.min_y),
            max_x: quantize(bounds.max_x),
            max_y: quantize(bounds.max_y),
        })
    }

    pub(crate) fn get(&mut self, key: &QuantizedQuery) -> Option<Vec<T>> {
        self.entries.get(key).cloned()
    }

    pub(crate) fn put(&mut self, key: QuantizedQuery, results: Vec<T>) {
        self.entries.put(key, results);
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache() -> QueryCache<usize> {
        QueryCache::from_options(&RTreeOptions {
            cache_capacity: 2,
            cache_quantum: 1e-5,
            ..RTreeOptions::default()
        })
        .expect("cache enabled by options")
    }

    #[test]
    fn test_nearby_boxes_share_a_key() {
        let cache = cache();
        let a = cache
            .key_for(&BoundingBox::new(1.0, 2.0, 3.0, 4.0))
            .expect("finite box");
        let b = cache
            .key_for(&BoundingBox::new(1.0000004, 2.0, 3.0, 3.9999996))
            .expect("finite box");
        assert_eq!(a, b, "sub-quantum differences round together");

        let c = cache
            .key_for(&BoundingBox::new(1.001, 2.0, 3.0, 4.0))
            .expect("finite box");
        assert_ne!(a, c);
    }

    #[test]
    fn test_non_finite_box_has_no_key() {
        let cache = cache();
        assert!(cache
            .key_for(&BoundingBox::new(f64::NAN, 0.0, 1.0, 1.0))
            .is_none());
    }

    #[test]
    fn test_lru_eviction_at_capacity() {
        let mut cache = cache();
        let k1 = cache
            .key_for(&BoundingBox::new(0.0, 0.0, 1.0, 1.0))
            .expect("finite box");
        let k2 = cache
            .key_for(&BoundingBox::new(10.0, 0.0, 11.0, 1.0))
            .expect("finite box");
        let k3 = cache
            .key_for(&BoundingBox::new(20.0, 0.0, 21.0, 1.0))
            .expect("finite box");

        cache.put(k1, vec![1]);
        cache.put(k2, vec![2]);
        assert!(cache.get(&k1).is_some());
        // k2 is now least recent; inserting k3 evicts it
        cache.put(k3, vec![3]);
        assert!(cache.get(&k2).is_none());
        assert!(cache.get(&k1).is_some());
        assert!(cache.get(&k3).is_some());
    }

    #[test]
    fn test_disabled_when_capacity_zero_or_cache_off() {
        assert!(QueryCache::<usize>::from_options(&RTreeOptions {
            enable_query_cache: false,
            ..RTreeOptions::default()
        })
        .is_none());
        assert!(QueryCache::<usize>::from_options(&RTreeOptions {
            cache_capacity: 0,
            ..RTreeOptions::default()
        })
        .is_none());
    }
}
