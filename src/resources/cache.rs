//! Per-cell hourly capacity-factor shapes with incremental LRU caching.
//!
//! The cache is keyed by (ISO, technology). Each entry accumulates the
//! shapes fetched so far for that pair; a later request only fetches the
//! cell ids the entry does not hold yet. All bookkeeping for one request
//! (lookup, fetch, merge, insert, evict) happens under a single lock.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use super::lru::LruMap;
use super::types::{CellId, Technology};
use crate::calendar::HOURS_PER_YEAR;
use crate::error::{Result, TimesliceError};

/// Default number of (ISO, technology) entries kept.
pub const DEFAULT_CACHE_CAPACITY: usize = 10;

/// Hourly capacity-factor series of one cell (8760 values, 0.0–1.0).
pub type Shape = Arc<[f64]>;

/// Shapes by cell id.
pub type ShapeMap = HashMap<CellId, Shape>;

/// Columnar store of cell shapes keyed by (ISO, technology, year).
///
/// Implementations return only the ids they hold; an id that is not in the
/// store is simply absent from the result.
pub trait ShapeStore: Send + Sync {
    /// Fetches the series for `ids`.
    fn fetch(
        &self,
        iso: &str,
        technology: Technology,
        year: u16,
        ids: &[CellId],
    ) -> Result<HashMap<CellId, Vec<f64>>>;
}

/// Shape store held entirely in memory.
#[derive(Debug, Default, Clone)]
pub struct InMemoryShapeStore {
    data: HashMap<(String, Technology, u16), HashMap<CellId, Vec<f64>>>,
}

impl InMemoryShapeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(
        &mut self,
        iso: &str,
        technology: Technology,
        year: u16,
        id: CellId,
        series: Vec<f64>,
    ) {
        self.data
            .entry((iso.to_string(), technology, year))
            .or_default()
            .insert(id, series);
    }
}

impl ShapeStore for InMemoryShapeStore {
    fn fetch(
        &self,
        iso: &str,
        technology: Technology,
        year: u16,
        ids: &[CellId],
    ) -> Result<HashMap<CellId, Vec<f64>>> {
        let Some(table) = self.data.get(&(iso.to_string(), technology, year)) else {
            return Ok(HashMap::new());
        };
        Ok(ids
            .iter()
            .filter_map(|id| table.get(id).map(|s| (*id, s.clone())))
            .collect())
    }
}

/// Cache activity counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Requests fully served from an existing entry.
    pub hits: usize,
    /// Requests served partly from an entry, with the gap fetched.
    pub partial_hits: usize,
    /// Requests that created a new entry.
    pub misses: usize,
    pub evictions: usize,
    /// Calls made to the backing store.
    pub fetches: usize,
    /// Cell series received from the backing store.
    pub fetched_cells: usize,
}

/// Result of a lenient lookup.
#[derive(Debug, Clone, Default)]
pub struct ResolvedShapes {
    pub shapes: ShapeMap,
    /// Requested ids the store could not provide, in request order.
    pub missing: Vec<CellId>,
}

type CacheKey = (String, Technology);

struct CacheState {
    entries: LruMap<CacheKey, ShapeMap>,
    stats: CacheStats,
}

/// Bounded, thread-safe cache in front of a [`ShapeStore`].
pub struct ShapeCache {
    store: Box<dyn ShapeStore>,
    year: u16,
    state: Mutex<CacheState>,
}

impl std::fmt::Debug for ShapeCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("ShapeCache")
            .field("year", &self.year)
            .field("entries", &state.entries.len())
            .field("stats", &state.stats)
            .finish_non_exhaustive()
    }
}

impl ShapeCache {
    /// Creates a cache over `store` for weather year `year` holding at most
    /// `capacity` (ISO, technology) entries.
    pub fn new(store: impl ShapeStore + 'static, year: u16, capacity: usize) -> Self {
        Self {
            store: Box::new(store),
            year,
            state: Mutex::new(CacheState {
                entries: LruMap::new(capacity),
                stats: CacheStats::default(),
            }),
        }
    }

    /// Creates a cache with [`DEFAULT_CACHE_CAPACITY`].
    pub fn with_default_capacity(store: impl ShapeStore + 'static, year: u16) -> Self {
        Self::new(store, year, DEFAULT_CACHE_CAPACITY)
    }

    pub fn year(&self) -> u16 {
        self.year
    }

    pub fn capacity(&self) -> usize {
        self.state.lock().entries.capacity()
    }

    /// Returns the shapes for every id in `cell_ids`.
    ///
    /// # Errors
    ///
    /// `ShapeResolutionFailure` if any id is still unavailable after
    /// fetching; store errors are propagated.
    pub fn get_cell_shapes(
        &self,
        iso: &str,
        technology: Technology,
        cell_ids: &[CellId],
    ) -> Result<ShapeMap> {
        let resolved = self.resolve_cell_shapes(iso, technology, cell_ids)?;
        if !resolved.missing.is_empty() {
            return Err(TimesliceError::unresolved(iso, technology, &resolved.missing));
        }
        Ok(resolved.shapes)
    }

    /// Returns whatever shapes can be resolved, plus the ids that cannot.
    pub fn resolve_cell_shapes(
        &self,
        iso: &str,
        technology: Technology,
        cell_ids: &[CellId],
    ) -> Result<ResolvedShapes> {
        let mut seen = HashSet::with_capacity(cell_ids.len());
        let requested: Vec<CellId> = cell_ids
            .iter()
            .copied()
            .filter(|id| seen.insert(*id))
            .collect();

        let key: CacheKey = (iso.to_string(), technology);
        let mut guard = self.state.lock();
        let CacheState { entries, stats } = &mut *guard;

        if let Some(entry) = entries.get_mut(&key) {
            let gap: Vec<CellId> = requested
                .iter()
                .copied()
                .filter(|id| !entry.contains_key(id))
                .collect();
            if gap.is_empty() {
                stats.hits += 1;
                debug!(iso, %technology, cells = requested.len(), "shape cache hit");
            } else {
                stats.partial_hits += 1;
                debug!(iso, %technology, gap = gap.len(), "shape cache partial hit");
                let fetched = self.fetch(iso, technology, &gap, stats)?;
                entry.extend(fetched);
            }
        } else {
            stats.misses += 1;
            debug!(iso, %technology, cells = requested.len(), "shape cache miss");
            let fetched = self.fetch(iso, technology, &requested, stats)?;
            if let Some(((old_iso, old_tech), _)) = entries.insert(key.clone(), fetched) {
                stats.evictions += 1;
                debug!(iso = %old_iso, technology = %old_tech, "evicted shape cache entry");
            }
        }

        let Some(entry) = entries.peek(&key) else {
            return Ok(ResolvedShapes::default());
        };
        let mut resolved = ResolvedShapes::default();
        for id in requested {
            match entry.get(&id) {
                Some(shape) => {
                    resolved.shapes.insert(id, Arc::clone(shape));
                }
                None => resolved.missing.push(id),
            }
        }
        Ok(resolved)
    }

    fn fetch(
        &self,
        iso: &str,
        technology: Technology,
        ids: &[CellId],
        stats: &mut CacheStats,
    ) -> Result<ShapeMap> {
        if ids.is_empty() {
            return Ok(ShapeMap::new());
        }
        stats.fetches += 1;
        let raw = self.store.fetch(iso, technology, self.year, ids)?;
        stats.fetched_cells += raw.len();
        raw.into_iter()
            .map(|(id, series)| {
                if series.len() != HOURS_PER_YEAR {
                    return Err(TimesliceError::unavailable(
                        iso,
                        format!(
                            "{technology} shape for cell {id} has {} values, expected {HOURS_PER_YEAR}",
                            series.len()
                        ),
                    ));
                }
                Ok((id, Shape::from(series)))
            })
            .collect()
    }

    /// Snapshot of the activity counters.
    pub fn stats(&self) -> CacheStats {
        self.state.lock().stats
    }

    /// Number of (ISO, technology) entries currently held.
    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cached keys from most to least recently used.
    pub fn keys_by_recency(&self) -> Vec<(String, Technology)> {
        self.state
            .lock()
            .entries
            .keys_by_recency()
            .into_iter()
            .cloned()
            .collect()
    }

    /// Drops every entry and resets the counters.
    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.entries.clear();
        state.stats = CacheStats::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat(cf: f64) -> Vec<f64> {
        vec![cf; HOURS_PER_YEAR]
    }

    fn store_with(iso: &str, technology: Technology, ids: &[CellId]) -> InMemoryShapeStore {
        let mut store = InMemoryShapeStore::new();
        for &id in ids {
            store.insert(iso, technology, 2023, id, flat(id as f64 / 100.0));
        }
        store
    }

    #[test]
    fn first_access_is_a_miss_with_one_fetch() {
        let cache = ShapeCache::new(store_with("DEU", Technology::Solar, &[1, 2, 3]), 2023, 4);
        let shapes = cache
            .get_cell_shapes("DEU", Technology::Solar, &[1, 2])
            .expect("cells exist");
        assert_eq!(shapes.len(), 2);
        let stats = cache.stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.fetches, 1);
        assert_eq!(stats.fetched_cells, 2);
    }

    #[test]
    fn subset_request_is_a_full_hit_without_fetch() {
        let cache = ShapeCache::new(store_with("DEU", Technology::Solar, &[1, 2, 3]), 2023, 4);
        let first = cache
            .get_cell_shapes("DEU", Technology::Solar, &[1, 2, 3])
            .expect("cells exist");
        let second = cache
            .get_cell_shapes("DEU", Technology::Solar, &[3, 1])
            .expect("cells cached");
        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.fetches, 1);
        for id in [1, 3] {
            assert!(Arc::ptr_eq(&first[&id], &second[&id]));
        }
    }

    #[test]
    fn partial_hit_fetches_only_the_gap() {
        let cache = ShapeCache::new(store_with("DEU", Technology::Wind, &[1, 2, 3, 4]), 2023, 4);
        cache
            .get_cell_shapes("DEU", Technology::Wind, &[1, 2])
            .expect("cells exist");
        cache
            .get_cell_shapes("DEU", Technology::Wind, &[2, 3, 4])
            .expect("cells exist");
        let stats = cache.stats();
        assert_eq!(stats.partial_hits, 1);
        assert_eq!(stats.fetches, 2);
        assert_eq!(stats.fetched_cells, 4);
    }

    #[test]
    fn unresolved_ids_fail_strict_lookup() {
        let cache = ShapeCache::new(store_with("FRA", Technology::Solar, &[1]), 2023, 4);
        let err = cache
            .get_cell_shapes("FRA", Technology::Solar, &[1, 7, 8])
            .expect_err("7 and 8 are missing");
        match err {
            TimesliceError::ShapeResolutionFailure {
                examples, total, ..
            } => {
                assert_eq!(examples, vec![7, 8]);
                assert_eq!(total, 2);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn lenient_lookup_reports_missing_in_request_order() {
        let cache = ShapeCache::new(store_with("FRA", Technology::Solar, &[1, 2]), 2023, 4);
        let resolved = cache
            .resolve_cell_shapes("FRA", Technology::Solar, &[9, 1, 5, 2, 1])
            .expect("store reachable");
        assert_eq!(resolved.shapes.len(), 2);
        assert_eq!(resolved.missing, vec![9, 5]);
    }

    #[test]
    fn least_recently_used_entry_is_evicted() {
        let mut store = InMemoryShapeStore::new();
        for iso in ["AAA", "BBB", "CCC"] {
            store.insert(iso, Technology::Solar, 2023, 1, flat(0.2));
        }
        let cache = ShapeCache::new(store, 2023, 2);
        for iso in ["AAA", "BBB"] {
            cache
                .get_cell_shapes(iso, Technology::Solar, &[1])
                .expect("cell exists");
        }
        // Touch AAA so BBB becomes least recent.
        cache
            .get_cell_shapes("AAA", Technology::Solar, &[1])
            .expect("cached");
        cache
            .get_cell_shapes("CCC", Technology::Solar, &[1])
            .expect("cell exists");

        assert_eq!(cache.stats().evictions, 1);
        assert_eq!(
            cache.keys_by_recency(),
            vec![
                ("CCC".to_string(), Technology::Solar),
                ("AAA".to_string(), Technology::Solar)
            ]
        );
    }

    #[test]
    fn wrong_length_series_is_rejected() {
        let mut store = InMemoryShapeStore::new();
        store.insert("ITA", Technology::Wind, 2023, 1, vec![0.3; 24]);
        let cache = ShapeCache::new(store, 2023, 2);
        let err = cache.get_cell_shapes("ITA", Technology::Wind, &[1]);
        assert!(matches!(err, Err(TimesliceError::DataUnavailable { .. })));
        assert!(cache.is_empty());
    }

    #[test]
    fn clear_resets_entries_and_counters() {
        let cache = ShapeCache::new(store_with("DEU", Technology::Solar, &[1]), 2023, 2);
        cache
            .get_cell_shapes("DEU", Technology::Solar, &[1])
            .expect("cell exists");
        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.stats(), CacheStats::default());
    }
}
