//! Symbol tree cache keyed by document session and version.
//!
//! An entry is served only while the document version is unchanged and the
//! entry is younger than the configured max age. When the cache grows past
//! its capacity the least-recently-created entry is evicted.

use std::collections::HashMap;
use std::rc::Rc;
use std::time::{Duration, Instant};

use crate::error::Error;
use crate::types::{DocumentId, SymbolNode, SymbolTree};

/// Default number of cached documents.
pub const DEFAULT_CAPACITY: usize = 50;

/// Default entry lifetime.
pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(5 * 60);

/// Cache sizing and expiry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    /// Maximum number of entries before eviction.
    pub capacity: usize,
    /// Entries older than this are recomputed.
    pub max_age: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        return Self { capacity: DEFAULT_CAPACITY, max_age: DEFAULT_MAX_AGE };
    }
}

/// One captured outline.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// When the outline was captured.
    pub captured_at: Instant,
    /// Session the outline belongs to.
    pub document: DocumentId,
    /// How long the provider took.
    pub parse_time: Duration,
    /// Creation order, used to break `captured_at` ties on eviction.
    sequence: u64,
    /// The outline itself.
    pub tree: Rc<SymbolTree>,
    /// Document version the outline was computed from.
    pub version: u64,
}

/// Counters describing cache effectiveness.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CacheStats {
    /// Mean provider time across misses.
    pub average_parse_time: Duration,
    /// Entries dropped for capacity.
    pub evictions: u64,
    /// Percentage of lookups served from cache.
    pub hit_rate: f64,
    /// Lookups served from cache.
    pub hits: u64,
    /// Lookups that called the provider.
    pub misses: u64,
}

/// Memoizes symbol outlines per document version.
#[derive(Debug)]
pub struct SymbolTreeCache {
    /// Sizing and expiry.
    config: CacheConfig,
    /// Live entries.
    entries: HashMap<DocumentId, CacheEntry>,
    /// Entries evicted for capacity.
    evictions: u64,
    /// Lookups served from cache.
    hits: u64,
    /// Lookups that called the provider.
    misses: u64,
    /// Next creation sequence number.
    next_sequence: u64,
    /// Sum of provider time across misses.
    total_parse_time: Duration,
}

impl Default for SymbolTreeCache {
    fn default() -> Self {
        return Self::new(CacheConfig::default());
    }
}

impl SymbolTreeCache {
    /// Drop every entry.
    pub fn clear(&mut self) {
        let size = self.entries.len();
        self.entries.clear();
        tracing::debug!(entries = size, "cleared symbol cache");
    }

    /// Drop entries older than the max age. Returns how many were removed.
    pub fn cleanup_stale(&mut self, now: Instant) -> usize {
        let max_age = self.config.max_age;
        let before = self.entries.len();
        self.entries.retain(|_, entry| return now.saturating_duration_since(entry.captured_at) <= max_age);
        let cleaned = before.saturating_sub(self.entries.len());
        if cleaned > 0 {
            tracing::debug!(cleaned, "removed stale symbol cache entries");
        }
        return cleaned;
    }

    /// Inspect the entry for a document, valid or not.
    pub fn entry(&self, document: DocumentId) -> Option<&CacheEntry> {
        return self.entries.get(&document);
    }

    /// Evict the least-recently-created entry.
    fn evict_oldest(&mut self) {
        let oldest = self
            .entries
            .values()
            .min_by_key(|entry| return (entry.captured_at, entry.sequence))
            .map(|entry| return entry.document);
        if let Some(document) = oldest {
            self.entries.remove(&document);
            self.evictions = self.evictions.saturating_add(1);
            tracing::debug!(%document, "evicted oldest symbol cache entry");
        }
    }

    /// Return the cached outline for `document` at `version`, or compute it
    /// with `fetch`, time it, and store it.
    ///
    /// Symbol ranges are clamped to `line_count` so a provider cannot hand
    /// back lines the document does not have. A failing provider is logged
    /// and cached as an empty outline for that version.
    pub fn get_symbol_tree<F>(
        &mut self,
        document: DocumentId,
        version: u64,
        line_count: u32,
        now: Instant,
        fetch: F,
    ) -> Rc<SymbolTree>
    where
        F: FnOnce() -> Result<Vec<SymbolNode>, Error>,
    {
        if let Some(entry) = self.entries.get(&document)
            && self.is_valid(entry, version, now)
        {
            self.hits = self.hits.saturating_add(1);
            tracing::debug!(%document, version, "symbol cache hit");
            return Rc::clone(&entry.tree);
        }

        self.misses = self.misses.saturating_add(1);
        let started = Instant::now();
        let symbols = match fetch() {
            Ok(symbols) => symbols,
            Err(e) => {
                tracing::debug!(%document, error = %e, "symbol provider unavailable, using fingerprints only");
                Vec::new()
            },
        };
        let parse_time = started.elapsed();
        self.total_parse_time = self.total_parse_time.saturating_add(parse_time);

        let tree = Rc::new(SymbolTree { symbols: clamp_symbols(symbols, line_count) });
        tracing::debug!(%document, version, symbols = tree.len(), ?parse_time, "symbol cache miss");

        let sequence = self.next_sequence;
        self.next_sequence = self.next_sequence.saturating_add(1);
        self.entries.insert(document, CacheEntry {
            captured_at: now,
            document,
            parse_time,
            sequence,
            tree: Rc::clone(&tree),
            version,
        });

        if self.entries.len() > self.config.capacity {
            self.evict_oldest();
        }
        return tree;
    }

    /// Drop the entry for `document`, if any.
    pub fn invalidate(&mut self, document: DocumentId) {
        if self.entries.remove(&document).is_some() {
            tracing::debug!(%document, "invalidated symbol cache entry");
        }
    }

    /// Whether no entries are cached.
    pub fn is_empty(&self) -> bool {
        return self.entries.is_empty();
    }

    /// Whether `entry` may be served for `version` at `now`.
    fn is_valid(&self, entry: &CacheEntry, version: u64, now: Instant) -> bool {
        if entry.version != version {
            return false;
        }
        return now.saturating_duration_since(entry.captured_at) < self.config.max_age;
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        return self.entries.len();
    }

    /// Empty cache with the given sizing.
    pub fn new(config: CacheConfig) -> Self {
        return Self {
            config,
            entries: HashMap::new(),
            evictions: 0,
            hits: 0,
            misses: 0,
            next_sequence: 0,
            total_parse_time: Duration::ZERO,
        };
    }

    /// Reset hit/miss/eviction counters.
    pub fn reset_stats(&mut self) {
        self.evictions = 0;
        self.hits = 0;
        self.misses = 0;
        self.total_parse_time = Duration::ZERO;
    }

    /// Snapshot of the counters.
    pub fn stats(&self) -> CacheStats {
        let lookups = self.hits.saturating_add(self.misses);
        let hit_rate = if lookups == 0 {
            0.0
        } else {
            #[allow(clippy::as_conversions, clippy::cast_precision_loss, reason = "percentage display only")]
            let rate = (self.hits as f64 / lookups as f64) * 100.0;
            rate
        };
        let average_parse_time = u32::try_from(self.misses)
            .ok()
            .and_then(|misses| return self.total_parse_time.checked_div(misses))
            .unwrap_or_default();
        return CacheStats {
            average_parse_time,
            evictions: self.evictions,
            hit_rate,
            hits: self.hits,
            misses: self.misses,
        };
    }
}

/// Clamp symbol ranges into `1..=line_count`, dropping symbols that start
/// past the end of the document.
fn clamp_symbols(symbols: Vec<SymbolNode>, line_count: u32) -> Vec<SymbolNode> {
    let last = line_count.max(1);
    return symbols
        .into_iter()
        .filter(|s| return s.range.start <= last)
        .map(|mut s| {
            s.range.start = s.range.start.max(1);
            s.range.end = s.range.end.clamp(s.range.start, last);
            s.children = clamp_symbols(s.children, line_count);
            return s;
        })
        .collect();
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::time::{Duration, Instant};

    use super::{CacheConfig, SymbolTreeCache};
    use crate::error::Error;
    use crate::types::{DocumentId, SymbolKind, SymbolNode};

    fn outline() -> Vec<SymbolNode> {
        return vec![SymbolNode::new("main", SymbolKind::Function, 1, 3)];
    }

    #[test]
    fn same_version_is_served_from_cache() {
        let mut cache = SymbolTreeCache::default();
        let calls = Cell::new(0);
        let now = Instant::now();
        let doc = DocumentId(1);
        for _ in 0..3 {
            let tree = cache.get_symbol_tree(doc, 7, 10, now, || {
                calls.set(calls.get() + 1);
                Ok(outline())
            });
            assert_eq!(tree.symbols.len(), 1);
        }
        assert_eq!(calls.get(), 1);
        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses), (2, 1));
    }

    #[test]
    fn new_version_recomputes() {
        let mut cache = SymbolTreeCache::default();
        let calls = Cell::new(0);
        let now = Instant::now();
        let doc = DocumentId(1);
        for version in [1, 2] {
            cache.get_symbol_tree(doc, version, 10, now, || {
                calls.set(calls.get() + 1);
                Ok(outline())
            });
        }
        assert_eq!(calls.get(), 2);
        assert_eq!(cache.entry(doc).unwrap().version, 2);
    }

    #[test]
    fn expired_entry_recomputes() {
        let mut cache = SymbolTreeCache::new(CacheConfig { capacity: 4, max_age: Duration::from_secs(60) });
        let calls = Cell::new(0);
        let start = Instant::now();
        let doc = DocumentId(1);
        for offset in [0, 30, 61] {
            cache.get_symbol_tree(doc, 1, 10, start + Duration::from_secs(offset), || {
                calls.set(calls.get() + 1);
                Ok(outline())
            });
        }
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn capacity_evicts_least_recently_created() {
        let mut cache = SymbolTreeCache::new(CacheConfig { capacity: 2, max_age: Duration::from_secs(60) });
        let start = Instant::now();
        for id in 1..=3 {
            cache.get_symbol_tree(DocumentId(id), 1, 10, start + Duration::from_secs(id), || Ok(outline()));
        }
        assert_eq!(cache.len(), 2);
        assert!(cache.entry(DocumentId(1)).is_none());
        assert!(cache.entry(DocumentId(3)).is_some());
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn provider_failure_caches_empty_tree() {
        let mut cache = SymbolTreeCache::default();
        let tree = cache.get_symbol_tree(DocumentId(1), 1, 10, Instant::now(), || {
            Err(Error::ProviderFailed { reason: "server crashed".to_string() })
        });
        assert!(tree.is_empty());
    }

    #[test]
    fn ranges_are_clamped_to_the_document() {
        let mut cache = SymbolTreeCache::default();
        let tree = cache.get_symbol_tree(DocumentId(1), 1, 5, Instant::now(), || {
            Ok(vec![
                SymbolNode::new("long", SymbolKind::Function, 2, 40),
                SymbolNode::new("ghost", SymbolKind::Function, 9, 12),
            ])
        });
        assert_eq!(tree.symbols.len(), 1);
        assert_eq!(tree.symbols[0].range.end, 5);
    }

    #[test]
    fn invalidate_and_cleanup() {
        let mut cache = SymbolTreeCache::new(CacheConfig { capacity: 4, max_age: Duration::from_secs(10) });
        let start = Instant::now();
        cache.get_symbol_tree(DocumentId(1), 1, 10, start, || Ok(outline()));
        cache.get_symbol_tree(DocumentId(2), 1, 10, start + Duration::from_secs(8), || Ok(outline()));
        cache.invalidate(DocumentId(2));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.cleanup_stale(start + Duration::from_secs(11)), 1);
        assert!(cache.is_empty());
    }
}
