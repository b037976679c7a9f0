#![forbid(unsafe_code)]

//! Size estimation and the per-item size cache.
//!
//! Scroll geometry needs a height for every item, mounted or not. Real
//! measurements exist only for items that have been attached at least once;
//! everything else gets a heuristic estimate:
//!
//! ```text
//! line_height * (text_lines + embed_lines) + fixed_margin
//! ```
//!
//! Precedence is strict: a cached size always wins over recomputing the
//! heuristic, and a measured size is never overwritten by an estimate.
//! Estimating is a pure read; entries enter the cache only through
//! measurements and explicitly recorded estimates. Every write funnels
//! through one chokepoint that raises a dirty flag; the owning list drains
//! the flag at most once per update pass, so a burst of size changes
//! collapses into a single reposition instead of one per change.
//!
//! # Failure modes
//!
//! | Condition | Behavior |
//! |-----------|----------|
//! | Shape queried for a vanishing item | warn + return 0.0, nothing cached |
//! | Estimate for an already-measured item | cache hit, heuristic skipped |
//! | Eviction (`set(id, None)`) of missing entry | no-op, dirty flag untouched |

use std::collections::HashMap;
use std::hash::{DefaultHasher, Hash, Hasher};

use tracing::warn;

/// Stable identity of a list item, independent of its current index.
///
/// Identity must survive remounts and list edits; hosts with string keys
/// can derive one with [`ItemId::from_hash`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, PartialOrd, Ord)]
pub struct ItemId(pub u64);

impl ItemId {
    /// Derive an id from hashable content (e.g. a host-side string key).
    ///
    /// Stable across sessions as long as the key is stable.
    #[inline]
    #[must_use]
    pub fn from_hash<T: Hash>(value: &T) -> Self {
        let mut hasher = DefaultHasher::new();
        value.hash(&mut hasher);
        Self(hasher.finish())
    }
}

/// Host-reported content shape used by the size heuristic.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct ContentShape {
    /// Wrapped text lines of the item's content.
    pub text_lines: u32,
    /// Additional line-equivalents contributed by non-text content
    /// (images, embeds, attachments).
    pub embed_lines: u32,
}

impl ContentShape {
    /// A plain one-line text item.
    #[must_use]
    pub fn single_line() -> Self {
        Self {
            text_lines: 1,
            embed_lines: 0,
        }
    }

    #[inline]
    #[must_use]
    pub fn total_lines(&self) -> u32 {
        self.text_lines + self.embed_lines
    }
}

/// Default pixel height of one content line.
pub const DEFAULT_LINE_HEIGHT: f64 = 17.0;
/// Default fixed vertical margin (padding + borders) per item.
pub const DEFAULT_FIXED_MARGIN: f64 = 22.0;

/// Tunables for the size heuristic.
///
/// Defaults make a plain one-line item estimate to 39 px.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EstimatorConfig {
    /// Pixel height of one content line.
    pub line_height: f64,
    /// Fixed vertical margin added to every item.
    pub fixed_margin: f64,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            line_height: DEFAULT_LINE_HEIGHT,
            fixed_margin: DEFAULT_FIXED_MARGIN,
        }
    }
}

/// A cached per-item size.
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct CachedSize {
    /// Pixel height.
    pub px: f64,
    /// Whether this came from a real host measurement (as opposed to the
    /// heuristic). Measurements are never downgraded back to estimates.
    pub measured: bool,
}

/// Cache statistics.
#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    /// Entries currently cached.
    pub entries: usize,
    /// Lookups answered from the cache.
    pub hits: u64,
    /// Lookups that fell through to the heuristic.
    pub misses: u64,
    /// Hit rate as a fraction (0.0 to 1.0).
    pub hit_rate: f64,
}

/// Persistent map of item id to estimated-or-measured pixel size.
///
/// Unbounded by design: the cache holds at most one entry per live item and
/// entries are removed explicitly when their item is destroyed. Evicting by
/// capacity would silently forget measurements and make total height jump.
#[derive(Debug, Default)]
pub struct SizeCache {
    entries: HashMap<ItemId, CachedSize>,
    /// Raised by every effective write; drained once per update pass.
    dirty: bool,
    hits: u64,
    misses: u64,
}

impl SizeCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an externally provided estimate, or evict with `None`.
    ///
    /// A measured entry is not downgraded: setting an estimate over a
    /// measurement keeps the measurement. `None` always evicts.
    pub fn set(&mut self, id: ItemId, px: Option<f64>) {
        match px {
            Some(px) => {
                if self.entries.get(&id).is_some_and(|e| e.measured) {
                    return;
                }
                self.write(
                    id,
                    Some(CachedSize {
                        px,
                        measured: false,
                    }),
                );
            }
            None => self.write(id, None),
        }
    }

    /// Record a real host measurement for `id`.
    pub fn set_measured(&mut self, id: ItemId, px: f64) {
        self.write(id, Some(CachedSize { px, measured: true }));
    }

    /// Remove the entry for a destroyed item.
    pub fn remove(&mut self, id: ItemId) {
        self.write(id, None);
    }

    /// The single write chokepoint; raises the dirty flag on any effective
    /// change so no caller can bypass the debounced reposition.
    fn write(&mut self, id: ItemId, value: Option<CachedSize>) {
        match value {
            Some(v) => {
                let prev = self.entries.insert(id, v);
                if prev != Some(v) {
                    self.dirty = true;
                }
            }
            None => {
                if self.entries.remove(&id).is_some() {
                    self.dirty = true;
                }
            }
        }
    }

    #[must_use]
    pub fn get(&self, id: ItemId) -> Option<CachedSize> {
        self.entries.get(&id).copied()
    }

    /// Whether a real measurement exists for `id`.
    #[must_use]
    pub fn is_measured(&self, id: ItemId) -> bool {
        self.entries.get(&id).is_some_and(|e| e.measured)
    }

    /// Drain the dirty flag. Returns true when any size changed since the
    /// previous drain.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Current cache statistics.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        let total = self.hits + self.misses;
        CacheStats {
            entries: self.entries.len(),
            hits: self.hits,
            misses: self.misses,
            hit_rate: if total == 0 {
                0.0
            } else {
                self.hits as f64 / total as f64
            },
        }
    }

    /// Export measured entries for cross-session persistence.
    ///
    /// Estimates are deliberately excluded: they are cheap to recompute and
    /// stale estimates would pin wrong heights across content changes.
    #[cfg(feature = "persist")]
    #[must_use]
    pub fn export_measurements(&self) -> MeasurementSnapshot {
        let mut sizes: Vec<(u64, f64)> = self
            .entries
            .iter()
            .filter(|(_, e)| e.measured)
            .map(|(id, e)| (id.0, e.px))
            .collect();
        sizes.sort_unstable_by_key(|(id, _)| *id);
        MeasurementSnapshot { sizes }
    }

    /// Seed the cache from a previous session's snapshot.
    ///
    /// Imported sizes re-enter as measurements so they outrank fresh
    /// estimates, exactly as they did when first measured.
    #[cfg(feature = "persist")]
    pub fn import_measurements(&mut self, snapshot: &MeasurementSnapshot) {
        for &(id, px) in &snapshot.sizes {
            self.set_measured(ItemId(id), px);
        }
    }
}

/// Serializable capture of measured item sizes.
#[cfg(feature = "persist")]
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct MeasurementSnapshot {
    /// `(item id, measured px)` pairs, sorted by id for stable output.
    pub sizes: Vec<(u64, f64)>,
}

#[cfg(feature = "persist")]
impl MeasurementSnapshot {
    /// Encode the snapshot as a stable JSON string.
    ///
    /// Errors can occur only if serialization fails (for example, due to
    /// an internal `serde_json` formatting error).
    pub fn to_json_string(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Decode a previously exported snapshot.
    ///
    /// Errors occur if the JSON does not match the expected schema.
    pub fn from_json_str(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

/// Heuristic size estimator over a [`SizeCache`].
#[derive(Debug, Default, Clone)]
pub struct SizeEstimator {
    config: EstimatorConfig,
}

impl SizeEstimator {
    #[must_use]
    pub fn new(config: EstimatorConfig) -> Self {
        Self { config }
    }

    /// Estimated or cached pixel size for one item.
    ///
    /// Cached sizes win verbatim; on a miss the heuristic runs over the
    /// host-reported `shape`. The cache is only read (plus hit/miss
    /// accounting), never written: entries come from measurements and
    /// explicit estimates, so a shape change stays visible to every query
    /// until something real lands in the cache. `shape == None` means the
    /// item vanished mid-update (removal racing a size query); that logs
    /// and yields 0.0, so the next query re-resolves cleanly.
    pub fn estimate(
        &self,
        cache: &mut SizeCache,
        id: ItemId,
        shape: Option<ContentShape>,
    ) -> f64 {
        if let Some(entry) = cache.entries.get(&id) {
            cache.hits += 1;
            return entry.px;
        }
        cache.misses += 1;

        let Some(shape) = shape else {
            warn!(id = id.0, "size query raced item removal, using 0");
            return 0.0;
        };
        self.heuristic(shape)
    }

    /// The raw heuristic, bypassing the cache.
    #[must_use]
    pub fn heuristic(&self, shape: ContentShape) -> f64 {
        self.config.line_height * f64::from(shape.total_lines()) + self.config.fixed_margin
    }
}
