//! Fenwick tree (Binary Indexed Tree) over `f64` pixel heights.
//!
//! The offset backbone of the list model: entry `i` stores the pixel height
//! of item `i` (estimated or measured), `prefix(i)` gives the bottom edge of
//! item `i`, and `find_prefix`/`index_at` answer the inverse question of
//! which item covers a given y-offset. All queries are O(log n) with zero
//! allocation; structural edits (insert/remove) rebuild in O(n), which is
//! acceptable because sequence edits are rare next to scroll queries.
//!
//! # Layout
//!
//! The tree is stored 1-indexed in a contiguous `Vec<f64>` of length `n + 1`
//! (index 0 unused). A 100k-item list occupies ~800 KB, sequential and
//! cache-friendly.
//!
//! # Operations
//!
//! | Operation | Time | Allocations |
//! |-----------|------|-------------|
//! | `new(n)` / `from_values` | O(n) | 1 Vec |
//! | `update(i, delta)` / `set(i, v)` | O(log n) | 0 |
//! | `prefix(i)` / `offset_of(i)` / `total()` | O(log n) | 0 |
//! | `find_prefix(y)` / `index_at(y)` | O(log n) | 0 |
//! | `rebuild(values)` | O(n) | 0 |
//! | `insert(i, v)` / `remove(i)` | O(n) | 1 Vec |
//!
//! # Invariants
//!
//! 1. `tree[i]` stores the sum of a value range determined by `lowbit(i)`.
//! 2. `prefix(n - 1) == total()` == sum of all heights.
//! 3. After `rebuild`, the tree exactly represents the given values.
//! 4. Item `i` covers the half-open span `[offset_of(i), prefix(i))`.
//!
//! # Float drift
//!
//! Repeated `update`/`set` calls accumulate rounding error in the partial
//! sums. Structural edits rebuild from scratch and restore exactness; hosts
//! that measure in whole or quarter pixels never observe drift at all.

/// Fenwick tree over `f64` item heights with offset queries.
#[derive(Debug, Clone)]
pub struct OffsetTree {
    /// 1-indexed tree storage. `tree[0]` is unused.
    tree: Vec<f64>,
    /// Number of items (not including index 0).
    n: usize,
}

impl OffsetTree {
    /// Create a tree of `n` items, all zero-height.
    #[must_use]
    pub fn new(n: usize) -> Self {
        Self {
            tree: vec![0.0; n + 1],
            n,
        }
    }

    /// Build from initial heights in O(n).
    ///
    /// Faster than n `update` calls (which would be O(n log n)).
    #[must_use]
    pub fn from_values(values: &[f64]) -> Self {
        let n = values.len();
        let mut tree = vec![0.0; n + 1];

        for (i, &v) in values.iter().enumerate() {
            tree[i + 1] = v;
        }

        // Parent propagation builds partial sums in O(n).
        for i in 1..=n {
            let parent = i + lowbit(i);
            if parent <= n {
                tree[parent] += tree[i];
            }
        }

        Self { tree, n }
    }

    /// Number of items.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.n
    }

    /// Whether the tree holds no items.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    /// Add `delta` (may be negative) to the height of item `i`. O(log n).
    ///
    /// # Panics
    /// Panics if `i >= len()`.
    pub fn update(&mut self, i: usize, delta: f64) {
        assert!(i < self.n, "index {i} out of bounds (n={})", self.n);
        let mut idx = i + 1; // 1-indexed
        while idx <= self.n {
            self.tree[idx] += delta;
            idx += lowbit(idx);
        }
    }

    /// Set the height of item `i` to `value`. O(log n).
    ///
    /// # Panics
    /// Panics if `i >= len()`.
    pub fn set(&mut self, i: usize, value: f64) {
        let current = self.get(i);
        self.update(i, value - current);
    }

    /// Height of item `i`. O(log n), computed as `prefix(i) - prefix(i-1)`.
    #[must_use]
    pub fn get(&self, i: usize) -> f64 {
        if i == 0 {
            self.prefix(0)
        } else {
            self.prefix(i) - self.prefix(i - 1)
        }
    }

    /// Sum of heights `[0..=i]`: the bottom edge of item `i`. O(log n).
    ///
    /// # Panics
    /// Panics if `i >= len()`.
    #[must_use]
    pub fn prefix(&self, i: usize) -> f64 {
        assert!(i < self.n, "index {i} out of bounds (n={})", self.n);
        let mut sum = 0.0;
        let mut idx = i + 1;
        while idx > 0 {
            sum += self.tree[idx];
            idx -= lowbit(idx);
        }
        sum
    }

    /// Top edge of item `i`: 0 for the first item, else `prefix(i - 1)`.
    ///
    /// # Panics
    /// Panics if `i >= len()`.
    #[must_use]
    pub fn offset_of(&self, i: usize) -> f64 {
        if i == 0 {
            assert!(self.n > 0, "offset_of on empty tree");
            0.0
        } else {
            self.prefix(i - 1)
        }
    }

    /// Total pixel height of the list. O(log n).
    #[must_use]
    pub fn total(&self) -> f64 {
        if self.n == 0 {
            0.0
        } else {
            self.prefix(self.n - 1)
        }
    }

    /// Rebuild from fresh heights in O(n), discarding accumulated drift.
    ///
    /// # Panics
    /// Panics if `values.len() != len()`.
    pub fn rebuild(&mut self, values: &[f64]) {
        assert_eq!(values.len(), self.n, "rebuild size mismatch");

        self.tree.fill(0.0);
        for (i, &v) in values.iter().enumerate() {
            self.tree[i + 1] = v;
        }
        for i in 1..=self.n {
            let parent = i + lowbit(i);
            if parent <= self.n {
                self.tree[parent] += self.tree[i];
            }
        }
    }

    /// Largest index `i` with `prefix(i) <= target`, or `None` when even the
    /// first item's bottom edge exceeds `target`. O(log n).
    ///
    /// Binary-lifting descent over the implicit tree; the primitive behind
    /// [`OffsetTree::index_at`].
    #[must_use]
    pub fn find_prefix(&self, target: f64) -> Option<usize> {
        if self.n == 0 {
            return None;
        }

        let mut pos = 0usize;
        let mut remaining = target;
        let mut bit_mask = most_significant_bit(self.n);

        while bit_mask > 0 {
            let next = pos + bit_mask;
            if next <= self.n && self.tree[next] <= remaining {
                remaining -= self.tree[next];
                pos = next;
            }
            bit_mask >>= 1;
        }

        if pos == 0 {
            None
        } else {
            Some(pos - 1) // back to 0-indexed
        }
    }

    /// Index of the item whose `[offset_of(i), prefix(i))` span covers `y`.
    ///
    /// Clamps: `y < 0` resolves to the first item, `y >= total()` to the
    /// last. Returns `None` only when the tree is empty. Zero-height items
    /// at exactly `y` are skipped (their span is empty).
    #[must_use]
    pub fn index_at(&self, y: f64) -> Option<usize> {
        if self.n == 0 {
            return None;
        }
        if y < 0.0 {
            return Some(0);
        }
        let idx = match self.find_prefix(y) {
            // Bottom edge of `i` is at or above y, so y falls in i+1.
            Some(i) => i + 1,
            None => 0,
        };
        Some(idx.min(self.n - 1))
    }

    /// Insert an item of height `value` before index `i`. O(n).
    ///
    /// # Panics
    /// Panics if `i > len()`.
    pub fn insert(&mut self, i: usize, value: f64) {
        assert!(i <= self.n, "insert index {i} out of bounds (n={})", self.n);
        let mut values = self.snapshot();
        values.insert(i, value);
        self.n = values.len();
        self.tree = vec![0.0; self.n + 1];
        self.rebuild(&values);
    }

    /// Remove item `i`, shifting later items up. O(n).
    ///
    /// # Panics
    /// Panics if `i >= len()`.
    pub fn remove(&mut self, i: usize) {
        assert!(i < self.n, "remove index {i} out of bounds (n={})", self.n);
        let mut values = self.snapshot();
        values.remove(i);
        self.n = values.len();
        self.tree = vec![0.0; self.n + 1];
        self.rebuild(&values);
    }

    /// Current heights as a flat vector.
    fn snapshot(&self) -> Vec<f64> {
        (0..self.n).map(|i| self.get(i)).collect()
    }
}

/// Lowest set bit of `x`. E.g., `lowbit(6) = 2`, `lowbit(4) = 4`.
#[inline]
fn lowbit(x: usize) -> usize {
    x & x.wrapping_neg()
}

/// Most significant bit that fits within `n`.
#[inline]
fn most_significant_bit(n: usize) -> usize {
    if n == 0 {
        return 0;
    }
    1 << (usize::BITS - 1 - n.leading_zeros())
}
