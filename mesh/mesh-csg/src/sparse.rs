//! Sparse pair store.
//!
//! [`SparseIndices`] is the currency of the broad and narrow phases: a
//! compact list of (p, q) index pairs in structure-of-arrays form,
//! standing in for the sparse non-zero entries of an element-adjacency
//! matrix between the two meshes.

use tracing::trace;

/// A list of (p, q) index pairs between two meshes.
///
/// Stored as two parallel `Vec<i32>` columns. The interpretation of p
/// and q depends on the phase: vertex-face, edge-face, or edge-edge
/// pairs. Lexicographic sorting by (p, q) enables the binary searches
/// the narrow phase relies on.
#[derive(Debug, Default, Clone)]
pub struct SparseIndices {
    p: Vec<i32>,
    q: Vec<i32>,
}

impl SparseIndices {
    /// Create an empty pair store.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            p: Vec::new(),
            q: Vec::new(),
        }
    }

    /// Create a pair store of `len` zeroed pairs, for index-addressed
    /// filling.
    #[must_use]
    pub fn zeroed(len: usize) -> Self {
        Self {
            p: vec![0; len],
            q: vec![0; len],
        }
    }

    /// Number of stored pairs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.p.len()
    }

    /// Whether the store holds no pairs.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.p.is_empty()
    }

    /// Append a pair.
    pub fn push(&mut self, p: i32, q: i32) {
        self.p.push(p);
        self.q.push(q);
    }

    /// Overwrite the pair at `index`.
    pub fn set(&mut self, index: usize, p: i32, q: i32) {
        self.p[index] = p;
        self.q[index] = q;
    }

    /// Get the pair at `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> (i32, i32) {
        (self.p[index], self.q[index])
    }

    /// Borrow one column: q when `use_q` is true, p otherwise.
    #[must_use]
    pub fn side(&self, use_q: bool) -> &[i32] {
        if use_q {
            &self.q
        } else {
            &self.p
        }
    }

    /// Swap the p and q columns.
    pub fn swap_pq(&mut self) {
        std::mem::swap(&mut self.p, &mut self.q);
    }

    /// Sort pairs lexicographically by (p, q).
    pub fn sort(&mut self) {
        let mut pairs: Vec<(i32, i32)> = self.p.iter().copied().zip(self.q.iter().copied()).collect();
        pairs.sort_unstable();
        for (i, (p, q)) in pairs.into_iter().enumerate() {
            self.p[i] = p;
            self.q[i] = q;
        }
    }

    /// Sort pairs and remove duplicates.
    pub fn unique(&mut self) {
        let mut pairs: Vec<(i32, i32)> = self.p.iter().copied().zip(self.q.iter().copied()).collect();
        pairs.sort_unstable();
        pairs.dedup();
        trace!(kept = pairs.len(), from = self.p.len(), "deduplicated pairs");
        self.p.clear();
        self.q.clear();
        for (p, q) in pairs {
            self.p.push(p);
            self.q.push(q);
        }
    }

    /// Binary search for an exact (p, q) pair. Requires the store to be
    /// sorted.
    #[must_use]
    pub fn binary_search(&self, p: i32, q: i32) -> Option<usize> {
        let mut left = 0_usize;
        let mut right = self.len();
        while left < right {
            let mid = left + (right - left) / 2;
            if (self.p[mid], self.q[mid]) < (p, q) {
                left = mid + 1;
            } else {
                right = mid;
            }
        }
        if left < self.len() && (self.p[left], self.q[left]) == (p, q) {
            Some(left)
        } else {
            None
        }
    }

    /// Keep only the pairs whose flag is set. `keep` must have one
    /// entry per pair.
    pub fn retain(&mut self, keep: &[bool]) {
        debug_assert_eq!(keep.len(), self.len());
        let mut write = 0_usize;
        for read in 0..self.len() {
            if keep[read] {
                self.p[write] = self.p[read];
                self.q[write] = self.q[read];
                write += 1;
            }
        }
        self.p.truncate(write);
        self.q.truncate(write);
    }

    /// Sum `values` over runs of equal keys in the chosen column.
    ///
    /// Orders entries by the key column first (the pairing of keys to
    /// values is preserved through the permutation), then reduces each
    /// run of equal keys to a single (key, sum) entry. Used to turn
    /// per-pair winding contributions into per-vertex winding numbers.
    #[must_use]
    pub fn reduce_by_key(&self, use_q: bool, values: &[i32]) -> (Vec<i32>, Vec<i32>) {
        debug_assert_eq!(values.len(), self.len());
        let keys = self.side(use_q);

        let mut perm: Vec<usize> = (0..self.len()).collect();
        perm.sort_unstable_by_key(|&i| keys[i]);

        let mut out_keys = Vec::new();
        let mut out_sums = Vec::new();
        for &i in &perm {
            if out_keys.last() == Some(&keys[i]) {
                if let Some(sum) = out_sums.last_mut() {
                    *sum += values[i];
                }
            } else {
                out_keys.push(keys[i]);
                out_sums.push(values[i]);
            }
        }
        (out_keys, out_sums)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn store(pairs: &[(i32, i32)]) -> SparseIndices {
        let mut s = SparseIndices::new();
        for &(p, q) in pairs {
            s.push(p, q);
        }
        s
    }

    #[test]
    fn sort_orders_lexicographically() {
        let mut s = store(&[(3, 1), (1, 2), (1, 1), (2, 5)]);
        s.sort();
        assert_eq!(s.side(false), &[1, 1, 2, 3]);
        assert_eq!(s.side(true), &[1, 2, 5, 1]);
    }

    #[test]
    fn unique_removes_duplicates() {
        let mut s = store(&[(1, 1), (2, 2), (1, 1), (2, 2), (0, 9)]);
        s.unique();
        assert_eq!(s.len(), 3);
        assert_eq!(s.get(0), (0, 9));
        assert_eq!(s.get(1), (1, 1));
        assert_eq!(s.get(2), (2, 2));
    }

    #[test]
    fn binary_search_finds_pairs() {
        let mut s = store(&[(5, 0), (1, 3), (1, 1), (7, 2)]);
        s.sort();
        assert_eq!(s.binary_search(1, 1), Some(0));
        assert_eq!(s.binary_search(1, 3), Some(1));
        assert_eq!(s.binary_search(7, 2), Some(3));
        assert_eq!(s.binary_search(1, 2), None);
        assert_eq!(s.binary_search(9, 9), None);
    }

    #[test]
    fn swap_pq_swaps_columns() {
        let mut s = store(&[(1, 10), (2, 20)]);
        s.swap_pq();
        assert_eq!(s.get(0), (10, 1));
        assert_eq!(s.get(1), (20, 2));
    }

    #[test]
    fn retain_filters_pairs() {
        let mut s = store(&[(1, 1), (2, 2), (3, 3), (4, 4)]);
        s.retain(&[true, false, false, true]);
        assert_eq!(s.len(), 2);
        assert_eq!(s.get(0), (1, 1));
        assert_eq!(s.get(1), (4, 4));
    }

    #[test]
    fn reduce_by_key_sums_runs() {
        // Keys out of order with repeats; values must follow their keys
        // through the sort.
        let s = store(&[(3, 0), (1, 0), (3, 0), (2, 0), (1, 0)]);
        let values = [10, 1, 20, 5, 2];
        let (keys, sums) = s.reduce_by_key(false, &values);
        assert_eq!(keys, vec![1, 2, 3]);
        assert_eq!(sums, vec![3, 5, 30]);
    }

    #[test]
    fn reduce_by_key_on_q_column() {
        let s = store(&[(0, 7), (0, 7), (0, 4)]);
        let values = [1, -1, 3];
        let (keys, sums) = s.reduce_by_key(true, &values);
        assert_eq!(keys, vec![4, 7]);
        assert_eq!(sums, vec![3, 0]);
    }
}
