//! Bounding-volume hierarchy for broad-phase collision detection.
//!
//! A linear BVH built as a binary radix tree over Morton-sorted leaf
//! boxes (Karras 2012). Leaves and internal nodes share one index
//! space: leaf `i` is node `2i`, internal `i` is node `2i + 1`, and the
//! root is node 1. The tree structure is derived entirely from the
//! Morton codes; only box refitting touches geometry, so the hierarchy
//! can be rebuilt cheaply after vertex motion.

use crate::error::{CsgError, CsgResult};
use crate::sparse::SparseIndices;
use mesh_types::{Aabb, Point3};
use tracing::debug;

/// Root node index.
const K_ROOT: usize = 1;

// Exponential search parameters for radix-tree range finding.
const K_INITIAL_LENGTH: i64 = 128;
const K_LENGTH_MULTIPLE: i64 = 4;

const fn leaf_to_node(leaf: usize) -> usize {
    leaf * 2
}

const fn internal_to_node(internal: usize) -> usize {
    internal * 2 + 1
}

const fn node_to_leaf(node: usize) -> usize {
    node / 2
}

const fn node_to_internal(node: usize) -> usize {
    (node - 1) / 2
}

const fn is_leaf(node: usize) -> bool {
    node % 2 == 0
}

const fn is_internal(node: usize) -> bool {
    node % 2 == 1
}

/// Anything that can be tested against a node's bounding box.
pub trait QueryOverlap {
    /// Does this query overlap the given box?
    fn overlaps(&self, bbox: &Aabb) -> bool;
}

impl QueryOverlap for Aabb {
    fn overlaps(&self, bbox: &Aabb) -> bool {
        self.intersects(bbox)
    }
}

/// Points query the XY projection of a box only. This is what the
/// winding-number kernel needs: a vertical ray from the point either
/// hits the triangle in the box or it does not, regardless of z.
impl QueryOverlap for Point3<f64> {
    fn overlaps(&self, bbox: &Aabb) -> bool {
        bbox.min.x <= self.x && bbox.max.x >= self.x && bbox.min.y <= self.y && bbox.max.y >= self.y
    }
}

/// BVH collider over a Morton-sorted set of leaf boxes.
#[derive(Debug, Clone)]
pub struct Collider {
    node_bbox: Vec<Aabb>,
    node_parent: Vec<i32>,
    internal_children: Vec<[i32; 2]>,
}

impl Collider {
    /// Build a collider from leaf boxes and their Morton codes.
    ///
    /// The inputs must already be sorted by increasing Morton code and
    /// contain no removed elements.
    ///
    /// # Errors
    ///
    /// Returns [`CsgError::InvalidInput`] on mismatched or empty input
    /// slices, and [`CsgError::InvariantViolation`] if the constructed
    /// radix tree has incomplete parent links.
    pub fn build(leaf_bbox: &[Aabb], leaf_morton: &[u32]) -> CsgResult<Self> {
        if leaf_bbox.len() != leaf_morton.len() {
            return Err(CsgError::invalid_input(
                "leaf boxes and Morton codes must have the same length",
            ));
        }
        if leaf_bbox.is_empty() {
            return Err(CsgError::invalid_input("collider requires at least one leaf"));
        }

        let num_leaves = leaf_bbox.len();
        let num_nodes = 2 * num_leaves - 1;
        debug!(num_leaves, num_nodes, "building collider");

        let mut node_parent = vec![-1_i32; num_nodes];
        let mut internal_children = vec![[-1_i32; 2]; num_leaves - 1];

        for internal in 0..internal_children.len() {
            build_radix_node(internal, &mut node_parent, &mut internal_children, leaf_morton);
        }

        if num_leaves > 1 {
            for (node, &parent) in node_parent.iter().enumerate() {
                if node != K_ROOT && parent < 0 {
                    return Err(CsgError::invariant(format!(
                        "radix tree node {node} has no parent"
                    )));
                }
            }
        }

        let mut collider = Self {
            node_bbox: vec![Aabb::empty(); num_nodes],
            node_parent,
            internal_children,
        };
        collider.update_boxes(leaf_bbox)?;
        Ok(collider)
    }

    /// Refit all internal boxes from new leaf boxes without changing
    /// the hierarchy.
    ///
    /// # Errors
    ///
    /// Returns [`CsgError::InvalidInput`] when the number of boxes
    /// differs from the leaf count the collider was built with.
    pub fn update_boxes(&mut self, leaf_bbox: &[Aabb]) -> CsgResult<()> {
        if leaf_bbox.len() != self.num_leaves() {
            return Err(CsgError::invalid_input(
                "must have the same number of updated boxes as leaves",
            ));
        }

        for (leaf, bbox) in leaf_bbox.iter().enumerate() {
            self.node_bbox[leaf_to_node(leaf)] = *bbox;
        }

        if self.internal_children.is_empty() {
            return Ok(());
        }

        // Each internal box is written by the second of its two
        // children to arrive, so every path to the root is walked
        // exactly once in total.
        let mut counter = vec![0_u32; self.num_internal()];
        for leaf in 0..self.num_leaves() {
            self.build_internal_boxes(leaf, &mut counter);
        }
        Ok(())
    }

    fn build_internal_boxes(&mut self, leaf: usize, counter: &mut [u32]) {
        let mut node = leaf_to_node(leaf);
        loop {
            node = self.node_parent[node] as usize;
            let internal = node_to_internal(node);
            counter[internal] += 1;
            if counter[internal] == 1 {
                return;
            }
            let [child1, child2] = self.internal_children[internal];
            self.node_bbox[node] =
                self.node_bbox[child1 as usize].union(&self.node_bbox[child2 as usize]);
            if node == K_ROOT {
                return;
            }
        }
    }

    /// Find all query/leaf overlaps.
    ///
    /// Returns a sparse pair list with p = query index and q = leaf
    /// index. When the query slice is the leaf set itself, pass
    /// `self_collision = true` to suppress the trivial (i, i) pairs.
    #[must_use]
    pub fn collisions<Q: QueryOverlap>(&self, queries: &[Q], self_collision: bool) -> SparseIndices {
        // Two passes: count per query, exclusive-scan into offsets,
        // then fill. Avoids growing allocations in the traversal.
        let mut counts = vec![0_usize; queries.len() + 1];
        for (query_idx, query) in queries.iter().enumerate() {
            self.for_each_collision(query, |leaf| {
                if !self_collision || leaf != query_idx {
                    counts[query_idx] += 1;
                }
            });
        }

        let mut sum = 0_usize;
        for count in &mut counts {
            let c = *count;
            *count = sum;
            sum += c;
        }

        let mut out = SparseIndices::zeroed(sum);
        #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
        for (query_idx, query) in queries.iter().enumerate() {
            if counts[query_idx] == counts[query_idx + 1] {
                continue;
            }
            let mut cursor = counts[query_idx];
            self.for_each_collision(query, |leaf| {
                if !self_collision || leaf != query_idx {
                    out.set(cursor, query_idx as i32, leaf as i32);
                    cursor += 1;
                }
            });
        }
        out
    }

    fn for_each_collision<Q: QueryOverlap>(&self, query: &Q, mut record: impl FnMut(usize)) {
        if self.internal_children.is_empty() {
            // Single-leaf tree: the lone leaf is the whole hierarchy.
            if query.overlaps(&self.node_bbox[0]) {
                record(0);
            }
            return;
        }

        // The stack cannot overflow: tree depth is bounded by 30
        // Morton bits plus 32 index-disambiguation bits.
        let mut stack = [0_usize; 64];
        let mut top: i32 = -1;
        let mut node = K_ROOT;

        loop {
            let internal = node_to_internal(node);
            let child1 = self.internal_children[internal][0] as usize;
            let child2 = self.internal_children[internal][1] as usize;

            let traverse1 = self.visit(child1, query, &mut record);
            let traverse2 = self.visit(child2, query, &mut record);

            if !traverse1 && !traverse2 {
                if top < 0 {
                    break;
                }
                node = stack[top as usize];
                top -= 1;
            } else {
                node = if traverse1 { child1 } else { child2 };
                if traverse1 && traverse2 {
                    top += 1;
                    stack[top as usize] = child2;
                }
            }
        }
    }

    /// Test one node; record it if it is an overlapping leaf. Returns
    /// whether traversal should descend into the node.
    fn visit<Q: QueryOverlap>(
        &self,
        node: usize,
        query: &Q,
        record: &mut impl FnMut(usize),
    ) -> bool {
        let overlaps = query.overlaps(&self.node_bbox[node]);
        if overlaps && is_leaf(node) {
            record(node_to_leaf(node));
        }
        overlaps && is_internal(node)
    }

    fn num_internal(&self) -> usize {
        self.internal_children.len()
    }

    fn num_leaves(&self) -> usize {
        self.internal_children.len() + 1
    }
}

/// Determine the children of one internal radix-tree node from the
/// Morton codes alone (Karras 2012). Equal codes are disambiguated by
/// their leaf index, which keeps every key distinct.
fn build_radix_node(
    internal: usize,
    node_parent: &mut [i32],
    internal_children: &mut [[i32; 2]],
    leaf_morton: &[u32],
) {
    let n = leaf_morton.len() as i64;

    // Number of identical highest-order bits between leaf keys i and j,
    // or -1 when j is out of range.
    let prefix_length = |i: i64, j: i64| -> i64 {
        if j < 0 || j >= n {
            return -1;
        }
        #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
        let (mi, mj) = (leaf_morton[i as usize], leaf_morton[j as usize]);
        #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
        let xor = if mi == mj {
            (i as u32) ^ (j as u32)
        } else {
            mi ^ mj
        };
        i64::from(xor.leading_zeros())
    };

    let range_end = |i: i64| -> i64 {
        // Direction of the range (+1 or -1).
        let d = prefix_length(i, i + 1) - prefix_length(i, i - 1);
        let dir: i64 = if d > 0 { 1 } else { -1 };

        // Conservative upper bound via exponential increase.
        let common_prefix = prefix_length(i, i - dir);
        let mut max_length = K_INITIAL_LENGTH;
        while prefix_length(i, i + dir * max_length) > common_prefix {
            max_length *= K_LENGTH_MULTIPLE;
        }

        // Exact length via binary search.
        let mut length = 0_i64;
        let mut step = max_length / 2;
        while step >= 1 {
            if prefix_length(i, i + dir * (length + step)) > common_prefix {
                length += step;
            }
            step /= 2;
        }
        i + dir * length
    };

    let find_split = |first: i64, last: i64| -> i64 {
        let common_prefix = prefix_length(first, last);

        // Furthest leaf sharing more than common_prefix bits with the
        // first one, by binary search.
        let mut split = first;
        let mut step = last - first;
        loop {
            step = (step + 1) >> 1;
            let new_split = split + step;
            if new_split < last && prefix_length(first, new_split) > common_prefix {
                split = new_split;
            }
            if step <= 1 {
                break;
            }
        }
        split
    };

    let mut first = internal as i64;
    let mut last = range_end(first);
    if first > last {
        std::mem::swap(&mut first, &mut last);
    }

    let mut split = find_split(first, last);
    #[allow(clippy::cast_sign_loss)]
    let child1 = if split == first {
        leaf_to_node(split as usize)
    } else {
        internal_to_node(split as usize)
    };
    split += 1;
    #[allow(clippy::cast_sign_loss)]
    let child2 = if split == last {
        leaf_to_node(split as usize)
    } else {
        internal_to_node(split as usize)
    };

    #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
    {
        internal_children[internal] = [child1 as i32, child2 as i32];
        let node = internal_to_node(internal) as i32;
        node_parent[child1] = node;
        node_parent[child2] = node;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
mod tests {
    use super::*;
    use crate::morton::morton_code;

    /// Unit boxes at the corners of a 4x4x4 cube, Morton sorted.
    fn corner_leaves() -> Vec<Aabb> {
        let mut boxes = Vec::new();
        for z in [0.0, 3.0] {
            for y in [0.0, 3.0] {
                for x in [0.0, 3.0] {
                    boxes.push(Aabb::new(
                        Point3::new(x, y, z),
                        Point3::new(x + 1.0, y + 1.0, z + 1.0),
                    ));
                }
            }
        }
        let total = boxes
            .iter()
            .fold(Aabb::empty(), |acc, b| acc.union(b));
        boxes.sort_by_key(|b| morton_code(&b.center(), &total));
        boxes
    }

    #[test]
    fn self_collision_suppressed() {
        let leaves = corner_leaves();
        let mortons: Vec<u32> = {
            let total = leaves.iter().fold(Aabb::empty(), |acc, b| acc.union(b));
            leaves.iter().map(|b| morton_code(&b.center(), &total)).collect()
        };
        let collider = Collider::build(&leaves, &mortons).unwrap();

        let pairs = collider.collisions(&leaves, true);
        for i in 0..pairs.len() {
            let (p, q) = pairs.get(i);
            assert_ne!(p, q, "self pair reported");
        }
    }

    #[test]
    fn reported_pairs_actually_overlap() {
        let leaves = corner_leaves();
        let total = leaves.iter().fold(Aabb::empty(), |acc, b| acc.union(b));
        let mortons: Vec<u32> = leaves.iter().map(|b| morton_code(&b.center(), &total)).collect();
        let collider = Collider::build(&leaves, &mortons).unwrap();

        let query = Aabb::new(Point3::new(-0.5, -0.5, -0.5), Point3::new(0.5, 0.5, 0.5));
        let pairs = collider.collisions(std::slice::from_ref(&query), false);
        assert!(!pairs.is_empty());
        for i in 0..pairs.len() {
            let (p, q) = pairs.get(i);
            assert_eq!(p, 0);
            assert!(query.intersects(&leaves[q as usize]));
        }
    }

    #[test]
    fn disjoint_query_finds_nothing() {
        let leaves = corner_leaves();
        let total = leaves.iter().fold(Aabb::empty(), |acc, b| acc.union(b));
        let mortons: Vec<u32> = leaves.iter().map(|b| morton_code(&b.center(), &total)).collect();
        let collider = Collider::build(&leaves, &mortons).unwrap();

        let query = Aabb::new(Point3::new(50.0, 50.0, 50.0), Point3::new(51.0, 51.0, 51.0));
        let pairs = collider.collisions(std::slice::from_ref(&query), false);
        assert!(pairs.is_empty());
    }

    #[test]
    fn enclosing_query_finds_all_leaves() {
        let leaves = corner_leaves();
        let total = leaves.iter().fold(Aabb::empty(), |acc, b| acc.union(b));
        let mortons: Vec<u32> = leaves.iter().map(|b| morton_code(&b.center(), &total)).collect();
        let collider = Collider::build(&leaves, &mortons).unwrap();

        let pairs = collider.collisions(std::slice::from_ref(&total), false);
        assert_eq!(pairs.len(), leaves.len());
    }

    #[test]
    fn point_query_uses_xy_projection() {
        let leaves = corner_leaves();
        let total = leaves.iter().fold(Aabb::empty(), |acc, b| acc.union(b));
        let mortons: Vec<u32> = leaves.iter().map(|b| morton_code(&b.center(), &total)).collect();
        let collider = Collider::build(&leaves, &mortons).unwrap();

        // Far above every box, but inside the XY extent of the corner
        // column: both z-layers of that corner must report.
        let point = Point3::new(0.5, 0.5, 100.0);
        let pairs = collider.collisions(std::slice::from_ref(&point), false);
        assert_eq!(pairs.len(), 2);
    }

    #[test]
    fn single_leaf_tree() {
        let leaf = Aabb::new(Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 1.0, 1.0));
        let collider = Collider::build(&[leaf], &[0]).unwrap();

        let hit = Aabb::new(Point3::new(0.5, 0.5, 0.5), Point3::new(2.0, 2.0, 2.0));
        let miss = Aabb::new(Point3::new(5.0, 5.0, 5.0), Point3::new(6.0, 6.0, 6.0));
        assert_eq!(collider.collisions(std::slice::from_ref(&hit), false).len(), 1);
        assert!(collider.collisions(std::slice::from_ref(&miss), false).is_empty());
    }

    #[test]
    fn mismatched_input_rejected() {
        let leaf = Aabb::new(Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 1.0, 1.0));
        assert!(Collider::build(&[leaf], &[0, 1]).is_err());
        assert!(Collider::build(&[], &[]).is_err());
    }

    #[test]
    fn equal_morton_codes_still_build() {
        // Coincident boxes give identical codes; index disambiguation
        // must keep the tree well formed.
        let leaf = Aabb::new(Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 1.0, 1.0));
        let leaves = vec![leaf; 5];
        let mortons = vec![7_u32; 5];
        let collider = Collider::build(&leaves, &mortons).unwrap();

        let pairs = collider.collisions(std::slice::from_ref(&leaf), false);
        assert_eq!(pairs.len(), 5);
    }
}
