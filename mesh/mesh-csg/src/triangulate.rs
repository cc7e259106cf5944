//! Sweep-line polygon triangulation.
//!
//! Triangulates a set of epsilon-valid 2D polygons (outer loops CCW,
//! holes CW). The forward sweep orders the vertices and resolves
//! east-west degeneracies between active edges; the backward sweep
//! splits the polygons into monotone pieces using only the topology the
//! forward sweep recorded; each monotone piece is then fanned into
//! triangles along its reflex chain. Non-epsilon-valid input may
//! produce overlapping triangles, but the result still matches the
//! input edge directions.
//!
//! Vertices and edge pairs live in index arenas; `NONE` stands in for
//! a missing link.

use crate::error::{CsgError, CsgResult};
use crate::geom::ccw;
use nalgebra::Vector2;

const NONE: usize = usize::MAX;

/// Relative tolerance applied when the caller does not supply one.
const K_TOLERANCE: f64 = 1e-12;

/// One projected polygon vertex with its index into the mesh.
#[derive(Debug, Clone, Copy)]
pub(crate) struct PolyVert {
    pub pos: Vector2<f64>,
    pub idx: i32,
}

/// Triangulate polygons, returning triangles of original mesh indices.
///
/// # Errors
///
/// Returns [`CsgError::GeometryInvalid`] when the polygons are not
/// epsilon-valid and [`CsgError::InvariantViolation`] if the sweep
/// state becomes inconsistent.
pub(crate) fn triangulate_idx(
    polys: &[Vec<PolyVert>],
    precision: f64,
) -> CsgResult<Vec<[i32; 3]>> {
    let mut monotones = Monotones::new(polys, precision)?;
    monotones.triangulate()
}

/// Doubly linked polygon vertex. `index` doubles as the processed flag:
/// negative means processed, -2 means permanently skipped.
#[derive(Debug, Clone, Copy)]
struct VertAdj {
    pos: Vector2<f64>,
    mesh_idx: i32,
    index: i32,
    left: usize,
    right: usize,
    east_pair: usize,
    west_pair: usize,
}

/// The two active edges of a monotone polygon under construction. The
/// sweep line runs South to North; the West edge is the backwards edge
/// and the East edge forwards. The certainty flags record whether the
/// pair's position in the active list is known to be geometrically
/// correct, or still provisional because of degeneracy.
#[derive(Debug, Clone, Copy)]
struct EdgePair {
    v_west: usize,
    v_east: usize,
    v_merge: usize,
    next_pair: usize,
    west_certain: bool,
    east_certain: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VertType {
    Start,
    WestSide,
    EastSide,
    Merge,
    End,
    Skip,
}

struct Monotones {
    verts: Vec<VertAdj>,
    /// Sweep-line ordering of vertex ids.
    order: Vec<usize>,
    pairs: Vec<EdgePair>,
    /// West to east ordering of active pair ids.
    active_pairs: Vec<usize>,
    /// Completed monotones, awaiting the backward sweep.
    inactive_pairs: Vec<usize>,
    precision: f64,
}

impl Monotones {
    fn new(polys: &[Vec<PolyVert>], precision: f64) -> CsgResult<Self> {
        let mut m = Self {
            verts: Vec::new(),
            order: Vec::new(),
            pairs: Vec::new(),
            active_pairs: Vec::new(),
            inactive_pairs: Vec::new(),
            precision,
        };

        let mut bound = 0.0_f64;
        for poly in polys {
            let mut start = NONE;
            let mut last = NONE;
            for (i, point) in poly.iter().enumerate() {
                let current = m.verts.len();
                m.verts.push(VertAdj {
                    pos: point.pos,
                    mesh_idx: point.idx,
                    index: 0,
                    left: NONE,
                    right: NONE,
                    east_pair: NONE,
                    west_pair: NONE,
                });
                m.order.push(current);
                bound = bound.max(point.pos.x.abs()).max(point.pos.y.abs());

                if i == 0 {
                    start = current;
                } else {
                    m.link(last, current);
                }
                last = current;
            }
            if last != NONE {
                m.link(last, start);
            }
        }

        if m.precision < 0.0 {
            m.precision = bound * K_TOLERANCE;
        }

        m.sweep_forward()?;
        m.sweep_back()?;
        Ok(m)
    }

    /// Fan each monotone polygon into triangles by walking its two
    /// chains in sweep-line order.
    #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
    fn triangulate(&mut self) -> CsgResult<Vec<[i32; 3]>> {
        let mut triangles = Vec::new();
        if self.order.is_empty() {
            return Ok(triangles);
        }

        // Save the sweep-line order in the vert for chain comparisons.
        for i in 0..self.order.len() {
            let v = self.order[i];
            self.verts[v].index = i as i32 + 1;
        }

        let mut triangles_left = self.order.len() as i64;
        let mut start = Some(self.order[0]);
        while let Some(s) = start {
            let mut triangulator = Triangulator::new(s, self.precision);
            self.set_processed(s, true);
            let mut v_r = self.verts[s].right;
            let mut v_l = self.verts[s].left;
            while v_r != v_l {
                // Process whichever neighbor is next in the sweep.
                if self.verts[v_r].index < self.verts[v_l].index {
                    triangulator.process_vert(&self.verts, v_r, true, false, &mut triangles);
                    self.set_processed(v_r, true);
                    v_r = self.verts[v_r].right;
                } else {
                    triangulator.process_vert(&self.verts, v_l, false, false, &mut triangles);
                    self.set_processed(v_l, true);
                    v_l = self.verts[v_l].left;
                }
            }
            triangulator.process_vert(&self.verts, v_r, true, true, &mut triangles);
            self.set_processed(v_r, true);

            if triangulator.triangles_output == 0 {
                return Err(CsgError::invariant("monotone produced no triangles"));
            }
            triangles_left -= 2 + triangulator.triangles_output as i64;
            start = self.order.iter().copied().find(|&v| !self.processed(v));
        }
        if triangles_left != 0 {
            return Err(CsgError::invariant(
                "triangulation produced the wrong number of triangles",
            ));
        }
        Ok(triangles)
    }

    fn link(&mut self, left: usize, right: usize) {
        self.verts[left].right = right;
        self.verts[right].left = left;
    }

    fn processed(&self, vert: usize) -> bool {
        self.verts[vert].index < 0
    }

    fn set_processed(&mut self, vert: usize, processed: bool) {
        if self.verts[vert].index == -2 {
            return;
        }
        self.verts[vert].index = if processed { -1 } else { 0 };
    }

    fn is_start(&self, vert: usize) -> bool {
        let pos = self.verts[vert].pos;
        let left = self.verts[self.verts[vert].left].pos;
        let right = self.verts[self.verts[vert].right].pos;
        (left.y >= pos.y && right.y > pos.y)
            || (left.y == pos.y && right.y == pos.y && left.x <= pos.x && right.x < pos.x)
    }

    fn is_past(&self, vert: usize, other: usize) -> bool {
        self.verts[vert].pos.y > self.verts[other].pos.y + self.precision
    }

    fn coincident(&self, p0: Vector2<f64>, p1: Vector2<f64>) -> bool {
        let sep = p0 - p1;
        sep.dot(&sep) < self.precision * self.precision
    }

    fn set_v_west(&mut self, pair: usize, vert: usize) {
        self.pairs[pair].v_west = vert;
        self.verts[vert].east_pair = pair;
    }

    fn set_v_east(&mut self, pair: usize, vert: usize) {
        self.pairs[pair].v_east = vert;
        self.verts[vert].west_pair = pair;
    }

    fn set_east_certainty(&mut self, west_pair: usize, next_west_pair: usize, certain: bool) {
        self.pairs[west_pair].east_certain = certain;
        self.pairs[next_west_pair].west_certain = certain;
    }

    /// The pair a vert of the given type belongs to; for a merge this
    /// is the west pair, which is the one that gets removed.
    fn get_pair(&self, vert: usize, vert_type: VertType) -> usize {
        if vert_type == VertType::WestSide {
            self.verts[vert].east_pair
        } else {
            self.verts[vert].west_pair
        }
    }

    /// How far west of the pair's east edge the vert lies; falls back
    /// to the vert's unprocessed neighbors to break ties.
    fn west_of(&self, pair: usize, vert: usize) -> i32 {
        let v_east = self.pairs[pair].v_east;
        let e_right = self.verts[v_east].right;
        let mut west_of = ccw(
            self.verts[e_right].pos,
            self.verts[v_east].pos,
            self.verts[vert].pos,
            self.precision,
        );
        let right = self.verts[vert].right;
        if west_of == 0 && !self.processed(right) {
            west_of = ccw(
                self.verts[e_right].pos,
                self.verts[v_east].pos,
                self.verts[right].pos,
                self.precision,
            );
        }
        let left = self.verts[vert].left;
        if west_of == 0 && !self.processed(left) {
            west_of = ccw(
                self.verts[e_right].pos,
                self.verts[v_east].pos,
                self.verts[left].pos,
                self.precision,
            );
        }
        west_of
    }

    fn east_of(&self, pair: usize, vert: usize) -> i32 {
        let v_west = self.pairs[pair].v_west;
        let w_left = self.verts[v_west].left;
        let mut east_of = ccw(
            self.verts[v_west].pos,
            self.verts[w_left].pos,
            self.verts[vert].pos,
            self.precision,
        );
        let right = self.verts[vert].right;
        if east_of == 0 && !self.processed(right) {
            east_of = ccw(
                self.verts[v_west].pos,
                self.verts[w_left].pos,
                self.verts[right].pos,
                self.precision,
            );
        }
        let left = self.verts[vert].left;
        if east_of == 0 && !self.processed(left) {
            east_of = ccw(
                self.verts[v_west].pos,
                self.verts[w_left].pos,
                self.verts[left].pos,
                self.precision,
            );
        }
        east_of
    }

    fn close_end(&mut self, vert: usize) -> CsgResult<()> {
        let east_pair = self.verts[self.verts[vert].right].east_pair;
        let west_pair = self.verts[self.verts[vert].left].west_pair;
        if east_pair == NONE || west_pair == NONE {
            return Err(CsgError::invariant("closing a vert with no active pair"));
        }
        self.set_v_west(east_pair, vert);
        self.set_v_east(west_pair, vert);
        self.pairs[west_pair].west_certain = true;
        self.pairs[east_pair].east_certain = true;
        Ok(())
    }

    /// Classify a vert relative to the sweep line. Shared by both
    /// sweeps; only the bookkeeping around it differs.
    #[allow(clippy::cast_possible_wrap)]
    fn process_vert(&mut self, vert: usize) -> CsgResult<VertType> {
        let right = self.verts[vert].right;
        let left = self.verts[vert].left;
        let east_pair = self.verts[right].east_pair;
        let west_pair = self.verts[left].west_pair;

        if self.processed(right) {
            if self.processed(left) {
                let west_index = self
                    .active_pairs
                    .iter()
                    .position(|&p| p == west_pair)
                    .map_or(-1_isize, |i| i as isize);
                if west_pair == east_pair {
                    // Facing in.
                    self.close_end(vert)?;
                    Ok(VertType::End)
                } else if west_index != self.active_pairs.len() as isize - 1
                    && self
                        .active_pairs
                        .get((west_index + 1) as usize)
                        .is_some_and(|&p| p == east_pair)
                {
                    // Facing out: west pair is removed, east takes over.
                    self.close_end(vert)?;
                    if west_pair == NONE {
                        return Err(CsgError::invariant("merging a vert with no west pair"));
                    }
                    let v_west = self.pairs[west_pair].v_west;
                    self.set_v_west(east_pair, v_west);
                    Ok(VertType::Merge)
                } else {
                    // Not neighbors yet.
                    Ok(VertType::Skip)
                }
            } else {
                if east_pair == NONE {
                    return Err(CsgError::invariant("west-side vert with no east pair"));
                }
                let v_east = self.pairs[east_pair].v_east;
                let e_right = self.verts[v_east].right;
                if !self.is_past(vert, right)
                    && !self.is_past(e_right, vert)
                    && self.is_past(vert, v_east)
                    && self.verts[vert].pos.x > self.verts[e_right].pos.x + self.precision
                {
                    return Ok(VertType::Skip);
                }
                self.set_v_west(east_pair, vert);
                Ok(VertType::WestSide)
            }
        } else if self.processed(left) {
            if west_pair == NONE {
                return Err(CsgError::invariant("east-side vert with no west pair"));
            }
            let v_west = self.pairs[west_pair].v_west;
            let w_left = self.verts[v_west].left;
            if !self.is_past(vert, left)
                && !self.is_past(w_left, vert)
                && self.is_past(vert, v_west)
                && self.verts[vert].pos.x < self.verts[w_left].pos.x - self.precision
            {
                return Ok(VertType::Skip);
            }
            self.set_v_east(west_pair, vert);
            Ok(VertType::EastSide)
        } else {
            Ok(VertType::Start)
        }
    }

    /// Forward sweep, South to North: orders the verts, creates and
    /// retires edge pairs, and resolves degenerate east-west orderings
    /// by deferring uncertain verts. The polygon links are not changed.
    #[allow(clippy::too_many_lines)]
    fn sweep_forward(&mut self) -> CsgResult<()> {
        // Sorted by descending y so the southernmost vert pops last.
        let mut starts: Vec<usize> = self
            .order
            .iter()
            .copied()
            .filter(|&v| self.is_start(v))
            .collect();
        starts.sort_by(|&a, &b| self.verts[b].pos.y.total_cmp(&self.verts[a].pos.y));

        let mut next_attached: Vec<usize> = Vec::new();
        let mut skipped: Vec<usize> = Vec::new();
        let mut insert_at = 0_usize;

        while insert_at < self.order.len() {
            // Fallback for degenerate polygons that have no starts.
            let mut vert = self.order[insert_at];

            next_attached.sort_by(|&a, &b| self.verts[b].pos.y.total_cmp(&self.verts[a].pos.y));

            let next_is_attached = match (next_attached.last(), starts.last()) {
                (Some(&attached), Some(&start)) => !self.is_past(attached, start),
                (Some(_), None) => true,
                (None, _) => false,
            };
            if next_is_attached {
                // Prefer neighbors, which may process starts without
                // needing a new pair.
                vert = next_attached.pop().ok_or_else(|| {
                    CsgError::invariant("attached queue emptied unexpectedly")
                })?;
            } else if let Some(start) = starts.pop() {
                vert = start;
            } else {
                insert_at += 1;
            }

            if self.processed(vert) {
                continue;
            }

            if let Some(&last_skipped) = skipped.last() {
                if self.is_past(vert, last_skipped) {
                    return Err(CsgError::geometry(
                        "polygons not epsilon-valid: skipped verts never became valid",
                    ));
                }
            }

            let mut vert_type = self.process_vert(vert)?;

            let mut new_pair = None;
            let mut is_hole = false;
            if vert_type == VertType::Start {
                let pair = self.pairs.len();
                self.pairs.push(EdgePair {
                    v_west: vert,
                    v_east: vert,
                    v_merge: NONE,
                    next_pair: NONE,
                    west_certain: false,
                    east_certain: false,
                });
                self.active_pairs.insert(0, pair);
                self.set_v_west(pair, vert);
                self.set_v_east(pair, vert);
                new_pair = Some(pair);

                let hole = self.is_hole(vert);
                if hole == 0 && self.is_colinear_poly(vert) {
                    // Fully degenerate: triangulate it as if monotone.
                    self.skip_poly(vert);
                    self.active_pairs.remove(0);
                    continue;
                }
                is_hole = hole > 0;
            }

            let pair = if vert_type == VertType::Skip {
                NONE
            } else {
                self.get_pair(vert, vert_type)
            };
            if vert_type != VertType::Skip && pair == NONE {
                return Err(CsgError::invariant("no active pair"));
            }

            if vert_type != VertType::Skip && self.shift_east(vert, pair, is_hole) {
                vert_type = VertType::Skip;
            }
            if vert_type != VertType::Skip && self.shift_west(vert, pair, is_hole) {
                vert_type = VertType::Skip;
            }

            if vert_type == VertType::Skip {
                if insert_at >= self.order.len() {
                    return Err(CsgError::geometry(
                        "polygons not epsilon-valid: tried to skip final vert",
                    ));
                }
                if next_attached.is_empty() && starts.is_empty() {
                    return Err(CsgError::geometry(
                        "polygons not epsilon-valid: tried to skip last queued vert",
                    ));
                }
                skipped.push(vert);
                if let Some(created) = new_pair {
                    if let Some(i) = self.active_pairs.iter().position(|&p| p == created) {
                        self.active_pairs.remove(i);
                    }
                    self.verts[vert].west_pair = NONE;
                    self.verts[vert].east_pair = NONE;
                }
                continue;
            }

            if self.order[insert_at] == vert {
                insert_at += 1;
            } else {
                // Move the vert into sweep position.
                let pos = self
                    .order
                    .iter()
                    .position(|&v| v == vert)
                    .ok_or_else(|| CsgError::invariant("vert missing from sweep order"))?;
                self.order.remove(pos);
                self.order.insert(insert_at, vert);
                insert_at += 1;
            }

            match vert_type {
                VertType::WestSide => next_attached.insert(0, self.verts[vert].left),
                VertType::EastSide => next_attached.insert(0, self.verts[vert].right),
                VertType::Start => {
                    next_attached.insert(0, self.verts[vert].left);
                    next_attached.insert(0, self.verts[vert].right);
                }
                VertType::Merge => {
                    // Remember the merge for the backward sweep.
                    self.pairs[pair].v_merge = vert;
                    self.remove_pair(pair)?;
                }
                VertType::End => self.remove_pair(pair)?,
                VertType::Skip => {}
            }

            self.set_processed(vert, true);

            while let Some(v) = skipped.pop() {
                starts.push(v);
            }
        }
        Ok(())
    }

    /// Backward sweep: splits the polygons into monotone pieces using
    /// the pair ordering and merge verts the forward sweep recorded,
    /// without a single geometric test. The polygon is considered
    /// rotated, so pairs are still west to east, now in the opposite
    /// order from the forward sweep.
    #[allow(clippy::too_many_lines)]
    fn sweep_back(&mut self) -> CsgResult<()> {
        for i in 0..self.verts.len() {
            self.set_processed(i, false);
        }

        let mut vert_index = self.order.len();
        while vert_index > 0 {
            vert_index -= 1;
            let mut vert = self.order[vert_index];
            if self.processed(vert) {
                continue;
            }

            let vert_type = self.process_vert(vert)?;
            if vert_type == VertType::Skip {
                return Err(CsgError::invariant("skip during backward sweep"));
            }

            let west_pair = self.get_pair(vert, vert_type);
            if vert_type != VertType::Start && west_pair == NONE {
                return Err(CsgError::invariant("no active pair"));
            }

            match vert_type {
                VertType::Merge => {
                    let west_index = self
                        .active_pairs
                        .iter()
                        .position(|&p| p == west_pair)
                        .ok_or_else(|| CsgError::invariant("merge pair not active"))?;
                    let east_pair = *self
                        .active_pairs
                        .get(west_index + 1)
                        .ok_or_else(|| CsgError::invariant("merge pair has no east neighbor"))?;
                    if self.pairs[east_pair].v_merge != NONE {
                        let merge = self.pairs[east_pair].v_merge;
                        vert = self.split_verts(vert, merge)?;
                        vert_index = self
                            .order
                            .iter()
                            .position(|&v| v == vert)
                            .ok_or_else(|| CsgError::invariant("split vert lost"))?;
                    }
                    self.pairs[east_pair].v_merge = vert;
                    self.remove_pair(west_pair)?;
                    self.split_pending_merge(vert, west_pair, vert_type)?;
                }
                VertType::End => {
                    self.remove_pair(west_pair)?;
                    self.split_pending_merge(vert, west_pair, vert_type)?;
                }
                VertType::WestSide | VertType::EastSide => {
                    self.split_pending_merge(vert, west_pair, vert_type)?;
                }
                VertType::Start => {
                    // East and west are swapped in this sweep, and the
                    // recorded next pair is now the previous one.
                    let east_pair = west_pair;
                    let west_pair = self.pairs[east_pair].next_pair;
                    let west_index = self.active_pairs.iter().position(|&p| p == west_pair);

                    let inactive_index = self
                        .inactive_pairs
                        .iter()
                        .position(|&p| p == east_pair)
                        .ok_or_else(|| CsgError::invariant("start pair not inactive"))?;
                    self.inactive_pairs.remove(inactive_index);
                    match west_index {
                        Some(i) => self.active_pairs.insert(i + 1, east_pair),
                        None => self.active_pairs.insert(0, east_pair),
                    }

                    if self.pairs[east_pair].v_merge == vert {
                        // Hole: connect it to the surrounding pair.
                        if west_pair == NONE {
                            return Err(CsgError::invariant("hole with no surrounding pair"));
                        }
                        let split = if self.pairs[west_pair].v_merge != NONE {
                            self.pairs[west_pair].v_merge
                        } else if self.verts[self.pairs[west_pair].v_west].pos.y
                            < self.verts[self.pairs[west_pair].v_east].pos.y
                        {
                            self.pairs[west_pair].v_west
                        } else {
                            self.pairs[west_pair].v_east
                        };
                        let east_vert = self.split_verts(vert, split)?;
                        vert_index = self
                            .order
                            .iter()
                            .position(|&v| v == vert)
                            .ok_or_else(|| CsgError::invariant("split vert lost"))?;
                        self.pairs[west_pair].v_merge = NONE;
                        self.pairs[east_pair].v_merge = NONE;
                        self.set_v_west(east_pair, east_vert);
                        let new_east = if split == self.pairs[west_pair].v_east {
                            self.verts[east_vert].right
                        } else {
                            self.pairs[west_pair].v_east
                        };
                        self.set_v_east(east_pair, new_east);
                        self.set_v_east(west_pair, vert);
                    } else {
                        self.set_v_west(east_pair, vert);
                        self.set_v_east(east_pair, vert);
                    }
                }
                VertType::Skip => unreachable!(),
            }

            self.set_processed(vert, true);
        }
        Ok(())
    }

    /// Shared tail of the backward-sweep side cases: if the pair has a
    /// pending merge vert, split against it now.
    fn split_pending_merge(
        &mut self,
        vert: usize,
        west_pair: usize,
        vert_type: VertType,
    ) -> CsgResult<()> {
        if self.pairs[west_pair].v_merge != NONE {
            let merge = self.pairs[west_pair].v_merge;
            let east_vert = self.split_verts(vert, merge)?;
            if vert_type == VertType::WestSide {
                self.pairs[west_pair].v_west = east_vert;
            }
            self.pairs[west_pair].v_merge = NONE;
        }
        Ok(())
    }

    /// The only function that changes the polygons themselves: divides
    /// a polygon by connecting two verts, duplicating both and linking
    /// the copies across with two new edges. Returns the duplicate of
    /// `north`.
    fn split_verts(&mut self, north: usize, south: usize) -> CsgResult<usize> {
        let north_index = self
            .order
            .iter()
            .position(|&v| v == north)
            .ok_or_else(|| CsgError::invariant("split north vert not in sweep order"))?;
        let north_east = self.verts.len();
        self.verts.push(self.verts[north]);
        self.order.insert(north_index, north_east);
        let north_left = self.verts[north].left;
        self.link(north_left, north_east);
        self.set_processed(north_east, true);

        let south_index = self
            .order
            .iter()
            .position(|&v| v == south)
            .ok_or_else(|| CsgError::invariant("split south vert not in sweep order"))?;
        let south_east = self.verts.len();
        self.verts.push(self.verts[south]);
        self.order.insert(south_index + 1, south_east);
        let south_right = self.verts[south].right;
        self.link(south_east, south_right);
        self.set_processed(south_east, true);

        self.link(south, north);
        self.link(north_east, south_east);
        Ok(north_east)
    }

    /// Retire a pair, recording its eastern neighbor so the backward
    /// sweep can reinsert it by topology alone.
    fn remove_pair(&mut self, pair: usize) -> CsgResult<()> {
        let index = self
            .active_pairs
            .iter()
            .position(|&p| p == pair)
            .ok_or_else(|| CsgError::invariant("removing a pair that is not active"))?;
        self.pairs[pair].next_pair = self.active_pairs.get(index + 1).copied().unwrap_or(NONE);
        self.active_pairs.remove(index);
        self.inactive_pairs.push(pair);
        Ok(())
    }

    /// Whether a start vert opens a hole (1), a polygon (-1), or a
    /// fully degenerate line (0). Walks outward past coincident and
    /// colinear neighbors until the orientation is certain.
    fn is_hole(&self, vert: usize) -> i32 {
        let mut left = self.verts[vert].left;
        let mut right = self.verts[vert].right;
        let mut center = vert;
        let mut vert = vert;

        while left != right {
            if self.coincident(self.verts[left].pos, self.verts[center].pos) {
                left = self.verts[left].left;
                continue;
            }
            if self.coincident(self.verts[right].pos, self.verts[center].pos) {
                right = self.verts[right].right;
                continue;
            }
            if self.coincident(self.verts[left].pos, self.verts[right].pos) {
                vert = center;
                center = left;
                left = self.verts[left].left;
                if left == right {
                    break;
                }
                right = self.verts[right].right;
                continue;
            }
            let mut is_hole = ccw(
                self.verts[right].pos,
                self.verts[center].pos,
                self.verts[left].pos,
                self.precision,
            );
            if center != vert {
                is_hole += ccw(
                    self.verts[left].pos,
                    self.verts[center].pos,
                    self.verts[vert].pos,
                    self.precision,
                ) + ccw(
                    self.verts[vert].pos,
                    self.verts[center].pos,
                    self.verts[right].pos,
                    self.precision,
                );
            }
            if is_hole != 0 {
                return is_hole;
            }

            let edge_left = self.verts[left].pos - self.verts[center].pos;
            let edge_right = self.verts[right].pos - self.verts[center].pos;
            if edge_left.dot(&edge_right) > 0.0 {
                if edge_left.dot(&edge_left) < edge_right.dot(&edge_right) {
                    center = left;
                    left = self.verts[left].left;
                } else {
                    center = right;
                    right = self.verts[right].right;
                }
            } else if self.verts[left].pos.y < self.verts[right].pos.y {
                left = self.verts[left].left;
            } else {
                right = self.verts[right].right;
            }
        }
        0
    }

    /// Whether the polygon through `start` degenerates to a single
    /// line, in which case any triangulation is admissible.
    fn is_colinear_poly(&self, start: usize) -> bool {
        let mut vert = start;
        let mut left = start;
        let mut right = self.verts[left].right;

        // Use the longest edge as the base to minimize error.
        let mut length2 = 0.0_f64;
        while right != start {
            let edge = self.verts[left].pos - self.verts[right].pos;
            let l2 = edge.dot(&edge);
            if l2 > length2 {
                length2 = l2;
                vert = left;
            }
            left = right;
            right = self.verts[right].right;
        }

        let right = self.verts[vert].right;
        let mut left = self.verts[vert].left;
        while left != vert {
            if ccw(
                self.verts[left].pos,
                self.verts[vert].pos,
                self.verts[right].pos,
                self.precision,
            ) != 0
            {
                return false;
            }
            left = self.verts[left].left;
        }
        true
    }

    /// Mark a whole polygon so both sweeps pass over it; it will be
    /// triangulated as though monotone.
    fn skip_poly(&mut self, vert: usize) {
        self.verts[vert].index = -2;
        let mut right = self.verts[vert].right;
        while right != vert {
            self.verts[right].index = -2;
            right = self.verts[right].right;
        }
    }

    /// A backwards (hole) pair interior to a forwards pair: swap their
    /// east edges so they become proper west/east neighbors.
    fn swap_hole(&mut self, outside: usize, inside: usize) {
        let tmp = self.pairs[outside].v_east;
        let inside_east = self.pairs[inside].v_east;
        self.set_v_east(outside, inside_east);
        self.set_v_east(inside, tmp);
        self.pairs[inside].east_certain = self.pairs[outside].east_certain;

        if let Some(inside_index) = self.active_pairs.iter().position(|&p| p == inside) {
            self.active_pairs.remove(inside_index);
        }
        if let Some(outside_index) = self.active_pairs.iter().position(|&p| p == outside) {
            self.active_pairs.insert(outside_index + 1, inside);
        }
        self.set_east_certainty(outside, inside, true);
    }

    /// If `input_pair`'s eastern ordering is uncertain, use the edge
    /// ahead of `vert` to settle it, shifting the pair eastward or
    /// inverting it into a hole. Returns true when the certainties
    /// conflict and the vert must be skipped for now.
    fn shift_east(&mut self, vert: usize, input_pair: usize, is_hole: bool) -> bool {
        if self.pairs[input_pair].east_certain {
            return false;
        }

        let start = self
            .active_pairs
            .iter()
            .position(|&p| p == input_pair)
            .map_or(self.active_pairs.len(), |i| i + 1);
        let mut potential_index = start;
        while potential_index < self.active_pairs.len() {
            let potential = self.active_pairs[potential_index];
            let east_of = self.east_of(potential, vert);

            // No skip here: shift_west may still succeed.
            if east_of > 0 && is_hole {
                return false;
            }

            if east_of >= 0 && !is_hole {
                // In the right place.
                if let Some(input_index) = self.active_pairs.iter().position(|&p| p == input_pair)
                {
                    self.active_pairs.remove(input_index);
                }
                let insert_index = self
                    .active_pairs
                    .iter()
                    .position(|&p| p == potential)
                    .unwrap_or(self.active_pairs.len());
                self.active_pairs.insert(insert_index, input_pair);
                self.set_east_certainty(input_pair, potential, east_of != 0);
                return false;
            }

            let outside = self.west_of(potential, vert);
            if outside <= 0 && is_hole {
                // Certainly a hole.
                self.swap_hole(potential, input_pair);
                return false;
            }
            potential_index += 1;
        }
        if is_hole {
            return true;
        }

        if let Some(input_index) = self.active_pairs.iter().position(|&p| p == input_pair) {
            self.active_pairs.remove(input_index);
        }
        self.active_pairs.push(input_pair);
        self.pairs[input_pair].east_certain = true;
        false
    }

    /// Mirror of [`Self::shift_east`], searching westward.
    fn shift_west(&mut self, vert: usize, input_pair: usize, is_hole: bool) -> bool {
        if self.pairs[input_pair].west_certain {
            return false;
        }

        let mut potential_index = self
            .active_pairs
            .iter()
            .position(|&p| p == input_pair)
            .unwrap_or(0);
        while potential_index != 0 {
            potential_index -= 1;
            let potential = self.active_pairs[potential_index];
            let west_of = self.west_of(potential, vert);
            if west_of > 0 && is_hole {
                return true;
            }

            if west_of >= 0 && !is_hole {
                let next = self.active_pairs[potential_index + 1];
                self.set_east_certainty(potential, next, west_of != 0);
                if let Some(input_index) = self.active_pairs.iter().position(|&p| p == input_pair)
                {
                    if potential_index + 1 != input_index {
                        self.active_pairs.remove(input_index);
                        self.active_pairs.insert(potential_index + 1, input_pair);
                    }
                }
                return false;
            }

            let outside = self.east_of(potential, vert);
            if outside <= 0 && is_hole {
                self.swap_hole(potential, input_pair);
                return false;
            }
        }
        if is_hole {
            return true;
        }

        if let Some(input_index) = self.active_pairs.iter().position(|&p| p == input_pair) {
            if input_index != 0 {
                self.active_pairs.remove(input_index);
                self.active_pairs.insert(0, input_pair);
            }
        }
        self.pairs[input_pair].west_certain = true;
        false
    }
}

/// Fans a single monotone polygon into triangles. Verts must arrive in
/// sweep-line order, attached to the free end given by `on_right`; the
/// reflex chain holds the verts that cannot be triangulated yet.
struct Triangulator {
    reflex_chain: Vec<usize>,
    on_right: bool,
    triangles_output: usize,
    precision: f64,
}

impl Triangulator {
    fn new(vert: usize, precision: f64) -> Self {
        Self {
            reflex_chain: vec![vert],
            on_right: false,
            triangles_output: 0,
            precision,
        }
    }

    fn process_vert(
        &mut self,
        verts: &[VertAdj],
        vi: usize,
        on_right: bool,
        last: bool,
        triangles: &mut Vec<[i32; 3]>,
    ) {
        let mut v_top = match self.reflex_chain.last() {
            Some(&v) => v,
            None => return,
        };
        if self.reflex_chain.len() < 2 {
            self.reflex_chain.push(vi);
            self.on_right = on_right;
            return;
        }
        self.reflex_chain.pop();
        let mut vj = match self.reflex_chain.last() {
            Some(&v) => v,
            None => return,
        };
        if self.on_right == on_right && !last {
            // Same chain: unwind the reflex chain as far as convexity
            // allows.
            let mut orientation =
                ccw(verts[vi].pos, verts[vj].pos, verts[v_top].pos, self.precision);
            let wanted = if self.on_right { 1 } else { -1 };
            while orientation == wanted || orientation == 0 {
                self.add_triangle(verts, triangles, vi, vj, v_top);
                v_top = vj;
                self.reflex_chain.pop();
                match self.reflex_chain.last() {
                    Some(&v) => vj = v,
                    None => break,
                }
                orientation =
                    ccw(verts[vi].pos, verts[vj].pos, verts[v_top].pos, self.precision);
            }
            self.reflex_chain.push(v_top);
            self.reflex_chain.push(vi);
        } else {
            // Switched chains: the whole reflex chain empties.
            self.on_right = !self.on_right;
            let mut v_last = v_top;
            while let Some(&vj) = self.reflex_chain.last() {
                self.add_triangle(verts, triangles, vi, v_last, vj);
                v_last = vj;
                self.reflex_chain.pop();
            }
            self.reflex_chain.push(v_top);
            self.reflex_chain.push(vi);
        }
    }

    fn add_triangle(
        &mut self,
        verts: &[VertAdj],
        triangles: &mut Vec<[i32; 3]>,
        v0: usize,
        v1: usize,
        v2: usize,
    ) {
        let (v1, v2) = if self.on_right { (v1, v2) } else { (v2, v1) };
        triangles.push([verts[v0].mesh_idx, verts[v1].mesh_idx, verts[v2].mesh_idx]);
        self.triangles_output += 1;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;

    fn poly(points: &[(f64, f64)], first_idx: i32) -> Vec<PolyVert> {
        points
            .iter()
            .enumerate()
            .map(|(i, &(x, y))| PolyVert {
                pos: Vector2::new(x, y),
                idx: first_idx + i32::try_from(i).unwrap(),
            })
            .collect()
    }

    /// Sum of signed triangle areas, using the polygons' own positions.
    fn total_area(triangles: &[[i32; 3]], polys: &[Vec<PolyVert>]) -> f64 {
        let lookup: hashbrown::HashMap<i32, Vector2<f64>> = polys
            .iter()
            .flatten()
            .map(|v| (v.idx, v.pos))
            .collect();
        triangles
            .iter()
            .map(|t| {
                let a = lookup[&t[0]];
                let b = lookup[&t[1]];
                let c = lookup[&t[2]];
                0.5 * ((b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x))
            })
            .sum()
    }

    #[test]
    fn square() {
        let polys = vec![poly(&[(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)], 0)];
        let tris = triangulate_idx(&polys, 1e-9).unwrap();
        assert_eq!(tris.len(), 2);
        assert!((total_area(&tris, &polys) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn convex_pentagon() {
        let polys = vec![poly(
            &[(0.0, 0.0), (2.0, 0.0), (2.6, 1.8), (1.0, 3.0), (-0.6, 1.8)],
            0,
        )];
        let tris = triangulate_idx(&polys, 1e-9).unwrap();
        assert_eq!(tris.len(), 3);
        let expect = total_area(&tris, &polys);
        assert!(expect > 0.0);
    }

    #[test]
    fn concave_l_shape() {
        let polys = vec![poly(
            &[
                (0.0, 0.0),
                (2.0, 0.0),
                (2.0, 1.0),
                (1.0, 1.0),
                (1.0, 2.0),
                (0.0, 2.0),
            ],
            0,
        )];
        let tris = triangulate_idx(&polys, 1e-9).unwrap();
        assert_eq!(tris.len(), 4);
        assert!((total_area(&tris, &polys) - 3.0).abs() < 1e-12);
    }

    #[test]
    fn square_with_hole() {
        // Outer CCW, hole CW.
        let outer = poly(&[(0.0, 0.0), (4.0, 0.0), (4.0, 4.0), (0.0, 4.0)], 0);
        let hole = poly(&[(1.0, 1.0), (1.0, 3.0), (3.0, 3.0), (3.0, 1.0)], 4);
        let polys = vec![outer, hole];
        let tris = triangulate_idx(&polys, 1e-9).unwrap();
        assert_eq!(tris.len(), 8);
        assert!((total_area(&tris, &polys) - 12.0).abs() < 1e-12);
    }

    #[test]
    fn triangles_are_ccw() {
        let polys = vec![poly(
            &[
                (0.0, 0.0),
                (3.0, 0.0),
                (3.0, 1.0),
                (1.5, 0.5),
                (0.0, 1.0),
            ],
            0,
        )];
        let tris = triangulate_idx(&polys, 1e-9).unwrap();
        let lookup: hashbrown::HashMap<i32, Vector2<f64>> = polys
            .iter()
            .flatten()
            .map(|v| (v.idx, v.pos))
            .collect();
        for t in &tris {
            let a = lookup[&t[0]];
            let b = lookup[&t[1]];
            let c = lookup[&t[2]];
            let area = (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x);
            assert!(area >= 0.0, "clockwise triangle {t:?}");
        }
    }

    #[test]
    fn two_disjoint_squares() {
        let polys = vec![
            poly(&[(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)], 0),
            poly(&[(5.0, 0.0), (6.0, 0.0), (6.0, 1.0), (5.0, 1.0)], 4),
        ];
        let tris = triangulate_idx(&polys, 1e-9).unwrap();
        assert_eq!(tris.len(), 4);
        assert!((total_area(&tris, &polys) - 2.0).abs() < 1e-12);
    }
}
