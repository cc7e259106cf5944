//! Result assembly.
//!
//! Turns the kernel output into the result manifold: winding numbers
//! become inclusion counts (how many copies of each element the output
//! keeps), vertices are duplicated accordingly, and the retained parts
//! of both inputs are stitched together with the new intersection
//! edges into polygonal faces, which are then triangulated and
//! simplified.

use crate::error::{CsgError, CsgResult};
use crate::face::face_to_tris;
use crate::manifold::{Halfedge, Manifold, TriRef};
use crate::operation::{BooleanOp, KernelOutput};
use crate::simplify::simplify_topology;
use crate::sparse::SparseIndices;
use hashbrown::HashMap;
use mesh_types::{Aabb, Point3};
use smallvec::SmallVec;
use tracing::debug;

/// A vertex lying on an edge of the output, tagged with whether it
/// begins or ends a retained interval of that edge.
#[derive(Debug, Clone, Copy)]
struct EdgePos {
    vert: i32,
    edge_pos: f64,
    is_start: bool,
}

/// Most edges carry only a handful of intersection points.
type EdgePosList = SmallVec<[EdgePos; 4]>;

/// Build the result manifold for `op` from the two inputs and the
/// narrow-phase output.
#[allow(clippy::cast_sign_loss, clippy::too_many_lines)]
pub(crate) fn assemble(
    op: BooleanOp,
    in_p: &Manifold,
    in_q: &Manifold,
    kernel: KernelOutput,
) -> CsgResult<Manifold> {
    let c1 = i32::from(op != BooleanOp::Intersect);
    let c2 = i32::from(op == BooleanOp::Union);
    let c3 = if op == BooleanOp::Intersect { 1 } else { -1 };

    if in_p.is_empty() {
        if !in_q.is_empty() && op == BooleanOp::Union {
            return Ok(in_q.clone());
        }
        return Ok(Manifold::empty());
    } else if in_q.is_empty() {
        if op == BooleanOp::Intersect {
            return Ok(Manifold::empty());
        }
        return Ok(in_p.clone());
    }

    let invert_q = op == BooleanOp::Subtract;

    // Winding numbers to inclusion counts.
    let i12: Vec<i32> = kernel.x12.iter().map(|x| c3 * x).collect();
    let i21: Vec<i32> = kernel.x21.iter().map(|x| c3 * x).collect();
    let i03: Vec<i32> = kernel.w03.iter().map(|w| c1 + c3 * w).collect();
    let i30: Vec<i32> = kernel.w30.iter().map(|w| c2 + c3 * w).collect();

    // Exclusive scans place every retained and new vertex in the
    // output vertex array.
    let (v_p2r, n_pv) = exclusive_abs_scan(&i03, 0);
    let (v_q2r, after_q) = exclusive_abs_scan(&i30, n_pv);
    let (v12_r, after_12) = exclusive_abs_scan(&i12, after_q);
    let (v21_r, num_vert_r) = exclusive_abs_scan(&i21, after_12);

    let mut out_r = Manifold::empty();
    if num_vert_r == 0 {
        return Ok(out_r);
    }
    out_r.precision = in_p.precision.max(in_q.precision);

    out_r.vert_pos = vec![Point3::origin(); num_vert_r as usize];
    for (i, pos) in in_p.vert_pos.iter().enumerate() {
        duplicate_verts(&mut out_r.vert_pos, i03[i], v_p2r[i], *pos);
    }
    for (i, pos) in in_q.vert_pos.iter().enumerate() {
        duplicate_verts(&mut out_r.vert_pos, i30[i], v_q2r[i], *pos);
    }
    for (i, v) in kernel.v12.iter().enumerate() {
        duplicate_verts(&mut out_r.vert_pos, i12[i], v12_r[i], Point3::from(*v));
    }
    for (i, v) in kernel.v21.iter().enumerate() {
        duplicate_verts(&mut out_r.vert_pos, i21[i], v21_r[i], Point3::from(*v));
    }
    debug!(
        from_p = n_pv,
        from_q = after_q - n_pv,
        new_12 = after_12 - after_q,
        new_21 = num_vert_r - after_12,
        "output vertices"
    );

    // Keyed by forward halfedge index of the intersected input edge.
    let mut edges_p: HashMap<i32, EdgePosList> = HashMap::new();
    let mut edges_q: HashMap<i32, EdgePosList> = HashMap::new();
    // Keyed by the (P face, Q face) pair the new edge lies on.
    let mut edges_new: HashMap<(i32, i32), EdgePosList> = HashMap::new();

    add_new_edge_verts(
        &mut edges_p,
        &mut edges_new,
        &kernel.p1q2,
        &i12,
        &v12_r,
        &in_p.halfedge,
        true,
    );
    add_new_edge_verts(
        &mut edges_q,
        &mut edges_new,
        &kernel.p2q1,
        &i21,
        &v21_r,
        &in_q.halfedge,
        false,
    );

    let (face_edge, face_pq2r) = size_output(
        &mut out_r, in_p, in_q, &i03, &i30, &i12, &i21, &kernel.p1q2, &kernel.p2q1, invert_q,
    );

    // Incremented as halfedges are slotted into each face.
    let mut face_ptr_r = face_edge.clone();

    let mut whole_halfedge_p = vec![true; in_p.halfedge.len()];
    let mut whole_halfedge_q = vec![true; in_q.halfedge.len()];
    // Becomes the triangle provenance once the faces are triangulated.
    let mut halfedge_ref = vec![TriRef::default(); out_r.halfedge.len()];

    let num_tri_p = in_p.num_tri();
    append_partial_edges(
        &mut out_r,
        &mut whole_halfedge_p,
        &mut face_ptr_r,
        edges_p,
        &mut halfedge_ref,
        in_p,
        &i03,
        &v_p2r,
        &face_pq2r[..num_tri_p],
        true,
    )?;
    append_partial_edges(
        &mut out_r,
        &mut whole_halfedge_q,
        &mut face_ptr_r,
        edges_q,
        &mut halfedge_ref,
        in_q,
        &i30,
        &v_q2r,
        &face_pq2r[num_tri_p..],
        false,
    )?;

    append_new_edges(
        &mut out_r,
        &mut face_ptr_r,
        edges_new,
        &mut halfedge_ref,
        &face_pq2r,
        num_tri_p,
    )?;

    append_whole_edges(
        &mut out_r,
        &mut face_ptr_r,
        &mut halfedge_ref,
        in_p,
        &whole_halfedge_p,
        &i03,
        &v_p2r,
        &face_pq2r[..num_tri_p],
        true,
    );
    append_whole_edges(
        &mut out_r,
        &mut face_ptr_r,
        &mut halfedge_ref,
        in_q,
        &whole_halfedge_q,
        &i30,
        &v_q2r,
        &face_pq2r[num_tri_p..],
        false,
    );

    if !out_r.is_manifold() {
        return Err(CsgError::geometry("assembled polygon mesh is not manifold"));
    }

    face_to_tris(&mut out_r, &face_edge, &halfedge_ref)?;

    update_reference(&mut out_r, in_p, in_q);

    simplify_topology(&mut out_r)?;

    out_r.calculate_bbox();
    out_r.finish()?;
    Ok(out_r)
}

/// Exclusive scan of absolute values, returning the per-element offsets
/// and the final total.
fn exclusive_abs_scan(values: &[i32], start: i32) -> (Vec<i32>, i32) {
    let mut offsets = Vec::with_capacity(values.len());
    let mut sum = start;
    for &v in values {
        offsets.push(sum);
        sum += v.abs();
    }
    (offsets, sum)
}

/// Write `|inclusion|` copies of a position starting at `vert_r`.
#[allow(clippy::cast_sign_loss)]
fn duplicate_verts(vert_pos_r: &mut [Point3<f64>], inclusion: i32, vert_r: i32, pos: Point3<f64>) {
    for i in 0..inclusion.unsigned_abs() as usize {
        vert_pos_r[vert_r as usize + i] = pos;
    }
}

/// Distribute each intersection vertex to its input edge and to the two
/// new edges it creates, one on each neighboring face pair. The
/// crossing direction decides which end of the retained interval the
/// vertex begins.
#[allow(clippy::cast_sign_loss)]
fn add_new_edge_verts(
    edges_p: &mut HashMap<i32, EdgePosList>,
    edges_new: &mut HashMap<(i32, i32), EdgePosList>,
    p1q2: &SparseIndices,
    i12: &[i32],
    v12_r: &[i32],
    halfedge_p: &[Halfedge],
    forward: bool,
) {
    for i in 0..p1q2.len() {
        let (a, b) = p1q2.get(i);
        let (edge_p, face_q) = if forward { (a, b) } else { (b, a) };
        let inclusion = i12[i];

        let halfedge = halfedge_p[edge_p as usize];
        let pair_face = halfedge_p[halfedge.paired_halfedge as usize].face;
        let key_right = if forward {
            (pair_face, face_q)
        } else {
            (face_q, pair_face)
        };
        let key_left = if forward {
            (halfedge.face, face_q)
        } else {
            (face_q, halfedge.face)
        };

        let mut vert = v12_r[i];
        let is_start = inclusion < 0;
        for _ in 0..inclusion.unsigned_abs() {
            let pos = EdgePos {
                vert,
                edge_pos: 0.0,
                is_start,
            };
            let rev = EdgePos {
                is_start: !is_start,
                ..pos
            };
            edges_p.entry(edge_p).or_default().push(pos);
            edges_new
                .entry(key_right)
                .or_default()
                .push(if forward { pos } else { rev });
            edges_new
                .entry(key_left)
                .or_default()
                .push(if forward { rev } else { pos });
            vert += 1;
        }
    }
}

/// Count the halfedges each output face will hold, drop faces with
/// none, and size the output halfedge vector. Returns the per-face
/// starting offsets and the input-face to output-face mapping.
#[allow(clippy::cast_sign_loss, clippy::too_many_arguments)]
fn size_output(
    out_r: &mut Manifold,
    in_p: &Manifold,
    in_q: &Manifold,
    i03: &[i32],
    i30: &[i32],
    i12: &[i32],
    i21: &[i32],
    p1q2: &SparseIndices,
    p2q1: &SparseIndices,
    invert_q: bool,
) -> (Vec<i32>, Vec<i32>) {
    let mut sides_per_face_p = vec![0_i32; in_p.num_tri()];
    let mut sides_per_face_q = vec![0_i32; in_q.num_tri()];

    for edge in &in_p.halfedge {
        sides_per_face_p[edge.face as usize] += i03[edge.start_vert as usize].abs();
    }
    for edge in &in_q.halfedge {
        sides_per_face_q[edge.face as usize] += i30[edge.start_vert as usize].abs();
    }

    for (i, &inclusion) in i12.iter().enumerate() {
        let (edge_p, face_q) = p1q2.get(i);
        count_new_verts(
            &mut sides_per_face_p,
            &mut sides_per_face_q,
            &in_p.halfedge,
            edge_p,
            face_q,
            inclusion,
        );
    }
    for (i, &inclusion) in i21.iter().enumerate() {
        let (face_p, edge_q) = p2q1.get(i);
        count_new_verts(
            &mut sides_per_face_q,
            &mut sides_per_face_p,
            &in_q.halfedge,
            edge_q,
            face_p,
            inclusion,
        );
    }

    let sides_per_face_pq: Vec<i32> = sides_per_face_p
        .into_iter()
        .chain(sides_per_face_q)
        .collect();
    let keep_face: Vec<bool> = sides_per_face_pq.iter().map(|&s| s != 0).collect();

    let mut face_pq2r = Vec::with_capacity(keep_face.len());
    let mut sum = 0_i32;
    for &keep in &keep_face {
        face_pq2r.push(sum);
        if keep {
            sum += 1;
        }
    }

    out_r.face_normal = Vec::with_capacity(sum as usize);
    for (i, normal) in in_p.face_normal.iter().enumerate() {
        if keep_face[i] {
            out_r.face_normal.push(*normal);
        }
    }
    for (i, normal) in in_q.face_normal.iter().enumerate() {
        if keep_face[in_p.num_tri() + i] {
            let n = if invert_q { -normal } else { *normal };
            out_r.face_normal.push(n);
        }
    }

    let mut face_edge = Vec::with_capacity(sum as usize + 1);
    let mut offset = 0_i32;
    face_edge.push(0);
    for (i, &sides) in sides_per_face_pq.iter().enumerate() {
        if keep_face[i] {
            offset += sides;
            face_edge.push(offset);
        }
    }
    out_r.halfedge = vec![Halfedge::REMOVED; offset as usize];

    (face_edge, face_pq2r)
}

/// A new vertex on edge `edge_p` piercing face `face_q` adds one vertex
/// to the pierced face and one to each face flanking the edge.
#[allow(clippy::cast_sign_loss)]
fn count_new_verts(
    count_p: &mut [i32],
    count_q: &mut [i32],
    halfedges: &[Halfedge],
    edge_p: i32,
    face_q: i32,
    inclusion: i32,
) {
    let inclusion = inclusion.abs();
    count_q[face_q as usize] += inclusion;
    let half = halfedges[edge_p as usize];
    count_p[half.face as usize] += inclusion;
    let pair = halfedges[half.paired_halfedge as usize];
    count_p[pair.face as usize] += inclusion;
}

/// For each partially retained input edge: collect its new intersection
/// vertices and its retained endpoints, order them along the edge,
/// pair them into sub-edges, and emit those into the two faces
/// flanking the edge.
#[allow(clippy::cast_sign_loss, clippy::too_many_arguments)]
fn append_partial_edges(
    out_r: &mut Manifold,
    whole_halfedge_p: &mut [bool],
    face_ptr_r: &mut [i32],
    edges_p: HashMap<i32, EdgePosList>,
    halfedge_ref: &mut [TriRef],
    in_p: &Manifold,
    i03: &[i32],
    v_p2r: &[i32],
    face_p2r: &[i32],
    forward: bool,
) -> CsgResult<()> {
    let mut keys: Vec<i32> = edges_p.keys().copied().collect();
    keys.sort_unstable();

    let mut edges_p = edges_p;
    for edge_p in keys {
        let mut edge_pos_p = edges_p.remove(&edge_p).unwrap_or_default();
        let halfedge = in_p.halfedge[edge_p as usize];
        whole_halfedge_p[edge_p as usize] = false;
        whole_halfedge_p[halfedge.paired_halfedge as usize] = false;

        let v_start = halfedge.start_vert as usize;
        let v_end = halfedge.end_vert as usize;
        let edge_vec = in_p.vert_pos[v_end] - in_p.vert_pos[v_start];

        // Order the new points by their projection along the edge.
        for edge in &mut edge_pos_p {
            edge.edge_pos = out_r.vert_pos[edge.vert as usize].coords.dot(&edge_vec);
        }

        let mut inclusion = i03[v_start];
        let mut vert = v_p2r[v_start];
        for _ in 0..inclusion.unsigned_abs() {
            edge_pos_p.push(EdgePos {
                vert,
                edge_pos: out_r.vert_pos[vert as usize].coords.dot(&edge_vec),
                is_start: inclusion > 0,
            });
            vert += 1;
        }

        inclusion = i03[v_end];
        vert = v_p2r[v_end];
        for _ in 0..inclusion.unsigned_abs() {
            edge_pos_p.push(EdgePos {
                vert,
                edge_pos: out_r.vert_pos[vert as usize].coords.dot(&edge_vec),
                is_start: inclusion < 0,
            });
            vert += 1;
        }

        let edges = pair_up(&mut edge_pos_p)?;

        let face_left_p = halfedge.face;
        let face_left = face_p2r[face_left_p as usize];
        let face_right_p = in_p.halfedge[halfedge.paired_halfedge as usize].face;
        let face_right = face_p2r[face_right_p as usize];
        let mesh_id = i32::from(!forward);
        let forward_ref = TriRef {
            mesh_id,
            original_id: -1,
            tri: face_left_p,
        };
        let backward_ref = TriRef {
            mesh_id,
            original_id: -1,
            tri: face_right_p,
        };

        for (start_vert, end_vert) in edges {
            emit_edge_pair(
                out_r,
                face_ptr_r,
                halfedge_ref,
                start_vert,
                end_vert,
                face_left,
                face_right,
                forward_ref,
                backward_ref,
            );
        }
    }
    Ok(())
}

/// Pair start vertices with end vertices along the edge direction.
///
/// An odd point count (or mismatched starts and ends) means the input
/// was not epsilon-valid around this edge.
fn pair_up(edge_pos: &mut [EdgePos]) -> CsgResult<Vec<(i32, i32)>> {
    if edge_pos.len() % 2 != 0 {
        return Err(CsgError::geometry(format!(
            "non-manifold edge: odd number of points ({})",
            edge_pos.len()
        )));
    }
    let n_edges = edge_pos.len() / 2;

    let mut starts: Vec<EdgePos> = Vec::with_capacity(n_edges);
    let mut ends: Vec<EdgePos> = Vec::with_capacity(n_edges);
    for &pos in edge_pos.iter() {
        if pos.is_start {
            starts.push(pos);
        } else {
            ends.push(pos);
        }
    }
    if starts.len() != n_edges {
        return Err(CsgError::geometry(format!(
            "non-manifold edge: {} starts for {} edges",
            starts.len(),
            n_edges
        )));
    }

    starts.sort_by(|a, b| a.edge_pos.total_cmp(&b.edge_pos));
    ends.sort_by(|a, b| a.edge_pos.total_cmp(&b.edge_pos));

    Ok(starts
        .into_iter()
        .zip(ends)
        .map(|(s, e)| (s.vert, e.vert))
        .collect())
}

/// Emit the new edges lying along each intersected face pair, ordered
/// along the dominant axis of their point set.
#[allow(clippy::cast_sign_loss)]
fn append_new_edges(
    out_r: &mut Manifold,
    face_ptr_r: &mut [i32],
    edges_new: HashMap<(i32, i32), EdgePosList>,
    halfedge_ref: &mut [TriRef],
    face_pq2r: &[i32],
    num_face_p: usize,
) -> CsgResult<()> {
    let mut keys: Vec<(i32, i32)> = edges_new.keys().copied().collect();
    keys.sort_unstable();

    let mut edges_new = edges_new;
    for key in keys {
        let (face_p, face_q) = key;
        let mut edge_pos = edges_new.remove(&key).unwrap_or_default();

        let mut bounds = Aabb::empty();
        for edge in &edge_pos {
            bounds.expand_to_include(&out_r.vert_pos[edge.vert as usize]);
        }
        let size = bounds.max - bounds.min;
        let axis = if size.x > size.y && size.x > size.z {
            0
        } else if size.y > size.z {
            1
        } else {
            2
        };
        for edge in &mut edge_pos {
            edge.edge_pos = out_r.vert_pos[edge.vert as usize][axis];
        }

        let edges = pair_up(&mut edge_pos)?;

        let face_left = face_pq2r[face_p as usize];
        let face_right = face_pq2r[num_face_p + face_q as usize];
        let forward_ref = TriRef {
            mesh_id: 0,
            original_id: -1,
            tri: face_p,
        };
        let backward_ref = TriRef {
            mesh_id: 1,
            original_id: -1,
            tri: face_q,
        };

        for (start_vert, end_vert) in edges {
            emit_edge_pair(
                out_r,
                face_ptr_r,
                halfedge_ref,
                start_vert,
                end_vert,
                face_left,
                face_right,
                forward_ref,
                backward_ref,
            );
        }
    }
    Ok(())
}

/// Copy the fully retained input edges into the output, duplicated per
/// inclusion count and reversed when the inclusion is negative.
#[allow(clippy::cast_sign_loss, clippy::too_many_arguments)]
fn append_whole_edges(
    out_r: &mut Manifold,
    face_ptr_r: &mut [i32],
    halfedge_ref: &mut [TriRef],
    in_p: &Manifold,
    whole_halfedge_p: &[bool],
    i03: &[i32],
    v_p2r: &[i32],
    face_p2r: &[i32],
    forward: bool,
) {
    for (edge_p, &whole) in whole_halfedge_p.iter().enumerate() {
        let mut halfedge = in_p.halfedge[edge_p];
        if !whole || !halfedge.is_forward() {
            continue;
        }

        let inclusion = i03[halfedge.start_vert as usize];
        if inclusion == 0 {
            continue;
        }
        if inclusion < 0 {
            std::mem::swap(&mut halfedge.start_vert, &mut halfedge.end_vert);
        }
        halfedge.start_vert = v_p2r[halfedge.start_vert as usize];
        halfedge.end_vert = v_p2r[halfedge.end_vert as usize];
        let face_left_p = halfedge.face;
        let face_left = face_p2r[face_left_p as usize];
        let face_right_p = in_p.halfedge[halfedge.paired_halfedge as usize].face;
        let face_right = face_p2r[face_right_p as usize];

        let mesh_id = i32::from(!forward);
        let forward_ref = TriRef {
            mesh_id,
            original_id: -1,
            tri: face_left_p,
        };
        let backward_ref = TriRef {
            mesh_id,
            original_id: -1,
            tri: face_right_p,
        };

        for _ in 0..inclusion.unsigned_abs() {
            emit_edge_pair(
                out_r,
                face_ptr_r,
                halfedge_ref,
                halfedge.start_vert,
                halfedge.end_vert,
                face_left,
                face_right,
                forward_ref,
                backward_ref,
            );
            halfedge.start_vert += 1;
            halfedge.end_vert += 1;
        }
    }
}

/// Slot one twin pair of halfedges into their faces.
#[allow(clippy::cast_sign_loss, clippy::too_many_arguments)]
fn emit_edge_pair(
    out_r: &mut Manifold,
    face_ptr_r: &mut [i32],
    halfedge_ref: &mut [TriRef],
    start_vert: i32,
    end_vert: i32,
    face_left: i32,
    face_right: i32,
    forward_ref: TriRef,
    backward_ref: TriRef,
) {
    let forward_edge = face_ptr_r[face_left as usize];
    face_ptr_r[face_left as usize] += 1;
    let backward_edge = face_ptr_r[face_right as usize];
    face_ptr_r[face_right as usize] += 1;

    out_r.halfedge[forward_edge as usize] = Halfedge {
        start_vert,
        end_vert,
        paired_halfedge: backward_edge,
        face: face_left,
    };
    halfedge_ref[forward_edge as usize] = forward_ref;

    out_r.halfedge[backward_edge as usize] = Halfedge {
        start_vert: end_vert,
        end_vert: start_vert,
        paired_halfedge: forward_edge,
        face: face_right,
    };
    halfedge_ref[backward_edge as usize] = backward_ref;
}

/// Swap the placeholder face references for the inputs' provenance.
/// Mesh IDs are globally unique, so P and Q references stay distinct
/// without renumbering.
#[allow(clippy::cast_sign_loss)]
fn update_reference(out_r: &mut Manifold, in_p: &Manifold, in_q: &Manifold) {
    for tri_ref in &mut out_r.tri_ref {
        let tri = tri_ref.tri as usize;
        *tri_ref = if tri_ref.mesh_id == 0 {
            in_p.tri_ref[tri]
        } else {
            in_q.tri_ref[tri]
        };
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;

    #[test]
    fn exclusive_scan_totals_absolute_values() {
        let (offsets, total) = exclusive_abs_scan(&[1, -2, 0, 3], 5);
        assert_eq!(offsets, vec![5, 6, 8, 8]);
        assert_eq!(total, 11);
    }

    #[test]
    fn pair_up_orders_intervals() {
        let mut points = vec![
            EdgePos { vert: 0, edge_pos: 0.0, is_start: true },
            EdgePos { vert: 3, edge_pos: 3.0, is_start: false },
            EdgePos { vert: 2, edge_pos: 2.0, is_start: true },
            EdgePos { vert: 1, edge_pos: 1.0, is_start: false },
        ];
        let edges = pair_up(&mut points).unwrap();
        assert_eq!(edges, vec![(0, 1), (2, 3)]);
    }

    #[test]
    fn pair_up_rejects_odd_point_counts() {
        let mut points = vec![
            EdgePos { vert: 0, edge_pos: 0.0, is_start: true },
            EdgePos { vert: 1, edge_pos: 1.0, is_start: false },
            EdgePos { vert: 2, edge_pos: 2.0, is_start: true },
        ];
        assert!(matches!(
            pair_up(&mut points),
            Err(CsgError::GeometryInvalid { .. })
        ));
    }

    #[test]
    fn pair_up_rejects_mismatched_starts() {
        let mut points = vec![
            EdgePos { vert: 0, edge_pos: 0.0, is_start: true },
            EdgePos { vert: 1, edge_pos: 1.0, is_start: true },
        ];
        assert!(matches!(
            pair_up(&mut points),
            Err(CsgError::GeometryInvalid { .. })
        ));
    }

    #[test]
    fn duplicate_verts_writes_inclusion_copies() {
        let mut verts = vec![Point3::origin(); 4];
        duplicate_verts(&mut verts, -2, 1, Point3::new(1.0, 2.0, 3.0));
        assert_eq!(verts[0], Point3::origin());
        assert_eq!(verts[1], Point3::new(1.0, 2.0, 3.0));
        assert_eq!(verts[2], Point3::new(1.0, 2.0, 3.0));
        assert_eq!(verts[3], Point3::origin());
    }
}
