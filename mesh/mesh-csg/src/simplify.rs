//! Topological cleanup of degenerate triangles.
//!
//! Collapses edges shorter than the mesh tolerance and edges whose
//! start vertex is surrounded by only two original faces, then swaps
//! the long edges of the remaining degenerate triangles. Before any of
//! that, pinched vertices (two surface sheets meeting at a point) are
//! split so every vertex has a single halfedge fan, and duplicate
//! edges (more than one twin pair between the same two vertices) are
//! pulled apart by duplicating a vertex; the slivers that introduces
//! are usually collapsed again in the same pass.
//!
//! When a collapse would pinch the mesh into a non-manifold
//! configuration, the offending vertices are duplicated instead and
//! the two sheets reattached across the edge, which removes a handle
//! or separates a component.
//!
//! Nothing is compacted here. Removed halfedges become tombstones and
//! removed vertex positions become NaN; the next
//! [`Manifold::finish`] sweeps both away.

use crate::error::{CsgError, CsgResult};
use crate::geom::{axis_aligned_projection, ccw, project};
use crate::manifold::{next_halfedge, Halfedge, Manifold, TriRef};
use mesh_types::Point3;
use nalgebra::Vector2;
use tracing::debug;

/// Mark degenerate edges of `m` for removal.
///
/// # Errors
///
/// Returns [`CsgError::InvariantViolation`] when an edge orbit fails
/// to close, which means the halfedge structure was already corrupt.
#[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
pub(crate) fn simplify_topology(m: &mut Manifold) -> CsgResult<()> {
    if m.halfedge.is_empty() {
        return Ok(());
    }

    // Pinched vertices must be split before any collapse: collapsing an
    // edge repoints a single fan, and a vertex shared by two fans would
    // leave the second fan referencing a tombstoned vertex.
    split_pinched_verts(m)?;

    let nb_edges = m.halfedge.len();

    // Duplicate edges first: they would confuse the collapses below.
    let mut entries: Vec<(i32, i32, usize)> = m
        .halfedge
        .iter()
        .enumerate()
        .map(|(i, h)| (h.start_vert, h.end_vert, i))
        .collect();
    entries.sort_unstable();
    let mut num_flagged = 0_usize;
    for i in 0..nb_edges - 1 {
        if entries[i].0 >= 0
            && entries[i].0 == entries[i + 1].0
            && entries[i].1 == entries[i + 1].1
        {
            dedupe_edge(m, entries[i].2 as i32)?;
            num_flagged += 1;
        }
    }
    if num_flagged > 0 {
        debug!(count = num_flagged, "split duplicate edges");
    }

    let mut scratch: Vec<i32> = Vec::new();

    let flags: Vec<bool> = (0..nb_edges).map(|i| short_edge(m, i)).collect();
    num_flagged = 0;
    for (i, &flagged) in flags.iter().enumerate() {
        if flagged {
            collapse_edge(m, i as i32, &mut scratch)?;
            scratch.clear();
            num_flagged += 1;
        }
    }
    if num_flagged > 0 {
        debug!(count = num_flagged, "collapsed short edges");
    }

    let flags: Vec<bool> = (0..nb_edges).map(|i| redundant_edge(m, i)).collect();
    num_flagged = 0;
    for (i, &flagged) in flags.iter().enumerate() {
        if flagged {
            collapse_edge(m, i as i32, &mut scratch)?;
            scratch.clear();
            num_flagged += 1;
        }
    }
    if num_flagged > 0 {
        debug!(count = num_flagged, "collapsed redundant edges");
    }

    let flags: Vec<bool> = (0..nb_edges).map(|i| swappable_edge(m, i)).collect();
    let mut swap_stack: Vec<i32> = Vec::new();
    let mut visited = vec![-1_i32; m.halfedge.len()];
    let mut tag = 0_i32;
    num_flagged = 0;
    for (i, &flagged) in flags.iter().enumerate() {
        if flagged {
            num_flagged += 1;
            tag += 1;
            edge_swap(m, i as i32, tag, &mut visited, &mut swap_stack)?;
            while let Some(edge) = swap_stack.pop() {
                edge_swap(m, edge, tag, &mut visited, &mut swap_stack)?;
            }
        }
    }
    if num_flagged > 0 {
        debug!(count = num_flagged, "swapped degenerate edges");
    }
    Ok(())
}

/// Give every halfedge fan its own vertex. A vertex where two disjoint
/// fans meet (two surface sheets touching at a point) keeps the first
/// fan and each further fan gets a duplicate at the same position.
#[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap, clippy::cast_sign_loss)]
fn split_pinched_verts(m: &mut Manifold) -> CsgResult<()> {
    let nb_edges = m.halfedge.len();
    let mut vert_claimed = vec![false; m.vert_pos.len()];
    let mut edge_claimed = vec![false; nb_edges];
    let mut num_split = 0_usize;

    for i in 0..nb_edges {
        if edge_claimed[i] {
            continue;
        }
        let mut vert = m.halfedge[i].start_vert;
        if vert < 0 {
            continue;
        }
        if vert_claimed[vert as usize] {
            let new_vert = m.vert_pos.len() as i32;
            m.vert_pos.push(m.vert_pos[vert as usize]);
            if !m.vert_normal.is_empty() {
                m.vert_normal.push(m.vert_normal[vert as usize]);
            }
            vert = new_vert;
            num_split += 1;
        } else {
            vert_claimed[vert as usize] = true;
        }

        let mut current = i as i32;
        let mut steps = 0_usize;
        loop {
            edge_claimed[current as usize] = true;
            m.halfedge[current as usize].start_vert = vert;
            current = m.halfedge[current as usize].paired_halfedge;
            if current < 0 {
                return Err(CsgError::invariant(
                    "open orbit while splitting a pinched vertex",
                ));
            }
            m.halfedge[current as usize].end_vert = vert;
            current = next_halfedge(current);
            if current == i as i32 {
                break;
            }
            steps += 1;
            if steps > nb_edges {
                return Err(CsgError::invariant(
                    "open orbit while splitting a pinched vertex",
                ));
            }
        }
    }
    if num_split > 0 {
        debug!(count = num_split, "split pinched vertices");
    }
    Ok(())
}

const fn tri_of(edge: i32) -> [i32; 3] {
    let e1 = next_halfedge(edge);
    [edge, e1, next_halfedge(e1)]
}

fn same_face(a: TriRef, b: TriRef) -> bool {
    a.mesh_id == b.mesh_id && a.tri == b.tri
}

fn is_01_longest(v0: Vector2<f64>, v1: Vector2<f64>, v2: Vector2<f64>) -> bool {
    let l0 = (v1 - v0).norm_squared();
    let l1 = (v2 - v1).norm_squared();
    let l2 = (v0 - v2).norm_squared();
    l0 > l1 && l0 > l2
}

fn nan_point() -> Point3<f64> {
    Point3::new(f64::NAN, f64::NAN, f64::NAN)
}

fn pair_up(m: &mut Manifold, edge0: i32, edge1: i32) -> CsgResult<()> {
    if edge0 < 0 || edge1 < 0 {
        return Err(CsgError::invariant("pairing a removed halfedge"));
    }
    m.halfedge[edge0 as usize].paired_halfedge = edge1;
    m.halfedge[edge1 as usize].paired_halfedge = edge0;
    Ok(())
}

#[allow(clippy::cast_sign_loss)]
fn short_edge(m: &Manifold, edge: usize) -> bool {
    let h = m.halfedge[edge];
    if h.paired_halfedge < 0 {
        return false;
    }
    let delta = m.vert_pos[h.end_vert as usize] - m.vert_pos[h.start_vert as usize];
    delta.norm_squared() < m.precision * m.precision
}

/// An edge whose start vertex touches only two original faces; the
/// vertex lies on the border between them and carries no shape.
#[allow(clippy::cast_sign_loss)]
fn redundant_edge(m: &Manifold, edge: usize) -> bool {
    let h = m.halfedge[edge];
    if h.paired_halfedge < 0 {
        return false;
    }
    let ref0 = m.tri_ref[edge / 3];
    let mut current = next_halfedge(h.paired_halfedge);
    let ref1 = m.tri_ref[(current / 3) as usize];

    let mut steps = 0_usize;
    while current != edge as i32 {
        let paired = m.halfedge[current as usize].paired_halfedge;
        if paired < 0 {
            return false;
        }
        current = next_halfedge(paired);
        let r = m.tri_ref[(current / 3) as usize];
        if !same_face(r, ref0) && !same_face(r, ref1) {
            return false;
        }
        steps += 1;
        if steps > m.halfedge.len() {
            return false;
        }
    }
    true
}

/// The long edge of a CW or degenerate triangle, seen from both sides.
#[allow(clippy::cast_sign_loss)]
fn swappable_edge(m: &Manifold, edge: usize) -> bool {
    let h = m.halfedge[edge];
    if h.paired_halfedge < 0 {
        return false;
    }

    let tri = h.face;
    let tri_edge = tri_of(edge as i32);
    let projection = axis_aligned_projection(&m.face_normal[tri as usize]);
    let mut v = [Vector2::zeros(); 3];
    for i in 0..3 {
        v[i] = project(
            &projection,
            &m.vert_pos[m.halfedge[tri_edge[i] as usize].start_vert as usize],
        );
    }
    if ccw(v[0], v[1], v[2], m.precision) > 0 || !is_01_longest(v[0], v[1], v[2]) {
        return false;
    }

    // Neighbor's projection.
    let edge = h.paired_halfedge;
    let tri = m.halfedge[edge as usize].face;
    let tri_edge = tri_of(edge);
    let projection = axis_aligned_projection(&m.face_normal[tri as usize]);
    for i in 0..3 {
        v[i] = project(
            &projection,
            &m.vert_pos[m.halfedge[tri_edge[i] as usize].start_vert as usize],
        );
    }
    ccw(v[0], v[1], v[2], m.precision) > 0 || is_01_longest(v[0], v[1], v[2])
}

/// Split one of a set of duplicate edges apart from the others by
/// duplicating its end vertex and bridging the gap with two triangles.
#[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap, clippy::cast_sign_loss)]
fn dedupe_edge(m: &mut Manifold, edge: i32) -> CsgResult<()> {
    // Orbit the end vertex looking for a second edge back to the start.
    let start_vert = m.halfedge[edge as usize].start_vert;
    let end_vert = m.halfedge[edge as usize].end_vert;
    let mut current = m.halfedge[next_halfedge(edge) as usize].paired_halfedge;
    let mut steps = 0_usize;
    while current != edge {
        if current < 0 {
            return Err(CsgError::invariant("open orbit while deduplicating an edge"));
        }
        let vert = m.halfedge[current as usize].start_vert;
        if vert == start_vert {
            let new_vert = m.vert_pos.len() as i32;
            m.vert_pos.push(m.vert_pos[end_vert as usize]);
            if !m.vert_normal.is_empty() {
                m.vert_normal.push(m.vert_normal[end_vert as usize]);
            }
            current = m.halfedge[next_halfedge(current) as usize].paired_halfedge;
            let opposite = m.halfedge[next_halfedge(edge) as usize].paired_halfedge;

            update_vert(m, new_vert, current, opposite)?;

            let mut new_halfedge = m.halfedge.len() as i32;
            let mut new_face = new_halfedge / 3;
            let mut old_face = m.halfedge[current as usize].face;
            let mut outside_vert = m.halfedge[current as usize].start_vert;
            m.halfedge.push(Halfedge {
                start_vert: end_vert,
                end_vert: new_vert,
                paired_halfedge: -1,
                face: new_face,
            });
            m.halfedge.push(Halfedge {
                start_vert: new_vert,
                end_vert: outside_vert,
                paired_halfedge: -1,
                face: new_face,
            });
            m.halfedge.push(Halfedge {
                start_vert: outside_vert,
                end_vert,
                paired_halfedge: -1,
                face: new_face,
            });
            let paired = m.halfedge[current as usize].paired_halfedge;
            pair_up(m, new_halfedge + 2, paired)?;
            pair_up(m, new_halfedge + 1, current)?;
            m.face_normal.push(m.face_normal[old_face as usize]);
            m.tri_ref.push(m.tri_ref[old_face as usize]);

            new_halfedge += 3;
            new_face += 1;
            old_face = m.halfedge[opposite as usize].face;
            outside_vert = m.halfedge[opposite as usize].start_vert;
            m.halfedge.push(Halfedge {
                start_vert: new_vert,
                end_vert,
                paired_halfedge: -1,
                face: new_face,
            });
            m.halfedge.push(Halfedge {
                start_vert: end_vert,
                end_vert: outside_vert,
                paired_halfedge: -1,
                face: new_face,
            });
            m.halfedge.push(Halfedge {
                start_vert: outside_vert,
                end_vert: new_vert,
                paired_halfedge: -1,
                face: new_face,
            });
            let paired = m.halfedge[opposite as usize].paired_halfedge;
            pair_up(m, new_halfedge + 2, paired)?;
            pair_up(m, new_halfedge + 1, opposite)?;
            pair_up(m, new_halfedge, new_halfedge - 3)?;
            m.face_normal.push(m.face_normal[old_face as usize]);
            m.tri_ref.push(m.tri_ref[old_face as usize]);
            return Ok(());
        }

        current = m.halfedge[next_halfedge(current) as usize].paired_halfedge;
        steps += 1;
        if steps > m.halfedge.len() {
            return Err(CsgError::invariant("open orbit while deduplicating an edge"));
        }
    }
    Ok(())
}

/// Walk CW around `start_edge`'s end vertex from `start_edge` to
/// `end_edge`, repointing every touched halfedge at `vert`.
#[allow(clippy::cast_sign_loss)]
fn update_vert(m: &mut Manifold, vert: i32, start_edge: i32, end_edge: i32) -> CsgResult<()> {
    let mut current = start_edge;
    while current != end_edge {
        if current < 0 {
            return Err(CsgError::invariant("open orbit while moving a vertex"));
        }
        m.halfedge[current as usize].end_vert = vert;
        current = next_halfedge(current);
        m.halfedge[current as usize].start_vert = vert;
        current = m.halfedge[current as usize].paired_halfedge;
        if current == start_edge {
            return Err(CsgError::invariant("vertex orbit failed to terminate"));
        }
    }
    Ok(())
}

/// A collapse here would create a non-manifold edge; duplicate the two
/// verts instead and reattach the sheets the other way across it.
#[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap, clippy::cast_sign_loss)]
fn form_loop(m: &mut Manifold, current: i32, end: i32) -> CsgResult<()> {
    let start_vert = m.vert_pos.len() as i32;
    let old_start = m.halfedge[current as usize].start_vert;
    m.vert_pos.push(m.vert_pos[old_start as usize]);
    if !m.vert_normal.is_empty() {
        m.vert_normal.push(m.vert_normal[old_start as usize]);
    }
    let end_vert = m.vert_pos.len() as i32;
    let old_end = m.halfedge[current as usize].end_vert;
    m.vert_pos.push(m.vert_pos[old_end as usize]);
    if !m.vert_normal.is_empty() {
        m.vert_normal.push(m.vert_normal[old_end as usize]);
    }

    let old_match = m.halfedge[current as usize].paired_halfedge;
    let new_match = m.halfedge[end as usize].paired_halfedge;

    update_vert(m, start_vert, old_match, new_match)?;
    update_vert(m, end_vert, end, current)?;

    pair_up(m, current, new_match)?;
    pair_up(m, end, old_match)?;

    remove_if_folded(m, end)
}

/// Zip the triangle shut: its two outer neighbors become twins and its
/// own halfedges become tombstones.
#[allow(clippy::cast_sign_loss)]
fn collapse_tri(m: &mut Manifold, tri_edge: &[i32; 3]) -> CsgResult<()> {
    let pair1 = m.halfedge[tri_edge[1] as usize].paired_halfedge;
    let pair2 = m.halfedge[tri_edge[2] as usize].paired_halfedge;
    pair_up(m, pair1, pair2)?;
    for &e in tri_edge {
        m.halfedge[e as usize] = Halfedge::REMOVED;
    }
    Ok(())
}

/// If the two triangles sharing `edge` have folded onto each other,
/// remove both, along with any verts they isolate.
#[allow(clippy::cast_sign_loss)]
fn remove_if_folded(m: &mut Manifold, edge: i32) -> CsgResult<()> {
    let paired = m.halfedge[edge as usize].paired_halfedge;
    if paired < 0 {
        return Ok(());
    }
    let tri0 = tri_of(edge);
    let tri1 = tri_of(paired);

    if m.halfedge[tri0[1] as usize].end_vert != m.halfedge[tri1[1] as usize].end_vert {
        return Ok(());
    }

    if m.halfedge[tri0[1] as usize].paired_halfedge == tri1[2] {
        if m.halfedge[tri0[2] as usize].paired_halfedge == tri1[1] {
            // Whole component is just these two triangles.
            for &e in &tri0 {
                let v = m.halfedge[e as usize].start_vert;
                m.vert_pos[v as usize] = nan_point();
            }
        } else {
            let v = m.halfedge[tri0[1] as usize].start_vert;
            m.vert_pos[v as usize] = nan_point();
        }
    } else if m.halfedge[tri0[2] as usize].paired_halfedge == tri1[1] {
        let v = m.halfedge[tri1[1] as usize].start_vert;
        m.vert_pos[v as usize] = nan_point();
    }

    let a = m.halfedge[tri0[1] as usize].paired_halfedge;
    let b = m.halfedge[tri1[2] as usize].paired_halfedge;
    pair_up(m, a, b)?;
    let a = m.halfedge[tri0[2] as usize].paired_halfedge;
    let b = m.halfedge[tri1[1] as usize].paired_halfedge;
    pair_up(m, a, b)?;

    for i in 0..3 {
        m.halfedge[tri0[i] as usize] = Halfedge::REMOVED;
        m.halfedge[tri1[i] as usize] = Halfedge::REMOVED;
    }
    Ok(())
}

/// Collapse `edge`, merging its start vertex into its end vertex.
///
/// A short edge always collapses. Otherwise the collapse is abandoned
/// unless every triangle around the start vertex stays within its
/// original face and keeps its orientation.
#[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap, clippy::cast_sign_loss)]
fn collapse_edge(m: &mut Manifold, edge: i32, edges: &mut Vec<i32>) -> CsgResult<()> {
    let to_remove = m.halfedge[edge as usize];
    if to_remove.paired_halfedge < 0 {
        return Ok(());
    }

    let end_vert = to_remove.end_vert;
    let tri0 = tri_of(edge);
    let tri1 = tri_of(to_remove.paired_halfedge);

    let p_new = m.vert_pos[end_vert as usize];
    let p_old = m.vert_pos[to_remove.start_vert as usize];
    let short = (p_new - p_old).norm_squared() < m.precision * m.precision;

    // Orbit the end vertex, remembering its fan for the loop check.
    let mut current = m.halfedge[tri0[1] as usize].paired_halfedge;
    let mut steps = 0_usize;
    while current != tri1[2] {
        if current < 0 {
            return Err(CsgError::invariant("open orbit while collapsing an edge"));
        }
        current = next_halfedge(current);
        edges.push(current);
        current = m.halfedge[current as usize].paired_halfedge;
        steps += 1;
        if steps > m.halfedge.len() {
            return Err(CsgError::invariant("open orbit while collapsing an edge"));
        }
    }

    let mut start = m.halfedge[tri1[1] as usize].paired_halfedge;
    if !short {
        // Orbit the start vertex, checking each triangle survives.
        let mut current = start;
        let mut ref_check = m.tri_ref[(to_remove.paired_halfedge / 3) as usize];
        let mut p_last = m.vert_pos[m.halfedge[tri1[1] as usize].end_vert as usize];
        while current != tri0[2] {
            current = next_halfedge(current);
            let p_next = m.vert_pos[m.halfedge[current as usize].end_vert as usize];
            let tri = (current / 3) as usize;
            let r = m.tri_ref[tri];
            let projection = axis_aligned_projection(&m.face_normal[tri]);

            // The edge must still be redundant; neighboring collapses
            // may have changed that.
            if !same_face(r, ref_check) {
                ref_check = m.tri_ref[(edge / 3) as usize];
                if !same_face(r, ref_check) {
                    return Ok(());
                }
                // Coplanar faces may meet along a bent border; only a
                // colinear one may go.
                if ccw(
                    project(&projection, &p_old),
                    project(&projection, &p_last),
                    project(&projection, &p_new),
                    m.precision,
                ) != 0
                {
                    return Ok(());
                }
            }

            // No inverted triangles.
            if ccw(
                project(&projection, &p_next),
                project(&projection, &p_last),
                project(&projection, &p_new),
                m.precision,
            ) < 0
            {
                return Ok(());
            }

            p_last = p_next;
            current = m.halfedge[current as usize].paired_halfedge;
            if current < 0 {
                return Err(CsgError::invariant("open orbit while collapsing an edge"));
            }
        }
    }

    m.vert_pos[to_remove.start_vert as usize] = nan_point();
    collapse_tri(m, &tri1)?;

    // Walk the start vertex fan; a shared neighbor vertex means the
    // collapse would pinch the surface, so split it there instead.
    let mut current = start;
    let mut steps = 0_usize;
    while current != tri0[2] {
        if current < 0 {
            return Err(CsgError::invariant("open orbit while collapsing an edge"));
        }
        current = next_halfedge(current);
        let vert = m.halfedge[current as usize].end_vert;
        let next = m.halfedge[current as usize].paired_halfedge;
        if let Some(i) = edges
            .iter()
            .position(|&e| m.halfedge[e as usize].end_vert == vert)
        {
            form_loop(m, edges[i], current)?;
            start = next;
            edges.truncate(i);
        }
        current = next;
        steps += 1;
        if steps > m.halfedge.len() {
            return Err(CsgError::invariant("open orbit while collapsing an edge"));
        }
    }

    update_vert(m, end_vert, start, tri0[2])?;
    collapse_tri(m, &tri0)?;
    remove_if_folded(m, start)
}

/// Swap the shared edge of two triangles when one is degenerate and
/// the swap shrinks the degeneracy, then queue the neighbors that may
/// have become swappable.
#[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
fn edge_swap(
    m: &mut Manifold,
    edge: i32,
    tag: i32,
    visited: &mut Vec<i32>,
    swap_stack: &mut Vec<i32>,
) -> CsgResult<()> {
    if edge < 0 {
        return Ok(());
    }
    let pair = m.halfedge[edge as usize].paired_halfedge;
    if pair < 0 {
        return Ok(());
    }
    if seen(visited, edge) == tag && seen(visited, pair) == tag {
        return Ok(());
    }

    let tri0 = tri_of(edge);
    let tri1 = tri_of(pair);

    // Only the long edge of a degenerate triangle is a candidate.
    let projection = axis_aligned_projection(&m.face_normal[(edge / 3) as usize]);
    let mut v = [Vector2::zeros(); 4];
    for i in 0..3 {
        v[i] = project(
            &projection,
            &m.vert_pos[m.halfedge[tri0[i] as usize].start_vert as usize],
        );
    }
    if ccw(v[0], v[1], v[2], m.precision) > 0 || !is_01_longest(v[0], v[1], v[2]) {
        return Ok(());
    }

    // Neighbor's projection.
    let projection =
        axis_aligned_projection(&m.face_normal[m.halfedge[pair as usize].face as usize]);
    for i in 0..3 {
        v[i] = project(
            &projection,
            &m.vert_pos[m.halfedge[tri0[i] as usize].start_vert as usize],
        );
    }
    v[3] = project(
        &projection,
        &m.vert_pos[m.halfedge[tri1[2] as usize].start_vert as usize],
    );

    if ccw(v[1], v[0], v[3], m.precision) <= 0 {
        // Neighbor is degenerate too; only two facing long-edge
        // degenerates can swap.
        if is_01_longest(v[1], v[0], v[3]) {
            return Ok(());
        }
    } else if ccw(v[0], v[1], v[3], m.precision) <= 0 {
        return Ok(());
    }

    swap_edge(m, &tri0, &tri1)?;
    mark(visited, edge, tag);
    mark(visited, pair, tag);
    swap_stack.push(m.halfedge[tri1[0] as usize].paired_halfedge);
    swap_stack.push(m.halfedge[tri0[1] as usize].paired_halfedge);
    Ok(())
}

#[allow(clippy::cast_sign_loss)]
fn seen(visited: &[i32], edge: i32) -> i32 {
    visited.get(edge as usize).copied().unwrap_or(-1)
}

#[allow(clippy::cast_sign_loss)]
fn mark(visited: &mut Vec<i32>, edge: i32, tag: i32) {
    let edge = edge as usize;
    if edge >= visited.len() {
        visited.resize(edge + 1, -1);
    }
    visited[edge] = tag;
}

/// The swap itself: the 0-verts move to the opposite 2-verts, after
/// which both triangles are subsets of the neighbor and inherit its
/// normal and provenance.
#[allow(clippy::cast_sign_loss)]
fn swap_edge(m: &mut Manifold, tri0: &[i32; 3], tri1: &[i32; 3]) -> CsgResult<()> {
    let v0 = m.halfedge[tri0[2] as usize].start_vert;
    let v1 = m.halfedge[tri1[2] as usize].start_vert;
    m.halfedge[tri0[0] as usize].start_vert = v1;
    m.halfedge[tri0[2] as usize].end_vert = v1;
    m.halfedge[tri1[0] as usize].start_vert = v0;
    m.halfedge[tri1[2] as usize].end_vert = v0;
    let paired = m.halfedge[tri1[2] as usize].paired_halfedge;
    pair_up(m, tri0[0], paired)?;
    let paired = m.halfedge[tri0[2] as usize].paired_halfedge;
    pair_up(m, tri1[0], paired)?;
    pair_up(m, tri0[2], tri1[2])?;

    let face0 = m.halfedge[tri0[0] as usize].face;
    let face1 = m.halfedge[tri1[0] as usize].face;
    m.face_normal[face0 as usize] = m.face_normal[face1 as usize];
    m.tri_ref[face0 as usize] = m.tri_ref[face1 as usize];

    // If the new edge already exists, split the mesh apart instead of
    // creating a duplicate.
    let mut current = m.halfedge[tri1[0] as usize].paired_halfedge;
    let end_vert = m.halfedge[tri1[1] as usize].end_vert;
    let mut steps = 0_usize;
    while current != tri0[1] {
        if current < 0 {
            return Err(CsgError::invariant("open orbit while swapping an edge"));
        }
        current = next_halfedge(current);
        if m.halfedge[current as usize].end_vert == end_vert {
            form_loop(m, tri0[2], current)?;
            remove_if_folded(m, tri0[2])?;
            return Ok(());
        }
        current = m.halfedge[current as usize].paired_halfedge;
        steps += 1;
        if steps > m.halfedge.len() {
            return Err(CsgError::invariant("open orbit while swapping an edge"));
        }
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::cast_possible_truncation)]
mod tests {
    use super::*;
    use crate::manifold::MeshIdAllocator;
    use mesh_types::{cube, unit_cube, IndexedMesh};

    /// Split the edge `(a, b)` at parameter `t`, dividing both adjacent
    /// triangles so the mesh stays closed.
    fn split_edge(mesh: &mut IndexedMesh, a: u32, b: u32, t: f64) {
        let pa = mesh.vertices[a as usize];
        let pb = mesh.vertices[b as usize];
        let mid = pa + (pb - pa) * t;
        let mid_idx = mesh.vertices.len() as u32;
        mesh.vertices.push(mid);

        let mut faces = Vec::new();
        for face in &mesh.faces {
            let mut split = false;
            for i in 0..3 {
                let s = face[i];
                let e = face[(i + 1) % 3];
                let o = face[(i + 2) % 3];
                if (s == a && e == b) || (s == b && e == a) {
                    faces.push([s, mid_idx, o]);
                    faces.push([mid_idx, e, o]);
                    split = true;
                    break;
                }
            }
            if !split {
                faces.push(*face);
            }
        }
        mesh.faces = faces;
    }

    fn cube_with_split_edge(t: f64) -> IndexedMesh {
        let mut mesh = unit_cube();
        let [a, b, _] = mesh.faces[0];
        split_edge(&mut mesh, a, b, t);
        mesh
    }

    /// Two unit cubes touching at the single point `(1, 1, 1)`; welding
    /// pinches that corner into one vertex shared by both surfaces.
    fn corner_touching_cubes() -> IndexedMesh {
        let mut mesh = unit_cube();
        mesh.merge(&cube(Point3::new(1.0, 1.0, 1.0), 1.0));
        mesh
    }

    #[test]
    fn clean_cube_is_untouched() {
        let mut ids = MeshIdAllocator::new();
        let mut m = Manifold::from_mesh(&unit_cube(), &mut ids).unwrap();
        let halfedges = m.halfedge.clone();
        simplify_topology(&mut m).unwrap();
        assert_eq!(m.halfedge, halfedges);
        assert!(m.vert_pos.iter().all(|v| v.x.is_finite()));
    }

    #[test]
    fn colinear_vertex_is_collapsed() {
        let mesh = cube_with_split_edge(0.5);
        assert_eq!(mesh.vertex_count(), 9);
        assert_eq!(mesh.face_count(), 14);

        let mut ids = MeshIdAllocator::new();
        let m = Manifold::from_mesh(&mesh, &mut ids).unwrap();
        assert!(m.is_manifold());
        assert_eq!(m.vert_pos.len(), 8);
        assert_eq!(m.num_tri(), 12);

        let out = m.to_mesh();
        assert!((out.volume() - 1.0).abs() < 1e-9);
        assert!((out.surface_area() - 6.0).abs() < 1e-9);
    }

    #[test]
    fn short_edge_is_collapsed() {
        // Split point a hair from the corner, well inside tolerance.
        let mesh = cube_with_split_edge(1e-7);
        let mut ids = MeshIdAllocator::new();
        let m = Manifold::from_mesh(&mesh, &mut ids).unwrap();
        assert!(m.is_manifold());
        assert_eq!(m.vert_pos.len(), 8);

        let out = m.to_mesh();
        assert!((out.volume() - 1.0).abs() < 1e-4);
    }

    #[test]
    fn degenerate_sliver_simplifies_away() {
        // Split point slightly off the edge line: the two slivers are
        // not colinear but still vanish within tolerance.
        let mut mesh = cube_with_split_edge(0.5);
        let last = mesh.vertices.len() - 1;
        mesh.vertices[last].z += 1e-6;

        let mut ids = MeshIdAllocator::new();
        let m = Manifold::from_mesh(&mesh, &mut ids).unwrap();
        assert!(m.is_manifold());

        let out = m.to_mesh();
        assert!((out.volume() - 1.0).abs() < 1e-4);
        assert!((out.surface_area() - 6.0).abs() < 1e-4);
    }

    #[test]
    fn pinched_corner_vertex_is_split() {
        // 15 welded verts going in; the shared corner is duplicated so
        // each cube keeps its own copy.
        let mut ids = MeshIdAllocator::new();
        let m = Manifold::from_mesh(&corner_touching_cubes(), &mut ids).unwrap();
        assert!(m.is_manifold());
        assert_eq!(m.vert_pos.len(), 16);

        let out = m.to_mesh();
        assert!((out.volume() - 2.0).abs() < 1e-9);
        assert!((out.surface_area() - 12.0).abs() < 1e-9);
    }

    #[test]
    fn short_edge_into_pinched_corner_collapses_cleanly() {
        // A short edge ending at the pinched corner: the collapse
        // tombstones one of its verts, and every live halfedge must end
        // up pointing at a finite vertex afterwards.
        let mut mesh = corner_touching_cubes();
        let corner = Point3::new(1.0, 1.0, 1.0);
        let (a, b) = mesh
            .faces
            .iter()
            .find_map(|face| {
                (0..3).find_map(|i| {
                    let s = face[i];
                    let e = face[(i + 1) % 3];
                    (mesh.vertices[e as usize] == corner).then_some((s, e))
                })
            })
            .unwrap();
        split_edge(&mut mesh, a, b, 1.0 - 1e-7);

        let mut ids = MeshIdAllocator::new();
        let m = Manifold::from_mesh(&mesh, &mut ids).unwrap();
        assert!(m.is_manifold());
        assert!(m.vert_pos.iter().all(|v| v.x.is_finite()));

        let out = m.to_mesh();
        assert!((out.volume() - 2.0).abs() < 1e-4);
        assert!((out.surface_area() - 12.0).abs() < 1e-4);
    }
}
