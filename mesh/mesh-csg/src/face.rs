//! Polygonal face triangulation dispatch.
//!
//! After assembly the halfedge vector holds general polygonal faces,
//! addressed by `face_edge` offsets. [`face_to_tris`] rewrites it as
//! triangles: direct for 3 edges, a quad split for 4, and the sweep
//! line triangulator for anything larger. Face normals and provenance
//! are repeated per emitted triangle.

use crate::error::{CsgError, CsgResult};
use crate::geom::{axis_aligned_projection, ccw, project, Projection};
use crate::manifold::{Manifold, TriRef};
use crate::triangulate::{triangulate_idx, PolyVert};
use hashbrown::HashMap;
use mesh_types::Vector3;

/// Replace the polygonal faces of `out_r` with triangles.
///
/// `face_edge` gives the first halfedge of each face, with a final
/// entry holding the halfedge count. `halfedge_ref` carries the
/// provenance each face's triangles inherit.
///
/// # Errors
///
/// Returns [`CsgError::GeometryInvalid`] when a face's edges do not
/// form closed simple loops, and [`CsgError::InvariantViolation`] when
/// the halfedge structure itself is inconsistent.
#[allow(clippy::cast_sign_loss)]
pub(crate) fn face_to_tris(
    out_r: &mut Manifold,
    face_edge: &[i32],
    halfedge_ref: &[TriRef],
) -> CsgResult<()> {
    let mut tri_verts: Vec<[i32; 3]> = Vec::new();
    let mut tri_normal: Vec<Vector3<f64>> = Vec::new();
    let mut tri_ref: Vec<TriRef> = Vec::new();

    for face in 0..face_edge.len() - 1 {
        let first_edge = face_edge[face] as usize;
        let last_edge = face_edge[face + 1] as usize;
        let num_edge = last_edge - first_edge;
        if num_edge < 3 {
            return Err(CsgError::invariant(format!(
                "face has only {num_edge} edges"
            )));
        }
        let normal = out_r.face_normal[face];
        let reference = halfedge_ref[first_edge];

        if num_edge == 3 {
            let mut tri = [
                out_r.halfedge[first_edge].start_vert,
                out_r.halfedge[first_edge + 1].start_vert,
                out_r.halfedge[first_edge + 2].start_vert,
            ];
            let mut ends = [
                out_r.halfedge[first_edge].end_vert,
                out_r.halfedge[first_edge + 1].end_vert,
                out_r.halfedge[first_edge + 2].end_vert,
            ];
            if ends[0] == tri[2] {
                tri.swap(1, 2);
                ends.swap(1, 2);
            }
            if ends[0] != tri[1] || ends[1] != tri[2] || ends[2] != tri[0] {
                return Err(CsgError::invariant("face edges do not form a triangle"));
            }
            tri_verts.push(tri);
            tri_normal.push(normal);
            tri_ref.push(reference);
        } else if num_edge == 4 {
            let projection = axis_aligned_projection(&normal);
            let (tri0, tri1) =
                split_quad(out_r, first_edge, &projection)?;
            for tri in [tri0, tri1] {
                tri_verts.push(tri);
                tri_normal.push(normal);
                tri_ref.push(reference);
            }
        } else {
            let projection = axis_aligned_projection(&normal);
            let polys = face_to_polygons(out_r, face, &projection, face_edge)?;
            for tri in triangulate_idx(&polys, out_r.precision)? {
                tri_verts.push(tri);
                tri_normal.push(normal);
                tri_ref.push(reference);
            }
        }
    }

    out_r.face_normal = tri_normal;
    out_r.tri_ref = tri_ref;
    out_r.create_halfedges(&tri_verts);
    Ok(())
}

/// Split a quad face into two triangles, picking the diagonal that
/// keeps both halves CCW, or the shorter one when both diagonals work.
#[allow(clippy::cast_sign_loss)]
fn split_quad(
    out_r: &Manifold,
    first_edge: usize,
    projection: &Projection,
) -> CsgResult<([i32; 3], [i32; 3])> {
    let tri_ccw = |tri: &[i32; 3]| {
        ccw(
            project(projection, &out_r.vert_pos[tri[0] as usize]),
            project(projection, &out_r.vert_pos[tri[1] as usize]),
            project(projection, &out_r.vert_pos[tri[2] as usize]),
            out_r.precision,
        ) >= 0
    };

    let mut tri0 = [
        out_r.halfedge[first_edge].start_vert,
        out_r.halfedge[first_edge].end_vert,
        -1,
    ];
    let mut tri1 = [-1, -1, tri0[0]];
    for i in 1..4 {
        if out_r.halfedge[first_edge + i].start_vert == tri0[1] {
            tri0[2] = out_r.halfedge[first_edge + i].end_vert;
            tri1[0] = tri0[2];
        }
        if out_r.halfedge[first_edge + i].end_vert == tri0[0] {
            tri1[1] = out_r.halfedge[first_edge + i].start_vert;
        }
    }
    if tri0.iter().chain(&tri1).any(|&v| v < 0) {
        return Err(CsgError::geometry("quad face is not a closed loop"));
    }

    let first_valid = tri_ccw(&tri0) && tri_ccw(&tri1);
    tri0[2] = tri1[1];
    tri1[2] = tri0[1];
    let second_valid = tri_ccw(&tri0) && tri_ccw(&tri1);

    if !second_valid {
        tri0[2] = tri1[0];
        tri1[2] = tri0[0];
    } else if first_valid {
        // Both diagonals valid: take the shorter.
        let first_cross = out_r.vert_pos[tri0[0] as usize] - out_r.vert_pos[tri1[0] as usize];
        let second_cross = out_r.vert_pos[tri0[1] as usize] - out_r.vert_pos[tri1[1] as usize];
        if first_cross.norm_squared() < second_cross.norm_squared() {
            tri0[2] = tri1[0];
            tri1[2] = tri0[0];
        }
    }
    Ok((tri0, tri1))
}

/// Walk a face's halfedges into closed 2D polygon loops under the given
/// projection.
#[allow(clippy::cast_sign_loss)]
fn face_to_polygons(
    out_r: &Manifold,
    face: usize,
    projection: &Projection,
    face_edge: &[i32],
) -> CsgResult<Vec<Vec<PolyVert>>> {
    let first_edge = face_edge[face] as usize;
    let last_edge = face_edge[face + 1] as usize;

    let mut vert_edge: HashMap<i32, usize> = HashMap::with_capacity(last_edge - first_edge);
    for edge in first_edge..last_edge {
        let start = out_r.halfedge[edge].start_vert;
        if vert_edge.insert(start, edge).is_some() {
            return Err(CsgError::geometry("face has duplicate vertices"));
        }
    }

    let mut polys: Vec<Vec<PolyVert>> = Vec::new();
    // Scan cursor picks the lowest unconsumed edge to start each loop,
    // matching the order the edges were laid down.
    let mut cursor = first_edge;
    while !vert_edge.is_empty() {
        while !vert_edge.contains_key(&out_r.halfedge[cursor].start_vert) {
            cursor += 1;
        }
        let start_edge = cursor;
        let mut this_edge = start_edge;
        let mut poly = Vec::new();
        loop {
            let vert = out_r.halfedge[this_edge].start_vert;
            poly.push(PolyVert {
                pos: project(projection, &out_r.vert_pos[vert as usize]),
                idx: vert,
            });
            // Closing the loop consumes the start vertex's own entry.
            let next = out_r.halfedge[this_edge].end_vert;
            let Some(edge) = vert_edge.remove(&next) else {
                return Err(CsgError::geometry("face loop is not closed"));
            };
            this_edge = edge;
            if this_edge == start_edge {
                break;
            }
        }
        polys.push(poly);
    }
    Ok(polys)
}
