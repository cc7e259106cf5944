//! Boolean operations on solid meshes.
//!
//! The pipeline runs in levels: broad-phase collider queries produce
//! candidate element pairs, the shadow kernels turn those into exact
//! winding contributions and intersection vertices, and assembly stitches
//! the retained pieces of both inputs into the output mesh.
//! Epsilon-valid inputs produce epsilon-valid output. Empty or disjoint
//! inputs short-circuit to near-instant results.

use crate::assemble::assemble;
use crate::error::CsgResult;
use crate::kernel::{filter11, intersect12, shadow02, shadow11, winding03};
use crate::manifold::{Manifold, MeshIdAllocator};
use crate::sparse::SparseIndices;
use mesh_types::{Aabb, IndexedMesh, Vector3};
use tracing::debug;

/// The boolean operation to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BooleanOp {
    /// Keep everything inside either solid.
    Union,
    /// Keep only the overlap of the two solids.
    Intersect,
    /// Remove the second solid from the first.
    Subtract,
}

/// Everything the narrow phase hands to assembly: the surviving
/// edge-face pairs, their crossing directions and intersection
/// vertices, and the per-vertex winding numbers.
pub(crate) struct KernelOutput {
    pub p1q2: SparseIndices,
    pub p2q1: SparseIndices,
    pub x12: Vec<i32>,
    pub x21: Vec<i32>,
    pub v12: Vec<Vector3<f64>>,
    pub v21: Vec<Vector3<f64>>,
    pub w03: Vec<i32>,
    pub w30: Vec<i32>,
}

impl KernelOutput {
    /// The trivial output for inputs whose bounding boxes do not
    /// overlap: no intersections and all windings zero.
    fn disjoint(num_vert_p: usize, num_vert_q: usize) -> Self {
        Self {
            p1q2: SparseIndices::new(),
            p2q1: SparseIndices::new(),
            x12: Vec::new(),
            x21: Vec::new(),
            v12: Vec::new(),
            v21: Vec::new(),
            w03: vec![0; num_vert_p],
            w30: vec![0; num_vert_q],
        }
    }
}

/// Union of two solids.
///
/// # Errors
///
/// See [`boolean`].
pub fn union(a: &IndexedMesh, b: &IndexedMesh) -> CsgResult<IndexedMesh> {
    boolean(a, b, BooleanOp::Union)
}

/// Intersection of two solids.
///
/// # Errors
///
/// See [`boolean`].
pub fn intersect(a: &IndexedMesh, b: &IndexedMesh) -> CsgResult<IndexedMesh> {
    boolean(a, b, BooleanOp::Intersect)
}

/// Difference of two solids: `a` minus `b`.
///
/// # Errors
///
/// See [`boolean`].
pub fn subtract(a: &IndexedMesh, b: &IndexedMesh) -> CsgResult<IndexedMesh> {
    boolean(a, b, BooleanOp::Subtract)
}

/// Combine two solid meshes with the given boolean operation.
///
/// Both inputs must be closed, consistently wound triangle meshes.
///
/// # Errors
///
/// Returns [`crate::CsgError::GeometryInvalid`] when an input is not a
/// closed manifold within tolerance, and
/// [`crate::CsgError::InvariantViolation`] if an internal consistency
/// check fails.
pub fn boolean(a: &IndexedMesh, b: &IndexedMesh, op: BooleanOp) -> CsgResult<IndexedMesh> {
    let mut ids = MeshIdAllocator::new();
    let in_p = Manifold::from_mesh(a, &mut ids)?;
    let in_q = Manifold::from_mesh(b, &mut ids)?;
    let out = boolean_manifold(&in_p, &in_q, op)?;
    Ok(out.to_mesh())
}

/// The manifold-level boolean, for callers that keep the halfedge form.
pub(crate) fn boolean_manifold(
    in_p: &Manifold,
    in_q: &Manifold,
    op: BooleanOp,
) -> CsgResult<Manifold> {
    if !may_overlap(in_p, in_q) {
        debug!(?op, "bounding boxes disjoint, assembling trivial result");
        let kernel = KernelOutput::disjoint(in_p.vert_pos.len(), in_q.vert_pos.len());
        return assemble(op, in_p, in_q, kernel);
    }

    // Symbolic perturbation: expand P for union, contract it for
    // subtract and intersect.
    let expand_p = if op == BooleanOp::Union { 1.0 } else { -1.0 };

    // Broad phase: edge-face bounding box overlaps in both directions.
    let mut p1q2 = edge_collisions(in_q, in_p);
    let mut p2q1 = edge_collisions(in_p, in_q);
    p1q2.sort();
    p2q1.swap_pq();
    p2q1.sort();
    debug!(p1q2 = p1q2.len(), p2q1 = p2q1.len(), "edge-face candidates");

    // Vertices over faces in XY projection.
    let mut p0q2 = in_q.vertex_collisions(&in_p.vert_pos);
    p0q2.sort();
    let mut p2q0 = in_p.vertex_collisions(&in_q.vert_pos);
    p2q0.swap_pq();
    p2q0.sort();
    debug!(p0q2 = p0q2.len(), p2q0 = p2q0.len(), "vertex-face candidates");

    // Edge pairs implied by the edge-face candidates.
    let mut p1q1 = filter11(in_p, in_q, &p1q2, &p2q1);

    // XY crossings of edge pairs, with both z values at each crossing.
    let (s11, xyzz11) = shadow11(&mut p1q1, in_p, in_q, expand_p)?;

    // Vertex-face shadows, keeping only verts that project inside.
    let (s02, z02) = shadow02(in_p, in_q, &mut p0q2, true, expand_p)?;
    let (s20, z20) = shadow02(in_q, in_p, &mut p2q0, false, expand_p)?;

    // Edge-face piercings with crossing directions.
    let (x12, v12) = intersect12(
        in_p, in_q, &s02, &p0q2, &s11, &p1q1, &z02, &xyzz11, &mut p1q2, true,
    )?;
    let (x21, v21) = intersect12(
        in_q, in_p, &s20, &p2q0, &s11, &p1q1, &z20, &xyzz11, &mut p2q1, false,
    )?;
    debug!(x12 = x12.len(), x21 = x21.len(), "edge-face intersections");

    // Per-vertex winding numbers.
    let w03 = winding03(in_p.vert_pos.len(), &p0q2, &s02, false);
    let w30 = winding03(in_q.vert_pos.len(), &p2q0, &s20, true);

    assemble(
        op,
        in_p,
        in_q,
        KernelOutput {
            p1q2,
            p2q1,
            x12,
            x21,
            v12,
            v21,
            w03,
            w30,
        },
    )
}

/// Whether the two meshes' bounding boxes, padded by their tolerances,
/// overlap at all.
fn may_overlap(p: &Manifold, q: &Manifold) -> bool {
    p.b_box
        .expanded(p.precision + q.precision)
        .intersects(&q.b_box)
}

/// Bounding box overlaps between the forward edges of `q` and the faces
/// of `p`. The p column of the result holds `q`'s forward halfedge
/// indices, the q column `p`'s face indices.
#[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap, clippy::cast_sign_loss)]
fn edge_collisions(p: &Manifold, q: &Manifold) -> SparseIndices {
    let mut edge_idx = Vec::new();
    let mut edge_box = Vec::new();
    for (i, h) in q.halfedge.iter().enumerate() {
        if !h.is_forward() {
            continue;
        }
        edge_idx.push(i as i32);
        edge_box.push(Aabb::new(
            q.vert_pos[h.start_vert as usize],
            q.vert_pos[h.end_vert as usize],
        ));
    }

    let mut q1p2 = match &p.collider {
        Some(collider) => collider.collisions(&edge_box, false),
        None => SparseIndices::new(),
    };
    // The query column indexes the filtered edge list; map it back to
    // halfedge indices.
    for i in 0..q1p2.len() {
        let (query, face) = q1p2.get(i);
        q1p2.set(i, edge_idx[query as usize], face);
    }
    q1p2
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use mesh_types::{cube, unit_cube, Point3};

    fn manifold(mesh: &IndexedMesh) -> Manifold {
        let mut ids = MeshIdAllocator::new();
        Manifold::from_mesh(mesh, &mut ids).unwrap()
    }

    #[test]
    fn overlap_test_pads_by_precision() {
        let a = manifold(&unit_cube());
        let b = manifold(&cube(Point3::new(0.5, 0.5, 0.5), 1.0));
        let far = manifold(&cube(Point3::new(10.0, 0.0, 0.0), 1.0));
        let touching = manifold(&cube(Point3::new(1.0, 0.0, 0.0), 1.0));

        assert!(may_overlap(&a, &b));
        assert!(!may_overlap(&a, &far));
        // Exactly touching boxes are within the padded tolerance.
        assert!(may_overlap(&a, &touching));
    }

    #[test]
    fn edge_collisions_cover_overlap_region() {
        let a = manifold(&unit_cube());
        let b = manifold(&cube(Point3::new(0.5, 0.5, 0.5), 1.0));

        let pairs = edge_collisions(&a, &b);
        assert!(!pairs.is_empty());
        // Every p entry must be a forward halfedge of b.
        for i in 0..pairs.len() {
            let (edge, face) = pairs.get(i);
            #[allow(clippy::cast_sign_loss)]
            let h = b.halfedge[edge as usize];
            assert!(h.is_forward());
            assert!((face as usize) < a.num_tri());
        }
    }

    #[test]
    fn disjoint_inputs_skip_narrow_phase() {
        let a = manifold(&unit_cube());
        let b = manifold(&cube(Point3::new(5.0, 5.0, 5.0), 1.0));
        let out = boolean_manifold(&a, &b, BooleanOp::Union).unwrap();
        assert_eq!(out.num_tri(), 24);
        assert!(out.is_manifold());
    }
}
