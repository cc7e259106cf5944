//! Halfedge mesh representation.
//!
//! [`Manifold`] stores a triangle mesh as a flat halfedge vector: three
//! halfedges per triangle, grouped so that halfedges `3f`, `3f+1` and
//! `3f+2` wind CCW around face `f`. Twin halfedges reference each other
//! through `paired_halfedge`. Elements are removed by tombstoning
//! (NaN vertex positions, all `-1` halfedges) and compacted later by
//! [`Manifold::finish`], which re-sorts everything along a Morton curve
//! and rebuilds the collider.

use crate::collider::Collider;
use crate::error::{CsgError, CsgResult};
use crate::morton::{morton_code, K_NO_CODE};
use crate::simplify::simplify_topology;
use crate::sparse::SparseIndices;
use hashbrown::HashMap;
use mesh_types::{Aabb, IndexedMesh, Point3, Vector3};
use std::collections::VecDeque;
use tracing::debug;

/// Working tolerance for all topological decisions.
pub const PRECISION: f64 = 2e-5;

/// One directed edge of a triangle.
///
/// `paired_halfedge` is the twin in the adjacent triangle; `-1` marks
/// a tombstoned halfedge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Halfedge {
    /// Vertex this halfedge leaves from.
    pub start_vert: i32,
    /// Vertex this halfedge points to.
    pub end_vert: i32,
    /// Index of the twin halfedge, or -1.
    pub paired_halfedge: i32,
    /// Face this halfedge belongs to.
    pub face: i32,
}

impl Halfedge {
    /// Tombstone value for removed halfedges.
    pub const REMOVED: Self = Self {
        start_vert: -1,
        end_vert: -1,
        paired_halfedge: -1,
        face: -1,
    };

    /// A halfedge is forward when its start vertex has the smaller
    /// index; exactly one of each twin pair is forward.
    #[must_use]
    pub const fn is_forward(&self) -> bool {
        self.start_vert < self.end_vert
    }
}

/// The next halfedge CCW within the same triangle.
#[must_use]
pub const fn next_halfedge(edge: i32) -> i32 {
    3 * (edge / 3) + (edge + 1) % 3
}

/// Provenance of one triangle: which input mesh it came from and which
/// source triangle (or coplanar-group representative) it subdivides.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriRef {
    /// Mesh instance identifier.
    pub mesh_id: i32,
    /// Identifier of the original (un-subdivided) mesh.
    pub original_id: i32,
    /// Representative triangle index in the source mesh.
    pub tri: i32,
}

impl Default for TriRef {
    fn default() -> Self {
        Self {
            mesh_id: -1,
            original_id: -1,
            tri: -1,
        }
    }
}

/// Allocator for mesh instance identifiers.
///
/// Owned by the top-level boolean call and threaded explicitly into
/// every mesh construction, so provenance stays correct under
/// concurrent or repeated operations.
#[derive(Debug)]
pub struct MeshIdAllocator {
    next_id: i32,
}

impl MeshIdAllocator {
    /// Create an allocator starting at ID 1.
    #[must_use]
    pub const fn new() -> Self {
        Self { next_id: 1 }
    }

    /// Reserve `count` consecutive IDs, returning the first.
    pub fn reserve(&mut self, count: i32) -> i32 {
        let id = self.next_id;
        self.next_id += count;
        id
    }
}

impl Default for MeshIdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

/// A triangle mesh in halfedge form with spatial indexing.
#[derive(Debug, Clone, Default)]
pub struct Manifold {
    /// Vertex positions; tombstoned vertices are all-NaN.
    pub(crate) vert_pos: Vec<Point3<f64>>,
    /// Angle-weighted vertex normals, used for symbolic perturbation.
    pub(crate) vert_normal: Vec<Vector3<f64>>,
    /// Unit face normals.
    pub(crate) face_normal: Vec<Vector3<f64>>,
    /// Flat halfedge vector, three per triangle.
    pub(crate) halfedge: Vec<Halfedge>,
    /// Per-triangle provenance.
    pub(crate) tri_ref: Vec<TriRef>,
    /// This mesh's own instance ID.
    pub(crate) original_id: i32,
    /// Bounding box of all live vertices.
    pub(crate) b_box: Aabb,
    /// Working tolerance.
    pub(crate) precision: f64,
    /// Face BVH, rebuilt by `finish`.
    pub(crate) collider: Option<Collider>,
}

impl Manifold {
    /// Create an empty manifold.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            precision: PRECISION,
            original_id: -1,
            b_box: Aabb::empty(),
            ..Self::default()
        }
    }

    /// Build a manifold from an indexed triangle mesh.
    ///
    /// Vertex positions are welded exactly (bit-identical coordinates
    /// merge), halfedges are paired, faces are grouped into coplanar
    /// components, and the topology is simplified. The caller provides
    /// the ID allocator so provenance stays unique across meshes.
    ///
    /// # Errors
    ///
    /// Returns [`CsgError::GeometryInvalid`] for non-finite input
    /// coordinates or topology the simplifier cannot repair, and
    /// [`CsgError::InvariantViolation`] if an internal consistency
    /// check fails.
    pub fn from_mesh(mesh: &IndexedMesh, ids: &mut MeshIdAllocator) -> CsgResult<Self> {
        let mut m = Self::empty();

        // Weld exactly equal positions so twin pairing can work on
        // vertex indices alone.
        let mut lookup: HashMap<[u64; 3], i32> = HashMap::with_capacity(mesh.vertices.len());
        let mut vert_index = |m: &mut Self, pos: Point3<f64>| -> CsgResult<i32> {
            if !(pos.x.is_finite() && pos.y.is_finite() && pos.z.is_finite()) {
                return Err(CsgError::geometry("non-finite vertex position"));
            }
            let key = [pos.x.to_bits(), pos.y.to_bits(), pos.z.to_bits()];
            #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
            Ok(*lookup.entry(key).or_insert_with(|| {
                m.vert_pos.push(pos);
                (m.vert_pos.len() - 1) as i32
            }))
        };

        let mut tri_verts = Vec::with_capacity(mesh.faces.len());
        for face in &mesh.faces {
            let mut tri = [0_i32; 3];
            for (slot, &vi) in tri.iter_mut().zip(face) {
                let pos = *mesh
                    .vertices
                    .get(vi as usize)
                    .ok_or_else(|| CsgError::geometry("face index out of range"))?;
                *slot = vert_index(&mut m, pos)?;
            }
            tri_verts.push(tri);
        }

        m.create_halfedges(&tri_verts);
        m.calculate_bbox();
        m.original_id = ids.reserve(1);
        m.finish()?;
        m.initialize_original();
        m.create_faces();
        simplify_topology(&mut m)?;
        m.finish()?;
        Ok(m)
    }

    /// Convert back to an indexed triangle mesh.
    #[must_use]
    #[allow(clippy::cast_sign_loss)]
    pub fn to_mesh(&self) -> IndexedMesh {
        let mut out = IndexedMesh::with_capacity(self.vert_pos.len(), self.num_tri());
        out.vertices.extend(self.vert_pos.iter().copied());
        for face in 0..self.num_tri() {
            if self.halfedge[3 * face].paired_halfedge < 0 {
                continue;
            }
            out.faces.push([
                self.halfedge[3 * face].start_vert as u32,
                self.halfedge[3 * face + 1].start_vert as u32,
                self.halfedge[3 * face + 2].start_vert as u32,
            ]);
        }
        out
    }

    /// Number of triangles (including tombstoned ones until the next
    /// compaction).
    #[must_use]
    pub fn num_tri(&self) -> usize {
        self.halfedge.len() / 3
    }

    /// Whether the mesh has no vertices.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vert_pos.is_empty()
    }

    /// Check the twin-pairing invariant over every live halfedge.
    #[must_use]
    pub fn is_manifold(&self) -> bool {
        self.halfedge.iter().enumerate().all(|(edge, h)| {
            if h.start_vert == -1 && h.end_vert == -1 {
                return true;
            }
            if h.paired_halfedge == -1 {
                return false;
            }
            let paired = self.halfedge[h.paired_halfedge as usize];
            #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
            let mut good = paired.paired_halfedge == edge as i32;
            good &= h.start_vert != h.end_vert;
            good &= h.start_vert == paired.end_vert;
            good &= h.end_vert == paired.start_vert;
            good
        })
    }

    pub(crate) fn calculate_bbox(&mut self) {
        self.b_box = Aabb::from_points(self.vert_pos.iter());
    }

    /// Fill in `halfedge` from triangle vertex indices and pair twins.
    ///
    /// Pairing sorts halfedges by a 64-bit key of (forward flag, min
    /// vert, max vert); after sorting, entry `i` of the backward half
    /// pairs with entry `i` of the forward half. The sort must be
    /// stable so that duplicated internal edges from degenerate
    /// triangulations pair face-by-face; those non-manifold duplicates
    /// are then repaired by vertex duplication in the simplifier.
    #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap, clippy::cast_sign_loss)]
    pub(crate) fn create_halfedges(&mut self, tri_verts: &[[i32; 3]]) {
        let num_tri = tri_verts.len();
        let num_halfedge = 3 * num_tri;

        self.halfedge = Vec::with_capacity(num_halfedge);
        let mut keys = vec![0_u64; num_halfedge];
        for (face, tv) in tri_verts.iter().enumerate() {
            for i in 0..3 {
                let j = (i + 1) % 3;
                let (s, e) = (tv[i], tv[j]);
                self.halfedge.push(Halfedge {
                    start_vert: s,
                    end_vert: e,
                    paired_halfedge: -1,
                    face: face as i32,
                });
                keys[3 * face + i] = (u64::from(s < e) << 63)
                    | (u64::from(s.min(e) as u32) << 32)
                    | u64::from(s.max(e) as u32);
            }
        }

        let mut ids: Vec<usize> = (0..num_halfedge).collect();
        ids.sort_by_key(|&i| keys[i]);

        // Backward halfedges occupy the first half, forward the second,
        // both ordered by (min, max), so they pair at equal offsets.
        for i in 0..num_halfedge / 2 {
            let pair0 = ids[i];
            let pair1 = ids[i + num_halfedge / 2];
            self.halfedge[pair0].paired_halfedge = pair1 as i32;
            self.halfedge[pair1].paired_halfedge = pair0 as i32;
        }
    }

    /// Mark every triangle as its own original.
    #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
    pub(crate) fn initialize_original(&mut self) {
        let mesh_id = self.original_id;
        if mesh_id < 0 {
            return;
        }
        self.tri_ref = (0..self.num_tri())
            .map(|i| TriRef {
                mesh_id,
                original_id: mesh_id,
                tri: i as i32,
            })
            .collect();
    }

    /// Compact tombstones and rebuild all derived structures.
    ///
    /// Sorts vertices and faces along the Morton curve (removed
    /// elements carry the sentinel code and fall off the end),
    /// remaps all indices, recomputes normals, and rebuilds the
    /// collider over the sorted face boxes.
    ///
    /// # Errors
    ///
    /// Returns [`CsgError::InvariantViolation`] when compaction leaves
    /// an odd number of faces or the collider build fails.
    pub(crate) fn finish(&mut self) -> CsgResult<()> {
        if self.halfedge.is_empty() {
            return Ok(());
        }
        if !self.b_box.min.x.is_finite() {
            // Decimated out of existence.
            return Ok(());
        }

        self.sort_verts();
        let (mut face_box, mut face_morton) = self.face_box_morton();
        self.sort_faces(&mut face_box, &mut face_morton);
        if self.halfedge.is_empty() {
            return Ok(());
        }

        if self.halfedge.len() % 6 != 0 {
            return Err(CsgError::invariant(
                "odd number of faces after compaction",
            ));
        }

        self.calculate_normals();
        self.collider = Some(Collider::build(&face_box, &face_morton)?);
        Ok(())
    }

    /// Sort vertices by Morton code and drop tombstones.
    fn sort_verts(&mut self) {
        let num_vert = self.vert_pos.len();
        let vert_morton: Vec<u32> = self
            .vert_pos
            .iter()
            .map(|v| morton_code(v, &self.b_box))
            .collect();

        let mut vert_new2old: Vec<usize> = (0..num_vert).collect();
        vert_new2old.sort_by_key(|&i| vert_morton[i]);

        self.reindex_verts(&vert_new2old, num_vert);

        // NaN verts got the sentinel code and sorted to the end.
        let new_num_vert = vert_new2old
            .iter()
            .position(|&i| vert_morton[i] == K_NO_CODE)
            .unwrap_or(num_vert);
        vert_new2old.truncate(new_num_vert);

        self.vert_pos = gather(&self.vert_pos, &vert_new2old);
    }

    /// Remap halfedge vertex references through a new-to-old mapping.
    #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap, clippy::cast_sign_loss)]
    fn reindex_verts(&mut self, vert_new2old: &[usize], old_num_vert: usize) {
        let mut vert_old2new = vec![-1_i32; old_num_vert];
        for (new, &old) in vert_new2old.iter().enumerate() {
            vert_old2new[old] = new as i32;
        }
        for edge in &mut self.halfedge {
            if edge.start_vert >= 0 {
                edge.start_vert = vert_old2new[edge.start_vert as usize];
            }
            if edge.end_vert >= 0 {
                edge.end_vert = vert_old2new[edge.end_vert as usize];
            }
        }
    }

    /// Per-face bounding boxes and Morton codes of face centers.
    /// Removed faces get the sentinel code.
    fn face_box_morton(&self) -> (Vec<Aabb>, Vec<u32>) {
        let num_tri = self.num_tri();
        let mut face_box = vec![Aabb::empty(); num_tri];
        let mut face_morton = vec![K_NO_CODE; num_tri];

        for face in 0..num_tri {
            if self.halfedge[3 * face].paired_halfedge < 0 {
                continue;
            }
            let mut center = Vector3::zeros();
            for i in 0..3 {
                #[allow(clippy::cast_sign_loss)]
                let pos = self.vert_pos[self.halfedge[3 * face + i].start_vert as usize];
                center += pos.coords;
                face_box[face].expand_to_include(&pos);
            }
            let center = Point3::from(center / 3.0);
            face_morton[face] = morton_code(&center, &self.b_box);
        }
        (face_box, face_morton)
    }

    /// Sort faces by Morton code, dropping tombstones, and permute the
    /// box and code arrays the same way.
    fn sort_faces(&mut self, face_box: &mut Vec<Aabb>, face_morton: &mut Vec<u32>) {
        let num_tri = self.num_tri();
        let mut face_new2old: Vec<usize> = (0..num_tri).collect();
        face_new2old.sort_by_key(|&i| face_morton[i]);

        let new_num_tri = face_new2old
            .iter()
            .position(|&i| face_morton[i] == K_NO_CODE)
            .unwrap_or(num_tri);
        face_new2old.truncate(new_num_tri);

        *face_morton = face_new2old.iter().map(|&i| face_morton[i]).collect();
        *face_box = gather(face_box, &face_new2old);
        self.gather_faces(&face_new2old);
    }

    /// Rebuild the halfedge vector with faces in the given order,
    /// remapping twin references. Face normals and provenance follow
    /// the same permutation when present.
    #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap, clippy::cast_sign_loss)]
    fn gather_faces(&mut self, face_new2old: &[usize]) {
        let num_tri_new = face_new2old.len();
        if self.face_normal.len() == self.num_tri() {
            self.face_normal = gather(&self.face_normal, face_new2old);
        }
        if self.tri_ref.len() == self.num_tri() {
            self.tri_ref = gather(&self.tri_ref, face_new2old);
        }

        let old_halfedge = std::mem::take(&mut self.halfedge);
        let mut face_old2new = vec![0_i32; old_halfedge.len() / 3];
        for (new, &old) in face_new2old.iter().enumerate() {
            face_old2new[old] = new as i32;
        }

        self.halfedge = vec![Halfedge::REMOVED; 3 * num_tri_new];
        for (new_face, &old_face) in face_new2old.iter().enumerate() {
            for i in 0..3 {
                let mut edge = old_halfedge[3 * old_face + i];
                edge.face = new_face as i32;
                if edge.paired_halfedge >= 0 {
                    let paired_face = edge.paired_halfedge / 3;
                    let offset = edge.paired_halfedge - 3 * paired_face;
                    edge.paired_halfedge = 3 * face_old2new[paired_face as usize] + offset;
                }
                self.halfedge[3 * new_face + i] = edge;
            }
        }
    }

    /// Recompute unit face normals (when out of date) and
    /// angle-weighted vertex normals.
    ///
    /// Corner-angle weighting makes the vertex normal independent of
    /// how the surrounding surface happens to be triangulated, which
    /// matters because these normals pick the perturbation direction
    /// for the shadow tests.
    #[allow(clippy::cast_sign_loss)]
    pub(crate) fn calculate_normals(&mut self) {
        let num_vert = self.vert_pos.len();
        self.vert_normal = vec![Vector3::zeros(); num_vert];

        let calculate_face_normal = self.face_normal.len() != self.num_tri();
        if calculate_face_normal {
            self.face_normal = vec![Vector3::zeros(); self.num_tri()];
        }

        for face in 0..self.num_tri() {
            if self.halfedge[3 * face].start_vert < 0 {
                continue;
            }
            let tri = [
                self.halfedge[3 * face].start_vert as usize,
                self.halfedge[3 * face + 1].start_vert as usize,
                self.halfedge[3 * face + 2].start_vert as usize,
            ];

            let mut edge = [Vector3::zeros(); 3];
            for i in 0..3 {
                let j = (i + 1) % 3;
                let e = self.vert_pos[tri[j]] - self.vert_pos[tri[i]];
                edge[i] = e.try_normalize(0.0).unwrap_or_else(Vector3::zeros);
            }

            if calculate_face_normal {
                let n = edge[0].cross(&edge[1]);
                self.face_normal[face] = n
                    .try_normalize(0.0)
                    .unwrap_or_else(|| Vector3::new(0.0, 0.0, 1.0));
            }

            for i in 0..3 {
                let d = -edge[(i + 2) % 3].dot(&edge[i]);
                let phi = if d >= 1.0 {
                    0.0
                } else if d <= -1.0 {
                    std::f64::consts::PI
                } else {
                    d.acos()
                };
                self.vert_normal[tri[i]] += phi * self.face_normal[face];
            }
        }

        for normal in &mut self.vert_normal {
            let len = normal.norm();
            if len > 0.0 {
                *normal /= len;
            }
        }
    }

    /// Query which face boxes each input vertex projects into (XY).
    pub(crate) fn vertex_collisions(&self, verts: &[Point3<f64>]) -> SparseIndices {
        match &self.collider {
            Some(collider) => collider.collisions(verts, false),
            None => SparseIndices::new(),
        }
    }

    /// Group mutually coplanar faces of the same source mesh into
    /// components and point each triangle's provenance at the
    /// component's largest triangle. Components that fail an exact
    /// coplanarity re-check are unmarked entirely.
    #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap, clippy::cast_sign_loss)]
    pub(crate) fn create_faces(&mut self) {
        let num_tri = self.num_tri();
        let mut face2face = vec![(-1_i32, -1_i32); self.halfedge.len()];
        let mut tri_area = vec![0.0_f64; num_tri];

        for edge_idx in 0..self.halfedge.len() {
            self.coplanar_edge(&mut tri_area, &mut face2face[edge_idx], edge_idx);
        }

        let mut components = vec![-1_i32; num_tri];
        let num_component = connected_components(&mut components, num_tri, &face2face);

        let mut comp2tri = vec![-1_i32; num_component];
        for tri in 0..num_tri {
            let comp = components[tri] as usize;
            let current = comp2tri[comp];
            if current < 0 || tri_area[tri] > tri_area[current as usize] {
                comp2tri[comp] = tri as i32;
            }
        }

        for tri in 0..num_tri {
            self.check_coplanarity(&mut comp2tri, &components, tri);
        }

        for (tri, tri_ref) in self.tri_ref.iter_mut().enumerate() {
            let reference_tri = comp2tri[components[tri] as usize];
            if reference_tri >= 0 {
                tri_ref.tri = reference_tri;
            }
        }

        debug!(num_tri, num_component, "grouped coplanar faces");
    }

    /// Detect whether the forward edge `edge_idx` joins two coplanar
    /// triangles; record the face pair and both triangle areas.
    #[allow(clippy::cast_sign_loss)]
    fn coplanar_edge(&self, tri_area: &mut [f64], face2face: &mut (i32, i32), edge_idx: usize) {
        let edge = self.halfedge[edge_idx];
        if edge.paired_halfedge < 0 {
            return;
        }
        let pair = self.halfedge[edge.paired_halfedge as usize];

        if self.tri_ref[edge.face as usize].mesh_id != self.tri_ref[pair.face as usize].mesh_id {
            return;
        }
        if !edge.is_forward() {
            return;
        }

        let base = self.vert_pos[edge.start_vert as usize];
        let base_num = edge_idx as i32 - 3 * edge.face;
        let joint_num = edge.paired_halfedge - 3 * pair.face;
        let edge_num = if base_num == 0 { 2 } else { base_num - 1 };
        let pair_num = if joint_num == 0 { 2 } else { joint_num - 1 };

        let joint_vec = self.vert_pos[pair.start_vert as usize] - base;
        let edge_vec =
            self.vert_pos[self.halfedge[(3 * edge.face + edge_num) as usize].start_vert as usize] - base;
        let pair_vec =
            self.vert_pos[self.halfedge[(3 * pair.face + pair_num) as usize].start_vert as usize] - base;

        let length = joint_vec.norm().max(edge_vec.norm());
        let length_pair = joint_vec.norm().max(pair_vec.norm());
        let normal = joint_vec.cross(&edge_vec);
        let area = normal.norm();
        let area_pair = pair_vec.cross(&joint_vec).norm();
        tri_area[edge.face as usize] = area;
        tri_area[pair.face as usize] = area_pair;

        // Don't link degenerate triangles.
        if area < length * self.precision || area_pair < length_pair * self.precision {
            return;
        }

        let volume = normal.dot(&pair_vec).abs();
        if volume > area.max(area_pair) * self.precision {
            return;
        }

        *face2face = (edge.face, pair.face);
    }

    /// Unmark a coplanar component if any member vertex is off the
    /// reference triangle's plane by more than precision.
    #[allow(clippy::cast_possible_wrap, clippy::cast_sign_loss)]
    fn check_coplanarity(&self, comp2tri: &mut [i32], components: &[i32], tri: usize) {
        let component = components[tri] as usize;
        let reference_tri = comp2tri[component];
        if reference_tri < 0 || reference_tri == tri as i32 {
            return;
        }
        let rt = reference_tri as usize;

        let origin = self.vert_pos[self.halfedge[3 * rt].start_vert as usize];
        let normal = (self.vert_pos[self.halfedge[3 * rt + 1].start_vert as usize] - origin)
            .cross(&(self.vert_pos[self.halfedge[3 * rt + 2].start_vert as usize] - origin))
            .try_normalize(0.0)
            .unwrap_or_else(Vector3::zeros);

        for i in 0..3 {
            let vert = self.vert_pos[self.halfedge[3 * tri + i].start_vert as usize];
            if normal.dot(&(vert - origin)).abs() > self.precision {
                comp2tri[component] = -1;
                break;
            }
        }
    }
}

/// Gather a vector through a new-to-old index mapping.
fn gather<T: Copy>(source: &[T], new2old: &[usize]) -> Vec<T> {
    new2old.iter().map(|&old| source[old]).collect()
}

/// Label the connected components of a face-adjacency graph given as
/// edge pairs. Returns the number of components.
#[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap, clippy::cast_sign_loss)]
fn connected_components(components: &mut [i32], num_nodes: usize, edges: &[(i32, i32)]) -> usize {
    let mut graph: Vec<Vec<i32>> = vec![Vec::new(); num_nodes];
    for &(a, b) in edges {
        if a >= 0 {
            graph[a as usize].push(b);
            graph[b as usize].push(a);
        }
    }

    let mut num_component = 0_i32;
    let mut queue = VecDeque::new();
    for root in (0..num_nodes).rev() {
        if components[root] >= 0 {
            continue;
        }
        components[root] = num_component;
        queue.push_back(root);
        while let Some(node) = queue.pop_front() {
            for i in 0..graph[node].len() {
                let neighbor = graph[node][i] as usize;
                if components[neighbor] < 0 {
                    components[neighbor] = num_component;
                    queue.push_back(neighbor);
                }
            }
        }
        num_component += 1;
    }
    num_component as usize
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp, clippy::cast_sign_loss)]
mod tests {
    use super::*;
    use mesh_types::unit_cube;

    #[test]
    fn cube_builds_manifold() {
        let mut ids = MeshIdAllocator::new();
        let m = Manifold::from_mesh(&unit_cube(), &mut ids).unwrap();
        assert!(m.is_manifold());
        assert_eq!(m.num_tri(), 12);
        assert_eq!(m.vert_pos.len(), 8);
        assert!(m.collider.is_some());
    }

    #[test]
    fn triangle_soup_is_welded() {
        // Same cube but with every triangle carrying its own copies of
        // the corner positions.
        let indexed = unit_cube();
        let mut soup = IndexedMesh::new();
        for tri in indexed.triangles() {
            let base = soup.vertices.len() as u32;
            soup.vertices.push(tri.v0);
            soup.vertices.push(tri.v1);
            soup.vertices.push(tri.v2);
            soup.faces.push([base, base + 1, base + 2]);
        }

        let mut ids = MeshIdAllocator::new();
        let m = Manifold::from_mesh(&soup, &mut ids).unwrap();
        assert_eq!(m.vert_pos.len(), 8);
        assert!(m.is_manifold());
    }

    #[test]
    fn round_trip_preserves_volume() {
        let mut ids = MeshIdAllocator::new();
        let m = Manifold::from_mesh(&unit_cube(), &mut ids).unwrap();
        let out = m.to_mesh();
        assert!((out.volume() - 1.0).abs() < 1e-9);
        assert!((out.surface_area() - 6.0).abs() < 1e-9);
    }

    #[test]
    fn normals_are_unit_and_outward() {
        let mut ids = MeshIdAllocator::new();
        let m = Manifold::from_mesh(&unit_cube(), &mut ids).unwrap();

        for (face, normal) in m.face_normal.iter().enumerate() {
            assert!((normal.norm() - 1.0).abs() < 1e-9);
            // Outward: normal points away from the cube center.
            let v = m.vert_pos[m.halfedge[3 * face].start_vert as usize];
            let center = Point3::new(0.5, 0.5, 0.5);
            assert!(normal.dot(&(v - center)) > 0.0, "face {face} points inward");
        }
        for normal in &m.vert_normal {
            assert!((normal.norm() - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn coplanar_faces_share_reference() {
        let mut ids = MeshIdAllocator::new();
        let m = Manifold::from_mesh(&unit_cube(), &mut ids).unwrap();

        // Each cube side has two coplanar triangles; they must agree on
        // a provenance representative.
        let mut seen: HashMap<i32, usize> = HashMap::new();
        for r in &m.tri_ref {
            *seen.entry(r.tri).or_insert(0) += 1;
        }
        assert_eq!(seen.len(), 6);
        assert!(seen.values().all(|&count| count == 2));
    }

    #[test]
    fn non_manifold_detected() {
        let mut ids = MeshIdAllocator::new();
        let mut m = Manifold::from_mesh(&unit_cube(), &mut ids).unwrap();
        m.halfedge[0].paired_halfedge = -1;
        assert!(!m.is_manifold());
    }

    #[test]
    fn id_allocator_is_monotonic() {
        let mut ids = MeshIdAllocator::new();
        let a = ids.reserve(1);
        let b = ids.reserve(3);
        let c = ids.reserve(1);
        assert!(a < b && b < c);
        assert_eq!(c - b, 3);
    }

    #[test]
    fn next_halfedge_wraps_in_triangle() {
        assert_eq!(next_halfedge(3), 4);
        assert_eq!(next_halfedge(4), 5);
        assert_eq!(next_halfedge(5), 3);
    }

    #[test]
    fn empty_mesh_builds_empty_manifold() {
        let mut ids = MeshIdAllocator::new();
        let m = Manifold::from_mesh(&IndexedMesh::new(), &mut ids).unwrap();
        assert!(m.is_empty());
        assert!(m.to_mesh().is_empty());
    }
}
