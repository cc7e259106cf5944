//! Narrow-phase intersection kernels.
//!
//! Every geometric predicate here is built on the shadow function: "q
//! shadows p in direction dir" is `p < q`, with exact ties broken by
//! the sign of `dir`. Ties are resolved by symbolically perturbing the
//! first mesh along its vertex normals, scaled by `expand_p` (+1 to
//! expand for union, -1 to contract otherwise), so that degenerate
//! contact between the inputs always resolves consistently and the
//! output never contains zero-thickness shards.
//!
//! The kernels build up dimension by dimension: vertex-edge shadows in
//! x, then y (`shadow01`), vertex-face shadows with z interpolation
//! (`kernel02`), edge-edge XY crossings (`kernel11`), and finally
//! edge-face piercings (`kernel12`), each level consuming the results
//! of the ones below through binary searches into the sorted pair
//! stores.

use crate::error::{CsgError, CsgResult};
use crate::geom::{interpolate, intersect};
use crate::manifold::Manifold;
use crate::sparse::SparseIndices;
use mesh_types::{Point3, Vector3};
use nalgebra::{Vector2, Vector4};
use rayon::prelude::*;

/// Whether `q` shadows `p`, with ties broken by the perturbation
/// direction.
fn shadows(p: f64, q: f64, dir: f64) -> bool {
    if p == q {
        dir < 0.0
    } else {
        p < q
    }
}

/// Rounding trouble inside a kernel means the input was not
/// epsilon-valid; report it as bad geometry rather than a caller bug.
fn epsilon_invalid(err: CsgError) -> CsgError {
    match err {
        CsgError::InvalidInput { details } => {
            CsgError::geometry(format!("epsilon-invalid geometry: {details}"))
        }
        other => other,
    }
}

/// Shadow of vertex `p0` over edge `q1`, restricted to the x then y
/// axes. Returns the net shadow in {-1, 0, 1} and the (y, z) of the
/// edge interpolated at the vertex's x (NaN when the x-ranges do not
/// overlap).
///
/// Called from both the vertex-face and edge-edge kernels; both call
/// sites must agree exactly on the result for the same arguments, which
/// they do because this is the single shared definition.
#[allow(clippy::cast_sign_loss)]
fn shadow01(
    p0: usize,
    q1: usize,
    vert_pos_p: &[Point3<f64>],
    in_q: &Manifold,
    expand_p: f64,
    normal_p: &[Vector3<f64>],
    reverse: bool,
) -> CsgResult<(i32, Vector2<f64>)> {
    let q1s = in_q.halfedge[q1].start_vert as usize;
    let q1e = in_q.halfedge[q1].end_vert as usize;
    let p0x = vert_pos_p[p0].x;
    let q1sx = in_q.vert_pos[q1s].x;
    let q1ex = in_q.vert_pos[q1e].x;

    let mut s01 = if reverse {
        i32::from(shadows(q1sx, p0x, expand_p * normal_p[q1s].x))
            - i32::from(shadows(q1ex, p0x, expand_p * normal_p[q1e].x))
    } else {
        i32::from(shadows(p0x, q1ex, expand_p * normal_p[p0].x))
            - i32::from(shadows(p0x, q1sx, expand_p * normal_p[p0].x))
    };

    let mut yz01 = Vector2::new(f64::NAN, f64::NAN);
    if s01 != 0 {
        yz01 = interpolate(in_q.vert_pos[q1s].coords, in_q.vert_pos[q1e].coords, p0x)?;
        if reverse {
            let start2 = (in_q.vert_pos[q1s] - vert_pos_p[p0]).norm_squared();
            let end2 = (in_q.vert_pos[q1e] - vert_pos_p[p0]).norm_squared();
            let dir = if start2 < end2 {
                normal_p[q1s].y
            } else {
                normal_p[q1e].y
            };
            if !shadows(yz01.x, vert_pos_p[p0].y, expand_p * dir) {
                s01 = 0;
            }
        } else if !shadows(vert_pos_p[p0].y, yz01.x, expand_p * normal_p[p0].y) {
            s01 = 0;
        }
    }
    Ok((s01, yz01))
}

/// Shadow of vertex `p0` over face `q2`: the net of the three edge
/// shadows, with the face's z interpolated at the vertex's (x, y).
/// A nonzero shadow means a vertical ray from the vertex crosses the
/// face; the final z shadow test cancels crossings on the wrong side.
#[allow(clippy::cast_sign_loss)]
fn kernel02(
    vert_pos_p: &[Point3<f64>],
    in_q: &Manifold,
    forward: bool,
    expand_p: f64,
    vert_normal_p: &[Vector3<f64>],
    p0: usize,
    q2: usize,
) -> CsgResult<(i32, f64)> {
    let mut k = 0_usize;
    let mut yzz_rl = [Vector3::zeros(); 2];
    let mut shadowed = false;
    let mut closest_vert = None;
    let mut min_metric = f64::INFINITY;
    let mut s02 = 0_i32;

    let pos_p = vert_pos_p[p0];
    for i in 0..3 {
        let q1 = 3 * q2 + i;
        let edge = in_q.halfedge[q1];
        let q1f = if edge.is_forward() {
            q1
        } else {
            edge.paired_halfedge as usize
        };

        if !forward {
            let q_vert = in_q.halfedge[q1f].start_vert as usize;
            let metric = (pos_p - in_q.vert_pos[q_vert]).norm_squared();
            if metric < min_metric {
                min_metric = metric;
                closest_vert = Some(q_vert);
            }
        }

        let (s01, yz01) = shadow01(p0, q1f, vert_pos_p, in_q, expand_p, vert_normal_p, !forward)?;

        if yz01.x.is_finite() {
            s02 += s01 * if forward == edge.is_forward() { -1 } else { 1 };
            if k < 2 && (k == 0 || (s01 != 0) != shadowed) {
                shadowed = s01 != 0;
                yzz_rl[k] = Vector3::new(yz01.x, yz01.y, yz01.y);
                k += 1;
            }
        }
    }

    let mut z02 = f64::NAN;
    if s02 != 0 {
        if k < 2 {
            return Err(CsgError::geometry("unpaired vertex-face shadow"));
        }
        z02 = interpolate(yzz_rl[0], yzz_rl[1], pos_p.y)?.y;
        if forward {
            if !shadows(pos_p.z, z02, expand_p * vert_normal_p[p0].z) {
                s02 = 0;
            }
        } else {
            let closest = closest_vert
                .ok_or_else(|| CsgError::invariant("vertex-face shadow with no closest vertex"))?;
            if !shadows(z02, pos_p.z, expand_p * vert_normal_p[closest].z) {
                s02 = 0;
            }
        }
    }
    Ok((s02, z02))
}

/// XY crossing of edge `p1` with edge `q1`: net of the four endpoint
/// shadows, with both edges' z interpolated at the crossing. Returns
/// `(x, y, zP, zQ)` and the net shadow.
#[allow(clippy::cast_sign_loss)]
fn kernel11(
    in_p: &Manifold,
    in_q: &Manifold,
    expand_p: f64,
    p1: usize,
    q1: usize,
) -> CsgResult<(Vector4<f64>, i32)> {
    let normal_p = &in_p.vert_normal;
    let mut k = 0_usize;
    let mut p_rl = [Vector3::zeros(); 2];
    let mut q_rl = [Vector3::zeros(); 2];
    let mut shadowed = false;
    let mut s11 = 0_i32;

    let p0 = [
        in_p.halfedge[p1].start_vert as usize,
        in_p.halfedge[p1].end_vert as usize,
    ];
    for (i, &p_vert) in p0.iter().enumerate() {
        let (s01, yz01) = shadow01(p_vert, q1, &in_p.vert_pos, in_q, expand_p, normal_p, false)?;
        if yz01.x.is_finite() {
            s11 += s01 * if i == 0 { -1 } else { 1 };
            if k < 2 && (k == 0 || (s01 != 0) != shadowed) {
                shadowed = s01 != 0;
                p_rl[k] = in_p.vert_pos[p_vert].coords;
                q_rl[k] = Vector3::new(p_rl[k].x, yz01.x, yz01.y);
                k += 1;
            }
        }
    }

    let q0 = [
        in_q.halfedge[q1].start_vert as usize,
        in_q.halfedge[q1].end_vert as usize,
    ];
    for (i, &q_vert) in q0.iter().enumerate() {
        let (s10, yz10) = shadow01(q_vert, p1, &in_q.vert_pos, in_p, expand_p, normal_p, true)?;
        // NaN means the x-ranges do not overlap.
        if yz10.x.is_finite() {
            s11 += s10 * if i == 0 { -1 } else { 1 };
            if k < 2 && (k == 0 || (s10 != 0) != shadowed) {
                shadowed = s10 != 0;
                q_rl[k] = in_q.vert_pos[q_vert].coords;
                p_rl[k] = Vector3::new(q_rl[k].x, yz10.x, yz10.y);
                k += 1;
            }
        }
    }

    if s11 == 0 {
        return Ok((Vector4::new(f64::NAN, f64::NAN, f64::NAN, f64::NAN), 0));
    }
    if k < 2 {
        return Err(CsgError::geometry("unpaired edge-edge shadow"));
    }
    let xyzz = intersect(p_rl[0], p_rl[1], q_rl[0], q_rl[1])?;

    let p1s = in_p.halfedge[p1].start_vert as usize;
    let p1e = in_p.halfedge[p1].end_vert as usize;
    let crossing = Point3::new(xyzz.x, xyzz.y, xyzz.z);
    let start2 = (in_p.vert_pos[p1s] - crossing).norm_squared();
    let end2 = (in_p.vert_pos[p1e] - crossing).norm_squared();
    let dir = if start2 < end2 {
        normal_p[p1s].z
    } else {
        normal_p[p1e].z
    };

    let s11 = if shadows(xyzz.z, xyzz.w, expand_p * dir) {
        s11
    } else {
        0
    };
    Ok((xyzz, s11))
}

/// Piercing of edge `p1` through face `q2`: combines the two
/// vertex-face shadows of the edge's endpoints with the three
/// edge-edge crossings of the face's edges, then intersects in
/// xzy-space to find the piercing point. Pairs absent from the stores
/// have shadow zero.
#[allow(clippy::too_many_arguments, clippy::cast_possible_truncation, clippy::cast_possible_wrap, clippy::cast_sign_loss)]
fn kernel12(
    p0q2: &SparseIndices,
    s02: &[i32],
    z02: &[f64],
    p1q1: &SparseIndices,
    s11: &[i32],
    xyzz11: &[Vector4<f64>],
    in_p: &Manifold,
    in_q: &Manifold,
    forward: bool,
    p1: usize,
    q2: usize,
) -> CsgResult<(i32, Vector3<f64>)> {
    // Slot 0 is the left bound, slot 1 the right. Exactly one of the
    // two must shadow, bracketing the intersection between them.
    let mut k = 0_usize;
    let mut xzy_lr0 = [Vector3::zeros(); 2];
    let mut xzy_lr1 = [Vector3::zeros(); 2];
    let mut shadowed = false;
    let mut x12 = 0_i32;

    let edge = in_p.halfedge[p1];
    for vert in [edge.start_vert, edge.end_vert] {
        let (kp, kq) = if forward {
            (vert, q2 as i32)
        } else {
            (q2 as i32, vert)
        };
        if let Some(idx) = p0q2.binary_search(kp, kq) {
            let s = s02[idx];
            x12 += s * if (vert == edge.start_vert) == forward { 1 } else { -1 };

            if k < 2 && (k == 0 || (s != 0) != shadowed) {
                shadowed = s != 0;
                let pos = in_p.vert_pos[vert as usize];
                xzy_lr0[k] = Vector3::new(pos.x, pos.z, pos.y);
                xzy_lr1[k] = xzy_lr0[k];
                xzy_lr1[k].y = z02[idx];
                k += 1;
            }
        }
    }

    for i in 0..3 {
        let q1 = (3 * q2 + i) as i32;
        let edge_q = in_q.halfedge[q1 as usize];
        let q1f = if edge_q.is_forward() {
            q1
        } else {
            edge_q.paired_halfedge
        };
        let (kp, kq) = if forward {
            (p1 as i32, q1f)
        } else {
            (q1f, p1 as i32)
        };
        if let Some(idx) = p1q1.binary_search(kp, kq) {
            let s = s11[idx];
            x12 -= s * if edge_q.is_forward() { 1 } else { -1 };

            if k < 2 && (k == 0 || (s != 0) != shadowed) {
                shadowed = s != 0;
                let xyzz = xyzz11[idx];
                xzy_lr0[k] = Vector3::new(xyzz.x, xyzz.z, xyzz.y);
                xzy_lr1[k] = xzy_lr0[k];
                xzy_lr1[k].y = xyzz.w;
                if !forward {
                    let (a, b) = (xzy_lr0[k].y, xzy_lr1[k].y);
                    xzy_lr0[k].y = b;
                    xzy_lr1[k].y = a;
                }
                k += 1;
            }
        }
    }

    if x12 == 0 {
        return Ok((0, Vector3::new(f64::NAN, f64::NAN, f64::NAN)));
    }
    if k < 2 {
        return Err(CsgError::geometry("unpaired edge-face shadow"));
    }
    let xzyy = intersect(xzy_lr0[0], xzy_lr0[1], xzy_lr1[0], xzy_lr1[1])?;
    Ok((x12, Vector3::new(xzyy.x, xzyy.z, xzyy.y)))
}

/// Drop the pairs whose value is non-finite, keeping the pair store and
/// all value columns aligned.
fn keep_finite<T>(pairs: &mut SparseIndices, keep: &[bool], values: Vec<T>) -> Vec<T> {
    pairs.retain(keep);
    values
        .into_iter()
        .zip(keep)
        .filter_map(|(v, &k)| k.then_some(v))
        .collect()
}

/// Compute vertex-face shadows for every candidate pair, dropping the
/// pairs whose projections miss entirely.
///
/// # Errors
///
/// Returns [`CsgError::GeometryInvalid`] if a kernel hits
/// epsilon-invalid geometry.
#[allow(clippy::cast_sign_loss)]
pub fn shadow02(
    in_p: &Manifold,
    in_q: &Manifold,
    p0q2: &mut SparseIndices,
    forward: bool,
    expand_p: f64,
) -> CsgResult<(Vec<i32>, Vec<f64>)> {
    let vert_normal_p = if forward {
        &in_p.vert_normal
    } else {
        &in_q.vert_normal
    };

    let pairs: Vec<(i32, i32)> = (0..p0q2.len()).map(|i| p0q2.get(i)).collect();
    let results: Vec<(i32, f64)> = pairs
        .par_iter()
        .map(|&(p, q)| {
            let (p0, q2) = if forward { (p, q) } else { (q, p) };
            kernel02(
                &in_p.vert_pos,
                in_q,
                forward,
                expand_p,
                vert_normal_p,
                p0 as usize,
                q2 as usize,
            )
        })
        .collect::<CsgResult<_>>()
        .map_err(epsilon_invalid)?;

    let keep: Vec<bool> = results.iter().map(|r| r.1.is_finite()).collect();
    let (s02, z02): (Vec<i32>, Vec<f64>) = results.into_iter().unzip();
    let s02 = keep_finite(p0q2, &keep, s02);
    let z02 = z02
        .into_iter()
        .zip(&keep)
        .filter_map(|(v, &k)| k.then_some(v))
        .collect();
    Ok((s02, z02))
}

/// Compute edge-edge crossings for every candidate pair, dropping the
/// pairs that do not cross.
///
/// # Errors
///
/// Returns [`CsgError::GeometryInvalid`] if a kernel hits
/// epsilon-invalid geometry.
#[allow(clippy::cast_sign_loss)]
pub fn shadow11(
    p1q1: &mut SparseIndices,
    in_p: &Manifold,
    in_q: &Manifold,
    expand_p: f64,
) -> CsgResult<(Vec<i32>, Vec<Vector4<f64>>)> {
    let pairs: Vec<(i32, i32)> = (0..p1q1.len()).map(|i| p1q1.get(i)).collect();
    let results: Vec<(Vector4<f64>, i32)> = pairs
        .par_iter()
        .map(|&(p1, q1)| kernel11(in_p, in_q, expand_p, p1 as usize, q1 as usize))
        .collect::<CsgResult<_>>()
        .map_err(epsilon_invalid)?;

    let keep: Vec<bool> = results
        .iter()
        .map(|r| r.0.iter().all(|c| c.is_finite()))
        .collect();
    let (xyzz11, s11): (Vec<Vector4<f64>>, Vec<i32>) = results.into_iter().unzip();
    let s11 = keep_finite(p1q1, &keep, s11);
    let xyzz11 = xyzz11
        .into_iter()
        .zip(&keep)
        .filter_map(|(v, &k)| k.then_some(v))
        .collect();
    Ok((s11, xyzz11))
}

/// Expand edge-face candidate pairs into the set of edge-edge pairs
/// their shadows depend on: for each candidate, the three forward
/// edges of the face.
pub fn filter11(
    in_p: &Manifold,
    in_q: &Manifold,
    p1q2: &SparseIndices,
    p2q1: &SparseIndices,
) -> SparseIndices {
    let mut p1q1 = SparseIndices::zeroed(3 * p1q2.len() + 3 * p2q1.len());

    for i in 0..p1q2.len() {
        let (p, q) = p1q2.get(i);
        copy_face_edges(&mut p1q1, in_q, p, q, i);
    }

    p1q1.swap_pq();
    for i in 0..p2q1.len() {
        let (p, q) = p2q1.get(i);
        copy_face_edges(&mut p1q1, in_p, q, p, p1q2.len() + i);
    }
    p1q1.swap_pq();
    p1q1.unique();
    p1q1
}

#[allow(clippy::cast_sign_loss)]
fn copy_face_edges(px_q1: &mut SparseIndices, face_mesh: &Manifold, p_x: i32, q2: i32, index: usize) {
    for i in 0..3 {
        let q1 = 3 * q2 + i;
        let edge = face_mesh.halfedge[q1 as usize];
        let p_y = if edge.is_forward() {
            q1
        } else {
            edge.paired_halfedge
        };
        px_q1.set(3 * index + i as usize, p_x, p_y);
    }
}

/// Compute edge-face piercings for every candidate pair, dropping the
/// pairs that do not pierce. Returns the crossing direction and the
/// intersection vertex for each surviving pair.
///
/// # Errors
///
/// Returns [`CsgError::GeometryInvalid`] if a kernel hits
/// epsilon-invalid geometry.
#[allow(clippy::too_many_arguments, clippy::cast_sign_loss)]
pub fn intersect12(
    in_p: &Manifold,
    in_q: &Manifold,
    s02: &[i32],
    p0q2: &SparseIndices,
    s11: &[i32],
    p1q1: &SparseIndices,
    z02: &[f64],
    xyzz11: &[Vector4<f64>],
    p1q2: &mut SparseIndices,
    forward: bool,
) -> CsgResult<(Vec<i32>, Vec<Vector3<f64>>)> {
    let pairs: Vec<(i32, i32)> = (0..p1q2.len()).map(|i| p1q2.get(i)).collect();
    let results: Vec<(i32, Vector3<f64>)> = pairs
        .par_iter()
        .map(|&(p, q)| {
            let (p1, q2) = if forward { (p, q) } else { (q, p) };
            kernel12(
                p0q2,
                s02,
                z02,
                p1q1,
                s11,
                xyzz11,
                in_p,
                in_q,
                forward,
                p1 as usize,
                q2 as usize,
            )
        })
        .collect::<CsgResult<_>>()
        .map_err(epsilon_invalid)?;

    let keep: Vec<bool> = results
        .iter()
        .map(|r| r.1.iter().all(|c| c.is_finite()))
        .collect();
    let (x12, v12): (Vec<i32>, Vec<Vector3<f64>>) = results.into_iter().unzip();
    let x12 = keep_finite(p1q2, &keep, x12);
    let v12 = v12
        .into_iter()
        .zip(&keep)
        .filter_map(|(v, &k)| k.then_some(v))
        .collect();
    Ok((x12, v12))
}

/// Per-vertex winding numbers: the sum of vertex-face shadows over each
/// vertex. Vertices with no shadowed pairs have winding zero.
#[allow(clippy::cast_sign_loss)]
pub fn winding03(num_vert: usize, p0q2: &SparseIndices, s02: &[i32], reverse: bool) -> Vec<i32> {
    let mut w03 = vec![0_i32; num_vert];
    let (verts, sums) = p0q2.reduce_by_key(reverse, s02);
    for (vert, sum) in verts.into_iter().zip(sums) {
        w03[vert as usize] = if reverse { -sum } else { sum };
    }
    w03
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use crate::manifold::MeshIdAllocator;
    use mesh_types::unit_cube;

    #[test]
    fn shadows_tie_breaks_by_direction() {
        assert!(shadows(0.0, 1.0, 1.0));
        assert!(!shadows(1.0, 0.0, -1.0));
        // Exact tie resolves by perturbation direction alone.
        assert!(shadows(0.5, 0.5, -1.0));
        assert!(!shadows(0.5, 0.5, 1.0));
    }

    #[test]
    fn vertex_inside_cube_has_winding_one() {
        let mut ids = MeshIdAllocator::new();
        let cube = Manifold::from_mesh(&unit_cube(), &mut ids).unwrap();

        let vert_pos = [Point3::new(0.3, 0.3, 0.3)];
        let vert_normal = [Vector3::new(0.0, 0.0, 1.0)];

        let mut total = 0;
        for q2 in 0..cube.num_tri() {
            let (s02, _z02) =
                kernel02(&vert_pos, &cube, true, 1.0, &vert_normal, 0, q2).unwrap();
            total += s02;
        }
        assert_eq!(total, 1);
    }

    #[test]
    fn vertex_outside_cube_has_winding_zero() {
        let mut ids = MeshIdAllocator::new();
        let cube = Manifold::from_mesh(&unit_cube(), &mut ids).unwrap();

        let vert_pos = [Point3::new(0.3, 0.3, 2.0)];
        let vert_normal = [Vector3::new(0.0, 0.0, 1.0)];

        let mut total = 0;
        for q2 in 0..cube.num_tri() {
            let (s02, _z02) =
                kernel02(&vert_pos, &cube, true, 1.0, &vert_normal, 0, q2).unwrap();
            total += s02;
        }
        assert_eq!(total, 0);
    }

    #[test]
    fn winding_scatter_negates_when_reversed() {
        let mut pairs = SparseIndices::new();
        pairs.push(0, 2);
        pairs.push(1, 2);
        pairs.push(2, 2);
        let s02 = [1, 0, -1];

        let w = winding03(4, &pairs, &s02, false);
        assert_eq!(w, vec![1, 0, -1, 0]);

        // Reversed: key on the q column, negate the sums.
        let mut pairs = SparseIndices::new();
        pairs.push(9, 0);
        pairs.push(9, 0);
        pairs.push(9, 2);
        let s02 = [1, 1, 1];
        let w = winding03(3, &pairs, &s02, true);
        assert_eq!(w, vec![-2, 0, -1]);
    }

    #[test]
    fn keep_finite_drops_pairs_and_values_together() {
        let mut pairs = SparseIndices::new();
        pairs.push(0, 0);
        pairs.push(1, 1);
        pairs.push(2, 2);
        let keep = [true, false, true];
        let values = keep_finite(&mut pairs, &keep, vec![10, 20, 30]);
        assert_eq!(values, vec![10, 30]);
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs.get(1), (2, 2));
    }
}
