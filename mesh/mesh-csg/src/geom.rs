//! Floating-point geometric primitives.
//!
//! `interpolate` and `intersect` are the only places in the whole
//! boolean pipeline where rounding-sensitive floating-point arithmetic
//! happens. They are written to minimize rounding error and to be
//! exact at edge cases, so that the combinatorial layers above them
//! stay consistent.

use crate::error::{CsgError, CsgResult};
use nalgebra::{Point3, Vector2, Vector3, Vector4};

/// Orientation of three 2D points.
///
/// Returns 1 for counter-clockwise, -1 for clockwise, and 0 when the
/// triangle's area is within `tol` of colinear relative to its longest
/// edge.
#[must_use]
pub fn ccw(p0: Vector2<f64>, p1: Vector2<f64>, p2: Vector2<f64>, tol: f64) -> i32 {
    let v1 = p1 - p0;
    let v2 = p2 - p0;
    let area = v1.x * v2.y - v1.y * v2.x;
    let base2 = v1.norm_squared().max(v2.norm_squared());
    if area * area * 4.0 <= base2 * tol * tol {
        return 0;
    }
    if area > 0.0 {
        1
    } else {
        -1
    }
}

/// A 3x2 projection matrix mapping 3D positions to a 2D plane.
pub type Projection = [[f64; 2]; 3];

/// Build the axis-aligned projection closest to `normal`.
///
/// Projecting onto a coordinate plane instead of the exact face plane
/// avoids introducing any rounding error; the column swap keeps the
/// projected polygons CCW.
#[must_use]
pub fn axis_aligned_projection(normal: &Vector3<f64>) -> Projection {
    let abs = normal.abs();
    let mut projection: Projection = [[0.0; 2]; 3];
    let xyz_max = if abs.z > abs.x && abs.z > abs.y {
        projection[0][0] = 1.0;
        projection[1][1] = 1.0;
        normal.z
    } else if abs.y > abs.x {
        projection[0][1] = 1.0;
        projection[2][0] = 1.0;
        normal.y
    } else {
        projection[1][0] = 1.0;
        projection[2][1] = 1.0;
        normal.x
    };
    if xyz_max < 0.0 {
        projection[0][0] *= -1.0;
        projection[1][0] *= -1.0;
        projection[2][0] *= -1.0;
    }
    projection
}

/// Apply a [`Projection`] to a position.
#[must_use]
pub fn project(projection: &Projection, v: &Point3<f64>) -> Vector2<f64> {
    Vector2::new(
        projection[0][0] * v.x + projection[1][0] * v.y + projection[2][0] * v.z,
        projection[0][1] * v.x + projection[1][1] * v.y + projection[2][1] * v.z,
    )
}

/// Interpolate a segment at a given x value.
///
/// For a segment `pL -> pR` with `x` inside its x-range, returns the
/// (y, z) of the point on the segment at that x. The nearer endpoint
/// is used as the base of the interpolation to minimize rounding
/// error; a degenerate (vertical) segment returns `pL`'s (y, z).
///
/// # Errors
///
/// Returns [`CsgError::InvalidInput`] when `x` lies strictly outside
/// the segment's x-range.
pub fn interpolate(p_l: Vector3<f64>, p_r: Vector3<f64>, x: f64) -> CsgResult<Vector2<f64>> {
    let dx_l = x - p_l.x;
    let dx_r = x - p_r.x;
    if dx_l * dx_r > 0.0 {
        return Err(CsgError::invalid_input(format!(
            "interpolation at x={x} is outside the segment x-range [{}, {}]",
            p_l.x, p_r.x
        )));
    }
    let use_l = dx_l.abs() < dx_r.abs();
    let lambda = (if use_l { dx_l } else { dx_r }) / (p_r.x - p_l.x);
    if !lambda.is_finite() {
        return Ok(Vector2::new(p_l.y, p_l.z));
    }
    let y = (if use_l { p_l.y } else { p_r.y }) + lambda * (p_r.y - p_l.y);
    let z = (if use_l { p_l.z } else { p_r.z }) + lambda * (p_r.z - p_l.z);
    Ok(Vector2::new(y, z))
}

/// Intersect two segments sharing an x-range.
///
/// Given segments `pL -> pR` and `qL -> qR` with exactly equal
/// endpoint x values, computes their crossing in the x/y plane and
/// interpolates each segment's z there. Returns `(x, y, zP, zQ)`.
/// The result is independent of argument order by construction: the
/// smaller y-difference side drives the interpolation.
///
/// # Errors
///
/// Returns [`CsgError::InvalidInput`] when the x-ranges differ or the
/// segments do not cross.
pub fn intersect(
    p_l: Vector3<f64>,
    p_r: Vector3<f64>,
    q_l: Vector3<f64>,
    q_r: Vector3<f64>,
) -> CsgResult<Vector4<f64>> {
    if p_l.x != q_l.x || p_r.x != q_r.x {
        return Err(CsgError::invalid_input(
            "segment intersection requires exactly matching x-ranges",
        ));
    }
    let dy_l = q_l.y - p_l.y;
    let dy_r = q_r.y - p_r.y;
    if dy_l * dy_r > 0.0 {
        return Err(CsgError::invalid_input(
            "segments do not cross within their x-range",
        ));
    }
    let use_l = dy_l.abs() < dy_r.abs();
    let dx = p_r.x - p_l.x;
    let mut lambda = (if use_l { dy_l } else { dy_r }) / (dy_l - dy_r);
    if !lambda.is_finite() {
        lambda = 0.0;
    }

    let x = (if use_l { p_l.x } else { p_r.x }) + lambda * dx;
    let p_dy = p_r.y - p_l.y;
    let q_dy = q_r.y - q_l.y;
    let use_p = p_dy.abs() < q_dy.abs();
    let y = (if use_l {
        if use_p {
            p_l.y
        } else {
            q_l.y
        }
    } else if use_p {
        p_r.y
    } else {
        q_r.y
    }) + lambda * (if use_p { p_dy } else { q_dy });
    let z = (if use_l { p_l.z } else { p_r.z }) + lambda * (p_r.z - p_l.z);
    let w = (if use_l { q_l.z } else { q_r.z }) + lambda * (q_r.z - q_l.z);
    Ok(Vector4::new(x, y, z, w))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;

    #[test]
    fn interpolate_midpoint() {
        let yz = interpolate(
            Vector3::new(0.0, 2.0, 0.0),
            Vector3::new(1.0, 3.0, 0.0),
            0.5,
        )
        .unwrap();
        assert_eq!(yz, Vector2::new(2.5, 0.0));

        let yz = interpolate(
            Vector3::new(0.0, 2.0, 4.0),
            Vector3::new(1.0, 3.0, 5.0),
            0.5,
        )
        .unwrap();
        assert_eq!(yz, Vector2::new(2.5, 4.5));
    }

    #[test]
    fn interpolate_out_of_domain() {
        let result = interpolate(
            Vector3::new(0.0, 2.0, 0.0),
            Vector3::new(1.0, 3.0, 0.0),
            8.0,
        );
        assert!(matches!(result, Err(CsgError::InvalidInput { .. })));
    }

    #[test]
    fn interpolate_degenerate_segment() {
        let yz = interpolate(
            Vector3::new(1.0, 2.0, 3.0),
            Vector3::new(1.0, 5.0, 6.0),
            1.0,
        )
        .unwrap();
        assert_eq!(yz, Vector2::new(2.0, 3.0));
    }

    #[test]
    fn intersect_crossing_segments() {
        let r = intersect(
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(1.0, 1.0, 0.0),
            Vector3::new(0.0, 1.0, 0.0),
            Vector3::new(1.0, 0.0, 0.0),
        )
        .unwrap();
        assert_eq!(r, Vector4::new(0.5, 0.5, 0.0, 0.0));

        let r = intersect(
            Vector3::new(0.0, 0.0, 3.0),
            Vector3::new(1.0, 1.0, 3.0),
            Vector3::new(0.0, 1.0, 4.0),
            Vector3::new(1.0, 0.0, 4.0),
        )
        .unwrap();
        assert_eq!(r, Vector4::new(0.5, 0.5, 3.0, 4.0));

        let r = intersect(
            Vector3::new(0.0, 0.0, 3.0),
            Vector3::new(2.0, 4.0, 3.0),
            Vector3::new(0.0, 1.0, 4.0),
            Vector3::new(2.0, 0.0, 4.0),
        )
        .unwrap();
        assert_eq!(r, Vector4::new(0.4, 0.8, 3.0, 4.0));

        let r = intersect(
            Vector3::new(0.0, 0.0, 3.0),
            Vector3::new(2.0, 1.0, 3.0),
            Vector3::new(0.0, 2.0, 4.0),
            Vector3::new(2.0, -2.0, 4.0),
        )
        .unwrap();
        assert_eq!(r, Vector4::new(0.8, 0.4, 3.0, 4.0));
    }

    #[test]
    fn intersect_uneven_slopes() {
        let r = intersect(
            Vector3::new(0.0, 0.0, 3.0),
            Vector3::new(3.0, 10.0, 3.0),
            Vector3::new(0.0, 7.0, 4.0),
            Vector3::new(3.0, 0.0, 4.0),
        )
        .unwrap();
        assert_eq!(r.x, 1.235_294_117_647_058_9);
        assert_eq!(r.y, 4.117_647_058_823_529);
        assert_eq!(r.z, 3.0);
        assert_eq!(r.w, 4.0);
    }

    #[test]
    fn intersect_mismatched_range_fails() {
        let result = intersect(
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(1.0, 1.0, 0.0),
            Vector3::new(0.0, 1.0, 0.0),
            Vector3::new(2.0, 0.0, 0.0),
        );
        assert!(matches!(result, Err(CsgError::InvalidInput { .. })));
    }

    #[test]
    fn ccw_orientation() {
        let p0 = Vector2::new(0.0, 0.0);
        let p1 = Vector2::new(1.0, 0.0);
        let p2 = Vector2::new(0.0, 1.0);
        assert_eq!(ccw(p0, p1, p2, 1e-9), 1);
        assert_eq!(ccw(p0, p2, p1, 1e-9), -1);
        assert_eq!(ccw(p0, p1, Vector2::new(2.0, 0.0), 1e-9), 0);
    }

    #[test]
    fn ccw_tolerance_scales_with_edge_length() {
        // Slightly off-line point: colinear at a loose tolerance,
        // oriented at a tight one.
        let p0 = Vector2::new(0.0, 0.0);
        let p1 = Vector2::new(10.0, 0.0);
        let p2 = Vector2::new(5.0, 1e-6);
        assert_eq!(ccw(p0, p1, p2, 1e-3), 0);
        assert_eq!(ccw(p0, p1, p2, 1e-9), 1);
    }

    #[test]
    fn projection_preserves_winding() {
        // +Z normal projects to identity in XY.
        let proj = axis_aligned_projection(&Vector3::new(0.0, 0.0, 1.0));
        let p = project(&proj, &Point3::new(3.0, 4.0, 5.0));
        assert_eq!(p, Vector2::new(3.0, 4.0));

        // -Z normal flips the first column so winding stays CCW.
        let proj = axis_aligned_projection(&Vector3::new(0.0, 0.0, -1.0));
        let p = project(&proj, &Point3::new(3.0, 4.0, 5.0));
        assert_eq!(p, Vector2::new(-3.0, 4.0));
    }
}
