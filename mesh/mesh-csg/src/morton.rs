//! 30-bit Morton codes for spatial sorting.
//!
//! Vertices and faces are sorted along a Z-order (Morton) curve before
//! building the collider, so that nearby elements end up nearby in
//! memory and the radix tree stays shallow. Removed elements get the
//! sentinel code [`K_NO_CODE`], which sorts them past every live
//! element so a single truncation drops them.

use mesh_types::{Aabb, Point3};

/// Sentinel Morton code for removed elements.
///
/// Larger than any valid 30-bit code, so a sort-then-truncate pass
/// compacts tombstones away.
pub const K_NO_CODE: u32 = 0xFFFF_FFFF;

/// Spread the low 10 bits of `v` so there are two zero bits between
/// each of them.
fn spread_bits3(v: u32) -> u32 {
    let mut v = v.wrapping_mul(0x0001_0001) & 0xFF00_00FF;
    v = v.wrapping_mul(0x0000_0101) & 0x0F00_F00F;
    v = v.wrapping_mul(0x0000_0011) & 0xC30C_30C3;
    v = v.wrapping_mul(0x0000_0005) & 0x4924_9249;
    v
}

/// Compute the 30-bit Morton code of a position within `bbox`.
///
/// Each axis is quantized to 10 bits relative to the box extent and the
/// bits are interleaved x-major. Positions with a NaN coordinate
/// (tombstoned vertices) map to [`K_NO_CODE`].
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn morton_code(position: &Point3<f64>, bbox: &Aabb) -> u32 {
    if position.x.is_nan() {
        return K_NO_CODE;
    }

    let size = bbox.max - bbox.min;
    let offset = position - bbox.min;

    let mut code = 0_u32;
    for (i, shift) in [(0_usize, 2_u32), (1, 1), (2, 0)] {
        // A zero-extent axis normalizes to NaN; max() maps that to 0.
        let t = 1024.0 * (offset[i] / size[i]);
        let q = t.max(0.0).min(1023.0) as u32;
        code |= spread_bits3(q) << shift;
    }
    code
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;

    fn unit_box() -> Aabb {
        Aabb::new(Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 1.0, 1.0))
    }

    #[test]
    fn corner_codes() {
        let b = unit_box();
        assert_eq!(morton_code(&Point3::new(0.0, 0.0, 0.0), &b), 0);
        assert_eq!(morton_code(&Point3::new(1.0, 0.0, 0.0), &b), 613_566_756);
        assert_eq!(morton_code(&Point3::new(0.0, 1.0, 0.0), &b), 306_783_378);
        assert_eq!(morton_code(&Point3::new(1.0, 1.0, 0.0), &b), 920_350_134);
    }

    #[test]
    fn interior_codes() {
        let b = unit_box();
        assert_eq!(
            morton_code(&Point3::new(0.0, 0.333_333, 0.333_333), &b),
            51_130_563
        );
        assert_eq!(
            morton_code(&Point3::new(0.666_666, 0.333_333, 0.0), &b),
            579_479_714
        );
    }

    #[test]
    fn nan_position_gets_sentinel() {
        let b = unit_box();
        assert_eq!(morton_code(&Point3::new(f64::NAN, 0.0, 0.0), &b), K_NO_CODE);
    }

    #[test]
    fn sentinel_sorts_last() {
        let b = unit_box();
        let live = morton_code(&Point3::new(1.0, 1.0, 1.0), &b);
        assert!(live < K_NO_CODE);
    }

    #[test]
    fn codes_preserve_locality() {
        let b = unit_box();
        let near_origin = morton_code(&Point3::new(0.01, 0.01, 0.01), &b);
        let far_corner = morton_code(&Point3::new(0.99, 0.99, 0.99), &b);
        assert!(near_origin < far_corner);
    }
}
