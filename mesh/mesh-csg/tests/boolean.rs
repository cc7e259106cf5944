//! End-to-end boolean tests on axis-aligned solids, checking volumes,
//! surface areas, and watertightness of the results.

#![allow(clippy::unwrap_used)]

use approx::assert_relative_eq;
use mesh_csg::manifold::MeshIdAllocator;
use mesh_csg::{boolean, intersect, subtract, union, BooleanOp, Manifold};
use mesh_types::{cube, unit_cube, IndexedMesh, Point3};

fn assert_watertight(mesh: &IndexedMesh) {
    let mut ids = MeshIdAllocator::new();
    let m = Manifold::from_mesh(mesh, &mut ids).unwrap();
    assert!(m.is_manifold(), "result mesh is not manifold");
}

/// Cube with its corner overlapping the unit cube's far corner.
fn corner_cube() -> IndexedMesh {
    cube(Point3::new(0.5, 0.5, 0.5), 1.0)
}

#[test]
fn union_of_disjoint_cubes() {
    let a = unit_cube();
    let b = cube(Point3::new(3.0, 0.0, 0.0), 1.0);
    let out = union(&a, &b).unwrap();
    assert_relative_eq!(out.volume(), 2.0, epsilon = 1e-9);
    assert_relative_eq!(out.surface_area(), 12.0, epsilon = 1e-9);
    assert_eq!(out.face_count(), 24);
    assert_watertight(&out);
}

#[test]
fn intersect_of_disjoint_cubes_is_empty() {
    let a = unit_cube();
    let b = cube(Point3::new(3.0, 0.0, 0.0), 1.0);
    let out = intersect(&a, &b).unwrap();
    assert!(out.is_empty());
}

#[test]
fn subtract_of_disjoint_cubes_leaves_first() {
    let a = unit_cube();
    let b = cube(Point3::new(3.0, 0.0, 0.0), 1.0);
    let out = subtract(&a, &b).unwrap();
    assert_relative_eq!(out.volume(), 1.0, epsilon = 1e-9);
    assert_relative_eq!(out.surface_area(), 6.0, epsilon = 1e-9);
    assert_watertight(&out);
}

#[test]
fn union_of_overlapping_cubes() {
    let out = union(&unit_cube(), &corner_cube()).unwrap();
    // Overlap is a cube of side 0.5.
    assert_relative_eq!(out.volume(), 1.875, epsilon = 1e-9);
    assert_relative_eq!(out.surface_area(), 10.5, epsilon = 1e-9);
    assert_watertight(&out);
}

#[test]
fn intersect_of_overlapping_cubes() {
    let out = intersect(&unit_cube(), &corner_cube()).unwrap();
    assert_relative_eq!(out.volume(), 0.125, epsilon = 1e-9);
    assert_relative_eq!(out.surface_area(), 1.5, epsilon = 1e-9);
    assert_watertight(&out);
}

#[test]
fn subtract_of_overlapping_cubes() {
    let out = subtract(&unit_cube(), &corner_cube()).unwrap();
    assert_relative_eq!(out.volume(), 0.875, epsilon = 1e-9);
    assert_relative_eq!(out.surface_area(), 6.0, epsilon = 1e-9);
    assert_watertight(&out);
}

#[test]
fn intersect_and_subtract_partition_the_volume() {
    let a = unit_cube();
    let b = corner_cube();
    let inner = intersect(&a, &b).unwrap();
    let outer = subtract(&a, &b).unwrap();
    assert_relative_eq!(inner.volume() + outer.volume(), a.volume(), epsilon = 1e-9);
}

#[test]
fn union_volume_is_commutative() {
    let a = unit_cube();
    let b = corner_cube();
    let ab = union(&a, &b).unwrap();
    let ba = union(&b, &a).unwrap();
    assert_relative_eq!(ab.volume(), ba.volume(), epsilon = 1e-9);
    assert_relative_eq!(ab.surface_area(), ba.surface_area(), epsilon = 1e-9);
}

#[test]
fn self_union_is_idempotent() {
    let a = unit_cube();
    let out = union(&a, &a.clone()).unwrap();
    assert_relative_eq!(out.volume(), 1.0, epsilon = 1e-9);
    assert_relative_eq!(out.surface_area(), 6.0, epsilon = 1e-9);
    assert_watertight(&out);
}

#[test]
fn face_to_face_union_welds() {
    // Exactly shared face between the two cubes.
    let a = unit_cube();
    let b = cube(Point3::new(1.0, 0.0, 0.0), 1.0);
    let out = union(&a, &b).unwrap();
    assert_relative_eq!(out.volume(), 2.0, epsilon = 1e-6);
    assert_relative_eq!(out.surface_area(), 10.0, epsilon = 1e-6);
    assert_watertight(&out);
}

#[test]
fn coplanar_overlap_union_is_a_box() {
    // Cubes overlapping along x with all side faces coplanar; the
    // union is a single 1.5 x 1 x 1 box.
    let a = unit_cube();
    let b = cube(Point3::new(0.5, 0.0, 0.0), 1.0);
    let out = union(&a, &b).unwrap();
    assert_relative_eq!(out.volume(), 1.5, epsilon = 1e-6);
    assert_relative_eq!(out.surface_area(), 8.0, epsilon = 1e-6);
    assert_watertight(&out);
}

#[test]
fn empty_operands() {
    let empty = IndexedMesh::new();
    let a = unit_cube();

    let out = union(&empty, &a).unwrap();
    assert_relative_eq!(out.volume(), 1.0, epsilon = 1e-9);

    let out = intersect(&empty, &a).unwrap();
    assert!(out.is_empty());

    let out = subtract(&a, &empty).unwrap();
    assert_relative_eq!(out.volume(), 1.0, epsilon = 1e-9);

    let out = subtract(&empty, &a).unwrap();
    assert!(out.is_empty());
}

#[test]
fn boolean_dispatches_by_op() {
    let a = unit_cube();
    let b = corner_cube();
    let u = boolean(&a, &b, BooleanOp::Union).unwrap();
    let i = boolean(&a, &b, BooleanOp::Intersect).unwrap();
    let s = boolean(&a, &b, BooleanOp::Subtract).unwrap();
    assert_relative_eq!(u.volume(), 1.875, epsilon = 1e-9);
    assert_relative_eq!(i.volume(), 0.125, epsilon = 1e-9);
    assert_relative_eq!(s.volume(), 0.875, epsilon = 1e-9);
}

#[test]
fn chained_operations_stay_watertight() {
    // Drill two opposite corners out of the cube, then cap one back.
    let a = unit_cube();
    let b = corner_cube();
    let c = cube(Point3::new(-0.5, -0.5, -0.5), 1.0);

    let drilled = subtract(&subtract(&a, &b).unwrap(), &c).unwrap();
    assert_relative_eq!(drilled.volume(), 0.75, epsilon = 1e-6);
    assert_watertight(&drilled);

    let capped = union(&drilled, &intersect(&a, &c).unwrap()).unwrap();
    assert_relative_eq!(capped.volume(), 0.875, epsilon = 1e-6);
    assert_watertight(&capped);
}
