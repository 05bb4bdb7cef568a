//! Narrowphase collision detection: analytic pairwise tests.
//!
//! Only spheres move, so every supported pair involves a sphere; all other
//! combinations report no collision. Contact normals point from the second
//! collider toward the first.

use glam::Vec3;

use super::collider::{Collider, Shape};

/// Tolerance added to every overlap predicate so tangential contacts are
/// not rejected.
pub const EPSILON: f32 = 1e-4;

/// Below this separation the contact direction is degenerate and a
/// fallback normal is substituted.
const DEGENERATE_DISTANCE: f32 = 1e-5;

/// A detected contact between two colliders.
#[derive(Debug, Clone, Copy)]
pub struct Contact {
    /// Unit normal pointing from the second collider toward the first.
    pub normal: Vec3,
    /// Overlap along the normal, >= 0.
    pub penetration: f32,
}

/// Test two colliders for overlap. The returned normal points from `b`
/// toward `a`. Pairs with no analytic test report no collision.
pub fn contact(a: &Collider, b: &Collider) -> Option<Contact> {
    match (&a.shape, &b.shape) {
        (Shape::Sphere, Shape::Sphere) => sphere_sphere(a, b),
        (Shape::Sphere, Shape::Plane { normal }) => sphere_plane(a, b, *normal),
        (Shape::Sphere, Shape::Cube) => sphere_cube(a, b),
        (Shape::Sphere, Shape::Cylinder) => sphere_cylinder(a, b),
        (Shape::Sphere, Shape::Capsule) => sphere_capsule(a, b),
        // Sphere-second pairs reuse the sphere-first test with the normal
        // flipped back into this call's convention.
        (_, Shape::Sphere) => contact(b, a).map(|c| Contact {
            normal: -c.normal,
            penetration: c.penetration,
        }),
        _ => None,
    }
}

fn sphere_sphere(a: &Collider, b: &Collider) -> Option<Contact> {
    let delta = a.position() - b.position();
    let dist_sq = delta.length_squared();
    let sum_radii = a.radius() + b.radius();

    if dist_sq > sum_radii * sum_radii + EPSILON {
        return None;
    }

    let dist = dist_sq.sqrt();
    let normal = if dist > DEGENERATE_DISTANCE {
        delta / dist
    } else {
        Vec3::X
    };

    Some(Contact {
        normal,
        penetration: sum_radii - dist,
    })
}

fn sphere_plane(sphere: &Collider, plane: &Collider, plane_normal: Vec3) -> Option<Contact> {
    // A zero-length normal is degenerate geometry, not a contact.
    if plane_normal.length_squared() < DEGENERATE_DISTANCE {
        return None;
    }
    let normal = plane_normal.normalize();

    let distance = (sphere.position() - plane.position()).dot(normal);
    if distance > sphere.radius() + EPSILON {
        return None;
    }

    Some(Contact {
        normal,
        penetration: sphere.radius() - distance,
    })
}

fn sphere_cube(sphere: &Collider, cube: &Collider) -> Option<Contact> {
    let center = sphere.position();
    let half = cube.transform.scale * 0.5;
    let min = cube.position() - half;
    let max = cube.position() + half;

    let closest = center.clamp(min, max);
    let delta = center - closest;
    let dist_sq = delta.length_squared();
    let radius = sphere.radius();

    if dist_sq > radius * radius + EPSILON {
        return None;
    }

    let dist = dist_sq.sqrt();
    let normal = if dist > DEGENERATE_DISTANCE {
        delta / dist
    } else {
        Vec3::X
    };

    Some(Contact {
        normal,
        penetration: radius - dist,
    })
}

fn sphere_cylinder(sphere: &Collider, cylinder: &Collider) -> Option<Contact> {
    let axis = cylinder.axis();
    if axis == Vec3::ZERO {
        return None;
    }

    // Closest point on the cylinder's axis segment to the sphere center.
    let delta = sphere.position() - cylinder.position();
    let projection = delta.dot(axis).clamp(-cylinder.half_height(), cylinder.half_height());
    let closest = cylinder.position() + axis * projection;

    let diff = sphere.position() - closest;
    let dist_sq = diff.length_squared();
    let combined = sphere.radius() + cylinder.radius();

    if dist_sq > combined * combined + EPSILON {
        return None;
    }

    let dist = dist_sq.sqrt();
    let normal = if dist > DEGENERATE_DISTANCE {
        diff / dist
    } else {
        Vec3::Y
    };

    Some(Contact {
        normal,
        penetration: combined - dist,
    })
}

fn sphere_capsule(sphere: &Collider, capsule: &Collider) -> Option<Contact> {
    let axis = capsule.axis();
    let end_a = capsule.position() - axis * capsule.half_height();
    let end_b = capsule.position() + axis * capsule.half_height();

    // Closest point on the internal segment to the sphere center. A
    // zero-length segment degenerates to the capsule center.
    let segment = end_b - end_a;
    let seg_len_sq = segment.length_squared();
    let t = if seg_len_sq > EPSILON {
        ((sphere.position() - end_a).dot(segment) / seg_len_sq).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let closest = end_a + segment * t;

    let diff = sphere.position() - closest;
    let dist_sq = diff.length_squared();
    let combined = sphere.radius() + capsule.radius();

    if dist_sq > combined * combined + EPSILON {
        return None;
    }

    let dist = dist_sq.sqrt();
    let normal = if dist > DEGENERATE_DISTANCE {
        diff / dist
    } else {
        // Sphere center sits on the segment; fall back to the
        // center-to-center direction, then to an arbitrary axis.
        let fallback = sphere.position() - capsule.position();
        if fallback.length_squared() > DEGENERATE_DISTANCE {
            fallback.normalize()
        } else {
            Vec3::Y
        }
    };

    Some(Contact {
        normal,
        penetration: combined - dist,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    const EPS: f32 = 1e-4;

    #[test]
    fn test_sphere_sphere_overlapping() {
        let a = Collider::sphere(Vec3::new(1.5, 0.0, 0.0), 1.0);
        let b = Collider::sphere(Vec3::ZERO, 1.0);

        let c = contact(&a, &b).unwrap();
        assert!((c.normal - Vec3::X).length() < EPS);
        assert!((c.penetration - 0.5).abs() < EPS);
    }

    #[test]
    fn test_sphere_sphere_separated() {
        let a = Collider::sphere(Vec3::new(3.0, 0.0, 0.0), 1.0);
        let b = Collider::sphere(Vec3::ZERO, 1.0);
        assert!(contact(&a, &b).is_none());
    }

    #[test]
    fn test_sphere_sphere_coincident_fallback_normal() {
        let a = Collider::sphere(Vec3::ZERO, 0.5);
        let b = Collider::sphere(Vec3::ZERO, 0.5);

        let c = contact(&a, &b).unwrap();
        assert_eq!(c.normal, Vec3::X);
        assert!((c.penetration - 1.0).abs() < EPS);
    }

    #[test]
    fn test_sphere_plane() {
        let sphere = Collider::sphere(Vec3::new(0.0, 0.4, 0.0), 1.0);
        let plane = Collider::plane(Vec3::ZERO, Vec3::Y);

        let c = contact(&sphere, &plane).unwrap();
        assert!((c.normal - Vec3::Y).length() < EPS);
        assert!((c.penetration - 0.6).abs() < EPS);
    }

    #[test]
    fn test_sphere_plane_above() {
        let sphere = Collider::sphere(Vec3::new(0.0, 2.0, 0.0), 1.0);
        let plane = Collider::plane(Vec3::ZERO, Vec3::Y);
        assert!(contact(&sphere, &plane).is_none());
    }

    #[test]
    fn test_sphere_plane_degenerate_normal() {
        let sphere = Collider::sphere(Vec3::ZERO, 1.0);
        let plane = Collider::plane(Vec3::ZERO, Vec3::ZERO);
        assert!(contact(&sphere, &plane).is_none());
    }

    #[test]
    fn test_sphere_cube() {
        let sphere = Collider::sphere(Vec3::new(1.1, 0.0, 0.0), 0.2);
        let cube = Collider::cube(Vec3::ZERO, Vec3::new(2.0, 2.0, 2.0));

        let c = contact(&sphere, &cube).unwrap();
        assert!((c.normal - Vec3::X).length() < EPS);
        assert!((c.penetration - 0.1).abs() < EPS);
    }

    #[test]
    fn test_sphere_cube_center_inside_fallback() {
        let sphere = Collider::sphere(Vec3::ZERO, 0.2);
        let cube = Collider::cube(Vec3::ZERO, Vec3::new(2.0, 2.0, 2.0));

        let c = contact(&sphere, &cube).unwrap();
        assert_eq!(c.normal, Vec3::X);
    }

    #[test]
    fn test_sphere_cylinder() {
        let sphere = Collider::sphere(Vec3::new(0.8, 0.5, 0.0), 0.5);
        let cylinder = Collider::cylinder(Vec3::ZERO, Vec3::ZERO, 0.5, 1.0);

        let c = contact(&sphere, &cylinder).unwrap();
        assert!((c.normal - Vec3::X).length() < EPS);
        assert!((c.penetration - 0.2).abs() < EPS);
    }

    #[test]
    fn test_sphere_cylinder_past_cap() {
        // Above the top cap: the closest axis point clamps to the cap.
        let sphere = Collider::sphere(Vec3::new(0.0, 1.8, 0.0), 0.5);
        let cylinder = Collider::cylinder(Vec3::ZERO, Vec3::ZERO, 0.5, 1.0);

        let c = contact(&sphere, &cylinder).unwrap();
        assert!((c.normal - Vec3::Y).length() < EPS);
        assert!((c.penetration - 0.2).abs() < EPS);
    }

    #[test]
    fn test_sphere_capsule() {
        let sphere = Collider::sphere(Vec3::new(0.8, 0.5, 0.0), 0.5);
        let capsule = Collider::capsule(Vec3::ZERO, Vec3::ZERO, 0.5, 1.0);

        let c = contact(&sphere, &capsule).unwrap();
        assert!((c.normal - Vec3::X).length() < EPS);
        assert!((c.penetration - 0.2).abs() < EPS);
    }

    #[test]
    fn test_sphere_capsule_separated() {
        let sphere = Collider::sphere(Vec3::new(2.5, 0.0, 0.0), 0.5);
        let capsule = Collider::capsule(Vec3::ZERO, Vec3::ZERO, 0.5, 1.0);
        assert!(contact(&sphere, &capsule).is_none());
    }

    #[test]
    fn test_swapped_pair_flips_normal() {
        let sphere = Collider::sphere(Vec3::new(0.0, 0.4, 0.0), 1.0);
        let plane = Collider::plane(Vec3::ZERO, Vec3::Y);

        let c = contact(&plane, &sphere).unwrap();
        // Normal now points from the sphere toward the plane.
        assert!((c.normal - Vec3::NEG_Y).length() < EPS);
        assert!((c.penetration - 0.6).abs() < EPS);
    }

    #[test]
    fn test_unsupported_pair() {
        let cube = Collider::cube(Vec3::ZERO, Vec3::ONE);
        let plane = Collider::plane(Vec3::ZERO, Vec3::Y);
        assert!(contact(&cube, &plane).is_none());
        assert!(contact(&plane, &cube).is_none());
    }

    #[test]
    fn test_tangential_contact_within_epsilon() {
        // Exactly touching spheres still report a contact.
        let a = Collider::sphere(Vec3::new(2.0, 0.0, 0.0), 1.0);
        let b = Collider::sphere(Vec3::ZERO, 1.0);

        let c = contact(&a, &b).unwrap();
        assert!(c.penetration.abs() < EPS);
    }
}
