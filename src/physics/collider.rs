//! Collider shapes and their local-to-world transforms.

use glam::{EulerRot, Mat4, Quat, Vec3};

/// Scale components below this are replaced by 1.0 at construction.
const MIN_SCALE: f32 = 1e-4;

/// Position, Euler rotation in degrees, and scale of a collider.
///
/// Rotations use a Y-up convention; the world matrix composes as
/// translate * rotate * scale, so scale is applied in local space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    /// Euler angles in degrees: x = pitch, y = yaw, z = roll.
    pub rotation_deg: Vec3,
    pub scale: Vec3,
}

impl Transform {
    pub fn new(position: Vec3, rotation_deg: Vec3, scale: Vec3) -> Self {
        let sanitize = |s: f32| if s < MIN_SCALE { 1.0 } else { s };
        Self {
            position,
            rotation_deg,
            scale: Vec3::new(sanitize(scale.x), sanitize(scale.y), sanitize(scale.z)),
        }
    }

    pub fn from_position(position: Vec3) -> Self {
        Self::new(position, Vec3::ZERO, Vec3::ONE)
    }

    /// Rotation quaternion from the stored Euler degrees.
    pub fn rotation(&self) -> Quat {
        Quat::from_euler(
            EulerRot::YXZ,
            self.rotation_deg.y.to_radians(),
            self.rotation_deg.x.to_radians(),
            self.rotation_deg.z.to_radians(),
        )
    }

    /// Local-to-world matrix.
    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation(), self.position)
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::new(Vec3::ZERO, Vec3::ZERO, Vec3::ONE)
    }
}

/// The shape of a collider. Only spheres move; the rest are placed as
/// fixed obstacles.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Shape {
    Sphere,
    Plane {
        /// Outward surface normal in world space.
        normal: Vec3,
    },
    Cube,
    Cylinder,
    Capsule,
}

/// A shape plus its placement in the world.
///
/// Dimensions derive from the transform scale: spheres take their radius
/// from `scale.x`; cylinders and capsules take radius from `scale.x` and
/// half-height (half segment length for capsules) from `scale.y`; cubes
/// span `scale` per axis around their center.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Collider {
    pub shape: Shape,
    pub transform: Transform,
}

impl Collider {
    pub fn new(shape: Shape, transform: Transform) -> Self {
        Self { shape, transform }
    }

    pub fn sphere(position: Vec3, radius: f32) -> Self {
        Self::new(
            Shape::Sphere,
            Transform::new(position, Vec3::ZERO, Vec3::splat(radius)),
        )
    }

    pub fn plane(position: Vec3, normal: Vec3) -> Self {
        Self::new(Shape::Plane { normal }, Transform::from_position(position))
    }

    pub fn cube(position: Vec3, scale: Vec3) -> Self {
        Self::new(Shape::Cube, Transform::new(position, Vec3::ZERO, scale))
    }

    pub fn cylinder(position: Vec3, rotation_deg: Vec3, radius: f32, half_height: f32) -> Self {
        Self::new(
            Shape::Cylinder,
            Transform::new(
                position,
                rotation_deg,
                Vec3::new(radius, half_height, radius),
            ),
        )
    }

    pub fn capsule(position: Vec3, rotation_deg: Vec3, radius: f32, half_height: f32) -> Self {
        Self::new(
            Shape::Capsule,
            Transform::new(
                position,
                rotation_deg,
                Vec3::new(radius, half_height, radius),
            ),
        )
    }

    #[inline]
    pub fn position(&self) -> Vec3 {
        self.transform.position
    }

    /// Radius for spheres, cylinders and capsules.
    #[inline]
    pub fn radius(&self) -> f32 {
        self.transform.scale.x
    }

    /// Half-height of cylinders; half segment length of capsules.
    #[inline]
    pub fn half_height(&self) -> f32 {
        self.transform.scale.y
    }

    /// Long axis of cylinders and capsules: the local Y axis rotated into
    /// world space.
    pub fn axis(&self) -> Vec3 {
        (self.transform.rotation() * Vec3::Y).normalize_or_zero()
    }

    /// Local-to-world matrix, recomputed from the transform.
    pub fn world_matrix(&self) -> Mat4 {
        self.transform.matrix()
    }
}
