//! Math utilities and types
//!
//! Provides the nalgebra aliases used throughout the scene graph together with
//! the small helpers parts and figures need: degree folding, the local
//! translation/rotation/scale transform and an RGBA color.

pub use nalgebra::{Matrix4, Unit, UnitQuaternion, Vector2, Vector3, Vector4};

/// 2D vector type
pub type Vec2 = Vector2<f32>;

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// 4D vector type
pub type Vec4 = Vector4<f32>;

/// 4x4 matrix type
pub type Mat4 = Matrix4<f32>;

/// 3D point type
pub type Point3 = nalgebra::Point3<f32>;

/// Quaternion type for rotations
pub type Quat = UnitQuaternion<f32>;

/// RGBA color with components in [0, 1]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    /// Red channel
    pub r: f32,
    /// Green channel
    pub g: f32,
    /// Blue channel
    pub b: f32,
    /// Alpha channel (1.0 = opaque)
    pub a: f32,
}

impl Color {
    /// Opaque white
    pub const WHITE: Self = Self::new(1.0, 1.0, 1.0, 1.0);

    /// Opaque black
    pub const BLACK: Self = Self::new(0.0, 0.0, 0.0, 1.0);

    /// Create a color from all four channels
    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Create an opaque color
    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self::new(r, g, b, 1.0)
    }

    /// Same color with a different alpha
    #[must_use]
    pub const fn with_alpha(self, a: f32) -> Self {
        Self::new(self.r, self.g, self.b, a)
    }

    /// Whether blending is required to draw this color
    pub fn is_translucent(&self) -> bool {
        self.a < 1.0
    }

    /// Channels as an array, for backends
    pub const fn to_array(self) -> [f32; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::WHITE
    }
}

/// Fold an angle in degrees into [0, 360)
pub fn normalize_degrees(degrees: f32) -> f32 {
    let folded = degrees.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360.0 for tiny negative inputs
    if folded >= 360.0 {
        0.0
    } else {
        folded
    }
}

/// Rotation built from X, Y, Z angles in degrees
pub fn rotation_from_degrees(angles: &Vec3) -> Quat {
    Quat::from_euler_angles(
        angles.x.to_radians(),
        angles.y.to_radians(),
        angles.z.to_radians(),
    )
}

/// Local transform of a scene node: translation, rotation and scale
///
/// Angles are kept in degrees alongside the derived quaternion so that a
/// per-axis comparison can skip recomputing the rotation.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalTransform {
    /// Translation relative to the base transform
    pub translation: Vec3,

    /// Rotation angles in degrees, each in [0, 360)
    pub angles: Vec3,

    /// Rotation quaternion derived from `angles`
    pub rotation: Quat,

    /// Scale factors
    pub scale: Vec3,
}

impl Default for LocalTransform {
    fn default() -> Self {
        Self {
            translation: Vec3::zeros(),
            angles: Vec3::zeros(),
            rotation: Quat::identity(),
            scale: Vec3::new(1.0, 1.0, 1.0),
        }
    }
}

impl LocalTransform {
    /// Create an identity transform
    pub fn identity() -> Self {
        Self::default()
    }

    /// Set the translation, returning whether it changed
    pub fn set_translation(&mut self, translation: Vec3) -> bool {
        if self.translation == translation {
            return false;
        }
        self.translation = translation;
        true
    }

    /// Set the rotation angles in degrees, returning whether any axis changed
    ///
    /// Each axis is normalized into [0, 360) and compared individually; the
    /// quaternion is only rebuilt when at least one axis differs.
    pub fn set_angles(&mut self, angles: Vec3) -> bool {
        let normalized = Vec3::new(
            normalize_degrees(angles.x),
            normalize_degrees(angles.y),
            normalize_degrees(angles.z),
        );

        let mut changed = false;
        for axis in 0..3 {
            if self.angles[axis] != normalized[axis] {
                self.angles[axis] = normalized[axis];
                changed = true;
            }
        }

        if changed {
            self.rotation = rotation_from_degrees(&self.angles);
        }
        changed
    }

    /// Set the scale, returning whether it changed
    pub fn set_scale(&mut self, scale: Vec3) -> bool {
        if self.scale == scale {
            return false;
        }
        self.scale = scale;
        true
    }

    /// Convert to a transformation matrix (translation * rotation * scale)
    pub fn to_matrix(&self) -> Mat4 {
        Mat4::new_translation(&self.translation)
            * self.rotation.to_homogeneous()
            * Mat4::new_nonuniform_scaling(&self.scale)
    }
}

/// Transform a point by a homogeneous matrix
pub fn transform_point(matrix: &Mat4, point: &Vec3) -> Vec3 {
    matrix.transform_point(&Point3::from(*point)).coords
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_normalize_degrees() {
        assert_relative_eq!(normalize_degrees(0.0), 0.0);
        assert_relative_eq!(normalize_degrees(360.0), 0.0);
        assert_relative_eq!(normalize_degrees(370.0), 10.0, epsilon = 1e-4);
        assert_relative_eq!(normalize_degrees(-90.0), 270.0, epsilon = 1e-4);
        assert!(normalize_degrees(-1e-9) < 360.0);
    }

    #[test]
    fn test_set_angles_per_axis() {
        let mut local = LocalTransform::identity();
        assert!(local.set_angles(Vec3::new(0.0, 90.0, 0.0)));
        assert!(!local.set_angles(Vec3::new(360.0, 450.0, 0.0)));
        assert_relative_eq!(local.angles.y, 90.0);
    }

    #[test]
    fn test_local_matrix_applies_scale_then_rotation_then_translation() {
        let mut local = LocalTransform::identity();
        local.set_translation(Vec3::new(1.0, 0.0, 0.0));
        local.set_angles(Vec3::new(0.0, 0.0, 90.0));
        local.set_scale(Vec3::new(2.0, 2.0, 2.0));

        let moved = transform_point(&local.to_matrix(), &Vec3::new(1.0, 0.0, 0.0));
        assert_relative_eq!(moved, Vec3::new(1.0, 2.0, 0.0), epsilon = 1e-5);
    }

    #[test]
    fn test_color_translucency() {
        assert!(!Color::WHITE.is_translucent());
        assert!(Color::WHITE.with_alpha(0.5).is_translucent());
    }
}
