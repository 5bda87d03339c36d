//! Affine transforms for nodes, bones and attachment points.

use super::approx_eq;
use glam::{Mat4, Quat, Vec3};
use serde::{Deserialize, Serialize};

/// A decomposed affine transform.
///
/// Points are scaled first, then rotated, then translated.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    #[serde(default)]
    pub translation: Vec3,
    #[serde(default = "identity_rotation")]
    pub rotation: Quat,
    #[serde(default = "unit_scale")]
    pub scale: Vec3,
}

fn identity_rotation() -> Quat {
    Quat::IDENTITY
}

fn unit_scale() -> Vec3 {
    Vec3::ONE
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Transform {
    pub const IDENTITY: Self = Self {
        translation: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    pub fn new(translation: Vec3, rotation: Quat, scale: Vec3) -> Self {
        Self {
            translation,
            rotation,
            scale,
        }
    }

    pub fn from_translation(translation: Vec3) -> Self {
        Self {
            translation,
            ..Self::IDENTITY
        }
    }

    pub fn from_rotation(rotation: Quat) -> Self {
        Self {
            rotation,
            ..Self::IDENTITY
        }
    }

    pub fn to_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }

    pub fn from_matrix(matrix: Mat4) -> Self {
        let (scale, rotation, translation) = matrix.to_scale_rotation_translation();
        Self {
            translation,
            rotation,
            scale,
        }
    }

    /// `self * child`: the child expressed in this transform's space.
    pub fn mul_transform(&self, child: &Transform) -> Transform {
        Self::from_matrix(self.to_matrix() * child.to_matrix())
    }

    pub fn inverse(&self) -> Transform {
        Self::from_matrix(self.to_matrix().inverse())
    }

    /// Apply scale, rotation and translation to a point.
    pub fn transform_point(&self, point: Vec3) -> Vec3 {
        self.translation + self.rotation * (point * self.scale)
    }

    /// Rotate a direction; scale and translation do not apply to normals here.
    pub fn rotate_vector(&self, vector: Vec3) -> Vec3 {
        self.rotation * vector
    }

    /// Interpolate towards `other` (lerp for translation/scale, slerp for rotation).
    pub fn interpolate(&self, other: &Transform, t: f32) -> Transform {
        Transform {
            translation: self.translation.lerp(other.translation, t),
            rotation: self.rotation.slerp(other.rotation, t),
            scale: self.scale.lerp(other.scale, t),
        }
    }

    /// True if the translation is not at the origin at output precision.
    pub fn is_translated(&self) -> bool {
        !(approx_eq(self.translation.x, 0.0)
            && approx_eq(self.translation.y, 0.0)
            && approx_eq(self.translation.z, 0.0))
    }

    /// True if the rotation differs from identity at output precision.
    pub fn is_rotated(&self) -> bool {
        let q = self.rotation;
        let identity = approx_eq(q.w.abs(), 1.0)
            && approx_eq(q.x, 0.0)
            && approx_eq(q.y, 0.0)
            && approx_eq(q.z, 0.0);
        !identity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transform_point_scales_then_rotates_then_translates() {
        let t = Transform::new(
            Vec3::new(10.0, 0.0, 0.0),
            Quat::from_rotation_z(std::f32::consts::FRAC_PI_2),
            Vec3::new(2.0, 1.0, 1.0),
        );
        let p = t.transform_point(Vec3::new(1.0, 0.0, 0.0));
        assert!((p - Vec3::new(10.0, 2.0, 0.0)).length() < 1e-5);
    }

    #[test]
    fn test_mul_transform_composes_parent_first() {
        let parent = Transform::from_translation(Vec3::new(0.0, 0.0, 5.0));
        let child = Transform::from_translation(Vec3::new(1.0, 0.0, 0.0));
        let world = parent.mul_transform(&child);
        assert!((world.translation - Vec3::new(1.0, 0.0, 5.0)).length() < 1e-5);
    }

    #[test]
    fn test_rotation_and_translation_flags() {
        assert!(!Transform::IDENTITY.is_rotated());
        assert!(!Transform::IDENTITY.is_translated());

        let moved = Transform::from_translation(Vec3::new(0.0, 0.001, 0.0));
        assert!(moved.is_translated());
        assert!(!moved.is_rotated());

        let turned = Transform::from_rotation(Quat::from_rotation_x(0.5));
        assert!(turned.is_rotated());
        assert!(!turned.is_translated());
    }

    #[test]
    fn test_negated_identity_quaternion_is_not_rotated() {
        let t = Transform::from_rotation(Quat::from_xyzw(0.0, 0.0, 0.0, -1.0));
        assert!(!t.is_rotated());
    }
}
