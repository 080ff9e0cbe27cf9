use glam::{Mat4, Quat, Vec3};

/// A rigid transform in world space: a rotation followed by a translation.
///
/// Camera poses, hit poses and anchor poses all use this representation. The
/// local +Y axis of a plane pose is the plane normal by convention.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    pub translation: Vec3,
    pub rotation: Quat,
}

impl Pose {
    pub const IDENTITY: Self = Self {
        translation: Vec3::ZERO,
        rotation: Quat::IDENTITY,
    };

    pub fn new(translation: Vec3, rotation: Quat) -> Self {
        Self {
            translation,
            rotation,
        }
    }

    /// Pose with the given position and an identity rotation.
    pub fn from_translation(translation: Vec3) -> Self {
        Self::new(translation, Quat::IDENTITY)
    }

    /// Rotates a local-frame axis into world space. Unit length is preserved.
    #[inline]
    pub fn transformed_axis(&self, axis: Vec3) -> Vec3 {
        self.rotation * axis
    }

    /// Column-major 4x4 world transform of this pose.
    pub fn to_matrix(&self) -> Mat4 {
        Mat4::from_rotation_translation(self.rotation, self.translation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_2;

    #[test]
    fn identity_axes_are_world_axes() {
        let pose = Pose::IDENTITY;
        assert_eq!(pose.transformed_axis(Vec3::Y), Vec3::Y);
        assert_eq!(pose.transformed_axis(Vec3::X), Vec3::X);
    }

    #[test]
    fn rotated_pose_tilts_its_normal() {
        // 90 degrees about +X sends the local +Y axis to +Z.
        let pose = Pose::new(Vec3::ZERO, Quat::from_rotation_x(FRAC_PI_2));
        let normal = pose.transformed_axis(Vec3::Y);
        assert!((normal - Vec3::Z).length() < 1e-6);
    }

    #[test]
    fn matrix_carries_translation() {
        let pose = Pose::from_translation(Vec3::new(1.0, 2.0, 3.0));
        let m = pose.to_matrix();
        let p = m.transform_point3(Vec3::ZERO);
        assert!((p - Vec3::new(1.0, 2.0, 3.0)).length() < 1e-6);
    }
}
