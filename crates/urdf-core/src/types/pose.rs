//! Pose type definition

use glam::{Mat4, Quat, Vec3};
use serde::{Deserialize, Serialize};

/// Pose (position and orientation)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub xyz: [f32; 3],
    pub rpy: [f32; 3], // roll, pitch, yaw in radians
}

impl Pose {
    pub fn new(xyz: [f32; 3], rpy: [f32; 3]) -> Self {
        Self { xyz, rpy }
    }

    pub fn from_position(xyz: [f32; 3]) -> Self {
        Self { xyz, rpy: [0.0; 3] }
    }

    /// URDF applies roll about X, then pitch about Y, then yaw about Z (fixed axes),
    /// which is the intrinsic Z-Y-X rotation.
    pub fn to_quat(&self) -> Quat {
        Quat::from_euler(glam::EulerRot::ZYX, self.rpy[2], self.rpy[1], self.rpy[0])
    }

    pub fn to_mat4(&self) -> Mat4 {
        Mat4::from_rotation_translation(self.to_quat(), self.position())
    }

    /// Get position as Vec3
    pub fn position(&self) -> Vec3 {
        Vec3::from(self.xyz)
    }
}

impl From<&urdf_rs::Pose> for Pose {
    fn from(urdf_pose: &urdf_rs::Pose) -> Self {
        Self {
            xyz: [
                urdf_pose.xyz.0[0] as f32,
                urdf_pose.xyz.0[1] as f32,
                urdf_pose.xyz.0[2] as f32,
            ],
            rpy: [
                urdf_pose.rpy.0[0] as f32,
                urdf_pose.rpy.0[1] as f32,
                urdf_pose.rpy.0[2] as f32,
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_convert_pose() {
        let urdf_pose = urdf_rs::Pose {
            xyz: urdf_rs::Vec3([1.0, 2.0, 3.0]),
            rpy: urdf_rs::Vec3([0.1, 0.2, 0.3]),
        };

        let pose = Pose::from(&urdf_pose);
        assert_eq!(pose.xyz, [1.0, 2.0, 3.0]);
        assert_eq!(pose.rpy, [0.1, 0.2, 0.3]);
    }

    #[test]
    fn test_yaw_rotates_x_onto_y() {
        let pose = Pose::new([0.0; 3], [0.0, 0.0, std::f32::consts::FRAC_PI_2]);
        let p = pose.to_mat4().transform_point3(Vec3::X);
        assert_relative_eq!(p.x, 0.0, epsilon = 1e-6);
        assert_relative_eq!(p.y, 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_roll_applied_before_yaw() {
        // roll 90° takes Y to Z, the following yaw leaves Z alone
        let pose = Pose::new(
            [0.0; 3],
            [std::f32::consts::FRAC_PI_2, 0.0, std::f32::consts::FRAC_PI_2],
        );
        let p = pose.to_mat4().transform_point3(Vec3::Y);
        assert_relative_eq!(p.z, 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_translation() {
        let pose = Pose::from_position([1.0, -2.0, 0.5]);
        let p = pose.to_mat4().transform_point3(Vec3::ZERO);
        assert_eq!(p, Vec3::new(1.0, -2.0, 0.5));
    }
}
