//! Joint-related type definitions

use glam::{Mat4, Quat, Vec3};
use serde::{Deserialize, Serialize};

/// Joint type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum JointType {
    #[default]
    Fixed,
    Revolute,
    Continuous,
    Prismatic,
    Floating,
    Planar,
}

impl JointType {
    /// Check if this joint type has an axis
    pub fn has_axis(&self) -> bool {
        matches!(
            self,
            JointType::Revolute | JointType::Continuous | JointType::Prismatic
        )
    }

    /// Check if this joint type has limits
    pub fn has_limits(&self) -> bool {
        matches!(self, JointType::Revolute | JointType::Prismatic)
    }

    /// Whether the joint can be moved from the joint panel
    pub fn is_movable(&self) -> bool {
        self.has_axis()
    }

    /// Get display name
    pub fn display_name(&self) -> &'static str {
        match self {
            JointType::Fixed => "Fixed",
            JointType::Revolute => "Revolute",
            JointType::Continuous => "Continuous",
            JointType::Prismatic => "Prismatic",
            JointType::Floating => "Floating",
            JointType::Planar => "Planar",
        }
    }

    /// Transform produced by moving a joint of this type to `position` along `axis`
    pub fn motion_transform(&self, axis: Vec3, position: f32) -> Mat4 {
        match self {
            JointType::Revolute | JointType::Continuous => {
                Mat4::from_quat(Quat::from_axis_angle(axis, position))
            }
            JointType::Prismatic => Mat4::from_translation(axis * position),
            // Floating/planar would need more DOFs than a single value
            JointType::Fixed | JointType::Floating | JointType::Planar => Mat4::IDENTITY,
        }
    }
}

impl From<&urdf_rs::JointType> for JointType {
    fn from(urdf_type: &urdf_rs::JointType) -> Self {
        match urdf_type {
            urdf_rs::JointType::Fixed => JointType::Fixed,
            urdf_rs::JointType::Revolute => JointType::Revolute,
            urdf_rs::JointType::Continuous => JointType::Continuous,
            urdf_rs::JointType::Prismatic => JointType::Prismatic,
            urdf_rs::JointType::Floating => JointType::Floating,
            urdf_rs::JointType::Planar => JointType::Planar,
            urdf_rs::JointType::Spherical => JointType::Floating, // Approximate as floating
        }
    }
}

/// Joint limits
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct JointLimits {
    /// Lower position limit (rad or m)
    pub lower: f32,
    /// Upper position limit (rad or m)
    pub upper: f32,
    /// Maximum effort (N or Nm)
    pub effort: f32,
    /// Maximum velocity (rad/s or m/s)
    pub velocity: f32,
}

impl Default for JointLimits {
    /// Unbounded, matching a joint declared without a `<limit>` element
    fn default() -> Self {
        Self {
            lower: f32::NEG_INFINITY,
            upper: f32::INFINITY,
            effort: 0.0,
            velocity: 0.0,
        }
    }
}

impl JointLimits {
    /// Create limits with specified range
    pub fn with_range(lower: f32, upper: f32) -> Self {
        Self {
            lower,
            upper,
            ..Self::default()
        }
    }

    /// Whether the limits bound `joint_type`. Continuous and multi-DOF joints
    /// never are, and neither is an empty or inverted range: urdf-rs reports a
    /// `<limit>` without `lower`/`upper` as `0..0`.
    pub fn is_bounded(&self, joint_type: JointType) -> bool {
        joint_type.has_limits() && self.lower < self.upper
    }

    /// Clamp a joint value to the limits, if they bound the joint
    pub fn clamp(&self, value: f32, joint_type: JointType) -> f32 {
        if !self.is_bounded(joint_type) {
            return value;
        }
        value.clamp(self.lower, self.upper)
    }

    /// Slider range for the joint panel. Unbounded joints get `±fallback`, as
    /// do infinite sides of a bounded range.
    pub fn display_range(&self, joint_type: JointType, fallback: f32) -> (f32, f32) {
        if !self.is_bounded(joint_type) {
            return (-fallback, fallback);
        }
        let lower = if self.lower.is_finite() { self.lower } else { -fallback };
        let upper = if self.upper.is_finite() { self.upper } else { fallback };
        (lower, upper)
    }
}

impl From<&urdf_rs::JointLimit> for JointLimits {
    fn from(limit: &urdf_rs::JointLimit) -> Self {
        Self {
            lower: limit.lower as f32,
            upper: limit.upper as f32,
            effort: limit.effort as f32,
            velocity: limit.velocity as f32,
        }
    }
}

/// Joint mimic configuration
/// Makes this joint follow another joint's position: value = multiplier * other_joint + offset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JointMimic {
    /// Name of the joint to mimic
    pub joint: String,
    /// Multiplier applied to the mimicked joint's position (default: 1.0)
    pub multiplier: f32,
    /// Offset added after multiplication (default: 0.0)
    pub offset: f32,
}

impl JointMimic {
    /// Calculate the mimic value from the source joint's position
    pub fn calculate(&self, source_position: f32) -> f32 {
        self.multiplier * source_position + self.offset
    }
}

impl From<&urdf_rs::Mimic> for JointMimic {
    fn from(mimic: &urdf_rs::Mimic) -> Self {
        Self {
            joint: mimic.joint.clone(),
            multiplier: mimic.multiplier.unwrap_or(1.0) as f32,
            offset: mimic.offset.unwrap_or(0.0) as f32,
        }
    }
}
