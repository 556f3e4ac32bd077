//! Imported robot: links, joints, visuals and their world transforms

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use glam::{Mat4, Vec3};

use crate::bounds::BoundingBox;
use crate::mesh::MeshGeometry;
use crate::payload::UpAxis;
use crate::types::{JointLimits, JointMimic, JointType, Pose};

/// Geometry of a visual element
#[derive(Debug, Clone)]
pub enum VisualGeometry {
    /// A mesh reference; `mesh` is `None` when the loader produced nothing
    Mesh {
        filename: String,
        scale: [f32; 3],
        mesh: Option<Arc<MeshGeometry>>,
    },
    /// Box, cylinder, sphere or capsule, already tessellated
    Primitive {
        kind: &'static str,
        mesh: Arc<MeshGeometry>,
    },
}

impl VisualGeometry {
    pub fn mesh(&self) -> Option<&Arc<MeshGeometry>> {
        match self {
            VisualGeometry::Mesh { mesh, .. } => mesh.as_ref(),
            VisualGeometry::Primitive { mesh, .. } => Some(mesh),
        }
    }

    fn scale(&self) -> Vec3 {
        match self {
            VisualGeometry::Mesh { scale, .. } => Vec3::from(*scale),
            VisualGeometry::Primitive { .. } => Vec3::ONE,
        }
    }
}

/// A `<visual>` element of a link
#[derive(Debug, Clone)]
pub struct Visual {
    pub name: Option<String>,
    pub origin: Pose,
    pub geometry: VisualGeometry,
    pub color: [f32; 4],
    pub material_name: Option<String>,
    pub cast_shadow: bool,
    pub receive_shadow: bool,
}

impl Visual {
    /// Transform from the link frame, including mesh scale
    pub fn local_transform(&self) -> Mat4 {
        self.origin.to_mat4() * Mat4::from_scale(self.geometry.scale())
    }
}

/// A link of the robot tree
#[derive(Debug, Clone)]
pub struct Link {
    pub name: String,
    pub visuals: Vec<Visual>,
    /// Updated by [`RobotModel::update_world_transforms`]
    pub world_transform: Mat4,
}

impl Link {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            visuals: Vec::new(),
            world_transform: Mat4::IDENTITY,
        }
    }
}

/// A joint connecting two links
#[derive(Debug, Clone)]
pub struct Joint {
    pub name: String,
    pub joint_type: JointType,
    /// Parent link name
    pub parent: String,
    /// Child link name
    pub child: String,
    /// Transform from parent link to joint origin
    pub origin: Pose,
    pub axis: Vec3,
    pub limits: JointLimits,
    pub mimic: Option<JointMimic>,
    /// Current position (rad or m)
    pub value: f32,
}

impl Joint {
    /// Transform from the parent link frame to the child link frame at the current value
    pub fn transform(&self) -> Mat4 {
        self.origin.to_mat4() * self.joint_type.motion_transform(self.axis, self.value)
    }
}

/// Errors when manipulating a loaded robot
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RobotError {
    #[error("Joint not found: {0}")]
    JointNotFound(String),
    #[error("Link not found: {0}")]
    LinkNotFound(String),
}

/// The robot tree produced by import
#[derive(Debug, Clone)]
pub struct RobotModel {
    pub name: String,
    pub links: Vec<Link>,
    pub joints: Vec<Joint>,
    pub root_link: usize,
    /// Named robot-level materials as RGBA
    pub materials: BTreeMap<String, [f32; 4]>,
    link_index: HashMap<String, usize>,
    joint_index: HashMap<String, usize>,
    /// Link index -> joint indices whose parent is that link
    children: HashMap<usize, Vec<usize>>,
}

impl RobotModel {
    /// Assemble a model. Link and joint names must be unique and joints must
    /// reference existing links; `import_robot` checks this before calling.
    pub(crate) fn new(name: String, links: Vec<Link>, joints: Vec<Joint>, root_link: usize) -> Self {
        let link_index: HashMap<String, usize> = links
            .iter()
            .enumerate()
            .map(|(i, l)| (l.name.clone(), i))
            .collect();
        let joint_index = joints
            .iter()
            .enumerate()
            .map(|(i, j)| (j.name.clone(), i))
            .collect();

        let mut children: HashMap<usize, Vec<usize>> = HashMap::new();
        for (i, joint) in joints.iter().enumerate() {
            if let Some(&parent) = link_index.get(&joint.parent) {
                children.entry(parent).or_default().push(i);
            }
        }

        let mut model = Self {
            name,
            links,
            joints,
            root_link,
            materials: BTreeMap::new(),
            link_index,
            joint_index,
            children,
        };
        model.reset_joints();
        model
    }

    pub fn root(&self) -> &Link {
        &self.links[self.root_link]
    }

    pub fn link(&self, name: &str) -> Option<&Link> {
        self.link_index.get(name).map(|&i| &self.links[i])
    }

    pub fn joint(&self, name: &str) -> Option<&Joint> {
        self.joint_index.get(name).map(|&i| &self.joints[i])
    }

    /// Joints whose parent is `link`, in document order
    pub fn child_joints(&self, link: &str) -> impl Iterator<Item = &Joint> {
        self.link_index
            .get(link)
            .and_then(|i| self.children.get(i))
            .into_iter()
            .flatten()
            .map(|&j| &self.joints[j])
    }

    /// The joint that has `link` as its child
    pub fn link_to_joint(&self, link: &str) -> Option<&Joint> {
        self.joints.iter().find(|j| j.child == link)
    }

    /// Joints that can be driven from the UI (mimic joints follow their source)
    pub fn movable_joints(&self) -> impl Iterator<Item = &Joint> {
        self.joints
            .iter()
            .filter(|j| j.joint_type.is_movable() && j.mimic.is_none())
    }

    pub fn visuals(&self) -> impl Iterator<Item = (&Link, &Visual)> {
        self.links
            .iter()
            .flat_map(|l| l.visuals.iter().map(move |v| (l, v)))
    }

    pub fn visuals_mut(&mut self) -> impl Iterator<Item = &mut Visual> {
        self.links.iter_mut().flat_map(|l| l.visuals.iter_mut())
    }

    pub fn visual_count(&self) -> usize {
        self.links.iter().map(|l| l.visuals.len()).sum()
    }

    /// Set shadow flags on every visual
    pub fn set_shadows(&mut self, cast: bool, receive: bool) {
        for visual in self.visuals_mut() {
            visual.cast_shadow = cast;
            visual.receive_shadow = receive;
        }
    }

    /// Move a joint, clamped to its limits, drive its mimic joints and
    /// recompute world transforms. Returns the applied value.
    pub fn set_joint_value(&mut self, name: &str, value: f32) -> Result<f32, RobotError> {
        let &index = self
            .joint_index
            .get(name)
            .ok_or_else(|| RobotError::JointNotFound(name.to_string()))?;

        let applied = self.apply_value(index, value);
        self.propagate_mimics(index);
        self.update_world_transforms();
        Ok(applied)
    }

    pub fn joint_value(&self, name: &str) -> Option<f32> {
        self.joint(name).map(|j| j.value)
    }

    /// Set every driven joint back to zero (clamped); mimic joints take the
    /// value their source implies, offset included
    pub fn reset_joints(&mut self) {
        for i in 0..self.joints.len() {
            self.apply_value(i, 0.0);
        }
        for i in 0..self.joints.len() {
            if self.joints[i].mimic.is_none() {
                self.propagate_mimics(i);
            }
        }
        self.update_world_transforms();
    }

    /// Drive the mimic joints that follow `source`, transitively.
    /// Each joint is updated at most once per call.
    fn propagate_mimics(&mut self, source: usize) {
        let mut updated = vec![source];
        let mut queue = vec![source];
        while let Some(current) = queue.pop() {
            let source_value = self.joints[current].value;
            for i in 0..self.joints.len() {
                if updated.contains(&i) {
                    continue;
                }
                let Some(mimic) = self.joints[i].mimic.as_ref() else {
                    continue;
                };
                if mimic.joint != self.joints[current].name {
                    continue;
                }
                let target = mimic.calculate(source_value);
                self.apply_value(i, target);
                updated.push(i);
                queue.push(i);
            }
        }
    }

    fn apply_value(&mut self, index: usize, value: f32) -> f32 {
        let joint = &mut self.joints[index];
        let clamped = joint.limits.clamp(value, joint.joint_type);
        joint.value = clamped;
        clamped
    }

    /// Recompute every link's world transform from the root
    pub fn update_world_transforms(&mut self) {
        let mut stack = vec![(self.root_link, Mat4::IDENTITY)];
        let mut visited = vec![false; self.links.len()];

        while let Some((link, transform)) = stack.pop() {
            if std::mem::replace(&mut visited[link], true) {
                continue;
            }
            self.links[link].world_transform = transform;

            if let Some(joints) = self.children.get(&link) {
                for &j in joints {
                    let joint = &self.joints[j];
                    if let Some(&child) = self.link_index.get(&joint.child) {
                        stack.push((child, transform * joint.transform()));
                    }
                }
            }
        }
    }

    /// World-space bounds of all loaded geometry
    pub fn bounds(&self) -> BoundingBox {
        self.visuals()
            .filter_map(|(link, visual)| {
                let mesh = visual.geometry.mesh()?;
                let world = link.world_transform * visual.local_transform();
                Some(mesh.bounds.transform(&world))
            })
            .fold(BoundingBox::empty(), |acc, b| acc.union(&b))
    }

    /// Transform applied on top of the robot when displaying it.
    ///
    /// URDF is Z-up; a Y-up scene rotates the robot -90° about X.
    pub fn display_transform(up: UpAxis) -> Mat4 {
        match up {
            UpAxis::Z => Mat4::IDENTITY,
            UpAxis::Y => Mat4::from_rotation_x(-std::f32::consts::FRAC_PI_2),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitive::generate_box_mesh;
    use approx::assert_relative_eq;

    fn joint(name: &str, parent: &str, child: &str, joint_type: JointType) -> Joint {
        Joint {
            name: name.into(),
            joint_type,
            parent: parent.into(),
            child: child.into(),
            origin: Pose::from_position([0.0, 0.0, 1.0]),
            axis: Vec3::Z,
            limits: JointLimits::with_range(-1.0, 1.0),
            mimic: None,
            value: 0.0,
        }
    }

    fn boxed(name: &str) -> Link {
        let mut link = Link::new(name);
        link.visuals.push(Visual {
            name: None,
            origin: Pose::default(),
            geometry: VisualGeometry::Primitive {
                kind: "box",
                mesh: Arc::new(generate_box_mesh([1.0, 1.0, 1.0])),
            },
            color: [1.0; 4],
            material_name: None,
            cast_shadow: false,
            receive_shadow: false,
        });
        link
    }

    fn arm() -> RobotModel {
        let links = vec![boxed("base"), boxed("upper"), boxed("finger_l"), boxed("finger_r")];
        let mut finger_r = joint("finger_r_joint", "upper", "finger_r", JointType::Prismatic);
        finger_r.mimic = Some(JointMimic {
            joint: "finger_l_joint".into(),
            multiplier: -1.0,
            offset: 0.0,
        });
        let joints = vec![
            joint("shoulder", "base", "upper", JointType::Revolute),
            joint("finger_l_joint", "upper", "finger_l", JointType::Prismatic),
            finger_r,
        ];
        RobotModel::new("arm".into(), links, joints, 0)
    }

    #[test]
    fn test_world_transforms_chain() {
        let robot = arm();
        let upper = robot.link("upper").unwrap();
        assert_eq!(
            upper.world_transform.transform_point3(Vec3::ZERO),
            Vec3::new(0.0, 0.0, 1.0)
        );
        let finger = robot.link("finger_l").unwrap();
        assert_eq!(
            finger.world_transform.transform_point3(Vec3::ZERO),
            Vec3::new(0.0, 0.0, 2.0)
        );
    }

    #[test]
    fn test_set_joint_value_clamps() {
        let mut robot = arm();
        assert_eq!(robot.set_joint_value("shoulder", 3.0).unwrap(), 1.0);
        assert_eq!(robot.joint_value("shoulder"), Some(1.0));
        assert_eq!(
            robot.set_joint_value("elbow", 0.0),
            Err(RobotError::JointNotFound("elbow".into()))
        );
    }

    #[test]
    fn test_mimic_follows_source() {
        let mut robot = arm();
        robot.set_joint_value("finger_l_joint", 0.5).unwrap();
        assert_eq!(robot.joint_value("finger_r_joint"), Some(-0.5));
        let finger = robot.link("finger_r").unwrap();
        assert_relative_eq!(
            finger.world_transform.transform_point3(Vec3::ZERO).z,
            1.5,
            epsilon = 1e-6
        );
    }

    #[test]
    fn test_mimic_offset_holds_at_rest() {
        let links = vec![boxed("base"), boxed("leader"), boxed("follower")];
        let mut follower = joint("follower_joint", "base", "follower", JointType::Revolute);
        follower.limits = JointLimits::default();
        follower.mimic = Some(JointMimic {
            joint: "leader_joint".into(),
            multiplier: 2.0,
            offset: 0.3,
        });
        let joints = vec![joint("leader_joint", "base", "leader", JointType::Revolute), follower];
        let mut robot = RobotModel::new("m".into(), links, joints, 0);

        assert_relative_eq!(robot.joint_value("follower_joint").unwrap(), 0.3);
        robot.set_joint_value("leader_joint", 0.5).unwrap();
        assert_relative_eq!(robot.joint_value("follower_joint").unwrap(), 1.3);
        robot.reset_joints();
        assert_relative_eq!(robot.joint_value("leader_joint").unwrap(), 0.0);
        assert_relative_eq!(robot.joint_value("follower_joint").unwrap(), 0.3);
    }

    #[test]
    fn test_revolute_rotates_children() {
        let mut robot = arm();
        let before = robot.bounds();
        robot
            .set_joint_value("shoulder", std::f32::consts::FRAC_PI_4)
            .unwrap();
        let after = robot.bounds();
        // rotating the 1x1 boxes about Z widens their XY footprint
        assert!(after.size().x > before.size().x);
    }

    #[test]
    fn test_link_to_joint_and_children() {
        let robot = arm();
        assert_eq!(robot.link_to_joint("upper").unwrap().name, "shoulder");
        assert!(robot.link_to_joint("base").is_none());
        assert_eq!(robot.child_joints("upper").count(), 2);
        assert_eq!(robot.movable_joints().count(), 2);
    }

    #[test]
    fn test_set_shadows_and_bounds() {
        let mut robot = arm();
        robot.set_shadows(true, true);
        assert!(robot.visuals().all(|(_, v)| v.cast_shadow && v.receive_shadow));
        let bounds = robot.bounds();
        assert_relative_eq!(bounds.min.z, -0.5);
        assert_relative_eq!(bounds.max.z, 2.5);
    }

    #[test]
    fn test_display_transform_y_up() {
        let m = RobotModel::display_transform(UpAxis::Y);
        let p = m.transform_point3(Vec3::Z);
        assert_relative_eq!(p.y, 1.0, epsilon = 1e-6);
        assert_eq!(RobotModel::display_transform(UpAxis::Z), Mat4::IDENTITY);
    }
}
