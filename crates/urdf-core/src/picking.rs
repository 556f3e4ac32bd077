//! Ray picking of links and joint dragging

use glam::{Mat4, Vec3};

use crate::robot::{Joint, RobotModel};
use crate::types::JointType;

const EPSILON: f32 = 1e-6;

/// A ray in scene space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    /// Unit length
    pub direction: Vec3,
}

impl Ray {
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self {
            origin,
            direction: direction.normalize_or_zero(),
        }
    }

    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }
}

/// Closest link under a ray
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinkHit {
    /// Index into [`RobotModel::links`]
    pub link: usize,
    pub distance: f32,
    pub point: Vec3,
}

/// Pick the closest link hit by `ray`.
///
/// `display` is the transform the scene applies on top of link world
/// transforms (see [`RobotModel::display_transform`]).
pub fn pick_link(robot: &RobotModel, display: Mat4, ray: &Ray) -> Option<LinkHit> {
    let mut closest: Option<LinkHit> = None;

    for (index, link) in robot.links.iter().enumerate() {
        for visual in &link.visuals {
            let Some(mesh) = visual.geometry.mesh() else {
                continue;
            };
            let transform = display * link.world_transform * visual.local_transform();

            // AABB first for early rejection
            let bounds = mesh.bounds.transform(&transform);
            if bounds.is_empty() {
                continue;
            }
            match ray_aabb_intersection(ray, bounds.min, bounds.max) {
                None => continue,
                Some(t) if closest.is_some_and(|hit| t > hit.distance) => continue,
                Some(_) => {}
            }

            for tri in mesh.indices.chunks_exact(3) {
                let corner = |i: u32| {
                    mesh.vertices
                        .get(i as usize)
                        .map(|v| transform.transform_point3(Vec3::from(*v)))
                };
                let (Some(v0), Some(v1), Some(v2)) = (corner(tri[0]), corner(tri[1]), corner(tri[2]))
                else {
                    continue;
                };

                if let Some(t) = ray_triangle_intersection(ray, v0, v1, v2) {
                    if closest.is_none_or(|hit| t < hit.distance) {
                        closest = Some(LinkHit {
                            link: index,
                            distance: t,
                            point: ray.at(t),
                        });
                    }
                }
            }
        }
    }

    closest
}

/// Joint that moves when the user drags `link`.
///
/// Walks up through fixed joints to the first movable one. A mimic joint
/// hands the drag to the joint it follows.
pub fn drag_joint_for_link(robot: &RobotModel, link: usize) -> Option<&Joint> {
    let mut name = robot.links.get(link)?.name.as_str();

    for _ in 0..=robot.joints.len() {
        let joint = robot.link_to_joint(name)?;
        if joint.joint_type.is_movable() {
            return mimic_source(robot, joint);
        }
        name = joint.parent.as_str();
    }
    None
}

fn mimic_source<'a>(robot: &'a RobotModel, mut joint: &'a Joint) -> Option<&'a Joint> {
    for _ in 0..=robot.joints.len() {
        match &joint.mimic {
            Some(mimic) => joint = robot.joint(&mimic.joint)?,
            None => return Some(joint),
        }
    }
    // mimic cycle
    None
}

/// Change of `joint`'s value implied by the pointer moving from `from` to `to`.
///
/// Revolute and continuous joints turn by the angle swept around the axis
/// on the plane through the joint origin. Prismatic joints slide by the
/// distance travelled along the axis line. Returns `None` for joints that
/// do not move or when a ray runs parallel to the drag plane or axis.
pub fn joint_drag_delta(
    robot: &RobotModel,
    display: Mat4,
    joint: &Joint,
    from: &Ray,
    to: &Ray,
) -> Option<f32> {
    let parent = robot.link(&joint.parent)?;
    let frame = display * parent.world_transform * joint.origin.to_mat4();
    let pivot = frame.transform_point3(Vec3::ZERO);
    let axis = frame.transform_vector3(joint.axis).try_normalize()?;

    match joint.joint_type {
        JointType::Revolute | JointType::Continuous => {
            let a = ray_plane_intersection(from, pivot, axis)? - pivot;
            let b = ray_plane_intersection(to, pivot, axis)? - pivot;
            if a.length_squared() < EPSILON || b.length_squared() < EPSILON {
                return None;
            }
            Some(axis.dot(a.cross(b)).atan2(a.dot(b)))
        }
        JointType::Prismatic => {
            let s0 = closest_on_axis(from, pivot, axis)?;
            let s1 = closest_on_axis(to, pivot, axis)?;
            Some(s1 - s0)
        }
        _ => None,
    }
}

/// Ray-AABB intersection (slab method); distance to the box if hit
fn ray_aabb_intersection(ray: &Ray, bbox_min: Vec3, bbox_max: Vec3) -> Option<f32> {
    let inv_dir = ray.direction.recip();

    let t1 = (bbox_min - ray.origin) * inv_dir;
    let t2 = (bbox_max - ray.origin) * inv_dir;

    let tmin = t1.min(t2).max_element();
    let tmax = t1.max(t2).min_element();

    if tmax < 0.0 || tmin > tmax {
        return None;
    }

    Some(if tmin < 0.0 { tmax } else { tmin })
}

/// Möller–Trumbore ray-triangle intersection
fn ray_triangle_intersection(ray: &Ray, v0: Vec3, v1: Vec3, v2: Vec3) -> Option<f32> {
    let edge1 = v1 - v0;
    let edge2 = v2 - v0;
    let h = ray.direction.cross(edge2);
    let a = edge1.dot(h);

    if a.abs() < EPSILON {
        return None; // parallel
    }

    let f = 1.0 / a;
    let s = ray.origin - v0;
    let u = f * s.dot(h);
    if !(0.0..=1.0).contains(&u) {
        return None;
    }

    let q = s.cross(edge1);
    let v = f * ray.direction.dot(q);
    if v < 0.0 || u + v > 1.0 {
        return None;
    }

    let t = f * edge2.dot(q);
    if t > EPSILON { Some(t) } else { None }
}

fn ray_plane_intersection(ray: &Ray, point: Vec3, normal: Vec3) -> Option<Vec3> {
    let denom = normal.dot(ray.direction);
    if denom.abs() < EPSILON {
        return None;
    }
    let t = normal.dot(point - ray.origin) / denom;
    (t >= 0.0).then(|| ray.at(t))
}

/// Parameter along the unit `axis` through `pivot` of the point closest to `ray`
fn closest_on_axis(ray: &Ray, pivot: Vec3, axis: Vec3) -> Option<f32> {
    let b = axis.dot(ray.direction);
    let denom = 1.0 - b * b;
    if denom < EPSILON {
        return None;
    }
    let w0 = pivot - ray.origin;
    let d = axis.dot(w0);
    let e = ray.direction.dot(w0);
    Some((b * e - d) / denom)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::import::{ImportOptions, import_robot};
    use crate::loader::NullMeshLoader;
    use crate::payload::UpAxis;
    use approx::assert_relative_eq;

    const RIG: &str = r#"<robot name="rig">
  <link name="base"><visual><geometry><box size="1 1 1"/></geometry></visual></link>
  <link name="arm"><visual><geometry><box size="1 1 1"/></geometry></visual></link>
  <link name="tip"><visual><geometry><box size="0.2 0.2 0.2"/></geometry></visual></link>
  <link name="carriage"><visual><geometry><box size="0.4 0.4 0.4"/></geometry></visual></link>
  <link name="finger"/>
  <joint name="spin" type="continuous">
    <parent link="base"/><child link="arm"/>
    <origin xyz="0 0 2"/><axis xyz="0 0 1"/>
  </joint>
  <joint name="tip_mount" type="fixed">
    <parent link="arm"/><child link="tip"/>
    <origin xyz="1 0 0"/>
  </joint>
  <joint name="slide" type="prismatic">
    <parent link="base"/><child link="carriage"/>
    <origin xyz="3 0 0"/><axis xyz="1 0 0"/>
    <limit lower="-1" upper="1" effort="1" velocity="1"/>
  </joint>
  <joint name="grip" type="prismatic">
    <parent link="carriage"/><child link="finger"/>
    <axis xyz="1 0 0"/>
    <limit lower="-1" upper="1" effort="1" velocity="1"/>
    <mimic joint="slide"/>
  </joint>
</robot>"#;

    fn rig() -> RobotModel {
        import_robot(RIG, &NullMeshLoader, &ImportOptions::default()).unwrap()
    }

    fn link_index(robot: &RobotModel, name: &str) -> usize {
        robot.links.iter().position(|l| l.name == name).unwrap()
    }

    fn down(x: f32, y: f32) -> Ray {
        Ray::new(Vec3::new(x, y, 10.0), Vec3::NEG_Z)
    }

    #[test]
    fn test_pick_closest_link() {
        let robot = rig();

        let hit = pick_link(&robot, Mat4::IDENTITY, &down(0.1, 0.05)).unwrap();
        assert_eq!(robot.links[hit.link].name, "arm");
        assert_relative_eq!(hit.distance, 7.5, epsilon = 1e-4);
        assert_relative_eq!(hit.point.z, 2.5, epsilon = 1e-4);

        let up = Ray::new(Vec3::new(0.1, 0.05, -10.0), Vec3::Z);
        let hit = pick_link(&robot, Mat4::IDENTITY, &up).unwrap();
        assert_eq!(robot.links[hit.link].name, "base");
        assert_relative_eq!(hit.distance, 9.5, epsilon = 1e-4);
    }

    #[test]
    fn test_pick_miss() {
        let robot = rig();
        let ray = Ray::new(Vec3::splat(10.0), Vec3::X);
        assert!(pick_link(&robot, Mat4::IDENTITY, &ray).is_none());
        // pointing away from the robot
        let ray = Ray::new(Vec3::new(0.1, 0.05, 10.0), Vec3::Z);
        assert!(pick_link(&robot, Mat4::IDENTITY, &ray).is_none());
    }

    #[test]
    fn test_pick_follows_display_and_pose() {
        let mut robot = rig();
        let display = RobotModel::display_transform(UpAxis::Y);

        // Z-up arm at z=2 sits at y=2 in a Y-up scene
        let ray = Ray::new(Vec3::new(0.1, 10.0, 0.05), Vec3::NEG_Y);
        let hit = pick_link(&robot, display, &ray).unwrap();
        assert_eq!(robot.links[hit.link].name, "arm");

        // tip swings from +X to +Y when the arm spins a quarter turn
        let hit = pick_link(&robot, Mat4::IDENTITY, &down(1.0, 0.02)).unwrap();
        assert_eq!(robot.links[hit.link].name, "tip");
        assert_relative_eq!(hit.point.z, 2.1, epsilon = 1e-4);
        assert!(pick_link(&robot, Mat4::IDENTITY, &down(0.02, 1.0)).is_none());

        robot.set_joint_value("spin", std::f32::consts::FRAC_PI_2).unwrap();
        assert!(pick_link(&robot, Mat4::IDENTITY, &down(1.0, 0.02)).is_none());
        let hit = pick_link(&robot, Mat4::IDENTITY, &down(0.02, 1.0)).unwrap();
        assert_eq!(robot.links[hit.link].name, "tip");
    }

    #[test]
    fn test_drag_joint_walks_past_fixed_and_mimic() {
        let robot = rig();
        let name = |link: &str| {
            drag_joint_for_link(&robot, link_index(&robot, link)).map(|j| j.name.clone())
        };
        assert_eq!(name("arm").as_deref(), Some("spin"));
        assert_eq!(name("tip").as_deref(), Some("spin"));
        assert_eq!(name("carriage").as_deref(), Some("slide"));
        assert_eq!(name("finger").as_deref(), Some("slide"));
        assert_eq!(name("base"), None);
        assert!(drag_joint_for_link(&robot, 99).is_none());
    }

    #[test]
    fn test_revolute_drag_sweeps_angle() {
        let robot = rig();
        let spin = robot.joint("spin").unwrap();

        let delta =
            joint_drag_delta(&robot, Mat4::IDENTITY, spin, &down(1.0, 0.0), &down(0.0, 1.0)).unwrap();
        assert_relative_eq!(delta, std::f32::consts::FRAC_PI_2, epsilon = 1e-5);

        let back =
            joint_drag_delta(&robot, Mat4::IDENTITY, spin, &down(0.0, 1.0), &down(1.0, 0.0)).unwrap();
        assert_relative_eq!(back, -std::f32::consts::FRAC_PI_2, epsilon = 1e-5);

        // edge-on to the rotation plane
        let side = Ray::new(Vec3::new(-10.0, 0.0, 2.0), Vec3::X);
        assert!(joint_drag_delta(&robot, Mat4::IDENTITY, spin, &side, &down(1.0, 0.0)).is_none());
    }

    #[test]
    fn test_prismatic_drag_follows_axis() {
        let robot = rig();
        let slide = robot.joint("slide").unwrap();

        let delta =
            joint_drag_delta(&robot, Mat4::IDENTITY, slide, &down(3.5, 0.0), &down(4.25, 0.3)).unwrap();
        assert_relative_eq!(delta, 0.75, epsilon = 1e-5);

        // a ray along the axis has no unique closest point
        let along = Ray::new(Vec3::new(0.0, 0.0, 0.0), Vec3::X);
        assert!(joint_drag_delta(&robot, Mat4::IDENTITY, slide, &along, &down(3.0, 0.0)).is_none());
    }

    #[test]
    fn test_fixed_joint_has_no_drag() {
        let robot = rig();
        let mount = robot.joint("tip_mount").unwrap();
        assert!(joint_drag_delta(&robot, Mat4::IDENTITY, mount, &down(1.0, 0.0), &down(0.0, 1.0)).is_none());
    }
}
