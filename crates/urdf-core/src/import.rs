//! URDF import
//!
//! Parses URDF text and builds a [`RobotModel`], asking a [`MeshLoader`] for
//! every `<mesh>` reference it meets.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use glam::Vec3;

use crate::loader::{MeshError, MeshLoader};
use crate::primitive::{
    generate_box_mesh, generate_capsule_mesh, generate_cylinder_mesh, generate_sphere_mesh,
};
use crate::robot::{Joint, Link, RobotModel, Visual, VisualGeometry};
use crate::types::{JointLimits, JointMimic, JointType, Pose};

/// Colour given to visuals without a resolvable material (#8aa1ff)
pub const DEFAULT_MESH_COLOR: [f32; 4] = [138.0 / 255.0, 161.0 / 255.0, 1.0, 1.0];

/// Import options for URDF loading
#[derive(Debug, Clone)]
pub struct ImportOptions {
    /// Default material color if not specified
    pub default_color: [f32; 4],
    /// Initial shadow flag for every visual (cast and receive)
    pub shadows: bool,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            default_color: DEFAULT_MESH_COLOR,
            shadows: true,
        }
    }
}

/// Errors that can occur during URDF import
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ImportError {
    #[error("Failed to parse URDF: {0}")]
    UrdfParse(String),

    #[error("Empty URDF: no links defined")]
    EmptyUrdf,

    #[error("Duplicate link name: {0}")]
    DuplicateLink(String),

    #[error("Link not found: {0}")]
    LinkNotFound(String),

    #[error("No root link: every link is the child of a joint")]
    NoRootLink,

    #[error("Multiple root links: {0:?}")]
    MultipleRootLinks(Vec<String>),

    #[error("Failed to load mesh '{path}': {source}")]
    MeshLoad {
        path: String,
        #[source]
        source: MeshError,
    },
}

/// Parse `urdf` and build the robot tree.
///
/// Mesh references are passed verbatim to `loader`; a reference that yields
/// no geometry leaves an empty visual in place.
pub fn import_robot(
    urdf: &str,
    loader: &dyn MeshLoader,
    options: &ImportOptions,
) -> Result<RobotModel, ImportError> {
    let robot = urdf_rs::read_from_string(urdf).map_err(|e| ImportError::UrdfParse(e.to_string()))?;

    if robot.links.is_empty() {
        return Err(ImportError::EmptyUrdf);
    }

    let material_colors: HashMap<&str, [f32; 4]> = robot
        .materials
        .iter()
        .filter_map(|m| m.color.as_ref().map(|c| (m.name.as_str(), rgba(c))))
        .collect();

    let mut names: HashSet<&str> = HashSet::new();
    let mut links = Vec::with_capacity(robot.links.len());
    for urdf_link in &robot.links {
        if !names.insert(urdf_link.name.as_str()) {
            return Err(ImportError::DuplicateLink(urdf_link.name.clone()));
        }

        let mut link = Link::new(&urdf_link.name);
        for urdf_visual in &urdf_link.visual {
            link.visuals
                .push(convert_visual(urdf_visual, loader, options, &material_colors)?);
        }
        links.push(link);
    }

    let mut joints = Vec::with_capacity(robot.joints.len());
    for urdf_joint in &robot.joints {
        for link in [&urdf_joint.parent.link, &urdf_joint.child.link] {
            if !names.contains(link.as_str()) {
                return Err(ImportError::LinkNotFound(link.clone()));
            }
        }
        joints.push(convert_joint(urdf_joint));
    }

    // Root link: the one link that is not a child of any joint
    let child_links: HashSet<&str> = robot.joints.iter().map(|j| j.child.link.as_str()).collect();
    let roots: Vec<usize> = robot
        .links
        .iter()
        .enumerate()
        .filter(|(_, l)| !child_links.contains(l.name.as_str()))
        .map(|(i, _)| i)
        .collect();
    let root_link = match roots.as_slice() {
        [] => return Err(ImportError::NoRootLink),
        [root] => *root,
        _ => {
            return Err(ImportError::MultipleRootLinks(
                roots.iter().map(|&i| robot.links[i].name.clone()).collect(),
            ));
        }
    };

    let mut model = RobotModel::new(robot.name, links, joints, root_link);
    model.materials = material_colors
        .into_iter()
        .map(|(name, color)| (name.to_string(), color))
        .collect();
    tracing::info!(
        "Imported robot '{}': {} links, {} joints, {} visuals",
        model.name,
        model.links.len(),
        model.joints.len(),
        model.visual_count()
    );
    Ok(model)
}

fn convert_visual(
    visual: &urdf_rs::Visual,
    loader: &dyn MeshLoader,
    options: &ImportOptions,
    material_colors: &HashMap<&str, [f32; 4]>,
) -> Result<Visual, ImportError> {
    // Inline colour, then the robot-level material of the same name
    let (color, material_name) = match &visual.material {
        Some(mat) => {
            let color = mat
                .color
                .as_ref()
                .map(rgba)
                .or_else(|| material_colors.get(mat.name.as_str()).copied())
                .unwrap_or(options.default_color);
            let name = (!mat.name.is_empty()).then(|| mat.name.clone());
            (color, name)
        }
        None => (options.default_color, None),
    };

    let geometry = match &visual.geometry {
        urdf_rs::Geometry::Mesh { filename, scale } => {
            let mesh = loader
                .load_mesh(filename)
                .map_err(|source| ImportError::MeshLoad {
                    path: filename.clone(),
                    source,
                })?;
            let scale = scale
                .as_ref()
                .map(|s| [s.0[0] as f32, s.0[1] as f32, s.0[2] as f32])
                .unwrap_or([1.0; 3]);
            VisualGeometry::Mesh {
                filename: filename.clone(),
                scale,
                mesh,
            }
        }
        urdf_rs::Geometry::Box { size } => VisualGeometry::Primitive {
            kind: "box",
            mesh: Arc::new(generate_box_mesh([
                size.0[0] as f32,
                size.0[1] as f32,
                size.0[2] as f32,
            ])),
        },
        urdf_rs::Geometry::Cylinder { radius, length } => VisualGeometry::Primitive {
            kind: "cylinder",
            mesh: Arc::new(generate_cylinder_mesh(*radius as f32, *length as f32)),
        },
        urdf_rs::Geometry::Sphere { radius } => VisualGeometry::Primitive {
            kind: "sphere",
            mesh: Arc::new(generate_sphere_mesh(*radius as f32)),
        },
        urdf_rs::Geometry::Capsule { radius, length } => VisualGeometry::Primitive {
            kind: "capsule",
            mesh: Arc::new(generate_capsule_mesh(*radius as f32, *length as f32)),
        },
    };

    Ok(Visual {
        name: visual.name.clone(),
        origin: Pose::from(&visual.origin),
        geometry,
        color,
        material_name,
        cast_shadow: options.shadows,
        receive_shadow: options.shadows,
    })
}

fn convert_joint(joint: &urdf_rs::Joint) -> Joint {
    let axis = Vec3::new(
        joint.axis.xyz.0[0] as f32,
        joint.axis.xyz.0[1] as f32,
        joint.axis.xyz.0[2] as f32,
    );
    let joint_type = JointType::from(&joint.joint_type);
    let limits = JointLimits::from(&joint.limit);

    Joint {
        name: joint.name.clone(),
        joint_type,
        parent: joint.parent.link.clone(),
        child: joint.child.link.clone(),
        origin: Pose::from(&joint.origin),
        axis: axis.try_normalize().unwrap_or(Vec3::X),
        limits,
        mimic: joint.mimic.as_ref().map(JointMimic::from),
        value: limits.clamp(0.0, joint_type),
    }
}

fn rgba(color: &urdf_rs::Color) -> [f32; 4] {
    [
        color.rgba.0[0] as f32,
        color.rgba.0[1] as f32,
        color.rgba.0[2] as f32,
        color.rgba.0[3] as f32,
    ]
}
