//! Headless viewer state: the loaded robot, camera, lights and scene flags.
//!
//! Everything here is GPU-free; the viewport picks up changes through
//! [`ViewerState::robot_revision`] and [`ViewerState::take_pose_dirty`].

use glam::Mat4;

use urdf_core::{
    BoundingBox, Payload, PayloadError, PipelineError, Ray, ReferenceStyle, RobotError, RobotModel,
    UpAxis, ViewerOptions, drag_joint_for_link, joint_drag_delta, load_payload, parse_hex_color,
    pick_link,
};
use urdf_renderer::{LightRig, OrbitCamera};

/// Errors raised by viewer operations
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ViewerError {
    #[error("Viewer has been disposed")]
    Disposed,
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    #[error(transparent)]
    Payload(#[from] PayloadError),
    #[error(transparent)]
    Robot(#[from] RobotError),
}

/// Joint being moved by a pointer drag
#[derive(Debug, Clone, PartialEq)]
struct JointDrag {
    joint: String,
    last_ray: Ray,
}

pub struct ViewerState {
    pub options: ViewerOptions,
    pub reference_style: ReferenceStyle,
    pub camera: OrbitCamera,
    pub lights: LightRig,
    robot: Option<RobotModel>,
    background: [f32; 4],
    show_grid: bool,
    unresolved: Vec<String>,
    /// Link under the pointer
    hovered_link: Option<usize>,
    joint_drag: Option<JointDrag>,
    /// Bumped whenever the robot is replaced or removed
    revision: u64,
    pose_dirty: bool,
    disposed: bool,
}

impl Default for ViewerState {
    fn default() -> Self {
        Self::new(ViewerOptions::default(), ReferenceStyle::default())
    }
}

impl ViewerState {
    pub fn new(options: ViewerOptions, reference_style: ReferenceStyle) -> Self {
        let mut camera = OrbitCamera::new(options.up_axis);
        camera.reset_distance(options.effective_distance());
        let lights = LightRig {
            up: options.up_axis,
            ..LightRig::default()
        };

        Self {
            background: options.background_rgba(),
            show_grid: options.show_grid,
            options,
            reference_style,
            camera,
            lights,
            robot: None,
            unresolved: Vec::new(),
            hovered_link: None,
            joint_drag: None,
            revision: 0,
            pose_dirty: false,
            disposed: false,
        }
    }

    /// Load a payload, replacing any robot already shown.
    ///
    /// On failure the previous robot stays in place.
    pub fn load_urdf_from_payload(&mut self, payload: &Payload) -> Result<(), ViewerError> {
        if self.disposed {
            return Err(ViewerError::Disposed);
        }

        let loaded = load_payload(payload, self.reference_style)?;
        tracing::info!(
            "Showing robot '{}' ({} links, {} joints, {} visuals)",
            loaded.robot.name,
            loaded.robot.links.len(),
            loaded.robot.joints.len(),
            loaded.robot.visual_count()
        );

        self.robot = Some(loaded.robot);
        self.unresolved = loaded.unresolved;
        self.hovered_link = None;
        self.joint_drag = None;
        self.options = loaded.options;
        self.revision += 1;
        self.pose_dirty = false;

        self.apply_up_axis(self.options.up_axis);
        self.camera.reset_distance(self.options.effective_distance());

        self.background = self.options.background_rgba();
        self.show_grid = self.options.show_grid;
        Ok(())
    }

    fn apply_up_axis(&mut self, up: UpAxis) {
        self.camera.set_up_axis(up);
        self.lights.up = up;
    }

    pub fn up_axis(&self) -> UpAxis {
        self.options.up_axis
    }

    pub fn robot(&self) -> Option<&RobotModel> {
        self.robot.as_ref()
    }

    /// Mesh references of the last load that had no payload entry
    pub fn unresolved(&self) -> &[String] {
        &self.unresolved
    }

    pub fn robot_revision(&self) -> u64 {
        self.revision
    }

    /// Whether joint values changed since the last call
    pub fn take_pose_dirty(&mut self) -> bool {
        std::mem::take(&mut self.pose_dirty)
    }

    /// Remove the robot, keeping the scene
    pub fn clear_robot(&mut self) {
        if self.robot.take().is_some() {
            self.revision += 1;
        }
        self.unresolved.clear();
        self.hovered_link = None;
        self.joint_drag = None;
        self.pose_dirty = false;
    }

    /// Set the background from a CSS hex colour
    pub fn set_background(&mut self, color: &str) -> Result<(), ViewerError> {
        let rgba = parse_hex_color(color)?;
        self.options.background = color.to_string();
        self.background = rgba;
        Ok(())
    }

    pub fn background(&self) -> [f32; 4] {
        self.background
    }

    pub fn set_grid(&mut self, visible: bool) {
        self.options.show_grid = visible;
        self.show_grid = visible;
    }

    pub fn show_grid(&self) -> bool {
        self.show_grid
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.camera.set_aspect(width, height);
    }

    /// Drive a joint; mimic joints follow. Returns the clamped value.
    pub fn set_joint_value(&mut self, name: &str, value: f32) -> Result<f32, ViewerError> {
        let robot = self
            .robot
            .as_mut()
            .ok_or_else(|| RobotError::JointNotFound(name.to_string()))?;
        let applied = robot.set_joint_value(name, value)?;
        self.pose_dirty = true;
        Ok(applied)
    }

    pub fn reset_joints(&mut self) {
        if let Some(robot) = self.robot.as_mut() {
            robot.reset_joints();
            self.pose_dirty = true;
        }
    }

    /// Ray under a pointer at `(x, y)` of a `width` × `height` viewport
    pub fn pointer_ray(&self, x: f32, y: f32, width: f32, height: f32) -> Ray {
        self.camera.screen_to_ray(x, y, width, height)
    }

    /// Update the hovered link from the pointer ray, `None` when the pointer left.
    /// Returns the hovered link index.
    pub fn hover(&mut self, ray: Option<&Ray>) -> Option<usize> {
        let display = self.display_transform();
        self.hovered_link = match (ray, self.robot.as_ref()) {
            (Some(ray), Some(robot)) => pick_link(robot, display, ray).map(|hit| hit.link),
            _ => None,
        };
        self.hovered_link
    }

    pub fn hovered_link(&self) -> Option<usize> {
        self.hovered_link
    }

    /// Start dragging the joint that moves the link under `ray`.
    /// Returns false when the pointer is not over a movable link.
    pub fn begin_joint_drag(&mut self, ray: &Ray) -> bool {
        let display = self.display_transform();
        let Some(robot) = self.robot.as_ref() else {
            return false;
        };
        let Some(hit) = pick_link(robot, display, ray) else {
            return false;
        };
        let Some(joint) = drag_joint_for_link(robot, hit.link) else {
            return false;
        };

        tracing::debug!("Dragging joint '{}' from link '{}'", joint.name, robot.links[hit.link].name);
        self.hovered_link = Some(hit.link);
        self.joint_drag = Some(JointDrag {
            joint: joint.name.clone(),
            last_ray: *ray,
        });
        true
    }

    /// Move the dragged joint to follow the pointer. Returns the applied value.
    pub fn drag_joint(&mut self, ray: &Ray) -> Option<f32> {
        let display = self.display_transform();
        let drag = self.joint_drag.as_mut()?;
        let robot = self.robot.as_mut()?;
        let joint = robot.joint(&drag.joint)?;

        let delta = joint_drag_delta(robot, display, joint, &drag.last_ray, ray)?;
        let target = joint.value + delta;
        drag.last_ray = *ray;

        let applied = robot.set_joint_value(&drag.joint, target).ok()?;
        self.pose_dirty = true;
        Some(applied)
    }

    pub fn end_joint_drag(&mut self) {
        self.joint_drag = None;
    }

    /// Name of the joint under a pointer drag
    pub fn dragged_joint(&self) -> Option<&str> {
        self.joint_drag.as_ref().map(|d| d.joint.as_str())
    }

    /// Robot bounds in scene space (after the up-axis rotation)
    pub fn scene_bounds(&self) -> BoundingBox {
        self.robot
            .as_ref()
            .map(|r| r.bounds().transform(&self.display_transform()))
            .unwrap_or_else(BoundingBox::empty)
    }

    pub fn display_transform(&self) -> Mat4 {
        RobotModel::display_transform(self.options.up_axis)
    }

    /// Frame the robot. Returns false when there is nothing to frame.
    pub fn fit_view(&mut self) -> bool {
        let bounds = self.scene_bounds();
        self.camera.fit_to_bounds(&bounds)
    }

    /// Advance camera damping by one frame
    pub fn update(&mut self) -> bool {
        self.camera.update()
    }

    /// Drop the robot and refuse further loads
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.clear_robot();
        self.camera.stop();
        self.disposed = true;
        tracing::debug!("Viewer disposed");
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }
}
