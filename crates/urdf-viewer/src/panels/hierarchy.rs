//! Hierarchy panel - tree view of the loaded robot

use urdf_core::RobotModel;

use crate::panels::Panel;
use crate::viewer::ViewerState;

/// Link tree, with the joint leading to each child link
pub struct HierarchyPanel;

impl HierarchyPanel {
    pub fn new() -> Self {
        Self
    }
}

impl Default for HierarchyPanel {
    fn default() -> Self {
        Self::new()
    }
}

impl Panel for HierarchyPanel {
    fn name(&self) -> &str {
        "Hierarchy"
    }

    fn ui(&mut self, ui: &mut egui::Ui, viewer: &mut ViewerState) {
        let Some(robot) = viewer.robot() else {
            ui.weak("No robot loaded.\nOpen a payload or a package directory.");
            return;
        };

        ui.strong(&robot.name);

        egui::ScrollArea::vertical().show(ui, |ui| {
            let mut visited = vec![false; robot.links.len()];
            render_link_tree(ui, robot, robot.root_link, 0, &mut visited);
        });

        let unresolved = viewer.unresolved();
        if !unresolved.is_empty() {
            ui.separator();
            ui.colored_label(egui::Color32::YELLOW, format!("{} missing meshes", unresolved.len()));
            for reference in unresolved {
                ui.weak(reference);
            }
        }
    }
}

fn render_link_tree(
    ui: &mut egui::Ui,
    robot: &RobotModel,
    link_index: usize,
    depth: usize,
    visited: &mut [bool],
) {
    if std::mem::replace(&mut visited[link_index], true) {
        return;
    }
    let link = &robot.links[link_index];
    let indent = depth as f32 * 16.0;

    let mut children = robot.child_joints(&link.name).peekable();
    let icon = if children.peek().is_some() { "▼" } else { "•" };

    ui.horizontal(|ui| {
        ui.add_space(indent);
        ui.label(format!("{} {}", icon, link.name))
            .on_hover_text(format!("{} visuals", link.visuals.len()));
    });

    for joint in children {
        ui.horizontal(|ui| {
            ui.add_space(indent + 8.0);
            ui.weak(format!("↳ {} ({})", joint.name, joint.joint_type.display_name()));
        });
        if let Some(child) = robot.links.iter().position(|l| l.name == joint.child) {
            render_link_tree(ui, robot, child, depth + 1, visited);
        }
    }
}
