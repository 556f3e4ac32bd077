//! Joint sliders

use urdf_core::JointType;

use crate::panels::Panel;
use crate::viewer::ViewerState;

/// Range shown for joints without finite limits
const UNBOUNDED_ANGLE: f32 = std::f32::consts::PI;
const UNBOUNDED_DISTANCE: f32 = 1.0;

struct JointRow {
    name: String,
    joint_type: JointType,
    value: f32,
    range: (f32, f32),
}

/// One slider per movable joint. Mimic joints are driven by their source.
pub struct JointsPanel {
    show_degrees: bool,
}

impl JointsPanel {
    pub fn new() -> Self {
        Self { show_degrees: true }
    }
}

impl Default for JointsPanel {
    fn default() -> Self {
        Self::new()
    }
}

impl Panel for JointsPanel {
    fn name(&self) -> &str {
        "Joints"
    }

    fn ui(&mut self, ui: &mut egui::Ui, viewer: &mut ViewerState) {
        let Some(robot) = viewer.robot() else {
            ui.weak("No robot loaded");
            return;
        };

        let rows: Vec<JointRow> = robot
            .movable_joints()
            .map(|j| {
                let fallback = match j.joint_type {
                    JointType::Prismatic => UNBOUNDED_DISTANCE,
                    _ => UNBOUNDED_ANGLE,
                };
                JointRow {
                    name: j.name.clone(),
                    joint_type: j.joint_type,
                    value: j.value,
                    range: j.limits.display_range(j.joint_type, fallback),
                }
            })
            .collect();

        if rows.is_empty() {
            ui.weak("No movable joints");
            return;
        }

        ui.horizontal(|ui| {
            ui.checkbox(&mut self.show_degrees, "Degrees");
            if ui.button("Reset").clicked() {
                viewer.reset_joints();
            }
        });
        ui.separator();

        egui::ScrollArea::vertical().show(ui, |ui| {
            for row in rows {
                let angular = row.joint_type != JointType::Prismatic;
                let to_display = if angular && self.show_degrees { 180.0 / std::f32::consts::PI } else { 1.0 };
                let suffix = match (angular, self.show_degrees) {
                    (false, _) => " m",
                    (true, true) => "°",
                    (true, false) => " rad",
                };

                let mut shown = row.value * to_display;
                let range = (row.range.0 * to_display)..=(row.range.1 * to_display);

                ui.label(format!("{} ({})", row.name, row.joint_type.display_name()));
                let response = ui.add(egui::Slider::new(&mut shown, range).suffix(suffix));
                if response.changed() {
                    if let Err(e) = viewer.set_joint_value(&row.name, shown / to_display) {
                        tracing::warn!("{}", e);
                    }
                }
            }
        });
    }
}
