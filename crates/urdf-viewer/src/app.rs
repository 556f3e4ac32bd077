//! eframe application: menus, side panels and the 3D viewport

use std::sync::Arc;

#[cfg(not(target_arch = "wasm32"))]
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use urdf_core::{Payload, PayloadError, ReferenceStyle};

use crate::config::{SharedConfig, create_shared_config};
use crate::panels::{HierarchyPanel, JointsPanel, Panel};
use crate::viewer::{ViewerError, ViewerState};
use crate::viewport_state::{SharedViewportState, ViewportState};

/// Errors surfaced by app-level actions
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Payload(#[from] PayloadError),
    #[error(transparent)]
    Package(#[from] urdf_core::PackageError),
    #[error(transparent)]
    Viewer(#[from] ViewerError),
    #[error("No payload loaded")]
    NothingToExport,
}

/// Actions queued from the UI and run after the frame's widgets
#[derive(Debug, Clone)]
enum AppAction {
    #[cfg(not(target_arch = "wasm32"))]
    OpenPayload(PathBuf),
    #[cfg(not(target_arch = "wasm32"))]
    OpenPackage(PathBuf),
    #[cfg(not(target_arch = "wasm32"))]
    ExportPayload(PathBuf),
    FitView,
    ResetJoints,
    ResetSettings,
}

pub struct UrdfViewerApp {
    viewer: ViewerState,
    viewport: Option<SharedViewportState>,
    /// Owns the egui renderer the viewport texture is registered with
    render_state: Option<egui_wgpu::RenderState>,
    config: SharedConfig,
    hierarchy_panel: HierarchyPanel,
    joints_panel: JointsPanel,
    /// Payload currently shown, kept for export
    payload: Option<Payload>,
    pending: Vec<AppAction>,
    status: Option<String>,
}

impl UrdfViewerApp {
    /// Create the app. `reference_style` overrides the configured one.
    pub fn new(
        cc: &eframe::CreationContext<'_>,
        initial: Option<Payload>,
        reference_style: Option<ReferenceStyle>,
    ) -> Self {
        let config = create_shared_config();
        let (options, style, camera_config) = {
            let manager = config.read();
            let c = manager.config();
            (
                c.viewer.clone(),
                reference_style.unwrap_or(c.reference_style),
                c.camera.clone(),
            )
        };

        let mut viewer = ViewerState::new(options, style);
        camera_config.apply(&mut viewer.camera);

        let render_state = cc.wgpu_render_state.clone();
        let viewport = render_state.as_ref().map(|rs| {
            Arc::new(Mutex::new(ViewportState::new(
                rs.device.clone(),
                rs.queue.clone(),
                rs.target_format,
            )))
        });
        if viewport.is_none() {
            tracing::error!("wgpu render state unavailable; the viewport will stay empty");
        }

        let mut app = Self {
            viewer,
            viewport,
            render_state,
            config,
            hierarchy_panel: HierarchyPanel::new(),
            joints_panel: JointsPanel::new(),
            payload: None,
            pending: Vec::new(),
            status: None,
        };

        if let Some(payload) = initial {
            app.load_payload(payload);
        }
        app
    }

    /// Show `payload`, replacing the current robot. Failures go to the status bar.
    pub fn load_payload(&mut self, payload: Payload) {
        if let Err(e) = self.try_load_payload(payload) {
            tracing::error!("Failed to load payload: {}", e);
            self.status = Some(format!("Load failed: {}", e));
        }
    }

    fn try_load_payload(&mut self, payload: Payload) -> Result<(), AppError> {
        self.viewer.load_urdf_from_payload(&payload)?;
        self.status = self.viewer.robot().map(|robot| {
            let missing = self.viewer.unresolved().len();
            if missing > 0 {
                format!("Loaded '{}' ({} meshes missing)", robot.name, missing)
            } else {
                format!("Loaded '{}'", robot.name)
            }
        });
        self.payload = Some(payload);
        Ok(())
    }

    /// Parse and show a JSON payload
    pub fn load_payload_json(&mut self, json: &str) -> Result<(), AppError> {
        let payload = Payload::from_json(json)?;
        self.try_load_payload(payload)
    }

    /// Release the robot and GPU resources
    pub fn dispose(&mut self) {
        self.viewer.dispose();
        if let Some(viewport) = self.viewport.take() {
            let mut viewport = viewport.lock();
            match &self.render_state {
                Some(render_state) => viewport.dispose(Some(&mut *render_state.renderer.write())),
                None => viewport.dispose(None),
            }
        }
    }

    #[cfg(not(target_arch = "wasm32"))]
    fn open_payload(&mut self, path: &Path) -> Result<(), AppError> {
        let json = std::fs::read_to_string(path)?;
        self.load_payload_json(&json)
    }

    #[cfg(not(target_arch = "wasm32"))]
    fn open_package(&mut self, path: &Path) -> Result<(), AppError> {
        let options = self.config.read().config().viewer.clone();
        let payload = Payload::from_package_dir(path, options)?;
        self.try_load_payload(payload)
    }

    #[cfg(not(target_arch = "wasm32"))]
    fn export_payload(&self, path: &Path) -> Result<(), AppError> {
        let payload = self.payload.as_ref().ok_or(AppError::NothingToExport)?;
        std::fs::write(path, payload.to_json()?)?;
        tracing::info!("Exported payload to {:?}", path);
        Ok(())
    }

    fn process_actions(&mut self) {
        for action in std::mem::take(&mut self.pending) {
            let result = match action {
                #[cfg(not(target_arch = "wasm32"))]
                AppAction::OpenPayload(path) => self.open_payload(&path),
                #[cfg(not(target_arch = "wasm32"))]
                AppAction::OpenPackage(path) => self.open_package(&path),
                #[cfg(not(target_arch = "wasm32"))]
                AppAction::ExportPayload(path) => self.export_payload(&path).map(|()| {
                    self.status = Some(format!("Exported {}", path.display()));
                }),
                AppAction::FitView => {
                    if !self.viewer.fit_view() {
                        self.status = Some("Nothing to frame".into());
                    }
                    Ok(())
                }
                AppAction::ResetJoints => {
                    self.viewer.reset_joints();
                    Ok(())
                }
                AppAction::ResetSettings => {
                    let camera = {
                        let mut config = self.config.write();
                        config.reset_to_defaults();
                        config.config().camera.clone()
                    };
                    camera.apply(&mut self.viewer.camera);
                    self.status = Some("Settings reset to defaults".into());
                    Ok(())
                }
            };
            if let Err(e) = result {
                tracing::error!("{}", e);
                self.status = Some(e.to_string());
            }
        }
    }

    fn menu_bar(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::top("menu_bar").show(ctx, |ui| {
            egui::menu::bar(ui, |ui| {
                #[cfg(not(target_arch = "wasm32"))]
                ui.menu_button("File", |ui| {
                    if ui.button("Open Payload...").clicked() {
                        if let Some(path) = rfd::FileDialog::new()
                            .add_filter("Payload", &["json"])
                            .pick_file()
                        {
                            self.pending.push(AppAction::OpenPayload(path));
                        }
                        ui.close_menu();
                    }
                    if ui.button("Open Package Directory...").clicked() {
                        if let Some(path) = rfd::FileDialog::new().pick_folder() {
                            self.pending.push(AppAction::OpenPackage(path));
                        }
                        ui.close_menu();
                    }
                    ui.separator();
                    let can_export = self.payload.is_some();
                    if ui
                        .add_enabled(can_export, egui::Button::new("Export Payload..."))
                        .clicked()
                    {
                        if let Some(path) = rfd::FileDialog::new()
                            .add_filter("Payload", &["json"])
                            .set_file_name("payload.json")
                            .save_file()
                        {
                            self.pending.push(AppAction::ExportPayload(path));
                        }
                        ui.close_menu();
                    }
                });

                ui.menu_button("View", |ui| {
                    if ui.button("Fit View").clicked() {
                        self.pending.push(AppAction::FitView);
                        ui.close_menu();
                    }
                    if ui.button("Reset Joints").clicked() {
                        self.pending.push(AppAction::ResetJoints);
                        ui.close_menu();
                    }
                    ui.separator();

                    let mut grid = self.viewer.show_grid();
                    if ui.checkbox(&mut grid, "Grid").changed() {
                        self.viewer.set_grid(grid);
                    }

                    let mut ui_config = self.config.read().config().ui.clone();
                    let hierarchy = ui.checkbox(&mut ui_config.show_hierarchy, "Hierarchy Panel");
                    let joints = ui.checkbox(&mut ui_config.show_joints, "Joints Panel");
                    if hierarchy.changed() || joints.changed() {
                        self.config.write().config_mut().ui = ui_config;
                    }
                    ui.separator();

                    let config_path = self.config.read().config_file_path().display().to_string();
                    if ui
                        .button("Reset Settings")
                        .on_hover_text(format!("Stored in {}", config_path))
                        .clicked()
                    {
                        self.pending.push(AppAction::ResetSettings);
                        ui.close_menu();
                    }
                });
            });
        });
    }

    fn status_bar(&self, ctx: &egui::Context) {
        egui::TopBottomPanel::bottom("status_bar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                match self.viewer.robot() {
                    Some(robot) => ui.label(format!(
                        "{}: {} links, {} joints",
                        robot.name,
                        robot.links.len(),
                        robot.joints.len()
                    )),
                    None => ui.weak("No robot"),
                };
                if let Some(pointer) = self.pointer_status() {
                    ui.separator();
                    ui.label(pointer);
                }
                if let Some(status) = &self.status {
                    ui.separator();
                    ui.label(status);
                }
            });
        });
    }

    /// Joint being dragged, or the link under the pointer
    fn pointer_status(&self) -> Option<String> {
        let robot = self.viewer.robot()?;
        if let Some(name) = self.viewer.dragged_joint() {
            let value = robot.joint_value(name)?;
            return Some(format!("{}: {:.3}", name, value));
        }
        let link = robot.links.get(self.viewer.hovered_link()?)?;
        Some(link.name.clone())
    }

    fn viewport_ui(&mut self, ui: &mut egui::Ui) {
        let (rect, response) =
            ui.allocate_exact_size(ui.available_size(), egui::Sense::click_and_drag());
        self.handle_input(ui, &response);

        let (Some(viewport), Some(render_state)) = (&self.viewport, &self.render_state) else {
            return;
        };

        let pixels_per_point = ui.ctx().pixels_per_point();
        let width = (rect.width() * pixels_per_point).round() as u32;
        let height = (rect.height() * pixels_per_point).round() as u32;
        self.viewer.resize(width, height);
        self.viewer.update();

        let mut viewport = viewport.lock();
        viewport.sync(&mut self.viewer);
        let texture_id = {
            let mut egui_renderer = render_state.renderer.write();
            viewport.ensure_texture(width, height, &mut egui_renderer)
        };
        viewport.render(&self.viewer);

        ui.painter().image(
            texture_id,
            rect,
            egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0)),
            egui::Color32::WHITE,
        );
    }

    /// Left drag moves the joint under the pointer or orbits, right or middle
    /// drag pans, scroll zooms, double click fits. Hovering highlights a link.
    fn handle_input(&mut self, ui: &egui::Ui, response: &egui::Response) {
        let rect = response.rect;
        let pointer_ray = |viewer: &ViewerState, pos: egui::Pos2| {
            viewer.pointer_ray(pos.x - rect.min.x, pos.y - rect.min.y, rect.width(), rect.height())
        };

        if response.drag_started_by(egui::PointerButton::Primary) {
            if let Some(pos) = response.interact_pointer_pos() {
                let ray = pointer_ray(&self.viewer, pos);
                self.viewer.begin_joint_drag(&ray);
            }
        }

        let delta = response.drag_delta();
        if response.dragged_by(egui::PointerButton::Primary) {
            if self.viewer.dragged_joint().is_some() {
                if let Some(pos) = response.interact_pointer_pos() {
                    let ray = pointer_ray(&self.viewer, pos);
                    self.viewer.drag_joint(&ray);
                }
            } else {
                self.viewer.camera.orbit(delta.x, delta.y);
            }
        } else if response.dragged_by(egui::PointerButton::Secondary)
            || response.dragged_by(egui::PointerButton::Middle)
        {
            self.viewer.camera.pan(delta.x, delta.y, response.rect.height());
        }

        if response.drag_stopped() {
            self.viewer.end_joint_drag();
        }

        // Keep the dragged link lit while its joint moves
        if self.viewer.dragged_joint().is_none() {
            let ray = response.hover_pos().map(|pos| pointer_ray(&self.viewer, pos));
            self.viewer.hover(ray.as_ref());
        }

        if response.hovered() {
            let scroll = ui.input(|i| i.smooth_scroll_delta.y);
            if scroll != 0.0 {
                let zoom_speed = self.config.read().config().camera.zoom_speed;
                self.viewer.camera.zoom(scroll * zoom_speed);
            }
        }

        if response.double_clicked() {
            self.pending.push(AppAction::FitView);
        }
    }
}

fn show_panel(ui: &mut egui::Ui, panel: &mut dyn Panel, viewer: &mut ViewerState) {
    ui.heading(panel.name());
    ui.separator();
    panel.ui(ui, viewer);
}

impl eframe::App for UrdfViewerApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.menu_bar(ctx);
        self.status_bar(ctx);

        let (show_hierarchy, show_joints) = {
            let config = self.config.read();
            (config.config().ui.show_hierarchy, config.config().ui.show_joints)
        };

        if show_hierarchy {
            egui::SidePanel::left("hierarchy_panel")
                .resizable(true)
                .default_width(220.0)
                .show(ctx, |ui| {
                    show_panel(ui, &mut self.hierarchy_panel, &mut self.viewer);
                });
        }
        if show_joints {
            egui::SidePanel::right("joints_panel")
                .resizable(true)
                .default_width(260.0)
                .show(ctx, |ui| {
                    show_panel(ui, &mut self.joints_panel, &mut self.viewer);
                });
        }

        egui::CentralPanel::default()
            .frame(egui::Frame::none())
            .show(ctx, |ui| {
                self.viewport_ui(ui);
            });

        self.process_actions();

        // Continuous redraw while the viewer is alive
        if !self.viewer.is_disposed() {
            ctx.request_repaint();
        }
    }

    fn on_exit(&mut self) {
        if let Err(e) = self.config.write().save() {
            tracing::warn!("Failed to save config: {}", e);
        }
        self.dispose();
    }
}
