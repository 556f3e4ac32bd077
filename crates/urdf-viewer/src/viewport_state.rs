//! Viewport rendering state

use std::sync::Arc;

use parking_lot::Mutex;

use urdf_renderer::Renderer;

use crate::viewer::ViewerState;

/// Render texture for viewport
struct RenderTexture {
    _texture: wgpu::Texture,
    view: wgpu::TextureView,
    egui_texture_id: egui::TextureId,
    width: u32,
    height: u32,
}

/// GPU side of the viewer: renders the scene into a texture egui displays
pub struct ViewportState {
    pub renderer: Renderer,
    pub device: Arc<wgpu::Device>,
    pub queue: Arc<wgpu::Queue>,
    render_texture: Option<RenderTexture>,
    /// Robot revision last uploaded to the renderer
    uploaded_revision: u64,
}

impl ViewportState {
    pub fn new(device: Arc<wgpu::Device>, queue: Arc<wgpu::Queue>, format: wgpu::TextureFormat) -> Self {
        let renderer = Renderer::new(&device, format, 800, 600);
        Self {
            renderer,
            device,
            queue,
            render_texture: None,
            uploaded_revision: 0,
        }
    }

    /// Ensure the render texture matches the requested size
    pub fn ensure_texture(
        &mut self,
        width: u32,
        height: u32,
        egui_renderer: &mut egui_wgpu::Renderer,
    ) -> egui::TextureId {
        let width = width.max(1);
        let height = height.max(1);

        if let Some(rt) = &self.render_texture {
            if rt.width == width && rt.height == height {
                return rt.egui_texture_id;
            }
        }

        if let Some(old) = self.render_texture.take() {
            egui_renderer.free_texture(&old.egui_texture_id);
        }

        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Viewport Render Texture"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: self.renderer.format(),
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        let egui_texture_id =
            egui_renderer.register_native_texture(&self.device, &view, wgpu::FilterMode::Linear);

        self.renderer.resize(&self.device, width, height);

        self.render_texture = Some(RenderTexture {
            _texture: texture,
            view,
            egui_texture_id,
            width,
            height,
        });
        egui_texture_id
    }

    /// Push robot, pose, hover and scene flag changes from `viewer` to the renderer
    pub fn sync(&mut self, viewer: &mut ViewerState) {
        self.renderer.set_up_axis(&self.device, viewer.up_axis());
        self.renderer.set_background(viewer.background());
        self.renderer.set_grid_visible(viewer.show_grid());

        let mut dirty = viewer.take_pose_dirty();
        if viewer.robot_revision() != self.uploaded_revision {
            match viewer.robot() {
                Some(robot) => self
                    .renderer
                    .set_robot(&self.device, robot, viewer.display_transform()),
                None => self.renderer.clear_robot(),
            }
            self.uploaded_revision = viewer.robot_revision();
            tracing::debug!(
                "Uploaded robot revision {} ({} objects)",
                self.uploaded_revision,
                self.renderer.object_count()
            );
            dirty = false;
        }

        if self.renderer.set_highlighted_link(viewer.hovered_link()) {
            dirty = true;
        }
        if dirty {
            if let Some(robot) = viewer.robot() {
                self.renderer.update_robot(&self.queue, robot);
            }
        }
    }

    /// Render the 3D scene to the texture
    pub fn render(&mut self, viewer: &ViewerState) {
        let Some(rt) = &self.render_texture else {
            return;
        };

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Viewport Render Encoder"),
            });

        self.renderer.render(
            &self.device,
            &mut encoder,
            &rt.view,
            &self.queue,
            &viewer.camera,
            &viewer.lights,
        );

        self.queue.submit(std::iter::once(encoder.finish()));
    }

    /// Release GPU resources; later renders draw nothing
    pub fn dispose(&mut self, egui_renderer: Option<&mut egui_wgpu::Renderer>) {
        if let (Some(rt), Some(egui_renderer)) = (self.render_texture.take(), egui_renderer) {
            egui_renderer.free_texture(&rt.egui_texture_id);
        }
        self.renderer.dispose();
    }
}

pub type SharedViewportState = Arc<Mutex<ViewportState>>;
