//! Main renderer: robot meshes with shadows, plus the ground grid

use bytemuck::{Pod, Zeroable};
use glam::Mat4;
use wgpu::util::DeviceExt;

use urdf_core::{BoundingBox, RobotModel, UpAxis};

use crate::camera::{CameraUniform, OrbitCamera};
use crate::grid::{GridConfig, GridRenderer};
use crate::light::{LightRig, LightUniform};
use crate::mesh::{MeshHandle, MeshManager, MeshVertex};

pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;
const SHADOW_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

const HIGHLIGHT_TINT: [f32; 3] = [1.0, 0.8, 0.25];
const HIGHLIGHT_MIX: f32 = 0.45;

/// Colour of a visual on the hovered link; alpha is kept
pub fn highlight_color(color: [f32; 4]) -> [f32; 4] {
    let mix = |c: f32, t: f32| c + (t - c) * HIGHLIGHT_MIX;
    [
        mix(color[0], HIGHLIGHT_TINT[0]),
        mix(color[1], HIGHLIGHT_TINT[1]),
        mix(color[2], HIGHLIGHT_TINT[2]),
        color[3],
    ]
}

/// Per-visual uniform (160 bytes)
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct ObjectUniform {
    pub model: [[f32; 4]; 4],
    /// Inverse transpose of `model`
    pub normal: [[f32; 4]; 4],
    pub color: [f32; 4],
    /// x = receive shadow
    pub flags: [f32; 4],
}

impl ObjectUniform {
    pub fn new(model: Mat4, color: [f32; 4], receive_shadow: bool) -> Self {
        let normal = if model.determinant().abs() > f32::EPSILON {
            model.inverse().transpose()
        } else {
            model
        };
        Self {
            model: model.to_cols_array_2d(),
            normal: normal.to_cols_array_2d(),
            color,
            flags: [if receive_shadow { 1.0 } else { 0.0 }, 0.0, 0.0, 0.0],
        }
    }
}

/// One drawn visual of the robot
struct RenderObject {
    mesh: MeshHandle,
    link: usize,
    visual: usize,
    cast_shadow: bool,
    buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

struct ShadowMap {
    size: u32,
    view: wgpu::TextureView,
    light_bind_group: wgpu::BindGroup,
}

/// Main renderer
pub struct Renderer {
    format: wgpu::TextureFormat,
    width: u32,
    height: u32,
    depth_view: wgpu::TextureView,

    camera_buffer: wgpu::Buffer,
    camera_bind_group: wgpu::BindGroup,

    light_buffer: wgpu::Buffer,
    light_bind_group_layout: wgpu::BindGroupLayout,
    shadow_sampler: wgpu::Sampler,
    shadow_map: ShadowMap,
    shadow_light_bind_group: wgpu::BindGroup,

    object_bind_group_layout: wgpu::BindGroupLayout,
    mesh_pipeline: wgpu::RenderPipeline,
    shadow_pipeline: wgpu::RenderPipeline,
    grid: GridRenderer,

    meshes: MeshManager,
    objects: Vec<RenderObject>,
    display_transform: Mat4,
    scene_bounds: BoundingBox,
    /// Link drawn with the highlight tint
    highlighted_link: Option<usize>,

    background: [f32; 4],
    grid_visible: bool,
    disposed: bool,
}

impl Renderer {
    pub fn new(device: &wgpu::Device, format: wgpu::TextureFormat, width: u32, height: u32) -> Self {
        let uniform_layout = |label: &str, visibility: wgpu::ShaderStages| {
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some(label),
                entries: &[uniform_entry(0, visibility)],
            })
        };

        let camera_bind_group_layout = uniform_layout("Camera Bind Group Layout", wgpu::ShaderStages::VERTEX_FRAGMENT);
        let object_bind_group_layout = uniform_layout("Object Bind Group Layout", wgpu::ShaderStages::VERTEX_FRAGMENT);
        let shadow_light_bind_group_layout =
            uniform_layout("Shadow Light Bind Group Layout", wgpu::ShaderStages::VERTEX);

        let light_bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Light Bind Group Layout"),
            entries: &[
                uniform_entry(0, wgpu::ShaderStages::VERTEX_FRAGMENT),
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Depth,
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Comparison),
                    count: None,
                },
            ],
        });

        let camera_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Camera Buffer"),
            contents: bytemuck::cast_slice(&[CameraUniform::default()]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let camera_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Camera Bind Group"),
            layout: &camera_bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: camera_buffer.as_entire_binding(),
            }],
        });

        let lights = LightRig::default();
        let light_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Light Buffer"),
            contents: bytemuck::cast_slice(&[lights.uniform(&BoundingBox::empty())]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let shadow_light_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Shadow Light Bind Group"),
            layout: &shadow_light_bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: light_buffer.as_entire_binding(),
            }],
        });

        let shadow_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Shadow Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            compare: Some(wgpu::CompareFunction::LessEqual),
            ..Default::default()
        });
        let shadow_map = create_shadow_map(
            device,
            &light_bind_group_layout,
            &light_buffer,
            &shadow_sampler,
            lights.directional.shadow_map_size,
        );

        let mesh_pipeline = create_mesh_pipeline(
            device,
            format,
            &[&camera_bind_group_layout, &light_bind_group_layout, &object_bind_group_layout],
        );
        let shadow_pipeline =
            create_shadow_pipeline(device, &[&shadow_light_bind_group_layout, &object_bind_group_layout]);

        let grid = GridRenderer::new(device, format, DEPTH_FORMAT, &camera_bind_group_layout, GridConfig::default());
        let depth_view = create_depth_view(device, width, height);

        Self {
            format,
            width: width.max(1),
            height: height.max(1),
            depth_view,
            camera_buffer,
            camera_bind_group,
            light_buffer,
            light_bind_group_layout,
            shadow_sampler,
            shadow_map,
            shadow_light_bind_group,
            object_bind_group_layout,
            mesh_pipeline,
            shadow_pipeline,
            grid,
            meshes: MeshManager::new(),
            objects: Vec::new(),
            display_transform: Mat4::IDENTITY,
            scene_bounds: BoundingBox::empty(),
            highlighted_link: None,
            background: urdf_core::DEFAULT_BACKGROUND,
            grid_visible: true,
            disposed: false,
        }
    }

    pub fn format(&self) -> wgpu::TextureFormat {
        self.format
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Upload every visual of `robot` that has geometry, replacing any previous robot.
    ///
    /// `display` is applied on top of the robot's world transforms (up-axis fix).
    pub fn set_robot(&mut self, device: &wgpu::Device, robot: &RobotModel, display: Mat4) {
        if self.disposed {
            tracing::warn!("set_robot on a disposed renderer");
            return;
        }
        self.clear_robot();
        self.display_transform = display;

        for (link_index, link) in robot.links.iter().enumerate() {
            for (visual_index, visual) in link.visuals.iter().enumerate() {
                let Some(geometry) = visual.geometry.mesh() else {
                    continue;
                };
                let Some(mesh) = self.meshes.upload(device, geometry) else {
                    continue;
                };

                let model = display * link.world_transform * visual.local_transform();
                let color = self.object_color(link_index, visual.color);
                let uniform = ObjectUniform::new(model, color, visual.receive_shadow);
                let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("Object Uniform Buffer"),
                    contents: bytemuck::cast_slice(&[uniform]),
                    usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                });
                let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some("Object Bind Group"),
                    layout: &self.object_bind_group_layout,
                    entries: &[wgpu::BindGroupEntry {
                        binding: 0,
                        resource: buffer.as_entire_binding(),
                    }],
                });

                self.objects.push(RenderObject {
                    mesh,
                    link: link_index,
                    visual: visual_index,
                    cast_shadow: visual.cast_shadow,
                    buffer,
                    bind_group,
                });
            }
        }

        self.scene_bounds = self.compute_bounds(robot);
        tracing::debug!(
            "Renderer holds {} objects over {} meshes",
            self.objects.len(),
            self.meshes.len()
        );
    }

    /// Push new link transforms, colours and shadow flags after the robot changed
    pub fn update_robot(&mut self, queue: &wgpu::Queue, robot: &RobotModel) {
        let highlighted = self.highlighted_link;
        for object in &mut self.objects {
            let Some(link) = robot.links.get(object.link) else {
                continue;
            };
            let Some(visual) = link.visuals.get(object.visual) else {
                continue;
            };
            let model = self.display_transform * link.world_transform * visual.local_transform();
            let color = if highlighted == Some(object.link) {
                highlight_color(visual.color)
            } else {
                visual.color
            };
            let uniform = ObjectUniform::new(model, color, visual.receive_shadow);
            object.cast_shadow = visual.cast_shadow;
            queue.write_buffer(&object.buffer, 0, bytemuck::cast_slice(&[uniform]));
        }
        self.scene_bounds = self.compute_bounds(robot);
    }

    fn object_color(&self, link: usize, color: [f32; 4]) -> [f32; 4] {
        if self.highlighted_link == Some(link) {
            highlight_color(color)
        } else {
            color
        }
    }

    /// Tint `link`'s visuals from the next upload. Returns true if it changed.
    pub fn set_highlighted_link(&mut self, link: Option<usize>) -> bool {
        std::mem::replace(&mut self.highlighted_link, link) != link
    }

    fn compute_bounds(&self, robot: &RobotModel) -> BoundingBox {
        robot.bounds().transform(&self.display_transform)
    }

    /// Bounds of the displayed robot in scene space
    pub fn scene_bounds(&self) -> BoundingBox {
        self.scene_bounds
    }

    pub fn clear_robot(&mut self) {
        self.objects.clear();
        self.meshes.clear();
        self.scene_bounds = BoundingBox::empty();
        self.highlighted_link = None;
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    pub fn set_background(&mut self, rgba: [f32; 4]) {
        self.background = rgba;
    }

    pub fn background(&self) -> [f32; 4] {
        self.background
    }

    pub fn set_grid_visible(&mut self, visible: bool) {
        self.grid_visible = visible;
    }

    pub fn grid_visible(&self) -> bool {
        self.grid_visible
    }

    pub fn set_up_axis(&mut self, device: &wgpu::Device, up: UpAxis) {
        self.grid.set_up_axis(device, up);
    }

    pub fn resize(&mut self, device: &wgpu::Device, width: u32, height: u32) {
        let (width, height) = (width.max(1), height.max(1));
        if (width, height) == (self.width, self.height) {
            return;
        }
        self.width = width;
        self.height = height;
        self.depth_view = create_depth_view(device, width, height);
    }

    /// Render one frame into `view`
    pub fn render(
        &mut self,
        device: &wgpu::Device,
        encoder: &mut wgpu::CommandEncoder,
        view: &wgpu::TextureView,
        queue: &wgpu::Queue,
        camera: &OrbitCamera,
        lights: &LightRig,
    ) {
        if self.disposed {
            return;
        }

        if self.shadow_map.size != lights.directional.shadow_map_size {
            self.shadow_map = create_shadow_map(
                device,
                &self.light_bind_group_layout,
                &self.light_buffer,
                &self.shadow_sampler,
                lights.directional.shadow_map_size,
            );
        }

        queue.write_buffer(&self.camera_buffer, 0, bytemuck::cast_slice(&[camera.uniform()]));
        let light_uniform: LightUniform = lights.uniform(&self.scene_bounds);
        queue.write_buffer(&self.light_buffer, 0, bytemuck::cast_slice(&[light_uniform]));

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Shadow Pass"),
                color_attachments: &[],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.shadow_map.view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            if lights.directional.cast_shadow {
                pass.set_pipeline(&self.shadow_pipeline);
                pass.set_bind_group(0, &self.shadow_light_bind_group, &[]);
                for object in self.objects.iter().filter(|o| o.cast_shadow) {
                    self.draw_object(&mut pass, object, 1);
                }
            }
        }

        let [r, g, b, a] = self.background;
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Main Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color {
                        r: r as f64,
                        g: g as f64,
                        b: b as f64,
                        a: a as f64,
                    }),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &self.depth_view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        if !self.objects.is_empty() {
            pass.set_pipeline(&self.mesh_pipeline);
            pass.set_bind_group(0, &self.camera_bind_group, &[]);
            pass.set_bind_group(1, &self.shadow_map.light_bind_group, &[]);
            for object in &self.objects {
                self.draw_object(&mut pass, object, 2);
            }
        }

        if self.grid_visible {
            self.grid.render(&mut pass, &self.camera_bind_group);
        }
    }

    fn draw_object(&self, pass: &mut wgpu::RenderPass<'_>, object: &RenderObject, group: u32) {
        let Some(mesh) = self.meshes.get(object.mesh) else {
            return;
        };
        pass.set_bind_group(group, &object.bind_group, &[]);
        pass.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
        pass.set_index_buffer(mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
        pass.draw_indexed(0..mesh.index_count, 0, 0..1);
    }

    /// Release GPU resources held for the robot; further renders are no-ops
    pub fn dispose(&mut self) {
        self.clear_robot();
        self.disposed = true;
        tracing::debug!("Renderer disposed");
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }
}

fn uniform_entry(binding: u32, visibility: wgpu::ShaderStages) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn create_depth_view(device: &wgpu::Device, width: u32, height: u32) -> wgpu::TextureView {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Depth Texture"),
        size: wgpu::Extent3d {
            width: width.max(1),
            height: height.max(1),
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: DEPTH_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    texture.create_view(&wgpu::TextureViewDescriptor::default())
}

fn create_shadow_map(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    light_buffer: &wgpu::Buffer,
    sampler: &wgpu::Sampler,
    size: u32,
) -> ShadowMap {
    let texture_size = size.clamp(256, 8192);
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Shadow Map Texture"),
        size: wgpu::Extent3d {
            width: texture_size,
            height: texture_size,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: SHADOW_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
        view_formats: &[],
    });
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

    let light_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("Light Bind Group"),
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: light_buffer.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::TextureView(&view),
            },
            wgpu::BindGroupEntry {
                binding: 2,
                resource: wgpu::BindingResource::Sampler(sampler),
            },
        ],
    });

    ShadowMap {
        size,
        view,
        light_bind_group,
    }
}

fn create_mesh_pipeline(
    device: &wgpu::Device,
    format: wgpu::TextureFormat,
    bind_group_layouts: &[&wgpu::BindGroupLayout],
) -> wgpu::RenderPipeline {
    let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("Mesh Shader"),
        source: wgpu::ShaderSource::Wgsl(include_str!("shaders/mesh.wgsl").into()),
    });
    let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("Mesh Pipeline Layout"),
        bind_group_layouts,
        push_constant_ranges: &[],
    });

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("Mesh Pipeline"),
        layout: Some(&layout),
        vertex: wgpu::VertexState {
            module: &shader,
            entry_point: Some("vs_main"),
            buffers: &[MeshVertex::layout()],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: &shader,
            entry_point: Some("fs_main"),
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            front_face: wgpu::FrontFace::Ccw,
            // STL winding is not reliable; both sides are lit
            cull_mode: None,
            ..Default::default()
        },
        depth_stencil: Some(wgpu::DepthStencilState {
            format: DEPTH_FORMAT,
            depth_write_enabled: true,
            depth_compare: wgpu::CompareFunction::Less,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        }),
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
        cache: None,
    })
}

fn create_shadow_pipeline(
    device: &wgpu::Device,
    bind_group_layouts: &[&wgpu::BindGroupLayout],
) -> wgpu::RenderPipeline {
    let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("Shadow Shader"),
        source: wgpu::ShaderSource::Wgsl(include_str!("shaders/shadow.wgsl").into()),
    });
    let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("Shadow Pipeline Layout"),
        bind_group_layouts,
        push_constant_ranges: &[],
    });

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("Shadow Pipeline"),
        layout: Some(&layout),
        vertex: wgpu::VertexState {
            module: &shader,
            entry_point: Some("vs_main"),
            buffers: &[MeshVertex::layout()],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        },
        fragment: None,
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            cull_mode: None,
            ..Default::default()
        },
        depth_stencil: Some(wgpu::DepthStencilState {
            format: SHADOW_FORMAT,
            depth_write_enabled: true,
            depth_compare: wgpu::CompareFunction::LessEqual,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState {
                constant: 2,
                slope_scale: 2.0,
                clamp: 0.0,
            },
        }),
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
        cache: None,
    })
}
