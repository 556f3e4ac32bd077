//! Ground grid renderer

use bytemuck::{Pod, Zeroable};
use wgpu::util::DeviceExt;

use urdf_core::UpAxis;

use crate::light::hex_rgb;

/// Grid layout and colours
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridConfig {
    /// Edge length of the square grid
    pub size: f32,
    pub divisions: u32,
    pub center_color: u32,
    pub line_color: u32,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            size: 10.0,
            divisions: 20,
            center_color: 0x444444,
            line_color: 0x222222,
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct GridVertex {
    pub position: [f32; 3],
    pub color: [f32; 3],
}

/// Line-list vertices of the grid, lying on the ground plane of `up`
pub fn generate_grid_vertices(config: &GridConfig, up: UpAxis) -> Vec<GridVertex> {
    let half = config.size / 2.0;
    let divisions = config.divisions.max(1);
    let step = config.size / divisions as f32;
    let center = hex_rgb(config.center_color).to_array();
    let line = hex_rgb(config.line_color).to_array();

    // (u, v) in the ground plane
    let place = |u: f32, v: f32| -> [f32; 3] {
        match up {
            UpAxis::Y => [u, 0.0, v],
            UpAxis::Z => [u, v, 0.0],
        }
    };

    let mut vertices = Vec::with_capacity((divisions as usize + 1) * 4);
    for i in 0..=divisions {
        let k = -half + i as f32 * step;
        let color = if i * 2 == divisions { center } else { line };

        vertices.push(GridVertex { position: place(-half, k), color });
        vertices.push(GridVertex { position: place(half, k), color });
        vertices.push(GridVertex { position: place(k, -half), color });
        vertices.push(GridVertex { position: place(k, half), color });
    }
    vertices
}

/// Grid renderer
pub struct GridRenderer {
    pipeline: wgpu::RenderPipeline,
    vertex_buffer: wgpu::Buffer,
    vertex_count: u32,
    config: GridConfig,
    up: UpAxis,
}

impl GridRenderer {
    pub fn new(
        device: &wgpu::Device,
        format: wgpu::TextureFormat,
        depth_format: wgpu::TextureFormat,
        camera_bind_group_layout: &wgpu::BindGroupLayout,
        config: GridConfig,
    ) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Grid Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/grid.wgsl").into()),
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Grid Pipeline Layout"),
            bind_group_layouts: &[camera_bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Grid Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[wgpu::VertexBufferLayout {
                    array_stride: std::mem::size_of::<GridVertex>() as wgpu::BufferAddress,
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: &[
                        wgpu::VertexAttribute {
                            offset: 0,
                            shader_location: 0,
                            format: wgpu::VertexFormat::Float32x3,
                        },
                        wgpu::VertexAttribute {
                            offset: 12,
                            shader_location: 1,
                            format: wgpu::VertexFormat::Float32x3,
                        },
                    ],
                }],
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
                topology: wgpu::PrimitiveTopology::LineList,
                ..Default::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: depth_format,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        let up = UpAxis::Z;
        let (vertex_buffer, vertex_count) = create_vertex_buffer(device, &config, up);

        Self {
            pipeline,
            vertex_buffer,
            vertex_count,
            config,
            up,
        }
    }

    pub fn up_axis(&self) -> UpAxis {
        self.up
    }

    /// Rebuild the grid on the ground plane of `up`
    pub fn set_up_axis(&mut self, device: &wgpu::Device, up: UpAxis) {
        if self.up == up {
            return;
        }
        let (buffer, count) = create_vertex_buffer(device, &self.config, up);
        self.vertex_buffer = buffer;
        self.vertex_count = count;
        self.up = up;
    }

    pub fn render(&self, render_pass: &mut wgpu::RenderPass<'_>, camera_bind_group: &wgpu::BindGroup) {
        render_pass.set_pipeline(&self.pipeline);
        render_pass.set_bind_group(0, camera_bind_group, &[]);
        render_pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
        render_pass.draw(0..self.vertex_count, 0..1);
    }
}

fn create_vertex_buffer(device: &wgpu::Device, config: &GridConfig, up: UpAxis) -> (wgpu::Buffer, u32) {
    let vertices = generate_grid_vertices(config, up);
    let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some("Grid Vertex Buffer"),
        contents: bytemuck::cast_slice(&vertices),
        usage: wgpu::BufferUsages::VERTEX,
    });
    (buffer, vertices.len() as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_grid_lines() {
        let config = GridConfig::default();
        let vertices = generate_grid_vertices(&config, UpAxis::Y);
        // 21 lines in each direction, two vertices each
        assert_eq!(vertices.len(), 84);
        assert!(vertices.iter().all(|v| v.position[1] == 0.0));
        assert!(vertices.iter().all(|v| v.position[0].abs() <= 5.0));
    }

    #[test]
    fn test_center_lines_use_center_color() {
        let config = GridConfig::default();
        let vertices = generate_grid_vertices(&config, UpAxis::Z);
        let center = hex_rgb(0x444444).to_array();
        let center_count = vertices.iter().filter(|v| v.color == center).count();
        assert_eq!(center_count, 4);
        let through_origin = vertices
            .iter()
            .filter(|v| v.color == center)
            .all(|v| v.position[0] == 0.0 || v.position[1] == 0.0);
        assert!(through_origin);
        assert!(vertices.iter().all(|v| v.position[2] == 0.0));
    }
}
