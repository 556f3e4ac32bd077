//! Scene lighting: hemisphere, shadow-casting directional light and ambient

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};

use urdf_core::{BoundingBox, UpAxis};

use crate::camera::up_vector;

/// Light uniform buffer data sent to GPU (176 bytes)
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct LightUniform {
    /// Light view-projection matrix for shadow mapping
    pub light_view_proj: [[f32; 4]; 4],
    /// Direction toward the directional light, w unused
    pub direction: [f32; 4],
    /// Directional colour (RGB) and intensity (A)
    pub color_intensity: [f32; 4],
    /// Hemisphere sky colour (RGB) and intensity (A)
    pub sky: [f32; 4],
    /// Hemisphere ground colour, A unused
    pub ground: [f32; 4],
    /// Hemisphere up direction, w unused
    pub hemisphere_up: [f32; 4],
    /// Ambient colour (RGB) and intensity (A)
    pub ambient: [f32; 4],
    /// x = depth bias, y = normal offset, z = shadow texel size, w = enabled
    pub shadow_params: [f32; 4],
}

/// Convert `0xRRGGBB` to linear-ish RGB in `0.0..=1.0`
pub fn hex_rgb(hex: u32) -> Vec3 {
    Vec3::new(
        ((hex >> 16) & 0xff) as f32 / 255.0,
        ((hex >> 8) & 0xff) as f32 / 255.0,
        (hex & 0xff) as f32 / 255.0,
    )
}

#[derive(Debug, Clone, PartialEq)]
pub struct HemisphereLight {
    pub sky_color: Vec3,
    pub ground_color: Vec3,
    pub intensity: f32,
}

/// Light infinitely far away in the direction of `position`
#[derive(Debug, Clone, PartialEq)]
pub struct DirectionalLight {
    pub color: Vec3,
    pub intensity: f32,
    pub position: Vec3,
    pub cast_shadow: bool,
    /// Shadow map edge length in texels
    pub shadow_map_size: u32,
    /// Shadow depth bias to prevent shadow acne
    pub shadow_bias: f32,
}

impl DirectionalLight {
    pub fn direction(&self) -> Vec3 {
        self.position.try_normalize().unwrap_or(Vec3::Y)
    }

    /// Orthographic light view-projection covering `bounds`
    pub fn shadow_view_proj(&self, bounds: &BoundingBox) -> Mat4 {
        let (center, radius) = if bounds.is_empty() {
            (Vec3::ZERO, 5.0)
        } else {
            (bounds.center(), (bounds.size().length() * 0.5).max(0.01))
        };

        let dir = self.direction();
        let eye = center + dir * radius * 2.0;
        let up = if dir.dot(Vec3::Z).abs() > 0.99 { Vec3::Y } else { Vec3::Z };
        let view = Mat4::look_at_rh(eye, center, up);
        let proj = Mat4::orthographic_rh(-radius, radius, -radius, radius, radius * 0.01, radius * 4.0);
        proj * view
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AmbientLight {
    pub color: Vec3,
    pub intensity: f32,
}

/// The fixed three-light rig of the viewer
#[derive(Debug, Clone, PartialEq)]
pub struct LightRig {
    pub hemisphere: HemisphereLight,
    pub directional: DirectionalLight,
    pub ambient: AmbientLight,
    pub up: UpAxis,
}

impl Default for LightRig {
    fn default() -> Self {
        Self {
            hemisphere: HemisphereLight {
                sky_color: hex_rgb(0xffffff),
                ground_color: hex_rgb(0x444444),
                intensity: 0.6,
            },
            directional: DirectionalLight {
                color: hex_rgb(0xffffff),
                intensity: 1.0,
                position: Vec3::new(5.0, 10.0, 7.0),
                cast_shadow: true,
                shadow_map_size: 1024,
                shadow_bias: 0.002,
            },
            ambient: AmbientLight {
                color: hex_rgb(0xffffff),
                intensity: 0.2,
            },
            up: UpAxis::Y,
        }
    }
}

impl LightRig {
    /// Uniform data, with the shadow frustum fitted to `bounds`
    pub fn uniform(&self, bounds: &BoundingBox) -> LightUniform {
        let d = &self.directional;
        let dir = d.direction();
        let texel = 1.0 / d.shadow_map_size.max(1) as f32;
        let normal_offset = if bounds.is_empty() {
            0.0
        } else {
            bounds.max_dimension() * 0.002
        };

        LightUniform {
            light_view_proj: d.shadow_view_proj(bounds).to_cols_array_2d(),
            direction: dir.extend(0.0).to_array(),
            color_intensity: d.color.extend(d.intensity).to_array(),
            sky: self
                .hemisphere
                .sky_color
                .extend(self.hemisphere.intensity)
                .to_array(),
            ground: self.hemisphere.ground_color.extend(0.0).to_array(),
            hemisphere_up: up_vector(self.up).extend(0.0).to_array(),
            ambient: self.ambient.color.extend(self.ambient.intensity).to_array(),
            shadow_params: [
                d.shadow_bias,
                normal_offset,
                texel,
                if d.cast_shadow { 1.0 } else { 0.0 },
            ],
        }
    }
}
