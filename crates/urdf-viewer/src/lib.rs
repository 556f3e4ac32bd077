//! URDF payload viewer
//!
//! egui application showing a robot decoded from a payload: a URDF document
//! plus base64 mesh files and display options.

mod app;
pub mod config;
mod panels;
pub mod viewer;
mod viewport_state;

#[cfg(target_arch = "wasm32")]
mod web;

pub use app::{AppError, UrdfViewerApp};
pub use viewer::{ViewerError, ViewerState};

#[cfg(target_arch = "wasm32")]
pub use web::WebHandle;

/// wgpu setup shared by the native and web entry points.
///
/// GL backend with WebGL2 limits, so it runs under llvmpipe and in browsers.
pub fn wgpu_options() -> egui_wgpu::WgpuConfiguration {
    egui_wgpu::WgpuConfiguration {
        wgpu_setup: egui_wgpu::WgpuSetup::CreateNew {
            supported_backends: wgpu::Backends::GL,
            power_preference: wgpu::PowerPreference::LowPower,
            device_descriptor: std::sync::Arc::new(|_adapter| wgpu::DeviceDescriptor {
                label: Some("urdf-viewer device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::downlevel_webgl2_defaults(),
                memory_hints: wgpu::MemoryHints::default(),
            }),
        },
        ..Default::default()
    }
}
