//! URDF Viewer Renderer
//!
//! WGPU-based 3D rendering of an imported robot: an orbit camera, a
//! hemisphere/directional/ambient light rig with a shadow map, and a ground grid.

pub mod camera;
pub mod grid;
pub mod light;
pub mod mesh;
pub mod renderer;

pub use camera::*;
pub use grid::*;
pub use light::*;
pub use mesh::*;
pub use renderer::*;
