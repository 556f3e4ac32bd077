//! URDF Viewer Core
//!
//! This crate contains everything the viewer needs before a GPU is involved:
//! - Payload: URDF text plus base64 mesh blobs and viewer options
//! - MeshDb / ResourceTable: decoded meshes and the in-memory handles that
//!   replace mesh filenames inside the URDF
//! - Rewrite: `<mesh filename="...">` substitution
//! - MeshLoader: per-visual mesh resolution callback used during import,
//!   decoding STL and COLLADA geometry
//! - RobotModel: the imported link/joint tree with world transforms
//! - Picking: ray hits on links and joint drag deltas
//! - Package: building a payload from a robot package directory

pub mod bounds;
pub mod dae;
pub mod encoding;
pub mod import;
pub mod loader;
pub mod mesh;
pub mod mesh_db;
pub mod package;
pub mod payload;
pub mod picking;
pub mod pipeline;
pub mod primitive;
pub mod resource;
pub mod rewrite;
pub mod robot;
pub mod types;

pub use bounds::*;
pub use dae::*;
pub use encoding::*;
pub use import::*;
pub use loader::*;
pub use mesh::*;
pub use mesh_db::*;
pub use package::*;
pub use payload::*;
pub use picking::*;
pub use pipeline::*;
pub use resource::*;
pub use rewrite::*;
pub use robot::*;
pub use types::*;
