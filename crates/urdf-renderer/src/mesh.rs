//! GPU mesh resources

use std::collections::HashMap;
use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use wgpu::util::DeviceExt;

use urdf_core::{BoundingBox, MeshGeometry};

/// Vertex layout shared by the mesh and shadow pipelines
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct MeshVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
}

impl MeshVertex {
    pub const ATTRIBUTES: [wgpu::VertexAttribute; 2] =
        wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3];

    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<MeshVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBUTES,
        }
    }
}

/// Interleave positions and normals
pub fn mesh_vertices(mesh: &MeshGeometry) -> Vec<MeshVertex> {
    mesh.vertices
        .iter()
        .enumerate()
        .map(|(i, p)| MeshVertex {
            position: *p,
            normal: mesh.normals.get(i).copied().unwrap_or([0.0, 0.0, 1.0]),
        })
        .collect()
}

/// Handle to a mesh stored in the [`MeshManager`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MeshHandle(u64);

/// Uploaded mesh
pub struct GpuMesh {
    pub vertex_buffer: wgpu::Buffer,
    pub index_buffer: wgpu::Buffer,
    pub index_count: u32,
    pub bounds: BoundingBox,
    /// Keeps the source alive so its address stays a valid dedup key
    _source: Arc<MeshGeometry>,
}

/// Uploads each distinct [`MeshGeometry`] once.
///
/// Visuals that share an `Arc<MeshGeometry>` (the same file referenced by
/// several links) share one set of GPU buffers.
#[derive(Default)]
pub struct MeshManager {
    meshes: HashMap<MeshHandle, GpuMesh>,
    by_source: HashMap<usize, MeshHandle>,
    next_handle: u64,
}

impl MeshManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Upload `mesh` unless it is already resident. Empty meshes are skipped.
    pub fn upload(&mut self, device: &wgpu::Device, mesh: &Arc<MeshGeometry>) -> Option<MeshHandle> {
        if mesh.is_empty() {
            return None;
        }
        let key = Arc::as_ptr(mesh) as usize;
        if let Some(&handle) = self.by_source.get(&key) {
            return Some(handle);
        }

        let vertices = mesh_vertices(mesh);
        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Mesh Vertex Buffer"),
            contents: bytemuck::cast_slice(&vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Mesh Index Buffer"),
            contents: bytemuck::cast_slice(&mesh.indices),
            usage: wgpu::BufferUsages::INDEX,
        });

        self.next_handle += 1;
        let handle = MeshHandle(self.next_handle);
        self.meshes.insert(
            handle,
            GpuMesh {
                vertex_buffer,
                index_buffer,
                index_count: mesh.indices.len() as u32,
                bounds: mesh.bounds,
                _source: mesh.clone(),
            },
        );
        self.by_source.insert(key, handle);
        Some(handle)
    }

    pub fn get(&self, handle: MeshHandle) -> Option<&GpuMesh> {
        self.meshes.get(&handle)
    }

    pub fn len(&self) -> usize {
        self.meshes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.meshes.is_empty()
    }

    /// Drop every buffer
    pub fn clear(&mut self) {
        self.meshes.clear();
        self.by_source.clear();
    }
}
