//! Mesh geometry, format sniffing and STL decoding

use std::collections::HashMap;
use std::io::Cursor;

use glam::Vec3;

use crate::bounds::BoundingBox;
use crate::encoding::extension_of;

/// Indexed triangle mesh with smooth per-vertex normals
#[derive(Debug, Clone, PartialEq)]
pub struct MeshGeometry {
    pub vertices: Vec<[f32; 3]>,
    /// One normal per vertex
    pub normals: Vec<[f32; 3]>,
    /// Three indices per triangle
    pub indices: Vec<u32>,
    pub bounds: BoundingBox,
}

impl MeshGeometry {
    /// Build from indexed data, computing vertex normals and bounds
    pub fn new(vertices: Vec<[f32; 3]>, indices: Vec<u32>) -> Self {
        let normals = compute_vertex_normals(&vertices, &indices);
        Self::with_normals(vertices, normals, indices)
    }

    pub fn with_normals(vertices: Vec<[f32; 3]>, normals: Vec<[f32; 3]>, indices: Vec<u32>) -> Self {
        let bounds = BoundingBox::from_points(vertices.iter());
        Self {
            vertices,
            normals,
            indices,
            bounds,
        }
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

/// Mesh format, sniffed from a path, URL or MIME type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeshFormat {
    Stl,
    Dae,
    Unknown,
}

impl MeshFormat {
    /// Detect format from the extension; `?query` and `#fragment` are ignored
    pub fn from_path(path: &str) -> Self {
        match extension_of(path).as_deref() {
            Some("stl") => MeshFormat::Stl,
            Some("dae") => MeshFormat::Dae,
            _ => MeshFormat::Unknown,
        }
    }

    pub fn from_mime(mime: &str) -> Self {
        match mime {
            "model/stl" | "model/x.stl-binary" | "model/x.stl-ascii" | "application/sla" => {
                MeshFormat::Stl
            }
            "model/vnd.collada+xml" => MeshFormat::Dae,
            _ => MeshFormat::Unknown,
        }
    }

    /// Check if the format can be decoded
    pub fn is_supported(&self) -> bool {
        matches!(self, MeshFormat::Stl | MeshFormat::Dae)
    }

    /// Get format name
    pub fn name(&self) -> &'static str {
        match self {
            MeshFormat::Stl => "STL",
            MeshFormat::Dae => "DAE (COLLADA)",
            MeshFormat::Unknown => "Unknown",
        }
    }
}

/// Decode an ASCII or binary STL file held in memory
pub fn load_stl_from_bytes(bytes: &[u8]) -> Result<MeshGeometry, StlError> {
    if bytes.is_empty() {
        return Err(StlError::Empty);
    }

    let mut reader = Cursor::new(bytes);
    let mesh = stl_io::read_stl(&mut reader).map_err(|e| StlError::Parse(e.to_string()))?;
    if mesh.faces.is_empty() {
        return Err(StlError::Empty);
    }

    let (vertices, indices) = index_mesh(&mesh);
    Ok(MeshGeometry::new(vertices, indices))
}

/// Weld vertices that coincide after quantization and emit triangle indices
fn index_mesh(mesh: &stl_io::IndexedMesh) -> (Vec<[f32; 3]>, Vec<u32>) {
    let mut unique_vertices: Vec<[f32; 3]> = Vec::new();
    let mut vertex_map: HashMap<[i32; 3], u32> = HashMap::new();
    let mut indices: Vec<u32> = Vec::with_capacity(mesh.faces.len() * 3);

    // Precision for vertex comparison (multiply by this, then round to int)
    const PRECISION: f32 = 10000.0;

    for face in &mesh.faces {
        for &vertex_idx in &face.vertices {
            let vertex = mesh.vertices[vertex_idx];
            let v = [vertex[0], vertex[1], vertex[2]];

            let key = [
                (v[0] * PRECISION).round() as i32,
                (v[1] * PRECISION).round() as i32,
                (v[2] * PRECISION).round() as i32,
            ];

            let index = *vertex_map.entry(key).or_insert_with(|| {
                unique_vertices.push(v);
                unique_vertices.len() as u32 - 1
            });
            indices.push(index);
        }
    }

    (unique_vertices, indices)
}

/// Area-weighted smooth normals
pub fn compute_vertex_normals(vertices: &[[f32; 3]], indices: &[u32]) -> Vec<[f32; 3]> {
    let mut accum = vec![Vec3::ZERO; vertices.len()];

    for tri in indices.chunks_exact(3) {
        let [a, b, c] = [tri[0] as usize, tri[1] as usize, tri[2] as usize];
        if a >= vertices.len() || b >= vertices.len() || c >= vertices.len() {
            continue;
        }
        let (v0, v1, v2) = (
            Vec3::from(vertices[a]),
            Vec3::from(vertices[b]),
            Vec3::from(vertices[c]),
        );
        // Unnormalized cross product weights by triangle area
        let n = (v1 - v0).cross(v2 - v0);
        accum[a] += n;
        accum[b] += n;
        accum[c] += n;
    }

    accum
        .into_iter()
        .map(|n| n.try_normalize().unwrap_or(Vec3::Z).to_array())
        .collect()
}

/// STL-related errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StlError {
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Empty mesh: no triangles found")]
    Empty,
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// Binary STL of a unit square in the XY plane (two triangles)
    pub(crate) fn square_stl() -> Vec<u8> {
        let triangles = vec![
            stl_io::Triangle {
                normal: stl_io::Normal::new([0.0, 0.0, 1.0]),
                vertices: [
                    stl_io::Vertex::new([0.0, 0.0, 0.0]),
                    stl_io::Vertex::new([1.0, 0.0, 0.0]),
                    stl_io::Vertex::new([1.0, 1.0, 0.0]),
                ],
            },
            stl_io::Triangle {
                normal: stl_io::Normal::new([0.0, 0.0, 1.0]),
                vertices: [
                    stl_io::Vertex::new([0.0, 0.0, 0.0]),
                    stl_io::Vertex::new([1.0, 1.0, 0.0]),
                    stl_io::Vertex::new([0.0, 1.0, 0.0]),
                ],
            },
        ];
        let mut out = Vec::new();
        stl_io::write_stl(&mut out, triangles.iter()).unwrap();
        out
    }

    #[test]
    fn test_load_binary_stl() {
        let mesh = load_stl_from_bytes(&square_stl()).unwrap();
        assert_eq!(mesh.vertices.len(), 4);
        assert_eq!(mesh.triangle_count(), 2);
        assert_eq!(mesh.normals.len(), 4);
        assert_relative_eq!(mesh.normals[0][2], 1.0);
        assert_eq!(mesh.bounds.max, Vec3::new(1.0, 1.0, 0.0));
    }

    #[test]
    fn test_load_ascii_stl() {
        let ascii = b"solid tri
facet normal 0 0 1
  outer loop
    vertex 0 0 0
    vertex 2 0 0
    vertex 0 2 0
  endloop
endfacet
endsolid tri
";
        let mesh = load_stl_from_bytes(ascii).unwrap();
        assert_eq!(mesh.triangle_count(), 1);
        assert_eq!(mesh.bounds.size(), Vec3::new(2.0, 2.0, 0.0));
    }

    #[test]
    fn test_load_rejects_garbage() {
        assert_eq!(load_stl_from_bytes(&[]), Err(StlError::Empty));
        assert!(load_stl_from_bytes(b"definitely not an stl").is_err());
    }

    #[test]
    fn test_format_sniffing() {
        assert_eq!(MeshFormat::from_path("mem://meshes/0/a.STL"), MeshFormat::Stl);
        assert_eq!(MeshFormat::from_path("a.stl?raw=1"), MeshFormat::Stl);
        assert_eq!(MeshFormat::from_path("a.dae"), MeshFormat::Dae);
        assert_eq!(MeshFormat::from_path("a.obj"), MeshFormat::Unknown);
        assert_eq!(MeshFormat::from_mime("model/stl"), MeshFormat::Stl);
        assert_eq!(MeshFormat::from_mime("model/vnd.collada+xml"), MeshFormat::Dae);
        assert!(MeshFormat::Dae.is_supported());
        assert!(!MeshFormat::Unknown.is_supported());
    }

    #[test]
    fn test_degenerate_triangle_normal_falls_back() {
        let normals = compute_vertex_normals(&[[0.0; 3], [0.0; 3], [0.0; 3]], &[0, 1, 2]);
        assert_eq!(normals[0], [0.0, 0.0, 1.0]);
    }
}
