//! Procedural meshes for URDF primitive geometry
//!
//! Dimensions follow URDF: boxes are centered, cylinders and capsules run along Z.

use std::f32::consts::{PI, TAU};

use crate::mesh::MeshGeometry;

const SEGMENTS: u32 = 32;
const RINGS: u32 = 16;

/// Box with flat-shaded faces
pub fn generate_box_mesh(size: [f32; 3]) -> MeshGeometry {
    let [hx, hy, hz] = [size[0] / 2.0, size[1] / 2.0, size[2] / 2.0];

    // (normal, four corners counter-clockwise seen from outside)
    let faces: [([f32; 3], [[f32; 3]; 4]); 6] = [
        ([1.0, 0.0, 0.0], [[hx, -hy, -hz], [hx, hy, -hz], [hx, hy, hz], [hx, -hy, hz]]),
        ([-1.0, 0.0, 0.0], [[-hx, hy, -hz], [-hx, -hy, -hz], [-hx, -hy, hz], [-hx, hy, hz]]),
        ([0.0, 1.0, 0.0], [[hx, hy, -hz], [-hx, hy, -hz], [-hx, hy, hz], [hx, hy, hz]]),
        ([0.0, -1.0, 0.0], [[-hx, -hy, -hz], [hx, -hy, -hz], [hx, -hy, hz], [-hx, -hy, hz]]),
        ([0.0, 0.0, 1.0], [[-hx, -hy, hz], [hx, -hy, hz], [hx, hy, hz], [-hx, hy, hz]]),
        ([0.0, 0.0, -1.0], [[-hx, hy, -hz], [hx, hy, -hz], [hx, -hy, -hz], [-hx, -hy, -hz]]),
    ];

    let mut vertices = Vec::with_capacity(24);
    let mut normals = Vec::with_capacity(24);
    let mut indices = Vec::with_capacity(36);

    for (normal, corners) in faces {
        let base = vertices.len() as u32;
        vertices.extend_from_slice(&corners);
        normals.extend_from_slice(&[normal; 4]);
        indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }

    MeshGeometry::with_normals(vertices, normals, indices)
}

/// Cylinder along Z with flat caps
pub fn generate_cylinder_mesh(radius: f32, length: f32) -> MeshGeometry {
    let hz = length / 2.0;
    let mut vertices = Vec::new();
    let mut normals = Vec::new();
    let mut indices = Vec::new();

    // Side
    for i in 0..=SEGMENTS {
        let angle = i as f32 / SEGMENTS as f32 * TAU;
        let (s, c) = angle.sin_cos();
        vertices.push([radius * c, radius * s, -hz]);
        vertices.push([radius * c, radius * s, hz]);
        normals.push([c, s, 0.0]);
        normals.push([c, s, 0.0]);
    }
    for i in 0..SEGMENTS {
        let b = i * 2;
        indices.extend_from_slice(&[b, b + 2, b + 1, b + 1, b + 2, b + 3]);
    }

    // Caps
    for (z, nz) in [(hz, 1.0f32), (-hz, -1.0f32)] {
        let center = vertices.len() as u32;
        vertices.push([0.0, 0.0, z]);
        normals.push([0.0, 0.0, nz]);
        for i in 0..=SEGMENTS {
            let angle = i as f32 / SEGMENTS as f32 * TAU;
            let (s, c) = angle.sin_cos();
            vertices.push([radius * c, radius * s, z]);
            normals.push([0.0, 0.0, nz]);
        }
        for i in 0..SEGMENTS {
            let a = center + 1 + i;
            if nz > 0.0 {
                indices.extend_from_slice(&[center, a, a + 1]);
            } else {
                indices.extend_from_slice(&[center, a + 1, a]);
            }
        }
    }

    MeshGeometry::with_normals(vertices, normals, indices)
}

/// UV sphere
pub fn generate_sphere_mesh(radius: f32) -> MeshGeometry {
    generate_capsule_mesh(radius, 0.0)
}

/// Capsule along Z: a cylinder of `length` capped by two hemispheres
pub fn generate_capsule_mesh(radius: f32, length: f32) -> MeshGeometry {
    let half = length / 2.0;
    let mut vertices = Vec::new();
    let mut normals = Vec::new();
    let mut indices = Vec::new();

    // Rings from the north pole down; the upper half is lifted by `half`,
    // the lower half dropped, so the equator row appears twice for capsules.
    let mut rows: Vec<(f32, f32)> = Vec::new(); // (polar angle, z offset)
    for r in 0..=RINGS / 2 {
        rows.push((r as f32 / RINGS as f32 * PI, half));
    }
    for r in RINGS / 2..=RINGS {
        rows.push((r as f32 / RINGS as f32 * PI, -half));
    }

    for &(theta, offset) in &rows {
        let (st, ct) = theta.sin_cos();
        for i in 0..=SEGMENTS {
            let phi = i as f32 / SEGMENTS as f32 * TAU;
            let (sp, cp) = phi.sin_cos();
            let n = [st * cp, st * sp, ct];
            vertices.push([radius * n[0], radius * n[1], radius * n[2] + offset]);
            normals.push(n);
        }
    }

    let stride = SEGMENTS + 1;
    for row in 0..rows.len() as u32 - 1 {
        for i in 0..SEGMENTS {
            let a = row * stride + i;
            let b = a + stride;
            indices.extend_from_slice(&[a, b, a + 1, a + 1, b, b + 1]);
        }
    }

    MeshGeometry::with_normals(vertices, normals, indices)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use glam::Vec3;

    #[test]
    fn test_box_bounds() {
        let mesh = generate_box_mesh([1.0, 2.0, 4.0]);
        assert_eq!(mesh.triangle_count(), 12);
        assert_eq!(mesh.bounds.min, Vec3::new(-0.5, -1.0, -2.0));
        assert_eq!(mesh.bounds.max, Vec3::new(0.5, 1.0, 2.0));
    }

    #[test]
    fn test_cylinder_runs_along_z() {
        let mesh = generate_cylinder_mesh(0.5, 3.0);
        assert_relative_eq!(mesh.bounds.min.z, -1.5);
        assert_relative_eq!(mesh.bounds.max.z, 1.5);
        assert_relative_eq!(mesh.bounds.max.x, 0.5, epsilon = 1e-6);
        assert_eq!(mesh.vertices.len(), mesh.normals.len());
    }

    #[test]
    fn test_sphere_bounds() {
        let mesh = generate_sphere_mesh(2.0);
        assert_relative_eq!(mesh.bounds.max.z, 2.0, epsilon = 1e-5);
        assert_relative_eq!(mesh.bounds.min.z, -2.0, epsilon = 1e-5);
        assert!(mesh.indices.iter().all(|&i| (i as usize) < mesh.vertices.len()));
    }

    #[test]
    fn test_capsule_adds_length() {
        let mesh = generate_capsule_mesh(0.5, 2.0);
        assert_relative_eq!(mesh.bounds.max.z, 1.5, epsilon = 1e-5);
        assert_relative_eq!(mesh.bounds.min.z, -1.5, epsilon = 1e-5);
    }
}
