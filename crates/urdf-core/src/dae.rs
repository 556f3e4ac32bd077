//! COLLADA (.dae) geometry decoding
//!
//! Reads `<triangles>`, `<polylist>` and `<polygons>` from the document's
//! geometries and places each instanced geometry with the transforms of its
//! visual scene nodes, scaled by `<asset><unit meter>`. Materials and textures
//! are not read; visuals take their colour from the URDF.

use std::collections::HashMap;

use glam::{Mat3, Mat4, Vec3};
use roxmltree::{Document, Node};

use crate::mesh::MeshGeometry;

/// Guard against `<instance_node>` cycles
const MAX_NODE_DEPTH: usize = 64;

/// COLLADA decoding errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DaeError {
    #[error("DAE file is not valid UTF-8")]
    Utf8,
    #[error("XML error: {0}")]
    Xml(String),
    #[error("Root element is <{0}>, expected <COLLADA>")]
    NotCollada(String),
    #[error("Invalid number '{0}'")]
    Number(String),
    #[error("Empty mesh: no triangles found")]
    Empty,
}

/// Decode the triangle geometry of a COLLADA document held in memory
pub fn load_dae_from_bytes(bytes: &[u8]) -> Result<MeshGeometry, DaeError> {
    let text = std::str::from_utf8(bytes).map_err(|_| DaeError::Utf8)?;
    let doc = Document::parse(text.trim_start_matches('\u{feff}'))
        .map_err(|e| DaeError::Xml(e.to_string()))?;

    let root = doc.root_element();
    if !root.has_tag_name("COLLADA") {
        return Err(DaeError::NotCollada(root.tag_name().name().to_string()));
    }

    let scene = SceneIndex::new(root);
    let root_transform = Mat4::from_scale(Vec3::splat(asset_unit(root)));
    let mut builder = MeshBuilder::default();

    match visual_scene(root) {
        Some(visual_scene) => {
            for node in visual_scene.children().filter(|n| n.has_tag_name("node")) {
                scene.walk(node, root_transform, &mut builder, 0)?;
            }
        }
        None => {
            for geometry in root.descendants().filter(|n| n.has_tag_name("geometry")) {
                read_geometry(geometry, root_transform, &mut builder)?;
            }
        }
    }

    builder.finish()
}

/// `<geometry>` and `<node>` elements by id
struct SceneIndex<'a, 'input> {
    geometries: HashMap<&'a str, Node<'a, 'input>>,
    nodes: HashMap<&'a str, Node<'a, 'input>>,
}

impl<'a, 'input> SceneIndex<'a, 'input> {
    fn new(root: Node<'a, 'input>) -> Self {
        let by_id = |tag: &str| -> HashMap<&'a str, Node<'a, 'input>> {
            root.descendants()
                .filter(|n| n.has_tag_name(tag))
                .filter_map(|n| n.attribute("id").map(|id| (id, n)))
                .collect()
        };
        Self {
            geometries: by_id("geometry"),
            nodes: by_id("node"),
        }
    }

    fn walk(
        &self,
        node: Node<'a, 'input>,
        parent: Mat4,
        builder: &mut MeshBuilder,
        depth: usize,
    ) -> Result<(), DaeError> {
        if depth > MAX_NODE_DEPTH {
            tracing::warn!("COLLADA node hierarchy deeper than {}, truncated", MAX_NODE_DEPTH);
            return Ok(());
        }

        let transform = parent * node_transform(node)?;

        for child in node.children().filter(|n| n.is_element()) {
            let url = child.attribute("url").map(|u| u.trim_start_matches('#'));
            match child.tag_name().name() {
                "node" => self.walk(child, transform, builder, depth + 1)?,
                "instance_node" => match url.and_then(|id| self.nodes.get(id)) {
                    Some(target) => self.walk(*target, transform, builder, depth + 1)?,
                    None => tracing::warn!("COLLADA node '{}' not found", url.unwrap_or_default()),
                },
                "instance_geometry" => match url.and_then(|id| self.geometries.get(id)) {
                    Some(geometry) => read_geometry(*geometry, transform, builder)?,
                    None => tracing::warn!("COLLADA geometry '{}' not found", url.unwrap_or_default()),
                },
                _ => {}
            }
        }
        Ok(())
    }
}

/// The scene named by `<scene><instance_visual_scene>`, else the first one
fn visual_scene<'a, 'input>(root: Node<'a, 'input>) -> Option<Node<'a, 'input>> {
    let scenes: Vec<Node<'a, 'input>> = root
        .descendants()
        .filter(|n| n.has_tag_name("visual_scene"))
        .collect();

    let wanted = root
        .children()
        .find(|n| n.has_tag_name("scene"))
        .and_then(|s| s.children().find(|n| n.has_tag_name("instance_visual_scene")))
        .and_then(|i| i.attribute("url"))
        .map(|url| url.trim_start_matches('#'));

    wanted
        .and_then(|id| scenes.iter().find(|s| s.attribute("id") == Some(id)))
        .or_else(|| scenes.first())
        .copied()
}

/// Metres per document unit
fn asset_unit(root: Node<'_, '_>) -> f32 {
    root.children()
        .find(|n| n.has_tag_name("asset"))
        .and_then(|a| a.children().find(|n| n.has_tag_name("unit")))
        .and_then(|u| u.attribute("meter"))
        .and_then(|m| m.trim().parse::<f32>().ok())
        .filter(|m| m.is_finite() && *m > 0.0)
        .unwrap_or(1.0)
}

/// Product of a node's `<matrix>`, `<translate>`, `<rotate>` and `<scale>` children, in order
fn node_transform(node: Node<'_, '_>) -> Result<Mat4, DaeError> {
    let mut transform = Mat4::IDENTITY;
    for child in node.children().filter(|n| n.is_element()) {
        let name = child.tag_name().name();
        if !matches!(name, "matrix" | "translate" | "rotate" | "scale") {
            continue;
        }
        let values = floats(child)?;
        match (name, values.as_slice()) {
            // COLLADA matrices are row-major
            ("matrix", m) if m.len() == 16 => transform *= Mat4::from_cols_slice(m).transpose(),
            ("translate", &[x, y, z]) => transform *= Mat4::from_translation(Vec3::new(x, y, z)),
            ("rotate", &[x, y, z, degrees]) => {
                if let Some(axis) = Vec3::new(x, y, z).try_normalize() {
                    transform *= Mat4::from_axis_angle(axis, degrees.to_radians());
                }
            }
            ("scale", &[x, y, z]) => transform *= Mat4::from_scale(Vec3::new(x, y, z)),
            _ => tracing::debug!("Ignoring malformed <{}> ({} values)", name, values.len()),
        }
    }
    Ok(transform)
}

/// One `<source>` float array
struct Source {
    data: Vec<f32>,
    stride: usize,
}

impl Source {
    fn vec3(&self, index: u32) -> Option<Vec3> {
        let start = index as usize * self.stride;
        let v = self.data.get(start..start + 3)?;
        Some(Vec3::new(v[0], v[1], v[2]))
    }
}

/// Position and normal sources behind a `<vertices>` element
#[derive(Default, Clone, Copy)]
struct VertexSources<'a> {
    position: Option<&'a str>,
    normal: Option<&'a str>,
}

fn read_geometry(geometry: Node<'_, '_>, transform: Mat4, builder: &mut MeshBuilder) -> Result<(), DaeError> {
    let Some(mesh) = geometry.children().find(|n| n.has_tag_name("mesh")) else {
        tracing::debug!(
            "Skipping non-mesh geometry '{}'",
            geometry.attribute("id").unwrap_or_default()
        );
        return Ok(());
    };

    let mut sources: HashMap<&str, Source> = HashMap::new();
    for source in mesh.children().filter(|n| n.has_tag_name("source")) {
        let (Some(id), Some(array)) = (
            source.attribute("id"),
            source.children().find(|n| n.has_tag_name("float_array")),
        ) else {
            continue;
        };
        let stride = source
            .descendants()
            .find(|n| n.has_tag_name("accessor"))
            .and_then(|a| a.attribute("stride"))
            .and_then(|s| s.parse::<usize>().ok())
            .unwrap_or(3)
            .max(3);
        sources.insert(
            id,
            Source {
                data: floats(array)?,
                stride,
            },
        );
    }

    let mut vertices: HashMap<&str, VertexSources> = HashMap::new();
    for element in mesh.children().filter(|n| n.has_tag_name("vertices")) {
        let Some(id) = element.attribute("id") else {
            continue;
        };
        let mut entry = VertexSources::default();
        for input in element.children().filter(|n| n.has_tag_name("input")) {
            let source = input.attribute("source").map(|s| s.trim_start_matches('#'));
            match input.attribute("semantic") {
                Some("POSITION") => entry.position = source,
                Some("NORMAL") => entry.normal = source,
                _ => {}
            }
        }
        vertices.insert(id, entry);
    }

    let normal_matrix = Mat3::from_mat4(transform).inverse().transpose();
    let mut corners: HashMap<(u32, Option<u32>), u32> = HashMap::new();

    for primitive in mesh.children().filter(|n| n.is_element()) {
        let kind = primitive.tag_name().name();
        if !matches!(kind, "triangles" | "polylist" | "polygons") {
            if matches!(kind, "lines" | "linestrips" | "trifans" | "tristrips") {
                tracing::debug!("Skipping COLLADA <{}> primitive", kind);
            }
            continue;
        }

        let mut stride = 1usize;
        let mut position: Option<(usize, &Source)> = None;
        let mut normal: Option<(usize, &Source)> = None;
        for input in primitive.children().filter(|n| n.has_tag_name("input")) {
            let offset = input
                .attribute("offset")
                .and_then(|o| o.parse::<usize>().ok())
                .unwrap_or(0);
            stride = stride.max(offset + 1);
            let source = input.attribute("source").map(|s| s.trim_start_matches('#'));
            match input.attribute("semantic") {
                Some("VERTEX") => {
                    let Some(v) = source.and_then(|s| vertices.get(s)).copied() else {
                        continue;
                    };
                    position = v.position.and_then(|p| sources.get(p)).map(|s| (offset, s));
                    if normal.is_none() {
                        normal = v.normal.and_then(|n| sources.get(n)).map(|s| (offset, s));
                    }
                }
                Some("NORMAL") => {
                    normal = source.and_then(|s| sources.get(s)).map(|s| (offset, s));
                }
                _ => {}
            }
        }

        let Some((position_offset, positions)) = position else {
            tracing::warn!("COLLADA <{}> without a VERTEX input, skipped", kind);
            continue;
        };
        if normal.is_none() {
            builder.missing_normals = true;
        }

        for polygon in polygons(primitive, kind, stride)? {
            let corner_count = polygon.len() / stride;
            let mut triangles: Vec<[u32; 3]> = Vec::new();
            let mut corner = |i: usize| -> Option<u32> {
                let at = |offset: usize| polygon.get(i * stride + offset).copied();
                let p = at(position_offset)?;
                let n = match normal {
                    Some((offset, _)) => Some(at(offset)?),
                    None => None,
                };
                if let Some(&existing) = corners.get(&(p, n)) {
                    return Some(existing);
                }
                let point = transform.transform_point3(positions.vec3(p)?);
                let direction = match (normal, n) {
                    (Some((_, source)), Some(n)) => (normal_matrix * source.vec3(n)?)
                        .try_normalize()
                        .unwrap_or(Vec3::Z),
                    _ => Vec3::Z,
                };
                let index = builder.push_vertex(point, direction);
                corners.insert((p, n), index);
                Some(index)
            };

            // Fan triangulation; triangles with a bad index are dropped
            for i in 1..corner_count.saturating_sub(1) {
                if let (Some(a), Some(b), Some(c)) = (corner(0), corner(i), corner(i + 1)) {
                    triangles.push([a, b, c]);
                }
            }
            builder.indices.extend(triangles.iter().flatten());
        }
    }

    Ok(())
}

/// Index lists of each polygon of a primitive, `stride` indices per corner
fn polygons(primitive: Node<'_, '_>, kind: &str, stride: usize) -> Result<Vec<Vec<u32>>, DaeError> {
    let p_elements: Vec<Node> = primitive.children().filter(|n| n.has_tag_name("p")).collect();

    match kind {
        "polygons" => p_elements.iter().map(|p| indices(*p)).collect(),
        "polylist" => {
            let Some(p) = p_elements.first() else {
                return Ok(Vec::new());
            };
            let data = indices(*p)?;
            let counts = match primitive.children().find(|n| n.has_tag_name("vcount")) {
                Some(vcount) => indices(vcount)?,
                None => Vec::new(),
            };
            let mut out = Vec::with_capacity(counts.len());
            let mut start = 0usize;
            for count in counts {
                let end = start + count as usize * stride;
                let Some(slice) = data.get(start..end) else {
                    break;
                };
                out.push(slice.to_vec());
                start = end;
            }
            Ok(out)
        }
        _ => {
            let mut out = Vec::new();
            for p in &p_elements {
                out.extend(indices(*p)?.chunks_exact(3 * stride).map(<[u32]>::to_vec));
            }
            Ok(out)
        }
    }
}

fn floats(node: Node<'_, '_>) -> Result<Vec<f32>, DaeError> {
    node.text()
        .unwrap_or_default()
        .split_whitespace()
        .map(|t| t.parse::<f32>().map_err(|_| DaeError::Number(t.to_string())))
        .collect()
}

fn indices(node: Node<'_, '_>) -> Result<Vec<u32>, DaeError> {
    node.text()
        .unwrap_or_default()
        .split_whitespace()
        .map(|t| t.parse::<u32>().map_err(|_| DaeError::Number(t.to_string())))
        .collect()
}

#[derive(Default)]
struct MeshBuilder {
    positions: Vec<[f32; 3]>,
    normals: Vec<[f32; 3]>,
    indices: Vec<u32>,
    missing_normals: bool,
}

impl MeshBuilder {
    fn push_vertex(&mut self, position: Vec3, normal: Vec3) -> u32 {
        self.positions.push(position.to_array());
        self.normals.push(normal.to_array());
        self.positions.len() as u32 - 1
    }

    fn finish(self) -> Result<MeshGeometry, DaeError> {
        if self.indices.is_empty() {
            return Err(DaeError::Empty);
        }
        if self.missing_normals {
            Ok(MeshGeometry::new(self.positions, self.indices))
        } else {
            Ok(MeshGeometry::with_normals(self.positions, self.normals, self.indices))
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// Unit square in the XY plane as one quad, instanced under a translated node
    pub(crate) fn square_dae() -> &'static str {
        r##"<?xml version="1.0" encoding="utf-8"?>
<COLLADA xmlns="http://www.collada.org/2005/11/COLLADASchema" version="1.4.1">
  <asset><unit name="centimeter" meter="0.01"/><up_axis>Z_UP</up_axis></asset>
  <library_geometries>
    <geometry id="square-mesh" name="square">
      <mesh>
        <source id="square-positions">
          <float_array id="square-positions-array" count="12">0 0 0 100 0 0 100 100 0 0 100 0</float_array>
          <technique_common><accessor source="#square-positions-array" count="4" stride="3"/></technique_common>
        </source>
        <source id="square-normals">
          <float_array id="square-normals-array" count="3">0 0 1</float_array>
          <technique_common><accessor source="#square-normals-array" count="1" stride="3"/></technique_common>
        </source>
        <vertices id="square-vertices">
          <input semantic="POSITION" source="#square-positions"/>
        </vertices>
        <polylist count="1">
          <input semantic="VERTEX" source="#square-vertices" offset="0"/>
          <input semantic="NORMAL" source="#square-normals" offset="1"/>
          <vcount>4</vcount>
          <p>0 0 1 0 2 0 3 0</p>
        </polylist>
      </mesh>
    </geometry>
  </library_geometries>
  <library_visual_scenes>
    <visual_scene id="Scene">
      <node id="square-node">
        <translate>0 0 50</translate>
        <instance_geometry url="#square-mesh"/>
      </node>
    </visual_scene>
  </library_visual_scenes>
  <scene><instance_visual_scene url="#Scene"/></scene>
</COLLADA>"##
    }

    #[test]
    fn test_polylist_quad_with_node_transform_and_unit() {
        let mesh = load_dae_from_bytes(square_dae().as_bytes()).unwrap();
        assert_eq!(mesh.triangle_count(), 2);
        assert_eq!(mesh.vertices.len(), 4);
        assert_relative_eq!(mesh.bounds.min.z, 0.5);
        assert_relative_eq!(mesh.bounds.max.x, 1.0);
        assert_relative_eq!(mesh.bounds.max.y, 1.0);
        assert!(mesh.normals.iter().all(|n| n == &[0.0, 0.0, 1.0]));
    }

    #[test]
    fn test_triangles_without_scene_use_every_geometry() {
        let dae = r##"<COLLADA xmlns="http://www.collada.org/2005/11/COLLADASchema">
  <library_geometries>
    <geometry id="tri">
      <mesh>
        <source id="p"><float_array count="9">0 0 0 2 0 0 0 2 0</float_array></source>
        <vertices id="v"><input semantic="POSITION" source="#p"/></vertices>
        <triangles count="1"><input semantic="VERTEX" source="#v" offset="0"/><p>0 1 2</p></triangles>
      </mesh>
    </geometry>
  </library_geometries>
</COLLADA>"##;
        let mesh = load_dae_from_bytes(dae.as_bytes()).unwrap();
        assert_eq!(mesh.triangle_count(), 1);
        assert_eq!(mesh.bounds.size(), Vec3::new(2.0, 2.0, 0.0));
        // computed from the winding
        assert_relative_eq!(mesh.normals[0][2], 1.0);
    }

    #[test]
    fn test_matrix_is_row_major() {
        let node = r##"<COLLADA>
  <library_geometries>
    <geometry id="g"><mesh>
      <source id="p"><float_array>0 0 0 1 0 0 0 1 0</float_array></source>
      <vertices id="v"><input semantic="POSITION" source="#p"/></vertices>
      <triangles><input semantic="VERTEX" source="#v" offset="0"/><p>0 1 2</p></triangles>
    </mesh></geometry>
  </library_geometries>
  <library_visual_scenes><visual_scene id="s">
    <node><matrix>1 0 0 5 0 1 0 0 0 0 1 0 0 0 0 1</matrix><instance_geometry url="#g"/></node>
  </visual_scene></library_visual_scenes>
</COLLADA>"##;
        let mesh = load_dae_from_bytes(node.as_bytes()).unwrap();
        assert_relative_eq!(mesh.bounds.min.x, 5.0);
    }

    #[test]
    fn test_errors() {
        assert_eq!(load_dae_from_bytes(&[0xff, 0xfe]), Err(DaeError::Utf8));
        assert!(matches!(load_dae_from_bytes(b"<COLLADA"), Err(DaeError::Xml(_))));
        assert_eq!(
            load_dae_from_bytes(b"<robot/>"),
            Err(DaeError::NotCollada("robot".into()))
        );
        assert_eq!(load_dae_from_bytes(b"<COLLADA/>"), Err(DaeError::Empty));
        assert_eq!(
            load_dae_from_bytes(
                br##"<COLLADA><library_geometries><geometry id="g"><mesh>
<source id="p"><float_array>0 zero 0</float_array></source></mesh></geometry></library_geometries></COLLADA>"##
            ),
            Err(DaeError::Number("zero".into()))
        );
    }
}
