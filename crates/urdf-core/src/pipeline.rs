//! Payload to robot: decode, register meshes, rewrite references, import

use std::sync::Arc;

use crate::import::{ImportError, ImportOptions, import_robot};
use crate::loader::PayloadMeshLoader;
use crate::mesh_db::{MeshDb, MeshDbError, basename};
use crate::payload::{Payload, PayloadError, ViewerOptions};
use crate::resource::{ReferenceStyle, ResourceTable};
use crate::rewrite::{collect_mesh_references, rewrite_mesh_filenames};
use crate::robot::RobotModel;

/// Result of loading a payload
#[derive(Debug, Clone)]
pub struct LoadedPayload {
    pub robot: RobotModel,
    /// URDF text as handed to the parser, with mesh references replaced by handles
    pub rewritten_urdf: String,
    pub options: ViewerOptions,
    /// Mesh references in the URDF that no payload entry satisfies
    pub unresolved: Vec<String>,
}

/// Errors loading a payload
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Payload(#[from] PayloadError),
    #[error(transparent)]
    MeshDb(#[from] MeshDbError),
    #[error(transparent)]
    Import(#[from] ImportError),
}

/// Decode a payload and import its robot.
///
/// Steps: URDF text, mesh database, resource table, reference rewrite, import
/// through a [`PayloadMeshLoader`].
pub fn load_payload(payload: &Payload, style: ReferenceStyle) -> Result<LoadedPayload, PipelineError> {
    let urdf = payload.urdf_text()?;
    let db = Arc::new(MeshDb::from_base64_map(&payload.meshes)?);
    let table = Arc::new(ResourceTable::build(&db, style));

    let unresolved = find_unresolved(&urdf, &db, &table);
    for reference in &unresolved {
        tracing::warn!("Mesh reference '{}' is not in the payload", reference);
    }

    let rewritten = rewrite_mesh_filenames(&urdf, table.mapping()).into_owned();
    let loader = PayloadMeshLoader::new(db.clone(), table.clone());
    let import_options = ImportOptions {
        shadows: payload.options.cast_shadows,
        ..ImportOptions::default()
    };
    let robot = import_robot(&rewritten, &loader, &import_options)?;

    tracing::info!(
        "Loaded payload: {} meshes ({}), {} unresolved",
        db.len(),
        style.display_name(),
        unresolved.len()
    );

    Ok(LoadedPayload {
        robot,
        rewritten_urdf: rewritten,
        options: payload.options.clone(),
        unresolved,
    })
}

fn find_unresolved(urdf: &str, db: &MeshDb, table: &ResourceTable) -> Vec<String> {
    collect_mesh_references(urdf)
        .into_iter()
        .filter(|r| {
            let mapped = table.mapping().contains_key(r.as_str())
                || table.mapping().contains_key(basename(r));
            !mapped && db.resolve(r).is_none()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::encode_base64;
    use crate::mesh::tests::square_stl;

    const URDF: &str = r#"<robot name="r">
  <link name="base">
    <visual><geometry><mesh filename="package://r/meshes/base.stl"/></geometry></visual>
    <visual><geometry><mesh filename="missing.stl"/></geometry></visual>
  </link>
</robot>"#;

    fn payload() -> Payload {
        Payload::new(URDF).with_mesh("base.stl", encode_base64(&square_stl()))
    }

    #[test]
    fn test_load_payload_object_urls() {
        let loaded = load_payload(&payload(), ReferenceStyle::ObjectUrl).unwrap();
        assert!(loaded.rewritten_urdf.contains(r#"filename="mem://meshes/0/base.stl""#));
        assert!(loaded.rewritten_urdf.contains(r#"filename="missing.stl""#));
        assert_eq!(loaded.unresolved, vec!["missing.stl"]);

        let base = loaded.robot.link("base").unwrap();
        assert!(base.visuals[0].geometry.mesh().is_some());
        assert!(base.visuals[1].geometry.mesh().is_none());
    }

    #[test]
    fn test_load_payload_data_urls() {
        let loaded = load_payload(&payload(), ReferenceStyle::DataUrl).unwrap();
        assert!(loaded.rewritten_urdf.contains(r#"filename="data:model/stl;base64,"#));
        let base = loaded.robot.link("base").unwrap();
        assert_eq!(base.visuals[0].geometry.mesh().unwrap().triangle_count(), 2);
    }

    #[test]
    fn test_exact_name_wins_over_case_variant() {
        let urdf = r#"<robot name="r">
  <link name="base"><visual><geometry><mesh filename="arm.STL"/></geometry></visual></link>
</robot>"#;
        let triangle = b"solid t
facet normal 0 0 1
  outer loop
    vertex 0 0 0
    vertex 1 0 0
    vertex 0 1 0
  endloop
endfacet
endsolid t
";
        let payload = Payload::new(urdf)
            .with_mesh("Arm.stl", encode_base64(&square_stl()))
            .with_mesh("arm.STL", encode_base64(triangle));

        let loaded = load_payload(&payload, ReferenceStyle::ObjectUrl).unwrap();
        assert!(loaded.rewritten_urdf.contains(r#"filename="mem://meshes/1/arm.STL""#));
        assert!(loaded.unresolved.is_empty());
        let mesh = loaded.robot.link("base").unwrap().visuals[0].geometry.mesh().unwrap();
        assert_eq!(mesh.triangle_count(), 1);
    }

    #[test]
    fn test_base64_urdf_and_shadow_option() {
        let mut p = Payload::new(encode_base64(URDF.as_bytes()));
        p.options.cast_shadows = false;
        let loaded = load_payload(&p, ReferenceStyle::ObjectUrl).unwrap();
        assert_eq!(loaded.robot.name, "r");
        assert!(loaded.robot.visuals().all(|(_, v)| !v.cast_shadow));
        assert!(!loaded.options.cast_shadows);
    }

    #[test]
    fn test_errors_surface() {
        let bad_mesh = Payload::new(URDF).with_mesh("base.stl", "!!!");
        assert!(matches!(
            load_payload(&bad_mesh, ReferenceStyle::ObjectUrl),
            Err(PipelineError::MeshDb(_))
        ));
        assert!(matches!(
            load_payload(&Payload::new("<robot"), ReferenceStyle::ObjectUrl),
            Err(PipelineError::Import(ImportError::UrdfParse(_)))
        ));
    }
}
