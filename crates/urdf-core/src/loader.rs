//! Mesh loading callback invoked once per visual during import

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::dae::load_dae_from_bytes;
use crate::encoding::{DataUrl, EncodingError};
use crate::mesh::{MeshFormat, MeshGeometry, load_stl_from_bytes};
use crate::mesh_db::MeshDb;
use crate::resource::ResourceTable;

/// Resolves a mesh reference from a `<mesh filename="...">` element.
///
/// `Ok(None)` means the reference produced no geometry; the visual is kept
/// without a mesh. An `Err` aborts the import.
pub trait MeshLoader {
    fn load_mesh(&self, path: &str) -> Result<Option<Arc<MeshGeometry>>, MeshError>;
}

impl<F> MeshLoader for F
where
    F: Fn(&str) -> Result<Option<Arc<MeshGeometry>>, MeshError>,
{
    fn load_mesh(&self, path: &str) -> Result<Option<Arc<MeshGeometry>>, MeshError> {
        self(path)
    }
}

/// Loader that never produces geometry
pub struct NullMeshLoader;

impl MeshLoader for NullMeshLoader {
    fn load_mesh(&self, _path: &str) -> Result<Option<Arc<MeshGeometry>>, MeshError> {
        Ok(None)
    }
}

/// Mesh-loading errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MeshError {
    #[error("Invalid data URL: {0}")]
    DataUrl(#[from] EncodingError),
    #[error("Unknown resource handle: {0}")]
    UnknownHandle(String),
}

/// Resolves references against a decoded payload.
///
/// Dispatch is by the shape of the reference: `data:` URLs are decoded in
/// place, `mem://` handles go through the resource table, and bare `.stl` or
/// `.dae` references are looked up in the mesh database. Anything else is
/// reported as unsupported and yields no geometry. Results are cached per
/// reference.
pub struct PayloadMeshLoader {
    db: Arc<MeshDb>,
    table: Arc<ResourceTable>,
    cache: Mutex<HashMap<String, Option<Arc<MeshGeometry>>>>,
}

impl PayloadMeshLoader {
    pub fn new(db: Arc<MeshDb>, table: Arc<ResourceTable>) -> Self {
        Self {
            db,
            table,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Number of distinct references resolved so far
    pub fn cached_count(&self) -> usize {
        self.cache.lock().len()
    }

    fn load_uncached(&self, path: &str) -> Result<Option<Arc<MeshGeometry>>, MeshError> {
        if let Some(index) = self.table.lookup(path) {
            let blob = self
                .db
                .blob(index)
                .ok_or_else(|| MeshError::UnknownHandle(path.to_string()))?;
            return Ok(decode(&blob.name, MeshFormat::from_path(&blob.name), &blob.bytes));
        }

        if DataUrl::is_data_url(path) {
            let url = DataUrl::parse(path)?;
            return Ok(decode("data URL", MeshFormat::from_mime(&url.mime), &url.bytes));
        }

        if ResourceTable::is_handle(path) {
            return Err(MeshError::UnknownHandle(path.to_string()));
        }

        let format = MeshFormat::from_path(path);
        if !format.is_supported() {
            tracing::warn!("Unsupported mesh type for path: {}", path);
            return Ok(None);
        }
        match self.db.resolve(path) {
            Some(blob) => Ok(decode(path, format, &blob.bytes)),
            None => {
                tracing::warn!("Mesh '{}' not found in payload", path);
                Ok(None)
            }
        }
    }
}

impl MeshLoader for PayloadMeshLoader {
    fn load_mesh(&self, path: &str) -> Result<Option<Arc<MeshGeometry>>, MeshError> {
        if let Some(hit) = self.cache.lock().get(path) {
            return Ok(hit.clone());
        }

        let loaded = self.load_uncached(path)?;
        self.cache.lock().insert(path.to_string(), loaded.clone());
        Ok(loaded)
    }
}

/// Parse bytes of the given format; failures are logged and produce no geometry
fn decode(label: &str, format: MeshFormat, bytes: &[u8]) -> Option<Arc<MeshGeometry>> {
    let parsed = match format {
        MeshFormat::Stl => load_stl_from_bytes(bytes).map_err(|e| e.to_string()),
        MeshFormat::Dae => load_dae_from_bytes(bytes).map_err(|e| e.to_string()),
        MeshFormat::Unknown => {
            tracing::warn!("Unsupported mesh type {} for '{}'", format.name(), label);
            return None;
        }
    };

    match parsed {
        Ok(mesh) => {
            tracing::debug!(
                "Loaded {} '{}': {} vertices, {} triangles",
                format.name(),
                label,
                mesh.vertices.len(),
                mesh.triangle_count()
            );
            Some(Arc::new(mesh))
        }
        Err(e) => {
            tracing::warn!("Failed to parse {} '{}': {}", format.name(), label, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dae::tests::square_dae;
    use crate::mesh::tests::square_stl;
    use crate::resource::ReferenceStyle;

    fn loader(style: ReferenceStyle) -> (PayloadMeshLoader, Arc<ResourceTable>) {
        let mut db = MeshDb::new();
        db.insert("base.stl", square_stl());
        db.insert("broken.stl", b"junk".to_vec());
        db.insert("arm.dae", square_dae().as_bytes().to_vec());
        db.insert("empty.dae", b"<COLLADA/>".to_vec());
        let db = Arc::new(db);
        let table = Arc::new(ResourceTable::build(&db, style));
        (PayloadMeshLoader::new(db, table.clone()), table)
    }

    #[test]
    fn test_object_url_handle() {
        let (loader, table) = loader(ReferenceStyle::ObjectUrl);
        let handle = &table.mapping()["base.stl"];
        let mesh = loader.load_mesh(handle).unwrap().unwrap();
        assert_eq!(mesh.triangle_count(), 2);
    }

    #[test]
    fn test_data_url_handle() {
        let (loader, table) = loader(ReferenceStyle::DataUrl);
        let handle = &table.mapping()["base.stl"];
        assert!(loader.load_mesh(handle).unwrap().is_some());

        let inline = DataUrl::build("model/stl", &square_stl());
        assert!(loader.load_mesh(&inline).unwrap().is_some());
    }

    #[test]
    fn test_bare_reference_uses_variants() {
        let (loader, _) = loader(ReferenceStyle::ObjectUrl);
        assert!(
            loader
                .load_mesh("package://robot/meshes/BASE.STL?v=3")
                .unwrap()
                .is_some()
        );
        assert!(loader.load_mesh("missing.stl").unwrap().is_none());
    }

    #[test]
    fn test_dae_from_every_reference_shape() {
        let (loader, table) = loader(ReferenceStyle::ObjectUrl);
        let handle = &table.mapping()["arm.dae"];
        assert_eq!(loader.load_mesh(handle).unwrap().unwrap().triangle_count(), 2);
        assert!(loader.load_mesh("package://robot/meshes/ARM.dae").unwrap().is_some());

        let (loader, table) = self::loader(ReferenceStyle::DataUrl);
        let handle = &table.mapping()["arm.dae"];
        assert!(handle.starts_with("data:model/vnd.collada+xml;base64,"));
        assert!(loader.load_mesh(handle).unwrap().is_some());

        let inline = DataUrl::build("model/vnd.collada+xml", square_dae().as_bytes());
        assert!(loader.load_mesh(&inline).unwrap().is_some());
    }

    #[test]
    fn test_unsupported_and_broken_yield_none() {
        let (loader, table) = loader(ReferenceStyle::ObjectUrl);
        assert!(loader.load_mesh("robot.obj").unwrap().is_none());
        assert!(loader.load_mesh(&table.mapping()["empty.dae"]).unwrap().is_none());
        assert!(loader.load_mesh(&table.mapping()["broken.stl"]).unwrap().is_none());
    }

    #[test]
    fn test_unknown_handle_is_error() {
        let (loader, _) = loader(ReferenceStyle::ObjectUrl);
        assert_eq!(
            loader.load_mesh("mem://meshes/42/x.stl"),
            Err(MeshError::UnknownHandle("mem://meshes/42/x.stl".into()))
        );
        assert!(matches!(
            loader.load_mesh("data:model/stl,plain"),
            Err(MeshError::DataUrl(_))
        ));
    }

    #[test]
    fn test_results_are_cached() {
        let (loader, table) = loader(ReferenceStyle::ObjectUrl);
        let handle = &table.mapping()["base.stl"];
        let a = loader.load_mesh(handle).unwrap().unwrap();
        let b = loader.load_mesh(handle).unwrap().unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(loader.cached_count(), 1);
    }

    #[test]
    fn test_closure_loader() {
        let calls = std::cell::Cell::new(0);
        let closure = |_: &str| -> Result<Option<Arc<MeshGeometry>>, MeshError> {
            calls.set(calls.get() + 1);
            Ok(None)
        };
        assert!(closure.load_mesh("x.stl").unwrap().is_none());
        assert_eq!(calls.get(), 1);
    }
}
