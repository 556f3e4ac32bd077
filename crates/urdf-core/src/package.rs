//! Build a payload from a robot package on disk
//!
//! A package holds a `urdf/` and a `meshes/` directory, either directly under
//! the given root or one level below it (`model/` or `model/model/`).

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::encoding::{encode_base64, extension_of};
use crate::mesh_db::basename;
use crate::payload::{Payload, ViewerOptions};
use crate::rewrite::collect_mesh_references;

const MESH_EXTENSIONS: &[&str] = &["stl", "dae"];
const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];

/// Package directories found under a root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageDirs {
    pub urdf_dir: PathBuf,
    pub meshes_dir: PathBuf,
}

/// Package loading errors
#[derive(Debug, thiserror::Error)]
pub enum PackageError {
    #[error("Could not find urdf/ and meshes/ inside '{0}' (or one nested level)")]
    DirsNotFound(PathBuf),
    #[error("No .urdf file in {0}")]
    NoUrdf(PathBuf),
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to walk {0}: {1}")]
    Walk(PathBuf, #[source] walkdir::Error),
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> PackageError + '_ {
    move |source| PackageError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Locate `urdf/` and `meshes/` under `root` or one of its direct children
pub fn find_package_dirs(root: &Path) -> Result<PackageDirs, PackageError> {
    let at = |dir: &Path| {
        let urdf_dir = dir.join("urdf");
        let meshes_dir = dir.join("meshes");
        (urdf_dir.is_dir() && meshes_dir.is_dir()).then_some(PackageDirs {
            urdf_dir,
            meshes_dir,
        })
    };

    if let Some(dirs) = at(root) {
        return Ok(dirs);
    }

    if root.is_dir() {
        let mut children: Vec<PathBuf> = std::fs::read_dir(root)
            .map_err(io_error(root))?
            .filter_map(|e| e.ok().map(|e| e.path()))
            .filter(|p| p.is_dir())
            .collect();
        children.sort();
        if let Some(dirs) = children.iter().find_map(|c| at(c)) {
            return Ok(dirs);
        }
    }

    Err(PackageError::DirsNotFound(root.to_path_buf()))
}

/// First `*.urdf` file of a directory, by name
fn first_urdf(urdf_dir: &Path) -> Result<PathBuf, PackageError> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(urdf_dir)
        .map_err(io_error(urdf_dir))?
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && extension_of(&p.to_string_lossy()).as_deref() == Some("urdf"))
        .collect();
    files.sort();
    files
        .into_iter()
        .next()
        .ok_or_else(|| PackageError::NoUrdf(urdf_dir.to_path_buf()))
}

/// Mesh and image files under `meshes_dir`, keyed by lowercase basename.
/// With duplicate basenames the last file walked wins.
fn index_files(meshes_dir: &Path) -> Result<Vec<(String, PathBuf)>, PackageError> {
    let mut files: Vec<(String, PathBuf)> = Vec::new();
    for entry in WalkDir::new(meshes_dir).sort_by_file_name() {
        let entry = entry.map_err(|e| PackageError::Walk(meshes_dir.to_path_buf(), e))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_lowercase();
        let Some(ext) = extension_of(&name) else {
            continue;
        };
        if MESH_EXTENSIONS.contains(&ext.as_str()) || IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            files.retain(|(n, _)| n != &name);
            files.push((name, entry.into_path()));
        }
    }
    Ok(files)
}

impl Payload {
    /// Build a payload from a package directory.
    ///
    /// Every mesh the URDF references is stored under the reference exactly
    /// as written, the reference without `package://` and its lowercase
    /// basename, so the rewrite matches it verbatim. Images are added by
    /// lowercase basename.
    pub fn from_package_dir(root: &Path, options: ViewerOptions) -> Result<Self, PackageError> {
        let dirs = find_package_dirs(root)?;
        let urdf_path = first_urdf(&dirs.urdf_dir)?;
        let urdf = std::fs::read_to_string(&urdf_path).map_err(io_error(&urdf_path))?;
        tracing::info!("Building payload from {}", urdf_path.display());

        let files = index_files(&dirs.meshes_dir)?;
        let by_basename: HashMap<&str, &Path> =
            files.iter().map(|(n, p)| (n.as_str(), p.as_path())).collect();

        let mut encoded: HashMap<PathBuf, String> = HashMap::new();
        let mut payload = Payload::new(urdf.clone()).with_options(options);
        let mut add_entry = |key: &str, path: &Path| -> Result<(), PackageError> {
            if payload.meshes.contains_key(key) {
                return Ok(());
            }
            let data = match encoded.get(path) {
                Some(data) => data.clone(),
                None => {
                    let bytes = std::fs::read(path).map_err(io_error(path))?;
                    let data = encode_base64(&bytes);
                    encoded.insert(path.to_path_buf(), data.clone());
                    data
                }
            };
            payload.meshes.insert(key.to_string(), data);
            Ok(())
        };

        for reference in collect_mesh_references(&urdf) {
            let base = basename(&reference).to_lowercase();
            let Some(path) = by_basename.get(base.as_str()).copied() else {
                tracing::warn!(
                    "Referenced mesh '{}' not found under {}",
                    reference,
                    dirs.meshes_dir.display()
                );
                continue;
            };
            add_entry(&reference, path)?;
            add_entry(reference.strip_prefix("package://").unwrap_or(&reference), path)?;
            add_entry(&base, path)?;
        }

        for (name, path) in &files {
            let is_image = extension_of(name).is_some_and(|e| IMAGE_EXTENSIONS.contains(&e.as_str()));
            if is_image {
                add_entry(name, path)?;
            }
        }

        tracing::debug!("Package payload has {} mesh entries", payload.meshes.len());
        Ok(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::decode_base64;
    use crate::pipeline::load_payload;
    use crate::resource::ReferenceStyle;
    use std::fs;

    const URDF: &str = r#"<robot name="pkg">
  <link name="base"><visual><geometry><mesh filename="package://pkg/meshes/Base.STL"/></geometry></visual></link>
</robot>"#;

    fn write_package(root: &Path) {
        fs::create_dir_all(root.join("urdf")).unwrap();
        fs::create_dir_all(root.join("meshes/visual")).unwrap();
        fs::write(root.join("urdf/pkg.urdf"), URDF).unwrap();
        fs::write(root.join("urdf/zz_other.urdf"), "<robot name=\"other\"/>").unwrap();
        fs::write(root.join("meshes/visual/base.stl"), b"solid base").unwrap();
        fs::write(root.join("meshes/texture.PNG"), b"png").unwrap();
        fs::write(root.join("meshes/readme.txt"), b"ignored").unwrap();
    }

    #[test]
    fn test_find_dirs_direct_and_nested() {
        let tmp = tempfile::tempdir().unwrap();
        write_package(&tmp.path().join("model"));

        let nested = find_package_dirs(tmp.path()).unwrap();
        assert_eq!(nested.urdf_dir, tmp.path().join("model/urdf"));

        let direct = find_package_dirs(&tmp.path().join("model")).unwrap();
        assert_eq!(direct.meshes_dir, tmp.path().join("model/meshes"));

        let empty = tempfile::tempdir().unwrap();
        assert!(matches!(
            find_package_dirs(empty.path()),
            Err(PackageError::DirsNotFound(_))
        ));
    }

    #[test]
    fn test_payload_from_package() {
        let tmp = tempfile::tempdir().unwrap();
        write_package(tmp.path());

        let payload = Payload::from_package_dir(tmp.path(), ViewerOptions::default()).unwrap();
        assert_eq!(payload.urdf, URDF);

        let keys: Vec<&str> = payload.meshes.keys().map(String::as_str).collect();
        assert_eq!(
            keys,
            vec![
                "base.stl",
                "package://pkg/meshes/Base.STL",
                "pkg/meshes/Base.STL",
                "texture.png",
            ]
        );
        assert_eq!(decode_base64(&payload.meshes["base.stl"]).unwrap(), b"solid base");
    }

    #[test]
    fn test_mixed_case_reference_is_rewritten() {
        let tmp = tempfile::tempdir().unwrap();
        write_package(tmp.path());

        let payload = Payload::from_package_dir(tmp.path(), ViewerOptions::default()).unwrap();
        let loaded = load_payload(&payload, ReferenceStyle::DataUrl).unwrap();
        assert!(!loaded.rewritten_urdf.contains("package://"));
        assert!(loaded.rewritten_urdf.contains(r#"<mesh filename="data:model/stl;base64,"#));
        assert!(loaded.unresolved.is_empty());
    }

    #[test]
    fn test_missing_urdf_file() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir_all(tmp.path().join("urdf")).unwrap();
        fs::create_dir_all(tmp.path().join("meshes")).unwrap();
        assert!(matches!(
            Payload::from_package_dir(tmp.path(), ViewerOptions::default()),
            Err(PackageError::NoUrdf(_))
        ));
    }
}
