//! In-memory resource handles substituted for mesh filenames

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::encoding::{DataUrl, mime_for_path};
use crate::mesh_db::{MeshDb, basename};

/// Scheme of object-URL style handles
pub const MEM_SCHEME: &str = "mem://meshes/";

/// How decoded meshes are referenced from the rewritten URDF
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ReferenceStyle {
    /// Short opaque handles (`mem://meshes/<index>/<name>`), resolved through the table
    #[default]
    ObjectUrl,
    /// Self-contained `data:` URLs carrying the bytes inline
    DataUrl,
}

impl ReferenceStyle {
    pub fn display_name(&self) -> &'static str {
        match self {
            ReferenceStyle::ObjectUrl => "Object URL",
            ReferenceStyle::DataUrl => "Data URL",
        }
    }
}

/// Mapping from every delivered mesh name to its own handle, plus the reverse lookup
#[derive(Debug, Clone, Default)]
pub struct ResourceTable {
    style: ReferenceStyle,
    mapping: BTreeMap<String, String>,
    handles: HashMap<String, usize>,
}

impl ResourceTable {
    pub fn build(db: &MeshDb, style: ReferenceStyle) -> Self {
        let mut table = Self {
            style,
            ..Default::default()
        };

        for (index, blob) in db.blobs().enumerate() {
            let handle = match style {
                ReferenceStyle::ObjectUrl => {
                    format!("{}{}/{}", MEM_SCHEME, index, sanitize(basename(&blob.name)))
                }
                ReferenceStyle::DataUrl => DataUrl::build(mime_for_path(&blob.name), &blob.bytes),
            };
            table.mapping.insert(blob.name.clone(), handle.clone());
            table.handles.insert(handle, index);
        }

        table
    }

    pub fn style(&self) -> ReferenceStyle {
        self.style
    }

    /// Delivered mesh name -> handle, as consumed by the URDF rewrite
    pub fn mapping(&self) -> &BTreeMap<String, String> {
        &self.mapping
    }

    /// Blob index for a handle produced by this table
    pub fn lookup(&self, handle: &str) -> Option<usize> {
        self.handles.get(handle).copied()
    }

    pub fn is_handle(s: &str) -> bool {
        s.starts_with(MEM_SCHEME)
    }

    pub fn len(&self) -> usize {
        self.mapping.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mapping.is_empty()
    }
}

/// Keep handles safe inside an XML attribute
fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect()
}
