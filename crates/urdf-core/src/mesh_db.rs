//! In-memory store of decoded mesh blobs

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::encoding::{EncodingError, decode_base64};

/// A decoded mesh file, under the name it was delivered with
#[derive(Debug, Clone)]
pub struct MeshBlob {
    pub name: String,
    pub bytes: Arc<[u8]>,
}

/// Decoded mesh files, looked up by delivered name or normalized reference.
///
/// Every delivered name keeps its own blob. The normalized index only backs
/// the fuzzy lookups; when two names normalize alike it points at the first.
/// Insertion order is kept so that resource handles are stable for a payload.
#[derive(Debug, Clone, Default)]
pub struct MeshDb {
    blobs: Vec<MeshBlob>,
    by_name: HashMap<String, usize>,
    index: HashMap<String, usize>,
}

impl MeshDb {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode every `name -> base64` entry
    pub fn from_base64_map(meshes: &BTreeMap<String, String>) -> Result<Self, MeshDbError> {
        let mut db = Self::new();
        for (name, data) in meshes {
            let bytes = decode_base64(data).map_err(|source| MeshDbError::Decode {
                name: name.clone(),
                source,
            })?;
            db.insert(name.clone(), bytes);
        }
        tracing::debug!("Decoded {} mesh blobs", db.len());
        Ok(db)
    }

    /// Add a blob under its delivered name. Re-inserting a name replaces its bytes.
    pub fn insert(&mut self, name: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> usize {
        let name = name.into();
        if let Some(&existing) = self.by_name.get(&name) {
            self.blobs[existing].bytes = bytes.into();
            return existing;
        }

        let idx = self.blobs.len();
        let key = normalize_key(&name);
        if self.index.contains_key(&key) {
            tracing::debug!("Mesh '{}' differs from an earlier entry only by case", name);
        } else {
            self.index.insert(key, idx);
        }
        self.by_name.insert(name.clone(), idx);
        self.blobs.push(MeshBlob {
            name,
            bytes: bytes.into(),
        });
        idx
    }

    /// Lookup by delivered name, then by normalized key
    pub fn get(&self, key: &str) -> Option<&MeshBlob> {
        self.by_name
            .get(key)
            .or_else(|| self.index.get(&normalize_key(key)))
            .map(|&i| &self.blobs[i])
    }

    pub fn blob(&self, index: usize) -> Option<&MeshBlob> {
        self.blobs.get(index)
    }

    pub fn blobs(&self) -> impl Iterator<Item = &MeshBlob> {
        self.blobs.iter()
    }

    /// Delivered names, in insertion order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.blobs.iter().map(|b| b.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }

    /// Find the blob for a mesh reference: the delivered name as written,
    /// then [`lookup_variants`] in order
    pub fn resolve(&self, path: &str) -> Option<&MeshBlob> {
        if let Some(&i) = self.by_name.get(path) {
            return Some(&self.blobs[i]);
        }
        lookup_variants(path)
            .iter()
            .find_map(|variant| self.index.get(variant))
            .map(|&i| &self.blobs[i])
    }
}

/// Errors building a [`MeshDb`]
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MeshDbError {
    #[error("Mesh '{name}' is not valid base64: {source}")]
    Decode {
        name: String,
        #[source]
        source: EncodingError,
    },
}

/// Backslashes become `/`, everything lowercase
pub fn normalize_key(key: &str) -> String {
    key.replace('\\', "/").to_lowercase()
}

/// Last path component
pub fn basename(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

/// Text before any `?query` or `#fragment`
fn strip_query(path: &str) -> &str {
    path.split(['?', '#']).next().unwrap_or(path)
}

/// Candidate keys for a mesh reference, most specific first, without duplicates:
/// the full path, the path without `package://`, the basename, the basename
/// without `?query`/`#fragment`, then every trailing sub-path of the
/// scheme-less path without its query.
pub fn lookup_variants(path: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    let mut push = |s: &str| {
        if !s.is_empty() && !out.iter().any(|o| o == s) {
            out.push(s.to_string());
        }
    };

    let p = normalize_key(path);
    push(&p);
    let relative = p.strip_prefix("package://").unwrap_or(&p);
    push(relative);

    let base = basename(relative);
    push(base);
    push(strip_query(base));

    let parts: Vec<&str> = strip_query(relative)
        .split('/')
        .filter(|part| !part.is_empty())
        .collect();
    for i in 1..parts.len() {
        push(&parts[i..].join("/"));
    }
    out
}
