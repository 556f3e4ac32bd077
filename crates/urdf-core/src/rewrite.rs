//! Textual rewrite of `<mesh filename="...">` references

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;

static MESH_FILENAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<mesh\s+filename="([^"]+)""#).expect("mesh filename pattern is valid")
});

static MESH_REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)filename="([^"]+\.(?:stl|dae))""#).expect("mesh reference pattern is valid")
});

/// Replace every `<mesh filename="X">` whose `X` (or the basename of `X`) is a
/// key of `mapping` with the mapped value.
///
/// Unmatched references are left byte-identical. Returns `Cow::Borrowed` when
/// nothing was replaced.
pub fn rewrite_mesh_filenames<'a>(urdf: &'a str, mapping: &BTreeMap<String, String>) -> Cow<'a, str> {
    let mut out: Option<String> = None;
    let mut last = 0;
    let mut replaced = 0usize;

    for caps in MESH_FILENAME.captures_iter(urdf) {
        let Some(value) = caps.get(1) else {
            continue;
        };
        let filename = value.as_str();
        let base = filename.rsplit('/').next().unwrap_or(filename);
        let Some(target) = mapping.get(filename).or_else(|| mapping.get(base)) else {
            tracing::debug!("No payload mesh for '{}', leaving reference untouched", filename);
            continue;
        };

        let buf = out.get_or_insert_with(|| String::with_capacity(urdf.len()));
        buf.push_str(&urdf[last..value.start()]);
        buf.push_str(target);
        last = value.end();
        replaced += 1;
    }

    match out {
        Some(mut buf) => {
            buf.push_str(&urdf[last..]);
            tracing::debug!("Rewrote {} mesh references", replaced);
            Cow::Owned(buf)
        }
        None => Cow::Borrowed(urdf),
    }
}

/// Every STL/DAE `filename="..."` in the document, first occurrence order, deduplicated
pub fn collect_mesh_references(urdf: &str) -> Vec<String> {
    let mut refs: Vec<String> = Vec::new();
    for caps in MESH_REFERENCE.captures_iter(urdf) {
        let r = &caps[1];
        if !refs.iter().any(|existing| existing == r) {
            refs.push(r.to_string());
        }
    }
    refs
}
