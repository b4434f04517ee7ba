use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use uuid::{Uuid, Variant};

#[derive(Debug, Error)]
pub enum NameMapError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("name/ID map is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Human name → platform ID tables, loaded from `name_id_map.json` in the
/// working directory. Passed explicitly so tests can supply their own tables.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NameIdMap {
    #[serde(default)]
    pub titles: HashMap<String, String>,
    #[serde(default)]
    pub groups: HashMap<String, String>,
}

impl NameIdMap {
    pub fn load() -> Result<Self, NameMapError> {
        Self::load_from(Path::new("name_id_map.json"))
    }

    pub fn load_from(path: &Path) -> Result<Self, NameMapError> {
        let raw = std::fs::read_to_string(path).map_err(|source| NameMapError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_str(&raw)?)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveKind {
    Title,
    Group,
}

/// Resolve a human name (or literal ID) to a platform ID.
///
/// Exact table lookup wins; otherwise the value passes through verbatim only
/// when it already is a canonical v4 UUID. `None` rejects the chapter.
pub fn resolve(kind: ResolveKind, name_or_id: &str, map: &NameIdMap) -> Option<String> {
    let table = match kind {
        ResolveKind::Title => &map.titles,
        ResolveKind::Group => &map.groups,
    };

    if let Some(id) = table.get(name_or_id) {
        return Some(id.clone());
    }
    if is_uuid_v4(name_or_id) {
        return Some(name_or_id.to_string());
    }
    None
}

/// Check for a canonical version-4 UUID: 8-4-4-4-12 hex grouping, version
/// nibble 4, RFC 4122 variant. `Uuid::parse_str` also accepts simple, braced
/// and URN forms, so the grouping is checked separately.
pub fn is_uuid_v4(s: &str) -> bool {
    let bytes = s.as_bytes();
    if bytes.len() != 36
        || bytes[8] != b'-'
        || bytes[13] != b'-'
        || bytes[18] != b'-'
        || bytes[23] != b'-'
    {
        return false;
    }

    match Uuid::parse_str(s) {
        Ok(uuid) => uuid.get_version_num() == 4 && uuid.get_variant() == Variant::RFC4122,
        Err(_) => false,
    }
}
