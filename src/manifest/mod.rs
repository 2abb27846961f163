//! Manifest store: asset name to public location.
//!
//! The in-memory manifest is shared by every builder of a session and
//! written to `<dest_dir>/manifest.json` once per full build pass.
//!
//! ```json
//! {
//!   "name": "site",
//!   "baseUrl": "/static/",
//!   "assets": {
//!     "app.js": { "type": "bundle", "value": "app.3f2a9c0d1e4b5a67.js", "sourcePath": "dist/app.3f2a9c0d1e4b5a67.js" },
//!     "cdn":    { "type": "url", "value": "https://cdn.example/lib.js" },
//!     "all":    { "type": "package", "value": ["app.js", "cdn"] }
//!   }
//! }
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::asset::AssetKind;

pub const MANIFEST_FILE: &str = "manifest.json";

/// Persisted manifest document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub name: String,
    pub base_url: String,
    #[serde(default)]
    pub assets: BTreeMap<String, ManifestEntry>,
}

impl Manifest {
    pub fn new(name: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into(),
            assets: BTreeMap::new(),
        }
    }

    #[cfg(test)]
    pub fn load(path: &Path) -> io::Result<Self> {
        let content = fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(io::Error::other)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// One asset's public descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestEntry {
    #[serde(rename = "type")]
    pub kind: AssetKind,
    pub value: EntryValue,
    /// Written artifact, relative to the base directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntryValue {
    /// Output name relative to `baseUrl`, or a literal URL.
    Path(String),
    /// Package member names, in declared order.
    List(Vec<String>),
}

impl ManifestEntry {
    /// Entry for a written artifact.
    pub fn artifact(kind: AssetKind, value: impl Into<String>, source_path: impl Into<String>) -> Self {
        Self {
            kind,
            value: EntryValue::Path(value.into()),
            source_path: Some(source_path.into()),
        }
    }

    pub fn url(url: impl Into<String>) -> Self {
        Self {
            kind: AssetKind::Url,
            value: EntryValue::Path(url.into()),
            source_path: None,
        }
    }

    pub fn package(members: Vec<String>) -> Self {
        Self {
            kind: AssetKind::Package,
            value: EntryValue::List(members),
            source_path: None,
        }
    }

    pub fn path(&self) -> Option<&str> {
        match &self.value {
            EntryValue::Path(path) => Some(path),
            EntryValue::List(_) => None,
        }
    }
}

/// Session-scoped manifest shared between concurrent builders.
///
/// Cloning shares the same underlying manifest. Insertions overwrite by
/// name.
#[derive(Debug, Clone)]
pub struct ManifestStore {
    manifest: Arc<RwLock<Manifest>>,
    path: PathBuf,
}

impl ManifestStore {
    pub fn new(name: &str, base_url: &str, dest_dir: &Path) -> Self {
        Self {
            manifest: Arc::new(RwLock::new(Manifest::new(name, base_url))),
            path: dest_dir.join(MANIFEST_FILE),
        }
    }

    /// Location of the persisted manifest.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn add_asset(&self, name: &str, entry: ManifestEntry) {
        crate::debug!("manifest"; "{} -> {:?}", name, entry.value);
        self.manifest.write().assets.insert(name.to_string(), entry);
    }

    pub fn get(&self, name: &str) -> Option<ManifestEntry> {
        self.manifest.read().assets.get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.manifest.read().assets.len()
    }

    /// Point-in-time copy of the manifest.
    pub fn snapshot(&self) -> Manifest {
        self.manifest.read().clone()
    }

    /// Write the current manifest to [`Self::path`].
    pub fn write(&self) -> io::Result<()> {
        let json = self.snapshot().to_json().map_err(io::Error::other)?;
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_entry_serialization() {
        let entry = ManifestEntry::artifact(AssetKind::File, "app.abc.css", "dist/app.abc.css");
        assert_eq!(
            serde_json::to_value(&entry).unwrap(),
            json!({ "type": "file", "value": "app.abc.css", "sourcePath": "dist/app.abc.css" })
        );

        let package = ManifestEntry::package(vec!["a".into(), "b".into()]);
        assert_eq!(
            serde_json::to_value(&package).unwrap(),
            json!({ "type": "package", "value": ["a", "b"] })
        );
    }

    #[test]
    fn test_last_write_wins() {
        let store = ManifestStore::new("site", "/", Path::new("dist"));
        store.add_asset("app.js", ManifestEntry::url("https://one.example/a.js"));
        store.add_asset("app.js", ManifestEntry::url("https://two.example/a.js"));
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("app.js").unwrap().path(), Some("https://two.example/a.js"));
    }

    #[test]
    fn test_clones_share_state() {
        let store = ManifestStore::new("site", "/", Path::new("dist"));
        let other = store.clone();
        other.add_asset("cdn", ManifestEntry::url("https://cdn.example"));
        assert!(store.get("cdn").is_some());
    }

    #[test]
    fn test_snapshot_is_detached() {
        let store = ManifestStore::new("site", "/", Path::new("dist"));
        let mut snapshot = store.snapshot();
        snapshot.assets.insert("x".into(), ManifestEntry::url("u"));
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn test_write_and_load() {
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("dist");
        let store = ManifestStore::new("site", "/static/", &dest);
        store.add_asset("all", ManifestEntry::package(vec!["a".into()]));
        store.write().unwrap();

        assert_eq!(store.path(), dest.join("manifest.json"));
        let loaded = Manifest::load(store.path()).unwrap();
        assert_eq!(loaded, store.snapshot());

        let raw: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(store.path()).unwrap()).unwrap();
        assert_eq!(raw["baseUrl"], "/static/");
    }
}
