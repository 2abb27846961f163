//! Normalized build options.

use std::path::PathBuf;

use crate::asset::AssetDescriptor;

/// Read-only options for one build session.
///
/// Never mutated once a session owns it; a configuration change builds a
/// new session instead.
#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Manifest name.
    pub name: String,
    /// Absolute source root.
    pub base_dir: PathBuf,
    /// Absolute output directory.
    pub dest_dir: PathBuf,
    pub base_url: String,
    pub env: String,
    pub skip: Vec<String>,
    pub silent: bool,
    pub skip_hash: Option<bool>,
    /// Declared assets, in declaration order.
    pub assets: Vec<AssetDescriptor>,
    /// Config file these options were loaded from, if any.
    pub config_path: Option<PathBuf>,
}

impl BuildOptions {
    pub fn new(base_dir: impl Into<PathBuf>, dest_dir: impl Into<PathBuf>) -> Self {
        Self {
            name: "assets".into(),
            base_dir: base_dir.into(),
            dest_dir: dest_dir.into(),
            base_url: "/".into(),
            env: "development".into(),
            skip: Vec::new(),
            silent: false,
            skip_hash: None,
            assets: Vec::new(),
            config_path: None,
        }
    }

    pub fn with_asset(mut self, asset: AssetDescriptor) -> Self {
        self.assets.push(asset);
        self
    }

    /// Last declared asset with this name.
    pub fn find_asset(&self, name: &str) -> Option<&AssetDescriptor> {
        self.assets.iter().rev().find(|asset| asset.name == name)
    }

    pub fn is_skipped(&self, name: &str) -> bool {
        self.skip.iter().any(|skipped| skipped == name)
    }

    /// Assets with a non-empty watch list.
    pub fn watched_assets(&self) -> impl Iterator<Item = &AssetDescriptor> {
        self.assets.iter().filter(|asset| !asset.watch.is_empty())
    }
}
