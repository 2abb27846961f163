//! Normalized asset descriptors and source enumeration.

mod kind;
mod scan;

use std::path::PathBuf;

pub use kind::AssetKind;
pub use scan::{PatternSet, collect_files};
pub(crate) use scan::walk_sorted;

use crate::transform::TransformStep;

/// A normalized, immutable asset declaration.
#[derive(Debug, Clone)]
pub struct AssetDescriptor {
    /// Unique key: manifest key and base output name.
    pub name: String,
    /// Globs (relative to the base directory) that trigger a rebuild.
    pub watch: Vec<String>,
    /// Per-asset hashing override, consulted when the global one is unset.
    pub skip_hash: Option<bool>,
    pub source: AssetSource,
}

/// Type-specific part of a descriptor.
#[derive(Debug, Clone)]
pub enum AssetSource {
    File {
        /// Globs relative to the base directory.
        files: Vec<String>,
        transform: Vec<TransformStep>,
    },
    Folder {
        /// Absolute source directory.
        folder: PathBuf,
        include: Vec<String>,
        exclude: Vec<String>,
    },
    Bundle {
        /// Absolute entry paths; empty for a require-only bundle.
        entries: Vec<PathBuf>,
        transform: Vec<TransformStep>,
        require: Vec<RequireSpec>,
        external: Vec<ExternalSpec>,
    },
    Url(String),
    Package(Vec<String>),
}

/// A module bundled and exposed under a public name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequireSpec {
    /// Absolute module path. `None` exposes a module provided elsewhere.
    pub file: Option<PathBuf>,
    pub expose: String,
}

/// A dependency excluded from a bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExternalSpec {
    /// Every name exposed by the sibling bundle asset with this name.
    Bundle(String),
    /// A bare module name.
    Module(String),
}

impl AssetDescriptor {
    pub fn new(name: impl Into<String>, source: AssetSource) -> Self {
        Self {
            name: name.into(),
            watch: Vec::new(),
            skip_hash: None,
            source,
        }
    }

    pub fn with_watch(mut self, watch: Vec<String>) -> Self {
        self.watch = watch;
        self
    }

    pub fn with_skip_hash(mut self, skip_hash: bool) -> Self {
        self.skip_hash = Some(skip_hash);
        self
    }

    pub fn kind(&self) -> AssetKind {
        match self.source {
            AssetSource::File { .. } => AssetKind::File,
            AssetSource::Folder { .. } => AssetKind::Folder,
            AssetSource::Bundle { .. } => AssetKind::Bundle,
            AssetSource::Url(_) => AssetKind::Url,
            AssetSource::Package(_) => AssetKind::Package,
        }
    }

    /// Names this bundle exposes to siblings. Empty for other kinds.
    pub fn exposed_names(&self) -> impl Iterator<Item = &str> {
        let require = match &self.source {
            AssetSource::Bundle { require, .. } => require.as_slice(),
            _ => &[],
        };
        require.iter().map(|r| r.expose.as_str())
    }
}

/// Resolve the hashing policy for one asset.
///
/// An explicit global value wins; otherwise the asset decides.
#[inline]
pub fn should_skip_hash(global: Option<bool>, asset: Option<bool>) -> bool {
    match global {
        Some(skip) => skip,
        None => asset.unwrap_or(false),
    }
}
