//! Asset kind definitions.

use serde::{Deserialize, Serialize};

/// Kind of declared asset; drives builder dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    /// Globbed files through a transform pipeline.
    File,
    /// A directory tree copied as one hashed folder.
    Folder,
    /// Script modules combined by the bundler.
    Bundle,
    /// External URL, no build step.
    Url,
    /// Named group of other assets, no build step.
    Package,
}

impl AssetKind {
    pub const fn label(self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Folder => "folder",
            Self::Bundle => "bundle",
            Self::Url => "url",
            Self::Package => "package",
        }
    }
}
