//! Raw `kiln.toml` sections, as written by the user.

use serde::Deserialize;
use serde_json::Value;

use crate::asset::AssetKind;

/// `[build]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BuildSection {
    /// Manifest name.
    pub name: String,
    /// Source root, relative to the config file.
    pub base_dir: String,
    /// Output directory, relative to `base_dir`.
    pub dest_dir: String,
    /// Public prefix the runtime prepends to manifest values.
    pub base_url: String,
    pub env: String,
    /// Asset names never built.
    pub skip: Vec<String>,
    pub silent: bool,
    /// Global hashing override; unset lets each asset decide.
    pub skip_hash: Option<bool>,
}

impl Default for BuildSection {
    fn default() -> Self {
        Self {
            name: "assets".into(),
            base_dir: ".".into(),
            dest_dir: "dist".into(),
            base_url: "/".into(),
            env: "development".into(),
            skip: Vec::new(),
            silent: false,
            skip_hash: None,
        }
    }
}

/// One `[[assets]]` table.
///
/// Fields that do not apply to `type` are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct AssetDecl {
    #[serde(rename = "type")]
    pub kind: AssetKind,
    #[serde(default)]
    pub name: String,
    /// file: source globs.
    #[serde(default)]
    pub files: Vec<String>,
    /// folder: source directory.
    pub folder: Option<String>,
    #[serde(default)]
    pub include: Vec<String>,
    #[serde(default)]
    pub exclude: Vec<String>,
    /// bundle: entry modules.
    #[serde(default)]
    pub entries: Vec<String>,
    #[serde(default)]
    pub transform: Vec<TransformDecl>,
    #[serde(default)]
    pub require: Vec<RequireDecl>,
    #[serde(default)]
    pub external: Vec<ExternalDecl>,
    /// url: the literal location.
    pub url: Option<String>,
    /// package: member asset names.
    #[serde(default)]
    pub assets: Vec<String>,
    #[serde(default)]
    pub watch: Vec<String>,
    pub skip_hash: Option<bool>,
}

/// `"uglify"` or `{ fn = "autoprefixer", options = { ... }, args = [...] }`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum TransformDecl {
    Name(String),
    Full {
        #[serde(rename = "fn")]
        name: String,
        #[serde(default)]
        options: Value,
        #[serde(default)]
        args: Vec<Value>,
    },
}

/// `"lib"` or `{ file = "src/lib.js", expose = "lib" }`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RequireDecl {
    Expose(String),
    Full {
        file: Option<String>,
        expose: String,
    },
}

/// `{ bundle = "vendor.js" }` or `{ module = "jquery" }`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExternalDecl {
    Bundle(String),
    Module(String),
}
