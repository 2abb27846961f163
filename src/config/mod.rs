//! Build configuration from `kiln.toml`.
//!
//! ```text
//! config/
//! ├── section    # raw [build] and [[assets]] tables
//! ├── options    # BuildOptions (normalized, read-only)
//! ├── error      # ConfigError, ConfigDiagnostics
//! └── mod.rs     # loading and normalization (this file)
//! ```
//!
//! # Example
//!
//! ```toml
//! [build]
//! name = "site"
//! dest_dir = "public/assets"
//! base_url = "/assets/"
//!
//! [[assets]]
//! type = "file"
//! name = "site.css"
//! files = ["styles/*.scss"]
//! transform = ["sass", "autoprefixer", "clean-css", "concat"]
//! watch = ["styles/**/*.scss"]
//!
//! [[assets]]
//! type = "bundle"
//! name = "app.js"
//! entries = ["js/main.js"]
//! external = [{ bundle = "vendor.js" }]
//! ```

mod error;
mod options;
mod section;

pub use error::{ConfigDiagnostics, ConfigError};
pub use options::BuildOptions;
pub use section::{AssetDecl, BuildSection, ExternalDecl, RequireDecl, TransformDecl};

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::asset::{AssetDescriptor, AssetKind, AssetSource, ExternalSpec, RequireSpec};
use crate::log;
use crate::transform::TransformStep;
use crate::utils::path::{normalize_path, resolve_against};

/// Default config file name.
pub const CONFIG_FILE: &str = "kiln.toml";

/// Root of `kiln.toml`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct KilnConfig {
    pub build: BuildSection,
    pub assets: Vec<AssetDecl>,
}

impl KilnConfig {
    /// Parse TOML content, collecting any unknown fields.
    pub fn parse_with_ignored(content: &str) -> Result<(Self, Vec<String>), ConfigError> {
        let mut ignored = Vec::new();
        let deserializer = toml::Deserializer::new(content);
        let config = serde_ignored::deserialize(deserializer, |path: serde_ignored::Path| {
            ignored.push(path.to_string());
        })?;
        Ok((config, ignored))
    }

    /// Resolve paths against `root` and validate every declaration.
    ///
    /// All problems are collected and reported together.
    pub fn into_options(self, root: &Path) -> Result<BuildOptions, ConfigError> {
        let base_dir = resolve_against(root, &self.build.base_dir);
        let dest_dir = resolve_against(&base_dir, &self.build.dest_dir);

        let mut diag = ConfigDiagnostics::new();
        if self.build.base_url.is_empty() {
            diag.error_with_hint("build.base_url", "must not be empty", "use \"/\" for the site root");
        }

        let assets: Vec<_> = self
            .assets
            .into_iter()
            .enumerate()
            .filter_map(|(index, decl)| normalize_asset(index, decl, &base_dir, &mut diag))
            .collect();
        diag.into_result()?;

        let BuildSection {
            name,
            base_url,
            env,
            skip,
            silent,
            skip_hash,
            ..
        } = self.build;

        let options = BuildOptions {
            name,
            base_url,
            env,
            skip,
            silent,
            skip_hash,
            ..BuildOptions::new(base_dir, dest_dir)
        };
        Ok(assets.into_iter().fold(options, BuildOptions::with_asset))
    }
}

/// Load and normalize a config file.
///
/// Relative paths resolve against the file's directory. Unknown fields
/// produce a warning, not an error.
pub fn load(path: &Path) -> Result<BuildOptions, ConfigError> {
    let path = normalize_path(path);
    let content = fs::read_to_string(&path).map_err(|err| ConfigError::Io(path.clone(), err))?;

    let (config, ignored) = KilnConfig::parse_with_ignored(&content)?;
    if !ignored.is_empty() {
        print_unknown_fields_warning(&ignored, &path);
    }

    let root = path.parent().map(Path::to_path_buf).unwrap_or_default();
    let mut options = config.into_options(&root)?;
    options.config_path = Some(path);
    Ok(options)
}

fn print_unknown_fields_warning(fields: &[String], path: &Path) {
    let display_path = path
        .file_name()
        .map(|n| n.to_string_lossy())
        .unwrap_or_else(|| path.to_string_lossy());
    log!("warning"; "unknown fields in {}, ignoring:", display_path);
    for field in fields {
        eprintln!("- {}", field);
    }
}

/// Find a config file by searching upward from the current directory.
pub fn find_config_file(config_name: &Path) -> Option<PathBuf> {
    if config_name.is_absolute() {
        return config_name.exists().then(|| config_name.to_path_buf());
    }

    let cwd = std::env::current_dir().ok()?;
    cwd.ancestors()
        .map(|dir| dir.join(config_name))
        .find(|candidate| candidate.exists())
}

fn normalize_asset(
    index: usize,
    decl: AssetDecl,
    base_dir: &Path,
    diag: &mut ConfigDiagnostics,
) -> Option<AssetDescriptor> {
    let field = |name: &str| format!("assets[{index}].{name}");

    if decl.name.trim().is_empty() {
        diag.error(field("name"), "must not be empty");
        return None;
    }

    let transform = || decl.transform.iter().cloned().map(transform_step).collect::<Vec<_>>();

    let source = match decl.kind {
        AssetKind::File => {
            if decl.files.is_empty() {
                diag.error(field("files"), "a file asset needs at least one glob");
                return None;
            }
            AssetSource::File {
                files: decl.files.clone(),
                transform: transform(),
            }
        }
        AssetKind::Folder => {
            let Some(folder) = &decl.folder else {
                diag.error_with_hint(
                    field("folder"),
                    "missing source directory",
                    "add `folder = \"<dir>\"`, relative to base_dir",
                );
                return None;
            };
            let include = if decl.include.is_empty() {
                vec!["*.*".to_string()]
            } else {
                decl.include.clone()
            };
            AssetSource::Folder {
                folder: resolve_against(base_dir, folder),
                include,
                exclude: decl.exclude.clone(),
            }
        }
        AssetKind::Bundle => AssetSource::Bundle {
            entries: decl
                .entries
                .iter()
                .map(|entry| resolve_against(base_dir, entry))
                .collect(),
            transform: transform(),
            require: decl
                .require
                .iter()
                .map(|require| match require {
                    RequireDecl::Expose(expose) => RequireSpec {
                        file: None,
                        expose: expose.clone(),
                    },
                    RequireDecl::Full { file, expose } => RequireSpec {
                        file: file.as_ref().map(|f| resolve_against(base_dir, f)),
                        expose: expose.clone(),
                    },
                })
                .collect(),
            external: decl
                .external
                .iter()
                .map(|external| match external {
                    ExternalDecl::Bundle(name) => ExternalSpec::Bundle(name.clone()),
                    ExternalDecl::Module(name) => ExternalSpec::Module(name.clone()),
                })
                .collect(),
        },
        AssetKind::Url => {
            let Some(url) = &decl.url else {
                diag.error(field("url"), "missing url");
                return None;
            };
            if let Err(err) = url::Url::parse(url) {
                diag.error_with_hint(
                    field("url"),
                    format!("invalid url `{url}`: {err}"),
                    "use an absolute URL such as `https://cdn.example/lib.js`",
                );
                return None;
            }
            AssetSource::Url(url.clone())
        }
        AssetKind::Package => AssetSource::Package(decl.assets.clone()),
    };

    let asset = AssetDescriptor::new(decl.name, source).with_watch(decl.watch);
    Some(match decl.skip_hash {
        Some(skip_hash) => asset.with_skip_hash(skip_hash),
        None => asset,
    })
}

fn transform_step(decl: TransformDecl) -> TransformStep {
    match decl {
        TransformDecl::Name(name) => TransformStep::named(name),
        TransformDecl::Full {
            name,
            options,
            args,
        } => TransformStep::Named {
            name,
            options,
            args,
        },
    }
}
