//! Per-type asset builders and the concurrent build orchestrator.
//!
//! ```text
//! build_all ──► spawn_blocking(build_asset) × N ──► mpsc ──► first error | all done
//!                    │
//!                    ├─ file    globs → pipeline → concat/rename → hash → write
//!                    ├─ folder  walk → stage + hash → rename into place
//!                    ├─ bundle  externals → bundler → hash → write
//!                    ├─ url     entry only
//!                    └─ package entry only
//! ```
//!
//! Every builder registers its manifest entry itself, as soon as it is done.

pub mod bundle;
pub mod file;
pub mod folder;


use std::error::Error as _;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::sync::mpsc;

use crate::asset::{AssetDescriptor, AssetKind, AssetSource, should_skip_hash};
use crate::bundler::{BundleError, ExposedModule, ModuleSource};
use crate::hash::{fingerprint, hashed_file_name};
use crate::logger::ProgressLine;
use crate::manifest::ManifestEntry;
use crate::session::BuildSession;
use crate::transform::TransformError;
use crate::utils::path::display_relative;

pub use bundle::BundleInput;
pub use file::FileInput;

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("{asset}: cannot access `{}`", .path.display())]
    Io {
        asset: String,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{asset}: bundling failed")]
    Bundle {
        asset: String,
        #[source]
        source: BundleError,
    },

    #[error("{asset}: transform failed")]
    Transform {
        asset: String,
        #[source]
        source: TransformError,
    },

    #[error("{asset}: invalid glob pattern")]
    Pattern {
        asset: String,
        #[source]
        source: ignore::Error,
    },

    #[error("unknown asset `{0}`")]
    UnknownAsset(String),

    #[error("cannot write manifest `{}`", .path.display())]
    Manifest {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("build task panicked")]
    Panicked,
}

impl BuildError {
    pub(crate) fn io(asset: &str, path: &Path) -> impl FnOnce(io::Error) -> Self {
        let asset = asset.to_string();
        let path = path.to_path_buf();
        move |source| Self::Io {
            asset,
            path,
            source,
        }
    }

    /// Asset the error belongs to, if any.
    pub fn asset(&self) -> Option<&str> {
        match self {
            Self::Io { asset, .. }
            | Self::Bundle { asset, .. }
            | Self::Transform { asset, .. }
            | Self::Pattern { asset, .. } => Some(asset),
            Self::UnknownAsset(name) => Some(name),
            Self::Manifest { .. } | Self::Panicked => None,
        }
    }

    /// The message followed by every underlying cause, one per line.
    pub fn detail(&self) -> String {
        let mut out = self.to_string();
        let mut source = self.source();
        while let Some(cause) = source {
            out.push_str("\n  caused by: ");
            out.push_str(&cause.to_string());
            source = cause.source();
        }
        out
    }
}

/// Output extensions that are renamed instead of concatenated.
pub const BINARY_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "gif", "ico", "webp", "bmp", "avif", "woff", "woff2", "ttf", "otf", "eot",
];

pub fn is_binary_name(name: &str) -> bool {
    crate::transform::extension_of(Path::new(name))
        .is_some_and(|ext| BINARY_EXTENSIONS.contains(&ext.as_str()))
}

/// Decide whether `name` is built and whether its output is hashed.
///
/// Returns `None` for names in the skip list; their existing manifest entry
/// stays as it is.
pub fn plan(session: &BuildSession, name: &str, asset_skip_hash: Option<bool>) -> Option<bool> {
    let options = session.options();
    if options.is_skipped(name) {
        crate::debug!("build"; "{}: in skip list", name);
        return None;
    }
    Some(should_skip_hash(options.skip_hash, asset_skip_hash))
}

/// Build one declared asset.
pub fn build_asset(session: &BuildSession, asset: &AssetDescriptor) -> Result<(), BuildError> {
    let Some(skip_hash) = plan(session, &asset.name, asset.skip_hash) else {
        return Ok(());
    };
    let name = asset.name.as_str();

    match &asset.source {
        AssetSource::File { files, transform } => {
            file::build_file(session, name, skip_hash, FileInput::Globs(files), transform)
        }
        AssetSource::Folder {
            folder,
            include,
            exclude,
        } => folder::build_folder(session, name, skip_hash, folder, include, exclude),
        AssetSource::Bundle {
            entries,
            transform,
            require,
            external,
        } => {
            let input = BundleInput {
                entries: entries.iter().cloned().map(ModuleSource::File).collect(),
                require: require
                    .iter()
                    .map(|spec| ExposedModule {
                        source: spec.file.clone().map(ModuleSource::File),
                        expose: spec.expose.clone(),
                    })
                    .collect(),
                external,
                transform,
            };
            bundle::build_bundle(session, name, skip_hash, input)
        }
        AssetSource::Url(url) => {
            session.store().add_asset(name, ManifestEntry::url(url.clone()));
            Ok(())
        }
        AssetSource::Package(members) => {
            session
                .store()
                .add_asset(name, ManifestEntry::package(members.clone()));
            Ok(())
        }
    }
}

/// Build the declared asset named `name`.
///
/// With duplicate names, the last declaration is built.
pub fn build_named(session: &BuildSession, name: &str) -> Result<(), BuildError> {
    let asset = session
        .options()
        .find_asset(name)
        .ok_or_else(|| BuildError::UnknownAsset(name.to_string()))?;
    build_asset(session, asset)
}

/// Build every declared asset concurrently.
///
/// Returns once all builders succeeded, or as soon as the first one fails.
/// Builders still running at that point are not cancelled: they finish in
/// the background and may register entries afterwards.
pub async fn build_all(session: &BuildSession) -> Result<(), BuildError> {
    let assets = &session.options().assets;
    if assets.is_empty() {
        return Ok(());
    }

    let kinds = [
        AssetKind::File,
        AssetKind::Folder,
        AssetKind::Bundle,
        AssetKind::Url,
        AssetKind::Package,
    ];
    let counts: Vec<_> = kinds
        .iter()
        .map(|kind| (kind.label(), assets.iter().filter(|a| a.kind() == *kind).count()))
        .collect();
    let progress = ProgressLine::new(&counts);

    let (tx, mut rx) = mpsc::unbounded_channel();
    for asset in assets.iter().cloned() {
        let session = session.clone();
        let tx = tx.clone();
        tokio::task::spawn_blocking(move || {
            let result = build_asset(&session, &asset);
            if let Err(err) = &result {
                crate::log!("error"; "{}", err.detail());
            }
            // The receiver is gone once an earlier error was reported.
            let _ = tx.send((asset.kind(), result));
        });
    }
    drop(tx);

    let mut remaining = assets.len();
    while remaining > 0 {
        match rx.recv().await {
            Some((kind, Ok(()))) => {
                progress.inc(kind.label());
                remaining -= 1;
            }
            Some((_, Err(err))) => return Err(err),
            // Every sender dropped without reporting: a builder panicked.
            None => return Err(BuildError::Panicked),
        }
    }
    progress.finish();
    Ok(())
}

/// Write a single output file, hashed unless `skip_hash`, and describe it.
pub(crate) fn emit(
    session: &BuildSession,
    kind: AssetKind,
    name: &str,
    skip_hash: bool,
    contents: &[u8],
) -> Result<ManifestEntry, BuildError> {
    let options = session.options();
    let file_name = if skip_hash {
        name.to_string()
    } else {
        hashed_file_name(name, &fingerprint(contents))
    };

    let path = options.dest_dir.join(&file_name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(BuildError::io(name, parent))?;
    }
    fs::write(&path, contents).map_err(BuildError::io(name, &path))?;
    crate::debug!("build"; "{} -> {}", name, path.display());

    Ok(ManifestEntry::artifact(
        kind,
        file_name,
        display_relative(&options.base_dir, &path),
    ))
}
