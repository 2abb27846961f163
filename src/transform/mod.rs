//! Content transform pipeline.
//!
//! A pipeline is an ordered list of [`TransformStep`]s applied left-to-right
//! to a set of [`SourceFile`]s. Named steps are looked up in a closed
//! registry ([`TransformKind`]); names that are not registered are skipped.
//!
//! ```text
//! files ──► sass ──► autoprefixer ──► clean-css ──► concat(app.css) ──► [app.css]
//! ```

mod builtin;
pub mod minify;

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;

/// A file flowing through a pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Path relative to the asset's source root, used for naming and logging.
    pub path: PathBuf,
    pub contents: Vec<u8>,
}

impl SourceFile {
    pub fn new(path: impl Into<PathBuf>, contents: impl Into<Vec<u8>>) -> Self {
        Self {
            path: path.into(),
            contents: contents.into(),
        }
    }

    /// Lowercased extension without the dot.
    pub fn extension(&self) -> Option<String> {
        extension_of(&self.path)
    }

    pub fn text(&self) -> Result<&str, TransformError> {
        std::str::from_utf8(&self.contents).map_err(|_| TransformError::NotText {
            path: self.path.clone(),
        })
    }
}

pub(crate) fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
}

/// Raw content-mapping function usable as a pipeline step.
pub type ContentFn = Arc<dyn Fn(Vec<u8>) -> anyhow::Result<Vec<u8>> + Send + Sync>;

/// One stage of a pipeline.
#[derive(Clone)]
pub enum TransformStep {
    /// Built-in transform looked up by registry key.
    Named {
        name: String,
        options: Value,
        args: Vec<Value>,
    },
    /// Caller-supplied content mapping, applied to every file.
    Func(ContentFn),
}

impl TransformStep {
    pub fn named(name: impl Into<String>) -> Self {
        Self::Named {
            name: name.into(),
            options: Value::Null,
            args: Vec::new(),
        }
    }

    pub fn func<F>(f: F) -> Self
    where
        F: Fn(Vec<u8>) -> anyhow::Result<Vec<u8>> + Send + Sync + 'static,
    {
        Self::Func(Arc::new(f))
    }
}

impl fmt::Debug for TransformStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Named {
                name,
                options,
                args,
            } => f
                .debug_struct("Named")
                .field("name", name)
                .field("options", options)
                .field("args", args)
                .finish(),
            Self::Func(_) => f.write_str("Func(..)"),
        }
    }
}

/// Registered built-in transforms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformKind {
    Concat,
    CleanCss,
    Autoprefixer,
    Sass,
    Uglify,
    Imagemin,
    Debug,
}

impl TransformKind {
    /// Look up a registry key. Unknown keys return `None`.
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "concat" => Self::Concat,
            "clean-css" => Self::CleanCss,
            "autoprefixer" => Self::Autoprefixer,
            "sass" | "node-sass" => Self::Sass,
            "uglify" => Self::Uglify,
            "imagemin" => Self::Imagemin,
            "debug" => Self::Debug,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Concat => "concat",
            Self::CleanCss => "clean-css",
            Self::Autoprefixer => "autoprefixer",
            Self::Sass => "sass",
            Self::Uglify => "uglify",
            Self::Imagemin => "imagemin",
            Self::Debug => "debug",
        }
    }

    /// Whether this transform runs under build environment `env`.
    ///
    /// Minifiers only run in `production`; `debug` runs everywhere else.
    pub fn runs_in(self, env: &str) -> bool {
        let production = env == PRODUCTION;
        match self {
            Self::Uglify | Self::Imagemin => production,
            Self::Debug => !production,
            _ => true,
        }
    }

    /// Per-file capability. `Concat` merges files and has none.
    pub fn capability(self) -> Option<&'static dyn Transform> {
        match self {
            Self::Concat => None,
            Self::CleanCss => Some(&builtin::CleanCss),
            Self::Autoprefixer => Some(&builtin::Autoprefixer),
            Self::Sass => Some(&builtin::Sass),
            Self::Uglify => Some(&builtin::Uglify),
            Self::Imagemin => Some(&builtin::Imagemin),
            Self::Debug => Some(&builtin::DebugLog),
        }
    }
}

/// Environment name that enables minification.
pub const PRODUCTION: &str = "production";

/// Per-asset information available to every transform.
#[derive(Debug, Clone, Copy)]
pub struct TransformContext<'a> {
    /// Declared asset name, also the concat output name.
    pub asset: &'a str,
    /// Build environment, e.g. `development` or `production`.
    pub env: &'a str,
    pub base_dir: &'a Path,
}

/// A content transform capability: `(file, options, context) -> file`.
pub trait Transform: Send + Sync {
    fn apply(
        &self,
        file: SourceFile,
        options: &Value,
        ctx: &TransformContext<'_>,
    ) -> Result<SourceFile, TransformError>;
}

#[derive(Debug, Error)]
pub enum TransformError {
    #[error("{transform} failed on `{path}`: {message}")]
    Failed {
        transform: &'static str,
        path: PathBuf,
        message: String,
    },

    #[error("`{path}` is not valid UTF-8")]
    NotText { path: PathBuf },

    #[error("`{0}` not found in PATH")]
    MissingTool(&'static str),

    #[error("transform function failed on `{path}`")]
    Func {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },
}

/// Apply every step in order.
pub fn run_pipeline(
    steps: &[TransformStep],
    mut files: Vec<SourceFile>,
    ctx: &TransformContext<'_>,
) -> Result<Vec<SourceFile>, TransformError> {
    for step in steps {
        files = match step {
            TransformStep::Func(f) => files
                .into_iter()
                .map(|file| apply_func(f, file))
                .collect::<Result<_, _>>()?,
            TransformStep::Named { name, options, .. } => {
                let Some(kind) = TransformKind::from_name(name) else {
                    crate::debug!("transform"; "{}: skipping unknown transform `{}`", ctx.asset, name);
                    continue;
                };
                if !kind.runs_in(ctx.env) {
                    crate::debug!("transform"; "{}: `{}` disabled in {}", ctx.asset, kind.name(), ctx.env);
                    continue;
                }
                match kind.capability() {
                    Some(transform) => files
                        .into_iter()
                        .map(|file| transform.apply(file, options, ctx))
                        .collect::<Result<_, _>>()?,
                    // `concat` always targets the asset's own name, never user args.
                    None => concat(files, ctx.asset).into_iter().collect(),
                }
            }
        };
    }
    Ok(files)
}

/// Apply only per-file steps, used for bundle modules where merging is
/// the bundler's job.
pub fn run_module_pipeline(
    steps: &[TransformStep],
    file: SourceFile,
    ctx: &TransformContext<'_>,
) -> Result<SourceFile, TransformError> {
    let mut file = file;
    for step in steps {
        file = match step {
            TransformStep::Func(f) => apply_func(f, file)?,
            TransformStep::Named { name, options, .. } => {
                let enabled = TransformKind::from_name(name).filter(|kind| kind.runs_in(ctx.env));
                match enabled.and_then(TransformKind::capability) {
                    Some(transform) => transform.apply(file, options, ctx)?,
                    None => {
                        crate::debug!("transform"; "{}: `{}` skipped for module", ctx.asset, name);
                        file
                    }
                }
            }
        };
    }
    Ok(file)
}

fn apply_func(f: &ContentFn, file: SourceFile) -> Result<SourceFile, TransformError> {
    let SourceFile { path, contents } = file;
    match f(contents) {
        Ok(contents) => Ok(SourceFile { path, contents }),
        Err(source) => Err(TransformError::Func { path, source }),
    }
}

/// Join every file with `\n` into one file named `name`.
///
/// Returns `None` for an empty input so an empty glob produces no output.
pub fn concat(files: Vec<SourceFile>, name: &str) -> Option<SourceFile> {
    if files.is_empty() {
        return None;
    }
    let mut contents = Vec::with_capacity(files.iter().map(|f| f.contents.len() + 1).sum());
    for (i, file) in files.into_iter().enumerate() {
        if i > 0 {
            contents.push(b'\n');
        }
        contents.extend(file.contents);
    }
    Some(SourceFile::new(name, contents))
}
