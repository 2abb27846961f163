//! Script bundling.
//!
//! A [`Bundler`] turns entry modules and require-and-expose modules into one
//! script. [`ModuleBundler`] is the built-in implementation: it wraps every
//! module in a `define(id, factory)` call inside a small registry prelude and
//! does not follow `require` calls itself.
//!
//! Registries chain through `window.__kiln_require`: a module id that is not
//! defined in the current bundle (or is listed as external) is resolved by the
//! bundle loaded before it. This is how one bundle shares the modules another
//! exposes.

use std::fmt::Write as _;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::embed::bundle::{PRELUDE_JS, PreludeVars};
use crate::transform::{SourceFile, TransformContext, TransformError, TransformStep, run_module_pipeline};

/// A module handed to the bundler.
#[derive(Debug, Clone)]
pub enum ModuleSource {
    /// Read from disk when bundled.
    File(PathBuf),
    /// Already in memory, e.g. an embedded module.
    Inline(SourceFile),
}

impl ModuleSource {
    pub fn path(&self) -> &Path {
        match self {
            Self::File(path) => path,
            Self::Inline(file) => &file.path,
        }
    }

    fn load(&self) -> Result<SourceFile, BundleError> {
        match self {
            Self::File(path) => fs::read(path)
                .map(|contents| SourceFile::new(path.clone(), contents))
                .map_err(|source| BundleError::Read {
                    path: path.clone(),
                    source,
                }),
            Self::Inline(file) => Ok(file.clone()),
        }
    }
}

/// A module registered under a public id.
#[derive(Debug, Clone)]
pub struct ExposedModule {
    /// `None` resolves `expose` relative to the base directory.
    pub source: Option<ModuleSource>,
    pub expose: String,
}

/// Everything needed to produce one bundle.
#[derive(Debug, Clone)]
pub struct BundleRequest<'a> {
    pub entries: Vec<ModuleSource>,
    pub require: Vec<ExposedModule>,
    /// Module ids left to previously loaded bundles.
    pub exclude: Vec<String>,
    /// Per-module transforms, applied before wrapping.
    pub transform: &'a [TransformStep],
    pub ctx: TransformContext<'a>,
}

#[derive(Debug, Error)]
pub enum BundleError {
    #[error("failed to read module `{path}`")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot find module `{name}` under `{base}`")]
    ModuleNotFound { name: String, base: PathBuf },

    #[error(transparent)]
    Transform(#[from] TransformError),
}

/// Module bundling capability.
pub trait Bundler: Send + Sync {
    fn bundle(&self, request: &BundleRequest<'_>) -> Result<String, BundleError>;
}

/// Built-in CommonJS-style registry bundler.
#[derive(Debug, Clone, Copy, Default)]
pub struct ModuleBundler;

impl Bundler for ModuleBundler {
    fn bundle(&self, request: &BundleRequest<'_>) -> Result<String, BundleError> {
        let ctx = &request.ctx;
        let mut body = String::new();

        for exposed in &request.require {
            if request.exclude.contains(&exposed.expose) {
                crate::debug!("bundle"; "{}: `{}` is external, not bundled", ctx.asset, exposed.expose);
                continue;
            }
            let source = match &exposed.source {
                Some(source) => source.clone(),
                None => ModuleSource::File(resolve_bare(&exposed.expose, ctx.base_dir)?),
            };
            define(&mut body, &exposed.expose, source, request)?;
        }

        let mut entry_ids = Vec::with_capacity(request.entries.len());
        for entry in &request.entries {
            let id = module_id(entry.path(), ctx.base_dir);
            define(&mut body, &id, entry.clone(), request)?;
            entry_ids.push(id);
        }
        for id in entry_ids {
            let _ = writeln!(body, "require({});", quote(&id));
        }

        Ok(PRELUDE_JS.render(&PreludeVars {
            externals: &request.exclude,
            body: &body,
        }))
    }
}

fn define(
    body: &mut String,
    id: &str,
    source: ModuleSource,
    request: &BundleRequest<'_>,
) -> Result<(), BundleError> {
    let file = run_module_pipeline(request.transform, source.load()?, &request.ctx)?;
    let code = file.text()?;
    let _ = writeln!(
        body,
        "define({}, function (require, module, exports) {{\n{}\n}});",
        quote(id),
        code
    );
    Ok(())
}

/// Id of an entry module: its path relative to the base directory.
fn module_id(path: &Path, base_dir: &Path) -> String {
    let relative = path.strip_prefix(base_dir).unwrap_or(path);
    format!("./{}", relative.to_string_lossy().replace('\\', "/"))
}

fn quote(id: &str) -> String {
    serde_json::to_string(id).unwrap_or_else(|_| format!("\"{id}\""))
}

/// Locate a module exposed without an explicit file.
///
/// Tries `<base>/<name>`, then `<base>/<name>.js`, then `<base>/<name>/index.js`.
fn resolve_bare(name: &str, base_dir: &Path) -> Result<PathBuf, BundleError> {
    let direct = base_dir.join(name);
    let mut with_js = direct.clone().into_os_string();
    with_js.push(".js");
    [direct.clone(), PathBuf::from(with_js), direct.join("index.js")]
    .into_iter()
    .find(|candidate| candidate.is_file())
    .ok_or_else(|| BundleError::ModuleNotFound {
        name: name.to_string(),
        base: base_dir.to_path_buf(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn request<'a>(base_dir: &'a Path, transform: &'a [TransformStep]) -> BundleRequest<'a> {
        BundleRequest {
            entries: Vec::new(),
            require: Vec::new(),
            exclude: Vec::new(),
            transform,
            ctx: TransformContext {
                asset: "app.js",
                env: "development",
                base_dir,
            },
        }
    }

    #[test]
    fn test_entries_are_defined_and_required() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("main.js"), "console.log('hi');").unwrap();

        let mut req = request(dir.path(), &[]);
        req.entries.push(ModuleSource::File(dir.path().join("main.js")));
        let js = ModuleBundler.bundle(&req).unwrap();

        assert!(js.contains(r#"define("./main.js", function (require, module, exports) {"#));
        assert!(js.contains("console.log('hi');"));
        assert!(js.contains(r#"require("./main.js");"#));
    }

    #[test]
    fn test_require_only_bundle() {
        let dir = TempDir::new().unwrap();
        let mut req = request(dir.path(), &[]);
        req.require.push(ExposedModule {
            source: Some(ModuleSource::Inline(SourceFile::new("kiln.js", "module.exports = 1;"))),
            expose: "kiln".into(),
        });
        let js = ModuleBundler.bundle(&req).unwrap();
        assert!(js.contains(r#"define("kiln""#));
        assert!(!js.contains("require(\"kiln\");"));
    }

    #[test]
    fn test_excluded_require_is_not_bundled() {
        let dir = TempDir::new().unwrap();
        let mut req = request(dir.path(), &[]);
        req.require.push(ExposedModule {
            source: Some(ModuleSource::Inline(SourceFile::new("lib.js", "SHARED_LIB"))),
            expose: "lib".into(),
        });
        req.exclude.push("lib".into());
        let js = ModuleBundler.bundle(&req).unwrap();
        assert!(!js.contains("SHARED_LIB"));
        assert!(js.contains(r#"var external = ["lib"];"#));
    }

    #[test]
    fn test_bare_require_resolution() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("widgets")).unwrap();
        fs::write(dir.path().join("widgets/index.js"), "WIDGETS").unwrap();

        let mut req = request(dir.path(), &[]);
        req.require.push(ExposedModule {
            source: None,
            expose: "widgets".into(),
        });
        assert!(ModuleBundler.bundle(&req).unwrap().contains("WIDGETS"));

        req.require[0].expose = "missing".into();
        assert!(matches!(
            ModuleBundler.bundle(&req),
            Err(BundleError::ModuleNotFound { .. })
        ));
    }

    #[test]
    fn test_missing_entry_is_an_error() {
        let dir = TempDir::new().unwrap();
        let mut req = request(dir.path(), &[]);
        req.entries.push(ModuleSource::File(dir.path().join("nope.js")));
        assert!(matches!(ModuleBundler.bundle(&req), Err(BundleError::Read { .. })));
    }

    #[test]
    fn test_module_transforms_apply() {
        let dir = TempDir::new().unwrap();
        let steps = [TransformStep::func(|c| Ok(String::from_utf8(c)?.to_uppercase().into_bytes()))];
        let mut req = request(dir.path(), &steps);
        req.require.push(ExposedModule {
            source: Some(ModuleSource::Inline(SourceFile::new("a.js", "shout"))),
            expose: "a".into(),
        });
        assert!(ModuleBundler.bundle(&req).unwrap().contains("SHOUT"));
    }
}
