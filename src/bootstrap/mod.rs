//! Bootstrap assets.
//!
//! Rebuilt after every full build and every watch rebuild, in this order:
//!
//! 1. package `kiln` = `["kiln.runtime.js", "kiln.loader.js"]`
//! 2. bundle `kiln.runtime.js`: the client runtime, exposed as `kiln`
//! 3. file `kiln.loader.js`: the loader with the manifest embedded
//!
//! The loader's payload is taken from a snapshot of the manifest at step 3,
//! with the loader and package entries removed from the copy afterwards.

use serde::Serialize;

use crate::builder::{self, BuildError, BundleInput, FileInput};
use crate::bundler::{ExposedModule, ModuleSource};
use crate::embed::TemplateVars;
use crate::embed::bootstrap::{LOADER_JS, LoaderVars, RUNTIME_JS};
use crate::manifest::{Manifest, ManifestEntry};
use crate::session::BuildSession;
use crate::transform::{SourceFile, TransformStep};

pub const PACKAGE_NAME: &str = "kiln";
pub const RUNTIME_NAME: &str = "kiln.runtime.js";
pub const LOADER_NAME: &str = "kiln.loader.js";
/// Module id under which the runtime is exposed.
pub const RUNTIME_MODULE: &str = "kiln";

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Serialize)]
struct Payload<'a> {
    version: &'a str,
    manifest: &'a Manifest,
}

/// Serialize `{version, manifest}` for the loader.
///
/// `snapshot` is cloned first, then the loader and package entries are
/// removed from the clone.
pub fn bootstrap_payload(snapshot: &Manifest) -> serde_json::Result<String> {
    let mut manifest = snapshot.clone();
    manifest.assets.remove(LOADER_NAME);
    manifest.assets.remove(PACKAGE_NAME);
    serde_json::to_string(&Payload {
        version: VERSION,
        manifest: &manifest,
    })
}

/// Run the three bootstrap steps against the session's manifest.
///
/// Each step honours the skip list and the hashing policy like any asset.
/// A failed runtime bundle still lets the loader refresh its payload; the
/// first error is returned afterwards.
pub fn build_bootstrap(session: &BuildSession) -> Result<(), BuildError> {
    let mut first_error = None;

    if builder::plan(session, PACKAGE_NAME, None).is_some() {
        session.store().add_asset(
            PACKAGE_NAME,
            ManifestEntry::package(vec![RUNTIME_NAME.to_string(), LOADER_NAME.to_string()]),
        );
    }

    if let Some(skip_hash) = builder::plan(session, RUNTIME_NAME, None) {
        let runtime = ExposedModule {
            source: Some(ModuleSource::Inline(SourceFile::new("kiln/runtime.js", RUNTIME_JS))),
            expose: RUNTIME_MODULE.to_string(),
        };
        let input = BundleInput {
            entries: Vec::new(),
            require: vec![runtime],
            external: &[],
            transform: &[TransformStep::named("uglify")],
        };
        if let Err(err) = builder::bundle::build_bundle(session, RUNTIME_NAME, skip_hash, input) {
            first_error.get_or_insert(err);
        }
    }

    if let Some(skip_hash) = builder::plan(session, LOADER_NAME, None) {
        let store = session.store().clone();
        let embed = TransformStep::func(move |contents| {
            let template = String::from_utf8(contents)?;
            let payload = bootstrap_payload(&store.snapshot())?;
            Ok(LoaderVars { payload: &payload }.apply(&template).into_bytes())
        });
        let source = SourceFile::new("kiln/loader.js", LOADER_JS.content());
        let built = builder::file::build_file(
            session,
            LOADER_NAME,
            skip_hash,
            FileInput::Inline(vec![source]),
            &[embed, TransformStep::named("uglify")],
        );
        if let Err(err) = built {
            first_error.get_or_insert(err);
        }
    }

    crate::debug!("bootstrap"; "{} entries in manifest", session.store().len());
    first_error.map_or(Ok(()), Err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundler::{BundleError, BundleRequest, Bundler};
    use crate::config::BuildOptions;
    use crate::manifest::EntryValue;
    use std::fs;
    use std::path::PathBuf;
    use std::sync::Arc;
    use tempfile::TempDir;

    struct RejectingBundler;

    impl Bundler for RejectingBundler {
        fn bundle(&self, request: &BundleRequest<'_>) -> Result<String, BundleError> {
            Err(BundleError::ModuleNotFound {
                name: request.ctx.asset.to_string(),
                base: PathBuf::from("/"),
            })
        }
    }

    fn session(dir: &TempDir) -> BuildSession {
        let mut options = BuildOptions::new(dir.path(), dir.path().join("dist"));
        options.skip_hash = Some(true);
        BuildSession::new(options)
    }

    #[test]
    fn test_payload_strips_self_references() {
        let mut manifest = Manifest::new("site", "/");
        manifest.assets.insert("app.js".into(), ManifestEntry::url("https://cdn.example/app.js"));
        manifest.assets.insert(LOADER_NAME.into(), ManifestEntry::url("loader"));
        manifest.assets.insert(PACKAGE_NAME.into(), ManifestEntry::package(vec![]));
        manifest.assets.insert(RUNTIME_NAME.into(), ManifestEntry::url("runtime"));

        let payload: serde_json::Value = serde_json::from_str(&bootstrap_payload(&manifest).unwrap()).unwrap();
        let assets = payload["manifest"]["assets"].as_object().unwrap();
        assert!(assets.contains_key("app.js"));
        assert!(assets.contains_key(RUNTIME_NAME));
        assert!(!assets.contains_key(LOADER_NAME));
        assert!(!assets.contains_key(PACKAGE_NAME));
        assert_eq!(payload["version"], VERSION);

        // The input snapshot is left intact.
        assert!(manifest.assets.contains_key(LOADER_NAME));
    }

    #[test]
    fn test_bootstrap_registers_three_entries() {
        let dir = TempDir::new().unwrap();
        let session = session(&dir);
        build_bootstrap(&session).unwrap();

        let manifest = session.store().snapshot();
        assert_eq!(
            manifest.assets[PACKAGE_NAME].value,
            EntryValue::List(vec![RUNTIME_NAME.into(), LOADER_NAME.into()])
        );
        assert!(dir.path().join("dist").join(RUNTIME_NAME).is_file());
        assert!(dir.path().join("dist").join(LOADER_NAME).is_file());
    }

    #[test]
    fn test_loader_embeds_manifest_without_itself() {
        let dir = TempDir::new().unwrap();
        let session = session(&dir);
        session
            .store()
            .add_asset("cdn", ManifestEntry::url("https://cdn.example/lib.js"));

        // Run twice so the loader and package entries exist before the snapshot.
        build_bootstrap(&session).unwrap();
        build_bootstrap(&session).unwrap();

        let loader = fs::read_to_string(dir.path().join("dist").join(LOADER_NAME)).unwrap();
        assert!(loader.contains("https://cdn.example/lib.js"));
        assert!(loader.contains(RUNTIME_NAME));
        assert!(!loader.contains(LOADER_NAME));
        assert!(!loader.contains("__KILN_BOOTSTRAP__"));
        assert!(session.store().get(LOADER_NAME).is_some());
    }

    #[test]
    fn test_runtime_failure_still_refreshes_loader() {
        let dir = TempDir::new().unwrap();
        let mut options = BuildOptions::new(dir.path(), dir.path().join("dist"));
        options.skip_hash = Some(true);
        let session = BuildSession::with_bundler(options, Arc::new(RejectingBundler));
        session
            .store()
            .add_asset("cdn", ManifestEntry::url("https://cdn.example/fresh.js"));

        let err = build_bootstrap(&session).unwrap_err();
        assert!(matches!(err, BuildError::Bundle { ref asset, .. } if asset == RUNTIME_NAME));
        assert!(session.store().get(RUNTIME_NAME).is_none());

        let loader = fs::read_to_string(dir.path().join("dist").join(LOADER_NAME)).unwrap();
        assert!(loader.contains("https://cdn.example/fresh.js"));
    }

    #[test]
    fn test_skip_list_applies_to_bootstrap() {
        let dir = TempDir::new().unwrap();
        let mut options = BuildOptions::new(dir.path(), dir.path().join("dist"));
        options.skip = vec![RUNTIME_NAME.into()];
        let session = BuildSession::new(options);
        build_bootstrap(&session).unwrap();

        assert!(session.store().get(RUNTIME_NAME).is_none());
        assert!(session.store().get(LOADER_NAME).is_some());
    }
}
