//! Bundle assets: modules combined by the session's bundler.

use super::{BuildError, emit};
use crate::asset::{AssetKind, ExternalSpec};
use crate::bundler::{BundleRequest, ExposedModule, ModuleSource};
use crate::session::BuildSession;
use crate::transform::{TransformContext, TransformStep};

/// Modules and settings for one bundle.
#[derive(Debug, Clone)]
pub struct BundleInput<'a> {
    /// Entry modules; empty for a bundle made only of exposed modules.
    pub entries: Vec<ModuleSource>,
    pub require: Vec<ExposedModule>,
    pub external: &'a [ExternalSpec],
    pub transform: &'a [TransformStep],
}

/// Build one bundle asset.
///
/// Bundler failures are returned to the caller; they only end this asset's
/// build.
pub fn build_bundle(
    session: &BuildSession,
    name: &str,
    skip_hash: bool,
    input: BundleInput<'_>,
) -> Result<(), BuildError> {
    let options = session.options();
    let request = BundleRequest {
        entries: input.entries,
        require: input.require,
        exclude: resolve_externals(session, name, input.external),
        transform: input.transform,
        ctx: TransformContext {
            asset: name,
            env: &options.env,
            base_dir: &options.base_dir,
        },
    };

    let code = session
        .bundler()
        .bundle(&request)
        .map_err(|source| BuildError::Bundle {
            asset: name.to_string(),
            source,
        })?;

    let entry = emit(session, AssetKind::Bundle, name, skip_hash, code.as_bytes())?;
    session.store().add_asset(name, entry);
    Ok(())
}

/// Module ids this bundle leaves to others.
///
/// `{bundle = X}` contributes the names X itself exposes; X's own externals
/// are not followed.
pub fn resolve_externals(session: &BuildSession, name: &str, external: &[ExternalSpec]) -> Vec<String> {
    let mut exclude: Vec<String> = Vec::new();
    let mut push = |id: &str| {
        if !exclude.iter().any(|e| e == id) {
            exclude.push(id.to_string());
        }
    };

    for spec in external {
        match spec {
            ExternalSpec::Module(module) => push(module),
            ExternalSpec::Bundle(sibling) => match session.options().find_asset(sibling) {
                Some(asset) if asset.kind() == AssetKind::Bundle => {
                    asset.exposed_names().for_each(&mut push);
                }
                _ => crate::debug!("bundle"; "{}: external bundle `{}` is not declared", name, sibling),
            },
        }
    }
    exclude
}
