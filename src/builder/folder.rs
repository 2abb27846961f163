//! Folder assets: a directory tree copied as one hashed unit.

use std::fs;
use std::path::Path;

use super::BuildError;
use crate::asset::{AssetKind, PatternSet, walk_sorted};
use crate::hash::{ContentHasher, hashed_dir_name};
use crate::manifest::ManifestEntry;
use crate::session::BuildSession;
use crate::utils::path::display_relative;

/// Include pattern used when none is given.
pub const DEFAULT_INCLUDE: &str = "*.*";

/// Build one folder asset.
///
/// Members are copied into a staging directory next to the final output
/// while their bytes feed the hasher, in sorted traversal order. The staging
/// directory then replaces `name.<fingerprint>` (or `name`). A missing source
/// folder is not an error and produces no entry.
pub fn build_folder(
    session: &BuildSession,
    name: &str,
    skip_hash: bool,
    folder: &Path,
    include: &[String],
    exclude: &[String],
) -> Result<(), BuildError> {
    if !folder.is_dir() {
        crate::debug!("folder"; "{}: `{}` does not exist", name, folder.display());
        return Ok(());
    }

    let pattern_error = |source: ignore::Error| BuildError::Pattern {
        asset: name.to_string(),
        source,
    };
    let include = if include.is_empty() {
        PatternSet::new(folder, &[DEFAULT_INCLUDE.to_string()])
    } else {
        PatternSet::new(folder, include)
    }
    .map_err(pattern_error)?;
    let exclude = PatternSet::new(folder, exclude).map_err(pattern_error)?;

    let options = session.options();
    fs::create_dir_all(&options.dest_dir).map_err(BuildError::io(name, &options.dest_dir))?;
    let staging = tempfile::Builder::new()
        .prefix(".kiln-staging-")
        .tempdir_in(&options.dest_dir)
        .map_err(BuildError::io(name, &options.dest_dir))?;

    let mut hasher = ContentHasher::new();
    let mut copied = 0usize;
    for path in walk_sorted(folder, None) {
        if !include.is_match(&path) || exclude.is_match(&path) {
            continue;
        }
        let bytes = fs::read(&path).map_err(BuildError::io(name, &path))?;
        hasher.update(&bytes);

        let target = staging.path().join(path.strip_prefix(folder).unwrap_or(&path));
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(BuildError::io(name, parent))?;
        }
        fs::write(&target, &bytes).map_err(BuildError::io(name, &target))?;
        copied += 1;
    }

    let dir_name = if skip_hash {
        name.to_string()
    } else {
        hashed_dir_name(name, &hasher.fingerprint())
    };
    let final_dir = options.dest_dir.join(&dir_name);
    if final_dir.exists() {
        fs::remove_dir_all(&final_dir).map_err(BuildError::io(name, &final_dir))?;
    }
    if let Some(parent) = final_dir.parent() {
        fs::create_dir_all(parent).map_err(BuildError::io(name, parent))?;
    }

    let staged = staging.keep();
    if let Err(err) = fs::rename(&staged, &final_dir) {
        let _ = fs::remove_dir_all(&staged);
        return Err(BuildError::io(name, &final_dir)(err));
    }
    crate::debug!("folder"; "{}: {} files -> {}", name, copied, final_dir.display());

    session.store().add_asset(
        name,
        ManifestEntry::artifact(
            AssetKind::Folder,
            dir_name,
            display_relative(&options.base_dir, &final_dir),
        ),
    );
    Ok(())
}
