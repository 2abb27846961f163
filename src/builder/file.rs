//! File assets: globbed sources through a transform pipeline.

use std::fs;

use super::{BuildError, emit, is_binary_name};
use crate::asset::{AssetKind, collect_files};
use crate::session::BuildSession;
use crate::transform::{SourceFile, TransformContext, TransformStep, concat, run_pipeline};

/// Where a file asset's sources come from.
#[derive(Debug, Clone)]
pub enum FileInput<'a> {
    /// Globs relative to the base directory.
    Globs(&'a [String]),
    /// In-memory sources.
    Inline(Vec<SourceFile>),
}

/// Build one file asset.
///
/// Sources that match nothing produce no output and no entry. Text outputs
/// are concatenated into one file named after the asset; outputs with a
/// binary extension keep only the last file.
pub fn build_file(
    session: &BuildSession,
    name: &str,
    skip_hash: bool,
    input: FileInput<'_>,
    transform: &[TransformStep],
) -> Result<(), BuildError> {
    let options = session.options();
    let sources = match input {
        FileInput::Globs(globs) => read_sources(session, name, globs)?,
        FileInput::Inline(files) => files,
    };
    if sources.is_empty() {
        crate::debug!("file"; "{}: no sources matched", name);
        return Ok(());
    }

    let ctx = TransformContext {
        asset: name,
        env: &options.env,
        base_dir: &options.base_dir,
    };
    let outputs = run_pipeline(transform, sources, &ctx).map_err(|source| BuildError::Transform {
        asset: name.to_string(),
        source,
    })?;

    let output = if is_binary_name(name) {
        outputs.into_iter().last()
    } else {
        concat(outputs, name)
    };
    let Some(output) = output else {
        crate::debug!("file"; "{}: pipeline produced no output", name);
        return Ok(());
    };

    let entry = emit(session, AssetKind::File, name, skip_hash, &output.contents)?;
    session.store().add_asset(name, entry);
    Ok(())
}

fn read_sources(session: &BuildSession, name: &str, globs: &[String]) -> Result<Vec<SourceFile>, BuildError> {
    let options = session.options();
    let base_dir = &options.base_dir;
    let paths = collect_files(base_dir, globs, &options.dest_dir).map_err(|source| {
        BuildError::Pattern {
            asset: name.to_string(),
            source,
        }
    })?;

    paths
        .into_iter()
        .map(|path| -> Result<SourceFile, BuildError> {
            let contents = fs::read(&path).map_err(BuildError::io(name, &path))?;
            let relative = path.strip_prefix(base_dir).unwrap_or(&path).to_path_buf();
            Ok(SourceFile::new(relative, contents))
        })
        .collect()
}
