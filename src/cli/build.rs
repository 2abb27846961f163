//! `kiln build`: one full pass.

use anyhow::{Result, bail};

use crate::config::BuildOptions;
use crate::log;
use crate::session::{self, BuildReport, BuildSession};
use crate::utils::path::display_relative;

/// Build every asset, the bootstrap and the manifest.
///
/// Fails when the report carries an error; the error itself is already
/// logged by then.
pub async fn build_assets(options: BuildOptions) -> Result<()> {
    let session = session::install(BuildSession::new(options));
    let report = session.build().await;
    log_report(&report);

    if let Some(err) = report.error {
        bail!(err);
    }
    Ok(())
}

pub fn log_report(report: &BuildReport) {
    let options = &report.config;
    let manifest_path = options.dest_dir.join(crate::manifest::MANIFEST_FILE);
    let count = report.manifest.assets.len();
    let noun = if count == 1 { "entry" } else { "entries" };

    if report.is_ok() {
        log!(
            "build";
            "{} {} -> {}",
            count,
            noun,
            display_relative(&options.base_dir, &manifest_path)
        );
    } else {
        log!("build"; "finished with errors, {} {} written", count, noun);
    }
}
