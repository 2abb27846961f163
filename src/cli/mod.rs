//! Command-line interface module.

mod args;
pub mod build;
pub mod watch;

pub use args::{Cli, Commands};

use std::sync::LazyLock;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result, anyhow};
use tokio::sync::Notify;

use crate::config::{self, BuildOptions};

/// Set once Ctrl+C was received.
static SHUTDOWN: AtomicBool = AtomicBool::new(false);

/// Wakes the watch loop on Ctrl+C.
static SHUTDOWN_SIGNAL: LazyLock<Notify> = LazyLock::new(Notify::new);

/// Setup the global Ctrl+C handler. Call once at program start.
///
/// With `graceful`, the first Ctrl+C only wakes [`shutdown_requested`] and a
/// second one exits. Otherwise the process exits immediately.
pub fn setup_shutdown_handler(graceful: bool) -> Result<()> {
    ctrlc::set_handler(move || {
        if !graceful || SHUTDOWN.swap(true, Ordering::SeqCst) {
            std::process::exit(130);
        }
        SHUTDOWN_SIGNAL.notify_one();
    })
    .map_err(|e| anyhow!("failed to set Ctrl+C handler: {}", e))
}

pub fn is_shutdown() -> bool {
    SHUTDOWN.load(Ordering::Relaxed)
}

/// Resolves once Ctrl+C was received.
pub async fn shutdown_requested() {
    if !is_shutdown() {
        SHUTDOWN_SIGNAL.notified().await;
    }
}

/// Locate and load the config file, then apply command-line overrides.
pub fn load_options(cli: &Cli) -> Result<BuildOptions> {
    let path = config::find_config_file(&cli.config)
        .with_context(|| format!("config file `{}` not found", cli.config.display()))?;
    let mut options =
        config::load(&path).with_context(|| format!("failed to load `{}`", path.display()))?;
    cli.apply(&mut options);
    crate::logger::set_silent(options.silent);
    Ok(options)
}
