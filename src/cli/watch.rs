//! `kiln watch`: full build, then per-asset rebuilds on change.
//!
//! The config file is watched too. Any change to it loads fresh options,
//! installs a new session with an empty manifest, runs a full build and
//! restarts the asset watchers. A config that fails to load, or whose
//! watchers cannot start, keeps the previous session running.

use std::path::Path;

use anyhow::{Context, Result};
use notify::{RecursiveMode, Watcher};
use tokio::sync::mpsc;

use super::Cli;
use crate::config::BuildOptions;
use crate::log;
use crate::logger::{status_error, status_pending, status_success, status_warning};
use crate::session::{self, BuildSession};
use crate::watch::{ChangeKind, WatchCallbacks, WatchSession};

pub async fn watch_assets(cli: &Cli, options: BuildOptions) -> Result<()> {
    let config_path = options.config_path.clone();
    let mut watch = start(options).await?;

    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut config_watcher = notify::recommended_watcher(move |res| {
        let _ = tx.send(res);
    })
    .context("failed to create config watcher")?;
    if let Some(dir) = config_path.as_deref().and_then(Path::parent) {
        config_watcher
            .watch(dir, RecursiveMode::NonRecursive)
            .with_context(|| format!("failed to watch `{}`", dir.display()))?;
    }

    log_watched(&watch);

    loop {
        tokio::select! {
            () = super::shutdown_requested() => break,
            received = rx.recv() => match received {
                Some(Ok(event)) => {
                    if !touches_config(&event, config_path.as_deref()) {
                        continue;
                    }
                    status_pending("config changed, reloading");
                    let reloaded = match super::load_options(cli) {
                        Ok(options) => reload(&mut watch, options).await,
                        Err(err) => Err(err),
                    };
                    if let Err(err) = reloaded {
                        status_error("config reload failed", &format!("{err:#}"));
                    }
                }
                Some(Err(err)) => status_warning(&format!("config watcher error: {err}")),
                None => break,
            },
        }
    }

    log!("watch"; "stopped");
    Ok(())
}

/// Swap in a session for `options`.
///
/// The old watchers keep running until the new ones started. On failure the
/// previous session is reinstated and `watch` is left untouched.
async fn reload(watch: &mut WatchSession, options: BuildOptions) -> Result<()> {
    let previous = session::current();
    match start(options).await {
        Ok(next) => {
            *watch = next;
            log_watched(watch);
            Ok(())
        }
        Err(err) => {
            session::restore(previous);
            Err(err)
        }
    }
}

fn log_watched(watch: &WatchSession) {
    if watch.is_empty() {
        log!("watch"; "no asset declares watch globs, watching the config only");
        return;
    }
    let mut names: Vec<_> = watch.assets().collect();
    names.sort_unstable();
    let suffix = if watch.len() == 1 { "" } else { "s" };
    log!("watch"; "watching {} asset{}: {} (ctrl+c to stop)", watch.len(), suffix, names.join(", "));
}

/// Install a session for `options`, build it once, then watch its assets.
async fn start(options: BuildOptions) -> Result<WatchSession> {
    let session = session::install(BuildSession::new(options));
    let report = session.build().await;
    super::build::log_report(&report);
    if let Some(err) = &report.error {
        status_error("initial build failed", &err.detail());
    }

    WatchSession::start(&session, callbacks()).context("failed to start asset watchers")
}

fn callbacks() -> WatchCallbacks {
    WatchCallbacks::default()
        .on_changed(|event| {
            let verb = match event.kind {
                ChangeKind::Created | ChangeKind::Modified => "rebuilding",
                ChangeKind::Removed => "source removed, rebuilding",
            };
            status_pending(&format!("{verb} {}", event.asset));
        })
        .on_complete(|event| status_success(&rebuilt_message(&event.asset)))
        .on_error(|err| {
            let summary = match err.asset() {
                Some(asset) => format!("failed: {asset}"),
                None => "rebuild failed".to_string(),
            };
            status_error(&summary, &err.detail());
        })
}

/// `rebuilt <asset> -> <output>` when the active manifest has a path for it.
fn rebuilt_message(asset: &str) -> String {
    let output = session::current()
        .and_then(|active| active.store().get(asset))
        .and_then(|entry| entry.path().map(str::to_string));
    match output {
        Some(path) if path != asset => format!("rebuilt {asset} -> {path}"),
        _ => format!("rebuilt {asset}"),
    }
}

fn touches_config(event: &notify::Event, config_path: Option<&Path>) -> bool {
    let Some(config_path) = config_path else {
        return false;
    };
    ChangeKind::from_event(&event.kind).is_some() && event.paths.iter().any(|path| path == config_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::{AssetDescriptor, AssetSource};
    use notify::EventKind;
    use notify::event::{CreateKind, DataChange, ModifyKind};
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn watched_options(base: &Path, watch: &str) -> BuildOptions {
        let mut options = BuildOptions::new(base, base.join("dist"));
        options.silent = true;
        options.assets.push(
            AssetDescriptor::new(
                "site.css",
                AssetSource::File {
                    files: vec!["css/*.css".into()],
                    transform: vec![],
                },
            )
            .with_watch(vec![watch.into()]),
        );
        options
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_reload_with_bad_watch_glob_keeps_watchers() {
        let _guard = session::INSTALL_LOCK.lock();
        let dir = TempDir::new().unwrap();
        let base = dir.path().canonicalize().unwrap();
        fs::create_dir_all(base.join("css")).unwrap();
        fs::write(base.join("css/a.css"), "a{}").unwrap();

        let mut watch = start(watched_options(&base, "css/*.css")).await.unwrap();
        assert_eq!(watch.assets().collect::<Vec<_>>(), ["site.css"]);

        let err = reload(&mut watch, watched_options(&base, "css/[a.css")).await.unwrap_err();
        assert!(format!("{err:#}").contains("site.css"));
        assert_eq!(watch.assets().collect::<Vec<_>>(), ["site.css"]);

        let active = session::current().unwrap();
        assert_eq!(active.options().assets[0].watch, ["css/*.css"]);

        reload(&mut watch, watched_options(&base, "css/**/*.css")).await.unwrap();
        assert_eq!(watch.len(), 1);
        assert_eq!(session::current().unwrap().options().assets[0].watch, ["css/**/*.css"]);
    }

    #[test]
    fn test_touches_config() {
        let config = Path::new("/site/kiln.toml");
        let write = notify::Event::new(EventKind::Modify(ModifyKind::Data(DataChange::Any)))
            .add_path(PathBuf::from("/site/kiln.toml"));
        assert!(touches_config(&write, Some(config)));
        assert!(!touches_config(&write, None));

        let other = notify::Event::new(EventKind::Create(CreateKind::File))
            .add_path(PathBuf::from("/site/other.toml"));
        assert!(!touches_config(&other, Some(config)));

        let nested = notify::Event::new(EventKind::Create(CreateKind::File))
            .add_path(PathBuf::from("/site/sub/kiln.toml"));
        assert!(!touches_config(&nested, Some(config)));
    }
}
