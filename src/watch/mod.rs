//! Watch sessions: rebuild an asset when its watched files change.
//!
//! ```text
//! notify ──► mpsc ──► per-asset loop ──► changed() ──► spawn(rebuild + bootstrap + persist)
//!                                                           └──► complete() | error()
//! ```
//!
//! Every asset with a non-empty `watch` list gets its own watcher. Events are
//! not debounced: each matching change starts its own rebuild, and rebuilds
//! of the same asset may overlap.

mod roots;
mod types;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use notify::RecommendedWatcher;
use rustc_hash::FxHashMap;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::asset::PatternSet;
use crate::builder::BuildError;
use crate::session::BuildSession;

use roots::WatchRoots;
pub use types::{ChangeKind, WatchEvent};

/// How often missing watch roots are re-attached.
const ROOT_CHECK_INTERVAL: Duration = Duration::from_secs(1);

pub type EventCallback = Arc<dyn Fn(&WatchEvent) + Send + Sync>;
pub type ErrorCallback = Arc<dyn Fn(&BuildError) + Send + Sync>;

/// Caller hooks. Each one is optional.
#[derive(Clone, Default)]
pub struct WatchCallbacks {
    /// A rebuild failed.
    pub error: Option<ErrorCallback>,
    /// A matching change was seen; called before the rebuild starts.
    pub changed: Option<EventCallback>,
    /// The rebuild, bootstrap and manifest write finished.
    pub complete: Option<EventCallback>,
}

impl WatchCallbacks {
    pub fn on_error(mut self, f: impl Fn(&BuildError) + Send + Sync + 'static) -> Self {
        self.error = Some(Arc::new(f));
        self
    }

    pub fn on_changed(mut self, f: impl Fn(&WatchEvent) + Send + Sync + 'static) -> Self {
        self.changed = Some(Arc::new(f));
        self
    }

    pub fn on_complete(mut self, f: impl Fn(&WatchEvent) + Send + Sync + 'static) -> Self {
        self.complete = Some(Arc::new(f));
        self
    }
}

#[derive(Debug, Error)]
pub enum WatchError {
    #[error("cannot start watcher")]
    Notify(#[from] notify::Error),

    #[error("{asset}: invalid watch pattern")]
    Pattern {
        asset: String,
        #[source]
        source: ignore::Error,
    },
}

/// Running watchers, keyed by asset name. Dropping it stops them all.
pub struct WatchSession {
    loops: FxHashMap<String, JoinHandle<()>>,
}

impl WatchSession {
    /// Register a watcher for every asset with watch globs.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(session: &BuildSession, callbacks: WatchCallbacks) -> Result<Self, WatchError> {
        let options = session.options();
        let mut loops = FxHashMap::default();

        for asset in options.watched_assets() {
            let patterns = PatternSet::anchored(&options.base_dir, &asset.watch).map_err(|source| {
                WatchError::Pattern {
                    asset: asset.name.clone(),
                    source,
                }
            })?;

            let (tx, rx) = mpsc::unbounded_channel();
            let mut watcher = notify::recommended_watcher(move |res| {
                let _ = tx.send(res);
            })?;
            let mut roots = WatchRoots::new(outermost(patterns.roots()));
            roots.attach_existing(&mut watcher)?;
            crate::debug!("watch"; "{}: {} roots", asset.name, roots.attached());

            let watch = AssetWatch {
                asset: asset.name.clone(),
                patterns,
                dest_dir: options.dest_dir.clone(),
                session: session.clone(),
                callbacks: callbacks.clone(),
            };
            let handle = tokio::spawn(watch.run(rx, watcher, roots));
            if let Some(previous) = loops.insert(asset.name.clone(), handle) {
                previous.abort();
            }
        }

        Ok(Self { loops })
    }

    /// Names of the watched assets.
    pub fn assets(&self) -> impl Iterator<Item = &str> {
        self.loops.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.loops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.loops.is_empty()
    }
}

impl Drop for WatchSession {
    fn drop(&mut self) {
        for handle in self.loops.values() {
            handle.abort();
        }
    }
}

struct AssetWatch {
    asset: String,
    patterns: PatternSet,
    dest_dir: PathBuf,
    session: BuildSession,
    callbacks: WatchCallbacks,
}

impl AssetWatch {
    async fn run(
        self,
        mut rx: mpsc::UnboundedReceiver<notify::Result<notify::Event>>,
        mut watcher: RecommendedWatcher,
        mut roots: WatchRoots,
    ) {
        let mut tick = tokio::time::interval(ROOT_CHECK_INTERVAL);
        loop {
            tokio::select! {
                received = rx.recv() => match received {
                    Some(Ok(event)) => {
                        if let Some(event) = self.classify(&event) {
                            self.dispatch(event);
                        }
                    }
                    Some(Err(err)) => crate::log!("watch"; "notify error: {}", err),
                    None => break,
                },
                _ = tick.tick() => roots.maintain(&mut watcher),
            }
        }
    }

    /// Keep only changes that match this asset's globs.
    ///
    /// Anything under the output directory is ignored so writing outputs
    /// never retriggers a build.
    fn classify(&self, event: &notify::Event) -> Option<WatchEvent> {
        classify_event(&self.asset, &self.patterns, &self.dest_dir, event)
    }

    fn dispatch(&self, event: WatchEvent) {
        crate::debug!("watch"; "{} {}: {:?}", event.asset, event.kind.label(), event.paths);
        if let Some(changed) = &self.callbacks.changed {
            changed(&event);
        }

        let session = self.session.clone();
        let callbacks = self.callbacks.clone();
        tokio::spawn(async move {
            match session.rebuild(&event.asset).await {
                Ok(()) => {
                    if let Some(complete) = &callbacks.complete {
                        complete(&event);
                    }
                }
                Err(err) => match &callbacks.error {
                    Some(on_error) => on_error(&err),
                    None => crate::log!("error"; "{}", err.detail()),
                },
            }
        });
    }
}

fn classify_event(
    asset: &str,
    patterns: &PatternSet,
    dest_dir: &Path,
    event: &notify::Event,
) -> Option<WatchEvent> {
    let kind = ChangeKind::from_event(&event.kind)?;
    let paths: Vec<_> = event
        .paths
        .iter()
        .filter(|path| !path.starts_with(dest_dir) && patterns.is_match(path))
        .cloned()
        .collect();
    (!paths.is_empty()).then(|| WatchEvent {
        asset: asset.to_string(),
        kind,
        paths,
    })
}

/// Drop roots nested inside another root; recursive watches cover them.
fn outermost(roots: &[PathBuf]) -> Vec<PathBuf> {
    roots
        .iter()
        .filter(|root| !roots.iter().any(|other| other != *root && root.starts_with(other)))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::{AssetDescriptor, AssetSource};
    use crate::bootstrap::LOADER_NAME;
    use crate::bundler::{BundleError, BundleRequest, Bundler};
    use crate::config::BuildOptions;
    use notify::event::{CreateKind, DataChange, MetadataKind, ModifyKind};
    use notify::{Event, EventKind};
    use parking_lot::Mutex;
    use std::fs;
    use tempfile::TempDir;

    const WAIT: Duration = Duration::from_secs(10);

    fn css_project() -> (TempDir, PathBuf) {
        let dir = TempDir::new().unwrap();
        let base = dir.path().canonicalize().unwrap();
        fs::create_dir_all(base.join("css")).unwrap();
        fs::write(base.join("css/a.css"), "a{}").unwrap();
        (dir, base)
    }

    fn css_options(base: &Path) -> BuildOptions {
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
            .with_watch(vec!["css/*.css".into()]),
        );
        options
    }

    fn asset_watch(session: &BuildSession, asset: &str, callbacks: WatchCallbacks) -> AssetWatch {
        let options = session.options();
        AssetWatch {
            asset: asset.to_string(),
            patterns: PatternSet::anchored(&options.base_dir, &["css/*.css".into()]).unwrap(),
            dest_dir: options.dest_dir.clone(),
            session: session.clone(),
            callbacks,
        }
    }

    fn modified(asset: &str, path: PathBuf) -> WatchEvent {
        WatchEvent {
            asset: asset.to_string(),
            kind: ChangeKind::Modified,
            paths: vec![path],
        }
    }

    /// Completions as `Ok(asset)`, failures as `Err(asset)`.
    fn reporting(tx: mpsc::UnboundedSender<Result<String, String>>) -> WatchCallbacks {
        let failed = tx.clone();
        WatchCallbacks::default()
            .on_complete(move |event| {
                let _ = tx.send(Ok(event.asset.clone()));
            })
            .on_error(move |err| {
                let _ = failed.send(Err(err.asset().unwrap_or_default().to_string()));
            })
    }

    struct RejectingBundler;

    impl Bundler for RejectingBundler {
        fn bundle(&self, request: &BundleRequest<'_>) -> Result<String, BundleError> {
            Err(BundleError::ModuleNotFound {
                name: request.ctx.asset.to_string(),
                base: PathBuf::from("/"),
            })
        }
    }

    fn event(kind: EventKind, path: &Path) -> Event {
        Event::new(kind).add_path(path.to_path_buf())
    }

    #[test]
    fn test_classify_filters_by_glob() {
        let root = Path::new("/project");
        let patterns = PatternSet::anchored(root, &["css/**/*.css".into()]).unwrap();
        let dest = root.join("dist");

        let hit = event(EventKind::Create(CreateKind::File), &root.join("css/a.css"));
        let found = classify_event("site.css", &patterns, &dest, &hit).unwrap();
        assert_eq!(found.kind, ChangeKind::Created);
        assert_eq!(found.paths, [root.join("css/a.css")]);

        let miss = event(EventKind::Create(CreateKind::File), &root.join("js/a.js"));
        assert!(classify_event("site.css", &patterns, &dest, &miss).is_none());
    }

    #[test]
    fn test_classify_ignores_metadata_and_outputs() {
        let root = Path::new("/project");
        let patterns = PatternSet::anchored(root, &["*.css".into()]).unwrap();
        let dest = root.join("dist");

        let touch = event(
            EventKind::Modify(ModifyKind::Metadata(MetadataKind::WriteTime)),
            &root.join("a.css"),
        );
        assert!(classify_event("a", &patterns, &dest, &touch).is_none());

        let output = event(
            EventKind::Modify(ModifyKind::Data(DataChange::Content)),
            &dest.join("site.0123456789abcdef.css"),
        );
        assert!(classify_event("a", &patterns, &dest, &output).is_none());
    }

    #[test]
    fn test_outermost_roots() {
        let roots = vec![
            PathBuf::from("/p/src/js"),
            PathBuf::from("/p/src"),
            PathBuf::from("/p/styles"),
        ];
        assert_eq!(outermost(&roots), [PathBuf::from("/p/src"), PathBuf::from("/p/styles")]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_change_triggers_rebuild() {
        let (_dir, base) = css_project();
        let mut options = css_options(&base);
        options.skip_hash = Some(true);
        let session = BuildSession::new(options);

        let (tx, mut rx) = mpsc::unbounded_channel();
        let callbacks = WatchCallbacks::default().on_complete(move |event| {
            let _ = tx.send(event.asset.clone());
        });
        let watch = WatchSession::start(&session, callbacks).unwrap();
        assert_eq!(watch.assets().collect::<Vec<_>>(), ["site.css"]);

        tokio::time::sleep(Duration::from_millis(200)).await;
        fs::write(base.join("css/a.css"), "b{}").unwrap();

        // A write may surface as several events; wait for a rebuild that saw it.
        let deadline = tokio::time::Instant::now() + WAIT;
        loop {
            let asset = tokio::time::timeout_at(deadline, rx.recv())
                .await
                .expect("no rebuild completed")
                .unwrap();
            assert_eq!(asset, "site.css");
            if fs::read_to_string(base.join("dist/site.css")).is_ok_and(|css| css == "b{}") {
                break;
            }
        }
        assert!(base.join("dist/manifest.json").is_file());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_changed_runs_before_rebuild() {
        let (_dir, base) = css_project();
        let mut options = css_options(&base);
        options.skip_hash = Some(true);
        let session = BuildSession::new(options);

        let output = base.join("dist/site.css");
        let order = Arc::new(Mutex::new(Vec::new()));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let callbacks = WatchCallbacks {
            changed: Some(Arc::new({
                let order = Arc::clone(&order);
                let output = output.clone();
                move |_: &WatchEvent| order.lock().push(("changed", output.exists()))
            })),
            ..reporting(tx)
        };
        let watch = asset_watch(&session, "site.css", callbacks);

        watch.dispatch(modified("site.css", base.join("css/a.css")));
        let done = tokio::time::timeout(WAIT, rx.recv()).await.unwrap().unwrap();
        assert_eq!(done, Ok("site.css".to_string()));
        assert_eq!(order.lock().as_slice(), [("changed", false)]);
        assert!(output.is_file());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_failed_rebuild_reports_error_only() {
        let (_dir, base) = css_project();
        fs::write(base.join("main.js"), "1").unwrap();
        let mut options = css_options(&base);
        options.assets.push(AssetDescriptor::new(
            "app.js",
            AssetSource::Bundle {
                entries: vec![base.join("main.js")],
                transform: vec![],
                require: vec![],
                external: vec![],
            },
        ));
        let session = BuildSession::with_bundler(options, Arc::new(RejectingBundler));

        let (tx, mut rx) = mpsc::unbounded_channel();
        let watch = asset_watch(&session, "app.js", reporting(tx));
        watch.dispatch(modified("app.js", base.join("main.js")));

        let done = tokio::time::timeout(WAIT, rx.recv()).await.unwrap().unwrap();
        assert_eq!(done, Err("app.js".to_string()));
        // A failed asset skips the bootstrap and the manifest write.
        assert!(!base.join("dist/manifest.json").exists());
        drop(watch);
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_rebuild_refreshes_loader_payload() {
        let (_dir, base) = css_project();
        let session = BuildSession::new(css_options(&base));
        assert!(session.build().await.is_ok());

        let path_of = |name: &str| session.store().get(name).unwrap().path().unwrap().to_string();
        let old_css = path_of("site.css");
        let old_loader = fs::read_to_string(base.join("dist").join(path_of(LOADER_NAME))).unwrap();
        assert!(old_loader.contains(&old_css));

        fs::write(base.join("css/a.css"), "b{}").unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let watch = asset_watch(&session, "site.css", reporting(tx));
        watch.dispatch(modified("site.css", base.join("css/a.css")));
        let done = tokio::time::timeout(WAIT, rx.recv()).await.unwrap().unwrap();
        assert_eq!(done, Ok("site.css".to_string()));

        let new_css = path_of("site.css");
        assert_ne!(new_css, old_css);
        let loader = fs::read_to_string(base.join("dist").join(path_of(LOADER_NAME))).unwrap();
        assert!(loader.contains(&new_css));
        assert!(!loader.contains(&old_css));
    }
}
