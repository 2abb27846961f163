//! Build sessions.
//!
//! A [`BuildSession`] pairs one immutable [`BuildOptions`] with a fresh
//! [`ManifestStore`]. Configuration changes never patch a running session:
//! a new session is built and swapped in whole through [`install`].

use std::sync::{Arc, LazyLock};

use arc_swap::ArcSwapOption;

use crate::bootstrap;
use crate::builder::{self, BuildError};
use crate::bundler::{Bundler, ModuleBundler};
use crate::config::BuildOptions;
use crate::manifest::{Manifest, ManifestStore};

/// Currently active session, if any.
static SESSION: LazyLock<ArcSwapOption<BuildSession>> = LazyLock::new(|| ArcSwapOption::empty());

/// Replace the active session.
pub fn install(session: BuildSession) -> Arc<BuildSession> {
    let session = Arc::new(session);
    SESSION.store(Some(Arc::clone(&session)));
    session
}

/// Held by tests that install a session.
#[cfg(test)]
pub(crate) static INSTALL_LOCK: parking_lot::Mutex<()> = parking_lot::Mutex::new(());

/// Put back a session captured with [`current`].
pub fn restore(session: Option<Arc<BuildSession>>) {
    SESSION.store(session);
}

#[inline]
pub fn current() -> Option<Arc<BuildSession>> {
    SESSION.load_full()
}

/// Options, manifest store and bundler for one configuration.
///
/// Clones share the same store.
#[derive(Clone)]
pub struct BuildSession {
    options: Arc<BuildOptions>,
    store: ManifestStore,
    bundler: Arc<dyn Bundler>,
}

/// Outcome of a full build pass.
///
/// Always produced, even when a builder failed.
#[derive(Debug)]
pub struct BuildReport {
    /// First error observed.
    pub error: Option<BuildError>,
    pub config: Arc<BuildOptions>,
    /// Manifest as persisted at the end of the pass.
    pub manifest: Manifest,
}

impl BuildReport {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

impl BuildSession {
    pub fn new(options: BuildOptions) -> Self {
        Self::with_bundler(options, Arc::new(ModuleBundler))
    }

    pub fn with_bundler(options: BuildOptions, bundler: Arc<dyn Bundler>) -> Self {
        let store = ManifestStore::new(&options.name, &options.base_url, &options.dest_dir);
        Self {
            options: Arc::new(options),
            store,
            bundler,
        }
    }

    pub fn options(&self) -> &Arc<BuildOptions> {
        &self.options
    }

    pub fn store(&self) -> &ManifestStore {
        &self.store
    }

    pub fn bundler(&self) -> &dyn Bundler {
        self.bundler.as_ref()
    }

    /// Full pass: every declared asset, then the bootstrap, then the
    /// manifest is written.
    ///
    /// The bootstrap and the write still run after a builder error.
    pub async fn build(&self) -> BuildReport {
        let mut error = builder::build_all(self).await.err();
        if let Err(err) = self.finish_pass().await {
            crate::log!("error"; "{}", err.detail());
            error.get_or_insert(err);
        }
        BuildReport {
            error,
            config: Arc::clone(&self.options),
            manifest: self.store.snapshot(),
        }
    }

    /// Rebuild one asset, then the bootstrap, then write the manifest.
    ///
    /// A failed asset skips the bootstrap and the write.
    pub async fn rebuild(&self, name: &str) -> Result<(), BuildError> {
        let session = self.clone();
        let name = name.to_string();
        tokio::task::spawn_blocking(move || builder::build_named(&session, &name))
            .await
            .map_err(|_| BuildError::Panicked)??;
        self.finish_pass().await
    }

    async fn finish_pass(&self) -> Result<(), BuildError> {
        let session = self.clone();
        tokio::task::spawn_blocking(move || {
            let bootstrapped = bootstrap::build_bootstrap(&session);
            let persisted = session.persist();
            bootstrapped.and(persisted)
        })
        .await
        .map_err(|_| BuildError::Panicked)?
    }

    /// Write the manifest to `<dest_dir>/manifest.json`.
    pub fn persist(&self) -> Result<(), BuildError> {
        self.store.write().map_err(|source| BuildError::Manifest {
            path: self.store.path().to_path_buf(),
            source,
        })
    }
}

impl std::fmt::Debug for BuildSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuildSession")
            .field("options", &self.options)
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::ManifestEntry;

    #[test]
    fn test_install_replaces_whole_session() {
        let _guard = INSTALL_LOCK.lock();
        let first = install(BuildSession::new(BuildOptions::new("/a", "/a/dist")));
        first.store().add_asset("cdn", ManifestEntry::url("https://cdn.example"));

        let second = install(BuildSession::new(BuildOptions::new("/b", "/b/dist")));
        let active = current().unwrap();
        assert!(Arc::ptr_eq(&active, &second));
        assert_eq!(active.options().base_dir, std::path::PathBuf::from("/b"));
        // A new session starts from an empty manifest.
        assert_eq!(active.store().len(), 0);
        assert_eq!(first.store().len(), 1);

        restore(Some(Arc::clone(&first)));
        assert!(Arc::ptr_eq(&current().unwrap(), &first));
    }
}
