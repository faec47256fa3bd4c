//! The r2 repository: manifest + content store under one home directory.
//!
//! ```text
//! <home>/
//!   config.toml   optional
//!   defs.json     manifest
//!   lock          advisory lock for manifest updates
//!   store/        content-addressed blobs
//!   bin/          default `install` target
//! ```
//!
//! Every operation reads the manifest fresh. Operations that change it hold
//! the lock across the whole read-modify-write.

mod compare;
mod deploy;
mod maintenance;
mod restore;
mod track;

pub use compare::{DiffReport, DiffState};
pub use deploy::LinkReport;
pub use maintenance::{GcReport, PruneReport};
pub use restore::{RestoreOptions, RestoreReport};
pub use track::Snapshot;

use crate::config::Config;
use crate::manifest::{Manifest, ManifestLock};
use crate::store::{ContentStore, Digest};
use crate::utils::{R2Error, Result};
use chrono::{DateTime, Utc};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Paths of everything r2 keeps under its home directory
#[derive(Debug, Clone)]
pub struct Layout {
    pub home: PathBuf,
    pub manifest: PathBuf,
    pub store: PathBuf,
    pub lock: PathBuf,
}

impl Layout {
    pub fn new(home: &Path) -> Self {
        Self {
            home: home.to_path_buf(),
            manifest: home.join("defs.json"),
            store: home.join("store"),
            lock: home.join("lock"),
        }
    }
}

/// One line of `history`
#[derive(Debug, Clone)]
pub struct HistoryItem {
    pub generation: u64,
    pub digest: Digest,
    /// Blob size, when the blob is still in the store
    pub size: Option<u64>,
    /// When the blob was first stored
    pub stored_at: Option<DateTime<Utc>>,
}

pub struct Repository {
    layout: Layout,
    store: ContentStore,
    bin_dir: PathBuf,
}

impl Repository {
    /// Create the home directory, store and an empty manifest.
    ///
    /// Safe to run again: an existing manifest is left as it is.
    pub fn init(config: &Config) -> Result<Self> {
        let layout = Layout::new(&config.home);
        fs::create_dir_all(&layout.home)?;
        let store = ContentStore::create(&layout.store)?;

        if layout.manifest.exists() {
            info!(home = %layout.home.display(), "already initialized");
        } else {
            Manifest::new().save(&layout.manifest)?;
            info!(home = %layout.home.display(), "initialized");
        }

        Ok(Self {
            layout,
            store,
            bin_dir: config.bin_dir(),
        })
    }

    /// Open an initialized repository.
    pub fn open(config: &Config) -> Result<Self> {
        let layout = Layout::new(&config.home);
        if !layout.manifest.is_file() {
            return Err(R2Error::NotInitialized(layout.home));
        }
        let store = ContentStore::open(&layout.store)?;

        Ok(Self {
            layout,
            store,
            bin_dir: config.bin_dir(),
        })
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn store(&self) -> &ContentStore {
        &self.store
    }

    /// Current manifest, read without taking the lock
    pub fn manifest(&self) -> Result<Manifest> {
        Manifest::load(&self.layout.manifest)
    }

    fn lock(&self) -> Result<ManifestLock> {
        ManifestLock::acquire(&self.layout.lock)
    }

    /// Locked read-modify-write. The manifest is saved only when `f` succeeds.
    fn mutate<T>(&self, f: impl FnOnce(&mut Manifest, &ContentStore) -> Result<T>) -> Result<T> {
        let _lock = self.lock()?;
        let mut manifest = self.manifest()?;
        let out = f(&mut manifest, &self.store)?;
        manifest.save(&self.layout.manifest)?;
        Ok(out)
    }

    /// All entry names, sorted
    pub fn list_files(&self) -> Result<Vec<String>> {
        Ok(self.manifest()?.names().map(str::to_string).collect())
    }

    /// Every generation of an entry, oldest first
    pub fn history(&self, name: &str) -> Result<Vec<HistoryItem>> {
        let manifest = self.manifest()?;
        let entry = manifest.get(name)?;

        Ok(entry
            .generations
            .iter()
            .map(|(&generation, digest)| HistoryItem {
                generation,
                digest: *digest,
                size: self.store.size(digest),
                stored_at: self.store.stored_at(digest),
            })
            .collect())
    }

    /// Stop tracking an entry. Its blobs stay until `gc`.
    pub fn remove(&self, name: &str) -> Result<crate::manifest::Entry> {
        let removed = self.mutate(|manifest, _| manifest.remove(name))?;
        info!(name, generations = removed.generations.len(), "removed entry");
        Ok(removed)
    }
}
