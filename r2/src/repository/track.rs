//! Registering files and taking snapshots.

use super::Repository;
use crate::fs::absolutize;
use crate::manifest::Entry;
use crate::store::{ContentStore, Digest};
use crate::utils::{R2Error, Result};
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use tracing::info;

/// A generation that was just recorded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub name: String,
    pub generation: u64,
    pub digest: Digest,
}

impl Repository {
    /// Track the file at `path` under `name` and record generation 1.
    ///
    /// Fails if `name` is already tracked.
    pub fn add(&self, name: &str, path: &Path) -> Result<Snapshot> {
        validate_name(name)?;
        let path = absolutize(path)?;

        self.mutate(|manifest, store| {
            if manifest.contains(name) {
                return Err(R2Error::EntryExists(name.to_string()));
            }
            let mut entry = Entry::new(&path);
            let snapshot = snapshot(store, name, &mut entry)?;
            manifest.insert(name, entry)?;
            Ok(snapshot)
        })
    }

    /// `add` using the file's base name as the entry name.
    pub fn quick_add(&self, path: &Path) -> Result<Snapshot> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| R2Error::InvalidName(path.display().to_string()))?;
        self.add(&name, path)
    }

    /// Record the live file of an existing entry as a new generation.
    ///
    /// A generation is appended even when the content is unchanged.
    pub fn backup(&self, name: &str) -> Result<Snapshot> {
        self.mutate(|manifest, store| snapshot(store, name, manifest.get_mut(name)?))
    }
}

/// Store the live file of `entry` and append a generation for it.
pub(super) fn snapshot(store: &ContentStore, name: &str, entry: &mut Entry) -> Result<Snapshot> {
    check_source(entry.path())?;
    let digest = store.put_file(entry.path())?;
    let generation = entry.record(digest);

    info!(name, generation, %digest, path = %entry.path().display(), "recorded generation");

    Ok(Snapshot {
        name: name.to_string(),
        generation,
        digest,
    })
}

/// The source must exist and be a regular file (symlinks are followed).
fn check_source(path: &Path) -> Result<()> {
    match fs::metadata(path) {
        Ok(meta) if meta.is_file() => Ok(()),
        Ok(_) => Err(R2Error::NotAFile(path.to_path_buf())),
        Err(e) if e.kind() == ErrorKind::NotFound => Err(R2Error::SourceMissing(path.to_path_buf())),
        Err(e) => Err(e.into()),
    }
}

/// Names become file names under `install`, so no separators or dot names.
pub(super) fn validate_name(name: &str) -> Result<()> {
    let bad = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\', '\0']);
    if bad {
        return Err(R2Error::InvalidName(name.to_string()));
    }
    Ok(())
}
