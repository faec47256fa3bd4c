//! Exposing stored blobs outside the store: symlinks and installed executables.

use super::track::validate_name;
use super::Repository;
use crate::fs::absolutize;
use crate::fs::atomic::write_atomic;
use crate::fs::metadata::set_executable;
use crate::store::Digest;
use crate::utils::{R2Error, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone)]
pub struct LinkReport {
    pub target: PathBuf,
    pub blob: PathBuf,
    pub generation: u64,
    pub digest: Digest,
}

impl Repository {
    /// Create a symlink at `target` pointing at the stored blob of
    /// `generation` (default: latest). Blobs are read-only, so the link is
    /// a read-only view of that generation.
    pub fn link(&self, name: &str, target: &Path, generation: Option<u64>) -> Result<LinkReport> {
        let manifest = self.manifest()?;
        let entry = manifest.get(name)?;

        let (generation, digest) = match entry.resolve(generation) {
            (generation, Some(digest)) => (generation, digest),
            (generation, None) => {
                return Err(R2Error::GenerationNotFound {
                    name: name.to_string(),
                    generation,
                })
            }
        };

        if !self.store.contains(&digest) {
            return Err(R2Error::BlobNotFound(digest.to_hex()));
        }
        let blob = absolutize(&self.store.blob_path(&digest))?;

        let target = absolutize(target)?;
        if fs::symlink_metadata(&target).is_ok() {
            return Err(R2Error::TargetExists(target));
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }

        symlink(&blob, &target)?;
        info!(name, generation, target = %target.display(), "linked");

        Ok(LinkReport {
            target,
            blob,
            generation,
            digest,
        })
    }

    /// Copy the latest generation into the bin directory as an executable
    /// named after the entry. An earlier install is replaced.
    pub fn install(&self, name: &str) -> Result<PathBuf> {
        // Names from a hand-edited manifest must not escape the bin dir
        validate_name(name)?;
        let manifest = self.manifest()?;
        let entry = manifest.get(name)?;

        let digest = entry.latest_digest().ok_or_else(|| R2Error::GenerationNotFound {
            name: name.to_string(),
            generation: entry.latest,
        })?;
        let data = self.store.get(digest)?;

        let dest = self.bin_dir.join(name);
        write_atomic(&dest, &data)?;
        set_executable(&dest)?;

        info!(name, generation = entry.latest, dest = %dest.display(), "installed");
        Ok(dest)
    }
}

#[cfg(unix)]
fn symlink(original: &Path, link: &Path) -> Result<()> {
    std::os::unix::fs::symlink(original, link)?;
    Ok(())
}

#[cfg(not(unix))]
fn symlink(_original: &Path, _link: &Path) -> Result<()> {
    Err(R2Error::Unsupported("symlinks".to_string()))
}
