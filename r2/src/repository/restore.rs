//! Writing a stored generation back over the live file.

use super::track::snapshot;
use super::Repository;
use crate::fs::atomic::write_atomic;
use crate::fs::resolve_symlinks;
use crate::store::Digest;
use crate::utils::{R2Error, Result};
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy)]
pub struct RestoreOptions {
    /// Generation to restore (default: latest at the time of the call)
    pub generation: Option<u64>,
    /// Snapshot the live file as a new generation before overwriting it
    pub backup_first: bool,
}

impl Default for RestoreOptions {
    fn default() -> Self {
        Self {
            generation: None,
            backup_first: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RestoreReport {
    pub name: String,
    pub path: PathBuf,
    pub generation: u64,
    pub digest: Digest,
    /// Generation holding the pre-restore content, if one was taken
    pub snapshot: Option<u64>,
}

impl Repository {
    /// Overwrite the live file with a stored generation.
    ///
    /// The target generation is resolved before the safety snapshot, so the
    /// default restores what was latest when the command started. The
    /// snapshot is committed to the manifest before the live file is touched.
    /// A symlinked live file keeps its link; the content lands in its target.
    pub fn restore(&self, name: &str, options: RestoreOptions) -> Result<RestoreReport> {
        let _lock = self.lock()?;
        let mut manifest = self.manifest()?;
        let entry = manifest.get_mut(name)?;

        let (generation, digest) = match entry.resolve(options.generation) {
            (generation, Some(digest)) => (generation, digest),
            (generation, None) => {
                return Err(R2Error::GenerationNotFound {
                    name: name.to_string(),
                    generation,
                })
            }
        };

        // Fail before touching anything if the blob is gone or damaged
        let data = self.store.get(&digest)?;

        let path = entry.path.clone();
        let saved = if !options.backup_first {
            None
        } else if path.exists() {
            Some(snapshot(&self.store, name, entry)?.generation)
        } else {
            warn!(name, path = %path.display(), "live file missing, nothing to back up first");
            None
        };

        if saved.is_some() {
            manifest.save(&self.layout.manifest)?;
        }

        // Write through a symlinked dotfile to the file it points at
        let dest = resolve_symlinks(&path)?;
        write_atomic(&dest, &data)?;
        info!(name, generation, path = %dest.display(), "restored");

        Ok(RestoreReport {
            name: name.to_string(),
            path,
            generation,
            digest,
            snapshot: saved,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::Fixture;
    use super::*;
    use std::fs;

    #[test]
    fn test_restore_keeps_pre_restore_content() -> Result<()> {
        let fx = Fixture::new();
        let path = fx.file("conf", b"good");
        fx.repo.add("conf", &path)?;
        fs::write(&path, b"broken edit")?;

        let report = fx.repo.restore("conf", RestoreOptions::default())?;

        assert_eq!(report.generation, 1);
        assert_eq!(report.snapshot, Some(2));
        assert_eq!(fs::read(&path)?, b"good");

        let manifest = fx.repo.manifest()?;
        let entry = manifest.get("conf")?;
        assert_eq!(entry.latest, 2);
        let saved = entry.get(2).unwrap();
        assert_eq!(fx.repo.store().get(saved)?, b"broken edit");
        Ok(())
    }

    #[test]
    fn test_restore_without_backup() -> Result<()> {
        let fx = Fixture::new();
        let path = fx.file("conf", b"good");
        fx.repo.add("conf", &path)?;
        fs::write(&path, b"scratch")?;

        let report = fx.repo.restore(
            "conf",
            RestoreOptions {
                generation: None,
                backup_first: false,
            },
        )?;

        assert!(report.snapshot.is_none());
        assert_eq!(fs::read(&path)?, b"good");
        assert_eq!(fx.repo.manifest()?.get("conf")?.latest, 1);
        Ok(())
    }

    #[test]
    fn test_restore_older_generation() -> Result<()> {
        let fx = Fixture::new();
        let path = fx.file("conf", b"v1");
        fx.repo.add("conf", &path)?;
        fs::write(&path, b"v2")?;
        fx.repo.backup("conf")?;

        let report = fx.repo.restore(
            "conf",
            RestoreOptions {
                generation: Some(1),
                backup_first: true,
            },
        )?;

        assert_eq!(report.generation, 1);
        assert_eq!(report.snapshot, Some(3));
        assert_eq!(fs::read(&path)?, b"v1");
        Ok(())
    }

    #[test]
    fn test_restore_recreates_missing_file() -> Result<()> {
        let fx = Fixture::new();
        let path = fx.file("conf", b"keep me");
        fx.repo.add("conf", &path)?;
        fs::remove_file(&path)?;

        let report = fx.repo.restore("conf", RestoreOptions::default())?;

        assert!(report.snapshot.is_none());
        assert_eq!(fs::read(&path)?, b"keep me");
        Ok(())
    }

    #[test]
    fn test_restore_unknown_generation_changes_nothing() -> Result<()> {
        let fx = Fixture::new();
        let path = fx.file("conf", b"v1");
        fx.repo.add("conf", &path)?;
        fs::write(&path, b"edited")?;

        let err = fx
            .repo
            .restore(
                "conf",
                RestoreOptions {
                    generation: Some(9),
                    backup_first: true,
                },
            )
            .unwrap_err();

        assert!(matches!(err, R2Error::GenerationNotFound { generation: 9, .. }));
        assert_eq!(fs::read(&path)?, b"edited");
        assert_eq!(fx.repo.manifest()?.get("conf")?.latest, 1);
        Ok(())
    }

    #[test]
    fn test_restore_missing_blob() -> Result<()> {
        let fx = Fixture::new();
        let path = fx.file("conf", b"v1");
        let snap = fx.repo.add("conf", &path)?;
        fx.repo.store().remove(&snap.digest)?;

        let err = fx.repo.restore("conf", RestoreOptions::default()).unwrap_err();
        assert!(matches!(err, R2Error::BlobNotFound(_)));
        assert_eq!(fx.repo.manifest()?.get("conf")?.latest, 1);
        Ok(())
    }

    #[test]
    #[cfg(unix)]
    fn test_restore_writes_through_symlink() -> Result<()> {
        let fx = Fixture::new();
        let real = fx.file("dotfiles-vimrc", b"good");
        let link = fx.work.path().join(".vimrc");
        std::os::unix::fs::symlink(&real, &link)?;
        fx.repo.add("vimrc", &link)?;
        fs::write(&real, b"broken")?;

        let report = fx.repo.restore("vimrc", RestoreOptions::default())?;

        assert!(fs::symlink_metadata(&link)?.file_type().is_symlink());
        assert_eq!(fs::read_link(&link)?, real);
        assert_eq!(fs::read(&real)?, b"good");
        assert_eq!(report.path, link);

        let saved = fx.repo.manifest()?.get("vimrc")?.get(2).copied().unwrap();
        assert_eq!(fx.repo.store().get(&saved)?, b"broken");
        Ok(())
    }
}
