//! Advisory lock around manifest read-modify-write.

use crate::utils::Result;
use std::path::{Path, PathBuf};

/// Exclusive lock on `<home>/lock`, released on drop.
#[cfg(unix)]
pub struct ManifestLock {
    path: PathBuf,
    _guard: nix::fcntl::Flock<std::fs::File>,
}

#[cfg(unix)]
impl ManifestLock {
    /// Take the lock without blocking. Fails with `Locked` when another
    /// process holds it.
    pub fn acquire(path: &Path) -> Result<Self> {
        use crate::utils::R2Error;
        use nix::errno::Errno;
        use nix::fcntl::{Flock, FlockArg};
        use std::fs::OpenOptions;

        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(path)?;

        match Flock::lock(file, FlockArg::LockExclusiveNonblock) {
            Ok(guard) => {
                tracing::trace!(lock = %path.display(), "acquired manifest lock");
                Ok(Self {
                    path: path.to_path_buf(),
                    _guard: guard,
                })
            }
            Err((_, Errno::EWOULDBLOCK)) => Err(R2Error::Locked(path.to_path_buf())),
            Err((_, e)) => Err(std::io::Error::from(e).into()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Without `flock` the tool runs unlocked, one invocation at a time.
#[cfg(not(unix))]
pub struct ManifestLock {
    path: PathBuf,
}

#[cfg(not(unix))]
impl ManifestLock {
    pub fn acquire(path: &Path) -> Result<Self> {
        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
