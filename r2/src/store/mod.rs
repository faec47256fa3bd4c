//! Content-addressed blob store.
//!
//! One file per unique digest in a flat directory:
//!
//! ```text
//! <home>/store/
//!   a94a8fe5ccb19ba61c4c0873d391e987982fbbd3
//!   da39a3ee5e6b4b0d3255bfef95601890afd80709
//! ```
//!
//! Blobs are raw bytes with no header. They are immutable once written; the
//! only way one disappears is `remove`, which `gc` calls for unreferenced
//! digests.

pub mod digest;

pub use digest::Digest;

use crate::fs::atomic::{copy_atomic, write_atomic, TEMP_PREFIX};
use crate::fs::metadata::FileMetadata;
use crate::utils::{R2Error, Result};
use chrono::{DateTime, Utc};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Handle to the blob directory
#[derive(Debug, Clone)]
pub struct ContentStore {
    root: PathBuf,
}

impl ContentStore {
    /// Open a store rooted at `root`. The directory must already exist.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        if !root.is_dir() {
            return Err(R2Error::NotInitialized(root));
        }
        Ok(Self { root })
    }

    /// Create the store directory if needed and open it.
    pub fn create(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Location a blob with this digest lives at (whether or not it exists)
    pub fn blob_path(&self, digest: &Digest) -> PathBuf {
        self.root.join(digest.to_hex())
    }

    pub fn contains(&self, digest: &Digest) -> bool {
        self.blob_path(digest).is_file()
    }

    /// Store `data`, returning its digest. Storing the same bytes twice is a
    /// no-op after the first write.
    pub fn put(&self, data: &[u8]) -> Result<Digest> {
        let digest = Digest::of_bytes(data);
        let path = self.blob_path(&digest);
        if path.is_file() {
            debug!(%digest, "blob already stored");
            return Ok(digest);
        }
        write_atomic(&path, data)?;
        seal(&path)?;
        debug!(%digest, bytes = data.len(), "stored blob");
        Ok(digest)
    }

    /// Store the contents of the file at `src`.
    pub fn put_file(&self, src: &Path) -> Result<Digest> {
        let digest = Digest::of_file(src).map_err(|e| source_error(e, src))?;
        let path = self.blob_path(&digest);
        if path.is_file() {
            debug!(%digest, src = %src.display(), "blob already stored");
            return Ok(digest);
        }

        copy_atomic(src, &path).map_err(|e| source_error(e, src))?;

        // The file may have changed between hashing and copying
        let stored = Digest::of_file(&path)?;
        if stored != digest {
            let _ = fs::remove_file(&path);
            warn!(src = %src.display(), "file changed while being stored, retrying from memory");
            let data = fs::read(src).map_err(|e| source_error(e, src))?;
            return self.put(&data);
        }

        seal(&path)?;
        debug!(%digest, src = %src.display(), "stored blob");
        Ok(digest)
    }

    /// Read a blob back, verifying it still hashes to `digest`.
    pub fn get(&self, digest: &Digest) -> Result<Vec<u8>> {
        let data = match fs::read(self.blob_path(digest)) {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(R2Error::BlobNotFound(digest.to_hex()))
            }
            Err(e) => return Err(e.into()),
        };
        if Digest::of_bytes(&data) != *digest {
            return Err(R2Error::CorruptBlob(digest.to_hex()));
        }
        Ok(data)
    }

    /// Size of a stored blob in bytes
    pub fn size(&self, digest: &Digest) -> Option<u64> {
        FileMetadata::from_path(&self.blob_path(digest))
            .ok()
            .map(|m| m.size)
    }

    /// When the blob was first written (its file modification time)
    pub fn stored_at(&self, digest: &Digest) -> Option<DateTime<Utc>> {
        FileMetadata::from_path(&self.blob_path(digest))
            .ok()
            .and_then(|m| m.modified)
    }

    /// Delete a blob. Returns the number of bytes freed, 0 if it was absent.
    pub fn remove(&self, digest: &Digest) -> Result<u64> {
        let path = self.blob_path(digest);
        let size = match fs::metadata(&path) {
            Ok(meta) => meta.len(),
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };
        fs::remove_file(&path)?;
        debug!(%digest, bytes = size, "removed blob");
        Ok(size)
    }

    /// Every digest present in the store.
    ///
    /// Files whose names are not canonical digests (temp files, strays) are
    /// skipped.
    pub fn list(&self) -> Result<Vec<Digest>> {
        let mut digests = Vec::new();

        for entry in WalkDir::new(&self.root).min_depth(1).max_depth(1) {
            let entry = entry.map_err(walk_error)?;
            if !entry.file_type().is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy();
            if name.starts_with(TEMP_PREFIX) {
                continue;
            }
            match name.parse::<Digest>() {
                Ok(digest) => digests.push(digest),
                Err(_) => debug!(file = %name, "ignoring non-blob file in store"),
            }
        }

        digests.sort();
        Ok(digests)
    }
}

/// Blobs are read-only on disk; `link` hands out symlinks to them.
#[cfg(unix)]
fn seal(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    fs::set_permissions(path, fs::Permissions::from_mode(0o444))
}

#[cfg(not(unix))]
fn seal(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

/// Map a failure reading a source file to `SourceMissing` when it is gone.
fn source_error(e: std::io::Error, src: &Path) -> R2Error {
    if e.kind() == ErrorKind::NotFound {
        R2Error::SourceMissing(src.to_path_buf())
    } else {
        R2Error::Io(e)
    }
}

fn walk_error(e: walkdir::Error) -> R2Error {
    R2Error::Io(e.into())
}
