//! File metadata used by history output and `install`.

use chrono::{DateTime, Utc};
use std::fs;
use std::path::Path;

/// The subset of file metadata r2 reports on
#[derive(Debug, Clone)]
pub struct FileMetadata {
    /// File size in bytes
    pub size: u64,

    /// Last modified time
    pub modified: Option<DateTime<Utc>>,

    /// File permissions (Unix mode bits)
    pub permissions: Option<u32>,

    /// Is this a regular file?
    pub is_file: bool,
}

impl FileMetadata {
    /// Extract metadata from a file path (follows symlinks)
    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let metadata = fs::metadata(path)?;

        let modified = metadata.modified().ok().map(DateTime::<Utc>::from);

        #[cfg(unix)]
        let permissions = {
            use std::os::unix::fs::PermissionsExt;
            Some(metadata.permissions().mode())
        };

        #[cfg(not(unix))]
        let permissions = None;

        Ok(Self {
            size: metadata.len(),
            modified,
            permissions,
            is_file: metadata.is_file(),
        })
    }
}

/// Mark a file as executable for everyone (`0o755`).
#[cfg(unix)]
pub fn set_executable(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    fs::set_permissions(path, fs::Permissions::from_mode(0o755))
}

#[cfg(not(unix))]
pub fn set_executable(_path: &Path) -> std::io::Result<()> {
    // Executability is not a permission bit outside Unix
    Ok(())
}
