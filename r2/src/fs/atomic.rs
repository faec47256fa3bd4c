//! Write-then-rename helpers.
//!
//! Files are first written to a sibling temp file, then renamed over the
//! destination, so a crash never leaves a half-written manifest, blob or
//! restored file behind.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Prefix of in-flight temp files. `gc` and the store skip these.
pub const TEMP_PREFIX: &str = ".r2-tmp-";

/// Sibling temp path for `dest`
fn temp_path_for(dest: &Path) -> io::Result<PathBuf> {
    let parent = dest.parent().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("no parent directory: {}", dest.display()),
        )
    })?;
    Ok(parent.join(format!("{}{}", TEMP_PREFIX, uuid::Uuid::new_v4().simple())))
}

/// Atomically replace `dest` with `data`, creating parent directories.
///
/// When `dest` already exists its permission bits are carried over.
pub fn write_atomic(dest: &Path, data: &[u8]) -> io::Result<()> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp = temp_path_for(dest)?;

    let result = (|| {
        let mut file = fs::File::create(&tmp)?;
        file.write_all(data)?;
        file.sync_all()?;
        if let Ok(existing) = fs::metadata(dest) {
            fs::set_permissions(&tmp, existing.permissions())?;
        }
        fs::rename(&tmp, dest)
    })();

    if result.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    result
}

/// Atomically copy `src` to `dest`, creating parent directories.
///
/// Returns the number of bytes copied.
pub fn copy_atomic(src: &Path, dest: &Path) -> io::Result<u64> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp = temp_path_for(dest)?;

    let result = (|| {
        let copied = fs::copy(src, &tmp)?;
        fs::rename(&tmp, dest)?;
        Ok(copied)
    })();

    if result.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_write_atomic_creates_parents() -> io::Result<()> {
        let temp_dir = TempDir::new()?;
        let dest = temp_dir.path().join("a/b/c.txt");

        write_atomic(&dest, b"hello")?;

        assert_eq!(fs::read(&dest)?, b"hello");
        Ok(())
    }

    #[test]
    fn test_write_atomic_replaces_and_leaves_no_temp() -> io::Result<()> {
        let temp_dir = TempDir::new()?;
        let dest = temp_dir.path().join("file.txt");
        fs::write(&dest, b"old contents")?;

        write_atomic(&dest, b"new")?;

        assert_eq!(fs::read(&dest)?, b"new");
        let leftovers: Vec<_> = fs::read_dir(temp_dir.path())?
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with(TEMP_PREFIX))
            .collect();
        assert!(leftovers.is_empty());
        Ok(())
    }

    #[test]
    #[cfg(unix)]
    fn test_write_atomic_keeps_permissions() -> io::Result<()> {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = TempDir::new()?;
        let dest = temp_dir.path().join("script.sh");
        fs::write(&dest, b"#!/bin/sh\n")?;
        fs::set_permissions(&dest, fs::Permissions::from_mode(0o750))?;

        write_atomic(&dest, b"#!/bin/sh\necho hi\n")?;

        let mode = fs::metadata(&dest)?.permissions().mode() & 0o777;
        assert_eq!(mode, 0o750);
        Ok(())
    }

    #[test]
    fn test_copy_atomic() -> io::Result<()> {
        let temp_dir = TempDir::new()?;
        let src = temp_dir.path().join("src.bin");
        let dest = temp_dir.path().join("out/dest.bin");
        fs::write(&src, b"12345")?;

        let copied = copy_atomic(&src, &dest)?;

        assert_eq!(copied, 5);
        assert_eq!(fs::read(&dest)?, b"12345");
        Ok(())
    }
}
