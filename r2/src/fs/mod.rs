//! File system helpers.

pub mod atomic;
pub mod metadata;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

const MAX_LINK_HOPS: usize = 40;

/// Make `path` absolute against the current directory without resolving
/// symlinks (a tracked dotfile symlink stays a symlink path).
pub fn absolutize(path: &Path) -> io::Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

/// Follow `path` through symlinks to the file they end at. The final file
/// need not exist, so a dangling link resolves to where it points.
pub fn resolve_symlinks(path: &Path) -> io::Result<PathBuf> {
    let mut current = path.to_path_buf();

    for _ in 0..MAX_LINK_HOPS {
        match fs::symlink_metadata(&current) {
            Ok(meta) if meta.file_type().is_symlink() => {
                let target = fs::read_link(&current)?;
                current = match current.parent() {
                    Some(parent) => parent.join(target),
                    None => target,
                };
            }
            Ok(_) => return Ok(current),
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(current),
            Err(e) => return Err(e),
        }
    }

    Err(io::Error::new(
        io::ErrorKind::Other,
        format!("too many levels of symbolic links: {}", path.display()),
    ))
}
