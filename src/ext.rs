use std::io;
use std::path::Path;

/// Recursively copies `src` into `dst`, creating directories as needed.
pub(crate) fn copy_dir_all(src: &Path, dst: &Path) -> io::Result<()> {
    std::fs::create_dir_all(dst)?;
    for entry in std::fs::read_dir(src)? {
        let entry = entry?;
        let target = dst.join(entry.file_name());
        if entry.path().is_dir() {
            copy_dir_all(&entry.path(), &target)?;
        } else {
            std::fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

/// Moves a directory, falling back to copy-then-delete when a rename cannot
/// cross the underlying filesystem boundary.
pub(crate) fn move_dir(src: &Path, dst: &Path) -> io::Result<()> {
    if let Some(parent) = dst.parent() {
        std::fs::create_dir_all(parent)?;
    }
    match std::fs::rename(src, dst) {
        Ok(()) => Ok(()),
        Err(_) => {
            copy_dir_all(src, dst)?;
            std::fs::remove_dir_all(src)
        }
    }
}

/// Removes a directory tree if it exists, logging rather than failing.
pub(crate) fn remove_dir_if_exists(path: &Path) {
    if path.exists() {
        if let Err(e) = std::fs::remove_dir_all(path) {
            log::warn!("Unable to remove directory '{}': {}", path.display(), e);
        }
    }
}
