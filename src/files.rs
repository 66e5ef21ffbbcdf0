use std::path::Path;

use sha2::{Digest, Sha256};

use choco_types::{Config, FileEntry, FilesSnapshot, PackageResult};

/// File-level housekeeping around an install location: attribute
/// normalization before capture, and the checksummed files snapshot that
/// uninstall later compares against.
pub trait FilesService: Send + Sync {
    fn normalize_attributes(&self, config: &Config, result: &PackageResult);
    fn capture(&self, config: &Config, result: &PackageResult) -> FilesSnapshot;
}

#[derive(Debug, Default)]
pub struct DiskFilesService;

impl FilesService for DiskFilesService {
    /// Strips read-only attributes so captured files can be modified and
    /// removed later. Individual failures are logged and skipped.
    fn normalize_attributes(&self, _config: &Config, result: &PackageResult) {
        let root = match result.install_location.as_ref() {
            Some(v) if v.exists() => v,
            _ => return,
        };

        walk(root, &mut |path| {
            let metadata = match std::fs::metadata(path) {
                Ok(v) => v,
                Err(e) => {
                    log::warn!("Unable to read attributes of '{}': {}", path.display(), e);
                    return;
                }
            };
            let mut permissions = metadata.permissions();
            if permissions.readonly() {
                #[allow(clippy::permissions_set_readonly_false)]
                permissions.set_readonly(false);
                if let Err(e) = std::fs::set_permissions(path, permissions) {
                    log::warn!(
                        "Unable to normalize attributes of '{}': {}",
                        path.display(),
                        e
                    );
                }
            }
        });
    }

    /// Captures every file under the install location with a SHA-256
    /// checksum. Unreadable files are recorded with an empty checksum.
    fn capture(&self, _config: &Config, result: &PackageResult) -> FilesSnapshot {
        let mut snapshot = FilesSnapshot::default();
        let root = match result.install_location.as_ref() {
            Some(v) if v.exists() => v,
            _ => return snapshot,
        };

        walk(root, &mut |path| {
            let checksum = match std::fs::read(path) {
                Ok(bytes) => {
                    let mut hasher = Sha256::new();
                    hasher.update(&bytes);
                    format!("{:x}", hasher.finalize())
                }
                Err(e) => {
                    log::warn!("Unable to checksum '{}': {}", path.display(), e);
                    String::new()
                }
            };
            snapshot.files.push(FileEntry {
                path: path.to_path_buf(),
                checksum,
            });
        });

        snapshot.files.sort_by(|a, b| a.path.cmp(&b.path));
        snapshot
    }
}

fn walk(dir: &Path, visit: &mut dyn FnMut(&Path)) {
    let entries = match std::fs::read_dir(dir) {
        Ok(v) => v,
        Err(e) => {
            log::warn!("Unable to read directory '{}': {}", dir.display(), e);
            return;
        }
    };

    for entry in entries.filter_map(Result::ok) {
        let path = entry.path();
        if path.is_dir() {
            walk(&path, visit);
        } else {
            visit(&path);
        }
    }
}
