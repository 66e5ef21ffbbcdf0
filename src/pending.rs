use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use dashmap::DashMap;
use thiserror::Error;

use choco_types::{Config, PackageResult};

use crate::config::Settings;

/// Name of the "operation in progress" marker written inside an install
/// location for the duration of a package's post-pipeline.
pub const PENDING_FILE_NAME: &str = ".chocolateyPending";

#[derive(Debug, Error)]
pub enum PendingError {
    #[error("Could not exclusively open pending file '{}'", path.display())]
    Lock {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Could not write pending file '{}'", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Writes and clears per-package pending markers. When transactional file
/// locking is enabled the marker is held open with write sharing disallowed;
/// the handle lives in a process-local map keyed by lowercased package name
/// until `remove_pending` drops it.
#[derive(Debug, Default)]
pub struct PendingMarker {
    locks: DashMap<String, File>,
}

impl PendingMarker {
    pub fn new() -> PendingMarker {
        PendingMarker::default()
    }

    fn marker_path(install_location: &Path) -> PathBuf {
        install_location.join(PENDING_FILE_NAME)
    }

    /// Marks the operation for `result` as in progress. A missing or
    /// insufficiently specific install location records an error on the
    /// result and writes nothing. Failing to acquire the lock is fatal.
    pub fn set_pending(
        &self,
        result: &mut PackageResult,
        config: &Config,
        settings: &Settings,
    ) -> Result<(), PendingError> {
        let location = match guarded_location(result, settings) {
            Some(v) => v,
            None => {
                result.error(format!(
                    "Install location is not specific enough, cannot run set pending: {:?}",
                    result.install_location
                ));
                return Ok(());
            }
        };

        let path = Self::marker_path(&location);

        if config.features.lock_transactional_install_files {
            let mut options = OpenOptions::new();
            options.create(true).write(true).truncate(true);
            #[cfg(windows)]
            {
                use std::os::windows::fs::OpenOptionsExt;
                options.share_mode(0);
            }

            let mut file = options.open(&path).map_err(|source| PendingError::Lock {
                path: path.clone(),
                source,
            })?;
            file.write_all(result.name.as_bytes())
                .map_err(|source| PendingError::Write {
                    path: path.clone(),
                    source,
                })?;

            log::debug!("Holding pending lock for '{}'", result.name);
            self.locks.insert(result.name.to_lowercase(), file);
        } else {
            std::fs::write(&path, result.name.as_bytes()).map_err(|source| {
                PendingError::Write {
                    path: path.clone(),
                    source,
                }
            })?;
        }

        Ok(())
    }

    /// Releases the retained lock handle (if any) and deletes the marker,
    /// but only when the operation succeeded. A failed operation leaves the
    /// marker behind so a later run can see the package never finished.
    pub fn remove_pending(
        &self,
        result: &PackageResult,
        _config: &Config,
        settings: &Settings,
    ) {
        let location = match guarded_location(result, settings) {
            Some(v) => v,
            None => return,
        };

        // Handle must drop before the delete; an exclusively-held file
        // cannot be removed on Windows.
        self.locks.remove(&result.name.to_lowercase());

        if !result.success {
            return;
        }

        let path = Self::marker_path(&location);
        if path.exists() {
            if let Err(e) = std::fs::remove_file(&path) {
                log::warn!("Unable to remove pending file '{}': {}", path.display(), e);
            }
        }
    }

    #[cfg(test)]
    fn holds_lock(&self, name: &str) -> bool {
        self.locks.contains_key(&name.to_lowercase())
    }
}

fn guarded_location(result: &PackageResult, settings: &Settings) -> Option<PathBuf> {
    let location = result.install_location.as_ref()?;
    if settings.is_protected_location(location) {
        return None;
    }
    Some(location.clone())
}
