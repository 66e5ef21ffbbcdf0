use std::path::PathBuf;

use choco_types::{PackageInformation, PackageMetadata};

/// Durable store of per-package information, keyed by package identity.
/// Losing a record is never fatal to an operation, so every method is
/// infallible at this seam; implementations log and carry on.
pub trait PackageInfoService: Send + Sync {
    /// Returns the stored record, or a fresh one when none exists.
    fn get(&self, metadata: &PackageMetadata) -> PackageInformation;
    fn save(&self, info: &PackageInformation);
    fn remove(&self, metadata: &PackageMetadata);
}

/// One JSON document per `<id>.<version>` under the info root.
#[derive(Debug)]
pub struct DiskPackageInfoService {
    root: PathBuf,
}

impl DiskPackageInfoService {
    pub fn new(root: impl Into<PathBuf>) -> DiskPackageInfoService {
        DiskPackageInfoService { root: root.into() }
    }

    fn record_dir(&self, metadata: &PackageMetadata) -> PathBuf {
        if metadata.version.is_empty() {
            self.root.join(&metadata.id)
        } else {
            self.root.join(format!("{}.{}", metadata.id, metadata.version))
        }
    }

    fn record_path(&self, metadata: &PackageMetadata) -> PathBuf {
        self.record_dir(metadata).join("package-info.json")
    }
}

impl PackageInfoService for DiskPackageInfoService {
    fn get(&self, metadata: &PackageMetadata) -> PackageInformation {
        let path = self.record_path(metadata);
        if !path.exists() {
            return PackageInformation::new(metadata.clone());
        }

        match std::fs::read_to_string(&path)
            .map_err(|e| e.to_string())
            .and_then(|text| serde_json::from_str(&text).map_err(|e| e.to_string()))
        {
            Ok(info) => info,
            Err(e) => {
                log::warn!(
                    "Unable to read package information '{}': {}",
                    path.display(),
                    e
                );
                PackageInformation::new(metadata.clone())
            }
        }
    }

    fn save(&self, info: &PackageInformation) {
        let dir = self.record_dir(&info.metadata);
        if let Err(e) = std::fs::create_dir_all(&dir) {
            log::warn!(
                "Unable to create package information directory '{}': {}",
                dir.display(),
                e
            );
            return;
        }

        let path = self.record_path(&info.metadata);
        match serde_json::to_string_pretty(info) {
            Ok(json) => {
                if let Err(e) = std::fs::write(&path, json) {
                    log::warn!(
                        "Unable to write package information '{}': {}",
                        path.display(),
                        e
                    );
                }
            }
            Err(e) => {
                log::warn!("Unable to serialize package information: {}", e);
            }
        }
    }

    fn remove(&self, metadata: &PackageMetadata) {
        let dir = self.record_dir(metadata);
        if dir.exists() {
            if let Err(e) = std::fs::remove_dir_all(&dir) {
                log::warn!(
                    "Unable to remove package information '{}': {}",
                    dir.display(),
                    e
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use choco_types::RegistrySnapshot;

    #[test]
    fn round_trips_record() {
        let dir = tempfile::tempdir().unwrap();
        let service = DiskPackageInfoService::new(dir.path());
        let metadata = PackageMetadata::new("foo", "1.0.0");

        let mut info = service.get(&metadata);
        assert_eq!(info.metadata, metadata);
        assert!(info.registry_snapshot.is_none());

        info.has_silent_uninstall = true;
        info.is_pinned = true;
        info.registry_snapshot = Some(RegistrySnapshot::default());
        service.save(&info);

        let reloaded = service.get(&metadata);
        assert!(reloaded.has_silent_uninstall);
        assert!(reloaded.is_pinned);
        assert!(reloaded.registry_snapshot.is_some());
    }

    #[test]
    fn remove_drops_record() {
        let dir = tempfile::tempdir().unwrap();
        let service = DiskPackageInfoService::new(dir.path());
        let metadata = PackageMetadata::new("foo", "1.0.0");

        let mut info = service.get(&metadata);
        info.is_side_by_side = true;
        service.save(&info);

        service.remove(&metadata);
        assert!(!service.get(&metadata).is_side_by_side);
    }
}
