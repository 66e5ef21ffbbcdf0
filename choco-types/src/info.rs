use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::result::PackageMetadata;
use crate::snapshot::RegistrySnapshot;

/// Durable per-package record, persisted by the package-info store from first
/// install until the store drops it. Updated exactly once per successful
/// post-pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageInformation {
    pub metadata: PackageMetadata,
    pub registry_snapshot: Option<RegistrySnapshot>,
    pub files_snapshot: Option<FilesSnapshot>,
    pub has_silent_uninstall: bool,
    pub is_side_by_side: bool,
    pub is_pinned: bool,
    /// Encrypted argument-replay blob. Key management belongs to the
    /// encrypting collaborator.
    pub arguments: Option<String>,
}

impl PackageInformation {
    pub fn new(metadata: PackageMetadata) -> Self {
        PackageInformation {
            metadata,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilesSnapshot {
    pub files: Vec<FileEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileEntry {
    pub path: PathBuf,
    pub checksum: String,
}
