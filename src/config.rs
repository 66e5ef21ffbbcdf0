use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::defaults;

#[derive(Debug, Error)]
pub enum Error {
    #[error("No default install root found for this platform")]
    NoDefaultInstallRoot,

    #[error("Error loading settings.toml file")]
    SettingsFile(#[source] FileError),
}

#[derive(Debug, Error)]
pub enum FileError {
    #[error("The file is read only and could not be written to")]
    ReadOnly,

    #[error("Could not read file")]
    Read(#[source] std::io::Error),

    #[error("Could not write file")]
    Write(#[source] std::io::Error),

    #[error("Could not convert from TOML format")]
    FromToml(#[from] toml::de::Error),

    #[error("Could not convert into TOML format")]
    ToToml(#[from] toml::ser::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    ReadOnly,
    ReadWrite,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettingsData {
    pub install_root: PathBuf,
}

impl Default for SettingsData {
    fn default() -> SettingsData {
        SettingsData {
            install_root: defaults::install_root().unwrap_or_else(|| PathBuf::from(".")),
        }
    }
}

impl SettingsData {
    fn load<P: AsRef<Path>>(path: P) -> Result<SettingsData, FileError> {
        let file = std::fs::read_to_string(path).map_err(FileError::Read)?;
        let file = toml::from_str(&file)?;
        Ok(file)
    }

    fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), FileError> {
        let mut file = File::create(path).map_err(FileError::Write)?;
        let b = toml::to_vec(&self)?;
        file.write_all(&b).map_err(FileError::Write)?;
        Ok(())
    }

    fn create<P: AsRef<Path>>(path: P) -> Result<SettingsData, FileError> {
        let file = Self::default();
        file.save(path)?;
        Ok(file)
    }
}

/// The on-disk layout every command operates against. All roots hang off one
/// install root so an entire deployment can be relocated by changing a single
/// setting.
#[derive(Debug, Clone)]
pub struct Settings {
    data: SettingsData,
    permission: Permission,
}

impl Settings {
    pub fn load_default() -> Result<Settings, Error> {
        let dir = defaults::config_path().ok_or(Error::NoDefaultInstallRoot)?;
        if !dir.exists() {
            std::fs::create_dir_all(&dir)
                .map_err(|e| Error::SettingsFile(FileError::Write(e)))?;
        }
        Self::load(dir.join("settings.toml"), Permission::ReadWrite)
    }

    pub fn load<P: AsRef<Path>>(path: P, permission: Permission) -> Result<Settings, Error> {
        let data = match SettingsData::load(path.as_ref()) {
            Ok(v) => v,
            Err(FileError::Read(_)) if permission != Permission::ReadOnly => {
                SettingsData::create(path.as_ref()).map_err(Error::SettingsFile)?
            }
            Err(e) => return Err(Error::SettingsFile(e)),
        };

        Ok(Settings { data, permission })
    }

    /// An in-memory settings record rooted at an arbitrary directory. The
    /// whole tree, markers included, lands under `root`.
    pub fn with_install_root<P: Into<PathBuf>>(root: P) -> Settings {
        Settings {
            data: SettingsData {
                install_root: root.into(),
            },
            permission: Permission::ReadWrite,
        }
    }

    pub fn permission(&self) -> Permission {
        self.permission
    }

    pub fn install_root(&self) -> &Path {
        &self.data.install_root
    }

    /// Installed packages: `<root>/lib/<name>/`.
    pub fn packages_root(&self) -> PathBuf {
        self.data.install_root.join("lib")
    }

    /// Quarantined failures: `<root>/lib-bad/<name>/`.
    pub fn package_failures_root(&self) -> PathBuf {
        self.data.install_root.join("lib-bad")
    }

    /// Rollback snapshots: `<root>/lib-bkp/<name>/`.
    pub fn package_backup_root(&self) -> PathBuf {
        self.data.install_root.join("lib-bkp")
    }

    pub fn extensions_root(&self) -> PathBuf {
        self.data.install_root.join("extensions")
    }

    pub fn templates_root(&self) -> PathBuf {
        self.data.install_root.join("templates")
    }

    pub fn hooks_root(&self) -> PathBuf {
        self.data.install_root.join("hooks")
    }

    /// Durable per-package information store.
    pub fn package_info_root(&self) -> PathBuf {
        self.data.install_root.join(".chocolatey")
    }

    /// Whether `path` is one of the two roots nothing may ever delete or
    /// relocate: the install root itself and the packages root.
    pub fn is_protected_location(&self, path: &Path) -> bool {
        path == self.install_root() || path == self.packages_root()
    }
}
