use std::path::PathBuf;

use directories::BaseDirs;

/// Names of the process environment variables the engine reads or writes.
pub mod env_vars {
    /// Read+write: where the most recent package landed, for child processes.
    pub const PACKAGE_INSTALL_LOCATION: &str = "ChocolateyPackageInstallLocation";
    /// Read: the shared tools directory, if the host machine has one.
    pub const TOOLS_LOCATION: &str = "ChocolateyToolsLocation";
    /// Read: installer type hint left behind by package scripts.
    pub const PACKAGE_INSTALLER_TYPE: &str = "ChocolateyPackageInstallerType";
    /// Read: overrides the default install root.
    pub const INSTALL_ROOT: &str = "ChocolateyInstall";
}

/// The default root under which the whole directory layout lives.
pub fn install_root() -> Option<PathBuf> {
    if let Ok(root) = std::env::var(env_vars::INSTALL_ROOT) {
        if !root.is_empty() {
            return Some(PathBuf::from(root));
        }
    }

    #[cfg(windows)]
    {
        Some(PathBuf::from(r"C:\ProgramData\chocolatey"))
    }
    #[cfg(not(windows))]
    {
        BaseDirs::new().map(|x| x.data_dir().join("chocolatey"))
    }
}

pub fn config_path() -> Option<PathBuf> {
    BaseDirs::new().map(|x| x.config_dir().join("choco"))
}
