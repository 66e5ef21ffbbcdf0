use choco_types::{EnvironmentSnapshot, RegistrySnapshot};

/// Reader for installed-program entries and persisted environment variables.
///
/// The platform decides the implementation: on Windows the live registry is
/// read, everywhere else every read yields an empty snapshot and touches
/// nothing.
pub trait InstallerRegistry: Send + Sync {
    fn installer_keys(&self) -> RegistrySnapshot;
    fn environment_values(&self) -> EnvironmentSnapshot;
}

/// Registry reader for platforms without an installer registry.
#[derive(Debug, Default)]
pub struct NullRegistry;

impl InstallerRegistry for NullRegistry {
    fn installer_keys(&self) -> RegistrySnapshot {
        RegistrySnapshot::default()
    }

    fn environment_values(&self) -> EnvironmentSnapshot {
        EnvironmentSnapshot::default()
    }
}

pub fn platform_registry() -> std::sync::Arc<dyn InstallerRegistry> {
    #[cfg(windows)]
    {
        std::sync::Arc::new(windows::WindowsRegistry)
    }
    #[cfg(not(windows))]
    {
        std::sync::Arc::new(NullRegistry)
    }
}

#[cfg(windows)]
pub mod windows {
    use choco_types::{
        EnvironmentSnapshot, EnvironmentVariable, InstallerKey, RegistrySnapshot,
    };
    use winreg::enums::{
        HKEY_CURRENT_USER, HKEY_LOCAL_MACHINE, KEY_READ, KEY_WOW64_32KEY, KEY_WOW64_64KEY,
    };
    use winreg::RegKey;

    use super::InstallerRegistry;

    const UNINSTALL_PATH: &str = r"Software\Microsoft\Windows\CurrentVersion\Uninstall";
    const USER_ENVIRONMENT_PATH: &str = "Environment";
    const MACHINE_ENVIRONMENT_PATH: &str =
        r"SYSTEM\CurrentControlSet\Control\Session Manager\Environment";

    #[derive(Debug, Default)]
    pub struct WindowsRegistry;

    impl InstallerRegistry for WindowsRegistry {
        fn installer_keys(&self) -> RegistrySnapshot {
            let mut snapshot = RegistrySnapshot::default();

            let scans = [
                (HKEY_LOCAL_MACHINE, "HKLM", KEY_WOW64_64KEY),
                (HKEY_LOCAL_MACHINE, "HKLM", KEY_WOW64_32KEY),
                (HKEY_CURRENT_USER, "HKCU", 0),
            ];

            for (hive, hive_name, flags) in scans.iter() {
                let root = RegKey::predef(*hive);
                let uninstall =
                    match root.open_subkey_with_flags(UNINSTALL_PATH, KEY_READ | flags) {
                        Ok(v) => v,
                        Err(_) => continue,
                    };

                for name in uninstall.enum_keys().filter_map(Result::ok) {
                    let subkey = match uninstall.open_subkey_with_flags(&name, KEY_READ | flags)
                    {
                        Ok(v) => v,
                        Err(_) => continue,
                    };

                    let key_path = format!("{}\\{}\\{}", hive_name, UNINSTALL_PATH, name);
                    if snapshot.contains(&key_path) {
                        continue;
                    }

                    let quiet: String = subkey
                        .get_value("QuietUninstallString")
                        .unwrap_or_default();
                    let uninstall_string = if quiet.is_empty() {
                        subkey.get_value("UninstallString").unwrap_or_default()
                    } else {
                        quiet.clone()
                    };

                    snapshot.keys.push(InstallerKey {
                        key_path,
                        display_name: subkey.get_value("DisplayName").unwrap_or_default(),
                        display_version: subkey.get_value("DisplayVersion").unwrap_or_default(),
                        uninstall_string,
                        install_location: subkey
                            .get_value("InstallLocation")
                            .unwrap_or_default(),
                        has_quiet_uninstall: !quiet.is_empty(),
                    });
                }
            }

            snapshot
        }

        fn environment_values(&self) -> EnvironmentSnapshot {
            let mut snapshot = EnvironmentSnapshot::default();

            let scans = [
                (HKEY_CURRENT_USER, "HKCU", USER_ENVIRONMENT_PATH),
                (HKEY_LOCAL_MACHINE, "HKLM", MACHINE_ENVIRONMENT_PATH),
            ];

            for (hive, hive_name, path) in scans.iter() {
                let root = RegKey::predef(*hive);
                let env = match root.open_subkey_with_flags(path, KEY_READ) {
                    Ok(v) => v,
                    Err(_) => continue,
                };

                for name in env.enum_values().filter_map(Result::ok).map(|(n, _)| n) {
                    let value: String = match env.get_value(&name) {
                        Ok(v) => v,
                        Err(_) => continue,
                    };
                    snapshot.variables.push(EnvironmentVariable {
                        parent_key: format!("{}\\{}", hive_name, path),
                        name,
                        value,
                    });
                }
            }

            snapshot
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_registry_is_empty() {
        let registry = NullRegistry;
        assert!(registry.installer_keys().is_empty());
        assert!(registry.environment_values().is_empty());
    }
}
