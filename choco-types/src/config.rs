use serde::{Deserialize, Serialize};

/// Everything a single command invocation needs to know, in one deep-cloneable
/// record. A per-package configuration is derived from the command-level one by
/// plain `Clone`; mutations never propagate back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    /// Command verb this configuration was built for (`install`, `upgrade`, …).
    pub command_name: String,

    /// `;`-delimited list of requested package names. Entries ending in
    /// `.config` are list-document references.
    pub package_names: String,

    /// Source locator (feed URL or local directory).
    pub source: String,

    /// Source-kind tag used to pick a source runner.
    pub source_type: String,

    /// Optional version constraint.
    pub version: Option<String>,

    pub install_arguments: String,
    pub package_parameters: String,

    pub download_checksum: String,
    pub download_checksum_type: String,
    pub download_checksum_x64: String,
    pub download_checksum_type_x64: String,

    pub cache_location: String,

    /// Seconds before an external command is considered hung. `-1` means
    /// "not set" in a list document and never overlays.
    pub execution_timeout_seconds: i64,

    pub credentials: Credentials,
    pub features: Features,
    pub platform: PlatformInfo,

    /// Dry-run: runners report what would happen without doing it.
    pub noop: bool,
    pub force: bool,
    pub force_x86: bool,

    /// Whether this is a licensed run. Promotional messaging is suppressed
    /// for licensed runs.
    pub licensed: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            command_name: String::new(),
            package_names: String::new(),
            source: String::new(),
            source_type: "normal".to_string(),
            version: None,
            install_arguments: String::new(),
            package_parameters: String::new(),
            download_checksum: String::new(),
            download_checksum_type: String::new(),
            download_checksum_x64: String::new(),
            download_checksum_type_x64: String::new(),
            cache_location: String::new(),
            execution_timeout_seconds: 2700,
            credentials: Credentials::default(),
            features: Features::default(),
            platform: PlatformInfo::default(),
            noop: false,
            force: false,
            force_x86: false,
            licensed: false,
        }
    }
}

impl Config {
    /// The `;`-split package name tokens, empties removed.
    pub fn package_name_tokens(&self) -> Vec<&str> {
        self.package_names
            .split(';')
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Credentials {
    pub user: String,
    pub password: String,
    pub certificate: String,
    pub certificate_password: String,
}

/// The boolean feature set carried on every configuration. List-document
/// overlays may only set these to `true` (with the documented exceptions);
/// they never clear them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Features {
    pub allow_empty_checksums: bool,
    pub allow_empty_checksums_secure: bool,
    pub prerelease: bool,
    pub allow_downgrade: bool,
    pub allow_multiple_versions: bool,
    pub stop_on_first_failure: bool,
    pub exit_on_reboot_detected: bool,
    pub use_enhanced_exit_codes: bool,
    pub log_environment_values: bool,
    pub pin_package: bool,
    /// Report pinned packages from `outdated` instead of skipping them.
    pub include_pinned: bool,
    pub prompt_for_confirmation: bool,
    pub accept_license: bool,
    pub regular_output: bool,
    /// Skip the scripted install provider (no package scripts run).
    pub skip_install_provider: bool,
    pub lock_transactional_install_files: bool,
    pub use_powershell_host: bool,
    pub use_repository_optimizations: bool,
    pub remove_package_information_on_uninstall: bool,
}

impl Default for Features {
    fn default() -> Self {
        Features {
            allow_empty_checksums: false,
            allow_empty_checksums_secure: true,
            prerelease: false,
            allow_downgrade: false,
            allow_multiple_versions: false,
            stop_on_first_failure: false,
            exit_on_reboot_detected: false,
            use_enhanced_exit_codes: false,
            log_environment_values: false,
            pin_package: false,
            include_pinned: false,
            prompt_for_confirmation: true,
            accept_license: false,
            regular_output: true,
            skip_install_provider: false,
            lock_transactional_install_files: true,
            use_powershell_host: true,
            use_repository_optimizations: true,
            remove_package_information_on_uninstall: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PlatformInfo {
    pub name: String,
    pub version: String,
    pub x64: bool,
}

impl Default for PlatformInfo {
    fn default() -> Self {
        PlatformInfo {
            name: std::env::consts::OS.to_string(),
            version: String::new(),
            x64: cfg!(target_pointer_width = "64"),
        }
    }
}

impl PlatformInfo {
    pub fn windows(&self) -> bool {
        self.name == "windows"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn per_package_clone_does_not_propagate() {
        let base = Config::default();
        let mut derived = base.clone();
        derived.features.prerelease = true;
        derived.package_names = "foo".to_string();
        assert!(!base.features.prerelease);
        assert!(base.package_names.is_empty());
    }

    #[test]
    fn name_tokens_skip_empties() {
        let mut config = Config::default();
        config.package_names = "a;;b; ;c".to_string();
        assert_eq!(config.package_name_tokens(), vec!["a", "b", "c"]);
    }
}
