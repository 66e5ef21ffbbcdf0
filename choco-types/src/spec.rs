use serde::{Deserialize, Serialize};

fn default_timeout() -> i64 {
    -1
}

/// One `<package …/>` record in a list document. Every field is an XML
/// attribute; absent attributes stay at their defaults and never overlay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PackageSpec {
    #[serde(rename = "@id")]
    pub id: String,
    #[serde(rename = "@version")]
    pub version: String,
    #[serde(rename = "@source")]
    pub source: String,
    #[serde(rename = "@installArguments")]
    pub install_arguments: String,
    #[serde(rename = "@packageParameters")]
    pub package_parameters: String,

    #[serde(rename = "@user")]
    pub user: String,
    #[serde(rename = "@password")]
    pub password: String,
    #[serde(rename = "@cert")]
    pub cert: String,
    #[serde(rename = "@certPassword")]
    pub cert_password: String,

    #[serde(rename = "@cacheLocation")]
    pub cache_location: String,

    #[serde(rename = "@downloadChecksum")]
    pub download_checksum: String,
    #[serde(rename = "@downloadChecksumType")]
    pub download_checksum_type: String,
    #[serde(rename = "@downloadChecksum64")]
    pub download_checksum_x64: String,
    #[serde(rename = "@downloadChecksumType64")]
    pub download_checksum_type_x64: String,

    /// `-1` means "not set"; any other value overlays the configuration.
    #[serde(rename = "@executionTimeout", default = "default_timeout")]
    pub execution_timeout: i64,

    /// A disabled entry is skipped entirely during expansion.
    #[serde(rename = "@disabled")]
    pub disabled: bool,

    #[serde(rename = "@prerelease")]
    pub prerelease: bool,
    #[serde(rename = "@allowDowngrade")]
    pub allow_downgrade: bool,
    #[serde(rename = "@allowMultipleVersions")]
    pub allow_multiple_versions: bool,
    #[serde(rename = "@skipAutomationScripts")]
    pub skip_automation_scripts: bool,
    #[serde(rename = "@forceX86")]
    pub force_x86: bool,
    #[serde(rename = "@force")]
    pub force: bool,
    #[serde(rename = "@stopOnFirstFailure")]
    pub stop_on_first_failure: bool,
    #[serde(rename = "@exitWhenRebootDetected")]
    pub exit_when_reboot_detected: bool,
    #[serde(rename = "@pinPackage")]
    pub pin_package: bool,

    #[serde(rename = "@requireChecksums")]
    pub require_checksums: bool,
    #[serde(rename = "@allowEmptyChecksums")]
    pub allow_empty_checksums: bool,
    #[serde(rename = "@allowEmptyChecksumsSecure")]
    pub allow_empty_checksums_secure: bool,

    /// Answers every prompt for this package: clears
    /// `prompt_for_confirmation` and sets `accept_license`.
    #[serde(rename = "@confirm")]
    pub confirm: bool,

    #[serde(rename = "@useSystemPowershell")]
    pub use_system_powershell: bool,
    #[serde(rename = "@ignoreDetectedReboot")]
    pub ignore_detected_reboot: bool,
    #[serde(rename = "@disableRepositoryOptimizations")]
    pub disable_repository_optimizations: bool,
}

impl Default for PackageSpec {
    fn default() -> Self {
        PackageSpec {
            id: String::new(),
            version: String::new(),
            source: String::new(),
            install_arguments: String::new(),
            package_parameters: String::new(),
            user: String::new(),
            password: String::new(),
            cert: String::new(),
            cert_password: String::new(),
            cache_location: String::new(),
            download_checksum: String::new(),
            download_checksum_type: String::new(),
            download_checksum_x64: String::new(),
            download_checksum_type_x64: String::new(),
            execution_timeout: -1,
            disabled: false,
            prerelease: false,
            allow_downgrade: false,
            allow_multiple_versions: false,
            skip_automation_scripts: false,
            force_x86: false,
            force: false,
            stop_on_first_failure: false,
            exit_when_reboot_detected: false,
            pin_package: false,
            require_checksums: false,
            allow_empty_checksums: false,
            allow_empty_checksums_secure: false,
            confirm: false,
            use_system_powershell: false,
            ignore_detected_reboot: false,
            disable_repository_optimizations: false,
        }
    }
}

impl PackageSpec {
    pub fn with_id(id: impl Into<String>) -> Self {
        PackageSpec {
            id: id.into(),
            ..Default::default()
        }
    }
}

/// The deserialized shape of a `packages.config` document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PackagesConfig {
    #[serde(rename = "package", default)]
    pub packages: Vec<PackageSpec>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_attributes() {
        let xml = r#"
            <packages>
              <package id="a" />
              <package id="b" disabled="true" />
              <package id="c" version="1.1" source="internal" executionTimeout="600" />
            </packages>
        "#;
        let doc: PackagesConfig = quick_xml::de::from_str(xml).unwrap();
        assert_eq!(doc.packages.len(), 3);
        assert_eq!(doc.packages[0].id, "a");
        assert_eq!(doc.packages[0].execution_timeout, -1);
        assert!(doc.packages[1].disabled);
        assert_eq!(doc.packages[2].version, "1.1");
        assert_eq!(doc.packages[2].source, "internal");
        assert_eq!(doc.packages[2].execution_timeout, 600);
    }
}
