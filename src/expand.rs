use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use dashmap::DashMap;
use thiserror::Error;

use choco_types::{Config, PackageResult, PackageSpec, PackagesConfig, LIST_DOCUMENT_EXTENSION};

use crate::runner::SourceDispatcher;

#[derive(Debug, Error)]
pub enum ListDocumentError {
    #[error("Could not find '{}' in the command line or file system", path.display())]
    NotFound { path: PathBuf },

    #[error("Could not read '{}'", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("'{}' is not a valid package list document", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: quick_xml::DeError,
    },
}

/// Expands a command-level configuration into a lazily-enumerated sequence of
/// per-package configurations.
///
/// `.config` name tokens are resolved into list documents up front (a broken
/// document records an error result and is skipped); the per-package deep
/// copies themselves are only produced as the sequence is walked, so a caller
/// stopping early never pays for the rest.
pub fn expand_configs(
    config: &Config,
    dispatcher: &SourceDispatcher,
    results: &DashMap<String, PackageResult>,
) -> ConfigExpansion {
    let mut plain_names: Vec<String> = Vec::new();
    let mut specs: VecDeque<PackageSpec> = VecDeque::new();

    for token in config.package_name_tokens() {
        if !token.to_lowercase().ends_with(LIST_DOCUMENT_EXTENSION) {
            plain_names.push(token.to_string());
            continue;
        }

        match load_list_document(Path::new(token)) {
            Ok(document) => {
                log::debug!(
                    "Using {} package entries from '{}'",
                    document.packages.len(),
                    token
                );
                specs.extend(document.packages.into_iter().filter(|s| !s.disabled));
            }
            Err(e) => {
                let file_name = Path::new(token)
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| token.to_string());
                log::error!("{}", e);
                results.insert(
                    file_name.clone(),
                    PackageResult::with_error(file_name, e.to_string()),
                );
            }
        }
    }

    let mut remainder = config.clone();
    remainder.package_names = plain_names.join(";");

    ConfigExpansion {
        base: config.clone(),
        known_kinds: specs
            .iter()
            .filter(|s| !s.source.is_empty() && dispatcher.is_known_source_type(&s.source))
            .map(|s| s.source.clone())
            .collect(),
        specs,
        remainder: Some(remainder),
    }
}

fn load_list_document(path: &Path) -> Result<PackagesConfig, ListDocumentError> {
    if !path.exists() {
        return Err(ListDocumentError::NotFound {
            path: path.to_path_buf(),
        });
    }

    let text = std::fs::read_to_string(path).map_err(|source| ListDocumentError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    quick_xml::de::from_str(&text).map_err(|source| ListDocumentError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

pub struct ConfigExpansion {
    base: Config,
    specs: VecDeque<PackageSpec>,
    known_kinds: Vec<String>,
    remainder: Option<Config>,
}

impl Iterator for ConfigExpansion {
    type Item = Config;

    fn next(&mut self) -> Option<Config> {
        if let Some(spec) = self.specs.pop_front() {
            return Some(apply_spec(&self.base, &spec, &self.known_kinds));
        }
        // The (possibly reduced) command-level configuration goes last.
        self.remainder.take()
    }
}

/// Overlays one list-document entry onto a deep copy of the base
/// configuration. Text fields overlay only when non-empty; boolean fields
/// only ever set features, with the few documented exceptions that clear
/// them.
fn apply_spec(base: &Config, spec: &PackageSpec, known_kinds: &[String]) -> Config {
    let mut config = base.clone();
    config.package_names = spec.id.clone();

    if !spec.source.is_empty() {
        config.source = spec.source.clone();
        if known_kinds.iter().any(|k| k == &spec.source) {
            config.source_type = spec.source.clone();
        }
    }
    if !spec.version.is_empty() {
        config.version = Some(spec.version.clone());
    }
    if !spec.install_arguments.is_empty() {
        config.install_arguments = spec.install_arguments.clone();
    }
    if !spec.package_parameters.is_empty() {
        config.package_parameters = spec.package_parameters.clone();
    }
    if !spec.user.is_empty() {
        config.credentials.user = spec.user.clone();
    }
    if !spec.password.is_empty() {
        config.credentials.password = spec.password.clone();
    }
    if !spec.cert.is_empty() {
        config.credentials.certificate = spec.cert.clone();
    }
    if !spec.cert_password.is_empty() {
        config.credentials.certificate_password = spec.cert_password.clone();
    }
    if !spec.cache_location.is_empty() {
        config.cache_location = spec.cache_location.clone();
    }
    if !spec.download_checksum.is_empty() {
        config.download_checksum = spec.download_checksum.clone();
    }
    if !spec.download_checksum_type.is_empty() {
        config.download_checksum_type = spec.download_checksum_type.clone();
    }
    if !spec.download_checksum_x64.is_empty() {
        config.download_checksum_x64 = spec.download_checksum_x64.clone();
    }
    if !spec.download_checksum_type_x64.is_empty() {
        config.download_checksum_type_x64 = spec.download_checksum_type_x64.clone();
    }
    if spec.execution_timeout != -1 {
        config.execution_timeout_seconds = spec.execution_timeout;
    }

    let features = &mut config.features;
    if spec.prerelease {
        features.prerelease = true;
    }
    if spec.allow_downgrade {
        features.allow_downgrade = true;
    }
    if spec.allow_multiple_versions {
        features.allow_multiple_versions = true;
    }
    if spec.skip_automation_scripts {
        features.skip_install_provider = true;
    }
    if spec.stop_on_first_failure {
        features.stop_on_first_failure = true;
    }
    if spec.exit_when_reboot_detected {
        features.exit_on_reboot_detected = true;
    }
    if spec.pin_package {
        features.pin_package = true;
    }
    if spec.allow_empty_checksums {
        features.allow_empty_checksums = true;
    }
    if spec.allow_empty_checksums_secure {
        features.allow_empty_checksums_secure = true;
    }
    if spec.require_checksums {
        features.allow_empty_checksums = false;
        features.allow_empty_checksums_secure = false;
    }
    if spec.confirm {
        features.prompt_for_confirmation = false;
        features.accept_license = true;
    }
    if spec.use_system_powershell {
        features.use_powershell_host = false;
    }
    if spec.ignore_detected_reboot {
        features.exit_on_reboot_detected = false;
    }
    if spec.disable_repository_optimizations {
        features.use_repository_optimizations = false;
    }

    if spec.force_x86 {
        config.force_x86 = true;
    }
    if spec.force {
        config.force = true;
    }

    config
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::{NoopSourceRunner, SourceDispatcher};
    use std::sync::Arc;

    fn dispatcher() -> SourceDispatcher {
        SourceDispatcher::new(vec![
            Arc::new(NoopSourceRunner::new("normal")),
            Arc::new(NoopSourceRunner::new("internal")),
        ])
    }

    fn write_config(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn expands_list_document_with_disabled_entry() {
        let dir = tempfile::tempdir().unwrap();
        let doc = write_config(
            dir.path(),
            "packages.config",
            r#"<packages>
                 <package id="a" />
                 <package id="b" disabled="true" />
                 <package id="c" source="internal" />
               </packages>"#,
        );

        let mut config = Config::default();
        config.package_names = doc.to_string_lossy().into_owned();

        let results = DashMap::new();
        let expanded: Vec<Config> =
            expand_configs(&config, &dispatcher(), &results).collect();

        assert_eq!(expanded.len(), 3);
        assert_eq!(expanded[0].package_names, "a");
        assert_eq!(expanded[1].package_names, "c");
        assert_eq!(expanded[1].source_type, "internal");
        // The bare remainder goes last, stripped of the .config token.
        assert_eq!(expanded[2].package_names, "");
        assert!(results.is_empty());
    }

    #[test]
    fn missing_document_records_error_result() {
        let mut config = Config::default();
        config.package_names = "pkg1;/nowhere/missing.config".to_string();

        let results = DashMap::new();
        let expanded: Vec<Config> =
            expand_configs(&config, &dispatcher(), &results).collect();

        assert_eq!(expanded.len(), 1);
        assert_eq!(expanded[0].package_names, "pkg1");

        let entry = results.get("missing.config").unwrap();
        assert!(!entry.success);
    }

    #[test]
    fn boolean_overlays_only_set() {
        let dir = tempfile::tempdir().unwrap();
        let doc = write_config(
            dir.path(),
            "one.config",
            r#"<packages>
                 <package id="a" prerelease="true" requireChecksums="true"
                          confirm="true" useSystemPowershell="true"
                          ignoreDetectedReboot="true" executionTimeout="600" />
               </packages>"#,
        );

        let mut config = Config::default();
        config.package_names = doc.to_string_lossy().into_owned();
        config.features.allow_empty_checksums = true;
        config.features.exit_on_reboot_detected = true;

        let results = DashMap::new();
        let expanded: Vec<Config> =
            expand_configs(&config, &dispatcher(), &results).collect();
        let per_package = &expanded[0];

        assert!(per_package.features.prerelease);
        // requireChecksums clears the empty-checksum allowances.
        assert!(!per_package.features.allow_empty_checksums);
        assert!(!per_package.features.allow_empty_checksums_secure);
        // confirm answers prompts and accepts licenses.
        assert!(!per_package.features.prompt_for_confirmation);
        assert!(per_package.features.accept_license);
        // The three clearing attributes clear their features.
        assert!(!per_package.features.use_powershell_host);
        assert!(!per_package.features.exit_on_reboot_detected);
        assert_eq!(per_package.execution_timeout_seconds, 600);
    }

    #[test]
    fn unset_timeout_never_overlays() {
        let dir = tempfile::tempdir().unwrap();
        let doc = write_config(
            dir.path(),
            "one.config",
            r#"<packages><package id="a" /></packages>"#,
        );

        let mut config = Config::default();
        config.package_names = doc.to_string_lossy().into_owned();
        config.execution_timeout_seconds = 1234;

        let results = DashMap::new();
        let expanded: Vec<Config> =
            expand_configs(&config, &dispatcher(), &results).collect();
        assert_eq!(expanded[0].execution_timeout_seconds, 1234);
    }

    #[test]
    fn expansion_is_idempotent_and_nonmutating() {
        let dir = tempfile::tempdir().unwrap();
        let doc = write_config(
            dir.path(),
            "list.config",
            r#"<packages>
                 <package id="a" prerelease="true" />
                 <package id="b" version="2.0" />
               </packages>"#,
        );

        let mut config = Config::default();
        config.package_names = format!("plain;{}", doc.to_string_lossy());
        let before = config.clone();

        let results = DashMap::new();
        let first: Vec<Config> =
            expand_configs(&config, &dispatcher(), &results).collect();
        let second: Vec<Config> =
            expand_configs(&config, &dispatcher(), &results).collect();

        assert_eq!(first, second);
        assert_eq!(config, before);
    }
}
