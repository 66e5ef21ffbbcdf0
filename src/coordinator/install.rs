use std::path::{Path, PathBuf};

use choco_types::{exit_code, Config, PackageResult, RegistrySnapshot};

use crate::defaults::env_vars;
use crate::service::Event;

use super::{Command, Coordinator, CoordinatorError};

impl Coordinator {
    /// The per-package post-materialization pipeline for install and
    /// upgrade, invoked from inside the source runner once a package's
    /// payload is on disk. Step order is part of the contract.
    pub(crate) fn handle_package_result(
        &self,
        result: &mut PackageResult,
        config: &Config,
        command: Command,
    ) -> Result<(), CoordinatorError> {
        let process = &self.services.process;

        process.reset_environment(config);
        self.pending.set_pending(result, config, &self.settings)?;

        if result.success {
            log::info!(
                " {} v{} {} (exit code {}).",
                result.name,
                result.metadata.version,
                command.past_tense(),
                result.exit_code
            );
        } else {
            log::error!(
                " {} v{} was not {} (exit code {}).",
                result.name,
                result.metadata.version,
                command.past_tense(),
                result.exit_code
            );
        }

        let mut info = self.services.package_info.get(&result.metadata);
        if config.features.allow_multiple_versions {
            log::warn!(
                "Side-by-side installation ({}) is deprecated and will be removed; \
                 treating it as supported for now.",
                result.name
            );
            info.is_side_by_side = true;
        }

        let windows = config.platform.windows();
        let mut new_installer_keys: Option<RegistrySnapshot> = None;

        if result.success && windows && !config.features.skip_install_provider {
            let installers_before = self.snapshotter.snapshot_installers();
            let env_before = self.snapshotter.snapshot_env();

            let scripts_ran = self.services.scripting.install(config, result);
            if scripts_ran {
                // Package scripts may have scheduled a restart.
                process.cancel_pending_reboot();
            }

            let diff = self
                .snapshotter
                .diff_installers(&installers_before, &self.snapshotter.snapshot_installers());
            if !diff.is_empty() {
                if diff.keys[0].has_quiet_uninstall {
                    info.has_silent_uninstall = true;
                }
                info.registry_snapshot = Some(diff.clone());
                new_installer_keys = Some(diff);
            }

            let (changed, removed) =
                self.snapshotter.diff_env(&env_before, &self.snapshotter.snapshot_env());
            self.snapshotter.log_env_changes(
                &changed,
                &removed,
                config.features.log_environment_values,
            );
        }

        if windows {
            self.services.files.normalize_attributes(config, result);
            self.services.config_transforms.run(config, result);
            info.files_snapshot = Some(self.services.files.capture(config, result));
            self.write_arch_ignore_files(result, config);
            self.services.shims.install(config, result);
        } else if result.success {
            self.services.config_transforms.run(config, result);
            info.files_snapshot = Some(self.services.files.capture(config, result));
        }

        if result.success {
            self.sideload.handle(result, config, false);
            info.arguments = Some(self.services.cipher.encrypt(&replay_arguments(config)));
            info.is_pinned = config.features.pin_package;
        }

        self.set_install_location_env(result, new_installer_keys.as_ref());

        self.services.package_info.save(&info);
        self.failure.ensure_failure_path_clean(&result.name);
        self.services.events.publish(Event::HandlePackageResultCompleted {
            result: result.clone(),
            config: config.clone(),
            command_name: config.command_name.clone(),
        });
        self.pending.remove_pending(result, config, &self.settings);

        if result.reboot_required() && config.features.exit_on_reboot_detected {
            self.services
                .process
                .set_exit_code(exit_code::ERROR_INSTALL_SUSPEND);
            return Err(CoordinatorError::RebootRequired {
                name: result.name.clone(),
            });
        }

        if !result.success {
            self.failure.handle(result, config, true, true);
            if config.features.stop_on_first_failure {
                return Err(CoordinatorError::StopOnFirstFailure {
                    name: result.name.clone(),
                });
            }
            return Ok(());
        }

        self.failure.remove_rollback(&result.name);
        if let Some(location) = result.install_location.as_ref() {
            log::info!("  Software installed to '{}'", location.display());
        }

        Ok(())
    }

    /// Runs the package's before-modify scripts while the old version is
    /// still intact.
    pub(crate) fn handle_before_modify(
        &self,
        result: &mut PackageResult,
        config: &Config,
    ) -> Result<(), CoordinatorError> {
        if config.platform.windows() && !config.features.skip_install_provider {
            self.services.scripting.before_modify(config, result);
        }
        Ok(())
    }

    /// Marks wrong-architecture tool executables with sibling `.ignore`
    /// files so they never get shimmed. A package that only ships the other
    /// architecture gets those copies shimmed as-is instead.
    fn write_arch_ignore_files(&self, result: &PackageResult, config: &Config) {
        let location = match result.install_location.as_ref() {
            Some(v) if v.exists() => v,
            _ => return,
        };

        let x86 = exe_files(&location.join("tools").join("x86"));
        let x64 = exe_files(&location.join("tools").join("x64"));

        let target_x64 = config.platform.x64 && !config.force_x86;
        let (wrong_arch, right_arch) = if target_x64 { (&x86, &x64) } else { (&x64, &x86) };

        if right_arch.is_empty() && !wrong_arch.is_empty() {
            // Nothing ships for this architecture; shim the other copies.
            return;
        }

        for exe in wrong_arch {
            let mut marker = exe.as_os_str().to_os_string();
            marker.push(".ignore");
            if let Err(e) = std::fs::write(PathBuf::from(&marker), b"") {
                log::warn!(
                    "Unable to write ignore marker for '{}': {}",
                    exe.display(),
                    e
                );
            }
        }
    }

    /// Resolves the `ChocolateyPackageInstallLocation` process variable:
    /// a matching tools directory wins if the variable is still unset, the
    /// scripting host's own value survives, the result's install location
    /// is the fallback, and a fresh installer key overrides everything.
    fn set_install_location_env(
        &self,
        result: &PackageResult,
        new_installer_keys: Option<&RegistrySnapshot>,
    ) {
        let process = &self.services.process;

        if let Some(tools) = process.env_var(env_vars::TOOLS_LOCATION) {
            let candidate = Path::new(&tools).join(&result.name);
            if candidate.is_dir()
                && process.env_var(env_vars::PACKAGE_INSTALL_LOCATION).is_none()
            {
                process.set_env_var(
                    env_vars::PACKAGE_INSTALL_LOCATION,
                    &candidate.to_string_lossy(),
                );
            }
        }

        if process.env_var(env_vars::PACKAGE_INSTALL_LOCATION).is_none() {
            if let Some(location) = result.install_location.as_ref() {
                process.set_env_var(
                    env_vars::PACKAGE_INSTALL_LOCATION,
                    &location.to_string_lossy(),
                );
            }
        }

        if let Some(keys) = new_installer_keys {
            if let Some(key) = keys.keys.iter().find(|k| !k.install_location.is_empty()) {
                process.set_env_var(env_vars::PACKAGE_INSTALL_LOCATION, &key.install_location);
            }
        }
    }
}

fn exe_files(dir: &Path) -> Vec<PathBuf> {
    let entries = match std::fs::read_dir(dir) {
        Ok(v) => v,
        Err(_) => return Vec::new(),
    };

    let mut exes: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|e| e.path())
        .filter(|p| {
            p.is_file()
                && p.extension()
                    .map(|ext| ext.eq_ignore_ascii_case("exe"))
                    .unwrap_or(false)
        })
        .collect();
    exes.sort();
    exes
}

fn replay_arguments(config: &Config) -> String {
    let mut parts: Vec<String> = Vec::new();
    if !config.install_arguments.is_empty() {
        parts.push(format!("--install-arguments=\"{}\"", config.install_arguments));
    }
    if !config.package_parameters.is_empty() {
        parts.push(format!("--package-parameters=\"{}\"", config.package_parameters));
    }
    if config.features.prerelease {
        parts.push("--prerelease".to_string());
    }
    parts.join(" ")
}
