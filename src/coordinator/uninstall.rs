use std::path::PathBuf;

use choco_types::{exit_code, Config, PackageResult};

use crate::ext;

use super::{Coordinator, CoordinatorError};

impl Coordinator {
    /// The per-package uninstall pipeline. A failed uninstall always
    /// returns an error so the source runner halts its package removal.
    pub(crate) fn handle_package_uninstall(
        &self,
        result: &mut PackageResult,
        config: &Config,
    ) -> Result<(), CoordinatorError> {
        // Legacy side-by-side installs carry the version in the directory
        // name; recover the real location before touching anything.
        if let Some(location) = result.install_location.clone() {
            if !location.exists() && !result.metadata.version.is_empty() {
                let mut versioned = location.into_os_string();
                versioned.push(format!(".{}", result.metadata.version));
                let versioned = PathBuf::from(versioned);
                if versioned.exists() {
                    result.install_location = Some(versioned);
                }
            }
        }

        if config.platform.windows() {
            self.services.shims.uninstall(config, result);
            if !config.features.skip_install_provider {
                self.services.scripting.uninstall(config, result);
            }
            if result.success {
                self.services.auto_uninstaller.run(config, result);
            }
            self.services.process.cancel_pending_reboot();
        }

        if result.success {
            self.uninstall_cleanup(result, config);
        } else {
            self.failure.handle(result, config, false, false);
        }

        if result.reboot_required() && config.features.exit_on_reboot_detected {
            self.services
                .process
                .set_exit_code(exit_code::ERROR_INSTALL_SUSPEND);
            return Err(CoordinatorError::RebootRequired {
                name: result.name.clone(),
            });
        }

        if !result.success {
            return Err(CoordinatorError::UninstallFailed {
                name: result.name.clone(),
            });
        }

        Ok(())
    }

    fn uninstall_cleanup(&self, result: &mut PackageResult, config: &Config) {
        if config.features.remove_package_information_on_uninstall {
            self.services.package_info.remove(&result.metadata);
        }

        self.failure.ensure_failure_path_clean(&result.name);
        self.failure.remove_rollback(&result.name);
        self.sideload.handle(result, config, true);

        if config.force {
            if let Some(location) = result.install_location.as_ref() {
                // Guard is broader than strictly needed: it refuses the
                // packages root as well as the install root. A real install
                // location is always a subdirectory of the packages root.
                if location.exists() && !self.settings.is_protected_location(location) {
                    ext::remove_dir_if_exists(location);
                }
            }
        }
    }
}
