use std::path::PathBuf;
use std::sync::Arc;

use choco_types::{Config, PackageResult};

use crate::config::Settings;
use crate::ext;
use crate::service::InteractivePrompt;

/// Quarantines failed installs and restores backups. The packages root never
/// keeps a broken install: the failed directory moves under the failures
/// root, and a prior-version snapshot under the backup root moves back in.
pub struct FailureHandler {
    settings: Settings,
    prompt: Arc<dyn InteractivePrompt>,
}

impl FailureHandler {
    pub fn new(settings: Settings, prompt: Arc<dyn InteractivePrompt>) -> FailureHandler {
        FailureHandler { settings, prompt }
    }

    /// Entry point for any per-package failure. `move_to_failures` and
    /// `attempt_rollback` are both on for install/upgrade and both off for
    /// uninstall.
    pub fn handle(
        &self,
        result: &mut PackageResult,
        config: &Config,
        move_to_failures: bool,
        attempt_rollback: bool,
    ) {
        if result.exit_code == 0 {
            result.exit_code = 1;
        }

        for message in result.error_messages() {
            log::error!("{}", message.text);
        }

        if let Some(location) = result.install_location.as_ref() {
            if self.settings.is_protected_location(location) {
                log::error!(
                    "Package location '{}' is the install root or packages root. \
                     Refusing to move or roll back; please clean up '{}' manually.",
                    location.display(),
                    result.name
                );
                return;
            }
        }

        if move_to_failures {
            self.move_to_failures(result);
        }
        if attempt_rollback {
            self.rollback(result, config);
        }

        self.remove_rollback(&result.name);
    }

    /// Moves the failed install directory from the packages root into the
    /// failures root, mirroring its relative path.
    fn move_to_failures(&self, result: &PackageResult) {
        let location = match result.install_location.as_ref() {
            Some(v) if v.exists() => v,
            _ => return,
        };

        let target = self
            .settings
            .package_failures_root()
            .join(self.relative_package_path(result));

        log::info!(
            "Moving failed '{}' to '{}'",
            location.display(),
            target.display()
        );
        ext::remove_dir_if_exists(&target);
        if let Err(e) = ext::move_dir(location, &target) {
            log::warn!(
                "Unable to move '{}' to the failures location: {}",
                location.display(),
                e
            );
        }
    }

    fn rollback(&self, result: &PackageResult, config: &Config) {
        let backup_root = self.settings.package_backup_root();
        let mut backup = backup_root.join(self.relative_package_path(result));

        if !backup.exists() {
            backup = match self.greatest_backup_sibling(&result.name) {
                Some(v) => v,
                None => return,
            };
        }

        // The chosen path must sit strictly inside the backup root.
        if !backup.starts_with(&backup_root) || backup == backup_root || !backup.exists() {
            return;
        }

        let confirmed = if result.user_cancelled() {
            // The user already cancelled the installer; do not ask again.
            true
        } else if config.features.prompt_for_confirmation {
            let answer = self.prompt.prompt_for_confirmation(
                &format!(
                    "Do you want to rollback '{}' to the previous version",
                    result.name
                ),
                &["yes", "no"],
                Some("yes"),
            );
            answer == "yes"
        } else {
            true
        };

        if !confirmed {
            return;
        }

        let target = self.settings.packages_root().join(
            backup
                .strip_prefix(&backup_root)
                .map(|p| p.to_path_buf())
                .unwrap_or_else(|_| PathBuf::from(&result.name)),
        );

        log::info!(
            "Rolling back '{}' from '{}'",
            result.name,
            backup.display()
        );
        ext::remove_dir_if_exists(&target);
        if let Err(e) = ext::move_dir(&backup, &target) {
            log::warn!(
                "Unable to roll back '{}' from '{}': {}",
                result.name,
                backup.display(),
                e
            );
        }
    }

    /// The lexicographically greatest `<name>*` directory under the backup
    /// root, used when no exact mirror of the install path exists.
    fn greatest_backup_sibling(&self, name: &str) -> Option<PathBuf> {
        let entries = std::fs::read_dir(self.settings.package_backup_root()).ok()?;
        entries
            .filter_map(Result::ok)
            .filter(|e| e.path().is_dir())
            .filter(|e| {
                e.file_name()
                    .to_string_lossy()
                    .to_lowercase()
                    .starts_with(&name.to_lowercase())
            })
            .max_by_key(|e| e.file_name())
            .map(|e| e.path())
    }

    fn relative_package_path(&self, result: &PackageResult) -> PathBuf {
        result
            .install_location
            .as_ref()
            .and_then(|loc| {
                loc.strip_prefix(self.settings.packages_root())
                    .map(|p| p.to_path_buf())
                    .ok()
            })
            .unwrap_or_else(|| PathBuf::from(&result.name))
    }

    /// Clears any rollback snapshot left behind for `name`.
    pub fn remove_rollback(&self, name: &str) {
        ext::remove_dir_if_exists(&self.settings.package_backup_root().join(name));
    }

    /// Clears any quarantined copy of `name` after a later successful run.
    pub fn ensure_failure_path_clean(&self, name: &str) {
        ext::remove_dir_if_exists(&self.settings.package_failures_root().join(name));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakePrompt;
    use choco_types::exit_code;

    struct Fixture {
        _dir: tempfile::TempDir,
        settings: Settings,
        prompt: Arc<FakePrompt>,
        handler: FailureHandler,
    }

    fn fixture(answer: &str) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::with_install_root(dir.path());
        let prompt = Arc::new(FakePrompt::answering(answer));
        let handler = FailureHandler::new(settings.clone(), prompt.clone());
        Fixture {
            _dir: dir,
            settings,
            prompt,
            handler,
        }
    }

    fn failed_package(settings: &Settings, name: &str, exit_code: i32) -> PackageResult {
        let mut result = PackageResult::new(name, "1.0.0");
        result.install_location = Some(settings.packages_root().join(name));
        result.exit_code = exit_code;
        result.error("install failed");
        result
    }

    #[test]
    fn exit_code_is_forced_nonzero() {
        let f = fixture("yes");
        let mut result = failed_package(&f.settings, "foo", 0);
        f.handler.handle(&mut result, &Config::default(), false, false);
        assert_eq!(result.exit_code, 1);
    }

    #[test]
    fn failed_install_moves_to_failures() {
        let f = fixture("yes");
        let pkg = f.settings.packages_root().join("foo");
        std::fs::create_dir_all(&pkg).unwrap();
        std::fs::write(pkg.join("broken.txt"), b"x").unwrap();

        let mut result = failed_package(&f.settings, "foo", 1603);
        f.handler.handle(&mut result, &Config::default(), true, false);

        assert!(!pkg.exists());
        assert!(f
            .settings
            .package_failures_root()
            .join("foo/broken.txt")
            .exists());
    }

    #[test]
    fn user_cancel_rolls_back_without_prompting() {
        let f = fixture("no");
        let backup = f.settings.package_backup_root().join("foo");
        std::fs::create_dir_all(&backup).unwrap();
        std::fs::write(backup.join("ok.txt"), b"prior").unwrap();

        let mut result = failed_package(&f.settings, "foo", exit_code::USER_CANCELLED);
        f.handler.handle(&mut result, &Config::default(), false, true);

        assert!(f.settings.packages_root().join("foo/ok.txt").exists());
        assert!(!f.settings.package_backup_root().join("foo").exists());
        assert_eq!(f.prompt.calls(), 0);
    }

    #[test]
    fn declined_prompt_skips_restore_but_clears_backup() {
        let f = fixture("no");
        let backup = f.settings.package_backup_root().join("foo");
        std::fs::create_dir_all(&backup).unwrap();

        let mut result = failed_package(&f.settings, "foo", 1603);
        f.handler.handle(&mut result, &Config::default(), false, true);

        assert_eq!(f.prompt.calls(), 1);
        assert!(!f.settings.packages_root().join("foo").exists());
        assert!(!backup.exists());
    }

    #[test]
    fn missing_mirror_uses_greatest_sibling() {
        let f = fixture("yes");
        for sibling in &["foo.1.0.0", "foo.1.2.0"] {
            let dir = f.settings.package_backup_root().join(sibling);
            std::fs::create_dir_all(&dir).unwrap();
            std::fs::write(dir.join("v.txt"), sibling.as_bytes()).unwrap();
        }

        let mut result = failed_package(&f.settings, "foo", 1603);
        f.handler.handle(&mut result, &Config::default(), false, true);

        let restored = f.settings.packages_root().join("foo.1.2.0/v.txt");
        assert!(restored.exists());
        assert_eq!(std::fs::read(restored).unwrap(), b"foo.1.2.0");
    }

    #[test]
    fn protected_location_refuses_everything() {
        let f = fixture("yes");
        let backup = f.settings.package_backup_root().join("foo");
        std::fs::create_dir_all(&backup).unwrap();

        let mut result = failed_package(&f.settings, "foo", 1603);
        result.install_location = Some(f.settings.packages_root());
        f.handler.handle(&mut result, &Config::default(), true, true);

        // Nothing moved, nothing rolled back, backup untouched.
        assert!(backup.exists());
        assert!(f.settings.packages_root().exists());
    }
}
