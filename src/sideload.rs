use std::path::{Path, PathBuf};
use std::sync::Arc;

use choco_types::{Config, PackageResult};

use crate::config::Settings;
use crate::defaults::env_vars;
use crate::ext;
use crate::service::ProcessState;

const EXTENSION_SUFFIXES: [&str; 2] = [".extensions", ".extension"];
const TEMPLATE_SUFFIX: &str = ".template";
const HOOK_SUFFIX: &str = ".hook";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SideloadKind {
    Extension,
    Template,
    Hook,
}

/// Stages packages whose name carries a reserved suffix into the matching
/// well-known directory instead of leaving them in the packages root.
pub struct SideloadInstaller {
    settings: Settings,
    process: Arc<dyn ProcessState>,
}

impl SideloadInstaller {
    pub fn new(settings: Settings, process: Arc<dyn ProcessState>) -> SideloadInstaller {
        SideloadInstaller { settings, process }
    }

    /// Handles the package when its name marks it as a sideload. Returns
    /// whether it was one. `uninstalling` switches between staging and
    /// removal.
    pub fn handle(
        &self,
        result: &mut PackageResult,
        config: &Config,
        uninstalling: bool,
    ) -> bool {
        let (kind, slug) = match detect(&result.name) {
            Some(v) => v,
            None => return false,
        };

        if uninstalling {
            self.remove_destinations(kind, &slug);
            result.note(format!(" Uninstalled {} '{}'.", kind_name(kind), slug));
            return true;
        }

        let dst = self.destination(kind, &slug);
        match kind {
            SideloadKind::Extension => {
                // Both suffix variants map to the same slug; clear both.
                ext::remove_dir_if_exists(&with_suffix(&dst, ".extension"));
                ext::remove_dir_if_exists(&with_suffix(&dst, ".extensions"));
                clear_extension_destination(&dst);
            }
            SideloadKind::Template | SideloadKind::Hook => {
                ext::remove_dir_if_exists(&dst);
            }
        }

        if let Some(src) = self.staging_source(kind, result) {
            if let Err(e) = ext::copy_dir_all(&src, &dst) {
                log::warn!(
                    "Unable to stage '{}' into '{}': {}",
                    src.display(),
                    dst.display(),
                    e
                );
            } else if kind == SideloadKind::Template {
                rename_template_manifests(&dst);
            }
        }

        self.process
            .set_env_var(env_vars::PACKAGE_INSTALL_LOCATION, &dst.to_string_lossy());

        true
    }

    fn destination(&self, kind: SideloadKind, slug: &str) -> PathBuf {
        let root = match kind {
            SideloadKind::Extension => self.settings.extensions_root(),
            SideloadKind::Template => self.settings.templates_root(),
            SideloadKind::Hook => self.settings.hooks_root(),
        };
        root.join(slug)
    }

    fn remove_destinations(&self, kind: SideloadKind, slug: &str) {
        let dst = self.destination(kind, slug);
        ext::remove_dir_if_exists(&dst);
        if kind == SideloadKind::Extension {
            ext::remove_dir_if_exists(&with_suffix(&dst, ".extension"));
            ext::remove_dir_if_exists(&with_suffix(&dst, ".extensions"));
        }
    }

    /// The payload subdirectory when the package ships one, otherwise the
    /// install location itself.
    fn staging_source(&self, kind: SideloadKind, result: &PackageResult) -> Option<PathBuf> {
        let location = result.install_location.as_ref()?;
        if !location.exists() {
            return None;
        }

        let subdir = match kind {
            SideloadKind::Extension => "extensions",
            SideloadKind::Template => "templates",
            SideloadKind::Hook => "hook",
        };

        let candidate = location.join(subdir);
        if candidate.is_dir() {
            Some(candidate)
        } else {
            Some(location.clone())
        }
    }
}

fn detect(name: &str) -> Option<(SideloadKind, String)> {
    let lower = name.to_lowercase();
    for suffix in EXTENSION_SUFFIXES.iter() {
        if let Some(slug) = lower.strip_suffix(suffix) {
            return Some((SideloadKind::Extension, slug.to_string()));
        }
    }
    if let Some(slug) = lower.strip_suffix(TEMPLATE_SUFFIX) {
        return Some((SideloadKind::Template, slug.to_string()));
    }
    if let Some(slug) = lower.strip_suffix(HOOK_SUFFIX) {
        return Some((SideloadKind::Hook, slug.to_string()));
    }
    None
}

fn kind_name(kind: SideloadKind) -> &'static str {
    match kind {
        SideloadKind::Extension => "extension",
        SideloadKind::Template => "template",
        SideloadKind::Hook => "hook",
    }
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut s = path.as_os_str().to_os_string();
    s.push(suffix);
    PathBuf::from(s)
}

/// Clears an extension destination whose dlls may be loaded by the host
/// process: stale `*.dll.old` files go first, current `*.dll` files are
/// renamed aside rather than deleted, everything else is removed. Every step
/// tolerates per-file failure.
fn clear_extension_destination(dst: &Path) {
    if !dst.exists() {
        return;
    }

    visit_files(dst, &mut |path| {
        if path_ends_with(path, ".dll.old") {
            if let Err(e) = std::fs::remove_file(path) {
                log::warn!("Unable to remove '{}': {}", path.display(), e);
            }
        }
    });

    visit_files(dst, &mut |path| {
        if path_ends_with(path, ".dll") {
            let target = with_suffix(path, ".old");
            if let Err(e) = std::fs::rename(path, &target) {
                log::warn!(
                    "Unable to rename '{}' to '{}': {}",
                    path.display(),
                    target.display(),
                    e
                );
            }
        }
    });

    visit_files(dst, &mut |path| {
        if !path_ends_with(path, ".dll.old") {
            if let Err(e) = std::fs::remove_file(path) {
                log::warn!("Unable to remove '{}': {}", path.display(), e);
            }
        }
    });
}

fn path_ends_with(path: &Path, suffix: &str) -> bool {
    path.file_name()
        .map(|n| n.to_string_lossy().to_lowercase().ends_with(suffix))
        .unwrap_or(false)
}

fn visit_files(dir: &Path, visit: &mut dyn FnMut(&Path)) {
    let entries = match std::fs::read_dir(dir) {
        Ok(v) => v,
        Err(e) => {
            log::warn!("Unable to read directory '{}': {}", dir.display(), e);
            return;
        }
    };
    for entry in entries.filter_map(Result::ok) {
        let path = entry.path();
        if path.is_dir() {
            visit_files(&path, visit);
        } else {
            visit(&path);
        }
    }
}

/// Staged templates carry their manifests as `*.nuspec.template` so packing
/// the template package itself does not pick them up.
fn rename_template_manifests(dst: &Path) {
    let mut renames = Vec::new();
    visit_files(dst, &mut |path| {
        if path_ends_with(path, ".nuspec.template") {
            renames.push(path.to_path_buf());
        }
    });

    for path in renames {
        let name = path.to_string_lossy().into_owned();
        let target = PathBuf::from(name.trim_end_matches(".template"));
        if let Err(e) = std::fs::rename(&path, &target) {
            log::warn!(
                "Unable to rename '{}' to '{}': {}",
                path.display(),
                target.display(),
                e
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeProcessState;

    fn fixture() -> (tempfile::TempDir, SideloadInstaller, Arc<FakeProcessState>) {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::with_install_root(dir.path());
        let process = Arc::new(FakeProcessState::default());
        let installer = SideloadInstaller::new(settings, process.clone());
        (dir, installer, process)
    }

    fn package(dir: &Path, name: &str) -> PackageResult {
        let mut result = PackageResult::new(name, "1.0.0");
        result.install_location = Some(dir.to_path_buf());
        result
    }

    #[test]
    fn plain_packages_are_not_sideloads() {
        let (dir, installer, _) = fixture();
        let mut result = package(dir.path(), "regular");
        assert!(!installer.handle(&mut result, &Config::default(), false));
    }

    #[test]
    fn extension_staged_with_dll_rename_protocol() {
        let (dir, installer, process) = fixture();

        // The package payload.
        let pkg = dir.path().join("lib/acme.extension");
        std::fs::create_dir_all(pkg.join("extensions")).unwrap();
        std::fs::write(pkg.join("extensions/acme.dll"), b"new").unwrap();

        // A previously staged copy, with a stale .old alongside.
        let dst = dir.path().join("extensions/acme");
        std::fs::create_dir_all(&dst).unwrap();
        std::fs::write(dst.join("acme.dll"), b"old").unwrap();
        std::fs::write(dst.join("acme.dll.old"), b"stale").unwrap();
        std::fs::write(dst.join("readme.txt"), b"txt").unwrap();

        let mut result = package(&pkg, "acme.extension");
        assert!(installer.handle(&mut result, &Config::default(), false));

        assert_eq!(std::fs::read(dst.join("acme.dll")).unwrap(), b"new");
        assert_eq!(std::fs::read(dst.join("acme.dll.old")).unwrap(), b"old");
        assert!(!dst.join("readme.txt").exists());
        assert_eq!(
            process.env_var(env_vars::PACKAGE_INSTALL_LOCATION).unwrap(),
            dst.to_string_lossy()
        );
    }

    #[test]
    fn both_extension_suffixes_share_a_slug() {
        assert_eq!(
            detect("acme.extension").unwrap().1,
            detect("acme.extensions").unwrap().1
        );
    }

    #[test]
    fn uninstall_clears_all_suffix_variants() {
        let (dir, installer, _) = fixture();
        let root = dir.path().join("extensions");
        for sub in &["acme", "acme.extension", "acme.extensions"] {
            std::fs::create_dir_all(root.join(sub)).unwrap();
        }

        let pkg = dir.path().join("lib/acme.extensions");
        let mut result = package(&pkg, "acme.extensions");
        assert!(installer.handle(&mut result, &Config::default(), true));

        for sub in &["acme", "acme.extension", "acme.extensions"] {
            assert!(!root.join(sub).exists());
        }
        assert!(result
            .messages
            .iter()
            .any(|m| m.text.contains("Uninstalled")));
    }

    #[test]
    fn template_manifests_are_renamed() {
        let (dir, installer, _) = fixture();

        let pkg = dir.path().join("lib/webapp.template");
        std::fs::create_dir_all(pkg.join("templates")).unwrap();
        std::fs::write(pkg.join("templates/webapp.nuspec.template"), b"m").unwrap();
        std::fs::write(pkg.join("templates/setup.ps1"), b"s").unwrap();

        let mut result = package(&pkg, "webapp.template");
        installer.handle(&mut result, &Config::default(), false);

        let dst = dir.path().join("templates/webapp");
        assert!(dst.join("webapp.nuspec").exists());
        assert!(!dst.join("webapp.nuspec.template").exists());
        assert!(dst.join("setup.ps1").exists());
    }

    #[test]
    fn hook_without_subdir_copies_install_location() {
        let (dir, installer, _) = fixture();

        let pkg = dir.path().join("lib/pre-install.hook");
        std::fs::create_dir_all(&pkg).unwrap();
        std::fs::write(pkg.join("run.ps1"), b"hook").unwrap();

        let mut result = package(&pkg, "pre-install.hook");
        installer.handle(&mut result, &Config::default(), false);

        assert!(dir.path().join("hooks/pre-install/run.ps1").exists());
    }
}
