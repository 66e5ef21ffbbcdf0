use std::sync::Arc;

use choco_types::{EnvironmentSnapshot, EnvironmentVariable, RegistrySnapshot};

use crate::registry::InstallerRegistry;

const REDACTED: &str = "[REDACTED]";

/// Captures before/after views of installed-program entries and environment
/// variables, and diffs them. Pure and non-persisting; callers own the
/// snapshots they take.
#[derive(Clone)]
pub struct Snapshotter {
    registry: Arc<dyn InstallerRegistry>,
}

impl Snapshotter {
    pub fn new(registry: Arc<dyn InstallerRegistry>) -> Snapshotter {
        Snapshotter { registry }
    }

    pub fn snapshot_installers(&self) -> RegistrySnapshot {
        self.registry.installer_keys()
    }

    pub fn snapshot_env(&self) -> EnvironmentSnapshot {
        self.registry.environment_values()
    }

    /// Entries present in `after` but not in `before`, keyed by `key_path`.
    /// `diff_installers(s, s)` is empty for any snapshot `s`.
    pub fn diff_installers(
        &self,
        before: &RegistrySnapshot,
        after: &RegistrySnapshot,
    ) -> RegistrySnapshot {
        RegistrySnapshot {
            keys: after
                .keys
                .iter()
                .filter(|k| !before.contains(&k.key_path))
                .cloned()
                .collect(),
        }
    }

    /// Set-based diff on `(parent_key, name)`. The first list holds added
    /// and changed variables (a value difference counts as changed), the
    /// second holds removed ones.
    pub fn diff_env(
        &self,
        before: &EnvironmentSnapshot,
        after: &EnvironmentSnapshot,
    ) -> (Vec<EnvironmentVariable>, Vec<EnvironmentVariable>) {
        let added_or_changed = after
            .variables
            .iter()
            .filter(|v| match before.get(&v.parent_key, &v.name) {
                None => true,
                Some(prior) => prior.value != v.value,
            })
            .cloned()
            .collect();

        let removed = before
            .variables
            .iter()
            .filter(|v| after.get(&v.parent_key, &v.name).is_none())
            .cloned()
            .collect();

        (added_or_changed, removed)
    }

    /// Logs an env diff. Values are redacted unless `log_values` is set.
    pub fn log_env_changes(
        &self,
        added_or_changed: &[EnvironmentVariable],
        removed: &[EnvironmentVariable],
        log_values: bool,
    ) {
        for var in added_or_changed {
            let value = if log_values { var.value.as_str() } else { REDACTED };
            log::info!(
                "Environment variable set or changed: {}\\{} = {}",
                var.parent_key,
                var.name,
                value
            );
        }
        for var in removed {
            log::info!(
                "Environment variable removed: {}\\{}",
                var.parent_key,
                var.name
            );
        }
    }
}
