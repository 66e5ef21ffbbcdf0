use serde::{Deserialize, Serialize};

/// One user- or machine-level environment variable, identified by the
/// registry key it came from plus its name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentVariable {
    pub parent_key: String,
    pub name: String,
    pub value: String,
}

/// Unordered set of environment variables. Set semantics are keyed on
/// `(parent_key, name)`; a value difference counts as a change.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentSnapshot {
    pub variables: Vec<EnvironmentVariable>,
}

impl EnvironmentSnapshot {
    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    pub fn get(&self, parent_key: &str, name: &str) -> Option<&EnvironmentVariable> {
        self.variables
            .iter()
            .find(|v| v.parent_key == parent_key && v.name == name)
    }
}

/// One installed-program entry from the uninstall section of the registry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallerKey {
    pub key_path: String,
    pub display_name: String,
    pub display_version: String,
    pub uninstall_string: String,
    pub install_location: String,
    /// Whether the entry carries a quiet uninstall command.
    pub has_quiet_uninstall: bool,
}

/// Ordered set of installed-program entries, keyed by `key_path`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegistrySnapshot {
    pub keys: Vec<InstallerKey>,
}

impl RegistrySnapshot {
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn contains(&self, key_path: &str) -> bool {
        self.keys.iter().any(|k| k.key_path == key_path)
    }
}
