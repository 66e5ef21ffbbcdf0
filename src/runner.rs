use std::sync::Arc;

use hashbrown::HashMap;

use choco_types::{Config, PackageResult};

use crate::coordinator::CoordinatorError;

pub type PackageResults = HashMap<String, PackageResult>;

/// Callback handed into a source runner, invoked once per materialized
/// package. The runner must propagate a returned error unchanged so fatal
/// conditions reach the command entry.
pub type ResultCallback<'a> =
    &'a mut dyn FnMut(&mut PackageResult, &Config) -> Result<(), CoordinatorError>;

/// A backend that resolves and materializes packages from one kind of
/// source. The set of runners is closed at construction time.
pub trait SourceRunner: Send + Sync {
    /// The source-kind tag this runner serves.
    fn source_type(&self) -> &str;

    /// Gives the backend a chance to install or verify its own tooling.
    fn ensure_source_app_installed(&self, config: &Config);

    fn count_run(&self, config: &Config) -> usize;
    fn list_run(&self, config: &Config) -> Vec<PackageResult>;
    fn list_noop(&self, config: &Config);

    fn install_run(
        &self,
        config: &Config,
        on_result: ResultCallback<'_>,
    ) -> Result<PackageResults, CoordinatorError>;
    fn install_noop(&self, config: &Config);

    fn upgrade_run(
        &self,
        config: &Config,
        on_result: ResultCallback<'_>,
        on_before_modify: ResultCallback<'_>,
    ) -> Result<PackageResults, CoordinatorError>;
    fn upgrade_noop(&self, config: &Config);

    fn get_outdated(&self, config: &Config) -> PackageResults;

    fn uninstall_run(
        &self,
        config: &Config,
        on_result: ResultCallback<'_>,
        on_before_modify: ResultCallback<'_>,
    ) -> Result<PackageResults, CoordinatorError>;
    fn uninstall_noop(&self, config: &Config);

    fn pack_run(&self, config: &Config) -> Result<(), CoordinatorError>;
    fn push_run(&self, config: &Config) -> Result<(), CoordinatorError>;

    fn remove_rollback_directory_if_exists(&self, package_name: &str);
}

/// Immutable registry of source runners, resolved by source-kind tag.
pub struct SourceDispatcher {
    runners: Vec<Arc<dyn SourceRunner>>,
}

impl SourceDispatcher {
    pub fn new(runners: Vec<Arc<dyn SourceRunner>>) -> SourceDispatcher {
        SourceDispatcher { runners }
    }

    fn find(&self, source_type: &str) -> Option<&Arc<dyn SourceRunner>> {
        self.runners.iter().find(|r| {
            let declared = r.source_type();
            // Tolerate singular feature names for plural source kinds.
            declared == source_type || declared == format!("{}s", source_type)
        })
    }

    /// Returns the runner for `source_type`, or logs a warning and yields
    /// `None` so the operation becomes a no-op.
    pub fn resolve(&self, source_type: &str) -> Option<Arc<dyn SourceRunner>> {
        match self.find(source_type) {
            Some(runner) => Some(Arc::clone(runner)),
            None => {
                log::warn!(
                    "No source runner registered for source type '{}'. The operation will do nothing.",
                    source_type
                );
                None
            }
        }
    }

    /// Whether `candidate` names a known source kind. Used when a list
    /// document's source column holds a kind tag rather than a locator.
    pub fn is_known_source_type(&self, candidate: &str) -> bool {
        self.find(candidate).is_some()
    }
}

/// A runner that materializes nothing. Useful as a stand-in where no real
/// backend is wired up; every operation returns its zero value.
#[derive(Debug, Default)]
pub struct NoopSourceRunner {
    source_type: String,
}

impl NoopSourceRunner {
    pub fn new(source_type: impl Into<String>) -> NoopSourceRunner {
        NoopSourceRunner {
            source_type: source_type.into(),
        }
    }
}

impl SourceRunner for NoopSourceRunner {
    fn source_type(&self) -> &str {
        &self.source_type
    }

    fn ensure_source_app_installed(&self, _config: &Config) {}

    fn count_run(&self, _config: &Config) -> usize {
        0
    }

    fn list_run(&self, _config: &Config) -> Vec<PackageResult> {
        Vec::new()
    }

    fn list_noop(&self, _config: &Config) {}

    fn install_run(
        &self,
        _config: &Config,
        _on_result: ResultCallback<'_>,
    ) -> Result<PackageResults, CoordinatorError> {
        Ok(PackageResults::new())
    }

    fn install_noop(&self, _config: &Config) {}

    fn upgrade_run(
        &self,
        _config: &Config,
        _on_result: ResultCallback<'_>,
        _on_before_modify: ResultCallback<'_>,
    ) -> Result<PackageResults, CoordinatorError> {
        Ok(PackageResults::new())
    }

    fn upgrade_noop(&self, _config: &Config) {}

    fn get_outdated(&self, _config: &Config) -> PackageResults {
        PackageResults::new()
    }

    fn uninstall_run(
        &self,
        _config: &Config,
        _on_result: ResultCallback<'_>,
        _on_before_modify: ResultCallback<'_>,
    ) -> Result<PackageResults, CoordinatorError> {
        Ok(PackageResults::new())
    }

    fn uninstall_noop(&self, _config: &Config) {}

    fn pack_run(&self, _config: &Config) -> Result<(), CoordinatorError> {
        Ok(())
    }

    fn push_run(&self, _config: &Config) -> Result<(), CoordinatorError> {
        Ok(())
    }

    fn remove_rollback_directory_if_exists(&self, _package_name: &str) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dispatcher() -> SourceDispatcher {
        SourceDispatcher::new(vec![
            Arc::new(NoopSourceRunner::new("normal")),
            Arc::new(NoopSourceRunner::new("windowsfeatures")),
        ])
    }

    #[test]
    fn resolves_exact_type() {
        assert!(dispatcher().resolve("normal").is_some());
    }

    #[test]
    fn resolves_singular_for_plural_kind() {
        let d = dispatcher();
        let runner = d.resolve("windowsfeature").unwrap();
        assert_eq!(runner.source_type(), "windowsfeatures");
    }

    #[test]
    fn unknown_type_is_none() {
        assert!(dispatcher().resolve("cygwin").is_none());
    }

    #[test]
    fn known_source_types() {
        let d = dispatcher();
        assert!(d.is_known_source_type("windowsfeatures"));
        assert!(d.is_known_source_type("windowsfeature"));
        assert!(!d.is_known_source_type("ruby"));
    }
}
