use std::str::FromStr;
use std::sync::Arc;

use dashmap::DashMap;
use thiserror::Error;

use choco_types::{exit_code, Config, PackageResult, LIST_DOCUMENT_EXTENSION};

use crate::config::Settings;
use crate::expand;
use crate::failure::FailureHandler;
use crate::files::{DiskFilesService, FilesService};
use crate::notify::Notifier;
use crate::package_info::{DiskPackageInfoService, PackageInfoService};
use crate::pending::{PendingError, PendingMarker};
use crate::registry::{platform_registry, InstallerRegistry};
use crate::report::Reporter;
use crate::runner::SourceDispatcher;
use crate::service::{
    ArgumentCipher, AutoUninstallerService, ConfigTransformService, EventBus,
    InteractivePrompt, NoopAutoUninstaller, NoopConfigTransform, NoopScriptingHost,
    NoopShimService, NullCipher, NullEventBus, ProcessState, ScriptingHost, ShimService,
    StdioPrompt, SystemProcessState,
};
use crate::sideload::SideloadInstaller;
use crate::snapshot::Snapshotter;
use crate::validate::ValidationError;

mod install;
mod uninstall;

/// Result aggregate for one command, keyed by package name. Writes happen
/// only from the coordinator thread; the map tolerates concurrent readers
/// for progress display.
pub type ResultSet = DashMap<String, PackageResult>;

#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Pending(#[from] PendingError),

    #[error("No sources are configured for the {command} command")]
    MissingSource { command: String },

    #[error("Package list documents are not supported by the {command} command")]
    ListDocumentNotSupported { command: String },

    #[error("Reboot required before continuing: installing '{name}' requested a restart")]
    RebootRequired { name: String },

    #[error("Stopping on first package failure: '{name}' was not successful")]
    StopOnFirstFailure { name: String },

    #[error("Uninstall of '{name}' was not successful")]
    UninstallFailed { name: String },

    #[error("Unknown command '{0}'")]
    UnknownCommand(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Install,
    Upgrade,
    Uninstall,
    List,
    Outdated,
    Pack,
    Push,
}

impl Command {
    /// Whether the command materializes packages and therefore gets the
    /// per-package summary at the end.
    fn reports_packages(self) -> bool {
        matches!(self, Command::Install | Command::Upgrade | Command::Uninstall)
    }

    pub(crate) fn past_tense(self) -> &'static str {
        match self {
            Command::Install => "installed",
            Command::Upgrade => "upgraded",
            Command::Uninstall => "uninstalled",
            _ => "processed",
        }
    }
}

impl FromStr for Command {
    type Err = CoordinatorError;

    fn from_str(s: &str) -> Result<Command, CoordinatorError> {
        match s {
            "install" => Ok(Command::Install),
            "upgrade" => Ok(Command::Upgrade),
            "uninstall" => Ok(Command::Uninstall),
            "list" => Ok(Command::List),
            "outdated" => Ok(Command::Outdated),
            "pack" => Ok(Command::Pack),
            "push" => Ok(Command::Push),
            other => Err(CoordinatorError::UnknownCommand(other.to_string())),
        }
    }
}

/// Every collaborator the coordinator drives, injected so tests observe
/// calls deterministically.
pub struct Services {
    pub scripting: Arc<dyn ScriptingHost>,
    pub shims: Arc<dyn ShimService>,
    pub auto_uninstaller: Arc<dyn AutoUninstallerService>,
    pub config_transforms: Arc<dyn ConfigTransformService>,
    pub files: Arc<dyn FilesService>,
    pub package_info: Arc<dyn PackageInfoService>,
    pub cipher: Arc<dyn ArgumentCipher>,
    pub events: Arc<dyn EventBus>,
    pub prompt: Arc<dyn InteractivePrompt>,
    pub process: Arc<dyn ProcessState>,
    pub registry: Arc<dyn InstallerRegistry>,
}

impl Services {
    /// The default wiring: real disk-backed services, platform registry,
    /// no-op seams where the deployment has not configured a backend.
    pub fn system(settings: &Settings) -> Services {
        Services {
            scripting: Arc::new(NoopScriptingHost),
            shims: Arc::new(NoopShimService),
            auto_uninstaller: Arc::new(NoopAutoUninstaller),
            config_transforms: Arc::new(NoopConfigTransform),
            files: Arc::new(DiskFilesService),
            package_info: Arc::new(DiskPackageInfoService::new(settings.package_info_root())),
            cipher: Arc::new(NullCipher),
            events: Arc::new(NullEventBus),
            prompt: Arc::new(StdioPrompt),
            process: Arc::new(SystemProcessState::default()),
            registry: platform_registry(),
        }
    }
}

/// Coordinates the full lifecycle of every package operation for one
/// command: expansion, dispatch, the post-materialization pipeline, failure
/// handling and the final summary. Strictly single-threaded within one
/// command so state snapshots stay meaningful.
pub struct Coordinator {
    pub(crate) settings: Settings,
    dispatcher: SourceDispatcher,
    pub(crate) pending: PendingMarker,
    pub(crate) snapshotter: Snapshotter,
    pub(crate) sideload: SideloadInstaller,
    pub(crate) failure: FailureHandler,
    reporter: Reporter,
    notifier: Notifier,
    pub(crate) services: Services,
}

impl Coordinator {
    pub fn new(
        settings: Settings,
        dispatcher: SourceDispatcher,
        services: Services,
        notifier: Notifier,
    ) -> Coordinator {
        let snapshotter = Snapshotter::new(Arc::clone(&services.registry));
        let sideload =
            SideloadInstaller::new(settings.clone(), Arc::clone(&services.process));
        let failure = FailureHandler::new(settings.clone(), Arc::clone(&services.prompt));

        Coordinator {
            settings,
            dispatcher,
            pending: PendingMarker::new(),
            snapshotter,
            sideload,
            failure,
            reporter: Reporter,
            notifier,
            services,
        }
    }

    /// Runs one command to completion and returns the process exit code.
    /// The reporter runs even when the command aborted mid-way, so partial
    /// results always reach the user.
    pub fn run(&self, config: &Config) -> i32 {
        let process = &self.services.process;

        let command = match Command::from_str(&config.command_name) {
            Ok(v) => v,
            Err(e) => {
                log::error!("{}", e);
                process.set_exit_code(exit_code::FAILURE);
                return process.exit_code();
            }
        };

        let results = ResultSet::new();
        let outcome = self.run_command(command, config, &results);

        if command.reports_packages() {
            let failures = self.reporter.report(config, &results);
            if failures > 0 && process.exit_code() == 0 {
                process.set_exit_code(exit_code::FAILURE);
            }
        }

        if let Err(e) = outcome {
            log::error!("{}", e);
            if process.exit_code() == 0 {
                process.set_exit_code(exit_code::FAILURE);
            }
        }

        self.notifier.maybe_notify(config, None);

        process.exit_code()
    }

    fn run_command(
        &self,
        command: Command,
        config: &Config,
        results: &ResultSet,
    ) -> Result<(), CoordinatorError> {
        match command {
            Command::Install => self.install(config, results),
            Command::Upgrade => self.upgrade(config, results),
            Command::Uninstall => self.uninstall(config, results),
            Command::List => self.list(config, results),
            Command::Outdated => self.outdated(config, results),
            Command::Pack => self.pack(config),
            Command::Push => self.push(config),
        }
    }

    pub fn install(&self, config: &Config, results: &ResultSet) -> Result<(), CoordinatorError> {
        crate::validate::validate_package_names(config)?;
        self.require_source(config)?;

        for package_config in expand::expand_configs(config, &self.dispatcher, results) {
            if package_config.package_names.is_empty() {
                continue;
            }

            let runner = match self.dispatcher.resolve(&package_config.source_type) {
                Some(v) => v,
                None => continue,
            };
            runner.ensure_source_app_installed(&package_config);

            if package_config.noop {
                runner.install_noop(&package_config);
                continue;
            }

            let run = runner.install_run(&package_config, &mut |result, config| {
                let outcome = self.handle_package_result(result, config, Command::Install);
                results.insert(result.name.clone(), result.clone());
                outcome
            });

            for (name, result) in run? {
                if result.success {
                    runner.remove_rollback_directory_if_exists(&name);
                }
                results.insert(name, result);
            }
        }

        Ok(())
    }

    pub fn upgrade(&self, config: &Config, results: &ResultSet) -> Result<(), CoordinatorError> {
        self.reject_list_documents(config)?;
        crate::validate::validate_package_names(config)?;
        self.require_source(config)?;

        let runner = match self.dispatcher.resolve(&config.source_type) {
            Some(v) => v,
            None => return Ok(()),
        };
        runner.ensure_source_app_installed(config);

        if config.noop {
            runner.upgrade_noop(config);
            return Ok(());
        }

        let run = runner.upgrade_run(
            config,
            &mut |result, config| {
                let outcome = self.handle_package_result(result, config, Command::Upgrade);
                results.insert(result.name.clone(), result.clone());
                outcome
            },
            &mut |result, config| self.handle_before_modify(result, config),
        );

        for (name, result) in run? {
            if result.success {
                runner.remove_rollback_directory_if_exists(&name);
            }
            results.insert(name, result);
        }

        Ok(())
    }

    pub fn uninstall(&self, config: &Config, results: &ResultSet) -> Result<(), CoordinatorError> {
        self.reject_list_documents(config)?;

        let runner = match self.dispatcher.resolve(&config.source_type) {
            Some(v) => v,
            None => return Ok(()),
        };

        if config.noop {
            runner.uninstall_noop(config);
            return Ok(());
        }

        let run = runner.uninstall_run(
            config,
            &mut |result, config| {
                let outcome = self.handle_package_uninstall(result, config);
                results.insert(result.name.clone(), result.clone());
                outcome
            },
            &mut |result, config| self.handle_before_modify(result, config),
        );

        for (name, result) in run? {
            results.insert(name, result);
        }

        Ok(())
    }

    pub fn list(&self, config: &Config, results: &ResultSet) -> Result<(), CoordinatorError> {
        let runner = match self.dispatcher.resolve(&config.source_type) {
            Some(v) => v,
            None => return Ok(()),
        };

        if config.noop {
            runner.list_noop(config);
            return Ok(());
        }

        for result in runner.list_run(config) {
            results.insert(result.name.clone(), result);
        }
        Ok(())
    }

    /// Package count for the configured source, for scripted callers.
    pub fn count(&self, config: &Config) -> usize {
        self.dispatcher
            .resolve(&config.source_type)
            .map(|runner| runner.count_run(config))
            .unwrap_or(0)
    }

    pub fn outdated(&self, config: &Config, results: &ResultSet) -> Result<(), CoordinatorError> {
        self.require_source(config)?;

        let runner = match self.dispatcher.resolve(&config.source_type) {
            Some(v) => v,
            None => return Ok(()),
        };

        let mut found = 0usize;
        for (name, result) in runner.get_outdated(config) {
            let info = self.services.package_info.get(&result.metadata);
            if info.is_pinned && !config.features.include_pinned {
                log::debug!("Skipping pinned package '{}'", name);
                continue;
            }
            found += 1;
            results.insert(name, result);
        }

        let process = &self.services.process;
        if found > 0
            && config.features.use_enhanced_exit_codes
            && process.exit_code() == 0
        {
            process.set_exit_code(exit_code::OUTDATED_PACKAGES_FOUND);
        }

        Ok(())
    }

    pub fn pack(&self, config: &Config) -> Result<(), CoordinatorError> {
        let runner = match self.dispatcher.resolve(&config.source_type) {
            Some(v) => v,
            None => return Ok(()),
        };
        runner.pack_run(config)
    }

    pub fn push(&self, config: &Config) -> Result<(), CoordinatorError> {
        self.require_source(config)?;

        let runner = match self.dispatcher.resolve(&config.source_type) {
            Some(v) => v,
            None => return Ok(()),
        };
        runner.push_run(config)
    }

    fn require_source(&self, config: &Config) -> Result<(), CoordinatorError> {
        if config.source.is_empty() {
            return Err(CoordinatorError::MissingSource {
                command: config.command_name.clone(),
            });
        }
        Ok(())
    }

    fn reject_list_documents(&self, config: &Config) -> Result<(), CoordinatorError> {
        let has_document = config
            .package_name_tokens()
            .iter()
            .any(|t| t.to_lowercase().ends_with(LIST_DOCUMENT_EXTENSION));
        if has_document {
            return Err(CoordinatorError::ListDocumentNotSupported {
                command: config.command_name.clone(),
            });
        }
        Ok(())
    }
}
