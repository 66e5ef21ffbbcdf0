//! Hand-rolled fake collaborators shared across module tests.

use std::sync::atomic::{AtomicI32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use hashbrown::HashMap;

use choco_types::{Config, PackageResult};

use crate::coordinator::CoordinatorError;
use crate::runner::{PackageResults, ResultCallback, SourceRunner};
use crate::service::{
    ArgumentCipher, AutoUninstallerService, ConfigTransformService, Event, EventBus,
    InteractivePrompt, ProcessState, ScriptingHost, ShimService,
};

/// Ordered record of collaborator calls, shared between fakes so pipeline
/// ordering is observable.
#[derive(Debug, Default)]
pub(crate) struct Journal(Mutex<Vec<String>>);

impl Journal {
    pub fn record(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    /// Asserts that `expected` occurs as a subsequence of the journal.
    pub fn assert_order(&self, expected: &[&str]) {
        let entries = self.entries();
        let mut cursor = 0;
        for want in expected {
            match entries[cursor..].iter().position(|e| e == want) {
                Some(offset) => cursor += offset + 1,
                None => panic!(
                    "expected '{}' (in order) in journal, got: {:?}",
                    want, entries
                ),
            }
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct FakeProcessState {
    env: Mutex<HashMap<String, String>>,
    exit: AtomicI32,
    pub journal: Option<Arc<Journal>>,
}

impl FakeProcessState {
    pub fn with_journal(journal: Arc<Journal>) -> FakeProcessState {
        FakeProcessState {
            journal: Some(journal),
            ..Default::default()
        }
    }

    fn note(&self, entry: &str) {
        if let Some(journal) = &self.journal {
            journal.record(entry);
        }
    }
}

impl ProcessState for FakeProcessState {
    fn env_var(&self, name: &str) -> Option<String> {
        self.env.lock().unwrap().get(name).cloned()
    }

    fn set_env_var(&self, name: &str, value: &str) {
        self.env
            .lock()
            .unwrap()
            .insert(name.to_string(), value.to_string());
    }

    fn reset_environment(&self, _config: &Config) {
        self.note("process.reset_environment");
    }

    fn cancel_pending_reboot(&self) {
        self.note("process.cancel_pending_reboot");
    }

    fn set_exit_code(&self, code: i32) {
        self.exit.store(code, Ordering::SeqCst);
    }

    fn exit_code(&self) -> i32 {
        self.exit.load(Ordering::SeqCst)
    }
}

#[derive(Debug)]
pub(crate) struct FakePrompt {
    answer: String,
    calls: AtomicUsize,
}

impl FakePrompt {
    pub fn answering(answer: &str) -> FakePrompt {
        FakePrompt {
            answer: answer.to_string(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl InteractivePrompt for FakePrompt {
    fn prompt_for_confirmation(
        &self,
        _message: &str,
        _choices: &[&str],
        _default: Option<&str>,
    ) -> String {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.answer.clone()
    }
}

pub(crate) struct JournalScriptingHost {
    journal: Arc<Journal>,
    pub ran: bool,
}

impl JournalScriptingHost {
    pub fn new(journal: Arc<Journal>) -> JournalScriptingHost {
        JournalScriptingHost { journal, ran: true }
    }
}

impl ScriptingHost for JournalScriptingHost {
    fn install(&self, _config: &Config, _result: &mut PackageResult) -> bool {
        self.journal.record("scripting.install");
        self.ran
    }

    fn uninstall(&self, _config: &Config, _result: &mut PackageResult) -> bool {
        self.journal.record("scripting.uninstall");
        self.ran
    }

    fn before_modify(&self, _config: &Config, _result: &mut PackageResult) -> bool {
        self.journal.record("scripting.before_modify");
        self.ran
    }

    fn install_noop(&self, _config: &Config, _result: &mut PackageResult) {
        self.journal.record("scripting.install_noop");
    }

    fn uninstall_noop(&self, _config: &Config, _result: &mut PackageResult) {
        self.journal.record("scripting.uninstall_noop");
    }

    fn before_modify_noop(&self, _config: &Config, _result: &mut PackageResult) {
        self.journal.record("scripting.before_modify_noop");
    }
}

pub(crate) struct JournalShimService(pub Arc<Journal>);

impl ShimService for JournalShimService {
    fn install(&self, _config: &Config, _result: &mut PackageResult) {
        self.0.record("shims.install");
    }

    fn uninstall(&self, _config: &Config, _result: &mut PackageResult) {
        self.0.record("shims.uninstall");
    }
}

pub(crate) struct JournalAutoUninstaller(pub Arc<Journal>);

impl AutoUninstallerService for JournalAutoUninstaller {
    fn run(&self, _config: &Config, _result: &mut PackageResult) {
        self.0.record("auto_uninstaller.run");
    }
}

pub(crate) struct JournalConfigTransform(pub Arc<Journal>);

impl ConfigTransformService for JournalConfigTransform {
    fn run(&self, _config: &Config, _result: &mut PackageResult) {
        self.0.record("config_transforms.run");
    }
}

pub(crate) struct JournalEventBus(pub Arc<Journal>);

impl EventBus for JournalEventBus {
    fn publish(&self, event: Event) {
        match event {
            Event::HandlePackageResultCompleted { result, .. } => self
                .0
                .record(format!("events.completed:{}", result.name)),
        }
    }
}

pub(crate) struct ReversingCipher;

impl ArgumentCipher for ReversingCipher {
    fn encrypt(&self, plain: &str) -> String {
        plain.chars().rev().collect()
    }
}

/// A runner that feeds scripted results through the per-package callback,
/// propagating callback errors the way real runners must.
pub(crate) struct ScriptedRunner {
    source_type: String,
    queue: Mutex<Vec<PackageResult>>,
}

impl ScriptedRunner {
    pub fn new(source_type: &str, results: Vec<PackageResult>) -> ScriptedRunner {
        ScriptedRunner {
            source_type: source_type.to_string(),
            queue: Mutex::new(results),
        }
    }

    fn drive(
        &self,
        config: &Config,
        on_result: ResultCallback<'_>,
    ) -> Result<PackageResults, CoordinatorError> {
        let scripted: Vec<PackageResult> = self.queue.lock().unwrap().drain(..).collect();
        let mut out = PackageResults::new();
        for mut result in scripted {
            on_result(&mut result, config)?;
            out.insert(result.name.clone(), result);
        }
        Ok(out)
    }
}

impl SourceRunner for ScriptedRunner {
    fn source_type(&self) -> &str {
        &self.source_type
    }

    fn ensure_source_app_installed(&self, _config: &Config) {}

    fn count_run(&self, _config: &Config) -> usize {
        self.queue.lock().unwrap().len()
    }

    fn list_run(&self, _config: &Config) -> Vec<PackageResult> {
        self.queue.lock().unwrap().drain(..).collect()
    }

    fn list_noop(&self, _config: &Config) {}

    fn install_run(
        &self,
        config: &Config,
        on_result: ResultCallback<'_>,
    ) -> Result<PackageResults, CoordinatorError> {
        self.drive(config, on_result)
    }

    fn install_noop(&self, _config: &Config) {}

    fn upgrade_run(
        &self,
        config: &Config,
        on_result: ResultCallback<'_>,
        on_before_modify: ResultCallback<'_>,
    ) -> Result<PackageResults, CoordinatorError> {
        {
            let mut queue = self.queue.lock().unwrap();
            for result in queue.iter_mut() {
                on_before_modify(result, config)?;
            }
        }
        self.drive(config, on_result)
    }

    fn upgrade_noop(&self, _config: &Config) {}

    fn get_outdated(&self, _config: &Config) -> PackageResults {
        let mut out = PackageResults::new();
        for result in self.queue.lock().unwrap().drain(..) {
            out.insert(result.name.clone(), result);
        }
        out
    }

    fn uninstall_run(
        &self,
        config: &Config,
        on_result: ResultCallback<'_>,
        on_before_modify: ResultCallback<'_>,
    ) -> Result<PackageResults, CoordinatorError> {
        {
            let mut queue = self.queue.lock().unwrap();
            for result in queue.iter_mut() {
                on_before_modify(result, config)?;
            }
        }
        self.drive(config, on_result)
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
