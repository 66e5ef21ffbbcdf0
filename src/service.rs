use std::sync::atomic::{AtomicI32, Ordering};

use choco_types::{Config, PackageResult};

use crate::defaults::env_vars;

/// Runs package-supplied automation scripts. The engine never executes
/// script content itself; it only drives this seam.
pub trait ScriptingHost: Send + Sync {
    /// Runs the package's install script. Returns whether any script ran.
    fn install(&self, config: &Config, result: &mut PackageResult) -> bool;
    fn uninstall(&self, config: &Config, result: &mut PackageResult) -> bool;
    /// Runs before an installed package is modified (upgrade/uninstall).
    fn before_modify(&self, config: &Config, result: &mut PackageResult) -> bool;

    fn install_noop(&self, config: &Config, result: &mut PackageResult);
    fn uninstall_noop(&self, config: &Config, result: &mut PackageResult);
    fn before_modify_noop(&self, config: &Config, result: &mut PackageResult);
}

#[derive(Debug, Default)]
pub struct NoopScriptingHost;

impl ScriptingHost for NoopScriptingHost {
    fn install(&self, _config: &Config, _result: &mut PackageResult) -> bool {
        false
    }

    fn uninstall(&self, _config: &Config, _result: &mut PackageResult) -> bool {
        false
    }

    fn before_modify(&self, _config: &Config, _result: &mut PackageResult) -> bool {
        false
    }

    fn install_noop(&self, _config: &Config, _result: &mut PackageResult) {}
    fn uninstall_noop(&self, _config: &Config, _result: &mut PackageResult) {}
    fn before_modify_noop(&self, _config: &Config, _result: &mut PackageResult) {}
}

/// Generates and removes executable shims for a package's tools.
pub trait ShimService: Send + Sync {
    fn install(&self, config: &Config, result: &mut PackageResult);
    fn uninstall(&self, config: &Config, result: &mut PackageResult);
}

#[derive(Debug, Default)]
pub struct NoopShimService;

impl ShimService for NoopShimService {
    fn install(&self, _config: &Config, _result: &mut PackageResult) {}
    fn uninstall(&self, _config: &Config, _result: &mut PackageResult) {}
}

/// Runs the captured uninstaller for packages that registered one.
pub trait AutoUninstallerService: Send + Sync {
    fn run(&self, config: &Config, result: &mut PackageResult);
}

#[derive(Debug, Default)]
pub struct NoopAutoUninstaller;

impl AutoUninstallerService for NoopAutoUninstaller {
    fn run(&self, _config: &Config, _result: &mut PackageResult) {}
}

/// Applies XML config transforms shipped inside a package.
pub trait ConfigTransformService: Send + Sync {
    fn run(&self, config: &Config, result: &mut PackageResult);
}

#[derive(Debug, Default)]
pub struct NoopConfigTransform;

impl ConfigTransformService for NoopConfigTransform {
    fn run(&self, _config: &Config, _result: &mut PackageResult) {}
}

/// Encrypts the argument-replay blob recorded in the package information.
/// Key lifetime and management belong to the implementation.
pub trait ArgumentCipher: Send + Sync {
    fn encrypt(&self, plain: &str) -> String;
}

/// Pass-through stand-in for deployments without a configured cipher.
#[derive(Debug, Default)]
pub struct NullCipher;

impl ArgumentCipher for NullCipher {
    fn encrypt(&self, plain: &str) -> String {
        plain.to_string()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    HandlePackageResultCompleted {
        result: PackageResult,
        config: Config,
        command_name: String,
    },
}

pub trait EventBus: Send + Sync {
    fn publish(&self, event: Event);
}

#[derive(Debug, Default)]
pub struct NullEventBus;

impl EventBus for NullEventBus {
    fn publish(&self, _event: Event) {}
}

/// Asks the user to pick one of a fixed set of choices.
pub trait InteractivePrompt: Send + Sync {
    fn prompt_for_confirmation(
        &self,
        message: &str,
        choices: &[&str],
        default: Option<&str>,
    ) -> String;
}

/// Reads answers from stdin; an unmatched or empty answer falls back to the
/// default, or the first choice when there is none.
#[derive(Debug, Default)]
pub struct StdioPrompt;

impl InteractivePrompt for StdioPrompt {
    fn prompt_for_confirmation(
        &self,
        message: &str,
        choices: &[&str],
        default: Option<&str>,
    ) -> String {
        use std::io::{BufRead, Write};

        let fallback = default.or_else(|| choices.first().copied()).unwrap_or("");

        print!("{} ({})? ", message, choices.join("/"));
        if std::io::stdout().flush().is_err() {
            return fallback.to_string();
        }

        let mut answer = String::new();
        let stdin = std::io::stdin();
        if stdin.lock().read_line(&mut answer).is_err() {
            return fallback.to_string();
        }

        let answer = answer.trim();
        choices
            .iter()
            .find(|c| c.eq_ignore_ascii_case(answer))
            .map(|c| c.to_string())
            .unwrap_or_else(|| fallback.to_string())
    }
}

/// The deliberately process-wide state a command mutates: environment
/// variables handed down to child processes, the eventual process exit code,
/// and the machine's pending-reboot request.
pub trait ProcessState: Send + Sync {
    fn env_var(&self, name: &str) -> Option<String>;
    fn set_env_var(&self, name: &str, value: &str);

    /// Clears the per-package environment left behind by a previous package
    /// in the same command.
    fn reset_environment(&self, config: &Config);

    /// Aborts a system shutdown requested by package scripts.
    fn cancel_pending_reboot(&self);

    fn set_exit_code(&self, code: i32);
    fn exit_code(&self) -> i32;
}

#[derive(Debug, Default)]
pub struct SystemProcessState {
    exit_code: AtomicI32,
}

impl ProcessState for SystemProcessState {
    fn env_var(&self, name: &str) -> Option<String> {
        std::env::var(name).ok().filter(|v| !v.is_empty())
    }

    fn set_env_var(&self, name: &str, value: &str) {
        std::env::set_var(name, value);
    }

    fn reset_environment(&self, _config: &Config) {
        std::env::remove_var(env_vars::PACKAGE_INSTALL_LOCATION);
        std::env::remove_var(env_vars::PACKAGE_INSTALLER_TYPE);
    }

    fn cancel_pending_reboot(&self) {
        #[cfg(windows)]
        {
            // Exit code intentionally ignored; there is usually no shutdown
            // to abort.
            let _ = std::process::Command::new("shutdown").arg("/a").output();
        }
    }

    fn set_exit_code(&self, code: i32) {
        self.exit_code.store(code, Ordering::SeqCst);
    }

    fn exit_code(&self) -> i32 {
        self.exit_code.load(Ordering::SeqCst)
    }
}
