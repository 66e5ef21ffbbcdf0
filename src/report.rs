use dashmap::DashMap;
use itertools::Itertools;

use choco_types::{Config, MessageKind, PackageResult};

/// Aggregates per-package outcomes into one summary per command and returns
/// the failure count so the caller can settle the process exit code.
#[derive(Debug, Default)]
pub struct Reporter;

impl Reporter {
    pub fn report(&self, config: &Config, results: &DashMap<String, PackageResult>) -> usize {
        let all: Vec<PackageResult> = results
            .iter()
            .map(|entry| entry.value().clone())
            .sorted_by(|a, b| a.name.cmp(&b.name))
            .collect();

        let successes: Vec<&PackageResult> = all.iter().filter(|r| r.success).collect();
        let failures: Vec<&PackageResult> = all.iter().filter(|r| !r.success).collect();
        let warnings: Vec<&PackageResult> = all.iter().filter(|r| r.warning).collect();
        let reboots: Vec<&PackageResult> =
            all.iter().filter(|r| r.reboot_required()).collect();

        log::info!(
            "{} {}/{} packages. {} packages failed.",
            past_tense(&config.command_name),
            successes.len(),
            all.len(),
            failures.len()
        );

        if all.len() >= 5 && !successes.is_empty() {
            log::info!("Successes:");
            for result in &successes {
                log::info!(" - {} v{}", result.name, result.metadata.version);
            }
        }

        if !warnings.is_empty() {
            log::warn!("Warnings:");
            for result in &warnings {
                let detail = result
                    .first_message(MessageKind::Warning)
                    .unwrap_or_default();
                log::warn!(" - {} - {}", result.name, detail);
            }
        }

        if !reboots.is_empty() {
            log::warn!("Packages requiring reboot:");
            for result in &reboots {
                log::warn!(" - {} (exit code {})", result.name, result.exit_code);
            }
        }

        if !failures.is_empty() {
            log::error!("Failures:");
            for result in &failures {
                let detail = result.first_message(MessageKind::Error).unwrap_or_default();
                log::error!(" - {} (exited {}) - {}", result.name, result.exit_code, detail);
            }
        }

        failures.len()
    }
}

fn past_tense(command: &str) -> &str {
    match command {
        "install" => "Installed",
        "upgrade" => "Upgraded",
        "uninstall" => "Uninstalled",
        _ => "Processed",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded_results() -> DashMap<String, PackageResult> {
        let results = DashMap::new();

        for (i, name) in ["a", "b", "c", "d"].iter().enumerate() {
            let mut r = PackageResult::new(*name, format!("1.0.{}", i));
            if *name == "d" {
                r.warn("deprecated install flags");
            }
            results.insert(name.to_string(), r);
        }

        let mut warned = PackageResult::new("warned", "2.0.0");
        warned.warn("license nearing expiry");
        results.insert("warned".to_string(), warned);

        let mut failed = PackageResult::new("broken", "0.1.0");
        failed.exit_code = 1603;
        failed.error("msi returned fatal error");
        results.insert("broken".to_string(), failed);

        results
    }

    #[test]
    fn returns_failure_count() {
        let mut config = Config::default();
        config.command_name = "install".to_string();

        let reporter = Reporter;
        assert_eq!(reporter.report(&config, &seeded_results()), 1);
    }

    #[test]
    fn empty_run_reports_no_failures() {
        let reporter = Reporter;
        assert_eq!(reporter.report(&Config::default(), &DashMap::new()), 0);
    }
}
