use std::path::Path;

use thiserror::Error;

use choco_types::{Config, MANIFEST_EXTENSION, PACKAGE_EXTENSION};

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error(
        "Package name cannot be a path to a file on a remote, or local file system.\n\n\
         To {command} a local, or remote file, you may use:\n  {example}"
    )]
    PathAsPackage { command: String, example: String },

    #[error(
        "Package name cannot point directly to a package manifest file.\n\
         To {command} a package manifest, please run 'choco pack' first."
    )]
    ManifestAsPackage { command: String },
}

/// Rejects package name tokens that are really file paths: a package archive
/// passed by path gets guidance towards `--source`, a manifest gets pointed
/// at `pack`. Runs before any expansion.
pub fn validate_package_names(config: &Config) -> Result<(), ValidationError> {
    for token in config.package_name_tokens() {
        let lower = token.to_lowercase();

        if lower.ends_with(PACKAGE_EXTENSION) && is_path_like(token) {
            return Err(ValidationError::PathAsPackage {
                command: config.command_name.clone(),
                example: example_command(&config.command_name, token),
            });
        }

        if lower.ends_with(MANIFEST_EXTENSION) {
            return Err(ValidationError::ManifestAsPackage {
                command: config.command_name.clone(),
            });
        }
    }

    Ok(())
}

fn is_path_like(token: &str) -> bool {
    let path = Path::new(token);
    is_unc_path(token)
        || path.is_absolute()
        || token.contains('/')
        || token.contains('\\')
        || path.exists()
}

fn is_unc_path(token: &str) -> bool {
    token.starts_with(r"\\")
}

/// Reconstructs the command the user most likely wanted, extracting
/// `<name>-<version>` from the archive filename.
fn example_command(command: &str, token: &str) -> String {
    let path = Path::new(token);
    let stem = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| token.to_string());
    let stem = stem
        .strip_suffix(PACKAGE_EXTENSION)
        .unwrap_or(&stem)
        .to_string();

    let (name, version) = split_name_version(&stem);

    let source = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_else(|| ".".to_string());

    let command = if command.is_empty() { "install" } else { command };
    match version {
        Some(version) => format!(
            "choco {} {} --version=\"{}\" --source=\"{}\"",
            command, name, version, source
        ),
        None => format!("choco {} {} --source=\"{}\"", command, name, source),
    }
}

/// Progressive dot-splitting: the longest trailing run of segments that
/// parses as a version becomes the version, everything before it the name.
fn split_name_version(stem: &str) -> (String, Option<String>) {
    let segments: Vec<&str> = stem.split('.').collect();

    for i in 1..segments.len() {
        let candidate = segments[i..].join(".");
        if parses_as_version(&candidate) {
            return (segments[..i].join("."), Some(candidate));
        }
    }

    (stem.to_string(), None)
}

fn parses_as_version(candidate: &str) -> bool {
    if semver::Version::parse(candidate).is_ok() {
        return true;
    }

    // Package versions are not always strict semver: one to four numeric
    // parts, optionally with a prerelease tag on the last.
    let parts: Vec<&str> = candidate.split('.').collect();
    if parts.is_empty() || parts.len() > 4 {
        return false;
    }

    parts.iter().enumerate().all(|(i, part)| {
        let (digits, rest) = match part.find('-') {
            Some(pos) if i == parts.len() - 1 => part.split_at(pos),
            _ => (*part, ""),
        };
        !digits.is_empty()
            && digits.chars().all(|c| c.is_ascii_digit())
            && (rest.is_empty() || rest.len() > 1)
    })
}
