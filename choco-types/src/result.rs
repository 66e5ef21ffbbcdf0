use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::exit_code;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Info,
    Note,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub kind: MessageKind,
    pub text: String,
}

/// Identity of one concrete package: id plus resolved version.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PackageMetadata {
    pub id: String,
    pub version: String,
}

impl PackageMetadata {
    pub fn new(id: impl Into<String>, version: impl Into<String>) -> Self {
        PackageMetadata {
            id: id.into(),
            version: version.into(),
        }
    }
}

/// Outcome record for one package operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageResult {
    pub name: String,
    pub metadata: PackageMetadata,
    pub install_location: Option<PathBuf>,
    pub exit_code: i32,
    pub success: bool,
    pub warning: bool,
    pub inconclusive: bool,
    pub messages: Vec<Message>,
}

impl PackageResult {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        let name = name.into();
        PackageResult {
            metadata: PackageMetadata::new(name.clone(), version),
            name,
            install_location: None,
            exit_code: 0,
            success: true,
            warning: false,
            inconclusive: false,
            messages: Vec::new(),
        }
    }

    /// A result that carries nothing but an error message, used for inputs
    /// that never reached a source runner (e.g. a missing list document).
    pub fn with_error(name: impl Into<String>, text: impl Into<String>) -> Self {
        let mut result = PackageResult::new(name, "");
        result.error(text);
        result
    }

    pub fn info(&mut self, text: impl Into<String>) {
        self.messages.push(Message {
            kind: MessageKind::Info,
            text: text.into(),
        });
    }

    pub fn note(&mut self, text: impl Into<String>) {
        self.messages.push(Message {
            kind: MessageKind::Note,
            text: text.into(),
        });
    }

    pub fn warn(&mut self, text: impl Into<String>) {
        self.warning = true;
        self.messages.push(Message {
            kind: MessageKind::Warning,
            text: text.into(),
        });
    }

    /// Recording an error also fails the result.
    pub fn error(&mut self, text: impl Into<String>) {
        self.success = false;
        self.messages.push(Message {
            kind: MessageKind::Error,
            text: text.into(),
        });
    }

    pub fn first_message(&self, kind: MessageKind) -> Option<&str> {
        self.messages
            .iter()
            .find(|m| m.kind == kind)
            .map(|m| m.text.as_str())
    }

    pub fn error_messages(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter().filter(|m| m.kind == MessageKind::Error)
    }

    /// The installer asked for (or started) a reboot.
    pub fn reboot_required(&self) -> bool {
        self.exit_code == exit_code::REBOOT_INITIATED
            || self.exit_code == exit_code::REBOOT_REQUIRED
    }

    /// The installer reported a user cancellation.
    pub fn user_cancelled(&self) -> bool {
        self.exit_code == exit_code::USER_CANCELLED
            || self.exit_code == exit_code::USER_CANCELLED_LEGACY
    }
}
