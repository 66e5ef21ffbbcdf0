#![deny(rust_2018_idioms)]

pub mod config;
pub mod info;
pub mod result;
pub mod snapshot;
pub mod spec;

pub use self::config::{Config, Credentials, Features, PlatformInfo};
pub use self::info::{FileEntry, FilesSnapshot, PackageInformation};
pub use self::result::{Message, MessageKind, PackageMetadata, PackageResult};
pub use self::snapshot::{
    EnvironmentSnapshot, EnvironmentVariable, InstallerKey, RegistrySnapshot,
};
pub use self::spec::{PackageSpec, PackagesConfig};

/// File extension of a package archive.
pub const PACKAGE_EXTENSION: &str = ".nupkg";

/// File extension of a package manifest.
pub const MANIFEST_EXTENSION: &str = ".nuspec";

/// File extension of a package list document (`packages.config`).
pub const LIST_DOCUMENT_EXTENSION: &str = ".config";

/// Process exit codes fixed by the CLI contract.
pub mod exit_code {
    pub const SUCCESS: i32 = 0;
    pub const FAILURE: i32 = 1;
    /// Only produced when `use_enhanced_exit_codes` is set.
    pub const OUTDATED_PACKAGES_FOUND: i32 = 2;
    /// Set process-wide when a reboot-required package exit code is seen
    /// and `exit_on_reboot_detected` is enabled.
    pub const ERROR_INSTALL_SUSPEND: i32 = 1604;

    /// Package installer initiated a reboot.
    pub const REBOOT_INITIATED: i32 = 1641;
    /// Package installer requires a reboot to complete.
    pub const REBOOT_REQUIRED: i32 = 3010;

    /// MSI "user cancelled" exit codes. Rollback confirmation is suppressed
    /// when a package exits with one of these.
    pub const USER_CANCELLED: i32 = 1602;
    pub const USER_CANCELLED_LEGACY: i32 = 15608;
}
