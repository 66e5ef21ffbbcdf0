#![deny(rust_2018_idioms)]
#![deny(unused_must_use)]

pub use choco_types as types;

pub mod config;
pub mod coordinator;
pub mod defaults;
pub mod expand;
pub mod failure;
pub mod files;
pub mod notify;
pub mod package_info;
pub mod pending;
pub mod registry;
pub mod report;
pub mod runner;
pub mod service;
pub mod sideload;
pub mod snapshot;
pub mod validate;

mod ext;

#[cfg(test)]
pub(crate) mod testing;

pub use self::config::{Permission, Settings};
pub use self::coordinator::{Command, Coordinator, CoordinatorError, ResultSet, Services};
pub use self::notify::Notifier;
pub use self::pending::PendingMarker;
pub use self::report::Reporter;
pub use self::runner::{NoopSourceRunner, SourceDispatcher, SourceRunner};
pub use self::snapshot::Snapshotter;
