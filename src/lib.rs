// src/lib.rs

//! Aeris: one front-end for many package managers
//!
//! Aeris searches, installs, updates and removes packages across several
//! backends at once. Each backend is an [`Adapter`]; the
//! [`AdapterManager`] fans user operations out to every enabled adapter and
//! routes package operations back to the adapter that produced the package.
//!
//! # Architecture
//!
//! - Built-in adapters wrap pacman, apt and dnf through their command-line
//!   tools, plus soar for portable packages in user or system mode
//! - Plugin adapters are external executables speaking a JSON-lines protocol,
//!   sandboxed by the permissions in their manifest
//! - System-mode operations are elevated with pkexec, sudo or doas, with a
//!   short-lived elevation cache
//! - Plugins can be installed from a remote registry with SHA-256 verification

pub mod adapter;
pub mod adapters;
pub mod config;
mod error;
pub mod package;
pub mod plugin;
pub mod privilege;
pub mod progress;
pub mod registry;

pub use adapter::{
    Adapter, AdapterConfig, AdapterId, AdapterInfo, AdapterManager, Capabilities, ConfigField,
    ConfigFieldType, ConfigSchema, ConfigValue, HealthStatus,
};
pub use config::AerisConfig;
pub use error::{Error, Result};
pub use package::{
    Dependency, InstallResult, InstalledPackage, Package, PackageDetail, Profile, Repository,
    Update, format_bytes,
};
pub use plugin::{PluginAdapter, PluginManifest};
pub use privilege::{PackageMode, PrivilegeError, PrivilegeManager};
pub use progress::{ProgressEvent, ProgressObserver, ProgressReceiver, ProgressSender};
pub use registry::{PluginEntry, Registry, RegistryError};
