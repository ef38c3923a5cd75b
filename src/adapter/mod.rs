// src/adapter/mod.rs

//! The backend abstraction
//!
//! An [`Adapter`] drives one package manager. Built-in adapters wrap the
//! distribution tools (pacman, apt, dnf); plugin adapters wrap external
//! executables. The [`manager::AdapterManager`] owns every registered
//! adapter and fans user operations out to them.
//!
//! Only the core operations are required. Everything else defaults to
//! `Error::NotSupported`, and callers check [`Capabilities`] before
//! offering a feature.

pub mod capabilities;
pub mod config;
pub mod manager;

pub use capabilities::Capabilities;
pub use config::{AdapterConfig, ConfigField, ConfigFieldType, ConfigSchema, ConfigValue};
pub use manager::AdapterManager;

use crate::error::{Error, Result};
use crate::package::{
    InstallResult, InstalledPackage, Package, PackageDetail, Profile, Repository, Update,
};
use crate::privilege::PackageMode;
use crate::progress::ProgressSender;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub type AdapterId = String;

/// Static description of an adapter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdapterInfo {
    pub id: AdapterId,
    pub name: String,
    pub version: String,
    pub capabilities: Capabilities,
    pub enabled: bool,
    pub is_builtin: bool,
    pub plugin_path: Option<PathBuf>,
    pub description: String,
    pub icon: Option<String>,
}

/// Result of an adapter health check
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub healthy: bool,
    pub message: String,
    pub package_count: Option<u64>,
    pub repo_count: Option<u32>,
    pub cache_size: Option<u64>,
}

/// A package-manager backend
#[async_trait]
pub trait Adapter: Send + Sync {
    fn info(&self) -> &AdapterInfo;

    fn capabilities(&self) -> &Capabilities;

    async fn search(
        &self,
        query: &str,
        limit: Option<usize>,
        mode: PackageMode,
    ) -> Result<Vec<Package>>;

    async fn package_detail(&self, _package_id: &str) -> Result<PackageDetail> {
        Err(Error::NotSupported)
    }

    async fn install(
        &self,
        packages: &[Package],
        progress: Option<ProgressSender>,
        mode: PackageMode,
    ) -> Result<Vec<InstallResult>>;

    async fn remove(
        &self,
        packages: &[Package],
        progress: Option<ProgressSender>,
        mode: PackageMode,
    ) -> Result<()>;

    /// Update the given packages; an empty slice means "everything"
    async fn update(
        &self,
        packages: &[Package],
        progress: Option<ProgressSender>,
        mode: PackageMode,
    ) -> Result<Vec<InstallResult>>;

    async fn list_installed(&self, mode: PackageMode) -> Result<Vec<InstalledPackage>>;

    async fn list_updates(&self, mode: PackageMode) -> Result<Vec<Update>>;

    /// Refresh repository metadata
    async fn sync(&self, _progress: Option<ProgressSender>) -> Result<()> {
        Err(Error::NotSupported)
    }

    async fn list_profiles(&self) -> Result<Vec<Profile>> {
        Err(Error::NotSupported)
    }

    async fn active_profile(&self) -> Result<Profile> {
        Err(Error::NotSupported)
    }

    async fn switch_profile(&self, _profile_id: &str) -> Result<()> {
        Err(Error::NotSupported)
    }

    async fn list_repositories(&self) -> Result<Vec<Repository>> {
        Err(Error::NotSupported)
    }

    async fn add_repository(&self, _repo: &Repository) -> Result<()> {
        Err(Error::NotSupported)
    }

    async fn remove_repository(&self, _repo_name: &str) -> Result<()> {
        Err(Error::NotSupported)
    }

    async fn set_repo_enabled(
        &self,
        _name: &str,
        _enabled: bool,
        _mode: PackageMode,
    ) -> Result<()> {
        Err(Error::NotSupported)
    }

    fn config_schema(&self) -> Option<ConfigSchema> {
        None
    }

    fn initial_config(&self) -> Option<AdapterConfig> {
        None
    }

    async fn get_config(&self) -> Result<AdapterConfig> {
        Err(Error::NotSupported)
    }

    async fn set_config(&self, _config: &AdapterConfig) -> Result<()> {
        Err(Error::NotSupported)
    }

    async fn set_config_for_mode(&self, config: &AdapterConfig, _mode: PackageMode) -> Result<()> {
        self.set_config(config).await
    }

    async fn run_package(&self, _package: &Package, _args: &[String]) -> Result<()> {
        Err(Error::NotSupported)
    }

    async fn health_check(&self) -> Result<HealthStatus> {
        Ok(HealthStatus::default())
    }
}
