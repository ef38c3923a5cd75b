// src/package.rs

//! Backend-neutral package data model
//!
//! Every adapter translates its own metadata into these types. The
//! `adapter_id` on a [`Package`] is what routes later operations
//! (install, remove, update) back to the backend that produced it.

use crate::adapter::AdapterId;
use serde::{Deserialize, Serialize};

pub type PackageId = String;

/// A package as reported by a backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Package {
    /// Backend-unique identifier (usually the name, sometimes `repo/name`)
    pub id: PackageId,
    pub name: String,
    pub version: String,
    /// Adapter that owns this package
    pub adapter_id: AdapterId,
    #[serde(default)]
    pub description: Option<String>,
    /// Download or installed size in bytes
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub homepage: Option<String>,
    #[serde(default)]
    pub license: Option<String>,
    #[serde(default)]
    pub installed: bool,
    #[serde(default)]
    pub update_available: bool,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub icon_url: Option<String>,
}

impl Package {
    /// Create a package with only the identifying fields set
    pub fn new(
        adapter_id: impl Into<String>,
        name: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        let name = name.into();
        Self {
            id: name.clone(),
            name,
            version: version.into(),
            adapter_id: adapter_id.into(),
            description: None,
            size: None,
            homepage: None,
            license: None,
            installed: false,
            update_available: false,
            category: None,
            tags: Vec::new(),
            icon_url: None,
        }
    }

    /// `adapter:id`, the form accepted on the command line
    pub fn qualified_id(&self) -> String {
        format!("{}:{}", self.adapter_id, self.id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dependency {
    pub name: String,
    #[serde(default)]
    pub version_req: Option<String>,
    #[serde(default)]
    pub optional: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageVariant {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: String,
    pub created_at: String,
}

/// Extended metadata for a single package
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageDetail {
    pub package: Package,
    #[serde(default)]
    pub dependencies: Vec<Dependency>,
    #[serde(default)]
    pub screenshots: Vec<String>,
    #[serde(default)]
    pub readme: Option<String>,
    #[serde(default)]
    pub maintainers: Vec<String>,
    #[serde(default)]
    pub build_date: Option<String>,
    #[serde(default)]
    pub download_url: Option<String>,
    #[serde(default)]
    pub variants: Vec<PackageVariant>,
    #[serde(default)]
    pub snapshots: Vec<Snapshot>,
}

impl PackageDetail {
    pub fn new(package: Package) -> Self {
        Self {
            package,
            dependencies: Vec::new(),
            screenshots: Vec::new(),
            readme: None,
            maintainers: Vec::new(),
            build_date: None,
            download_url: None,
            variants: Vec::new(),
            snapshots: Vec::new(),
        }
    }
}

/// A package present on the system
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstalledPackage {
    pub package: Package,
    #[serde(default)]
    pub installed_at: String,
    #[serde(default)]
    pub install_size: u64,
    #[serde(default)]
    pub install_path: Option<String>,
    #[serde(default)]
    pub pinned: bool,
    #[serde(default)]
    pub auto_installed: bool,
    #[serde(default = "default_healthy")]
    pub is_healthy: bool,
    #[serde(default)]
    pub profile: Option<String>,
}

fn default_healthy() -> bool {
    true
}

impl InstalledPackage {
    pub fn new(mut package: Package) -> Self {
        package.installed = true;
        let install_size = package.size.unwrap_or(0);
        Self {
            package,
            installed_at: String::new(),
            install_size,
            install_path: None,
            pinned: false,
            auto_installed: false,
            is_healthy: true,
            profile: None,
        }
    }
}

/// An available upgrade for an installed package
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Update {
    pub package: Package,
    pub current_version: String,
    pub new_version: String,
    #[serde(default)]
    pub download_size: Option<u64>,
    #[serde(default)]
    pub is_security: bool,
    #[serde(default)]
    pub changelog_url: Option<String>,
}

impl Update {
    pub fn new(
        adapter_id: &str,
        name: &str,
        current_version: impl Into<String>,
        new_version: impl Into<String>,
    ) -> Self {
        let new_version = new_version.into();
        let mut package = Package::new(adapter_id, name, new_version.clone());
        package.installed = true;
        package.update_available = true;
        Self {
            package,
            current_version: current_version.into(),
            new_version,
            download_size: None,
            is_security: false,
            changelog_url: None,
        }
    }
}

/// Per-package outcome of an install or update
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstallResult {
    pub package_name: String,
    pub package_id: String,
    pub version: String,
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
}

impl InstallResult {
    pub fn ok(package: &Package) -> Self {
        Self {
            package_name: package.name.clone(),
            package_id: package.id.clone(),
            version: package.version.clone(),
            success: true,
            error: None,
        }
    }

    pub fn failed(package: &Package, error: impl Into<String>) -> Self {
        Self {
            package_name: package.name.clone(),
            package_id: package.id.clone(),
            version: package.version.clone(),
            success: false,
            error: Some(error.into()),
        }
    }
}

/// A named set of packages some backends can switch between
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub package_count: u64,
}

/// A package source configured in a backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Repository {
    pub name: String,
    #[serde(default)]
    pub url: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub description: Option<String>,
}

fn default_enabled() -> bool {
    true
}

/// Format a byte count with binary units (`1.5 MiB`)
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["KiB", "MiB", "GiB", "TiB", "PiB"];
    if bytes < 1024 {
        return format!("{} B", bytes);
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", value, UNITS[unit])
}
