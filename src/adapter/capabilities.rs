// src/adapter/capabilities.rs
//! Feature flags an adapter advertises

use crate::privilege::PackageMode;
use serde::{Deserialize, Serialize};

/// What an adapter can do
///
/// Every flag defaults to `false`, so plugin manifests only need to list
/// the features they support.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Capabilities {
    pub can_search: bool,
    pub can_install: bool,
    pub can_remove: bool,
    pub can_update: bool,
    pub can_list: bool,
    pub can_sync: bool,
    pub can_run: bool,

    pub can_add_repo: bool,
    pub can_remove_repo: bool,
    pub can_list_repos: bool,

    pub has_profiles: bool,

    pub has_groups: bool,
    pub has_dependencies: bool,
    pub has_size_info: bool,
    pub has_package_detail: bool,

    pub supports_dry_run: bool,
    pub supports_verification: bool,
    pub supports_locks: bool,
    pub supports_batch_install: bool,

    pub supports_portable: bool,
    pub supports_hooks: bool,
    pub supports_build_from_source: bool,
    pub supports_declarative: bool,
    pub supports_snapshots: bool,

    pub supports_user_packages: bool,
    pub supports_system_packages: bool,
}

impl Capabilities {
    pub fn supports_mode(&self, mode: PackageMode) -> bool {
        match mode {
            PackageMode::User => self.supports_user_packages,
            PackageMode::System => self.supports_system_packages,
        }
    }

    /// Names of the enabled flags, in declaration order
    pub fn summary(&self) -> Vec<&'static str> {
        let flags = [
            (self.can_search, "search"),
            (self.can_install, "install"),
            (self.can_remove, "remove"),
            (self.can_update, "update"),
            (self.can_list, "list"),
            (self.can_sync, "sync"),
            (self.can_run, "run"),
            (self.can_add_repo, "add-repo"),
            (self.can_remove_repo, "remove-repo"),
            (self.can_list_repos, "list-repos"),
            (self.has_profiles, "profiles"),
            (self.has_groups, "groups"),
            (self.has_dependencies, "dependencies"),
            (self.has_size_info, "size-info"),
            (self.has_package_detail, "package-detail"),
            (self.supports_dry_run, "dry-run"),
            (self.supports_verification, "verification"),
            (self.supports_locks, "locks"),
            (self.supports_batch_install, "batch-install"),
            (self.supports_portable, "portable"),
            (self.supports_hooks, "hooks"),
            (self.supports_build_from_source, "build-from-source"),
            (self.supports_declarative, "declarative"),
            (self.supports_snapshots, "snapshots"),
            (self.supports_user_packages, "user-packages"),
            (self.supports_system_packages, "system-packages"),
        ];
        flags
            .into_iter()
            .filter_map(|(enabled, name)| enabled.then_some(name))
            .collect()
    }
}
