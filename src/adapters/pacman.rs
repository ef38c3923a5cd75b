// src/adapters/pacman.rs

//! Arch Linux backend driven through the `pacman` command-line tool

use super::common::{
    non_empty, package_args, parse_key_value_blocks, parse_size, run_batch, run_system,
};
use super::exec::{self, CommandRunner, args, require_system, resolve_executable, run_allowing};
use crate::adapter::{
    Adapter, AdapterConfig, AdapterInfo, Capabilities, ConfigField, ConfigFieldType, ConfigSchema,
    ConfigValue, HealthStatus,
};
use crate::error::{Error, Result};
use crate::package::{
    Dependency, InstallResult, InstalledPackage, Package, PackageDetail, Repository, Update,
};
use crate::privilege::PackageMode;
use crate::progress::ProgressSender;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

pub const PACMAN_ID: &str = "pacman";

pub struct PacmanAdapter {
    info: AdapterInfo,
    runner: Arc<dyn CommandRunner>,
    executable: String,
    needed: bool,
}

impl PacmanAdapter {
    /// Create the adapter from its aeris-managed settings
    pub fn new(runner: Arc<dyn CommandRunner>, settings: &BTreeMap<String, String>) -> Self {
        let executable =
            resolve_executable(settings.get("executable_path").map(String::as_str), "pacman");
        let needed = settings
            .get("needed")
            .map(|v| v != "false")
            .unwrap_or(true);
        Self {
            info: AdapterInfo {
                id: PACMAN_ID.to_string(),
                name: "Pacman".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                capabilities: Self::default_capabilities(),
                enabled: true,
                is_builtin: true,
                plugin_path: None,
                description: "Arch Linux packages via pacman".to_string(),
                icon: None,
            },
            runner,
            executable,
            needed,
        }
    }

    pub fn is_available(settings: &BTreeMap<String, String>) -> bool {
        exec::is_available(&resolve_executable(
            settings.get("executable_path").map(String::as_str),
            "pacman",
        ))
    }

    fn default_capabilities() -> Capabilities {
        Capabilities {
            can_search: true,
            can_install: true,
            can_remove: true,
            can_update: true,
            can_list: true,
            can_sync: true,
            can_list_repos: true,
            has_groups: true,
            has_dependencies: true,
            has_size_info: true,
            has_package_detail: true,
            supports_batch_install: true,
            supports_locks: true,
            supports_system_packages: true,
            ..Default::default()
        }
    }

    async fn query(&self, arguments: &[&str]) -> Result<(i32, String)> {
        // pacman exits 1 when a query matches nothing
        run_allowing(
            self.runner.as_ref(),
            &self.executable,
            &args(arguments),
            PackageMode::User,
            &[1],
        )
        .await
    }
}

/// Parse `pacman -Ss` output
///
/// ```text
/// extra/ripgrep 14.1.0-1 (utils) [installed: 14.0.3-1]
///     A search tool that combines the usability of ag with the raw speed of grep
/// ```
pub fn parse_search(adapter_id: &str, output: &str) -> Vec<Package> {
    let mut packages: Vec<Package> = Vec::new();
    for line in output.lines() {
        if line.starts_with(char::is_whitespace) {
            if let Some(last) = packages.last_mut() {
                last.description = Some(line.trim().to_string());
            }
            continue;
        }

        let mut parts = line.split_whitespace();
        let (Some(qualified), Some(version)) = (parts.next(), parts.next()) else {
            continue;
        };
        let (repo, name) = match qualified.split_once('/') {
            Some((repo, name)) => (Some(repo), name),
            None => (None, qualified),
        };

        let rest = parts.collect::<Vec<_>>().join(" ");
        let mut pkg = Package::new(adapter_id, name, version);
        pkg.category = repo.map(str::to_string);
        if let Some(start) = rest.find('(')
            && let Some(end) = rest[start..].find(')')
        {
            pkg.tags = rest[start + 1..start + end]
                .split_whitespace()
                .map(str::to_string)
                .collect();
        }
        if let Some(pos) = rest.find("[installed") {
            pkg.installed = true;
            let marker = &rest[pos..];
            if let Some(installed_version) = marker
                .strip_prefix("[installed: ")
                .and_then(|s| s.strip_suffix(']'))
            {
                pkg.update_available = installed_version != version;
            }
        }
        packages.push(pkg);
    }
    packages
}

/// Parse `pacman -Qi` output covering every installed package
pub fn parse_installed(adapter_id: &str, output: &str) -> Vec<InstalledPackage> {
    parse_key_value_blocks(output)
        .into_iter()
        .filter_map(|block| {
            let name = block.get("Name")?;
            let version = block.get("Version")?;
            let mut pkg = Package::new(adapter_id, name.as_str(), version.as_str());
            pkg.description = non_empty(block.get("Description"));
            pkg.homepage = non_empty(block.get("URL"));
            pkg.license = non_empty(block.get("Licenses"));
            pkg.size = block.get("Installed Size").and_then(|s| parse_size(s));
            pkg.tags = non_empty(block.get("Groups"))
                .map(|g| g.split_whitespace().map(str::to_string).collect())
                .unwrap_or_default();

            let mut installed = InstalledPackage::new(pkg);
            installed.installed_at = block.get("Install Date").cloned().unwrap_or_default();
            installed.auto_installed = block
                .get("Install Reason")
                .is_some_and(|r| r.contains("dependency"));
            Some(installed)
        })
        .collect()
}

/// Parse `pacman -Qu` lines: `name old -> new [ignored]`
pub fn parse_updates(adapter_id: &str, output: &str) -> Vec<Update> {
    output
        .lines()
        .filter_map(|line| {
            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.len() < 4 || parts[2] != "->" {
                if !line.trim().is_empty() {
                    warn!("Skipping malformed pacman -Qu line: {}", line);
                }
                return None;
            }
            if parts.get(4) == Some(&"[ignored]") {
                debug!("Skipping ignored update for {}", parts[0]);
                return None;
            }
            Some(Update::new(adapter_id, parts[0], parts[1], parts[3]))
        })
        .collect()
}

/// Parse a pacman dependency such as `glibc>=2.17`
fn parse_dependency(dep: &str, optional: bool) -> Dependency {
    let dep = dep.trim_end_matches(':');
    match dep.find(['>', '<', '=']) {
        Some(pos) => Dependency {
            name: dep[..pos].to_string(),
            version_req: Some(dep[pos..].to_string()),
            optional,
        },
        None => Dependency {
            name: dep.to_string(),
            version_req: None,
            optional,
        },
    }
}

/// Parse `pacman -Si` output for one package
pub fn parse_detail(adapter_id: &str, output: &str) -> Option<PackageDetail> {
    let block = parse_key_value_blocks(output).into_iter().next()?;
    let name = block.get("Name")?;
    let version = block.get("Version")?;
    let mut pkg = Package::new(adapter_id, name.as_str(), version.as_str());
    pkg.description = non_empty(block.get("Description"));
    pkg.homepage = non_empty(block.get("URL"));
    pkg.license = non_empty(block.get("Licenses"));
    pkg.category = non_empty(block.get("Repository"));
    pkg.size = block.get("Download Size").and_then(|s| parse_size(s));

    let mut detail = PackageDetail::new(pkg);
    if let Some(deps) = non_empty(block.get("Depends On")) {
        detail.dependencies = deps
            .split_whitespace()
            .map(|d| parse_dependency(d, false))
            .collect();
    }
    if let Some(optional) = non_empty(block.get("Optional Deps")) {
        detail.dependencies.extend(optional.lines().filter_map(|line| {
            line.split_whitespace()
                .next()
                .map(|d| parse_dependency(d, true))
        }));
    }
    detail.maintainers = non_empty(block.get("Packager")).into_iter().collect();
    detail.build_date = non_empty(block.get("Build Date"));
    Some(detail)
}

#[async_trait]
impl Adapter for PacmanAdapter {
    fn info(&self) -> &AdapterInfo {
        &self.info
    }

    fn capabilities(&self) -> &Capabilities {
        &self.info.capabilities
    }

    async fn search(
        &self,
        query: &str,
        limit: Option<usize>,
        _mode: PackageMode,
    ) -> Result<Vec<Package>> {
        let (_, stdout) = self.query(&["-Ss", query]).await?;
        let mut packages = parse_search(PACMAN_ID, &stdout);
        if let Some(limit) = limit {
            packages.truncate(limit);
        }
        Ok(packages)
    }

    async fn package_detail(&self, package_id: &str) -> Result<PackageDetail> {
        let (code, stdout) = self.query(&["-Si", package_id]).await?;
        if code != 0 {
            return Err(Error::PackageNotFound(package_id.to_string()));
        }
        parse_detail(PACMAN_ID, &stdout)
            .ok_or_else(|| Error::Parse(format!("Unexpected pacman -Si output for {}", package_id)))
    }

    async fn install(
        &self,
        packages: &[Package],
        progress: Option<ProgressSender>,
        mode: PackageMode,
    ) -> Result<Vec<InstallResult>> {
        require_system(PACMAN_ID, mode)?;
        let mut argv = vec!["-S".to_string(), "--noconfirm".to_string()];
        if self.needed {
            argv.push("--needed".to_string());
        }
        argv.extend(package_args(packages)?);
        run_batch(
            PACMAN_ID,
            self.runner.as_ref(),
            &self.executable,
            &argv,
            packages,
            "Installing",
            &progress,
            PackageMode::System,
        )
        .await
    }

    async fn remove(
        &self,
        packages: &[Package],
        progress: Option<ProgressSender>,
        mode: PackageMode,
    ) -> Result<()> {
        require_system(PACMAN_ID, mode)?;
        let mut argv = args(["-R", "--noconfirm"]);
        argv.extend(package_args(packages)?);
        let results = run_batch(
            PACMAN_ID,
            self.runner.as_ref(),
            &self.executable,
            &argv,
            packages,
            "Removing",
            &progress,
            PackageMode::System,
        )
        .await?;
        match results.into_iter().find(|r| !r.success) {
            Some(failed) => Err(Error::Other(failed.error.unwrap_or_default())),
            None => Ok(()),
        }
    }

    async fn update(
        &self,
        packages: &[Package],
        progress: Option<ProgressSender>,
        mode: PackageMode,
    ) -> Result<Vec<InstallResult>> {
        require_system(PACMAN_ID, mode)?;
        if packages.is_empty() {
            run_system(
                self.runner.as_ref(),
                &self.executable,
                &args(["-Syu", "--noconfirm"]),
            )
            .await?;
            return Ok(Vec::new());
        }
        let mut argv = args(["-S", "--noconfirm"]);
        argv.extend(package_args(packages)?);
        run_batch(
            PACMAN_ID,
            self.runner.as_ref(),
            &self.executable,
            &argv,
            packages,
            "Upgrading",
            &progress,
            PackageMode::System,
        )
        .await
    }

    async fn list_installed(&self, _mode: PackageMode) -> Result<Vec<InstalledPackage>> {
        let (_, stdout) = self.query(&["-Qi"]).await?;
        Ok(parse_installed(PACMAN_ID, &stdout))
    }

    async fn list_updates(&self, _mode: PackageMode) -> Result<Vec<Update>> {
        let (_, stdout) = self.query(&["-Qu"]).await?;
        Ok(parse_updates(PACMAN_ID, &stdout))
    }

    async fn sync(&self, _progress: Option<ProgressSender>) -> Result<()> {
        run_system(self.runner.as_ref(), &self.executable, &args(["-Sy"])).await
    }

    async fn list_repositories(&self) -> Result<Vec<Repository>> {
        let stdout = exec::run_checked(
            self.runner.as_ref(),
            "pacman-conf",
            &args(["--repo-list"]),
            PackageMode::User,
        )
        .await?;
        Ok(stdout
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(|name| Repository {
                name: name.to_string(),
                url: String::new(),
                enabled: true,
                description: None,
            })
            .collect())
    }

    fn config_schema(&self) -> Option<ConfigSchema> {
        Some(ConfigSchema {
            adapter_id: PACMAN_ID.to_string(),
            fields: vec![
                ConfigField {
                    key: "executable_path".to_string(),
                    label: "pacman binary path".to_string(),
                    description: Some("Path to pacman (auto-detected if empty)".to_string()),
                    field_type: ConfigFieldType::ExecutablePath,
                    aeris_managed: true,
                    ..Default::default()
                },
                ConfigField {
                    key: "needed".to_string(),
                    label: "Skip up-to-date packages".to_string(),
                    description: Some("Pass --needed when installing".to_string()),
                    field_type: ConfigFieldType::Toggle,
                    default: Some(ConfigValue::Bool(true)),
                    aeris_managed: true,
                    ..Default::default()
                },
            ],
        })
    }

    fn initial_config(&self) -> Option<AdapterConfig> {
        let mut config = AdapterConfig::default();
        config.set("executable_path", ConfigValue::String(self.executable.clone()));
        config.set("needed", ConfigValue::Bool(self.needed));
        Some(config)
    }

    async fn health_check(&self) -> Result<HealthStatus> {
        let (code, stdout) = self.query(&["-Qq"]).await?;
        Ok(HealthStatus {
            healthy: code == 0,
            message: format!("{} is responding", self.executable),
            package_count: Some(stdout.lines().filter(|l| !l.trim().is_empty()).count() as u64),
            ..Default::default()
        })
    }
}
