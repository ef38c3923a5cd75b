// src/adapters/apt.rs

//! Debian and Ubuntu backend built on apt-get, apt-cache and dpkg-query
//!
//! Installed state comes from the dpkg database; available packages and
//! metadata come from the apt cache. Repositories are read directly from
//! the sources files under `/etc/apt` (one-line `.list` and deb822
//! `.sources` formats).

use super::common::{non_empty, package_args, parse_key_value_blocks, run_batch, run_system};
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
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

pub const APT_ID: &str = "apt";

const DPKG_FORMAT: &str =
    "${Package}\\t${Version}\\t${Installed-Size}\\t${db:Status-Abbrev}\\t${binary:Summary}\\n";

pub struct AptAdapter {
    info: AdapterInfo,
    runner: Arc<dyn CommandRunner>,
    apt_get: String,
    sources_root: PathBuf,
}

impl AptAdapter {
    pub fn new(runner: Arc<dyn CommandRunner>, settings: &BTreeMap<String, String>) -> Self {
        let apt_get =
            resolve_executable(settings.get("executable_path").map(String::as_str), "apt-get");
        let sources_root = settings
            .get("sources_root")
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("/etc/apt"));
        Self {
            info: AdapterInfo {
                id: APT_ID.to_string(),
                name: "APT".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                capabilities: Capabilities {
                    can_search: true,
                    can_install: true,
                    can_remove: true,
                    can_update: true,
                    can_list: true,
                    can_sync: true,
                    can_list_repos: true,
                    has_dependencies: true,
                    has_size_info: true,
                    has_package_detail: true,
                    supports_batch_install: true,
                    supports_locks: true,
                    supports_system_packages: true,
                    ..Default::default()
                },
                enabled: true,
                is_builtin: true,
                plugin_path: None,
                description: "Debian packages via apt and dpkg".to_string(),
                icon: None,
            },
            runner,
            apt_get,
            sources_root,
        }
    }

    pub fn is_available(settings: &BTreeMap<String, String>) -> bool {
        exec::is_available(&resolve_executable(
            settings.get("executable_path").map(String::as_str),
            "apt-get",
        )) && exec::is_available("dpkg-query")
    }

    async fn installed_index(&self) -> Result<Vec<InstalledPackage>> {
        // dpkg-query exits 1 when a pattern matches nothing; without a pattern
        // it lists the whole database
        let (_, stdout) = run_allowing(
            self.runner.as_ref(),
            "dpkg-query",
            &args(["-W", "-f", DPKG_FORMAT]),
            PackageMode::User,
            &[1],
        )
        .await?;
        Ok(parse_dpkg_query(APT_ID, &stdout))
    }

    async fn batch(
        &self,
        packages: &[Package],
        leading: &[&str],
        phase: &str,
        progress: &Option<ProgressSender>,
    ) -> Result<Vec<InstallResult>> {
        let mut argv = args(leading);
        argv.extend(package_args(packages)?);
        run_batch(
            APT_ID,
            self.runner.as_ref(),
            &self.apt_get,
            &argv,
            packages,
            phase,
            progress,
            PackageMode::System,
        )
        .await
    }
}

/// Parse `apt-cache search` lines: `name - summary`
pub fn parse_search(adapter_id: &str, output: &str) -> Vec<Package> {
    output
        .lines()
        .filter_map(|line| {
            let (name, summary) = line.split_once(" - ")?;
            let mut pkg = Package::new(adapter_id, name.trim(), "");
            pkg.description = Some(summary.trim().to_string()).filter(|s| !s.is_empty());
            Some(pkg)
        })
        .collect()
}

/// Parse tab-separated `dpkg-query -W` output, keeping fully installed packages
pub fn parse_dpkg_query(adapter_id: &str, output: &str) -> Vec<InstalledPackage> {
    output
        .lines()
        .filter_map(|line| {
            let fields: Vec<&str> = line.split('\t').collect();
            if fields.len() < 4 {
                if !line.trim().is_empty() {
                    warn!("Skipping malformed dpkg-query line: {}", line);
                }
                return None;
            }
            if fields[3].trim() != "ii" {
                return None;
            }
            let mut pkg = Package::new(adapter_id, fields[0], fields[1]);
            // Installed-Size is reported in KiB
            pkg.size = fields[2].trim().parse::<u64>().ok().map(|kib| kib * 1024);
            pkg.description = fields
                .get(4)
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty());
            Some(InstalledPackage::new(pkg))
        })
        .collect()
}

/// Parse `apt list --upgradable`
///
/// ```text
/// vim/jammy-updates,jammy-security 2:8.2.3995-1ubuntu2.15 amd64 [upgradable from: 2:8.2.3995-1ubuntu2.13]
/// ```
pub fn parse_upgradable(adapter_id: &str, output: &str) -> Vec<Update> {
    output
        .lines()
        .filter_map(|line| {
            let (head, from) = line.split_once("[upgradable from: ")?;
            let current = from.trim_end().trim_end_matches(']');
            let mut parts = head.split_whitespace();
            let (name, suites) = parts.next()?.split_once('/')?;
            let new_version = parts.next()?;
            let mut update = Update::new(adapter_id, name, current, new_version);
            update.is_security = suites.split(',').any(|s| s.contains("security"));
            Some(update)
        })
        .collect()
}

/// Parse a Debian relationship field such as `libc6 (>= 2.34), libpcre2-8-0`
///
/// Only the first alternative of `a | b` is kept.
pub fn parse_depends(field: &str, optional: bool) -> Vec<Dependency> {
    field
        .split(',')
        .filter_map(|entry| {
            let first = entry.split('|').next()?.trim();
            if first.is_empty() {
                return None;
            }
            let (name, version_req) = match first.split_once('(') {
                Some((name, req)) => (
                    name.trim(),
                    Some(req.trim_end_matches(')').trim().to_string()),
                ),
                None => (first, None),
            };
            // Drop architecture qualifiers like `python3:any`
            let name = name.split(':').next().unwrap_or(name);
            Some(Dependency {
                name: name.to_string(),
                version_req,
                optional,
            })
        })
        .collect()
}

/// Parse the first record of `apt-cache show`
pub fn parse_show(adapter_id: &str, output: &str) -> Option<PackageDetail> {
    let block = parse_key_value_blocks(output).into_iter().next()?;
    let name = block.get("Package")?;
    let version = block.get("Version")?;
    let mut pkg = Package::new(adapter_id, name.as_str(), version.as_str());
    pkg.homepage = non_empty(block.get("Homepage"));
    pkg.category = non_empty(block.get("Section"));
    pkg.size = block
        .get("Installed-Size")
        .and_then(|s| s.trim().parse::<u64>().ok())
        .map(|kib| kib * 1024);

    // First line is the summary; " ." lines in the long text are paragraph breaks
    let description = block.get("Description").or_else(|| block.get("Description-en"));
    let mut readme = None;
    if let Some(description) = description {
        let mut lines = description.lines();
        pkg.description = lines.next().map(|s| s.trim().to_string());
        let long = lines
            .map(|l| if l.trim() == "." { "" } else { l.trim() })
            .collect::<Vec<_>>()
            .join("\n");
        if !long.trim().is_empty() {
            readme = Some(long);
        }
    }

    let mut detail = PackageDetail::new(pkg);
    detail.readme = readme;
    if let Some(depends) = block.get("Depends") {
        detail.dependencies = parse_depends(depends, false);
    }
    for optional in ["Recommends", "Suggests"] {
        if let Some(field) = block.get(optional) {
            detail.dependencies.extend(parse_depends(field, true));
        }
    }
    detail.maintainers = non_empty(block.get("Maintainer")).into_iter().collect();
    detail.download_url = non_empty(block.get("Filename"));
    Some(detail)
}

/// Parse a one-line source entry (`deb [opts] uri suite components...`)
fn parse_source_line(line: &str, origin: &Path) -> Option<Repository> {
    let trimmed = line.trim();
    let (enabled, entry) = match trimmed.strip_prefix('#') {
        Some(rest) => (false, rest.trim_start()),
        None => (true, trimmed),
    };
    let rest = entry.strip_prefix("deb ")?;
    let rest = rest.trim_start();
    let rest = if rest.starts_with('[') {
        rest.split_once(']')?.1.trim_start()
    } else {
        rest
    };
    let mut parts = rest.split_whitespace();
    let uri = parts.next()?;
    let suite = parts.next()?;
    let components: Vec<&str> = parts.collect();
    let name = if components.is_empty() {
        suite.to_string()
    } else {
        format!("{} {}", suite, components.join(" "))
    };
    Some(Repository {
        name,
        url: uri.to_string(),
        enabled,
        description: Some(origin.display().to_string()),
    })
}

/// Parse one-line `.list` content
pub fn parse_sources_list(contents: &str, origin: &Path) -> Vec<Repository> {
    contents
        .lines()
        .filter_map(|line| parse_source_line(line, origin))
        .collect()
}

/// Parse deb822 `.sources` content
pub fn parse_deb822_sources(contents: &str, origin: &Path) -> Vec<Repository> {
    // deb822 uses "Key: value" without column padding, which the shared
    // block parser handles
    let mut repos = Vec::new();
    for block in parse_key_value_blocks(contents) {
        let types = block.get("Types").map(String::as_str).unwrap_or("");
        if !types.split_whitespace().any(|t| t == "deb") {
            continue;
        }
        let enabled = block
            .get("Enabled")
            .is_none_or(|v| !v.eq_ignore_ascii_case("no"));
        let components = block.get("Components").cloned().unwrap_or_default();
        let suites = block.get("Suites").cloned().unwrap_or_default();
        for uri in block.get("URIs").into_iter().flat_map(|u| u.split_whitespace()) {
            for suite in suites.split_whitespace() {
                let name = if components.is_empty() {
                    suite.to_string()
                } else {
                    format!("{} {}", suite, components)
                };
                repos.push(Repository {
                    name,
                    url: uri.to_string(),
                    enabled,
                    description: Some(origin.display().to_string()),
                });
            }
        }
    }
    repos
}

/// Read every sources file under `root` (`sources.list` and `sources.list.d/`)
pub fn read_sources(root: &Path) -> Result<Vec<Repository>> {
    let mut files: Vec<PathBuf> = Vec::new();
    let main = root.join("sources.list");
    if main.is_file() {
        files.push(main);
    }
    let dir = root.join("sources.list.d");
    if dir.is_dir() {
        let mut entries: Vec<PathBuf> = std::fs::read_dir(&dir)?
            .filter_map(|e| e.ok().map(|e| e.path()))
            .filter(|p| {
                matches!(
                    p.extension().and_then(|e| e.to_str()),
                    Some("list") | Some("sources")
                )
            })
            .collect();
        entries.sort();
        files.extend(entries);
    }

    let mut repos = Vec::new();
    for file in files {
        let contents = std::fs::read_to_string(&file)?;
        debug!("Reading apt sources from {}", file.display());
        if file.extension().and_then(|e| e.to_str()) == Some("sources") {
            repos.extend(parse_deb822_sources(&contents, &file));
        } else {
            repos.extend(parse_sources_list(&contents, &file));
        }
    }
    Ok(repos)
}

#[async_trait]
impl Adapter for AptAdapter {
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
        let stdout = exec::run_checked(
            self.runner.as_ref(),
            "apt-cache",
            &args(["search", query]),
            PackageMode::User,
        )
        .await?;
        let mut packages = parse_search(APT_ID, &stdout);
        if let Some(limit) = limit {
            packages.truncate(limit);
        }
        if packages.is_empty() {
            return Ok(packages);
        }

        let installed: HashMap<String, String> = match self.installed_index().await {
            Ok(index) => index
                .into_iter()
                .map(|p| (p.package.name, p.package.version))
                .collect(),
            Err(e) => {
                warn!("Could not read dpkg database: {}", e);
                HashMap::new()
            }
        };
        for pkg in &mut packages {
            if let Some(version) = installed.get(&pkg.name) {
                pkg.installed = true;
                pkg.version = version.clone();
            }
        }
        Ok(packages)
    }

    async fn package_detail(&self, package_id: &str) -> Result<PackageDetail> {
        let (code, stdout) = run_allowing(
            self.runner.as_ref(),
            "apt-cache",
            &args(["show", package_id]),
            PackageMode::User,
            &[100],
        )
        .await?;
        if code == 100 || stdout.trim().is_empty() {
            return Err(Error::PackageNotFound(package_id.to_string()));
        }
        parse_show(APT_ID, &stdout)
            .ok_or_else(|| Error::Parse(format!("Unexpected apt-cache output for {}", package_id)))
    }

    async fn install(
        &self,
        packages: &[Package],
        progress: Option<ProgressSender>,
        mode: PackageMode,
    ) -> Result<Vec<InstallResult>> {
        require_system(APT_ID, mode)?;
        self.batch(packages, &["install", "-y"], "Installing", &progress)
            .await
    }

    async fn remove(
        &self,
        packages: &[Package],
        progress: Option<ProgressSender>,
        mode: PackageMode,
    ) -> Result<()> {
        require_system(APT_ID, mode)?;
        let results = self
            .batch(packages, &["remove", "-y"], "Removing", &progress)
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
        require_system(APT_ID, mode)?;
        if packages.is_empty() {
            run_system(self.runner.as_ref(), &self.apt_get, &args(["upgrade", "-y"])).await?;
            return Ok(Vec::new());
        }
        self.batch(
            packages,
            &["install", "--only-upgrade", "-y"],
            "Upgrading",
            &progress,
        )
        .await
    }

    async fn list_installed(&self, _mode: PackageMode) -> Result<Vec<InstalledPackage>> {
        self.installed_index().await
    }

    async fn list_updates(&self, _mode: PackageMode) -> Result<Vec<Update>> {
        let stdout = exec::run_checked(
            self.runner.as_ref(),
            "apt",
            &args(["list", "--upgradable"]),
            PackageMode::User,
        )
        .await?;
        Ok(parse_upgradable(APT_ID, &stdout))
    }

    async fn sync(&self, _progress: Option<ProgressSender>) -> Result<()> {
        run_system(self.runner.as_ref(), &self.apt_get, &args(["update"])).await
    }

    async fn list_repositories(&self) -> Result<Vec<Repository>> {
        read_sources(&self.sources_root)
    }

    fn config_schema(&self) -> Option<ConfigSchema> {
        Some(ConfigSchema {
            adapter_id: APT_ID.to_string(),
            fields: vec![
                ConfigField {
                    key: "executable_path".to_string(),
                    label: "apt-get binary path".to_string(),
                    description: Some("Path to apt-get (auto-detected if empty)".to_string()),
                    field_type: ConfigFieldType::ExecutablePath,
                    aeris_managed: true,
                    ..Default::default()
                },
                ConfigField {
                    key: "sources_root".to_string(),
                    label: "APT configuration directory".to_string(),
                    description: Some("Directory holding sources.list".to_string()),
                    field_type: ConfigFieldType::Text,
                    default: Some(ConfigValue::String("/etc/apt".to_string())),
                    aeris_managed: true,
                    ..Default::default()
                },
            ],
        })
    }

    fn initial_config(&self) -> Option<AdapterConfig> {
        let mut config = AdapterConfig::default();
        config.set("executable_path", ConfigValue::String(self.apt_get.clone()));
        config.set(
            "sources_root",
            ConfigValue::String(self.sources_root.display().to_string()),
        );
        Some(config)
    }

    async fn health_check(&self) -> Result<HealthStatus> {
        let installed = self.installed_index().await?;
        let repo_count = read_sources(&self.sources_root)
            .map(|repos| repos.iter().filter(|r| r.enabled).count() as u32)
            .ok();
        Ok(HealthStatus {
            healthy: true,
            message: "dpkg database readable".to_string(),
            package_count: Some(installed.len() as u64),
            repo_count,
            cache_size: None,
        })
    }
}
